//! Integration tests for the health endpoint

mod common;

use common::spawn_app;

#[tokio::test]
async fn health_check_works() {
    let app = spawn_app();

    let response = app
        .client
        .get(app.url("/health_check"))
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
    assert_eq!(response.text().await.unwrap(), "OK");
}

#[tokio::test]
async fn health_check_ignores_a_bad_token() {
    let app = spawn_app();

    let response = app
        .client
        .get(app.url("/health_check"))
        .bearer_auth("garbage")
        .send()
        .await
        .expect("Failed to execute request");

    assert!(response.status().is_success());
}
