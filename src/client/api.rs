/// API Client
///
/// Login, logout and authenticated calls against the rental backend.

use std::sync::Arc;

use serde_json::json;

use super::coordinator::RefreshCoordinator;
use super::session::{AuthSession, SessionTokens};
use super::transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
use super::ClientError;
use crate::route_table::Route;
use crate::routes::{AuthResponse, UserResponse};

/// API client for the rental backend.
///
/// Login goes straight to the transport; every other call goes through the
/// refresh coordinator and so survives an access token expiring mid-session.
pub struct ApiClient {
    transport: Arc<dyn Transport>,
    coordinator: RefreshCoordinator,
}

impl ApiClient {
    pub fn new(transport: Arc<dyn Transport>, session: AuthSession) -> Self {
        Self {
            coordinator: RefreshCoordinator::new(transport.clone(), session),
            transport,
        }
    }

    pub fn over_http(base_url: impl Into<String>, session: AuthSession) -> Self {
        Self::new(Arc::new(HttpTransport::new(base_url)), session)
    }

    pub fn session(&self) -> &AuthSession {
        self.coordinator.session()
    }

    /// Authenticate and establish the session.
    pub async fn login(&self, email: &str, password: &str) -> Result<SessionTokens, ClientError> {
        let request = ApiRequest::post(
            Route::Login.path(),
            json!({ "email": email, "password": password }),
        );

        let response = self.transport.execute(&request, None).await?.into_result()?;
        let tokens = SessionTokens::from(response.json::<AuthResponse>()?);

        self.session().establish(tokens.clone());
        Ok(tokens)
    }

    /// Clear the server-side refresh slot, then the local session.
    ///
    /// The local session is cleared even when the server call fails.
    pub async fn logout(&self) -> Result<(), ClientError> {
        let principal_id = self.session().principal_id().ok_or(ClientError::NotAuthenticated)?;

        let result = self
            .coordinator
            .send(ApiRequest::post(
                Route::Logout.path(),
                json!({ "principalId": principal_id }),
            ))
            .await;

        self.session().clear();
        if let Err(err) = &result {
            tracing::warn!(error = %err, "Server-side logout failed; local session cleared");
        }
        result.map(|_| ())
    }

    /// Coordinated request carrying the current access token
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        self.coordinator.send(request).await
    }

    pub async fn current_user(&self) -> Result<UserResponse, ClientError> {
        self.send(ApiRequest::get(Route::CurrentUser.path()))
            .await?
            .json()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::Value;
    use std::sync::Mutex;
    use uuid::Uuid;

    /// Records every call and answers login and logout.
    struct RecordingApi {
        calls: Mutex<Vec<(String, Option<String>)>>,
        logout_status: u16,
    }

    #[async_trait]
    impl Transport for RecordingApi {
        async fn execute(
            &self,
            request: &ApiRequest,
            bearer: Option<&str>,
        ) -> Result<ApiResponse, ClientError> {
            self.calls
                .lock()
                .unwrap()
                .push((request.path.clone(), bearer.map(str::to_string)));

            if request.path == Route::Login.path() {
                return Ok(ApiResponse::new(
                    200,
                    json!({
                        "name": "user@example.com",
                        "access": "access-1",
                        "refresh": "refresh-1",
                        "principalId": Uuid::nil(),
                    }),
                ));
            }
            Ok(ApiResponse::new(self.logout_status, Value::Null))
        }
    }

    fn client(logout_status: u16) -> (Arc<RecordingApi>, ApiClient) {
        let api = Arc::new(RecordingApi {
            calls: Mutex::new(Vec::new()),
            logout_status,
        });
        let transport: Arc<dyn Transport> = api.clone();
        (api, ApiClient::new(transport, AuthSession::new()))
    }

    #[tokio::test]
    async fn login_establishes_session_without_bearer() {
        let (api, client) = client(200);

        let tokens = client.login("user@example.com", "secret123").await.unwrap();

        assert_eq!(tokens.name, "user@example.com");
        assert!(client.session().is_authenticated());
        assert_eq!(api.calls.lock().unwrap()[0], (Route::Login.path().to_string(), None));
    }

    #[tokio::test]
    async fn logout_sends_principal_id_and_clears_session() {
        let (api, client) = client(200);
        client.login("user@example.com", "secret123").await.unwrap();

        client.logout().await.unwrap();

        assert!(!client.session().is_authenticated());
        let calls = api.calls.lock().unwrap();
        assert_eq!(
            calls[1],
            (Route::Logout.path().to_string(), Some("access-1".to_string()))
        );
    }

    #[tokio::test]
    async fn failed_logout_still_clears_session() {
        let (_api, client) = client(500);
        client.login("user@example.com", "secret123").await.unwrap();

        let err = client.logout().await.unwrap_err();

        assert_eq!(err.status(), Some(500));
        assert!(!client.session().is_authenticated());
    }

    #[tokio::test]
    async fn logout_without_session_is_an_error() {
        let (api, client) = client(200);

        assert!(matches!(client.logout().await, Err(ClientError::NotAuthenticated)));
        assert!(api.calls.lock().unwrap().is_empty());
    }
}
