use actix_web::dev::Server;
use actix_web::{web, App, HttpServer};
use std::net::TcpListener;

use crate::auth::TokenAuthority;
use crate::middleware::{AuthGate, RequestLogger};
use crate::routes::configure_auth_routes;

/// Hook for mounting handlers that live outside this crate (vehicles, reviews)
/// against their catalogue entries.
pub type RouteConfigurer = fn(&mut web::ServiceConfig);

/// Build the HTTP server on an already bound listener.
///
/// Every request passes the request logger, then the auth gate, then the router.
pub fn run(
    listener: TcpListener,
    authority: TokenAuthority,
    configure: RouteConfigurer,
) -> Result<Server, std::io::Error> {
    let authority_data = web::Data::new(authority.clone());

    let server = HttpServer::new(move || {
        App::new()
            .wrap(AuthGate::new(authority.clone()))
            .wrap(RequestLogger)
            .app_data(authority_data.clone())
            .configure(configure_auth_routes)
            .configure(configure)
    })
    .listen(listener)?
    .run();

    Ok(server)
}
