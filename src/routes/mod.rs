mod auth;
mod health_check;

pub use auth::{
    current_user, login, logout, refresh, register, signup, AuthResponse, LoginRequest,
    LogoutRequest, MessageResponse, RegisterRequest, RegisterResponse, UserResponse,
};
pub use health_check::health_check;

use actix_web::web;

use crate::route_table::{mount, Route};

/// Mount the authentication and health endpoints from the route catalogue.
pub fn configure_auth_routes(cfg: &mut web::ServiceConfig) {
    mount(cfg, Route::HealthCheck, health_check);
    mount(cfg, Route::Login, login);
    mount(cfg, Route::Register, register);
    mount(cfg, Route::Signup, signup);
    mount(cfg, Route::Refresh, refresh);
    mount(cfg, Route::Logout, logout);
    mount(cfg, Route::CurrentUser, current_user);
}
