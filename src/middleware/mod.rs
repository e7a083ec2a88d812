/// Middleware module
///
/// Custom middleware for authentication and request logging.

mod auth_gate;
mod request_logger;

pub use auth_gate::{bearer_token, AuthGate};
pub use request_logger::RequestLogger;
