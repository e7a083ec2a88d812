/// Client side of the token lifecycle
///
/// Keeps the caller's credentials, tags outbound requests with the current access
/// token and funnels token rejections into a single shared refresh.

mod api;
mod coordinator;
mod error;
mod session;
mod transport;

pub use api::ApiClient;
pub use coordinator::RefreshCoordinator;
pub use error::{ClientError, RefreshFailure};
pub use session::{AuthSession, SessionTokens};
pub use transport::{ApiRequest, ApiResponse, HttpTransport, Transport};
