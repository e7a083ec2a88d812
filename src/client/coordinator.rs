/// Refresh Coordinator
///
/// Sends API requests with the current access token and recovers from token
/// rejections with a single shared refresh:
///
/// ```text
///   request ──> 401 / 403 INVALID_TOKEN
///                 │
///                 ├─ session already holds a newer token ──> replay with it
///                 ├─ refresh in flight ──> queue, replay when it settles
///                 └─ otherwise ──> lead the refresh
///                                   ├─ ok:   store pair, release queue, replay
///                                   └─ fail: reject queue, clear session
/// ```
///
/// A request is replayed at most once; the refresh call itself is never retried.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::oneshot;

use super::session::AuthSession;
use super::transport::{ApiRequest, ApiResponse, Transport};
use super::{ClientError, RefreshFailure};
use crate::routes::AuthResponse;

type Waiter = oneshot::Sender<Result<String, RefreshFailure>>;

#[derive(Default)]
struct RefreshState {
    refreshing: bool,
    pending: VecDeque<Waiter>,
}

enum Recovery {
    /// A refresh finished after the request was sent; use the stored token.
    Replay(String),
    Wait(oneshot::Receiver<Result<String, RefreshFailure>>),
    Lead(String),
    Fail(RefreshFailure),
}

pub struct RefreshCoordinator {
    transport: Arc<dyn Transport>,
    session: AuthSession,
    state: Mutex<RefreshState>,
}

impl RefreshCoordinator {
    pub fn new(transport: Arc<dyn Transport>, session: AuthSession) -> Self {
        Self {
            transport,
            session,
            state: Mutex::new(RefreshState::default()),
        }
    }

    pub fn session(&self) -> &AuthSession {
        &self.session
    }

    pub fn is_refreshing(&self) -> bool {
        lock(&self.state).refreshing
    }

    /// Send `request` with the current access token, refreshing once on rejection.
    ///
    /// # Errors
    /// * `Rejected` - any non-2xx answer that is not a recoverable token rejection,
    ///   or the replayed request failing again
    /// * `Refresh` - the shared refresh failed; the session has been cleared
    pub async fn send(&self, request: ApiRequest) -> Result<ApiResponse, ClientError> {
        let sent_with = self.session.access_token();
        let response = self.transport.execute(&request, sent_with.as_deref()).await?;

        if !response.is_token_rejection() || request.is_refresh_call() {
            return response.into_result();
        }

        tracing::debug!(path = %request.path, status = response.status, "Access token rejected");
        let token = self.recover(sent_with.as_deref()).await?;

        self.transport
            .execute(&request, Some(&token))
            .await?
            .into_result()
    }

    async fn recover(&self, sent_with: Option<&str>) -> Result<String, ClientError> {
        match self.decide(sent_with) {
            Recovery::Replay(token) => Ok(token),
            Recovery::Wait(rx) => match rx.await {
                Ok(outcome) => Ok(outcome?),
                Err(_) => Err(RefreshFailure::Abandoned.into()),
            },
            Recovery::Lead(refresh_token) => {
                let lease = RefreshLease {
                    state: &self.state,
                    settled: false,
                };
                let outcome = self.refresh(&refresh_token).await;
                if outcome.is_err() {
                    self.session.clear();
                }
                lease.settle(&outcome);
                Ok(outcome?)
            }
            Recovery::Fail(failure) => Err(failure.into()),
        }
    }

    fn decide(&self, sent_with: Option<&str>) -> Recovery {
        let mut state = lock(&self.state);

        if state.refreshing {
            let (tx, rx) = oneshot::channel();
            state.pending.push_back(tx);
            return Recovery::Wait(rx);
        }

        let Some(current) = self.session.snapshot() else {
            tracing::info!("Token rejected with no session; forcing logout");
            self.session.clear();
            return Recovery::Fail(RefreshFailure::NoRefreshToken);
        };

        if sent_with != Some(current.access.as_str()) {
            return Recovery::Replay(current.access);
        }

        state.refreshing = true;
        Recovery::Lead(current.refresh)
    }

    async fn refresh(&self, refresh_token: &str) -> Result<String, RefreshFailure> {
        tracing::info!("Refreshing access token");

        let response = self
            .transport
            .execute(&ApiRequest::refresh(), Some(refresh_token))
            .await
            .map_err(|e| RefreshFailure::Transport(e.to_string()))?;

        if !response.is_success() {
            tracing::warn!(
                status = response.status,
                code = ?response.error_code(),
                "Refresh rejected; forcing logout"
            );
            return Err(RefreshFailure::Rejected {
                status: response.status,
                code: response.error_code().map(str::to_string),
            });
        }

        let pair: AuthResponse = response
            .json()
            .map_err(|e| RefreshFailure::Decode(e.to_string()))?;

        if !self.session.update_tokens(pair.access.clone(), pair.refresh) {
            // Logged out while the refresh was in flight.
            return Err(RefreshFailure::NoRefreshToken);
        }

        tracing::info!(user_id = %pair.principal_id, "Access token refreshed");
        Ok(pair.access)
    }
}

fn lock(state: &Mutex<RefreshState>) -> MutexGuard<'_, RefreshState> {
    state.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Held by the task leading a refresh. Settling (or dropping, if the task is
/// cancelled) clears the flag and releases every queued request in FIFO order.
struct RefreshLease<'a> {
    state: &'a Mutex<RefreshState>,
    settled: bool,
}

impl RefreshLease<'_> {
    fn settle(mut self, outcome: &Result<String, RefreshFailure>) {
        release(self.state, outcome);
        self.settled = true;
    }
}

impl Drop for RefreshLease<'_> {
    fn drop(&mut self) {
        if !self.settled {
            tracing::warn!("Refresh abandoned; releasing queued requests");
            release(self.state, &Err(RefreshFailure::Abandoned));
        }
    }
}

fn release(state: &Mutex<RefreshState>, outcome: &Result<String, RefreshFailure>) {
    let mut state = lock(state);
    state.refreshing = false;
    let released = state.pending.len();
    for waiter in state.pending.drain(..) {
        // A receiver that went away has nothing to replay.
        let _ = waiter.send(outcome.clone());
    }
    if released > 0 {
        tracing::debug!(released, "Released queued requests");
    }
}
