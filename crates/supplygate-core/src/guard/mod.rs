//! Session guard.
//!
//! Keeps expired credentials off the wire and turns credential rejections into
//! a logout. It plugs into the shared `ApiClient` as an `Interceptor`:
//!
//! - outgoing: auth endpoints pass untouched; an expired stored token ends the
//!   session and rejects the request before it is sent; a valid one is attached
//!   as `Authorization: Bearer <token>` unless the caller set that header.
//! - incoming: a 200 whose body carries `statusCode >= 400` becomes an error;
//!   401 outside the auth pages ends the session; 403 sends the user to the
//!   unauthorized route but keeps the session.
//!
//! Expiry is only noticed lazily, at startup and when a request goes out.

pub mod config;
pub mod navigation;

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use anyhow::Result;
use parking_lot::Mutex;
use reqwest::header::{self, HeaderValue};
use serde_json::Value;
use tokio::runtime::Handle;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::error::message_from_json;
use crate::api::{ApiClient, ApiError, ApiRequest, ApiResponse, Interceptor, Transport};
use crate::auth::{token, SessionData, SessionStore};

pub use config::{GuardConfig, GuardMessages};
pub use navigation::{LogNotifier, MemoryNavigator, NavigationEvent, Navigator, NoticeLevel, Notifier};

/// Message used when a soft error body has no `message` of its own
const DEFAULT_APPLICATION_ERROR: &str = "Request failed";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    NoSession,
    ValidSession,
    ExpiredSession { pending_redirect: bool },
}

#[derive(Default)]
struct RedirectState {
    pending: AtomicBool,
    task: Mutex<Option<JoinHandle<()>>>,
}

/// Clone is cheap - all state is shared.
#[derive(Clone)]
pub struct SessionGuard {
    store: Arc<dyn SessionStore>,
    navigator: Arc<dyn Navigator>,
    notifier: Arc<dyn Notifier>,
    config: Arc<GuardConfig>,
    redirect: Arc<RedirectState>,
}

impl SessionGuard {
    pub fn new(
        store: Arc<dyn SessionStore>,
        navigator: Arc<dyn Navigator>,
        notifier: Arc<dyn Notifier>,
        config: GuardConfig,
    ) -> Self {
        Self {
            store,
            navigator,
            notifier,
            config: Arc::new(config),
            redirect: Arc::new(RedirectState::default()),
        }
    }

    pub fn config(&self) -> &GuardConfig {
        &self.config
    }

    pub fn store(&self) -> &Arc<dyn SessionStore> {
        &self.store
    }

    /// Expiry check using this guard's buffer
    pub fn is_expired(&self, token: Option<&str>) -> bool {
        token::is_expired_at(token, chrono::Utc::now(), self.config.expiry_buffer())
    }

    pub fn state(&self) -> SessionState {
        if self.redirect.pending.load(Ordering::SeqCst) {
            return SessionState::ExpiredSession {
                pending_redirect: true,
            };
        }

        match self.store.token() {
            None => SessionState::NoSession,
            Some(token) if self.is_expired(Some(&token)) => SessionState::ExpiredSession {
                pending_redirect: false,
            },
            Some(_) => SessionState::ValidSession,
        }
    }

    pub fn redirect_pending(&self) -> bool {
        self.redirect.pending.load(Ordering::SeqCst)
    }

    /// Record a freshly issued session (login or OTP verification)
    pub fn establish(&self, data: SessionData) -> Result<()> {
        info!(
            role = data.role.as_deref().unwrap_or("-"),
            company_id = data.company_id.as_deref().unwrap_or("-"),
            "Session established"
        );
        self.store.set_session(data)
    }

    /// User-initiated logout. No notice, no redirect.
    pub fn logout(&self) -> Result<()> {
        info!("Logged out");
        self.store.clear_session()
    }

    /// Clear the session, tell the user, and hard-reset to the login route
    /// after the configured delay.
    ///
    /// Safe to call from several requests at once: the store ends up empty
    /// and only the first caller notifies and schedules the redirect.
    pub fn terminate_session(&self) {
        self.end_session(&self.config.messages.session_expired);
    }

    /// Startup check: an expired stored token is terminated before anything
    /// protected runs. No token is a valid logged-out state.
    pub fn validate_on_init(&self) -> SessionState {
        match self.store.token() {
            None => debug!("No stored session at startup"),
            Some(token) if self.is_expired(Some(&token)) => {
                info!("Stored session expired, terminating");
                self.terminate_session();
            }
            Some(_) => debug!("Stored session is valid"),
        }
        self.state()
    }

    /// Register this guard on the shared client
    pub fn install_interceptors<T: Transport>(&self, client: &mut ApiClient<T>) {
        client.add_interceptor(Arc::new(self.clone()));
    }

    /// Wait for a scheduled redirect to fire.
    ///
    /// For hosts about to exit; the guard itself never waits on it.
    pub async fn settle(&self) {
        let task = self.redirect.task.lock().take();
        if let Some(task) = task {
            if let Err(e) = task.await {
                warn!(error = %e, "Redirect task failed");
            }
        }
    }

    fn end_session(&self, message: &str) {
        if let Err(e) = self.store.clear_session() {
            warn!(error = %e, "Failed to clear stored session");
        }

        if self.redirect.pending.swap(true, Ordering::SeqCst) {
            debug!("Session termination already in progress");
            return;
        }

        info!(login_path = %self.config.login_path, "Session terminated");
        self.notifier.notify(NoticeLevel::Error, message);
        self.schedule_redirect();
    }

    fn schedule_redirect(&self) {
        let navigator = Arc::clone(&self.navigator);
        let redirect = Arc::clone(&self.redirect);
        let login_path = self.config.login_path.clone();
        let delay = self.config.redirect_delay();

        let fire = move || {
            navigator.hard_reset(&login_path);
            redirect.pending.store(false, Ordering::SeqCst);
        };

        match Handle::try_current() {
            Ok(handle) => {
                let task = handle.spawn(async move {
                    tokio::time::sleep(delay).await;
                    fire();
                });
                *self.redirect.task.lock() = Some(task);
            }
            Err(_) => {
                debug!("No async runtime, redirecting immediately");
                fire();
            }
        }
    }

    /// Apply the 401/403 policy; the error is always handed back to the caller
    fn handle_failure(&self, error: ApiError) -> ApiError {
        match error.status() {
            Some(401) => {
                let route = self.navigator.current_path();
                if self.config.is_auth_page(&route) {
                    debug!(route = %route, "401 on auth page, leaving it to the form");
                } else {
                    warn!(route = %route, "401 received, session no longer valid");
                    self.end_session(&self.config.messages.unauthorized);
                }
            }
            Some(403) => {
                warn!("403 received, redirecting to unauthorized page");
                self.notifier
                    .notify(NoticeLevel::Error, &self.config.messages.forbidden);
                self.navigator.navigate(&self.config.unauthorized_path);
            }
            _ => {}
        }
        error
    }
}

/// A soft error hidden in a successful response: `{ "statusCode": 404, "message": ... }`
fn embedded_error(response: &ApiResponse) -> Option<ApiError> {
    let body = response.json_value()?;
    let status = match body.get("statusCode")? {
        Value::Number(n) => n.as_f64()?,
        Value::String(s) => s.trim().parse::<f64>().ok()?,
        _ => return None,
    };
    // NaN fails this too
    if !(status >= 400.0) {
        return None;
    }

    // Float to int casts saturate, so out-of-range codes land on u16::MAX
    Some(ApiError::Application {
        status: status as u16,
        message: message_from_json(&body).unwrap_or_else(|| DEFAULT_APPLICATION_ERROR.to_string()),
    })
}

impl Interceptor for SessionGuard {
    fn on_request(&self, request: &mut ApiRequest) -> Result<(), ApiError> {
        if self.config.is_auth_endpoint(&request.path) {
            debug!(path = %request.path, "Auth endpoint, not guarded");
            return Ok(());
        }

        match self.store.token() {
            Some(token) if self.is_expired(Some(&token)) => {
                warn!(path = %request.path, "Stored token expired, request blocked");
                self.terminate_session();
                Err(ApiError::SessionExpired)
            }
            Some(token) => {
                if !request.has_authorization() {
                    let value = HeaderValue::from_str(&format!("Bearer {}", token)).map_err(|e| {
                        ApiError::InvalidRequest(format!("Stored token is not a valid header: {}", e))
                    })?;
                    request.headers.insert(header::AUTHORIZATION, value);
                }
                Ok(())
            }
            None if self.config.require_session => {
                debug!(path = %request.path, "No session, request blocked");
                Err(ApiError::NoSession)
            }
            None => Ok(()),
        }
    }

    fn on_response(&self, response: ApiResponse) -> Result<ApiResponse, ApiError> {
        match embedded_error(&response) {
            Some(error) => {
                debug!(status = ?error.status(), "Soft error in successful response");
                Err(self.handle_failure(error))
            }
            None => Ok(response),
        }
    }

    fn on_error(&self, error: ApiError) -> ApiError {
        self.handle_failure(error)
    }
}

// ============================================================================
// Tests
// ============================================================================
