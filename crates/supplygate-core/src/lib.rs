//! Core library for supplygate.
//!
//! Client-side session handling for the supply-chain backend: bearer token
//! expiry checks, the shared API client, and the session guard that sits in
//! front of every request.
//!
//! ```no_run
//! use std::sync::Arc;
//! use supplygate_core::api::ApiClient;
//! use supplygate_core::auth::MemorySessionStore;
//! use supplygate_core::guard::{GuardConfig, LogNotifier, MemoryNavigator, SessionGuard};
//!
//! # async fn run() -> anyhow::Result<()> {
//! let guard = SessionGuard::new(
//!     Arc::new(MemorySessionStore::new()),
//!     Arc::new(MemoryNavigator::new("/homepage")),
//!     Arc::new(LogNotifier),
//!     GuardConfig::default(),
//! );
//! guard.validate_on_init();
//!
//! let mut client = ApiClient::new("https://scm.example.com/api")?;
//! guard.install_interceptors(&mut client);
//! let items: serde_json::Value = client.get("/inventory/items").await?;
//! # Ok(())
//! # }
//! ```

pub mod api;
pub mod auth;
pub mod config;
pub mod guard;

pub use api::{ApiClient, ApiError};
pub use auth::{SessionData, SessionStore};
pub use config::Config;
pub use guard::{SessionGuard, SessionState};
