//! Authentication state for the client.
//!
//! This module provides:
//! - `token`: JWT payload decoding and expiry checks (no signature verification)
//! - `SessionStore`: the injected holder of the current session, with an
//!   in-memory and a file-backed implementation
//!
//! Tokens are never refreshed; an expired token means logging in again.

pub mod session;
pub mod token;

pub use session::{FileSessionStore, MemorySessionStore, SessionData, SessionStore};
pub use token::{decode_claims, is_expired, is_expired_at, Claims, TokenError};
