//! REST API client module for the supply-chain backend.
//!
//! This module provides the `ApiClient` that every screen uses to reach the
//! backend, the `Interceptor` hook the session guard plugs into, and the
//! authentication endpoints that precede having a token.
//!
//! The API uses JWT bearer token authentication obtained through the
//! `/auth/login` and `/auth/verify-otp` endpoints.

pub mod auth;
pub mod client;
pub mod error;
pub mod transport;

pub use auth::{LoginOutcome, Registration};
pub use client::{ApiClient, ApiRequest, ApiResponse, Interceptor};
pub use error::ApiError;
pub use transport::{ReqwestTransport, Transport};
