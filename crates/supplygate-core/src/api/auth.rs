//! Authentication endpoints.
//!
//! These all live under `/auth/`, which the session guard lets through
//! untouched: they run before there is a token to attach.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::{debug, info};

use crate::auth::SessionData;

use super::client::{ApiClient, ApiRequest};
use super::transport::Transport;
use super::ApiError;

#[derive(Serialize)]
struct Credentials<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Registration {
    pub email: String,
    pub password: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub company_name: Option<String>,
}

/// Result of a login attempt
#[derive(Debug, Clone, PartialEq)]
pub enum LoginOutcome {
    /// Credentials accepted and a session issued
    Authenticated(SessionData),
    /// Credentials accepted, a one-time code was sent and must be verified
    OtpRequired,
}

/// Session payload as issued by the backend.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SessionPayload {
    #[serde(alias = "accessToken")]
    token: String,
    #[serde(default)]
    role: Option<String>,
    #[serde(default, deserialize_with = "id_as_string")]
    company_id: Option<String>,
    #[serde(default, deserialize_with = "id_as_string")]
    employee_id: Option<String>,
    #[serde(default)]
    employee_name: Option<String>,
}

impl From<SessionPayload> for SessionData {
    fn from(payload: SessionPayload) -> Self {
        let mut data = SessionData::new(payload.token);
        data.role = payload.role;
        data.company_id = payload.company_id;
        data.employee_id = payload.employee_id;
        data.employee_name = payload.employee_name;
        data
    }
}

/// Ids come back as numbers from some endpoints and strings from others
fn id_as_string<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match Option::<Value>::deserialize(deserializer)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        _ => None,
    })
}

/// Unwrap an optional `{ "data": ... }` envelope
fn unwrap_envelope(body: Value) -> Value {
    match body {
        Value::Object(mut map) if map.get("data").is_some_and(Value::is_object) => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    }
}

/// Parse a session out of an auth response body, if it carries one
pub fn parse_session(body: Value) -> Result<Option<SessionData>, ApiError> {
    let body = unwrap_envelope(body);
    if body.get("token").is_none() && body.get("accessToken").is_none() {
        return Ok(None);
    }

    let payload: SessionPayload = serde_json::from_value(body)
        .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse session: {}", e)))?;
    Ok(Some(payload.into()))
}

impl<T: Transport> ApiClient<T> {
    /// Log in with email and password
    pub async fn login(&self, email: &str, password: &str) -> Result<LoginOutcome, ApiError> {
        let body: Value = self
            .post("/auth/login", &Credentials { email, password })
            .await?;

        match parse_session(body)? {
            Some(session) => {
                info!(email = email, "Login succeeded");
                Ok(LoginOutcome::Authenticated(session))
            }
            None => {
                debug!(email = email, "Login requires OTP verification");
                Ok(LoginOutcome::OtpRequired)
            }
        }
    }

    /// Exchange a one-time code for a session
    pub async fn verify_otp(&self, email: &str, otp: &str) -> Result<SessionData, ApiError> {
        let body: Value = self
            .post(
                "/auth/verify-otp",
                &serde_json::json!({ "email": email, "otp": otp }),
            )
            .await?;

        parse_session(body)?.ok_or_else(|| {
            ApiError::InvalidResponse("OTP verification did not return a token".to_string())
        })
    }

    pub async fn register(&self, registration: &Registration) -> Result<Value, ApiError> {
        self.post("/auth/register", registration).await
    }

    /// Ask the backend to send a password-reset code
    pub async fn forgot_password(&self, email: &str) -> Result<(), ApiError> {
        self.send(
            ApiRequest::post("/auth/forgot-password")
                .with_json(&serde_json::json!({ "email": email }))?,
        )
        .await?;
        Ok(())
    }

    pub async fn reset_password(
        &self,
        email: &str,
        otp: &str,
        new_password: &str,
    ) -> Result<(), ApiError> {
        self.send(ApiRequest::post("/auth/reset-password").with_json(&serde_json::json!({
            "email": email,
            "otp": otp,
            "newPassword": new_password,
        }))?)
        .await?;
        Ok(())
    }
}
