//! Bearer token inspection.
//!
//! Tokens are compact JWTs (`header.payload.signature`). Only the payload is
//! decoded, to read the `exp` claim; the signature is the server's business and
//! is never checked here.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use thiserror::Error;

/// Safety margin applied before the `exp` claim.
/// Keeps a token from expiring while its request is in flight.
pub const DEFAULT_EXPIRY_BUFFER_MS: i64 = 5_000;

#[derive(Error, Debug)]
pub enum TokenError {
    #[error("Token is empty")]
    Empty,

    #[error("Malformed token - expected 3 segments, got {0}")]
    Malformed(usize),

    #[error("Token payload is not valid base64url: {0}")]
    Base64(#[from] base64::DecodeError),

    #[error("Token payload is not a valid claims object: {0}")]
    Claims(#[from] serde_json::Error),
}

/// The subset of claims the client cares about.
#[derive(Debug, Clone, Deserialize)]
pub struct Claims {
    /// Expiry, seconds since the Unix epoch. Some issuers emit fractional seconds.
    pub exp: f64,
}

impl Claims {
    /// Expiry as milliseconds since the epoch, saturating at the `i64` bounds
    pub fn expires_at_ms(&self) -> i64 {
        (self.exp * 1000.0) as i64
    }

    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        DateTime::from_timestamp_millis(self.expires_at_ms())
    }
}

/// Decode the payload segment of a token without verifying its signature.
pub fn decode_claims(token: &str) -> Result<Claims, TokenError> {
    let token = token.trim();
    if token.is_empty() {
        return Err(TokenError::Empty);
    }

    let segments: Vec<&str> = token.split('.').collect();
    if segments.len() != 3 {
        return Err(TokenError::Malformed(segments.len()));
    }

    // Some issuers keep the padding even though JWTs shouldn't carry it
    let payload = segments[1].trim_end_matches('=');
    let bytes = URL_SAFE_NO_PAD.decode(payload)?;
    Ok(serde_json::from_slice(&bytes)?)
}

/// Check a token against the current time with the default buffer.
///
/// Missing, empty, malformed or undecodable tokens count as expired.
pub fn is_expired(token: Option<&str>) -> bool {
    is_expired_at(
        token,
        Utc::now(),
        Duration::milliseconds(DEFAULT_EXPIRY_BUFFER_MS),
    )
}

/// Expired when `exp * 1000 <= now + buffer`.
pub fn is_expired_at(token: Option<&str>, now: DateTime<Utc>, buffer: Duration) -> bool {
    let Some(token) = token else {
        return true;
    };

    match decode_claims(token) {
        Ok(claims) => {
            claims.expires_at_ms() <= now.timestamp_millis().saturating_add(buffer.num_milliseconds())
        }
        Err(e) => {
            tracing::debug!(error = %e, "Treating undecodable token as expired");
            true
        }
    }
}

/// Time left before the token crosses the buffer threshold, if any.
pub fn time_until_expiry(token: &str, now: DateTime<Utc>, buffer: Duration) -> Option<Duration> {
    let claims = decode_claims(token).ok()?;
    let left_ms = claims.expires_at_ms().checked_sub(now.timestamp_millis())?;
    let remaining = Duration::try_milliseconds(left_ms)?.checked_sub(&buffer)?;
    (remaining > Duration::zero()).then_some(remaining)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::test_support::{token_expiring_in, token_with_payload};

    fn buffer() -> Duration {
        Duration::milliseconds(DEFAULT_EXPIRY_BUFFER_MS)
    }

    #[test]
    fn test_missing_and_garbage_tokens_are_expired() {
        assert!(is_expired(None));
        assert!(is_expired(Some("")));
        assert!(is_expired(Some("   ")));
        assert!(is_expired(Some("not-a-valid-token")));
        assert!(is_expired(Some("a.b")));
        assert!(is_expired(Some("a.!!!.c")));
    }

    #[test]
    fn test_payload_without_exp_is_expired() {
        let token = token_with_payload(r#"{"sub":"42"}"#);
        assert!(is_expired(Some(&token)));
    }

    #[test]
    fn test_payload_that_is_not_json_is_expired() {
        let token = token_with_payload("definitely not json");
        assert!(matches!(decode_claims(&token), Err(TokenError::Claims(_))));
        assert!(is_expired(Some(&token)));
    }

    #[test]
    fn test_future_token_is_valid() {
        assert!(!is_expired(Some(&token_expiring_in(60))));
        assert!(!is_expired(Some(&token_expiring_in(3600))));
    }

    #[test]
    fn test_past_token_is_expired() {
        assert!(is_expired(Some(&token_expiring_in(-10))));
        assert!(is_expired(Some(&token_expiring_in(0))));
    }

    #[test]
    fn test_buffer_boundary() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let at = |secs: i64| {
            token_with_payload(&format!(r#"{{"exp":{}}}"#, now.timestamp() + secs))
        };

        assert!(is_expired_at(Some(&at(4)), now, buffer()));
        assert!(is_expired_at(Some(&at(5)), now, buffer()));
        assert!(!is_expired_at(Some(&at(6)), now, buffer()));
    }

    #[test]
    fn test_fractional_exp_is_accepted() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = token_with_payload(r#"{"exp":1700000100.5}"#);
        let claims = decode_claims(&token).unwrap();
        assert_eq!(claims.expires_at_ms(), 1_700_000_100_500);
        assert!(!is_expired_at(Some(&token), now, buffer()));
    }

    #[test]
    fn test_padded_payload_is_accepted() {
        let token = token_expiring_in(600);
        let mut segments: Vec<String> = token.split('.').map(str::to_string).collect();
        segments[1].push_str("==");
        assert!(decode_claims(&segments.join(".")).is_ok());
    }

    #[test]
    fn test_time_until_expiry() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let token = token_with_payload(r#"{"exp":1700000065}"#);
        assert_eq!(
            time_until_expiry(&token, now, buffer()),
            Some(Duration::seconds(60))
        );

        let stale = token_with_payload(r#"{"exp":1699999990}"#);
        assert_eq!(time_until_expiry(&stale, now, buffer()), None);
    }

    #[test]
    fn test_extreme_exp_values_do_not_overflow() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();

        let ancient = token_with_payload(r#"{"exp":-1e300}"#);
        assert!(is_expired_at(Some(&ancient), now, buffer()));
        assert_eq!(time_until_expiry(&ancient, now, buffer()), None);

        let distant = token_with_payload(r#"{"exp":1e300}"#);
        assert!(!is_expired_at(Some(&distant), now, buffer()));
        assert!(time_until_expiry(&distant, now, buffer()).is_some());
    }

    #[test]
    fn test_huge_buffer_saturates() {
        let now = DateTime::from_timestamp(1_700_000_000, 0).unwrap();
        let huge = Duration::milliseconds(i64::MAX);

        let token = token_with_payload(r#"{"exp":1700000065}"#);
        assert!(is_expired_at(Some(&token), now, huge));
        assert_eq!(time_until_expiry(&token, now, huge), None);

        let distant = token_with_payload(r#"{"exp":1e300}"#);
        assert!(is_expired_at(Some(&distant), now, huge));
        assert_eq!(time_until_expiry(&distant, now, huge), None);
    }
}
