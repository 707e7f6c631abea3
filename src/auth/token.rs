//! JWT session token management
//!
//! Handles creation and validation of the dashboard session token.

use crate::error::AppError;
use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

/// Subject claim for all dashboard sessions. There are no per-user
/// accounts; a valid token simply means the shared secret was presented.
const DASHBOARD_SUBJECT: &str = "dashboard";

/// JWT claims
#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct Claims {
    /// Subject, always `dashboard`
    pub sub: String,
    /// Expiration time (Unix timestamp)
    pub exp: i64,
    /// Issued at (Unix timestamp)
    pub iat: i64,
}

/// Create a session token valid for `session_hours`
pub fn create_session_token(secret: &str, session_hours: i64) -> Result<String, AppError> {
    let now = Utc::now();
    let claims = Claims {
        sub: DASHBOARD_SUBJECT.to_string(),
        exp: (now + Duration::hours(session_hours)).timestamp(),
        iat: now.timestamp(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(format!("Failed to create session token: {}", e)))
}

/// Decode and validate a session token
pub fn decode_session_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let data = decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map_err(|_| AppError::Unauthorized("Invalid or expired session".to_string()))?;

    if data.claims.sub != DASHBOARD_SUBJECT {
        return Err(AppError::Unauthorized("Invalid session subject".to_string()));
    }

    Ok(data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn token_round_trip() {
        let token = create_session_token("test-secret", 1).unwrap();
        let claims = decode_session_token("test-secret", &token).unwrap();
        assert_eq!(claims.sub, DASHBOARD_SUBJECT);
        assert!(claims.exp > claims.iat);
    }

    #[test]
    fn wrong_secret_rejected() {
        let token = create_session_token("test-secret", 1).unwrap();
        assert!(decode_session_token("other-secret", &token).is_err());
    }

    #[test]
    fn garbage_token_rejected() {
        assert!(decode_session_token("test-secret", "not.a.jwt").is_err());
    }
}
