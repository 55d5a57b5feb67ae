// Tokens carry only the user id; roles are loaded from the stored user per request.
use chrono::{Duration, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

use crate::error::{ErrorMessage, HttpError};

#[derive(Debug, Serialize, Deserialize)]
pub struct TokenClaims {
    // sub => user id, iat => issued at, exp => expiration
    pub sub: String,
    pub iat: usize,
    pub exp: usize,
}

pub fn create_token(
    user_id: i64,
    secret: &[u8],
    expires_in_seconds: i64,
) -> Result<String, jsonwebtoken::errors::Error> {
    if user_id <= 0 {
        return Err(jsonwebtoken::errors::ErrorKind::InvalidSubject.into());
    }

    let now = Utc::now();
    let iat = now.timestamp() as usize;
    let exp = (now + Duration::seconds(expires_in_seconds)).timestamp() as usize;
    let claims = TokenClaims {
        sub: user_id.to_string(),
        iat,
        exp,
    };

    encode(&Header::default(), &claims, &EncodingKey::from_secret(secret))
}

/// Verify signature and expiry, then return the user id from `sub`
pub fn decode_token<T: Into<String>>(token: T, secret: &[u8]) -> Result<i64, HttpError> {
    let decoded = decode::<TokenClaims>(
        &token.into(),
        &DecodingKey::from_secret(secret),
        &Validation::new(Algorithm::HS256),
    );

    decoded
        .ok()
        .and_then(|token| token.claims.sub.parse::<i64>().ok())
        .ok_or_else(|| HttpError::unauthorized(ErrorMessage::InvalidToken.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::StatusCode;

    const SECRET: &[u8] = b"test-secret";

    #[test]
    fn token_round_trips_the_user_id() {
        let token = create_token(42, SECRET, 3600).unwrap();
        assert_eq!(decode_token(token, SECRET).unwrap(), 42);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let token = create_token(42, SECRET, 3600).unwrap();
        let err = decode_token(token, b"other-secret").unwrap_err();
        assert_eq!(err.status, StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn expired_token_is_rejected() {
        // past the default 60 second leeway
        let token = create_token(42, SECRET, -3600).unwrap();
        assert!(decode_token(token, SECRET).is_err());
    }

    #[test]
    fn garbage_and_bad_subjects_are_rejected() {
        assert!(decode_token("not.a.jwt", SECRET).is_err());
        assert!(create_token(0, SECRET, 3600).is_err());
    }
}
