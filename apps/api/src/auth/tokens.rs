use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::errors::AppError;

/// Access tokens are short-lived; clients refresh them transparently.
const ACCESS_TTL_MINUTES: i64 = 60;
const REFRESH_TTL_DAYS: i64 = 7;

const TOKEN_TYPE_ACCESS: &str = "access";
const TOKEN_TYPE_REFRESH: &str = "refresh";

#[derive(Debug, Serialize, Deserialize)]
pub struct Claims {
    /// User id.
    pub sub: Uuid,
    pub username: String,
    /// Expiry, seconds since epoch.
    pub exp: i64,
    /// "access" or "refresh". Refresh tokens are not valid bearer credentials.
    pub token_type: String,
}

#[derive(Debug, Serialize)]
pub struct TokenPair {
    pub access: String,
    pub refresh: String,
}

/// Issues a fresh access/refresh pair for a user.
pub fn issue_token_pair(
    secret: &str,
    user_id: Uuid,
    username: &str,
) -> Result<TokenPair, AppError> {
    Ok(TokenPair {
        access: issue_access_token(secret, user_id, username)?,
        refresh: issue_token(
            secret,
            user_id,
            username,
            TOKEN_TYPE_REFRESH,
            Duration::days(REFRESH_TTL_DAYS),
        )?,
    })
}

/// Issues a standalone access token (the refresh exchange).
pub fn issue_access_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
) -> Result<String, AppError> {
    issue_token(
        secret,
        user_id,
        username,
        TOKEN_TYPE_ACCESS,
        Duration::minutes(ACCESS_TTL_MINUTES),
    )
}

fn issue_token(
    secret: &str,
    user_id: Uuid,
    username: &str,
    token_type: &str,
    ttl: Duration,
) -> Result<String, AppError> {
    let claims = Claims {
        sub: user_id,
        username: username.to_string(),
        exp: (Utc::now() + ttl).timestamp(),
        token_type: token_type.to_string(),
    };

    encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!("token signing failed: {e}")))
}

/// Verifies an access token. Rejects refresh tokens presented as bearer
/// credentials, expired tokens and bad signatures alike with `Unauthorized`.
pub fn verify_access_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let claims = verify_token(secret, token)?;
    if claims.token_type != TOKEN_TYPE_ACCESS {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}

/// Verifies a refresh token for the refresh exchange.
pub fn verify_refresh_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    let claims = verify_token(secret, token)?;
    if claims.token_type != TOKEN_TYPE_REFRESH {
        return Err(AppError::Unauthorized);
    }
    Ok(claims)
}

fn verify_token(secret: &str, token: &str) -> Result<Claims, AppError> {
    decode::<Claims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .map(|data| data.claims)
    .map_err(|_| AppError::Unauthorized)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "test-secret";

    #[test]
    fn test_access_token_roundtrip() {
        let user_id = Uuid::new_v4();
        let pair = issue_token_pair(SECRET, user_id, "sara").unwrap();

        let claims = verify_access_token(SECRET, &pair.access).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.username, "sara");
        assert_eq!(claims.token_type, "access");
    }

    #[test]
    fn test_refresh_token_is_not_a_bearer_credential() {
        let pair = issue_token_pair(SECRET, Uuid::new_v4(), "sara").unwrap();
        assert!(verify_access_token(SECRET, &pair.refresh).is_err());
    }

    #[test]
    fn test_access_token_is_not_a_refresh_credential() {
        let pair = issue_token_pair(SECRET, Uuid::new_v4(), "sara").unwrap();
        assert!(verify_refresh_token(SECRET, &pair.access).is_err());
    }

    #[test]
    fn test_wrong_secret_rejected() {
        let pair = issue_token_pair(SECRET, Uuid::new_v4(), "sara").unwrap();
        assert!(verify_access_token("other-secret", &pair.access).is_err());
    }

    #[test]
    fn test_garbage_token_rejected() {
        assert!(verify_access_token(SECRET, "not.a.jwt").is_err());
    }
}
