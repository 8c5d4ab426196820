use chrono::Duration;
use chrono::Utc;
use hmac::{Hmac, Mac};
use jwt::SignWithKey;
use jwt::VerifyWithKey;
use serde::Deserialize;
use serde::Serialize;
use sha2::Sha256;

use crate::database::error::ApiError;
use crate::database::schema::{User, Uuid};

#[derive(Debug, Serialize, Deserialize, Clone)]
pub struct JwtSessionData {
    pub user_id: Uuid,
    pub email: String,
    iat: i64,
    exp: i64,
}

impl JwtSessionData {
    pub fn new(id: Uuid, email: String, ttl: Duration) -> Self {
        let now = Utc::now();
        let iat = now.timestamp();
        let exp = (now + ttl).timestamp();

        Self {
            user_id: id,
            email,
            iat,
            exp,
        }
    }
}

/// The authenticated principal of a request.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq)]
pub struct SessionData {
    pub user_id: Uuid,
    pub email: String,
}

impl From<JwtSessionData> for SessionData {
    fn from(value: JwtSessionData) -> Self {
        SessionData {
            user_id: value.user_id,
            email: value.email,
        }
    }
}

/// Signs and verifies session tokens (HS256).
#[derive(Clone)]
pub struct SessionKey {
    key: Hmac<Sha256>,
    ttl: Duration,
}

impl SessionKey {
    pub fn new(secret: &str, ttl_hours: i64) -> Result<Self, ApiError> {
        let key: Hmac<Sha256> = Hmac::new_from_slice(secret.as_bytes())
            .map_err(|e| ApiError::Internal(format!("invalid session key: {e}")))?;

        Ok(Self {
            key,
            ttl: Duration::hours(ttl_hours),
        })
    }

    pub fn generate_session(&self, user: &User) -> Result<String, ApiError> {
        let claims = JwtSessionData::new(user.id, user.email.to_owned(), self.ttl);

        self.sign(&claims)
    }

    fn sign(&self, claims: &JwtSessionData) -> Result<String, ApiError> {
        claims
            .sign_with_key(&self.key)
            .map_err(|e| ApiError::Internal(format!("failed to sign session: {e}")))
    }

    pub fn verify_session(&self, token: &str) -> Result<JwtSessionData, ApiError> {
        let session: JwtSessionData = token
            .verify_with_key(&self.key)
            .map_err(|_| ApiError::Unauthenticated("Invalid token."))?;

        if session.exp < Utc::now().timestamp() {
            return Err(ApiError::Unauthenticated("Token expired."));
        }
        Ok(session)
    }
}
