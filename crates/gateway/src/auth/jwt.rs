//! Server-issued JWT: a thin wrapper around `jsonwebtoken`, HS256, claims
//! per §4.6 — `sub`, `identity_type`, optional `tv` (token version), fixed
//! `aud`, 2 h expiry.

use ecto_domain::entities::IdentityType;
use ecto_domain::{EctoError, Result};
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

pub const AUDIENCE: &str = "ecto-server";
const EXPIRY_SECONDS: i64 = 2 * 60 * 60;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Uuid,
    pub identity_type: IdentityType,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tv: Option<i32>,
    pub aud: String,
    pub exp: i64,
}

pub fn encode(secret: &str, user_id: Uuid, identity_type: IdentityType, token_version: Option<i32>) -> Result<String> {
    let claims = Claims {
        sub: user_id,
        identity_type,
        tv: token_version,
        aud: AUDIENCE.to_string(),
        exp: (chrono::Utc::now().timestamp()) + EXPIRY_SECONDS,
    };
    jsonwebtoken::encode(&Header::default(), &claims, &EncodingKey::from_secret(secret.as_bytes()))
        .map_err(|e| EctoError::Internal(format!("jwt encode: {e}")))
}

pub fn decode(secret: &str, token: &str) -> Result<Claims> {
    let mut validation = Validation::default();
    validation.set_audience(&[AUDIENCE]);
    jsonwebtoken::decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| EctoError::Auth(format!("invalid token: {e}")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_claims() {
        let user_id = Uuid::now_v7();
        let token = encode("s3cret", user_id, IdentityType::Local, Some(4)).unwrap();
        let claims = decode("s3cret", &token).unwrap();
        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.tv, Some(4));
        assert_eq!(claims.aud, AUDIENCE);
        assert!(matches!(claims.identity_type, IdentityType::Local));
    }

    #[test]
    fn rejects_wrong_secret() {
        let token = encode("s3cret", Uuid::now_v7(), IdentityType::Global, None).unwrap();
        assert!(decode("wrong-secret", &token).is_err());
    }

    #[test]
    fn rejects_garbage_token() {
        assert!(decode("s3cret", "not-a-jwt").is_err());
    }
}
