//! Bearer token verification (HS256).
//!
//! The external identity service signs tokens with a shared secret; this
//! module verifies the signature and converts the wire claims into
//! [`JwtClaims`], then runs the deterministic window checks from
//! [`crate::claims`].

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};
use crate::{PrincipalId, Role};

#[derive(Debug, Error)]
pub enum JwtError {
    #[error("token decode failed: {0}")]
    Decode(String),

    #[error("invalid subject claim: {0}")]
    Subject(String),

    #[error(transparent)]
    Claims(#[from] TokenValidationError),
}

/// Token verification seam consumed by the HTTP middleware.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError>;
}

/// On-the-wire claim layout (standard `sub`/`iat`/`exp` plus a roles array).
#[derive(Debug, Serialize, Deserialize)]
struct WireClaims {
    sub: String,
    #[serde(default)]
    roles: Vec<String>,
    iat: i64,
    exp: i64,
}

/// HS256 validator over a shared secret.
pub struct Hs256JwtValidator {
    key: DecodingKey,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        // Window checks are done deterministically below against `now`.
        validation.validate_exp = false;
        validation.required_spec_claims.clear();

        let decoded = jsonwebtoken::decode::<WireClaims>(token, &self.key, &validation)
            .map_err(|e| JwtError::Decode(e.to_string()))?;

        let wire = decoded.claims;
        let sub: PrincipalId = wire
            .sub
            .parse()
            .map_err(|e: uuid::Error| JwtError::Subject(e.to_string()))?;

        let issued_at = DateTime::<Utc>::from_timestamp(wire.iat, 0)
            .ok_or_else(|| JwtError::Decode("iat out of range".to_string()))?;
        let expires_at = DateTime::<Utc>::from_timestamp(wire.exp, 0)
            .ok_or_else(|| JwtError::Decode("exp out of range".to_string()))?;

        let claims = JwtClaims {
            sub,
            roles: wire.roles.into_iter().map(Role::new).collect(),
            issued_at,
            expires_at,
        };

        validate_claims(&claims, now)?;
        Ok(claims)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use jsonwebtoken::{EncodingKey, Header};

    const SECRET: &[u8] = b"test-secret";

    fn mint(sub: String, roles: Vec<String>, iat: i64, exp: i64) -> String {
        let wire = WireClaims { sub, roles, iat, exp };
        jsonwebtoken::encode(&Header::default(), &wire, &EncodingKey::from_secret(SECRET)).unwrap()
    }

    #[test]
    fn valid_token_round_trips() {
        let now = Utc::now();
        let sub = PrincipalId::new();
        let token = mint(
            sub.to_string(),
            vec!["admin".to_string()],
            now.timestamp() - 60,
            now.timestamp() + 3600,
        );

        let validator = Hs256JwtValidator::new(SECRET);
        let claims = validator.validate(&token, now).unwrap();
        assert_eq!(claims.sub, sub);
        assert_eq!(claims.roles, vec![Role::new("admin")]);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = mint(
            PrincipalId::new().to_string(),
            vec![],
            now.timestamp(),
            now.timestamp() + 3600,
        );

        let validator = Hs256JwtValidator::new(b"other-secret");
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::Decode(_))
        ));
    }

    #[test]
    fn expired_token_is_rejected() {
        let now = Utc::now();
        let token = mint(
            PrincipalId::new().to_string(),
            vec![],
            now.timestamp() - 7200,
            now.timestamp() - 3600,
        );

        let validator = Hs256JwtValidator::new(SECRET);
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::Claims(TokenValidationError::Expired))
        ));
    }

    #[test]
    fn garbage_subject_is_rejected() {
        let now = Utc::now();
        let token = mint(
            "not-a-uuid".to_string(),
            vec![],
            now.timestamp(),
            now.timestamp() + 3600,
        );

        let validator = Hs256JwtValidator::new(SECRET);
        assert!(matches!(
            validator.validate(&token, now),
            Err(JwtError::Subject(_))
        ));
    }
}
