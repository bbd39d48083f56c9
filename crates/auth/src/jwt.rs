//! HS256 token signing and verification.
//!
//! The registered `exp`/`iat` claims are not used; the time window lives in
//! [`JwtClaims`] and is checked by [`validate_claims`] against an explicit `now`,
//! which keeps validation deterministic in tests.

use chrono::{DateTime, Utc};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, errors::ErrorKind};

use crate::claims::{JwtClaims, TokenValidationError, validate_claims};

/// Turns a bearer token into validated claims.
pub trait JwtValidator: Send + Sync {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError>;
}

fn hs256_validation() -> Validation {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.validate_exp = false;
    validation.required_spec_claims.clear();
    validation
}

pub struct Hs256JwtValidator {
    key: DecodingKey,
    validation: Validation,
}

impl Hs256JwtValidator {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: DecodingKey::from_secret(secret.as_ref()),
            validation: hs256_validation(),
        }
    }
}

impl JwtValidator for Hs256JwtValidator {
    fn validate(&self, token: &str, now: DateTime<Utc>) -> Result<JwtClaims, TokenValidationError> {
        let data = jsonwebtoken::decode::<JwtClaims>(token, &self.key, &self.validation).map_err(|e| {
            match e.kind() {
                ErrorKind::InvalidSignature => TokenValidationError::BadSignature,
                _ => TokenValidationError::Malformed(e.to_string()),
            }
        })?;
        validate_claims(&data.claims, now)?;
        Ok(data.claims)
    }
}

pub struct Hs256JwtIssuer {
    key: EncodingKey,
}

impl Hs256JwtIssuer {
    pub fn new(secret: impl AsRef<[u8]>) -> Self {
        Self {
            key: EncodingKey::from_secret(secret.as_ref()),
        }
    }

    pub fn issue(&self, claims: &JwtClaims) -> Result<String, TokenValidationError> {
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), claims, &self.key)
            .map_err(|e| TokenValidationError::Malformed(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{Role, UserId};
    use chrono::Duration;
    use tillpoint_core::TenantId;

    fn claims(now: DateTime<Utc>) -> JwtClaims {
        JwtClaims {
            sub: UserId::new(),
            username: "esi".into(),
            tenant_id: TenantId::new(),
            role: Role::Manager,
            must_change_password: true,
            issued_at: now,
            expires_at: now + Duration::hours(8),
        }
    }

    #[test]
    fn issued_tokens_validate_with_same_secret() {
        let now = Utc::now();
        let c = claims(now);
        let token = Hs256JwtIssuer::new("s3cret").issue(&c).unwrap();
        let back = Hs256JwtValidator::new("s3cret").validate(&token, now).unwrap();
        assert_eq!(back, c);
    }

    #[test]
    fn wrong_secret_is_rejected() {
        let now = Utc::now();
        let token = Hs256JwtIssuer::new("one").issue(&claims(now)).unwrap();
        assert_eq!(
            Hs256JwtValidator::new("two").validate(&token, now),
            Err(TokenValidationError::BadSignature)
        );
    }

    #[test]
    fn expiry_is_checked_against_supplied_clock() {
        let now = Utc::now();
        let token = Hs256JwtIssuer::new("k").issue(&claims(now)).unwrap();
        let later = now + Duration::hours(9);
        assert_eq!(
            Hs256JwtValidator::new("k").validate(&token, later),
            Err(TokenValidationError::Expired)
        );
    }

    #[test]
    fn garbage_is_malformed() {
        let err = Hs256JwtValidator::new("k").validate("abc.def", Utc::now()).unwrap_err();
        assert!(matches!(err, TokenValidationError::Malformed(_)));
    }
}
