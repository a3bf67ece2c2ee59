//! Session tokens for verified identities

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::common::PhoneNumber;
use crate::domains::auth::models::IdentityId;

/// Default session lifetime
pub const DEFAULT_SESSION_TTL_HOURS: i64 = 24;

#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    #[error("session token rejected: {0}")]
    Rejected(#[from] jsonwebtoken::errors::Error),

    #[error("session token carries an invalid phone number")]
    InvalidPhone,

    /// The subject is not the id derived from the token's phone number
    #[error("session token subject does not match its phone number")]
    SubjectMismatch,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    sub: String,
    phone_number: String,
    exp: i64,
    iat: i64,
    iss: String,
    jti: String,
}

/// What a valid session token vouches for
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerifiedSession {
    pub identity_id: IdentityId,
    pub phone_number: PhoneNumber,
}

/// Issues and checks session tokens for verified phone numbers
#[derive(Clone)]
pub struct JwtService {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    ttl: Duration,
}

impl JwtService {
    pub fn new(secret: &str, issuer: String) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            issuer,
            ttl: Duration::hours(DEFAULT_SESSION_TTL_HOURS),
        }
    }

    pub fn with_ttl(mut self, ttl: Duration) -> Self {
        self.ttl = ttl;
        self
    }

    /// Issue a token for an identity whose number was just verified
    pub fn issue(&self, identity_id: &IdentityId, phone: &PhoneNumber) -> Result<String, TokenError> {
        let now = Utc::now();
        let claims = SessionClaims {
            sub: identity_id.to_string(),
            phone_number: phone.to_string(),
            exp: (now + self.ttl).timestamp(),
            iat: now.timestamp(),
            iss: self.issuer.clone(),
            jti: Uuid::new_v4().to_string(),
        };

        Ok(encode(&Header::default(), &claims, &self.encoding_key)?)
    }

    /// Check signature, issuer and expiry, then that the subject belongs to
    /// the phone number the token names.
    pub fn verify(&self, token: &str) -> Result<VerifiedSession, TokenError> {
        let mut validation = Validation::default();
        validation.set_issuer(&[&self.issuer]);

        let claims = decode::<SessionClaims>(token, &self.decoding_key, &validation)?.claims;
        let phone_number =
            PhoneNumber::from_e164(&claims.phone_number).map_err(|_| TokenError::InvalidPhone)?;
        let identity_id = IdentityId::for_phone(&phone_number);
        if identity_id.as_str() != claims.sub {
            return Err(TokenError::SubjectMismatch);
        }

        Ok(VerifiedSession {
            identity_id,
            phone_number,
        })
    }
}
