use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::fmt;

use crate::common::PhoneNumber;

/// Opaque identity id issued once a phone number has been verified.
///
/// Derived from the verified number, so the same phone always maps to the
/// same identity across sign-ins.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct IdentityId(String);

impl IdentityId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn for_phone(phone: &PhoneNumber) -> Self {
        Self(hash_phone_number(phone.as_str()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for IdentityId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// An authenticated identity as seen by the client.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub id: IdentityId,
    pub phone_number: PhoneNumber,
    /// Signed session token (JWT)
    pub token: String,
}

/// Outstanding code challenge returned by `request_code`.
///
/// Flow-local only; never written anywhere.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PendingVerification {
    pub challenge_id: String,
    pub target_phone: PhoneNumber,
}

/// Hash a phone number using SHA256
///
/// The hex digest is used as the identity id so raw numbers never appear
/// as keys.
pub fn hash_phone_number(phone_number: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(phone_number.as_bytes());
    format!("{:x}", hasher.finalize())
}
