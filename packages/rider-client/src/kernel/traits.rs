// Trait definitions for dependency injection
//
// These are INFRASTRUCTURE traits only - no business logic.
// The flows in domains/auth decide what to call and in which order.
//
// Naming convention: Base* for trait names (e.g., BaseIdentityGateway)

use async_trait::async_trait;
use std::fmt;
use tokio::sync::watch;

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::{Identity, IdentityId, PendingVerification};
use crate::domains::profile::models::ProfileRecord;

// =============================================================================
// Identity Gateway Trait (Infrastructure - phone verification + identity state)
// =============================================================================

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("phone number {phone_number} is not dialable")]
    InvalidPhone { phone_number: String },

    #[error("verification code is invalid or expired")]
    InvalidCode,

    #[error("identity provider unavailable: {reason}")]
    ProviderUnavailable { reason: String },
}

#[async_trait]
pub trait BaseIdentityGateway: Send + Sync {
    /// Send a one-time code to `phone` and return the challenge to verify against
    async fn request_code(&self, phone: &PhoneNumber)
        -> Result<PendingVerification, GatewayError>;

    /// Verify a submitted code. On success the new identity is also published
    /// on the state stream, which listeners observe asynchronously.
    async fn verify_code(
        &self,
        pending: &PendingVerification,
        code: &str,
    ) -> Result<Identity, GatewayError>;

    /// Identity-state stream. The current value counts as the first emission.
    fn subscribe(&self) -> watch::Receiver<Option<Identity>>;

    /// Drop the current identity (publishes `None`)
    async fn sign_out(&self);

    /// Re-establish an identity from a previously issued token, if it still verifies
    async fn resume(&self, token: &str) -> Result<Identity, GatewayError>;
}

// =============================================================================
// Profile Repository Trait (Infrastructure - document store)
// =============================================================================

/// Unique profile field that a write collided on
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProfileField {
    Username,
    PhoneNumber,
}

impl fmt::Display for ProfileField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProfileField::Username => f.write_str("username"),
            ProfileField::PhoneNumber => f.write_str("phone number"),
        }
    }
}

#[derive(Debug, thiserror::Error)]
pub enum RepositoryError {
    /// The identity already has a profile. Callers treat this as success.
    #[error("profile already exists for identity {identity_id}")]
    WriteConflict { identity_id: IdentityId },

    #[error("{field} already belongs to another profile")]
    Duplicate { field: ProfileField },

    #[error("profile store unavailable: {0}")]
    Unavailable(anyhow::Error),
}

#[async_trait]
pub trait BaseProfileRepository: Send + Sync {
    async fn is_username_taken(&self, username: &Username) -> Result<bool, RepositoryError>;

    async fn is_phone_registered(&self, phone: &PhoneNumber) -> Result<bool, RepositoryError>;

    /// Look a profile up by phone (login happens before an identity exists)
    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ProfileRecord>, RepositoryError>;

    /// Create the profile for `identity_id`.
    ///
    /// Returns `WriteConflict` if that identity already has one.
    async fn create_profile(
        &self,
        identity_id: &IdentityId,
        username: &Username,
        phone: &PhoneNumber,
    ) -> Result<ProfileRecord, RepositoryError>;

    async fn fetch_profile(
        &self,
        identity_id: &IdentityId,
    ) -> Result<Option<ProfileRecord>, RepositoryError>;
}

// =============================================================================
// Token Store Trait (Infrastructure - session persistence across launches)
// =============================================================================

#[async_trait]
pub trait BaseTokenStore: Send + Sync {
    /// The token saved by the last sign-in, if any
    async fn load(&self) -> anyhow::Result<Option<String>>;

    async fn save(&self, token: &str) -> anyhow::Result<()>;

    /// Forget the saved token. Clearing an empty store is not an error.
    async fn clear(&self) -> anyhow::Result<()>;
}
