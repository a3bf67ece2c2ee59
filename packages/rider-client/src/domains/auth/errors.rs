use crate::common::ValidationError;
use crate::domains::auth::models::IdentityId;
use crate::kernel::{GatewayError, ProfileField, RepositoryError};

/// Everything an onboarding flow can report back to its screen.
///
/// Each variant maps to one user-facing alert; nothing here is retried
/// automatically.
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("invalid input: {0}")]
    Validation(#[from] ValidationError),

    #[error("username \"{username}\" is already taken")]
    UsernameTaken { username: String },

    #[error("phone number {phone_number} is already registered")]
    PhoneRegistered { phone_number: String },

    #[error("phone number {phone_number} is not registered, sign up first")]
    UserNotFound { phone_number: String },

    #[error("phone number {phone_number} is not dialable")]
    InvalidPhone { phone_number: String },

    #[error("the code you entered is invalid or expired")]
    InvalidCode,

    #[error("service unavailable: {reason}")]
    ProviderUnavailable { reason: String },

    /// Signed in with the provider, but the profile record could not be written
    #[error("signed in as {identity_id} but the profile could not be saved: {reason}")]
    ProfileWriteFailed {
        identity_id: IdentityId,
        reason: String,
    },

    /// Profile recovery needs a signed-in identity
    #[error("not signed in")]
    NotSignedIn,

    #[error("a new code can be requested in {remaining_seconds}s")]
    ResendNotReady { remaining_seconds: u32 },

    /// The owning screen went away before the call resolved
    #[error("flow was abandoned")]
    Abandoned,
}

impl AuthError {
    /// Whether the user can stay on the same screen and try again.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            AuthError::Validation(_)
                | AuthError::InvalidCode
                | AuthError::ProviderUnavailable { .. }
                | AuthError::ResendNotReady { .. }
        )
    }

    /// Map a failed repository read (uniqueness checks, lookups).
    pub(crate) fn from_read(err: RepositoryError) -> Self {
        AuthError::ProviderUnavailable {
            reason: err.to_string(),
        }
    }

    /// Map a failed profile write that happened after authentication.
    pub(crate) fn profile_write(identity_id: &IdentityId, err: RepositoryError) -> Self {
        let reason = match err {
            RepositoryError::Duplicate {
                field: ProfileField::Username,
            } => "username was taken while verifying".to_string(),
            RepositoryError::Duplicate {
                field: ProfileField::PhoneNumber,
            } => "phone number was registered while verifying".to_string(),
            other => other.to_string(),
        };
        AuthError::ProfileWriteFailed {
            identity_id: identity_id.clone(),
            reason,
        }
    }
}

impl From<GatewayError> for AuthError {
    fn from(err: GatewayError) -> Self {
        match err {
            GatewayError::InvalidPhone { phone_number } => AuthError::InvalidPhone { phone_number },
            GatewayError::InvalidCode => AuthError::InvalidCode,
            GatewayError::ProviderUnavailable { reason } => {
                AuthError::ProviderUnavailable { reason }
            }
        }
    }
}
