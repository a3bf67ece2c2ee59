//! Sign-up flow: validate, check uniqueness, request a code.

use tracing::{error, info};

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::actions::{VerificationHandoff, VerificationPurpose};
use crate::domains::auth::AuthError;
use crate::kernel::RiderDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RegistrationState {
    Idle,
    UniquenessChecked,
    CodeRequested,
    /// Handed off to the verification flow; nothing left to do here
    AwaitingVerification,
    Failed,
}

/// Sign-up state machine.
///
/// Codes are only requested once both uniqueness checks pass, so doomed
/// registrations never cost an SMS.
pub struct RegistrationFlow {
    deps: RiderDeps,
    state: RegistrationState,
}

impl RegistrationFlow {
    pub fn new(deps: RiderDeps) -> Self {
        Self {
            deps,
            state: RegistrationState::Idle,
        }
    }

    pub fn state(&self) -> RegistrationState {
        self.state
    }

    /// Run the sign-up steps for what the user typed.
    ///
    /// Validation errors leave the flow `Idle`; any other failure moves it
    /// to `Failed`. The flow can be resubmitted either way.
    pub async fn submit(
        &mut self,
        username: &str,
        calling_code: &str,
        local_phone: &str,
    ) -> Result<VerificationHandoff, AuthError> {
        self.state = RegistrationState::Idle;

        let username = Username::parse(username)?;
        let phone = PhoneNumber::from_local(calling_code, local_phone)?;

        match self.run(username, phone).await {
            Ok(handoff) => {
                self.state = RegistrationState::AwaitingVerification;
                Ok(handoff)
            }
            Err(e) => {
                self.state = RegistrationState::Failed;
                Err(e)
            }
        }
    }

    async fn run(
        &mut self,
        username: Username,
        phone: PhoneNumber,
    ) -> Result<VerificationHandoff, AuthError> {
        let deps = &self.deps;

        // 1. Uniqueness checks
        let username_taken = deps
            .with_deadline("is_username_taken", deps.profiles.is_username_taken(&username))
            .await?
            .map_err(AuthError::from_read)?;
        if username_taken {
            info!("Username already taken: {}", username);
            return Err(AuthError::UsernameTaken {
                username: username.to_string(),
            });
        }

        let phone_registered = deps
            .with_deadline("is_phone_registered", deps.profiles.is_phone_registered(&phone))
            .await?
            .map_err(AuthError::from_read)?;
        if phone_registered {
            info!("Phone already registered: {}", phone);
            return Err(AuthError::PhoneRegistered {
                phone_number: phone.to_string(),
            });
        }
        self.state = RegistrationState::UniquenessChecked;

        // 2. Send OTP
        let deps = &self.deps;
        let pending = deps
            .with_deadline("request_code", deps.identity.request_code(&phone))
            .await?
            .map_err(|e| {
                error!("Failed to send sign-up OTP: {}", e);
                AuthError::from(e)
            })?;
        self.state = RegistrationState::CodeRequested;

        // 3. Hand off; the profile is written only after the code verifies
        info!("Sign-up code sent to {} for {}", phone, username);
        Ok(VerificationHandoff {
            pending,
            phone_number: phone,
            purpose: VerificationPurpose::Registration { username },
        })
    }
}
