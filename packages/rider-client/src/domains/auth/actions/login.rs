//! Sign-in flow: look the rider up by phone, then request a code.

use tracing::{error, info};

use crate::common::PhoneNumber;
use crate::domains::auth::actions::{VerificationHandoff, VerificationPurpose};
use crate::domains::auth::AuthError;
use crate::kernel::RiderDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginState {
    AwaitingInput,
    LookupPending,
    CodeRequested,
    AwaitingVerification,
    Failed,
}

pub struct LoginFlow {
    deps: RiderDeps,
    state: LoginState,
}

impl LoginFlow {
    pub fn new(deps: RiderDeps) -> Self {
        Self {
            deps,
            state: LoginState::AwaitingInput,
        }
    }

    pub fn state(&self) -> LoginState {
        self.state
    }

    /// Look up the number and send a code if it belongs to a rider.
    ///
    /// Unknown numbers fail with `UserNotFound` and no code is sent.
    pub async fn submit(
        &mut self,
        calling_code: &str,
        local_phone: &str,
    ) -> Result<VerificationHandoff, AuthError> {
        self.state = LoginState::AwaitingInput;
        let phone = PhoneNumber::from_local(calling_code, local_phone)?;

        match self.run(phone).await {
            Ok(handoff) => {
                self.state = LoginState::AwaitingVerification;
                Ok(handoff)
            }
            Err(e) => {
                self.state = LoginState::Failed;
                Err(e)
            }
        }
    }

    async fn run(&mut self, phone: PhoneNumber) -> Result<VerificationHandoff, AuthError> {
        self.state = LoginState::LookupPending;

        // 1. Check the number belongs to a rider
        let deps = &self.deps;
        let profile = deps
            .with_deadline("find_by_phone", deps.profiles.find_by_phone(&phone))
            .await?
            .map_err(AuthError::from_read)?;
        if profile.is_none() {
            info!("Phone not registered: {}", phone);
            return Err(AuthError::UserNotFound {
                phone_number: phone.to_string(),
            });
        }

        // 2. Send OTP
        let pending = deps
            .with_deadline("request_code", deps.identity.request_code(&phone))
            .await?
            .map_err(|e| {
                error!("Failed to send login OTP: {}", e);
                AuthError::from(e)
            })?;
        self.state = LoginState::CodeRequested;

        info!("Login code sent to {}", phone);
        Ok(VerificationHandoff {
            pending,
            phone_number: phone,
            purpose: VerificationPurpose::Login,
        })
    }
}
