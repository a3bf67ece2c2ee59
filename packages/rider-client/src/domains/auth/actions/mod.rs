//! Auth domain actions - the onboarding flows
//!
//! Screens drive these state machines directly. Registration and login end by
//! handing a `VerificationHandoff` to the OTP screen's `VerificationFlow`.

mod login;
mod register;
mod verify;

pub use login::{LoginFlow, LoginState};
pub use register::{RegistrationFlow, RegistrationState};
pub use verify::{ScreenExit, VerificationFlow, VerificationOutcome, VerificationState};

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::PendingVerification;

/// What the OTP screen needs from the screen before it.
///
/// Lives in navigation state only; losing it means starting over.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationHandoff {
    pub pending: PendingVerification,
    pub phone_number: PhoneNumber,
    pub purpose: VerificationPurpose,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationPurpose {
    /// Sign-up: write a profile with this username once the code verifies
    Registration { username: Username },
    /// Sign-in: the profile already exists
    Login,
}
