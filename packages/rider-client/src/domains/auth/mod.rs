//! Auth domain - phone OTP onboarding
//!
//! Responsibilities:
//! - Sign-up, OTP verification and sign-in flows
//! - Resend countdown on the OTP screen
//! - Session tokens for verified identities

pub mod actions;
pub mod countdown;
pub mod errors;
pub mod jwt;
pub mod models;

pub use actions::{
    LoginFlow, RegistrationFlow, VerificationFlow, VerificationHandoff, VerificationOutcome,
    VerificationPurpose,
};
pub use countdown::{Countdown, CountdownTimer};
pub use errors::AuthError;
pub use jwt::{JwtService, TokenError, VerifiedSession};
