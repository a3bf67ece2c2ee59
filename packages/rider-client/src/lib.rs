// Rider client core
//
// Phone-number OTP onboarding and the app-wide session for the rider app.
// Screens call into the flows in domains/auth; the session listener in
// domains/session owns the store the UI renders from.

pub mod common;
pub mod config;
pub mod domains;
pub mod kernel;

pub use config::*;
