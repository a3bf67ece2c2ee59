//! Session domain - who is signed in and which screen stack to show
//!
//! The listener turns identity-provider emissions into store updates via the
//! session machine. Everything else only reads the store.

pub mod listener;
pub mod machines;
pub mod restore;
pub mod store;

pub use listener::{SessionHandle, SessionListener};
pub use machines::{SessionCommand, SessionEvent, SessionMachine};
pub use restore::restore_session;
pub use store::{AuthScreen, SessionState, SessionStore};
