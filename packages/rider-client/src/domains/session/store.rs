use std::sync::Arc;
use tokio::sync::watch;

use crate::domains::auth::models::{Identity, IdentityId};
use crate::domains::profile::models::ProfileRecord;

/// Which screen stack the app should mount
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthScreen {
    /// Waiting for the first identity-state emission (splash/spinner)
    Initializing,
    Unauthenticated,
    Authenticated,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    pub identity: Option<Identity>,
    pub profile: Option<ProfileRecord>,
    pub screen: AuthScreen,
}

impl SessionState {
    fn initial() -> Self {
        Self {
            identity: None,
            profile: None,
            screen: AuthScreen::Initializing,
        }
    }

    /// Signed in with the provider but no profile record (yet)
    pub fn needs_profile(&self) -> bool {
        self.identity.is_some() && self.profile.is_none()
    }

    pub fn is_initializing(&self) -> bool {
        self.screen == AuthScreen::Initializing
    }
}

/// App-wide session holder.
///
/// Cheap to clone; every clone sees the same state. Readers take snapshots
/// or subscribe; only the session listener writes.
#[derive(Clone)]
pub struct SessionStore {
    state: Arc<watch::Sender<SessionState>>,
}

impl SessionStore {
    pub fn new() -> Self {
        Self {
            state: Arc::new(watch::Sender::new(SessionState::initial())),
        }
    }

    pub fn snapshot(&self) -> SessionState {
        self.state.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state.subscribe()
    }

    pub fn screen(&self) -> AuthScreen {
        self.state.borrow().screen
    }

    pub fn identity(&self) -> Option<Identity> {
        self.state.borrow().identity.clone()
    }

    pub fn profile(&self) -> Option<ProfileRecord> {
        self.state.borrow().profile.clone()
    }

    /// Record a signed-in identity. A profile belonging to a different
    /// identity is dropped in the same update.
    pub(super) fn set_identity(&self, identity: Identity, screen: AuthScreen) {
        self.state.send_modify(|state| {
            let same_identity = state
                .identity
                .as_ref()
                .is_some_and(|current| current.id == identity.id);
            if !same_identity {
                state.profile = None;
            }
            state.identity = Some(identity);
            state.screen = screen;
        });
    }

    /// Clear identity and profile in one update.
    pub(super) fn clear(&self, screen: AuthScreen) {
        self.state.send_modify(|state| {
            state.identity = None;
            state.profile = None;
            state.screen = screen;
        });
    }

    /// Apply a fetched profile if `for_identity` is still the current identity.
    ///
    /// Returns false when the result is stale and was discarded.
    pub(super) fn set_profile(&self, for_identity: &IdentityId, profile: ProfileRecord) -> bool {
        let mut applied = false;
        self.state.send_if_modified(|state| {
            let current = state
                .identity
                .as_ref()
                .is_some_and(|identity| &identity.id == for_identity);
            if !current {
                return false;
            }
            applied = true;
            if state.profile.as_ref() == Some(&profile) {
                return false;
            }
            state.profile = Some(profile);
            true
        });
        applied
    }
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::new()
    }
}
