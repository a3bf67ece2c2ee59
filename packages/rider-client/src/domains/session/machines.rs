use crate::domains::auth::models::{Identity, IdentityId};

use super::store::AuthScreen;

/// Facts the session listener feeds the machine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Provider reports a signed-in identity
    SignedIn { identity: Identity },
    /// Provider reports no identity
    SignedOut,
    /// Someone asked for the current profile to be fetched again
    RefreshRequested,
    /// A profile was just written for this identity
    ProfileWritten { identity_id: IdentityId },
}

/// IO the listener should perform in response, in order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionCommand {
    FetchProfile { identity_id: IdentityId },
    ClearSession,
    SaveToken { token: String },
    ForgetToken,
}

/// Session machine - decides the mounted screen stack and the follow-up IO.
///
/// Leaves `Initializing` on the first identity event and never returns to it.
pub struct SessionMachine {
    screen: AuthScreen,
    current: Option<IdentityId>,
}

impl SessionMachine {
    pub fn new() -> Self {
        Self {
            screen: AuthScreen::Initializing,
            current: None,
        }
    }

    pub fn screen(&self) -> AuthScreen {
        self.screen
    }

    pub fn decide(&mut self, event: &SessionEvent) -> Vec<SessionCommand> {
        match event {
            SessionEvent::SignedIn { identity } => {
                self.screen = AuthScreen::Authenticated;
                self.current = Some(identity.id.clone());
                vec![
                    SessionCommand::FetchProfile {
                        identity_id: identity.id.clone(),
                    },
                    SessionCommand::SaveToken {
                        token: identity.token.clone(),
                    },
                ]
            }
            SessionEvent::SignedOut => {
                self.screen = AuthScreen::Unauthenticated;
                // Only an actual sign-out forgets the token; a signed-out
                // first emission happens before any stored session is resumed.
                match self.current.take() {
                    Some(_) => vec![SessionCommand::ClearSession, SessionCommand::ForgetToken],
                    None => vec![SessionCommand::ClearSession],
                }
            }
            SessionEvent::RefreshRequested => self.refetch(None),
            SessionEvent::ProfileWritten { identity_id } => self.refetch(Some(identity_id)),
        }
    }

    /// Fetch again for the current identity, optionally only if it is `only_for`
    fn refetch(&self, only_for: Option<&IdentityId>) -> Vec<SessionCommand> {
        match &self.current {
            Some(current) if only_for.map_or(true, |id| id == current) => {
                vec![SessionCommand::FetchProfile {
                    identity_id: current.clone(),
                }]
            }
            _ => Vec::new(),
        }
    }
}

impl Default for SessionMachine {
    fn default() -> Self {
        Self::new()
    }
}
