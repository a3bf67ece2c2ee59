//! The one subscriber of the identity-state stream and the only writer of
//! the session store.

use tokio::sync::broadcast::error::RecvError;
use tokio::sync::{broadcast, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::domains::auth::models::{Identity, IdentityId};
use crate::kernel::RiderDeps;

use super::machines::{SessionCommand, SessionEvent, SessionMachine};
use super::store::SessionStore;

pub struct SessionListener;

impl SessionListener {
    /// Subscribe to the identity provider and start keeping `store` current.
    ///
    /// Call once at app start; the subscription is never re-established.
    pub fn spawn(deps: RiderDeps, store: SessionStore) -> SessionHandle {
        let cancel = CancellationToken::new();
        let (refresh_tx, refresh_rx) = mpsc::unbounded_channel();
        // Subscribed before the task starts so no write is missed
        let profile_writes = deps.profile_writes.subscribe();

        let task = tokio::spawn(run(
            deps,
            store.clone(),
            refresh_rx,
            profile_writes,
            cancel.clone(),
        ));

        SessionHandle {
            store,
            refresh_tx,
            cancel,
            task: Some(task),
        }
    }
}

/// Owner's handle on the running listener
pub struct SessionHandle {
    store: SessionStore,
    refresh_tx: mpsc::UnboundedSender<()>,
    cancel: CancellationToken,
    task: Option<JoinHandle<()>>,
}

impl SessionHandle {
    pub fn store(&self) -> &SessionStore {
        &self.store
    }

    /// Fetch the current identity's profile again (e.g. on app foreground).
    pub fn refresh_profile(&self) {
        if self.refresh_tx.send(()).is_err() {
            warn!("Session listener is not running; refresh ignored");
        }
    }

    /// Stop listening and wait for the task to finish
    pub async fn shutdown(mut self) {
        self.cancel.cancel();
        if let Some(task) = self.task.take() {
            if let Err(e) = task.await {
                warn!("Session listener ended abnormally: {}", e);
            }
        }
    }
}

impl Drop for SessionHandle {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(
    deps: RiderDeps,
    store: SessionStore,
    mut refresh_rx: mpsc::UnboundedReceiver<()>,
    mut profile_writes: broadcast::Receiver<IdentityId>,
    cancel: CancellationToken,
) {
    let mut identities = deps.identity.subscribe();
    let mut machine = SessionMachine::new();

    // Whatever the stream currently holds is the first emission
    let first = identities.borrow_and_update().clone();
    handle(&deps, &store, &mut machine, identity_event(first), &cancel).await;

    loop {
        let event = tokio::select! {
            _ = cancel.cancelled() => {
                debug!("Session listener stopped");
                return;
            }
            changed = identities.changed() => {
                if changed.is_err() {
                    warn!("Identity provider closed its state stream");
                    return;
                }
                identity_event(identities.borrow_and_update().clone())
            }
            Some(()) = refresh_rx.recv() => SessionEvent::RefreshRequested,
            written = profile_writes.recv() => match written {
                Ok(identity_id) => SessionEvent::ProfileWritten { identity_id },
                // Missed some announcements; one of them may have been ours
                Err(RecvError::Lagged(_)) => SessionEvent::RefreshRequested,
                // `deps` holds a sender for as long as this loop runs
                Err(RecvError::Closed) => continue,
            },
        };
        handle(&deps, &store, &mut machine, event, &cancel).await;
    }
}

fn identity_event(identity: Option<Identity>) -> SessionEvent {
    match identity {
        Some(identity) => SessionEvent::SignedIn { identity },
        None => SessionEvent::SignedOut,
    }
}

async fn handle(
    deps: &RiderDeps,
    store: &SessionStore,
    machine: &mut SessionMachine,
    event: SessionEvent,
    cancel: &CancellationToken,
) {
    let commands = machine.decide(&event);
    let screen = machine.screen();

    match event {
        SessionEvent::SignedIn { identity } => {
            info!("Identity signed in: {}", identity.id);
            store.set_identity(identity, screen);
        }
        SessionEvent::SignedOut => {
            info!("Identity signed out");
        }
        SessionEvent::ProfileWritten { identity_id } => {
            debug!("Profile written for {}", identity_id);
        }
        SessionEvent::RefreshRequested => {}
    }

    for command in commands {
        match command {
            SessionCommand::ClearSession => store.clear(screen),
            SessionCommand::FetchProfile { identity_id } => {
                tokio::spawn(fetch_profile(
                    deps.clone(),
                    store.clone(),
                    identity_id,
                    cancel.child_token(),
                ));
            }
            SessionCommand::SaveToken { token } => {
                if let Some(tokens) = &deps.tokens {
                    if let Err(e) = tokens.save(&token).await {
                        warn!("Failed to save session token: {:#}", e);
                    }
                }
            }
            SessionCommand::ForgetToken => {
                if let Some(tokens) = &deps.tokens {
                    if let Err(e) = tokens.clear().await {
                        warn!("Failed to clear session token: {:#}", e);
                    }
                }
            }
        }
    }
}

async fn fetch_profile(
    deps: RiderDeps,
    store: SessionStore,
    identity_id: IdentityId,
    cancel: CancellationToken,
) {
    let fetched = tokio::select! {
        _ = cancel.cancelled() => return,
        result = deps.with_deadline("fetch_profile", deps.profiles.fetch_profile(&identity_id)) => result,
    };

    match fetched {
        Ok(Ok(Some(profile))) => {
            if store.set_profile(&identity_id, profile) {
                debug!("Profile loaded for {}", identity_id);
            } else {
                debug!("Discarded stale profile for {}", identity_id);
            }
        }
        Ok(Ok(None)) => {
            info!("No profile yet for {}", identity_id);
        }
        Ok(Err(e)) => {
            warn!("Failed to fetch profile for {}: {}", identity_id, e);
        }
        Err(e) => {
            warn!("Failed to fetch profile for {}: {}", identity_id, e);
        }
    }
}
