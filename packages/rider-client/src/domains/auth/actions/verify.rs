//! OTP entry: verify the code, write the profile on sign-up, drive the
//! resend countdown.

use tokio::sync::watch;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::common::{parse_code, PhoneNumber};
use crate::domains::auth::actions::{VerificationHandoff, VerificationPurpose};
use crate::domains::auth::countdown::{Countdown, CountdownTimer};
use crate::domains::auth::models::{Identity, PendingVerification};
use crate::domains::auth::AuthError;
use crate::domains::profile::actions::ensure_profile;
use crate::domains::profile::models::ProfileRecord;
use crate::kernel::RiderDeps;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerificationState {
    AwaitingInput,
    Verifying,
    Completed,
    Failed,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationOutcome {
    /// New account: identity issued and profile written
    Registered {
        identity: Identity,
        profile: ProfileRecord,
    },
    /// Existing account signed back in
    SignedIn { identity: Identity },
}

impl VerificationOutcome {
    pub fn identity(&self) -> &Identity {
        match self {
            VerificationOutcome::Registered { identity, .. } => identity,
            VerificationOutcome::SignedIn { identity } => identity,
        }
    }
}

/// Handle the screen keeps to signal it was dismissed.
///
/// Anything the flow is awaiting when this fires is abandoned.
#[derive(Debug, Clone)]
pub struct ScreenExit(CancellationToken);

impl ScreenExit {
    pub fn exit(&self) {
        self.0.cancel();
    }
}

pub struct VerificationFlow {
    deps: RiderDeps,
    pending: PendingVerification,
    phone_number: PhoneNumber,
    purpose: VerificationPurpose,
    state: VerificationState,
    countdown: Countdown,
    exit: CancellationToken,
}

impl VerificationFlow {
    /// Enter the OTP screen. Starts the resend countdown.
    pub fn new(deps: RiderDeps, handoff: VerificationHandoff) -> Self {
        let countdown = Countdown::start(deps.settings.resend_cooldown_secs);
        Self {
            deps,
            pending: handoff.pending,
            phone_number: handoff.phone_number,
            purpose: handoff.purpose,
            state: VerificationState::AwaitingInput,
            countdown,
            exit: CancellationToken::new(),
        }
    }

    pub fn state(&self) -> VerificationState {
        self.state
    }

    pub fn phone_number(&self) -> &PhoneNumber {
        &self.phone_number
    }

    pub fn pending(&self) -> &PendingVerification {
        &self.pending
    }

    pub fn purpose(&self) -> &VerificationPurpose {
        &self.purpose
    }

    pub fn countdown(&self) -> CountdownTimer {
        self.countdown.snapshot()
    }

    pub fn subscribe_countdown(&self) -> watch::Receiver<CountdownTimer> {
        self.countdown.subscribe()
    }

    pub fn exit_handle(&self) -> ScreenExit {
        ScreenExit(self.exit.clone())
    }

    /// Leave the screen: stops the countdown and abandons anything in flight.
    pub fn exit(self) {
        drop(self);
    }

    /// Submit a code.
    ///
    /// Wrong codes and provider hiccups leave the flow in `AwaitingInput`
    /// so the user can try again.
    pub async fn verify(&mut self, code: &str) -> Result<VerificationOutcome, AuthError> {
        if self.is_finished() {
            return Err(AuthError::Abandoned);
        }
        let code = parse_code(code)?;

        self.state = VerificationState::Verifying;
        let exit = self.exit.clone();
        let deps = self.deps.clone();
        let pending = self.pending.clone();

        let verified = tokio::select! {
            biased;
            _ = exit.cancelled() => None,
            result = deps.with_deadline("verify_code", deps.identity.verify_code(&pending, &code)) => Some(result),
        };

        let identity = match verified {
            None => return Err(self.abandon()),
            Some(Err(e)) => return Err(self.fail(e)),
            Some(Ok(Err(e))) => return Err(self.fail(e.into())),
            Some(Ok(Ok(identity))) => identity,
        };

        // The code verified; a dismissed screen must not trigger the profile write
        if exit.is_cancelled() {
            return Err(self.abandon());
        }

        let purpose = self.purpose.clone();
        let outcome = match &purpose {
            VerificationPurpose::Login => {
                info!("Signed in {}", identity.id);
                VerificationOutcome::SignedIn { identity }
            }
            VerificationPurpose::Registration { username } => {
                let phone = self.phone_number.clone();
                match ensure_profile(&deps, &identity.id, username, &phone).await {
                    Ok(profile) => {
                        info!("Registered {} as {}", identity.id, profile.username);
                        VerificationOutcome::Registered { identity, profile }
                    }
                    Err(e) => {
                        // Identity is live with the provider but has no profile;
                        // the session will show it as incomplete.
                        warn!("Profile write failed after verification: {}", e);
                        return Err(self.fail(e));
                    }
                }
            }
        };

        self.state = VerificationState::Completed;
        self.countdown.cancel();
        Ok(outcome)
    }

    /// Request a fresh code once the countdown has expired.
    pub async fn resend(&mut self) -> Result<(), AuthError> {
        if self.is_finished() {
            return Err(AuthError::Abandoned);
        }

        let timer = self.countdown.snapshot();
        if !timer.can_resend() {
            return Err(AuthError::ResendNotReady {
                remaining_seconds: timer.remaining_seconds,
            });
        }

        let exit = self.exit.clone();
        let deps = self.deps.clone();
        let phone = self.phone_number.clone();
        let requested = tokio::select! {
            biased;
            _ = exit.cancelled() => None,
            result = deps.with_deadline("request_code", deps.identity.request_code(&phone)) => Some(result),
        };

        let pending = match requested {
            None => return Err(self.abandon()),
            Some(result) => result?.map_err(AuthError::from)?,
        };

        info!("Resent code to {}", self.phone_number);
        self.pending = pending;
        self.countdown.restart(self.deps.settings.resend_cooldown_secs);
        Ok(())
    }

    fn is_finished(&self) -> bool {
        self.exit.is_cancelled()
            || matches!(
                self.state,
                VerificationState::Completed | VerificationState::Failed
            )
    }

    fn abandon(&mut self) -> AuthError {
        info!("Verification abandoned for {}", self.phone_number);
        self.state = VerificationState::Failed;
        self.countdown.cancel();
        AuthError::Abandoned
    }

    fn fail(&mut self, err: AuthError) -> AuthError {
        if err.is_retryable() {
            self.state = VerificationState::AwaitingInput;
        } else {
            self.state = VerificationState::Failed;
            self.countdown.cancel();
        }
        err
    }
}

impl Drop for VerificationFlow {
    fn drop(&mut self) {
        self.exit.cancel();
        self.countdown.cancel();
    }
}
