//! Resend countdown for the OTP screen.
//!
//! `CountdownTimer` is the pure state; `Countdown` drives it once a second
//! from a spawned task and is cancelled when dropped.

use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::debug;

const TICK: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CountdownTimer {
    pub remaining_seconds: u32,
    pub running: bool,
}

impl CountdownTimer {
    pub fn start(seconds: u32) -> Self {
        Self {
            remaining_seconds: seconds,
            running: seconds > 0,
        }
    }

    /// Advance by one second. Reaching zero stops the timer.
    pub fn tick(&mut self) {
        if !self.running {
            return;
        }
        self.remaining_seconds = self.remaining_seconds.saturating_sub(1);
        if self.remaining_seconds == 0 {
            self.running = false;
        }
    }

    pub fn can_resend(&self) -> bool {
        !self.running
    }
}

/// Cancellable once-a-second driver for a [`CountdownTimer`].
#[derive(Debug)]
pub struct Countdown {
    state: watch::Receiver<CountdownTimer>,
    cancel: CancellationToken,
}

impl Countdown {
    /// Start ticking from `seconds`. Must be called inside a tokio runtime.
    pub fn start(seconds: u32) -> Self {
        let timer = CountdownTimer::start(seconds);
        let (tx, rx) = watch::channel(timer);
        let cancel = CancellationToken::new();

        if timer.running {
            tokio::spawn(run(tx, cancel.clone()));
        }

        Self { state: rx, cancel }
    }

    /// Stop the current countdown and start a fresh one.
    pub fn restart(&mut self, seconds: u32) {
        self.cancel();
        *self = Self::start(seconds);
    }

    pub fn snapshot(&self) -> CountdownTimer {
        *self.state.borrow()
    }

    /// Receiver for rendering "Resend code in Ns"
    pub fn subscribe(&self) -> watch::Receiver<CountdownTimer> {
        self.state.clone()
    }

    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancel.is_cancelled()
    }
}

impl Drop for Countdown {
    fn drop(&mut self) {
        self.cancel.cancel();
    }
}

async fn run(tx: watch::Sender<CountdownTimer>, cancel: CancellationToken) {
    let mut interval = interval_at(Instant::now() + TICK, TICK);
    interval.set_missed_tick_behavior(MissedTickBehavior::Burst);

    loop {
        tokio::select! {
            _ = cancel.cancelled() => {
                debug!("countdown cancelled");
                return;
            }
            _ = interval.tick() => {
                let mut expired = false;
                tx.send_modify(|timer| {
                    timer.tick();
                    expired = !timer.running;
                });
                if expired {
                    debug!("countdown expired, resend enabled");
                    return;
                }
            }
        }
    }
}
