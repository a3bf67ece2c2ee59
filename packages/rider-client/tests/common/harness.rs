//! Test harness wiring the mock collaborators to a running session listener.

#![allow(dead_code)]

use rider_core::common::PhoneNumber;
use rider_core::domains::session::{SessionHandle, SessionListener, SessionState, SessionStore};
use rider_core::kernel::{RiderDeps, TestDependencies};
use std::time::Duration;
use test_context::AsyncTestContext;

/// How long a test waits for the listener to reach a state
const SETTLE_TIMEOUT: Duration = Duration::from_secs(2);

/// Mocks plus a session listener subscribed to the mock gateway.
///
/// # Example using test-context
///
/// ```ignore
/// #[test_context(TestHarness)]
/// #[tokio::test]
/// async fn my_test(ctx: &TestHarness) {
///     ctx.deps.gateway.emit(None);
/// }
/// ```
pub struct TestHarness {
    pub deps: TestDependencies,
    pub session: SessionHandle,
}

impl AsyncTestContext for TestHarness {
    async fn setup() -> Self {
        Self::new()
    }

    async fn teardown(self) {
        self.session.shutdown().await;
    }
}

impl TestHarness {
    pub fn new() -> Self {
        Self::with_dependencies(TestDependencies::new())
    }

    /// Spawn the listener over custom mocks (delays, seeded profiles)
    pub fn with_dependencies(deps: TestDependencies) -> Self {
        init_tracing();
        let session = SessionListener::spawn(deps.deps(), SessionStore::new());
        Self { deps, session }
    }

    pub fn rider_deps(&self) -> RiderDeps {
        self.deps.deps()
    }

    pub fn store(&self) -> &SessionStore {
        self.session.store()
    }

    /// Wait until the session store satisfies `predicate` and return that state
    pub async fn wait_for_session(
        &self,
        predicate: impl Fn(&SessionState) -> bool,
    ) -> SessionState {
        let mut rx = self.store().subscribe();
        let state = tokio::time::timeout(SETTLE_TIMEOUT, rx.wait_for(|state| predicate(state)))
            .await
            .expect("session did not reach the expected state in time")
            .expect("session store closed");
        (*state).clone()
    }

    /// Give spawned fetch tasks time to land
    pub async fn settle(&self) {
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
}

pub fn phone(local: &str) -> PhoneNumber {
    PhoneNumber::from_local("94", local).expect("valid test phone")
}

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "rider_core=debug".into()),
        )
        .with_test_writer()
        .try_init();
}
