//! Integration tests for the session listener and store.
//!
//! Covers:
//! - First emission leaving Initializing
//! - Profile loading on sign-in and clearing on sign-out
//! - Stale and failed profile fetches
//! - Refresh and profile completion recovery
//! - Stored session tokens

mod common;

use common::{phone, TestHarness};
use rider_core::common::Username;
use rider_core::domains::auth::models::IdentityId;
use rider_core::domains::auth::AuthError;
use rider_core::domains::profile::complete_profile;
use rider_core::domains::session::AuthScreen;
use rider_core::kernel::test_dependencies::{
    MockIdentityGateway, MockProfileRepository, MockTokenStore,
};
use rider_core::kernel::{BaseProfileRepository, TestDependencies};
use std::time::Duration;
use test_context::test_context;

// ============================================================================
// First emission
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn first_emission_leaves_initializing(ctx: &TestHarness) {
    let state = ctx.wait_for_session(|s| !s.is_initializing()).await;

    assert_eq!(state.screen, AuthScreen::Unauthenticated);
    assert!(state.identity.is_none());
    assert!(state.profile.is_none());
}

#[tokio::test]
async fn signed_in_first_emission_goes_straight_to_authenticated() {
    let test_deps = TestDependencies::new();
    let rider = phone("0771234567");
    test_deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));

    let ctx = TestHarness::with_dependencies(test_deps);
    let state = ctx.wait_for_session(|s| !s.is_initializing()).await;

    assert_eq!(state.screen, AuthScreen::Authenticated);
    assert_eq!(state.identity.unwrap().id, IdentityId::for_phone(&rider));

    ctx.session.shutdown().await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn screen_never_returns_to_initializing(ctx: &TestHarness) {
    let rider = phone("0771234567");
    let mut rx = ctx.store().subscribe();

    ctx.wait_for_session(|s| !s.is_initializing()).await;
    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.deps.gateway.emit(None);
    ctx.wait_for_session(|s| s.identity.is_none()).await;

    rx.mark_changed();
    while let Ok(Ok(())) = tokio::time::timeout(Duration::from_millis(50), rx.changed()).await {
        assert!(!rx.borrow_and_update().is_initializing());
    }
}

// ============================================================================
// Sign-in / sign-out
// ============================================================================

#[tokio::test]
async fn sign_in_loads_profile_and_sign_out_clears_both() {
    let rider = phone("0771234567");
    let profiles = MockProfileRepository::new().with_rider("rid", &rider).await;
    let ctx = TestHarness::with_dependencies(TestDependencies::new().with_profiles(profiles));
    ctx.wait_for_session(|s| !s.is_initializing()).await;

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    let state = ctx.wait_for_session(|s| s.profile.is_some()).await;
    assert_eq!(state.screen, AuthScreen::Authenticated);
    assert_eq!(state.profile.unwrap().username, "rid");

    // Every state observed on the way out must clear identity and profile together
    let mut rx = ctx.store().subscribe();
    ctx.deps.gateway.emit(None);
    loop {
        tokio::time::timeout(Duration::from_secs(2), rx.changed())
            .await
            .expect("sign-out never reached the store")
            .unwrap();
        let state = rx.borrow_and_update().clone();
        assert_eq!(state.identity.is_some(), state.profile.is_some());
        if state.identity.is_none() {
            assert_eq!(state.screen, AuthScreen::Unauthenticated);
            break;
        }
    }

    ctx.session.shutdown().await;
}

#[tokio::test]
async fn switching_identity_drops_previous_profile() {
    let first = phone("0771234567");
    let second = phone("0779999999");
    let profiles = MockProfileRepository::new()
        .with_rider("first", &first)
        .await
        .with_rider("second", &second)
        .await;
    let ctx = TestHarness::with_dependencies(TestDependencies::new().with_profiles(profiles));

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&first)));
    ctx.wait_for_session(|s| s.profile.as_ref().is_some_and(|p| p.username == "first"))
        .await;

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&second)));
    let state = ctx
        .wait_for_session(|s| s.profile.as_ref().is_some_and(|p| p.username == "second"))
        .await;

    assert_eq!(state.identity.unwrap().id, IdentityId::for_phone(&second));
    ctx.session.shutdown().await;
}

#[tokio::test]
async fn identity_without_profile_stays_authenticated() {
    let ctx = TestHarness::new();
    let rider = phone("0771234567");

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.settle().await;

    let state = ctx.store().snapshot();
    assert_eq!(state.screen, AuthScreen::Authenticated);
    assert!(state.needs_profile());
    assert!(ctx.deps.profiles.fetch_count() >= 1);

    ctx.session.shutdown().await;
}

// ============================================================================
// Fetch failures and stale results
// ============================================================================

#[tokio::test]
async fn stale_profile_fetch_is_discarded() {
    let rider = phone("0771234567");
    let profiles = MockProfileRepository::new()
        .with_rider("rid", &rider)
        .await
        .with_fetch_delay(Duration::from_millis(200));
    let ctx = TestHarness::with_dependencies(TestDependencies::new().with_profiles(profiles));
    ctx.wait_for_session(|s| !s.is_initializing()).await;

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.deps.gateway.emit(None);
    ctx.wait_for_session(|s| s.identity.is_none()).await;

    // Let the delayed fetch finish
    tokio::time::sleep(Duration::from_millis(300)).await;

    let state = ctx.store().snapshot();
    assert!(state.identity.is_none());
    assert!(state.profile.is_none());
    assert_eq!(state.screen, AuthScreen::Unauthenticated);

    ctx.session.shutdown().await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn failed_fetch_leaves_profile_absent(ctx: &TestHarness) {
    let rider = phone("0771234567");
    ctx.deps.profiles.fail_fetches(true);

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.settle().await;

    let state = ctx.store().snapshot();
    assert_eq!(state.screen, AuthScreen::Authenticated);
    assert!(state.profile.is_none());
}

// ============================================================================
// Recovery
// ============================================================================

#[test_context(TestHarness)]
#[tokio::test]
async fn refresh_picks_up_profile_written_later(ctx: &TestHarness) {
    let rider = phone("0771234567");
    let identity = MockIdentityGateway::identity_for(&rider);

    ctx.deps.gateway.emit(Some(identity.clone()));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.settle().await;
    assert!(ctx.store().snapshot().needs_profile());

    // Written straight to the repository, so nothing announces it
    ctx.deps
        .profiles
        .create_profile(&identity.id, &Username::parse("rid").unwrap(), &rider)
        .await
        .unwrap();
    ctx.settle().await;
    assert!(ctx.store().snapshot().profile.is_none());

    ctx.session.refresh_profile();

    let state = ctx.wait_for_session(|s| s.profile.is_some()).await;
    assert_eq!(state.profile.unwrap().username, "rid");
}

#[test_context(TestHarness)]
#[tokio::test]
async fn complete_profile_recovers_missing_profile(ctx: &TestHarness) {
    let rider = phone("0771234567");
    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;

    let profile = complete_profile(&ctx.rider_deps(), &ctx.session, "rid")
        .await
        .unwrap();
    assert_eq!(profile.username, "rid");
    assert_eq!(profile.phone_number, rider);

    let state = ctx.wait_for_session(|s| s.profile.is_some()).await;
    assert_eq!(state.profile.unwrap(), profile);
    assert_eq!(ctx.deps.profiles.stored_profiles().await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn complete_profile_rejects_taken_username(ctx: &TestHarness) {
    let someone_else = phone("0779999999");
    let rider = phone("0771234567");
    rider_core::domains::profile::ensure_profile(
        &ctx.rider_deps(),
        &IdentityId::for_phone(&someone_else),
        &Username::parse("rid").unwrap(),
        &someone_else,
    )
    .await
    .unwrap();

    ctx.deps
        .gateway
        .emit(Some(MockIdentityGateway::identity_for(&rider)));
    ctx.wait_for_session(|s| s.identity.is_some()).await;

    let result = complete_profile(&ctx.rider_deps(), &ctx.session, "rid").await;

    assert!(matches!(result, Err(AuthError::UsernameTaken { .. })));
    assert_eq!(ctx.deps.profiles.stored_profiles().await, 1);
}

#[test_context(TestHarness)]
#[tokio::test]
async fn complete_profile_requires_identity(ctx: &TestHarness) {
    ctx.wait_for_session(|s| !s.is_initializing()).await;

    let result = complete_profile(&ctx.rider_deps(), &ctx.session, "rid").await;

    assert!(matches!(result, Err(AuthError::NotSignedIn)));
    assert_eq!(ctx.deps.profiles.create_count(), 0);
}

// ============================================================================
// Stored session tokens
// ============================================================================

#[tokio::test]
async fn signed_out_first_emission_keeps_stored_token() {
    let ctx = TestHarness::with_dependencies(
        TestDependencies::new().with_tokens(MockTokenStore::new().with_token("previous-launch")),
    );

    ctx.wait_for_session(|s| !s.is_initializing()).await;
    ctx.settle().await;

    assert_eq!(
        ctx.deps.tokens.saved_token().as_deref(),
        Some("previous-launch")
    );
    ctx.session.shutdown().await;
}

#[test_context(TestHarness)]
#[tokio::test]
async fn every_sign_in_saves_its_token(ctx: &TestHarness) {
    let first = MockIdentityGateway::identity_for(&phone("0771234567"));
    let second = MockIdentityGateway::identity_for(&phone("0779999999"));

    ctx.deps.gateway.emit(Some(first));
    ctx.wait_for_session(|s| s.identity.is_some()).await;
    ctx.deps.gateway.emit(Some(second.clone()));
    ctx.wait_for_session(|s| s.identity.as_ref() == Some(&second)).await;
    ctx.settle().await;

    assert_eq!(ctx.deps.tokens.save_count(), 2);
    assert_eq!(ctx.deps.tokens.saved_token(), Some(second.token));
}
