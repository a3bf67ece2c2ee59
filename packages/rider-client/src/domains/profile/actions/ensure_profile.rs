//! Ensure profile action

use tracing::{info, warn};

use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::IdentityId;
use crate::domains::auth::AuthError;
use crate::domains::profile::models::ProfileRecord;
use crate::kernel::{RepositoryError, RiderDeps};

/// Create the profile for `identity_id`, or return the one already there.
///
/// Retried verifications and the session listener can both race to this
/// point for the same identity, so an existing record counts as success.
/// Any other failure is `ProfileWriteFailed`. On success the write is
/// announced on `deps.profile_writes` so the session picks the record up.
pub async fn ensure_profile(
    deps: &RiderDeps,
    identity_id: &IdentityId,
    username: &Username,
    phone: &PhoneNumber,
) -> Result<ProfileRecord, AuthError> {
    let profile = write_profile(deps, identity_id, username, phone).await?;
    deps.profile_writes.notify(identity_id);
    Ok(profile)
}

async fn write_profile(
    deps: &RiderDeps,
    identity_id: &IdentityId,
    username: &Username,
    phone: &PhoneNumber,
) -> Result<ProfileRecord, AuthError> {
    let created = deps
        .with_deadline(
            "create_profile",
            deps.profiles.create_profile(identity_id, username, phone),
        )
        .await
        .map_err(|e| write_failed(identity_id, e))?;

    match created {
        Ok(profile) => {
            info!("Created profile {} for {}", profile.username, identity_id);
            Ok(profile)
        }
        Err(RepositoryError::WriteConflict { .. }) => {
            info!("Profile already exists for {}, reusing it", identity_id);
            let existing = deps
                .with_deadline("fetch_profile", deps.profiles.fetch_profile(identity_id))
                .await
                .map_err(|e| write_failed(identity_id, e))?
                .map_err(|e| AuthError::profile_write(identity_id, e))?;

            existing.ok_or_else(|| {
                warn!("Write conflict for {} but no profile found", identity_id);
                AuthError::ProfileWriteFailed {
                    identity_id: identity_id.clone(),
                    reason: "profile reported as existing but could not be read".to_string(),
                }
            })
        }
        Err(e) => Err(AuthError::profile_write(identity_id, e)),
    }
}

fn write_failed(identity_id: &IdentityId, err: AuthError) -> AuthError {
    AuthError::ProfileWriteFailed {
        identity_id: identity_id.clone(),
        reason: err.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::kernel::test_dependencies::TestDependencies;

    fn phone() -> PhoneNumber {
        PhoneNumber::from_local("94", "0771234567").unwrap()
    }

    #[tokio::test]
    async fn test_second_call_returns_existing_record() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let id = IdentityId::for_phone(&phone());
        let username = Username::parse("rid").unwrap();

        let first = ensure_profile(&deps, &id, &username, &phone()).await.unwrap();
        let second = ensure_profile(&deps, &id, &username, &phone()).await.unwrap();

        assert_eq!(first, second);
        assert_eq!(test_deps.profiles.create_count(), 2);
        assert_eq!(test_deps.profiles.stored_profiles().await, 1);
    }

    #[tokio::test]
    async fn test_duplicate_username_is_write_failure() {
        let test_deps = TestDependencies::new();
        let deps = test_deps.deps();
        let username = Username::parse("rid").unwrap();
        let other_phone = PhoneNumber::from_local("94", "0779999999").unwrap();

        ensure_profile(&deps, &IdentityId::for_phone(&other_phone), &username, &other_phone)
            .await
            .unwrap();
        let result = ensure_profile(&deps, &IdentityId::for_phone(&phone()), &username, &phone()).await;

        assert!(matches!(result, Err(AuthError::ProfileWriteFailed { .. })));
    }

    #[tokio::test]
    async fn test_store_failure_is_write_failure() {
        let test_deps = TestDependencies::new();
        test_deps.profiles.fail_creates(true);

        let result = ensure_profile(
            &test_deps.deps(),
            &IdentityId::for_phone(&phone()),
            &Username::parse("rid").unwrap(),
            &phone(),
        )
        .await;

        assert!(matches!(result, Err(AuthError::ProfileWriteFailed { .. })));
    }

    #[tokio::test]
    async fn test_announces_written_profile() {
        let test_deps = TestDependencies::new();
        let mut writes = test_deps.profile_writes.subscribe();
        let id = IdentityId::for_phone(&phone());

        ensure_profile(&test_deps.deps(), &id, &Username::parse("rid").unwrap(), &phone())
            .await
            .unwrap();

        assert_eq!(writes.try_recv().unwrap(), id);
    }

    #[tokio::test]
    async fn test_failed_write_is_not_announced() {
        let test_deps = TestDependencies::new();
        test_deps.profiles.fail_creates(true);
        let mut writes = test_deps.profile_writes.subscribe();

        let _ = ensure_profile(
            &test_deps.deps(),
            &IdentityId::for_phone(&phone()),
            &Username::parse("rid").unwrap(),
            &phone(),
        )
        .await;

        assert!(writes.try_recv().is_err());
    }
}
