//! Complete profile action - recovery for identities without a profile

use tracing::info;

use crate::common::Username;
use crate::domains::auth::AuthError;
use crate::domains::profile::actions::ensure_profile;
use crate::domains::profile::models::ProfileRecord;
use crate::domains::session::SessionHandle;
use crate::kernel::RiderDeps;

/// Write the missing profile for the signed-in identity.
///
/// Used when verification succeeded but the profile write did not, leaving
/// the session with an identity and no profile. The write is announced to
/// the listener by `ensure_profile`.
pub async fn complete_profile(
    deps: &RiderDeps,
    session: &SessionHandle,
    username: &str,
) -> Result<ProfileRecord, AuthError> {
    let username = Username::parse(username)?;
    let snapshot = session.store().snapshot();
    let identity = snapshot.identity.ok_or(AuthError::NotSignedIn)?;

    if let Some(profile) = snapshot.profile {
        return Ok(profile);
    }

    // The listener may simply not have loaded it yet
    let stored = deps
        .with_deadline("fetch_profile", deps.profiles.fetch_profile(&identity.id))
        .await?
        .map_err(AuthError::from_read)?;
    if let Some(profile) = stored {
        session.refresh_profile();
        return Ok(profile);
    }

    let taken = deps
        .with_deadline("is_username_taken", deps.profiles.is_username_taken(&username))
        .await?
        .map_err(AuthError::from_read)?;
    if taken {
        return Err(AuthError::UsernameTaken {
            username: username.to_string(),
        });
    }

    let profile = ensure_profile(deps, &identity.id, &username, &identity.phone_number).await?;
    info!("Completed profile for {}", identity.id);
    Ok(profile)
}
