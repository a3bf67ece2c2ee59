//! Resume the previous launch's session from the stored token

use tracing::{info, warn};

use crate::domains::auth::models::Identity;
use crate::kernel::RiderDeps;

/// Hand the stored token back to the identity provider.
///
/// Call before spawning the session listener so its first emission is the
/// resumed identity. A token the provider rejects is forgotten; a provider
/// timeout keeps it for the next launch.
pub async fn restore_session(deps: &RiderDeps) -> Option<Identity> {
    let tokens = deps.tokens.as_ref()?;

    let token = match tokens.load().await {
        Ok(Some(token)) => token,
        Ok(None) => return None,
        Err(e) => {
            warn!("Failed to load session token: {:#}", e);
            return None;
        }
    };

    match deps.with_deadline("resume", deps.identity.resume(&token)).await {
        Ok(Ok(identity)) => {
            info!("Restored session for {}", identity.id);
            Some(identity)
        }
        Ok(Err(e)) => {
            info!("Stored session is no longer valid: {}", e);
            if let Err(e) = tokens.clear().await {
                warn!("Failed to clear session token: {:#}", e);
            }
            None
        }
        Err(e) => {
            warn!("Could not restore session: {}", e);
            None
        }
    }
}
