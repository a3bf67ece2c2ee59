//! Client dependencies for the onboarding flows (using traits for testability)
//!
//! This module provides the central dependency container handed to every flow
//! and to the session listener. All external services sit behind traits so
//! tests can swap in the mocks from `test_dependencies`.

use async_trait::async_trait;
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{broadcast, watch};
use tracing::{error, info, warn};
use twilio::{TwilioError, TwilioService};

use crate::common::PhoneNumber;
use crate::domains::auth::models::{Identity, IdentityId, PendingVerification};
use crate::domains::auth::{AuthError, JwtService};
use crate::kernel::{BaseIdentityGateway, BaseProfileRepository, BaseTokenStore, GatewayError};

/// Number that skips Twilio when `TEST_IDENTIFIER_ENABLED` is set
pub const TEST_PHONE_NUMBER: &str = "+1234567890";
/// Code accepted for [`TEST_PHONE_NUMBER`]
pub const TEST_CODE: &str = "123456";
const TEST_CHALLENGE_ID: &str = "test-challenge";

pub fn is_test_identifier(phone: &PhoneNumber) -> bool {
    phone.as_str() == TEST_PHONE_NUMBER
}

// =============================================================================
// Twilio-backed identity gateway (implements BaseIdentityGateway trait)
// =============================================================================

/// Identity gateway that verifies numbers through Twilio Verify and issues
/// its own session tokens.
pub struct TwilioIdentityGateway {
    twilio: Arc<TwilioService>,
    jwt_service: Arc<JwtService>,
    state: watch::Sender<Option<Identity>>,
    test_identifier_enabled: bool,
}

impl TwilioIdentityGateway {
    pub fn new(twilio: Arc<TwilioService>, jwt_service: Arc<JwtService>) -> Self {
        Self {
            twilio,
            jwt_service,
            state: watch::Sender::new(None),
            test_identifier_enabled: false,
        }
    }

    pub fn with_test_identifier(mut self, enabled: bool) -> Self {
        // Production safety check - test identifier should never be enabled in production
        if enabled && !cfg!(debug_assertions) {
            error!("SECURITY WARNING: TEST_IDENTIFIER_ENABLED is true in a release build!");
        }
        self.test_identifier_enabled = enabled;
        self
    }

    fn bypasses_twilio(&self, phone: &PhoneNumber) -> bool {
        self.test_identifier_enabled && is_test_identifier(phone)
    }

    /// Issue a token for a verified number and publish the identity.
    fn sign_in(&self, phone: &PhoneNumber) -> Result<Identity, GatewayError> {
        let id = IdentityId::for_phone(phone);
        let token = self
            .jwt_service
            .issue(&id, phone)
            .map_err(|e| GatewayError::ProviderUnavailable {
                reason: format!("failed to issue session token: {e}"),
            })?;

        let identity = Identity {
            id,
            phone_number: phone.clone(),
            token,
        };
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

fn unavailable(err: TwilioError) -> GatewayError {
    GatewayError::ProviderUnavailable {
        reason: err.to_string(),
    }
}

#[async_trait]
impl BaseIdentityGateway for TwilioIdentityGateway {
    async fn request_code(
        &self,
        phone: &PhoneNumber,
    ) -> Result<PendingVerification, GatewayError> {
        if self.bypasses_twilio(phone) {
            info!("Test identifier: skipping actual OTP send for {}", phone);
            return Ok(PendingVerification {
                challenge_id: TEST_CHALLENGE_ID.to_string(),
                target_phone: phone.clone(),
            });
        }

        let sent = self
            .twilio
            .send_otp(phone.as_str())
            .await
            .map_err(|e| match e {
                TwilioError::InvalidRecipient { .. } => GatewayError::InvalidPhone {
                    phone_number: phone.to_string(),
                },
                other => {
                    error!("Failed to send OTP: {}", other);
                    unavailable(other)
                }
            })?;

        info!(challenge = %sent.sid, "OTP sent to {}", phone);
        Ok(PendingVerification {
            challenge_id: sent.sid,
            target_phone: phone.clone(),
        })
    }

    async fn verify_code(
        &self,
        pending: &PendingVerification,
        code: &str,
    ) -> Result<Identity, GatewayError> {
        if self.bypasses_twilio(&pending.target_phone) {
            info!(
                "Test identifier: skipping Twilio verification for {}",
                pending.target_phone
            );
            if code != TEST_CODE {
                return Err(GatewayError::InvalidCode);
            }
            return self.sign_in(&pending.target_phone);
        }

        let check = self
            .twilio
            .verify_otp(&pending.challenge_id, code)
            .await
            .map_err(|e| match e {
                TwilioError::VerificationNotFound | TwilioError::InvalidRecipient { .. } => {
                    GatewayError::InvalidCode
                }
                other => {
                    error!("OTP verification failed: {}", other);
                    unavailable(other)
                }
            })?;

        if !check.is_approved() {
            warn!(status = %check.status, "OTP rejected for {}", pending.target_phone);
            return Err(GatewayError::InvalidCode);
        }

        info!("OTP verified for {}", pending.target_phone);
        self.sign_in(&pending.target_phone)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    async fn sign_out(&self) {
        info!("Signing out");
        self.state.send_replace(None);
    }

    async fn resume(&self, token: &str) -> Result<Identity, GatewayError> {
        let session = self.jwt_service.verify(token).map_err(|e| {
            warn!("Stored session token rejected: {}", e);
            GatewayError::InvalidCode
        })?;

        let identity = Identity {
            id: session.identity_id,
            phone_number: session.phone_number,
            token: token.to_string(),
        };
        info!("Resumed session for {}", identity.id);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

// =============================================================================
// RiderDeps
// =============================================================================

/// Tunables shared by every flow
#[derive(Debug, Clone, Copy)]
pub struct FlowSettings {
    /// Upper bound for any single gateway or repository call
    pub provider_timeout: Duration,
    /// Countdown before a new code may be requested
    pub resend_cooldown_secs: u32,
}

impl Default for FlowSettings {
    fn default() -> Self {
        Self {
            provider_timeout: Duration::from_secs(15),
            resend_cooldown_secs: 60,
        }
    }
}

/// Announces identities whose profile was just written.
///
/// The session listener subscribes so a profile created after its first
/// fetch still reaches the store. Clones share one channel.
#[derive(Clone)]
pub struct ProfileWrites {
    tx: broadcast::Sender<IdentityId>,
}

impl ProfileWrites {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(16);
        Self { tx }
    }

    pub fn notify(&self, identity_id: &IdentityId) {
        // No receivers just means no listener is running
        let _ = self.tx.send(identity_id.clone());
    }

    pub fn subscribe(&self) -> broadcast::Receiver<IdentityId> {
        self.tx.subscribe()
    }
}

impl Default for ProfileWrites {
    fn default() -> Self {
        Self::new()
    }
}

/// Dependencies accessible to flows and the session listener
#[derive(Clone)]
pub struct RiderDeps {
    pub identity: Arc<dyn BaseIdentityGateway>,
    pub profiles: Arc<dyn BaseProfileRepository>,
    /// Where the session token survives restarts; sessions are not kept when unset
    pub tokens: Option<Arc<dyn BaseTokenStore>>,
    pub profile_writes: ProfileWrites,
    pub settings: FlowSettings,
}

impl RiderDeps {
    pub fn new(
        identity: Arc<dyn BaseIdentityGateway>,
        profiles: Arc<dyn BaseProfileRepository>,
        settings: FlowSettings,
    ) -> Self {
        Self {
            identity,
            profiles,
            tokens: None,
            profile_writes: ProfileWrites::new(),
            settings,
        }
    }

    pub fn with_token_store(mut self, tokens: Arc<dyn BaseTokenStore>) -> Self {
        self.tokens = Some(tokens);
        self
    }

    /// Share an existing profile-write channel instead of the one from `new`
    pub fn with_profile_writes(mut self, profile_writes: ProfileWrites) -> Self {
        self.profile_writes = profile_writes;
        self
    }

    /// Run a collaborator call under the provider timeout.
    ///
    /// An elapsed deadline is reported as `ProviderUnavailable`; the inner
    /// result is returned untouched for the caller to map.
    pub async fn with_deadline<F>(&self, operation: &str, fut: F) -> Result<F::Output, AuthError>
    where
        F: Future,
    {
        tokio::time::timeout(self.settings.provider_timeout, fut)
            .await
            .map_err(|_| {
                warn!(
                    "{} timed out after {:?}",
                    operation, self.settings.provider_timeout
                );
                AuthError::ProviderUnavailable {
                    reason: format!("{operation} timed out"),
                }
            })
    }
}
