// TestDependencies - mock implementations for testing
//
// Provides mock gateway and repository that record their calls and can be
// told to fail, plus a builder that wires them into RiderDeps.

use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::watch;

use super::{
    BaseIdentityGateway, BaseProfileRepository, BaseTokenStore, FlowSettings, GatewayError,
    ProfileWrites, RepositoryError, RiderDeps,
};
use crate::common::{PhoneNumber, Username};
use crate::domains::auth::models::{Identity, IdentityId, PendingVerification};
use crate::domains::profile::models::ProfileRecord;
use crate::domains::profile::InMemoryProfileRepository;

// =============================================================================
// Mock Identity Gateway
// =============================================================================

/// Code the mock gateway accepts unless told otherwise
pub const MOCK_VALID_CODE: &str = "123456";

pub struct MockIdentityGateway {
    state: watch::Sender<Option<Identity>>,
    valid_code: Mutex<String>,
    /// Latest challenge issued per phone; older ones are rejected
    active_challenges: Mutex<HashMap<PhoneNumber, String>>,
    issued: AtomicUsize,
    request_calls: Arc<Mutex<Vec<PhoneNumber>>>,
    verify_calls: Arc<Mutex<Vec<(String, String)>>>,
    request_failures: Mutex<VecDeque<GatewayError>>,
    request_delay: Mutex<Option<Duration>>,
    verify_delay: Mutex<Option<Duration>>,
}

impl MockIdentityGateway {
    pub fn new() -> Self {
        Self {
            state: watch::Sender::new(None),
            valid_code: Mutex::new(MOCK_VALID_CODE.to_string()),
            active_challenges: Mutex::new(HashMap::new()),
            issued: AtomicUsize::new(0),
            request_calls: Arc::new(Mutex::new(Vec::new())),
            verify_calls: Arc::new(Mutex::new(Vec::new())),
            request_failures: Mutex::new(VecDeque::new()),
            request_delay: Mutex::new(None),
            verify_delay: Mutex::new(None),
        }
    }

    pub fn with_valid_code(self, code: &str) -> Self {
        *self.valid_code.lock().unwrap() = code.to_string();
        self
    }

    /// Queue an error for the next `request_code` call
    pub fn fail_next_request(&self, err: GatewayError) {
        self.request_failures.lock().unwrap().push_back(err);
    }

    /// Make every `request_code` call wait this long first
    pub fn with_request_delay(self, delay: Duration) -> Self {
        *self.request_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make every `verify_code` call wait this long first
    pub fn with_verify_delay(self, delay: Duration) -> Self {
        *self.verify_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Publish an identity-state change as if the provider did it
    pub fn emit(&self, identity: Option<Identity>) {
        self.state.send_replace(identity);
    }

    /// Build the identity this gateway would issue for a phone
    pub fn identity_for(phone: &PhoneNumber) -> Identity {
        Identity {
            id: IdentityId::for_phone(phone),
            phone_number: phone.clone(),
            token: format!("mock-token:{}", phone),
        }
    }

    pub fn request_count(&self) -> usize {
        self.request_calls.lock().unwrap().len()
    }

    /// Get all phones a code was requested for
    pub fn requested_phones(&self) -> Vec<PhoneNumber> {
        self.request_calls.lock().unwrap().clone()
    }

    pub fn verify_count(&self) -> usize {
        self.verify_calls.lock().unwrap().len()
    }

    /// Get all (challenge, code) pairs submitted for verification
    pub fn verify_calls(&self) -> Vec<(String, String)> {
        self.verify_calls.lock().unwrap().clone()
    }
}

impl Default for MockIdentityGateway {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseIdentityGateway for MockIdentityGateway {
    async fn request_code(
        &self,
        phone: &PhoneNumber,
    ) -> Result<PendingVerification, GatewayError> {
        // Record the call
        self.request_calls.lock().unwrap().push(phone.clone());

        let delay = *self.request_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let queued = self.request_failures.lock().unwrap().pop_front();
        if let Some(err) = queued {
            return Err(err);
        }

        let n = self.issued.fetch_add(1, Ordering::SeqCst) + 1;
        let challenge_id = format!("challenge-{n}");
        self.active_challenges
            .lock()
            .unwrap()
            .insert(phone.clone(), challenge_id.clone());

        Ok(PendingVerification {
            challenge_id,
            target_phone: phone.clone(),
        })
    }

    async fn verify_code(
        &self,
        pending: &PendingVerification,
        code: &str,
    ) -> Result<Identity, GatewayError> {
        self.verify_calls
            .lock()
            .unwrap()
            .push((pending.challenge_id.clone(), code.to_string()));

        let delay = *self.verify_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let is_active = self
            .active_challenges
            .lock()
            .unwrap()
            .get(&pending.target_phone)
            .is_some_and(|c| c == &pending.challenge_id);
        let code_matches = *self.valid_code.lock().unwrap() == code;
        if !is_active || !code_matches {
            return Err(GatewayError::InvalidCode);
        }

        let identity = Self::identity_for(&pending.target_phone);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }

    fn subscribe(&self) -> watch::Receiver<Option<Identity>> {
        self.state.subscribe()
    }

    async fn sign_out(&self) {
        self.state.send_replace(None);
    }

    async fn resume(&self, token: &str) -> Result<Identity, GatewayError> {
        let phone = token
            .strip_prefix("mock-token:")
            .and_then(|raw| PhoneNumber::from_e164(raw).ok())
            .ok_or(GatewayError::InvalidCode)?;
        let identity = Self::identity_for(&phone);
        self.state.send_replace(Some(identity.clone()));
        Ok(identity)
    }
}

// =============================================================================
// Mock Profile Repository
// =============================================================================

/// In-memory repository that counts calls and can be told to fail
pub struct MockProfileRepository {
    inner: InMemoryProfileRepository,
    username_checks: AtomicUsize,
    phone_checks: AtomicUsize,
    create_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    fail_creates: AtomicBool,
    fail_fetches: AtomicBool,
    fetch_delay: Mutex<Option<Duration>>,
    create_delay: Mutex<Option<Duration>>,
}

impl MockProfileRepository {
    pub fn new() -> Self {
        Self {
            inner: InMemoryProfileRepository::new(),
            username_checks: AtomicUsize::new(0),
            phone_checks: AtomicUsize::new(0),
            create_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            fail_creates: AtomicBool::new(false),
            fail_fetches: AtomicBool::new(false),
            fetch_delay: Mutex::new(None),
            create_delay: Mutex::new(None),
        }
    }

    /// Seed an existing profile
    pub async fn with_profile(self, record: ProfileRecord) -> Self {
        self.inner.insert(record).await;
        self
    }

    /// Seed a rider profile for the identity the mock gateway issues for `phone`
    pub async fn with_rider(self, username: &str, phone: &PhoneNumber) -> Self {
        let record = ProfileRecord::new_rider(
            IdentityId::for_phone(phone),
            &Username::parse(username).unwrap(),
            phone,
        );
        self.with_profile(record).await
    }

    pub fn fail_creates(&self, fail: bool) {
        self.fail_creates.store(fail, Ordering::SeqCst);
    }

    pub fn fail_fetches(&self, fail: bool) {
        self.fail_fetches.store(fail, Ordering::SeqCst);
    }

    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        *self.fetch_delay.lock().unwrap() = Some(delay);
        self
    }

    /// Make every `create_profile` call wait this long before writing
    pub fn with_create_delay(self, delay: Duration) -> Self {
        *self.create_delay.lock().unwrap() = Some(delay);
        self
    }

    pub fn username_check_count(&self) -> usize {
        self.username_checks.load(Ordering::SeqCst)
    }

    pub fn phone_check_count(&self) -> usize {
        self.phone_checks.load(Ordering::SeqCst)
    }

    pub fn create_count(&self) -> usize {
        self.create_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_count(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    pub async fn stored_profiles(&self) -> usize {
        self.inner.len().await
    }
}

impl Default for MockProfileRepository {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl BaseProfileRepository for MockProfileRepository {
    async fn is_username_taken(&self, username: &Username) -> Result<bool, RepositoryError> {
        self.username_checks.fetch_add(1, Ordering::SeqCst);
        self.inner.is_username_taken(username).await
    }

    async fn is_phone_registered(&self, phone: &PhoneNumber) -> Result<bool, RepositoryError> {
        self.phone_checks.fetch_add(1, Ordering::SeqCst);
        self.inner.is_phone_registered(phone).await
    }

    async fn find_by_phone(
        &self,
        phone: &PhoneNumber,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        self.inner.find_by_phone(phone).await
    }

    async fn create_profile(
        &self,
        identity_id: &IdentityId,
        username: &Username,
        phone: &PhoneNumber,
    ) -> Result<ProfileRecord, RepositoryError> {
        self.create_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.create_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_creates.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(anyhow::anyhow!(
                "mock write failure"
            )));
        }
        self.inner.create_profile(identity_id, username, phone).await
    }

    async fn fetch_profile(
        &self,
        identity_id: &IdentityId,
    ) -> Result<Option<ProfileRecord>, RepositoryError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);

        let delay = *self.fetch_delay.lock().unwrap();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        if self.fail_fetches.load(Ordering::SeqCst) {
            return Err(RepositoryError::Unavailable(anyhow::anyhow!(
                "mock read failure"
            )));
        }
        self.inner.fetch_profile(identity_id).await
    }
}

// =============================================================================
// Mock Token Store
// =============================================================================

/// Token store held in memory
#[derive(Default)]
pub struct MockTokenStore {
    token: Mutex<Option<String>>,
    saves: AtomicUsize,
}

impl MockTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with a token already saved, as if from a previous launch
    pub fn with_token(self, token: &str) -> Self {
        *self.token.lock().unwrap() = Some(token.to_string());
        self
    }

    pub fn saved_token(&self) -> Option<String> {
        self.token.lock().unwrap().clone()
    }

    pub fn save_count(&self) -> usize {
        self.saves.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl BaseTokenStore for MockTokenStore {
    async fn load(&self) -> anyhow::Result<Option<String>> {
        Ok(self.saved_token())
    }

    async fn save(&self, token: &str) -> anyhow::Result<()> {
        self.saves.fetch_add(1, Ordering::SeqCst);
        *self.token.lock().unwrap() = Some(token.to_string());
        Ok(())
    }

    async fn clear(&self) -> anyhow::Result<()> {
        *self.token.lock().unwrap() = None;
        Ok(())
    }
}

// =============================================================================
// TestDependencies
// =============================================================================

/// Mocks plus the RiderDeps that wraps them.
///
/// Every `deps()` call shares the same mocks and profile-write channel, so
/// flows and the session listener built from it see each other.
pub struct TestDependencies {
    pub gateway: Arc<MockIdentityGateway>,
    pub profiles: Arc<MockProfileRepository>,
    pub tokens: Arc<MockTokenStore>,
    pub profile_writes: ProfileWrites,
    pub settings: FlowSettings,
}

impl TestDependencies {
    pub fn new() -> Self {
        Self {
            gateway: Arc::new(MockIdentityGateway::new()),
            profiles: Arc::new(MockProfileRepository::new()),
            tokens: Arc::new(MockTokenStore::new()),
            profile_writes: ProfileWrites::new(),
            settings: FlowSettings::default(),
        }
    }

    pub fn with_gateway(mut self, gateway: MockIdentityGateway) -> Self {
        self.gateway = Arc::new(gateway);
        self
    }

    pub fn with_profiles(mut self, profiles: MockProfileRepository) -> Self {
        self.profiles = Arc::new(profiles);
        self
    }

    pub fn with_tokens(mut self, tokens: MockTokenStore) -> Self {
        self.tokens = Arc::new(tokens);
        self
    }

    pub fn with_settings(mut self, settings: FlowSettings) -> Self {
        self.settings = settings;
        self
    }

    pub fn deps(&self) -> RiderDeps {
        RiderDeps::new(self.gateway.clone(), self.profiles.clone(), self.settings)
            .with_token_store(self.tokens.clone())
            .with_profile_writes(self.profile_writes.clone())
    }
}

impl Default for TestDependencies {
    fn default() -> Self {
        Self::new()
    }
}
