//! Test harness wiring a `RunningApp` to in-process fakes.
//!
//! The `TestHarness` owns the shared fakes so several app instances can be
//! built over the same backend and durable store, as happens across restarts.

use async_trait::async_trait;
use copilot_session::{
    AppBuilder, AuthProvider, AuthState, BackendUserFetch, ClientConfig, DurableStore,
    ExternalIdentity, MemoryStore, Navigator, Notification, Notifier, ProfileRecord, Route,
    RunningApp, SessionSnapshot, StaticAuthProvider, TransactionOracle, TransactionStatus,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Error type for test harness operations.
#[derive(Debug, thiserror::Error)]
pub enum HarnessError {
    /// The app failed to build or run.
    #[error("App error: {0}")]
    App(#[from] copilot_session::Error),

    /// A condition was not reached in time.
    #[error("Timed out waiting for {0}")]
    Timeout(&'static str),

    /// A watch channel closed.
    #[error("Channel closed while waiting for {0}")]
    Closed(&'static str),
}

/// Result type for harness operations.
pub type Result<T> = std::result::Result<T, HarnessError>;

/// Backend serving canned profiles with optional per-user latency.
#[derive(Default)]
pub struct FakeBackend {
    profiles: Mutex<HashMap<String, ProfileRecord>>,
    latency: Mutex<HashMap<String, Duration>>,
    calls: Mutex<Vec<String>>,
}

impl FakeBackend {
    /// Serve `profile` for identity `user_id`.
    pub fn insert(&self, user_id: &str, profile: ProfileRecord) {
        self.profiles.lock().insert(user_id.to_string(), profile);
    }

    /// Delay responses for `user_id`.
    pub fn set_latency(&self, user_id: &str, latency: Duration) {
        self.latency.lock().insert(user_id.to_string(), latency);
    }

    /// Identity ids fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().clone()
    }
}

#[async_trait]
impl BackendUserFetch for FakeBackend {
    async fn fetch_profile(
        &self,
        identity: &ExternalIdentity,
    ) -> copilot_session::Result<ProfileRecord> {
        self.calls.lock().push(identity.id.clone());

        let latency = self.latency.lock().get(&identity.id).copied();
        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        self.profiles
            .lock()
            .get(&identity.id)
            .cloned()
            .ok_or_else(|| copilot_session::Error::Backend(format!("no user {}", identity.id)))
    }
}

/// Oracle that confirms from the n-th check on, or never.
pub struct FakeOracle {
    confirm_from: Option<u32>,
    checks: AtomicU32,
}

impl FakeOracle {
    /// Confirm on check `n` and every check after it.
    pub fn confirming_at(n: u32) -> Self {
        Self {
            confirm_from: Some(n),
            checks: AtomicU32::new(0),
        }
    }

    /// Never confirm.
    pub fn never() -> Self {
        Self {
            confirm_from: None,
            checks: AtomicU32::new(0),
        }
    }

    /// Checks answered so far.
    pub fn checks(&self) -> u32 {
        self.checks.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl TransactionOracle for FakeOracle {
    async fn check(&self, _tx_hash: &str) -> copilot_session::Result<TransactionStatus> {
        let n = self.checks.fetch_add(1, Ordering::SeqCst) + 1;
        Ok(TransactionStatus {
            success: self.confirm_from.is_some_and(|from| n >= from),
        })
    }
}

/// Something the app asked of the view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ViewCall {
    /// `navigate(route)`
    Navigate(Route),
    /// `replace(route)`
    Replace(Route),
    /// Success toast.
    Success(Notification),
    /// Error toast.
    Error(Notification),
}

/// Navigator and notifier recording every call in order.
#[derive(Default)]
pub struct RecordingView {
    calls: Mutex<Vec<ViewCall>>,
}

impl RecordingView {
    /// Calls so far.
    pub fn calls(&self) -> Vec<ViewCall> {
        self.calls.lock().clone()
    }

    /// Titles of the notifications shown so far.
    pub fn toast_titles(&self) -> Vec<String> {
        self.calls
            .lock()
            .iter()
            .filter_map(|call| match call {
                ViewCall::Success(n) | ViewCall::Error(n) => Some(n.title.clone()),
                ViewCall::Navigate(_) | ViewCall::Replace(_) => None,
            })
            .collect()
    }
}

impl Navigator for RecordingView {
    fn navigate(&self, route: Route) {
        self.calls.lock().push(ViewCall::Navigate(route));
    }

    fn replace(&self, route: Route) {
        self.calls.lock().push(ViewCall::Replace(route));
    }
}

impl Notifier for RecordingView {
    fn notify_success(&self, notification: &Notification) {
        self.calls
            .lock()
            .push(ViewCall::Success(notification.clone()));
    }

    fn notify_error(&self, notification: &Notification) {
        self.calls.lock().push(ViewCall::Error(notification.clone()));
    }
}

/// Shared test environment.
pub struct TestHarness {
    /// Configuration every app is built with.
    pub config: ClientConfig,
    /// Auth provider driven by the test.
    pub auth: Arc<StaticAuthProvider>,
    /// Backend fake.
    pub backend: Arc<FakeBackend>,
    /// Oracle fake.
    pub oracle: Arc<FakeOracle>,
    /// Durable store shared across app instances.
    pub store: Arc<MemoryStore>,
    /// View fake.
    pub view: Arc<RecordingView>,
}

impl TestHarness {
    /// Harness with default configuration, a signed-out provider and an oracle
    /// that never confirms.
    pub fn setup() -> Self {
        Self::setup_with_oracle(FakeOracle::never())
    }

    /// Harness using `oracle`.
    pub fn setup_with_oracle(oracle: FakeOracle) -> Self {
        info!("Setting up copilot-session test harness");
        Self {
            config: ClientConfig::default(),
            auth: Arc::new(StaticAuthProvider::new(AuthState::signed_out())),
            backend: Arc::new(FakeBackend::default()),
            oracle: Arc::new(oracle),
            store: Arc::new(MemoryStore::new()),
            view: Arc::new(RecordingView::default()),
        }
    }

    /// Sign `user_id` in and have the backend know them as `profile_id`.
    pub fn sign_in(&self, user_id: &str, profile_id: &str) {
        self.backend.insert(user_id, ProfileRecord::new(profile_id));
        self.auth
            .set_state(AuthState::signed_in(ExternalIdentity::new(user_id)));
    }

    /// Builder with every fake wired in.
    pub fn builder(&self) -> AppBuilder {
        let auth: Arc<dyn AuthProvider> = self.auth.clone();
        self.builder_with_auth(auth)
    }

    /// Builder with every fake wired in except the auth provider.
    pub fn builder_with_auth(&self, auth: Arc<dyn AuthProvider>) -> AppBuilder {
        let store: Arc<dyn DurableStore> = self.store.clone();
        AppBuilder::new(self.config.clone())
            .with_auth(auth)
            .with_user_fetch(self.backend.clone())
            .with_oracle(self.oracle.clone())
            .with_store(store)
            .with_navigator(self.view.clone())
            .with_notifier(self.view.clone())
    }

    /// Builder persisting to the default file store under `root_dir`.
    pub fn builder_on_disk(&self, root_dir: &Path) -> AppBuilder {
        let mut config = self.config.clone();
        config.root_dir = root_dir.to_path_buf();
        AppBuilder::new(config)
            .with_auth(self.auth.clone())
            .with_user_fetch(self.backend.clone())
            .with_oracle(self.oracle.clone())
            .with_navigator(self.view.clone())
            .with_notifier(self.view.clone())
    }

    /// Build an app over the shared fakes.
    ///
    /// # Errors
    ///
    /// Returns an error if the app fails to build.
    pub async fn app(&self) -> Result<RunningApp> {
        Ok(self.builder().build().await?)
    }
}

/// Wait until the session settles on a user fetched for `user_id`.
///
/// # Errors
///
/// Returns an error if that does not happen within 30 seconds.
pub async fn wait_for_user(app: &RunningApp, user_id: &str) -> Result<SessionSnapshot> {
    let mut session_rx = app.subscribe_session();
    let wait = session_rx.wait_for(|snapshot| {
        !snapshot.is_validating
            && snapshot
                .user
                .as_ref()
                .is_some_and(|user| user.id() == user_id)
    });

    let outcome = tokio::time::timeout(Duration::from_secs(30), wait).await;
    match outcome {
        Ok(Ok(snapshot)) => Ok(snapshot.clone()),
        Ok(Err(_)) => Err(HarnessError::Closed("session")),
        Err(_) => Err(HarnessError::Timeout("session user")),
    }
}
