//! Hosting view: wires the session cache and the verification poller to
//! their capabilities.

use crate::auth::{AuthProvider, AuthState};
use crate::config::ClientConfig;
use crate::error::{Error, Result};
use crate::event::{
    create_event_channel, ClientEvent, ClientEventsChannel, ClientEventsSender, EventSink,
};
use crate::remote::{HttpTransactionOracle, HttpUserFetch};
use crate::session::{BackendUserFetch, DurableStore, FileStore, SessionCache, SessionSnapshot};
use crate::verification::{TransactionOracle, VerificationAttempt, VerificationPoller};
use crate::view::{Navigator, Notifier};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, info};

/// Builder for a [`RunningApp`].
///
/// Every capability except the auth provider has a default derived from the
/// configuration.
pub struct AppBuilder {
    config: ClientConfig,
    auth: Option<Arc<dyn AuthProvider>>,
    user_fetch: Option<Arc<dyn BackendUserFetch>>,
    oracle: Option<Arc<dyn TransactionOracle>>,
    store: Option<Arc<dyn DurableStore>>,
    navigator: Option<Arc<dyn Navigator>>,
    notifier: Option<Arc<dyn Notifier>>,
}

impl AppBuilder {
    /// Create a builder with the given configuration.
    #[must_use]
    pub fn new(config: ClientConfig) -> Self {
        Self {
            config,
            auth: None,
            user_fetch: None,
            oracle: None,
            store: None,
            navigator: None,
            notifier: None,
        }
    }

    /// Authentication provider. Required.
    #[must_use]
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.auth = Some(auth);
        self
    }

    /// Backend user fetch. Defaults to [`HttpUserFetch`].
    #[must_use]
    pub fn with_user_fetch(mut self, user_fetch: Arc<dyn BackendUserFetch>) -> Self {
        self.user_fetch = Some(user_fetch);
        self
    }

    /// Transaction oracle. Defaults to [`HttpTransactionOracle`].
    #[must_use]
    pub fn with_oracle(mut self, oracle: Arc<dyn TransactionOracle>) -> Self {
        self.oracle = Some(oracle);
        self
    }

    /// Durable store. Defaults to a [`FileStore`] under `root_dir`.
    #[must_use]
    pub fn with_store(mut self, store: Arc<dyn DurableStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Navigator. Defaults to the app's [`EventSink`].
    #[must_use]
    pub fn with_navigator(mut self, navigator: Arc<dyn Navigator>) -> Self {
        self.navigator = Some(navigator);
        self
    }

    /// Notifier. Defaults to the app's [`EventSink`].
    #[must_use]
    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Build the app. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is invalid, no auth provider was
    /// supplied, or a default HTTP client cannot be built.
    pub async fn build(self) -> Result<RunningApp> {
        debug!("Building copilot-session with config: {:?}", self.config);
        self.config.validate()?;

        let auth = self
            .auth
            .ok_or_else(|| Error::Config("an auth provider is required".to_string()))?;

        let store: Arc<dyn DurableStore> = match self.store {
            Some(store) => store,
            None => Arc::new(FileStore::new(self.config.root_dir.clone())),
        };
        let user_fetch: Arc<dyn BackendUserFetch> = match self.user_fetch {
            Some(user_fetch) => user_fetch,
            None => Arc::new(HttpUserFetch::new(&self.config.backend)?),
        };
        let oracle: Arc<dyn TransactionOracle> = match self.oracle {
            Some(oracle) => oracle,
            None => Arc::new(HttpTransactionOracle::new(&self.config.oracle)?),
        };

        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let (events_tx, events_rx) = create_event_channel();
        let sink = Arc::new(EventSink::new(events_tx.clone()));

        let navigator: Arc<dyn Navigator> = match self.navigator {
            Some(navigator) => navigator,
            None => sink.clone(),
        };
        let notifier: Arc<dyn Notifier> = match self.notifier {
            Some(notifier) => notifier,
            None => sink,
        };

        let session = SessionCache::new(&self.config.session, store, user_fetch);
        let poller = VerificationPoller::new(self.config.verification, oracle, notifier);
        let forwarder = spawn_verification_forwarder(poller.subscribe(), events_tx.clone());

        Ok(RunningApp {
            config: self.config,
            auth,
            navigator,
            session,
            poller,
            forwarder,
            shutdown_tx,
            shutdown_rx,
            events_tx,
            events_rx: Some(events_rx),
        })
    }
}

/// Emits a finished event for every terminal verification state.
fn spawn_verification_forwarder(
    mut status_rx: watch::Receiver<Option<VerificationAttempt>>,
    events_tx: ClientEventsSender,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        while status_rx.changed().await.is_ok() {
            let finished = status_rx
                .borrow_and_update()
                .clone()
                .filter(|attempt| attempt.status.is_terminal());
            if let Some(attempt) = finished {
                let _ = events_tx.send(ClientEvent::VerificationFinished {
                    tx_hash: attempt.tx_hash,
                    status: attempt.status,
                });
            }
        }
    })
}

/// A running client.
pub struct RunningApp {
    config: ClientConfig,
    auth: Arc<dyn AuthProvider>,
    navigator: Arc<dyn Navigator>,
    session: SessionCache,
    poller: VerificationPoller,
    forwarder: JoinHandle<()>,
    shutdown_tx: watch::Sender<bool>,
    shutdown_rx: watch::Receiver<bool>,
    events_tx: ClientEventsSender,
    events_rx: Option<ClientEventsChannel>,
}

impl RunningApp {
    /// Directory holding the durable session cache.
    #[must_use]
    pub fn root_dir(&self) -> &PathBuf {
        &self.config.root_dir
    }

    /// Reconcile the session with the provider's current state.
    pub fn sync_identity(&self) {
        self.session.sync(&self.auth.state());
    }

    /// Current session snapshot.
    #[must_use]
    pub fn session(&self) -> SessionSnapshot {
        self.session.snapshot()
    }

    /// Receive every session snapshot change.
    #[must_use]
    pub fn subscribe_session(&self) -> watch::Receiver<SessionSnapshot> {
        self.session.subscribe()
    }

    /// The underlying session cache.
    #[must_use]
    pub fn session_cache(&self) -> &SessionCache {
        &self.session
    }

    /// Sign out and return to the landing route.
    pub async fn logout(&self) {
        self.session
            .logout(self.auth.as_ref(), self.navigator.as_ref())
            .await;
    }

    /// Start verifying a purchase transaction.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Verification`] if the hash is empty or another
    /// verification is still pending.
    pub fn register_verification(&self, tx_hash: &str) -> Result<()> {
        self.poller.register(tx_hash)?;
        let _ = self.events_tx.send(ClientEvent::VerificationStarted {
            tx_hash: tx_hash.trim().to_string(),
        });
        Ok(())
    }

    /// Pending or last finished verification.
    #[must_use]
    pub fn verification_status(&self) -> Option<VerificationAttempt> {
        self.poller.status()
    }

    /// Receive every verification state change.
    #[must_use]
    pub fn subscribe_verification(&self) -> watch::Receiver<Option<VerificationAttempt>> {
        self.poller.subscribe()
    }

    /// Get a receiver for client events.
    ///
    /// Note: Can only be called once. Subsequent calls return None.
    pub fn events(&mut self) -> Option<ClientEventsChannel> {
        self.events_rx.take()
    }

    /// Subscribe to client events.
    #[must_use]
    pub fn subscribe_events(&self) -> ClientEventsChannel {
        self.events_tx.subscribe()
    }

    /// Follow the auth provider until shutdown is requested.
    ///
    /// # Errors
    ///
    /// Returns an error if the client encounters a fatal error.
    pub async fn run(&mut self) -> Result<()> {
        info!("Starting copilot-session");
        let mut auth_rx = self.auth.subscribe();
        self.sync_identity();

        loop {
            tokio::select! {
                _ = self.shutdown_rx.changed() => {
                    if *self.shutdown_rx.borrow() {
                        info!("Shutdown signal received");
                        break;
                    }
                }
                _ = tokio::signal::ctrl_c() => {
                    info!("Ctrl-C received, initiating shutdown");
                    self.shutdown();
                    break;
                }
                state = next_auth_state(&mut auth_rx) => {
                    match state {
                        Some(state) => {
                            debug!("Auth state changed (ready={})", state.ready);
                            self.session.sync(&state);
                        }
                        None => auth_rx = None,
                    }
                }
            }
        }

        info!("copilot-session shutdown complete");
        Ok(())
    }

    /// Request shutdown. Cancels a pending verification without notifying.
    pub fn shutdown(&self) {
        self.poller.cancel();
        let _ = self.shutdown_tx.send(true);
    }
}

impl Drop for RunningApp {
    fn drop(&mut self) {
        self.forwarder.abort();
    }
}

/// Next auth state, or `None` once the provider dropped its sender. Pends
/// forever without a subscription.
async fn next_auth_state(rx: &mut Option<watch::Receiver<AuthState>>) -> Option<AuthState> {
    match rx {
        Some(rx) => match rx.changed().await {
            Ok(()) => Some(rx.borrow_and_update().clone()),
            Err(_) => None,
        },
        None => futures::future::pending().await,
    }
}
