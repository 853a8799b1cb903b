//! Stale-while-revalidate session cache.
//!
//! [`SessionCache`] produces the single snapshot the view renders from. It
//! starts from the durable cache entry, revalidates against the backend
//! whenever the signed-in identity changes, and writes every fresh record
//! back to durable storage.

use crate::auth::{AuthProvider, AuthState, ExternalIdentity};
use crate::config::SessionConfig;
use crate::error::Result;
use crate::session::memo::{MemoStats, ProfileMemo};
use crate::session::profile::{ApplicationUser, BackendUserFetch, ProfileRecord};
use crate::session::store::{DurableStore, UserCache};
use crate::view::{Navigator, Route};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

/// What the view renders from.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SessionSnapshot {
    /// Current user. `None` means authenticated features are unavailable
    /// right now, not necessarily that nobody is signed in.
    pub user: Option<ApplicationUser>,
    /// Nothing to show yet and the record is still being resolved.
    pub is_loading: bool,
    /// A fetch for the current identity is in flight.
    pub is_validating: bool,
}

/// Derive the memo/in-flight key for an identity.
#[must_use]
pub fn identity_key(identity: &ExternalIdentity) -> String {
    format!("user-{}", identity.id)
}

/// Session cache shared between the view and its background fetches.
///
/// Cloning is cheap and yields a handle to the same session. Methods that
/// start fetches must be called from within a Tokio runtime.
#[derive(Clone)]
pub struct SessionCache {
    inner: Arc<SessionInner>,
}

struct SessionInner {
    fetcher: Arc<dyn BackendUserFetch>,
    cache: UserCache,
    memo: ProfileMemo,
    state: Mutex<SessionState>,
    snapshot_tx: watch::Sender<SessionSnapshot>,
    next_ticket: AtomicU64,
}

#[derive(Default)]
struct SessionState {
    ready: bool,
    identity: Option<ExternalIdentity>,
    current_key: Option<String>,
    /// Entry loaded from durable storage at startup.
    fallback: Option<ApplicationUser>,
    /// Record shown for the current identity.
    data: Option<ApplicationUser>,
    in_flight: HashMap<String, InFlight>,
}

struct InFlight {
    ticket: u64,
    handle: AbortHandle,
}

impl SessionState {
    fn snapshot(&self) -> SessionSnapshot {
        let is_validating = self
            .current_key
            .as_ref()
            .is_some_and(|key| self.in_flight.contains_key(key));
        // Before the provider is ready there is nothing to revalidate yet, but
        // the view still has nothing to show unless the fallback exists.
        let is_loading = if self.ready {
            is_validating && self.data.is_none()
        } else {
            self.data.is_none()
        };

        SessionSnapshot {
            user: self.data.clone(),
            is_loading,
            is_validating,
        }
    }
}

impl SessionCache {
    /// Create a session cache, loading the durable entry as fallback.
    #[must_use]
    pub fn new(
        config: &SessionConfig,
        store: Arc<dyn DurableStore>,
        fetcher: Arc<dyn BackendUserFetch>,
    ) -> Self {
        let cache = UserCache::new(store, config.cache_key.clone());
        let fallback = cache.load();

        let state = SessionState {
            data: fallback.clone(),
            fallback,
            ..SessionState::default()
        };
        let (snapshot_tx, _) = watch::channel(state.snapshot());

        info!(
            "Session cache initialized (cache_key={}, fallback={})",
            cache.key(),
            state.fallback.is_some()
        );

        Self {
            inner: Arc::new(SessionInner {
                fetcher,
                cache,
                memo: ProfileMemo::with_capacity(config.memo_capacity),
                state: Mutex::new(state),
                snapshot_tx,
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Reconcile with the provider's current state.
    ///
    /// Starts a revalidating fetch when the signed-in identity changed. Calling
    /// it again with the same identity does nothing.
    pub fn sync(&self, auth: &AuthState) {
        let mut state = self.inner.state.lock();
        state.ready = auth.ready;

        if auth.ready {
            match &auth.identity {
                None => {
                    if state.current_key.take().is_some() {
                        info!("Identity signed out");
                    }
                    state.identity = None;
                    state.data = None;
                }
                Some(identity) => {
                    let key = identity_key(identity);
                    state.identity = Some(identity.clone());
                    if state.current_key.as_deref() != Some(key.as_str()) {
                        info!("Identity {} is current, revalidating", identity.id);
                        state.data = self.inner.memo.get(&key).or_else(|| {
                            state
                                .fallback
                                .clone()
                                .filter(|user| user.belongs_to(identity))
                        });
                        state.current_key = Some(key.clone());
                        self.inner.start_fetch(&mut state, key, identity.clone());
                    }
                }
            }
        }

        self.inner.publish(&state);
    }

    /// Fetch the current identity's record again.
    ///
    /// No-op when nobody is signed in or a fetch is already in flight.
    pub fn revalidate(&self) {
        let mut state = self.inner.state.lock();
        let (Some(key), Some(identity)) = (state.current_key.clone(), state.identity.clone())
        else {
            debug!("Nothing to revalidate");
            return;
        };
        self.inner.start_fetch(&mut state, key, identity);
        self.inner.publish(&state);
    }

    /// Sign out: interstitial route, provider logout, cache wipe, landing route.
    ///
    /// Provider failures are logged; local cleanup and navigation always run.
    pub async fn logout(&self, auth: &dyn AuthProvider, navigator: &dyn Navigator) {
        info!("Initiating user logout");
        navigator.navigate(Route::Refresh);

        if let Err(e) = auth.logout().await {
            warn!("Auth provider logout failed, clearing local session anyway: {e}");
        }

        self.inner.sign_out();
        navigator.replace(Route::Landing);
        info!("User logged out and cache cleared");
    }

    /// Current snapshot.
    #[must_use]
    pub fn snapshot(&self) -> SessionSnapshot {
        self.inner.snapshot_tx.borrow().clone()
    }

    /// Receive every snapshot change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionSnapshot> {
        self.inner.snapshot_tx.subscribe()
    }

    /// Key of the current identity, if one is signed in.
    #[must_use]
    pub fn current_key(&self) -> Option<String> {
        self.inner.state.lock().current_key.clone()
    }

    /// Number of fetches still in flight, current or superseded.
    #[must_use]
    pub fn in_flight(&self) -> usize {
        self.inner.state.lock().in_flight.len()
    }

    /// Memo statistics.
    #[must_use]
    pub fn memo_stats(&self) -> MemoStats {
        self.inner.memo.stats()
    }
}

impl SessionInner {
    fn start_fetch(
        self: &Arc<Self>,
        state: &mut SessionState,
        key: String,
        identity: ExternalIdentity,
    ) {
        if state.in_flight.contains_key(&key) {
            debug!("Fetch for {key} already in flight");
            return;
        }

        let ticket = self.next_ticket.fetch_add(1, Ordering::Relaxed);
        let inner = Arc::clone(self);
        let task_key = key.clone();
        let handle = tokio::spawn(async move {
            debug!("Fetching profile for {}", identity.id);
            let result = inner.fetcher.fetch_profile(&identity).await;
            inner.complete(&task_key, ticket, identity, result);
        });

        state.in_flight.insert(
            key,
            InFlight {
                ticket,
                handle: handle.abort_handle(),
            },
        );
    }

    fn complete(
        &self,
        key: &str,
        ticket: u64,
        identity: ExternalIdentity,
        result: Result<ProfileRecord>,
    ) {
        let mut state = self.state.lock();
        if state.in_flight.get(key).map(|f| f.ticket) != Some(ticket) {
            debug!("Dropping result of cancelled fetch for {key}");
            return;
        }
        state.in_flight.remove(key);

        if state.current_key.as_deref() != Some(key) {
            debug!("Discarding late profile for {key}, identity changed");
            self.publish(&state);
            return;
        }

        match result {
            Ok(profile) => {
                let user = ApplicationUser::new(profile, identity);
                self.memo.insert(key.to_string(), user.clone());
                self.cache.save(&user);
                info!("Profile for {} refreshed", user.id());
                state.data = Some(user);
            }
            Err(e) => {
                warn!(
                    "Failed to fetch profile for {}, keeping previous snapshot: {e}",
                    identity.id
                );
            }
        }

        self.publish(&state);
    }

    /// Forget the session and wipe the durable entry in one critical section,
    /// so no fetch completing concurrently can write the user back.
    fn sign_out(&self) {
        let mut state = self.state.lock();
        for (_, fetch) in state.in_flight.drain() {
            fetch.handle.abort();
        }
        state.identity = None;
        state.current_key = None;
        state.fallback = None;
        state.data = None;
        self.memo.clear();
        self.cache.clear();
        self.publish(&state);
    }

    fn publish(&self, state: &SessionState) {
        let next = state.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == next {
                false
            } else {
                *current = next;
                true
            }
        });
    }
}
