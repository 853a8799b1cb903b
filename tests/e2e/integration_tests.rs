//! End-to-end flows through the hosting app.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::wait_for_user;
use super::{FakeOracle, TestHarness, ViewCall};
use async_trait::async_trait;
use copilot_session::{
    AttemptStatus, AuthProvider, AuthState, DurableStore, Error, ExternalIdentity, ProfileRecord,
    Route,
};
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

/// Provider whose logout always fails and leaves the identity signed in.
struct StuckProvider {
    identity: ExternalIdentity,
    logouts: AtomicU32,
}

#[async_trait]
impl AuthProvider for StuckProvider {
    fn state(&self) -> AuthState {
        AuthState::signed_in(self.identity.clone())
    }

    async fn logout(&self) -> copilot_session::Result<()> {
        self.logouts.fetch_add(1, Ordering::SeqCst);
        Err(Error::Auth("provider unavailable".to_string()))
    }
}

/// A restarted app serves the durable copy at once, without a loading state,
/// and revalidates it in the background.
#[tokio::test]
async fn test_restart_serves_cached_user_without_loading() {
    let harness = TestHarness::setup();
    harness.sign_in("did:privy:u1", "clx-u1");

    let first = harness.app().await.expect("Failed to build app");
    first.sync_identity();
    wait_for_user(&first, "did:privy:u1")
        .await
        .expect("first fetch");
    drop(first);
    assert_eq!(harness.store.len(), 1);

    let second = harness.app().await.expect("Failed to build app");
    let cached = second.session();
    assert_eq!(cached.user.as_ref().map(|u| u.id()), Some("did:privy:u1"));
    assert!(!cached.is_loading);

    second.sync_identity();
    let revalidating = second.session();
    assert!(revalidating.is_validating);
    assert!(!revalidating.is_loading);

    let fresh = wait_for_user(&second, "did:privy:u1")
        .await
        .expect("revalidation");
    assert_eq!(fresh.user.expect("user").profile.id, "clx-u1");
    assert_eq!(harness.backend.calls().len(), 2);
}

/// After an identity switch the previous user's record is never served, even
/// when its fetch resolves last.
#[tokio::test(start_paused = true)]
async fn test_identity_switch_discards_late_response() {
    let harness = TestHarness::setup();
    harness.backend.set_latency("alice", Duration::from_secs(5));
    harness.backend.set_latency("bob", Duration::from_secs(1));

    let app = harness.app().await.expect("Failed to build app");
    harness.sign_in("alice", "clx-alice");
    app.sync_identity();
    harness.sign_in("bob", "clx-bob");
    app.sync_identity();

    let switched = app.session();
    assert!(switched.user.is_none());
    assert!(switched.is_loading);

    tokio::time::sleep(Duration::from_secs(2)).await;
    let snapshot = app.session();
    assert_eq!(snapshot.user.as_ref().map(|u| u.id()), Some("bob"));

    tokio::time::sleep(Duration::from_secs(10)).await;
    let snapshot = app.session();
    assert_eq!(snapshot.user.as_ref().map(|u| u.id()), Some("bob"));
    assert!(!snapshot.is_validating);

    let stored = harness
        .store
        .get("app-user-data")
        .expect("store read")
        .expect("cache entry");
    assert!(stored.contains("clx-bob"));
    assert!(!stored.contains("clx-alice"));
}

/// `run` follows provider pushes until shutdown.
#[tokio::test]
async fn test_run_follows_provider() {
    let harness = TestHarness::setup();
    let mut app = harness.app().await.expect("Failed to build app");
    let mut session_rx = app.subscribe_session();

    let runner = tokio::spawn(async move {
        app.run().await.expect("run");
        app
    });

    harness.sign_in("carol", "clx-carol");
    tokio::time::timeout(
        Duration::from_secs(5),
        session_rx.wait_for(|s| s.user.as_ref().is_some_and(|u| u.id() == "carol")),
    )
    .await
    .expect("timely")
    .expect("session open");

    harness.auth.set_state(AuthState::signed_out());
    tokio::time::timeout(
        Duration::from_secs(5),
        session_rx.wait_for(|s| s.user.is_none()),
    )
    .await
    .expect("timely")
    .expect("session open");

    runner.abort();
    let _ = runner.await;
}

/// Logout navigates, signs out, clears storage and lands, even when the
/// provider fails.
#[tokio::test]
async fn test_logout_order_survives_provider_failure() {
    let harness = TestHarness::setup();
    harness
        .backend
        .insert("dave", ProfileRecord::new("clx-dave"));
    let provider = Arc::new(StuckProvider {
        identity: ExternalIdentity::new("dave"),
        logouts: AtomicU32::new(0),
    });
    let auth: Arc<dyn AuthProvider> = provider.clone();

    let app = harness
        .builder_with_auth(auth)
        .build()
        .await
        .expect("Failed to build app");
    app.sync_identity();
    wait_for_user(&app, "dave").await.expect("fetch");
    assert_eq!(harness.store.len(), 1);

    app.logout().await;

    assert_eq!(provider.logouts.load(Ordering::SeqCst), 1);
    assert_eq!(
        harness.view.calls(),
        vec![
            ViewCall::Navigate(Route::Refresh),
            ViewCall::Replace(Route::Landing),
        ]
    );
    assert!(harness.store.is_empty());
    assert!(app.session().user.is_none());
}

/// Twenty unconfirmed checks, three seconds apart, end in exactly one
/// timeout notification.
#[tokio::test(start_paused = true)]
async fn test_verification_times_out_after_budget() {
    let harness = TestHarness::setup();
    let app = harness.app().await.expect("Failed to build app");

    app.register_verification("0xfeed").expect("register");

    tokio::time::sleep(Duration::from_millis(59_900)).await;
    assert_eq!(harness.oracle.checks(), 19);
    assert!(harness.view.calls().is_empty());

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(harness.oracle.checks(), 20);
    assert_eq!(harness.view.toast_titles(), vec!["Verification Timeout"]);

    let status = app.verification_status().expect("status");
    assert_eq!(status.status, AttemptStatus::TimedOut);
    assert_eq!(status.attempt_count, 20);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(harness.oracle.checks(), 20);
    assert_eq!(harness.view.calls().len(), 1);
}

/// A confirmation stops polling and notifies success once.
#[tokio::test(start_paused = true)]
async fn test_verification_succeeds_on_third_check() {
    let harness = TestHarness::setup_with_oracle(FakeOracle::confirming_at(3));
    let app = harness.app().await.expect("Failed to build app");

    app.register_verification("0xbeef").expect("register");
    assert!(app.register_verification("0xcafe").is_err());

    tokio::time::sleep(Duration::from_secs(30)).await;

    assert_eq!(harness.oracle.checks(), 3);
    assert_eq!(harness.view.toast_titles(), vec!["EAP Purchase Successful"]);
    let status = app.verification_status().expect("status");
    assert_eq!(status.status, AttemptStatus::Succeeded);
    assert_eq!(status.tx_hash, "0xbeef");

    app.register_verification("0xcafe")
        .expect("slot free after success");
}

/// Tearing the app down mid-verification silences it for good.
#[tokio::test(start_paused = true)]
async fn test_teardown_silences_verification() {
    let harness = TestHarness::setup();
    let app = harness.app().await.expect("Failed to build app");

    app.register_verification("0xdead").expect("register");
    tokio::time::sleep(Duration::from_millis(4_000)).await;
    assert_eq!(harness.oracle.checks(), 1);

    drop(app);
    tokio::time::sleep(Duration::from_secs(120)).await;

    assert_eq!(harness.oracle.checks(), 1);
    assert!(harness.view.calls().is_empty());
}

/// The default file store persists the user across restarts.
#[tokio::test]
async fn test_file_store_persists_across_restarts() {
    let dir = tempfile::tempdir().expect("tempdir");
    let harness = TestHarness::setup();
    harness.sign_in("erin", "clx-erin");

    let first = harness
        .builder_on_disk(dir.path())
        .build()
        .await
        .expect("Failed to build app");
    first.sync_identity();
    wait_for_user(&first, "erin").await.expect("fetch");
    drop(first);

    assert!(dir.path().join("app-user-data.json").exists());

    let second = harness
        .builder_on_disk(dir.path())
        .build()
        .await
        .expect("Failed to build app");
    let cached = second.session();
    assert_eq!(cached.user.expect("cached user").profile.id, "clx-erin");
    assert!(!cached.is_loading);
}
