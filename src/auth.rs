//! Authentication provider boundary.
//!
//! The provider's login flow is opaque to the core. All the session cache
//! needs is whether the provider finished initializing and, if so, which
//! identity (if any) is signed in.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::watch;
use tracing::info;

/// The authenticated principal as known to the authentication provider.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExternalIdentity {
    /// Stable provider-side identifier.
    pub id: String,
    /// Linked email address, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    /// Linked wallet address, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wallet_address: Option<String>,
}

impl ExternalIdentity {
    /// Identity with only an id.
    #[must_use]
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            email: None,
            wallet_address: None,
        }
    }
}

/// Snapshot of the provider's session state.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AuthState {
    /// The provider finished initializing.
    pub ready: bool,
    /// Signed-in identity, if any.
    pub identity: Option<ExternalIdentity>,
}

impl AuthState {
    /// Provider still initializing.
    #[must_use]
    pub fn initializing() -> Self {
        Self::default()
    }

    /// Provider ready with nobody signed in.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            ready: true,
            identity: None,
        }
    }

    /// Provider ready with `identity` signed in.
    #[must_use]
    pub fn signed_in(identity: ExternalIdentity) -> Self {
        Self {
            ready: true,
            identity: Some(identity),
        }
    }
}

/// Capability exposed by the authentication provider.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    /// Current session state.
    fn state(&self) -> AuthState;

    /// Sign the current identity out with the provider.
    async fn logout(&self) -> Result<()>;

    /// Stream of state changes, for providers that can push them.
    fn subscribe(&self) -> Option<watch::Receiver<AuthState>> {
        None
    }
}

/// Provider whose state is set by the embedder.
///
/// Used by the CLI, where the identity comes from arguments, and by tests.
#[derive(Debug)]
pub struct StaticAuthProvider {
    state_tx: watch::Sender<AuthState>,
}

impl StaticAuthProvider {
    /// Create a provider starting in `state`.
    #[must_use]
    pub fn new(state: AuthState) -> Self {
        let (state_tx, _) = watch::channel(state);
        Self { state_tx }
    }

    /// Replace the session state and notify subscribers.
    pub fn set_state(&self, state: AuthState) {
        self.state_tx.send_replace(state);
    }
}

#[async_trait]
impl AuthProvider for StaticAuthProvider {
    fn state(&self) -> AuthState {
        self.state_tx.borrow().clone()
    }

    async fn logout(&self) -> Result<()> {
        info!("Signing out with static auth provider");
        self.state_tx.send_replace(AuthState::signed_out());
        Ok(())
    }

    fn subscribe(&self) -> Option<watch::Receiver<AuthState>> {
        Some(self.state_tx.subscribe())
    }
}
