//! # copilot-session
//!
//! Client-side session core for the copilot chat application.
//!
//! Two cooperating components live here:
//!
//! - [`SessionCache`] reconciles the authentication provider's identity with
//!   the application user record served by the backend, keeping a durable
//!   stale-while-revalidate copy across restarts.
//! - [`VerificationPoller`] confirms, within a bounded number of attempts,
//!   that a submitted payment transaction reached success on a remote oracle.
//!
//! [`AppBuilder`] wires both to their collaborators (auth provider, backend,
//! oracle, durable store, navigation and notification sinks) the way a
//! hosting view would.
//!
//! ## Example
//!
//! ```rust,ignore
//! use copilot_session::{AppBuilder, AuthState, ClientConfig, ExternalIdentity, StaticAuthProvider};
//! use std::sync::Arc;
//!
//! let auth = Arc::new(StaticAuthProvider::new(AuthState::signed_in(
//!     ExternalIdentity::new("did:privy:abc"),
//! )));
//! let app = AppBuilder::new(ClientConfig::default())
//!     .with_auth(auth)
//!     .build()
//!     .await?;
//!
//! app.sync_identity();
//! let snapshot = app.session();
//! app.register_verification("0xabc")?;
//! ```

pub mod app;
pub mod auth;
pub mod config;
pub mod error;
pub mod event;
pub mod remote;
pub mod session;
pub mod verification;
pub mod view;

pub use app::{AppBuilder, RunningApp};
pub use auth::{AuthProvider, AuthState, ExternalIdentity, StaticAuthProvider};
pub use config::{
    BackendConfig, ClientConfig, OracleConfig, SessionConfig, VerificationConfig,
};
pub use error::{Error, Result};
pub use event::{create_event_channel, ClientEvent, EventSink};
pub use remote::{HttpTransactionOracle, HttpUserFetch};
pub use session::{
    ApplicationUser, BackendUserFetch, DurableStore, FileStore, MemoryStore, ProfileRecord,
    SessionCache, SessionSnapshot, UserCache,
};
pub use verification::{
    AttemptStatus, TransactionOracle, TransactionStatus, VerificationAttempt, VerificationPoller,
};
pub use view::{Navigator, Notification, Notifier, Route};
