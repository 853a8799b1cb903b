//! Identity/session cache for copilot-session.
//!
//! Reconciles the authentication provider's identity with the application
//! user record served by the backend, using stale-while-revalidate:
//!
//! ```text
//! startup
//!    │
//!    ▼
//! ┌──────────────────────┐
//! │ Load durable entry   │──► fallback snapshot (no loading state)
//! └──────────┬───────────┘
//!            │ provider ready
//!     ┌──────┴──────┐
//!     │             │
//!  SIGNED OUT    SIGNED IN (key = user-{id})
//!     │             │
//!     ▼             ▼
//!  user = None   key changed?
//!                   │ yes
//!                   ▼
//!            Fetch profile (one per key)
//!                   │
//!            ┌──────┴──────┐
//!            │             │
//!         SUCCESS        ERROR
//!            │             │
//!            ▼             ▼
//!   key still current?   keep previous
//!            │ yes
//!            ▼
//!   snapshot + memo + durable write
//! ```

mod cache;
mod memo;
mod profile;
mod store;

pub use cache::{identity_key, SessionCache, SessionSnapshot};
pub use memo::{MemoStats, ProfileMemo};
pub use profile::{ApplicationUser, BackendUserFetch, ProfileRecord};
pub use store::{DurableStore, FileStore, MemoryStore, UserCache};
