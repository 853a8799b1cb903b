//! Transaction verification for copilot-session.
//!
//! After a purchase the view registers the transaction hash. The poller then
//! asks the oracle at a fixed interval until it confirms or the attempt
//! budget runs out:
//!
//! ```text
//! register(tx_hash)
//!        │
//!        ▼
//! ┌──────────────────┐
//! │ wait interval    │◄──────────────┐
//! └────────┬─────────┘               │
//!          ▼                         │
//! ┌──────────────────┐               │
//! │ oracle.check     │               │
//! └────────┬─────────┘               │
//!   ┌──────┴───────┐                 │
//!   │              │                 │
//! SUCCESS    NOT YET / ERROR         │
//!   │              │                 │
//!   ▼              ▼                 │
//! notify     attempts left? ── yes ──┘
//! success          │ no
//!                  ▼
//!           notify timeout
//! ```

mod oracle;
mod poller;

pub use oracle::{TransactionOracle, TransactionStatus};
pub use poller::{AttemptStatus, VerificationAttempt, VerificationPoller};
