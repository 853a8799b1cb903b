//! Transaction oracle capability.

use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Oracle answer for one transaction check.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionStatus {
    /// The transaction reached success. `false` covers both "failed" and
    /// "not found yet"; the poller treats them alike.
    pub success: bool,
}

impl TransactionStatus {
    /// A confirmed transaction.
    #[must_use]
    pub const fn confirmed() -> Self {
        Self { success: true }
    }

    /// A transaction that is not confirmed yet.
    #[must_use]
    pub const fn unconfirmed() -> Self {
        Self { success: false }
    }
}

/// Remote service reporting whether a transaction finalized.
#[async_trait]
pub trait TransactionOracle: Send + Sync {
    /// Check `tx_hash` once.
    ///
    /// # Errors
    ///
    /// Returns an error when the oracle could not be asked or did not answer.
    async fn check(&self, tx_hash: &str) -> Result<TransactionStatus>;
}
