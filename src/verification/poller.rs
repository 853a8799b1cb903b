//! Bounded polling loop confirming a transaction with the oracle.

use crate::config::VerificationConfig;
use crate::error::{Error, Result};
use crate::verification::oracle::TransactionOracle;
use crate::view::{Notification, Notifier};
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::watch;
use tokio::task::AbortHandle;
use tracing::{debug, info, warn};

const SUCCESS_TITLE: &str = "EAP Purchase Successful";
const SUCCESS_DESCRIPTION: &str =
    "Your Early Access Program purchase has been verified. Please refresh the page.";
const TIMEOUT_TITLE: &str = "Verification Timeout";
const TIMEOUT_DESCRIPTION: &str = "Please visit the FAQ page to manually verify your transaction.";

/// Lifecycle of a verification.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AttemptStatus {
    /// Still checking.
    Pending,
    /// The oracle confirmed the transaction.
    Succeeded,
    /// The attempt budget ran out.
    TimedOut,
}

impl AttemptStatus {
    /// Whether the verification is over.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }
}

/// State of one verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VerificationAttempt {
    /// Transaction being verified.
    pub tx_hash: String,
    /// Oracle checks completed so far.
    pub attempt_count: u32,
    /// Current status.
    pub status: AttemptStatus,
}

impl VerificationAttempt {
    fn pending(tx_hash: String) -> Self {
        Self {
            tx_hash,
            attempt_count: 0,
            status: AttemptStatus::Pending,
        }
    }
}

/// Single-slot transaction verification poller.
///
/// Checks run one at a time: the next check is scheduled only once the
/// previous one resolved. Dropping the poller cancels a pending verification.
pub struct VerificationPoller {
    inner: Arc<PollerInner>,
}

struct PollerInner {
    config: VerificationConfig,
    oracle: Arc<dyn TransactionOracle>,
    notifier: Arc<dyn Notifier>,
    slot: Mutex<Option<ActiveSlot>>,
    status_tx: watch::Sender<Option<VerificationAttempt>>,
    next_ticket: AtomicU64,
}

struct ActiveSlot {
    ticket: u64,
    attempt: VerificationAttempt,
    task: AbortHandle,
}

impl VerificationPoller {
    /// Create an idle poller.
    #[must_use]
    pub fn new(
        config: VerificationConfig,
        oracle: Arc<dyn TransactionOracle>,
        notifier: Arc<dyn Notifier>,
    ) -> Self {
        let (status_tx, _) = watch::channel(None);
        Self {
            inner: Arc::new(PollerInner {
                config,
                oracle,
                notifier,
                slot: Mutex::new(None),
                status_tx,
                next_ticket: AtomicU64::new(0),
            }),
        }
    }

    /// Start verifying `tx_hash`. Must be called from within a Tokio runtime.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Verification`] if the hash is empty or another
    /// verification is still pending.
    pub fn register(&self, tx_hash: impl Into<String>) -> Result<()> {
        let tx_hash = tx_hash.into().trim().to_string();
        if tx_hash.is_empty() {
            return Err(Error::Verification("transaction hash is empty".to_string()));
        }

        let mut slot = self.inner.slot.lock();
        if let Some(active) = slot.as_ref() {
            return Err(Error::Verification(format!(
                "verification of {} is still pending",
                active.attempt.tx_hash
            )));
        }

        info!(
            "Verifying transaction {tx_hash} (max_attempts={}, interval={:?})",
            self.inner.config.max_attempts,
            self.inner.config.poll_interval()
        );

        let ticket = self.inner.next_ticket.fetch_add(1, Ordering::Relaxed);
        let attempt = VerificationAttempt::pending(tx_hash.clone());
        let task = tokio::spawn(Arc::clone(&self.inner).run(ticket, tx_hash));

        *slot = Some(ActiveSlot {
            ticket,
            attempt: attempt.clone(),
            task: task.abort_handle(),
        });
        self.inner.status_tx.send_replace(Some(attempt));
        Ok(())
    }

    /// Stop a pending verification without notifying.
    ///
    /// Returns `true` if a verification was pending.
    pub fn cancel(&self) -> bool {
        let mut slot = self.inner.slot.lock();
        let Some(active) = slot.take() else {
            return false;
        };
        active.task.abort();
        info!(
            "Verification of {} cancelled after {} attempts",
            active.attempt.tx_hash, active.attempt.attempt_count
        );
        self.inner.status_tx.send_replace(None);
        true
    }

    /// Whether no verification is pending.
    #[must_use]
    pub fn is_idle(&self) -> bool {
        self.inner.slot.lock().is_none()
    }

    /// The pending verification, if any.
    #[must_use]
    pub fn current(&self) -> Option<VerificationAttempt> {
        self.inner
            .slot
            .lock()
            .as_ref()
            .map(|active| active.attempt.clone())
    }

    /// Latest published state: the pending attempt, or the last finished one.
    #[must_use]
    pub fn status(&self) -> Option<VerificationAttempt> {
        self.inner.status_tx.borrow().clone()
    }

    /// Receive every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<Option<VerificationAttempt>> {
        self.inner.status_tx.subscribe()
    }

    /// Poller configuration.
    #[must_use]
    pub fn config(&self) -> &VerificationConfig {
        &self.inner.config
    }
}

impl Drop for VerificationPoller {
    fn drop(&mut self) {
        self.cancel();
    }
}

impl PollerInner {
    async fn run(self: Arc<Self>, ticket: u64, tx_hash: String) {
        let max_attempts = self.config.max_attempts;

        for attempt in 1..=max_attempts {
            tokio::time::sleep(self.config.poll_interval()).await;

            match self.oracle.check(&tx_hash).await {
                Ok(status) if status.success => {
                    self.finish(ticket, attempt, AttemptStatus::Succeeded);
                    return;
                }
                Ok(_) => debug!(
                    "Transaction {tx_hash} not confirmed yet (attempt {attempt}/{max_attempts})"
                ),
                Err(e) => warn!(
                    "Verification check {attempt}/{max_attempts} for {tx_hash} failed: {e}"
                ),
            }

            if !self.record_attempt(ticket, attempt) {
                return;
            }
        }

        self.finish(ticket, max_attempts, AttemptStatus::TimedOut);
    }

    /// Returns `false` once the slot no longer belongs to `ticket`.
    fn record_attempt(&self, ticket: u64, attempt: u32) -> bool {
        let mut slot = self.slot.lock();
        match slot.as_mut() {
            Some(active) if active.ticket == ticket => {
                active.attempt.attempt_count = attempt;
                self.status_tx.send_replace(Some(active.attempt.clone()));
                true
            }
            _ => false,
        }
    }

    fn finish(&self, ticket: u64, attempts: u32, status: AttemptStatus) {
        // The slot is released before notifying; a cancel that got the lock
        // first has already taken it.
        let attempt = {
            let mut slot = self.slot.lock();
            if slot.as_ref().map(|active| active.ticket) != Some(ticket) {
                return;
            }
            let Some(mut active) = slot.take() else {
                return;
            };
            active.attempt.attempt_count = attempts;
            active.attempt.status = status;
            self.status_tx.send_replace(Some(active.attempt.clone()));
            active.attempt
        };

        match status {
            AttemptStatus::Succeeded => {
                info!(
                    "Transaction {} verified after {attempts} attempts",
                    attempt.tx_hash
                );
                self.notifier
                    .notify_success(&Notification::new(SUCCESS_TITLE, SUCCESS_DESCRIPTION));
            }
            AttemptStatus::TimedOut => {
                warn!(
                    "Transaction {} not verified after {attempts} attempts",
                    attempt.tx_hash
                );
                self.notifier
                    .notify_error(&Notification::new(TIMEOUT_TITLE, TIMEOUT_DESCRIPTION));
            }
            AttemptStatus::Pending => {}
        }
    }
}
