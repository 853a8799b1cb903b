//! Client event system.

use crate::verification::AttemptStatus;
use crate::view::{Navigator, Notification, Notifier, Route};
use tokio::sync::broadcast;

/// Events emitted towards the hosting view.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClientEvent {
    /// The view should move to a route.
    Navigated {
        /// Target route.
        route: Route,
        /// Whether the current history entry is replaced.
        replace: bool,
    },

    /// A success toast.
    Success(Notification),

    /// An error toast.
    Failure(Notification),

    /// A transaction verification started.
    VerificationStarted {
        /// Transaction being verified.
        tx_hash: String,
    },

    /// A transaction verification reached a terminal state.
    VerificationFinished {
        /// Transaction that was verified.
        tx_hash: String,
        /// Terminal status.
        status: AttemptStatus,
    },
}

/// Channel for receiving client events.
pub type ClientEventsChannel = broadcast::Receiver<ClientEvent>;

/// Sender for client events.
pub type ClientEventsSender = broadcast::Sender<ClientEvent>;

/// Create a new event channel pair.
#[must_use]
pub fn create_event_channel() -> (ClientEventsSender, ClientEventsChannel) {
    broadcast::channel(256)
}

/// Default navigator and notifier: forwards everything onto the event channel.
#[derive(Debug, Clone)]
pub struct EventSink {
    events_tx: ClientEventsSender,
}

impl EventSink {
    /// Create a sink publishing on `events_tx`.
    #[must_use]
    pub fn new(events_tx: ClientEventsSender) -> Self {
        Self { events_tx }
    }

    /// Publish an event. Having no subscribers is not an error.
    pub fn emit(&self, event: ClientEvent) {
        let _ = self.events_tx.send(event);
    }
}

impl Navigator for EventSink {
    fn navigate(&self, route: Route) {
        self.emit(ClientEvent::Navigated {
            route,
            replace: false,
        });
    }

    fn replace(&self, route: Route) {
        self.emit(ClientEvent::Navigated {
            route,
            replace: true,
        });
    }
}

impl Notifier for EventSink {
    fn notify_success(&self, notification: &Notification) {
        self.emit(ClientEvent::Success(notification.clone()));
    }

    fn notify_error(&self, notification: &Notification) {
        self.emit(ClientEvent::Failure(notification.clone()));
    }
}
