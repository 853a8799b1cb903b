//! Contracts between the session core and the hosting view.
//!
//! The core never renders or routes by itself. It asks a [`Navigator`] to
//! move between [`Route`]s and hands user-facing messages to a [`Notifier`].

use serde::{Deserialize, Serialize};
use std::fmt;

/// Routes the core may send the view to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Route {
    /// Authenticated home view.
    Home,
    /// Interstitial shown while a sign-out is in progress.
    Refresh,
    /// Signed-out landing page.
    Landing,
}

impl Route {
    /// Path of the route in the web client.
    #[must_use]
    pub fn path(&self) -> &'static str {
        match self {
            Self::Home => "/home",
            Self::Refresh => "/refresh",
            Self::Landing => "/",
        }
    }
}

impl fmt::Display for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.path())
    }
}

/// Moves the hosting view between routes.
pub trait Navigator: Send + Sync {
    /// Push `route` onto the history.
    fn navigate(&self, route: Route);

    /// Replace the current history entry with `route`.
    fn replace(&self, route: Route);
}

/// A toast-style message for the user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Notification {
    /// Short headline.
    pub title: String,
    /// Longer explanation.
    pub description: String,
}

impl Notification {
    /// Create a notification.
    #[must_use]
    pub fn new(title: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: description.into(),
        }
    }
}

/// Fire-and-forget sink for user notifications.
pub trait Notifier: Send + Sync {
    /// Show a success message.
    fn notify_success(&self, notification: &Notification);

    /// Show an error message.
    fn notify_error(&self, notification: &Notification);
}
