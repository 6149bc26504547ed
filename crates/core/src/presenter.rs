//! The user-facing surface, as seen from the automation side.

use std::sync::Mutex;

use tracing::{error, info};

use crate::extract::Container;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationKind {
    Success,
    Error,
}

/// A transient message for the user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub kind: NotificationKind,
    pub message: String,
}

impl Notification {
    pub fn success(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Success, message: message.into() }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self { kind: NotificationKind::Error, message: message.into() }
    }
}

/// Shows notifications and the manual extraction entry point.
pub trait Presenter: Send + Sync {
    fn notify(&self, notification: &Notification);

    /// Called when automation gives up, so the user can extract by hand.
    fn offer_manual_extraction(&self, container: &Container);
}

/// Writes everything to the log.
#[derive(Debug, Default)]
pub struct LogPresenter;

impl Presenter for LogPresenter {
    fn notify(&self, notification: &Notification) {
        match notification.kind {
            NotificationKind::Success => info!(message = %notification.message, "notification"),
            NotificationKind::Error => error!(message = %notification.message, "notification"),
        }
    }

    fn offer_manual_extraction(&self, container: &Container) {
        info!(ordinal = container.locator.ordinal, "manual extraction available");
    }
}

/// Keeps everything it is shown, for inspection.
#[derive(Debug, Default)]
pub struct RecordingPresenter {
    notifications: Mutex<Vec<Notification>>,
    offers: Mutex<Vec<Container>>,
}

impl RecordingPresenter {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.notifications.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }

    pub fn manual_offers(&self) -> Vec<Container> {
        self.offers.lock().unwrap_or_else(|e| e.into_inner()).clone()
    }
}

impl Presenter for RecordingPresenter {
    fn notify(&self, notification: &Notification) {
        self.notifications
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
    }

    fn offer_manual_extraction(&self, container: &Container) {
        self.offers.lock().unwrap_or_else(|e| e.into_inner()).push(container.clone());
    }
}
