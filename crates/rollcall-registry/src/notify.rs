use std::sync::{Arc, Mutex};

use anyhow::{Result, anyhow};
use rollcall_types::notifications::Notification;
use tokio::sync::mpsc;
use tracing::{info, warn};

/// Delivers a notification to its recipient. Implementations must not block
/// for long: they run on the request path right after commit.
pub trait Notifier: Send + Sync {
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Notifiers run after a registration change commits. Delivery is best
/// effort: failures are logged and never reach the caller.
#[derive(Clone, Default)]
pub struct PostCommitHooks {
    notifiers: Vec<Arc<dyn Notifier>>,
}

impl PostCommitHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with<N: Notifier + 'static>(mut self, notifier: N) -> Self {
        self.notifiers.push(Arc::new(notifier));
        self
    }

    pub fn push(&mut self, notifier: Arc<dyn Notifier>) {
        self.notifiers.push(notifier);
    }

    /// Returns true if every notifier accepted the notification.
    pub fn dispatch(&self, notification: &Notification) -> bool {
        let mut delivered = true;
        for notifier in &self.notifiers {
            if let Err(e) = notifier.deliver(notification) {
                warn!(
                    user_id = %notification.recipient(),
                    event_id = %notification.event_id(),
                    "Notification delivery failed: {:#}",
                    e
                );
                delivered = false;
            }
        }
        delivered
    }
}

/// Writes notifications to the log in place of a mail transport.
pub struct LogNotifier;

impl Notifier for LogNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        info!(
            target: "rollcall::mailer",
            user_id = %notification.recipient(),
            event_id = %notification.event_id(),
            "{}",
            notification.subject()
        );
        Ok(())
    }
}

/// Hands notifications to a background mail worker so the request path
/// never waits on delivery.
#[derive(Clone)]
pub struct QueueNotifier {
    tx: mpsc::UnboundedSender<Notification>,
}

impl QueueNotifier {
    pub fn channel() -> (Self, mpsc::UnboundedReceiver<Notification>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl Notifier for QueueNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        self.tx
            .send(notification.clone())
            .map_err(|_| anyhow!("Mail queue closed"))
    }
}

/// Drains the mail queue until every `QueueNotifier` is dropped.
pub async fn run_mail_worker(mut rx: mpsc::UnboundedReceiver<Notification>, transport: Arc<dyn Notifier>) {
    while let Some(notification) = rx.recv().await {
        if let Err(e) = transport.deliver(&notification) {
            warn!(
                user_id = %notification.recipient(),
                event_id = %notification.event_id(),
                "Mail delivery failed: {:#}",
                e
            );
        }
    }
    info!("Mail worker stopped");
}

/// Keeps every delivered notification in memory.
#[derive(Clone, Default)]
pub struct RecordingNotifier {
    sent: Arc<Mutex<Vec<Notification>>>,
}

impl RecordingNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn sent(&self) -> Vec<Notification> {
        self.sent.lock().map(|s| s.clone()).unwrap_or_else(|e| e.into_inner().clone())
    }
}

impl Notifier for RecordingNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .map_err(|e| anyhow!("Recorder lock poisoned: {}", e))?
            .push(notification.clone());
        Ok(())
    }
}
