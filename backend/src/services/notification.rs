//! Best-effort notification delivery.
//!
//! Transitions hand notifications to the gateway and move on: delivery
//! runs on a tracked background task and failures are only logged.

use async_trait::async_trait;
use serde_json::Value;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio_util::task::TaskTracker;

use crate::models::notification::{Notification, NotificationKind, Recipient};
use crate::utils::time::Clock;

#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait NotificationSink: Send + Sync {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()>;
}

/// Writes notifications to the log. Used when no webhook is configured.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogNotificationSink;

#[async_trait]
impl NotificationSink for LogNotificationSink {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        tracing::info!(
            kind = notification.kind.as_str(),
            recipient = ?notification.recipient,
            payload = %notification.payload,
            "notification"
        );
        Ok(())
    }
}

/// POSTs each notification as JSON to a fixed URL.
#[derive(Debug, Clone)]
pub struct WebhookNotificationSink {
    client: reqwest::Client,
    url: url::Url,
}

impl WebhookNotificationSink {
    pub fn new(url: url::Url, timeout: Duration) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { client, url })
    }
}

#[async_trait]
impl NotificationSink for WebhookNotificationSink {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.client
            .post(self.url.clone())
            .json(notification)
            .send()
            .await?
            .error_for_status()?;
        Ok(())
    }
}

/// Keeps every delivered notification in memory.
#[derive(Debug, Default)]
pub struct RecordingNotificationSink {
    delivered: Mutex<Vec<Notification>>,
}

impl RecordingNotificationSink {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .clone()
    }

    pub fn of_kind(&self, kind: NotificationKind) -> Vec<Notification> {
        self.notifications()
            .into_iter()
            .filter(|n| n.kind == kind)
            .collect()
    }
}

#[async_trait]
impl NotificationSink for RecordingNotificationSink {
    async fn deliver(&self, notification: &Notification) -> anyhow::Result<()> {
        self.delivered
            .lock()
            .unwrap_or_else(|e| e.into_inner())
            .push(notification.clone());
        Ok(())
    }
}

#[derive(Clone)]
pub struct NotificationGateway {
    sink: Arc<dyn NotificationSink>,
    clock: Arc<dyn Clock>,
    tracker: TaskTracker,
}

impl NotificationGateway {
    pub fn new(sink: Arc<dyn NotificationSink>, clock: Arc<dyn Clock>) -> Self {
        Self {
            sink,
            clock,
            tracker: TaskTracker::new(),
        }
    }

    /// Queues a notification. Never fails and never waits for delivery.
    pub fn notify(&self, recipient: Recipient, kind: NotificationKind, payload: Value) {
        let notification = Notification::new(recipient, kind, payload, self.clock.now());
        let sink = Arc::clone(&self.sink);
        self.tracker.spawn(async move {
            if let Err(err) = sink.deliver(&notification).await {
                tracing::warn!(
                    kind = notification.kind.as_str(),
                    recipient = ?notification.recipient,
                    error = %err,
                    "Notification delivery failed"
                );
            }
        });
    }

    /// Waits until every queued delivery has finished.
    pub async fn wait_idle(&self) {
        self.tracker.close();
        self.tracker.wait().await;
        self.tracker.reopen();
    }
}
