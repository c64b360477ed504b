//! Best-effort outbound notifications to the dashboard UI

use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, warn};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum NotificationKind {
    Info,
    Success,
    Warning,
    Error,
}

/// Body accepted by the UI's notification queue
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Notification {
    pub message: String,
    #[serde(rename = "type")]
    pub kind: NotificationKind,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub duration: Option<u64>,
}

impl Notification {
    pub fn new(kind: NotificationKind, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            kind,
            duration: None,
        }
    }

    pub fn with_duration(mut self, millis: u64) -> Self {
        self.duration = Some(millis);
        self
    }
}

#[derive(Debug, Clone)]
pub struct Notifier {
    client: Client,
    url: String,
}

impl Notifier {
    pub fn new(url: impl Into<String>) -> reqwest::Result<Self> {
        let client = Client::builder().timeout(Duration::from_secs(5)).build()?;
        Ok(Self {
            client,
            url: url.into(),
        })
    }

    /// POST the notification; failures are logged and dropped
    pub async fn send(&self, notification: &Notification) {
        let result = self
            .client
            .post(&self.url)
            .json(notification)
            .send()
            .await
            .and_then(|response| response.error_for_status());

        match result {
            Ok(_) => debug!("Sent notification to {}: {}", self.url, notification.message),
            Err(e) => warn!("Failed to notify UI at {}: {}", self.url, e),
        }
    }
}
