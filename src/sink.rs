use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::Client;
use serde::Serialize;
use uuid::Uuid;

use crate::config::SinkConfig;
use crate::reminder::Reminder;

/// Snapshot of a reminder's fields, sent to the sink when its time-of-day
/// matches. Never persisted.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct DispatchEvent {
    pub id: String,
    pub owner_id: String,
    pub name: String,
    pub hour: u32,
    pub minute: u32,
}

impl From<&Reminder> for DispatchEvent {
    fn from(reminder: &Reminder) -> Self {
        Self {
            id: reminder.id.clone(),
            owner_id: reminder.owner_id.clone(),
            name: reminder.name.clone(),
            hour: reminder.hour,
            minute: reminder.minute,
        }
    }
}

/// Delivery endpoint for dispatch events. Implementations must be safe for
/// concurrent use by any number of watchers; `dispatch` returns Ok only
/// once the event is accepted downstream.
#[async_trait::async_trait]
pub trait DispatchSink: Send + Sync {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<()>;
}

/// Posts events to `<url>/topics/<topic>`, keyed by a fresh UUID per call.
pub struct HttpSink {
    client: Client,
    url: String,
}

impl HttpSink {
    pub fn new(config: &SinkConfig) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .context("Failed to build sink HTTP client")?;
        let url = format!(
            "{}/topics/{}",
            config.url.trim_end_matches('/'),
            config.topic
        );
        Ok(Self { client, url })
    }
}

#[async_trait::async_trait]
impl DispatchSink for HttpSink {
    async fn dispatch(&self, event: &DispatchEvent) -> Result<()> {
        let key = Uuid::new_v4().to_string();

        let response = self
            .client
            .post(&self.url)
            .header("X-Message-Key", &key)
            .json(event)
            .send()
            .await
            .context("Failed to reach dispatch sink")?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            anyhow::bail!("Dispatch sink error ({status}): {body}");
        }

        tracing::info!("Dispatched reminder {} (key {key})", event.id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_event_snapshots_reminder_fields() {
        let reminder = Reminder::new("user-1", "aspirin", 9, 30);
        let event = DispatchEvent::from(&reminder);
        assert_eq!(event.id, reminder.id);
        assert_eq!(event.owner_id, "user-1");
        assert_eq!(event.name, "aspirin");
        assert_eq!((event.hour, event.minute), (9, 30));
    }

    #[test]
    fn test_event_serializes_flat_camel_case() {
        let event = DispatchEvent::from(&Reminder::new("user-1", "aspirin", 9, 30));
        let value = serde_json::to_value(&event).unwrap();
        for key in ["id", "ownerId", "name", "hour", "minute"] {
            assert!(value.get(key).is_some(), "missing key {key}");
        }
        assert_eq!(value.as_object().unwrap().len(), 5);
    }

    #[test]
    fn test_sink_url_joins_topic() {
        let sink = HttpSink::new(&SinkConfig {
            url: "http://localhost:8082/".to_string(),
            topic: "reminders.schedule".to_string(),
            timeout_secs: 10,
        })
        .unwrap();
        assert_eq!(sink.url, "http://localhost:8082/topics/reminders.schedule");
    }
}
