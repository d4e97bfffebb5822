//! Notification channel (§6.7, §7): two destinations — alert and info —
//! each taking a preformatted textual payload. Delivery failures are logged,
//! never fatal. Repeated identical payloads are deduplicated within a short
//! window to prevent spam (§7 "repeated identical error strings are
//! deduplicated").

use dashmap::DashMap;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// How long an identical payload is suppressed for after its first send.
const DEDUP_WINDOW: Duration = Duration::from_secs(300);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Destination {
    Alert,
    Info,
}

/// Dual-destination notifier with webhook delivery and string dedup.
pub struct Notifier {
    client: reqwest::Client,
    alert_webhook: Option<String>,
    info_webhook: Option<String>,
    recent: DashMap<(Destination, String), Instant>,
}

impl Notifier {
    pub fn new(alert_webhook: Option<String>, info_webhook: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            alert_webhook,
            info_webhook,
            recent: DashMap::new(),
        }
    }

    /// Send `payload` to `destination`, deduplicating identical payloads
    /// sent to the same destination within `DEDUP_WINDOW`.
    pub async fn send(&self, destination: Destination, payload: impl Into<String>) {
        let payload = payload.into();
        let key = (destination, payload.clone());

        if let Some(last) = self.recent.get(&key) {
            if last.elapsed() < DEDUP_WINDOW {
                debug!(?destination, "notification suppressed as duplicate");
                return;
            }
        }
        self.recent.insert(key, Instant::now());

        let webhook = match destination {
            Destination::Alert => &self.alert_webhook,
            Destination::Info => &self.info_webhook,
        };

        let Some(url) = webhook else {
            debug!(?destination, %payload, "no webhook configured, logging only");
            return;
        };

        let body = serde_json::json!({ "text": payload });
        if let Err(e) = self.client.post(url).json(&body).send().await {
            warn!(?destination, error = %e, "notification delivery failed");
        }
    }

    pub async fn alert(&self, payload: impl Into<String>) {
        self.send(Destination::Alert, payload).await;
    }

    pub async fn info(&self, payload: impl Into<String>) {
        self.send(Destination::Info, payload).await;
    }

    /// Drop dedup entries past the window, called periodically by the
    /// coordinator so the map doesn't grow unbounded.
    pub fn sweep_expired(&self) {
        self.recent.retain(|_, t| t.elapsed() < DEDUP_WINDOW);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_without_webhook_does_not_panic() {
        let notifier = Notifier::new(None, None);
        notifier.alert("test").await;
        notifier.info("test").await;
    }
}
