use reqwest::Client;
use serde::Serialize;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{debug, warn};

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct NotificationPayload {
    pub status: String,
    pub detail: String,
}

struct Endpoint {
    client: Client,
    url: String,
}

/// Best-effort webhook sender. Each send runs as a detached task bounded by
/// a timeout; its result is logged at debug and otherwise dropped.
pub struct Notifier {
    endpoint: Option<Endpoint>,
    tracker: TaskTracker,
    cancel: CancellationToken,
    timeout: Duration,
}

impl Notifier {
    pub fn new(url: Option<String>, timeout: Duration) -> Self {
        let endpoint = url.filter(|u| !u.trim().is_empty()).and_then(|url| {
            match Client::builder().timeout(timeout).build() {
                Ok(client) => Some(Endpoint { client, url }),
                Err(e) => {
                    warn!(error = %e, "Failed to build webhook client, notifications disabled");
                    None
                }
            }
        });
        Self {
            endpoint,
            tracker: TaskTracker::new(),
            cancel: CancellationToken::new(),
            timeout,
        }
    }

    pub fn disabled() -> Self {
        Self::new(None, Duration::from_secs(5))
    }

    pub fn is_enabled(&self) -> bool {
        self.endpoint.is_some()
    }

    /// Queue a status event. Returns immediately; never fails.
    pub fn notify(&self, status: &str, detail: &str) {
        let Some(endpoint) = &self.endpoint else {
            return;
        };

        let payload = NotificationPayload {
            status: status.to_string(),
            detail: detail.to_string(),
        };
        let request = endpoint.client.post(&endpoint.url).json(&payload);
        let cancel = self.cancel.clone();
        let timeout = self.timeout;

        self.tracker.spawn(async move {
            tokio::select! {
                _ = cancel.cancelled() => debug!("Notification cancelled"),
                result = tokio::time::timeout(timeout, request.send()) => match result {
                    Ok(Ok(resp)) if resp.status().is_success() => {
                        debug!(status = %resp.status(), "Notification delivered");
                    }
                    Ok(Ok(resp)) => debug!(status = %resp.status(), "Webhook rejected notification"),
                    Ok(Err(e)) => debug!(error = %e, "Notification delivery failed"),
                    Err(_) => debug!(timeout_secs = timeout.as_secs(), "Notification timed out"),
                },
            }
        });
    }

    /// Abandon any notifications still in flight.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for in-flight notifications. Bounded by the per-send timeout.
    pub async fn drain(&self) {
        self.tracker.close();
        self.tracker.wait().await;
    }
}
