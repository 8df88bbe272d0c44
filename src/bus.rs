use serde::Deserialize;
use serde_json::{Value, json};
use tokio::sync::{mpsc, oneshot};
use tracing::debug;

use crate::models::{JobRecord, Profile};

/// Typed contract per action tag. Each action carries exactly the data its
/// handler needs; request/response actions carry their own reply channel
/// instead of relying on an open-channel convention.
#[derive(Debug)]
pub enum Action {
    JobScraped(JobRecord),
    OpenDashboard,
    GetProfile {
        reply: oneshot::Sender<Option<Profile>>,
    },
}

/// Wire envelope for messages arriving as raw JSON.
#[derive(Debug, Deserialize)]
pub struct Envelope {
    pub action: String,
    #[serde(default)]
    pub payload: Option<Value>,
}

/// Sender half of the bus. Cheap to clone; every clone keeps its own FIFO
/// order, which is all the ordering the bus guarantees.
#[derive(Clone)]
pub struct BusHandle {
    tx: mpsc::UnboundedSender<Action>,
}

pub fn channel() -> (BusHandle, mpsc::UnboundedReceiver<Action>) {
    let (tx, rx) = mpsc::unbounded_channel();
    (BusHandle { tx }, rx)
}

impl BusHandle {
    /// Fire-and-forget: the acknowledgement is the synchronous send; the
    /// coordinator processes the record asynchronously. Returns false only
    /// if the coordinator is gone.
    pub fn job_scraped(&self, record: JobRecord) -> bool {
        self.tx.send(Action::JobScraped(record)).is_ok()
    }

    pub fn open_dashboard(&self) -> bool {
        self.tx.send(Action::OpenDashboard).is_ok()
    }

    /// Request/response: resolves once the coordinator has run its profile
    /// resolution. `None` means unavailable, never an error.
    pub async fn get_profile(&self) -> Option<Profile> {
        let (reply, response) = oneshot::channel();
        if self.tx.send(Action::GetProfile { reply }).is_err() {
            return None;
        }
        response.await.unwrap_or(None)
    }

    /// Deliver a wire envelope. Unknown action tags have no registered
    /// handler and are silently ignored (`None` response).
    pub async fn deliver(&self, envelope: Envelope) -> Option<Value> {
        match envelope.action.as_str() {
            "jobScraped" => {
                let record: JobRecord =
                    match serde_json::from_value(envelope.payload.unwrap_or(Value::Null)) {
                        Ok(record) => record,
                        Err(e) => {
                            debug!(error = %e, "jobScraped payload did not decode, dropping");
                            return Some(json!({ "success": false }));
                        }
                    };
                // Acknowledge synchronously; processing happens in the
                // coordinator whenever it gets to it.
                let success = self.job_scraped(record);
                Some(json!({ "success": success }))
            }
            "openDashboard" => Some(json!({ "success": self.open_dashboard() })),
            "getProfile" => {
                let profile = self.get_profile().await;
                Some(json!({ "success": true, "profile": profile }))
            }
            other => {
                debug!(action = other, "no handler registered for action, ignoring");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(title: &str) -> JobRecord {
        JobRecord::new(
            title.to_string(),
            Some("Acme".to_string()),
            "desc".to_string(),
            "https://indeed.com/job/123".to_string(),
        )
    }

    #[tokio::test]
    async fn messages_from_one_sender_arrive_in_send_order() {
        let (handle, mut rx) = channel();
        handle.job_scraped(record("first"));
        handle.job_scraped(record("second"));
        handle.open_dashboard();

        match rx.recv().await.unwrap() {
            Action::JobScraped(r) => assert_eq!(r.title, "first"),
            other => panic!("unexpected action: {:?}", other),
        }
        match rx.recv().await.unwrap() {
            Action::JobScraped(r) => assert_eq!(r.title, "second"),
            other => panic!("unexpected action: {:?}", other),
        }
        assert!(matches!(rx.recv().await.unwrap(), Action::OpenDashboard));
    }

    #[tokio::test]
    async fn get_profile_resolves_with_coordinator_response() {
        let (handle, mut rx) = channel();
        tokio::spawn(async move {
            while let Some(action) = rx.recv().await {
                if let Action::GetProfile { reply } = action {
                    let _ = reply.send(Some(Profile {
                        email: Some("ada@example.com".to_string()),
                        ..Default::default()
                    }));
                }
            }
        });

        let profile = handle.get_profile().await.unwrap();
        assert_eq!(profile.email.as_deref(), Some("ada@example.com"));
    }

    #[tokio::test]
    async fn get_profile_is_none_when_coordinator_gone() {
        let (handle, rx) = channel();
        drop(rx);
        assert!(handle.get_profile().await.is_none());
    }

    #[tokio::test]
    async fn unknown_wire_action_is_silently_ignored() {
        let (handle, mut rx) = channel();
        let response = handle
            .deliver(Envelope {
                action: "rewriteResume".to_string(),
                payload: None,
            })
            .await;
        assert!(response.is_none());
        assert!(rx.try_recv().is_err());
    }

    #[tokio::test]
    async fn wire_job_scraped_acknowledges_before_processing() {
        let (handle, mut rx) = channel();
        let payload = serde_json::to_value(record("Backend Engineer")).unwrap();
        let response = handle
            .deliver(Envelope {
                action: "jobScraped".to_string(),
                payload: Some(payload),
            })
            .await
            .unwrap();
        // Acknowledged even though nothing has consumed the queue yet.
        assert_eq!(response["success"], true);
        assert!(matches!(rx.recv().await.unwrap(), Action::JobScraped(_)));
    }
}
