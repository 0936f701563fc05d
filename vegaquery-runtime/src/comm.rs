use async_trait::async_trait;
use futures::channel::oneshot;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;
use vegaquery_common::error::{Result, VegaQueryError};
use vegaquery_core::protocol::CommMessage;

/// Outbound side of the frontend connection
#[async_trait]
pub trait CommChannel: Send + Sync {
    async fn send(&self, message: CommMessage) -> Result<()>;
}

type PendingMap = HashMap<String, oneshot::Sender<CommMessage>>;

/// Sends requests over a [`CommChannel`] and routes replies back to their callers by id
pub struct CommClient {
    channel: Arc<dyn CommChannel>,
    pending: Arc<Mutex<PendingMap>>,
    next_id: AtomicU64,
    reply_timeout: Duration,
}

/// Reply slot of a request that has been sent but not yet answered
pub struct PendingReply {
    id: String,
    receiver: oneshot::Receiver<CommMessage>,
    pending: Arc<Mutex<PendingMap>>,
    reply_timeout: Duration,
}

impl CommClient {
    pub fn new(channel: Arc<dyn CommChannel>, reply_timeout: Duration) -> Self {
        Self {
            channel,
            pending: Arc::new(Mutex::new(HashMap::new())),
            next_id: AtomicU64::new(1),
            reply_timeout,
        }
    }

    pub fn reply_timeout(&self) -> Duration {
        self.reply_timeout
    }

    /// Send a message that expects no reply
    pub async fn send(&self, message: CommMessage) -> Result<()> {
        self.channel.send(message).await
    }

    /// Register a reply slot under a fresh id, then send the request built from that id.
    ///
    /// The slot exists before the request leaves, so a reply can never arrive ahead of it.
    pub async fn send_request<F>(&self, build: F) -> Result<PendingReply>
    where
        F: FnOnce(String) -> CommMessage,
    {
        let id = self.next_id.fetch_add(1, Ordering::SeqCst).to_string();
        let (sender, receiver) = oneshot::channel();
        lock(&self.pending)?.insert(id.clone(), sender);

        if let Err(err) = self.channel.send(build(id.clone())).await {
            lock(&self.pending)?.remove(&id);
            return Err(err);
        }
        log::debug!("Sent request {id}");

        Ok(PendingReply {
            id,
            receiver,
            pending: self.pending.clone(),
            reply_timeout: self.reply_timeout,
        })
    }

    pub async fn request<F>(&self, build: F) -> Result<CommMessage>
    where
        F: FnOnce(String) -> CommMessage,
    {
        self.send_request(build).await?.wait().await
    }

    /// Deliver a reply to the request it answers. Returns false when no request is waiting
    /// on its id.
    pub fn handle_reply(&self, message: CommMessage) -> bool {
        let Some(id) = message.correlation_id().map(str::to_string) else {
            return false;
        };
        let sender = match lock(&self.pending) {
            Ok(mut pending) => pending.remove(&id),
            Err(err) => {
                log::error!("{err}");
                None
            }
        };
        match sender {
            Some(sender) => {
                if sender.send(message).is_err() {
                    log::debug!("Request {id} was abandoned before its reply arrived");
                }
                true
            }
            None => {
                log::warn!("Dropping reply {id} with no pending request");
                false
            }
        }
    }

    pub fn num_pending(&self) -> usize {
        lock(&self.pending).map(|p| p.len()).unwrap_or_default()
    }

    /// Fail every outstanding request
    pub fn cancel_all(&self) {
        match lock(&self.pending) {
            Ok(mut pending) => {
                if !pending.is_empty() {
                    log::debug!("Cancelling {} pending requests", pending.len());
                }
                // Dropping the senders wakes each waiter with a cancellation
                pending.clear();
            }
            Err(err) => log::error!("{err}"),
        }
    }
}

impl PendingReply {
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Wait for the reply. Timeouts, cancellation and error replies are protocol errors.
    pub async fn wait(self) -> Result<CommMessage> {
        let id = self.id;
        match tokio::time::timeout(self.reply_timeout, self.receiver).await {
            Ok(Ok(CommMessage::Error { message, .. })) => Err(VegaQueryError::protocol(format!(
                "Request {id} failed on the frontend: {message}"
            ))),
            Ok(Ok(reply)) => Ok(reply),
            Ok(Err(oneshot::Canceled)) => Err(VegaQueryError::protocol(format!(
                "Request {id} was cancelled"
            ))),
            Err(_) => {
                lock(&self.pending)?.remove(&id);
                Err(VegaQueryError::protocol(format!(
                    "No reply to request {id} within {:?}",
                    self.reply_timeout
                )))
            }
        }
    }
}

fn lock(pending: &Mutex<PendingMap>) -> Result<MutexGuard<'_, PendingMap>> {
    pending.lock().map_err(|err| {
        VegaQueryError::internal(format!("Failed to acquire pending request lock: {err:?}"))
    })
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use serde_json::json;

    /// Channel that records everything sent through it
    #[derive(Default)]
    pub(crate) struct RecordingChannel {
        pub sent: Mutex<Vec<CommMessage>>,
    }

    impl RecordingChannel {
        pub fn sent(&self) -> Vec<CommMessage> {
            self.sent.lock().unwrap().clone()
        }
    }

    #[async_trait]
    impl CommChannel for RecordingChannel {
        async fn send(&self, message: CommMessage) -> Result<()> {
            self.sent.lock().unwrap().push(message);
            Ok(())
        }
    }

    fn client(timeout_ms: u64) -> (Arc<RecordingChannel>, CommClient) {
        let channel = Arc::new(RecordingChannel::default());
        let client = CommClient::new(channel.clone(), Duration::from_millis(timeout_ms));
        (channel, client)
    }

    fn compile_request(id: String) -> CommMessage {
        CommMessage::CompileRequest {
            id,
            spec: json!({}),
        }
    }

    #[tokio::test]
    async fn test_reply_is_routed_by_id() {
        let (channel, client) = client(1000);
        let first = client.send_request(compile_request).await.unwrap();
        let second = client.send_request(compile_request).await.unwrap();
        assert_eq!((first.id(), second.id()), ("1", "2"));
        assert_eq!(channel.sent().len(), 2);

        assert!(client.handle_reply(CommMessage::CompileResponse {
            id: "2".to_string(),
            spec: json!({"b": 2}),
        }));
        assert!(client.handle_reply(CommMessage::CompileResponse {
            id: "1".to_string(),
            spec: json!({"a": 1}),
        }));

        let CommMessage::CompileResponse { spec, .. } = first.wait().await.unwrap() else {
            panic!("expected compile response")
        };
        assert_eq!(spec, json!({"a": 1}));
        let CommMessage::CompileResponse { spec, .. } = second.wait().await.unwrap() else {
            panic!("expected compile response")
        };
        assert_eq!(spec, json!({"b": 2}));
    }

    #[tokio::test]
    async fn test_unknown_reply_is_dropped() {
        let (_, client) = client(1000);
        assert!(!client.handle_reply(CommMessage::QueryResponse {
            id: "99".to_string(),
            rows: json!([]),
        }));
    }

    #[tokio::test]
    async fn test_timeout_clears_pending_request() {
        let (_, client) = client(10);
        let err = client.request(compile_request).await.unwrap_err();
        assert!(matches!(err, VegaQueryError::ProtocolError(..)));
        assert_eq!(client.num_pending(), 0);
    }

    #[tokio::test]
    async fn test_error_reply_and_cancel() {
        let (_, client) = client(1000);
        let failing = client.send_request(compile_request).await.unwrap();
        client.handle_reply(CommMessage::Error {
            id: "1".to_string(),
            message: "bad spec".to_string(),
        });
        let err = failing.wait().await.unwrap_err();
        assert!(err.to_string().contains("bad spec"));

        let cancelled = client.send_request(compile_request).await.unwrap();
        client.cancel_all();
        let err = cancelled.wait().await.unwrap_err();
        assert!(err.to_string().contains("cancelled"));
    }
}
