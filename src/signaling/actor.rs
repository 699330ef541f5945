use tokio::sync::{mpsc, oneshot};
use tokio_tungstenite::tungstenite::Utf8Bytes;
use tracing::info;

use super::router::{Router, RouterStats};
use super::types::{ClientId, OutboundMessage, SignalingError};

/// Commands sent to the router actor
pub(crate) enum RouterCommand {
    Connect {
        tx: mpsc::UnboundedSender<OutboundMessage>,
        reply: oneshot::Sender<ClientId>,
    },
    Inbound {
        client_id: ClientId,
        text: Utf8Bytes,
    },
    Disconnect {
        client_id: ClientId,
    },
    Stats {
        reply: oneshot::Sender<RouterStats>,
    },
}

/// Sole owner of the router. Commands are applied one at a time, which
/// serializes every membership change and the broadcast that goes with it.
pub(crate) async fn router_actor(mut rx: mpsc::Receiver<RouterCommand>) {
    let mut router = Router::new();

    while let Some(cmd) = rx.recv().await {
        match cmd {
            RouterCommand::Connect { tx, reply } => {
                let client_id = router.connect(tx);
                let _ = reply.send(client_id);
            }

            RouterCommand::Inbound { client_id, text } => {
                router.handle_text(client_id, text);
            }

            RouterCommand::Disconnect { client_id } => {
                router.disconnect(client_id);
            }

            RouterCommand::Stats { reply } => {
                let _ = reply.send(router.stats());
            }
        }
    }

    info!("Router actor stopped");
}

/// Handle to communicate with the router actor
#[derive(Clone)]
pub struct RouterHandle {
    pub(crate) tx: mpsc::Sender<RouterCommand>,
}

impl RouterHandle {
    /// Spawn the router actor on the current runtime
    pub fn spawn(buffer: usize) -> Self {
        let (tx, rx) = mpsc::channel::<RouterCommand>(buffer);
        tokio::spawn(router_actor(rx));
        Self { tx }
    }

    /// Register a connection. Its `id` notification is already queued on
    /// `tx` when this returns.
    pub async fn connect(
        &self,
        tx: mpsc::UnboundedSender<OutboundMessage>,
    ) -> Result<ClientId, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Connect {
            tx,
            reply: reply_tx,
        })
        .await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    /// Queue an inbound frame. Frames from one client are routed in the order
    /// they are submitted.
    pub async fn inbound(&self, client_id: ClientId, text: Utf8Bytes) -> Result<(), SignalingError> {
        self.send(RouterCommand::Inbound { client_id, text }).await
    }

    pub async fn disconnect(&self, client_id: ClientId) {
        let _ = self.send(RouterCommand::Disconnect { client_id }).await;
    }

    pub async fn stats(&self) -> Result<RouterStats, SignalingError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.send(RouterCommand::Stats { reply: reply_tx }).await?;
        reply_rx
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }

    async fn send(&self, cmd: RouterCommand) -> Result<(), SignalingError> {
        self.tx
            .send(cmd)
            .await
            .map_err(|_| SignalingError::Internal("actor channel closed".to_string()))
    }
}

#[cfg(test)]
mod tests {
    use serde_json::{Value, json};

    use super::*;

    async fn connect(handle: &RouterHandle) -> (ClientId, mpsc::UnboundedReceiver<OutboundMessage>) {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let id = handle.connect(tx).await.unwrap();
        let first: Value = serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap();
        assert_eq!(first, json!({"type": "id", "id": id.as_str()}));
        (id, rx)
    }

    async fn send(handle: &RouterHandle, id: ClientId, msg: Value) {
        handle
            .inbound(id, Utf8Bytes::from(msg.to_string()))
            .await
            .unwrap();
    }

    async fn next(rx: &mut mpsc::UnboundedReceiver<OutboundMessage>) -> Value {
        serde_json::from_str(rx.recv().await.unwrap().as_str()).unwrap()
    }

    #[tokio::test]
    async fn inbound_is_routed_in_order() {
        let handle = RouterHandle::spawn(16);
        let (a, mut rx_a) = connect(&handle).await;

        send(&handle, a, json!({"type": "create", "room": "x"})).await;
        send(&handle, a, json!({"type": "join", "room": "missing"})).await;

        assert_eq!(next(&mut rx_a).await["type"], "created");
        assert_eq!(next(&mut rx_a).await["type"], "error");
    }

    #[tokio::test]
    async fn disconnect_is_reflected_in_stats() {
        let handle = RouterHandle::spawn(16);
        let (a, mut rx_a) = connect(&handle).await;
        let (b, _rx_b) = connect(&handle).await;

        send(&handle, a, json!({"type": "create", "room": "x"})).await;
        send(&handle, b, json!({"type": "join", "room": "x"})).await;
        handle.disconnect(b).await;

        assert_eq!(next(&mut rx_a).await["type"], "created");
        assert_eq!(next(&mut rx_a).await["type"], "new-peer");
        assert_eq!(
            next(&mut rx_a).await,
            json!({"type": "peer-left", "peerId": b.as_str()})
        );
        assert_eq!(
            handle.stats().await.unwrap(),
            RouterStats { clients: 1, rooms: 1 }
        );
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_joins_see_a_serializable_history() {
        const JOINERS: usize = 16;

        let handle = RouterHandle::spawn(64);
        let (creator, _rx_creator) = connect(&handle).await;
        send(&handle, creator, json!({"type": "create", "room": "party"})).await;

        let mut tasks = Vec::new();
        for _ in 0..JOINERS {
            let handle = handle.clone();
            tasks.push(tokio::spawn(async move {
                let (id, mut rx) = connect(&handle).await;
                send(&handle, id, json!({"type": "join", "room": "party"})).await;
                let joined = next(&mut rx).await;
                assert_eq!(joined["type"], "joined");
                let peers: Vec<String> = joined["peers"]
                    .as_array()
                    .unwrap()
                    .iter()
                    .map(|p| p.as_str().unwrap().to_string())
                    .collect();
                (id.to_string(), peers, rx)
            }));
        }

        let mut results = Vec::new();
        for task in tasks {
            results.push(task.await.unwrap());
        }

        // Order joiners by how many peers they saw; each must see exactly
        // the creator plus everyone ordered before it.
        results.sort_by_key(|(_, peers, _)| peers.len());
        let mut seen = vec![creator.to_string()];
        for (i, (id, peers, _)) in results.iter().enumerate() {
            assert_eq!(peers.len(), i + 1);
            let mut peers = peers.clone();
            peers.sort();
            let mut expected = seen.clone();
            expected.sort();
            assert_eq!(peers, expected);
            seen.push(id.clone());
        }

        // Every joiner is notified about exactly the joiners after it.
        for (i, (_, _, rx)) in results.iter_mut().enumerate() {
            let mut notified = 0;
            while let Ok(msg) = rx.try_recv() {
                let msg: Value = serde_json::from_str(msg.as_str()).unwrap();
                assert_eq!(msg["type"], "new-peer");
                notified += 1;
            }
            assert_eq!(notified, JOINERS - 1 - i);
        }
    }

    #[tokio::test]
    async fn closed_actor_reports_internal_error() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let handle = RouterHandle { tx };
        let (client_tx, _client_rx) = mpsc::unbounded_channel();

        assert!(matches!(
            handle.connect(client_tx).await,
            Err(SignalingError::Internal(_))
        ));
    }
}
