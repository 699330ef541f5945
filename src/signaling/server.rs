use std::net::SocketAddr;

use futures_util::{SinkExt, StreamExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio_tungstenite::tungstenite::{Bytes, Message, Utf8Bytes};
use tracing::{debug, error, info, warn};

use super::actor::RouterHandle;
use super::types::{ClientId, OutboundMessage, SignalingError};
use crate::config::ServerConfig;

pub struct SignalingServer {
    listener: TcpListener,
    handle: RouterHandle,
    config: ServerConfig,
}

impl SignalingServer {
    /// Bind the listening socket and start the router actor
    pub async fn bind(config: ServerConfig) -> std::io::Result<Self> {
        let listener = TcpListener::bind(&config.bind_addr).await?;
        let handle = RouterHandle::spawn(config.command_buffer);

        info!("Signaling server listening on {}", listener.local_addr()?);

        Ok(Self {
            listener,
            handle,
            config,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    pub fn handle(&self) -> RouterHandle {
        self.handle.clone()
    }

    pub async fn run(self) -> std::io::Result<()> {
        loop {
            let (stream, addr) = self.listener.accept().await?;
            let handle = self.handle.clone();
            let config = self.config.clone();

            tokio::spawn(async move {
                if let Err(e) = handle_connection(stream, addr, handle, config).await {
                    error!("Connection error from {}: {}", addr, e);
                }
            });
        }
    }
}

async fn handle_connection(
    stream: TcpStream,
    addr: SocketAddr,
    handle: RouterHandle,
    config: ServerConfig,
) -> Result<(), SignalingError> {
    let ws_stream = tokio_tungstenite::accept_async(stream).await?;
    let (mut ws_tx, mut ws_rx) = ws_stream.split();

    info!("WebSocket connection from {}", addr);

    let (tx, mut rx) = mpsc::unbounded_channel::<OutboundMessage>();
    let (ctrl_tx, mut ctrl_rx) = mpsc::unbounded_channel::<Message>();

    // the `id` notification is queued on `tx` before this returns
    let client_id = handle.connect(tx).await?;

    let mut ping_interval = tokio::time::interval(config.ping_interval);
    let mut waiting_for_pong = false;
    let mut pong_deadline: Option<tokio::time::Instant> = None;

    let send_task = tokio::spawn(async move {
        loop {
            tokio::select! {
                Some(msg) = rx.recv() => {
                    let ws_msg = Message::Text(msg.into_inner());
                    if ws_tx.send(ws_msg).await.is_err() {
                        break;
                    }
                }
                Some(ctrl_msg) = ctrl_rx.recv() => {
                    if ws_tx.send(ctrl_msg).await.is_err() {
                        break;
                    }
                }
                else => break,
            }
        }
        let _ = ws_tx.close().await;
    });

    loop {
        let pong_timeout = async {
            match pong_deadline {
                Some(deadline) => tokio::time::sleep_until(deadline).await,
                None => std::future::pending().await,
            }
        };

        tokio::select! {
            _ = ping_interval.tick() => {
                if waiting_for_pong {
                    warn!("No Pong received, disconnecting {}", client_id);
                    break;
                }
                if ctrl_tx.send(Message::Ping(Bytes::new())).is_err() {
                    break;
                }
                waiting_for_pong = true;
                pong_deadline = Some(tokio::time::Instant::now() + config.pong_timeout);
                debug!("Ping sent to {}", client_id);
            }

            _ = pong_timeout => {
                warn!("Pong timeout, disconnecting {}", client_id);
                break;
            }

            msg = ws_rx.next() => {
                let msg = match msg {
                    Some(Ok(m)) => m,
                    Some(Err(e)) => {
                        warn!("WebSocket error from {}: {}", client_id, e);
                        break;
                    }
                    None => break,
                };

                match msg {
                    Message::Text(text) => {
                        if forward(&handle, client_id, text).await.is_err() {
                            break;
                        }
                    }
                    Message::Binary(data) => match Utf8Bytes::try_from(data) {
                        Ok(text) => {
                            if forward(&handle, client_id, text).await.is_err() {
                                break;
                            }
                        }
                        Err(_) => debug!("Dropping non-UTF-8 binary frame from {}", client_id),
                    },
                    Message::Pong(_) => {
                        waiting_for_pong = false;
                        pong_deadline = None;
                        debug!("Pong received from {}", client_id);
                    }
                    Message::Close(_) => {
                        info!("Close received from {}", client_id);
                        break;
                    }
                    _ => {}
                }
            }
        }
    }

    handle.disconnect(client_id).await;

    send_task.abort();
    info!("WebSocket disconnected: {} ({})", client_id, addr);

    Ok(())
}

async fn forward(
    handle: &RouterHandle,
    client_id: ClientId,
    text: Utf8Bytes,
) -> Result<(), SignalingError> {
    handle.inbound(client_id, text).await.inspect_err(|e| {
        error!("Router unavailable for {}: {}", client_id, e);
    })
}
