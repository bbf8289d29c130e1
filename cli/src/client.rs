//! WebSocket client for a livepaste room

use anyhow::{anyhow, Result};
use futures::{SinkExt, StreamExt};
use serde::Serialize;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use url::Url;

use crate::messages::{ControlMessage, Edit, ServerMessage};

/// Keeps idle watchers under the server's idle timeout
const KEEPALIVE_INTERVAL: Duration = Duration::from_secs(60);

/// Build the room URL for `passphrase`, percent-encoding it as one path segment
pub fn room_url(server: &str, passphrase: &str) -> Result<Url> {
    let mut url = Url::parse(server)?;
    url.path_segments_mut()
        .map_err(|_| anyhow!("Invalid server URL: {}", server))?
        .pop_if_empty()
        .push("ws")
        .push(passphrase);
    Ok(url)
}

/// Client joined to one room
pub struct PasteClient {
    tx: mpsc::Sender<Message>,
    rx: mpsc::Receiver<ServerMessage>,
    version: u64,
    content: String,
    #[allow(dead_code)]
    handle: tokio::task::JoinHandle<()>,
}

impl PasteClient {
    /// Join the room for `passphrase` and wait for its initial state
    pub async fn connect(server: &str, passphrase: &str) -> Result<Self> {
        let url = room_url(server, passphrase)?;
        tracing::info!("Connecting to {}", url);

        let (ws_stream, _) = connect_async(url.as_str()).await?;
        let (mut write, mut read) = ws_stream.split();

        // Channel for outgoing messages
        let (out_tx, mut out_rx) = mpsc::channel::<Message>(32);

        // Channel for incoming parsed messages
        let (in_tx, in_rx) = mpsc::channel::<ServerMessage>(32);

        let keepalive_text = serde_json::to_string(&ControlMessage::Ping)?;

        // Spawn task to handle WebSocket communication
        let handle = tokio::spawn(async move {
            let mut keepalive = tokio::time::interval_at(
                tokio::time::Instant::now() + KEEPALIVE_INTERVAL,
                KEEPALIVE_INTERVAL,
            );
            loop {
                tokio::select! {
                    _ = keepalive.tick() => {
                        if write.send(Message::Text(keepalive_text.clone())).await.is_err() {
                            break;
                        }
                    }
                    // Handle outgoing messages
                    Some(msg) = out_rx.recv() => {
                        if write.send(msg).await.is_err() {
                            break;
                        }
                    }
                    // Handle incoming messages
                    Some(result) = read.next() => {
                        match result {
                            Ok(Message::Text(text)) => {
                                match serde_json::from_str::<ServerMessage>(&text) {
                                    Ok(msg) => {
                                        if in_tx.send(msg).await.is_err() {
                                            break;
                                        }
                                    }
                                    Err(e) => {
                                        tracing::warn!("Failed to parse message: {} - {}", e, text);
                                    }
                                }
                            }
                            Ok(Message::Close(_)) => break,
                            Err(e) => {
                                tracing::error!("WebSocket error: {}", e);
                                break;
                            }
                            _ => {}
                        }
                    }
                    else => break,
                }
            }
        });

        let mut client = Self {
            tx: out_tx,
            rx: in_rx,
            version: 0,
            content: String::new(),
            handle,
        };

        match client.recv().await {
            Some(ServerMessage::Init { .. }) => {
                tracing::info!("Joined at version {}", client.version);
                Ok(client)
            }
            Some(ServerMessage::Error { message }) => Err(anyhow!("Server error: {}", message)),
            Some(other) => Err(anyhow!("Expected init, got {:?}", other)),
            None => Err(anyhow!("Connection closed")),
        }
    }

    /// Version of the content this client last saw
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn content(&self) -> &str {
        &self.content
    }

    /// Send a message to the server
    async fn send<T: Serialize>(&self, msg: &T) -> Result<()> {
        let json = serde_json::to_string(msg)?;
        self.tx
            .send(Message::Text(json))
            .await
            .map_err(|e| anyhow!("Failed to send message: {}", e))
    }

    /// Receive a message from the server, tracking the room state it carries
    pub async fn recv(&mut self) -> Option<ServerMessage> {
        let msg = self.rx.recv().await?;
        match &msg {
            ServerMessage::Init { version, content }
            | ServerMessage::Update { version, content }
            | ServerMessage::Conflict { version, content } => {
                self.version = *version;
                self.content = content.clone();
            }
            ServerMessage::Ack { version } => self.version = *version,
            ServerMessage::Pong | ServerMessage::Error { .. } => {}
        }
        Some(msg)
    }

    /// Replace the paste, retrying up to `retries` times on conflict.
    ///
    /// Returns the accepted version.
    pub async fn set(&mut self, content: String, retries: u32) -> Result<u64> {
        let mut attempts = 0;

        loop {
            self.send(&Edit {
                base_version: self.version,
                new_content: content.clone(),
            })
            .await?;

            loop {
                match self.recv().await {
                    Some(ServerMessage::Ack { version }) => {
                        self.content = content;
                        return Ok(version);
                    }
                    Some(ServerMessage::Conflict { version, .. }) => {
                        tracing::info!("Conflict at version {}", version);
                        break;
                    }
                    Some(ServerMessage::Error { message }) => {
                        return Err(anyhow!("Server error: {}", message));
                    }
                    Some(_) => continue,
                    None => return Err(anyhow!("Connection closed")),
                }
            }

            attempts += 1;
            if attempts > retries {
                return Err(anyhow!("Gave up after {} conflicts", attempts));
            }
        }
    }

    /// Send a ping and wait for the pong
    pub async fn ping(&mut self) -> Result<()> {
        self.send(&ControlMessage::Ping).await?;

        while let Some(msg) = self.recv().await {
            match msg {
                ServerMessage::Pong => return Ok(()),
                ServerMessage::Error { message } => {
                    return Err(anyhow!("Server error: {}", message));
                }
                _ => continue,
            }
        }

        Err(anyhow!("Connection closed"))
    }

    /// Listen for events until callback returns false
    pub async fn listen<F>(&mut self, mut callback: F) -> Result<()>
    where
        F: FnMut(&ServerMessage) -> bool,
    {
        while let Some(msg) = self.recv().await {
            if !callback(&msg) {
                break;
            }
        }
        Ok(())
    }
}
