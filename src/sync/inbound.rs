//! Inbound side of a connection: socket frames to client messages

use axum::extract::ws::Message;
use std::time::Duration;
use tokio_stream::{Stream, StreamExt};

use super::error::ConnectionError;
use crate::messages::ClientMessage;

/// Turn a socket's frames into a lazy stream of client messages.
///
/// The stream ends when the peer closes the channel. It yields one error and
/// then ends on a malformed frame, a transport failure, or when no frame
/// arrives within `idle_timeout`.
pub fn receive<S, E>(
    frames: S,
    idle_timeout: Duration,
) -> impl Stream<Item = Result<ClientMessage, ConnectionError>>
where
    S: Stream<Item = Result<Message, E>>,
    E: std::fmt::Display,
{
    async_stream::stream! {
        let frames = frames.timeout(idle_timeout);
        tokio::pin!(frames);

        while let Some(frame) = frames.next().await {
            let frame = match frame {
                Ok(frame) => frame,
                Err(_) => {
                    yield Err(ConnectionError::IdleTimeout(idle_timeout));
                    break;
                }
            };

            match frame {
                Ok(Message::Text(text)) => match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(message) => yield Ok(message),
                    Err(e) => {
                        yield Err(ConnectionError::MalformedMessage(e.to_string()));
                        break;
                    }
                },
                Ok(Message::Binary(_)) => {
                    yield Err(ConnectionError::MalformedMessage(
                        "binary frames are not supported".to_string(),
                    ));
                    break;
                }
                Ok(Message::Close(_)) => break,
                // Transport-level ping/pong
                Ok(_) => continue,
                Err(e) => {
                    yield Err(ConnectionError::Transport(e.to_string()));
                    break;
                }
            }
        }
    }
}
