//! Errors scoped to a single connection

use std::time::Duration;
use thiserror::Error;

use super::connection::CloseReason;

/// Failure reading from a client's channel
#[derive(Error, Debug)]
pub enum ConnectionError {
    #[error("Invalid message: {0}")]
    MalformedMessage(String),

    #[error("No message received for {0:?}")]
    IdleTimeout(Duration),

    #[error("Transport error: {0}")]
    Transport(String),
}

impl ConnectionError {
    pub fn close_reason(&self) -> CloseReason {
        match self {
            ConnectionError::MalformedMessage(_) => CloseReason::MalformedMessage,
            ConnectionError::IdleTimeout(_) => CloseReason::IdleTimeout,
            ConnectionError::Transport(_) => CloseReason::ChannelClosed,
        }
    }
}

/// An edit refused before the version check; reported to the submitter only
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EditError {
    #[error("Content too large: {size} bytes exceeds the limit of {limit}")]
    ContentTooLarge { size: usize, limit: usize },

    #[error("Edit rate limit exceeded")]
    RateLimited,
}
