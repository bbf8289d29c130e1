//! Room synchronization engine
//!
//! Maps passphrases to live rooms, tracks the connections joined to each
//! room, orders incoming edits with an optimistic version check and fans
//! accepted state out to the other members.

pub mod connection;
pub mod dispatcher;
pub mod error;
pub mod inbound;
pub mod registry;
pub mod room;
pub mod throttle;

use std::time::Duration;

pub use connection::{CloseReason, Connection, ConnectionId, Outbound};
pub use error::{ConnectionError, EditError};
pub use inbound::receive;
pub use registry::{Membership, RoomRegistry};
pub use room::{EditOutcome, Room};
pub use throttle::EditThrottle;

/// Resource limits applied by the engine
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncLimits {
    /// Capacity of each connection's outbound queue
    pub outbound_queue: usize,
    /// Largest accepted `new_content`, in bytes
    pub max_content_bytes: usize,
    /// Sustained edits per second per connection; 0 disables the limit
    pub edit_rate_per_sec: u32,
    pub edit_burst: u32,
    /// Close a connection that sends nothing for this long
    pub idle_timeout: Duration,
}

impl SyncLimits {
    /// Largest inbound frame worth reading: the content limit plus room for
    /// the JSON envelope and escaping.
    pub fn max_message_bytes(&self) -> usize {
        self.max_content_bytes.saturating_mul(2).saturating_add(1024)
    }
}

impl Default for SyncLimits {
    fn default() -> Self {
        Self {
            outbound_queue: 256,
            max_content_bytes: 1024 * 1024,
            edit_rate_per_sec: 20,
            edit_burst: 40,
            idle_timeout: Duration::from_secs(300),
        }
    }
}
