//! Cross-thread event and notification payloads.
//!
//! [`Event`]s are produced on the worker thread after the follow-up
//! introspection query and carry fully built descriptor copies (remove
//! events carry only the index - the entity is already gone).
//! [`Notification`]s are what the consumer thread sees after the
//! router applied its filtering rules.

use crate::types::{AppStream, Direction, ServerSnapshot, SinkDevice};

/// A server change, enriched with the follow-up query result.
#[derive(Debug, Clone)]
pub enum Event {
    StreamAdded(AppStream),
    StreamChanged(AppStream),
    StreamRemoved { direction: Direction, index: u32 },
    SinkAdded(SinkDevice),
    SinkChanged(SinkDevice),
    SinkRemoved { index: u32 },
    ServerChanged(ServerSnapshot),
}

/// Outbound notification, delivered in server-event order on the
/// consumer's own thread.
#[derive(Debug, Clone)]
pub enum Notification {
    StreamAdded(AppStream),
    StreamChanged(AppStream),
    StreamRemoved { direction: Direction, index: u32 },
    SinkAdded(SinkDevice),
    SinkChanged(SinkDevice),
    SinkRemoved { index: u32 },
    DefaultSinkChanged(String),
    DefaultSourceChanged(String),
    ServerChanged,
}
