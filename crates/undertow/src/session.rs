//! Shared session cache.

use crate::config::RoutingConfig;
use crate::types::{ServerSnapshot, SinkDevice};
use crate::Exclusions;
use std::sync::{Arc, Mutex};

/// Mutable session state shared between the manager (caller threads)
/// and the router (consumer thread).
///
/// Callers never hold references into this; descriptor data leaves
/// only as fully constructed clones.
#[derive(Debug)]
pub struct SessionState {
    /// Latest server metadata.
    pub server: ServerSnapshot,
    /// Configured name of the processing sink, needed for filtering
    /// before the sink itself exists.
    pub sink_name: String,
    /// The one processing sink this session owns, once created.
    pub processing_sink: Option<SinkDevice>,
    /// Active notification filters.
    pub exclusions: Exclusions,
}

pub type SharedSession = Arc<Mutex<SessionState>>;

impl SessionState {
    pub fn new(config: &RoutingConfig) -> SharedSession {
        Arc::new(Mutex::new(Self {
            server: ServerSnapshot::default(),
            sink_name: config.sink_name.clone(),
            processing_sink: None,
            exclusions: config.exclusions.clone(),
        }))
    }
}
