//! Routing configuration.
//!
//! The manager takes an explicitly constructed [`RoutingConfig`] at
//! startup instead of reaching into global state. The configuration
//! collaborator replaces the exclusion lists through
//! [`RoutingManager::set_exclusions`](crate::RoutingManager::set_exclusions);
//! updates affect subsequent events only.

use crate::types::Direction;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Per-direction sets of stream display names opted out of routing
/// notifications. A changed-stream event whose name is listed for its
/// direction is surfaced to nobody.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Exclusions {
    #[serde(default)]
    playback: BTreeSet<String>,
    #[serde(default)]
    capture: BTreeSet<String>,
}

impl Exclusions {
    pub fn is_excluded(&self, direction: Direction, name: &str) -> bool {
        match direction {
            Direction::Playback => self.playback.contains(name),
            Direction::Capture => self.capture.contains(name),
        }
    }

    /// Replaces the active set for one direction.
    pub fn set<I, S>(&mut self, direction: Direction, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let set = names.into_iter().map(Into::into).collect();
        match direction {
            Direction::Playback => self.playback = set,
            Direction::Capture => self.capture = set,
        }
    }
}

/// Construction-time configuration for the routing manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RoutingConfig {
    /// Client name reported to the audio server.
    pub client_name: String,
    /// Stable device name of the processing sink.
    pub sink_name: String,
    /// Human-readable description of the processing sink.
    pub sink_description: String,
    /// Initial exclusion lists; replaceable at runtime.
    #[serde(default)]
    pub exclusions: Exclusions,
}

impl Default for RoutingConfig {
    fn default() -> Self {
        Self {
            client_name: "undertow".to_string(),
            sink_name: "undertow_processing".to_string(),
            sink_description: "Undertow Processing Sink".to_string(),
            exclusions: Exclusions::default(),
        }
    }
}
