use serde::{Deserialize, Serialize};
use std::fmt;

/// Which way audio flows through a stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Direction {
    /// Application output (a sink input on the server).
    Playback,
    /// Application input (a source output on the server).
    Capture,
}

impl Direction {
    pub fn as_str(&self) -> &'static str {
        match self {
            Direction::Playback => "playback",
            Direction::Capture => "capture",
        }
    }
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Connection state of the session, mirroring the server's own state
/// machine. Transitions are driven only by server-pushed callbacks on
/// the worker thread.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConnectionState {
    Unconnected,
    Connecting,
    Authorizing,
    SettingName,
    Ready,
    Failed,
    Terminated,
}

/// Server metadata cached on the session.
///
/// Written only from the worker thread (connection init and
/// server-changed events); callers read it as a clone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ServerSnapshot {
    pub server_name: String,
    pub server_version: String,
    pub protocol_version: u32,
    pub default_sink: String,
    pub default_source: String,
    pub rate: u32,
    pub format: String,
    pub channels: u8,
    pub channel_layout: String,
}

/// An output device known to the server.
///
/// The index is server-assigned and may be reused after a remove;
/// never cache it across a remove/re-add.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SinkDevice {
    pub name: String,
    pub index: u32,
    pub description: String,
    pub rate: u32,
    pub format: String,
    pub active_port: String,
    /// Set only for devices this manager created itself; required to
    /// unload the backing module on teardown.
    pub owner_module: Option<u32>,
    pub monitor_source: u32,
    pub monitor_source_name: String,
}

/// One application playback or capture stream.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppStream {
    pub index: u32,
    pub name: String,
    pub icon: String,
    pub channels: u8,
    /// Normalized 0-100 scale.
    pub volume_percent: u32,
    pub rate: u32,
    pub format: String,
    pub resampler: String,
    pub mute: bool,
    /// Inverse of the server's corked flag.
    pub wants_to_play: bool,
    /// Index of the device the stream is currently attached to.
    pub device: u32,
    pub direction: Direction,
}

/// A loaded server module. Re-fetched on every query, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModuleDescriptor {
    pub index: u32,
    pub name: String,
    pub argument: String,
}

/// A connected client. Re-fetched on every query, never cached.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClientDescriptor {
    pub index: u32,
    pub name: String,
    pub binary: String,
}
