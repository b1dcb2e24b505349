//! In-process fake audio server.
//!
//! Implements [`ServerControl`] over plain shared state so the routing
//! logic can be exercised without a live server. Handles are cloneable
//! so a test can keep inspecting (or reconnecting to) the server after
//! handing one to a manager.

use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use undertow::{
    AppStream, ClientDescriptor, Direction, ModuleDescriptor, ServerControl, ServerSnapshot,
    SinkDevice,
};

pub const DEFAULT_SINK: &str = "alsa_output.pci.analog-stereo";
pub const DEFAULT_SINK_INDEX: u32 = 40;
pub const DEFAULT_SOURCE: &str = "alsa_input.pci.analog-stereo";

#[derive(Debug, Default)]
pub struct FakeState {
    pub server: ServerSnapshot,
    pub sinks: Vec<SinkDevice>,
    pub streams: Vec<AppStream>,
    pub modules: Vec<ModuleDescriptor>,
    pub clients: Vec<ClientDescriptor>,
    /// Whether module-null-sink accepts the norewinds argument.
    pub supports_norewinds: bool,
    /// Every module-null-sink argument string the server saw.
    pub load_attempts: Vec<String>,
    /// Raw volume applied per stream index, in application order.
    pub volume_log: Vec<(u32, u32)>,
    pub drained: bool,
    pub closed: bool,
    next_index: u32,
}

/// Cloneable handle onto the fake server.
#[derive(Clone)]
pub struct FakeServer(Arc<Mutex<FakeState>>);

impl FakeServer {
    pub fn new() -> Self {
        let mut state = FakeState {
            supports_norewinds: true,
            next_index: 100,
            ..FakeState::default()
        };
        state.server = ServerSnapshot {
            server_name: "fakeaudio".into(),
            server_version: "16.1".into(),
            protocol_version: 35,
            default_sink: DEFAULT_SINK.into(),
            default_source: DEFAULT_SOURCE.into(),
            rate: 48000,
            format: "s16le".into(),
            channels: 2,
            channel_layout: "stereo".into(),
        };
        state.sinks.push(SinkDevice {
            name: DEFAULT_SINK.into(),
            index: DEFAULT_SINK_INDEX,
            description: "Built-in Audio Analog Stereo".into(),
            rate: 48000,
            format: "s16le".into(),
            active_port: "analog-output-speaker".into(),
            owner_module: None,
            monitor_source: 41,
            monitor_source_name: format!("{DEFAULT_SINK}.monitor"),
        });
        Self(Arc::new(Mutex::new(state)))
    }

    pub fn without_norewinds() -> Self {
        let server = Self::new();
        server.0.lock().unwrap().supports_norewinds = false;
        server
    }

    pub fn state(&self) -> std::sync::MutexGuard<'_, FakeState> {
        self.0.lock().unwrap()
    }

    /// Adds a playback stream attached to the default device.
    pub fn add_playback_stream(&self, name: &str) -> u32 {
        let mut state = self.0.lock().unwrap();
        let index = state.next_index;
        state.next_index += 1;
        state.streams.push(AppStream {
            index,
            name: name.to_string(),
            icon: String::new(),
            channels: 2,
            volume_percent: 100,
            rate: 44100,
            format: "s16le".into(),
            resampler: "speex-float-1".into(),
            mute: false,
            wants_to_play: true,
            device: DEFAULT_SINK_INDEX,
            direction: Direction::Playback,
        });
        index
    }

    pub fn stream(&self, index: u32) -> Option<AppStream> {
        self.0
            .lock()
            .unwrap()
            .streams
            .iter()
            .find(|s| s.index == index)
            .cloned()
    }
}

/// Minimal module-null-sink argument parsing, enough to honor
/// sink_name, rate, and the norewinds feature flag.
fn parse_args(argument: &str) -> BTreeMap<String, String> {
    argument
        .split_whitespace()
        .filter_map(|kv| kv.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

impl ServerControl for FakeServer {
    fn server_info(&mut self) -> Option<ServerSnapshot> {
        let state = self.0.lock().unwrap();
        if state.closed {
            return None;
        }
        Some(state.server.clone())
    }

    fn sink_by_name(&mut self, name: &str) -> Option<SinkDevice> {
        self.0
            .lock()
            .unwrap()
            .sinks
            .iter()
            .find(|s| s.name == name)
            .cloned()
    }

    fn list_sinks(&mut self) -> Vec<SinkDevice> {
        self.0.lock().unwrap().sinks.clone()
    }

    fn list_streams(&mut self, direction: Direction) -> Vec<AppStream> {
        self.0
            .lock()
            .unwrap()
            .streams
            .iter()
            .filter(|s| s.direction == direction)
            .cloned()
            .collect()
    }

    fn list_modules(&mut self) -> Vec<ModuleDescriptor> {
        self.0.lock().unwrap().modules.clone()
    }

    fn list_clients(&mut self) -> Vec<ClientDescriptor> {
        self.0.lock().unwrap().clients.clone()
    }

    fn load_module(&mut self, name: &str, argument: &str) -> bool {
        let mut state = self.0.lock().unwrap();
        if name != "module-null-sink" {
            return false;
        }
        state.load_attempts.push(argument.to_string());

        let args = parse_args(argument);
        if args.contains_key("norewinds") && !state.supports_norewinds {
            return false;
        }
        let Some(sink_name) = args.get("sink_name").cloned() else {
            return false;
        };
        let rate = args
            .get("rate")
            .and_then(|r| r.parse().ok())
            .unwrap_or(48000);

        let module_index = state.next_index;
        let sink_index = state.next_index + 1;
        state.next_index += 3;

        state.modules.push(ModuleDescriptor {
            index: module_index,
            name: name.to_string(),
            argument: argument.to_string(),
        });
        state.sinks.push(SinkDevice {
            name: sink_name.clone(),
            index: sink_index,
            description: "Null Output".into(),
            rate,
            format: "f32le".into(),
            active_port: "null".into(),
            owner_module: Some(module_index),
            monitor_source: sink_index + 1,
            monitor_source_name: format!("{sink_name}.monitor"),
        });
        true
    }

    fn unload_module(&mut self, index: u32) -> bool {
        let mut state = self.0.lock().unwrap();
        let before = state.modules.len();
        state.modules.retain(|m| m.index != index);
        state.sinks.retain(|s| s.owner_module != Some(index));
        state.modules.len() != before
    }

    fn move_stream_to_index(
        &mut self,
        direction: Direction,
        stream: u32,
        device_index: u32,
    ) -> bool {
        let mut state = self.0.lock().unwrap();
        if !state.sinks.iter().any(|s| s.index == device_index) {
            return false;
        }
        match state
            .streams
            .iter_mut()
            .find(|s| s.index == stream && s.direction == direction)
        {
            Some(s) => {
                s.device = device_index;
                true
            }
            None => false,
        }
    }

    fn move_stream_to_name(
        &mut self,
        direction: Direction,
        stream: u32,
        device_name: &str,
    ) -> bool {
        let device_index = match self
            .0
            .lock()
            .unwrap()
            .sinks
            .iter()
            .find(|s| s.name == device_name)
        {
            Some(s) => s.index,
            None => return false,
        };
        self.move_stream_to_index(direction, stream, device_index)
    }

    fn set_stream_volume(
        &mut self,
        direction: Direction,
        stream: u32,
        _channels: u8,
        volume: u32,
    ) -> bool {
        let mut state = self.0.lock().unwrap();
        state.volume_log.push((stream, volume));
        state
            .streams
            .iter_mut()
            .find(|s| s.index == stream && s.direction == direction)
            .is_some()
    }

    fn set_stream_mute(&mut self, direction: Direction, stream: u32, mute: bool) -> bool {
        match self
            .0
            .lock()
            .unwrap()
            .streams
            .iter_mut()
            .find(|s| s.index == stream && s.direction == direction)
        {
            Some(s) => {
                s.mute = mute;
                true
            }
            None => false,
        }
    }

    fn drain(&mut self) -> bool {
        // Blocking commands leave nothing in flight.
        self.0.lock().unwrap().drained = true;
        false
    }

    fn close(&mut self) {
        self.0.lock().unwrap().closed = true;
    }
}
