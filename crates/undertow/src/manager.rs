//! The routing manager: public command surface and teardown.

use crate::config::RoutingConfig;
use crate::control::{percent_to_volume, ServerControl, MAX_CHANNELS};
use crate::error::RoutingError;
use crate::events::Notification;
use crate::router::Router;
use crate::session::{SessionState, SharedSession};
use crate::types::{
    AppStream, ClientDescriptor, Direction, ModuleDescriptor, ServerSnapshot, SinkDevice,
};
use std::sync::mpsc::{self, Receiver};
use tracing::{debug, error, info, warn};

/// Owns one audio-server session and the virtual processing sink on
/// it.
///
/// Any number of threads may call the command methods; each blocks
/// until the server answers. The manager never retries a failed
/// command and never panics on a server-side failure - only a session
/// that cannot reach readiness or a processing sink that cannot be
/// created are fatal.
pub struct RoutingManager<C: ServerControl> {
    control: C,
    shared: SharedSession,
    config: RoutingConfig,
}

impl<C: ServerControl> RoutingManager<C> {
    /// Wires a manager, its event router, and the notification channel
    /// over an already connected session.
    pub fn new(control: C, config: RoutingConfig) -> (Self, Router, Receiver<Notification>) {
        let shared = SessionState::new(&config);
        let (tx, rx) = mpsc::channel();
        let router = Router::new(shared.clone(), tx);
        let manager = Self {
            control,
            shared,
            config,
        };
        (manager, router, rx)
    }

    /// One-time initialization after the session reached readiness:
    /// caches server metadata and ensures the processing sink exists,
    /// matching the system default device's sample rate.
    ///
    /// Event subscription is not part of this step; the command
    /// surface is session-agnostic, so consumers that want the event
    /// feed install it on the driver through
    /// [`control_mut`](Self::control_mut) after `init` returns.
    pub fn init(&mut self) -> Result<SinkDevice, RoutingError> {
        let snapshot = self
            .control
            .server_info()
            .ok_or(RoutingError::ServerInfoUnavailable)?;
        debug!(server = %snapshot.server_name, version = %snapshot.server_version,
            default_sink = %snapshot.default_sink, default_source = %snapshot.default_source,
            "connected to audio server");

        let default_sink = snapshot.default_sink.clone();
        self.shared.lock().unwrap().server = snapshot;

        let default_info = self.control.sink_by_name(&default_sink).ok_or_else(|| {
            error!(name = %default_sink, "could not query default output device");
            RoutingError::DefaultSinkUnavailable { name: default_sink }
        })?;
        debug!(
            rate = default_info.rate,
            format = %default_info.format,
            "default output device format"
        );

        let name = self.config.sink_name.clone();
        let description = self.config.sink_description.clone();
        self.ensure_processing_sink(&name, &description, default_info.rate)
    }

    /// Idempotently ensures the processing sink exists, creating it
    /// with the zero-rewind argument set and falling back to a basic
    /// stereo set on servers that reject it.
    pub fn ensure_processing_sink(
        &mut self,
        name: &str,
        description: &str,
        rate: u32,
    ) -> Result<SinkDevice, RoutingError> {
        if let Some(existing) = self.control.sink_by_name(name) {
            debug!(name, index = existing.index, "processing sink already loaded");
            self.remember_sink(existing.clone());
            return Ok(existing);
        }

        let argument = format!(
            "sink_name={name} sink_properties=device.description=\"{description}\"device.class=\"sound\" norewinds=1"
        );
        if self.control.load_module("module-null-sink", &argument) {
            debug!(argument = %argument, "loaded module-null-sink");
            return self.adopt_created_sink(name);
        }

        warn!(
            "server does not support norewinds; loading the sink the old way - \
             app volume changes may crackle"
        );
        let argument = format!(
            "sink_name={name} sink_properties=device.description=\"{description}\"device.class=\"sound\" channels=2 rate={rate}"
        );
        if self.control.load_module("module-null-sink", &argument) {
            debug!(argument = %argument, "loaded module-null-sink");
            return self.adopt_created_sink(name);
        }

        error!(argument = %argument, "failed to load module-null-sink");
        Err(RoutingError::SinkUnavailable {
            name: name.to_string(),
        })
    }

    fn adopt_created_sink(&mut self, name: &str) -> Result<SinkDevice, RoutingError> {
        match self.control.sink_by_name(name) {
            Some(sink) => {
                self.remember_sink(sink.clone());
                Ok(sink)
            }
            None => Err(RoutingError::SinkUnavailable {
                name: name.to_string(),
            }),
        }
    }

    fn remember_sink(&mut self, sink: SinkDevice) {
        self.shared.lock().unwrap().processing_sink = Some(sink);
    }

    /// Moves a playback stream onto the processing sink.
    pub fn route_in(&mut self, stream: u32) -> bool {
        let Some(sink_index) = self
            .shared
            .lock()
            .unwrap()
            .processing_sink
            .as_ref()
            .map(|s| s.index)
        else {
            warn!(stream, "cannot route without a processing sink");
            return false;
        };
        let ok = self
            .control
            .move_stream_to_index(Direction::Playback, stream, sink_index);
        if ok {
            debug!(stream, sink = sink_index, "stream moved to processing sink");
        } else {
            error!(stream, "failed to move stream to processing sink");
        }
        ok
    }

    /// Moves a playback stream back onto the current default output
    /// device.
    pub fn route_out(&mut self, stream: u32) -> bool {
        let default_sink = self.shared.lock().unwrap().server.default_sink.clone();
        let ok = self
            .control
            .move_stream_to_name(Direction::Playback, stream, &default_sink);
        if ok {
            debug!(stream, sink = %default_sink, "stream moved back to default device");
        } else {
            error!(stream, sink = %default_sink, "failed to move stream back");
        }
        ok
    }

    /// Applies a 0-100 volume uniformly across a stream's channels.
    /// An invalid channel count skips the operation.
    pub fn set_volume(&mut self, direction: Direction, stream: u32, channels: u8, percent: u32) {
        if channels == 0 || channels > MAX_CHANNELS {
            warn!(stream, channels, "invalid channel count, skipping volume change");
            return;
        }
        let raw = percent_to_volume(percent);
        if self
            .control
            .set_stream_volume(direction, stream, channels, raw)
        {
            debug!(stream, %direction, percent, "changed stream volume");
        } else {
            error!(stream, %direction, "failed to change stream volume");
        }
    }

    pub fn set_mute(&mut self, direction: Direction, stream: u32, mute: bool) -> bool {
        let ok = self.control.set_stream_mute(direction, stream, mute);
        if ok {
            debug!(stream, %direction, mute, "changed stream mute");
        } else {
            error!(stream, %direction, "failed to change stream mute");
        }
        ok
    }

    /// All sinks except the processing sink itself.
    pub fn list_sinks(&mut self) -> Vec<SinkDevice> {
        let own = self.config.sink_name.clone();
        self.control
            .list_sinks()
            .into_iter()
            .filter(|s| s.name != own)
            .collect()
    }

    pub fn list_streams(&mut self, direction: Direction) -> Vec<AppStream> {
        self.control.list_streams(direction)
    }

    pub fn list_modules(&mut self) -> Vec<ModuleDescriptor> {
        self.control.list_modules()
    }

    pub fn list_clients(&mut self) -> Vec<ClientDescriptor> {
        self.control.list_clients()
    }

    /// Whether a stream is currently attached to the processing sink.
    ///
    /// Capture routing state is not detectable on this protocol; it is
    /// always reported as unrouted so callers re-route rather than
    /// guess.
    pub fn is_routed(&self, stream: &AppStream) -> bool {
        match stream.direction {
            Direction::Playback => self
                .shared
                .lock()
                .unwrap()
                .processing_sink
                .as_ref()
                .is_some_and(|s| s.index == stream.device),
            Direction::Capture => false,
        }
    }

    /// Replaces the active exclusion list for one direction. Applies
    /// to subsequent events only.
    pub fn set_exclusions<I, S>(&mut self, direction: Direction, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.shared
            .lock()
            .unwrap()
            .exclusions
            .set(direction, names);
    }

    /// Latest cached server metadata.
    pub fn server(&self) -> ServerSnapshot {
        self.shared.lock().unwrap().server.clone()
    }

    /// The owned processing sink, once created.
    pub fn processing_sink(&self) -> Option<SinkDevice> {
        self.shared.lock().unwrap().processing_sink.clone()
    }

    /// Access to the underlying session, e.g. to install the event
    /// subscription after [`init`](Self::init).
    pub fn control_mut(&mut self) -> &mut C {
        &mut self.control
    }

    /// Best-effort shutdown: unload the owned sink module, drain
    /// in-flight operations, then release the session. Later steps run
    /// even when earlier ones fail.
    pub fn shutdown(&mut self) {
        debug!("unloading processing sink...");
        let owned = self.shared.lock().unwrap().processing_sink.take();
        match owned {
            Some(sink) => match sink.owner_module {
                Some(module) => {
                    if self.control.unload_module(module) {
                        debug!(module, "processing sink module unloaded");
                    } else {
                        error!(module, "failed to unload processing sink module");
                    }
                }
                None => warn!(sink = %sink.name, "owner module unknown, cannot unload"),
            },
            None => debug!("no processing sink to unload"),
        }

        if self.control.drain() {
            debug!("session drained");
        } else {
            debug!("session did not need draining");
        }

        self.control.close();
        info!("audio routing session closed");
    }
}
