//! Audio routing core for a virtual processing sink.
//!
//! This crate owns the server-agnostic half of an audio routing
//! manager: it maintains one virtual "processing sink" device on an
//! audio server, moves application streams into and out of it so a
//! downstream effects engine can intercept the audio, and republishes
//! server change events as ordered notifications on the consumer's own
//! thread.
//!
//! The server protocol itself lives behind the [`ServerControl`]
//! trait. The `undertow-pulse` crate implements it over the PulseAudio
//! threaded mainloop; tests implement it with an in-process fake.
//!
//! # Architecture
//!
//! ```text
//! caller threads                worker thread            consumer thread
//!       │                            │                         │
//!       ▼                            │                         │
//! RoutingManager ──commands──▶ ServerControl impl              │
//!       │                            │                         │
//!       │                     subscription callbacks           │
//!       │                            │ Event (mpsc)            │
//!       │                            └────────────▶ Router ────┤
//!       │                                             │        ▼
//!       └──── shared SessionState (Arc<Mutex>) ───────┘  Notification
//! ```
//!
//! Commands block their calling thread until the server completes
//! them. Notifications are never delivered from the worker thread;
//! they cross over as an order-preserving channel the consumer drains.
//!
//! # Usage
//!
//! ```rust,no_run
//! use undertow::{RoutingConfig, RoutingManager};
//! # use undertow::{AppStream, ClientDescriptor, Direction, ModuleDescriptor,
//! #     ServerControl, ServerSnapshot, SinkDevice};
//! # struct Stub;
//! # impl ServerControl for Stub {
//! #     fn server_info(&mut self) -> Option<ServerSnapshot> { None }
//! #     fn sink_by_name(&mut self, _: &str) -> Option<SinkDevice> { None }
//! #     fn list_sinks(&mut self) -> Vec<SinkDevice> { Vec::new() }
//! #     fn list_streams(&mut self, _: Direction) -> Vec<AppStream> { Vec::new() }
//! #     fn list_modules(&mut self) -> Vec<ModuleDescriptor> { Vec::new() }
//! #     fn list_clients(&mut self) -> Vec<ClientDescriptor> { Vec::new() }
//! #     fn load_module(&mut self, _: &str, _: &str) -> bool { false }
//! #     fn unload_module(&mut self, _: u32) -> bool { false }
//! #     fn move_stream_to_index(&mut self, _: Direction, _: u32, _: u32) -> bool { false }
//! #     fn move_stream_to_name(&mut self, _: Direction, _: u32, _: &str) -> bool { false }
//! #     fn set_stream_volume(&mut self, _: Direction, _: u32, _: u8, _: u32) -> bool { false }
//! #     fn set_stream_mute(&mut self, _: Direction, _: u32, _: bool) -> bool { false }
//! #     fn drain(&mut self) -> bool { false }
//! #     fn close(&mut self) {}
//! # }
//! # fn connect() -> Stub { Stub }
//!
//! let config = RoutingConfig::default();
//! let (mut manager, router, notifications) = RoutingManager::new(connect(), config);
//!
//! // Reaches the server, creates the processing sink, caches metadata.
//! let sink = manager.init().expect("audio routing unavailable");
//! println!("processing sink at index {}", sink.index);
//!
//! for stream in manager.list_streams(undertow::Direction::Playback) {
//!     manager.route_in(stream.index);
//! }
//! # drop((router, notifications));
//! ```

pub mod config;
pub mod control;
pub mod error;
pub mod events;
pub mod manager;
pub mod router;
pub mod session;
pub mod types;

pub use config::{Exclusions, RoutingConfig};
pub use control::{percent_to_volume, ServerControl, VOLUME_NORM};
pub use error::RoutingError;
pub use events::{Event, Notification};
pub use manager::RoutingManager;
pub use router::Router;
pub use session::{SessionState, SharedSession};
pub use types::{
    AppStream, ClientDescriptor, ConnectionState, Direction, ModuleDescriptor, ServerSnapshot,
    SinkDevice,
};
