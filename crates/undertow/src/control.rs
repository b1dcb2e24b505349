//! The synchronous command surface over the audio server.
//!
//! Every method blocks its calling thread until the server's
//! completion callback fires; there is no timeout at this layer, so
//! none of these may be called from inside a server callback (doing so
//! deadlocks on the worker loop's lock). Booleans report per-operation
//! success; the server is the source of truth for stale indices.

use crate::types::{
    AppStream, ClientDescriptor, Direction, ModuleDescriptor, ServerSnapshot, SinkDevice,
};

/// The server's normalized full-volume unit.
pub const VOLUME_NORM: u32 = 0x10000;

/// Upper bound on channels in a volume vector.
pub const MAX_CHANNELS: u8 = 32;

/// Maps a 0-100 percentage linearly onto the server's raw volume unit.
pub fn percent_to_volume(percent: u32) -> u32 {
    (VOLUME_NORM as f64 * percent as f64 / 100.0) as u32
}

/// Blocking command surface of one audio-server session.
///
/// Implementations own the worker loop driving the protocol and
/// serialize concurrent callers through the loop-wide lock.
pub trait ServerControl {
    /// Fetches current server metadata.
    fn server_info(&mut self) -> Option<ServerSnapshot>;

    /// Looks up a sink by stable name. `None` when absent or the query
    /// fails.
    fn sink_by_name(&mut self, name: &str) -> Option<SinkDevice>;

    /// Enumerates all sinks, including ones this session created.
    fn list_sinks(&mut self) -> Vec<SinkDevice>;

    /// Enumerates streams flowing in one direction.
    fn list_streams(&mut self, direction: Direction) -> Vec<AppStream>;

    fn list_modules(&mut self) -> Vec<ModuleDescriptor>;

    fn list_clients(&mut self) -> Vec<ClientDescriptor>;

    /// Loads a server module; true when the server assigned it an
    /// index.
    fn load_module(&mut self, name: &str, argument: &str) -> bool;

    fn unload_module(&mut self, index: u32) -> bool;

    /// Moves a stream onto the device with the given index.
    fn move_stream_to_index(&mut self, direction: Direction, stream: u32, device_index: u32)
        -> bool;

    /// Moves a stream onto the device with the given name.
    fn move_stream_to_name(&mut self, direction: Direction, stream: u32, device_name: &str)
        -> bool;

    /// Applies one raw volume uniformly across `channels` channels.
    fn set_stream_volume(
        &mut self,
        direction: Direction,
        stream: u32,
        channels: u8,
        volume: u32,
    ) -> bool;

    fn set_stream_mute(&mut self, direction: Direction, stream: u32, mute: bool) -> bool;

    /// Blocks until in-flight operations complete. Returns false on
    /// the no-op fast path (nothing was pending).
    fn drain(&mut self) -> bool;

    /// Releases the session and stops the worker loop. Idempotent.
    fn close(&mut self);
}
