//! Conversions from the server's introspection records to the owned
//! routing types. Everything here copies out of borrowed callback data.

use libpulse_binding as pulse;
use pulse::context::introspect::{
    ClientInfo, ModuleInfo, ServerInfo, SinkInfo, SinkInputInfo, SourceOutputInfo,
};
use pulse::proplist::{properties, Proplist};
use std::borrow::Cow;
use undertow::{
    AppStream, ClientDescriptor, Direction, ModuleDescriptor, ServerSnapshot, SinkDevice,
    VOLUME_NORM,
};

fn text(value: &Option<Cow<'_, str>>) -> String {
    value.as_deref().unwrap_or_default().to_owned()
}

fn format_label(format: pulse::sample::Format) -> String {
    format!("{format:?}").to_lowercase()
}

fn volume_to_percent(volume: &pulse::volume::ChannelVolumes) -> u32 {
    (volume.avg().0 as u64 * 100 / VOLUME_NORM as u64) as u32
}

/// Display name for a stream: the application name when the client
/// published one, otherwise whatever the server calls the stream.
fn app_name(proplist: &Proplist, fallback: &Option<Cow<'_, str>>) -> String {
    proplist
        .get_str(properties::APPLICATION_NAME)
        .unwrap_or_else(|| text(fallback))
}

/// Icon hint, falling back to the process binary name so consumers
/// can always resolve something from the icon theme.
fn app_icon(proplist: &Proplist) -> String {
    proplist
        .get_str(properties::APPLICATION_ICON_NAME)
        .or_else(|| proplist.get_str(properties::APPLICATION_PROCESS_BINARY))
        .unwrap_or_default()
}

pub fn server_snapshot(info: &ServerInfo, protocol_version: u32) -> ServerSnapshot {
    ServerSnapshot {
        server_name: text(&info.server_name),
        server_version: text(&info.server_version),
        protocol_version,
        default_sink: text(&info.default_sink_name),
        default_source: text(&info.default_source_name),
        rate: info.sample_spec.rate,
        format: format_label(info.sample_spec.format),
        channels: info.sample_spec.channels,
        channel_layout: info.channel_map.print(),
    }
}

pub fn sink_device(info: &SinkInfo) -> SinkDevice {
    SinkDevice {
        name: text(&info.name),
        index: info.index,
        description: text(&info.description),
        rate: info.sample_spec.rate,
        format: format_label(info.sample_spec.format),
        active_port: info
            .active_port
            .as_ref()
            .map(|port| text(&port.description))
            .unwrap_or_default(),
        owner_module: info.owner_module,
        monitor_source: info.monitor_source,
        monitor_source_name: text(&info.monitor_source_name),
    }
}

pub fn playback_stream(info: &SinkInputInfo) -> AppStream {
    AppStream {
        index: info.index,
        name: app_name(&info.proplist, &info.name),
        icon: app_icon(&info.proplist),
        channels: info.volume.len(),
        volume_percent: volume_to_percent(&info.volume),
        rate: info.sample_spec.rate,
        format: format_label(info.sample_spec.format),
        resampler: text(&info.resample_method),
        mute: info.mute,
        wants_to_play: !info.corked,
        device: info.sink,
        direction: Direction::Playback,
    }
}

pub fn capture_stream(info: &SourceOutputInfo) -> AppStream {
    AppStream {
        index: info.index,
        name: app_name(&info.proplist, &info.name),
        icon: app_icon(&info.proplist),
        channels: info.volume.len(),
        volume_percent: volume_to_percent(&info.volume),
        rate: info.sample_spec.rate,
        format: format_label(info.sample_spec.format),
        resampler: text(&info.resample_method),
        mute: info.mute,
        wants_to_play: !info.corked,
        device: info.source,
        direction: Direction::Capture,
    }
}

pub fn module_descriptor(info: &ModuleInfo) -> ModuleDescriptor {
    ModuleDescriptor {
        index: info.index,
        name: text(&info.name),
        argument: text(&info.argument),
    }
}

pub fn client_descriptor(info: &ClientInfo) -> ClientDescriptor {
    ClientDescriptor {
        index: info.index,
        name: text(&info.name),
        binary: info
            .proplist
            .get_str(properties::APPLICATION_PROCESS_BINARY)
            .unwrap_or_default(),
    }
}
