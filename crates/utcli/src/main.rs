//! utcli - command line front end for the undertow routing manager
//!
//! Subcommands:
//! - `utcli status` - Server metadata and processing sink state
//! - `utcli sinks` - List output devices
//! - `utcli streams` - List application streams
//! - `utcli route-in <stream>` - Move a stream onto the processing sink
//! - `utcli route-out <stream>` - Move a stream back to the default device
//! - `utcli watch` - Follow routing notifications until interrupted
//! - `utcli teardown` - Unload the processing sink and drain

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use undertow::{Direction, Notification, RoutingConfig, RoutingManager};
use undertow_pulse::PulseSession;

#[derive(Parser)]
#[command(name = "utcli")]
#[command(about = "Audio routing manager CLI")]
#[command(version)]
struct Cli {
    /// Name of the virtual processing sink
    #[arg(long, env = "UNDERTOW_SINK", default_value = "undertow_processing")]
    sink_name: String,

    /// Human-readable description of the processing sink
    #[arg(long, default_value = "Undertow Processing Sink")]
    sink_description: String,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show server metadata and the processing sink
    Status,

    /// List output devices (the processing sink is hidden)
    Sinks {
        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List application streams
    Streams {
        /// List capture streams instead of playback streams
        #[arg(short, long)]
        capture: bool,

        /// Emit machine-readable JSON
        #[arg(long)]
        json: bool,
    },

    /// List loaded server modules
    Modules,

    /// List connected clients
    Clients,

    /// Move a playback stream onto the processing sink
    RouteIn {
        /// Stream index
        stream: u32,
    },

    /// Move a playback stream back to the default output device
    RouteOut {
        /// Stream index
        stream: u32,
    },

    /// Set a stream's volume
    Volume {
        /// Stream index
        stream: u32,

        /// Volume on a 0-100 scale
        percent: u32,

        /// Number of channels the stream carries
        #[arg(short = 'n', long, default_value = "2")]
        channels: u8,

        /// Address a capture stream instead of a playback stream
        #[arg(short, long)]
        capture: bool,
    },

    /// Mute or unmute a stream
    Mute {
        /// Stream index
        stream: u32,

        /// true to mute, false to unmute
        #[arg(value_parser = clap::value_parser!(bool))]
        mute: bool,

        /// Address a capture stream instead of a playback stream
        #[arg(short, long)]
        capture: bool,
    },

    /// Follow routing notifications until interrupted
    Watch,

    /// Unload the processing sink and close the session
    Teardown,
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::from_default_env()
                .add_directive(tracing::Level::WARN.into()),
        )
        .init();

    let cli = Cli::parse();
    let config = RoutingConfig {
        sink_name: cli.sink_name,
        sink_description: cli.sink_description,
        ..RoutingConfig::default()
    };

    let session = PulseSession::connect(&config).context("could not reach the audio server")?;
    let (mut manager, router, notifications) = RoutingManager::new(session, config);
    manager.init().context("session initialization failed")?;

    match cli.command {
        Commands::Status => {
            println!("connection: {:?}", manager.control_mut().state());
            let server = manager.server();
            println!("{}", serde_json::to_string_pretty(&server)?);
            match manager.processing_sink() {
                Some(sink) => println!(
                    "processing sink: {} (index {}, {} Hz {})",
                    sink.name, sink.index, sink.rate, sink.format
                ),
                None => println!("processing sink: none"),
            }
        }
        Commands::Sinks { json } => {
            let sinks = manager.list_sinks();
            if json {
                println!("{}", serde_json::to_string_pretty(&sinks)?);
            } else {
                for sink in sinks {
                    println!("{:>4}  {}  [{}]", sink.index, sink.name, sink.description);
                }
            }
        }
        Commands::Streams { capture, json } => {
            let direction = direction_for(capture);
            let streams = manager.list_streams(direction);
            if json {
                println!("{}", serde_json::to_string_pretty(&streams)?);
            } else {
                for stream in streams {
                    let routed = if manager.is_routed(&stream) { "*" } else { " " };
                    println!(
                        "{:>4} {routed} {}  {}ch {} Hz  vol {}%{}",
                        stream.index,
                        stream.name,
                        stream.channels,
                        stream.rate,
                        stream.volume_percent,
                        if stream.mute { "  [muted]" } else { "" },
                    );
                }
            }
        }
        Commands::Modules => {
            for module in manager.list_modules() {
                println!("{:>4}  {}  {}", module.index, module.name, module.argument);
            }
        }
        Commands::Clients => {
            for client in manager.list_clients() {
                println!("{:>4}  {}  ({})", client.index, client.name, client.binary);
            }
        }
        Commands::RouteIn { stream } => {
            if !manager.route_in(stream) {
                anyhow::bail!("failed to route stream {stream}");
            }
            println!("stream {stream} routed to processing sink");
        }
        Commands::RouteOut { stream } => {
            if !manager.route_out(stream) {
                anyhow::bail!("failed to route stream {stream} back");
            }
            println!("stream {stream} routed back to default device");
        }
        Commands::Volume {
            stream,
            percent,
            channels,
            capture,
        } => {
            manager.set_volume(direction_for(capture), stream, channels, percent);
        }
        Commands::Mute {
            stream,
            mute,
            capture,
        } => {
            if !manager.set_mute(direction_for(capture), stream, mute) {
                anyhow::bail!("failed to change mute on stream {stream}");
            }
        }
        Commands::Watch => {
            let events = manager.control_mut().subscribe_events();
            std::thread::spawn(move || {
                for event in events {
                    router.handle(event);
                }
            });
            println!("watching for routing events (ctrl-c to stop)...");
            for notification in notifications {
                print_notification(&notification);
            }
        }
        Commands::Teardown => {
            manager.shutdown();
        }
    }

    Ok(())
}

fn direction_for(capture: bool) -> Direction {
    if capture {
        Direction::Capture
    } else {
        Direction::Playback
    }
}

fn print_notification(notification: &Notification) {
    match notification {
        Notification::StreamAdded(s) => {
            println!("+ stream {} {} ({})", s.index, s.name, s.direction)
        }
        Notification::StreamChanged(s) => {
            println!("~ stream {} {} ({})", s.index, s.name, s.direction)
        }
        Notification::StreamRemoved { direction, index } => {
            println!("- stream {index} ({direction})")
        }
        Notification::SinkAdded(s) => println!("+ sink {} {}", s.index, s.name),
        Notification::SinkChanged(s) => println!("~ sink {} {}", s.index, s.name),
        Notification::SinkRemoved { index } => println!("- sink {index}"),
        Notification::DefaultSinkChanged(name) => println!("default sink -> {name}"),
        Notification::DefaultSourceChanged(name) => println!("default source -> {name}"),
        Notification::ServerChanged => println!("server configuration changed"),
    }
}
