mod fixtures;

use fixtures::{FakeServer, DEFAULT_SINK, DEFAULT_SINK_INDEX, DEFAULT_SOURCE};
use undertow::{
    Direction, Event, Notification, RoutingConfig, RoutingManager, ServerControl, ServerSnapshot,
    SinkDevice,
};

fn config() -> RoutingConfig {
    RoutingConfig::default()
}

#[test]
fn ensure_processing_sink_is_idempotent() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());

    let first = manager.init().expect("init should create the sink");
    let modules_after_first = server.state().modules.len();

    let second = manager
        .ensure_processing_sink(&first.name, "Undertow Processing Sink", 48000)
        .expect("second ensure should find the existing sink");

    assert_eq!(first.index, second.index);
    assert_eq!(first.name, second.name);
    assert_eq!(server.state().modules.len(), modules_after_first);
}

#[test]
fn creation_uses_norewinds_when_supported() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());

    let sink = manager
        .ensure_processing_sink("effects", "desc", 48000)
        .expect("creation should succeed on the first attempt");

    assert_eq!(sink.name, "effects");
    let state = server.state();
    assert_eq!(state.load_attempts.len(), 1);
    assert!(state.load_attempts[0].contains("norewinds=1"));
}

#[test]
fn creation_falls_back_without_norewinds() {
    let server = FakeServer::without_norewinds();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());

    let sink = manager
        .ensure_processing_sink("effects", "desc", 48000)
        .expect("fallback creation should succeed");

    assert_eq!(sink.rate, 48000);
    let state = server.state();
    assert_eq!(state.load_attempts.len(), 2);
    assert!(state.load_attempts[0].contains("norewinds=1"));
    assert!(state.load_attempts[1].contains("channels=2"));
    assert!(state.load_attempts[1].contains("rate=48000"));
    assert!(!state.load_attempts[1].contains("norewinds"));
}

#[test]
fn init_matches_default_device_rate() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());

    let sink = manager.init().expect("init should succeed");
    assert_eq!(sink.rate, 48000);
    assert_eq!(manager.processing_sink().unwrap().index, sink.index);
}

#[test]
fn route_in_then_out_round_trips() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    let stream = server.add_playback_stream("Music Player");
    assert_eq!(server.stream(stream).unwrap().device, DEFAULT_SINK_INDEX);

    assert!(manager.route_in(stream));
    assert_eq!(server.stream(stream).unwrap().device, sink.index);
    assert!(manager.is_routed(&server.stream(stream).unwrap()));

    assert!(manager.route_out(stream));
    assert_eq!(server.stream(stream).unwrap().device, DEFAULT_SINK_INDEX);
    assert!(!manager.is_routed(&server.stream(stream).unwrap()));
}

#[test]
fn route_in_fails_without_processing_sink() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    let stream = server.add_playback_stream("Music Player");

    // No init, so no processing sink exists yet.
    assert!(!manager.route_in(stream));
    assert_eq!(server.stream(stream).unwrap().device, DEFAULT_SINK_INDEX);
}

#[test]
fn stale_stream_index_reports_failure() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");

    assert!(!manager.route_in(9999));
}

#[test]
fn volume_mapping_is_monotonic_end_to_end() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");
    let stream = server.add_playback_stream("Music Player");

    for pct in [0, 1, 25, 50, 75, 99, 100] {
        manager.set_volume(Direction::Playback, stream, 2, pct);
    }

    let state = server.state();
    let raws: Vec<u32> = state.volume_log.iter().map(|&(_, v)| v).collect();
    assert_eq!(raws.len(), 7);
    assert!(raws.windows(2).all(|w| w[0] <= w[1]), "raw volumes must be nondecreasing");
    assert_eq!(*raws.last().unwrap(), undertow::VOLUME_NORM);
}

#[test]
fn invalid_channel_count_skips_volume_change() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");
    let stream = server.add_playback_stream("Music Player");

    manager.set_volume(Direction::Playback, stream, 0, 50);
    manager.set_volume(Direction::Playback, stream, 33, 50);

    assert!(server.state().volume_log.is_empty());
}

#[test]
fn mute_round_trips() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");
    let stream = server.add_playback_stream("Music Player");

    assert!(manager.set_mute(Direction::Playback, stream, true));
    assert!(server.stream(stream).unwrap().mute);
    assert!(manager.set_mute(Direction::Playback, stream, false));
    assert!(!server.stream(stream).unwrap().mute);
}

#[test]
fn list_sinks_hides_the_processing_sink() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    let sinks = manager.list_sinks();
    assert!(sinks.iter().any(|s| s.name == DEFAULT_SINK));
    assert!(sinks.iter().all(|s| s.name != sink.name));
}

#[test]
fn excluded_stream_change_is_suppressed() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");
    manager.set_exclusions(Direction::Playback, ["Blocked App"]);

    let blocked = server.add_playback_stream("Blocked App");
    let allowed = server.add_playback_stream("Allowed App");

    router.handle(Event::StreamChanged(server.stream(blocked).unwrap()));
    router.handle(Event::StreamChanged(server.stream(allowed).unwrap()));

    match rx.try_recv() {
        Ok(Notification::StreamChanged(s)) => assert_eq!(s.name, "Allowed App"),
        other => panic!("expected the allowed stream's change, got {other:?}"),
    }
    assert!(rx.try_recv().is_err(), "no further notifications expected");
}

#[test]
fn exclusion_applies_per_direction_only() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");
    // Excluded for capture; playback changes still surface.
    manager.set_exclusions(Direction::Capture, ["Voice Chat"]);

    let stream = server.add_playback_stream("Voice Chat");
    router.handle(Event::StreamChanged(server.stream(stream).unwrap()));

    assert!(matches!(
        rx.try_recv(),
        Ok(Notification::StreamChanged(_))
    ));
}

#[test]
fn processing_sink_never_surfaces_as_added() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    router.handle(Event::SinkAdded(sink.clone()));
    assert!(rx.try_recv().is_err(), "own sink must not surface as added");

    let other = SinkDevice {
        name: "bluetooth_headset".into(),
        index: 77,
        ..sink
    };
    router.handle(Event::SinkAdded(other));
    assert!(matches!(rx.try_recv(), Ok(Notification::SinkAdded(_))));
}

#[test]
fn processing_sink_change_refreshes_cached_format() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    let changed = SinkDevice {
        rate: 96000,
        format: "f32le".into(),
        ..sink
    };
    router.handle(Event::SinkChanged(changed));

    let cached = manager.processing_sink().expect("sink still owned");
    assert_eq!(cached.rate, 96000);
    assert_eq!(cached.format, "f32le");
    // The change itself still surfaces; only "added" is hidden.
    assert!(matches!(rx.try_recv(), Ok(Notification::SinkChanged(_))));
}

#[test]
fn server_change_reports_defaults_and_generic_event() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");

    let snapshot = ServerSnapshot {
        default_sink: "usb_dac".into(),
        ..manager.server()
    };
    router.handle(Event::ServerChanged(snapshot));

    assert!(matches!(
        rx.try_recv(),
        Ok(Notification::DefaultSinkChanged(name)) if name == "usb_dac"
    ));
    assert!(matches!(
        rx.try_recv(),
        Ok(Notification::DefaultSourceChanged(name)) if name == DEFAULT_SOURCE
    ));
    assert!(matches!(rx.try_recv(), Ok(Notification::ServerChanged)));
    assert_eq!(manager.server().default_sink, "usb_dac");
}

#[test]
fn default_sink_becoming_processing_sink_is_not_reported() {
    let server = FakeServer::new();
    let (mut manager, router, rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    let snapshot = ServerSnapshot {
        default_sink: sink.name,
        ..manager.server()
    };
    router.handle(Event::ServerChanged(snapshot));

    assert!(matches!(
        rx.try_recv(),
        Ok(Notification::DefaultSourceChanged(_))
    ));
    assert!(matches!(rx.try_recv(), Ok(Notification::ServerChanged)));
    assert!(rx.try_recv().is_err());
}

#[test]
fn shutdown_unloads_sink_and_fresh_session_no_longer_sees_it() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    let sink = manager.init().expect("init should succeed");

    let stream = server.add_playback_stream("Music Player");
    assert!(manager.route_in(stream));

    manager.shutdown();
    {
        let state = server.state();
        assert!(state.modules.is_empty(), "module must be unloaded");
        assert!(state.drained);
        assert!(state.closed);
    }

    // Fresh session against the same server: the sink is gone.
    {
        let mut state = server.state();
        state.closed = false;
    }
    let (mut fresh, _router, _rx) = RoutingManager::new(server.clone(), config());
    let sinks = fresh.control_mut().list_sinks();
    assert!(sinks.iter().all(|s| s.name != sink.name));
}

#[test]
fn shutdown_completes_when_nothing_needs_draining() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");

    // After the blocking unload nothing is in flight; a no-op drain
    // must not abort the remaining teardown steps.
    manager.shutdown();
    let state = server.state();
    assert!(state.drained);
    assert!(state.closed);
}

#[test]
fn shutdown_is_idempotent() {
    let server = FakeServer::new();
    let (mut manager, _router, _rx) = RoutingManager::new(server.clone(), config());
    manager.init().expect("init should succeed");

    manager.shutdown();
    manager.shutdown();
    assert!(server.state().modules.is_empty());
}
