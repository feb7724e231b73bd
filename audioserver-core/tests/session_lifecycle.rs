//! End-to-end session tests against the scripted backend.
//!
//! Run with:
//! ```bash
//! cargo test -p audioserver-core --test session_lifecycle
//! ```

mod helpers;

use std::sync::Arc;
use std::thread;

use approx::assert_relative_eq;

use audioserver_core::{
    AudioServer, BackendError, CallbackAction, ChannelDirection, Connections, ServerError,
    ServerOptions, SessionConfig, SessionState,
};
use helpers::{
    device, eventually, Behaviour, Driver, RecordingDelegate, Script, ScriptedBackend, TestClient,
    WAIT,
};

type Server = AudioServer<ScriptedBackend>;

/// Start `run` on its own thread.
fn start(server: Server) -> (Arc<Server>, thread::JoinHandle<Result<(), ServerError>>) {
    let server = Arc::new(server);
    let runner = {
        let server = Arc::clone(&server);
        thread::spawn(move || server.run())
    };
    (server, runner)
}

fn stereo() -> SessionConfig {
    SessionConfig::new(48000.0, 2, 2, 256)
}

fn silent_cycle(driver: &Driver, frames: usize) -> Option<CallbackAction> {
    let mut left = vec![0.0f32; frames];
    let mut right = vec![0.0f32; frames];
    let mut outputs: [&mut [f32]; 2] = [&mut left[..], &mut right[..]];
    driver.cycle(0, Some(frames), &[], &mut outputs)
}

// --- Creation ---

#[test]
fn no_device_fails_creation() {
    let (backend, _driver) = ScriptedBackend::new(Script::default());
    let (client, _log) = TestClient::new(Behaviour::Passthrough);

    let err = AudioServer::create(backend, stereo(), client).err();
    assert_eq!(err, Some(ServerError::NoDeviceAvailable));
}

#[test]
fn backend_enumeration_failure_fails_creation() {
    let (backend, _driver) = ScriptedBackend::new(Script {
        fail_devices: true,
        ..Script::default()
    });
    let (client, _log) = TestClient::new(Behaviour::Passthrough);

    let err = AudioServer::create(backend, stereo(), client).err();
    assert!(matches!(
        err,
        Some(ServerError::Backend(BackendError::Unavailable(_)))
    ));
}

#[test]
fn insufficient_channels_never_initialises() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("tiny", 2, 1)],
        ..Script::default()
    });
    let (client, log) = TestClient::new(Behaviour::Passthrough);

    let err = AudioServer::create(backend, stereo(), client).err();

    assert_eq!(
        err,
        Some(ServerError::InsufficientChannels {
            direction: ChannelDirection::Output,
            requested: 2,
            available: 1,
        })
    );
    assert!(driver.opened_with.lock().is_none());
    assert!(log.lock().configs.is_empty());
}

#[test]
fn invalid_config_fails_creation() {
    let (backend, _driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);

    let err = AudioServer::create(backend, SessionConfig::new(48000.0, 2, 2, 0), client).err();
    assert!(matches!(err, Some(ServerError::InvalidConfiguration(_))));
}

// --- Lifecycle ---

#[test]
fn full_lifecycle() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();
    assert_eq!(handle.state(), SessionState::New);

    let (server, runner) = start(server);
    assert!(driver.wait_activated());
    assert_eq!(handle.state(), SessionState::Active);
    assert!(handle.is_active());

    assert_eq!(silent_cycle(&driver, 256), Some(CallbackAction::Continue));

    handle.request_shutdown();
    assert_eq!(runner.join().unwrap(), Ok(()));

    assert_eq!(server.state(), SessionState::Terminated);
    assert!(!handle.is_active());
    assert!(handle.wait_for_termination(WAIT));
    assert_eq!(*driver.closes.lock(), 1);
    assert_eq!(log.lock().shutdowns, 1);
    assert_eq!(
        *delegate.states.lock(),
        vec![
            SessionState::Initialising,
            SessionState::Active,
            SessionState::Closing,
            SessionState::Terminated,
        ]
    );
}

#[test]
fn run_only_once() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();

    let (server, runner) = start(server);
    assert!(driver.wait_activated());
    assert_eq!(
        server.run(),
        Err(ServerError::IllegalLifecycle(SessionState::Active))
    );

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
    assert_eq!(
        server.run(),
        Err(ServerError::IllegalLifecycle(SessionState::Terminated))
    );
}

#[test]
fn shutdown_before_run_terminates_immediately() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();

    server.handle().request_shutdown();

    assert_eq!(server.state(), SessionState::Terminated);
    assert_eq!(
        server.run(),
        Err(ServerError::IllegalLifecycle(SessionState::Terminated))
    );
    assert!(driver.opened_with.lock().is_none());
    assert_eq!(log.lock().shutdowns, 0);
}

#[test]
fn open_failure_cleans_up_and_terminates() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("scripted", 2, 2)],
        fail_open: true,
        ..Script::default()
    });
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();

    let err = server.run().unwrap_err();

    assert!(matches!(err, ServerError::Backend(BackendError::OpenFailed(_))));
    assert_eq!(server.state(), SessionState::Terminated);
    assert_eq!(*driver.closes.lock(), 1);
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn client_rejecting_initial_config_fails_run() {
    let (backend, driver) = ScriptedBackend::standard();
    let (mut client, log) = TestClient::new(Behaviour::Passthrough);
    client.reject_configure = true;
    let server = AudioServer::create(backend, stereo(), client).unwrap();

    let err = server.run().unwrap_err();

    assert!(matches!(err, ServerError::Configuration(_)));
    assert_eq!(server.state(), SessionState::Terminated);
    assert!(driver.is_closed());
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn client_panicking_in_initial_config_fails_run() {
    let (backend, driver) = ScriptedBackend::standard();
    let (mut client, log) = TestClient::new(Behaviour::Passthrough);
    client.panic_on_configure = true;
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();

    let err = server.run().unwrap_err();

    match err {
        ServerError::Configuration(e) => assert!(e.0.contains("scripted configure panic")),
        other => panic!("unexpected error: {:?}", other),
    }
    assert_eq!(server.state(), SessionState::Terminated);
    assert!(handle.wait_for_termination(WAIT));
    assert!(!driver.is_activated());
    assert_eq!(*driver.closes.lock(), 1);
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn shutdown_during_initialisation_skips_activation() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();
    *driver.on_open.lock() = Some(Box::new(move || handle.request_shutdown()));

    assert_eq!(server.run(), Ok(()));

    assert_eq!(server.state(), SessionState::Terminated);
    assert!(!driver.is_activated());
    assert_eq!(*driver.closes.lock(), 1);
    assert_eq!(log.lock().shutdowns, 1);
    assert_eq!(
        *delegate.states.lock(),
        vec![
            SessionState::Initialising,
            SessionState::Closing,
            SessionState::Terminated
        ]
    );
}

#[test]
fn cleared_delegate_hears_nothing_more() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();

    let (server, runner) = start(server);
    assert!(driver.wait_activated());
    server.clear_delegate();

    handle.request_shutdown();
    assert_eq!(runner.join().unwrap(), Ok(()));

    assert_eq!(
        *delegate.states.lock(),
        vec![SessionState::Initialising, SessionState::Active]
    );
}

#[test]
fn activation_failure_is_returned_after_teardown() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("scripted", 2, 2)],
        fail_activate: true,
        ..Script::default()
    });
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();

    let err = server.run().unwrap_err();

    assert!(matches!(err, ServerError::Backend(BackendError::Activation(_))));
    assert_eq!(server.state(), SessionState::Terminated);
    assert!(driver.is_closed());
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn close_errors_are_swallowed() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("scripted", 2, 2)],
        fail_close: true,
        ..Script::default()
    });
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();

    let (_server, runner) = start(server);
    assert!(driver.wait_activated());
    handle.request_shutdown();

    assert_eq!(runner.join().unwrap(), Ok(()));
    assert_eq!(handle.state(), SessionState::Terminated);
}

#[test]
fn concurrent_shutdown_requests_terminate_once() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();

    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let requesters: Vec<_> = (0..8)
        .map(|i| {
            let handle = handle.clone();
            let events = driver.events();
            thread::spawn(move || {
                if i % 2 == 0 {
                    handle.request_shutdown();
                } else {
                    events.shutdown_requested("scripted");
                }
            })
        })
        .collect();
    for requester in requesters {
        requester.join().unwrap();
    }

    runner.join().unwrap().unwrap();

    let states = delegate.states.lock().clone();
    assert_eq!(
        states.iter().filter(|s| **s == SessionState::Terminated).count(),
        1
    );
    assert!(states.windows(2).all(|w| w[0] < w[1]));
    assert_eq!(log.lock().shutdowns, 1);
    assert_eq!(*driver.closes.lock(), 1);
}

// --- Real-time bridge ---

#[test]
fn planar_passthrough_end_to_end() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, SessionConfig::new(48000.0, 2, 2, 4), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let left_in = [0.1f32, 0.2, 0.3, 0.4];
    let right_in = [-0.1f32, -0.2, -0.3, -0.4];
    let mut left_out = [0.0f32; 4];
    let mut right_out = [0.0f32; 4];
    {
        let inputs: [&[f32]; 2] = [&left_in, &right_in];
        let mut outputs: [&mut [f32]; 2] = [&mut left_out, &mut right_out];
        let action = driver.cycle(1024, Some(4), &inputs, &mut outputs);
        assert_eq!(action, Some(CallbackAction::Continue));
    }

    for (o, i) in left_out.iter().zip(left_in.iter()) {
        assert_relative_eq!(*o, *i);
    }
    for (o, i) in right_out.iter().zip(right_in.iter()) {
        assert_relative_eq!(*o, *i);
    }
    assert_eq!(log.lock().timestamps, vec![1024]);
    assert_eq!(handle.diagnostics().blocks_processed, 1);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn interleaved_buffers_are_converted_both_ways() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, SessionConfig::new(48000.0, 2, 2, 3), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    // Native side has a third output channel the session does not use.
    let input = [1.0f32, 2.0, 3.0, 4.0, 5.0, 6.0];
    let mut output = [9.0f32; 9];
    let action = driver.cycle_interleaved(3, &input, 2, &mut output, 3);

    assert_eq!(action, Some(CallbackAction::Continue));
    assert_eq!(output, [1.0, 2.0, 0.0, 3.0, 4.0, 0.0, 5.0, 6.0, 0.0]);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn output_does_not_leak_into_next_block() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::FirstBlockOnly(0.75));
    let server = AudioServer::create(backend, SessionConfig::new(48000.0, 0, 1, 8), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let mut first = [0.0f32; 8];
    let mut second = [0.5f32; 8];
    {
        let mut outputs: [&mut [f32]; 1] = [&mut first];
        driver.cycle(0, Some(8), &[], &mut outputs);
    }
    {
        let mut outputs: [&mut [f32]; 1] = [&mut second];
        driver.cycle(8, Some(8), &[], &mut outputs);
    }

    assert_eq!(first, [0.75; 8]);
    assert_eq!(second, [0.0; 8]);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn process_failure_shuts_down_by_next_callback() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Fail);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let mut left = [0.3f32; 256];
    let mut right = [0.3f32; 256];
    let action = {
        let mut outputs: [&mut [f32]; 2] = [&mut left, &mut right];
        driver.cycle(0, None, &[], &mut outputs)
    };

    assert_eq!(action, Some(CallbackAction::Stop));
    assert_eq!(left, [0.0; 256]);
    assert!(handle.state().is_shutting_down());
    // The next callback either sees the shutdown or the backend is gone.
    assert_ne!(silent_cycle(&driver, 256), Some(CallbackAction::Continue));

    runner.join().unwrap().unwrap();
    assert_eq!(handle.state(), SessionState::Terminated);
    assert_eq!(handle.diagnostics().process_failures, 1);
    assert_eq!(log.lock().frames.len(), 1);
}

#[test]
fn panicking_client_is_treated_as_failure() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Panic);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    assert_eq!(silent_cycle(&driver, 256), Some(CallbackAction::Stop));

    runner.join().unwrap().unwrap();
    assert_eq!(handle.state(), SessionState::Terminated);
    // The client lock survives the panic, so shutdown still reaches it.
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn block_size_change_applies_to_next_block() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let mid_block = Arc::clone(&client.mid_block);
    let server = AudioServer::create(backend, SessionConfig::new(48000.0, 0, 1, 256), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let events = driver.events();
    let mut fired = false;
    *mid_block.lock() = Some(Box::new(move || {
        if !fired {
            fired = true;
            events.block_size_changed(128);
        }
    }));

    let mut out = vec![0.0f32; 256];
    {
        let mut outputs: [&mut [f32]; 1] = [&mut out[..]];
        driver.cycle(0, None, &[], &mut outputs);
    }
    assert_eq!(handle.config().block_size, 128);
    {
        let mut outputs: [&mut [f32]; 1] = [&mut out[..]];
        driver.cycle(256, None, &[], &mut outputs);
    }

    {
        let log = log.lock();
        assert_eq!(log.frames, vec![256, 128]);
        assert_eq!(log.output_frames, vec![256, 128]);
    }

    assert!(eventually(|| log.lock().configs.len() == 2));
    assert_eq!(log.lock().configs[1].block_size, 128);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

// --- Configuration ---

#[test]
fn client_receives_negotiated_config() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let config = log.lock().configs[0].clone();
    assert_relative_eq!(config.sample_rate, 48000.0);
    assert_eq!(config.input_channels, 2);
    assert_eq!(config.output_channels, 2);
    assert_eq!(config.block_size, 256);
    assert_eq!(config.backend.library, "Scripted");
    assert_eq!(config.backend.client_name, "audioserver-1");
    assert_eq!(config.backend.device.as_deref(), Some("scripted"));
    assert_eq!(*handle.config(), config);

    let json = serde_json::to_string(&config).unwrap();
    let parsed: SessionConfig = serde_json::from_str(&json).unwrap();
    assert_eq!(parsed, config);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn backend_may_override_rate_and_block_size() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("scripted", 2, 2)],
        negotiated: Some((44100.0, 512)),
        ..Script::default()
    });
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let config = log.lock().configs[0].clone();
    assert_relative_eq!(config.sample_rate, 44100.0);
    assert_eq!(config.block_size, 512);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn sample_rate_change_reconfigures_client() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    driver.events().sample_rate_changed(96000.0);

    assert!(eventually(|| delegate.configs.lock().len() == 1));
    assert_relative_eq!(delegate.configs.lock()[0].sample_rate, 96000.0);
    assert_relative_eq!(log.lock().configs[1].sample_rate, 96000.0);
    assert_eq!(handle.diagnostics().reconfigurations, 1);
    assert_eq!(handle.state(), SessionState::Active);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn options_from_json_drive_open_and_auto_connect() {
    let (backend, driver) = ScriptedBackend::new(Script {
        devices: vec![device("scripted", 2, 2)],
        physical_inputs: vec!["system:capture_1".into(), "system:capture_2".into()],
        physical_outputs: vec!["system:playback_1".into()],
        ..Script::default()
    });
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let options = ServerOptions::from_json(
        r#"{ "client_id": "synth", "connections": { "connect_inputs": true, "connect_outputs": true } }"#,
    )
    .unwrap();
    assert_eq!(options.connections, Connections::ALL);

    let server = AudioServer::create_with_options(backend, stereo(), client, options).unwrap();
    let handle = server.handle();
    let (server, runner) = start(server);
    assert!(driver.wait_activated());

    let request = driver.opened_with.lock().clone().unwrap();
    assert_eq!(request.client_id.as_str(), "synth");
    assert!(request.allow_server_start);

    assert!(eventually(|| driver.connections.lock().len() == 3));
    assert_eq!(
        *driver.connections.lock(),
        vec![
            ("system:capture_1".to_string(), "synth:Input_1".to_string()),
            ("system:capture_2".to_string(), "synth:Input_2".to_string()),
            ("synth:Output_1".to_string(), "system:playback_1".to_string()),
        ]
    );

    server
        .disconnect_ports("synth:Output_1", "system:playback_1")
        .unwrap();
    assert!(server
        .disconnect_ports("synth:Output_1", "system:playback_1")
        .is_err());

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

// --- Driver events ---

#[test]
fn reset_from_driver_thread_ends_session() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let events = driver.events();
    thread::spawn(move || events.reset_requested())
        .join()
        .unwrap();

    runner.join().unwrap().unwrap();
    assert_eq!(handle.state(), SessionState::Terminated);
    assert_eq!(log.lock().shutdowns, 1);
}

#[test]
fn latency_reports_are_visible_and_forwarded() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());
    assert!(!handle.latency_report().is_known());

    let events = driver.events();
    events.latencies_changed(256, 512);
    events.latencies_changed(128, 384);

    let report = handle.latency_report();
    assert_eq!((report.input_frames, report.output_frames), (128, 384));
    assert_eq!(delegate.latencies.lock().len(), 2);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}

#[test]
fn registrations_and_xruns() {
    let (backend, driver) = ScriptedBackend::standard();
    let (client, _log) = TestClient::new(Behaviour::Passthrough);
    let server = AudioServer::create(backend, stereo(), client).unwrap();
    let delegate = Arc::new(RecordingDelegate::default());
    server.set_delegate(delegate.clone());
    let handle = server.handle();
    let (_server, runner) = start(server);
    assert!(driver.wait_activated());

    let events = driver.events();
    events.port_registration("other:out_1", true);
    events.client_registration("other", false);
    events.xrun();
    events.xrun();
    events.resync_requested();

    assert_eq!(
        *delegate.ports.lock(),
        vec![("other:out_1".to_string(), true)]
    );
    assert_eq!(*delegate.clients.lock(), vec![("other".to_string(), false)]);
    assert_eq!(handle.diagnostics().xruns, 2);
    assert_eq!(handle.state(), SessionState::Active);

    handle.request_shutdown();
    runner.join().unwrap().unwrap();
}
