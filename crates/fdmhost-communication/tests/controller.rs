mod common;

use common::{eventually, fast_config, MockState, MockTransport, PORT};
use fdmhost_communication::{MarlinController, SerialPortInfo};
use fdmhost_core::PrinterError;
use std::time::Duration;

#[tokio::test]
async fn test_send_when_disconnected_does_not_touch_transport() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());

    let result = controller.send("G28", true, Duration::from_millis(100)).await;
    assert_eq!(result, Err(PrinterError::NotConnected));

    let result = controller.send_command("M105", true).await;
    assert!(!result.success);
    assert_eq!(result.response, "Not connected to printer");

    let device = device.lock();
    assert!(device.written.is_empty());
    assert!(device.opened.is_empty());
}

#[tokio::test]
async fn test_connect_resets_and_identifies() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());

    let port = controller.connect(None).await.unwrap();
    assert_eq!(port, PORT);

    let status = controller.status();
    assert!(status.connected);
    assert_eq!(status.port.as_deref(), Some(PORT));
    assert!(status.error.is_empty());

    let device = device.lock();
    assert_eq!(device.dtr, vec![false, true]);
    assert_eq!(device.written, vec!["M115"]);
    // Leftover handshake lines are discarded.
    assert!(device.incoming.is_empty());
}

#[tokio::test]
async fn test_discovery_prefers_signature() {
    let state = MockState {
        ports: vec![
            SerialPortInfo::new("/dev/ttyACM0", "USB Arduino Uno"),
            SerialPortInfo::new("/dev/ttyUSB7", "USB-SERIAL CH340"),
        ],
        ..MockState::default()
    };
    let (transport, device) = MockTransport::with_state(state);
    let controller = MarlinController::new(Box::new(transport), fast_config());

    assert_eq!(controller.connect(None).await.unwrap(), "/dev/ttyUSB7");
    assert_eq!(device.lock().opened, vec!["/dev/ttyUSB7"]);
}

#[tokio::test]
async fn test_no_device_found() {
    let state = MockState {
        ports: vec![SerialPortInfo::new("/dev/ttyS0", "Serial Port")],
        ..MockState::default()
    };
    let (transport, _device) = MockTransport::with_state(state);
    let controller = MarlinController::new(Box::new(transport), fast_config());

    assert_eq!(
        controller.connect(None).await,
        Err(PrinterError::NoDeviceFound)
    );
    assert!(!controller.is_connected());
}

#[tokio::test]
async fn test_handshake_failure_leaves_disconnected() {
    let state = MockState {
        identity: vec!["Grbl 1.1h ['$' for help]".to_string()],
        ..MockState::default()
    };
    let (transport, device) = MockTransport::with_state(state);
    let controller = MarlinController::new(Box::new(transport), fast_config());

    let err = controller.connect(Some(PORT)).await.unwrap_err();
    assert!(matches!(err, PrinterError::HandshakeFailed { .. }));

    let status = controller.status();
    assert!(!status.connected);
    assert!(!status.error.is_empty());
    assert!(!device.lock().open);

    let result = controller.send("G28", true, Duration::from_millis(50)).await;
    assert_eq!(result, Err(PrinterError::NotConnected));
}

#[tokio::test]
async fn test_open_failure_is_a_port_error() {
    let state = MockState {
        fail_open: true,
        ..MockState::default()
    };
    let (transport, _device) = MockTransport::with_state(state);
    let controller = MarlinController::new(Box::new(transport), fast_config());

    let err = controller.connect(Some("/dev/ttyUSB3")).await.unwrap_err();
    assert!(matches!(err, PrinterError::Port { ref port, .. } if port == "/dev/ttyUSB3"));
}

#[tokio::test]
async fn test_temperature_report_updates_state() {
    let (transport, device) = MockTransport::new();
    device.lock().replies.insert(
        "M105".to_string(),
        vec!["ok T:25.0 /200.0 B:22.5 /60.0 @:0 B@:0".to_string()],
    );
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    let result = controller.send_command("M105", true).await;
    assert!(result.success);
    assert!(result.response.starts_with("ok T:25.0"));

    let temps = controller.status().temperature;
    assert_eq!(temps.hotend, 25.0);
    assert_eq!(temps.hotend_target, 200.0);
    assert_eq!(temps.bed, 22.5);
    assert_eq!(temps.bed_target, 60.0);
}

#[tokio::test]
async fn test_response_accumulates_until_ok() {
    let (transport, device) = MockTransport::new();
    device.lock().replies.insert(
        "M503".to_string(),
        vec![
            "echo:; Steps per unit:".to_string(),
            "echo: M92 X80.00 Y80.00 Z400.00 E93.00".to_string(),
            "ok".to_string(),
        ],
    );
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    let response = controller
        .send("M503", true, Duration::from_millis(200))
        .await
        .unwrap();
    assert_eq!(response.lines().count(), 3);
    assert!(response.ends_with("ok\n"));
}

#[tokio::test]
async fn test_error_reply_is_protocol_error() {
    let (transport, device) = MockTransport::new();
    device.lock().replies.insert(
        "M999".to_string(),
        vec!["Error:Printer halted. kill() called!".to_string()],
    );
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    let err = controller
        .send("M999", true, Duration::from_millis(200))
        .await
        .unwrap_err();
    assert!(err.is_protocol_error());

    let result = controller.send_command("M999", true).await;
    assert!(!result.success);
    assert!(result.response.contains("Printer halted"));
}

#[tokio::test]
async fn test_silence_times_out() {
    let (transport, device) = MockTransport::new();
    device.lock().silent.insert("G4 S60".to_string());
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    let err = controller
        .send("G4 S60", true, Duration::from_millis(50))
        .await
        .unwrap_err();
    assert_eq!(err, PrinterError::Timeout { timeout_ms: 50 });
}

#[tokio::test]
async fn test_blank_and_fire_and_forget() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    assert_eq!(
        controller.send("   ", true, Duration::from_millis(50)).await,
        Ok(String::new())
    );
    assert_eq!(
        controller.send("  M84  ", false, Duration::from_millis(50)).await,
        Ok(String::new())
    );
    assert_eq!(device.lock().commands(), vec!["M84"]);
}

#[tokio::test]
async fn test_fire_and_forget_ack_is_not_reused() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();
    device.lock().silent.insert("M400".to_string());

    let result = controller.send_command("G91", false).await;
    assert!(result.success);
    assert_eq!(
        controller.send("M400", true, Duration::from_millis(50)).await,
        Err(PrinterError::Timeout { timeout_ms: 50 })
    );
    assert_eq!(device.lock().commands(), vec!["G91", "M400"]);

    // The late reply to G91 was consumed, so the next ok belongs to G90.
    assert_eq!(
        controller.send("G90", true, Duration::from_millis(50)).await,
        Ok("ok\n".to_string())
    );
}

#[tokio::test]
async fn test_unanswered_fire_and_forget_does_not_block_next_command() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();
    device.lock().silent.insert("M18".to_string());

    assert!(controller.send_command("M18", false).await.success);
    assert_eq!(
        controller.send("G28", true, Duration::from_millis(50)).await,
        Ok("ok\n".to_string())
    );
    assert_eq!(device.lock().commands(), vec!["M18", "G28"]);
}

#[tokio::test]
async fn test_set_temperatures_and_home() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    assert!(controller.set_temperatures(Some(60.0), Some(210.0)).await.success);
    assert!(controller.home().await.success);
    assert_eq!(
        device.lock().commands(),
        vec!["M140 S60", "M104 S210", "G28"]
    );
}

#[tokio::test]
async fn test_io_fault_reconnects_once_and_retries() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    device.lock().fail_writes = Some("G1".to_string());
    let err = controller
        .send("G1 X10", true, Duration::from_millis(100))
        .await
        .unwrap_err();
    assert!(matches!(err, PrinterError::Io { .. }));

    let device = device.lock();
    assert_eq!(device.count("G1 X10"), 2);
    assert_eq!(device.opened.len(), 2);
}

#[tokio::test]
async fn test_disconnect_is_idempotent() {
    let (transport, device) = MockTransport::new();
    let controller = MarlinController::new(Box::new(transport), fast_config());
    controller.connect(None).await.unwrap();

    controller.disconnect().await;
    controller.disconnect().await;

    let status = controller.status();
    assert!(!status.connected);
    assert_eq!(status.port, None);
    assert!(!device.lock().open);
}

#[tokio::test]
async fn test_monitor_polls_and_stops_on_disconnect() {
    let (transport, device) = MockTransport::new();
    device.lock().replies.insert(
        "M105".to_string(),
        vec!["ok T:199.0 /200.0 B:59.0 /60.0".to_string()],
    );
    let config = fdmhost_communication::ControllerConfig {
        monitor_interval: Duration::from_millis(10),
        ..fast_config()
    };
    let controller = MarlinController::new(Box::new(transport), config);
    controller.connect(None).await.unwrap();

    assert!(eventually(|| controller.status().temperature.hotend == 199.0).await);

    controller.disconnect().await;
    let polls = device.lock().count("M105");
    tokio::time::sleep(Duration::from_millis(60)).await;
    assert_eq!(device.lock().count("M105"), polls);
}

#[tokio::test]
async fn test_reconnect_leaves_a_single_poller() {
    let (transport, device) = MockTransport::new();
    let config = fdmhost_communication::ControllerConfig {
        monitor_interval: Duration::from_millis(30),
        ..fast_config()
    };
    let controller = MarlinController::new(Box::new(transport), config);
    controller.connect(None).await.unwrap();
    controller.reconnect().await.unwrap();
    controller.reconnect().await.unwrap();

    let before = device.lock().count("M105");
    tokio::time::sleep(Duration::from_millis(300)).await;
    let polls = device.lock().count("M105") - before;

    // One generation ticks at most 11 times in 300ms; three would be ~30.
    assert!(polls <= 12, "{} polls", polls);
    assert_eq!(device.lock().opened.len(), 3);
}
