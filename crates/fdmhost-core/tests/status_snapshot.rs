use fdmhost_core::{GcodeJob, JobState, PrinterError, PrinterState, Temperatures};
use std::io::Write;

#[test]
fn test_snapshot_serializes_collaborator_fields() {
    let mut state = PrinterState::new();
    state.connected = true;
    state.port = Some("/dev/ttyUSB0".to_string());
    state.temperature = Temperatures {
        bed: 59.8,
        bed_target: 60.0,
        hotend: 205.0,
        hotend_target: 210.0,
    };
    state.reset_job(4);
    state.advance_line();

    let json = serde_json::to_value(state.snapshot()).unwrap();
    assert_eq!(json["connected"], true);
    assert_eq!(json["printing"], false);
    assert_eq!(json["paused"], false);
    assert_eq!(json["progress"], 25);
    assert_eq!(json["current_line"], 1);
    assert_eq!(json["total_lines"], 4);
    assert_eq!(json["temperature"]["bed_target"], 60.0);
    assert_eq!(json["temperature"]["hotend"], 205.0);
    assert_eq!(json["port"], "/dev/ttyUSB0");
    assert_eq!(json["error"], "");
    assert_eq!(json["job_state"], "idle");
}

#[test]
fn test_progress_matches_cursor_through_a_job() {
    let mut state = PrinterState::new();
    state.reset_job(7);
    let mut last_line = 0;
    for _ in 0..7 {
        state.advance_line();
        assert!(state.current_line >= last_line);
        last_line = state.current_line;
        assert_eq!(
            state.progress as usize,
            state.current_line * 100 / state.total_lines
        );
    }
    assert_eq!(state.progress, 100);
}

#[test]
fn test_job_from_file() {
    let mut file = tempfile::NamedTempFile::new().unwrap();
    writeln!(file, "G28 ; home").unwrap();
    writeln!(file, "M104 S200").unwrap();
    writeln!(file, ";end").unwrap();

    let job = GcodeJob::from_file(file.path()).unwrap();
    assert_eq!(job.len(), 3);
    assert_eq!(job.command_count(), 2);
    assert_eq!(job.source(), Some(file.path()));
}

#[test]
fn test_job_from_missing_file() {
    let err = GcodeJob::from_file("/nonexistent/print.gcode").unwrap_err();
    assert!(matches!(err, PrinterError::Job { .. }));
}

#[test]
fn test_job_state_terminal() {
    assert!(JobState::Completed.is_finished());
    assert!(JobState::Stopped.is_finished());
    assert!(JobState::Failed.is_finished());
    assert!(!JobState::Running.is_finished());
    assert!(!JobState::Paused.is_finished());
}
