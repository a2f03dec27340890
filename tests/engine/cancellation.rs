use crate::common::{FakeTools, drain, fallback_notices, outcomes, process_alive};
use reheight::engine::hardware::{EncoderKind, EncoderSet};
use reheight::engine::{
    BatchOptions, ConversionEngine, ConversionEvent, ConversionJob, ConversionOutcome,
    ConversionSession, StopSignal, plan,
};
use std::sync::mpsc;
use std::thread;
use std::time::{Duration, Instant};

#[test]
fn stop_terminates_and_reaps_running_encoder() {
    let tools = FakeTools::new(&["h264_nvenc"]);
    let source = tools.video("clip_slow.mp4", 3840, 1920, 60.0);
    let job = ConversionJob::new(
        source.clone(),
        source.with_file_name("clip_slow_resized.mp4"),
        3840,
        2160,
        true,
    );
    let available: EncoderSet = [EncoderKind::NvidiaNvenc].into_iter().collect();
    let plans = plan(3840, 2160, true, &available);

    let stop = StopSignal::with_grace(Duration::from_millis(500));
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, rx) = mpsc::channel();

    let worker = thread::spawn(move || engine.convert(&job, &plans, &tx));

    let pid = tools.wait_for_encoder_pid();
    assert!(process_alive(pid));

    let started = Instant::now();
    stop.request_stop();
    let outcome = worker.join().unwrap();

    assert_eq!(outcome, ConversionOutcome::Cancelled);
    assert!(started.elapsed() < Duration::from_secs(5));
    assert!(!process_alive(pid), "encoder {} still running", pid);
    assert!(!stop.has_active_process());

    // The software plan was never tried
    assert_eq!(tools.invocations().len(), 1);
    assert_eq!(fallback_notices(&drain(&rx)), 0);
}

#[test]
fn session_stop_ends_batch_without_starting_next_file() {
    let tools = FakeTools::new(&[]);
    let files = vec![
        tools.video("first_slow.mp4", 3840, 1920, 60.0),
        tools.video("second.mp4", 3840, 1920, 4.0),
    ];

    let mut session = ConversionSession::new(tools.engine_config(), Duration::from_millis(500));
    session.select_files(files.clone()).unwrap();
    session
        .start_conversion(BatchOptions {
            gpu_enabled: false,
            overwrite: false,
        })
        .unwrap();
    assert!(session.is_running());

    let pid = tools.wait_for_encoder_pid();
    session.stop_conversion();
    let report = session.wait().expect("worker report");

    assert_eq!(outcomes(&report), vec![ConversionOutcome::Cancelled]);
    assert_eq!(report.summary.cancelled, 1);
    assert_eq!(report.summary.failed, 0);
    assert!(report.summary.was_stopped());
    assert!(!process_alive(pid));

    assert_eq!(tools.invocations().len(), 1);
    assert!(!files[1].with_file_name("second_resized.mp4").exists());

    let events = session.poll_events();
    assert!(events.contains(&ConversionEvent::StatusChanged("Conversion stopped".to_string())));
    assert!(matches!(
        events.last(),
        Some(ConversionEvent::BatchFinished(summary)) if summary.cancelled == 1
    ));
}

#[test]
fn second_start_while_running_is_rejected() {
    let tools = FakeTools::new(&[]);
    let files = vec![tools.video("busy_slow.mp4", 3840, 1920, 60.0)];

    let mut session = ConversionSession::new(tools.engine_config(), Duration::from_millis(500));
    session.select_files(files).unwrap();
    session.start_conversion(BatchOptions::default()).unwrap();
    tools.wait_for_encoder_pid();

    assert!(matches!(
        session.start_conversion(BatchOptions::default()),
        Err(reheight::engine::SessionError::AlreadyRunning)
    ));
    assert!(session.clear_files().is_err());

    session.stop_conversion();
    let report = session.wait().unwrap();
    assert_eq!(outcomes(&report), vec![ConversionOutcome::Cancelled]);
}

#[test]
fn stop_during_probe_kills_ffprobe_promptly() {
    let tools = FakeTools::new(&[]);
    let files = vec![
        tools.video("hang_slowprobe.mp4", 3840, 1920, 4.0),
        tools.video("next.mp4", 3840, 1920, 4.0),
    ];

    let mut config = tools.engine_config();
    config.probe_timeout = Duration::from_secs(60);
    let mut session = ConversionSession::new(config, Duration::from_millis(500));
    session.select_files(files).unwrap();
    session
        .start_conversion(BatchOptions {
            gpu_enabled: false,
            overwrite: false,
        })
        .unwrap();

    let pid = tools.wait_for_probe_pid();
    let started = Instant::now();
    session.stop_conversion();
    let report = session.wait().unwrap();

    assert!(started.elapsed() < Duration::from_secs(5));
    assert_eq!(outcomes(&report), vec![ConversionOutcome::Cancelled]);
    assert_eq!(report.summary.failed, 0);
    assert!(!process_alive(pid));
    assert!(tools.invocations().is_empty());
}
