use crate::common::{FakeTools, fallback_notices, log_texts};
use reheight::engine::hardware::{EncoderKind, EncoderSet};
use reheight::engine::{
    ConversionEngine, ConversionEvent, ConversionJob, ConversionOutcome, StopSignal,
    destination_path, plan,
};
use std::fs;
use std::path::PathBuf;
use std::sync::mpsc;

fn job_for(source: PathBuf, overwrite: bool, width: u32, height: u32, gpu: bool) -> ConversionJob {
    let destination = destination_path(&source, overwrite, "_resized");
    ConversionJob::new(source, destination, width, height, gpu)
}

fn nvenc_only() -> EncoderSet {
    [EncoderKind::NvidiaNvenc].into_iter().collect()
}

#[test]
fn hardware_failure_falls_back_to_software_once() {
    let tools = FakeTools::new(&["h264_nvenc"]);
    let source = tools.video("clip_hwfail.mp4", 3840, 1920, 4.0);
    let job = job_for(source.clone(), false, 3840, 2160, true);
    let plans = plan(3840, 2160, true, &nvenc_only());
    assert_eq!(plans.len(), 2);

    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, rx) = mpsc::channel();

    let outcome = engine.convert(&job, &plans, &tx);
    let events: Vec<_> = rx.try_iter().collect();

    assert_eq!(outcome, ConversionOutcome::Success);
    assert_eq!(fallback_notices(&events), 1);
    assert!(log_texts(&events).contains(&"Falling back to Software (libx264)".to_string()));

    let invocations = tools.invocations();
    assert_eq!(invocations.len(), 2);
    assert!(invocations[0].starts_with("h264_nvenc "));
    assert!(invocations[1].starts_with("libx264 "));

    let output = source.with_file_name("clip_hwfail_resized.mp4");
    assert_eq!(fs::read_to_string(output).unwrap().trim(), "encoded");
}

#[test]
fn exhausted_plans_fail_with_last_diagnostic() {
    let tools = FakeTools::new(&["h264_nvenc"]);
    let source = tools.video("clip_encfail.mp4", 3840, 1920, 4.0);
    let job = job_for(source, false, 3840, 2160, true);
    let plans = plan(3840, 2160, true, &nvenc_only());

    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, rx) = mpsc::channel();

    let outcome = engine.convert(&job, &plans, &tx);
    let events: Vec<_> = rx.try_iter().collect();

    match outcome {
        ConversionOutcome::Failed(reason) => {
            assert!(reason.contains("libx264"), "reason: {}", reason);
            assert!(reason.contains("Conversion failed!"), "reason: {}", reason);
        }
        other => panic!("expected failure, got {:?}", other),
    }
    // One notice between the two plans, none after the last
    assert_eq!(fallback_notices(&events), 1);
    assert!(log_texts(&events).iter().any(|t| t == "ffmpeg: Conversion failed!"));
}

#[test]
fn launch_failure_counts_as_plan_failure() {
    let tools = FakeTools::new(&[]);
    let source = tools.video("clip.mp4", 3840, 1920, 4.0);
    let job = job_for(source, false, 3840, 2160, true);
    let plans = plan(3840, 2160, true, &nvenc_only());

    let mut config = tools.engine_config();
    config.tools.ffmpeg = PathBuf::from("/nonexistent/ffmpeg");
    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&config, &stop);
    let (tx, rx) = mpsc::channel();

    let outcome = engine.convert(&job, &plans, &tx);
    let events: Vec<_> = rx.try_iter().collect();

    match outcome {
        ConversionOutcome::Failed(reason) => {
            assert!(reason.starts_with("failed to launch ffmpeg (libx264)"), "reason: {}", reason)
        }
        other => panic!("expected failure, got {:?}", other),
    }
    assert_eq!(fallback_notices(&events), 1);
}

#[test]
fn progress_events_follow_stats_lines() {
    let tools = FakeTools::new(&[]);
    let source = tools.video("clip.mp4", 7680, 3840, 4.0);
    let job = job_for(source, false, 7680, 4320, false).at_position(1, 3);
    let plans = plan(7680, 4320, false, &EncoderSet::new());

    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, rx) = mpsc::channel();

    assert_eq!(engine.convert(&job, &plans, &tx), ConversionOutcome::Success);

    let progress: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            ConversionEvent::FileProgress(p) => Some(p),
            _ => None,
        })
        .collect();
    let percents: Vec<f64> = progress.iter().map(|p| p.percent_complete).collect();
    assert_eq!(percents, vec![25.0, 50.0, 75.0]);

    let last = progress.last().unwrap();
    assert_eq!(last.job_index, 1);
    assert_eq!(last.total_jobs, 3);
    assert_eq!(last.total_duration_seconds, Some(4.0));
    assert_eq!(last.elapsed_seconds, 3.0);
    assert_eq!(last.detail, "00:00:03.000");

    assert_eq!(tools.invocations().len(), 1);
    assert!(tools.invocations()[0].starts_with("libx264 "));
}

#[test]
fn in_place_overwrite_replaces_source_on_success() {
    let tools = FakeTools::new(&[]);
    let source = tools.video("clip.mp4", 3840, 1920, 4.0);
    let job = job_for(source.clone(), true, 3840, 2160, false);
    assert_eq!(job.destination_path, source);
    let temp = job.encode_target();

    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, _rx) = mpsc::channel();

    let outcome = engine.convert(&job, &plan(3840, 2160, false, &EncoderSet::new()), &tx);

    assert_eq!(outcome, ConversionOutcome::Success);
    assert_eq!(fs::read_to_string(&source).unwrap().trim(), "encoded");
    assert!(!temp.exists());
    // ffmpeg never wrote to the file it was reading
    assert!(tools.invocations()[0].ends_with("clip.mp4"));
    assert!(!source.with_file_name("clip_resized.mp4").exists());
}

#[test]
fn in_place_failure_leaves_source_untouched() {
    let tools = FakeTools::new(&[]);
    let source = tools.video("clip_encfail.mp4", 3840, 1920, 4.0);
    let original = fs::read_to_string(&source).unwrap();
    let job = job_for(source.clone(), true, 3840, 2160, false);

    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&tools.engine_config(), &stop);
    let (tx, _rx) = mpsc::channel();

    let outcome = engine.convert(&job, &plan(3840, 2160, false, &EncoderSet::new()), &tx);

    assert!(matches!(outcome, ConversionOutcome::Failed(_)));
    assert_eq!(fs::read_to_string(&source).unwrap(), original);
}

#[test]
fn debug_log_records_commands_and_outcome() {
    let tools = FakeTools::new(&[]);
    let source = tools.video("clip.mp4", 3840, 1920, 4.0);
    let job = job_for(source, false, 3840, 2160, false);

    let log_path = tools.dir.path().join("logs").join("reheight.log");
    let mut config = tools.engine_config();
    config.debug_log = Some(log_path.clone());
    let stop = StopSignal::new();
    let engine = ConversionEngine::new(&config, &stop);
    let (tx, _rx) = mpsc::channel();

    engine.convert(&job, &plan(3840, 2160, false, &EncoderSet::new()), &tx);

    let log = fs::read_to_string(log_path).unwrap();
    assert!(log.contains("scale=3840:2160:flags=lanczos"));
    assert!(log.contains("clip.mp4: success"));
}
