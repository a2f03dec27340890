use crate::cli::{Cli, Commands};
use reheight::config::Config;
use reheight::engine::{
    self, BatchOptions, BatchSummary, Classification, ConversionEvent, ConversionSession,
    EngineConfig, EncoderSet, StopSignal,
};
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::thread;

const EXIT_FAILED: i32 = 1;
const EXIT_STOPPED: i32 = 130;

pub fn run(cli: Cli) {
    let config = Config::load().unwrap_or_else(|e| {
        eprintln!("Warning: {:#}", e);
        eprintln!("Using built-in defaults.");
        Config::default()
    });

    let mut engine_config = config.engine_config();
    if let Some(suffix) = &cli.suffix {
        engine_config.suffix = suffix.clone();
    }
    let gpu_enabled = config.defaults.gpu_enabled && !cli.no_gpu;
    let overwrite = config.defaults.overwrite || cli.overwrite;

    if let Some(command) = cli.command {
        match command {
            Commands::CheckFfmpeg => handle_check_ffmpeg(&engine_config),
            Commands::Encoders => handle_encoders(&engine_config),
            Commands::Probe { file } => handle_probe(&engine_config, &file, overwrite),
            Commands::Plan { file } => handle_plan(&engine_config, &file, gpu_enabled, overwrite),
            Commands::InitConfig => handle_init_config(),
        }
        return;
    }

    if cli.paths.is_empty() {
        eprintln!("No input given. Pass video files or directories, or see --help.");
        process::exit(2);
    }

    let options = BatchOptions {
        gpu_enabled,
        overwrite,
    };
    let code = handle_convert(engine_config, &config, cli.paths, options);
    process::exit(code);
}

fn handle_convert(
    engine_config: EngineConfig,
    config: &Config,
    paths: Vec<PathBuf>,
    options: BatchOptions,
) -> i32 {
    let files = match engine::scan::collect_inputs(&paths) {
        Ok(files) => files,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            return EXIT_FAILED;
        }
    };
    if files.is_empty() {
        println!("No video files found.");
        return 0;
    }

    let mut session = ConversionSession::new(engine_config, config.defaults.kill_grace());
    install_ctrlc_handler(session.stop_signal());

    if let Err(e) = session.select_files(files) {
        eprintln!("Error: {}", e);
        return EXIT_FAILED;
    }
    if let Err(e) = session.start_conversion(options) {
        eprintln!("Error: {}", e);
        return EXIT_FAILED;
    }

    let mut printer = EventPrinter::default();
    let poll_interval = config.defaults.poll_interval();
    loop {
        let worker_done = !session.is_running();
        for event in session.poll_events() {
            printer.handle(&event);
        }
        if printer.summary.is_some() || worker_done {
            break;
        }
        thread::sleep(poll_interval);
    }
    printer.finish_progress_line();

    let summary = session
        .wait()
        .map(|report| report.summary)
        .or(printer.summary)
        .unwrap_or_default();
    exit_code(&summary)
}

fn exit_code(summary: &BatchSummary) -> i32 {
    if summary.was_stopped() {
        EXIT_STOPPED
    } else if summary.failed > 0 {
        EXIT_FAILED
    } else {
        0
    }
}

/// First Ctrl-C stops the batch; a second one exits immediately
fn install_ctrlc_handler(stop: StopSignal) {
    let pressed = Arc::new(AtomicBool::new(false));
    let result = ctrlc::set_handler(move || {
        if pressed.swap(true, Ordering::SeqCst) {
            eprintln!("\nForced exit");
            process::exit(EXIT_STOPPED);
        }
        eprintln!("\nStopping, press Ctrl-C again to exit immediately");
        stop.request_stop();
    });
    if let Err(e) = result {
        tracing::warn!("could not install Ctrl-C handler: {}", e);
    }
}

/// Console rendering of worker events
#[derive(Default)]
struct EventPrinter {
    progress_visible: bool,
    summary: Option<BatchSummary>,
}

impl EventPrinter {
    fn handle(&mut self, event: &ConversionEvent) {
        match event {
            ConversionEvent::LogLine(line) => {
                self.finish_progress_line();
                println!("{}", line);
            }
            ConversionEvent::StatusChanged(status) => {
                tracing::info!(status = %status, "status");
            }
            ConversionEvent::CurrentFileInfo { index, total } => {
                self.finish_progress_line();
                println!("--- File {} of {} ---", index + 1, total);
            }
            ConversionEvent::FileProgress(progress) => {
                let overall = engine::blended_progress(
                    progress.job_index,
                    progress.total_jobs,
                    progress.percent_complete,
                );
                print!(
                    "\r  {:>5.1}%  {:<24} overall {:>5.1}%",
                    progress.percent_complete, progress.detail, overall
                );
                let _ = io::stdout().flush();
                self.progress_visible = true;
            }
            ConversionEvent::OverallProgress(_) => {}
            ConversionEvent::BatchFinished(summary) => {
                self.finish_progress_line();
                self.summary = Some(summary.clone());
            }
        }
    }

    fn finish_progress_line(&mut self) {
        if self.progress_visible {
            println!();
            self.progress_visible = false;
        }
    }
}

fn handle_check_ffmpeg(engine_config: &EngineConfig) {
    match engine::ffmpeg_version(&engine_config.tools.ffmpeg) {
        Ok(version) => {
            println!("ffmpeg found: {}", version);
            match engine::ffprobe_version(&engine_config.tools.ffprobe) {
                Ok(probe_version) => {
                    println!("ffprobe found: {}", probe_version);
                    process::exit(0);
                }
                Err(e) => {
                    eprintln!("Error: {:#}", e);
                    process::exit(1);
                }
            }
        }
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    }
}

fn handle_encoders(engine_config: &EngineConfig) {
    let found = engine::hardware::detect(&engine_config.tools.ffmpeg);
    print_encoders(&found);
}

fn print_encoders(found: &EncoderSet) {
    if found.is_empty() {
        println!("GPU: none detected, software (libx264) encoding only");
        return;
    }
    println!("GPU: {}", found.describe());
    for encoder in found.iter() {
        match encoder.max_resolution() {
            Some((w, h)) => println!("  {:<16} {:<12} up to {}x{}", encoder.display_name(), encoder.ffmpeg_name(), w, h),
            None => println!("  {:<16} {}", encoder.display_name(), encoder.ffmpeg_name()),
        }
    }
}

fn handle_probe(engine_config: &EngineConfig, file: &Path, overwrite: bool) {
    let info = match engine::probe(&engine_config.tools.ffprobe, file, engine_config.probe_timeout) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    println!("Resolution: {}x{}", info.width, info.height);
    println!(
        "Duration: {} ({:.2} seconds)",
        engine::format_duration(info.duration_seconds),
        info.duration_seconds
    );
    println!("Codec: {}", info.codec_name);
    println!("Frame rate: {:.3}", info.frame_rate);
    println!("Bitrate: {} kb/s", info.bitrate / 1000);

    match engine::classify(info.width, info.height) {
        Classification::Unsupported => println!("Classification: unsupported width"),
        Classification::AlreadyCorrect(tier) => {
            println!("Classification: {} already at target height", tier)
        }
        Classification::NeedsResize(tier) => {
            println!("Classification: {} needs resizing", tier);
            println!(
                "Output: {}",
                engine::destination_path(file, overwrite, &engine_config.suffix).display()
            );
        }
    }
}

fn handle_plan(engine_config: &EngineConfig, file: &Path, gpu_enabled: bool, overwrite: bool) {
    let info = match engine::probe(&engine_config.tools.ffprobe, file, engine_config.probe_timeout) {
        Ok(info) => info,
        Err(e) => {
            eprintln!("Error: {}", e);
            process::exit(1);
        }
    };

    let tier = match engine::classify(info.width, info.height) {
        Classification::NeedsResize(tier) => tier,
        Classification::AlreadyCorrect(tier) => {
            println!("{} is already {}; nothing to do", file.display(), tier);
            return;
        }
        Classification::Unsupported => {
            println!(
                "{} is {}x{}; only 3840, 5120 and 7680 wide videos are handled",
                file.display(),
                info.width,
                info.height
            );
            return;
        }
    };

    let available = if gpu_enabled {
        engine::hardware::detect(&engine_config.tools.ffmpeg)
    } else {
        EncoderSet::new()
    };
    let planned = engine::plan_with_notes(info.width, tier.target_height(), gpu_enabled, &available);
    for note in &planned.rejected {
        println!("# {}", note);
    }

    let destination = engine::destination_path(file, overwrite, &engine_config.suffix);
    let job = engine::ConversionJob::new(
        file.to_path_buf(),
        destination,
        info.width,
        tier.target_height(),
        gpu_enabled,
    );
    for (attempt, plan) in planned.plans.iter().enumerate() {
        let cmd = engine::build_encode_cmd(
            &engine_config.tools.ffmpeg,
            &job.source_path,
            &job.encode_target(),
            job.source_width,
            job.target_height,
            plan,
        );
        println!("# {}. {}", attempt + 1, plan.encoder.display_name());
        println!("{}", engine::format_ffmpeg_cmd(&cmd));
    }
}

fn handle_init_config() {
    let path = match Config::config_path() {
        Ok(path) => path,
        Err(e) => {
            eprintln!("Error: {:#}", e);
            process::exit(1);
        }
    };

    match init_config_at(&path) {
        Ok(InitConfig::Existing(cfg)) => {
            println!("Config file: {}", path.display());
            println!("{:#?}", cfg);
        }
        Ok(InitConfig::Created) => println!("Default config written to {}", path.display()),
        Err(e) => {
            eprintln!("Error: {:#}", e);
            eprintln!("Fix or remove {} and run init-config again.", path.display());
            process::exit(1);
        }
    }
}

enum InitConfig {
    Existing(Config),
    Created,
}

/// Show an existing config or write the defaults; a broken file is reported, never replaced
fn init_config_at(path: &Path) -> anyhow::Result<InitConfig> {
    if path.exists() {
        return Config::load_from(path).map(InitConfig::Existing);
    }
    Config::default().save_to(path)?;
    Ok(InitConfig::Created)
}
