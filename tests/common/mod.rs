#![allow(dead_code)] // Not every test binary uses every helper

//! Fake ffmpeg/ffprobe executables for driving the engine without real media
//!
//! The fake ffprobe prints the contents of the file it is asked about, so a test
//! "video" is just the JSON ffprobe would have produced. Inputs ending in `.fail`
//! make it exit non-zero, and inputs containing `slowprobe` make it write its pid
//! to `probe.pid` and hang.
//!
//! The fake ffmpeg answers `-encoders` with a configurable list and otherwise
//! behaves like an encode, keyed on the input name:
//! - `hwfail` in the name: hardware codecs (`h264_*`) exit 1
//! - `encfail` in the name: every codec exits 1
//! - `slow` in the name: writes its pid to `encoder.pid` and never finishes
//!
//! Every encode appends `<codec> <input>` to `invocations.log` next to the script.

use reheight::engine::{
    BatchReport, ConversionEvent, ConversionOutcome, EngineConfig, ToolPaths,
};
use std::fs;
use std::os::unix::fs::PermissionsExt;
use std::path::{Path, PathBuf};
use std::sync::mpsc::Receiver;
use std::time::{Duration, Instant};
use tempfile::TempDir;

pub struct FakeTools {
    pub dir: TempDir,
    pub ffmpeg: PathBuf,
    pub ffprobe: PathBuf,
}

const FAKE_FFPROBE: &str = r#"
for last; do :; done
case "$last" in
    *.fail) echo "simulated probe failure" >&2; exit 1 ;;
    *slowprobe*) echo $$ > "$(dirname "$0")/probe.pid"; exec sleep 30 ;;
esac
cat "$last"
"#;

const FAKE_FFMPEG_ENCODE: &str = r#"
here=$(dirname "$0")
input=""; codec=""; out=""; prev=""
for arg; do
    case "$prev" in
        -i) input="$arg" ;;
        -c:v) codec="$arg" ;;
    esac
    prev="$arg"
    out="$arg"
done
echo "$codec $input" >> "$here/invocations.log"
name=$(basename "$input")

case "$name" in
    *slow*)
        echo $$ > "$here/encoder.pid"
        while :; do
            echo "out_time_ms=1000000"
            sleep 0.05
        done
        ;;
esac

case "$codec:$name" in
    h264_*:*hwfail*)
        echo "Error initializing output stream 0:0 -- device not available" >&2
        exit 1
        ;;
esac
case "$name" in
    *encfail*)
        echo "Conversion failed!" >&2
        exit 1
        ;;
esac

for t in 1 2 3; do
    printf 'frame=%d fps=30.0 q=28.0 size=1024kB time=00:00:0%d.00 bitrate=838.9kbits/s speed=1.0x\r' $((t * 30)) $t >&2
done
echo >&2
echo "encoded" > "$out"
exit 0
"#;

pub fn write_script(path: &Path, body: &str) {
    fs::write(path, format!("#!/bin/sh\n{}", body)).unwrap();
    let mut perms = fs::metadata(path).unwrap().permissions();
    perms.set_mode(0o755);
    fs::set_permissions(path, perms).unwrap();
}

impl FakeTools {
    /// Fake tools whose ffmpeg reports the given hardware encoders (e.g. "h264_amf")
    pub fn new(hardware: &[&str]) -> Self {
        let dir = TempDir::new().unwrap();
        let ffmpeg = dir.path().join("ffmpeg");
        let ffprobe = dir.path().join("ffprobe");

        let mut listing = String::from(
            "Encoders:\n V....D libx264              libx264 H.264 / AVC / MPEG-4 AVC (codec h264)\n",
        );
        for name in hardware {
            listing.push_str(&format!(" V....D {:<20} hardware H.264 encoder (codec h264)\n", name));
        }

        let ffmpeg_body = format!(
            "case \"$*\" in\n    *-encoders*)\n        cat <<'LIST'\n{}LIST\n        exit 0\n        ;;\nesac\n{}",
            listing, FAKE_FFMPEG_ENCODE
        );
        write_script(&ffmpeg, &ffmpeg_body);
        write_script(&ffprobe, FAKE_FFPROBE);

        Self {
            dir,
            ffmpeg,
            ffprobe,
        }
    }

    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            tools: ToolPaths {
                ffmpeg: self.ffmpeg.clone(),
                ffprobe: self.ffprobe.clone(),
            },
            probe_timeout: Duration::from_secs(10),
            ..EngineConfig::default()
        }
    }

    /// Directory for test "videos", separate from the scripts
    pub fn media_dir(&self) -> PathBuf {
        let dir = self.dir.path().join("media");
        fs::create_dir_all(&dir).unwrap();
        dir
    }

    /// Write a fake video that probes as `width`x`height`
    pub fn video(&self, name: &str, width: u32, height: u32, duration: f64) -> PathBuf {
        let path = self.media_dir().join(name);
        fs::write(&path, probe_json(width, height, duration)).unwrap();
        path
    }

    /// `<codec> <input>` for every encode attempt so far
    pub fn invocations(&self) -> Vec<String> {
        fs::read_to_string(self.dir.path().join("invocations.log"))
            .map(|s| s.lines().map(str::to_string).collect())
            .unwrap_or_default()
    }

    pub fn pid_file(&self) -> PathBuf {
        self.dir.path().join("encoder.pid")
    }

    /// Block until the slow encoder has written its pid
    pub fn wait_for_encoder_pid(&self) -> i32 {
        self.wait_for_pid(&self.pid_file())
    }

    /// Block until the hanging ffprobe has written its pid
    pub fn wait_for_probe_pid(&self) -> i32 {
        self.wait_for_pid(&self.dir.path().join("probe.pid"))
    }

    fn wait_for_pid(&self, pid_file: &Path) -> i32 {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Ok(text) = fs::read_to_string(pid_file) {
                if let Ok(pid) = text.trim().parse() {
                    return pid;
                }
            }
            assert!(Instant::now() < deadline, "fake tool never started");
            std::thread::sleep(Duration::from_millis(20));
        }
    }
}

pub fn probe_json(width: u32, height: u32, duration: f64) -> String {
    format!(
        r#"{{
    "streams": [
        {{"index": 0, "codec_type": "video", "codec_name": "h264", "width": {}, "height": {}, "r_frame_rate": "30/1"}},
        {{"index": 1, "codec_type": "audio", "codec_name": "aac"}}
    ],
    "format": {{"duration": "{:.3}", "bit_rate": "40000000"}}
}}"#,
        width, height, duration
    )
}

/// True while a process with this pid exists (zombies included)
pub fn process_alive(pid: i32) -> bool {
    // SAFETY: signal 0 only checks for existence
    unsafe { libc::kill(pid, 0) == 0 }
}

pub fn log_texts(events: &[ConversionEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ConversionEvent::LogLine(line) => Some(line.text.clone()),
            _ => None,
        })
        .collect()
}

pub fn fallback_notices(events: &[ConversionEvent]) -> usize {
    log_texts(events)
        .iter()
        .filter(|t| t.starts_with("Falling back"))
        .count()
}

pub fn drain(rx: &Receiver<ConversionEvent>) -> Vec<ConversionEvent> {
    rx.try_iter().collect()
}

pub fn outcomes(report: &BatchReport) -> Vec<ConversionOutcome> {
    report.outcomes.iter().map(|f| f.outcome.clone()).collect()
}
