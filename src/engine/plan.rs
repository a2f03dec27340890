//! Ordered encoder candidates for one conversion

use serde::Serialize;

use super::error::ConversionError;
use super::hardware::{EncoderKind, EncoderSet};

/// Targets at least this wide get the faster, lighter presets
pub const HIGH_RES_MIN_WIDTH: u32 = 5120;

pub fn is_high_res(target_width: u32) -> bool {
    target_width >= HIGH_RES_MIN_WIDTH
}

/// One encoder plus the ffmpeg arguments it is run with
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct EncodePlan {
    pub encoder: EncoderKind,
    /// `-c:v` and the rate/quality/speed knobs
    pub args: Vec<String>,
    /// Extra threading flags for high-resolution targets
    pub threading: Vec<String>,
}

fn to_args(args: &[&str]) -> Vec<String> {
    args.iter().map(|s| s.to_string()).collect()
}

impl EncodePlan {
    fn new(encoder: EncoderKind, args: &[&str], high_res: bool) -> Self {
        let threading = if high_res {
            to_args(&["-threads", "0", "-thread_type", "frame"])
        } else {
            Vec::new()
        };
        Self {
            encoder,
            args: to_args(args),
            threading,
        }
    }

    /// libx264, the plan that always closes the list
    pub fn software(high_res: bool) -> Self {
        if high_res {
            Self::new(
                EncoderKind::SoftwareX264,
                &["-c:v", "libx264", "-preset", "ultrafast", "-crf", "28"],
                high_res,
            )
        } else {
            Self::new(
                EncoderKind::SoftwareX264,
                &["-c:v", "libx264", "-preset", "fast", "-crf", "26"],
                high_res,
            )
        }
    }

    /// Hardware plan for `encoder`; software encoders get the software plan
    pub fn hardware(encoder: EncoderKind, high_res: bool) -> Self {
        match encoder {
            // Same settings at every tier: chosen for stability, not quality
            EncoderKind::NvidiaNvenc => Self::new(
                encoder,
                &["-c:v", "h264_nvenc", "-preset", "fast", "-b:v", "5M"],
                high_res,
            ),
            EncoderKind::AmdAmf if high_res => Self::new(
                encoder,
                &[
                    "-c:v", "h264_amf", "-quality", "balanced", "-rc", "vbr", "-b:v", "12M",
                    "-maxrate", "18M", "-usage", "transcoding",
                ],
                high_res,
            ),
            EncoderKind::AmdAmf => Self::new(
                encoder,
                &["-c:v", "h264_amf", "-quality", "quality", "-rc", "vbr", "-b:v", "8M"],
                high_res,
            ),
            EncoderKind::IntelQsv if high_res => Self::new(
                encoder,
                &[
                    "-c:v", "h264_qsv", "-preset", "medium", "-profile:v", "main", "-b:v", "12M",
                    "-maxrate", "18M", "-bufsize", "24M",
                ],
                high_res,
            ),
            EncoderKind::IntelQsv => Self::new(
                encoder,
                &["-c:v", "h264_qsv", "-preset", "medium", "-b:v", "8M"],
                high_res,
            ),
            EncoderKind::SoftwareX264 => Self::software(high_res),
        }
    }
}

/// Plans plus the available hardware encoders that were passed over
#[derive(Debug)]
pub struct PlanSet {
    pub plans: Vec<EncodePlan>,
    /// `EncoderUnavailableForResolution` for each available encoder whose
    /// ceiling the target exceeds, in the order they were considered
    pub rejected: Vec<ConversionError>,
}

/// Ordered candidate plans; never empty, always ends with software
pub fn plan(
    target_width: u32,
    target_height: u32,
    gpu_requested: bool,
    available: &EncoderSet,
) -> Vec<EncodePlan> {
    plan_with_notes(target_width, target_height, gpu_requested, available).plans
}

/// Like [`plan`], also reporting why hardware encoders were skipped
///
/// At most one hardware plan is chosen: the first encoder in NVENC, AMF, QSV
/// order that is available and can handle the target size.
pub fn plan_with_notes(
    target_width: u32,
    target_height: u32,
    gpu_requested: bool,
    available: &EncoderSet,
) -> PlanSet {
    let high_res = is_high_res(target_width);
    let mut plans = Vec::with_capacity(2);
    let mut rejected = Vec::new();

    if gpu_requested {
        for encoder in EncoderKind::HARDWARE_PRIORITY {
            if !available.contains(encoder) {
                continue;
            }
            if encoder.supports(target_width, target_height) {
                plans.push(EncodePlan::hardware(encoder, high_res));
                break;
            }
            rejected.push(ConversionError::EncoderUnavailableForResolution {
                encoder,
                width: target_width,
                height: target_height,
            });
        }
    }

    plans.push(EncodePlan::software(high_res));
    PlanSet { plans, rejected }
}
