// Conversion engine - independent of the front end

pub mod batch;
pub mod core;
pub mod error;
pub mod hardware;
pub mod plan;
pub mod probe;
pub mod scan;
pub mod tier;
pub mod worker;

pub use batch::{BatchController, BatchOptions, BatchReport, BatchSummary, FileOutcome, blended_progress};
pub use self::core::*;
pub use error::{ConversionError, ProbeError, SessionError};
pub use hardware::{EncoderKind, EncoderSet};
pub use plan::{EncodePlan, PlanSet, plan, plan_with_notes};
pub use probe::{MediaDescriptor, probe, probe_with_stop};
pub use tier::{Classification, ResolutionTier, classify, destination_path};
pub use worker::ConversionSession;
