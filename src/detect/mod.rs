mod category;
mod dedup;
mod nms;
mod payload;
mod profile;
mod result;
mod source;
mod temporal;
mod validate;

pub use category::{categorize, Category};
pub use dedup::{DeduplicationFilter, RecentDetection};
pub use nms::{ConfirmedRecord, NmsTracker};
pub use payload::{parse_payload, RawDetection, RawPayload};
pub use profile::{DetectionProfile, ProfileKind};
pub use result::{Detection, DetectionDetails, DetectionKind};
pub use source::{DetectorSource, RawMessage, ReplaySource, ScriptedSource};
pub use temporal::{Consistency, TemporalCandidate, TemporalTracker};
pub use validate::{check_box, normalize_box, validate, BoxIssue, Rejection, DEFAULT_CONFIDENCE};

/// Case-insensitive type label comparison shared by the filter stages.
pub(crate) fn same_type(a: &str, b: &str) -> bool {
    a.trim().to_lowercase() == b.trim().to_lowercase()
}
