//! Failure classification for builds and deployments.
//!
//! These are exact, case-sensitive comparisons against the string fields the
//! orchestrator reports. Timestamps and messages are ignored.

use ocp_metrics_types::{Build, Condition};

const BUILD_PHASE_FAILED: &str = "Failed";

const CONDITION_TYPE_PROGRESSING: &str = "Progressing";
const CONDITION_STATUS_FALSE: &str = "False";
const CONDITION_REASON_DEADLINE: &str = "ProgressDeadlineExceeded";

/// A missing build (never built, or the referenced build is gone) is not a failure.
pub fn build_failed(build: Option<&Build>) -> bool {
    build.is_some_and(|b| b.phase == BUILD_PHASE_FAILED)
}

/// True if any condition reports an exceeded progress deadline.
pub fn deployment_failed(conditions: &[Condition]) -> bool {
    conditions.iter().any(condition_failed)
}

// e.g. reason=ProgressDeadlineExceeded, status=False, type=Progressing,
// message=replication controller "ruby-ex-3" has failed progressing
pub fn condition_failed(condition: &Condition) -> bool {
    condition.reason.as_deref() == Some(CONDITION_REASON_DEADLINE)
        && condition.status == CONDITION_STATUS_FALSE
        && condition.condition_type == CONDITION_TYPE_PROGRESSING
}
