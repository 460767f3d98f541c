//! Class promotion workflow.
//!
//! A homeroom teacher's roster is resolved first, each active student is scored
//! (average final score and attendance), a reviewer decides per student, and
//! the committer records those decisions as `student_class_history` rows while
//! moving promoted students to the target class.
//!
//! Per-student lifecycle within one cycle:
//!
//! ```text
//! PENDING  (naik_kelas=false, diproses_naik=false)
//!   -> PROPOSED (naik_kelas=true,  diproses_naik=false)
//!   -> PROMOTED (class_id=target,  diproses_naik=true)
//!    | REJECTED (class_id unchanged, diproses_naik=true)
//! ```

mod committer;
mod history;
mod nomination;
mod proposer;
mod roster;

use serde::{Deserialize, Serialize};

pub use committer::{CommitOutcome, PromotionCommitter};
pub use history::{correct_history, list_history, HistoryCorrection};
pub use nomination::{propose_students, NominationOutcome};
pub use proposer::{
    compute_proposals, list_pending_proposals, AttendanceSummary, StudentProposal,
};
pub use roster::{resolve_homeroom_roster, resolve_tutor, HomeroomRoster};

/// Student status eligible for promotion review
pub const STATUS_ACTIVE: &str = "ACTIVE";

/// One reviewer decision (also used for nominations)
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PromotionDecision {
    pub student_id: i32,
    pub naik_kelas: bool,
}

/// Why a student in a batch was left untouched
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SkipReason {
    /// Student has no current class assignment
    NoClass,
    /// Decision for this cycle was already committed
    AlreadyProcessed,
    /// Student is not in the class being reviewed
    NotInClass,
    /// Student status is not ACTIVE
    NotActive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SkippedStudent {
    pub student_id: i32,
    pub reason: SkipReason,
}

/// Attendance status as stored in `attendances.status`
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttendanceStatus {
    Present,
    Sick,
    Excused,
    Absent,
}

impl AttendanceStatus {
    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "PRESENT" => Some(Self::Present),
            "SICK" => Some(Self::Sick),
            "EXCUSED" => Some(Self::Excused),
            "ABSENT" => Some(Self::Absent),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Present => "PRESENT",
            Self::Sick => "SICK",
            Self::Excused => "EXCUSED",
            Self::Absent => "ABSENT",
        }
    }
}

/// Reject batches naming the same student twice
fn ensure_unique_students(decisions: &[PromotionDecision]) -> crate::error::Result<()> {
    let mut seen = std::collections::HashSet::new();
    for decision in decisions {
        if !seen.insert(decision.student_id) {
            return Err(crate::error::ServerError::Validation(format!(
                "student {} appears more than once",
                decision.student_id
            )));
        }
    }
    Ok(())
}
