use serde::{Deserialize, Serialize};
use std::fmt::{Display, Formatter, Result as FmtResult};
use std::str::FromStr;

/// Lifecycle of a single uploaded record.
///
/// Stored as a small integer code and exchanged on the wire by name:
///
/// | variant          | code | wire name          |
/// |------------------|------|--------------------|
/// | Uploaded         | 1    | `UPLOADED`         |
/// | Validated        | 2    | `VALIDATED`        |
/// | Rejected         | 3    | `REJECTED`         |
/// | RequestGenerated | 4    | `REQUEST_GENERATED`|
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RecordStatus {
    Uploaded,
    Validated,
    Rejected,
    RequestGenerated,
}

impl RecordStatus {
    pub const ALL: [RecordStatus; 4] = [
        RecordStatus::Uploaded,
        RecordStatus::Validated,
        RecordStatus::Rejected,
        RecordStatus::RequestGenerated,
    ];

    pub fn code(self) -> i16 {
        match self {
            RecordStatus::Uploaded => 1,
            RecordStatus::Validated => 2,
            RecordStatus::Rejected => 3,
            RecordStatus::RequestGenerated => 4,
        }
    }

    pub fn from_code(code: i16) -> Option<Self> {
        match code {
            1 => Some(RecordStatus::Uploaded),
            2 => Some(RecordStatus::Validated),
            3 => Some(RecordStatus::Rejected),
            4 => Some(RecordStatus::RequestGenerated),
            _ => None,
        }
    }

    /// Statuses a record may hold right before moving to `self`.
    pub fn predecessors(self) -> &'static [RecordStatus] {
        match self {
            RecordStatus::Uploaded => &[],
            RecordStatus::Validated | RecordStatus::Rejected => &[RecordStatus::Uploaded],
            RecordStatus::RequestGenerated => &[RecordStatus::Validated],
        }
    }

    /// Records only move forward: Uploaded -> {Validated | Rejected}, Validated -> RequestGenerated.
    pub fn can_transition_to(self, next: RecordStatus) -> bool {
        next.predecessors().contains(&self)
    }
}

impl Display for RecordStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            RecordStatus::Uploaded => write!(f, "UPLOADED"),
            RecordStatus::Validated => write!(f, "VALIDATED"),
            RecordStatus::Rejected => write!(f, "REJECTED"),
            RecordStatus::RequestGenerated => write!(f, "REQUEST_GENERATED"),
        }
    }
}

impl FromStr for RecordStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UPLOADED" => Ok(RecordStatus::Uploaded),
            "VALIDATED" => Ok(RecordStatus::Validated),
            "REJECTED" => Ok(RecordStatus::Rejected),
            "REQUEST_GENERATED" => Ok(RecordStatus::RequestGenerated),
            _ => Err(anyhow::anyhow!("Invalid record status: {}", s)),
        }
    }
}

/// Lifecycle of an uploaded file (batch).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FileStatus {
    Uploaded,
    Validated,
    ValidationFailed,
    RequestGenerated,
}

impl FileStatus {
    /// `Validated -> ValidationFailed` covers a payment procedure failing after validation passed.
    pub fn can_transition_to(self, next: FileStatus) -> bool {
        matches!(
            (self, next),
            (FileStatus::Uploaded, FileStatus::Validated)
                | (FileStatus::Uploaded, FileStatus::ValidationFailed)
                | (FileStatus::Validated, FileStatus::ValidationFailed)
                | (FileStatus::Validated, FileStatus::RequestGenerated)
        )
    }
}

impl Display for FileStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        match self {
            FileStatus::Uploaded => write!(f, "UPLOADED"),
            FileStatus::Validated => write!(f, "VALIDATED"),
            FileStatus::ValidationFailed => write!(f, "VALIDATION_FAILED"),
            FileStatus::RequestGenerated => write!(f, "REQUEST_GENERATED"),
        }
    }
}

impl FromStr for FileStatus {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_uppercase().as_str() {
            "UPLOADED" => Ok(FileStatus::Uploaded),
            "VALIDATED" => Ok(FileStatus::Validated),
            "VALIDATION_FAILED" => Ok(FileStatus::ValidationFailed),
            "REQUEST_GENERATED" => Ok(FileStatus::RequestGenerated),
            _ => Err(anyhow::anyhow!("Invalid file status: {}", s)),
        }
    }
}

/// Per-status record counts for one file.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusCounts {
    pub uploaded: i64,
    pub validated: i64,
    pub rejected: i64,
    pub request_generated: i64,
}

impl StatusCounts {
    pub fn total(&self) -> i64 {
        self.uploaded + self.validated + self.rejected + self.request_generated
    }

    pub fn get(&self, status: RecordStatus) -> i64 {
        match status {
            RecordStatus::Uploaded => self.uploaded,
            RecordStatus::Validated => self.validated,
            RecordStatus::Rejected => self.rejected,
            RecordStatus::RequestGenerated => self.request_generated,
        }
    }

    pub fn add(&mut self, status: RecordStatus, count: i64) {
        match status {
            RecordStatus::Uploaded => self.uploaded += count,
            RecordStatus::Validated => self.validated += count,
            RecordStatus::Rejected => self.rejected += count,
            RecordStatus::RequestGenerated => self.request_generated += count,
        }
    }

    pub fn from_pairs<I>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (RecordStatus, i64)>,
    {
        let mut counts = Self::default();
        for (status, count) in pairs {
            counts.add(status, count);
        }
        counts
    }
}

/// Read-side view of a file's progress, derived purely from record counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OverallStatus {
    Empty,
    RequestGenerated,
    PartiallyProcessed,
    Validated,
    MostlyRejected,
    PendingValidation,
    Mixed,
}

impl OverallStatus {
    /// Thresholds use integer halving, so 3 rejected out of 10 is not "mostly".
    pub fn derive(counts: &StatusCounts) -> Self {
        let total = counts.total();
        if total == 0 {
            return OverallStatus::Empty;
        }
        let generated = counts.request_generated;
        let validated = counts.validated;

        if generated == total {
            OverallStatus::RequestGenerated
        } else if validated + generated == total && generated > 0 {
            OverallStatus::PartiallyProcessed
        } else if validated + generated == total {
            OverallStatus::Validated
        } else if counts.rejected > total / 2 {
            OverallStatus::MostlyRejected
        } else if counts.uploaded > total / 2 {
            OverallStatus::PendingValidation
        } else {
            OverallStatus::Mixed
        }
    }
}

impl Display for OverallStatus {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            OverallStatus::Empty => "EMPTY",
            OverallStatus::RequestGenerated => "REQUEST_GENERATED",
            OverallStatus::PartiallyProcessed => "PARTIALLY_PROCESSED",
            OverallStatus::Validated => "VALIDATED",
            OverallStatus::MostlyRejected => "MOSTLY_REJECTED",
            OverallStatus::PendingValidation => "PENDING_VALIDATION",
            OverallStatus::Mixed => "MIXED",
        };
        write!(f, "{}", s)
    }
}

/// What the caller should do next with a file.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum NextAction {
    StartValidation,
    GenerateRequest,
    ViewRequests,
    FixAndReupload,
}

impl NextAction {
    pub fn from_counts(counts: &StatusCounts) -> Self {
        if counts.validated > 0 {
            NextAction::GenerateRequest
        } else if counts.uploaded > 0 || counts.total() == 0 {
            NextAction::StartValidation
        } else if counts.request_generated > 0 {
            NextAction::ViewRequests
        } else {
            NextAction::FixAndReupload
        }
    }
}

impl Display for NextAction {
    fn fmt(&self, f: &mut Formatter<'_>) -> FmtResult {
        let s = match self {
            NextAction::StartValidation => "START_VALIDATION",
            NextAction::GenerateRequest => "GENERATE_REQUEST",
            NextAction::ViewRequests => "VIEW_REQUESTS",
            NextAction::FixAndReupload => "FIX_AND_REUPLOAD",
        };
        write!(f, "{}", s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn counts(uploaded: i64, validated: i64, rejected: i64, generated: i64) -> StatusCounts {
        StatusCounts {
            uploaded,
            validated,
            rejected,
            request_generated: generated,
        }
    }

    #[test]
    fn test_record_status_codes_round_trip() {
        for status in RecordStatus::ALL {
            assert_eq!(RecordStatus::from_code(status.code()), Some(status));
            assert_eq!(status.to_string().parse::<RecordStatus>().unwrap(), status);
        }
        assert_eq!(RecordStatus::from_code(0), None);
        assert_eq!(RecordStatus::from_code(9), None);
    }

    #[test]
    fn test_record_status_forward_only() {
        assert!(RecordStatus::Uploaded.can_transition_to(RecordStatus::Validated));
        assert!(RecordStatus::Uploaded.can_transition_to(RecordStatus::Rejected));
        assert!(RecordStatus::Validated.can_transition_to(RecordStatus::RequestGenerated));
        assert!(!RecordStatus::Rejected.can_transition_to(RecordStatus::Validated));
        assert!(!RecordStatus::Rejected.can_transition_to(RecordStatus::RequestGenerated));
        assert!(!RecordStatus::Uploaded.can_transition_to(RecordStatus::RequestGenerated));
        assert!(!RecordStatus::RequestGenerated.can_transition_to(RecordStatus::Validated));
    }

    #[test]
    fn test_file_status_transitions() {
        assert!(FileStatus::Uploaded.can_transition_to(FileStatus::Validated));
        assert!(FileStatus::Uploaded.can_transition_to(FileStatus::ValidationFailed));
        assert!(FileStatus::Validated.can_transition_to(FileStatus::RequestGenerated));
        assert!(FileStatus::Validated.can_transition_to(FileStatus::ValidationFailed));
        assert!(!FileStatus::ValidationFailed.can_transition_to(FileStatus::Validated));
        assert!(!FileStatus::ValidationFailed.can_transition_to(FileStatus::RequestGenerated));
        assert!(!FileStatus::RequestGenerated.can_transition_to(FileStatus::Uploaded));
    }

    #[test]
    fn test_serde_wire_names() {
        let json = serde_json::to_string(&RecordStatus::RequestGenerated).unwrap();
        assert_eq!(json, "\"REQUEST_GENERATED\"");
        let json = serde_json::to_string(&FileStatus::ValidationFailed).unwrap();
        assert_eq!(json, "\"VALIDATION_FAILED\"");
    }

    #[test]
    fn test_overall_status_derivation() {
        assert_eq!(OverallStatus::derive(&counts(0, 0, 0, 0)), OverallStatus::Empty);
        assert_eq!(
            OverallStatus::derive(&counts(0, 0, 0, 5)),
            OverallStatus::RequestGenerated
        );
        assert_eq!(
            OverallStatus::derive(&counts(0, 2, 0, 3)),
            OverallStatus::PartiallyProcessed
        );
        assert_eq!(OverallStatus::derive(&counts(0, 5, 0, 0)), OverallStatus::Validated);
        assert_eq!(
            OverallStatus::derive(&counts(0, 4, 6, 0)),
            OverallStatus::MostlyRejected
        );
        assert_eq!(
            OverallStatus::derive(&counts(6, 4, 0, 0)),
            OverallStatus::PendingValidation
        );
    }

    #[test]
    fn test_seven_validated_three_rejected_is_mixed() {
        assert_eq!(OverallStatus::derive(&counts(0, 7, 3, 0)), OverallStatus::Mixed);
    }

    #[test]
    fn test_integer_halving_boundary() {
        // total 5: total/2 == 2, so 3 rejected counts as mostly rejected
        assert_eq!(
            OverallStatus::derive(&counts(0, 2, 3, 0)),
            OverallStatus::MostlyRejected
        );
        // total 4: 2 rejected is not more than 2
        assert_eq!(OverallStatus::derive(&counts(0, 2, 2, 0)), OverallStatus::Mixed);
    }

    #[test]
    fn test_next_action() {
        assert_eq!(
            NextAction::from_counts(&counts(3, 0, 0, 0)),
            NextAction::StartValidation
        );
        assert_eq!(
            NextAction::from_counts(&counts(0, 1, 4, 0)),
            NextAction::GenerateRequest
        );
        assert_eq!(
            NextAction::from_counts(&counts(0, 0, 1, 4)),
            NextAction::ViewRequests
        );
        assert_eq!(
            NextAction::from_counts(&counts(0, 0, 4, 0)),
            NextAction::FixAndReupload
        );
    }
}
