use core::fmt::{Display, Formatter};
use serde::Serialize;
use strum::Display as StrumDisplay;

/// Why a single repository dropped out of a run.
///
/// None of these abort the run; the controller logs them and moves on.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, StrumDisplay, Serialize)]
pub enum FailureKind {
    AcquisitionFailed,
    ExtractionFailed,
    ExtractionTimedOut,
    ExtractionMalformed,
}

/// A per-repository step failure, tagged with its kind.
#[derive(Debug)]
pub struct StepFailure {
    pub kind: FailureKind,
    pub error: ohno::AppError,
}

impl StepFailure {
    #[must_use]
    pub const fn new(kind: FailureKind, error: ohno::AppError) -> Self {
        Self { kind, error }
    }
}

impl Display for StepFailure {
    fn fmt(&self, f: &mut Formatter<'_>) -> core::fmt::Result {
        write!(f, "{}: {:#}", self.kind, self.error)
    }
}
