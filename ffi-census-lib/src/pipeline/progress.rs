/// A trait for reporting progress of long-running operations.
pub trait Progress: Send + Sync {
    /// Set the phase label for the current operation (e.g., "Collecting", "Listing").
    fn set_phase(&self, phase: &str);

    /// Set how many units of work the current phase has.
    fn set_total(&self, total: u64);

    /// Mark one unit of work as finished, with a short message describing it.
    fn advance(&self, message: &str);

    /// Finish and clear the progress indicator.
    fn done(&self);
}

/// Progress sink that reports nothing.
#[derive(Debug, Clone, Copy, Default)]
pub struct SilentProgress;

impl Progress for SilentProgress {
    fn set_phase(&self, _phase: &str) {}

    fn set_total(&self, _total: u64) {}

    fn advance(&self, _message: &str) {}

    fn done(&self) {}
}
