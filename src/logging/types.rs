//! Journal step records and the [`Log`] trait.

/// One external step as seen by the logger.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepRecord {
    /// Step description, e.g. `create dataset tank/homes/alice`.
    pub step: String,
    /// What happened to it.
    pub status: StepStatus,
    /// Error text for failures, reason for skips.
    pub detail: Option<String>,
}

/// What happened to a journal step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StepStatus {
    /// The host was changed.
    Applied,
    /// Dry run; the step would have been applied.
    Planned,
    /// Nothing to do, the object was already gone.
    Skipped,
    /// The adapter call failed.
    Failed,
}

impl StepStatus {
    /// Summary marker and ANSI colour.
    pub(super) const fn marker(self) -> (&'static str, &'static str) {
        match self {
            Self::Applied => ("+", "\x1b[32m"),
            Self::Planned => ("~", "\x1b[36m"),
            Self::Skipped => ("-", "\x1b[2m"),
            Self::Failed => ("!", "\x1b[31m"),
        }
    }
}

/// Logging backend used by entity operations.
///
/// The binary implements it with [`Logger`](super::Logger); tests capture
/// lines in memory.
pub trait Log: Send + Sync {
    /// Heading for a phase of an operation.
    fn stage(&self, msg: &str);
    /// Progress message.
    fn info(&self, msg: &str);
    /// Detail shown with `--verbose` and always written to the log file.
    fn debug(&self, msg: &str);
    /// Drift notice or best-effort failure.
    fn warn(&self, msg: &str);
    /// Failure that aborts the operation.
    fn error(&self, msg: &str);
    /// Action skipped because of `--dry-run`.
    fn dry_run(&self, msg: &str);
    /// Remember a journal step for the end-of-run summary.
    fn record_step(&self, step: &str, status: StepStatus, detail: Option<&str>);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn markers_are_distinct() {
        let all = [
            StepStatus::Applied,
            StepStatus::Planned,
            StepStatus::Skipped,
            StepStatus::Failed,
        ];
        for (i, a) in all.iter().enumerate() {
            for b in all.iter().skip(i + 1) {
                assert_ne!(a.marker().0, b.marker().0);
            }
        }
    }
}
