//! The binary's [`Log`] implementation.
use std::path::PathBuf;
use std::sync::Mutex;

use super::subscriber::{DRY_RUN_TARGET, STAGE_TARGET};
use super::types::{Log, StepRecord, StepStatus};
use super::utils::log_file_path;

/// Forwards messages to `tracing` and keeps the journal steps of the run
/// for [`print_summary`](Self::print_summary).
#[derive(Debug)]
pub struct Logger {
    steps: Mutex<Vec<StepRecord>>,
    log_file: Option<PathBuf>,
}

impl Logger {
    /// Logger for `command`.  The log file itself is opened by the
    /// subscriber; the path is kept for the summary footer.
    #[must_use]
    pub fn new(command: &str) -> Self {
        Self {
            steps: Mutex::new(Vec::new()),
            log_file: log_file_path(command),
        }
    }

    #[cfg(test)]
    pub(crate) const fn log_path(&self) -> Option<&PathBuf> {
        self.log_file.as_ref()
    }

    /// Steps recorded so far.
    #[must_use]
    pub fn steps(&self) -> Vec<StepRecord> {
        self.steps
            .lock()
            .map(|steps| steps.clone())
            .unwrap_or_default()
    }

    /// Number of steps that failed.
    #[must_use]
    pub fn failure_count(&self) -> usize {
        self.steps()
            .iter()
            .filter(|record| record.status == StepStatus::Failed)
            .count()
    }

    /// One line per recorded step, then the totals and the log file path.
    /// Silent when the run recorded no step.
    pub fn print_summary(&self) {
        let steps = self.steps();
        if steps.is_empty() {
            return;
        }
        self.stage("Steps");

        for record in &steps {
            let (icon, colour) = record.status.marker();
            let line = match &record.detail {
                Some(detail) => format!("{colour}{icon} {}: {detail}\x1b[0m", record.step),
                None => format!("{colour}{icon} {}\x1b[0m", record.step),
            };
            self.info(&line);
        }

        let count = |status| steps.iter().filter(|r| r.status == status).count();
        self.info(&format!(
            "{} steps: {} applied, {} planned, {} skipped, {} failed",
            steps.len(),
            count(StepStatus::Applied),
            count(StepStatus::Planned),
            count(StepStatus::Skipped),
            count(StepStatus::Failed),
        ));
        if let Some(path) = &self.log_file {
            self.debug(&format!("full log in {}", path.display()));
        }
    }
}

impl Log for Logger {
    fn stage(&self, msg: &str) {
        tracing::info!(target: STAGE_TARGET, "{msg}");
    }

    fn info(&self, msg: &str) {
        tracing::info!("{msg}");
    }

    fn debug(&self, msg: &str) {
        tracing::debug!("{msg}");
    }

    fn warn(&self, msg: &str) {
        tracing::warn!("{msg}");
    }

    fn error(&self, msg: &str) {
        tracing::error!("{msg}");
    }

    fn dry_run(&self, msg: &str) {
        tracing::info!(target: DRY_RUN_TARGET, "{msg}");
    }

    fn record_step(&self, step: &str, status: StepStatus, detail: Option<&str>) {
        if let Ok(mut steps) = self.steps.lock() {
            steps.push(StepRecord {
                step: step.to_string(),
                status,
                detail: detail.map(str::to_string),
            });
        }
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::indexing_slicing)]
mod tests {
    use super::*;
    use crate::logging::LoggerFixture;

    #[test]
    fn steps_keep_their_detail() {
        let fixture = LoggerFixture::new("delete-user");
        fixture
            .log
            .record_step("delete user alice", StepStatus::Skipped, Some("absent"));
        let steps = fixture.log.steps();
        assert_eq!(
            steps,
            [StepRecord {
                step: "delete user alice".to_string(),
                status: StepStatus::Skipped,
                detail: Some("absent".to_string()),
            }]
        );
    }

    #[test]
    fn only_failures_are_counted_as_failures() {
        let fixture = LoggerFixture::new("remove");
        let log: &dyn Log = &fixture.log;
        log.record_step("destroy dataset tank/homes", StepStatus::Applied, None);
        log.record_step("delete user bob", StepStatus::Failed, Some("busy"));
        log.record_step("delete group smb_users", StepStatus::Failed, Some("in use"));
        log.record_step("remove smb.conf", StepStatus::Skipped, None);
        assert_eq!(fixture.log.failure_count(), 2);
    }

    #[test]
    fn run_header_names_the_command() {
        let fixture = LoggerFixture::new("setup");
        let contents = fixture.contents();
        assert!(contents.contains("smb-zfs"));
        assert!(contents.contains(" setup (pid "));
    }

    #[test]
    fn file_lines_carry_a_kind_tag() {
        let fixture = LoggerFixture::new("create-share");
        let log = &fixture.log;
        log.stage("Creating share");
        log.dry_run("create dataset tank/media");
        log.debug("zfs list -H");
        log.warn("adopted existing dataset(s): tank/media");
        log.error("smbd reload failed");
        let contents = fixture.contents();
        assert!(contents.contains("STAGE Creating share"));
        assert!(contents.contains("PLAN  create dataset tank/media"));
        assert!(contents.contains("DEBUG zfs list -H"));
        assert!(contents.contains("WARN  adopted existing dataset(s): tank/media"));
        assert!(contents.contains("ERROR smbd reload failed"));
    }

    #[test]
    fn summary_reaches_the_file_without_colour() {
        let fixture = LoggerFixture::new("remove");
        let log = &fixture.log;
        log.record_step("destroy dataset tank/homes/alice", StepStatus::Applied, None);
        log.record_step("delete user bob", StepStatus::Failed, Some("busy"));
        log.print_summary();
        let contents = fixture.contents();
        assert!(contents.contains("STAGE Steps"));
        assert!(contents.contains("! delete user bob: busy"));
        assert!(contents.contains("2 steps: 1 applied, 0 planned, 0 skipped, 1 failed"));
        assert!(!contents.contains('\x1b'));
    }

    #[test]
    fn empty_run_prints_no_summary() {
        let fixture = LoggerFixture::new("list");
        fixture.log.print_summary();
        assert!(!fixture.contents().contains("Steps"));
    }
}
