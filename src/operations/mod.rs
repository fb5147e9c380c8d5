//! Entity operations: the only code that mutates the host and the ledger.
//!
//! Every operation follows the same sequence:
//!
//! 1. take the state lock and check preconditions against the ledger and
//!    the host,
//! 2. validate parameters and resolve collaborators,
//! 3. pass the confirmation gate when the operation is destructive,
//! 4. apply external changes in a fixed order, recording each in a
//!    [`Journal`],
//! 5. commit the ledger through [`StateStore::transact`].
//!
//! In dry-run mode steps 3 to 5 only log what would happen.
pub mod confirm;
pub mod group;
pub mod list;
pub mod password;
pub mod remove;
pub mod setup;
pub mod share;
pub mod user;
pub mod validate;

use std::fmt;
use std::path::PathBuf;

use serde::Serialize;

pub use confirm::{AssumeYes, Confirm, ConfirmTier};

use crate::config::ini::IniDocument;
use crate::error::{EntityKind, PreconditionError, SmbZfsError};
use crate::logging::{Log, StepStatus};
use crate::resources::error::ResourceError;
use crate::resources::smb_conf::{GlobalSettings, render_full};
use crate::resources::{
    AccountManager, DatasetManager, DiscoveryConfigWriter, ResourceResult, Service,
    ServiceController, ShareConfigWriter, SharePasswordStore,
};
use crate::state::{StateDocument, StateStore};

/// Result alias for entity operations.
pub type OpResult<T> = Result<T, SmbZfsError>;

/// The adapters an operation may call.
#[derive(Debug, Clone, Copy)]
pub struct Host<'a> {
    /// ZFS pools and datasets.
    pub datasets: &'a dyn DatasetManager,
    /// OS users and groups.
    pub accounts: &'a dyn AccountManager,
    /// `smb.conf`.
    pub smb_conf: &'a dyn ShareConfigWriter,
    /// Avahi service file.
    pub discovery: &'a dyn DiscoveryConfigWriter,
    /// systemd.
    pub services: &'a dyn ServiceController,
    /// Samba password database.
    pub passwords: &'a dyn SharePasswordStore,
}

/// Everything an operation needs.
pub struct Context<'a> {
    /// Ledger.
    pub store: &'a StateStore,
    /// Host adapters.
    pub host: Host<'a>,
    /// Confirmation callback for destructive steps.
    pub confirm: &'a dyn Confirm,
    /// Logger.
    pub log: &'a dyn Log,
    /// Plan only; no mutating adapter call, prompt or ledger write.
    pub dry_run: bool,
}

impl fmt::Debug for Context<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("store", &self.store.path())
            .field("host", &self.host)
            .field("confirm", &"<dyn Confirm>")
            .field("log", &"<dyn Log>")
            .field("dry_run", &self.dry_run)
            .finish()
    }
}

impl<'a> Context<'a> {
    /// Start a [`Journal`] for this operation.
    #[must_use]
    pub fn journal(&self) -> Journal<'a> {
        Journal::new(self.log, self.dry_run)
    }

    /// Load the ledger, failing when setup has not run.
    ///
    /// # Errors
    ///
    /// Returns [`PreconditionError::NotInitialized`] or a ledger read error.
    pub fn initialized(&self) -> OpResult<StateDocument> {
        self.store
            .load()?
            .ok_or(SmbZfsError::Precondition(PreconditionError::NotInitialized))
    }

    /// Ask for confirmation; the expected phrase depends on `tier`.
    ///
    /// Skipped in dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns [`SmbZfsError::Cancelled`] unless the answer matches the
    /// phrase exactly.
    pub fn gate(&self, tier: ConfirmTier, target: &str, message: &str) -> OpResult<()> {
        if self.dry_run {
            self.log
                .dry_run(&format!("would ask for confirmation: {message}"));
            return Ok(());
        }
        let phrase = tier.phrase(target);
        match self.confirm.confirm(message, &phrase) {
            Some(answer) if answer.trim() == phrase => Ok(()),
            _ => {
                self.log.info(&format!("cancelled, {target} left untouched"));
                Err(SmbZfsError::Cancelled {
                    target: target.to_string(),
                })
            }
        }
    }
}

/// How a [`Journal`] reacts to a failed step.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailurePolicy {
    /// Abort the operation with [`SmbZfsError::External`].
    FailFast,
    /// Log a warning, remember it and carry on.
    BestEffort,
}

/// What an operation did (or, in dry-run mode, would do).
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Outcome {
    /// Human-readable summary.
    pub message: String,
    /// External steps applied (or planned), in order.
    pub changes: Vec<String>,
    /// Best-effort failures and drift notices.
    pub warnings: Vec<String>,
    /// Whether nothing was applied.
    pub dry_run: bool,
}

impl Outcome {
    /// An outcome without external steps.
    #[must_use]
    pub fn message(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            changes: Vec::new(),
            warnings: Vec::new(),
            dry_run: false,
        }
    }
}

/// Ordered record of the external steps an operation has applied.
pub struct Journal<'a> {
    log: &'a dyn Log,
    dry_run: bool,
    applied: Vec<String>,
    warnings: Vec<String>,
}

impl fmt::Debug for Journal<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Journal")
            .field("dry_run", &self.dry_run)
            .field("applied", &self.applied)
            .field("warnings", &self.warnings)
            .finish_non_exhaustive()
    }
}

impl<'a> Journal<'a> {
    /// Start an empty journal.
    #[must_use]
    pub fn new(log: &'a dyn Log, dry_run: bool) -> Self {
        Self {
            log,
            dry_run,
            applied: Vec::new(),
            warnings: Vec::new(),
        }
    }

    /// Steps applied so far.
    #[must_use]
    pub fn applied(&self) -> &[String] {
        &self.applied
    }

    /// Run one fail-fast step.
    ///
    /// # Errors
    ///
    /// Returns [`SmbZfsError::External`] naming `step` and every step
    /// already applied.
    pub fn step<F>(&mut self, step: impl Into<String>, action: F) -> OpResult<()>
    where
        F: FnOnce() -> ResourceResult<()>,
    {
        self.run(FailurePolicy::FailFast, step, action).map(|_| ())
    }

    /// Run one best-effort step.  Returns whether it succeeded.
    pub fn attempt<F>(&mut self, step: impl Into<String>, action: F) -> bool
    where
        F: FnOnce() -> ResourceResult<()>,
    {
        matches!(self.run(FailurePolicy::BestEffort, step, action), Ok(true))
    }

    /// Run `action` under `policy`.
    ///
    /// Returns `Ok(true)` when the step was applied (or planned in dry-run
    /// mode) and `Ok(false)` when a best-effort step failed.
    ///
    /// # Errors
    ///
    /// Returns [`SmbZfsError::External`] when a fail-fast step fails.
    pub fn run<F>(&mut self, policy: FailurePolicy, step: impl Into<String>, action: F) -> OpResult<bool>
    where
        F: FnOnce() -> ResourceResult<()>,
    {
        let step = step.into();
        if self.dry_run {
            self.log.dry_run(&format!("would {step}"));
            self.log.record_step(&step, StepStatus::Planned, None);
            self.applied.push(step);
            return Ok(true);
        }

        self.log.debug(&step);
        match action() {
            Ok(()) => {
                self.log.info(&step);
                self.log.record_step(&step, StepStatus::Applied, None);
                self.applied.push(step);
                Ok(true)
            }
            Err(source) => {
                self.log.record_step(&step, StepStatus::Failed, Some(&source.to_string()));
                match policy {
                    FailurePolicy::FailFast => {
                        self.log.error(&format!("{step}: {source}"));
                        Err(SmbZfsError::External {
                            step,
                            applied: self.applied.clone(),
                            source,
                        })
                    }
                    FailurePolicy::BestEffort => {
                        self.warn(format!("{step} failed: {source}"));
                        Ok(false)
                    }
                }
            }
        }
    }

    /// Record a step that had nothing to do.
    pub fn skip(&self, step: &str, reason: &str) {
        self.log.debug(&format!("{step}: {reason}"));
        self.log.record_step(step, StepStatus::Skipped, Some(reason));
    }

    /// Record a warning.
    pub fn warn(&mut self, warning: impl Into<String>) {
        let warning = warning.into();
        self.log.warn(&warning);
        self.warnings.push(warning);
    }

    /// Persist the ledger change as the final step.
    ///
    /// Skipped in dry-run mode.
    ///
    /// # Errors
    ///
    /// Returns the mutator's error, or [`SmbZfsError::Ledger`] listing the
    /// applied steps when the write fails.
    pub fn commit<F>(&mut self, store: &StateStore, mutator: F) -> OpResult<()>
    where
        F: FnOnce(&mut StateDocument) -> OpResult<()>,
    {
        if self.dry_run {
            self.log.dry_run(&format!("would update {}", store.path().display()));
            return Ok(());
        }
        store.transact(mutator).map_err(|err| match err {
            SmbZfsError::State(source) | SmbZfsError::Ledger { source, .. } => {
                self.log.error(&format!("ledger update failed: {source}"));
                SmbZfsError::Ledger {
                    applied: self.applied.clone(),
                    source,
                }
            }
            other => other,
        })
    }

    /// Close the journal into an [`Outcome`].
    #[must_use]
    pub fn finish(self, message: impl Into<String>) -> Outcome {
        Outcome {
            message: message.into(),
            changes: self.applied,
            warnings: self.warnings,
            dry_run: self.dry_run,
        }
    }
}

/// [`PreconditionError::NotFound`] for a ledger entity.
pub(crate) fn not_found(kind: EntityKind, name: &str) -> SmbZfsError {
    PreconditionError::NotFound {
        kind,
        name: name.to_string(),
    }
    .into()
}

/// Fail with [`PreconditionError::AlreadyExists`] when `exists`.
pub(crate) fn require_absent(exists: bool, kind: EntityKind, name: &str) -> OpResult<()> {
    if exists {
        Err(PreconditionError::AlreadyExists {
            kind,
            name: name.to_string(),
        }
        .into())
    } else {
        Ok(())
    }
}

/// Wrap a read-only adapter failure that happens before any mutation.
pub(crate) fn inspect<T>(step: &str, result: ResourceResult<T>) -> OpResult<T> {
    result.map_err(|source| SmbZfsError::External {
        step: step.to_string(),
        applied: Vec::new(),
        source,
    })
}

/// Mountpoint of `dataset`.  In dry-run mode a dataset that does not exist
/// yet is given its default ZFS mountpoint.
pub(crate) fn mountpoint(ctx: &Context<'_>, dataset: &str) -> OpResult<PathBuf> {
    if ctx.dry_run && !inspect("check dataset", ctx.host.datasets.exists(dataset))? {
        return Ok(PathBuf::from("/").join(dataset));
    }
    inspect(
        &format!("read mountpoint of {dataset}"),
        ctx.host.datasets.mountpoint(dataset),
    )
}

/// The live `smb.conf`, or a full rendering of `doc` when none is installed.
pub(crate) fn current_smb_conf(ctx: &Context<'_>, doc: &StateDocument) -> OpResult<IniDocument> {
    Ok(inspect("read smb.conf", ctx.host.smb_conf.read_current())?
        .unwrap_or_else(|| render_full(&GlobalSettings::from_document(doc), &doc.shares)))
}

/// Validate and install a new `smb.conf`, then reload the Samba daemons.
///
/// The previous file is restored when the reload fails.
pub(crate) fn apply_smb_conf(
    ctx: &Context<'_>,
    journal: &mut Journal<'_>,
    candidate: &IniDocument,
) -> OpResult<()> {
    let smb_conf = ctx.host.smb_conf;
    journal.step("validate smb.conf", || smb_conf.validate(candidate))?;
    journal.step("install smb.conf", || smb_conf.install(candidate))?;
    reload_samba(ctx, journal)
}

fn reload_samba(ctx: &Context<'_>, journal: &mut Journal<'_>) -> OpResult<()> {
    for service in Service::SAMBA {
        let result = journal.step(format!("reload {service}"), || {
            ctx.host.services.reload(service)
        });
        if let Err(err) = result {
            restore_smb_conf(ctx);
            return Err(err);
        }
    }
    Ok(())
}

fn restore_smb_conf(ctx: &Context<'_>) {
    match ctx.host.smb_conf.restore_backup() {
        Ok(()) => ctx.log.warn("restored previous smb.conf from backup"),
        Err(ResourceError::NotFound { .. }) => {
            ctx.log.warn("no smb.conf backup to restore");
        }
        Err(e) => ctx.log.error(&format!("failed to restore smb.conf: {e}")),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
pub(crate) mod test_support;

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used, clippy::panic)]
mod tests {
    use super::confirm::MockConfirm;
    use super::remove::{RemoveRequest, remove};
    use super::test_support::{CapturingLog, Fixture};
    use super::*;
    use crate::resources::test_helpers::MockExecutor;
    use crate::state::document::tests::initialized;

    fn failing() -> ResourceResult<()> {
        Err(ResourceError::NotFound {
            resource: "tank/x".to_string(),
        })
    }

    fn answering(answer: &'static str) -> MockConfirm {
        let mut confirm = MockConfirm::new();
        confirm
            .expect_confirm()
            .times(1)
            .returning(move |_, _| Some(answer.to_string()));
        confirm
    }

    fn seed(fixture: &Fixture) {
        fixture
            .store
            .transact(|doc| {
                *doc = initialized();
                Ok::<_, SmbZfsError>(())
            })
            .unwrap();
    }

    #[test]
    fn dry_run_journal_plans_without_running() {
        let log = CapturingLog::default();
        let mut journal = Journal::new(&log, true);
        journal
            .step("create dataset tank/x", || panic!("must not run"))
            .unwrap();
        let outcome = journal.finish("done");
        assert!(outcome.dry_run);
        assert_eq!(outcome.changes, ["create dataset tank/x"]);
        assert_eq!(log.steps(), [("create dataset tank/x".to_string(), StepStatus::Planned)]);
    }

    #[test]
    fn skipped_step_is_recorded_but_not_applied() {
        let log = CapturingLog::default();
        let journal = Journal::new(&log, false);
        journal.skip("delete group finance", "group 'finance' already absent");
        assert!(journal.applied().is_empty());
        assert_eq!(log.steps(), [("delete group finance".to_string(), StepStatus::Skipped)]);
    }

    #[test]
    fn failed_step_lists_applied_steps() {
        let log = CapturingLog::default();
        let mut journal = Journal::new(&log, false);
        journal.step("first", || Ok(())).unwrap();
        let err = journal.step("second", failing).unwrap_err();
        match err {
            SmbZfsError::External { step, applied, .. } => {
                assert_eq!(step, "second");
                assert_eq!(applied, ["first"]);
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn best_effort_failure_becomes_warning() {
        let log = CapturingLog::default();
        let mut journal = Journal::new(&log, false);
        assert!(!journal.attempt("delete group finance", failing));
        assert!(journal.attempt("delete group sales", || Ok(())));
        let outcome = journal.finish("ok");
        assert_eq!(outcome.changes, ["delete group sales"]);
        assert_eq!(outcome.warnings.len(), 1);
        assert!(outcome.warnings[0].starts_with("delete group finance failed"));
    }

    #[test]
    fn gate_accepts_phrase_with_surrounding_whitespace() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let confirm = answering("  destroy alice\n");
        fixture.run(&confirm, false, |ctx| {
            ctx.gate(ConfirmTier::Destroy, "alice", "Delete?").unwrap();
        });
    }

    #[test]
    fn gate_rejects_weaker_phrase() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let confirm = answering("yes");
        let err = fixture.run(&confirm, false, |ctx| {
            ctx.gate(ConfirmTier::Destroy, "alice", "Delete?").unwrap_err()
        });
        assert!(matches!(err, SmbZfsError::Cancelled { target } if target == "alice"));
    }

    #[test]
    fn gate_without_answer_cancels() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().returning(|_, _| None);
        let result = fixture.run(&confirm, false, |ctx| {
            ctx.gate(ConfirmTier::Proceed, "all", "Continue?")
        });
        assert!(matches!(result, Err(SmbZfsError::Cancelled { .. })));
    }

    #[test]
    fn gate_is_skipped_in_dry_run() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().never();
        fixture.run(&confirm, true, |ctx| {
            ctx.gate(ConfirmTier::Destroy, "all", "Remove?").unwrap();
        });
        assert!(fixture.log.lines().iter().any(|l| l.starts_with("dry-run:")));
    }

    #[test]
    fn operations_require_setup() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let err = fixture
            .run(&AssumeYes, false, |ctx| ctx.initialized())
            .unwrap_err();
        assert!(matches!(
            err,
            SmbZfsError::Precondition(PreconditionError::NotInitialized)
        ));
    }

    #[test]
    fn dry_run_commit_leaves_ledger_alone() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        seed(&fixture);
        let before = std::fs::read(fixture.store.path()).unwrap();
        fixture.run(&AssumeYes, true, |ctx| {
            ctx.journal()
                .commit(ctx.store, |doc| {
                    doc.users.clear();
                    doc.workgroup = Some("OTHER".to_string());
                    Ok(())
                })
                .unwrap();
        });
        assert_eq!(std::fs::read(fixture.store.path()).unwrap(), before);
    }

    #[test]
    fn remove_on_fresh_system_does_nothing() {
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        let mut confirm = MockConfirm::new();
        confirm.expect_confirm().never();
        let outcome = fixture
            .run(&confirm, false, |ctx| remove(ctx, RemoveRequest::default()))
            .unwrap();
        assert_eq!(outcome.message, "System is not set up, nothing to do.");
        assert_eq!(fixture.executor.call_count(), 0);
    }

    #[test]
    fn remove_config_only_keeps_accounts_and_data() {
        // stop/disable tolerate failures, so an empty response queue is fine
        let fixture = Fixture::new(MockExecutor::succeeding(0));
        seed(&fixture);
        let outcome = fixture
            .run(&AssumeYes, false, |ctx| remove(ctx, RemoveRequest::default()))
            .unwrap();
        assert_eq!(outcome.message, "Removal completed successfully.");
        assert!(outcome.warnings.is_empty(), "{:?}", outcome.warnings);
        assert!(
            fixture
                .executor
                .calls()
                .iter()
                .all(|c| c.starts_with("systemctl "))
        );
        assert!(!fixture.store.path().exists());
    }
}
