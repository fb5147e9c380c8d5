//! Shared fixtures for operation unit tests.
use std::sync::Mutex;

use tempfile::TempDir;

use super::{Confirm, Context, Host};
use crate::logging::{Log, StepStatus};
use crate::resources::account::SystemAccounts;
use crate::resources::avahi::AvahiServiceFile;
use crate::resources::dataset::ZfsDatasets;
use crate::resources::service::{ServiceUnits, Systemctl};
use crate::resources::smb_conf::SambaConfigFile;
use crate::resources::smb_passwd::SambaPasswords;
use crate::resources::test_helpers::MockExecutor;
use crate::state::StateStore;

/// [`Log`] that keeps every message in memory.
#[derive(Debug, Default)]
pub(crate) struct CapturingLog {
    lines: Mutex<Vec<String>>,
    steps: Mutex<Vec<(String, StepStatus)>>,
}

impl CapturingLog {
    pub(crate) fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    pub(crate) fn steps(&self) -> Vec<(String, StepStatus)> {
        self.steps.lock().unwrap().clone()
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{level}: {msg}"));
    }
}

impl Log for CapturingLog {
    fn stage(&self, msg: &str) {
        self.push("stage", msg);
    }
    fn info(&self, msg: &str) {
        self.push("info", msg);
    }
    fn debug(&self, msg: &str) {
        self.push("debug", msg);
    }
    fn warn(&self, msg: &str) {
        self.push("warn", msg);
    }
    fn error(&self, msg: &str) {
        self.push("error", msg);
    }
    fn dry_run(&self, msg: &str) {
        self.push("dry-run", msg);
    }
    fn record_step(&self, step: &str, status: StepStatus, _detail: Option<&str>) {
        self.steps.lock().unwrap().push((step.to_string(), status));
    }
}

/// Real adapters over a [`MockExecutor`] plus a ledger in a temp dir.
pub(crate) struct Fixture {
    pub(crate) executor: MockExecutor,
    pub(crate) log: CapturingLog,
    pub(crate) store: StateStore,
    pub(crate) dir: TempDir,
}

impl Fixture {
    pub(crate) fn new(executor: MockExecutor) -> Self {
        let dir = tempfile::tempdir().unwrap();
        let store = StateStore::new(dir.path().join("smb-zfs.state"));
        Self {
            executor,
            log: CapturingLog::default(),
            store,
            dir,
        }
    }

    /// Build a [`Context`] and hand it to `f`.
    pub(crate) fn run<T>(
        &self,
        confirm: &dyn Confirm,
        dry_run: bool,
        f: impl FnOnce(&Context<'_>) -> T,
    ) -> T {
        let datasets = ZfsDatasets::new(&self.executor);
        let accounts = SystemAccounts::new(&self.executor, "/bin/bash", "/usr/sbin/nologin");
        let smb_conf = SambaConfigFile::new(&self.executor, self.dir.path().join("smb.conf"));
        let discovery = AvahiServiceFile::new(self.dir.path().join("smb.service"));
        let services = Systemctl::new(&self.executor, ServiceUnits::default());
        let passwords = SambaPasswords::new(&self.executor);
        let ctx = Context {
            store: &self.store,
            host: Host {
                datasets: &datasets,
                accounts: &accounts,
                smb_conf: &smb_conf,
                discovery: &discovery,
                services: &services,
                passwords: &passwords,
            },
            confirm,
            log: &self.log,
            dry_run,
        };
        f(&ctx)
    }
}
