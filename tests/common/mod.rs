// Shared helpers for integration tests.
//
// Provides an in-memory host that implements every adapter trait, a
// capturing logger, a scripted confirmation callback and a ledger in a
// temporary directory, so each test drives real entity operations without
// touching the machine.
//
// Used by all integration test binaries that declare `mod common;`.
#![allow(dead_code, clippy::expect_used, clippy::unwrap_used)]

use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};

use secrecy::{ExposeSecret as _, SecretString};
use smb_zfs::config::ini::IniDocument;
use smb_zfs::error::ResourceError;
use smb_zfs::logging::{Log, StepStatus};
use smb_zfs::operations::setup::{SetupRequest, setup};
use smb_zfs::operations::{AssumeYes, Confirm, Context, Host};
use smb_zfs::resources::{
    AccountManager, DatasetManager, DiscoveryConfigWriter, ResourceResult, Service,
    ServiceController, ShareConfigWriter, SharePasswordStore,
};
use smb_zfs::state::{StateDocument, StateStore};

/// A dataset on the fake host.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FakeDataset {
    pub quota: Option<String>,
    /// `(owner, group, mode)` of the mountpoint.
    pub ownership: Option<(String, String, String)>,
}

/// An OS account on the fake host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeUser {
    pub shell_access: bool,
    pub home: PathBuf,
    pub password: Option<String>,
}

/// A systemd unit on the fake host.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FakeService {
    pub enabled: bool,
    pub running: bool,
    pub reloads: u32,
}

/// Everything the fake host knows.
#[derive(Debug, Default)]
pub struct HostState {
    pub pools: BTreeSet<String>,
    pub datasets: BTreeMap<String, FakeDataset>,
    pub users: BTreeMap<String, FakeUser>,
    /// Group name to member names.
    pub groups: BTreeMap<String, BTreeSet<String>>,
    /// Samba account name to `(password, enabled)`.
    pub samba: BTreeMap<String, (String, bool)>,
    pub smb_conf: Option<IniDocument>,
    pub smb_conf_backup: Option<IniDocument>,
    pub avahi_installed: bool,
    pub services: BTreeMap<String, FakeService>,
    /// Every mutating call, in order.
    pub calls: Vec<String>,
    /// Calls (as recorded in `calls`) that fail.
    pub fail_on: BTreeSet<String>,
}

impl HostState {
    /// Whether any recorded call starts with `prefix`.
    pub fn called(&self, prefix: &str) -> bool {
        self.calls.iter().any(|c| c.starts_with(prefix))
    }
}

/// In-memory implementation of every adapter trait.
#[derive(Debug, Default)]
pub struct FakeHost {
    state: Mutex<HostState>,
}

fn failure(call: &str) -> ResourceError {
    ResourceError::ExecutionFailed {
        command: call.to_string(),
        exit_code: 1,
        stderr: "injected failure".to_string(),
    }
}

fn missing(what: &str) -> ResourceError {
    ResourceError::NotFound {
        resource: what.to_string(),
    }
}

impl FakeHost {
    /// Host with the given pools imported.
    pub fn with_pools(pools: &[&str]) -> Self {
        let host = Self::default();
        host.state()
            .pools
            .extend(pools.iter().map(ToString::to_string));
        host
    }

    /// Lock the host state for inspection or tweaking.
    pub fn state(&self) -> MutexGuard<'_, HostState> {
        self.state.lock().unwrap()
    }

    /// Make `call` fail from now on.
    pub fn fail_on(&self, call: &str) {
        self.state().fail_on.insert(call.to_string());
    }

    /// Record `call` and apply `change` unless the call is set to fail.
    fn mutate<T>(
        &self,
        call: String,
        change: impl FnOnce(&mut HostState) -> ResourceResult<T>,
    ) -> ResourceResult<T> {
        let mut state = self.state();
        state.calls.push(call.clone());
        if state.fail_on.contains(&call) {
            return Err(failure(&call));
        }
        change(&mut state)
    }

    fn service(&self, verb: &str, service: Service, change: impl FnOnce(&mut FakeService)) -> ResourceResult<()> {
        self.mutate(format!("{verb} {service}"), |s| {
            change(s.services.entry(service.to_string()).or_default());
            Ok(())
        })
    }
}

impl DatasetManager for FakeHost {
    fn pool_exists(&self, pool: &str) -> ResourceResult<bool> {
        Ok(self.state().pools.contains(pool))
    }

    fn list_pools(&self) -> ResourceResult<Vec<String>> {
        Ok(self.state().pools.iter().cloned().collect())
    }

    fn exists(&self, dataset: &str) -> ResourceResult<bool> {
        Ok(self.state().datasets.contains_key(dataset))
    }

    fn create(&self, dataset: &str) -> ResourceResult<()> {
        self.mutate(format!("create dataset {dataset}"), |s| {
            let pool = dataset.split('/').next().unwrap_or(dataset);
            if !s.pools.contains(pool) {
                return Err(missing(pool));
            }
            s.datasets.entry(dataset.to_string()).or_default();
            Ok(())
        })
    }

    fn destroy(&self, dataset: &str, recursive: bool) -> ResourceResult<()> {
        self.mutate(format!("destroy dataset {dataset}"), |s| {
            if s.datasets.remove(dataset).is_none() {
                return Err(missing(dataset));
            }
            if recursive {
                let prefix = format!("{dataset}/");
                s.datasets.retain(|name, _| !name.starts_with(&prefix));
            }
            Ok(())
        })
    }

    fn mountpoint(&self, dataset: &str) -> ResourceResult<PathBuf> {
        if self.state().datasets.contains_key(dataset) {
            Ok(Path::new("/").join(dataset))
        } else {
            Err(missing(dataset))
        }
    }

    fn set_quota(&self, dataset: &str, quota: Option<&str>) -> ResourceResult<()> {
        self.mutate(format!("set quota {dataset}"), |s| {
            let entry = s.datasets.get_mut(dataset).ok_or_else(|| missing(dataset))?;
            entry.quota = quota.map(ToString::to_string);
            Ok(())
        })
    }

    fn quota(&self, dataset: &str) -> ResourceResult<Option<String>> {
        self.state()
            .datasets
            .get(dataset)
            .map(|d| d.quota.clone())
            .ok_or_else(|| missing(dataset))
    }

    fn set_ownership(
        &self,
        path: &Path,
        owner: &str,
        group: &str,
        mode: &str,
    ) -> ResourceResult<()> {
        let dataset = path
            .strip_prefix("/")
            .unwrap_or(path)
            .to_string_lossy()
            .into_owned();
        self.mutate(format!("set ownership {}", path.display()), |s| {
            let entry = s.datasets.get_mut(&dataset).ok_or_else(|| missing(&dataset))?;
            entry.ownership = Some((owner.to_string(), group.to_string(), mode.to_string()));
            Ok(())
        })
    }
}

impl AccountManager for FakeHost {
    fn user_exists(&self, name: &str) -> ResourceResult<bool> {
        Ok(self.state().users.contains_key(name))
    }

    fn create_user(&self, name: &str, shell_access: bool, home: &Path) -> ResourceResult<()> {
        self.mutate(format!("create user {name}"), |s| {
            s.users.insert(
                name.to_string(),
                FakeUser {
                    shell_access,
                    home: home.to_path_buf(),
                    password: None,
                },
            );
            // useradd creates the user's private group
            s.groups.entry(name.to_string()).or_default();
            Ok(())
        })
    }

    fn set_login_shell(&self, name: &str, shell_access: bool) -> ResourceResult<()> {
        self.mutate(format!("set shell {name}"), |s| {
            s.users.get_mut(name).ok_or_else(|| missing(name))?.shell_access = shell_access;
            Ok(())
        })
    }

    fn delete_user(&self, name: &str) -> ResourceResult<()> {
        self.mutate(format!("delete user {name}"), |s| {
            s.users.remove(name).ok_or_else(|| missing(name))?;
            for members in s.groups.values_mut() {
                members.remove(name);
            }
            s.groups.remove(name);
            Ok(())
        })
    }

    fn set_unix_password(&self, name: &str, password: &SecretString) -> ResourceResult<()> {
        self.mutate(format!("set unix password {name}"), |s| {
            s.users.get_mut(name).ok_or_else(|| missing(name))?.password =
                Some(password.expose_secret().to_string());
            Ok(())
        })
    }

    fn group_exists(&self, name: &str) -> ResourceResult<bool> {
        Ok(self.state().groups.contains_key(name))
    }

    fn create_group(&self, name: &str) -> ResourceResult<()> {
        self.mutate(format!("create group {name}"), |s| {
            s.groups.insert(name.to_string(), BTreeSet::new());
            Ok(())
        })
    }

    fn delete_group(&self, name: &str) -> ResourceResult<()> {
        self.mutate(format!("delete group {name}"), |s| {
            s.groups.remove(name).map(|_| ()).ok_or_else(|| missing(name))
        })
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> ResourceResult<()> {
        self.mutate(format!("add {user} to {group}"), |s| {
            if !s.users.contains_key(user) {
                return Err(missing(user));
            }
            s.groups
                .get_mut(group)
                .ok_or_else(|| missing(group))?
                .insert(user.to_string());
            Ok(())
        })
    }

    fn remove_user_from_group(&self, user: &str, group: &str) -> ResourceResult<()> {
        self.mutate(format!("remove {user} from {group}"), |s| {
            s.groups
                .get_mut(group)
                .ok_or_else(|| missing(group))?
                .remove(user);
            Ok(())
        })
    }
}

impl ShareConfigWriter for FakeHost {
    fn read_current(&self) -> ResourceResult<Option<IniDocument>> {
        Ok(self.state().smb_conf.clone())
    }

    fn validate(&self, _doc: &IniDocument) -> ResourceResult<()> {
        self.mutate("validate smb.conf".to_string(), |_| Ok(()))
    }

    fn install(&self, doc: &IniDocument) -> ResourceResult<()> {
        self.mutate("install smb.conf".to_string(), |s| {
            s.smb_conf_backup = s.smb_conf.take();
            s.smb_conf = Some(doc.clone());
            Ok(())
        })
    }

    fn backup(&self) -> ResourceResult<()> {
        self.mutate("backup smb.conf".to_string(), |s| {
            s.smb_conf_backup.clone_from(&s.smb_conf);
            Ok(())
        })
    }

    fn restore_backup(&self) -> ResourceResult<()> {
        self.mutate("restore smb.conf".to_string(), |s| {
            let backup = s.smb_conf_backup.clone().ok_or_else(|| missing("smb.conf backup"))?;
            s.smb_conf = Some(backup);
            Ok(())
        })
    }

    fn remove(&self) -> ResourceResult<()> {
        self.mutate("remove smb.conf".to_string(), |s| {
            s.smb_conf = None;
            Ok(())
        })
    }
}

impl DiscoveryConfigWriter for FakeHost {
    fn install(&self) -> ResourceResult<()> {
        self.mutate("install avahi".to_string(), |s| {
            s.avahi_installed = true;
            Ok(())
        })
    }

    fn remove(&self) -> ResourceResult<()> {
        self.mutate("remove avahi".to_string(), |s| {
            s.avahi_installed = false;
            Ok(())
        })
    }
}

impl ServiceController for FakeHost {
    fn reload(&self, service: Service) -> ResourceResult<()> {
        self.service("reload", service, |svc| svc.reloads += 1)
    }

    fn restart(&self, service: Service) -> ResourceResult<()> {
        self.service("restart", service, |svc| svc.running = true)
    }

    fn enable(&self, service: Service) -> ResourceResult<()> {
        self.service("enable", service, |svc| svc.enabled = true)
    }

    fn disable(&self, service: Service) -> ResourceResult<()> {
        self.service("disable", service, |svc| svc.enabled = false)
    }

    fn stop(&self, service: Service) -> ResourceResult<()> {
        self.service("stop", service, |svc| svc.running = false)
    }
}

impl SharePasswordStore for FakeHost {
    fn exists(&self, user: &str) -> ResourceResult<bool> {
        Ok(self.state().samba.contains_key(user))
    }

    fn set_share_password(&self, user: &str, password: &SecretString) -> ResourceResult<()> {
        self.mutate(format!("set samba password {user}"), |s| {
            let enabled = s.samba.get(user).is_some_and(|(_, enabled)| *enabled);
            s.samba
                .insert(user.to_string(), (password.expose_secret().to_string(), enabled));
            Ok(())
        })
    }

    fn enable_share_password(&self, user: &str) -> ResourceResult<()> {
        self.mutate(format!("enable samba account {user}"), |s| {
            s.samba.get_mut(user).ok_or_else(|| missing(user))?.1 = true;
            Ok(())
        })
    }

    fn remove_share_password(&self, user: &str) -> ResourceResult<()> {
        self.mutate(format!("remove samba account {user}"), |s| {
            s.samba.remove(user).map(|_| ()).ok_or_else(|| missing(user))
        })
    }
}

/// [`Log`] that keeps every line in memory.
#[derive(Debug, Default)]
pub struct TestLog {
    lines: Mutex<Vec<String>>,
}

impl TestLog {
    pub fn lines(&self) -> Vec<String> {
        self.lines.lock().unwrap().clone()
    }

    /// Whether a warning containing `needle` was logged.
    pub fn warned(&self, needle: &str) -> bool {
        self.lines()
            .iter()
            .any(|l| l.starts_with("warn:") && l.contains(needle))
    }

    fn push(&self, level: &str, msg: &str) {
        self.lines.lock().unwrap().push(format!("{level}: {msg}"));
    }
}

impl Log for TestLog {
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
    fn record_step(&self, _step: &str, _status: StepStatus, _detail: Option<&str>) {}
}

/// [`Confirm`] that gives the same answer every time and counts prompts.
#[derive(Debug)]
pub struct Scripted {
    answer: Option<String>,
    asked: Mutex<Vec<String>>,
}

impl Scripted {
    pub fn answer(answer: &str) -> Self {
        Self {
            answer: Some(answer.to_string()),
            asked: Mutex::new(Vec::new()),
        }
    }

    pub fn silent() -> Self {
        Self {
            answer: None,
            asked: Mutex::new(Vec::new()),
        }
    }

    /// Phrases that were requested.
    pub fn asked(&self) -> Vec<String> {
        self.asked.lock().unwrap().clone()
    }
}

impl Confirm for Scripted {
    fn confirm(&self, _message: &str, phrase: &str) -> Option<String> {
        self.asked.lock().unwrap().push(phrase.to_string());
        self.answer.clone()
    }
}

/// A fake host plus a ledger in a temporary directory.
pub struct TestEnv {
    pub host: FakeHost,
    pub log: TestLog,
    pub store: StateStore,
    pub dir: tempfile::TempDir,
}

impl TestEnv {
    /// Fresh host with pools `tank` and `bulk`; nothing set up.
    pub fn new() -> Self {
        let dir = tempfile::tempdir().expect("create temp dir");
        let store = StateStore::new(dir.path().join("smb-zfs.state"));
        Self {
            host: FakeHost::with_pools(&["tank", "bulk"]),
            log: TestLog::default(),
            store,
            dir,
        }
    }

    /// Fresh host after a successful setup on `tank` with `bulk` secondary.
    pub fn set_up() -> Self {
        let env = Self::new();
        setup(&env.ctx(&AssumeYes), &default_setup()).expect("setup");
        env
    }

    /// Context answering confirmations with `confirm`.
    pub fn ctx<'a>(&'a self, confirm: &'a dyn Confirm) -> Context<'a> {
        Context {
            store: &self.store,
            host: Host {
                datasets: &self.host,
                accounts: &self.host,
                smb_conf: &self.host,
                discovery: &self.host,
                services: &self.host,
                passwords: &self.host,
            },
            confirm,
            log: &self.log,
            dry_run: false,
        }
    }

    /// Dry-run context.
    pub fn dry_ctx<'a>(&'a self, confirm: &'a dyn Confirm) -> Context<'a> {
        Context {
            dry_run: true,
            ..self.ctx(confirm)
        }
    }

    /// The ledger; panics when absent.
    pub fn ledger(&self) -> StateDocument {
        self.store.load().expect("read ledger").expect("ledger initialized")
    }

    /// Raw ledger bytes, if the file exists.
    pub fn ledger_bytes(&self) -> Option<Vec<u8>> {
        std::fs::read(self.store.path()).ok()
    }

    /// Current `smb.conf` on the fake host.
    pub fn smb_conf(&self) -> IniDocument {
        self.host.state().smb_conf.clone().expect("smb.conf installed")
    }

    /// Number of mutating host calls so far.
    pub fn call_count(&self) -> usize {
        self.host.state().calls.len()
    }
}

/// Setup on `tank` with `bulk` as a secondary pool.
pub fn default_setup() -> SetupRequest {
    SetupRequest {
        primary_pool: "tank".to_string(),
        secondary_pools: vec!["bulk".to_string()],
        server_name: "NAS".to_string(),
        workgroup: "WORKGROUP".to_string(),
        macos_optimized: false,
        default_home_quota: None,
    }
}

/// Password used for test users.
pub fn password() -> SecretString {
    SecretString::from("s3cret!")
}
