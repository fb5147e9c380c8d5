//! The persisted ledger document and its invariants.
use std::collections::{BTreeMap, BTreeSet};
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::StateError;

/// Schema tag written into every document.
pub const SCHEMA_VERSION: u32 = 1;

/// Group every managed user belongs to.
pub const BUILTIN_GROUP: &str = "smb_users";

/// Share created by setup on the primary pool.
pub const BUILTIN_SHARE: &str = "shared";

/// Owner/group accepted on shares without a ledger entry.
pub const ROOT: &str = "root";

/// Longest user or group name accepted by the account tools.
pub const MAX_ACCOUNT_NAME_LEN: usize = 32;

/// Whether `name` matches `^[A-Za-z0-9._-]+$`.
///
/// # Examples
///
/// ```
/// use smb_zfs::state::document::is_valid_identifier;
///
/// assert!(is_valid_identifier("alice.smith-2"));
/// assert!(!is_valid_identifier("bad name"));
/// assert!(!is_valid_identifier(""));
/// ```
#[must_use]
pub fn is_valid_identifier(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-'))
}

/// Pool component of a dataset path (`tank/homes/alice` → `tank`).
#[must_use]
pub fn pool_of(dataset: &str) -> &str {
    dataset.split('/').next().unwrap_or(dataset)
}

/// Whether one dataset is, contains, or lies inside the other.
///
/// Compares whole path components, so `tank/home` and `tank/homes` are
/// unrelated.
#[must_use]
pub fn datasets_overlap(a: &str, b: &str) -> bool {
    let nested = |outer: &str, inner: &str| {
        inner
            .strip_prefix(outer)
            .is_some_and(|rest| rest.starts_with('/'))
    };
    a == b || nested(a, b) || nested(b, a)
}

/// A managed user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UserEntry {
    /// Whether the OS account has a login shell.
    pub shell_access: bool,
    /// Home dataset, e.g. `tank/homes/alice`.
    pub home_dataset: String,
    /// Mountpoint of the home dataset, used as the OS home directory.
    pub home_mountpoint: PathBuf,
    /// Groups the user belongs to, `smb_users` included.
    #[serde(default)]
    pub groups: BTreeSet<String>,
    /// Quota applied to the home dataset.
    #[serde(default)]
    pub quota: Option<String>,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// A managed share.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ShareEntry {
    /// Backing dataset, e.g. `tank/shares/media`.
    pub dataset: String,
    /// Mountpoint of the dataset.
    pub mount_path: PathBuf,
    /// Free-text description rendered into `smb.conf`.
    #[serde(default)]
    pub comment: String,
    /// Forced owner of files created through the share.
    pub owner: String,
    /// Forced group of files created through the share.
    pub group: String,
    /// Octal mode applied to the mountpoint and used as create masks.
    pub permissions: String,
    /// Access expression (`alice, @finance`, `*`).
    pub valid_users: String,
    /// Whether the share is read-only.
    pub read_only: bool,
    /// Whether the share is listed when browsing.
    pub browseable: bool,
    /// Dataset quota.
    #[serde(default)]
    pub quota: Option<String>,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// A managed group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GroupEntry {
    /// Free-text description.
    #[serde(default)]
    pub description: String,
    /// Member user names.
    #[serde(default)]
    pub members: BTreeSet<String>,
    /// Creation time.
    pub created: DateTime<Utc>,
}

/// The ledger: the tool's record of everything it manages.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateDocument {
    /// Schema tag.
    pub version: u32,
    /// Set by setup; gates every other operation.
    pub initialized: bool,
    /// Pool holding `homes` and the built-in share.
    #[serde(default)]
    pub primary_pool: Option<String>,
    /// Additional pools shares may live on.
    #[serde(default)]
    pub secondary_pools: Vec<String>,
    /// NetBIOS name.
    #[serde(default)]
    pub server_name: Option<String>,
    /// Samba workgroup.
    #[serde(default)]
    pub workgroup: Option<String>,
    /// Whether the `fruit` extensions are enabled.
    #[serde(default)]
    pub macos_optimized: bool,
    /// Quota applied to newly created home datasets.
    #[serde(default)]
    pub default_home_quota: Option<String>,
    /// Managed users by name.
    #[serde(default)]
    pub users: BTreeMap<String, UserEntry>,
    /// Managed shares by name.
    #[serde(default)]
    pub shares: BTreeMap<String, ShareEntry>,
    /// Managed groups by name.
    #[serde(default)]
    pub groups: BTreeMap<String, GroupEntry>,
}

impl Default for StateDocument {
    fn default() -> Self {
        Self {
            version: SCHEMA_VERSION,
            initialized: false,
            primary_pool: None,
            secondary_pools: Vec::new(),
            server_name: None,
            workgroup: None,
            macos_optimized: false,
            default_home_quota: None,
            users: BTreeMap::new(),
            shares: BTreeMap::new(),
            groups: BTreeMap::new(),
        }
    }
}

impl StateDocument {
    /// Primary pool, or an empty string before setup.
    #[must_use]
    pub fn primary(&self) -> &str {
        self.primary_pool.as_deref().unwrap_or_default()
    }

    /// Parent dataset of every home, `<primary>/homes`.
    #[must_use]
    pub fn homes_root(&self) -> String {
        format!("{}/homes", self.primary())
    }

    /// The managed dataset `dataset` would collide with: a share's, a
    /// user's home, or the homes root.  Nesting in either direction counts.
    #[must_use]
    pub fn dataset_conflict(&self, dataset: &str) -> Option<String> {
        let share = self
            .shares
            .iter()
            .find(|(_, s)| datasets_overlap(&s.dataset, dataset))
            .map(|(n, s)| format!("{} of share '{n}'", s.dataset));
        let home = || {
            self.users
                .iter()
                .find(|(_, u)| datasets_overlap(&u.home_dataset, dataset))
                .map(|(n, u)| format!("{}, the home of user '{n}'", u.home_dataset))
        };
        let root = || {
            let root = self.homes_root();
            datasets_overlap(&root, dataset).then(|| format!("{root}, the parent of all homes"))
        };
        share.or_else(home).or_else(root)
    }

    /// Primary pool followed by secondary pools.
    #[must_use]
    pub fn managed_pools(&self) -> Vec<String> {
        self.primary_pool
            .iter()
            .chain(self.secondary_pools.iter())
            .cloned()
            .collect()
    }

    /// Whether `pool` is the primary or a secondary pool.
    #[must_use]
    pub fn is_managed_pool(&self, pool: &str) -> bool {
        self.primary_pool.as_deref() == Some(pool) || self.secondary_pools.iter().any(|p| p == pool)
    }

    /// Shares whose forced owner is `user`.
    pub fn shares_owned_by<'a>(&'a self, user: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.shares
            .iter()
            .filter(move |(_, s)| s.owner == user)
            .map(|(name, _)| name.as_str())
    }

    /// Shares whose forced group is `group`.
    pub fn shares_using_group<'a>(
        &'a self,
        group: &'a str,
    ) -> impl Iterator<Item = &'a str> + 'a {
        self.shares
            .iter()
            .filter(move |(_, s)| s.group == group)
            .map(|(name, _)| name.as_str())
    }

    /// Check every ledger invariant.
    ///
    /// # Errors
    ///
    /// Returns [`StateError::Invariant`] describing the first violation.
    pub fn validate(&self) -> Result<(), StateError> {
        if self.version != SCHEMA_VERSION {
            return invariant(format!("unsupported schema version {}", self.version));
        }

        for name in self.users.keys().chain(self.groups.keys()) {
            if !is_valid_identifier(name) || name.len() > MAX_ACCOUNT_NAME_LEN {
                return invariant(format!("invalid account name '{name}'"));
            }
        }
        for name in self.shares.keys() {
            if !is_valid_identifier(name) {
                return invariant(format!("invalid share name '{name}'"));
            }
        }

        if !self.initialized {
            if self.users.is_empty() && self.shares.is_empty() && self.groups.is_empty() {
                return Ok(());
            }
            return invariant("uninitialized ledger must not contain entities".to_string());
        }

        if self.primary_pool.is_none() {
            return invariant("initialized ledger has no primary pool".to_string());
        }
        if !self.groups.contains_key(BUILTIN_GROUP) {
            return invariant(format!("built-in group '{BUILTIN_GROUP}' is missing"));
        }
        if !self.shares.contains_key(BUILTIN_SHARE) {
            return invariant(format!("built-in share '{BUILTIN_SHARE}' is missing"));
        }

        for (user, entry) in &self.users {
            if !self.is_managed_pool(pool_of(&entry.home_dataset)) {
                return invariant(format!(
                    "home dataset '{}' of user '{user}' is not on a managed pool",
                    entry.home_dataset
                ));
            }
            for group in &entry.groups {
                let Some(g) = self.groups.get(group) else {
                    return invariant(format!("user '{user}' lists unknown group '{group}'"));
                };
                if !g.members.contains(user) {
                    return invariant(format!(
                        "user '{user}' lists group '{group}' which does not list the user"
                    ));
                }
            }
        }

        for (group, entry) in &self.groups {
            for member in &entry.members {
                let Some(u) = self.users.get(member) else {
                    return invariant(format!("group '{group}' lists unknown user '{member}'"));
                };
                if !u.groups.contains(group) {
                    return invariant(format!(
                        "group '{group}' lists user '{member}' who does not list the group"
                    ));
                }
            }
        }

        for (share, entry) in &self.shares {
            if entry.owner != ROOT && !self.users.contains_key(&entry.owner) {
                return invariant(format!(
                    "share '{share}' is owned by unknown user '{}'",
                    entry.owner
                ));
            }
            if entry.group != ROOT && !self.groups.contains_key(&entry.group) {
                return invariant(format!(
                    "share '{share}' uses unknown group '{}'",
                    entry.group
                ));
            }
            if !self.is_managed_pool(pool_of(&entry.dataset)) {
                return invariant(format!(
                    "dataset '{}' of share '{share}' is not on a managed pool",
                    entry.dataset
                ));
            }
        }

        Ok(())
    }
}

fn invariant(reason: String) -> Result<(), StateError> {
    Err(StateError::Invariant(reason))
}
