//! Contracts over the host subsystems smb-zfs keeps in sync, plus the
//! implementations that shell out through an [`Executor`](crate::exec::Executor).
//!
//! Entity operations only see the traits, bundled in
//! [`Host`](crate::operations::Host), so tests can substitute in-memory fakes.
pub mod account;
pub mod avahi;
pub mod dataset;
pub mod error;
pub mod fs;
pub mod service;
pub mod smb_conf;
pub mod smb_passwd;

use std::fmt;
use std::path::{Path, PathBuf};

use secrecy::SecretString;

use crate::config::ini::IniDocument;
use error::ResourceError;

pub use service::Service;

/// Result alias for adapter calls.
pub type ResourceResult<T> = Result<T, ResourceError>;

/// ZFS pools and datasets.
pub trait DatasetManager: fmt::Debug {
    /// Whether `pool` is imported.
    ///
    /// # Errors
    ///
    /// Returns an error if the pool list cannot be read.
    fn pool_exists(&self, pool: &str) -> ResourceResult<bool>;

    /// Names of all imported pools.
    ///
    /// # Errors
    ///
    /// Returns an error if `zpool` fails.
    fn list_pools(&self) -> ResourceResult<Vec<String>>;

    /// Whether `dataset` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if `zfs` cannot be run.
    fn exists(&self, dataset: &str) -> ResourceResult<bool>;

    /// Create `dataset` and any missing parents.  Succeeds if it exists.
    ///
    /// # Errors
    ///
    /// Returns an error if creation fails.
    fn create(&self, dataset: &str) -> ResourceResult<()>;

    /// Destroy `dataset`, with its children when `recursive`.
    ///
    /// # Errors
    ///
    /// Returns an error if destruction fails.
    fn destroy(&self, dataset: &str, recursive: bool) -> ResourceResult<()>;

    /// Mountpoint of `dataset`.
    ///
    /// # Errors
    ///
    /// Returns an error if the property cannot be read.
    fn mountpoint(&self, dataset: &str) -> ResourceResult<PathBuf>;

    /// Set the quota, or clear it with `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if `zfs set` fails.
    fn set_quota(&self, dataset: &str, quota: Option<&str>) -> ResourceResult<()>;

    /// Current quota, `None` when unset.
    ///
    /// # Errors
    ///
    /// Returns an error if the property cannot be read.
    fn quota(&self, dataset: &str) -> ResourceResult<Option<String>>;

    /// Apply owner, group and octal `mode` to `path`.
    ///
    /// # Errors
    ///
    /// Returns an error if `chown` or `chmod` fails.
    fn set_ownership(&self, path: &Path, owner: &str, group: &str, mode: &str)
    -> ResourceResult<()>;
}

/// OS users and groups.
pub trait AccountManager: fmt::Debug {
    /// Whether an OS user named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the account database cannot be queried.
    fn user_exists(&self, name: &str) -> ResourceResult<bool>;

    /// Create a user with `home` as home directory (not created) and a
    /// login shell when `shell_access`.
    ///
    /// # Errors
    ///
    /// Returns an error if `useradd` fails.
    fn create_user(&self, name: &str, shell_access: bool, home: &Path) -> ResourceResult<()>;

    /// Switch between the login shell and nologin.
    ///
    /// # Errors
    ///
    /// Returns an error if `usermod` fails.
    fn set_login_shell(&self, name: &str, shell_access: bool) -> ResourceResult<()>;

    /// Delete the user (home directory left alone).
    ///
    /// # Errors
    ///
    /// Returns an error if `userdel` fails.
    fn delete_user(&self, name: &str) -> ResourceResult<()>;

    /// Set the unix password.
    ///
    /// # Errors
    ///
    /// Returns an error if `chpasswd` fails.
    fn set_unix_password(&self, name: &str, password: &SecretString) -> ResourceResult<()>;

    /// Whether an OS group named `name` exists.
    ///
    /// # Errors
    ///
    /// Returns an error if the account database cannot be queried.
    fn group_exists(&self, name: &str) -> ResourceResult<bool>;

    /// Create a group.
    ///
    /// # Errors
    ///
    /// Returns an error if `groupadd` fails.
    fn create_group(&self, name: &str) -> ResourceResult<()>;

    /// Delete a group.
    ///
    /// # Errors
    ///
    /// Returns an error if `groupdel` fails.
    fn delete_group(&self, name: &str) -> ResourceResult<()>;

    /// Add `user` to supplementary `group`.
    ///
    /// # Errors
    ///
    /// Returns an error if `usermod` fails.
    fn add_user_to_group(&self, user: &str, group: &str) -> ResourceResult<()>;

    /// Remove `user` from supplementary `group`.
    ///
    /// # Errors
    ///
    /// Returns an error if `gpasswd` fails.
    fn remove_user_from_group(&self, user: &str, group: &str) -> ResourceResult<()>;
}

/// The Samba configuration file.
pub trait ShareConfigWriter: fmt::Debug {
    /// Parse the installed configuration, `None` if absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    fn read_current(&self) -> ResourceResult<Option<IniDocument>>;

    /// Check a candidate with the Samba validator without installing it.
    ///
    /// # Errors
    ///
    /// Returns [`ResourceError::ConfigRejected`] if the validator rejects it.
    fn validate(&self, doc: &IniDocument) -> ResourceResult<()>;

    /// Back up the live file, then atomically replace it with `doc`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backup or the write fails.
    fn install(&self, doc: &IniDocument) -> ResourceResult<()>;

    /// Copy the live file to its backup location.
    ///
    /// # Errors
    ///
    /// Returns an error if the copy fails.
    fn backup(&self) -> ResourceResult<()>;

    /// Put the backup back in place of the live file.
    ///
    /// # Errors
    ///
    /// Returns an error if there is no backup or the copy fails.
    fn restore_backup(&self) -> ResourceResult<()>;

    /// Delete the live file.  Succeeds if already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be deleted.
    fn remove(&self) -> ResourceResult<()>;
}

/// The mDNS service advertisement.
pub trait DiscoveryConfigWriter: fmt::Debug {
    /// Write the service file.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be written.
    fn install(&self) -> ResourceResult<()>;

    /// Delete the service file.  Succeeds if already absent.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be deleted.
    fn remove(&self) -> ResourceResult<()>;
}

/// System service manager.
pub trait ServiceController: fmt::Debug {
    /// Ask the service to reload its configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the reload fails.
    fn reload(&self, service: Service) -> ResourceResult<()>;

    /// Restart the service.
    ///
    /// # Errors
    ///
    /// Returns an error if the restart fails.
    fn restart(&self, service: Service) -> ResourceResult<()>;

    /// Enable the service at boot.
    ///
    /// # Errors
    ///
    /// Returns an error if enabling fails.
    fn enable(&self, service: Service) -> ResourceResult<()>;

    /// Disable the service.  Absent units are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the service manager cannot be run.
    fn disable(&self, service: Service) -> ResourceResult<()>;

    /// Stop the service.  Absent or stopped units are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the service manager cannot be run.
    fn stop(&self, service: Service) -> ResourceResult<()>;
}

/// Samba's own password database.
pub trait SharePasswordStore: fmt::Debug {
    /// Whether `user` has a Samba credential.
    ///
    /// # Errors
    ///
    /// Returns an error if the database cannot be queried.
    fn exists(&self, user: &str) -> ResourceResult<bool>;

    /// Create or replace the Samba credential.
    ///
    /// # Errors
    ///
    /// Returns an error if `smbpasswd` fails.
    fn set_share_password(&self, user: &str, password: &SecretString) -> ResourceResult<()>;

    /// Enable the Samba credential.
    ///
    /// # Errors
    ///
    /// Returns an error if `smbpasswd` fails.
    fn enable_share_password(&self, user: &str) -> ResourceResult<()>;

    /// Delete the Samba credential.
    ///
    /// # Errors
    ///
    /// Returns an error if `smbpasswd` fails.
    fn remove_share_password(&self, user: &str) -> ResourceResult<()>;
}
