//! OS user and group adapter.
use std::path::Path;

use secrecy::{ExposeSecret as _, SecretString};

use super::{AccountManager, ResourceResult};
use crate::exec::Executor;

/// Default shell for users with shell access.
pub const DEFAULT_LOGIN_SHELL: &str = "/bin/bash";

/// Default shell for share-only users.
pub const DEFAULT_NOLOGIN_SHELL: &str = "/usr/sbin/nologin";

/// [`AccountManager`] backed by `getent` and the shadow-utils tools.
#[derive(Debug)]
pub struct SystemAccounts<'a> {
    executor: &'a dyn Executor,
    login_shell: String,
    nologin_shell: String,
}

impl<'a> SystemAccounts<'a> {
    /// Create an adapter using the given login and nologin shells.
    #[must_use]
    pub fn new(
        executor: &'a dyn Executor,
        login_shell: impl Into<String>,
        nologin_shell: impl Into<String>,
    ) -> Self {
        Self {
            executor,
            login_shell: login_shell.into(),
            nologin_shell: nologin_shell.into(),
        }
    }

    fn shell(&self, shell_access: bool) -> &str {
        if shell_access {
            &self.login_shell
        } else {
            &self.nologin_shell
        }
    }

    fn getent(&self, database: &str, name: &str) -> ResourceResult<bool> {
        Ok(self
            .executor
            .run_unchecked("getent", &[database, name])?
            .success)
    }
}

impl AccountManager for SystemAccounts<'_> {
    fn user_exists(&self, name: &str) -> ResourceResult<bool> {
        self.getent("passwd", name)
    }

    fn create_user(&self, name: &str, shell_access: bool, home: &Path) -> ResourceResult<()> {
        let home = home.to_string_lossy();
        self.executor.run(
            "useradd",
            &["-d", &home, "-M", "-s", self.shell(shell_access), name],
        )?;
        Ok(())
    }

    fn set_login_shell(&self, name: &str, shell_access: bool) -> ResourceResult<()> {
        self.executor
            .run("usermod", &["-s", self.shell(shell_access), name])?;
        Ok(())
    }

    fn delete_user(&self, name: &str) -> ResourceResult<()> {
        self.executor.run("userdel", &[name])?;
        Ok(())
    }

    fn set_unix_password(&self, name: &str, password: &SecretString) -> ResourceResult<()> {
        let line = format!("{name}:{}", password.expose_secret());
        self.executor.run_with_input("chpasswd", &[], &line)?;
        Ok(())
    }

    fn group_exists(&self, name: &str) -> ResourceResult<bool> {
        self.getent("group", name)
    }

    fn create_group(&self, name: &str) -> ResourceResult<()> {
        self.executor.run("groupadd", &[name])?;
        Ok(())
    }

    fn delete_group(&self, name: &str) -> ResourceResult<()> {
        self.executor.run("groupdel", &[name])?;
        Ok(())
    }

    fn add_user_to_group(&self, user: &str, group: &str) -> ResourceResult<()> {
        self.executor.run("usermod", &["-a", "-G", group, user])?;
        Ok(())
    }

    fn remove_user_from_group(&self, user: &str, group: &str) -> ResourceResult<()> {
        self.executor.run("gpasswd", &["-d", user, group])?;
        Ok(())
    }
}
