//! Samba password database adapter.
use secrecy::{ExposeSecret as _, SecretString};

use super::{ResourceResult, SharePasswordStore};
use crate::exec::Executor;

/// [`SharePasswordStore`] backed by `smbpasswd` and `pdbedit`.
#[derive(Debug)]
pub struct SambaPasswords<'a> {
    executor: &'a dyn Executor,
}

impl<'a> SambaPasswords<'a> {
    /// Create an adapter that runs commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }
}

impl SharePasswordStore for SambaPasswords<'_> {
    fn exists(&self, user: &str) -> ResourceResult<bool> {
        Ok(self
            .executor
            .run_unchecked("pdbedit", &["-L", "-u", user])?
            .success)
    }

    fn set_share_password(&self, user: &str, password: &SecretString) -> ResourceResult<()> {
        let secret = password.expose_secret();
        let input = format!("{secret}\n{secret}\n");
        // -a creates the entry or replaces the password of an existing one
        self.executor
            .run_with_input("smbpasswd", &["-a", "-s", user], &input)?;
        Ok(())
    }

    fn enable_share_password(&self, user: &str) -> ResourceResult<()> {
        self.executor.run("smbpasswd", &["-e", user])?;
        Ok(())
    }

    fn remove_share_password(&self, user: &str) -> ResourceResult<()> {
        self.executor.run("smbpasswd", &["-x", user])?;
        Ok(())
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::resources::test_helpers::MockExecutor;

    #[test]
    fn exists_follows_pdbedit_status() {
        let executor = MockExecutor::with_responses(vec![
            (true, "alice:1000:\n".to_string()),
            (false, String::new()),
        ]);
        let store = SambaPasswords::new(&executor);
        assert!(store.exists("alice").unwrap());
        assert!(!store.exists("bob").unwrap());
    }

    #[test]
    fn password_is_sent_twice_on_stdin_only() {
        let executor = MockExecutor::succeeding(1);
        SambaPasswords::new(&executor)
            .set_share_password("alice", &SecretString::from("pw"))
            .unwrap();
        assert_eq!(executor.calls(), ["smbpasswd -a -s alice"]);
        assert_eq!(executor.inputs(), ["pw\npw\n"]);
    }

    #[test]
    fn enable_and_remove() {
        let executor = MockExecutor::succeeding(2);
        let store = SambaPasswords::new(&executor);
        store.enable_share_password("alice").unwrap();
        store.remove_share_password("alice").unwrap();
        assert_eq!(executor.calls(), ["smbpasswd -e alice", "smbpasswd -x alice"]);
    }
}
