//! Interactive prompts on the controlling terminal.
use std::io::{self, BufRead, Write};

use anyhow::{Context as _, Result, bail};
use secrecy::{ExposeSecret as _, SecretString};

use crate::operations::Confirm;

/// [`Confirm`] that shows the prompt on stderr and reads one line.
///
/// Prompts go to stderr so `--json` output on stdout stays parseable.
#[derive(Debug)]
pub struct TerminalConfirm<R> {
    input: std::sync::Mutex<R>,
}

impl TerminalConfirm<io::StdinLock<'static>> {
    /// Read answers from standard input.
    #[must_use]
    pub fn stdin() -> Self {
        Self::new(io::stdin().lock())
    }
}

impl<R: BufRead> TerminalConfirm<R> {
    /// Read answers from `input`.
    pub const fn new(input: R) -> Self {
        Self {
            input: std::sync::Mutex::new(input),
        }
    }
}

impl<R: BufRead> Confirm for TerminalConfirm<R> {
    fn confirm(&self, message: &str, phrase: &str) -> Option<String> {
        let mut stderr = io::stderr().lock();
        writeln!(stderr, "\n\x1b[1;33m{message}\x1b[0m").ok()?;
        write!(stderr, "Type '{phrase}' to continue: ").ok()?;
        stderr.flush().ok()?;

        let mut answer = String::new();
        let read = self.input.lock().ok()?.read_line(&mut answer).ok()?;
        // EOF means no answer
        (read > 0).then_some(answer)
    }
}

/// Prompt twice for a new password without echo.
///
/// # Errors
///
/// Returns an error if the terminal cannot be read, the password is empty,
/// or the two entries differ.
pub fn new_password(user: &str) -> Result<SecretString> {
    let first = SecretString::from(
        rpassword::prompt_password(format!("New password for '{user}': "))
            .context("failed to read password")?,
    );
    let second = SecretString::from(
        rpassword::prompt_password("Retype password: ").context("failed to read password")?,
    );
    check_entries(&first, &second)?;
    Ok(first)
}

fn check_entries(first: &SecretString, second: &SecretString) -> Result<()> {
    if first.expose_secret().is_empty() {
        bail!("password must not be empty");
    }
    if first.expose_secret() != second.expose_secret() {
        bail!("passwords do not match");
    }
    Ok(())
}

/// Use `given` when present, otherwise prompt.
///
/// # Errors
///
/// Returns an error if prompting fails or `given` is empty.
pub fn password_or_prompt(given: Option<&str>, user: &str) -> Result<SecretString> {
    match given {
        Some("") => bail!("password must not be empty"),
        Some(password) => Ok(SecretString::from(password.to_string())),
        None => new_password(user),
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn answer_is_returned_verbatim() {
        let confirm = TerminalConfirm::new(io::Cursor::new("destroy alice\n"));
        assert_eq!(
            confirm.confirm("Delete?", "destroy alice").as_deref(),
            Some("destroy alice\n")
        );
    }

    #[test]
    fn eof_is_no_answer() {
        let confirm = TerminalConfirm::new(io::Cursor::new(""));
        assert_eq!(confirm.confirm("Delete?", "yes"), None);
    }

    #[test]
    fn entries_must_match() {
        let a = SecretString::from("one");
        let b = SecretString::from("two");
        assert!(check_entries(&a, &b).is_err());
        assert!(check_entries(&a, &SecretString::from("one")).is_ok());
        assert!(check_entries(&SecretString::from(""), &SecretString::from("")).is_err());
    }

    #[test]
    fn given_password_skips_prompt() {
        let secret = password_or_prompt(Some("pw"), "alice").unwrap();
        assert_eq!(secret.expose_secret(), "pw");
        assert!(password_or_prompt(Some(""), "alice").is_err());
    }
}
