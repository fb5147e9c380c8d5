//! Password changes for managed users.
use secrecy::SecretString;

use super::{Context, OpResult, Outcome, not_found};
use crate::error::{EntityKind, PreconditionError};

/// The account running the tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Caller {
    /// Effective user id.
    pub uid: u32,
    /// Effective login name.
    pub name: String,
    /// The account that invoked `sudo`, when the tool runs through it.
    pub sudo_user: Option<String>,
}

impl Caller {
    /// Whether the caller runs as the superuser.
    #[must_use]
    pub const fn is_operator(&self) -> bool {
        self.uid == 0
    }

    /// The person behind the request: the `sudo` invoker, else the
    /// effective user.
    #[must_use]
    pub fn requester(&self) -> &str {
        self.sudo_user.as_deref().unwrap_or(&self.name)
    }
}

/// Change a user's password.
///
/// The tool must run as root, since the ledger and both password databases
/// are root-only.  A managed user reaching it through `sudo` may change only
/// their own password; root itself, or an administrator the ledger does not
/// manage, may change any.  The unix password changes only for users with
/// shell access; the Samba password always changes.
///
/// # Errors
///
/// Fails when the caller is not root, a managed user targets someone else,
/// the user is unknown, or a host step fails.
pub fn change_password(
    ctx: &Context<'_>,
    caller: &Caller,
    name: &str,
    password: &SecretString,
) -> OpResult<Outcome> {
    if !caller.is_operator() {
        return Err(PreconditionError::Forbidden(format!(
            "changing passwords needs root (running as '{}'); use sudo",
            caller.name
        ))
        .into());
    }
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let user = doc
        .users
        .get(name)
        .ok_or_else(|| not_found(EntityKind::User, name))?;
    let requester = caller.requester();
    if requester != name && doc.users.contains_key(requester) {
        return Err(PreconditionError::Forbidden(format!(
            "'{requester}' may only change their own password"
        ))
        .into());
    }

    let mut journal = ctx.journal();
    if user.shell_access {
        journal.step(format!("set unix password for {name}"), || {
            ctx.host.accounts.set_unix_password(name, password)
        })?;
    }
    journal.step(format!("set Samba password for {name}"), || {
        ctx.host.passwords.set_share_password(name, password)
    })?;
    Ok(journal.finish(format!(
        "Password changed successfully for user '{name}'."
    )))
}
