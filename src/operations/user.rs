//! Managed users: OS account, home dataset, Samba credential and group
//! memberships.
use std::collections::BTreeSet;

use chrono::Utc;
use secrecy::SecretString;

use super::validate::{self, QuotaSetting};
use super::{
    Context, ConfirmTier, OpResult, Outcome, inspect, mountpoint, not_found, require_absent,
};
use crate::error::{EntityKind, PreconditionError, ValidationError};
use crate::state::StateDocument;
use crate::state::document::{BUILTIN_GROUP, UserEntry};

const HOME_MODE: &str = "0700";

/// Parameters for [`create_user`].
#[derive(Debug)]
pub struct CreateUserRequest {
    /// Account name.
    pub name: String,
    /// Samba password, also the unix password with shell access.
    pub password: SecretString,
    /// Give the account a login shell.
    pub shell_access: bool,
    /// Ledger groups to join besides `smb_users`.
    pub groups: Vec<String>,
}

/// Resolve `groups` against the ledger.  `smb_users` is implied and
/// dropped from the result.
fn resolve_groups(
    doc: &StateDocument,
    groups: &[String],
    user: &str,
) -> OpResult<BTreeSet<String>> {
    let mut resolved = BTreeSet::new();
    for group in groups {
        validate::account_name(EntityKind::Group, group)?;
        if !doc.groups.contains_key(group) {
            return Err(ValidationError::UnknownReference {
                kind: EntityKind::Group,
                name: group.clone(),
                context: format!("user '{user}'"),
            }
            .into());
        }
        if group != BUILTIN_GROUP {
            resolved.insert(group.clone());
        }
    }
    Ok(resolved)
}

/// Create a user with a home dataset on the primary pool.
///
/// # Errors
///
/// Fails before any host change when the name is invalid or taken, or a
/// requested group is not in the ledger.  A failed host step returns
/// [`SmbZfsError::External`](crate::error::SmbZfsError::External) listing
/// what was already applied.
pub fn create_user(ctx: &Context<'_>, req: &CreateUserRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    validate::account_name(EntityKind::User, name)?;
    require_absent(doc.users.contains_key(name), EntityKind::User, name)?;
    require_absent(doc.groups.contains_key(name), EntityKind::Group, name)?;
    let groups = resolve_groups(&doc, &req.groups, name)?;
    if inspect("check user", ctx.host.accounts.user_exists(name))? {
        return Err(PreconditionError::Drift {
            kind: EntityKind::User,
            name: name.to_string(),
            detail: "an OS account with this name exists but is not managed by this tool"
                .to_string(),
        }
        .into());
    }

    let home = format!("{}/homes/{name}", doc.primary());
    let mut journal = ctx.journal();
    if inspect("check dataset", ctx.host.datasets.exists(&home))? {
        ctx.gate(
            ConfirmTier::Proceed,
            &home,
            &format!("Dataset {home} already exists and will become the home of '{name}'."),
        )?;
        journal.warn(format!("adopted existing dataset {home}"));
    }

    let datasets = ctx.host.datasets;
    let accounts = ctx.host.accounts;
    let passwords = ctx.host.passwords;

    journal.step(format!("create dataset {home}"), || datasets.create(&home))?;
    if let Some(quota) = &doc.default_home_quota {
        journal.step(format!("set quota {quota} on {home}"), || {
            datasets.set_quota(&home, Some(quota.as_str()))
        })?;
    }
    let home_path = mountpoint(ctx, &home)?;
    journal.step(format!("create OS user {name}"), || {
        accounts.create_user(name, req.shell_access, &home_path)
    })?;
    journal.step(format!("set permissions on {}", home_path.display()), || {
        datasets.set_ownership(&home_path, name, name, HOME_MODE)
    })?;
    if req.shell_access {
        journal.step(format!("set unix password for {name}"), || {
            accounts.set_unix_password(name, &req.password)
        })?;
    }
    journal.step(format!("set Samba password for {name}"), || {
        passwords.set_share_password(name, &req.password)
    })?;
    journal.step(format!("enable Samba account {name}"), || {
        passwords.enable_share_password(name)
    })?;
    for group in std::iter::once(BUILTIN_GROUP).chain(groups.iter().map(String::as_str)) {
        journal.step(format!("add {name} to group {group}"), || {
            accounts.add_user_to_group(name, group)
        })?;
    }

    let entry = UserEntry {
        shell_access: req.shell_access,
        home_dataset: home,
        home_mountpoint: home_path,
        groups: std::iter::once(BUILTIN_GROUP.to_string())
            .chain(groups)
            .collect(),
        quota: doc.default_home_quota.clone(),
        created: Utc::now(),
    };
    journal.commit(ctx.store, |state| {
        for group in &entry.groups {
            if let Some(g) = state.groups.get_mut(group) {
                g.members.insert(name.to_string());
            }
        }
        state.users.insert(name.to_string(), entry);
        Ok(())
    })?;
    Ok(journal.finish(format!("User '{name}' created successfully.")))
}

/// Parameters for [`modify_user`].
#[derive(Debug, Default)]
pub struct ModifyUserRequest {
    /// Account name.
    pub name: String,
    /// Grant or revoke the login shell.
    pub shell_access: Option<bool>,
    /// Unix password to set when granting the login shell.
    pub password: Option<SecretString>,
    /// Ledger groups to join.
    pub add_groups: Vec<String>,
    /// Groups to leave; `smb_users` cannot be left.
    pub remove_groups: Vec<String>,
}

/// Change shell access and group memberships of a managed user.
///
/// # Errors
///
/// Fails when the user is unknown, nothing was requested, a group to join
/// is not in the ledger, `smb_users` is to be left, or a host step fails.
pub fn modify_user(ctx: &Context<'_>, req: &ModifyUserRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    let user = doc
        .users
        .get(name)
        .ok_or_else(|| not_found(EntityKind::User, name))?;
    validate::something_to_do(
        req.shell_access.is_some() || !req.add_groups.is_empty() || !req.remove_groups.is_empty(),
        "No user changes requested.",
    )?;
    let add = resolve_groups(&doc, &req.add_groups, name)?;
    if req.remove_groups.iter().any(|g| g == BUILTIN_GROUP) {
        return Err(PreconditionError::Protected {
            kind: EntityKind::Group,
            name: BUILTIN_GROUP.to_string(),
            action: "remove users from",
        }
        .into());
    }

    let accounts = ctx.host.accounts;
    let mut journal = ctx.journal();

    if let Some(shell) = req.shell_access {
        if shell == user.shell_access {
            journal.warn(format!(
                "shell access for '{name}' is already {}",
                if shell { "enabled" } else { "disabled" }
            ));
        } else {
            journal.step(
                format!("{} login shell for {name}", if shell { "enable" } else { "disable" }),
                || accounts.set_login_shell(name, shell),
            )?;
        }
        if shell && let Some(password) = &req.password {
            journal.step(format!("set unix password for {name}"), || {
                accounts.set_unix_password(name, password)
            })?;
        }
    }

    let mut joined = Vec::new();
    for group in add.iter().filter(|g| !user.groups.contains(*g)) {
        journal.step(format!("add {name} to group {group}"), || {
            accounts.add_user_to_group(name, group)
        })?;
        joined.push(group.clone());
    }
    let mut left = Vec::new();
    for group in &req.remove_groups {
        if !user.groups.contains(group) {
            journal.warn(format!("user '{name}' is not a member of group '{group}'"));
            continue;
        }
        journal.step(format!("remove {name} from group {group}"), || {
            accounts.remove_user_from_group(name, group)
        })?;
        left.push(group.clone());
    }

    let shell_access = req.shell_access;
    journal.commit(ctx.store, |state| {
        for group in &joined {
            if let Some(g) = state.groups.get_mut(group) {
                g.members.insert(name.to_string());
            }
        }
        for group in &left {
            if let Some(g) = state.groups.get_mut(group) {
                g.members.remove(name);
            }
        }
        if let Some(entry) = state.users.get_mut(name) {
            if let Some(shell) = shell_access {
                entry.shell_access = shell;
            }
            entry.groups.extend(joined.iter().cloned());
            entry.groups.retain(|g| !left.contains(g));
        }
        Ok(())
    })?;
    Ok(journal.finish(format!("User '{name}' modified successfully.")))
}

/// Set or clear the quota of a user's home dataset.
///
/// # Errors
///
/// Fails when the user is unknown or `zfs set` fails.
pub fn modify_home(ctx: &Context<'_>, name: &str, quota: &QuotaSetting) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let user = doc
        .users
        .get(name)
        .ok_or_else(|| not_found(EntityKind::User, name))?;

    let dataset = user.home_dataset.clone();
    let mut journal = ctx.journal();
    journal.step(format!("set quota {quota} on {dataset}"), || {
        ctx.host.datasets.set_quota(&dataset, quota.as_option())
    })?;
    journal.commit(ctx.store, |state| {
        if let Some(entry) = state.users.get_mut(name) {
            entry.quota = quota.as_option().map(String::from);
        }
        Ok(())
    })?;
    Ok(journal.finish(format!(
        "Quota for user '{name}' has been set to {quota}."
    )))
}

/// Delete a managed user.  The home dataset is kept unless `delete_data`.
///
/// # Errors
///
/// Fails when the user is unknown, still owns a share, the confirmation is
/// declined, or a host step fails.
pub fn delete_user(ctx: &Context<'_>, name: &str, delete_data: bool) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let user = doc
        .users
        .get(name)
        .ok_or_else(|| not_found(EntityKind::User, name))?;
    if let Some(share) = doc.shares_owned_by(name).next() {
        return Err(PreconditionError::InUse {
            kind: EntityKind::User,
            name: name.to_string(),
            by: format!("share '{share}'"),
        }
        .into());
    }

    let home = user.home_dataset.as_str();
    if delete_data {
        ctx.gate(
            ConfirmTier::Destroy,
            name,
            &format!(
                "This will permanently delete user '{name}' and destroy dataset {home} with all its data."
            ),
        )?;
    } else {
        ctx.gate(
            ConfirmTier::Proceed,
            name,
            &format!("This will delete user '{name}'. Dataset {home} is kept."),
        )?;
    }

    let mut journal = ctx.journal();
    if inspect("check Samba account", ctx.host.passwords.exists(name))? {
        journal.step(format!("remove Samba account {name}"), || {
            ctx.host.passwords.remove_share_password(name)
        })?;
    } else {
        journal.warn(format!("Samba account '{name}' was already absent"));
    }
    if inspect("check user", ctx.host.accounts.user_exists(name))? {
        journal.step(format!("delete OS user {name}"), || {
            ctx.host.accounts.delete_user(name)
        })?;
    } else {
        journal.warn(format!("OS user '{name}' was already absent"));
    }
    if delete_data {
        journal.step(format!("destroy dataset {home}"), || {
            ctx.host.datasets.destroy(home, true)
        })?;
    }

    journal.commit(ctx.store, |state| {
        state.users.remove(name);
        for group in state.groups.values_mut() {
            group.members.remove(name);
        }
        Ok(())
    })?;
    Ok(journal.finish(format!("User '{name}' deleted successfully.")))
}
