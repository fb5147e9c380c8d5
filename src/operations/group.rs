//! Managed groups and their memberships.
use std::collections::BTreeSet;

use chrono::Utc;

use super::validate::{self, AccessList};
use super::{Context, ConfirmTier, Journal, OpResult, Outcome, inspect, not_found, require_absent};
use crate::error::{EntityKind, PreconditionError};
use crate::state::StateDocument;
use crate::state::document::{BUILTIN_GROUP, GroupEntry};

/// Parameters for [`create_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CreateGroupRequest {
    /// Group name.
    pub name: String,
    /// Free-text description; defaults to `<name> Group`.
    pub description: Option<String>,
    /// Ledger users to add.
    pub members: Vec<String>,
}

/// Add each of `users` to `group` on the host, skipping users the ledger
/// does not manage.  Failures become warnings.  Returns the users added.
fn add_members(
    ctx: &Context<'_>,
    journal: &mut Journal<'_>,
    doc: &StateDocument,
    group: &str,
    users: &[String],
) -> BTreeSet<String> {
    let current = doc.groups.get(group).map(|g| &g.members);
    let mut added = BTreeSet::new();
    for user in users {
        if !doc.users.contains_key(user) {
            journal.warn(format!("User '{user}' not managed by this tool. Skipping."));
            continue;
        }
        if current.is_some_and(|m| m.contains(user)) || added.contains(user) {
            ctx.log
                .debug(&format!("{user} is already a member of {group}"));
            continue;
        }
        if journal.attempt(format!("add {user} to group {group}"), || {
            ctx.host.accounts.add_user_to_group(user, group)
        }) {
            added.insert(user.clone());
        }
    }
    added
}

/// Create a group, then add `members` best-effort.
///
/// # Errors
///
/// Fails when the name is invalid or taken in the ledger or on the host,
/// or `groupadd` fails.  Membership problems are warnings.
pub fn create_group(ctx: &Context<'_>, req: &CreateGroupRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    validate::account_name(EntityKind::Group, name)?;
    require_absent(doc.groups.contains_key(name), EntityKind::Group, name)?;
    if let Some(description) = &req.description {
        validate::single_line("description", description)?;
    }
    if inspect("check group", ctx.host.accounts.group_exists(name))? {
        return Err(PreconditionError::Drift {
            kind: EntityKind::Group,
            name: name.to_string(),
            detail: "an OS group with this name exists but is not managed by this tool"
                .to_string(),
        }
        .into());
    }

    let mut journal = ctx.journal();
    journal.step(format!("create group {name}"), || {
        ctx.host.accounts.create_group(name)
    })?;
    let members = add_members(ctx, &mut journal, &doc, name, &req.members);

    let entry = GroupEntry {
        description: req
            .description
            .clone()
            .unwrap_or_else(|| format!("{name} Group")),
        members,
        created: Utc::now(),
    };
    journal.commit(ctx.store, |state| {
        for member in &entry.members {
            if let Some(user) = state.users.get_mut(member) {
                user.groups.insert(name.to_string());
            }
        }
        state.groups.insert(name.to_string(), entry);
        Ok(())
    })?;
    Ok(journal.finish(format!("Group '{name}' created successfully.")))
}

/// Parameters for [`modify_group`].
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyGroupRequest {
    /// Group name.
    pub name: String,
    /// Ledger users to add.
    pub add_users: Vec<String>,
    /// Users to remove.
    pub remove_users: Vec<String>,
}

/// Add and remove members.  Each user is handled independently; problems
/// with one user become warnings and do not stop the others.
///
/// # Errors
///
/// Fails when the group is unknown, nothing was requested, or members are
/// to be removed from `smb_users`.
pub fn modify_group(ctx: &Context<'_>, req: &ModifyGroupRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    let group = doc
        .groups
        .get(name)
        .ok_or_else(|| not_found(EntityKind::Group, name))?;
    validate::something_to_do(
        !req.add_users.is_empty() || !req.remove_users.is_empty(),
        "No users to add or remove.",
    )?;
    if name == BUILTIN_GROUP && !req.remove_users.is_empty() {
        return Err(PreconditionError::Protected {
            kind: EntityKind::Group,
            name: name.to_string(),
            action: "remove users from",
        }
        .into());
    }

    let mut journal = ctx.journal();
    let added = add_members(ctx, &mut journal, &doc, name, &req.add_users);
    let mut removed = BTreeSet::new();
    for user in &req.remove_users {
        if !group.members.contains(user) {
            journal.warn(format!("User '{user}' is not a member of group '{name}'. Skipping."));
            continue;
        }
        if journal.attempt(format!("remove {user} from group {name}"), || {
            ctx.host.accounts.remove_user_from_group(user, name)
        }) {
            removed.insert(user.clone());
        }
    }

    if !added.is_empty() || !removed.is_empty() {
        journal.commit(ctx.store, |state| {
            if let Some(g) = state.groups.get_mut(name) {
                g.members.extend(added.iter().cloned());
                g.members.retain(|m| !removed.contains(m));
            }
            for user in &added {
                if let Some(u) = state.users.get_mut(user) {
                    u.groups.insert(name.to_string());
                }
            }
            for user in &removed {
                if let Some(u) = state.users.get_mut(user) {
                    u.groups.remove(name);
                }
            }
            Ok(())
        })?;
    }
    Ok(journal.finish(format!("Group '{name}' modified successfully.")))
}

/// Delete a group.  `smb_users` and groups still used by a share are
/// refused before any prompt.
///
/// # Errors
///
/// Fails when the group is unknown, protected or in use, the confirmation
/// is declined, or `groupdel` fails.
pub fn delete_group(ctx: &Context<'_>, name: &str) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;

    if !doc.groups.contains_key(name) {
        return Err(not_found(EntityKind::Group, name));
    }
    if name == BUILTIN_GROUP {
        return Err(PreconditionError::Protected {
            kind: EntityKind::Group,
            name: name.to_string(),
            action: "delete",
        }
        .into());
    }
    let referencing = doc.shares_using_group(name).next().or_else(|| {
        doc.shares
            .iter()
            .find(|(_, s)| {
                AccessList::parse(&s.valid_users).is_ok_and(|l| l.groups().any(|g| g == name))
            })
            .map(|(share, _)| share.as_str())
    });
    if let Some(share) = referencing {
        return Err(PreconditionError::InUse {
            kind: EntityKind::Group,
            name: name.to_string(),
            by: format!("share '{share}'"),
        }
        .into());
    }

    ctx.gate(
        ConfirmTier::Proceed,
        name,
        &format!("This will delete group '{name}'. Its members keep their accounts."),
    )?;

    let mut journal = ctx.journal();
    if inspect("check group", ctx.host.accounts.group_exists(name))? {
        journal.step(format!("delete group {name}"), || {
            ctx.host.accounts.delete_group(name)
        })?;
    } else {
        journal.warn(format!("OS group '{name}' was already absent"));
    }

    journal.commit(ctx.store, |state| {
        state.groups.remove(name);
        for user in state.users.values_mut() {
            user.groups.remove(name);
        }
        Ok(())
    })?;
    Ok(journal.finish(format!("Group '{name}' deleted successfully.")))
}
