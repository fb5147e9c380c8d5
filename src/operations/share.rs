//! Managed shares: a dataset plus its `smb.conf` section.
use chrono::Utc;

use super::validate::{self, AccessList, QuotaSetting};
use super::{
    Context, ConfirmTier, Journal, OpResult, Outcome, apply_smb_conf, current_smb_conf,
    inspect, mountpoint, not_found, require_absent,
};
use crate::error::{EntityKind, PreconditionError, ValidationError};
use crate::resources::smb_conf::share_section;
use crate::state::StateDocument;
use crate::state::document::{BUILTIN_GROUP, BUILTIN_SHARE, ROOT, ShareEntry};

const DEFAULT_PERMISSIONS: &str = "0775";

/// Parameters for [`create_share`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CreateShareRequest {
    /// Share (and `smb.conf` section) name.
    pub name: String,
    /// Dataset path relative to the pool, e.g. `shares/media`.
    pub dataset: String,
    /// Managed pool; the primary pool when `None`.
    pub pool: Option<String>,
    /// Description shown to clients.
    pub comment: String,
    /// Forced owner; `root` when `None`.
    pub owner: Option<String>,
    /// Forced group; `smb_users` when `None`.
    pub group: Option<String>,
    /// Octal mode; `0775` when `None`.
    pub permissions: Option<String>,
    /// Access expression; `@<group>` when `None`.
    pub valid_users: Option<String>,
    /// Export read-only.
    pub read_only: bool,
    /// Show in browse lists.
    pub browseable: bool,
    /// Dataset quota.
    pub quota: Option<String>,
}

impl Default for CreateShareRequest {
    fn default() -> Self {
        Self {
            name: String::new(),
            dataset: String::new(),
            pool: None,
            comment: String::new(),
            owner: None,
            group: None,
            permissions: None,
            valid_users: None,
            read_only: false,
            browseable: true,
            quota: None,
        }
    }
}

fn unknown(kind: EntityKind, name: &str, share: &str) -> ValidationError {
    ValidationError::UnknownReference {
        kind,
        name: name.to_string(),
        context: format!("share '{share}'"),
    }
}

fn check_owner(doc: &StateDocument, owner: &str, share: &str) -> OpResult<()> {
    if owner == ROOT || doc.users.contains_key(owner) {
        Ok(())
    } else {
        Err(unknown(EntityKind::User, owner, share).into())
    }
}

fn check_group(doc: &StateDocument, group: &str, share: &str) -> OpResult<()> {
    if group == ROOT || doc.groups.contains_key(group) {
        Ok(())
    } else {
        Err(unknown(EntityKind::Group, group, share).into())
    }
}

/// Parse an access expression and check every user and group against the
/// ledger.  Returns the normalised expression.
fn resolve_access(doc: &StateDocument, expression: &str, share: &str) -> OpResult<String> {
    let list = AccessList::parse(expression)?;
    if let Some(user) = list.users().find(|u| !doc.users.contains_key(*u)) {
        return Err(unknown(EntityKind::User, user, share).into());
    }
    if let Some(group) = list.groups().find(|g| !doc.groups.contains_key(*g)) {
        return Err(unknown(EntityKind::Group, group, share).into());
    }
    Ok(list.to_string())
}

/// Rewrite the share's `smb.conf` section, validate, install and reload.
fn publish(
    ctx: &Context<'_>,
    journal: &mut Journal<'_>,
    doc: &StateDocument,
    name: &str,
    entry: &ShareEntry,
) -> OpResult<()> {
    let mut conf = current_smb_conf(ctx, doc)?;
    if !conf.contains(name) && doc.shares.contains_key(name) {
        journal.warn(format!("smb.conf had no [{name}] section; it is added again"));
    }
    conf.upsert_section(share_section(name, entry));
    apply_smb_conf(ctx, journal, &conf)
}

/// Create a share backed by a new dataset.
///
/// # Errors
///
/// Fails before any host change when the name is invalid, reserved or
/// taken, the pool is not managed, or an owner, group or access entry is
/// not in the ledger.  Host failures return
/// [`SmbZfsError::External`](crate::error::SmbZfsError::External).
pub fn create_share(ctx: &Context<'_>, req: &CreateShareRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    validate::share_name(name)?;
    require_absent(doc.shares.contains_key(name), EntityKind::Share, name)?;
    validate::dataset_path(&req.dataset)?;
    let pool = req.pool.as_deref().unwrap_or_else(|| doc.primary());
    if !doc.is_managed_pool(pool) {
        return Err(PreconditionError::InvalidPool {
            pool: pool.to_string(),
            managed: doc.managed_pools(),
        }
        .into());
    }
    let dataset = format!("{pool}/{}", req.dataset);
    if let Some(by) = doc.dataset_conflict(&dataset) {
        return Err(ValidationError::InvalidValue {
            field: "dataset",
            value: dataset,
            reason: format!("overlaps {by}"),
        }
        .into());
    }

    let owner = req.owner.as_deref().unwrap_or(ROOT);
    let group = req.group.as_deref().unwrap_or(BUILTIN_GROUP);
    check_owner(&doc, owner, name)?;
    check_group(&doc, group, name)?;
    let permissions = validate::octal_mode(req.permissions.as_deref().unwrap_or(DEFAULT_PERMISSIONS))?;
    validate::single_line("comment", &req.comment)?;
    let quota = req.quota.as_deref().map(validate::quota).transpose()?;
    let valid_users = match &req.valid_users {
        Some(expression) => resolve_access(&doc, expression, name)?,
        None => format!("@{group}"),
    };

    let conf = current_smb_conf(ctx, &doc)?;
    if conf.contains(name) {
        return Err(PreconditionError::Drift {
            kind: EntityKind::Share,
            name: name.to_string(),
            detail: format!("smb.conf already has a [{name}] section"),
        }
        .into());
    }

    let mut journal = ctx.journal();
    if inspect("check dataset", ctx.host.datasets.exists(&dataset))? {
        ctx.gate(
            ConfirmTier::Proceed,
            &dataset,
            &format!("Dataset {dataset} already exists and will be shared as '{name}'."),
        )?;
        journal.warn(format!("adopted existing dataset {dataset}"));
    }

    let datasets = ctx.host.datasets;
    journal.step(format!("create dataset {dataset}"), || datasets.create(&dataset))?;
    if let Some(quota) = &quota {
        journal.step(format!("set quota {quota} on {dataset}"), || {
            datasets.set_quota(&dataset, Some(quota.as_str()))
        })?;
    }
    let mount_path = mountpoint(ctx, &dataset)?;
    journal.step(format!("set permissions on {}", mount_path.display()), || {
        datasets.set_ownership(&mount_path, owner, group, &permissions)
    })?;

    let entry = ShareEntry {
        dataset,
        mount_path,
        comment: req.comment.clone(),
        owner: owner.to_string(),
        group: group.to_string(),
        permissions,
        valid_users,
        read_only: req.read_only,
        browseable: req.browseable,
        quota,
        created: Utc::now(),
    };
    let mut conf = conf;
    conf.upsert_section(share_section(name, &entry));
    apply_smb_conf(ctx, &mut journal, &conf)?;

    journal.commit(ctx.store, |state| {
        state.shares.insert(name.to_string(), entry);
        Ok(())
    })?;
    Ok(journal.finish(format!("Share '{name}' created successfully.")))
}

/// Parameters for [`modify_share`].  `None` leaves a field unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifyShareRequest {
    /// Share name.
    pub name: String,
    /// New description.
    pub comment: Option<String>,
    /// New access expression.
    pub valid_users: Option<String>,
    /// Export read-only or read-write.
    pub read_only: Option<bool>,
    /// Show or hide in browse lists.
    pub browseable: Option<bool>,
    /// New forced owner.
    pub owner: Option<String>,
    /// New forced group.
    pub group: Option<String>,
    /// New octal mode.
    pub permissions: Option<String>,
    /// Set or clear the dataset quota.
    pub quota: Option<QuotaSetting>,
}

impl ModifyShareRequest {
    fn is_empty(&self) -> bool {
        self.comment.is_none()
            && self.valid_users.is_none()
            && self.read_only.is_none()
            && self.browseable.is_none()
            && self.owner.is_none()
            && self.group.is_none()
            && self.permissions.is_none()
            && self.quota.is_none()
    }
}

/// Change a share's settings, ownership or quota.
///
/// # Errors
///
/// Fails when the share is unknown, nothing was requested, a value is
/// malformed or unresolvable, or a host step fails.
pub fn modify_share(ctx: &Context<'_>, req: &ModifyShareRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;
    let name = req.name.as_str();

    let current = doc
        .shares
        .get(name)
        .ok_or_else(|| not_found(EntityKind::Share, name))?;
    validate::something_to_do(!req.is_empty(), "No share changes requested.")?;

    let mut entry = current.clone();
    if let Some(comment) = &req.comment {
        validate::single_line("comment", comment)?;
        entry.comment.clone_from(comment);
    }
    if let Some(owner) = &req.owner {
        check_owner(&doc, owner, name)?;
        entry.owner.clone_from(owner);
    }
    if let Some(group) = &req.group {
        check_group(&doc, group, name)?;
        entry.group.clone_from(group);
    }
    if let Some(permissions) = &req.permissions {
        entry.permissions = validate::octal_mode(permissions)?;
    }
    if let Some(expression) = &req.valid_users {
        entry.valid_users = resolve_access(&doc, expression, name)?;
    }
    if let Some(read_only) = req.read_only {
        entry.read_only = read_only;
    }
    if let Some(browseable) = req.browseable {
        entry.browseable = browseable;
    }
    if let Some(quota) = &req.quota {
        entry.quota = quota.as_option().map(String::from);
    }

    let mut journal = ctx.journal();
    if let Some(quota) = &req.quota {
        journal.step(format!("set quota {quota} on {}", entry.dataset), || {
            ctx.host.datasets.set_quota(&entry.dataset, quota.as_option())
        })?;
    }
    let ownership_changed = entry.owner != current.owner
        || entry.group != current.group
        || entry.permissions != current.permissions;
    if ownership_changed {
        journal.step(
            format!("set permissions on {}", entry.mount_path.display()),
            || {
                ctx.host.datasets.set_ownership(
                    &entry.mount_path,
                    &entry.owner,
                    &entry.group,
                    &entry.permissions,
                )
            },
        )?;
    }
    if share_section(name, &entry) != share_section(name, current) {
        publish(ctx, &mut journal, &doc, name, &entry)?;
    }

    journal.commit(ctx.store, |state| {
        state.shares.insert(name.to_string(), entry);
        Ok(())
    })?;
    Ok(journal.finish(format!("Share '{name}' modified successfully.")))
}

/// Delete a share.  The dataset is kept unless `delete_data`.
///
/// # Errors
///
/// Fails when the share is unknown or built in, the confirmation is
/// declined, or a host step fails.
pub fn delete_share(ctx: &Context<'_>, name: &str, delete_data: bool) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;

    let share = doc
        .shares
        .get(name)
        .ok_or_else(|| not_found(EntityKind::Share, name))?;
    if name == BUILTIN_SHARE {
        return Err(PreconditionError::Protected {
            kind: EntityKind::Share,
            name: name.to_string(),
            action: "delete",
        }
        .into());
    }

    let dataset = share.dataset.as_str();
    if delete_data {
        ctx.gate(
            ConfirmTier::Destroy,
            name,
            &format!(
                "This will permanently delete share '{name}' and destroy dataset {dataset} with all its data."
            ),
        )?;
    } else {
        ctx.gate(
            ConfirmTier::Proceed,
            name,
            &format!("This will delete share '{name}'. Dataset {dataset} is kept."),
        )?;
    }

    let mut journal = ctx.journal();
    let mut conf = current_smb_conf(ctx, &doc)?;
    if !conf.remove_section(name) {
        journal.warn(format!("smb.conf had no [{name}] section"));
    }
    apply_smb_conf(ctx, &mut journal, &conf)?;
    if delete_data {
        journal.step(format!("destroy dataset {dataset}"), || {
            ctx.host.datasets.destroy(dataset, true)
        })?;
    }

    journal.commit(ctx.store, |state| {
        state.shares.remove(name);
        Ok(())
    })?;
    Ok(journal.finish(format!("Share '{name}' deleted successfully.")))
}
