//! One-time installation and later changes to the global settings.
use std::collections::BTreeSet;

use chrono::Utc;

use super::validate::{self, QuotaSetting};
use super::{Context, ConfirmTier, Journal, OpResult, Outcome, apply_smb_conf, inspect, mountpoint};
use crate::error::{EntityKind, PreconditionError, ValidationError};
use crate::resources::Service;
use crate::resources::smb_conf::{GlobalSettings, render_full};
use crate::state::StateDocument;
use crate::state::document::{
    BUILTIN_GROUP, BUILTIN_SHARE, GroupEntry, ROOT, SCHEMA_VERSION, ShareEntry, pool_of,
};

const HOMES_MODE: &str = "0755";
const SHARED_MODE: &str = "0775";

/// Parameters for [`setup`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SetupRequest {
    /// Pool holding `homes` and the built-in share.
    pub primary_pool: String,
    /// Additional pools shares may be created on.
    pub secondary_pools: Vec<String>,
    /// NetBIOS server name.
    pub server_name: String,
    /// Windows workgroup.
    pub workgroup: String,
    /// Enable the macOS `fruit` extensions.
    pub macos_optimized: bool,
    /// Quota applied to every new home dataset.
    pub default_home_quota: Option<String>,
}

fn validate_pools<'p>(
    ctx: &Context<'_>,
    pools: impl IntoIterator<Item = &'p String>,
) -> OpResult<()> {
    for pool in pools {
        validate::pool_name(pool)?;
        if !inspect("check pool", ctx.host.datasets.pool_exists(pool))? {
            return Err(PreconditionError::PoolMissing(pool.clone()).into());
        }
    }
    Ok(())
}

/// Install everything: datasets, the `smb_users` group, `smb.conf`, the
/// Avahi service and the services, then write the initialised ledger.
///
/// # Errors
///
/// Fails with [`PreconditionError::AlreadyInitialized`] on a set-up system,
/// [`PreconditionError::PoolMissing`] for an unknown pool, validation errors
/// for malformed names, or [`SmbZfsError::External`] listing the steps
/// already applied when a host call fails.
pub fn setup(ctx: &Context<'_>, req: &SetupRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    if ctx.store.load()?.is_some() {
        return Err(PreconditionError::AlreadyInitialized.into());
    }

    validate::netbios_name("server name", &req.server_name)?;
    validate::netbios_name("workgroup", &req.workgroup)?;
    let default_home_quota = req
        .default_home_quota
        .as_deref()
        .map(validate::quota)
        .transpose()?;
    let mut seen = BTreeSet::new();
    for pool in std::iter::once(&req.primary_pool).chain(&req.secondary_pools) {
        if !seen.insert(pool.as_str()) {
            return Err(ValidationError::InvalidValue {
                field: "pool",
                value: pool.clone(),
                reason: "listed more than once".to_string(),
            }
            .into());
        }
    }
    validate_pools(ctx, std::iter::once(&req.primary_pool).chain(&req.secondary_pools))?;

    let homes = format!("{}/homes", req.primary_pool);
    let shared = format!("{}/{BUILTIN_SHARE}", req.primary_pool);
    let mut existing = Vec::new();
    for dataset in [&homes, &shared] {
        if inspect("check dataset", ctx.host.datasets.exists(dataset))? {
            existing.push(dataset.as_str());
        }
    }
    let mut journal = ctx.journal();
    if !existing.is_empty() {
        let list = existing.join(", ");
        ctx.gate(
            ConfirmTier::Proceed,
            &list,
            &format!("Dataset(s) {list} already exist and will be adopted."),
        )?;
        journal.warn(format!("adopted existing dataset(s): {list}"));
    }

    ctx.log.stage("Preparing datasets");
    let datasets = ctx.host.datasets;
    journal.step(format!("create dataset {homes}"), || datasets.create(&homes))?;
    let homes_path = mountpoint(ctx, &homes)?;
    journal.step(format!("set permissions on {}", homes_path.display()), || {
        datasets.set_ownership(&homes_path, ROOT, ROOT, HOMES_MODE)
    })?;

    if inspect("check group", ctx.host.accounts.group_exists(BUILTIN_GROUP))? {
        journal.warn(format!("reusing existing system group '{BUILTIN_GROUP}'"));
    } else {
        journal.step(format!("create group {BUILTIN_GROUP}"), || {
            ctx.host.accounts.create_group(BUILTIN_GROUP)
        })?;
    }

    journal.step(format!("create dataset {shared}"), || datasets.create(&shared))?;
    let shared_path = mountpoint(ctx, &shared)?;
    journal.step(format!("set permissions on {}", shared_path.display()), || {
        datasets.set_ownership(&shared_path, ROOT, BUILTIN_GROUP, SHARED_MODE)
    })?;

    let now = Utc::now();
    let mut doc = StateDocument {
        version: SCHEMA_VERSION,
        initialized: true,
        primary_pool: Some(req.primary_pool.clone()),
        secondary_pools: req.secondary_pools.clone(),
        server_name: Some(req.server_name.clone()),
        workgroup: Some(req.workgroup.clone()),
        macos_optimized: req.macos_optimized,
        default_home_quota,
        ..StateDocument::default()
    };
    doc.groups.insert(
        BUILTIN_GROUP.to_string(),
        GroupEntry {
            description: "Samba Users Group".to_string(),
            members: BTreeSet::new(),
            created: now,
        },
    );
    doc.shares.insert(
        BUILTIN_SHARE.to_string(),
        ShareEntry {
            dataset: shared,
            mount_path: shared_path,
            comment: "Shared files for all users".to_string(),
            owner: ROOT.to_string(),
            group: BUILTIN_GROUP.to_string(),
            permissions: SHARED_MODE.to_string(),
            valid_users: format!("@{BUILTIN_GROUP}"),
            read_only: false,
            browseable: true,
            quota: None,
            created: now,
        },
    );

    ctx.log.stage("Writing configuration");
    let smb_conf = render_full(&GlobalSettings::from_document(&doc), &doc.shares);
    journal.step("validate smb.conf", || ctx.host.smb_conf.validate(&smb_conf))?;
    journal.step("install smb.conf", || ctx.host.smb_conf.install(&smb_conf))?;
    journal.step("install Avahi service file", || ctx.host.discovery.install())?;

    ctx.log.stage("Starting services");
    start_services(ctx, &mut journal)?;

    journal.commit(ctx.store, move |state| {
        *state = doc;
        Ok(())
    })?;
    Ok(journal.finish("Setup completed successfully."))
}

fn start_services(ctx: &Context<'_>, journal: &mut Journal<'_>) -> OpResult<()> {
    for service in Service::ALL {
        journal.step(format!("enable {service}"), || ctx.host.services.enable(service))?;
    }
    for service in Service::ALL {
        let result = journal.step(format!("restart {service}"), || {
            ctx.host.services.restart(service)
        });
        if let Err(err) = result {
            if Service::SAMBA.contains(&service) && ctx.host.smb_conf.restore_backup().is_ok() {
                ctx.log.warn("restored previous smb.conf from backup");
            }
            return Err(err);
        }
    }
    Ok(())
}

/// Parameters for [`modify_setup`].  `None` leaves a setting unchanged.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ModifySetupRequest {
    /// New NetBIOS server name.
    pub server_name: Option<String>,
    /// New workgroup.
    pub workgroup: Option<String>,
    /// Turn the macOS extensions on or off.
    pub macos_optimized: Option<bool>,
    /// Set or clear the default home quota.
    pub default_home_quota: Option<QuotaSetting>,
    /// Secondary pools to start managing.
    pub add_pools: Vec<String>,
    /// Secondary pools to stop managing.
    pub remove_pools: Vec<String>,
}

impl ModifySetupRequest {
    fn is_empty(&self) -> bool {
        self.server_name.is_none()
            && self.workgroup.is_none()
            && self.macos_optimized.is_none()
            && self.default_home_quota.is_none()
            && self.add_pools.is_empty()
            && self.remove_pools.is_empty()
    }
}

fn check_removable_pool(doc: &StateDocument, pool: &str) -> OpResult<()> {
    if doc.primary_pool.as_deref() == Some(pool) {
        return Err(PreconditionError::Protected {
            kind: EntityKind::Pool,
            name: pool.to_string(),
            action: "remove",
        }
        .into());
    }
    if !doc.secondary_pools.iter().any(|p| p == pool) {
        return Err(PreconditionError::InvalidPool {
            pool: pool.to_string(),
            managed: doc.managed_pools(),
        }
        .into());
    }
    let share = doc
        .shares
        .iter()
        .find(|(_, s)| pool_of(&s.dataset) == pool)
        .map(|(name, _)| format!("share '{name}'"));
    let home = doc
        .users
        .iter()
        .find(|(_, u)| pool_of(&u.home_dataset) == pool)
        .map(|(name, _)| format!("the home of user '{name}'"));
    if let Some(by) = share.or(home) {
        return Err(PreconditionError::InUse {
            kind: EntityKind::Pool,
            name: pool.to_string(),
            by,
        }
        .into());
    }
    Ok(())
}

/// Change the global settings.  `smb.conf` is regenerated from the updated
/// ledger when a setting it renders changes.
///
/// # Errors
///
/// Fails when the system is not set up, nothing was requested, a value is
/// malformed, an added pool is missing or already managed, or a removed
/// pool is the primary pool, unmanaged or still in use.
pub fn modify_setup(ctx: &Context<'_>, req: &ModifySetupRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let doc = ctx.initialized()?;

    validate::something_to_do(!req.is_empty(), "No setup changes requested.")?;
    if let Some(name) = &req.server_name {
        validate::netbios_name("server name", name)?;
    }
    if let Some(workgroup) = &req.workgroup {
        validate::netbios_name("workgroup", workgroup)?;
    }
    for pool in &req.add_pools {
        if doc.is_managed_pool(pool) {
            return Err(PreconditionError::AlreadyExists {
                kind: EntityKind::Pool,
                name: pool.clone(),
            }
            .into());
        }
    }
    validate_pools(ctx, &req.add_pools)?;
    for pool in &req.remove_pools {
        check_removable_pool(&doc, pool)?;
    }

    let mut candidate = doc.clone();
    if let Some(name) = &req.server_name {
        candidate.server_name = Some(name.clone());
    }
    if let Some(workgroup) = &req.workgroup {
        candidate.workgroup = Some(workgroup.clone());
    }
    if let Some(macos) = req.macos_optimized {
        candidate.macos_optimized = macos;
    }
    if let Some(quota) = &req.default_home_quota {
        candidate.default_home_quota = quota.as_option().map(String::from);
    }
    candidate
        .secondary_pools
        .retain(|p| !req.remove_pools.contains(p));
    for pool in &req.add_pools {
        if !candidate.secondary_pools.contains(pool) {
            candidate.secondary_pools.push(pool.clone());
        }
    }

    let mut journal = ctx.journal();
    let global = GlobalSettings::from_document(&candidate);
    if global != GlobalSettings::from_document(&doc) {
        ctx.log.stage("Regenerating smb.conf");
        apply_smb_conf(ctx, &mut journal, &render_full(&global, &candidate.shares))?;
    }

    journal.commit(ctx.store, move |state| {
        *state = candidate;
        Ok(())
    })?;
    Ok(journal.finish("Global setup modified successfully."))
}
