//! Full removal of everything setup and later operations installed.
use super::{ConfirmTier, Context, Journal, OpResult, Outcome};
use crate::resources::error::ResourceError;
use crate::resources::{ResourceResult, Service};
use crate::state::document::BUILTIN_GROUP;

/// Parameters for [`remove`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemoveRequest {
    /// Destroy home, share and `homes` datasets.
    pub delete_data: bool,
    /// Delete OS accounts, Samba credentials and groups.
    pub delete_users_and_groups: bool,
}

/// Run `action` only when `present` reports the object present.  A failed
/// check becomes a warning.
fn when_present<F>(
    journal: &mut Journal<'_>,
    what: &str,
    present: ResourceResult<bool>,
    step: String,
    action: F,
) where
    F: FnOnce() -> ResourceResult<()>,
{
    match present {
        Ok(true) => {
            journal.attempt(step, action);
        }
        Ok(false) => journal.skip(&step, &format!("{what} already absent")),
        Err(e) => journal.warn(format!("could not check {what}: {e}")),
    }
}

/// Tear down the installation.
///
/// Every external step is best-effort; failures are collected as warnings
/// in the returned [`Outcome`] and the ledger is deleted last.
///
/// # Errors
///
/// Fails when the ledger cannot be read or the confirmation is declined.
pub fn remove(ctx: &Context<'_>, req: RemoveRequest) -> OpResult<Outcome> {
    let _lock = ctx.store.lock()?;
    let Some(doc) = ctx.store.load()? else {
        return Ok(Outcome::message("System is not set up, nothing to do."));
    };

    if req.delete_data {
        ctx.gate(
            ConfirmTier::Destroy,
            "all",
            "This will remove the Samba configuration and permanently destroy all managed datasets with their data.",
        )?;
    } else {
        ctx.gate(
            ConfirmTier::Proceed,
            "all",
            "This will remove the Samba configuration and stop the services. Datasets are kept.",
        )?;
    }

    // Enumerate up front; the ledger is not consulted again.
    let users: Vec<(String, String)> = doc
        .users
        .iter()
        .map(|(name, user)| (name.clone(), user.home_dataset.clone()))
        .collect();
    let mut groups: Vec<String> = doc
        .groups
        .keys()
        .filter(|g| g.as_str() != BUILTIN_GROUP)
        .cloned()
        .collect();
    groups.push(BUILTIN_GROUP.to_string());
    let shares: Vec<String> = doc.shares.values().map(|s| s.dataset.clone()).collect();
    let homes_root = doc.homes_root();

    let host = ctx.host;
    let mut journal = ctx.journal();

    if req.delete_users_and_groups {
        ctx.log.stage("Removing users and groups");
        for (name, _) in &users {
            when_present(
                &mut journal,
                &format!("Samba account '{name}'"),
                host.passwords.exists(name),
                format!("remove Samba account {name}"),
                || host.passwords.remove_share_password(name),
            );
            when_present(
                &mut journal,
                &format!("OS user '{name}'"),
                host.accounts.user_exists(name),
                format!("delete OS user {name}"),
                || host.accounts.delete_user(name),
            );
        }
        for group in &groups {
            when_present(
                &mut journal,
                &format!("group '{group}'"),
                host.accounts.group_exists(group),
                format!("delete group {group}"),
                || host.accounts.delete_group(group),
            );
        }
    }

    if req.delete_data {
        ctx.log.stage("Destroying datasets");
        let datasets = users
            .iter()
            .map(|(_, home)| home)
            .chain(&shares)
            .chain(std::iter::once(&homes_root));
        for dataset in datasets {
            when_present(
                &mut journal,
                &format!("dataset {dataset}"),
                host.datasets.exists(dataset),
                format!("destroy dataset {dataset}"),
                || host.datasets.destroy(dataset, true),
            );
        }
    }

    ctx.log.stage("Removing configuration");
    journal.attempt("remove smb.conf", || host.smb_conf.remove());
    journal.attempt("remove Avahi service file", || host.discovery.remove());

    ctx.log.stage("Stopping services");
    for service in Service::ALL {
        journal.attempt(format!("stop {service}"), || host.services.stop(service));
        journal.attempt(format!("disable {service}"), || {
            host.services.disable(service)
        });
    }

    let store = ctx.store;
    journal.attempt(format!("delete {}", store.path().display()), || {
        store.destroy().map_err(|e| ResourceError::InvalidState {
            resource: store.path().display().to_string(),
            reason: e.to_string(),
        })
    });

    Ok(journal.finish("Removal completed successfully."))
}
