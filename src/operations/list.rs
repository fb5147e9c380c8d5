//! Read-only views of the ledger.
use serde::Serialize;

use super::{Context, OpResult};
use crate::state::StateDocument;
use crate::state::document::{GroupEntry, ShareEntry, UserEntry};

/// What to list.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    /// Managed users.
    Users,
    /// Managed groups.
    Groups,
    /// Managed shares.
    Shares,
    /// Managed pools.
    Pools,
}

/// A ledger entry with its name.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Listed<T> {
    /// Entity name.
    pub name: String,
    /// Ledger data; for users and shares `quota` is read live.
    #[serde(flatten)]
    pub entry: T,
}

/// A managed pool.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PoolSummary {
    /// Pool name.
    pub name: String,
    /// Whether this is the primary pool.
    pub primary: bool,
    /// Whether the pool is currently imported; `None` when unknown.
    pub imported: Option<bool>,
    /// Number of shares on the pool.
    pub shares: usize,
}

/// Result of [`list`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum Listing {
    /// Users by name.
    Users(Vec<Listed<UserEntry>>),
    /// Groups by name.
    Groups(Vec<Listed<GroupEntry>>),
    /// Shares by name.
    Shares(Vec<Listed<ShareEntry>>),
    /// Primary pool first.
    Pools(Vec<PoolSummary>),
}

impl Listing {
    /// Whether there is nothing to show.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        match self {
            Self::Users(v) => v.is_empty(),
            Self::Groups(v) => v.is_empty(),
            Self::Shares(v) => v.is_empty(),
            Self::Pools(v) => v.is_empty(),
        }
    }
}

fn live_quota(ctx: &Context<'_>, dataset: &str) -> Option<String> {
    match ctx.host.datasets.quota(dataset) {
        Ok(quota) => quota,
        Err(e) => {
            ctx.log
                .debug(&format!("quota of {dataset} unavailable: {e}"));
            None
        }
    }
}

/// List one category of managed entities.
///
/// # Errors
///
/// Fails when the system is not set up or the ledger cannot be read.
pub fn list(ctx: &Context<'_>, category: Category) -> OpResult<Listing> {
    let doc = ctx.initialized()?;
    Ok(match category {
        Category::Users => Listing::Users(
            doc.users
                .into_iter()
                .map(|(name, mut entry)| {
                    entry.quota = live_quota(ctx, &entry.home_dataset);
                    Listed { name, entry }
                })
                .collect(),
        ),
        Category::Groups => Listing::Groups(
            doc.groups
                .into_iter()
                .map(|(name, entry)| Listed { name, entry })
                .collect(),
        ),
        Category::Shares => Listing::Shares(
            doc.shares
                .into_iter()
                .map(|(name, mut entry)| {
                    entry.quota = live_quota(ctx, &entry.dataset);
                    Listed { name, entry }
                })
                .collect(),
        ),
        Category::Pools => Listing::Pools(pools(ctx, &doc)),
    })
}

fn pools(ctx: &Context<'_>, doc: &StateDocument) -> Vec<PoolSummary> {
    doc.managed_pools()
        .into_iter()
        .map(|name| PoolSummary {
            primary: doc.primary_pool.as_deref() == Some(name.as_str()),
            imported: ctx.host.datasets.pool_exists(&name).ok(),
            shares: doc
                .shares
                .values()
                .filter(|s| crate::state::document::pool_of(&s.dataset) == name)
                .count(),
            name,
        })
        .collect()
}

/// The full ledger document.
///
/// # Errors
///
/// Fails when the system is not set up or the ledger cannot be read.
pub fn get_state(ctx: &Context<'_>) -> OpResult<StateDocument> {
    ctx.initialized()
}
