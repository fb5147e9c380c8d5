//! Text and JSON rendering of command results.
use std::fmt::Write as _;

use anyhow::Result;
use serde::Serialize;

use crate::operations::Outcome;
use crate::operations::list::Listing;

/// Serialise `value` as pretty JSON.
///
/// # Errors
///
/// Returns an error if serialisation fails.
pub fn json<T: Serialize>(value: &T) -> Result<String> {
    Ok(serde_json::to_string_pretty(value)?)
}

/// Plain-text form of an [`Outcome`].
#[must_use]
pub fn outcome_text(outcome: &Outcome) -> String {
    if !outcome.dry_run {
        return outcome.message.clone();
    }
    let mut out = String::from("Dry run, nothing was changed. Planned steps:");
    if outcome.changes.is_empty() {
        out.push_str("\n  (none)");
    }
    for change in &outcome.changes {
        let _ = write!(out, "\n  - {change}");
    }
    out
}

fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

fn or_none(value: Option<&str>) -> &str {
    value.unwrap_or("none")
}

/// Plain-text form of a [`Listing`].
#[must_use]
pub fn listing_text(listing: &Listing) -> String {
    if listing.is_empty() {
        return "Nothing to list.".to_string();
    }
    let mut out = String::new();
    match listing {
        Listing::Users(users) => {
            for user in users {
                let groups = user.entry.groups.iter().cloned().collect::<Vec<_>>();
                let _ = writeln!(
                    out,
                    "{}\n  home: {} ({})\n  shell: {}\n  quota: {}\n  groups: {}",
                    user.name,
                    user.entry.home_dataset,
                    user.entry.home_mountpoint.display(),
                    yes_no(user.entry.shell_access),
                    or_none(user.entry.quota.as_deref()),
                    groups.join(", "),
                );
            }
        }
        Listing::Groups(groups) => {
            for group in groups {
                let members = group.entry.members.iter().cloned().collect::<Vec<_>>();
                let _ = writeln!(
                    out,
                    "{}\n  description: {}\n  members: {}",
                    group.name,
                    group.entry.description,
                    if members.is_empty() {
                        "(none)".to_string()
                    } else {
                        members.join(", ")
                    },
                );
            }
        }
        Listing::Shares(shares) => {
            for share in shares {
                let s = &share.entry;
                let _ = writeln!(
                    out,
                    "{}\n  dataset: {} ({})\n  comment: {}\n  owner: {}:{} {}\n  valid users: {}\n  read only: {}\n  browseable: {}\n  quota: {}",
                    share.name,
                    s.dataset,
                    s.mount_path.display(),
                    s.comment,
                    s.owner,
                    s.group,
                    s.permissions,
                    s.valid_users,
                    yes_no(s.read_only),
                    yes_no(s.browseable),
                    or_none(s.quota.as_deref()),
                );
            }
        }
        Listing::Pools(pools) => {
            for pool in pools {
                let imported = match pool.imported {
                    Some(true) => "imported",
                    Some(false) => "not imported",
                    None => "status unknown",
                };
                let _ = writeln!(
                    out,
                    "{} ({}, {imported}, {} share(s))",
                    pool.name,
                    if pool.primary { "primary" } else { "secondary" },
                    pool.shares,
                );
            }
        }
    }
    out.trim_end().to_string()
}
