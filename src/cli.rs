//! Command-line grammar.
use std::path::PathBuf;

use clap::{Args, Parser, Subcommand, ValueEnum};
use clap_complete::Shell;

use crate::operations::list::Category;

/// Top-level CLI entry point.
#[derive(Parser, Debug)]
#[command(
    name = "smb-zfs",
    about = "Manage Samba shares, ZFS datasets and the accounts that use them",
    version
)]
pub struct Cli {
    /// Subcommand to run.
    #[command(subcommand)]
    pub command: Command,

    /// Options shared by every subcommand.
    #[command(flatten)]
    pub global: GlobalOpts,
}

/// Options shared across all subcommands.
#[derive(Args, Debug, Clone, Default)]
pub struct GlobalOpts {
    /// Show what would change without changing anything
    #[arg(short = 'n', long, global = true)]
    pub dry_run: bool,

    /// Print results as JSON on stdout
    #[arg(long, global = true)]
    pub json: bool,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Answer every confirmation prompt affirmatively
    #[arg(short, long, global = true)]
    pub yes: bool,

    /// Ledger location
    #[arg(long, global = true, env = "SMB_ZFS_STATE", value_name = "PATH")]
    pub state: Option<PathBuf>,

    /// Settings file
    #[arg(long, global = true, env = "SMB_ZFS_CONFIG", value_name = "PATH")]
    pub config: Option<PathBuf>,
}

/// Available subcommands.
#[derive(Subcommand, Debug)]
pub enum Command {
    /// Initial setup: datasets, smb_users group, smb.conf, Avahi, services
    Setup(SetupArgs),
    /// Create a user, share or group
    #[command(subcommand)]
    Create(CreateCommand),
    /// Modify the setup, a user, share, group or home quota
    #[command(subcommand)]
    Modify(ModifyCommand),
    /// Delete a user, share or group
    #[command(subcommand)]
    Delete(DeleteCommand),
    /// List managed entities
    List {
        /// What to list
        #[arg(value_enum)]
        what: ListTarget,
    },
    /// Change a user's password
    Passwd {
        /// User whose password changes
        user: String,
    },
    /// Remove the configuration, and optionally accounts and data
    Remove(RemoveArgs),
    /// Print the ledger as JSON
    GetState,
    /// Print a shell completion script
    Completions {
        /// Target shell
        #[arg(value_enum)]
        shell: Shell,
    },
}

impl Command {
    /// Name used for the log file.
    #[must_use]
    pub const fn log_name(&self) -> &'static str {
        match self {
            Self::Setup(_) => "setup",
            Self::Create(_) => "create",
            Self::Modify(_) => "modify",
            Self::Delete(_) => "delete",
            Self::List { .. } => "list",
            Self::Passwd { .. } => "passwd",
            Self::Remove(_) => "remove",
            Self::GetState => "get-state",
            Self::Completions { .. } => "completions",
        }
    }
}

/// Options for `setup`.
#[derive(Args, Debug, Clone)]
pub struct SetupArgs {
    /// Pool for home directories and the shared share
    #[arg(long)]
    pub primary_pool: String,

    /// Further pools shares may be created on
    #[arg(long, value_delimiter = ',')]
    pub secondary_pools: Vec<String>,

    /// NetBIOS name (default: the host name)
    #[arg(long)]
    pub server_name: Option<String>,

    /// Windows workgroup
    #[arg(long, default_value = "WORKGROUP")]
    pub workgroup: String,

    /// Enable macOS compatibility extensions
    #[arg(long)]
    pub macos: bool,

    /// Quota for new home datasets, e.g. 10G
    #[arg(long)]
    pub default_home_quota: Option<String>,
}

/// `create` subcommands.
#[derive(Subcommand, Debug)]
pub enum CreateCommand {
    /// Create a user with a home dataset
    User(CreateUserArgs),
    /// Create a share backed by a dataset
    Share(CreateShareArgs),
    /// Create a group
    Group(CreateGroupArgs),
}

/// Options for `create user`.
#[derive(Args, Debug, Clone)]
pub struct CreateUserArgs {
    /// Account name
    pub name: String,

    /// Password; prompted for when omitted
    #[arg(long)]
    pub password: Option<String>,

    /// Give the account a login shell
    #[arg(long)]
    pub shell: bool,

    /// Additional groups to join
    #[arg(long, value_delimiter = ',')]
    pub groups: Vec<String>,
}

/// Options for `create share`.
#[derive(Args, Debug, Clone)]
pub struct CreateShareArgs {
    /// Share name
    pub name: String,

    /// Dataset path inside the pool, e.g. shares/media
    #[arg(long)]
    pub dataset: String,

    /// Managed pool (default: the primary pool)
    #[arg(long)]
    pub pool: Option<String>,

    /// Description shown to clients
    #[arg(long, default_value = "")]
    pub comment: String,

    /// Owner of files created through the share (default: root)
    #[arg(long)]
    pub owner: Option<String>,

    /// Group of files created through the share (default: smb_users)
    #[arg(long)]
    pub group: Option<String>,

    /// Octal permissions of the share root (default: 0775)
    #[arg(long)]
    pub perms: Option<String>,

    /// Users and @groups allowed to connect; * for everyone
    #[arg(long)]
    pub valid_users: Option<String>,

    /// Export read-only
    #[arg(long)]
    pub readonly: bool,

    /// Hide from browse lists
    #[arg(long)]
    pub no_browse: bool,

    /// Dataset quota, e.g. 500G
    #[arg(long)]
    pub quota: Option<String>,
}

/// Options for `create group`.
#[derive(Args, Debug, Clone)]
pub struct CreateGroupArgs {
    /// Group name
    pub name: String,

    /// Description
    #[arg(long)]
    pub description: Option<String>,

    /// Managed users to add
    #[arg(long, value_delimiter = ',')]
    pub users: Vec<String>,
}

/// `modify` subcommands.
#[derive(Subcommand, Debug)]
pub enum ModifyCommand {
    /// Change global settings and secondary pools
    Setup(ModifySetupArgs),
    /// Change shell access or group memberships
    User(ModifyUserArgs),
    /// Change share settings, ownership or quota
    Share(ModifyShareArgs),
    /// Add or remove group members
    Group(ModifyGroupArgs),
    /// Set or clear a home dataset quota
    Home(ModifyHomeArgs),
}

/// Options for `modify setup`.
#[derive(Args, Debug, Clone, Default)]
pub struct ModifySetupArgs {
    /// New NetBIOS name
    #[arg(long)]
    pub server_name: Option<String>,

    /// New workgroup
    #[arg(long)]
    pub workgroup: Option<String>,

    /// Enable macOS compatibility extensions
    #[arg(long, conflicts_with = "no_macos")]
    pub macos: bool,

    /// Disable macOS compatibility extensions
    #[arg(long)]
    pub no_macos: bool,

    /// Default home quota, or none to clear it
    #[arg(long)]
    pub default_home_quota: Option<String>,

    /// Pools to start managing
    #[arg(long, value_delimiter = ',')]
    pub add_secondary_pools: Vec<String>,

    /// Pools to stop managing
    #[arg(long, value_delimiter = ',')]
    pub remove_secondary_pools: Vec<String>,
}

/// Options for `modify user`.
#[derive(Args, Debug, Clone, Default)]
pub struct ModifyUserArgs {
    /// Account name
    pub name: String,

    /// Grant a login shell
    #[arg(long, conflicts_with = "no_shell")]
    pub shell: bool,

    /// Revoke the login shell
    #[arg(long)]
    pub no_shell: bool,

    /// Unix password to set when granting a login shell
    #[arg(long, requires = "shell")]
    pub password: Option<String>,

    /// Groups to join
    #[arg(long, value_delimiter = ',')]
    pub add_groups: Vec<String>,

    /// Groups to leave
    #[arg(long, value_delimiter = ',')]
    pub remove_groups: Vec<String>,
}

/// Options for `modify share`.
#[derive(Args, Debug, Clone, Default)]
pub struct ModifyShareArgs {
    /// Share name
    pub name: String,

    /// New description
    #[arg(long)]
    pub comment: Option<String>,

    /// New access list
    #[arg(long)]
    pub valid_users: Option<String>,

    /// Export read-only
    #[arg(long, conflicts_with = "writable")]
    pub readonly: bool,

    /// Export read-write
    #[arg(long)]
    pub writable: bool,

    /// Show in browse lists
    #[arg(long, conflicts_with = "no_browse")]
    pub browse: bool,

    /// Hide from browse lists
    #[arg(long)]
    pub no_browse: bool,

    /// New owner
    #[arg(long)]
    pub owner: Option<String>,

    /// New group
    #[arg(long)]
    pub group: Option<String>,

    /// New octal permissions
    #[arg(long)]
    pub perms: Option<String>,

    /// New quota, or none to clear it
    #[arg(long)]
    pub quota: Option<String>,
}

/// Options for `modify group`.
#[derive(Args, Debug, Clone, Default)]
pub struct ModifyGroupArgs {
    /// Group name
    pub name: String,

    /// Managed users to add
    #[arg(long, value_delimiter = ',')]
    pub add_users: Vec<String>,

    /// Users to remove
    #[arg(long, value_delimiter = ',')]
    pub remove_users: Vec<String>,
}

/// Options for `modify home`.
#[derive(Args, Debug, Clone)]
pub struct ModifyHomeArgs {
    /// Account name
    pub name: String,

    /// New quota, or none to clear it
    #[arg(long)]
    pub quota: String,
}

/// `delete` subcommands.
#[derive(Subcommand, Debug)]
pub enum DeleteCommand {
    /// Delete a user
    User {
        /// Account name
        name: String,
        /// Also destroy the home dataset
        #[arg(long)]
        delete_data: bool,
    },
    /// Delete a share
    Share {
        /// Share name
        name: String,
        /// Also destroy the dataset
        #[arg(long)]
        delete_data: bool,
    },
    /// Delete a group
    Group {
        /// Group name
        name: String,
    },
}

/// Options for `remove`.
#[derive(Args, Debug, Clone, Copy, Default)]
pub struct RemoveArgs {
    /// Destroy every managed dataset
    #[arg(long)]
    pub delete_data: bool,

    /// Delete every managed user and group
    #[arg(long)]
    pub delete_users: bool,
}

/// `list` targets.
#[derive(ValueEnum, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTarget {
    /// Managed users
    Users,
    /// Managed shares
    Shares,
    /// Managed groups
    Groups,
    /// Managed pools
    Pools,
}

impl From<ListTarget> for Category {
    fn from(target: ListTarget) -> Self {
        match target {
            ListTarget::Users => Self::Users,
            ListTarget::Shares => Self::Shares,
            ListTarget::Groups => Self::Groups,
            ListTarget::Pools => Self::Pools,
        }
    }
}

/// Collapse an on/off flag pair into an optional setting.
#[must_use]
pub const fn toggle(on: bool, off: bool) -> Option<bool> {
    match (on, off) {
        (true, _) => Some(true),
        (false, true) => Some(false),
        (false, false) => None,
    }
}
