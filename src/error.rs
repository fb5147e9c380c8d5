//! Domain-specific error types for smb-zfs.
//!
//! Entity operations return [`SmbZfsError`]; the binary converts it to
//! [`anyhow::Error`] at the command boundary via `?`.
//!
//! # Error hierarchy
//!
//! ```text
//! SmbZfsError
//! ├── Precondition(PreconditionError) : ledger / host state forbids the request
//! ├── Validation(ValidationError)     : malformed or unresolvable parameters
//! ├── External { step, applied, .. }  : an adapter call failed mid-operation
//! ├── State(StateError)               : the ledger could not be locked or read
//! ├── Ledger { applied, .. }          : the state document could not be written
//! └── Cancelled { target }            : the operator declined a confirmation
//! ```
use std::fmt;
use std::path::PathBuf;

use thiserror::Error;

pub use crate::resources::error::ResourceError;

/// Kind of ledger entity, used to phrase error messages.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EntityKind {
    /// A managed user.
    User,
    /// A managed group.
    Group,
    /// A managed share.
    Share,
    /// A ZFS pool.
    Pool,
}

impl EntityKind {
    /// Capitalised label for the start of a sentence.
    #[must_use]
    pub const fn title(self) -> &'static str {
        match self {
            Self::User => "User",
            Self::Group => "Group",
            Self::Share => "Share",
            Self::Pool => "Pool",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::User => write!(f, "user"),
            Self::Group => write!(f, "group"),
            Self::Share => write!(f, "share"),
            Self::Pool => write!(f, "pool"),
        }
    }
}

/// Top-level error returned by every entity operation.
#[derive(Error, Debug)]
pub enum SmbZfsError {
    /// The ledger or host state does not permit the request.
    #[error("Precondition failed: {0}")]
    Precondition(#[from] PreconditionError),

    /// The request parameters are malformed or reference unknown entities.
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// An external call failed after zero or more steps were applied.
    #[error("{step} failed: {source}{}", applied_note(.applied))]
    External {
        /// Step that failed.
        step: String,
        /// Steps that completed before the failure, in order.
        applied: Vec<String>,
        /// Underlying adapter error.
        source: ResourceError,
    },

    /// The ledger could not be locked or read; nothing was changed.
    #[error("Ledger unavailable: {0}")]
    State(StateError),

    /// External changes were applied but the ledger could not be updated.
    #[error("Ledger update failed: {source}{}", ledger_note(.applied))]
    Ledger {
        /// Steps applied to the host that the ledger does not yet reflect.
        applied: Vec<String>,
        /// Underlying state-store error.
        source: StateError,
    },

    /// The operator declined a confirmation prompt.
    #[error("Operation cancelled: {target} was left untouched.")]
    Cancelled {
        /// What the prompt was about.
        target: String,
    },
}

fn applied_note(applied: &[String]) -> String {
    if applied.is_empty() {
        String::new()
    } else {
        format!(
            " (already applied, needs manual attention: {})",
            applied.join("; ")
        )
    }
}

fn ledger_note(applied: &[String]) -> String {
    if applied.is_empty() {
        String::new()
    } else {
        format!(
            " (host changes applied but not recorded, reconcile manually: {})",
            applied.join("; ")
        )
    }
}

impl From<StateError> for SmbZfsError {
    fn from(source: StateError) -> Self {
        Self::State(source)
    }
}

/// Errors raised before any mutation because of ledger or host state.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PreconditionError {
    /// The ledger has not been initialised.
    #[error("System not set up. Run 'setup' first.")]
    NotInitialized,

    /// Setup was requested on an initialised system.
    #[error("System is already set up.")]
    AlreadyInitialized,

    /// A pool named in the request does not exist on the host.
    #[error("ZFS pool '{0}' does not exist.")]
    PoolMissing(String),

    /// A pool is not managed by the ledger.
    #[error("Pool '{pool}' is not a valid pool. Managed pools are: {}", .managed.join(", "))]
    InvalidPool {
        /// Requested pool.
        pool: String,
        /// Pools the ledger manages.
        managed: Vec<String>,
    },

    /// The entity is already in the ledger.
    #[error("{} '{name}' already exists.", .kind.title())]
    AlreadyExists {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
    },

    /// The entity is not in the ledger.
    #[error("{} '{name}' not found or not managed by this tool.", .kind.title())]
    NotFound {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
    },

    /// The host disagrees with the ledger about this entity.
    #[error("{} '{name}' is out of sync with the system: {detail}", .kind.title())]
    Drift {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
        /// What disagrees.
        detail: String,
    },

    /// A built-in entity cannot be deleted or altered this way.
    #[error("Cannot {action} the mandatory '{name}' {kind}.")]
    Protected {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
        /// Refused action, e.g. `delete`.
        action: &'static str,
    },

    /// The entity is still referenced elsewhere.
    #[error("{} '{name}' is still in use by {by}.", .kind.title())]
    InUse {
        /// Entity kind.
        kind: EntityKind,
        /// Entity name.
        name: String,
        /// Referencing entity description.
        by: String,
    },

    /// The caller is not allowed to perform the operation.
    #[error("Permission denied: {0}")]
    Forbidden(String),
}

/// Errors raised when request parameters are malformed or unresolvable.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ValidationError {
    /// An entity name does not match the identifier rules.
    #[error("Invalid {kind} name '{name}': {reason}")]
    InvalidName {
        /// Entity kind.
        kind: EntityKind,
        /// Rejected name.
        name: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A field value is malformed.
    #[error("Invalid {field} '{value}': {reason}")]
    InvalidValue {
        /// Field being validated.
        field: &'static str,
        /// Rejected value.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A referenced collaborator is not in the ledger.
    #[error("{} '{name}' referenced by {context} does not exist.", .kind.title())]
    UnknownReference {
        /// Entity kind of the missing collaborator.
        kind: EntityKind,
        /// Missing name.
        name: String,
        /// Where the reference came from.
        context: String,
    },

    /// The request would not change anything.
    #[error("{0}")]
    NothingToDo(String),
}

/// Errors from the state store.
#[derive(Error, Debug)]
pub enum StateError {
    /// The state file (or its lock/backup) could not be accessed.
    #[error("I/O error on {}: {source}", .path.display())]
    Io {
        /// File that could not be accessed.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The persisted document cannot be parsed or fails its invariants.
    #[error("State file {} is corrupt: {reason}", .path.display())]
    Corrupt {
        /// State file path.
        path: PathBuf,
        /// Parse or invariant failure.
        reason: String,
    },

    /// A candidate document violates a ledger invariant.
    #[error("State invariant violated: {0}")]
    Invariant(String),

    /// The document could not be serialized.
    #[error("Failed to serialize state: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Another invocation holds the state lock.
    #[error("State file {} is locked by another smb-zfs process", .path.display())]
    Locked {
        /// Lock file path.
        path: PathBuf,
    },
}

impl StateError {
    /// Shorthand for [`StateError::Io`].
    pub fn io(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
        Self::Io {
            path: path.into(),
            source,
        }
    }
}

/// Errors from loading the tool's own TOML settings.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The settings file could not be read.
    #[error("IO error reading config file {}: {source}", .path.display())]
    Io {
        /// Settings file path.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The settings file is not valid TOML for [`crate::config::Settings`].
    #[error("Invalid TOML in {}: {message}", .path.display())]
    InvalidSyntax {
        /// Settings file path.
        path: PathBuf,
        /// Parser message.
        message: String,
    },
}
