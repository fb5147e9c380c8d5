//! Parameter validation shared by the entity operations.
//!
//! Checks here are purely syntactic; resolution against the ledger happens
//! in the operations themselves.
use std::fmt;

use crate::error::{EntityKind, ValidationError};
use crate::resources::smb_conf::{EVERYONE, is_reserved_section};
use crate::state::document::{MAX_ACCOUNT_NAME_LEN, is_valid_identifier};

const NETBIOS_MAX_LEN: usize = 15;
const OCTAL_MODE_MIN_LEN: usize = 3;
const OCTAL_MODE_MAX_LEN: usize = 4;

fn invalid_name(kind: EntityKind, name: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidName {
        kind,
        name: name.to_string(),
        reason: reason.into(),
    }
}

fn invalid_value(field: &'static str, value: &str, reason: impl Into<String>) -> ValidationError {
    ValidationError::InvalidValue {
        field,
        value: value.to_string(),
        reason: reason.into(),
    }
}

fn identifier(kind: EntityKind, name: &str) -> Result<(), ValidationError> {
    if !is_valid_identifier(name) {
        return Err(invalid_name(
            kind,
            name,
            "only letters, digits, '.', '_' and '-' are allowed",
        ));
    }
    if name.starts_with('-') {
        return Err(invalid_name(kind, name, "must not start with '-'"));
    }
    Ok(())
}

/// Validate a user or group name.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidName`] for characters outside
/// `[A-Za-z0-9._-]`, a leading `-` or more than 32 characters.
pub fn account_name(kind: EntityKind, name: &str) -> Result<(), ValidationError> {
    identifier(kind, name)?;
    if name.len() > MAX_ACCOUNT_NAME_LEN {
        return Err(invalid_name(
            kind,
            name,
            format!("must be at most {MAX_ACCOUNT_NAME_LEN} characters"),
        ));
    }
    Ok(())
}

/// Validate a ZFS pool name.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidName`].
pub fn pool_name(name: &str) -> Result<(), ValidationError> {
    identifier(EntityKind::Pool, name)
}

/// Validate a share name; Samba's reserved sections are refused.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidName`].
pub fn share_name(name: &str) -> Result<(), ValidationError> {
    identifier(EntityKind::Share, name)?;
    if is_reserved_section(name) {
        return Err(invalid_name(
            EntityKind::Share,
            name,
            "reserved by Samba",
        ));
    }
    Ok(())
}

/// Validate a NetBIOS name or workgroup: 1 to 15 letters, digits or `-`.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] naming `field`.
pub fn netbios_name(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.is_empty() || value.len() > NETBIOS_MAX_LEN {
        return Err(invalid_value(
            field,
            value,
            format!("must be 1 to {NETBIOS_MAX_LEN} characters"),
        ));
    }
    if !value.chars().all(|c| c.is_ascii_alphanumeric() || c == '-') {
        return Err(invalid_value(
            field,
            value,
            "only letters, digits and '-' are allowed",
        ));
    }
    Ok(())
}

/// Validate an octal permission mode and return it as four digits.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] unless `mode` is 3 or 4 octal
/// digits.
///
/// # Examples
///
/// ```
/// use smb_zfs::operations::validate::octal_mode;
///
/// assert_eq!(octal_mode("775").unwrap(), "0775");
/// assert!(octal_mode("0788").is_err());
/// ```
pub fn octal_mode(mode: &str) -> Result<String, ValidationError> {
    if !mode.chars().all(|c| c.is_ascii_digit()) {
        return Err(invalid_value(
            "permissions",
            mode,
            "must contain only digits",
        ));
    }
    if mode.len() < OCTAL_MODE_MIN_LEN || mode.len() > OCTAL_MODE_MAX_LEN {
        return Err(invalid_value(
            "permissions",
            mode,
            format!("must be {OCTAL_MODE_MIN_LEN} or {OCTAL_MODE_MAX_LEN} digits"),
        ));
    }
    if let Some(c) = mode.chars().find(|&c| c > '7') {
        return Err(invalid_value(
            "permissions",
            mode,
            format!("'{c}' is not an octal digit"),
        ));
    }
    Ok(format!("{mode:0>4}"))
}

/// Validate a ZFS quota such as `500G`, `1.5T` or `100M` and return it with
/// an upper-case unit.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] for anything else.
pub fn quota(value: &str) -> Result<String, ValidationError> {
    let upper = value.trim().to_ascii_uppercase();
    let number = upper
        .strip_suffix(['K', 'M', 'G', 'T', 'P', 'E'])
        .unwrap_or(&upper);
    let (whole, fraction) = number.split_once('.').unwrap_or((number, "0"));
    let digits = |s: &str| !s.is_empty() && s.chars().all(|c| c.is_ascii_digit());
    if !digits(whole) || !digits(fraction) {
        return Err(invalid_value(
            "quota",
            value,
            "expected a size such as 500G, 1.5T or 100M",
        ));
    }
    Ok(upper)
}

/// A quota request: a new size or removal.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QuotaSetting {
    /// Apply this quota.
    Set(String),
    /// Remove the quota.
    Clear,
}

impl QuotaSetting {
    /// Parse `none` as [`QuotaSetting::Clear`] and anything else with
    /// [`quota`].
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError::InvalidValue`] for a malformed size.
    pub fn parse(value: &str) -> Result<Self, ValidationError> {
        if value.trim().eq_ignore_ascii_case("none") {
            Ok(Self::Clear)
        } else {
            quota(value).map(Self::Set)
        }
    }

    /// Quota to store, `None` when cleared.
    #[must_use]
    pub fn as_option(&self) -> Option<&str> {
        match self {
            Self::Set(q) => Some(q),
            Self::Clear => None,
        }
    }
}

impl fmt::Display for QuotaSetting {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Set(q) => write!(f, "{q}"),
            Self::Clear => write!(f, "none"),
        }
    }
}

/// Validate a share comment or group description: one line, no control
/// characters.
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] naming `field`.
pub fn single_line(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.chars().any(char::is_control) {
        return Err(invalid_value(
            field,
            value,
            "must be a single line without control characters",
        ));
    }
    Ok(())
}

/// Validate a dataset path relative to a pool (`shares/media`).
///
/// # Errors
///
/// Returns [`ValidationError::InvalidValue`] for absolute paths, empty or
/// `..` components and characters outside the identifier set.
pub fn dataset_path(path: &str) -> Result<(), ValidationError> {
    let reason = if path.is_empty() {
        Some("must not be empty")
    } else if path.starts_with('/') || path.ends_with('/') {
        Some("must be relative to the pool without leading or trailing '/'")
    } else if path
        .split('/')
        .any(|c| !is_valid_identifier(c) || c == "." || c == ".." || c.starts_with('-'))
    {
        Some("each component must be a plain name of letters, digits, '.', '_' or '-'")
    } else {
        None
    };
    match reason {
        Some(reason) => Err(invalid_value("dataset", path, reason)),
        None => Ok(()),
    }
}

/// One entry of a share access expression.
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord)]
pub enum AccessEntry {
    /// Every authenticated user.
    Everyone,
    /// A single user.
    User(String),
    /// Members of a group (`@name`).
    Group(String),
}

impl fmt::Display for AccessEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Everyone => write!(f, "{EVERYONE}"),
            Self::User(name) => write!(f, "{name}"),
            Self::Group(name) => write!(f, "@{name}"),
        }
    }
}

/// A parsed, normalised share access expression.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccessList {
    entries: Vec<AccessEntry>,
}

impl AccessList {
    /// Parse a comma or space separated list of user names, `@group`
    /// references and `*`.  Duplicates are dropped; `*` absorbs everything
    /// else.
    ///
    /// # Errors
    ///
    /// Returns [`ValidationError`] for an empty list or a malformed entry.
    ///
    /// # Examples
    ///
    /// ```
    /// use smb_zfs::operations::validate::AccessList;
    ///
    /// let list = AccessList::parse("alice, @finance bob").unwrap();
    /// assert_eq!(list.to_string(), "alice,@finance,bob");
    /// ```
    pub fn parse(expression: &str) -> Result<Self, ValidationError> {
        let mut entries: Vec<AccessEntry> = Vec::new();
        for token in expression
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|t| !t.is_empty())
        {
            let entry = if token == EVERYONE {
                AccessEntry::Everyone
            } else if let Some(group) = token.strip_prefix('@') {
                account_name(EntityKind::Group, group)?;
                AccessEntry::Group(group.to_string())
            } else {
                account_name(EntityKind::User, token)?;
                AccessEntry::User(token.to_string())
            };
            if !entries.contains(&entry) {
                entries.push(entry);
            }
        }
        if entries.is_empty() {
            return Err(invalid_value(
                "valid users",
                expression,
                "must name at least one user, @group or *",
            ));
        }
        if entries.contains(&AccessEntry::Everyone) {
            entries = vec![AccessEntry::Everyone];
        }
        Ok(Self { entries })
    }

    /// Parsed entries in input order.
    #[must_use]
    pub fn entries(&self) -> &[AccessEntry] {
        &self.entries
    }

    /// Users named directly.
    pub fn users(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            AccessEntry::User(name) => Some(name.as_str()),
            _ => None,
        })
    }

    /// Groups referenced with `@`.
    pub fn groups(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().filter_map(|e| match e {
            AccessEntry::Group(name) => Some(name.as_str()),
            _ => None,
        })
    }
}

impl fmt::Display for AccessList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rendered: Vec<String> = self.entries.iter().map(ToString::to_string).collect();
        write!(f, "{}", rendered.join(","))
    }
}

/// Fail unless at least one field of a modification is set.
///
/// # Errors
///
/// Returns [`ValidationError::NothingToDo`] with `message`.
pub fn something_to_do(changed: bool, message: &str) -> Result<(), ValidationError> {
    if changed {
        Ok(())
    } else {
        Err(ValidationError::NothingToDo(message.to_string()))
    }
}
