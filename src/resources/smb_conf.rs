//! Samba configuration rendering and the `smb.conf` file adapter.
//!
//! Rendering is pure: [`render_base`], [`share_section`] and [`render_full`]
//! build an [`IniDocument`] from ledger data.  [`SambaConfigFile`] is the
//! only code that reads or writes the live file.
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use super::error::ResourceError;
use super::fs::{remove_existing, sibling, write_atomic};
use super::{ResourceResult, ShareConfigWriter};
use crate::config::ini::{IniDocument, IniSection};
use crate::exec::Executor;
use crate::state::document::{ShareEntry, StateDocument};

/// Default location of the live configuration.
pub const DEFAULT_SMB_CONF: &str = "/etc/samba/smb.conf";

/// Section names Samba reserves for itself.
pub const RESERVED_SECTIONS: &[&str] = &["global", "homes", "printers", "print$"];

const SMB_CONF_MODE: u32 = 0o644;

/// Values rendered into `[global]`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlobalSettings {
    /// NetBIOS name, also used as the server string.
    pub server_name: String,
    /// Workgroup.
    pub workgroup: String,
    /// Enable the Apple `fruit` extensions.
    pub macos_optimized: bool,
}

impl GlobalSettings {
    /// Extract global settings from a ledger.
    #[must_use]
    pub fn from_document(doc: &StateDocument) -> Self {
        Self {
            server_name: doc.server_name.clone().unwrap_or_default(),
            workgroup: doc.workgroup.clone().unwrap_or_default(),
            macos_optimized: doc.macos_optimized,
        }
    }
}

const fn yes_no(value: bool) -> &'static str {
    if value { "yes" } else { "no" }
}

/// Render `[global]` and `[homes]`.
#[must_use]
pub fn render_base(global: &GlobalSettings) -> IniDocument {
    let mut section = IniSection::new("global")
        .entry("workgroup", &global.workgroup)
        .entry("server string", &global.server_name)
        .entry("netbios name", &global.server_name)
        .entry("server role", "standalone server")
        .entry("security", "user")
        .entry("passdb backend", "tdbsam")
        .entry("map to guest", "never")
        .entry("obey pam restrictions", "yes")
        .entry("server min protocol", "SMB2_10")
        .entry("load printers", "no")
        .entry("printing", "bsd")
        .entry("printcap name", "/dev/null")
        .entry("disable spoolss", "yes")
        .entry("log file", "/var/log/samba/log.%m")
        .entry("max log size", "1000")
        .entry("logging", "file");

    if global.macos_optimized {
        section = section
            .entry("vfs objects", "catia fruit streams_xattr")
            .entry("fruit:metadata", "stream")
            .entry("fruit:model", "MacSamba")
            .entry("fruit:posix_rename", "yes")
            .entry("fruit:veto_appledouble", "no")
            .entry("fruit:wipe_intentionally_left_blank_rfork", "yes")
            .entry("fruit:delete_empty_adfiles", "yes");
    }

    let homes = IniSection::new("homes")
        .entry("comment", "Home Directories")
        .entry("browseable", "no")
        .entry("read only", "no")
        .entry("create mask", "0700")
        .entry("directory mask", "0700")
        .entry("valid users", "%S");

    let mut doc = IniDocument::new();
    doc.upsert_section(section);
    doc.upsert_section(homes);
    doc
}

/// Access expression granting every authenticated user.  Samba expresses
/// this by leaving `valid users` out.
pub const EVERYONE: &str = "*";

/// Render the section for one share.
#[must_use]
pub fn share_section(name: &str, share: &ShareEntry) -> IniSection {
    let mut section = IniSection::new(name)
        .entry("comment", &share.comment)
        .entry("path", share.mount_path.to_string_lossy())
        .entry("browseable", yes_no(share.browseable))
        .entry("read only", yes_no(share.read_only))
        .entry("create mask", &share.permissions)
        .entry("directory mask", &share.permissions);
    if share.valid_users != EVERYONE {
        section = section.entry("valid users", &share.valid_users);
    }
    section
        .entry("force user", &share.owner)
        .entry("force group", &share.group)
}

/// Render the complete configuration: base sections plus every share.
#[must_use]
pub fn render_full(global: &GlobalSettings, shares: &BTreeMap<String, ShareEntry>) -> IniDocument {
    let mut doc = render_base(global);
    for (name, share) in shares {
        doc.upsert_section(share_section(name, share));
    }
    doc
}

/// Whether `name` is reserved by Samba (case-insensitive).
#[must_use]
pub fn is_reserved_section(name: &str) -> bool {
    RESERVED_SECTIONS
        .iter()
        .any(|r| r.eq_ignore_ascii_case(name))
}

/// [`ShareConfigWriter`] for a file on disk, validated with `testparm`.
#[derive(Debug)]
pub struct SambaConfigFile<'a> {
    executor: &'a dyn Executor,
    path: PathBuf,
}

impl<'a> SambaConfigFile<'a> {
    /// Create an adapter for the configuration at `path`.
    #[must_use]
    pub fn new(executor: &'a dyn Executor, path: impl Into<PathBuf>) -> Self {
        Self {
            executor,
            path: path.into(),
        }
    }

    /// Live file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Backup file path.
    #[must_use]
    pub fn backup_path(&self) -> PathBuf {
        sibling(&self.path, "bak")
    }

    fn candidate_path(&self) -> PathBuf {
        sibling(&self.path, "candidate")
    }
}

impl ShareConfigWriter for SambaConfigFile<'_> {
    fn read_current(&self) -> ResourceResult<Option<IniDocument>> {
        let content = match fs::read_to_string(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(ResourceError::io(&self.path, e)),
        };
        IniDocument::parse(&content)
            .map(Some)
            .map_err(|e| ResourceError::InvalidState {
                resource: self.path.display().to_string(),
                reason: e.to_string(),
            })
    }

    fn validate(&self, doc: &IniDocument) -> ResourceResult<()> {
        let candidate = self.candidate_path();
        write_atomic(&candidate, doc.render().as_bytes(), SMB_CONF_MODE)
            .map_err(|e| ResourceError::io(&candidate, e))?;
        let result = self
            .executor
            .run_unchecked("testparm", &["-s", &candidate.to_string_lossy()]);
        if let Err(e) = remove_existing(&candidate) {
            tracing::debug!("failed to remove {}: {e}", candidate.display());
        }
        let result = result?;
        if result.success {
            Ok(())
        } else {
            Err(ResourceError::ConfigRejected {
                reason: result.stderr.trim().to_string(),
            })
        }
    }

    fn install(&self, doc: &IniDocument) -> ResourceResult<()> {
        self.backup()?;
        write_atomic(&self.path, doc.render().as_bytes(), SMB_CONF_MODE)
            .map_err(|e| ResourceError::io(&self.path, e))?;
        tracing::debug!("installed {}", self.path.display());
        Ok(())
    }

    fn backup(&self) -> ResourceResult<()> {
        let content = match fs::read(&self.path) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(()),
            Err(e) => return Err(ResourceError::io(&self.path, e)),
        };
        let backup = self.backup_path();
        write_atomic(&backup, &content, SMB_CONF_MODE).map_err(|e| ResourceError::io(&backup, e))
    }

    fn restore_backup(&self) -> ResourceResult<()> {
        let backup = self.backup_path();
        let content = match fs::read(&backup) {
            Ok(content) => content,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                return Err(ResourceError::NotFound {
                    resource: backup.display().to_string(),
                });
            }
            Err(e) => return Err(ResourceError::io(&backup, e)),
        };
        write_atomic(&self.path, &content, SMB_CONF_MODE)
            .map_err(|e| ResourceError::io(&self.path, e))
    }

    fn remove(&self) -> ResourceResult<()> {
        remove_existing(&self.path).map_err(|e| ResourceError::io(&self.path, e))?;
        Ok(())
    }
}
