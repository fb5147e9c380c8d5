//! Tool settings and the INI model used for `smb.conf`.
//!
//! Settings are read from an optional TOML file (default
//! `/etc/smb-zfs/config.toml`).  Every key is optional:
//!
//! ```toml
//! required_tools = ["zfs", "zpool", "smbpasswd"]
//!
//! [paths]
//! state_file = "/var/lib/smb-zfs.state"
//! smb_conf = "/etc/samba/smb.conf"
//! avahi_service = "/etc/avahi/services/smb.service"
//!
//! [services]
//! smbd = "smbd"
//! nmbd = "nmbd"
//! avahi = "avahi-daemon"
//!
//! [shells]
//! login = "/bin/bash"
//! nologin = "/usr/sbin/nologin"
//! ```
pub mod ini;
pub mod toml_loader;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;
use crate::resources::account::{DEFAULT_LOGIN_SHELL, DEFAULT_NOLOGIN_SHELL};
use crate::resources::avahi::DEFAULT_AVAHI_SERVICE;
use crate::resources::service::ServiceUnits;
use crate::resources::smb_conf::DEFAULT_SMB_CONF;
use crate::state::DEFAULT_STATE_PATH;

/// Default settings file.
pub const DEFAULT_CONFIG_PATH: &str = "/etc/smb-zfs/config.toml";

/// Tools that must be on `PATH` before any operation runs.
pub const DEFAULT_REQUIRED_TOOLS: &[&str] = &[
    "zfs", "zpool", "smbpasswd", "pdbedit", "testparm", "systemctl", "getent", "useradd",
    "userdel", "usermod", "groupadd", "groupdel", "gpasswd", "chpasswd", "chown", "chmod",
];

/// File locations.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Paths {
    /// Ledger file.
    pub state_file: PathBuf,
    /// Samba configuration.
    pub smb_conf: PathBuf,
    /// Avahi service file.
    pub avahi_service: PathBuf,
}

impl Default for Paths {
    fn default() -> Self {
        Self {
            state_file: PathBuf::from(DEFAULT_STATE_PATH),
            smb_conf: PathBuf::from(DEFAULT_SMB_CONF),
            avahi_service: PathBuf::from(DEFAULT_AVAHI_SERVICE),
        }
    }
}

/// Login shells assigned to managed users.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Shells {
    /// Shell for users with shell access.
    pub login: String,
    /// Shell for share-only users.
    pub nologin: String,
}

impl Default for Shells {
    fn default() -> Self {
        Self {
            login: DEFAULT_LOGIN_SHELL.to_string(),
            nologin: DEFAULT_NOLOGIN_SHELL.to_string(),
        }
    }
}

/// All tool settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Settings {
    /// File locations.
    pub paths: Paths,
    /// systemd unit names.
    pub services: ServiceUnits,
    /// Login shells.
    pub shells: Shells,
    /// Tools checked before running.
    pub required_tools: Vec<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            paths: Paths::default(),
            services: ServiceUnits::default(),
            shells: Shells::default(),
            required_tools: DEFAULT_REQUIRED_TOOLS
                .iter()
                .map(ToString::to_string)
                .collect(),
        }
    }
}

impl Settings {
    /// Load settings from `path`, or from [`DEFAULT_CONFIG_PATH`] when `None`.
    ///
    /// A missing default file yields [`Settings::default`]; an explicitly
    /// named file must exist.
    ///
    /// # Errors
    ///
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        match path {
            Some(path) => {
                if !path.exists() {
                    return Err(ConfigError::Io {
                        path: path.to_path_buf(),
                        source: std::io::Error::new(
                            std::io::ErrorKind::NotFound,
                            "config file not found",
                        ),
                    });
                }
                toml_loader::load_config(path)
            }
            None => toml_loader::load_config(Path::new(DEFAULT_CONFIG_PATH)),
        }
    }

    /// Override the ledger location.
    #[must_use]
    pub fn with_state_file(mut self, path: Option<PathBuf>) -> Self {
        if let Some(path) = path {
            self.paths.state_file = path;
        }
        self
    }
}

#[cfg(test)]
#[allow(clippy::expect_used, clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn defaults_point_at_system_locations() {
        let settings = Settings::default();
        assert_eq!(settings.paths.state_file, PathBuf::from("/var/lib/smb-zfs.state"));
        assert_eq!(settings.paths.smb_conf, PathBuf::from("/etc/samba/smb.conf"));
        assert_eq!(settings.services.avahi, "avahi-daemon");
        assert_eq!(settings.shells.nologin, "/usr/sbin/nologin");
        assert!(settings.required_tools.iter().any(|t| t == "testparm"));
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[services]\nsmbd = \"smb\"\nnmbd = \"nmb\"\n").unwrap();
        let settings = Settings::load(Some(&path)).unwrap();
        assert_eq!(settings.services.smbd, "smb");
        assert_eq!(settings.services.avahi, "avahi-daemon");
        assert_eq!(settings.paths, Paths::default());
    }

    #[test]
    fn unknown_keys_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[paths]\nstate = \"/tmp/x\"\n").unwrap();
        assert!(matches!(
            Settings::load(Some(&path)),
            Err(ConfigError::InvalidSyntax { .. })
        ));
    }

    #[test]
    fn explicit_missing_file_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let err = Settings::load(Some(&dir.path().join("nope.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn state_override() {
        let settings = Settings::default().with_state_file(Some("/tmp/s.state".into()));
        assert_eq!(settings.paths.state_file, PathBuf::from("/tmp/s.state"));
        let untouched = Settings::default().with_state_file(None);
        assert_eq!(untouched.paths.state_file, PathBuf::from(DEFAULT_STATE_PATH));
    }
}
