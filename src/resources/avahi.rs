//! Avahi service advertisement so clients discover the server via mDNS.
use std::path::{Path, PathBuf};

use super::error::ResourceError;
use super::fs::{remove_existing, write_atomic};
use super::{DiscoveryConfigWriter, ResourceResult};

/// Default location of the service file.
pub const DEFAULT_AVAHI_SERVICE: &str = "/etc/avahi/services/smb.service";

const SERVICE_FILE_MODE: u32 = 0o644;

/// Render the service-group document: SMB on port 445 plus a device-info
/// record so macOS shows a server icon.
#[must_use]
pub fn render_service() -> String {
    r#"<?xml version="1.0" standalone='no'?>
<!DOCTYPE service-group SYSTEM "avahi-service.dtd">
<service-group>
  <name replace-wildcards="yes">%h</name>
  <service>
    <type>_smb._tcp</type>
    <port>445</port>
  </service>
  <service>
    <type>_device-info._tcp</type>
    <port>0</port>
    <txt-record>model=RackMac</txt-record>
  </service>
</service-group>
"#
    .to_string()
}

/// [`DiscoveryConfigWriter`] writing the Avahi service file.
#[derive(Debug, Clone)]
pub struct AvahiServiceFile {
    path: PathBuf,
}

impl AvahiServiceFile {
    /// Create an adapter for the service file at `path`.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Service file path.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl DiscoveryConfigWriter for AvahiServiceFile {
    fn install(&self) -> ResourceResult<()> {
        write_atomic(&self.path, render_service().as_bytes(), SERVICE_FILE_MODE)
            .map_err(|e| ResourceError::io(&self.path, e))
    }

    fn remove(&self) -> ResourceResult<()> {
        remove_existing(&self.path).map_err(|e| ResourceError::io(&self.path, e))?;
        Ok(())
    }
}
