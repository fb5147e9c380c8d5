//! systemd service control for the Samba and Avahi daemons.
use std::fmt;

use serde::{Deserialize, Serialize};

use super::{ResourceResult, ServiceController};
use crate::exec::Executor;

/// Daemons managed by smb-zfs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Service {
    /// Samba file server.
    Smbd,
    /// NetBIOS name server.
    Nmbd,
    /// mDNS responder.
    Avahi,
}

impl Service {
    /// Every managed service, in start order.
    pub const ALL: [Self; 3] = [Self::Smbd, Self::Nmbd, Self::Avahi];

    /// Services that read `smb.conf`.
    pub const SAMBA: [Self; 2] = [Self::Smbd, Self::Nmbd];
}

impl fmt::Display for Service {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Smbd => write!(f, "smbd"),
            Self::Nmbd => write!(f, "nmbd"),
            Self::Avahi => write!(f, "avahi-daemon"),
        }
    }
}

/// systemd unit names for each [`Service`]; distributions differ
/// (`smb` vs `smbd`).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServiceUnits {
    /// Unit for [`Service::Smbd`].
    pub smbd: String,
    /// Unit for [`Service::Nmbd`].
    pub nmbd: String,
    /// Unit for [`Service::Avahi`].
    pub avahi: String,
}

impl Default for ServiceUnits {
    fn default() -> Self {
        Self {
            smbd: Service::Smbd.to_string(),
            nmbd: Service::Nmbd.to_string(),
            avahi: Service::Avahi.to_string(),
        }
    }
}

impl ServiceUnits {
    /// Unit name for `service`.
    #[must_use]
    pub fn unit(&self, service: Service) -> &str {
        match service {
            Service::Smbd => &self.smbd,
            Service::Nmbd => &self.nmbd,
            Service::Avahi => &self.avahi,
        }
    }
}

/// [`ServiceController`] backed by `systemctl`.
#[derive(Debug)]
pub struct Systemctl<'a> {
    executor: &'a dyn Executor,
    units: ServiceUnits,
}

impl<'a> Systemctl<'a> {
    /// Create a controller using the given unit names.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor, units: ServiceUnits) -> Self {
        Self { executor, units }
    }

    fn checked(&self, verb: &str, service: Service) -> ResourceResult<()> {
        self.executor
            .run("systemctl", &[verb, self.units.unit(service)])?;
        Ok(())
    }

    fn tolerant(&self, verb: &str, service: Service) -> ResourceResult<()> {
        let unit = self.units.unit(service);
        let result = self.executor.run_unchecked("systemctl", &[verb, unit])?;
        if !result.success {
            tracing::debug!("systemctl {verb} {unit} ignored: {}", result.stderr.trim());
        }
        Ok(())
    }
}

impl ServiceController for Systemctl<'_> {
    fn reload(&self, service: Service) -> ResourceResult<()> {
        self.checked("reload", service)
    }

    fn restart(&self, service: Service) -> ResourceResult<()> {
        self.checked("restart", service)
    }

    fn enable(&self, service: Service) -> ResourceResult<()> {
        self.checked("enable", service)
    }

    fn disable(&self, service: Service) -> ResourceResult<()> {
        self.tolerant("disable", service)
    }

    fn stop(&self, service: Service) -> ResourceResult<()> {
        self.tolerant("stop", service)
    }
}
