//! ZFS dataset adapter.
use std::path::{Path, PathBuf};

use super::error::ResourceError;
use super::{DatasetManager, ResourceResult};
use crate::exec::Executor;

/// [`DatasetManager`] backed by the `zfs` and `zpool` command-line tools.
#[derive(Debug)]
pub struct ZfsDatasets<'a> {
    executor: &'a dyn Executor,
}

impl<'a> ZfsDatasets<'a> {
    /// Create an adapter that runs commands through `executor`.
    #[must_use]
    pub const fn new(executor: &'a dyn Executor) -> Self {
        Self { executor }
    }

    fn property(&self, dataset: &str, property: &str) -> ResourceResult<String> {
        let result = self
            .executor
            .run("zfs", &["get", "-H", "-o", "value", property, dataset])?;
        Ok(result.stdout.trim().to_string())
    }
}

impl DatasetManager for ZfsDatasets<'_> {
    fn pool_exists(&self, pool: &str) -> ResourceResult<bool> {
        Ok(self.list_pools()?.iter().any(|p| p == pool))
    }

    fn list_pools(&self) -> ResourceResult<Vec<String>> {
        let result = self.executor.run("zpool", &["list", "-H", "-o", "name"])?;
        Ok(result
            .stdout
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty())
            .map(String::from)
            .collect())
    }

    fn exists(&self, dataset: &str) -> ResourceResult<bool> {
        let result = self
            .executor
            .run_unchecked("zfs", &["list", "-H", "-o", "name", dataset])?;
        Ok(result.success)
    }

    fn create(&self, dataset: &str) -> ResourceResult<()> {
        if self.exists(dataset)? {
            tracing::debug!("dataset {dataset} already exists");
            return Ok(());
        }
        self.executor.run("zfs", &["create", "-p", dataset])?;
        Ok(())
    }

    fn destroy(&self, dataset: &str, recursive: bool) -> ResourceResult<()> {
        if recursive {
            self.executor.run("zfs", &["destroy", "-r", dataset])?;
        } else {
            self.executor.run("zfs", &["destroy", dataset])?;
        }
        Ok(())
    }

    fn mountpoint(&self, dataset: &str) -> ResourceResult<PathBuf> {
        let value = self.property(dataset, "mountpoint")?;
        if value.starts_with('/') {
            Ok(PathBuf::from(value))
        } else {
            Err(ResourceError::InvalidState {
                resource: dataset.to_string(),
                reason: format!("dataset has no usable mountpoint ({value})"),
            })
        }
    }

    fn set_quota(&self, dataset: &str, quota: Option<&str>) -> ResourceResult<()> {
        let assignment = format!("quota={}", quota.unwrap_or("none"));
        self.executor.run("zfs", &["set", &assignment, dataset])?;
        Ok(())
    }

    fn quota(&self, dataset: &str) -> ResourceResult<Option<String>> {
        let value = self.property(dataset, "quota")?;
        Ok(match value.as_str() {
            "" | "-" | "none" | "0" => None,
            _ => Some(value),
        })
    }

    fn set_ownership(
        &self,
        path: &Path,
        owner: &str,
        group: &str,
        mode: &str,
    ) -> ResourceResult<()> {
        let path = path.to_string_lossy();
        self.executor
            .run("chown", &[&format!("{owner}:{group}"), &path])?;
        self.executor.run("chmod", &[mode, &path])?;
        Ok(())
    }
}
