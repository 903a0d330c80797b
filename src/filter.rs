//! Which mounted filesystems the check looks at.
//!
//! Types and mount points are filtered independently, each by either an
//! include list or an exclude list. Matching is exact and case-sensitive.

use crate::models::filesystem::{FilesystemRecord, Partition};
use anyhow::{bail, Result};

/// An include list or an exclude list over one dimension. Never both.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ListFilter {
    pub include: Vec<String>,
    pub exclude: Vec<String>,
}

impl ListFilter {
    pub fn new(include: Vec<String>, exclude: Vec<String>) -> Self {
        Self { include, exclude }
    }

    pub fn admits(&self, value: &str) -> bool {
        if !self.include.is_empty() {
            self.include.iter().any(|v| v == value)
        } else if !self.exclude.is_empty() {
            !self.exclude.iter().any(|v| v == value)
        } else {
            true
        }
    }

    fn is_conflicting(&self) -> bool {
        !self.include.is_empty() && !self.exclude.is_empty()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FilterConfig {
    pub fs_type:           ListFilter,
    pub fs_path:           ListFilter,
    /// Passed through to enumeration; pseudo filesystems are never returned otherwise.
    pub include_pseudo:    bool,
    pub include_read_only: bool,
}

impl FilterConfig {
    pub fn validate(&self) -> Result<()> {
        if self.fs_type.is_conflicting() {
            bail!("--include-fs-type and --exclude-fs-type are mutually exclusive");
        }
        if self.fs_path.is_conflicting() {
            bail!("--include-fs-path and --exclude-fs-path are mutually exclusive");
        }
        Ok(())
    }

    pub fn is_valid_fs_type(&self, fs_type: &str) -> bool {
        self.fs_type.admits(fs_type)
    }

    pub fn is_valid_fs_path(&self, path: &str) -> bool {
        self.fs_path.admits(path)
    }

    /// Checks that need no usage figures. Applied before measuring a mount.
    pub fn admits(&self, part: &Partition) -> bool {
        self.is_valid_fs_type(&part.fs_type)
            && self.is_valid_fs_path(&part.mountpoint)
            && (self.include_read_only || !part.is_read_only())
    }

    pub fn is_eligible(&self, rec: &FilesystemRecord) -> bool {
        !rec.is_empty()
            && self.is_valid_fs_type(&rec.fs_type)
            && self.is_valid_fs_path(&rec.mountpoint)
            && (self.include_read_only || !rec.is_read_only())
    }
}
