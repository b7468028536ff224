//! Open options for packages.
//!
//! [`PackageOptions`] bundles the mode/access/share triple that every `open` call takes,
//! plus the resource limits applied while inflating part data. Options are plain serde
//! types and can be loaded from YAML.

use crate::opc::error::{OpcError, Result};
use serde::{Deserialize, Serialize};

/// How the container is opened or created.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileMode {
    /// Create a new container; fails if one already exists.
    CreateNew,
    /// Create a new container, truncating any existing one.
    Create,
    /// Open an existing container.
    Open,
    /// Open an existing container or create a new one.
    #[default]
    OpenOrCreate,
    /// Not supported for packages.
    Truncate,
    /// Not supported for packages.
    Append,
}

impl FileMode {
    /// Modes that may bring a new container into existence.
    #[inline]
    pub fn can_create(self) -> bool {
        matches!(
            self,
            FileMode::CreateNew | FileMode::Create | FileMode::OpenOrCreate
        )
    }
}

/// Read or read/write access to the container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileAccess {
    Read,
    #[default]
    ReadWrite,
}

impl FileAccess {
    #[inline]
    pub fn can_write(self) -> bool {
        self == FileAccess::ReadWrite
    }
}

/// Sharing the caller grants to other openers of the same file.
///
/// Packages validate the combination but do not enforce it beyond the operating system.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum FileShare {
    #[default]
    None,
    Read,
    Write,
    ReadWrite,
}

impl FileShare {
    #[inline]
    pub fn admits_writers(self) -> bool {
        matches!(self, FileShare::Write | FileShare::ReadWrite)
    }
}

/// Caps on inflated part data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageLimits {
    /// Largest single part, in bytes, that will be inflated into memory
    pub max_part_bytes: u64,

    /// Largest total of inflated part data, in bytes
    pub max_total_bytes: u64,
}

impl Default for PackageLimits {
    fn default() -> Self {
        Self {
            max_part_bytes: 256 * 1024 * 1024,
            max_total_bytes: 512 * 1024 * 1024,
        }
    }
}

/// Options for opening a package.
///
/// # Examples
///
/// ```
/// use opcpkg::opc::{FileAccess, FileMode, PackageOptions};
///
/// let options = PackageOptions::new()
///     .with_mode(FileMode::Open)
///     .with_access(FileAccess::Read);
/// assert!(options.validate().is_ok());
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PackageOptions {
    pub mode: FileMode,
    pub access: FileAccess,
    pub share: FileShare,
    pub limits: PackageLimits,
}

impl PackageOptions {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read-only options for an existing container.
    pub fn read_only() -> Self {
        Self {
            mode: FileMode::Open,
            access: FileAccess::Read,
            share: FileShare::Read,
            limits: PackageLimits::default(),
        }
    }

    pub fn with_mode(mut self, mode: FileMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_access(mut self, access: FileAccess) -> Self {
        self.access = access;
        self
    }

    pub fn with_share(mut self, share: FileShare) -> Self {
        self.share = share;
        self
    }

    pub fn with_limits(mut self, limits: PackageLimits) -> Self {
        self.limits = limits;
        self
    }

    /// Parse options from a YAML document. Missing keys take their defaults.
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        serde_saphyr::from_str(yaml)
            .map_err(|e| OpcError::Config(format!("Failed to parse package options: {}", e)))
    }

    /// Reject mode/access/share combinations that no container could satisfy.
    ///
    /// Checks run in a fixed order so the first problem reported is deterministic.
    pub fn validate(&self) -> Result<()> {
        if matches!(self.mode, FileMode::Append | FileMode::Truncate) {
            return Err(OpcError::UnsupportedMode(format!("{:?}", self.mode)));
        }
        if !self.access.can_write() && self.mode.can_create() {
            return Err(OpcError::InvalidArgument(format!(
                "mode {:?} cannot be combined with read-only access",
                self.mode
            )));
        }
        if self.access.can_write() && self.share.admits_writers() {
            return Err(OpcError::InvalidArgument(format!(
                "share mode {:?} lets other writers modify a package opened for writing",
                self.share
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let options = PackageOptions::default();
        assert_eq!(options.mode, FileMode::OpenOrCreate);
        assert_eq!(options.access, FileAccess::ReadWrite);
        assert_eq!(options.share, FileShare::None);
        assert_eq!(options.limits.max_part_bytes, 256 * 1024 * 1024);
        assert!(options.validate().is_ok());
        assert!(PackageOptions::read_only().validate().is_ok());
    }

    #[test]
    fn test_unsupported_modes() {
        for mode in [FileMode::Append, FileMode::Truncate] {
            let err = PackageOptions::new().with_mode(mode).validate().unwrap_err();
            assert!(matches!(err, OpcError::UnsupportedMode(_)));
        }
        // Mode is checked before access.
        let err = PackageOptions::new()
            .with_mode(FileMode::Append)
            .with_access(FileAccess::Read)
            .validate()
            .unwrap_err();
        assert!(matches!(err, OpcError::UnsupportedMode(_)));
    }

    #[test]
    fn test_create_requires_write_access() {
        for mode in [FileMode::Create, FileMode::CreateNew, FileMode::OpenOrCreate] {
            let err = PackageOptions::new()
                .with_mode(mode)
                .with_access(FileAccess::Read)
                .validate()
                .unwrap_err();
            assert!(matches!(err, OpcError::InvalidArgument(_)));
        }
    }

    #[test]
    fn test_writers_cannot_share_write() {
        let err = PackageOptions::new()
            .with_share(FileShare::ReadWrite)
            .validate()
            .unwrap_err();
        assert!(matches!(err, OpcError::InvalidArgument(_)));

        assert!(PackageOptions::new().with_share(FileShare::Read).validate().is_ok());
        assert!(PackageOptions::read_only()
            .with_share(FileShare::ReadWrite)
            .validate()
            .is_ok());
    }

    #[test]
    fn test_from_yaml() {
        let options = PackageOptions::from_yaml(
            "mode: Open\naccess: Read\nshare: Read\nlimits:\n  max_part_bytes: 1024\n",
        )
        .unwrap();
        assert_eq!(options.mode, FileMode::Open);
        assert_eq!(options.access, FileAccess::Read);
        assert_eq!(options.limits.max_part_bytes, 1024);
        assert_eq!(options.limits.max_total_bytes, 512 * 1024 * 1024);

        assert!(matches!(
            PackageOptions::from_yaml("mode: Sideways\n"),
            Err(OpcError::Config(_))
        ));
    }
}
