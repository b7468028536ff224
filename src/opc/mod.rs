//! Open Packaging Conventions (OPC) implementation.
//!
//! This module implements the package layer shared by Office Open XML documents:
//!
//! - Part names and pack URIs ([`PackURI`], [`packuri`])
//! - Parts and their content types ([`Part`])
//! - Relationship graphs stored in `_rels/*.rels` parts ([`Relationships`])
//! - Core document properties ([`PackageProperties`])
//! - The package facade ([`Package`]) over a pluggable [`PackageBackend`]
//! - ZIP-based physical storage ([`ZipPackage`])

pub mod constants;
pub mod content_types;
pub mod error;
pub mod options;
pub mod package;
pub mod packuri;
pub mod part;
pub mod phys_pkg;
pub mod properties;
pub mod rel;
pub mod stream;
mod xml;

// Re-export commonly used types
pub use error::{OpcError, Result};
pub use options::{FileAccess, FileMode, FileShare, PackageLimits, PackageOptions};
pub use package::{Package, PackageBackend};
pub use packuri::PackURI;
pub use part::{CompressionOption, Part, PartIndex};
pub use phys_pkg::{ContainerStream, ZipBackend, ZipPackage};
pub use properties::PackageProperties;
pub use rel::{Relationship, Relationships, TargetMode};
pub use stream::{PartStream, SharedBuffer};
