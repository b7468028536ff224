//! Objects that implement reading and writing OPC packages.
//!
//! This module provides the main [`Package`] type, which represents an Open Packaging
//! Convention package over a storage backend. It owns the part index cache, every loaded
//! relationship graph and the core properties, and keeps the synthetic `.rels` parts in
//! step with the in-memory graphs.
//!
//! Storage is delegated to a [`PackageBackend`]; the ZIP implementation lives in
//! [`crate::opc::phys_pkg`].

use crate::opc::constants::{content_type as ct, part_name, relationship_type};
use crate::opc::content_types::validate_content_type;
use crate::opc::error::{OpcError, Result};
use crate::opc::options::{FileAccess, FileMode};
use crate::opc::packuri::{self, PackURI};
use crate::opc::part::{CompressionOption, Part, PartIndex};
use crate::opc::properties::PackageProperties;
use crate::opc::rel::{Relationship, Relationships, TargetMode};
use crate::opc::stream::{PartStream, SharedBuffer};
use std::collections::HashMap;
use tracing::{debug, warn};

/// Storage capability behind a [`Package`].
///
/// A backend owns the physical parts and their byte buffers. It performs no validation
/// of its own: [`Package`] checks names, content types and access before delegating.
pub trait PackageBackend {
    /// Allocate a new, empty part.
    fn create_part_core(
        &mut self,
        partname: &PackURI,
        content_type: &str,
        compression: CompressionOption,
    ) -> Result<Part>;

    /// Look up a part, discovering the container's parts first if needed.
    fn get_part_core(&mut self, partname: &PackURI) -> Result<Option<Part>>;

    /// Enumerate every part, relationship parts included, in index order.
    fn get_parts_core(&mut self) -> Result<Vec<Part>>;

    /// Physically drop a part and its buffer. Unknown names are ignored.
    fn delete_part_core(&mut self, partname: &PackURI) -> Result<()>;

    /// The shared buffer backing a part, materializing it on first use.
    fn open_stream_core(&mut self, partname: &PackURI) -> Result<SharedBuffer>;

    /// Persist every part to the container.
    fn flush_core(&mut self) -> Result<()>;

    /// Release buffers and container resources. Called once, after the final flush.
    fn close_core(&mut self) -> Result<()>;

    /// Problems found while discovering the container's parts.
    fn discovery_issues(&self) -> &[String] {
        &[]
    }
}

#[derive(Debug)]
struct PropertiesState {
    props: PackageProperties,

    /// Part holding the properties, if the package has (or targets) one
    partname: Option<PackURI>,
}

/// An OPC package over a storage backend.
///
/// Parts, relationship graphs and properties are loaded on first access. All access
/// methods take `&mut self` because a lookup may trigger that lazy loading.
///
/// Dropping a package closes it: writable packages are flushed once and any error is
/// logged. Call [`Package::close`] to observe the error instead.
pub struct Package<B: PackageBackend> {
    backend: B,
    access: FileAccess,

    /// Cache of parts already seen through the backend
    parts: PartIndex,

    /// Loaded relationship graphs, keyed by source (the package root included)
    relationships: HashMap<PackURI, Relationships>,

    properties: Option<PropertiesState>,
    flushing: bool,
    closed: bool,
}

impl<B: PackageBackend> Package<B> {
    /// Wrap a backend. `access` decides whether mutations are allowed.
    pub fn with_backend(backend: B, access: FileAccess) -> Self {
        Self {
            backend,
            access,
            parts: PartIndex::new(),
            relationships: HashMap::new(),
            properties: None,
            flushing: false,
            closed: false,
        }
    }

    #[inline]
    pub fn access(&self) -> FileAccess {
        self.access
    }

    #[inline]
    pub fn is_read_only(&self) -> bool {
        !self.access.can_write()
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Get a reference to the storage backend.
    #[inline]
    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub(crate) fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    /// Problems recorded while discovering parts from the container.
    ///
    /// Discovery never fails the open: a damaged container shows up as an empty package
    /// and the reasons are listed here.
    pub fn discovery_issues(&self) -> &[String] {
        self.backend.discovery_issues()
    }

    fn check_open(&self) -> Result<()> {
        if self.closed {
            return Err(OpcError::InvalidArgument(
                "package has been closed".to_string(),
            ));
        }
        Ok(())
    }

    fn check_writable(&self) -> Result<()> {
        self.check_open()?;
        if self.is_read_only() {
            return Err(OpcError::ReadOnlyViolation);
        }
        Ok(())
    }

    // ==================================================================
    // Parts
    // ==================================================================

    /// Create a new, empty part.
    ///
    /// # Arguments
    /// * `partname` - Name of the new part
    /// * `content_type` - Non-empty `type/subtype` content type
    /// * `compression` - Compression hint used when the package is written
    ///
    /// # Errors
    /// `ReadOnlyViolation` for read-only packages, `InvalidContentType` for an empty or
    /// malformed content type, `DuplicatePart` when the name is taken. Relationship parts
    /// are managed by the package and cannot be created directly.
    pub fn create_part(
        &mut self,
        partname: &PackURI,
        content_type: &str,
        compression: CompressionOption,
    ) -> Result<Part> {
        self.check_writable()?;
        if content_type.is_empty() {
            return Err(OpcError::InvalidContentType(format!(
                "a content type is required for part '{}'",
                partname
            )));
        }
        validate_content_type(content_type)?;
        if partname.is_package_root() {
            return Err(OpcError::InvalidPartUri(
                "the package root is not a part".to_string(),
            ));
        }
        if packuri::is_relationship_part_name(partname.as_str()) {
            return Err(OpcError::InvalidArgument(format!(
                "relationship part '{}' is managed by the package",
                partname
            )));
        }
        if self.lookup_part(partname)?.is_some() {
            return Err(OpcError::DuplicatePart(partname.to_string()));
        }

        let part = self.create_part_internal(partname, content_type, compression)?;
        debug!(partname = %partname, content_type, ?compression, "Created part");
        Ok(part)
    }

    /// Get a part by name. Lookup is case-insensitive.
    pub fn get_part(&mut self, partname: &PackURI) -> Result<Option<Part>> {
        self.check_open()?;
        self.lookup_part(partname)
    }

    /// Whether a part with this name exists.
    pub fn part_exists(&mut self, partname: &PackURI) -> Result<bool> {
        Ok(self.get_part(partname)?.is_some())
    }

    /// Enumerate the application-visible parts, freshly from the backend.
    ///
    /// Relationship parts are not included.
    pub fn get_parts(&mut self) -> Result<Vec<Part>> {
        self.check_open()?;
        let all = self.backend.get_parts_core()?;
        let mut index = PartIndex::new();
        for part in &all {
            index.insert(part.clone());
        }
        self.parts = index;
        Ok(all
            .into_iter()
            .filter(|part| !part.is_relationship_part())
            .collect())
    }

    /// Delete a part. Deleting a part that does not exist is a no-op.
    ///
    /// A content part takes its relationship part with it. Deleting a relationship part
    /// directly leaves its owner with no relationships.
    pub fn delete_part(&mut self, partname: &PackURI) -> Result<()> {
        self.check_writable()?;
        let Some(part) = self.lookup_part(partname)? else {
            return Ok(());
        };

        if part.is_relationship_part() {
            if let Ok(owner) = packuri::source_part_for_relationship_part(partname) {
                self.relationships.remove(&owner);
            }
        } else {
            self.relationships.remove(partname);
            let rels_name = packuri::relationship_part_name_for(partname)?;
            if let Some(rels_part) = self.lookup_part(&rels_name)? {
                self.drop_part(&rels_part)?;
            }
            let holds_properties = self
                .properties
                .as_ref()
                .and_then(|state| state.partname.as_ref())
                == Some(partname);
            if holds_properties {
                self.properties = None;
            }
        }

        self.drop_part(&part)?;
        debug!(partname = %partname, "Deleted part");
        Ok(())
    }

    /// Delete the part behind a handle.
    ///
    /// Fails with `PartAlreadyRemoved` if the handle's part was already deleted.
    pub fn remove_part(&mut self, part: &Part) -> Result<()> {
        if part.is_removed() {
            return Err(OpcError::PartAlreadyRemoved(part.partname().to_string()));
        }
        self.delete_part(part.partname())
    }

    /// Open a stream over a part's bytes.
    ///
    /// Every stream on a part views the same buffer, so writes through one stream are
    /// seen by the others. `FileMode::Create` truncates the part first.
    ///
    /// # Errors
    /// `ReadOnlyViolation` when asking for write access on a read-only package,
    /// `UnsupportedMode` for `Append`/`Truncate`, `PartNotFound` for unknown parts.
    /// Relationship parts can only be opened for reading.
    pub fn get_stream(
        &mut self,
        partname: &PackURI,
        mode: FileMode,
        access: FileAccess,
    ) -> Result<PartStream> {
        self.check_open()?;
        if access.can_write() && self.is_read_only() {
            return Err(OpcError::ReadOnlyViolation);
        }
        if matches!(mode, FileMode::Append | FileMode::Truncate) {
            return Err(OpcError::UnsupportedMode(format!("{:?}", mode)));
        }
        let part = self
            .lookup_part(partname)?
            .ok_or_else(|| OpcError::PartNotFound(partname.to_string()))?;
        if part.is_relationship_part() && access.can_write() {
            return Err(OpcError::InvalidArgument(format!(
                "relationship part '{}' cannot be opened for writing",
                partname
            )));
        }

        let buffer = self.backend.open_stream_core(partname)?;
        match mode {
            FileMode::Create => {
                if !access.can_write() {
                    return Err(OpcError::InvalidArgument(
                        "FileMode::Create needs write access".to_string(),
                    ));
                }
                buffer.lock().clear();
            },
            FileMode::CreateNew if !buffer.lock().is_empty() => {
                return Err(OpcError::InvalidArgument(format!(
                    "part '{}' already has content",
                    partname
                )));
            },
            _ => {},
        }
        Ok(PartStream::new(buffer, access.can_write()))
    }

    /// Open a stream on a part handle with the package's own access.
    pub fn part_stream(&mut self, part: &Part) -> Result<PartStream> {
        if part.is_removed() {
            return Err(OpcError::PartAlreadyRemoved(part.partname().to_string()));
        }
        let access = if part.is_relationship_part() {
            FileAccess::Read
        } else {
            self.access
        };
        self.get_stream(part.partname(), FileMode::OpenOrCreate, access)
    }

    /// Follow the single root relationship of `reltype` to its target part.
    ///
    /// Document consumers use this to find their main part, e.g. with
    /// `relationship_type::OFFICE_DOCUMENT`.
    pub fn part_by_relationship_type(&mut self, reltype: &str) -> Result<Part> {
        self.check_open()?;
        let target = self
            .load_relationships(&PackURI::package_root())?
            .part_with_reltype(reltype)?
            .target_partname()?;
        self.lookup_part(&target)?
            .ok_or_else(|| OpcError::PartNotFound(target.to_string()))
    }

    fn lookup_part(&mut self, partname: &PackURI) -> Result<Option<Part>> {
        if let Some(part) = self.parts.get(partname) {
            return Ok(Some(part.clone()));
        }
        let found = self.backend.get_part_core(partname)?;
        if let Some(part) = &found {
            self.parts.insert(part.clone());
        }
        Ok(found)
    }

    fn create_part_internal(
        &mut self,
        partname: &PackURI,
        content_type: &str,
        compression: CompressionOption,
    ) -> Result<Part> {
        let part = self
            .backend
            .create_part_core(partname, content_type, compression)?;
        self.parts.insert(part.clone());
        Ok(part)
    }

    fn drop_part(&mut self, part: &Part) -> Result<()> {
        self.backend.delete_part_core(part.partname())?;
        self.parts.remove(part.partname());
        part.mark_removed();
        Ok(())
    }

    // ==================================================================
    // Relationships
    // ==================================================================

    /// Create a package-level relationship.
    ///
    /// # Arguments
    /// * `target_uri` - Target relative to the package root, or any URI when external
    /// * `target_mode` - Internal or external target
    /// * `reltype` - Relationship type URI
    /// * `id` - Explicit id, or `None` for the next free `Re<n>`
    pub fn create_relationship(
        &mut self,
        target_uri: &str,
        target_mode: TargetMode,
        reltype: &str,
        id: Option<&str>,
    ) -> Result<Relationship> {
        self.add_relationship(&PackURI::package_root(), target_uri, target_mode, reltype, id)
    }

    /// Create a relationship owned by the part `source`.
    pub fn create_part_relationship(
        &mut self,
        source: &PackURI,
        target_uri: &str,
        target_mode: TargetMode,
        reltype: &str,
        id: Option<&str>,
    ) -> Result<Relationship> {
        self.add_relationship(source, target_uri, target_mode, reltype, id)
    }

    /// Delete a package-level relationship. Unknown ids are ignored.
    pub fn delete_relationship(&mut self, id: &str) -> Result<()> {
        self.remove_relationship(&PackURI::package_root(), id)
    }

    /// Delete a relationship owned by the part `source`. Unknown ids are ignored.
    pub fn delete_part_relationship(&mut self, source: &PackURI, id: &str) -> Result<()> {
        self.remove_relationship(source, id)
    }

    /// Package-level relationships.
    pub fn relationships(&mut self) -> Result<&Relationships> {
        self.check_open()?;
        let rels = self.load_relationships(&PackURI::package_root())?;
        Ok(&*rels)
    }

    /// Relationships owned by the part `source`.
    pub fn part_relationships(&mut self, source: &PackURI) -> Result<&Relationships> {
        self.check_open()?;
        self.check_source(source)?;
        let rels = self.load_relationships(source)?;
        Ok(&*rels)
    }

    /// Package-level relationship by id.
    pub fn get_relationship(&mut self, id: &str) -> Result<Option<Relationship>> {
        Ok(self.relationships()?.get(id).cloned())
    }

    /// Package-level relationships of one type, in creation order.
    pub fn get_relationships_by_type(&mut self, reltype: &str) -> Result<Vec<Relationship>> {
        Ok(self.relationships()?.by_type(reltype).cloned().collect())
    }

    pub fn relationship_exists(&mut self, id: &str) -> Result<bool> {
        Ok(self.relationships()?.contains(id))
    }

    pub fn get_part_relationship(
        &mut self,
        source: &PackURI,
        id: &str,
    ) -> Result<Option<Relationship>> {
        Ok(self.part_relationships(source)?.get(id).cloned())
    }

    pub fn part_relationship_exists(&mut self, source: &PackURI, id: &str) -> Result<bool> {
        Ok(self.part_relationships(source)?.contains(id))
    }

    /// The package root, or an existing content part.
    fn check_source(&mut self, source: &PackURI) -> Result<()> {
        if source.is_package_root() {
            return Ok(());
        }
        if packuri::is_relationship_part_name(source.as_str()) {
            return Err(OpcError::InvalidArgument(format!(
                "relationship part '{}' cannot own relationships",
                source
            )));
        }
        match self.lookup_part(source)? {
            Some(_) => Ok(()),
            None => Err(OpcError::PartNotFound(source.to_string())),
        }
    }

    fn load_relationships(&mut self, source: &PackURI) -> Result<&mut Relationships> {
        if !self.relationships.contains_key(source) {
            let rels = self.read_relationships(source)?;
            self.relationships.insert(source.clone(), rels);
        }
        self.relationships
            .get_mut(source)
            .ok_or_else(|| OpcError::RelationshipNotFound(source.to_string()))
    }

    /// Parse the owner's `.rels` part; a missing part means no relationships.
    fn read_relationships(&mut self, source: &PackURI) -> Result<Relationships> {
        let rels_name = packuri::relationship_part_name_for(source)?;
        if self.lookup_part(&rels_name)?.is_none() {
            return Ok(Relationships::new(source.clone()));
        }
        let buffer = self.backend.open_stream_core(&rels_name)?;
        let xml = buffer.lock().clone();
        let rels = Relationships::from_xml(source.clone(), &xml)?;
        debug!(source = %source, count = rels.len(), "Loaded relationships");
        Ok(rels)
    }

    fn add_relationship(
        &mut self,
        source: &PackURI,
        target_uri: &str,
        target_mode: TargetMode,
        reltype: &str,
        id: Option<&str>,
    ) -> Result<Relationship> {
        self.check_writable()?;
        self.check_source(source)?;
        let rel = self
            .load_relationships(source)?
            .add(target_uri, target_mode, reltype, id)?
            .clone();

        if let Err(e) = self.write_relationships(source) {
            if let Some(rels) = self.relationships.get_mut(source) {
                rels.remove(rel.id());
            }
            return Err(e);
        }
        debug!(source = %source, id = rel.id(), reltype, "Created relationship");
        Ok(rel)
    }

    fn remove_relationship(&mut self, source: &PackURI, id: &str) -> Result<()> {
        self.check_writable()?;
        self.check_source(source)?;
        if self.load_relationships(source)?.remove(id).is_none() {
            return Ok(());
        }
        self.write_relationships(source)?;
        debug!(source = %source, id, "Deleted relationship");
        Ok(())
    }

    /// Rewrite the owner's `.rels` part from its graph, creating the part for the first
    /// relationship and deleting it after the last one.
    fn write_relationships(&mut self, source: &PackURI) -> Result<()> {
        let rels_name = packuri::relationship_part_name_for(source)?;
        let xml = self
            .relationships
            .get(source)
            .filter(|rels| !rels.is_empty())
            .map(Relationships::to_xml);

        match xml {
            None => {
                if let Some(rels_part) = self.lookup_part(&rels_name)? {
                    self.drop_part(&rels_part)?;
                }
            },
            Some(xml) => {
                if self.lookup_part(&rels_name)?.is_none() {
                    self.create_part_internal(
                        &rels_name,
                        ct::OPC_RELATIONSHIPS,
                        CompressionOption::Normal,
                    )?;
                }
                let buffer = self.backend.open_stream_core(&rels_name)?;
                *buffer.lock() = xml.into_bytes();
            },
        }
        Ok(())
    }

    // ==================================================================
    // Properties
    // ==================================================================

    /// Core properties, loaded from the part targeted by the core-properties relationship.
    ///
    /// A package without such a part yields empty properties; nothing is written for them
    /// unless a value is set.
    pub fn package_properties(&mut self) -> Result<&PackageProperties> {
        self.check_open()?;
        Ok(&self.load_properties()?.props)
    }

    /// Mutable core properties. Changes are written on the next flush.
    pub fn package_properties_mut(&mut self) -> Result<&mut PackageProperties> {
        self.check_writable()?;
        Ok(&mut self.load_properties()?.props)
    }

    fn load_properties(&mut self) -> Result<&mut PropertiesState> {
        let state = match self.properties.take() {
            Some(state) => state,
            None => self.read_properties()?,
        };
        Ok(self.properties.insert(state))
    }

    fn read_properties(&mut self) -> Result<PropertiesState> {
        let partname = self
            .load_relationships(&PackURI::package_root())?
            .by_type(relationship_type::CORE_PROPERTIES)
            .find(|rel| !rel.is_external())
            .map(Relationship::target_partname)
            .transpose()?;

        let exists = match &partname {
            Some(name) => self.lookup_part(name)?.is_some(),
            None => false,
        };
        let props = match &partname {
            Some(name) if exists => {
                let buffer = self.backend.open_stream_core(name)?;
                let xml = buffer.lock().clone();
                PackageProperties::from_xml(&xml)?
            },
            _ => PackageProperties::new(),
        };
        Ok(PropertiesState { props, partname })
    }

    fn flush_properties(&mut self) -> Result<()> {
        let Some(state) = self.properties.as_ref() else {
            return Ok(());
        };
        if !state.props.is_dirty() {
            return Ok(());
        }
        let has_data = state.props.has_data();
        let xml = state.props.to_xml();
        let target = state.partname.clone();

        let target_exists = match &target {
            Some(name) => self.lookup_part(name)?.is_some(),
            None => false,
        };
        if !has_data && !target_exists {
            if let Some(state) = self.properties.as_mut() {
                state.props.mark_clean();
            }
            return Ok(());
        }

        let partname = match target {
            Some(name) => name,
            None => PackURI::new(part_name::CORE_PROPERTIES)?,
        };
        if self.lookup_part(&partname)?.is_none() {
            self.create_part_internal(&partname, ct::OPC_CORE_PROPERTIES, CompressionOption::Normal)?;
        }
        let root = PackURI::package_root();
        let has_relationship = self
            .load_relationships(&root)?
            .by_type(relationship_type::CORE_PROPERTIES)
            .any(|rel| !rel.is_external());
        if !has_relationship {
            let target_ref = packuri::relativize(&root, &partname);
            self.add_relationship(
                &root,
                &target_ref,
                TargetMode::Internal,
                relationship_type::CORE_PROPERTIES,
                None,
            )?;
        }

        let buffer = self.backend.open_stream_core(&partname)?;
        *buffer.lock() = xml.into_bytes();
        debug!(partname = %partname, "Wrote core properties");

        if let Some(state) = self.properties.as_mut() {
            state.props.mark_clean();
            state.partname = Some(partname);
        }
        Ok(())
    }

    // ==================================================================
    // Lifecycle
    // ==================================================================

    /// Write the package to its container.
    ///
    /// Pending lazy loads are completed first, dirty properties are written, then the
    /// backend persists every part. A flush already in progress is not re-entered.
    ///
    /// # Errors
    /// `ReadOnlyViolation` on read-only packages.
    pub fn flush(&mut self) -> Result<()> {
        self.check_writable()?;
        if self.flushing {
            return Ok(());
        }
        self.flushing = true;
        let result = self.flush_inner();
        self.flushing = false;
        result
    }

    fn flush_inner(&mut self) -> Result<()> {
        let mut sources = vec![PackURI::package_root()];
        sources.extend(
            self.backend
                .get_parts_core()?
                .into_iter()
                .filter(|part| !part.is_relationship_part())
                .map(|part| part.partname().clone()),
        );
        for source in &sources {
            if let Err(e) = self.load_relationships(source) {
                warn!(source = %source, error = %e, "Relationship part could not be loaded");
            }
        }
        if self.properties.is_none()
            && let Err(e) = self.load_properties()
        {
            warn!(error = %e, "Core properties could not be loaded");
        }

        self.flush_properties()?;
        self.backend.flush_core()?;
        debug!(parts = sources.len() - 1, "Flushed package");
        Ok(())
    }

    /// Close the package.
    ///
    /// A writable package is flushed exactly once; repeated calls do nothing.
    pub fn close(&mut self) -> Result<()> {
        if self.closed {
            return Ok(());
        }
        let flushed = if self.is_read_only() {
            Ok(())
        } else {
            self.flush()
        };
        self.closed = true;
        self.relationships.clear();
        self.properties = None;
        let closed = self.backend.close_core();
        flushed.and(closed)
    }
}

impl<B: PackageBackend> Drop for Package<B> {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            warn!(error = %e, "Failed to close package");
        }
    }
}
