//! ZIP storage for OPC packages.
//!
//! [`ZipBackend`] maps parts to the entries of a ZIP archive held in a seekable stream.
//! It moves through three phases: the archive is untouched until the part index is
//! first needed, entries are then discovered from the central directory and
//! `[Content_Types].xml`, and each part's bytes are inflated into a shared buffer the
//! first time a stream is opened on it.
//!
//! Flushing rewrites the whole container from the buffers: every part is written in
//! index order followed by a freshly generated `[Content_Types].xml`. Entries of the
//! original archive are never copied over byte for byte.

use crate::opc::constants::content_type as ct;
use crate::opc::content_types::{ContentTypeMap, ContentTypesItem};
use crate::opc::error::{OpcError, Result};
use crate::opc::options::{FileMode, PackageLimits, PackageOptions};
use crate::opc::package::{Package, PackageBackend};
use crate::opc::packuri::{self, CONTENT_TYPES_URI, PackURI};
use crate::opc::part::{CompressionOption, Part, PartIndex};
use crate::opc::stream::{SharedBuffer, shared_buffer};
use std::collections::HashMap;
use std::fs::{File, OpenOptions};
use std::io::{self, Cursor, Read, Seek, SeekFrom, Write};
use std::path::Path;
use tracing::{debug, trace, warn};
use zip::CompressionMethod;
use zip::result::ZipError;
use zip::write::FileOptions;

/// A seekable container stream that can also be truncated for rewriting.
pub trait ContainerStream: Read + Write + Seek {
    fn set_len(&mut self, len: u64) -> io::Result<()>;
}

impl ContainerStream for File {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        File::set_len(&*self, len)
    }
}

impl ContainerStream for Cursor<Vec<u8>> {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        let len = usize::try_from(len).map_err(|_| io::Error::from(io::ErrorKind::InvalidInput))?;
        self.get_mut().resize(len, 0);
        Ok(())
    }
}

impl<T: ContainerStream + ?Sized> ContainerStream for &mut T {
    fn set_len(&mut self, len: u64) -> io::Result<()> {
        (**self).set_len(len)
    }
}

/// A package stored in a ZIP container.
pub type ZipPackage<S> = Package<ZipBackend<S>>;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Phase {
    /// Central directory not read yet
    Unopened,
    /// Parts discovered, no part data inflated
    Indexed,
    /// At least one part buffer exists
    Materialized,
}

/// A part discovered in the archive.
struct DiscoveredPart {
    partname: PackURI,
    entry_name: String,
    content_type: String,
    compression: CompressionOption,
}

/// [`PackageBackend`] over a ZIP archive in a seekable stream.
pub struct ZipBackend<S: ContainerStream> {
    /// The container; taken out by [`ZipPackage::into_inner`]
    stream: Option<S>,
    limits: PackageLimits,
    phase: Phase,

    /// Whether the stream holds an archive that parts may still be read from
    has_archive: bool,

    parts: PartIndex,

    /// ZIP entry names of parts not yet materialized
    entries: HashMap<PackURI, String>,

    /// Materialized part data, keyed case-insensitively
    buffers: HashMap<PackURI, SharedBuffer>,

    /// Inflated bytes read from the archive so far
    inflated_bytes: u64,

    issues: Vec<String>,
}

impl<S: ContainerStream> ZipBackend<S> {
    /// Prepare a backend over `stream` according to `options.mode`.
    ///
    /// The archive itself is not read here; discovery happens on first use.
    pub fn open(mut stream: S, options: &PackageOptions) -> Result<Self> {
        let len = stream
            .seek(SeekFrom::End(0))
            .map_err(|_| OpcError::SeekRequired)?;
        stream
            .seek(SeekFrom::Start(0))
            .map_err(|_| OpcError::SeekRequired)?;

        let has_archive = match options.mode {
            FileMode::Open => {
                if len == 0 {
                    return Err(OpcError::CorruptContainer(
                        "container is empty and has no [Content_Types].xml".to_string(),
                    ));
                }
                true
            },
            FileMode::OpenOrCreate => len > 0,
            FileMode::CreateNew => {
                if len > 0 {
                    return Err(OpcError::InvalidArgument(
                        "FileMode::CreateNew needs an empty container".to_string(),
                    ));
                }
                false
            },
            FileMode::Create => {
                stream.set_len(0)?;
                false
            },
            FileMode::Append | FileMode::Truncate => {
                return Err(OpcError::UnsupportedMode(format!("{:?}", options.mode)));
            },
        };

        debug!(
            mode = ?options.mode,
            access = ?options.access,
            len,
            "Opened ZIP container"
        );

        Ok(Self {
            stream: Some(stream),
            limits: options.limits,
            phase: Phase::Unopened,
            has_archive,
            parts: PartIndex::new(),
            entries: HashMap::new(),
            buffers: HashMap::new(),
            inflated_bytes: 0,
            issues: Vec::new(),
        })
    }

    /// Take the container stream out of the backend.
    pub(crate) fn take_stream(&mut self) -> Option<S> {
        self.stream.take()
    }

    fn stream_mut(&mut self) -> Result<&mut S> {
        self.stream
            .as_mut()
            .ok_or_else(|| OpcError::InvalidArgument("container stream was taken".to_string()))
    }

    /// Discover parts on first use. Any failure leaves the package empty.
    fn ensure_indexed(&mut self) {
        if self.phase != Phase::Unopened {
            return;
        }
        self.phase = Phase::Indexed;
        if !self.has_archive {
            return;
        }

        match self.discover() {
            Ok(found) => {
                for part in found {
                    let handle = Part::new(part.partname.clone(), part.content_type, part.compression);
                    if self.parts.insert(handle) {
                        self.entries.insert(part.partname, part.entry_name);
                    } else {
                        warn!(entry = %part.entry_name, "Skipping entry that duplicates another part name");
                        self.issues
                            .push(format!("duplicate part name '{}'", part.entry_name));
                    }
                }
                debug!(parts = self.parts.len(), "Discovered parts");
            },
            Err(e) => {
                warn!(error = %e, "Container could not be indexed, treating it as empty");
                self.issues.push(e.to_string());
                self.has_archive = false;
            },
        }
    }

    fn discover(&mut self) -> Result<Vec<DiscoveredPart>> {
        let limit = self.limits.max_part_bytes;
        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| OpcError::InvalidArgument("container stream was taken".to_string()))?;
        stream.seek(SeekFrom::Start(0))?;
        let mut archive = zip::ZipArchive::new(&mut *stream)
            .map_err(|e| OpcError::CorruptContainer(e.to_string()))?;

        let content_types_name = content_types_entry_name();
        let content_types = match read_entry(&mut archive, content_types_name, CONTENT_TYPES_URI, limit) {
            Ok(xml) => ContentTypeMap::from_xml(&xml)?,
            Err(OpcError::ZipError(ZipError::FileNotFound)) => {
                return Err(OpcError::CorruptContainer(
                    "[Content_Types].xml is missing".to_string(),
                ));
            },
            Err(e) => return Err(e),
        };

        let mut found = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let (entry_name, method) = {
                let file = archive.by_index(i)?;
                if file.is_dir() {
                    continue;
                }
                (file.name().to_string(), file.compression())
            };
            if entry_name == content_types_name {
                continue;
            }

            let partname = match packuri::create_part_name(&entry_name) {
                Ok(partname) => partname,
                Err(e) => {
                    warn!(entry = %entry_name, error = %e, "Skipping entry with an invalid part name");
                    self.issues.push(format!("invalid part name '{}'", entry_name));
                    continue;
                },
            };

            let content_type = match content_types.get(&partname) {
                Some(content_type) => content_type.to_string(),
                None if packuri::is_relationship_part_name(partname.as_str()) => {
                    ct::OPC_RELATIONSHIPS.to_string()
                },
                None => {
                    warn!(entry = %entry_name, "Skipping entry without a content type");
                    self.issues
                        .push(format!("no content type for '{}'", entry_name));
                    continue;
                },
            };

            let compression = if method == CompressionMethod::Stored {
                CompressionOption::NotCompressed
            } else {
                CompressionOption::Normal
            };

            found.push(DiscoveredPart {
                partname,
                entry_name,
                content_type,
                compression,
            });
        }
        Ok(found)
    }

    /// Count `len` inflated bytes against the package-wide limit.
    fn account(&mut self, partname: &PackURI, len: usize) -> Result<()> {
        self.inflated_bytes += len as u64;
        if self.inflated_bytes > self.limits.max_total_bytes {
            return Err(OpcError::PartTooLarge {
                partname: partname.to_string(),
                size: self.inflated_bytes,
                limit: self.limits.max_total_bytes,
            });
        }
        Ok(())
    }

    /// Inflate one part into its shared buffer, or return the existing buffer.
    fn materialize(&mut self, partname: &PackURI) -> Result<SharedBuffer> {
        if let Some(buffer) = self.buffers.get(partname) {
            return Ok(buffer.clone());
        }

        let bytes = match self.entries.get(partname).cloned() {
            Some(entry_name) if self.has_archive => {
                let limit = self.limits.max_part_bytes;
                let bytes = {
                    let stream = self.stream_mut()?;
                    stream.seek(SeekFrom::Start(0))?;
                    let mut archive = zip::ZipArchive::new(&mut *stream)?;
                    read_entry(&mut archive, &entry_name, partname.as_str(), limit)?
                };
                self.account(partname, bytes.len())?;
                trace!(partname = %partname, len = bytes.len(), "Materialized part");
                bytes
            },
            _ => Vec::new(),
        };

        self.entries.remove(partname);
        let buffer = shared_buffer(bytes);
        self.buffers.insert(partname.clone(), buffer.clone());
        self.phase = Phase::Materialized;
        Ok(buffer)
    }

    /// Inflate every part that has no buffer yet, opening the archive once.
    fn materialize_all(&mut self) -> Result<()> {
        let pending: Vec<PackURI> = self
            .parts
            .iter()
            .map(|part| part.partname().clone())
            .filter(|partname| !self.buffers.contains_key(partname))
            .collect();
        if pending.is_empty() {
            return Ok(());
        }

        let mut loaded = Vec::with_capacity(pending.len());
        if self.has_archive && !self.entries.is_empty() {
            let limit = self.limits.max_part_bytes;
            let stream = self
                .stream
                .as_mut()
                .ok_or_else(|| OpcError::InvalidArgument("container stream was taken".to_string()))?;
            stream.seek(SeekFrom::Start(0))?;
            let mut archive = zip::ZipArchive::new(&mut *stream)?;
            for partname in pending {
                let bytes = match self.entries.get(&partname) {
                    Some(entry_name) => read_entry(&mut archive, entry_name, partname.as_str(), limit)?,
                    None => Vec::new(),
                };
                loaded.push((partname, bytes));
            }
        } else {
            loaded.extend(pending.into_iter().map(|partname| (partname, Vec::new())));
        }

        for (partname, bytes) in loaded {
            self.account(&partname, bytes.len())?;
            self.entries.remove(&partname);
            self.buffers.insert(partname, shared_buffer(bytes));
        }
        self.phase = Phase::Materialized;
        Ok(())
    }

    /// Rewrite the container from the part buffers.
    fn write_archive(&mut self) -> Result<u64> {
        let content_types =
            ContentTypesItem::from_parts(self.parts.iter().map(|part| (part.partname(), part.content_type())))
                .to_xml();

        let stream = self
            .stream
            .as_mut()
            .ok_or_else(|| OpcError::InvalidArgument("container stream was taken".to_string()))?;
        stream
            .seek(SeekFrom::Start(0))
            .map_err(|_| OpcError::SeekRequired)?;
        stream.set_len(0)?;

        let mut written = 0u64;
        let mut zip = zip::ZipWriter::new(&mut *stream);
        for part in self.parts.iter() {
            let method = if part.compression().is_compressed() {
                CompressionMethod::Deflated
            } else {
                CompressionMethod::Stored
            };
            let options = FileOptions::<()>::default().compression_method(method);
            zip.start_file(part.partname().membername(), options)?;
            if let Some(buffer) = self.buffers.get(part.partname()) {
                let data = buffer.lock();
                zip.write_all(&data)?;
                written += data.len() as u64;
            }
        }

        let options = FileOptions::<()>::default().compression_method(CompressionMethod::Deflated);
        zip.start_file(content_types_entry_name(), options)?;
        zip.write_all(content_types.as_bytes())?;
        zip.finish()?;
        stream.flush()?;
        Ok(written)
    }
}

impl<S: ContainerStream> PackageBackend for ZipBackend<S> {
    fn create_part_core(
        &mut self,
        partname: &PackURI,
        content_type: &str,
        compression: CompressionOption,
    ) -> Result<Part> {
        self.ensure_indexed();
        let part = Part::new(partname.clone(), content_type.to_string(), compression);
        if !self.parts.insert(part.clone()) {
            return Err(OpcError::DuplicatePart(partname.to_string()));
        }
        self.buffers
            .insert(partname.clone(), shared_buffer(Vec::new()));
        Ok(part)
    }

    fn get_part_core(&mut self, partname: &PackURI) -> Result<Option<Part>> {
        self.ensure_indexed();
        Ok(self.parts.get(partname).cloned())
    }

    fn get_parts_core(&mut self) -> Result<Vec<Part>> {
        self.ensure_indexed();
        Ok(self.parts.iter().cloned().collect())
    }

    fn delete_part_core(&mut self, partname: &PackURI) -> Result<()> {
        self.ensure_indexed();
        self.parts.remove(partname);
        self.entries.remove(partname);
        self.buffers.remove(partname);
        Ok(())
    }

    fn open_stream_core(&mut self, partname: &PackURI) -> Result<SharedBuffer> {
        self.ensure_indexed();
        if !self.parts.contains(partname) {
            return Err(OpcError::PartNotFound(partname.to_string()));
        }
        self.materialize(partname)
    }

    fn flush_core(&mut self) -> Result<()> {
        self.ensure_indexed();
        self.materialize_all()?;
        let written = self.write_archive()?;
        // Every part now lives in a buffer; nothing is read back from the new archive.
        self.entries.clear();
        self.has_archive = true;
        debug!(parts = self.parts.len(), bytes = written, "Wrote ZIP container");
        Ok(())
    }

    fn close_core(&mut self) -> Result<()> {
        self.buffers.clear();
        self.entries.clear();
        self.parts = PartIndex::new();
        Ok(())
    }

    fn discovery_issues(&self) -> &[String] {
        &self.issues
    }
}

/// ZIP entry name of the content-types stream.
fn content_types_entry_name() -> &'static str {
    &CONTENT_TYPES_URI[1..]
}

/// Inflate one entry, refusing entries larger than `limit` bytes.
fn read_entry<R: Read + Seek>(
    archive: &mut zip::ZipArchive<R>,
    entry_name: &str,
    partname: &str,
    limit: u64,
) -> Result<Vec<u8>> {
    let file = archive.by_name(entry_name)?;
    let declared = file.size();
    if declared > limit {
        return Err(OpcError::PartTooLarge {
            partname: partname.to_string(),
            size: declared,
            limit,
        });
    }

    let mut data = Vec::with_capacity(usize::try_from(declared).unwrap_or(0));
    file.take(limit.saturating_add(1)).read_to_end(&mut data)?;
    if data.len() as u64 > limit {
        return Err(OpcError::PartTooLarge {
            partname: partname.to_string(),
            size: data.len() as u64,
            limit,
        });
    }
    Ok(data)
}

impl<S: ContainerStream> Package<ZipBackend<S>> {
    /// Open a package over a seekable stream.
    ///
    /// The options are validated before the stream is touched. Discovery of the parts is
    /// deferred until they are first needed.
    pub fn from_stream(stream: S, options: PackageOptions) -> Result<Self> {
        options.validate()?;
        let backend = ZipBackend::open(stream, &options)?;
        Ok(Package::with_backend(backend, options.access))
    }

    /// Close the package and hand back the container stream.
    pub fn into_inner(mut self) -> Result<S> {
        self.close()?;
        self.backend_mut()
            .take_stream()
            .ok_or_else(|| OpcError::InvalidArgument("container stream was taken".to_string()))
    }
}

impl Package<ZipBackend<File>> {
    /// Open a package file.
    ///
    /// # Arguments
    /// * `path` - Path to the package file (.docx, .xlsx, .pptx, etc.)
    /// * `options` - Mode, access and share settings
    ///
    /// # Errors
    /// `PackageNotFound` when a file opened read-only does not exist, `InvalidArgument`
    /// when a file opened for writing under `FileMode::Open` does not exist or when
    /// `FileMode::CreateNew` finds an existing file.
    ///
    /// # Example
    /// ```no_run
    /// use opcpkg::opc::{PackageOptions, ZipPackage};
    ///
    /// let mut pkg = ZipPackage::open("document.docx", PackageOptions::read_only())?;
    /// for part in pkg.get_parts()? {
    ///     println!("{} ({})", part.partname(), part.content_type());
    /// }
    /// # Ok::<(), opcpkg::opc::OpcError>(())
    /// ```
    pub fn open<P: AsRef<Path>>(path: P, options: PackageOptions) -> Result<Self> {
        options.validate()?;
        let path = path.as_ref();

        if options.mode == FileMode::Open && !path.exists() {
            return Err(if options.access.can_write() {
                OpcError::InvalidArgument(format!(
                    "package '{}' does not exist",
                    path.display()
                ))
            } else {
                OpcError::PackageNotFound(path.display().to_string())
            });
        }

        let mut open_options = OpenOptions::new();
        open_options.read(true).write(options.access.can_write());
        match options.mode {
            FileMode::CreateNew => {
                open_options.create_new(true);
            },
            FileMode::Create | FileMode::OpenOrCreate => {
                open_options.create(true);
            },
            _ => {},
        }

        let file = open_options.open(path).map_err(|e| match e.kind() {
            io::ErrorKind::AlreadyExists => OpcError::InvalidArgument(format!(
                "package '{}' already exists",
                path.display()
            )),
            io::ErrorKind::NotFound => OpcError::PackageNotFound(path.display().to_string()),
            _ => OpcError::IoError(e),
        })?;
        Self::from_stream(file, options)
    }
}

impl Package<ZipBackend<Cursor<Vec<u8>>>> {
    /// Create an empty package in memory.
    pub fn new_in_memory() -> Result<Self> {
        Self::from_stream(
            Cursor::new(Vec::new()),
            PackageOptions::new().with_mode(FileMode::Create),
        )
    }

    /// Open a package from bytes already in memory.
    pub fn from_bytes(bytes: Vec<u8>, options: PackageOptions) -> Result<Self> {
        Self::from_stream(Cursor::new(bytes), options)
    }
}
