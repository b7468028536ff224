//! opcpkg - Open Packaging Conventions for Rust
//!
//! This library reads and writes OPC packages: the ZIP containers behind .docx, .xlsx,
//! .pptx and related formats. It manages the part set, content types, relationship
//! graphs and core properties of a package, and leaves the interpretation of part
//! content to the caller.
//!
//! # Features
//!
//! - **Part management**: Create, enumerate, stream and delete parts with case-insensitive names
//! - **Relationships**: Package and part relationship graphs, persisted as `_rels/*.rels` parts
//! - **Core properties**: Lazily loaded `docProps/core.xml` with dirty tracking
//! - **Lazy loading**: Parts are discovered on first use and inflated on first read
//! - **Lenient discovery**: Damaged containers open as empty packages with a list of issues
//!
//! # Example - Creating a package
//!
//! ```no_run
//! use std::io::Write;
//! use opcpkg::opc::{CompressionOption, FileAccess, FileMode, PackURI, PackageOptions, TargetMode, ZipPackage};
//! use opcpkg::opc::constants::relationship_type;
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pkg = ZipPackage::open(
//!     "document.docx",
//!     PackageOptions::new().with_mode(FileMode::Create),
//! )?;
//!
//! let main = PackURI::new("/word/document.xml")?;
//! pkg.create_part(&main, "application/xml", CompressionOption::Normal)?;
//! pkg.get_stream(&main, FileMode::Open, FileAccess::ReadWrite)?
//!     .write_all(b"<w:document/>")?;
//!
//! pkg.create_relationship(
//!     "word/document.xml",
//!     TargetMode::Internal,
//!     relationship_type::OFFICE_DOCUMENT,
//!     None,
//! )?;
//! pkg.close()?;
//! # Ok(())
//! # }
//! ```
//!
//! # Example - Reading a package
//!
//! ```no_run
//! use opcpkg::opc::{PackageOptions, ZipPackage};
//!
//! # fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let mut pkg = ZipPackage::open("document.docx", PackageOptions::read_only())?;
//!
//! for part in pkg.get_parts()? {
//!     println!("{} ({})", part.partname(), part.content_type());
//! }
//!
//! if let Some(title) = pkg.package_properties()?.title() {
//!     println!("Title: {}", title);
//! }
//! # Ok(())
//! # }
//! ```

pub mod opc;

pub use opc::{OpcError, Package, PackageOptions, Result, ZipPackage};
