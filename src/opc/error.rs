//! Error types for OPC package operations

use thiserror::Error;

#[derive(Error, Debug)]
pub enum OpcError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error("Invalid part URI: {0}")]
    InvalidPartUri(String),

    #[error("Invalid pack URI: {0}")]
    InvalidPackUri(String),

    #[error("Invalid content type: {0}")]
    InvalidContentType(String),

    #[error("Invalid relationship type: {0}")]
    InvalidRelationshipType(String),

    #[error("Invalid relationship id: {0}")]
    InvalidId(String),

    #[error("Invalid target URI: {0}")]
    InvalidTargetUri(String),

    #[error("Part already exists: {0}")]
    DuplicatePart(String),

    #[error("Part has already been removed from its package: {0}")]
    PartAlreadyRemoved(String),

    #[error("Package was opened read-only")]
    ReadOnlyViolation,

    #[error("Unsupported open mode: {0}")]
    UnsupportedMode(String),

    #[error("Corrupt container: {0}")]
    CorruptContainer(String),

    #[error("Container stream must support seeking")]
    SeekRequired,

    #[error("Package not found: {0}")]
    PackageNotFound(String),

    #[error("Part not found: {0}")]
    PartNotFound(String),

    #[error("Relationship not found: {0}")]
    RelationshipNotFound(String),

    #[error("Part {partname} exceeds the size limit ({size} > {limit} bytes)")]
    PartTooLarge {
        partname: String,
        size: u64,
        limit: u64,
    },

    #[error("XML parsing error: {0}")]
    XmlError(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("ZIP error: {0}")]
    ZipError(#[from] zip::result::ZipError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Quick-XML error: {0}")]
    QuickXmlError(#[from] quick_xml::Error),

    #[error("UTF-8 conversion error: {0}")]
    Utf8Error(#[from] std::str::Utf8Error),

    #[error("Attribute error: {0}")]
    AttrError(String),
}

impl From<quick_xml::events::attributes::AttrError> for OpcError {
    fn from(err: quick_xml::events::attributes::AttrError) -> Self {
        OpcError::AttrError(err.to_string())
    }
}

impl From<quick_xml::encoding::EncodingError> for OpcError {
    fn from(err: quick_xml::encoding::EncodingError) -> Self {
        OpcError::XmlError(err.to_string())
    }
}

pub type Result<T> = std::result::Result<T, OpcError>;
