//! Provides the PackURI value type and utilities for working with package URIs.
//!
//! A PackURI represents a part name within an OPC package, following the URI format
//! defined by the Open Packaging Conventions specification. The free functions in this
//! module validate, resolve and compose part names and absolute `pack:` URIs; none of
//! them perform I/O.

use crate::opc::error::{OpcError, Result};
use once_cell::sync::Lazy;
use std::hash::{Hash, Hasher};

/// The package pseudo-partname, representing the package itself
pub const PACKAGE_URI: &str = "/";

/// The URI for the [Content_Types].xml part
pub const CONTENT_TYPES_URI: &str = "/[Content_Types].xml";

/// Name of the directory segment holding relationship parts
const RELS_SEGMENT: &str = "_rels";

/// Extension carried by relationship parts
const RELS_EXTENSION: &str = ".rels";

/// Represents a package URI, which is a partname within an OPC package.
///
/// PackURIs always begin with a forward slash and use forward slashes as path separators.
/// The original casing is kept for display and storage; equality and hashing use a
/// case-normalized key, so `/Word/Document.xml` and `/word/document.xml` name the same part.
#[derive(Debug, Clone)]
pub struct PackURI {
    /// The full pack URI string (e.g., "/word/document.xml")
    uri: String,

    /// Upper-cased comparison key
    key: String,
}

impl PackURI {
    /// Create a new PackURI from a string.
    ///
    /// Fails with [`OpcError::InvalidPartUri`] unless the string is a valid part name
    /// (see [`validate_part_name`]).
    pub fn new<S: Into<String>>(uri: S) -> Result<Self> {
        let uri = uri.into();
        validate_part_name(&uri)?;
        Ok(Self::from_validated(uri))
    }

    /// The `/` sentinel used as the source of package-level relationships.
    pub fn package_root() -> Self {
        Self::from_validated(PACKAGE_URI.to_string())
    }

    fn from_validated(uri: String) -> Self {
        let key = normalized_for_comparison(&uri);
        Self { uri, key }
    }

    /// Whether this is the package pseudo-partname `/`.
    #[inline]
    pub fn is_package_root(&self) -> bool {
        self.uri == PACKAGE_URI
    }

    /// Get the base URI (directory portion) of this PackURI.
    ///
    /// For example, "/ppt/slides" for "/ppt/slides/slide1.xml".
    /// For the package pseudo-partname "/", returns "/".
    pub fn base_uri(&self) -> &str {
        match self.uri.rfind('/') {
            Some(0) | None => "/",
            Some(pos) => &self.uri[..pos],
        }
    }

    /// Get the filename portion of this PackURI.
    ///
    /// For example, "slide1.xml" for "/ppt/slides/slide1.xml".
    /// For the package pseudo-partname "/", returns an empty string.
    pub fn filename(&self) -> &str {
        match self.uri.rfind('/') {
            Some(pos) => &self.uri[pos + 1..],
            None => "",
        }
    }

    /// Get the extension portion of this PackURI.
    ///
    /// For example, "xml" for "/word/document.xml" (note: no leading period).
    pub fn ext(&self) -> &str {
        let filename = self.filename();
        match filename.rfind('.') {
            Some(pos) => &filename[pos + 1..],
            None => "",
        }
    }

    /// Get the membername (URI with leading slash stripped).
    ///
    /// This is the form used as the Zip file membername for the package item.
    /// Returns an empty string for the package pseudo-partname "/".
    pub fn membername(&self) -> &str {
        &self.uri[1..]
    }

    /// Get the relative reference from a base URI to this PackURI.
    ///
    /// For example, PackURI("/ppt/slideLayouts/slideLayout1.xml") would return
    /// "../slideLayouts/slideLayout1.xml" for base_uri "/ppt/slides".
    pub fn relative_ref(&self, base_uri: &str) -> String {
        if base_uri == "/" {
            return self.membername().to_string();
        }

        let from_parts: Vec<&str> = base_uri.split('/').filter(|s| !s.is_empty()).collect();
        let to_parts: Vec<&str> = self.uri.split('/').filter(|s| !s.is_empty()).collect();

        let common = from_parts
            .iter()
            .zip(to_parts.iter())
            .take_while(|(a, b)| a.eq_ignore_ascii_case(b))
            .count();

        let mut result = String::new();
        for _ in common..from_parts.len() {
            result.push_str("../");
        }
        result.push_str(&to_parts[common..].join("/"));
        result
    }

    /// Get the PackURI of the .rels part corresponding to this PackURI.
    ///
    /// For example, "/word/_rels/document.xml.rels" for "/word/document.xml",
    /// and "/_rels/.rels" for the package pseudo-partname.
    pub fn rels_uri(&self) -> PackURI {
        let base_uri = self.base_uri();
        let rels_uri = if base_uri == "/" {
            format!("/{}/{}{}", RELS_SEGMENT, self.filename(), RELS_EXTENSION)
        } else {
            format!("{}/{}/{}{}", base_uri, RELS_SEGMENT, self.filename(), RELS_EXTENSION)
        };
        Self::from_validated(rels_uri)
    }

    /// Get the full URI string.
    #[inline]
    pub fn as_str(&self) -> &str {
        &self.uri
    }

    /// Get the case-normalized comparison key.
    #[inline]
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl PartialEq for PackURI {
    fn eq(&self, other: &Self) -> bool {
        self.key == other.key
    }
}

impl Eq for PackURI {}

impl Hash for PackURI {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.key.hash(state);
    }
}

impl std::fmt::Display for PackURI {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.uri)
    }
}

impl AsRef<str> for PackURI {
    fn as_ref(&self) -> &str {
        &self.uri
    }
}

impl TryFrom<&str> for PackURI {
    type Error = OpcError;

    fn try_from(value: &str) -> Result<Self> {
        PackURI::new(value)
    }
}

/// Whether `uri` carries a scheme (`http:`, `pack:`, `file:` ...).
pub fn is_absolute_uri(uri: &str) -> bool {
    let Some(colon) = uri.find(':') else {
        return false;
    };
    let scheme = &uri[..colon];
    let mut chars = scheme.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphabetic() => {},
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.'))
}

/// Validate a part name.
///
/// A part name must be relative (no scheme), non-empty, start with `/` and must not end
/// with `/`. The package pseudo-partname `/` is therefore not a valid part name.
pub fn validate_part_name(uri: &str) -> Result<()> {
    if uri.is_empty() {
        return Err(OpcError::InvalidPartUri("part name is empty".to_string()));
    }
    if is_absolute_uri(uri) {
        return Err(OpcError::InvalidPartUri(format!(
            "part name must be relative, got '{}'",
            uri
        )));
    }
    if !uri.starts_with('/') {
        return Err(OpcError::InvalidPartUri(format!(
            "part name must begin with '/', got '{}'",
            uri
        )));
    }
    if uri.ends_with('/') {
        return Err(OpcError::InvalidPartUri(format!(
            "part name must not end with '/', got '{}'",
            uri
        )));
    }
    if uri.contains(['\\', '#', '?']) {
        return Err(OpcError::InvalidPartUri(format!(
            "part name contains a reserved character: '{}'",
            uri
        )));
    }
    Ok(())
}

/// Turn a URI into a part name by prefixing `/` when it is missing.
///
/// The path is not otherwise rewritten; the result must still pass [`validate_part_name`].
pub fn create_part_name(uri: &str) -> Result<PackURI> {
    if uri.starts_with('/') {
        PackURI::new(uri)
    } else {
        if is_absolute_uri(uri) {
            return Err(OpcError::InvalidPartUri(format!(
                "part name must be relative, got '{}'",
                uri
            )));
        }
        PackURI::new(format!("/{}", uri))
    }
}

/// Upper-cased copy of `uri` used only for case-insensitive identity checks.
pub fn normalized_for_comparison(uri: &str) -> String {
    uri.to_uppercase()
}

/// Resolve `target_uri` against `source`, the way a relative URL resolves against its base.
///
/// `source` may be the package pseudo-partname. A target starting with `/` replaces the
/// path entirely; anything else is joined onto the source's directory and `.`/`..`
/// segments are collapsed. Query strings and fragments are dropped.
pub fn resolve_relative(source: &PackURI, target_uri: &str) -> Result<PackURI> {
    if !source.is_package_root() {
        validate_part_name(source.as_str())
            .map_err(|e| OpcError::InvalidTargetUri(format!("invalid source: {}", e)))?;
    }
    if target_uri.is_empty() {
        return Err(OpcError::InvalidTargetUri("target is empty".to_string()));
    }
    if is_absolute_uri(target_uri) {
        return Err(OpcError::InvalidTargetUri(format!(
            "cannot resolve absolute URI '{}' to a part",
            target_uri
        )));
    }

    let target = target_uri
        .split(['#', '?'])
        .next()
        .unwrap_or_default();

    let joined = if target.starts_with('/') {
        target.to_string()
    } else {
        join_paths(source.base_uri(), target)
    };

    let normalized = normalize_path(&joined);
    PackURI::new(normalized).map_err(|e| OpcError::InvalidTargetUri(e.to_string()))
}

/// Produce the minimal relative reference from `source` to `target`.
pub fn relativize(source: &PackURI, target: &PackURI) -> String {
    target.relative_ref(source.base_uri())
}

/// Whether `uri` names a relationship part: its final segment ends with `.rels` and
/// sits in a `_rels` directory.
pub fn is_relationship_part_name(uri: &str) -> bool {
    let mut segments = uri.rsplit('/');
    let file = segments.next().unwrap_or_default();
    let dir = segments.next().unwrap_or_default();
    dir.eq_ignore_ascii_case(RELS_SEGMENT)
        && file.len() >= RELS_EXTENSION.len()
        && file.as_bytes()[file.len() - RELS_EXTENSION.len()..]
            .eq_ignore_ascii_case(RELS_EXTENSION.as_bytes())
}

/// Name of the relationship part that stores the relationships owned by `partname`.
///
/// `/word/document.xml` maps to `/word/_rels/document.xml.rels`; the package
/// pseudo-partname maps to `/_rels/.rels`.
pub fn relationship_part_name_for(partname: &PackURI) -> Result<PackURI> {
    if is_relationship_part_name(partname.as_str()) {
        return Err(OpcError::InvalidPartUri(format!(
            "relationship part '{}' cannot own relationships",
            partname
        )));
    }
    Ok(partname.rels_uri())
}

/// Inverse of [`relationship_part_name_for`]: the owner of a relationship part.
pub fn source_part_for_relationship_part(rels_partname: &PackURI) -> Result<PackURI> {
    if !is_relationship_part_name(rels_partname.as_str()) {
        return Err(OpcError::InvalidPartUri(format!(
            "'{}' is not a relationship part name",
            rels_partname
        )));
    }
    let file = rels_partname.filename();
    let owner_file = &file[..file.len() - RELS_EXTENSION.len()];
    let rels_dir = rels_partname.base_uri();
    let owner_dir = match rels_dir.rfind('/') {
        Some(0) | None => "",
        Some(pos) => &rels_dir[..pos],
    };

    if owner_file.is_empty() {
        if owner_dir.is_empty() {
            return Ok(PackURI::package_root());
        }
        return Err(OpcError::InvalidPartUri(format!(
            "'{}' has no owning part",
            rels_partname
        )));
    }
    PackURI::new(format!("{}/{}", owner_dir, owner_file))
}

/// Descriptor for the `pack` URI scheme.
///
/// Built once per process on first use; every compose/decompose goes through it.
struct PackScheme {
    prefix: &'static str,
    /// Characters escaped inside the embedded package URI, `%` first.
    reserved: [(char, &'static str); 4],
}

static PACK_SCHEME: Lazy<PackScheme> = Lazy::new(|| {
    tracing::debug!(scheme = "pack", "registering pack URI scheme");
    PackScheme {
        prefix: "pack://",
        reserved: [('%', "%25"), (',', "%2c"), ('?', "%3f"), ('@', "%40")],
    }
});

fn pack_scheme() -> &'static PackScheme {
    &PACK_SCHEME
}

/// Build an absolute `pack:` URI for a package, optionally addressing a part and a fragment.
///
/// Reserved characters of `package_uri` are percent-escaped and `/` is replaced with `,`
/// so the package URI becomes a single authority component.
pub fn compose_pack_uri(
    package_uri: &str,
    partname: Option<&PackURI>,
    fragment: Option<&str>,
) -> Result<String> {
    if !is_absolute_uri(package_uri) {
        return Err(OpcError::InvalidArgument(format!(
            "package URI must be absolute, got '{}'",
            package_uri
        )));
    }
    if package_uri.contains('#') {
        return Err(OpcError::InvalidArgument(
            "package URI must not carry a fragment".to_string(),
        ));
    }
    if let Some(fragment) = fragment
        && !fragment.starts_with('#')
    {
        return Err(OpcError::InvalidArgument(format!(
            "fragment must start with '#', got '{}'",
            fragment
        )));
    }

    let scheme = pack_scheme();
    let mut escaped = String::with_capacity(package_uri.len() + 8);
    for c in package_uri.chars() {
        match scheme.reserved.iter().find(|(r, _)| *r == c) {
            Some((_, replacement)) => escaped.push_str(replacement),
            None if c == '/' => escaped.push(','),
            None => escaped.push(c),
        }
    }

    let mut result = String::with_capacity(scheme.prefix.len() + escaped.len() + 32);
    result.push_str(scheme.prefix);
    result.push_str(&escaped);
    if let Some(partname) = partname {
        result.push_str(partname.as_str());
    }
    if let Some(fragment) = fragment {
        result.push_str(fragment);
    }
    Ok(result)
}

/// Split a `pack:` URI into its authority and path (fragment stripped).
fn split_pack_uri(pack_uri: &str) -> Result<(&str, &str)> {
    let scheme = pack_scheme();
    let prefix_len = scheme.prefix.len();
    let rest = match pack_uri.get(..prefix_len) {
        Some(prefix) if prefix.eq_ignore_ascii_case(scheme.prefix) => &pack_uri[prefix_len..],
        _ => {
            return Err(OpcError::InvalidPackUri(format!(
                "not a pack URI: '{}'",
                pack_uri
            )));
        },
    };
    let rest = rest.split('#').next().unwrap_or_default();
    match rest.find('/') {
        Some(pos) => Ok((&rest[..pos], &rest[pos..])),
        None => Ok((rest, "")),
    }
}

/// Extract and un-escape the package URI embedded in a `pack:` URI.
pub fn decompose_pack_uri(pack_uri: &str) -> Result<String> {
    let (authority, _) = split_pack_uri(pack_uri)?;
    if authority.is_empty() {
        return Err(OpcError::InvalidPackUri(format!(
            "pack URI has no package component: '{}'",
            pack_uri
        )));
    }

    let mut unescaped = authority.replace(',', "/");
    // `%25` must be restored last so escaped escapes survive.
    for (c, escape) in pack_scheme().reserved.iter().rev() {
        unescaped = replace_ignore_ascii_case(&unescaped, escape, *c);
    }
    Ok(unescaped)
}

/// Extract the part name addressed by a `pack:` URI, if any.
///
/// An empty path or a bare `/` addresses the package itself and yields `None`.
pub fn get_part_name(pack_uri: &str) -> Result<Option<PackURI>> {
    let (_, path) = split_pack_uri(pack_uri)?;
    if path.is_empty() || path == "/" {
        return Ok(None);
    }
    PackURI::new(path).map(Some)
}

fn replace_ignore_ascii_case(haystack: &str, needle: &str, with: char) -> String {
    let mut out = String::with_capacity(haystack.len());
    let mut rest = haystack;
    while let Some(pos) = find_ignore_ascii_case(rest, needle) {
        out.push_str(&rest[..pos]);
        out.push(with);
        rest = &rest[pos + needle.len()..];
    }
    out.push_str(rest);
    out
}

fn find_ignore_ascii_case(haystack: &str, needle: &str) -> Option<usize> {
    haystack
        .as_bytes()
        .windows(needle.len())
        .position(|w| w.eq_ignore_ascii_case(needle.as_bytes()))
}

/// Helper function to join two paths using forward slashes
fn join_paths(base: &str, rel: &str) -> String {
    if base.ends_with('/') {
        format!("{}{}", base, rel)
    } else {
        format!("{}/{}", base, rel)
    }
}

/// Helper function to normalize a path (resolve ".." and ".")
fn normalize_path(path: &str) -> String {
    let mut parts: Vec<&str> = Vec::new();
    let trailing_slash = path.ends_with('/');

    for part in path.split('/') {
        match part {
            "" | "." => {},
            ".." => {
                parts.pop();
            },
            _ => parts.push(part),
        }
    }

    let mut normalized = format!("/{}", parts.join("/"));
    if trailing_slash && normalized.len() > 1 {
        normalized.push('/');
    }
    normalized
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::opc::part::{CompressionOption, Part};
    use proptest::prelude::*;

    #[test]
    fn test_validate_part_name() {
        assert!(validate_part_name("/a/b").is_ok());
        assert!(matches!(
            validate_part_name("a/b"),
            Err(OpcError::InvalidPartUri(_))
        ));
        assert!(matches!(
            validate_part_name("/a/b/"),
            Err(OpcError::InvalidPartUri(_))
        ));
        assert!(matches!(
            validate_part_name("http://x/a"),
            Err(OpcError::InvalidPartUri(_))
        ));
        assert!(matches!(
            validate_part_name(""),
            Err(OpcError::InvalidPartUri(_))
        ));
        assert!(validate_part_name("/").is_err());
    }

    #[test]
    fn test_create_part_name() {
        assert_eq!(create_part_name("word/document.xml").unwrap().as_str(), "/word/document.xml");
        assert_eq!(create_part_name("/word/document.xml").unwrap().as_str(), "/word/document.xml");
        assert!(create_part_name("word/").is_err());
        assert!(create_part_name("http://x/a").is_err());
    }

    #[test]
    fn test_case_insensitive_identity() {
        let a = PackURI::new("/Word/Document.xml").unwrap();
        let b = PackURI::new("/word/document.XML").unwrap();
        assert_eq!(a, b);
        assert_eq!(a.as_str(), "/Word/Document.xml");
        assert_eq!(normalized_for_comparison("/word/a.xml"), "/WORD/A.XML");
    }

    #[test]
    fn test_base_uri_and_filename() {
        let uri = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        assert_eq!(uri.base_uri(), "/ppt/slides");
        assert_eq!(uri.filename(), "slide1.xml");
        assert_eq!(uri.ext(), "xml");
        assert_eq!(uri.membername(), "ppt/slides/slide1.xml");

        let root = PackURI::package_root();
        assert_eq!(root.base_uri(), "/");
        assert_eq!(root.filename(), "");
        assert_eq!(root.membername(), "");
    }

    #[test]
    fn test_resolve_relative() {
        let source = PackURI::new("/word/document.xml").unwrap();
        assert_eq!(
            resolve_relative(&source, "styles.xml").unwrap().as_str(),
            "/word/styles.xml"
        );
        assert_eq!(
            resolve_relative(&source, "../customXml/item1.xml").unwrap().as_str(),
            "/customXml/item1.xml"
        );
        assert_eq!(
            resolve_relative(&source, "/docProps/core.xml").unwrap().as_str(),
            "/docProps/core.xml"
        );
        assert_eq!(
            resolve_relative(&source, "media/image1.png#frag").unwrap().as_str(),
            "/word/media/image1.png"
        );

        let root = PackURI::package_root();
        assert_eq!(
            resolve_relative(&root, "word/document.xml").unwrap().as_str(),
            "/word/document.xml"
        );
        assert!(matches!(
            resolve_relative(&root, "http://example.com/"),
            Err(OpcError::InvalidTargetUri(_))
        ));
        assert!(matches!(
            resolve_relative(&source, "media/"),
            Err(OpcError::InvalidTargetUri(_))
        ));
    }

    #[test]
    fn test_relativize() {
        let source = PackURI::new("/ppt/slides/slide1.xml").unwrap();
        let target = PackURI::new("/ppt/slideLayouts/slideLayout1.xml").unwrap();
        assert_eq!(relativize(&source, &target), "../slideLayouts/slideLayout1.xml");

        let root = PackURI::package_root();
        let doc = PackURI::new("/word/document.xml").unwrap();
        assert_eq!(relativize(&root, &doc), "word/document.xml");

        let sibling = PackURI::new("/word/styles.xml").unwrap();
        assert_eq!(relativize(&doc, &sibling), "styles.xml");
    }

    #[test]
    fn test_relationship_part_names() {
        let doc = PackURI::new("/word/document.xml").unwrap();
        let rels = relationship_part_name_for(&doc).unwrap();
        assert_eq!(rels.as_str(), "/word/_rels/document.xml.rels");
        assert!(is_relationship_part_name(rels.as_str()));
        assert_eq!(source_part_for_relationship_part(&rels).unwrap(), doc);

        let root_rels = relationship_part_name_for(&PackURI::package_root()).unwrap();
        assert_eq!(root_rels.as_str(), "/_rels/.rels");
        assert!(source_part_for_relationship_part(&root_rels)
            .unwrap()
            .is_package_root());

        let top = PackURI::new("/a.xml").unwrap();
        assert_eq!(
            relationship_part_name_for(&top).unwrap().as_str(),
            "/_rels/a.xml.rels"
        );

        assert!(!is_relationship_part_name("/word/document.xml"));
        assert!(!is_relationship_part_name("/word/document.rels"));
        assert!(relationship_part_name_for(&rels).is_err());
    }

    #[test]
    fn test_relationship_part_names_with_non_ascii() {
        let accented = PackURI::new("/_rels/éabcd").unwrap();
        assert!(!is_relationship_part_name(accented.as_str()));
        assert!(!is_relationship_part_name("/_rels/é"));
        assert!(is_relationship_part_name("/docs/_rels/résumé.xml.rels"));

        let part = Part::new(accented, "application/xml".to_string(), CompressionOption::Normal);
        assert!(!part.is_relationship_part());
    }

    #[test]
    fn test_compose_and_decompose_pack_uri() {
        let part = PackURI::new("/word/document.xml").unwrap();
        let uri = compose_pack_uri(
            "http://www.host.com/packages/doc,1.docx",
            Some(&part),
            Some("#frag"),
        )
        .unwrap();
        assert_eq!(
            uri,
            "pack://http:,,www.host.com,packages,doc%2c1.docx/word/document.xml#frag"
        );
        assert_eq!(
            decompose_pack_uri(&uri).unwrap(),
            "http://www.host.com/packages/doc,1.docx"
        );
        assert_eq!(get_part_name(&uri).unwrap(), Some(part));

        let bare = compose_pack_uri("file:///c:/a%20b@c?.docx", None, None).unwrap();
        assert_eq!(bare, "pack://file:,,,c:,a%2520b%40c%3f.docx");
        assert_eq!(decompose_pack_uri(&bare).unwrap(), "file:///c:/a%20b@c?.docx");
        assert_eq!(get_part_name(&bare).unwrap(), None);
    }

    #[test]
    fn test_compose_rejects_bad_input() {
        assert!(matches!(
            compose_pack_uri("http://x/a.docx", None, Some("frag")),
            Err(OpcError::InvalidArgument(_))
        ));
        assert!(matches!(
            compose_pack_uri("relative/a.docx", None, None),
            Err(OpcError::InvalidArgument(_))
        ));
        assert!(decompose_pack_uri("http://x/a").is_err());
        assert!(matches!(
            decompose_pack_uri("pack:/éx"),
            Err(OpcError::InvalidPackUri(_))
        ));
        assert!(matches!(
            get_part_name("é"),
            Err(OpcError::InvalidPackUri(_))
        ));
    }

    proptest! {
        #[test]
        fn prop_created_names_validate(segments in prop::collection::vec("[a-zA-Z0-9_]{1,8}", 1..5)) {
            let name = create_part_name(&segments.join("/")).unwrap();
            prop_assert!(validate_part_name(name.as_str()).is_ok());
            prop_assert!(name.as_str().starts_with('/'));
        }

        #[test]
        fn prop_pack_uri_round_trip(host in "[a-z]{1,10}", path in "[a-zA-Z0-9%,@?]{0,12}") {
            let package_uri = format!("http://{}/{}", host, path);
            let composed = compose_pack_uri(&package_uri, None, None).unwrap();
            prop_assert_eq!(decompose_pack_uri(&composed).unwrap(), package_uri);
        }

        #[test]
        fn prop_relativize_then_resolve(
            src in prop::collection::vec("[a-z]{1,6}", 1..4),
            dst in prop::collection::vec("[a-z]{1,6}", 1..4),
        ) {
            let source = PackURI::new(format!("/{}.xml", src.join("/"))).unwrap();
            let target = PackURI::new(format!("/{}.xml", dst.join("/"))).unwrap();
            let relative = relativize(&source, &target);
            prop_assert_eq!(resolve_relative(&source, &relative).unwrap(), target);
        }
    }
}
