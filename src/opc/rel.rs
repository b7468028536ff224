//! Relationship-related objects for OPC packages.
//!
//! This module provides types for managing the relationships owned by one source (the
//! package root or a single part), including internal and external relationships.

use crate::opc::constants::{namespace, target_mode};
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::{self, PackURI};
use crate::opc::xml::{XML_DECLARATION, escape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;
use smallvec::SmallVec;
use std::collections::HashMap;

/// Prefix of automatically assigned relationship ids
const ID_PREFIX: &str = "Re";

/// Whether a relationship points inside the package or at an external resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum TargetMode {
    #[default]
    Internal,
    External,
}

impl TargetMode {
    /// The value written in the `TargetMode` attribute.
    pub fn as_str(self) -> &'static str {
        match self {
            TargetMode::Internal => target_mode::INTERNAL,
            TargetMode::External => target_mode::EXTERNAL,
        }
    }

    fn parse(value: &str) -> Result<Self> {
        match value {
            target_mode::INTERNAL => Ok(TargetMode::Internal),
            target_mode::EXTERNAL => Ok(TargetMode::External),
            other => Err(OpcError::InvalidArgument(format!(
                "unknown TargetMode '{}'",
                other
            ))),
        }
    }
}

/// A single relationship from a source to a target.
///
/// Represents a typed, identified edge from the package root or a part to another part
/// (internal) or an arbitrary URI (external).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Relationship {
    /// Relationship ID, unique within its source
    id: String,

    /// Relationship type URI
    reltype: String,

    /// Owner of the relationship; the package pseudo-partname for package relationships
    source: PackURI,

    /// Internal or external target
    target_mode: TargetMode,

    /// Target reference - a part reference relative to the source, or an external URI
    target_uri: String,
}

impl Relationship {
    /// Get the relationship ID.
    #[inline]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Get the relationship type.
    #[inline]
    pub fn reltype(&self) -> &str {
        &self.reltype
    }

    /// Get the source partname (`/` for package relationships).
    #[inline]
    pub fn source(&self) -> &PackURI {
        &self.source
    }

    #[inline]
    pub fn target_mode(&self) -> TargetMode {
        self.target_mode
    }

    /// Get the target reference exactly as stored.
    #[inline]
    pub fn target_uri(&self) -> &str {
        &self.target_uri
    }

    /// Check if this is an external relationship.
    #[inline]
    pub fn is_external(&self) -> bool {
        self.target_mode == TargetMode::External
    }

    /// Get the absolute target partname for internal relationships.
    ///
    /// Returns an error if this is an external relationship.
    pub fn target_partname(&self) -> Result<PackURI> {
        if self.is_external() {
            return Err(OpcError::InvalidTargetUri(format!(
                "external relationship '{}' has no target part",
                self.id
            )));
        }
        packuri::resolve_relative(&self.source, &self.target_uri)
    }
}

/// Relationship attributes as read from a .rels stream, before validation.
#[derive(Debug, Clone)]
pub(crate) struct SerializedRelationship {
    pub id: Option<String>,
    pub reltype: Option<String>,
    pub target_ref: Option<String>,
    pub target_mode: Option<String>,
}

/// Collection of relationships from a single source.
///
/// Keeps insertion order (which is also the serialization order) plus an id index.
/// Automatically assigned ids are `Re0`, `Re1`, ...: a per-collection counter only
/// moves forward, so an id is never handed out twice even after it is removed.
#[derive(Debug, Clone)]
pub struct Relationships {
    /// Owner of every relationship in the collection
    source: PackURI,

    /// Relationships in insertion order
    rels: Vec<Relationship>,

    /// Map of relationship ID to position in `rels`
    index: HashMap<String, usize>,

    /// Next candidate suffix for automatically assigned ids
    next_id: u32,
}

impl Relationships {
    /// Create a new empty relationships collection owned by `source`.
    pub fn new(source: PackURI) -> Self {
        Self {
            source,
            rels: Vec::new(),
            index: HashMap::new(),
            next_id: 0,
        }
    }

    /// The owner of this collection.
    #[inline]
    pub fn source(&self) -> &PackURI {
        &self.source
    }

    /// Validate and add a relationship.
    ///
    /// When `id` is `None` the next free `Re<n>` id is assigned.
    pub fn add(
        &mut self,
        target_uri: &str,
        target_mode: TargetMode,
        reltype: &str,
        id: Option<&str>,
    ) -> Result<&Relationship> {
        if reltype.trim().is_empty() {
            return Err(OpcError::InvalidRelationshipType(
                "relationship type must not be blank".to_string(),
            ));
        }
        if target_uri.is_empty() {
            return Err(OpcError::InvalidTargetUri(
                "relationship target must not be empty".to_string(),
            ));
        }
        if target_mode == TargetMode::Internal {
            if packuri::is_absolute_uri(target_uri) {
                return Err(OpcError::InvalidArgument(format!(
                    "internal relationship target must be relative, got '{}'",
                    target_uri
                )));
            }
            let target = packuri::resolve_relative(&self.source, target_uri)?;
            if packuri::is_relationship_part_name(target.as_str()) {
                return Err(OpcError::InvalidTargetUri(format!(
                    "relationship cannot target relationship part '{}'",
                    target
                )));
            }
        }

        let id = match id {
            Some(id) => {
                validate_id(id)?;
                if self.index.contains_key(id) {
                    return Err(OpcError::InvalidId(format!(
                        "id '{}' already exists for source '{}'",
                        id, self.source
                    )));
                }
                id.to_string()
            },
            None => self.next_free_id(),
        };

        let rel = Relationship {
            id: id.clone(),
            reltype: reltype.to_string(),
            source: self.source.clone(),
            target_mode,
            target_uri: target_uri.to_string(),
        };
        self.index.insert(id, self.rels.len());
        self.rels.push(rel);
        Ok(&self.rels[self.rels.len() - 1])
    }

    /// Probe `Re<n>`, `Re<n+1>`, ... from the counter until an unused id is found.
    fn next_free_id(&mut self) -> String {
        loop {
            let candidate = format!("{}{}", ID_PREFIX, self.next_id);
            self.next_id += 1;
            if !self.index.contains_key(&candidate) {
                return candidate;
            }
        }
    }

    /// Get a relationship by its ID.
    #[inline]
    pub fn get(&self, id: &str) -> Option<&Relationship> {
        self.index.get(id).map(|&i| &self.rels[i])
    }

    /// Membership test by id.
    #[inline]
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Relationships of one type, in insertion order.
    pub fn by_type<'a, 'b>(
        &'a self,
        reltype: &'b str,
    ) -> impl Iterator<Item = &'a Relationship> + use<'a, 'b> {
        self.rels.iter().filter(move |rel| rel.reltype == reltype)
    }

    /// Get the single relationship of a specific type.
    ///
    /// Returns an error if no relationship of the type is found,
    /// or if multiple relationships of the type exist.
    pub fn part_with_reltype(&self, reltype: &str) -> Result<&Relationship> {
        let mut matching = self.by_type(reltype);
        match (matching.next(), matching.next()) {
            (None, _) => Err(OpcError::RelationshipNotFound(format!(
                "No relationship of type '{}'",
                reltype
            ))),
            (Some(rel), None) => Ok(rel),
            (Some(_), Some(_)) => Err(OpcError::InvalidArgument(format!(
                "Multiple relationships of type '{}'",
                reltype
            ))),
        }
    }

    /// Remove a relationship by its ID.
    pub fn remove(&mut self, id: &str) -> Option<Relationship> {
        let pos = self.index.remove(id)?;
        let rel = self.rels.remove(pos);
        for slot in self.index.values_mut() {
            if *slot > pos {
                *slot -= 1;
            }
        }
        Some(rel)
    }

    /// Get an iterator over all relationships in insertion order.
    #[inline]
    pub fn iter(&self) -> impl Iterator<Item = &Relationship> {
        self.rels.iter()
    }

    /// Get the number of relationships in the collection.
    #[inline]
    pub fn len(&self) -> usize {
        self.rels.len()
    }

    /// Check if the collection is empty.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.rels.is_empty()
    }

    /// Serialize relationships to XML format, in insertion order.
    ///
    /// `TargetMode` is only written for external relationships.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + 160 * self.rels.len());

        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<Relationships xmlns="{}">"#,
            namespace::OPC_RELATIONSHIPS
        ));
        xml.push('\n');

        for rel in &self.rels {
            let target_mode = if rel.is_external() {
                format!(r#" TargetMode="{}""#, TargetMode::External.as_str())
            } else {
                String::new()
            };

            xml.push_str(&format!(
                r#"  <Relationship Id="{}" Target="{}"{} Type="{}"/>"#,
                escape_xml(&rel.id),
                escape_xml(&rel.target_uri),
                target_mode,
                escape_xml(&rel.reltype),
            ));
            xml.push('\n');
        }

        xml.push_str("</Relationships>");

        xml
    }

    /// Load a collection from the bytes of a .rels part.
    ///
    /// Every entry goes through the same validation as [`Relationships::add`]; a missing
    /// `TargetMode` means internal.
    pub fn from_xml(source: PackURI, xml: &[u8]) -> Result<Self> {
        let mut rels = Self::new(source);
        for srel in parse_rels_xml(xml)? {
            let target_mode = match srel.target_mode.as_deref() {
                Some(mode) => TargetMode::parse(mode)?,
                None => TargetMode::Internal,
            };
            let id = srel
                .id
                .ok_or_else(|| OpcError::InvalidId("relationship without Id".to_string()))?;
            let target = srel.target_ref.ok_or_else(|| {
                OpcError::InvalidTargetUri(format!("relationship '{}' has no Target", id))
            })?;
            let reltype = srel.reltype.unwrap_or_default();
            rels.add(&target, target_mode, &reltype, Some(&id))?;
        }
        Ok(rels)
    }
}

/// Reject empty ids and ids that are not XML NCNames.
fn validate_id(id: &str) -> Result<()> {
    let mut chars = id.chars();
    let valid = match chars.next() {
        None => false,
        Some(first) => {
            (first.is_alphabetic() || first == '_')
                && chars.all(|c| c.is_alphanumeric() || matches!(c, '_' | '-' | '.'))
        },
    };
    if valid {
        Ok(())
    } else if id.is_empty() {
        Err(OpcError::InvalidId("relationship id must not be empty".to_string()))
    } else {
        Err(OpcError::InvalidId(format!("'{}' is not a valid XML id", id)))
    }
}

/// Parse relationships XML into SerializedRelationship structs.
fn parse_rels_xml(rels_xml: &[u8]) -> Result<SmallVec<[SerializedRelationship; 8]>> {
    let mut srels = SmallVec::new();
    let mut reader = Reader::from_reader(rels_xml);
    reader.config_mut().trim_text(true);

    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                if e.local_name().as_ref() == b"Relationship" {
                    let mut srel = SerializedRelationship {
                        id: None,
                        reltype: None,
                        target_ref: None,
                        target_mode: None,
                    };

                    for attr in e.attributes() {
                        let attr = attr?;
                        match attr.key.as_ref() {
                            b"Id" => srel.id = Some(attr.unescape_value()?.to_string()),
                            b"Type" => srel.reltype = Some(attr.unescape_value()?.to_string()),
                            b"Target" => srel.target_ref = Some(attr.unescape_value()?.to_string()),
                            b"TargetMode" => {
                                srel.target_mode = Some(attr.unescape_value()?.to_string())
                            },
                            _ => {},
                        }
                    }

                    srels.push(srel);
                }
            },
            Ok(Event::Eof) => break,
            Err(e) => return Err(OpcError::XmlError(format!("Rels parse error: {}", e))),
            _ => {},
        }
        buf.clear();
    }

    Ok(srels)
}

#[cfg(test)]
mod tests {
    use super::*;

    const REL_TYPE: &str = "http://example.com/rel";

    fn part_rels() -> Relationships {
        Relationships::new(PackURI::new("/word/document.xml").unwrap())
    }

    #[test]
    fn test_auto_ids_are_sequential() {
        let mut rels = part_rels();
        for expected in ["Re0", "Re1", "Re2"] {
            let rel = rels.add("target.xml", TargetMode::Internal, REL_TYPE, None).unwrap();
            assert_eq!(rel.id(), expected);
        }
        let ids: Vec<&str> = rels.iter().map(Relationship::id).collect();
        assert_eq!(ids, ["Re0", "Re1", "Re2"]);
    }

    #[test]
    fn test_auto_ids_are_never_reused() {
        let mut rels = part_rels();
        for _ in 0..3 {
            rels.add("target.xml", TargetMode::Internal, REL_TYPE, None).unwrap();
        }
        assert!(rels.remove("Re1").is_some());
        let rel = rels.add("target.xml", TargetMode::Internal, REL_TYPE, None).unwrap();
        assert_eq!(rel.id(), "Re3");

        // Removing the newest id does not rewind the counter either.
        rels.remove("Re3");
        let rel = rels.add("target.xml", TargetMode::Internal, REL_TYPE, None).unwrap();
        assert_eq!(rel.id(), "Re4");
    }

    #[test]
    fn test_auto_ids_skip_explicit_ids() {
        let mut rels = part_rels();
        rels.add("a.xml", TargetMode::Internal, REL_TYPE, Some("Re0")).unwrap();
        rels.add("b.xml", TargetMode::Internal, REL_TYPE, Some("Re2")).unwrap();
        assert_eq!(rels.add("c.xml", TargetMode::Internal, REL_TYPE, None).unwrap().id(), "Re1");
        assert_eq!(rels.add("d.xml", TargetMode::Internal, REL_TYPE, None).unwrap().id(), "Re3");
    }

    #[test]
    fn test_add_validation() {
        let mut rels = part_rels();
        assert!(matches!(
            rels.add("a.xml", TargetMode::Internal, "  ", None),
            Err(OpcError::InvalidRelationshipType(_))
        ));
        assert!(matches!(
            rels.add("a.xml", TargetMode::Internal, REL_TYPE, Some("")),
            Err(OpcError::InvalidId(_))
        ));
        assert!(matches!(
            rels.add("a.xml", TargetMode::Internal, REL_TYPE, Some("1abc")),
            Err(OpcError::InvalidId(_))
        ));
        assert!(matches!(
            rels.add("", TargetMode::Internal, REL_TYPE, None),
            Err(OpcError::InvalidTargetUri(_))
        ));
        assert!(matches!(
            rels.add("http://example.com/", TargetMode::Internal, REL_TYPE, None),
            Err(OpcError::InvalidArgument(_))
        ));
        assert!(matches!(
            rels.add("_rels/other.xml.rels", TargetMode::Internal, REL_TYPE, None),
            Err(OpcError::InvalidTargetUri(_))
        ));

        rels.add("a.xml", TargetMode::Internal, REL_TYPE, Some("rId1")).unwrap();
        assert!(matches!(
            rels.add("b.xml", TargetMode::Internal, REL_TYPE, Some("rId1")),
            Err(OpcError::InvalidId(_))
        ));
        assert!(rels
            .add("http://example.com/", TargetMode::External, REL_TYPE, None)
            .is_ok());
        assert_eq!(rels.len(), 2);
    }

    #[test]
    fn test_lookup_and_by_type() {
        let mut rels = part_rels();
        rels.add("styles.xml", TargetMode::Internal, "type/styles", Some("rId1")).unwrap();
        rels.add("media/a.png", TargetMode::Internal, "type/image", Some("rId2")).unwrap();
        rels.add("media/b.png", TargetMode::Internal, "type/image", Some("rId3")).unwrap();

        assert!(rels.contains("rId2"));
        assert!(!rels.contains("rId9"));
        assert!(rels.get("rId9").is_none());

        let images: Vec<&str> = rels.by_type("type/image").map(Relationship::id).collect();
        assert_eq!(images, ["rId2", "rId3"]);

        assert_eq!(rels.part_with_reltype("type/styles").unwrap().id(), "rId1");
        assert!(rels.part_with_reltype("type/image").is_err());
        assert!(matches!(
            rels.part_with_reltype("type/none"),
            Err(OpcError::RelationshipNotFound(_))
        ));

        rels.remove("rId2");
        assert_eq!(rels.get("rId3").unwrap().target_uri(), "media/b.png");
    }

    #[test]
    fn test_lookup_outlives_type_argument() {
        let mut rels = part_rels();
        rels.add("styles.xml", TargetMode::Internal, "type/styles", None).unwrap();

        let found = {
            let reltype = format!("type/{}", "styles");
            rels.part_with_reltype(&reltype).unwrap()
        };
        assert_eq!(found.target_uri(), "styles.xml");

        let first = {
            let reltype = String::from("type/styles");
            rels.by_type(&reltype).next()
        };
        assert_eq!(first.map(Relationship::id), Some("Re0"));
    }

    #[test]
    fn test_target_partname() {
        let mut rels = part_rels();
        let rel = rels.add("../media/a.png", TargetMode::Internal, REL_TYPE, None).unwrap();
        assert_eq!(rel.target_partname().unwrap().as_str(), "/media/a.png");

        let rel = rels
            .add("https://example.com/x", TargetMode::External, REL_TYPE, None)
            .unwrap();
        assert!(matches!(
            rel.target_partname(),
            Err(OpcError::InvalidTargetUri(_))
        ));
    }

    #[test]
    fn test_to_xml() {
        let mut rels = Relationships::new(PackURI::package_root());
        rels.add("word/document.xml", TargetMode::Internal, REL_TYPE, None).unwrap();
        rels.add("http://a.b/?x=1&y=2", TargetMode::External, REL_TYPE, None).unwrap();

        let xml = rels.to_xml();
        assert!(xml.contains(
            r#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">"#
        ));
        assert!(xml.contains(
            r#"<Relationship Id="Re0" Target="word/document.xml" Type="http://example.com/rel"/>"#
        ));
        assert!(xml.contains(
            r#"<Relationship Id="Re1" Target="http://a.b/?x=1&amp;y=2" TargetMode="External" Type="http://example.com/rel"/>"#
        ));
        assert_eq!(xml.matches("TargetMode=").count(), 1);
    }

    #[test]
    fn test_from_xml_round_trip() {
        let mut rels = part_rels();
        rels.add("styles.xml", TargetMode::Internal, "type/styles", Some("rId7")).unwrap();
        rels.add("http://a.b/?x=1&y=2", TargetMode::External, "type/link", None).unwrap();

        let loaded = Relationships::from_xml(rels.source().clone(), rels.to_xml().as_bytes()).unwrap();
        let before: Vec<&Relationship> = rels.iter().collect();
        let after: Vec<&Relationship> = loaded.iter().collect();
        assert_eq!(before, after);
    }

    #[test]
    fn test_from_xml_defaults_to_internal() {
        let xml = br#"<?xml version="1.0"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://example.com/rel" Target="word/document.xml"/>
    <Relationship Id="rId2" Type="http://example.com/link" Target="http://example.com/" TargetMode="External"></Relationship>
</Relationships>"#;

        let rels = Relationships::from_xml(PackURI::package_root(), xml).unwrap();
        assert_eq!(rels.len(), 2);
        assert_eq!(rels.get("rId1").unwrap().target_mode(), TargetMode::Internal);
        assert_eq!(rels.get("rId2").unwrap().target_mode(), TargetMode::External);
        assert!(rels.get("rId1").unwrap().source().is_package_root());
    }

    #[test]
    fn test_from_xml_rejects_bad_target_mode() {
        let xml = br#"<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="t" Target="a.xml" TargetMode="Sideways"/>
</Relationships>"#;
        assert!(Relationships::from_xml(PackURI::package_root(), xml).is_err());
    }
}
