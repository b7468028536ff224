//! Content-type validation and the `[Content_Types].xml` stream.
//!
//! [`ContentTypeMap`] implements the discovery side (Default-by-extension and
//! Override-by-partname lookups); [`ContentTypesItem`] regenerates the document
//! from the live part list on every flush.

use crate::opc::constants::namespace;
use crate::opc::error::{OpcError, Result};
use crate::opc::packuri::PackURI;
use crate::opc::xml::{XML_DECLARATION, escape_xml};
use quick_xml::Reader;
use quick_xml::events::Event;
use std::collections::HashMap;

/// Check that `content_type` has the form `type/subtype`.
///
/// The empty string is accepted and means "unspecified"; callers that need a concrete
/// content type (such as part creation) reject it themselves.
pub fn validate_content_type(content_type: &str) -> Result<()> {
    if content_type.is_empty() {
        return Ok(());
    }

    let invalid = || OpcError::InvalidContentType(content_type.to_string());
    let (media_type, subtype) = content_type.split_once('/').ok_or_else(invalid)?;
    if media_type.is_empty()
        || subtype.is_empty()
        || subtype.contains('/')
        || content_type.chars().any(|c| c.is_whitespace() || c.is_control())
    {
        return Err(invalid());
    }
    Ok(())
}

/// Content type map for looking up content types by part name or extension.
///
/// Implements the OPC content type discovery algorithm using Default and Override elements
/// from [Content_Types].xml.
#[derive(Debug, Default)]
pub(crate) struct ContentTypeMap {
    /// Maps lower-cased file extensions to default content types
    defaults: HashMap<String, String>,

    /// Maps normalized partnames to override content types
    overrides: HashMap<String, String>,
}

impl ContentTypeMap {
    /// Parse content types from [Content_Types].xml.
    pub(crate) fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut map = Self::default();
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(true);

        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Empty(ref e)) | Ok(Event::Start(ref e)) => {
                    match e.local_name().as_ref() {
                        b"Default" => {
                            let mut extension = None;
                            let mut content_type = None;

                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"Extension" => {
                                        extension = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }

                            if let (Some(ext), Some(ct)) = (extension, content_type) {
                                map.add_default(&ext, ct);
                            }
                        },
                        b"Override" => {
                            let mut partname = None;
                            let mut content_type = None;

                            for attr in e.attributes() {
                                let attr = attr?;
                                match attr.key.as_ref() {
                                    b"PartName" => {
                                        partname = Some(attr.unescape_value()?.to_string());
                                    },
                                    b"ContentType" => {
                                        content_type = Some(attr.unescape_value()?.to_string());
                                    },
                                    _ => {},
                                }
                            }

                            if let (Some(pn), Some(ct)) = (partname, content_type) {
                                map.add_override(&pn, ct);
                            }
                        },
                        _ => {},
                    }
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Content types parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(map)
    }

    fn add_default(&mut self, extension: &str, content_type: String) {
        self.defaults.insert(extension.to_lowercase(), content_type);
    }

    fn add_override(&mut self, partname: &str, content_type: String) {
        self.overrides
            .insert(crate::opc::packuri::normalized_for_comparison(partname), content_type);
    }

    /// Get the content type for a partname: exact Override first, then the Default
    /// registered for its extension.
    pub(crate) fn get(&self, pack_uri: &PackURI) -> Option<&str> {
        if let Some(ct) = self.overrides.get(pack_uri.key()) {
            return Some(ct);
        }
        self.defaults
            .get(&pack_uri.ext().to_lowercase())
            .map(String::as_str)
    }
}

/// Builder for a freshly generated [Content_Types].xml.
///
/// The first part seen with a given extension sets that extension's Default; later parts
/// sharing the extension but not the content type get an Override keyed by their full
/// partname. Parts without an extension always get an Override.
#[derive(Debug, Default)]
pub(crate) struct ContentTypesItem {
    /// Default content types in first-seen order
    defaults: Vec<(String, String)>,

    /// Override content types in part order
    overrides: Vec<(String, String)>,
}

impl ContentTypesItem {
    /// Build a ContentTypesItem from `(partname, content type)` pairs in part order.
    pub(crate) fn from_parts<'a, I>(parts: I) -> Self
    where
        I: IntoIterator<Item = (&'a PackURI, &'a str)>,
    {
        let mut cti = Self::default();
        for (partname, content_type) in parts {
            cti.add_content_type(partname, content_type);
        }
        cti
    }

    fn add_content_type(&mut self, partname: &PackURI, content_type: &str) {
        let ext = partname.ext().to_lowercase();
        if ext.is_empty() {
            self.overrides
                .push((partname.to_string(), content_type.to_string()));
            return;
        }

        match self.defaults.iter().find(|(e, _)| *e == ext) {
            Some((_, default_ct)) if default_ct == content_type => {},
            Some(_) => self
                .overrides
                .push((partname.to_string(), content_type.to_string())),
            None => self.defaults.push((ext, content_type.to_string())),
        }
    }

    /// Generate the XML for [Content_Types].xml.
    pub(crate) fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(256 + 128 * (self.defaults.len() + self.overrides.len()));

        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(r#"<Types xmlns="{}">"#, namespace::OPC_CONTENT_TYPES));
        xml.push('\n');

        for (ext, content_type) in &self.defaults {
            xml.push_str(&format!(
                r#"  <Default Extension="{}" ContentType="{}"/>"#,
                escape_xml(ext),
                escape_xml(content_type)
            ));
            xml.push('\n');
        }

        for (partname, content_type) in &self.overrides {
            xml.push_str(&format!(
                r#"  <Override PartName="{}" ContentType="{}"/>"#,
                escape_xml(partname),
                escape_xml(content_type)
            ));
            xml.push('\n');
        }

        xml.push_str("</Types>");
        xml
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_content_type() {
        assert!(validate_content_type("application/xml").is_ok());
        assert!(validate_content_type("").is_ok());
        assert!(matches!(
            validate_content_type("application"),
            Err(OpcError::InvalidContentType(_))
        ));
        assert!(matches!(
            validate_content_type("a/b/c"),
            Err(OpcError::InvalidContentType(_))
        ));
        assert!(validate_content_type("/xml").is_err());
        assert!(validate_content_type("application/").is_err());
        assert!(validate_content_type("application/ xml").is_err());
    }

    #[test]
    fn test_content_type_map() {
        let xml = br#"<?xml version="1.0"?>
            <Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
                <Default Extension="XML" ContentType="application/xml"/>
                <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
                <Override PartName="/word/document.xml" ContentType="application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml"/>
            </Types>"#;

        let ct_map = ContentTypeMap::from_xml(xml).unwrap();

        let uri = PackURI::new("/test.xml").unwrap();
        assert_eq!(ct_map.get(&uri), Some("application/xml"));

        let uri = PackURI::new("/Word/Document.xml").unwrap();
        assert_eq!(
            ct_map.get(&uri),
            Some("application/vnd.openxmlformats-officedocument.wordprocessingml.document.main+xml")
        );

        let uri = PackURI::new("/media/image1.png").unwrap();
        assert_eq!(ct_map.get(&uri), None);
    }

    #[test]
    fn test_content_type_map_rejects_malformed_xml() {
        assert!(ContentTypeMap::from_xml(b"<Types><Default Extension=\"xml\"").is_err());
    }

    #[test]
    fn test_default_and_override_emission() {
        let a = PackURI::new("/a.xml").unwrap();
        let b = PackURI::new("/b.xml").unwrap();
        let c = PackURI::new("/c.xml").unwrap();
        let cti = ContentTypesItem::from_parts([
            (&a, "application/x-one+xml"),
            (&b, "application/x-one+xml"),
            (&c, "application/x-two+xml"),
        ]);

        let xml = cti.to_xml();
        assert_eq!(xml.matches("<Default ").count(), 1);
        assert!(xml.contains(r#"<Default Extension="xml" ContentType="application/x-one+xml"/>"#));
        assert_eq!(xml.matches("<Override ").count(), 1);
        assert!(xml.contains(r#"<Override PartName="/c.xml" ContentType="application/x-two+xml"/>"#));
    }

    #[test]
    fn test_extensionless_parts_get_overrides() {
        let bin = PackURI::new("/customXml/blob").unwrap();
        let cti = ContentTypesItem::from_parts([(&bin, "application/octet-stream")]);
        let xml = cti.to_xml();
        assert!(!xml.contains("<Default "));
        assert!(xml.contains(r#"<Override PartName="/customXml/blob""#));
    }

    #[test]
    fn test_generated_xml_parses_back() {
        let a = PackURI::new("/word/document.xml").unwrap();
        let b = PackURI::new("/docProps/core.xml").unwrap();
        let xml = ContentTypesItem::from_parts([
            (&a, "application/xml"),
            (&b, "application/vnd.openxmlformats-package.core-properties+xml"),
        ])
        .to_xml();

        let map = ContentTypeMap::from_xml(xml.as_bytes()).unwrap();
        assert_eq!(map.get(&a), Some("application/xml"));
        assert_eq!(
            map.get(&b),
            Some("application/vnd.openxmlformats-package.core-properties+xml")
        );
    }
}
