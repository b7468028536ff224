//! Package core properties (Dublin Core metadata).
//!
//! Core properties live in the part targeted by the package's core-properties
//! relationship, conventionally `/docProps/core.xml`. The package loads them on first
//! access and writes them back on flush only when a setter has been called.

use crate::opc::constants::namespace;
use crate::opc::error::{OpcError, Result};
use crate::opc::xml::{XML_DECLARATION, escape_xml, push_entity};
use chrono::{DateTime, SecondsFormat, Utc};
use quick_xml::Reader;
use quick_xml::events::Event;
use serde::{Deserialize, Serialize};

/// Core properties of a package.
///
/// Every property is optional. Setters mark the object dirty; a clean object is never
/// written, so untouched packages do not grow an empty metadata part.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PackageProperties {
    title: Option<String>,
    subject: Option<String>,
    creator: Option<String>,
    keywords: Option<String>,
    description: Option<String>,
    last_modified_by: Option<String>,
    revision: Option<String>,
    category: Option<String>,
    content_status: Option<String>,
    language: Option<String>,
    identifier: Option<String>,
    version: Option<String>,
    created: Option<DateTime<Utc>>,
    modified: Option<DateTime<Utc>>,
    last_printed: Option<DateTime<Utc>>,

    #[serde(skip)]
    dirty: bool,
}

macro_rules! text_property {
    ($(#[$doc:meta])* $field:ident, $setter:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<&str> {
            self.$field.as_deref()
        }

        pub fn $setter<S: Into<String>>(&mut self, value: Option<S>) {
            self.$field = value.map(Into::into);
            self.dirty = true;
        }
    };
}

macro_rules! date_property {
    ($(#[$doc:meta])* $field:ident, $setter:ident) => {
        $(#[$doc])*
        pub fn $field(&self) -> Option<DateTime<Utc>> {
            self.$field
        }

        pub fn $setter(&mut self, value: Option<DateTime<Utc>>) {
            self.$field = value;
            self.dirty = true;
        }
    };
}

impl PackageProperties {
    pub fn new() -> Self {
        Self::default()
    }

    text_property!(
        /// Document title (`dc:title`).
        title,
        set_title
    );
    text_property!(subject, set_subject);
    text_property!(
        /// Primary author (`dc:creator`).
        creator,
        set_creator
    );
    text_property!(keywords, set_keywords);
    text_property!(description, set_description);
    text_property!(last_modified_by, set_last_modified_by);
    text_property!(revision, set_revision);
    text_property!(category, set_category);
    text_property!(
        /// Lifecycle status such as "Draft" or "Final".
        content_status,
        set_content_status
    );
    text_property!(language, set_language);
    text_property!(identifier, set_identifier);
    text_property!(version, set_version);
    date_property!(created, set_created);
    date_property!(modified, set_modified);
    date_property!(last_printed, set_last_printed);

    /// Whether a setter has been called since the properties were loaded or saved.
    #[inline]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    /// Check if any property carries a value.
    pub fn has_data(&self) -> bool {
        self.title.is_some()
            || self.subject.is_some()
            || self.creator.is_some()
            || self.keywords.is_some()
            || self.description.is_some()
            || self.last_modified_by.is_some()
            || self.revision.is_some()
            || self.category.is_some()
            || self.content_status.is_some()
            || self.language.is_some()
            || self.identifier.is_some()
            || self.version.is_some()
            || self.created.is_some()
            || self.modified.is_some()
            || self.last_printed.is_some()
    }

    /// Parse a core-properties part.
    ///
    /// Elements are matched by local name so documents using unusual prefixes still load.
    /// Timestamps that do not parse are ignored.
    pub fn from_xml(xml: &[u8]) -> Result<Self> {
        let mut reader = Reader::from_reader(xml);
        reader.config_mut().trim_text(false);

        let mut props = Self::default();
        let mut buf = Vec::new();
        let mut current: Option<Vec<u8>> = None;
        let mut text = String::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(ref e)) => {
                    current = Some(e.local_name().as_ref().to_vec());
                    text.clear();
                },
                Ok(Event::Text(ref e)) if current.is_some() => {
                    text.push_str(std::str::from_utf8(e.as_ref())?);
                },
                Ok(Event::CData(ref e)) if current.is_some() => {
                    text.push_str(std::str::from_utf8(e.as_ref())?);
                },
                Ok(Event::GeneralRef(ref e)) if current.is_some() => {
                    push_entity(&mut text, e)?;
                },
                Ok(Event::End(_)) => {
                    if let Some(name) = current.take() {
                        props.assign(&name, text.trim());
                    }
                    text.clear();
                },
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(OpcError::XmlError(format!(
                        "Core properties parse error: {}",
                        e
                    )));
                },
                _ => {},
            }
            buf.clear();
        }

        Ok(props)
    }

    fn assign(&mut self, local_name: &[u8], value: &str) {
        if value.is_empty() {
            return;
        }
        let text = Some(value.to_string());
        match local_name {
            b"title" => self.title = text,
            b"subject" => self.subject = text,
            b"creator" => self.creator = text,
            b"keywords" => self.keywords = text,
            b"description" => self.description = text,
            b"lastModifiedBy" => self.last_modified_by = text,
            b"revision" => self.revision = text,
            b"category" => self.category = text,
            b"contentStatus" => self.content_status = text,
            b"language" => self.language = text,
            b"identifier" => self.identifier = text,
            b"version" => self.version = text,
            b"created" => self.created = parse_datetime(value),
            b"modified" => self.modified = parse_datetime(value),
            b"lastPrinted" => self.last_printed = parse_datetime(value),
            _ => {},
        }
    }

    /// Generate core.xml content for this properties set.
    pub fn to_xml(&self) -> String {
        let mut xml = String::with_capacity(1024);
        xml.push_str(XML_DECLARATION);
        xml.push('\n');
        xml.push_str(&format!(
            r#"<cp:coreProperties xmlns:cp="{}" xmlns:dc="{}" xmlns:dcterms="{}" xmlns:dcmitype="{}" xmlns:xsi="{}">"#,
            namespace::OPC_CORE_PROPERTIES,
            namespace::DC,
            namespace::DC_TERMS,
            namespace::DCMI_TYPE,
            namespace::XSI
        ));

        let text_elements = [
            ("dc:title", &self.title),
            ("dc:subject", &self.subject),
            ("dc:creator", &self.creator),
            ("cp:keywords", &self.keywords),
            ("dc:description", &self.description),
            ("cp:lastModifiedBy", &self.last_modified_by),
            ("cp:revision", &self.revision),
            ("cp:category", &self.category),
            ("cp:contentStatus", &self.content_status),
            ("dc:language", &self.language),
            ("dc:identifier", &self.identifier),
            ("cp:version", &self.version),
        ];
        for (tag, value) in text_elements {
            if let Some(value) = value {
                xml.push_str(&format!("<{tag}>{}</{tag}>", escape_xml(value)));
            }
        }

        // W3CDTF timestamps carry the xsi:type marker; lastPrinted is a plain dateTime.
        for (tag, value) in [("dcterms:created", self.created), ("dcterms:modified", self.modified)] {
            if let Some(value) = value {
                xml.push_str(&format!(
                    r#"<{tag} xsi:type="dcterms:W3CDTF">{}</{tag}>"#,
                    value.to_rfc3339_opts(SecondsFormat::Secs, true)
                ));
            }
        }
        if let Some(value) = self.last_printed {
            xml.push_str(&format!(
                "<cp:lastPrinted>{}</cp:lastPrinted>",
                value.to_rfc3339_opts(SecondsFormat::Secs, true)
            ));
        }

        xml.push_str("</cp:coreProperties>");
        xml
    }
}

/// Parse an ISO 8601 datetime string into a DateTime<Utc>.
///
/// Supports formats like:
/// - 2023-10-10T14:30:00Z
/// - 2023-10-10T14:30:00.1234567Z
/// - 2023-10-10T14:30:00
fn parse_datetime(s: &str) -> Option<DateTime<Utc>> {
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return Some(dt.with_timezone(&Utc));
    }

    ["%Y-%m-%dT%H:%M:%S%.fZ", "%Y-%m-%dT%H:%M:%SZ", "%Y-%m-%dT%H:%M:%S"]
        .iter()
        .find_map(|fmt| chrono::NaiveDateTime::parse_from_str(s, fmt).ok())
        .map(|dt| DateTime::from_naive_utc_and_offset(dt, Utc))
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Datelike, TimeZone};

    const CORE_XML: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
  <dc:title>Quarterly &amp; Annual Report</dc:title>
  <dc:creator>Jane Roe</dc:creator>
  <cp:lastModifiedBy>J. Doe</cp:lastModifiedBy>
  <cp:revision>7</cp:revision>
  <dc:description/>
  <dcterms:created xsi:type="dcterms:W3CDTF">2023-10-10T14:30:00Z</dcterms:created>
  <dcterms:modified xsi:type="dcterms:W3CDTF">not a date</dcterms:modified>
</cp:coreProperties>"#;

    #[test]
    fn test_parse_core_properties() {
        let props = PackageProperties::from_xml(CORE_XML.as_bytes()).unwrap();
        assert_eq!(props.title(), Some("Quarterly & Annual Report"));
        assert_eq!(props.creator(), Some("Jane Roe"));
        assert_eq!(props.last_modified_by(), Some("J. Doe"));
        assert_eq!(props.revision(), Some("7"));
        assert_eq!(props.description(), None);
        assert_eq!(props.created().unwrap().year(), 2023);
        assert_eq!(props.modified(), None);
        assert!(!props.is_dirty());
        assert!(props.has_data());
    }

    #[test]
    fn test_setters_mark_dirty() {
        let mut props = PackageProperties::new();
        assert!(!props.is_dirty());
        assert!(!props.has_data());

        props.set_title(Some("Draft"));
        assert!(props.is_dirty());
        assert_eq!(props.title(), Some("Draft"));

        props.mark_clean();
        props.set_title(None::<String>);
        assert!(props.is_dirty());
        assert!(!props.has_data());
    }

    #[test]
    fn test_xml_round_trip() {
        let mut props = PackageProperties::new();
        props.set_title(Some("Test & <Special> \"Characters\""));
        props.set_keywords(Some("opc, zip"));
        props.set_created(Some(Utc.with_ymd_and_hms(2024, 2, 29, 8, 0, 0).unwrap()));
        props.set_last_printed(Some(Utc.with_ymd_and_hms(2024, 3, 1, 9, 30, 0).unwrap()));

        let xml = props.to_xml();
        assert!(xml.contains("&amp;"));
        assert!(xml.contains("&lt;Special&gt;"));
        assert!(xml.contains(
            r#"<dcterms:created xsi:type="dcterms:W3CDTF">2024-02-29T08:00:00Z</dcterms:created>"#
        ));

        let mut parsed = PackageProperties::from_xml(xml.as_bytes()).unwrap();
        parsed.dirty = true;
        assert_eq!(parsed, props);
    }

    #[test]
    fn test_parse_datetime() {
        assert!(parse_datetime("2023-10-10T14:30:00Z").is_some());
        assert!(parse_datetime("2023-10-10T14:30:00.123456Z").is_some());
        assert!(parse_datetime("2023-10-10T14:30:00").is_some());
        assert!(parse_datetime("yesterday").is_none());
    }
}
