//! Small XML helpers shared by the content-types, relationships and properties serializers.

use crate::opc::error::Result;
use aho_corasick::AhoCorasick;
use once_cell::sync::Lazy;
use quick_xml::escape::resolve_predefined_entity;
use quick_xml::events::BytesRef;

// Built once on first use
static XML_ESCAPER: Lazy<AhoCorasick> = Lazy::new(|| {
    AhoCorasick::builder()
        .build(["&", "<", ">", "\"", "'"])
        .expect("Failed to build XML escaper")
});

/// Escape XML special characters.
#[inline]
pub(crate) fn escape_xml(s: &str) -> String {
    XML_ESCAPER.replace_all(s, &["&amp;", "&lt;", "&gt;", "&quot;", "&apos;"])
}

/// Append the text of a general entity reference reported by the reader.
///
/// Character references and the five predefined entities are resolved; unknown named
/// entities are dropped.
pub(crate) fn push_entity(text: &mut String, entity: &BytesRef<'_>) -> Result<()> {
    if let Some(c) = entity.resolve_char_ref()? {
        text.push(c);
        return Ok(());
    }
    let name = entity.decode()?;
    if let Some(resolved) = resolve_predefined_entity(&name) {
        text.push_str(resolved);
    }
    Ok(())
}

/// Standard XML declaration emitted at the top of every generated part.
pub(crate) const XML_DECLARATION: &str =
    r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn resolve(name: &str) -> String {
        let mut text = String::new();
        push_entity(&mut text, &BytesRef::new(name)).unwrap();
        text
    }

    #[test]
    fn test_xml_escaping() {
        let escaped = escape_xml(r#"<foo & "bar">"#);
        assert_eq!(escaped, "&lt;foo &amp; &quot;bar&quot;&gt;");
        assert_eq!(escape_xml("it's"), "it&apos;s");
        assert_eq!(escape_xml("plain"), "plain");
    }

    #[test]
    fn test_push_entity() {
        assert_eq!(resolve("amp"), "&");
        assert_eq!(resolve("#x41"), "A");
        assert_eq!(resolve("#66"), "B");
        assert_eq!(resolve("nbsp"), "");
    }
}
