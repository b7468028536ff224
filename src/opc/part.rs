//! Open Packaging Convention (OPC) objects related to package parts.
//!
//! This module provides the [`Part`] handle and the ordered part index shared by the
//! package and its storage backend. Parts are the fundamental units of content in an
//! OPC package, each with a unique partname, a content type, a compression hint and
//! optional relationships.

use crate::opc::packuri::{self, PackURI};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Compression hint for a part.
///
/// The ZIP backend writes `NotCompressed` parts as stored entries and every other
/// option as deflated entries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum CompressionOption {
    NotCompressed,
    #[default]
    Normal,
    Maximum,
    Fast,
    SuperFast,
}

impl CompressionOption {
    #[inline]
    pub fn is_compressed(self) -> bool {
        self != CompressionOption::NotCompressed
    }
}

#[derive(Debug)]
struct PartInner {
    partname: PackURI,
    content_type: String,
    compression: CompressionOption,
    is_relationship_part: bool,
    removed: AtomicBool,
}

/// A part in an OPC package.
///
/// `Part` is a cheap handle: clones refer to the same part. Once the part is deleted from
/// its package every handle reports [`Part::is_removed`], and package operations given
/// such a handle fail with `PartAlreadyRemoved`.
#[derive(Debug, Clone)]
pub struct Part {
    inner: Arc<PartInner>,
}

impl Part {
    /// Create a part handle. The relationship-part flag is derived from the partname.
    pub fn new(partname: PackURI, content_type: String, compression: CompressionOption) -> Self {
        let is_relationship_part = packuri::is_relationship_part_name(partname.as_str());
        Self {
            inner: Arc::new(PartInner {
                partname,
                content_type,
                compression,
                is_relationship_part,
                removed: AtomicBool::new(false),
            }),
        }
    }

    /// Get the partname of this part.
    #[inline]
    pub fn partname(&self) -> &PackURI {
        &self.inner.partname
    }

    /// Get the content type of this part.
    #[inline]
    pub fn content_type(&self) -> &str {
        &self.inner.content_type
    }

    #[inline]
    pub fn compression(&self) -> CompressionOption {
        self.inner.compression
    }

    /// Whether this is a synthetic `_rels/*.rels` part.
    #[inline]
    pub fn is_relationship_part(&self) -> bool {
        self.inner.is_relationship_part
    }

    /// Whether this part has been deleted from its package.
    #[inline]
    pub fn is_removed(&self) -> bool {
        self.inner.removed.load(Ordering::Acquire)
    }

    pub(crate) fn mark_removed(&self) {
        self.inner.removed.store(true, Ordering::Release);
    }

    /// Whether two handles refer to the same part object.
    #[inline]
    pub fn ptr_eq(&self, other: &Part) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

/// Insertion-ordered map of parts keyed by normalized partname.
///
/// Iteration order is creation order for parts created in-process and central-directory
/// order for discovered parts; it is also the order parts are written on flush.
#[derive(Debug, Default)]
pub struct PartIndex {
    order: Vec<PackURI>,
    parts: HashMap<PackURI, Part>,
}

impl PartIndex {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert a part. Returns `false` (and leaves the index unchanged) when a part with
    /// the same normalized name is already present.
    pub fn insert(&mut self, part: Part) -> bool {
        if self.parts.contains_key(part.partname()) {
            return false;
        }
        self.order.push(part.partname().clone());
        self.parts.insert(part.partname().clone(), part);
        true
    }

    #[inline]
    pub fn get(&self, partname: &PackURI) -> Option<&Part> {
        self.parts.get(partname)
    }

    #[inline]
    pub fn contains(&self, partname: &PackURI) -> bool {
        self.parts.contains_key(partname)
    }

    pub fn remove(&mut self, partname: &PackURI) -> Option<Part> {
        let part = self.parts.remove(partname)?;
        self.order.retain(|name| name != partname);
        Some(part)
    }

    /// Parts in index order.
    pub fn iter(&self) -> impl Iterator<Item = &Part> {
        self.order.iter().filter_map(|name| self.parts.get(name))
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.order.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.order.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn part(name: &str) -> Part {
        Part::new(
            PackURI::new(name).unwrap(),
            "application/xml".to_string(),
            CompressionOption::Normal,
        )
    }

    #[test]
    fn test_relationship_flag() {
        assert!(!part("/word/document.xml").is_relationship_part());
        assert!(part("/word/_rels/document.xml.rels").is_relationship_part());
        assert!(part("/_rels/.rels").is_relationship_part());
    }

    #[test]
    fn test_removed_flag_is_shared() {
        let a = part("/a.xml");
        let b = a.clone();
        assert!(a.ptr_eq(&b));
        a.mark_removed();
        assert!(b.is_removed());
    }

    #[test]
    fn test_index_preserves_order_and_ignores_case() {
        let mut index = PartIndex::new();
        assert!(index.insert(part("/b.xml")));
        assert!(index.insert(part("/a.xml")));
        assert!(index.insert(part("/c.xml")));
        assert!(!index.insert(part("/A.XML")));

        let names: Vec<&str> = index.iter().map(|p| p.partname().as_str()).collect();
        assert_eq!(names, ["/b.xml", "/a.xml", "/c.xml"]);

        let removed = index.remove(&PackURI::new("/A.xml").unwrap()).unwrap();
        assert_eq!(removed.partname().as_str(), "/a.xml");
        assert_eq!(index.len(), 2);
        assert!(!index.contains(&PackURI::new("/a.xml").unwrap()));
    }
}
