//! Collaborator seams for container/archive enumeration.
//!
//! Archive formats, manifests and digests live outside this crate. The
//! session only needs two capabilities: enumerate `(name, bytes)` entries
//! out of some container, and write entries into another. Non-class entries
//! pass through a session verbatim; manifest regeneration is the caller's
//! concern.
//!
//! [`MemoryContainer`] implements both traits over an in-memory entry list
//! and is what the integration tests drive whole sessions through.

use crate::Result;

/// A source of named binary entries.
pub trait ContainerReader {
    /// Every entry as `(name, bytes)`, in container order.
    fn read_entries(&mut self) -> Result<Vec<(String, Vec<u8>)>>;
}

/// A sink for named binary entries.
pub trait ContainerSink {
    /// Append one entry.
    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()>;
}

/// `true` when the entry name denotes a class file.
#[must_use]
pub fn is_class_entry(name: &str) -> bool {
    name.ends_with(".class")
}

/// An in-memory container, readable and writable.
#[derive(Debug, Default, Clone)]
pub struct MemoryContainer {
    entries: Vec<(String, Vec<u8>)>,
}

impl MemoryContainer {
    /// An empty container.
    #[must_use]
    pub fn new() -> MemoryContainer {
        MemoryContainer::default()
    }

    /// Add an entry directly (builder-style, for tests and fixtures).
    pub fn insert(&mut self, name: impl Into<String>, bytes: Vec<u8>) {
        self.entries.push((name.into(), bytes));
    }

    /// The bytes of the named entry, if present.
    #[must_use]
    pub fn entry(&self, name: &str) -> Option<&[u8]> {
        self.entries
            .iter()
            .find(|(entry, _)| entry == name)
            .map(|(_, bytes)| bytes.as_slice())
    }

    /// Entry names in container order.
    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|(name, _)| name.as_str())
    }

    /// Number of entries.
    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// `true` when the container holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

impl ContainerReader for MemoryContainer {
    fn read_entries(&mut self) -> Result<Vec<(String, Vec<u8>)>> {
        Ok(self.entries.clone())
    }
}

impl ContainerSink for MemoryContainer {
    fn write_entry(&mut self, name: &str, bytes: &[u8]) -> Result<()> {
        self.entries.push((name.to_string(), bytes.to_vec()));
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_entries() {
        let mut container = MemoryContainer::new();
        container.write_entry("META-INF/notes.txt", b"hello").unwrap();
        container.write_entry("a/B.class", &[0xCA, 0xFE]).unwrap();

        let entries = container.read_entries().unwrap();
        assert_eq!(entries.len(), 2);
        assert_eq!(container.entry("a/B.class"), Some(&[0xCA, 0xFE][..]));
        assert!(is_class_entry("a/B.class"));
        assert!(!is_class_entry("META-INF/notes.txt"));
    }
}
