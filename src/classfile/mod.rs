//! Lossless class-file record model.
//!
//! A JVM class file is a single big-endian stream: magic and version, the
//! constant pool, the class header (access flags, this/super class,
//! interfaces), two symmetric member collections (fields, then methods), and
//! a trailing attribute list. [`ClassFile`] decodes that stream into an
//! editable record tree and re-encodes it byte-losslessly when nothing was
//! touched, which is what lets the rewriter guarantee that every change in
//! the output is one it made on purpose.
//!
//! # Key Components
//!
//! - [`ClassFile`] - the decoded file: versions, pool, header, members,
//!   attributes.
//! - [`MemberInfo`] - one field or method record (the two collections share
//!   a layout).
//! - [`constantpool::ConstantPool`] - the reference-counted pool; all index
//!   bookkeeping for renames happens there.
//! - [`attributes`] / [`code`] - attribute payload plumbing and the bytecode
//!   pool-site walker.
//! - [`descriptor`] / [`mutf8`] / [`access`] - descriptor rewriting, modified
//!   UTF-8, and access-flag types.
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use classcloak::classfile::ClassFile;
//!
//! let bytes = std::fs::read("Greeter.class")?;
//! let class = ClassFile::decode(&bytes)?;
//! println!("{} extends {:?}", class.class_name()?, class.super_name()?);
//! assert_eq!(class.encode(), bytes);
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::file::{push_be, Parser};
use crate::Result;

pub mod access;
pub mod attributes;
pub mod code;
pub mod constantpool;
pub mod descriptor;
pub mod mutf8;

pub use attributes::AttributeInfo;
pub use constantpool::{ConstantPool, PoolEntry, PoolTag};

/// Class-file magic number.
pub const MAGIC: u32 = 0xCAFE_BABE;

/// Newest major version the rewriter has been exercised against (Java 25).
///
/// Newer files still decode - the layout this crate touches is stable across
/// versions - but get a warning so surprises are traceable.
pub const SUPPORTED_MAJOR: u16 = 69;

/// One field or method record.
///
/// The two member collections of a class file share this layout; only their
/// position in the stream distinguishes them.
#[derive(Debug, Clone)]
pub struct MemberInfo {
    /// Raw access flags; interpret via [`access::FieldAccess`] or
    /// [`access::MethodAccess`] depending on the collection.
    pub access_flags: u16,
    /// Pool index of the member name (Utf8).
    pub name_index: u16,
    /// Pool index of the field or method descriptor (Utf8).
    pub descriptor_index: u16,
    /// Attributes attached to this member.
    pub attributes: Vec<AttributeInfo>,
}

impl MemberInfo {
    /// Resolve the member name through the pool.
    pub fn name<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8_at(self.name_index)
    }

    /// Resolve the descriptor through the pool.
    pub fn descriptor<'a>(&self, pool: &'a ConstantPool) -> Result<&'a str> {
        pool.utf8_at(self.descriptor_index)
    }

    fn decode(parser: &mut Parser<'_>) -> Result<MemberInfo> {
        let access_flags = parser.read_be::<u16>()?;
        let name_index = parser.read_be::<u16>()?;
        let descriptor_index = parser.read_be::<u16>()?;
        let attributes = attributes::decode_list(parser)?;
        Ok(MemberInfo {
            access_flags,
            name_index,
            descriptor_index,
            attributes,
        })
    }

    fn encode(&self, sink: &mut Vec<u8>) {
        push_be(sink, self.access_flags);
        push_be(sink, self.name_index);
        push_be(sink, self.descriptor_index);
        attributes::encode_list(&self.attributes, sink);
    }
}

/// A decoded class file.
///
/// Every structural piece of the input stream is held losslessly:
/// [`encode`](ClassFile::encode) of an unmodified file reproduces the input
/// bytes. Mutation goes through the typed operations on this struct and on
/// [`ConstantPool`]; nothing here re-derives or normalizes what the compiler
/// emitted.
#[derive(Debug, Clone)]
pub struct ClassFile {
    /// Minor version (almost always 0, or 0xFFFF for preview features).
    pub minor_version: u16,
    /// Major version (45 = Java 1.1 through [`SUPPORTED_MAJOR`]).
    pub major_version: u16,
    /// The constant pool.
    pub pool: ConstantPool,
    /// Raw class access flags; interpret via [`access::ClassAccess`].
    pub access_flags: u16,
    /// Pool index of this class (Class entry).
    pub this_class: u16,
    /// Pool index of the superclass, or 0 for `java/lang/Object`.
    pub super_class: u16,
    /// Pool indices of directly implemented interfaces (Class entries).
    pub interfaces: Vec<u16>,
    /// Field records, in declaration order.
    pub fields: Vec<MemberInfo>,
    /// Method records, in declaration order.
    pub methods: Vec<MemberInfo>,
    /// Class-level attributes.
    pub attributes: Vec<AttributeInfo>,
}

impl ClassFile {
    /// Decode a class file from `data`.
    ///
    /// # Errors
    /// Returns [`crate::Error::CorruptFormat`] on a bad magic number, a short
    /// read, or an unrecognized constant-pool tag. A major version above
    /// [`SUPPORTED_MAJOR`] logs a warning and decodes best-effort.
    pub fn decode(data: &[u8]) -> Result<ClassFile> {
        let mut parser = Parser::new(data);

        let magic = parser.read_be::<u32>()?;
        if magic != MAGIC {
            return Err(corrupt_format!("invalid class file magic"));
        }
        let minor_version = parser.read_be::<u16>()?;
        let major_version = parser.read_be::<u16>()?;
        if major_version > SUPPORTED_MAJOR {
            tracing::warn!(
                major_version,
                supported = SUPPORTED_MAJOR,
                "class file version is newer than supported, decoding best-effort"
            );
        }

        let pool = ConstantPool::decode(&mut parser)?;

        let access_flags = parser.read_be::<u16>()?;
        let this_class = parser.read_be::<u16>()?;
        let super_class = parser.read_be::<u16>()?;

        let interface_count = parser.read_be::<u16>()? as usize;
        let mut interfaces = Vec::with_capacity(interface_count);
        for _ in 0..interface_count {
            interfaces.push(parser.read_be::<u16>()?);
        }

        let field_count = parser.read_be::<u16>()? as usize;
        let mut fields = Vec::with_capacity(field_count);
        for _ in 0..field_count {
            fields.push(MemberInfo::decode(&mut parser)?);
        }

        let method_count = parser.read_be::<u16>()? as usize;
        let mut methods = Vec::with_capacity(method_count);
        for _ in 0..method_count {
            methods.push(MemberInfo::decode(&mut parser)?);
        }

        let attributes = attributes::decode_list(&mut parser)?;

        if parser.has_more_data() {
            return Err(corrupt_format!("trailing bytes after class file"));
        }

        Ok(ClassFile {
            minor_version,
            major_version,
            pool,
            access_flags,
            this_class,
            super_class,
            interfaces,
            fields,
            methods,
            attributes,
        })
    }

    /// Re-encode the file to bytes. Byte-identical to the input when nothing
    /// was modified since [`decode`](ClassFile::decode).
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        let mut sink = Vec::with_capacity(1024);
        push_be(&mut sink, MAGIC);
        push_be(&mut sink, self.minor_version);
        push_be(&mut sink, self.major_version);
        self.pool.encode(&mut sink);
        push_be(&mut sink, self.access_flags);
        push_be(&mut sink, self.this_class);
        push_be(&mut sink, self.super_class);
        push_be(&mut sink, self.interfaces.len() as u16);
        for interface in &self.interfaces {
            push_be(&mut sink, *interface);
        }
        push_be(&mut sink, self.fields.len() as u16);
        for field in &self.fields {
            field.encode(&mut sink);
        }
        push_be(&mut sink, self.methods.len() as u16);
        for method in &self.methods {
            method.encode(&mut sink);
        }
        attributes::encode_list(&self.attributes, &mut sink);
        sink
    }

    /// Binary name of this class (`this_class` resolved through the pool).
    pub fn class_name(&self) -> Result<&str> {
        self.pool.class_name_at(self.this_class)
    }

    /// Binary name of the superclass, or `None` for `java/lang/Object`.
    pub fn super_name(&self) -> Result<Option<&str>> {
        if self.super_class == 0 {
            return Ok(None);
        }
        self.pool.class_name_at(self.super_class).map(Some)
    }

    /// Binary names of the directly implemented interfaces.
    pub fn interface_names(&self) -> Result<Vec<&str>> {
        self.interfaces
            .iter()
            .map(|&index| self.pool.class_name_at(index))
            .collect()
    }

    /// Remove the field record at `index`, shifting later records down.
    pub fn remove_field(&mut self, index: usize) -> MemberInfo {
        self.fields.remove(index)
    }

    /// Remove the method record at `index`, shifting later records down.
    pub fn remove_method(&mut self, index: usize) -> MemberInfo {
        self.methods.remove(index)
    }

    /// Collect every structural root reference into the pool: the header
    /// indices, member name/descriptor indices, and all attribute references
    /// (recursing through `Code`). Multiplicity is preserved, so feeding the
    /// result to [`ConstantPool::recount`] produces exact counts.
    pub fn structural_refs(&self, out: &mut Vec<u16>) -> Result<()> {
        out.push(self.this_class);
        if self.super_class != 0 {
            out.push(self.super_class);
        }
        out.extend_from_slice(&self.interfaces);

        for member in self.fields.iter().chain(&self.methods) {
            out.push(member.name_index);
            out.push(member.descriptor_index);
            for attr in &member.attributes {
                attributes::collect_refs(&self.pool, attr, out)?;
            }
        }
        for attr in &self.attributes {
            attributes::collect_refs(&self.pool, attr, out)?;
        }
        Ok(())
    }

    /// Recompute all pool reference counts from the structural roots.
    pub fn recount_pool(&mut self) -> Result<()> {
        let mut roots = Vec::with_capacity(64);
        self.structural_refs(&mut roots)?;
        self.pool.recount(roots)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    /// Minimal valid class: `class a/B` extending `java/lang/Object`, no
    /// members, no attributes.
    fn minimal_class() -> Vec<u8> {
        let mut pool = ConstantPool::new();
        let this_name = pool.add_utf8("a/B").unwrap();
        let this_class = pool
            .append_or_reuse(PoolEntry::Class { name_index: this_name })
            .unwrap();
        let super_name = pool.add_utf8("java/lang/Object").unwrap();
        let super_class = pool
            .append_or_reuse(PoolEntry::Class { name_index: super_name })
            .unwrap();

        let mut sink = Vec::new();
        push_be(&mut sink, MAGIC);
        push_be(&mut sink, 0u16);
        push_be(&mut sink, 52u16);
        pool.encode(&mut sink);
        push_be(&mut sink, 0x0021u16); // public super
        push_be(&mut sink, this_class);
        push_be(&mut sink, super_class);
        push_be(&mut sink, 0u16); // interfaces
        push_be(&mut sink, 0u16); // fields
        push_be(&mut sink, 0u16); // methods
        push_be(&mut sink, 0u16); // attributes
        sink
    }

    #[test]
    fn decode_minimal_class() {
        let bytes = minimal_class();
        let class = ClassFile::decode(&bytes).unwrap();
        assert_eq!(class.major_version, 52);
        assert_eq!(class.class_name().unwrap(), "a/B");
        assert_eq!(class.super_name().unwrap(), Some("java/lang/Object"));
        assert!(class.interfaces.is_empty());
    }

    #[test]
    fn encode_round_trips_losslessly() {
        let bytes = minimal_class();
        let class = ClassFile::decode(&bytes).unwrap();
        assert_eq!(class.encode(), bytes);
    }

    #[test]
    fn bad_magic_is_corrupt() {
        let mut bytes = minimal_class();
        bytes[0] = 0xDE;
        assert!(matches!(
            ClassFile::decode(&bytes),
            Err(crate::Error::CorruptFormat { .. })
        ));
    }

    #[test]
    fn trailing_bytes_are_corrupt() {
        let mut bytes = minimal_class();
        bytes.push(0);
        assert!(ClassFile::decode(&bytes).is_err());
    }

    #[test]
    fn recount_from_structural_roots() {
        let bytes = minimal_class();
        let mut class = ClassFile::decode(&bytes).unwrap();
        class.recount_pool().unwrap();
        assert_eq!(class.pool.count_of(class.this_class).unwrap(), 1);
        // The Utf8 behind this_class is referenced once, by the Class entry.
        let name_index = match class.pool.get(class.this_class).unwrap() {
            PoolEntry::Class { name_index } => *name_index,
            _ => unreachable!(),
        };
        assert_eq!(class.pool.count_of(name_index).unwrap(), 1);
    }
}
