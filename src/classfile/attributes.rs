//! Attribute list decode/encode and attribute-payload reference scanning.
//!
//! Classes, fields, methods, and `Code` payloads each carry a variable-length
//! list of tagged attributes: a `Utf8` name pointer, a 32-bit length, and a
//! payload. Most payloads travel opaquely through a rewrite; this module
//! understands just enough of the known attributes to
//!
//! - enumerate the pool indices a payload holds (for the global recount and
//!   for the trimming reachability scan), and
//! - walk the annotation grammar with a patch-capable visitor, shared between
//!   reference collection and the rewriter's metadata remap stage.
//!
//! # Key Components
//!
//! - [`crate::classfile::attributes::AttributeInfo`] - one decoded attribute
//! - [`crate::classfile::attributes::decode_list`] /
//!   [`crate::classfile::attributes::encode_list`] - the list codec
//! - [`crate::classfile::attributes::collect_refs`] - pool references of one
//!   attribute, multiplicity preserved
//! - [`crate::classfile::attributes::walk_annotations`] - visitor over the
//!   annotation grammar with in-place u16 patching
//! - [`crate::classfile::attributes::BASELINE_KEEP`] - the attribute names the
//!   optional attribute-trim stage retains by default
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::classfile::attributes::{AttributeInfo, encode_list, decode_list};
//! use classcloak::Parser;
//!
//! let attrs = vec![AttributeInfo { name_index: 5, info: vec![0x00, 0x07] }];
//! let mut bytes = Vec::new();
//! encode_list(&attrs, &mut bytes);
//!
//! let mut parser = Parser::new(&bytes);
//! let decoded = decode_list(&mut parser)?;
//! assert_eq!(decoded, attrs);
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::{
    classfile::{code, constantpool::ConstantPool},
    file::{push_be, read_be_at, write_be_at},
    Parser, Result,
};

/// One attribute record: a pool pointer to its name and the raw payload.
///
/// The payload is owned so the rewriter can patch pool indices in place
/// without re-deriving offsets against a borrowed input buffer.
#[derive(Debug, Clone, PartialEq)]
pub struct AttributeInfo {
    /// Index of the [`crate::classfile::constantpool::PoolEntry::Utf8`] holding
    /// the attribute name.
    pub name_index: u16,
    /// The raw payload bytes (everything after the 6-byte header).
    pub info: Vec<u8>,
}

/// Attribute names the optional attribute-trim stage keeps by default.
///
/// `retain-attribute` script directives extend this set per run. Everything
/// else - debug tables, deprecation markers, unknown vendor attributes - is
/// dropped when trimming is enabled.
pub const BASELINE_KEEP: &[&str] = &[
    "Code",
    "ConstantValue",
    "Exceptions",
    "InnerClasses",
    "EnclosingMethod",
    "Signature",
    "Synthetic",
    "StackMapTable",
    "BootstrapMethods",
    "AnnotationDefault",
    "RuntimeVisibleAnnotations",
    "RuntimeInvisibleAnnotations",
    "RuntimeVisibleParameterAnnotations",
    "RuntimeInvisibleParameterAnnotations",
];

/// Decode a counted attribute list from the parser.
///
/// # Errors
/// Fails with [`crate::Error::OutOfBounds`] on a short read.
pub fn decode_list(parser: &mut Parser<'_>) -> Result<Vec<AttributeInfo>> {
    let count = parser.read_be::<u16>()?;
    let mut attrs = Vec::with_capacity(usize::from(count));
    for _ in 0..count {
        let name_index = parser.read_be::<u16>()?;
        let length = parser.read_be::<u32>()?;
        let info = parser.read_bytes(length as usize)?.to_vec();
        attrs.push(AttributeInfo { name_index, info });
    }
    Ok(attrs)
}

/// Encode a counted attribute list onto the output sink.
pub fn encode_list(attrs: &[AttributeInfo], sink: &mut Vec<u8>) {
    push_be(sink, attrs.len() as u16);
    for attr in attrs {
        push_be(sink, attr.name_index);
        push_be(sink, attr.info.len() as u32);
        sink.extend_from_slice(&attr.info);
    }
}

/// Find an attribute by name within a list.
///
/// # Errors
/// Fails with [`crate::Error::InconsistentReference`] if an attribute's name
/// pointer does not resolve to a `Utf8` entry.
pub fn find_by_name<'a>(
    attrs: &'a [AttributeInfo],
    pool: &ConstantPool,
    name: &str,
) -> Result<Option<&'a AttributeInfo>> {
    for attr in attrs {
        if pool.utf8_at(attr.name_index)? == name {
            return Ok(Some(attr));
        }
    }
    Ok(None)
}

/// Collect every pool index one attribute references, multiplicity preserved.
///
/// Known attributes are scanned structurally (including bytecode operand sites
/// and nested attributes inside `Code`); unknown attributes contribute only
/// their name pointer, since their payload layout is opaque.
///
/// # Errors
/// Fails with [`crate::Error::CorruptFormat`] if a known attribute's payload is
/// structurally malformed, or [`crate::Error::InconsistentReference`] if the
/// name pointer is not a `Utf8`.
pub fn collect_refs(pool: &ConstantPool, attr: &AttributeInfo, out: &mut Vec<u16>) -> Result<()> {
    out.push(attr.name_index);
    let name = pool.utf8_at(attr.name_index)?.to_string();
    let data = &attr.info;
    let mut pos = 0usize;

    match name.as_str() {
        "ConstantValue" | "Signature" | "SourceFile" => {
            out.push(read_be_at::<u16>(data, &mut pos)?);
        }
        "Exceptions" => {
            let count = read_be_at::<u16>(data, &mut pos)?;
            for _ in 0..count {
                out.push(read_be_at::<u16>(data, &mut pos)?);
            }
        }
        "InnerClasses" => {
            let count = read_be_at::<u16>(data, &mut pos)?;
            for _ in 0..count {
                let inner = read_be_at::<u16>(data, &mut pos)?;
                let outer = read_be_at::<u16>(data, &mut pos)?;
                let inner_name = read_be_at::<u16>(data, &mut pos)?;
                let _access = read_be_at::<u16>(data, &mut pos)?;
                push_nonzero(out, inner);
                push_nonzero(out, outer);
                push_nonzero(out, inner_name);
            }
        }
        "EnclosingMethod" => {
            let class = read_be_at::<u16>(data, &mut pos)?;
            let method = read_be_at::<u16>(data, &mut pos)?;
            out.push(class);
            push_nonzero(out, method);
        }
        "LocalVariableTable" | "LocalVariableTypeTable" => {
            collect_local_variable_refs(data, &mut pos, out)?;
        }
        "BootstrapMethods" => {
            let count = read_be_at::<u16>(data, &mut pos)?;
            for _ in 0..count {
                out.push(read_be_at::<u16>(data, &mut pos)?);
                let num_args = read_be_at::<u16>(data, &mut pos)?;
                for _ in 0..num_args {
                    out.push(read_be_at::<u16>(data, &mut pos)?);
                }
            }
        }
        "RuntimeVisibleAnnotations" | "RuntimeInvisibleAnnotations" => {
            let mut collect = collector(out);
            walk_annotations(&mut data.clone(), &mut collect)?;
        }
        "RuntimeVisibleParameterAnnotations" | "RuntimeInvisibleParameterAnnotations" => {
            let mut collect = collector(out);
            walk_parameter_annotations(&mut data.clone(), &mut collect)?;
        }
        "AnnotationDefault" => {
            let mut collect = collector(out);
            let mut buf = data.clone();
            let mut pos = 0usize;
            walk_element_value(&mut buf, &mut pos, &mut collect)?;
        }
        "Code" => {
            let parsed = code::CodeAttribute::decode(data)?;
            for site in code::pool_sites(&parsed.code)? {
                out.push(site.index);
            }
            for entry in &parsed.exception_table {
                push_nonzero(out, entry.catch_type);
            }
            for nested in &parsed.attributes {
                collect_refs(pool, nested, out)?;
            }
        }
        _ => {}
    }
    Ok(())
}

fn collect_local_variable_refs(data: &[u8], pos: &mut usize, out: &mut Vec<u16>) -> Result<()> {
    let count = read_be_at::<u16>(data, pos)?;
    for _ in 0..count {
        let _start = read_be_at::<u16>(data, pos)?;
        let _length = read_be_at::<u16>(data, pos)?;
        out.push(read_be_at::<u16>(data, pos)?); // name
        out.push(read_be_at::<u16>(data, pos)?); // descriptor or signature
        let _slot = read_be_at::<u16>(data, pos)?;
    }
    Ok(())
}

fn push_nonzero(out: &mut Vec<u16>, index: u16) {
    if index != 0 {
        out.push(index);
    }
}

fn collector(out: &mut Vec<u16>) -> impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>> + '_ {
    move |_, _, index| {
        out.push(index);
        Ok(None)
    }
}

/// One u16 pool-index site inside the annotation grammar, identified by role.
///
/// The visitor receives the site's byte offset, its role, and the current
/// index value, and may return a replacement index to patch in place.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AnnotationSite {
    /// The annotation's type descriptor (`Utf8` holding `L...;`).
    Type,
    /// An element name (`Utf8`), resolved against the annotation interface
    /// whose type-descriptor `Utf8` index is carried here.
    ElementName {
        /// The `Utf8` index of the enclosing annotation's type descriptor, as
        /// it read *before* any patching of that site.
        annotation_type_index: u16,
    },
    /// A primitive or string constant value.
    Const,
    /// The type descriptor of an enum constant value (`Utf8`).
    EnumType,
    /// The field name of an enum constant value (`Utf8`), declared on the
    /// enum class whose descriptor `Utf8` index is carried here.
    EnumConst {
        /// The `Utf8` index of the enum's type descriptor, as it read before
        /// any patching of that site.
        enum_type_index: u16,
    },
    /// A class literal value: a `Utf8` holding a field descriptor.
    ClassInfo,
}

/// Walk a `Runtime{In,}VisibleAnnotations` payload, patching visited sites in
/// place when the visitor returns a replacement.
///
/// # Errors
/// Fails with [`crate::Error::OutOfBounds`] on truncated payloads or
/// [`crate::Error::CorruptFormat`] on an unknown element-value tag, and
/// propagates visitor errors.
pub fn walk_annotations(
    data: &mut [u8],
    visit: &mut impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>>,
) -> Result<()> {
    let mut pos = 0usize;
    let count = read_be_at::<u16>(data, &mut pos)?;
    for _ in 0..count {
        walk_one_annotation(data, &mut pos, visit)?;
    }
    Ok(())
}

/// Walk a `Runtime{In,}VisibleParameterAnnotations` payload.
///
/// # Errors
/// Same failure modes as [`walk_annotations`].
pub fn walk_parameter_annotations(
    data: &mut [u8],
    visit: &mut impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>>,
) -> Result<()> {
    let mut pos = 0usize;
    let num_params = read_be_at::<u8>(data, &mut pos)?;
    for _ in 0..num_params {
        let count = read_be_at::<u16>(data, &mut pos)?;
        for _ in 0..count {
            walk_one_annotation(data, &mut pos, visit)?;
        }
    }
    Ok(())
}

fn walk_one_annotation(
    data: &mut [u8],
    pos: &mut usize,
    visit: &mut impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>>,
) -> Result<()> {
    let type_offset = *pos;
    let type_index = read_be_at::<u16>(data, pos)?;
    if let Some(new) = visit(type_offset, AnnotationSite::Type, type_index)? {
        patch_u16(data, type_offset, new)?;
    }

    let num_pairs = read_be_at::<u16>(data, pos)?;
    for _ in 0..num_pairs {
        let name_offset = *pos;
        let name_index = read_be_at::<u16>(data, pos)?;
        if let Some(new) = visit(
            name_offset,
            AnnotationSite::ElementName {
                annotation_type_index: type_index,
            },
            name_index,
        )? {
            patch_u16(data, name_offset, new)?;
        }
        walk_element_value(data, pos, visit)?;
    }
    Ok(())
}

/// Walk one `element_value` (the `AnnotationDefault` payload is exactly one).
///
/// # Errors
/// Same failure modes as [`walk_annotations`].
pub fn walk_element_value(
    data: &mut [u8],
    pos: &mut usize,
    visit: &mut impl FnMut(usize, AnnotationSite, u16) -> Result<Option<u16>>,
) -> Result<()> {
    let tag = read_be_at::<u8>(data, pos)?;
    match tag {
        b'B' | b'C' | b'D' | b'F' | b'I' | b'J' | b'S' | b'Z' | b's' => {
            let offset = *pos;
            let index = read_be_at::<u16>(data, pos)?;
            if let Some(new) = visit(offset, AnnotationSite::Const, index)? {
                patch_u16(data, offset, new)?;
            }
        }
        b'e' => {
            let type_offset = *pos;
            let type_index = read_be_at::<u16>(data, pos)?;
            if let Some(new) = visit(type_offset, AnnotationSite::EnumType, type_index)? {
                patch_u16(data, type_offset, new)?;
            }
            let const_offset = *pos;
            let const_index = read_be_at::<u16>(data, pos)?;
            if let Some(new) = visit(
                const_offset,
                AnnotationSite::EnumConst {
                    enum_type_index: type_index,
                },
                const_index,
            )? {
                patch_u16(data, const_offset, new)?;
            }
        }
        b'c' => {
            let offset = *pos;
            let index = read_be_at::<u16>(data, pos)?;
            if let Some(new) = visit(offset, AnnotationSite::ClassInfo, index)? {
                patch_u16(data, offset, new)?;
            }
        }
        b'@' => walk_one_annotation(data, pos, visit)?,
        b'[' => {
            let count = read_be_at::<u16>(data, pos)?;
            for _ in 0..count {
                walk_element_value(data, pos, visit)?;
            }
        }
        other => {
            return Err(corrupt_format!(
                "unknown annotation element-value tag 0x{:02X}",
                other
            ))
        }
    }
    Ok(())
}

fn patch_u16(data: &mut [u8], offset: usize, value: u16) -> Result<()> {
    let mut at = offset;
    write_be_at(data, &mut at, value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classfile::constantpool::ConstantPool;

    #[test]
    fn list_round_trip() {
        let attrs = vec![
            AttributeInfo {
                name_index: 3,
                info: vec![0x00, 0x05],
            },
            AttributeInfo {
                name_index: 4,
                info: vec![],
            },
        ];
        let mut bytes = Vec::new();
        encode_list(&attrs, &mut bytes);
        let mut parser = Parser::new(&bytes);
        assert_eq!(decode_list(&mut parser).unwrap(), attrs);
    }

    #[test]
    fn collect_refs_signature_and_exceptions() {
        let mut pool = ConstantPool::new();
        let sig_name = pool.add_utf8("Signature").unwrap();
        let exc_name = pool.add_utf8("Exceptions").unwrap();

        let mut out = Vec::new();
        collect_refs(
            &pool,
            &AttributeInfo {
                name_index: sig_name,
                info: vec![0x00, 0x09],
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec![sig_name, 9]);

        out.clear();
        collect_refs(
            &pool,
            &AttributeInfo {
                name_index: exc_name,
                info: vec![0x00, 0x02, 0x00, 0x07, 0x00, 0x08],
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec![exc_name, 7, 8]);
    }

    #[test]
    fn unknown_attribute_contributes_only_its_name() {
        let mut pool = ConstantPool::new();
        let name = pool.add_utf8("SomeVendorThing").unwrap();
        let mut out = Vec::new();
        collect_refs(
            &pool,
            &AttributeInfo {
                name_index: name,
                info: vec![0xDE, 0xAD, 0xBE, 0xEF],
            },
            &mut out,
        )
        .unwrap();
        assert_eq!(out, vec![name]);
    }

    #[test]
    fn annotation_walk_visits_and_patches() {
        // one annotation: type @9, one pair: name @4, value 's' const @5
        let mut data = vec![
            0x00, 0x01, // num annotations
            0x00, 0x09, // type_index
            0x00, 0x01, // num pairs
            0x00, 0x04, // element name
            b's', 0x00, 0x05, // const value
        ];

        let mut seen = Vec::new();
        walk_annotations(&mut data, &mut |_, site, index| {
            seen.push((site, index));
            Ok(if site == AnnotationSite::Type {
                Some(0x0010)
            } else {
                None
            })
        })
        .unwrap();

        assert_eq!(
            seen,
            vec![
                (AnnotationSite::Type, 9),
                (
                    AnnotationSite::ElementName {
                        annotation_type_index: 9
                    },
                    4
                ),
                (AnnotationSite::Const, 5),
            ]
        );
        assert_eq!(&data[2..4], &[0x00, 0x10], "type index patched in place");
    }

    #[test]
    fn nested_array_and_enum_values() {
        // one annotation, one pair, value '[' of two 'e' entries
        let mut data = vec![
            0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0x00, 0x03, b'[', 0x00, 0x02, b'e', 0x00, 0x06,
            0x00, 0x07, b'e', 0x00, 0x06, 0x00, 0x08,
        ];
        let mut enum_consts = Vec::new();
        walk_annotations(&mut data, &mut |_, site, index| {
            if let AnnotationSite::EnumConst { enum_type_index } = site {
                enum_consts.push((enum_type_index, index));
            }
            Ok(None)
        })
        .unwrap();
        assert_eq!(enum_consts, vec![(6, 7), (6, 8)]);
    }

    #[test]
    fn bad_element_tag_is_corrupt() {
        let mut data = vec![0x00, 0x01, 0x00, 0x02, 0x00, 0x01, 0x00, 0x03, b'?', 0x00, 0x01];
        assert!(matches!(
            walk_annotations(&mut data, &mut |_, _, _| Ok(None)),
            Err(crate::Error::CorruptFormat { .. })
        ));
    }

    #[test]
    fn find_by_name_resolves_through_pool() {
        let mut pool = ConstantPool::new();
        let code = pool.add_utf8("Code").unwrap();
        let lines = pool.add_utf8("LineNumberTable").unwrap();
        let attrs = vec![
            AttributeInfo {
                name_index: lines,
                info: vec![],
            },
            AttributeInfo {
                name_index: code,
                info: vec![],
            },
        ];
        assert!(find_by_name(&attrs, &pool, "Code").unwrap().is_some());
        assert!(find_by_name(&attrs, &pool, "Signature").unwrap().is_none());
    }
}
