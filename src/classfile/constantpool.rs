//! The pooled, reference-counted constant table of one class file.
//!
//! Every class file embeds a single constant pool: a tagged, index-addressed
//! table holding every string, number, class reference and member reference the
//! rest of the file points at. The rewriter edits this table in place, so the
//! pool tracks a *reference count* per entry - the number of live structural
//! pointers currently targeting it - and funnels every mutation through a
//! narrow interface that keeps the counts and the cross-references consistent.
//!
//! # Architecture
//!
//! - [`crate::classfile::constantpool::PoolTag`] - the wire tag byte of each
//!   entry kind
//! - [`crate::classfile::constantpool::PoolEntry`] - the decoded tagged variant
//! - [`crate::classfile::constantpool::ConstantPool`] - the table itself, with
//!   slot bookkeeping for the phantom second slot `Long`/`Double` entries occupy
//!
//! Counts are internal state: callers retarget references through
//! [`ConstantPool::retarget`] and the targeted `redirect_*` operations, insert
//! through [`ConstantPool::append_or_reuse`], and rebuild from scratch through
//! [`ConstantPool::recount`]. An entry whose count reaches zero releases its
//! outgoing references (recursively); an entry whose count leaves zero
//! re-acquires them. A zero-count entry is logically dead: its index stays
//! valid and may be reused, but its payload can be cleared
//! ([`ConstantPool::drop_unreferenced_utf8`]).
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::classfile::constantpool::{ConstantPool, PoolEntry};
//!
//! let mut pool = ConstantPool::new();
//! let name = pool.append_or_reuse(PoolEntry::Utf8("java/lang/Object".into()))?;
//! let class = pool.append_or_reuse(PoolEntry::Class { name_index: name })?;
//!
//! // Structurally equal inserts reuse the existing slot
//! assert_eq!(pool.append_or_reuse(PoolEntry::Utf8("java/lang/Object".into()))?, name);
//!
//! pool.recount([class])?;
//! assert_eq!(pool.count_of(name)?, 1);
//! assert_eq!(pool.class_name_at(class)?, "java/lang/Object");
//! # Ok::<(), classcloak::Error>(())
//! ```

use strum::{EnumCount, EnumIter};

use crate::{classfile::mutf8, file::push_be, Parser, Result};

/// The wire tag byte identifying each constant-pool entry kind.
///
/// Any tag outside this set fails decode with [`crate::Error::CorruptFormat`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, EnumIter, EnumCount)]
#[repr(u8)]
pub enum PoolTag {
    /// Modified-UTF-8 string payload.
    Utf8 = 1,
    /// 32-bit integer constant.
    Integer = 3,
    /// 32-bit floating-point constant.
    Float = 4,
    /// 64-bit integer constant; occupies two slots.
    Long = 5,
    /// 64-bit floating-point constant; occupies two slots.
    Double = 6,
    /// Class or interface reference by name.
    Class = 7,
    /// String literal referencing a [`PoolTag::Utf8`] payload.
    String = 8,
    /// Field reference: class plus name-and-type.
    Fieldref = 9,
    /// Method reference: class plus name-and-type.
    Methodref = 10,
    /// Interface method reference: class plus name-and-type.
    InterfaceMethodref = 11,
    /// Name and descriptor pair shared by member references.
    NameAndType = 12,
    /// Method handle for `invokedynamic` bootstrap machinery.
    MethodHandle = 15,
    /// Method type: a descriptor-only constant.
    MethodType = 16,
    /// Dynamically-computed constant.
    Dynamic = 17,
    /// Dynamically-computed call site.
    InvokeDynamic = 18,
    /// Module reference by name.
    Module = 19,
    /// Package reference by name.
    Package = 20,
}

impl PoolTag {
    /// Decode a raw tag byte.
    ///
    /// Returns `None` for any byte that is not a known tag.
    #[must_use]
    pub fn from_byte(byte: u8) -> Option<PoolTag> {
        Some(match byte {
            1 => PoolTag::Utf8,
            3 => PoolTag::Integer,
            4 => PoolTag::Float,
            5 => PoolTag::Long,
            6 => PoolTag::Double,
            7 => PoolTag::Class,
            8 => PoolTag::String,
            9 => PoolTag::Fieldref,
            10 => PoolTag::Methodref,
            11 => PoolTag::InterfaceMethodref,
            12 => PoolTag::NameAndType,
            15 => PoolTag::MethodHandle,
            16 => PoolTag::MethodType,
            17 => PoolTag::Dynamic,
            18 => PoolTag::InvokeDynamic,
            19 => PoolTag::Module,
            20 => PoolTag::Package,
            _ => return None,
        })
    }
}

/// One decoded constant-pool entry.
///
/// Composite variants carry the pool indices of the entries they point at;
/// those outgoing references participate in the pool's reference counting
/// whenever the holding entry is itself live.
#[derive(Debug, Clone, PartialEq)]
pub enum PoolEntry {
    /// A modified-UTF-8 string payload.
    Utf8(String),
    /// A 32-bit integer constant.
    Integer(i32),
    /// A 32-bit floating-point constant.
    Float(f32),
    /// A 64-bit integer constant (occupies this slot plus a phantom one).
    Long(i64),
    /// A 64-bit floating-point constant (occupies this slot plus a phantom one).
    Double(f64),
    /// A class or interface, named by a [`PoolEntry::Utf8`] entry.
    Class {
        /// Index of the [`PoolEntry::Utf8`] holding the binary class name.
        name_index: u16,
    },
    /// A string literal.
    String {
        /// Index of the [`PoolEntry::Utf8`] holding the characters.
        string_index: u16,
    },
    /// A field reference.
    Fieldref {
        /// Index of the [`PoolEntry::Class`] declaring (or inheriting) the field.
        class_index: u16,
        /// Index of the [`PoolEntry::NameAndType`] naming the field.
        name_and_type_index: u16,
    },
    /// A method reference.
    Methodref {
        /// Index of the [`PoolEntry::Class`] declaring (or inheriting) the method.
        class_index: u16,
        /// Index of the [`PoolEntry::NameAndType`] naming the method.
        name_and_type_index: u16,
    },
    /// An interface method reference.
    InterfaceMethodref {
        /// Index of the [`PoolEntry::Class`] declaring the interface method.
        class_index: u16,
        /// Index of the [`PoolEntry::NameAndType`] naming the method.
        name_and_type_index: u16,
    },
    /// A name and descriptor pair, shared by member references.
    NameAndType {
        /// Index of the [`PoolEntry::Utf8`] holding the simple name.
        name_index: u16,
        /// Index of the [`PoolEntry::Utf8`] holding the descriptor.
        descriptor_index: u16,
    },
    /// A method handle.
    MethodHandle {
        /// The handle kind (1-9).
        reference_kind: u8,
        /// Index of the referenced member-reference entry.
        reference_index: u16,
    },
    /// A method type.
    MethodType {
        /// Index of the [`PoolEntry::Utf8`] holding the method descriptor.
        descriptor_index: u16,
    },
    /// A dynamically-computed constant.
    Dynamic {
        /// Index into the `BootstrapMethods` attribute, not the pool.
        bootstrap_method_attr_index: u16,
        /// Index of the [`PoolEntry::NameAndType`] naming the constant.
        name_and_type_index: u16,
    },
    /// A dynamically-computed call site.
    InvokeDynamic {
        /// Index into the `BootstrapMethods` attribute, not the pool.
        bootstrap_method_attr_index: u16,
        /// Index of the [`PoolEntry::NameAndType`] naming the call site.
        name_and_type_index: u16,
    },
    /// A module, named by a [`PoolEntry::Utf8`] entry.
    Module {
        /// Index of the [`PoolEntry::Utf8`] holding the module name.
        name_index: u16,
    },
    /// A package, named by a [`PoolEntry::Utf8`] entry.
    Package {
        /// Index of the [`PoolEntry::Utf8`] holding the package name.
        name_index: u16,
    },
}

impl PoolEntry {
    /// The wire tag of this entry.
    #[must_use]
    pub fn tag(&self) -> PoolTag {
        match self {
            PoolEntry::Utf8(_) => PoolTag::Utf8,
            PoolEntry::Integer(_) => PoolTag::Integer,
            PoolEntry::Float(_) => PoolTag::Float,
            PoolEntry::Long(_) => PoolTag::Long,
            PoolEntry::Double(_) => PoolTag::Double,
            PoolEntry::Class { .. } => PoolTag::Class,
            PoolEntry::String { .. } => PoolTag::String,
            PoolEntry::Fieldref { .. } => PoolTag::Fieldref,
            PoolEntry::Methodref { .. } => PoolTag::Methodref,
            PoolEntry::InterfaceMethodref { .. } => PoolTag::InterfaceMethodref,
            PoolEntry::NameAndType { .. } => PoolTag::NameAndType,
            PoolEntry::MethodHandle { .. } => PoolTag::MethodHandle,
            PoolEntry::MethodType { .. } => PoolTag::MethodType,
            PoolEntry::Dynamic { .. } => PoolTag::Dynamic,
            PoolEntry::InvokeDynamic { .. } => PoolTag::InvokeDynamic,
            PoolEntry::Module { .. } => PoolTag::Module,
            PoolEntry::Package { .. } => PoolTag::Package,
        }
    }

    /// `true` for the two-slot entry kinds (`Long`, `Double`).
    #[must_use]
    pub fn is_wide(&self) -> bool {
        matches!(self, PoolEntry::Long(_) | PoolEntry::Double(_))
    }

    /// Collect the pool indices this entry points at, with multiplicity.
    fn outgoing(&self, out: &mut Vec<u16>) {
        match *self {
            PoolEntry::Class { name_index }
            | PoolEntry::Module { name_index }
            | PoolEntry::Package { name_index } => out.push(name_index),
            PoolEntry::String { string_index } => out.push(string_index),
            PoolEntry::Fieldref {
                class_index,
                name_and_type_index,
            }
            | PoolEntry::Methodref {
                class_index,
                name_and_type_index,
            }
            | PoolEntry::InterfaceMethodref {
                class_index,
                name_and_type_index,
            } => {
                out.push(class_index);
                out.push(name_and_type_index);
            }
            PoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => {
                out.push(name_index);
                out.push(descriptor_index);
            }
            PoolEntry::MethodHandle {
                reference_index, ..
            } => out.push(reference_index),
            PoolEntry::MethodType { descriptor_index } => out.push(descriptor_index),
            PoolEntry::Dynamic {
                name_and_type_index,
                ..
            }
            | PoolEntry::InvokeDynamic {
                name_and_type_index,
                ..
            } => out.push(name_and_type_index),
            PoolEntry::Utf8(_)
            | PoolEntry::Integer(_)
            | PoolEntry::Float(_)
            | PoolEntry::Long(_)
            | PoolEntry::Double(_) => {}
        }
    }
}

/// One slot of the table. `entry` is `None` for the phantom second slot of a
/// `Long`/`Double` entry.
#[derive(Debug, Clone)]
struct Slot {
    entry: Option<PoolEntry>,
    count: u32,
}

/// The constant pool of one class file.
///
/// Entries are addressed `1..count`; index 0 is reserved and never valid. The
/// pool owns all reference-count bookkeeping - see the module documentation for
/// the mutation contract.
#[derive(Debug, Clone)]
pub struct ConstantPool {
    /// Slot 0 is a permanent placeholder so wire indices map directly.
    slots: Vec<Slot>,
    /// Set once [`ConstantPool::recount`] has run; gates in-place reuse of
    /// dead slots, which is only sound when counts are accurate.
    recounted: bool,
    /// Indices handed out by [`ConstantPool::append_or_reuse`] since the last
    /// recount. Their count may still be zero while the caller wires up the
    /// referring side, so in-place dead-slot reuse must not touch them.
    reserved: std::collections::HashSet<u16>,
}

impl Default for ConstantPool {
    fn default() -> Self {
        Self::new()
    }
}

impl ConstantPool {
    /// Create an empty pool (declared count 1, no usable entries yet).
    #[must_use]
    pub fn new() -> Self {
        ConstantPool {
            slots: vec![Slot {
                entry: None,
                count: 0,
            }],
            recounted: false,
            reserved: std::collections::HashSet::new(),
        }
    }

    /// Decode a pool from the parser, positioned at the `constant_pool_count`
    /// field.
    ///
    /// # Errors
    /// Fails with [`crate::Error::CorruptFormat`] on a short read, an unknown
    /// tag byte, or a malformed modified-UTF-8 payload.
    pub fn decode(parser: &mut Parser<'_>) -> Result<ConstantPool> {
        let declared = parser.read_be::<u16>()?;
        let mut slots = Vec::with_capacity(usize::from(declared));
        slots.push(Slot {
            entry: None,
            count: 0,
        });

        while slots.len() < usize::from(declared) {
            let tag_byte = parser.read_be::<u8>()?;
            let Some(tag) = PoolTag::from_byte(tag_byte) else {
                return Err(corrupt_format!(
                    "unknown constant pool tag {} at entry {}",
                    tag_byte,
                    slots.len()
                ));
            };

            let entry = match tag {
                PoolTag::Utf8 => {
                    let len = parser.read_be::<u16>()?;
                    let bytes = parser.read_bytes(usize::from(len))?;
                    PoolEntry::Utf8(mutf8::decode(bytes)?)
                }
                PoolTag::Integer => PoolEntry::Integer(parser.read_be::<i32>()?),
                PoolTag::Float => PoolEntry::Float(parser.read_be::<f32>()?),
                PoolTag::Long => PoolEntry::Long(parser.read_be::<i64>()?),
                PoolTag::Double => PoolEntry::Double(parser.read_be::<f64>()?),
                PoolTag::Class => PoolEntry::Class {
                    name_index: parser.read_be::<u16>()?,
                },
                PoolTag::String => PoolEntry::String {
                    string_index: parser.read_be::<u16>()?,
                },
                PoolTag::Fieldref => PoolEntry::Fieldref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                PoolTag::Methodref => PoolEntry::Methodref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                PoolTag::InterfaceMethodref => PoolEntry::InterfaceMethodref {
                    class_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                PoolTag::NameAndType => PoolEntry::NameAndType {
                    name_index: parser.read_be::<u16>()?,
                    descriptor_index: parser.read_be::<u16>()?,
                },
                PoolTag::MethodHandle => PoolEntry::MethodHandle {
                    reference_kind: parser.read_be::<u8>()?,
                    reference_index: parser.read_be::<u16>()?,
                },
                PoolTag::MethodType => PoolEntry::MethodType {
                    descriptor_index: parser.read_be::<u16>()?,
                },
                PoolTag::Dynamic => PoolEntry::Dynamic {
                    bootstrap_method_attr_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                PoolTag::InvokeDynamic => PoolEntry::InvokeDynamic {
                    bootstrap_method_attr_index: parser.read_be::<u16>()?,
                    name_and_type_index: parser.read_be::<u16>()?,
                },
                PoolTag::Module => PoolEntry::Module {
                    name_index: parser.read_be::<u16>()?,
                },
                PoolTag::Package => PoolEntry::Package {
                    name_index: parser.read_be::<u16>()?,
                },
            };

            let wide = entry.is_wide();
            slots.push(Slot {
                entry: Some(entry),
                count: 0,
            });
            if wide {
                if slots.len() >= usize::from(declared) {
                    return Err(corrupt_format!(
                        "two-slot constant at entry {} overruns the declared pool count",
                        slots.len() - 1
                    ));
                }
                slots.push(Slot {
                    entry: None,
                    count: 0,
                });
            }
        }

        Ok(ConstantPool {
            slots,
            recounted: false,
            reserved: std::collections::HashSet::new(),
        })
    }

    /// Encode the pool (count field plus entries) onto the output sink.
    pub fn encode(&self, sink: &mut Vec<u8>) {
        push_be(sink, self.slots.len() as u16);
        for slot in &self.slots[1..] {
            let Some(entry) = &slot.entry else {
                continue; // phantom second slot of a Long/Double
            };
            push_be(sink, entry.tag() as u8);
            match entry {
                PoolEntry::Utf8(s) => {
                    let bytes = mutf8::encode(s);
                    push_be(sink, bytes.len() as u16);
                    sink.extend_from_slice(&bytes);
                }
                PoolEntry::Integer(v) => push_be(sink, *v),
                PoolEntry::Float(v) => push_be(sink, *v),
                PoolEntry::Long(v) => push_be(sink, *v),
                PoolEntry::Double(v) => push_be(sink, *v),
                PoolEntry::Class { name_index }
                | PoolEntry::Module { name_index }
                | PoolEntry::Package { name_index } => push_be(sink, *name_index),
                PoolEntry::String { string_index } => push_be(sink, *string_index),
                PoolEntry::Fieldref {
                    class_index,
                    name_and_type_index,
                }
                | PoolEntry::Methodref {
                    class_index,
                    name_and_type_index,
                }
                | PoolEntry::InterfaceMethodref {
                    class_index,
                    name_and_type_index,
                } => {
                    push_be(sink, *class_index);
                    push_be(sink, *name_and_type_index);
                }
                PoolEntry::NameAndType {
                    name_index,
                    descriptor_index,
                } => {
                    push_be(sink, *name_index);
                    push_be(sink, *descriptor_index);
                }
                PoolEntry::MethodHandle {
                    reference_kind,
                    reference_index,
                } => {
                    push_be(sink, *reference_kind);
                    push_be(sink, *reference_index);
                }
                PoolEntry::MethodType { descriptor_index } => push_be(sink, *descriptor_index),
                PoolEntry::Dynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                }
                | PoolEntry::InvokeDynamic {
                    bootstrap_method_attr_index,
                    name_and_type_index,
                } => {
                    push_be(sink, *bootstrap_method_attr_index);
                    push_be(sink, *name_and_type_index);
                }
            }
        }
    }

    /// The declared pool count (one more than the highest slot index).
    #[must_use]
    pub fn declared_count(&self) -> u16 {
        self.slots.len() as u16
    }

    /// Iterate over the indices of every non-phantom entry.
    pub fn indices(&self) -> impl Iterator<Item = u16> + '_ {
        self.slots
            .iter()
            .enumerate()
            .skip(1)
            .filter(|(_, slot)| slot.entry.is_some())
            .map(|(i, _)| i as u16)
    }

    /// Look up an entry by index.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] for index 0, an
    /// out-of-range index, or the phantom second slot of a `Long`/`Double`.
    pub fn get(&self, index: u16) -> Result<&PoolEntry> {
        let slot = self.slot(index)?;
        slot.entry.as_ref().ok_or_else(|| {
            crate::Error::InconsistentReference(format!(
                "pool index {index} addresses the phantom slot of a two-slot constant"
            ))
        })
    }

    /// Look up a `Utf8` entry and return its string payload.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if the index is
    /// invalid or the entry is not a `Utf8`.
    pub fn utf8_at(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            PoolEntry::Utf8(s) => Ok(s),
            other => Err(crate::Error::InconsistentReference(format!(
                "pool index {index} holds {:?}, expected Utf8",
                other.tag()
            ))),
        }
    }

    /// Look up a `Class` entry and return the binary class name it points at.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if the index is
    /// invalid, the entry is not a `Class`, or its name pointer does not
    /// resolve to a `Utf8`.
    pub fn class_name_at(&self, index: u16) -> Result<&str> {
        match self.get(index)? {
            PoolEntry::Class { name_index } => self.utf8_at(*name_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "pool index {index} holds {:?}, expected Class",
                other.tag()
            ))),
        }
    }

    /// Look up a `NameAndType` entry and return its `(name, descriptor)` pair.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if the index is
    /// invalid, the entry is not a `NameAndType`, or either pointer does not
    /// resolve to a `Utf8`.
    pub fn name_and_type_at(&self, index: u16) -> Result<(&str, &str)> {
        match self.get(index)? {
            PoolEntry::NameAndType {
                name_index,
                descriptor_index,
            } => Ok((self.utf8_at(*name_index)?, self.utf8_at(*descriptor_index)?)),
            other => Err(crate::Error::InconsistentReference(format!(
                "pool index {index} holds {:?}, expected NameAndType",
                other.tag()
            ))),
        }
    }

    /// The current reference count of an entry.
    ///
    /// Counts are only meaningful after [`ConstantPool::recount`]; before that
    /// every entry reads zero.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] on an invalid index.
    pub fn count_of(&self, index: u16) -> Result<u32> {
        Ok(self.slot(index)?.count)
    }

    /// `true` if the entry at `index` currently has a non-zero reference count.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] on an invalid index.
    pub fn is_live(&self, index: u16) -> Result<bool> {
        Ok(self.slot(index)?.count > 0)
    }

    /// Insert a `Utf8` entry for `value`, reusing an existing one when possible.
    ///
    /// Shorthand for [`ConstantPool::append_or_reuse`] with a
    /// [`PoolEntry::Utf8`].
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if the pool is full.
    pub fn add_utf8(&mut self, value: &str) -> Result<u16> {
        self.append_or_reuse(PoolEntry::Utf8(value.to_string()))
    }

    /// Insert an entry, guaranteeing the pool never grows unnecessarily.
    ///
    /// The lookup order is:
    /// 1. a structurally equal *live* entry - its index is returned as-is;
    /// 2. a structurally equal *dead* entry - revived (count stays zero until
    ///    a reference is retargeted onto it);
    /// 3. after a recount only: a dead `Utf8` slot overwritten in place, when
    ///    inserting a `Utf8`;
    /// 4. a fresh slot appended at the end.
    ///
    /// The returned index has not been acquired: pair every use of it with a
    /// [`ConstantPool::retarget`] from the reference that now points there.
    /// Until then the slot is held reserved, so a later insertion can never
    /// overwrite it through rule 3.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if appending would
    /// push the pool past the 16-bit index space.
    pub fn append_or_reuse(&mut self, entry: PoolEntry) -> Result<u16> {
        let mut dead_equal = None;
        let mut dead_utf8 = None;

        for (i, slot) in self.slots.iter().enumerate().skip(1) {
            let Some(existing) = &slot.entry else {
                continue;
            };
            if *existing == entry {
                if slot.count > 0 {
                    return Ok(i as u16);
                }
                if dead_equal.is_none() {
                    dead_equal = Some(i as u16);
                }
            } else if self.recounted
                && dead_utf8.is_none()
                && slot.count == 0
                && !self.reserved.contains(&(i as u16))
                && matches!(existing, PoolEntry::Utf8(_))
                && matches!(entry, PoolEntry::Utf8(_))
            {
                dead_utf8 = Some(i as u16);
            }
        }

        if let Some(index) = dead_equal {
            self.reserved.insert(index);
            return Ok(index);
        }
        if let Some(index) = dead_utf8 {
            self.slots[usize::from(index)].entry = Some(entry);
            self.reserved.insert(index);
            return Ok(index);
        }

        let wide = entry.is_wide();
        let needed = if wide { 2 } else { 1 };
        if self.slots.len() + needed > usize::from(u16::MAX) {
            return Err(crate::Error::InconsistentReference(format!(
                "constant pool overflow inserting {:?}",
                entry.tag()
            )));
        }

        let index = self.slots.len() as u16;
        self.slots.push(Slot {
            entry: Some(entry),
            count: 0,
        });
        if wide {
            self.slots.push(Slot {
                entry: None,
                count: 0,
            });
        }
        self.reserved.insert(index);
        Ok(index)
    }

    /// Move one structural reference from `old_index` to `new_index`.
    ///
    /// Acquires the new referent before releasing the old one, so a shared
    /// target never passes through a transient zero count. The caller updates
    /// its own stored index afterwards.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] on an invalid index
    /// or a reference-count underflow on the old referent.
    pub fn retarget(&mut self, old_index: u16, new_index: u16) -> Result<()> {
        if old_index == new_index {
            return Ok(());
        }
        self.acquire(new_index)?;
        self.release(old_index)
    }

    /// Rebuild every reference count from an iterator of structural roots.
    ///
    /// Zeroes all counts, then acquires each root reference in turn
    /// (multiplicity preserved), propagating through the composite entries the
    /// roots reach. After this the counts exactly mirror the live structural
    /// pointers into the pool.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if a root or a
    /// reached composite field addresses an invalid slot.
    pub fn recount(&mut self, roots: impl IntoIterator<Item = u16>) -> Result<()> {
        for slot in &mut self.slots {
            slot.count = 0;
        }
        for root in roots {
            self.acquire(root)?;
        }
        self.recounted = true;
        self.reserved.clear();
        Ok(())
    }

    /// Clear the payload of every `Utf8` entry whose count is zero.
    ///
    /// The slot and its index remain valid - indices computed earlier in the
    /// same pass must stay stable - but the dead payload no longer contributes
    /// bytes beyond the two-byte length prefix.
    pub fn drop_unreferenced_utf8(&mut self) {
        for slot in &mut self.slots[1..] {
            if slot.count == 0 {
                if let Some(PoolEntry::Utf8(s)) = &mut slot.entry {
                    s.clear();
                }
            }
        }
    }

    /// Repoint the name of a `Class`, `Module` or `Package` entry.
    ///
    /// All referrers of such an entry want the same rename, so the entry is
    /// mutated in place regardless of its count; counts on the old and new
    /// `Utf8` targets are adjusted if the entry is currently live.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold one of the three named-entry kinds or a count update fails.
    pub fn redirect_name(&mut self, index: u16, new_utf8: u16) -> Result<()> {
        self.redirect(index, new_utf8, |entry| match entry {
            PoolEntry::Class { name_index }
            | PoolEntry::Module { name_index }
            | PoolEntry::Package { name_index } => Ok(name_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_name on {:?}",
                other.tag()
            ))),
        })
    }

    /// Repoint the characters of a `String` entry.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold a `String` entry or a count update fails.
    pub fn redirect_string_value(&mut self, index: u16, new_utf8: u16) -> Result<()> {
        self.redirect(index, new_utf8, |entry| match entry {
            PoolEntry::String { string_index } => Ok(string_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_string_value on {:?}",
                other.tag()
            ))),
        })
    }

    /// Repoint the `NameAndType` of a member-reference or dynamic entry.
    ///
    /// This is the mutation the copy-on-write rule guards: callers must clone
    /// the `NameAndType` first (via [`ConstantPool::append_or_reuse`]) whenever
    /// the old one is shared and the change applies to this referrer only.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold an entry with a `NameAndType` pointer or a count update fails.
    pub fn redirect_name_and_type(&mut self, index: u16, new_nat: u16) -> Result<()> {
        self.redirect(index, new_nat, |entry| match entry {
            PoolEntry::Fieldref {
                name_and_type_index,
                ..
            }
            | PoolEntry::Methodref {
                name_and_type_index,
                ..
            }
            | PoolEntry::InterfaceMethodref {
                name_and_type_index,
                ..
            }
            | PoolEntry::Dynamic {
                name_and_type_index,
                ..
            }
            | PoolEntry::InvokeDynamic {
                name_and_type_index,
                ..
            } => Ok(name_and_type_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_name_and_type on {:?}",
                other.tag()
            ))),
        })
    }

    /// Repoint the descriptor of a `MethodType` entry.
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold a `MethodType` entry or a count update fails.
    pub fn redirect_method_type(&mut self, index: u16, new_utf8: u16) -> Result<()> {
        self.redirect(index, new_utf8, |entry| match entry {
            PoolEntry::MethodType { descriptor_index } => Ok(descriptor_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_method_type on {:?}",
                other.tag()
            ))),
        })
    }

    /// Repoint the name side of a `NameAndType` entry (in-place mutation;
    /// callers apply the copy-on-write rule before using this on a shared
    /// entry).
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold a `NameAndType` entry or a count update fails.
    pub fn redirect_nat_name(&mut self, index: u16, new_utf8: u16) -> Result<()> {
        self.redirect(index, new_utf8, |entry| match entry {
            PoolEntry::NameAndType { name_index, .. } => Ok(name_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_nat_name on {:?}",
                other.tag()
            ))),
        })
    }

    /// Repoint the descriptor side of a `NameAndType` entry (same in-place
    /// caveat as [`ConstantPool::redirect_nat_name`]).
    ///
    /// # Errors
    /// Fails with [`crate::Error::InconsistentReference`] if `index` does not
    /// hold a `NameAndType` entry or a count update fails.
    pub fn redirect_nat_descriptor(&mut self, index: u16, new_utf8: u16) -> Result<()> {
        self.redirect(index, new_utf8, |entry| match entry {
            PoolEntry::NameAndType {
                descriptor_index, ..
            } => Ok(descriptor_index),
            other => Err(crate::Error::InconsistentReference(format!(
                "redirect_nat_descriptor on {:?}",
                other.tag()
            ))),
        })
    }

    fn redirect(
        &mut self,
        index: u16,
        new_target: u16,
        pick: impl Fn(&mut PoolEntry) -> Result<&mut u16>,
    ) -> Result<()> {
        let live = self.slot(index)?.count > 0;

        let slot = self.slot_mut(index)?;
        let Some(entry) = &mut slot.entry else {
            return Err(crate::Error::InconsistentReference(format!(
                "pool index {index} addresses the phantom slot of a two-slot constant"
            )));
        };
        let field = pick(entry)?;
        let old_target = *field;
        if old_target == new_target {
            return Ok(());
        }
        *field = new_target;

        // A dead entry holds no references; only live ones shift counts.
        if live {
            self.acquire(new_target)?;
            self.release(old_target)?;
        }
        Ok(())
    }

    fn acquire(&mut self, index: u16) -> Result<()> {
        let slot = self.slot_mut(index)?;
        slot.count += 1;
        if slot.count == 1 {
            let mut targets = Vec::new();
            if let Some(entry) = &slot.entry {
                entry.outgoing(&mut targets);
            }
            for target in targets {
                self.acquire(target)?;
            }
        }
        Ok(())
    }

    fn release(&mut self, index: u16) -> Result<()> {
        let slot = self.slot_mut(index)?;
        if slot.count == 0 {
            return Err(crate::Error::InconsistentReference(format!(
                "reference count underflow on pool index {index}"
            )));
        }
        slot.count -= 1;
        if slot.count == 0 {
            let mut targets = Vec::new();
            if let Some(entry) = &slot.entry {
                entry.outgoing(&mut targets);
            }
            for target in targets {
                self.release(target)?;
            }
        }
        Ok(())
    }

    fn slot(&self, index: u16) -> Result<&Slot> {
        if index == 0 || usize::from(index) >= self.slots.len() {
            return Err(crate::Error::InconsistentReference(format!(
                "pool index {index} out of range 1..{}",
                self.slots.len()
            )));
        }
        Ok(&self.slots[usize::from(index)])
    }

    fn slot_mut(&mut self, index: u16) -> Result<&mut Slot> {
        if index == 0 || usize::from(index) >= self.slots.len() {
            return Err(crate::Error::InconsistentReference(format!(
                "pool index {index} out of range 1..{}",
                self.slots.len()
            )));
        }
        Ok(&mut self.slots[usize::from(index)])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use strum::IntoEnumIterator;

    fn sample_pool() -> (ConstantPool, u16, u16, u16, u16) {
        let mut pool = ConstantPool::new();
        let name = pool.add_utf8("value").unwrap();
        let desc = pool.add_utf8("I").unwrap();
        let nat = pool
            .append_or_reuse(PoolEntry::NameAndType {
                name_index: name,
                descriptor_index: desc,
            })
            .unwrap();
        let class_name = pool.add_utf8("a/B").unwrap();
        let class = pool
            .append_or_reuse(PoolEntry::Class {
                name_index: class_name,
            })
            .unwrap();
        let fieldref = pool
            .append_or_reuse(PoolEntry::Fieldref {
                class_index: class,
                name_and_type_index: nat,
            })
            .unwrap();
        (pool, name, desc, nat, fieldref)
    }

    #[test]
    fn tag_bytes_round_trip() {
        for tag in PoolTag::iter() {
            assert_eq!(PoolTag::from_byte(tag as u8), Some(tag));
        }
        assert_eq!(PoolTag::from_byte(2), None);
        assert_eq!(PoolTag::from_byte(21), None);
    }

    #[test]
    fn append_or_reuse_never_duplicates() {
        let (mut pool, name, ..) = sample_pool();
        let before = pool.declared_count();
        assert_eq!(pool.add_utf8("value").unwrap(), name);
        assert_eq!(pool.declared_count(), before);
    }

    #[test]
    fn recount_propagates_through_composites() {
        let (mut pool, name, desc, nat, fieldref) = sample_pool();
        pool.recount([fieldref]).unwrap();

        assert_eq!(pool.count_of(fieldref).unwrap(), 1);
        assert_eq!(pool.count_of(nat).unwrap(), 1);
        assert_eq!(pool.count_of(name).unwrap(), 1);
        assert_eq!(pool.count_of(desc).unwrap(), 1);
    }

    #[test]
    fn release_cascades_on_death() {
        let (mut pool, name, desc, nat, fieldref) = sample_pool();
        pool.recount([fieldref, nat]).unwrap();
        assert_eq!(pool.count_of(nat).unwrap(), 2);

        // Clone the NameAndType with a new name and move the fieldref to it.
        let new_name = pool.add_utf8("a").unwrap();
        let clone = pool
            .append_or_reuse(PoolEntry::NameAndType {
                name_index: new_name,
                descriptor_index: desc,
            })
            .unwrap();
        pool.redirect_name_and_type(fieldref, clone).unwrap();

        assert_eq!(pool.count_of(nat).unwrap(), 1, "other referrer unaffected");
        assert_eq!(pool.count_of(clone).unwrap(), 1);
        assert_eq!(pool.count_of(desc).unwrap(), 2, "descriptor shared by both");
        assert_eq!(pool.count_of(name).unwrap(), 1, "still held via original nat");

        // Dropping the last root reference to the original nat cascades.
        pool.retarget(nat, clone).unwrap();
        assert_eq!(pool.count_of(nat).unwrap(), 0);
        assert_eq!(pool.count_of(name).unwrap(), 0);
        assert_eq!(pool.count_of(desc).unwrap(), 1);
    }

    #[test]
    fn underflow_is_an_error() {
        let (mut pool, name, ..) = sample_pool();
        pool.recount(std::iter::empty()).unwrap();
        assert!(matches!(
            pool.retarget(name, 2),
            Err(crate::Error::InconsistentReference(_))
        ));
    }

    #[test]
    fn dead_utf8_slot_is_overwritten_in_place_after_recount() {
        let (mut pool, _, _, _, fieldref) = sample_pool();
        let orphan = pool.add_utf8("orphan").unwrap();
        pool.recount([fieldref]).unwrap();
        let before = pool.declared_count();

        let reused = pool.add_utf8("fresh").unwrap();
        assert_eq!(reused, orphan, "dead name slot reused in place");
        assert_eq!(pool.declared_count(), before);
        assert_eq!(pool.utf8_at(reused).unwrap(), "fresh");
    }

    #[test]
    fn handed_out_slots_are_not_clobbered_by_later_insertions() {
        let (mut pool, _, _, _, fieldref) = sample_pool();
        let orphan = pool.add_utf8("orphan").unwrap();
        pool.recount([fieldref]).unwrap();

        // The first insertion takes the dead slot; until a retarget acquires
        // it, its count is still zero - the second insertion must not steal
        // the slot back.
        let first = pool.add_utf8("first").unwrap();
        assert_eq!(first, orphan);
        let second = pool.add_utf8("second").unwrap();
        assert_ne!(second, first);
        assert_eq!(pool.utf8_at(first).unwrap(), "first");
    }

    #[test]
    fn no_in_place_reuse_before_recount() {
        let mut pool = ConstantPool::new();
        let a = pool.add_utf8("a").unwrap();
        let b = pool.add_utf8("b").unwrap();
        assert_ne!(a, b, "without counts every slot must be treated as live");
    }

    #[test]
    fn drop_unreferenced_clears_payload_keeps_slot() {
        let (mut pool, _, _, _, fieldref) = sample_pool();
        let orphan = pool.add_utf8("orphan").unwrap();
        pool.recount([fieldref]).unwrap();
        pool.drop_unreferenced_utf8();

        assert_eq!(pool.utf8_at(orphan).unwrap(), "");
        let live_name = match pool.get(fieldref).unwrap() {
            PoolEntry::Fieldref {
                name_and_type_index,
                ..
            } => *name_and_type_index,
            _ => unreachable!(),
        };
        assert!(pool.is_live(live_name).unwrap());
    }

    #[test]
    fn phantom_slots_are_rejected() {
        let mut pool = ConstantPool::new();
        let long = pool.append_or_reuse(PoolEntry::Long(42)).unwrap();
        assert!(pool.get(long).is_ok());
        assert!(matches!(
            pool.get(long + 1),
            Err(crate::Error::InconsistentReference(_))
        ));
        assert!(matches!(
            pool.get(0),
            Err(crate::Error::InconsistentReference(_))
        ));
    }

    #[test]
    fn decode_encode_round_trip() {
        let (pool, ..) = sample_pool();
        let mut bytes = Vec::new();
        pool.encode(&mut bytes);

        let mut parser = Parser::new(&bytes);
        let decoded = ConstantPool::decode(&mut parser).unwrap();
        assert_eq!(decoded.declared_count(), pool.declared_count());
        for index in pool.indices() {
            assert_eq!(decoded.get(index).unwrap(), pool.get(index).unwrap());
        }

        let mut again = Vec::new();
        decoded.encode(&mut again);
        assert_eq!(bytes, again);
    }

    #[test]
    fn decode_rejects_unknown_tag() {
        // count = 2, then a bogus tag byte
        let bytes = [0x00, 0x02, 0x02, 0x00, 0x00];
        let mut parser = Parser::new(&bytes);
        assert!(matches!(
            ConstantPool::decode(&mut parser),
            Err(crate::Error::CorruptFormat { .. })
        ));
    }

    #[test]
    fn decode_long_occupies_two_slots() {
        let mut pool = ConstantPool::new();
        pool.append_or_reuse(PoolEntry::Long(7)).unwrap();
        let tail = pool.add_utf8("after").unwrap();
        assert_eq!(tail, 3, "Long at 1 occupies slots 1 and 2");

        let mut bytes = Vec::new();
        pool.encode(&mut bytes);
        let mut parser = Parser::new(&bytes);
        let decoded = ConstantPool::decode(&mut parser).unwrap();
        assert_eq!(decoded.get(1).unwrap(), &PoolEntry::Long(7));
        assert_eq!(decoded.utf8_at(3).unwrap(), "after");
    }
}
