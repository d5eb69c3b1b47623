//! Access-flag bit sets for classes, fields and methods.
//!
//! The class-file format stores access and property flags as `u16` masks on the
//! class header and on every field and method record. The three record kinds
//! share most bit positions but give a few of them different meanings
//! (`0x0040` is `volatile` on fields and `bridge` on methods, `0x0080` is
//! `transient` versus `varargs`), so separate [`bitflags`] types keep the
//! decoded meanings honest.
//!
//! Only the bits the engine consults are named; unknown bits are retained
//! verbatim through decode and encode so a rewrite never drops flags a newer
//! format version may define.

use bitflags::bitflags;

bitflags! {
    /// Access and property flags of a class or interface.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct ClassAccess: u16 {
        /// Declared `public`; may be accessed from outside its package.
        const PUBLIC = 0x0001;
        /// Declared `final`; no subclasses allowed.
        const FINAL = 0x0010;
        /// Treat superclass methods specially when invoked by `invokespecial`.
        const SUPER = 0x0020;
        /// Is an interface, not a class.
        const INTERFACE = 0x0200;
        /// Declared `abstract`; must not be instantiated.
        const ABSTRACT = 0x0400;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an annotation interface.
        const ANNOTATION = 0x2000;
        /// Declared as an enum class.
        const ENUM = 0x4000;
        /// Is a module, not a class or interface.
        const MODULE = 0x8000;
    }
}

bitflags! {
    /// Access and property flags of a field record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct FieldAccess: u16 {
        /// Declared `public`.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within its own class.
        const PRIVATE = 0x0002;
        /// Declared `protected`.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`.
        const FINAL = 0x0010;
        /// Declared `volatile`.
        const VOLATILE = 0x0040;
        /// Declared `transient`.
        const TRANSIENT = 0x0080;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
        /// Declared as an element of an enum class.
        const ENUM = 0x4000;
    }
}

bitflags! {
    /// Access and property flags of a method record.
    #[derive(Debug, Clone, Copy, PartialEq, Eq)]
    pub struct MethodAccess: u16 {
        /// Declared `public`.
        const PUBLIC = 0x0001;
        /// Declared `private`; accessible only within its own class.
        const PRIVATE = 0x0002;
        /// Declared `protected`.
        const PROTECTED = 0x0004;
        /// Declared `static`.
        const STATIC = 0x0008;
        /// Declared `final`.
        const FINAL = 0x0010;
        /// Declared `synchronized`.
        const SYNCHRONIZED = 0x0020;
        /// A bridge method generated by the compiler.
        const BRIDGE = 0x0040;
        /// Declared with a variable number of arguments.
        const VARARGS = 0x0080;
        /// Declared `native`.
        const NATIVE = 0x0100;
        /// Declared `abstract`; no implementation is provided.
        const ABSTRACT = 0x0400;
        /// Declared `strictfp`.
        const STRICT = 0x0800;
        /// Declared synthetic; not present in the source code.
        const SYNTHETIC = 0x1000;
    }
}

impl ClassAccess {
    /// Decode from the raw `u16`, retaining any unrecognized bits.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }
}

impl FieldAccess {
    /// Decode from the raw `u16`, retaining any unrecognized bits.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }
}

impl MethodAccess {
    /// Decode from the raw `u16`, retaining any unrecognized bits.
    #[must_use]
    pub fn from_raw(raw: u16) -> Self {
        Self::from_bits_retain(raw)
    }
}
