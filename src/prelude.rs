//! Common imports for working with this library.
//!
//! Pulls in the session entry point, the option and directive types, the
//! oracle surface, and the crate's error/result pair - everything a typical
//! embedding needs to drive a run end to end.

pub use crate::classfile::ClassFile;
pub use crate::container::{ContainerReader, ContainerSink, MemoryContainer};
pub use crate::rename::{ExternalTypeInfo, FixtureOracle, TypeOracle};
pub use crate::report::Report;
pub use crate::script::{Directive, MemberFilter, MemberKind, OptionFlag};
pub use crate::session::{ObfuscationSession, Options};
pub use crate::{Error, Result};
