//! Whole-program identifier renaming.
//!
//! This module decides *what everything is called*; the `rewrite` module
//! later makes the bytes agree. The three pieces:
//!
//! - [`resolver::Resolver`] - the two-pass engine: namespace discovery over
//!   inheritance-connected groups, then override-consistent name assignment,
//!   plus the package/class sibling-group renaming and the optional
//!   repackage pre-pass.
//! - [`generator::NameGenerator`] - the ordered name stream (keywords first,
//!   then mixed-radix short names) and the session-wide
//!   [`generator::FrequencyTable`].
//! - [`oracle::TypeOracle`] - external-type knowledge, cached per session by
//!   [`oracle::OracleCache`]; [`oracle::FixtureOracle`] is the deterministic
//!   table-backed implementation.

pub mod generator;
pub mod oracle;
pub mod resolver;

pub use generator::{FrequencyTable, NameGenerator, DEVICE_WORDS};
pub use oracle::{ExternalTypeInfo, FixtureOracle, OracleCache, TypeOracle};
pub use resolver::Resolver;
