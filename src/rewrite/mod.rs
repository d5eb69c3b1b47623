//! The binary rewriter.
//!
//! This module turns a completed resolution into patched class-file bytes.
//! [`NameMapper`] answers "what is the output identifier for X" questions
//! over the resolved tree; [`Rewriter`] drives the staged per-file pipeline
//! (trim, recount, member remap, reference remap, class remap, metadata
//! remap, reflective-string remap); [`trim::sweep`] runs the whole-tree
//! reachability pass that feeds the member-trim stage.
//!
//! # Key Components
//!
//! - [`mapper`] - resolved-tree name lookups, including the hierarchy walk
//!   that gives member references on subclasses the declaring class's name
//! - [`remap`] - the per-file stage machine and its copy-on-write rules
//! - [`trim`] - mark-and-sweep reachability over the symbol tree
//! - [`reflect`] - the `Class.forName` string-constant heuristic
//!
//! # Usage Examples
//!
//! ```rust,no_run
//! use classcloak::classfile::ClassFile;
//! use classcloak::rename::{FixtureOracle, OracleCache};
//! use classcloak::rewrite::{NameMapper, RewriteOptions, Rewriter};
//! use classcloak::tree::ClassTree;
//!
//! # fn run(tree: &ClassTree, file: &mut ClassFile) -> classcloak::Result<()> {
//! let cache = OracleCache::new(FixtureOracle::with_core_types());
//! let mapper = NameMapper::new(tree, &cache);
//! let retained = std::collections::HashSet::new();
//! let rewriter = Rewriter::new(&mapper, RewriteOptions::default(), &retained);
//! rewriter.rewrite(file)?;
//! let bytes = file.encode();
//! # Ok(())
//! # }
//! ```

pub mod mapper;
pub mod reflect;
pub mod remap;
pub mod trim;

pub use mapper::NameMapper;
pub use remap::{RewriteOptions, Rewriter};
