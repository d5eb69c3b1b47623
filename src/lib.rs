// Copyright 2026 the classcloak authors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
//
// SPDX-License-Identifier: Apache-2.0

#![doc(html_no_source)]
#![deny(missing_docs)]
#![allow(dead_code)]
#![allow(clippy::too_many_arguments)]

//! # classcloak
//!
//! A whole-program rename engine for JVM class files: consistent identifier
//! obfuscation that never breaks an override/implements relationship, plus a
//! constant-pool level binary rewriter that applies the renaming in place.
//!
//! `classcloak` reads a set of class files, builds an inheritance-aware
//! symbol tree across all of them, computes one consistent output name for
//! every renameable package, class, method and field, and then patches each
//! file's constant pool and structural records to match - without decoding
//! or re-encoding bytecode, stack maps, or any other payload the renaming
//! does not touch.
//!
//! ## Features
//!
//! - **Override-safe renaming** - methods connected through superclass or
//!   interface edges (in either direction, across the whole inheritance
//!   namespace) always receive the same output name
//! - **External-type aware** - inheritance edges to classes outside the
//!   analyzed set are honored through a pluggable [`rename::TypeOracle`]
//! - **Index-stable rewriting** - pool entries are renamed or copy-on-write
//!   cloned so existing bytecode indices stay valid
//! - **Optional shrinking** - a reachability sweep can drop unreferenced
//!   members and classes before rewriting
//! - **Deterministic** - the same inputs and directives produce a
//!   byte-identical output-name map on every run
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use classcloak::prelude::*;
//!
//! let mut session = ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
//! session.load_class("demo/Greeter.class", &std::fs::read("Greeter.class")?)?;
//! session.resolve()?;
//! for (name, bytes) in session.rewrite_all()? {
//!     std::fs::write(name, bytes)?;
//! }
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! The crate is organized leaf-to-root:
//!
//! - [`file`] - bounds-checked big-endian readers/writers and the mmap input wrapper
//! - [`classfile`] - lossless class-file decode/encode and the reference-counted
//!   constant pool editor
//! - [`tree`] - the whole-program symbol tree (packages, classes, members,
//!   inheritance links, wildcard lookup)
//! - [`rename`] - namespace discovery, reservation propagation and the
//!   deterministic name generator
//! - [`rewrite`] - the staged per-file rewriter: trim, recount, remap, patch
//! - [`script`] - the typed "do not rename" directive feed
//! - [`session`] - the two-pass orchestration over a whole input set
//! - [`report`] - the post-run mapping dump and name-frequency table
//!
//! Container/archive handling, script *syntax*, digests and CLI glue are
//! deliberately out of scope; [`container`] only defines the seams they
//! plug into.

#[macro_use]
pub(crate) mod error;

/// Bounds-checked binary readers and writers.
///
/// Class files are big-endian throughout; this module provides the
/// endian-aware primitives ([`file::ByteOrdered`], [`file::read_be_at`],
/// [`file::write_be_at`]), the cursor-based [`file::Parser`], and the
/// mmap-backed [`file::PhysicalFile`] used to pull whole inputs.
pub mod file;

/// Class-file record model: decode, encode, and controlled mutation.
///
/// The centerpiece is [`classfile::ConstantPool`], a tagged, reference-counted
/// pool with a narrow mutation interface (`retarget`, `append_or_reuse`,
/// `recount`, `drop_unreferenced_utf8`) that keeps every cross-reference
/// consistent during rewriting. [`classfile::ClassFile`] carries the header,
/// the pool, and the field/method/attribute records. Sub-modules handle
/// modified UTF-8, descriptors and generic signatures, access flags, and a
/// reference-scanning bytecode walker.
pub mod classfile;

/// Whole-program symbol tree.
///
/// [`tree::ClassTree`] is an arena-backed forest of package, class, method
/// and field nodes with inheritance edges, supporting exact and wildcard
/// lookup, pre-order walks, and the placeholder mechanics that let inner
/// classes arrive before their outer class.
pub mod tree;

/// The name-resolution engine.
///
/// Computes one consistent renaming per inheritance-connected namespace by
/// propagating reservations up and down the hierarchy, querying a
/// [`rename::TypeOracle`] for types outside the analyzed set, and drawing
/// fresh names from the deterministic [`rename::NameGenerator`].
pub mod rename;

/// The binary rewriter.
///
/// Applies the completed renaming to each decoded class file through a
/// strictly staged pipeline (trim, recount, member remap, reference remap,
/// class remap, metadata remap, reflective-string remap), including the
/// copy-on-write handling of shared pool entries.
pub mod rewrite;

/// Typed script directives (retain/map rules and option flags).
pub mod script;

/// Collaborator seams for container/archive enumeration.
pub mod container;

/// Two-pass orchestration of a whole obfuscation run.
pub mod session;

/// Post-run reporting: rename map dump and name-frequency table.
pub mod report;

/// Common imports for working with this library.
///
/// # Example
///
/// ```rust,no_run
/// use classcloak::prelude::*;
///
/// let mut session = ObfuscationSession::new(FixtureOracle::with_core_types(), Options::default());
/// session.load_class("a/B.class", &std::fs::read("B.class")?)?;
/// # Ok::<(), Box<dyn std::error::Error>>(())
/// ```
pub mod prelude;

/// `classcloak` Result type
///
/// A type alias for [`std::result::Result<T, Error>`] where the error type is
/// always [`Error`]. Used consistently throughout the crate for all fallible
/// operations.
pub type Result<T> = std::result::Result<T, Error>;

/// `classcloak` Error type
///
/// The main error type for all operations in this crate. See [`error`] module
/// documentation for the taxonomy.
pub use error::Error;

/// Main entry point for a whole obfuscation run.
///
/// See [`session::ObfuscationSession`] for the two-pass load/resolve/rewrite
/// lifecycle.
pub use session::ObfuscationSession;

/// Decoded class-file record.
pub use classfile::ClassFile;

/// Cursor-based big-endian parser for raw class-file bytes.
pub use file::Parser;
