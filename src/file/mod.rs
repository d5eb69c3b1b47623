//! Bounds-checked binary readers and writers for class-file data.
//!
//! This module is the foundation layer every decoder and encoder in the crate is
//! built on. Class files are big-endian throughout; the primitives here enforce
//! that order, validate every access against the buffer bounds, and surface
//! violations as [`crate::Error::OutOfBounds`] rather than panicking.
//!
//! # Key Components
//!
//! - [`crate::file::io`] - the [`ByteOrdered`] trait plus the free
//!   read/write/append functions ([`read_be`], [`read_be_at`], [`write_be_at`],
//!   [`push_be`])
//! - [`crate::file::parser::Parser`] - cursor-based sequential parser with
//!   seek/peek and counted-run reads
//! - [`crate::file::physical::PhysicalFile`] - read-only memory-mapped input file
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE];
//! let mut parser = Parser::new(&data);
//! assert_eq!(parser.read_be::<u32>()?, 0xCAFE_BABE);
//! # Ok::<(), classcloak::Error>(())
//! ```

pub mod io;
pub mod parser;
pub mod physical;

pub use io::{push_be, read_be, read_be_at, write_be_at, ByteOrdered};
pub use parser::Parser;
pub use physical::PhysicalFile;
