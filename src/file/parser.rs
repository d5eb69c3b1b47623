//! Low-level byte stream parser for class-file decoding.
//!
//! This module provides the [`crate::file::parser::Parser`] type, a cursor-based
//! binary data parser for reading JVM class-file structures. It offers
//! bounds-checked access to binary data in the big-endian byte order the format
//! mandates, including the length-prefixed byte runs that carry modified-UTF-8
//! constant-pool payloads.
//!
//! # Architecture
//!
//! The parser is built around a simple cursor-based model that maintains a
//! position within a byte slice:
//!
//! - **Position tracking** - Maintains current offset for sequential parsing
//! - **Bounds checking** - All operations validate data availability before reading
//! - **Type-safe reading** - Strongly typed methods for common data types
//!
//! # Key Components
//!
//! ## Core Type
//! - [`crate::file::parser::Parser`] - Main parser struct for binary data reading
//!
//! ## Navigation Methods
//! - [`crate::file::parser::Parser::seek`] - Move to specific position
//! - [`crate::file::parser::Parser::advance_by`] - Move forward by specified bytes
//! - [`crate::file::parser::Parser::pos`] - Get current position
//!
//! ## Data Access Methods
//! - [`crate::file::parser::Parser::read_be`] - Read primitive types (big-endian)
//! - [`crate::file::parser::Parser::read_bytes`] - Read a counted run of raw bytes
//! - [`crate::file::parser::Parser::peek_byte`] - Peek at current byte without advancing
//!
//! # Usage Examples
//!
//! ```rust
//! use classcloak::Parser;
//!
//! let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x00, 0x00, 0x34];
//! let mut parser = Parser::new(&data);
//!
//! let magic = parser.read_be::<u32>()?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! let minor = parser.read_be::<u16>()?;
//! let major = parser.read_be::<u16>()?;
//! assert_eq!((minor, major), (0, 52));
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::{
    file::io::{read_be_at, ByteOrdered},
    Result,
};

/// A generic binary data parser for reading class-file structures.
///
/// `Parser` provides a cursor-based interface for reading binary data in the
/// big-endian format class files use throughout. The parser maintains an internal
/// position cursor and provides bounds checking to prevent buffer overruns when
/// reading malformed or truncated data.
///
/// # Examples
///
/// ```rust
/// use classcloak::Parser;
///
/// let data = [0x00, 0x02, 0x01, 0x00, 0x07];
/// let mut parser = Parser::new(&data);
///
/// let count = parser.read_be::<u16>()?;
/// assert_eq!(count, 2);
///
/// parser.seek(4)?;
/// assert_eq!(parser.read_be::<u8>()?, 7);
/// # Ok::<(), classcloak::Error>(())
/// ```
pub struct Parser<'a> {
    /// The binary data being parsed
    data: &'a [u8],
    /// Current position within the data buffer
    position: usize,
}

impl<'a> Parser<'a> {
    /// Create a new [`crate::file::parser::Parser`] from a byte slice.
    ///
    /// # Arguments
    /// * `data` - The byte slice to read from
    #[must_use]
    pub fn new(data: &'a [u8]) -> Self {
        Parser { data, position: 0 }
    }

    /// Returns the length of the underlying data buffer.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the parser has no data.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Returns `true` if there is more data available to parse.
    #[must_use]
    pub fn has_more_data(&self) -> bool {
        self.position < self.data.len()
    }

    /// Move the current position to the specified index.
    ///
    /// # Arguments
    /// * `pos` - The position to move the cursor to
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is beyond the data length.
    pub fn seek(&mut self, pos: usize) -> Result<()> {
        if pos > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position = pos;
        Ok(())
    }

    /// Move the position forward by the specified number of bytes.
    ///
    /// # Arguments
    /// * `step` - Amount of bytes to advance
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if advancing by step would exceed the
    /// data length.
    pub fn advance_by(&mut self, step: usize) -> Result<()> {
        if self.position + step > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        self.position += step;
        Ok(())
    }

    /// Get the current position of the parser within the data buffer.
    #[must_use]
    pub fn pos(&self) -> usize {
        self.position
    }

    /// Get access to the underlying data buffer.
    #[must_use]
    pub fn data(&self) -> &'a [u8] {
        self.data
    }

    /// Peek at the next byte without advancing the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if position is at or beyond the data
    /// length.
    pub fn peek_byte(&self) -> Result<u8> {
        if self.position >= self.data.len() {
            return Err(out_of_bounds_error!());
        }
        Ok(self.data[self.position])
    }

    /// Read a value of type `T` in big-endian format and advance the position.
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if reading `T` would exceed the data
    /// length.
    pub fn read_be<T: ByteOrdered>(&mut self) -> Result<T> {
        read_be_at(self.data, &mut self.position)
    }

    /// Read a counted run of raw bytes and advance the position.
    ///
    /// Class files carry several counted runs (modified-UTF-8 payloads, `Code`
    /// arrays, opaque attribute bodies); this returns a borrowed slice over the
    /// run without copying.
    ///
    /// # Arguments
    /// * `len` - Number of bytes to read
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if fewer than `len` bytes remain.
    pub fn read_bytes(&mut self, len: usize) -> Result<&'a [u8]> {
        let Some(end) = self.position.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };
        if end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        let slice = &self.data[self.position..end];
        self.position = end;
        Ok(slice)
    }
}
