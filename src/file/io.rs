//! Low-level byte order and safe reading/writing utilities for class-file decoding.
//!
//! This module provides endian-aware binary data reading and writing for parsing
//! JVM class files. It implements safe, bounds-checked operations for reading and
//! writing primitive types from/to byte buffers, ensuring data integrity and
//! preventing buffer overruns during binary analysis and generation.
//!
//! Class files are big-endian throughout, so the big-endian family is the one the
//! rest of the crate uses; the little-endian halves of [`crate::file::io::ByteOrdered`]
//! exist for completeness and for the few host-order conversions the tests perform.
//!
//! # Architecture
//!
//! The module is built around the [`crate::file::io::ByteOrdered`] trait which
//! provides a unified interface for reading and writing binary data in a type-safe
//! manner:
//!
//! - Generic trait-based reading and writing for all primitive types
//! - Automatic bounds checking to prevent buffer overruns
//! - Consistent error handling through the [`crate::Result`] type
//!
//! # Key Components
//!
//! ## Core Trait
//! - [`crate::file::io::ByteOrdered`] - Trait defining endian-aware conversion for primitive types
//!
//! ## Reading Functions
//! - [`crate::file::io::read_be`] - Read values from buffer start in big-endian format
//! - [`crate::file::io::read_be_at`] - Read values at specific offset with auto-advance
//!
//! ## Writing Functions
//! - [`crate::file::io::write_be_at`] - Write values at specific offset with auto-advance
//! - [`crate::file::io::push_be`] - Append values to a growable output buffer
//!
//! ## Supported Types
//! The [`crate::file::io::ByteOrdered`] trait is implemented for:
//! - **Unsigned integers**: `u8`, `u16`, `u32`, `u64`
//! - **Signed integers**: `i8`, `i16`, `i32`, `i64`
//! - **Floating point**: `f32`, `f64`
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classcloak::file::io::{read_be, read_be_at};
//!
//! // Class files store everything big-endian
//! let data = [0xCA, 0xFE, 0xBA, 0xBE];
//! let magic: u32 = read_be(&data)?;
//! assert_eq!(magic, 0xCAFE_BABE);
//!
//! // Sequential reading with offset tracking
//! let data = [0x00, 0x01, 0x00, 0x02];
//! let mut offset = 0;
//! let first: u16 = read_be_at(&data, &mut offset)?;  // offset: 0 -> 2
//! let second: u16 = read_be_at(&data, &mut offset)?; // offset: 2 -> 4
//! assert_eq!((first, second), (1, 2));
//! # Ok::<(), classcloak::Error>(())
//! ```
//!
//! # Error Handling
//!
//! All reading and writing functions return [`crate::Result<T>`] and will return
//! [`crate::Error::OutOfBounds`] if there are insufficient bytes in the buffer to
//! complete the operation.
//!
//! # Thread Safety
//!
//! All functions and types in this module are thread-safe. They are pure operations
//! over caller-owned buffers and do not touch shared state.

use crate::{Error::OutOfBounds, Result};

/// Trait for implementing type-specific safe binary data conversion operations.
///
/// This trait provides a unified interface for reading and writing primitive types
/// from byte slices in a safe and endian-aware manner. It abstracts over the
/// conversion from byte arrays to typed values, supporting both big-endian (the
/// class-file native order) and little-endian formats.
///
/// Each implementation defines a `Bytes` associated type that represents the
/// fixed-size byte array required for that particular type (e.g., `[u8; 4]` for
/// `u32`).
///
/// # Thread Safety
///
/// All implementations of [`ByteOrdered`] are thread-safe as they only work with
/// primitive types and perform pure conversion operations without any shared state.
pub trait ByteOrdered: Sized {
    /// Associated type representing the byte array type for this numeric type.
    type Bytes: Sized + for<'a> TryFrom<&'a [u8]> + AsRef<[u8]>;

    /// Read T from a byte buffer in little-endian
    fn from_le_bytes(bytes: Self::Bytes) -> Self;
    /// Read T from a byte buffer in big-endian
    fn from_be_bytes(bytes: Self::Bytes) -> Self;

    /// Write T to a byte buffer in little-endian
    fn to_le_bytes(self) -> Self::Bytes;
    /// Write T to a byte buffer in big-endian
    fn to_be_bytes(self) -> Self::Bytes;
}

macro_rules! byte_ordered_impl {
    ($($ty:ty => $len:expr),+ $(,)?) => {
        $(
            impl ByteOrdered for $ty {
                type Bytes = [u8; $len];

                fn from_le_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_le_bytes(bytes)
                }

                fn from_be_bytes(bytes: Self::Bytes) -> Self {
                    <$ty>::from_be_bytes(bytes)
                }

                fn to_le_bytes(self) -> Self::Bytes {
                    <$ty>::to_le_bytes(self)
                }

                fn to_be_bytes(self) -> Self::Bytes {
                    <$ty>::to_be_bytes(self)
                }
            }
        )+
    };
}

byte_ordered_impl! {
    u8 => 1, i8 => 1,
    u16 => 2, i16 => 2,
    u32 => 4, i32 => 4,
    u64 => 8, i64 => 8,
    f32 => 4, f64 => 8,
}

/// Safely reads a value of type `T` in big-endian byte order from a data buffer.
///
/// This function reads from the beginning of the buffer and supports all types that
/// implement the [`crate::file::io::ByteOrdered`] trait.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust,ignore
/// use classcloak::file::io::read_be;
///
/// let data = [0x00, 0x00, 0x00, 0x34];
/// let value: u32 = read_be(&data)?;
/// assert_eq!(value, 0x34);
/// # Ok::<(), classcloak::Error>(())
/// ```
pub fn read_be<T: ByteOrdered>(data: &[u8]) -> Result<T> {
    let mut offset = 0_usize;
    read_be_at(data, &mut offset)
}

/// Safely reads a value of type `T` in big-endian byte order at a specific offset.
///
/// This function reads from the specified offset and automatically advances the
/// offset by the number of bytes read.
///
/// # Arguments
///
/// * `data` - The byte buffer to read from
/// * `offset` - Mutable reference to the offset position (advanced after reading)
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if there are insufficient bytes.
///
/// # Examples
///
/// ```rust,ignore
/// use classcloak::file::io::read_be_at;
///
/// let data = [0x00, 0x01, 0x00, 0x02];
/// let mut offset = 0;
///
/// let first: u16 = read_be_at(&data, &mut offset)?;
/// assert_eq!(first, 1);
/// assert_eq!(offset, 2);
/// # Ok::<(), classcloak::Error>(())
/// ```
pub fn read_be_at<T: ByteOrdered>(data: &[u8], offset: &mut usize) -> Result<T> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    let Ok(read) = data[*offset..*offset + type_len].try_into() else {
        return Err(OutOfBounds);
    };

    *offset += type_len;

    Ok(T::from_be_bytes(read))
}

/// Safely writes a value of type `T` in big-endian byte order at a specific offset.
///
/// This function writes at the specified offset into an existing buffer and
/// automatically advances the offset by the number of bytes written. Used for
/// patching pool indices in place inside already-encoded attribute payloads.
///
/// # Arguments
///
/// * `data` - The byte buffer to write into
/// * `offset` - Mutable reference to the offset position (advanced after writing)
/// * `value` - The value to encode
///
/// # Errors
///
/// Returns [`crate::Error::OutOfBounds`] if the buffer is too small for the write.
///
/// # Examples
///
/// ```rust,ignore
/// use classcloak::file::io::write_be_at;
///
/// let mut data = [0u8; 4];
/// let mut offset = 0;
/// write_be_at(&mut data, &mut offset, 0xCAFE_BABEu32)?;
/// assert_eq!(data, [0xCA, 0xFE, 0xBA, 0xBE]);
/// # Ok::<(), classcloak::Error>(())
/// ```
pub fn write_be_at<T: ByteOrdered>(data: &mut [u8], offset: &mut usize, value: T) -> Result<()> {
    let type_len = std::mem::size_of::<T>();
    if (type_len + *offset) > data.len() {
        return Err(OutOfBounds);
    }

    data[*offset..*offset + type_len].copy_from_slice(value.to_be_bytes().as_ref());
    *offset += type_len;

    Ok(())
}

/// Appends a value of type `T` in big-endian byte order to a growable output buffer.
///
/// The encode path of the crate emits structures by appending to a `Vec<u8>` sink;
/// this is the primitive every encoder bottoms out in.
///
/// # Arguments
///
/// * `sink` - The output buffer to append to
/// * `value` - The value to encode
pub fn push_be<T: ByteOrdered>(sink: &mut Vec<u8>, value: T) {
    sink.extend_from_slice(value.to_be_bytes().as_ref());
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_be_primitives() {
        let data = [0xCA, 0xFE, 0xBA, 0xBE, 0x00, 0x34];
        assert_eq!(read_be::<u32>(&data).unwrap(), 0xCAFE_BABE);

        let mut offset = 4;
        assert_eq!(read_be_at::<u16>(&data, &mut offset).unwrap(), 0x34);
        assert_eq!(offset, 6);
    }

    #[test]
    fn read_be_out_of_bounds() {
        let data = [0x01, 0x02];
        assert!(matches!(read_be::<u32>(&data), Err(OutOfBounds)));

        let mut offset = 1;
        assert!(matches!(
            read_be_at::<u16>(&data, &mut offset),
            Err(OutOfBounds)
        ));
        assert_eq!(offset, 1, "failed read must not advance the offset");
    }

    #[test]
    fn write_be_at_patches_in_place() {
        let mut data = [0u8; 6];
        let mut offset = 2;
        write_be_at(&mut data, &mut offset, 0x0102u16).unwrap();
        assert_eq!(data, [0, 0, 0x01, 0x02, 0, 0]);
        assert_eq!(offset, 4);

        let mut offset = 5;
        assert!(write_be_at(&mut data, &mut offset, 0x0102u16).is_err());
    }

    #[test]
    fn push_be_appends() {
        let mut sink = Vec::new();
        push_be(&mut sink, 0xCAFE_BABEu32);
        push_be(&mut sink, 0x12u8);
        assert_eq!(sink, [0xCA, 0xFE, 0xBA, 0xBE, 0x12]);
    }

    #[test]
    fn round_trip_all_widths() {
        let mut sink = Vec::new();
        push_be(&mut sink, 0x7Fu8);
        push_be(&mut sink, -2i16);
        push_be(&mut sink, 1.5f32);
        push_be(&mut sink, -9i64);

        let mut offset = 0;
        assert_eq!(read_be_at::<u8>(&sink, &mut offset).unwrap(), 0x7F);
        assert_eq!(read_be_at::<i16>(&sink, &mut offset).unwrap(), -2);
        assert_eq!(read_be_at::<f32>(&sink, &mut offset).unwrap(), 1.5);
        assert_eq!(read_be_at::<i64>(&sink, &mut offset).unwrap(), -9);
        assert_eq!(offset, sink.len());
    }
}
