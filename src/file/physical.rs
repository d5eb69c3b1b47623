//! Memory-mapped input file wrapper.
//!
//! This module provides [`crate::file::physical::PhysicalFile`], a thin read-only
//! wrapper over a memory-mapped file used to pull whole class files (or whole
//! archives, when a container collaborator hands over raw bytes) without loading
//! them through intermediate buffers.
//!
//! # Architecture
//!
//! The wrapper maps files directly into the process's virtual address space:
//!
//! - **Efficient memory usage** - Only requested portions are loaded into physical memory
//! - **Operating system optimization** - Leverages OS-level caching and paging
//! - **Lazy loading** - Pages are loaded on-demand as they are accessed
//!
//! # Usage Examples
//!
//! ```rust,ignore
//! use classcloak::file::PhysicalFile;
//! use std::path::Path;
//!
//! let input = PhysicalFile::open(Path::new("Greeter.class"))?;
//! let bytes = input.data();
//! assert_eq!(&bytes[..4], &[0xCA, 0xFE, 0xBA, 0xBE]);
//! # Ok::<(), classcloak::Error>(())
//! ```

use crate::{
    Error::{Error, FileError},
    Result,
};

use memmap2::Mmap;
use std::{fs, path::Path};

/// A read-only view over a memory-mapped input file.
///
/// [`PhysicalFile`] maps a file directly into the process's virtual address
/// space, eliminating the need to read the entire file into memory upfront. All
/// access operations include bounds checking to ensure memory safety.
///
/// # Examples
///
/// ```rust,ignore
/// use classcloak::file::PhysicalFile;
/// use std::path::Path;
///
/// let input = PhysicalFile::open(Path::new("Greeter.class"))?;
/// println!("input size: {} bytes", input.len());
/// # Ok::<(), classcloak::Error>(())
/// ```
#[derive(Debug)]
pub struct PhysicalFile {
    /// Memory-mapped file data
    data: Mmap,
}

impl PhysicalFile {
    /// Create a new physical file view by memory-mapping the specified file.
    ///
    /// The file is mapped read-only and shared, allowing multiple processes to
    /// efficiently access the same file.
    ///
    /// # Arguments
    /// * `path` - Path to the input file on disk
    ///
    /// # Errors
    /// Returns [`crate::Error::FileError`] if the file cannot be opened or
    /// [`crate::Error::Error`] if memory mapping fails.
    pub fn open(path: impl AsRef<Path>) -> Result<PhysicalFile> {
        let file = match fs::File::open(path) {
            Ok(file) => file,
            Err(error) => return Err(FileError(error)),
        };

        let mmap = match unsafe { Mmap::map(&file) } {
            Ok(mmap) => mmap,
            Err(error) => return Err(Error(error.to_string())),
        };

        Ok(PhysicalFile { data: mmap })
    }

    /// Get a bounds-checked slice of the mapped data.
    ///
    /// # Arguments
    /// * `offset` - Byte offset of the slice start
    /// * `len` - Length of the slice in bytes
    ///
    /// # Errors
    /// Returns [`crate::Error::OutOfBounds`] if the requested range does not lie
    /// entirely within the file.
    pub fn data_slice(&self, offset: usize, len: usize) -> Result<&[u8]> {
        let Some(offset_end) = offset.checked_add(len) else {
            return Err(out_of_bounds_error!());
        };

        if offset_end > self.data.len() {
            return Err(out_of_bounds_error!());
        }

        Ok(&self.data[offset..offset_end])
    }

    /// Get the complete mapped file contents.
    #[must_use]
    pub fn data(&self) -> &[u8] {
        self.data.as_ref()
    }

    /// Returns the total file size in bytes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Returns `true` if the mapped file is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.len() == 0
    }
}
