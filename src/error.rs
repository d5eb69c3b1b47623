use thiserror::Error;

macro_rules! out_of_bounds_error {
    () => {
        crate::Error::OutOfBounds
    };
}

macro_rules! corrupt_format {
    // Single string version
    ($msg:expr) => {
        crate::Error::CorruptFormat {
            message: $msg.to_string(),
            file: file!(),
            line: line!(),
        }
    };

    // Format string with arguments version
    ($fmt:expr, $($arg:tt)*) => {
        crate::Error::CorruptFormat {
            message: format!($fmt, $($arg)*),
            file: file!(),
            line: line!(),
        }
    };
}

/// The generic Error type, covering every failure this library can return.
///
/// The taxonomy follows the two-layer design of the engine: decode-time
/// problems with the *input* surface as [`Error::CorruptFormat`] (or the
/// lower-level [`Error::OutOfBounds`] from the raw readers), while violations
/// of *internal* invariants — a pool index pointing outside the table, an
/// entry of an unexpected kind, a reference-count underflow — surface as
/// [`Error::InconsistentReference`] and indicate a bug rather than bad input.
///
/// # Error Categories
///
/// ## Input parsing
/// - [`Error::CorruptFormat`] - malformed class file (bad magic, short read, unknown pool tag)
/// - [`Error::OutOfBounds`] - a raw read/write would cross the buffer boundary
/// - [`Error::Empty`] - empty input provided
///
/// ## Internal invariants
/// - [`Error::InconsistentReference`] - pool/table cross-reference invariant violated
///
/// ## Script feed
/// - [`Error::UnresolvedScriptEntry`] - a directive names an entity absent from the tree;
///   callers log this as a warning and continue
///
/// ## I/O
/// - [`Error::FileError`] - filesystem errors while mapping input files
///
/// # Examples
///
/// ```rust,no_run
/// use classcloak::{classfile::ClassFile, Error};
///
/// match ClassFile::decode(&[0xCA, 0xFE]) {
///     Ok(_) => unreachable!(),
///     Err(Error::CorruptFormat { message, file, line }) => {
///         eprintln!("corrupt input: {} ({}:{})", message, file, line);
///     }
///     Err(e) => eprintln!("other error: {}", e),
/// }
/// ```
#[derive(Error, Debug)]
pub enum Error {
    /// The input is damaged and could not be decoded as a class file.
    ///
    /// Includes the source location where the malformation was detected,
    /// for debugging. Detection aborts processing of the offending file;
    /// the session treats the first occurrence as fatal for the run.
    #[error("CorruptFormat - {file}:{line}: {message}")]
    CorruptFormat {
        /// Description of what was malformed
        message: String,
        /// The source file in which this error was raised
        file: &'static str,
        /// The source line in which this error was raised
        line: u32,
    },

    /// An out of bound access was attempted while reading or writing raw bytes.
    #[error("Out of bound access would have occurred!")]
    OutOfBounds,

    /// A cross-reference invariant of the constant pool or the symbol tree
    /// was violated: index out of range, entry of unexpected kind, count
    /// underflow, duplicate definition. Never expected on well-formed input.
    #[error("InconsistentReference - {0}")]
    InconsistentReference(String),

    /// A script directive names a class, method or field that is not present
    /// in the symbol tree. The directive is skipped and the run continues.
    #[error("UnresolvedScriptEntry - {0}")]
    UnresolvedScriptEntry(String),

    /// Provided input was empty.
    #[error("Provided input was empty")]
    Empty,

    /// File I/O error.
    #[error("{0}")]
    FileError(#[from] std::io::Error),

    /// Generic error for miscellaneous failures.
    #[error("{0}")]
    Error(String),
}
