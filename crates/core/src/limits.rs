//! Size limits enforced by the document layer.
//!
//! Not named explicitly in spec §4.7, but every format conversion and patch
//! application needs *some* recursion/size bound to stay safe against
//! adversarial input.

/// Maximum canonical document size in bytes.
pub const MAX_DOCUMENT_SIZE: usize = 16 * 1024 * 1024;

/// Maximum JSON nesting depth accepted by the document layer.
pub const MAX_NESTING_DEPTH: usize = 100;

/// Maximum number of segments in a JSON-Pointer path.
pub const MAX_POINTER_SEGMENTS: usize = 256;

/// Error raised when a document or path exceeds a configured limit.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LimitError {
    /// Document exceeds [`MAX_DOCUMENT_SIZE`].
    #[error("document size {size} exceeds maximum of {max} bytes")]
    DocumentTooLarge {
        /// Actual size in bytes.
        size: usize,
        /// Configured maximum.
        max: usize,
    },
    /// Document nesting exceeds [`MAX_NESTING_DEPTH`].
    #[error("document nesting depth {depth} exceeds maximum of {max} levels")]
    NestingTooDeep {
        /// Actual depth.
        depth: usize,
        /// Configured maximum.
        max: usize,
    },
    /// JSON-Pointer path exceeds [`MAX_POINTER_SEGMENTS`].
    #[error("path length {length} exceeds maximum of {max} segments")]
    PathTooLong {
        /// Actual number of segments.
        length: usize,
        /// Configured maximum.
        max: usize,
    },
}
