//! Error types for imtext.

use std::path::PathBuf;
use thiserror::Error;

/// Result type alias for imtext operations.
pub type Result<T> = std::result::Result<T, ImTextError>;

/// Main error type for imtext operations.
#[derive(Error, Debug)]
pub enum ImTextError {
    /// Item index outside `0..len`.
    #[error("Index {index} out of range for dataset of length {len}")]
    IndexOutOfRange {
        /// Requested index.
        index: usize,
        /// Dataset length.
        len: usize,
    },

    /// No candidate index file in the data directory.
    #[error("No index file (*.csv) found in {}", .0.display())]
    NoIndexFile(PathBuf),

    /// Malformed index file.
    #[error("Index file error: {0}")]
    IndexFile(String),

    /// Referenced image does not exist.
    #[error("Image not found: {}", .0.display())]
    ImageNotFound(PathBuf),

    /// Image could not be decoded.
    #[error("Failed to decode image: {0}")]
    ImageDecode(String),

    /// Tensor shape mismatch.
    #[error("Shape mismatch: expected {expected:?}, got {actual:?}")]
    ShapeMismatch {
        /// Expected shape.
        expected: Vec<usize>,
        /// Actual shape.
        actual: Vec<usize>,
    },

    /// Configuration errors.
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization errors.
    #[error("Serialization error: {0}")]
    Serialization(String),

    /// HuggingFace Hub errors.
    #[error("Hub error: {0}")]
    Hub(String),

    /// Tokenizer errors.
    #[error("Tokenizer error: {0}")]
    Tokenizer(String),

    /// Invalid argument.
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),
}
