use std::io;    // Import I/O module for error handling

use thiserror::Error;

use crate::database::{ElementType, MeshFormat};

/// Result type used by every import/export entry point
pub type MeshResult<T> = Result<T, MeshError>;

#[derive(Debug, Error)]
pub enum MeshError {                                // Every failure an import or export call can report
    /// File cannot be opened, read or written
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),

    /// Magic/header mismatch, truncated or malformed content
    #[error("Format error: {0}")]
    Format(String),

    /// Failed number conversions (invalid float/int strings)
    #[error("Number parse error: {0}")]
    NumberParse(String),

    /// Element type has no mapping in the target/source format
    #[error("Unsupported element: {element_type:?} cannot be represented in {format:?}")]
    UnsupportedElement {
        element_type: ElementType,
        format: MeshFormat,
    },

    /// Deflate encoder or decoder failure
    #[error("Compression error: {0}")]
    Compression(String),
}

impl MeshError {
    pub fn format(message: impl Into<String>) -> Self {
        MeshError::Format(message.into())
    }

    pub fn unsupported(element_type: ElementType, format: MeshFormat) -> Self {
        MeshError::UnsupportedElement { element_type, format }
    }
}

// Implement automatic conversion from float parsing errors
// This allows us to use ? when parsing floating point numbers
impl From<std::num::ParseFloatError> for MeshError {
    fn from(err: std::num::ParseFloatError) -> Self {
        MeshError::NumberParse(format!("Float parse error: {}", err))
    }
}

// Implement automatic conversion from integer parsing errors
impl From<std::num::ParseIntError> for MeshError {
    fn from(err: std::num::ParseIntError) -> Self {
        MeshError::NumberParse(format!("Int parse error: {}", err))
    }
}

impl From<std::num::TryFromIntError> for MeshError {
    fn from(err: std::num::TryFromIntError) -> Self {
        MeshError::NumberParse(format!("Integer conversion error: {}", err))
    }
}
