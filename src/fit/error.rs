use thiserror::Error;

#[derive(Error, Debug)]
pub enum FitError {
    #[error("Invalid FIT header: {reason}")]
    InvalidHeader { reason: String },

    #[error("Header CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    HeaderCrcMismatch { expected: u16, computed: u16 },

    #[error("File CRC mismatch: expected {expected:#06x}, computed {computed:#06x}")]
    CrcMismatch { expected: u16, computed: u16 },

    #[error("Unexpected end of data at offset {offset} (needed {needed} more bytes)")]
    UnexpectedEof { offset: usize, needed: usize },

    #[error("Data message references undefined local message type {0}")]
    UndefinedLocalMessage(u8),

    #[error("Unknown base type {0:#04x}")]
    InvalidBaseType(u8),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, FitError>;
