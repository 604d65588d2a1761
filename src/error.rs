//! Error kinds shared by every component of the core library.

use thiserror::Error;

/// The single error enumeration returned by every fallible core-library
/// function. The CLI wraps this in `anyhow` at its own boundary.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid magic: expected one of IDA0/IDA1/IDA2, got {0:?}")]
    InvalidMagic(Vec<u8>),

    #[error("unknown version/banner: {0}")]
    UnknownVersion(String),

    #[error("truncated input: needed {needed} bytes, got {available}")]
    Truncated { needed: usize, available: usize },

    #[error("unexpected end of file at offset {offset}")]
    UnexpectedEof { offset: u64 },

    #[error("out of bounds: {0}")]
    OutOfBounds(String),

    #[error("unsupported: {0}")]
    Unsupported(String),

    #[error("invalid key spec: {0}")]
    InvalidKeySpec(String),

    #[error("corrupt tree: {0}")]
    CorruptTree(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
