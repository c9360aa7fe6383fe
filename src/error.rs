use thiserror::Error;

pub use color_eyre::eyre::eyre;

use crate::protocol::packet::ErrPayloadBytes;
use crate::protocol::response::ErrPayload;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Server Error: {0}")]
    ServerError(#[from] ErrPayload),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Bad config error: {0}")]
    BadConfigError(String),

    #[error("Bad usage error: {0}")]
    BadUsageError(String),

    #[error("Invalid packet")]
    InvalidPacket,

    #[error("Unexpected end of packet")]
    UnexpectedEof,

    /// The server sent a column whose type has no known binary encoding length.
    /// This indicates a client/server protocol version mismatch.
    #[error(
        "Unsupported binary-encoded column type {type_id:#04x} for column {} of {num_columns}",
        column + 1
    )]
    UnsupportedBinaryType {
        type_id: u8,
        column: usize,
        num_columns: usize,
    },

    #[error("Operation not supported: {0}")]
    NotSupported(&'static str),

    #[error("Operation not allowed after the result set was closed")]
    ResultSetClosed,

    #[error("Failed to fetch rows for statement {statement_id}: {source}")]
    FetchFailed {
        statement_id: u32,
        #[source]
        source: Box<Error>,
    },

    #[error("Library bug: {0}")]
    LibraryBug(color_eyre::Report),
}

impl Error {
    pub fn from_debug(err: impl std::fmt::Debug) -> Self {
        Self::LibraryBug(eyre!("{:?}", err))
    }
}

impl<'a> From<ErrPayloadBytes<'a>> for Error {
    fn from(value: ErrPayloadBytes<'a>) -> Self {
        match ErrPayload::try_from(value) {
            Ok(err_payload) => Error::ServerError(err_payload),
            Err(err) => err,
        }
    }
}

impl From<std::convert::Infallible> for Error {
    fn from(err: std::convert::Infallible) -> Self {
        match err {}
    }
}

pub type Result<T> = std::result::Result<T, Error>;
