use std::sync::Arc;

use auto_impl::auto_impl;

use crate::col::ColumnDefinition;
use crate::error::Result;
use crate::row::{BufferRow, RowEncoding};

/// Trait for turning one raw column into a caller-chosen value
///
/// Rows hand the factory the column metadata, the row encoding and the bytes of the
/// column (without the length prefix). The bytes borrow from the row, so the output may
/// borrow them too.
pub trait ValueFactory<'buf> {
    /// The value produced for one column
    type Output;

    /// Called for SQL NULL
    fn create_from_null(&mut self, column: &ColumnDefinition) -> Result<Self::Output>;

    /// Called for a non-NULL column
    fn create_from_bytes(
        &mut self,
        column: &ColumnDefinition,
        encoding: RowEncoding,
        bytes: &'buf [u8],
    ) -> Result<Self::Output>;
}

/// The protocol session a cursor pages through
///
/// Only the holder of `&mut` access can send a command, so a fetch and the reads of its
/// rows never interleave with another command on the same connection.
#[auto_impl(&mut, Box)]
pub trait RowSession {
    /// Packet storage backing the rows this session produces
    type Buffer: AsRef<[u8]>;

    /// Write one command packet
    fn send_command(&mut self, payload: &[u8]) -> Result<()>;

    /// Read the next row of the current batch, or `None` once the batch terminator arrives
    fn next_row(
        &mut self,
        columns: &Arc<[ColumnDefinition]>,
        encoding: RowEncoding,
    ) -> Result<Option<BufferRow<Self::Buffer>>>;

    /// Whether the last batch terminator carried `SERVER_STATUS_LAST_ROW_SENT`
    fn last_row_sent(&self) -> bool;
}
