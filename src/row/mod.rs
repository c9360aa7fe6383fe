//! Row materialization.
//!
//! A row gives access to its columns by index without the caller knowing how the
//! server encoded them. [`BufferRow`] decodes lazily out of the packet it was read
//! from; [`ByteArrayRow`] holds already separated column values and can be modified.

mod buffer_row;
mod byte_array_row;


pub use buffer_row::BufferRow;
pub use byte_array_row::ByteArrayRow;

use crate::error::Result;
use crate::protocol::r#trait::ValueFactory;

/// Wire encoding of a row packet
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum RowEncoding {
    /// Every column is a length-encoded string (COM_QUERY result sets)
    Text,
    /// NULL bitmap followed by fixed-width or length-encoded columns (prepared statements)
    Binary,
}

/// Column access shared by every row representation
pub trait Row {
    fn encoding(&self) -> RowEncoding;

    /// Number of columns, or 0 while no column metadata is attached
    fn num_columns(&self) -> usize;

    /// Raw bytes of a column without their length prefix; `None` is SQL NULL
    fn column_value(&self, index: usize) -> Result<Option<&[u8]>>;

    fn is_null(&self, index: usize) -> Result<bool>;

    /// Byte length of a column value; NULL reports 0
    fn length(&self, index: usize) -> Result<u64>;

    /// Replace a column value; `None` stores SQL NULL
    fn set_column_value(&mut self, index: usize, value: Option<Vec<u8>>) -> Result<()>;

    /// Decode a column through a [`ValueFactory`]
    fn get_value<'r, F: ValueFactory<'r>>(&'r self, index: usize, factory: &mut F)
    -> Result<F::Output>;
}
