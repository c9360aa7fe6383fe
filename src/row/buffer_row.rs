use std::cell::Cell;
use std::sync::Arc;

use crate::col::ColumnDefinition;
use crate::constant::{BinaryLength, ColumnType};
use crate::error::{Error, Result};
use crate::protocol::packet::PacketCursor;
use crate::protocol::primitive::NULL_LENGTH_MARKER;
use crate::protocol::r#trait::ValueFactory;
use crate::protocol::value::NullBitmap;
use crate::row::{ByteArrayRow, Row, RowEncoding};

/// A row decoded lazily out of the packet it arrived in
///
/// Column offsets are found by walking the packet from the start of column 0. The last
/// resolved column and its offset are cached, so reading columns in increasing order
/// walks the packet once; going backwards restarts from column 0.
///
/// Binary rows need their column metadata before any column can be located, because the
/// width of a column depends on its type. Metadata is attached with [`BufferRow::set_columns`],
/// which also decodes the NULL bitmap the first time it runs.
#[derive(Debug)]
pub struct BufferRow<B = Vec<u8>> {
    packet: B,
    encoding: RowEncoding,
    /// Offset of column 0
    home: usize,
    /// Offset of the NULL bitmap (binary rows)
    pre_bitmap_home: usize,
    /// (column index, offset) of the last resolved column
    last_requested: Cell<Option<(usize, usize)>>,
    columns: Option<Arc<[ColumnDefinition]>>,
    null_flags: Option<Box<[bool]>>,
}

impl<B: AsRef<[u8]>> BufferRow<B> {
    /// A text protocol row
    pub fn text(packet: B) -> Self {
        Self::with_home(packet, RowEncoding::Text, 0)
    }

    /// A binary protocol row; the packet must start with the 0x00 row header
    pub fn binary(packet: B) -> Result<Self> {
        match packet.as_ref().first() {
            Some(0x00) => Ok(Self::with_home(packet, RowEncoding::Binary, 1)),
            Some(_) => Err(Error::InvalidPacket),
            None => Err(Error::UnexpectedEof),
        }
    }

    pub fn new(packet: B, encoding: RowEncoding) -> Result<Self> {
        match encoding {
            RowEncoding::Text => Ok(Self::text(packet)),
            RowEncoding::Binary => Self::binary(packet),
        }
    }

    fn with_home(packet: B, encoding: RowEncoding, home: usize) -> Self {
        Self {
            packet,
            encoding,
            home,
            pre_bitmap_home: home,
            last_requested: Cell::new(None),
            columns: None,
            null_flags: None,
        }
    }

    pub fn with_columns(mut self, columns: Arc<[ColumnDefinition]>) -> Result<Self> {
        self.set_columns(columns)?;
        Ok(self)
    }

    /// Attach the result set's column metadata
    ///
    /// For binary rows the NULL bitmap is decoded on the first call only. Later calls
    /// swap the metadata in place and must describe the same number of columns.
    pub fn set_columns(&mut self, columns: Arc<[ColumnDefinition]>) -> Result<()> {
        if self.encoding == RowEncoding::Binary {
            match &self.null_flags {
                Some(flags) if flags.len() != columns.len() => {
                    return Err(Error::BadUsageError(format!(
                        "Row has {} columns but the metadata describes {}",
                        flags.len(),
                        columns.len()
                    )));
                }
                Some(_) => {}
                None => self.attach_null_bitmap(columns.len())?,
            }
        }
        self.columns = Some(columns);
        Ok(())
    }

    fn attach_null_bitmap(&mut self, num_columns: usize) -> Result<()> {
        let cursor = PacketCursor::at(self.packet.as_ref(), self.pre_bitmap_home)?;
        let (bitmap, cursor) = cursor.read_fixed(NullBitmap::result_set_len(num_columns))?;
        let bitmap = NullBitmap::for_result_set(bitmap);
        self.null_flags = Some((0..num_columns).map(|i| bitmap.is_null(i)).collect());
        self.home = cursor.position();
        self.last_requested.set(None);
        Ok(())
    }

    pub fn columns(&self) -> Option<&Arc<[ColumnDefinition]>> {
        self.columns.as_ref()
    }

    /// Copy the columns out of the packet into a row that owns them
    pub fn to_byte_array_row(&self) -> Result<ByteArrayRow> {
        let columns = self.require_columns()?;
        let values = (0..columns.len())
            .map(|i| Ok(self.column_value(i)?.map(<[u8]>::to_vec)))
            .collect::<Result<Vec<_>>>()?;
        ByteArrayRow::new(Arc::clone(columns), self.encoding, values)
    }

    fn require_columns(&self) -> Result<&Arc<[ColumnDefinition]>> {
        self.columns.as_ref().ok_or_else(|| {
            Error::BadUsageError("Row accessed before column metadata was attached".to_string())
        })
    }

    fn column(&self, index: usize) -> Result<&ColumnDefinition> {
        let columns = self.require_columns()?;
        columns.get(index).ok_or_else(|| {
            Error::BadUsageError(format!(
                "Column index {} out of range for a row of {} columns",
                index,
                columns.len()
            ))
        })
    }

    fn check_index(&self, index: usize) -> Result<()> {
        match self.encoding {
            // Text rows can be read without metadata; the packet bounds the walk.
            RowEncoding::Text if self.columns.is_none() => Ok(()),
            _ => self.column(index).map(|_| ()),
        }
    }

    fn null_flag(&self, index: usize) -> bool {
        self.null_flags
            .as_ref()
            .and_then(|flags| flags.get(index).copied())
            .unwrap_or(false)
    }

    fn unsupported(&self, index: usize) -> Error {
        let columns = self.columns.as_deref().unwrap_or_default();
        Error::UnsupportedBinaryType {
            type_id: columns.get(index).map_or(0, |c| c.type_id),
            column: index,
            num_columns: columns.len(),
        }
    }

    /// Offset at which column `index` begins
    fn resolve_offset(&self, index: usize) -> Result<usize> {
        if index == 0 {
            self.last_requested.set(Some((0, self.home)));
            return Ok(self.home);
        }

        let (mut column, offset) = match self.last_requested.get() {
            Some((cached, offset)) if cached <= index => (cached, offset),
            _ => (0, self.home),
        };

        let mut cursor = PacketCursor::at(self.packet.as_ref(), offset)?;
        while column < index {
            cursor = self.skip_column(cursor, column)?;
            column += 1;
        }

        self.last_requested.set(Some((index, cursor.position())));
        Ok(cursor.position())
    }

    fn skip_column<'a>(&self, cursor: PacketCursor<'a>, index: usize) -> Result<PacketCursor<'a>> {
        match self.encoding {
            RowEncoding::Text => cursor.skip_lenenc_bytes(),
            RowEncoding::Binary => {
                if self.null_flag(index) {
                    return Ok(cursor);
                }
                match self.column(index)?.binary_length() {
                    BinaryLength::Fixed(len) => cursor.skip(len),
                    BinaryLength::LengthEncoded => cursor.skip_lenenc_bytes(),
                    BinaryLength::Unsupported => Err(self.unsupported(index)),
                }
            }
        }
    }

    fn cursor_at_column(&self, index: usize) -> Result<PacketCursor<'_>> {
        let offset = self.resolve_offset(index)?;
        PacketCursor::at(self.packet.as_ref(), offset)
    }
}

impl<B: AsRef<[u8]>> Row for BufferRow<B> {
    fn encoding(&self) -> RowEncoding {
        self.encoding
    }

    fn num_columns(&self) -> usize {
        self.columns.as_ref().map_or(0, |columns| columns.len())
    }

    fn column_value(&self, index: usize) -> Result<Option<&[u8]>> {
        self.check_index(index)?;
        match self.encoding {
            RowEncoding::Text => Ok(self.cursor_at_column(index)?.read_lenenc_bytes()?.0),
            RowEncoding::Binary => {
                if self.null_flag(index) {
                    return Ok(None);
                }
                let column = self.column(index)?;
                if column.type_id == ColumnType::MYSQL_TYPE_NULL as u8 {
                    return Ok(None);
                }
                match column.binary_length() {
                    BinaryLength::Fixed(len) => {
                        Ok(Some(self.cursor_at_column(index)?.read_fixed(len)?.0))
                    }
                    BinaryLength::LengthEncoded => {
                        Ok(self.cursor_at_column(index)?.read_lenenc_bytes()?.0)
                    }
                    BinaryLength::Unsupported => Err(self.unsupported(index)),
                }
            }
        }
    }

    fn is_null(&self, index: usize) -> Result<bool> {
        self.check_index(index)?;
        match self.encoding {
            RowEncoding::Text => {
                let cursor = self.cursor_at_column(index)?;
                match cursor.remaining().first() {
                    Some(&first) => Ok(first == NULL_LENGTH_MARKER),
                    None => Err(Error::UnexpectedEof),
                }
            }
            RowEncoding::Binary => Ok(self.null_flag(index)),
        }
    }

    fn length(&self, index: usize) -> Result<u64> {
        self.check_index(index)?;
        match self.encoding {
            RowEncoding::Text => Ok(self.cursor_at_column(index)?.read_lenenc()?.0.unwrap_or(0)),
            RowEncoding::Binary => {
                if self.null_flag(index) {
                    return Ok(0);
                }
                match self.column(index)?.binary_length() {
                    BinaryLength::Fixed(len) => Ok(len as u64),
                    BinaryLength::LengthEncoded => {
                        Ok(self.cursor_at_column(index)?.read_lenenc()?.0.unwrap_or(0))
                    }
                    BinaryLength::Unsupported => Err(self.unsupported(index)),
                }
            }
        }
    }

    fn set_column_value(&mut self, _index: usize, _value: Option<Vec<u8>>) -> Result<()> {
        Err(Error::NotSupported(
            "Rows backed by a packet buffer are read-only",
        ))
    }

    fn get_value<'r, F: ValueFactory<'r>>(
        &'r self,
        index: usize,
        factory: &mut F,
    ) -> Result<F::Output> {
        let column = self.column(index)?;
        match self.column_value(index)? {
            None => factory.create_from_null(column),
            Some(bytes) => factory.create_from_bytes(column, self.encoding, bytes),
        }
    }
}
