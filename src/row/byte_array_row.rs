use std::sync::Arc;

use crate::col::ColumnDefinition;
use crate::error::{Error, Result};
use crate::protocol::r#trait::ValueFactory;
use crate::row::{Row, RowEncoding};

/// A row whose column values are already separated and owned
///
/// Unlike [`crate::row::BufferRow`] it does not borrow a packet, so it can outlive the
/// batch it came from and its values can be replaced.
#[derive(Debug, Clone)]
pub struct ByteArrayRow {
    columns: Arc<[ColumnDefinition]>,
    encoding: RowEncoding,
    values: Vec<Option<Vec<u8>>>,
}

impl ByteArrayRow {
    pub fn new(
        columns: Arc<[ColumnDefinition]>,
        encoding: RowEncoding,
        values: Vec<Option<Vec<u8>>>,
    ) -> Result<Self> {
        if values.len() != columns.len() {
            return Err(Error::BadUsageError(format!(
                "{} values given for {} columns",
                values.len(),
                columns.len()
            )));
        }
        Ok(Self {
            columns,
            encoding,
            values,
        })
    }

    pub fn columns(&self) -> &Arc<[ColumnDefinition]> {
        &self.columns
    }

    pub fn into_values(self) -> Vec<Option<Vec<u8>>> {
        self.values
    }

    fn slot(&self, index: usize) -> Result<&Option<Vec<u8>>> {
        self.values.get(index).ok_or_else(|| self.out_of_range(index))
    }

    fn out_of_range(&self, index: usize) -> Error {
        Error::BadUsageError(format!(
            "Column index {} out of range for a row of {} columns",
            index,
            self.values.len()
        ))
    }
}

impl Row for ByteArrayRow {
    fn encoding(&self) -> RowEncoding {
        self.encoding
    }

    fn num_columns(&self) -> usize {
        self.columns.len()
    }

    fn column_value(&self, index: usize) -> Result<Option<&[u8]>> {
        Ok(self.slot(index)?.as_deref())
    }

    fn is_null(&self, index: usize) -> Result<bool> {
        Ok(self.slot(index)?.is_none())
    }

    fn length(&self, index: usize) -> Result<u64> {
        Ok(self.slot(index)?.as_ref().map_or(0, |value| value.len() as u64))
    }

    fn set_column_value(&mut self, index: usize, value: Option<Vec<u8>>) -> Result<()> {
        match self.values.get_mut(index) {
            Some(slot) => {
                *slot = value;
                Ok(())
            }
            None => Err(self.out_of_range(index)),
        }
    }

    fn get_value<'r, F: ValueFactory<'r>>(
        &'r self,
        index: usize,
        factory: &mut F,
    ) -> Result<F::Output> {
        let column = self.columns.get(index).ok_or_else(|| self.out_of_range(index))?;
        match self.slot(index)? {
            None => factory.create_from_null(column),
            Some(bytes) => factory.create_from_bytes(column, self.encoding, bytes),
        }
    }
}
