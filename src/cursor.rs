//! Forward-only rows of a server-side cursor.
//!
//! After `COM_STMT_EXECUTE` opens a read-only cursor, the server keeps the result and
//! hands it out in batches, one `COM_STMT_FETCH` per batch. [`CursorRows`] holds the
//! current batch and fetches the next one when the consumer runs past its end.

use std::sync::Arc;

use tracing::debug;

use crate::buffer_pool::PooledBuffer;
use crate::col::ColumnDefinition;
use crate::error::{Error, Result, eyre};
use crate::opts::CursorOpts;
use crate::protocol::command::prepared::write_fetch;
use crate::protocol::r#trait::RowSession;
use crate::row::{BufferRow, RowEncoding};

/// Rows of an open server-side cursor
///
/// Every operation that may need a round trip takes the session as `&mut`, so a fetch
/// cannot interleave with another command on the same connection.
#[derive(Debug)]
pub struct CursorRows<B = PooledBuffer> {
    statement_id: u32,
    columns: Option<Arc<[ColumnDefinition]>>,
    opts: CursorOpts,
    /// Rows of the most recent fetch; `None` before the first fetch
    fetched: Option<Vec<BufferRow<B>>>,
    /// Index of the current row within `fetched`; `None` before its first row
    position_in_batch: Option<usize>,
    /// Index of the current row within the whole result; `None` before the first row
    position_in_result: Option<u64>,
    last_row_fetched: bool,
    first_fetch_completed: bool,
    was_empty: bool,
    after_last: bool,
    closed: bool,
    command_buffer: Vec<u8>,
}

impl<B: AsRef<[u8]>> CursorRows<B> {
    pub fn new(statement_id: u32, columns: Arc<[ColumnDefinition]>, opts: CursorOpts) -> Self {
        Self {
            statement_id,
            columns: Some(columns),
            opts,
            fetched: None,
            position_in_batch: None,
            position_in_result: None,
            last_row_fetched: false,
            first_fetch_completed: false,
            was_empty: false,
            after_last: false,
            closed: false,
            command_buffer: Vec::with_capacity(9),
        }
    }

    pub fn statement_id(&self) -> u32 {
        self.statement_id
    }

    /// Column metadata shared by every row; `None` after [`CursorRows::close`]
    pub fn columns(&self) -> Option<&Arc<[ColumnDefinition]>> {
        self.columns.as_ref()
    }

    pub fn opts(&self) -> &CursorOpts {
        &self.opts
    }

    /// Whether another row is available, fetching a batch if the current one is used up
    pub fn has_next<S>(&mut self, session: &mut S) -> Result<bool>
    where
        S: RowSession<Buffer = B>,
    {
        if self.closed || self.max_rows_reached() {
            return Ok(false);
        }

        if let Some(batch) = &self.fetched {
            if batch.is_empty() {
                return Ok(false);
            }
            if self.next_index_in_batch() < batch.len() {
                return Ok(true);
            }
            if self.last_row_fetched {
                return Ok(false);
            }
        }

        self.fetch_more_rows(session)?;
        Ok(self.fetched.as_ref().is_some_and(|batch| !batch.is_empty()))
    }

    /// Advance to the next row
    ///
    /// The row is borrowed from the cursor and stays valid until the next call.
    /// Returns `None` at the end of the result.
    pub fn next<S>(&mut self, session: &mut S) -> Result<Option<&mut BufferRow<B>>>
    where
        S: RowSession<Buffer = B>,
    {
        if self.closed {
            if self.position_in_result.is_some() {
                return Err(Error::ResultSetClosed);
            }
            return Ok(None);
        }

        if !self.has_next(session)? {
            if !self.was_empty {
                self.after_last = true;
            }
            return Ok(None);
        }

        let index = self.next_index_in_batch();
        self.position_in_batch = Some(index);
        self.position_in_result = Some(self.position_in_result.map_or(0, |p| p + 1));

        let columns = self.columns.as_ref().ok_or(Error::ResultSetClosed)?;
        let row = self
            .fetched
            .as_mut()
            .and_then(|batch| batch.get_mut(index))
            .ok_or_else(|| Error::LibraryBug(eyre!("cursor batch has no row {}", index)))?;
        row.set_columns(Arc::clone(columns))?;
        Ok(Some(row))
    }

    /// Call `f` for every remaining row
    pub fn for_each_row<S, F>(&mut self, session: &mut S, mut f: F) -> Result<()>
    where
        S: RowSession<Buffer = B>,
        F: FnMut(&BufferRow<B>) -> Result<()>,
    {
        while let Some(row) = self.next(session)? {
            f(row)?;
        }
        Ok(())
    }

    #[tracing::instrument(skip_all, fields(statement_id = self.statement_id))]
    fn fetch_more_rows<S>(&mut self, session: &mut S) -> Result<()>
    where
        S: RowSession<Buffer = B>,
    {
        // No round trip once the server has sent its last row; the batch is kept so the
        // current row stays addressable.
        if self.last_row_fetched {
            return Ok(());
        }

        let columns = match &self.columns {
            Some(columns) => Arc::clone(columns),
            None => return Err(Error::ResultSetClosed),
        };
        let statement_id = self.statement_id;
        let num_rows = self.rows_to_request();
        debug!(num_rows, "fetching rows");

        let batch = self
            .fetch_batch(session, &columns, num_rows)
            .map_err(|e| Error::FetchFailed {
                statement_id,
                source: Box::new(e),
            })?;

        let first_fetch = !self.first_fetch_completed;
        self.first_fetch_completed = true;
        // An empty first batch only means an empty result once the server says so
        if session.last_row_sent() {
            self.last_row_fetched = true;
            self.was_empty = first_fetch && batch.is_empty();
        }
        debug!(
            rows = batch.len(),
            last_row = self.last_row_fetched,
            "fetched rows"
        );

        self.fetched = Some(batch);
        self.position_in_batch = None;
        Ok(())
    }

    fn fetch_batch<S>(
        &mut self,
        session: &mut S,
        columns: &Arc<[ColumnDefinition]>,
        num_rows: u32,
    ) -> Result<Vec<BufferRow<B>>>
    where
        S: RowSession<Buffer = B>,
    {
        self.command_buffer.clear();
        write_fetch(&mut self.command_buffer, self.statement_id, num_rows);
        session.send_command(&self.command_buffer)?;

        let mut batch = Vec::new();
        while let Some(row) = session.next_row(columns, RowEncoding::Binary)? {
            batch.push(row);
        }
        Ok(batch)
    }

    fn rows_to_request(&self) -> u32 {
        let rows = self.opts.rows_per_fetch();
        match self.opts.max_rows {
            Some(max) => {
                let remaining = max.saturating_sub(self.rows_consumed());
                u32::try_from(remaining).map_or(rows, |remaining| rows.min(remaining).max(1))
            }
            None => rows,
        }
    }

    fn next_index_in_batch(&self) -> usize {
        self.position_in_batch.map_or(0, |p| p + 1)
    }

    fn rows_consumed(&self) -> u64 {
        self.position_in_result.map_or(0, |p| p + 1)
    }

    fn max_rows_reached(&self) -> bool {
        self.opts
            .max_rows
            .is_some_and(|max| self.rows_consumed() >= max)
    }

    pub fn is_before_first(&self) -> bool {
        !self.was_empty && self.position_in_result.is_none()
    }

    pub fn is_first(&self) -> bool {
        !self.after_last && self.position_in_result == Some(0)
    }

    /// Whether the current row is known to be the last one, without fetching
    pub fn is_last(&self) -> bool {
        if self.after_last || self.position_in_result.is_none() {
            return false;
        }
        if self.max_rows_reached() {
            return true;
        }
        match (&self.fetched, self.position_in_batch) {
            (Some(batch), Some(index)) => self.last_row_fetched && index + 1 == batch.len(),
            _ => false,
        }
    }

    pub fn is_after_last(&self) -> bool {
        self.after_last
    }

    /// Whether the server ended the result on the first fetch without any rows
    pub fn is_empty(&self) -> bool {
        self.was_empty
    }

    /// 1-based number of the current row, or 0 when not on a row
    pub fn current_row_number(&self) -> u64 {
        if self.after_last || self.closed {
            return 0;
        }
        self.rows_consumed()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Release the metadata and the buffered rows
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.columns = None;
        self.fetched = None;
        self.position_in_batch = None;
    }
}
