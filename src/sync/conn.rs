use std::io::{BufRead, BufReader, Read, Write};
use std::sync::Arc;

use tracing::{debug, trace};

use crate::buffer_pool::{BufferPool, GLOBAL_BUFFER_POOL, PooledBuffer, PooledBufferSet};
use crate::col::ColumnDefinition;
use crate::constant::{CapabilityFlags, CursorType, StatusFlags};
use crate::cursor::CursorRows;
use crate::error::{Error, Result};
use crate::opts::CursorOpts;
use crate::protocol::command::ColumnDefinitionBytes;
use crate::protocol::command::prepared::{
    ExecuteResponse, read_execute_response, write_close_statement, write_execute_cursor,
};
use crate::protocol::packet::{ErrPayloadBytes, MAX_PACKET_PAYLOAD, PacketHeader};
use crate::protocol::primitive::to_usize;
use crate::protocol::r#trait::RowSession;
use crate::protocol::response::{OkPayload, is_row_terminator, read_terminator_status};
use crate::row::{BufferRow, RowEncoding};
use zerocopy::IntoBytes;

/// A MySQL connection over an already authenticated stream
///
/// Connection establishment is left to the caller; `Conn` takes over once the handshake
/// has completed and the negotiated capabilities are known.
pub struct Conn<S: Read + Write> {
    stream: BufReader<S>,
    capability_flags: CapabilityFlags,
    status_flags: StatusFlags,
    buffer_set: PooledBufferSet,
    buffer_pool: Arc<BufferPool>,
}

impl<S: Read + Write> Conn<S> {
    pub fn new(stream: S, capability_flags: CapabilityFlags) -> Self {
        Self::with_buffer_pool(stream, capability_flags, Arc::clone(&GLOBAL_BUFFER_POOL))
    }

    pub fn with_buffer_pool(
        stream: S,
        capability_flags: CapabilityFlags,
        buffer_pool: Arc<BufferPool>,
    ) -> Self {
        Self {
            stream: BufReader::new(stream),
            capability_flags,
            status_flags: StatusFlags::empty(),
            buffer_set: buffer_pool.get_buffer_set(),
            buffer_pool,
        }
    }

    /// Get the negotiated capability flags
    pub fn capability_flags(&self) -> CapabilityFlags {
        self.capability_flags
    }

    /// Server status from the most recent OK, EOF or row terminator packet
    pub fn status_flags(&self) -> StatusFlags {
        self.status_flags
    }

    pub fn get_ref(&self) -> &S {
        self.stream.get_ref()
    }

    pub fn into_inner(self) -> S {
        self.stream.into_inner()
    }

    /// Execute a prepared statement that takes no parameters, keeping its result in a
    /// read-only server-side cursor
    ///
    /// Reads the column definitions and returns a [`CursorRows`] that fetches the rows
    /// on demand.
    #[tracing::instrument(skip_all, fields(statement_id = statement_id))]
    pub fn open_cursor(
        &mut self,
        statement_id: u32,
        opts: CursorOpts,
    ) -> Result<CursorRows<PooledBuffer>> {
        write_execute_cursor(
            self.buffer_set.new_write_buffer(),
            statement_id,
            CursorType::CURSOR_TYPE_READ_ONLY,
        );
        self.write_command()?;

        self.read_packet()?;
        let column_count = match read_execute_response(&self.buffer_set.read_buffer)? {
            ExecuteResponse::Ok(ok_bytes) => {
                self.status_flags = OkPayload::try_from(ok_bytes)?.status_flags;
                return Err(Error::BadUsageError(format!(
                    "Statement {} does not produce a result set",
                    statement_id
                )));
            }
            ExecuteResponse::ResultSet { column_count } => to_usize(column_count)?,
        };

        let mut columns = Vec::with_capacity(column_count);
        for _ in 0..column_count {
            self.read_packet()?;
            let bytes = ColumnDefinitionBytes(&self.buffer_set.read_buffer);
            columns.push(ColumnDefinition::try_from(bytes)?);
        }

        // With a cursor the server always ends the metadata with a terminator, and sends
        // no rows until the first fetch.
        self.read_packet()?;
        let payload = self.buffer_set.read_buffer.as_slice();
        if payload.first() == Some(&0xFF) {
            return Err(ErrPayloadBytes(payload).into());
        }
        let deprecate_eof = self
            .capability_flags
            .contains(CapabilityFlags::CLIENT_DEPRECATE_EOF);
        if !is_row_terminator(payload, self.capability_flags) {
            if !deprecate_eof {
                return Err(Error::InvalidPacket);
            }
            // No metadata terminator: the rows follow inline
            self.discard_rows()?;
            return Err(cursor_declined());
        }
        self.status_flags = read_terminator_status(payload, self.capability_flags)?;
        if !self
            .status_flags
            .contains(StatusFlags::SERVER_STATUS_CURSOR_EXISTS)
        {
            // An EOF after the metadata is followed by the whole result. Under
            // CLIENT_DEPRECATE_EOF the terminator already ended an empty result.
            if !deprecate_eof {
                self.discard_rows()?;
            }
            return Err(cursor_declined());
        }

        debug!(column_count, "cursor opened");
        Ok(CursorRows::new(statement_id, columns.into(), opts))
    }

    /// Deallocate a prepared statement; the server sends no response
    pub fn close_statement(&mut self, statement_id: u32) -> Result<()> {
        write_close_statement(self.buffer_set.new_write_buffer(), statement_id);
        self.write_command()
    }

    /// Read and drop row packets up to the end of the current result set
    fn discard_rows(&mut self) -> Result<()> {
        let mut discarded = 0usize;
        loop {
            self.read_packet()?;
            let payload = self.buffer_set.read_buffer.as_slice();
            if payload.first() == Some(&0xFF) {
                return Err(ErrPayloadBytes(payload).into());
            }
            if is_row_terminator(payload, self.capability_flags) {
                self.status_flags = read_terminator_status(payload, self.capability_flags)?;
                debug!(discarded, "discarded rows of a result without a cursor");
                return Ok(());
            }
            discarded += 1;
        }
    }

    /// Send the command in the write buffer as sequence 0
    fn write_command(&mut self) -> Result<()> {
        let stream = self.stream.get_mut();
        match self.buffer_set.single_packet(0, MAX_PACKET_PAYLOAD) {
            Some(packet) => {
                trace!(len = packet.len(), "write packet");
                stream.write_all(packet)?;
                stream.flush()?;
                Ok(())
            }
            None => write_payload(stream, 0, self.buffer_set.payload()),
        }
    }

    fn read_packet(&mut self) -> Result<u8> {
        read_payload(&mut self.stream, &mut self.buffer_set.read_buffer)
    }
}

impl<S: Read + Write> RowSession for Conn<S> {
    type Buffer = PooledBuffer;

    fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        self.buffer_set
            .new_write_buffer()
            .extend_from_slice(payload);
        self.write_command()
    }

    fn next_row(
        &mut self,
        columns: &Arc<[ColumnDefinition]>,
        encoding: RowEncoding,
    ) -> Result<Option<BufferRow<PooledBuffer>>> {
        let mut buffer = self.buffer_pool.get_buffer();
        read_payload(&mut self.stream, &mut buffer)?;

        if buffer.first() == Some(&0xFF) {
            return Err(ErrPayloadBytes(buffer.as_slice()).into());
        }
        if is_row_terminator(&buffer, self.capability_flags) {
            self.status_flags = read_terminator_status(&buffer, self.capability_flags)?;
            trace!(status = ?self.status_flags, "end of rows");
            return Ok(None);
        }

        let row = BufferRow::new(buffer, encoding)?.with_columns(Arc::clone(columns))?;
        Ok(Some(row))
    }

    fn last_row_sent(&self) -> bool {
        self.status_flags
            .contains(StatusFlags::SERVER_STATUS_LAST_ROW_SENT)
    }
}

fn cursor_declined() -> Error {
    Error::NotSupported("The server did not open a cursor for this statement")
}

/// Read a complete MySQL payload, concatenating packets if they span multiple 16MB chunks.
///
/// Returns the sequence id of the first packet; the payload is stored in `buffer`.
#[tracing::instrument(skip_all)]
pub fn read_payload<R: BufRead>(reader: &mut R, buffer: &mut Vec<u8>) -> Result<u8> {
    buffer.clear();

    let mut header = PacketHeader::encode(0, 0);
    reader.read_exact(header.as_mut_bytes())?;
    let sequence_id = header.sequence_id;
    let mut length = header.length();
    trace!(length, sequence_id, "read packet");

    loop {
        let start = buffer.len();
        buffer.resize(start + length, 0);
        reader.read_exact(&mut buffer[start..])?;

        // A packet of exactly 16MB is continued by the next one
        if length != MAX_PACKET_PAYLOAD {
            return Ok(sequence_id);
        }
        reader.read_exact(header.as_mut_bytes())?;
        length = header.length();
    }
}

/// Write a MySQL payload, splitting it into 16MB chunks if necessary
///
/// `sequence_id` is the id of the first packet and increases with every chunk.
#[tracing::instrument(skip_all)]
pub fn write_payload<W: Write>(stream: &mut W, mut sequence_id: u8, payload: &[u8]) -> Result<()> {
    let mut remaining = payload;
    loop {
        let chunk_size = remaining.len().min(MAX_PACKET_PAYLOAD);
        let chunk;
        (chunk, remaining) = remaining.split_at(chunk_size);

        let header = PacketHeader::encode(chunk_size, sequence_id);
        stream.write_all(header.as_bytes())?;
        stream.write_all(chunk)?;
        sequence_id = sequence_id.wrapping_add(1);

        // A full chunk is always followed by another packet, possibly empty
        if chunk_size < MAX_PACKET_PAYLOAD {
            break;
        }
    }
    stream.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_payload_round_trip_small() {
        let mut wire = Vec::new();
        write_payload(&mut wire, 3, b"hello").unwrap();
        assert_eq!(wire, [5, 0, 0, 3, b'h', b'e', b'l', b'l', b'o']);

        let mut buffer = Vec::new();
        let seq = read_payload(&mut wire.as_slice(), &mut buffer).unwrap();
        assert_eq!(seq, 3);
        assert_eq!(buffer, b"hello");
    }

    #[test]
    fn test_payload_split_at_max_packet_size() {
        let payload = vec![0xAB; MAX_PACKET_PAYLOAD + 3];
        let mut wire = Vec::new();
        write_payload(&mut wire, 0, &payload).unwrap();
        // two headers
        assert_eq!(wire.len(), payload.len() + 8);
        assert_eq!(&wire[..4], &[0xFF, 0xFF, 0xFF, 0]);
        assert_eq!(
            &wire[4 + MAX_PACKET_PAYLOAD..8 + MAX_PACKET_PAYLOAD],
            &[3, 0, 0, 1]
        );

        let mut buffer = Vec::new();
        read_payload(&mut wire.as_slice(), &mut buffer).unwrap();
        assert_eq!(buffer.len(), payload.len());
    }

    #[test]
    fn test_payload_of_exactly_max_size_ends_with_empty_packet() {
        let payload = vec![1; MAX_PACKET_PAYLOAD];
        let mut wire = Vec::new();
        write_payload(&mut wire, 0, &payload).unwrap();
        assert_eq!(wire.len(), payload.len() + 8);
        assert_eq!(&wire[wire.len() - 4..], &[0, 0, 0, 1]);

        let mut buffer = Vec::new();
        read_payload(&mut wire.as_slice(), &mut buffer).unwrap();
        assert_eq!(buffer.len(), MAX_PACKET_PAYLOAD);
    }

    #[test]
    fn test_truncated_payload_is_an_io_error() {
        let wire = [5u8, 0, 0, 0, b'a'];
        let mut buffer = Vec::new();
        assert!(matches!(
            read_payload(&mut wire.as_slice(), &mut buffer),
            Err(Error::IoError(_))
        ));
    }
}
