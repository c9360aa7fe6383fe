use zerocopy::{FromBytes, Immutable, IntoBytes, KnownLayout};

use crate::error::{Error, Result};
use crate::protocol::primitive::*;

/// Largest payload carried by a single packet; longer payloads continue in the next packet
pub const MAX_PACKET_PAYLOAD: usize = 0xFFFFFF;

/// MySQL packet header (zero-copy)
///
/// Layout matches MySQL wire protocol:
/// - length: 3 bytes (little-endian, payload length)
/// - sequence_id: 1 byte
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable, IntoBytes)]
pub struct PacketHeader {
    pub length: [u8; 3],
    pub sequence_id: u8,
}

impl PacketHeader {
    pub fn encode(length: usize, sequence_id: u8) -> Self {
        let len = u32::to_le_bytes(length as u32);
        Self {
            length: [len[0], len[1], len[2]],
            sequence_id,
        }
    }

    pub fn length(&self) -> usize {
        u32::from_le_bytes([self.length[0], self.length[1], self.length[2], 0]) as usize
    }
}

/// A read position inside one packet payload
///
/// Every read returns the value together with the advanced cursor, so the position
/// a caller continues from is always explicit. The position never leaves `0..=len`.
#[derive(Debug, Clone, Copy)]
pub struct PacketCursor<'a> {
    data: &'a [u8],
    position: usize,
}

impl<'a> PacketCursor<'a> {
    pub fn new(data: &'a [u8]) -> Self {
        Self { data, position: 0 }
    }

    /// Cursor at an explicit position
    pub fn at(data: &'a [u8], position: usize) -> Result<Self> {
        if position > data.len() {
            return Err(Error::UnexpectedEof);
        }
        Ok(Self { data, position })
    }

    pub fn position(&self) -> usize {
        self.position
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Bytes from the current position to the end of the packet
    pub fn remaining(&self) -> &'a [u8] {
        &self.data[self.position..]
    }

    fn advanced_to(self, rest: &'a [u8]) -> Self {
        Self {
            data: self.data,
            position: self.data.len() - rest.len(),
        }
    }

    pub fn read_int_1(self) -> Result<(u8, Self)> {
        let (value, rest) = read_int_1(self.remaining())?;
        Ok((value, self.advanced_to(rest)))
    }

    /// Read a length-encoded integer; `None` is the NULL marker
    pub fn read_lenenc(self) -> Result<(Option<u64>, Self)> {
        let (value, rest) = read_lenenc_length(self.remaining())?;
        Ok((value, self.advanced_to(rest)))
    }

    pub fn read_fixed(self, len: usize) -> Result<(&'a [u8], Self)> {
        let (value, rest) = read_string_fix(self.remaining(), len)?;
        Ok((value, self.advanced_to(rest)))
    }

    /// Read a length-prefixed byte run; `None` is the NULL marker
    pub fn read_lenenc_bytes(self) -> Result<(Option<&'a [u8]>, Self)> {
        let (value, rest) = read_nullable_string_lenenc(self.remaining())?;
        Ok((value, self.advanced_to(rest)))
    }

    pub fn skip(self, len: usize) -> Result<Self> {
        self.read_fixed(len).map(|(_, cursor)| cursor)
    }

    /// Skip a length-prefixed byte run without looking at its payload
    pub fn skip_lenenc_bytes(self) -> Result<Self> {
        match self.read_lenenc()? {
            (Some(len), cursor) if len > 0 => cursor.skip(to_usize(len)?),
            (_, cursor) => Ok(cursor),
        }
    }
}

/// OK packet payload (minimal header only)
///
/// Layout: 0x00 (or 0xFE when it replaces EOF) followed by variable-length fields:
/// - affected_rows: length-encoded integer
/// - last_insert_id: length-encoded integer
/// - status_flags: 2 bytes
/// - warnings: 2 bytes
/// - info: variable-length string
#[derive(Debug)]
pub struct OkPayloadBytes<'a>(pub &'a [u8]);

impl<'a> OkPayloadBytes<'a> {
    pub fn bytes(&self) -> &[u8] {
        self.0
    }
}

#[derive(Debug)]
pub struct ErrPayloadBytes<'a>(pub &'a [u8]);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_packet_header_round_trip() {
        let header = PacketHeader::encode(0x123456, 7);
        assert_eq!(header.as_bytes(), &[0x56, 0x34, 0x12, 7]);
        assert_eq!(header.length(), 0x123456);
    }

    #[test]
    fn test_cursor_reads_advance_by_consumed_bytes() {
        let data = [0x02, b'h', b'i', 0xFB, 0x00, 0xAA, 0xBB];
        let cursor = PacketCursor::new(&data);

        let (value, cursor) = cursor.read_lenenc_bytes().unwrap();
        assert_eq!(value, Some(&b"hi"[..]));
        assert_eq!(cursor.position(), 3);

        let (value, cursor) = cursor.read_lenenc_bytes().unwrap();
        assert_eq!(value, None);
        assert_eq!(cursor.position(), 4);

        let (value, cursor) = cursor.read_lenenc_bytes().unwrap();
        assert_eq!(value, Some(&b""[..]));
        assert_eq!(cursor.position(), 5);

        let (value, cursor) = cursor.read_fixed(2).unwrap();
        assert_eq!(value, &[0xAA, 0xBB]);
        assert_eq!(cursor.position(), data.len());
        assert!(cursor.remaining().is_empty());
    }

    #[test]
    fn test_cursor_skip_lenenc_bytes() {
        let data = [0x03, 1, 2, 3, 0xFB, 0x00, 0x09];
        let cursor = PacketCursor::new(&data).skip_lenenc_bytes().unwrap();
        assert_eq!(cursor.position(), 4);
        let cursor = cursor.skip_lenenc_bytes().unwrap();
        assert_eq!(cursor.position(), 5);
        let cursor = cursor.skip_lenenc_bytes().unwrap();
        assert_eq!(cursor.position(), 6);
    }

    #[test]
    fn test_cursor_rejects_reads_past_end() {
        let data = [0x05, 1, 2];
        assert!(matches!(
            PacketCursor::new(&data).skip_lenenc_bytes(),
            Err(Error::UnexpectedEof)
        ));
        assert!(PacketCursor::at(&data, 3).is_ok());
        assert!(matches!(
            PacketCursor::at(&data, 4),
            Err(Error::UnexpectedEof)
        ));
        let cursor = PacketCursor::at(&data, 3).unwrap();
        assert!(matches!(cursor.read_int_1(), Err(Error::UnexpectedEof)));
    }
}
