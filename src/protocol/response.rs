use crate::constant::{CapabilityFlags, StatusFlags};
use crate::error::{Error, Result};
use crate::protocol::packet::{ErrPayloadBytes, OkPayloadBytes};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::U16 as U16LE;
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// OK packet response
#[derive(Debug, Clone)]
pub struct OkPayload {
    pub affected_rows: u64,
    pub last_insert_id: u64,
    pub status_flags: StatusFlags,
    pub warnings: u16,
}

impl TryFrom<OkPayloadBytes<'_>> for OkPayload {
    type Error = Error;

    fn try_from(bytes: OkPayloadBytes<'_>) -> Result<Self> {
        let payload = bytes.bytes();
        let (header, data) = read_int_1(payload)?;
        if header != 0x00 && header != 0xFE {
            return Err(Error::InvalidPacket);
        }

        let (affected_rows, rest) = read_int_lenenc(data)?;
        let (last_insert_id, rest) = read_int_lenenc(rest)?;
        let (status_flags, rest) = read_int_2(rest)?;
        let (warnings, _rest) = read_int_2(rest)?;

        Ok(OkPayload {
            affected_rows,
            last_insert_id,
            status_flags: StatusFlags::from_bits_truncate(status_flags),
            warnings,
        })
    }
}

/// ERR packet response
#[derive(Debug, Clone, thiserror::Error)]
#[error("ERROR {} ({}): {}", self.error_code, self.sql_state, self.message)]
pub struct ErrPayload {
    pub error_code: u16,
    pub sql_state: String,
    pub message: String,
}

impl TryFrom<ErrPayloadBytes<'_>> for ErrPayload {
    type Error = Error;

    fn try_from(bytes: ErrPayloadBytes<'_>) -> Result<Self> {
        let payload = bytes.0;
        let (header, mut data) = read_int_1(payload)?;
        if header != 0xFF {
            return Err(Error::InvalidPacket);
        }

        let (error_code, rest) = read_int_2(data)?;
        data = rest;

        // Check for SQL state marker '#'
        let (sql_state, rest) = if data.first() == Some(&b'#') {
            let (state_bytes, rest) = read_string_fix(&data[1..], 5)?;
            (String::from_utf8_lossy(state_bytes).to_string(), rest)
        } else {
            (String::new(), data)
        };

        let message = String::from_utf8_lossy(rest).to_string();

        Ok(ErrPayload {
            error_code,
            sql_state,
            message,
        })
    }
}

/// EOF packet response (zero-copy)
///
/// Layout matches MySQL wire protocol after header byte 0xFE:
/// - warnings: 2 bytes (little-endian)
/// - status_flags: 2 bytes (little-endian)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct EofPacket {
    pub warnings: U16LE,
    pub status_flags: U16LE,
}

impl EofPacket {
    pub fn status_flags(&self) -> StatusFlags {
        StatusFlags::from_bits_truncate(self.status_flags.get())
    }
}

/// Read EOF packet (header byte 0xFE, length < 9) - zero-copy
pub fn read_eof_packet(payload: &[u8]) -> Result<&EofPacket> {
    let (header, data) = read_int_1(payload)?;
    if header != 0xFE {
        return Err(Error::InvalidPacket);
    }

    if data.len() < 4 {
        return Err(Error::UnexpectedEof);
    }

    EofPacket::ref_from_bytes(&data[..4]).map_err(|_| Error::InvalidPacket)
}

/// Whether `payload` ends a row stream rather than carrying a row
///
/// Without `CLIENT_DEPRECATE_EOF` the terminator is a short EOF packet. With it, an OK
/// packet with a 0xFE header takes its place, which can only be told apart from a text
/// row starting with an 8-byte length by its size.
pub fn is_row_terminator(payload: &[u8], capabilities: CapabilityFlags) -> bool {
    if payload.first() != Some(&0xFE) {
        return false;
    }
    if capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        payload.len() < MAX_TERMINATOR_LEN
    } else {
        payload.len() < 9
    }
}

const MAX_TERMINATOR_LEN: usize = 0xFFFFFF;

/// Server status carried by a row stream terminator
pub fn read_terminator_status(payload: &[u8], capabilities: CapabilityFlags) -> Result<StatusFlags> {
    if capabilities.contains(CapabilityFlags::CLIENT_DEPRECATE_EOF) {
        Ok(OkPayload::try_from(OkPayloadBytes(payload))?.status_flags)
    } else {
        Ok(read_eof_packet(payload)?.status_flags())
    }
}
