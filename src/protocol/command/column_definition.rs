use crate::col::ColumnDefinition;
use crate::constant::ColumnFlags;
use crate::error::{Error, Result, eyre};
use crate::protocol::primitive::*;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

/// Represents a payload part of a column definition packet
#[derive(Debug, Clone, Copy)]
pub struct ColumnDefinitionBytes<'a>(pub &'a [u8]);

impl<'a> ColumnDefinitionBytes<'a> {
    /// Get a reference to the fixed-size tail of the column definition
    ///
    /// The tail is always the last 12 bytes of the column definition packet
    pub fn tail(&self) -> Result<&'a ColumnDefinitionTail> {
        if self.0.len() < 12 {
            return Err(Error::LibraryBug(eyre!(
                "column definition too short: {} < 12",
                self.0.len()
            )));
        }
        let tail_bytes = &self.0[self.0.len() - 12..];
        ColumnDefinitionTail::ref_from_bytes(tail_bytes).map_err(Error::from_debug)
    }
}

impl TryFrom<ColumnDefinitionBytes<'_>> for ColumnDefinition {
    type Error = Error;

    fn try_from(bytes: ColumnDefinitionBytes<'_>) -> Result<Self> {
        let data = bytes.0;

        // ─── Variable Length String Fields ───────────────────────────
        let (_catalog, data) = read_string_lenenc(data)?;
        let (schema, data) = read_string_lenenc(data)?;
        let (table, data) = read_string_lenenc(data)?;
        let (org_table, data) = read_string_lenenc(data)?;
        let (name, data) = read_string_lenenc(data)?;
        let (org_name, data) = read_string_lenenc(data)?;

        // ─── Column Definition Tail ──────────────────────────────────
        // length is always 0x0c
        let (_length, data) = read_int_lenenc(data)?;
        let (tail, _) = read_string_fix(data, 12)?;
        let tail = ColumnDefinitionTail::ref_from_bytes(tail).map_err(Error::from_debug)?;

        Ok(Self {
            schema: String::from_utf8_lossy(schema).into_owned(),
            table: String::from_utf8_lossy(table).into_owned(),
            org_table: String::from_utf8_lossy(org_table).into_owned(),
            name: String::from_utf8_lossy(name).into_owned(),
            org_name: String::from_utf8_lossy(org_name).into_owned(),
            charset: tail.charset(),
            column_length: tail.column_length(),
            type_id: tail.type_id(),
            flags: tail.flags(),
            decimals: tail.decimals(),
        })
    }
}

/// Fixed-size tail of Column Definition packet (12 bytes)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct ColumnDefinitionTail {
    charset: U16LE,
    column_length: U32LE,
    column_type: u8,
    flags: U16LE,
    decimals: u8,
    reserved: U16LE,
}

impl ColumnDefinitionTail {
    pub fn charset(&self) -> u16 {
        self.charset.get()
    }

    pub fn column_length(&self) -> u32 {
        self.column_length.get()
    }

    /// Raw type id; unknown ids are resolved lazily by the row decoder
    pub fn type_id(&self) -> u8 {
        self.column_type
    }

    pub fn flags(&self) -> ColumnFlags {
        ColumnFlags::from_bits_truncate(self.flags.get())
    }

    pub fn decimals(&self) -> u8 {
        self.decimals
    }
}
