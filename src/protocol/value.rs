/// MySQL Binary Protocol Value Types
use crate::col::ColumnDefinition;
use crate::constant::{BinaryLength, ColumnType};
use crate::error::{Error, Result, eyre};
use crate::protocol::primitive::*;
use crate::protocol::r#trait::ValueFactory;
use crate::row::RowEncoding;
use simdutf8::basic::from_utf8;
use zerocopy::byteorder::little_endian::{U16 as U16LE, U32 as U32LE};
use zerocopy::{FromBytes, Immutable, KnownLayout};

#[derive(Debug, Clone, Copy)]
pub enum Value<'a> {
    /// NULL value
    Null,
    /// Signed integer (TINYINT, SMALLINT, INT, BIGINT)
    SignedInt(i64),
    /// Unsigned integer (TINYINT UNSIGNED, SMALLINT UNSIGNED, INT UNSIGNED, BIGINT UNSIGNED)
    UnsignedInt(u64),
    /// FLOAT - 4-byte floating point
    Float(f32),
    /// DOUBLE - 8-byte floating point
    Double(f64),
    /// DATE/DATETIME/TIMESTAMP - 0 bytes (0000-00-00 00:00:00)
    Timestamp0,
    /// DATE/DATETIME/TIMESTAMP - 4 bytes (ymd)
    Timestamp4(&'a Timestamp4),
    /// DATE/DATETIME/TIMESTAMP - 7 bytes (ymd + hms)
    Timestamp7(&'a Timestamp7),
    /// DATE/DATETIME/TIMESTAMP - 11 bytes (ymd + hms + microseconds)
    Timestamp11(&'a Timestamp11),
    /// TIME - 0 bytes (00:00:00)
    Time0,
    /// TIME - 8 bytes (without microseconds)
    Time8(&'a Time8),
    /// TIME - 12 bytes (with microseconds)
    Time12(&'a Time12),
    /// Text protocol values, and BLOB, STRING, DECIMAL, JSON, .. in the binary protocol
    Bytes(&'a [u8]),
}

impl<'a> Value<'a> {
    /// Decode the payload of one binary protocol column
    ///
    /// `data` holds exactly the column's bytes, without the length prefix of
    /// length-encoded types.
    pub fn parse_binary(column: &ColumnDefinition, data: &'a [u8]) -> Result<Self> {
        let is_unsigned = column.is_unsigned();
        let column_type = column.column_type().ok_or_else(|| {
            Error::LibraryBug(eyre!("unknown column type: 0x{:02X}", column.type_id))
        })?;

        match column_type {
            ColumnType::MYSQL_TYPE_NULL => Ok(Value::Null),

            ColumnType::MYSQL_TYPE_TINY => {
                let (val, _) = read_int_1(data)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i8))
                })
            }

            ColumnType::MYSQL_TYPE_SHORT | ColumnType::MYSQL_TYPE_YEAR => {
                let (val, _) = read_int_2(data)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i16))
                })
            }

            ColumnType::MYSQL_TYPE_INT24 | ColumnType::MYSQL_TYPE_LONG => {
                let (val, _) = read_int_4(data)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(u64::from(val))
                } else {
                    Value::SignedInt(i64::from(val as i32))
                })
            }

            ColumnType::MYSQL_TYPE_LONGLONG => {
                let (val, _) = read_int_8(data)?;
                Ok(if is_unsigned {
                    Value::UnsignedInt(val)
                } else {
                    Value::SignedInt(val as i64)
                })
            }

            ColumnType::MYSQL_TYPE_FLOAT => {
                let (val, _) = read_int_4(data)?;
                Ok(Value::Float(f32::from_bits(val)))
            }

            ColumnType::MYSQL_TYPE_DOUBLE => {
                let (val, _) = read_int_8(data)?;
                Ok(Value::Double(f64::from_bits(val)))
            }

            ColumnType::MYSQL_TYPE_DATE
            | ColumnType::MYSQL_TYPE_DATETIME
            | ColumnType::MYSQL_TYPE_TIMESTAMP => match data.len() {
                0 => Ok(Value::Timestamp0),
                4 => Ok(Value::Timestamp4(
                    Timestamp4::ref_from_bytes(data).map_err(Error::from_debug)?,
                )),
                7 => Ok(Value::Timestamp7(
                    Timestamp7::ref_from_bytes(data).map_err(Error::from_debug)?,
                )),
                11 => Ok(Value::Timestamp11(
                    Timestamp11::ref_from_bytes(data).map_err(Error::from_debug)?,
                )),
                len => Err(Error::LibraryBug(eyre!("invalid timestamp length: {}", len))),
            },

            ColumnType::MYSQL_TYPE_TIME => match data.len() {
                0 => Ok(Value::Time0),
                8 => Ok(Value::Time8(
                    Time8::ref_from_bytes(data).map_err(Error::from_debug)?,
                )),
                12 => Ok(Value::Time12(
                    Time12::ref_from_bytes(data).map_err(Error::from_debug)?,
                )),
                len => Err(Error::LibraryBug(eyre!("invalid time length: {}", len))),
            },

            other => match other.binary_length() {
                BinaryLength::LengthEncoded => Ok(Value::Bytes(data)),
                _ => Err(Error::LibraryBug(eyre!(
                    "no binary decoding for column type {:?}",
                    other
                ))),
            },
        }
    }
}

/// Value factory producing [`Value`]
///
/// Text protocol columns are handed out as [`Value::Bytes`].
#[derive(Debug, Default, Clone, Copy)]
pub struct ValueDecoder;

impl<'buf> ValueFactory<'buf> for ValueDecoder {
    type Output = Value<'buf>;

    fn create_from_null(&mut self, _column: &ColumnDefinition) -> Result<Self::Output> {
        Ok(Value::Null)
    }

    fn create_from_bytes(
        &mut self,
        column: &ColumnDefinition,
        encoding: RowEncoding,
        bytes: &'buf [u8],
    ) -> Result<Self::Output> {
        match encoding {
            RowEncoding::Text => Ok(Value::Bytes(bytes)),
            RowEncoding::Binary => Value::parse_binary(column, bytes),
        }
    }
}

/// Value factory borrowing string columns as `&str`
#[derive(Debug, Default, Clone, Copy)]
pub struct StrFactory;

impl<'buf> ValueFactory<'buf> for StrFactory {
    type Output = Option<&'buf str>;

    fn create_from_null(&mut self, _column: &ColumnDefinition) -> Result<Self::Output> {
        Ok(None)
    }

    fn create_from_bytes(
        &mut self,
        column: &ColumnDefinition,
        encoding: RowEncoding,
        bytes: &'buf [u8],
    ) -> Result<Self::Output> {
        if encoding == RowEncoding::Binary
            && !matches!(column.binary_length(), BinaryLength::LengthEncoded)
        {
            return Err(Error::BadUsageError(format!(
                "Cannot decode binary column `{}` of type 0x{:02X} to &str",
                column.name, column.type_id
            )));
        }
        from_utf8(bytes).map(Some).map_err(|_| {
            Error::BadUsageError(format!("Column `{}` is not valid UTF-8", column.name))
        })
    }
}

// ============================================================================
// Temporal Types
// ============================================================================

/// TIMESTAMP - 4 bytes (DATE/DATETIME/TIMESTAMP with date only)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp4 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
}

impl Timestamp4 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 7 bytes (DATE/DATETIME/TIMESTAMP without microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp7 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Timestamp7 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }
}

/// TIMESTAMP - 11 bytes (DATE/DATETIME/TIMESTAMP with microseconds)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Timestamp11 {
    pub year: U16LE,
    pub month: u8,
    pub day: u8,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Timestamp11 {
    pub fn year(&self) -> u16 {
        self.year.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

/// TIME - 8 bytes
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time8 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
}

impl Time8 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }
}

/// TIME - 12 bytes: is_negative (1), days (4 LE), hour (1), minute (1), second (1), microsecond (4 LE)
#[repr(C, packed)]
#[derive(Debug, Clone, Copy, FromBytes, KnownLayout, Immutable)]
pub struct Time12 {
    pub is_negative: u8,
    pub days: U32LE,
    pub hour: u8,
    pub minute: u8,
    pub second: u8,
    pub microsecond: U32LE,
}

impl Time12 {
    pub fn is_negative(&self) -> bool {
        self.is_negative != 0
    }

    pub fn days(&self) -> u32 {
        self.days.get()
    }

    pub fn microsecond(&self) -> u32 {
        self.microsecond.get()
    }
}

// ============================================================================
// NULL Bitmap
// ============================================================================

/// NULL bitmap for binary protocol
///
/// In MySQL binary protocol, NULL values are indicated by a bitmap where each bit
/// represents whether a column is NULL (1 = NULL, 0 = not NULL).
///
/// For result sets the first two bits are reserved, so column 0 lives in bit 2
/// (mask `4`) of the first byte.
/// For prepared statement parameters, the offset is 0 bits.
#[derive(Debug, Clone, Copy)]
pub struct NullBitmap<'a> {
    bitmap: &'a [u8],
    offset: usize,
}

impl<'a> NullBitmap<'a> {
    /// Number of bitmap bytes in a binary result set row with `num_columns` columns
    pub fn result_set_len(num_columns: usize) -> usize {
        (num_columns + 7 + 2) >> 3
    }

    /// Create a NULL bitmap for result sets (offset = 2)
    pub fn for_result_set(bitmap: &'a [u8]) -> Self {
        Self { bitmap, offset: 2 }
    }

    /// Check if the column at the given index is NULL
    pub fn is_null(&self, idx: usize) -> bool {
        let bit_pos = idx + self.offset;
        let byte_pos = bit_pos >> 3;
        let bit_offset = bit_pos & 7;

        match self.bitmap.get(byte_pos) {
            Some(byte) => (byte & (1 << bit_offset)) != 0,
            None => false,
        }
    }

    /// Get the raw bitmap bytes
    pub fn as_bytes(&self) -> &'a [u8] {
        self.bitmap
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constant::ColumnFlags;

    fn col(column_type: ColumnType) -> ColumnDefinition {
        ColumnDefinition::with_type(column_type)
    }

    #[test]
    fn test_value_parse_signed_integers() {
        let value = Value::parse_binary(&col(ColumnType::MYSQL_TYPE_TINY), &[214u8]).unwrap();
        assert!(matches!(value, Value::SignedInt(-42)));

        let value = Value::parse_binary(&col(ColumnType::MYSQL_TYPE_SHORT), &[0x18, 0xFC]).unwrap();
        assert!(matches!(value, Value::SignedInt(-1000)));

        let value =
            Value::parse_binary(&col(ColumnType::MYSQL_TYPE_LONG), &[0x60, 0x79, 0xFE, 0xFF])
                .unwrap();
        assert!(matches!(value, Value::SignedInt(-100000)));
    }

    #[test]
    fn test_value_parse_unsigned_integers() {
        let tiny = col(ColumnType::MYSQL_TYPE_TINY).flagged(ColumnFlags::UNSIGNED_FLAG);
        let value = Value::parse_binary(&tiny, &[200_u8]).unwrap();
        assert!(matches!(value, Value::UnsignedInt(200)));

        let bigint = col(ColumnType::MYSQL_TYPE_LONGLONG).flagged(ColumnFlags::UNSIGNED_FLAG);
        let data = u64::MAX.to_le_bytes();
        let value = Value::parse_binary(&bigint, &data).unwrap();
        assert!(matches!(value, Value::UnsignedInt(u64::MAX)));
    }

    #[test]
    fn test_value_parse_double() {
        let data = std::f64::consts::PI.to_le_bytes();
        let value = Value::parse_binary(&col(ColumnType::MYSQL_TYPE_DOUBLE), &data).unwrap();
        if let Value::Double(d) = value {
            assert!((d - std::f64::consts::PI).abs() < 0.0000001);
        } else {
            panic!("Expected Double value");
        }
    }

    #[test]
    fn test_value_parse_timestamp() {
        let datetime = col(ColumnType::MYSQL_TYPE_DATETIME);

        let value = Value::parse_binary(&datetime, &[]).unwrap();
        assert!(matches!(value, Value::Timestamp0));

        let mut data = Vec::new();
        data.extend_from_slice(&2024u16.to_le_bytes());
        data.extend_from_slice(&[12, 25, 15, 30, 45]);
        let value = Value::parse_binary(&datetime, &data).unwrap();
        if let Value::Timestamp7(ts) = value {
            assert_eq!(ts.year(), 2024);
            assert_eq!(ts.month, 12);
            assert_eq!(ts.day, 25);
            assert_eq!(ts.second, 45);
        } else {
            panic!("Expected Timestamp7 value");
        }

        assert!(Value::parse_binary(&datetime, &[1, 2, 3]).is_err());
    }

    #[test]
    fn test_value_parse_time() {
        let time = col(ColumnType::MYSQL_TYPE_TIME);
        let mut data = vec![1u8];
        data.extend_from_slice(&3u32.to_le_bytes());
        data.extend_from_slice(&[10, 20, 30]);
        data.extend_from_slice(&500u32.to_le_bytes());
        let value = Value::parse_binary(&time, &data).unwrap();
        if let Value::Time12(t) = value {
            assert!(t.is_negative());
            assert_eq!(t.days(), 3);
            assert_eq!(t.hour, 10);
            assert_eq!(t.microsecond(), 500);
        } else {
            panic!("Expected Time12 value");
        }
    }

    #[test]
    fn test_str_factory() {
        let varchar = col(ColumnType::MYSQL_TYPE_VAR_STRING).named("name");
        let mut factory = StrFactory;
        assert_eq!(
            factory
                .create_from_bytes(&varchar, RowEncoding::Binary, b"hello")
                .unwrap(),
            Some("hello")
        );
        assert!(
            factory
                .create_from_bytes(&varchar, RowEncoding::Text, &[0xFF, 0xFE])
                .is_err()
        );

        let int = col(ColumnType::MYSQL_TYPE_LONG);
        assert!(
            factory
                .create_from_bytes(&int, RowEncoding::Binary, &[1, 0, 0, 0])
                .is_err()
        );
        assert_eq!(
            factory
                .create_from_bytes(&int, RowEncoding::Text, b"1")
                .unwrap(),
            Some("1")
        );
    }

    #[test]
    fn test_null_bitmap_result_set_offset() {
        // columns 0 and 6 are NULL: bits 2 and 8
        let bitmap = [0b0000_0100, 0b0000_0001];
        let bitmap = NullBitmap::for_result_set(&bitmap);
        assert!(bitmap.is_null(0));
        assert!(!bitmap.is_null(1));
        assert!(!bitmap.is_null(5));
        assert!(bitmap.is_null(6));
        assert!(!bitmap.is_null(7));
        assert!(!bitmap.is_null(100));
    }

    #[test]
    fn test_null_bitmap_len() {
        assert_eq!(NullBitmap::result_set_len(0), 1);
        assert_eq!(NullBitmap::result_set_len(6), 1);
        assert_eq!(NullBitmap::result_set_len(7), 2);
        assert_eq!(NullBitmap::result_set_len(14), 2);
        assert_eq!(NullBitmap::result_set_len(15), 3);
    }
}
