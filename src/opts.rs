use smart_default::SmartDefault;

use crate::error::{Error, Result};

/// Rows requested per `COM_STMT_FETCH`
#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault)]
pub enum FetchSize {
    /// Fall back to the next configured size
    #[default]
    Unset,
    Rows(u32),
    /// The legacy streaming request; pages one row at a time
    RowByRow,
}

impl FetchSize {
    /// Raw value that requests row-by-row streaming
    pub const ROW_BY_ROW: i64 = i32::MIN as i64;

    /// Interpret a raw fetch size: `0` is unset, [`FetchSize::ROW_BY_ROW`] streams
    /// row by row and other negative values are rejected.
    pub fn from_raw(raw: i64) -> Result<Self> {
        match raw {
            0 => Ok(Self::Unset),
            Self::ROW_BY_ROW => Ok(Self::RowByRow),
            n if n < 0 => Err(Error::BadConfigError(format!(
                "Fetch size must not be negative: {}",
                n
            ))),
            n => u32::try_from(n)
                .map(Self::Rows)
                .map_err(|e| Error::BadConfigError(format!("Fetch size {} too large: {}", n, e))),
        }
    }

    fn rows(self) -> Option<u32> {
        match self {
            Self::Unset => None,
            Self::Rows(n) => Some(n),
            Self::RowByRow => Some(1),
        }
    }
}

/// A configuration for cursor-backed result sets
///
/// ```rs
/// let mut opts1 = CursorOpts::default();
/// opts1.fetch_size = FetchSize::Rows(500);
///
/// let opts2 = CursorOpts::try_from("mysql://localhost/db?fetch_size=100&max_rows=1000")?;
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, SmartDefault)]
pub struct CursorOpts {
    /// Rows per fetch set on the result set
    pub fetch_size: FetchSize,

    /// Rows per fetch set on the statement; used when `fetch_size` is unset
    pub statement_fetch_size: FetchSize,

    /// Stop after this many rows even if the server has more
    #[default(None)]
    pub max_rows: Option<u64>,
}

impl CursorOpts {
    /// Number of rows to request with each `COM_STMT_FETCH`
    pub fn rows_per_fetch(&self) -> u32 {
        let size = match self.fetch_size {
            FetchSize::Unset => self.statement_fetch_size,
            size => size,
        };
        size.rows().unwrap_or(1)
    }
}

impl TryFrom<&str> for CursorOpts {
    type Error = Error;

    fn try_from(url: &str) -> Result<Self> {
        // Parse URL
        let parsed = url::Url::parse(url)
            .map_err(|e| Error::BadConfigError(format!("Failed to parse MySQL URL: {}", e)))?;

        // Verify scheme
        if parsed.scheme() != "mysql" {
            return Err(Error::BadConfigError(format!(
                "Invalid URL scheme '{}', expected 'mysql'",
                parsed.scheme()
            )));
        }

        let mut opts = Self::default();
        for (key, value) in parsed.query_pairs() {
            match key.as_ref() {
                "fetch_size" => opts.fetch_size = FetchSize::from_raw(parse_i64(&key, &value)?)?,
                "statement_fetch_size" => {
                    opts.statement_fetch_size = FetchSize::from_raw(parse_i64(&key, &value)?)?;
                }
                // 0 means no limit
                "max_rows" => opts.max_rows = Some(parse_u64(&key, &value)?).filter(|&n| n > 0),
                _ => {
                    return Err(Error::BadConfigError(format!(
                        "Unknown query parameter '{}'",
                        key
                    )));
                }
            }
        }
        Ok(opts)
    }
}

fn parse_i64(key: &str, value: &str) -> Result<i64> {
    value.parse().map_err(|_| {
        Error::BadConfigError(format!(
            "Invalid integer value '{}' for parameter '{}'",
            value, key
        ))
    })
}

fn parse_u64(key: &str, value: &str) -> Result<u64> {
    value.parse().map_err(|_| {
        Error::BadConfigError(format!(
            "Invalid unsigned integer value '{}' for parameter '{}'",
            value, key
        ))
    })
}
