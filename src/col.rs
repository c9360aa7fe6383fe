use crate::constant::{BinaryLength, ColumnFlags, ColumnType};

/// Column definition from MySQL protocol
///
/// The type id is kept as sent by the server so that an unknown id can still be
/// reported when a binary row refers to it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnDefinition {
    pub schema: String,
    pub table: String,
    pub org_table: String,
    pub name: String,
    pub org_name: String,
    pub charset: u16,
    pub column_length: u32,
    pub type_id: u8,
    pub flags: ColumnFlags,
    pub decimals: u8,
}

impl ColumnDefinition {
    /// A nameless column of the given type
    pub fn with_type(column_type: ColumnType) -> Self {
        Self::with_type_id(column_type as u8)
    }

    pub fn with_type_id(type_id: u8) -> Self {
        Self {
            schema: String::new(),
            table: String::new(),
            org_table: String::new(),
            name: String::new(),
            org_name: String::new(),
            charset: 63,
            column_length: 0,
            type_id,
            flags: ColumnFlags::empty(),
            decimals: 0,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn flagged(mut self, flags: ColumnFlags) -> Self {
        self.flags = flags;
        self
    }

    pub fn column_type(&self) -> Option<ColumnType> {
        ColumnType::from_u8(self.type_id)
    }

    pub fn binary_length(&self) -> BinaryLength {
        self.column_type()
            .map_or(BinaryLength::Unsupported, ColumnType::binary_length)
    }

    pub fn is_unsigned(&self) -> bool {
        self.flags.contains(ColumnFlags::UNSIGNED_FLAG)
    }
}
