mod column_definition;
pub mod prepared;


pub use column_definition::ColumnDefinitionBytes;
pub use column_definition::ColumnDefinitionTail;
