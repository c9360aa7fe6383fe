pub mod buffer;
pub mod buffer_pool;
pub mod col;
pub mod constant;
mod cursor;
pub mod error;
mod opts;
pub mod protocol;
pub mod row;
pub mod sync;

#[cfg(test)]
mod buffer_test;
#[cfg(test)]
mod cursor_test;

pub use buffer::BufferSet;
pub use cursor::CursorRows;
pub use opts::{CursorOpts, FetchSize};
pub use row::{BufferRow, ByteArrayRow, Row, RowEncoding};
