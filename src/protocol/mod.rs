pub mod command;
pub mod packet;
pub mod primitive;
pub mod response;
pub mod r#trait;
pub mod value;

pub use r#trait::{RowSession, ValueFactory};
pub use value::{NullBitmap, StrFactory, Value, ValueDecoder};
