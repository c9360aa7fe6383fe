mod conn;

pub use conn::{Conn, read_payload, write_payload};
