use crate::constant::{CommandByte, CursorType};
use crate::error::{Error, Result};
use crate::protocol::primitive::*;
use crate::protocol::packet::{ErrPayloadBytes, OkPayloadBytes};

/// Write COM_STMT_EXECUTE for a statement without parameters, asking the server to keep
/// the result in a cursor
pub fn write_execute_cursor(out: &mut Vec<u8>, statement_id: u32, cursor_type: CursorType) {
    write_int_1(out, CommandByte::StmtExecute as u8);
    write_int_4(out, statement_id);
    write_int_1(out, cursor_type.bits());
    // iteration count (4 bytes) - always 1
    write_int_4(out, 1);
}

/// Write COM_STMT_FETCH command
///
/// Layout: command byte, statement id (4 bytes LE), number of rows (4 bytes LE)
pub fn write_fetch(out: &mut Vec<u8>, statement_id: u32, num_rows: u32) {
    write_int_1(out, CommandByte::StmtFetch as u8);
    write_int_4(out, statement_id);
    write_int_4(out, num_rows);
}

/// Write COM_STMT_CLOSE command
pub fn write_close_statement(out: &mut Vec<u8>, statement_id: u32) {
    write_int_1(out, CommandByte::StmtClose as u8);
    write_int_4(out, statement_id);
}

/// Read COM_STMT_EXECUTE response
/// This can be either an OK packet or a result set
pub fn read_execute_response(payload: &[u8]) -> Result<ExecuteResponse<'_>> {
    match payload.first() {
        None => Err(Error::InvalidPacket),
        Some(0x00) => Ok(ExecuteResponse::Ok(OkPayloadBytes(payload))),
        Some(0xFF) => Err(ErrPayloadBytes(payload).into()),
        Some(_) => {
            let (column_count, _rest) = read_int_lenenc(payload)?;
            Ok(ExecuteResponse::ResultSet { column_count })
        }
    }
}

/// Execute response variants
#[derive(Debug)]
pub enum ExecuteResponse<'a> {
    Ok(OkPayloadBytes<'a>),
    ResultSet { column_count: u64 },
}
