use std::collections::VecDeque;
use std::sync::Arc;

use pretty_assertions::assert_eq;

use crate::col::ColumnDefinition;
use crate::constant::ColumnType;
use crate::cursor::CursorRows;
use crate::error::{Error, Result};
use crate::opts::{CursorOpts, FetchSize};
use crate::protocol::r#trait::RowSession;
use crate::protocol::value::{Value, ValueDecoder};
use crate::row::{BufferRow, Row, RowEncoding};

const STATEMENT_ID: u32 = 7;

/// Server side of a cursor holding `total` BIGINT rows numbered from 0
#[derive(Default)]
struct FakeSession {
    pending: VecDeque<Vec<u8>>,
    batch: VecDeque<Vec<u8>>,
    commands: Vec<Vec<u8>>,
    last_row_sent: bool,
    withhold_last_row: bool,
    fail_next_command: bool,
}

impl FakeSession {
    fn with_rows(total: u64) -> Self {
        Self {
            pending: (0..total).map(binary_row).collect(),
            ..Default::default()
        }
    }

    fn requested_counts(&self) -> Vec<u32> {
        self.commands
            .iter()
            .map(|command| u32::from_le_bytes([command[5], command[6], command[7], command[8]]))
            .collect()
    }
}

fn binary_row(value: u64) -> Vec<u8> {
    // header, 1-byte NULL bitmap, BIGINT
    let mut packet = vec![0x00, 0x00];
    packet.extend_from_slice(&value.to_le_bytes());
    packet
}

impl RowSession for FakeSession {
    type Buffer = Vec<u8>;

    fn send_command(&mut self, payload: &[u8]) -> Result<()> {
        if self.fail_next_command {
            self.fail_next_command = false;
            return Err(Error::IoError(std::io::Error::new(
                std::io::ErrorKind::BrokenPipe,
                "connection reset",
            )));
        }
        self.commands.push(payload.to_vec());
        let count = u32::from_le_bytes([payload[5], payload[6], payload[7], payload[8]]);
        for _ in 0..count {
            match self.pending.pop_front() {
                Some(row) => self.batch.push_back(row),
                None => break,
            }
        }
        self.last_row_sent = self.pending.is_empty() && !self.withhold_last_row;
        Ok(())
    }

    fn next_row(
        &mut self,
        columns: &Arc<[ColumnDefinition]>,
        encoding: RowEncoding,
    ) -> Result<Option<BufferRow<Vec<u8>>>> {
        match self.batch.pop_front() {
            Some(packet) => Ok(Some(
                BufferRow::new(packet, encoding)?.with_columns(Arc::clone(columns))?,
            )),
            None => Ok(None),
        }
    }

    fn last_row_sent(&self) -> bool {
        self.last_row_sent
    }
}

fn columns() -> Arc<[ColumnDefinition]> {
    Arc::from(vec![
        ColumnDefinition::with_type(ColumnType::MYSQL_TYPE_LONGLONG).named("id"),
    ])
}

fn cursor(fetch_size: FetchSize) -> CursorRows<Vec<u8>> {
    let opts = CursorOpts {
        fetch_size,
        ..Default::default()
    };
    CursorRows::new(STATEMENT_ID, columns(), opts)
}

fn row_id(row: &BufferRow<Vec<u8>>) -> i64 {
    match row.get_value(0, &mut ValueDecoder).unwrap() {
        Value::SignedInt(id) => id,
        other => panic!("unexpected value {other:?}"),
    }
}

fn collect_ids(cursor: &mut CursorRows<Vec<u8>>, session: &mut FakeSession) -> Vec<i64> {
    let mut ids = Vec::new();
    while let Some(row) = cursor.next(session).unwrap() {
        ids.push(row_id(row));
    }
    ids
}

#[test]
fn test_pages_through_all_rows() {
    let mut session = FakeSession::with_rows(120);
    let mut rows = cursor(FetchSize::Rows(50));

    let ids = collect_ids(&mut rows, &mut session);
    assert_eq!(ids, (0..120).collect::<Vec<_>>());
    assert_eq!(session.requested_counts(), [50, 50, 50]);
    assert_eq!(
        session.commands[0],
        [0x1C, STATEMENT_ID as u8, 0, 0, 0, 50, 0, 0, 0]
    );

    assert!(rows.is_after_last());
    assert!(rows.next(&mut session).unwrap().is_none());
    assert!(!rows.has_next(&mut session).unwrap());
    assert_eq!(session.commands.len(), 3);
}

#[test]
fn test_exact_multiple_stops_on_last_row_flag() {
    let mut session = FakeSession::with_rows(100);
    let mut rows = cursor(FetchSize::Rows(50));

    assert_eq!(collect_ids(&mut rows, &mut session).len(), 100);
    assert_eq!(session.commands.len(), 2);
}

#[test]
fn test_empty_result() {
    let mut session = FakeSession::with_rows(0);
    let mut rows = cursor(FetchSize::Rows(10));

    assert!(rows.is_before_first());
    assert!(!rows.has_next(&mut session).unwrap());
    assert!(rows.is_empty());
    assert!(!rows.is_before_first());

    assert!(rows.next(&mut session).unwrap().is_none());
    assert!(!rows.is_after_last());
    assert_eq!(rows.current_row_number(), 0);
    assert_eq!(session.commands.len(), 1);
}

#[test]
fn test_empty_batch_without_last_row_flag_is_not_an_empty_result() {
    let mut session = FakeSession {
        withhold_last_row: true,
        ..Default::default()
    };
    let mut rows = cursor(FetchSize::Rows(10));

    assert!(!rows.has_next(&mut session).unwrap());
    assert!(!rows.is_empty());
    assert!(!rows.is_last());
    assert!(!rows.has_next(&mut session).unwrap());
    assert_eq!(session.commands.len(), 1);
}

#[test]
fn test_has_next_does_not_refetch() {
    let mut session = FakeSession::with_rows(5);
    let mut rows = cursor(FetchSize::Rows(2));

    for _ in 0..3 {
        assert!(rows.has_next(&mut session).unwrap());
    }
    assert_eq!(session.commands.len(), 1);
    assert!(rows.is_before_first());
}

#[test]
fn test_positional_predicates() {
    let mut session = FakeSession::with_rows(3);
    let mut rows = cursor(FetchSize::Rows(2));
    assert!(rows.is_before_first());
    assert!(!rows.is_first());

    rows.next(&mut session).unwrap().unwrap();
    assert!(rows.is_first());
    assert!(!rows.is_before_first());
    assert!(!rows.is_last());
    assert_eq!(rows.current_row_number(), 1);

    // end of the first batch, but the server still has rows
    rows.next(&mut session).unwrap().unwrap();
    assert!(!rows.is_first());
    assert!(!rows.is_last());
    assert_eq!(rows.current_row_number(), 2);

    rows.next(&mut session).unwrap().unwrap();
    assert!(rows.is_last());
    assert_eq!(rows.current_row_number(), 3);

    assert!(!rows.has_next(&mut session).unwrap());
    assert!(rows.is_last());

    assert!(rows.next(&mut session).unwrap().is_none());
    assert!(rows.is_after_last());
    assert!(!rows.is_last());
    assert!(!rows.is_empty());
    assert_eq!(rows.current_row_number(), 0);
}

#[test]
fn test_unset_fetch_sizes_fetch_one_row() {
    let mut session = FakeSession::with_rows(3);
    let mut rows = cursor(FetchSize::Unset);

    assert_eq!(collect_ids(&mut rows, &mut session), [0, 1, 2]);
    assert_eq!(session.requested_counts(), [1, 1, 1]);
}

#[test]
fn test_statement_fetch_size_applies_when_result_size_unset() {
    let mut session = FakeSession::with_rows(7);
    let opts = CursorOpts {
        statement_fetch_size: FetchSize::Rows(4),
        ..Default::default()
    };
    let mut rows = CursorRows::new(STATEMENT_ID, columns(), opts);

    assert_eq!(collect_ids(&mut rows, &mut session).len(), 7);
    assert_eq!(session.requested_counts(), [4, 4]);
}

#[test]
fn test_row_by_row_fetches_single_rows() {
    let mut session = FakeSession::with_rows(2);
    let mut rows = cursor(FetchSize::RowByRow);

    assert_eq!(collect_ids(&mut rows, &mut session), [0, 1]);
    assert_eq!(session.requested_counts(), [1, 1]);
}

#[test]
fn test_max_rows_caps_the_result() {
    let mut session = FakeSession::with_rows(10);
    let opts = CursorOpts {
        fetch_size: FetchSize::Rows(4),
        max_rows: Some(5),
        ..Default::default()
    };
    let mut rows = CursorRows::new(STATEMENT_ID, columns(), opts);

    assert_eq!(collect_ids(&mut rows, &mut session), [0, 1, 2, 3, 4]);
    assert_eq!(session.requested_counts(), [4, 1]);
    assert!(rows.is_after_last());
}

#[test]
fn test_next_after_close() {
    let mut session = FakeSession::with_rows(3);
    let mut rows = cursor(FetchSize::Rows(3));
    rows.next(&mut session).unwrap().unwrap();

    rows.close();
    rows.close();
    assert!(rows.is_closed());
    assert!(rows.columns().is_none());
    assert!(matches!(rows.next(&mut session), Err(Error::ResultSetClosed)));
    assert!(!rows.has_next(&mut session).unwrap());

    let mut untouched = cursor(FetchSize::Rows(3));
    untouched.close();
    assert!(untouched.next(&mut session).unwrap().is_none());
    assert_eq!(session.commands.len(), 1);
}

#[test]
fn test_failed_fetch_is_wrapped_and_state_kept() {
    let mut session = FakeSession::with_rows(4);
    let mut rows = cursor(FetchSize::Rows(2));
    assert_eq!(row_id(rows.next(&mut session).unwrap().unwrap()), 0);
    assert_eq!(row_id(rows.next(&mut session).unwrap().unwrap()), 1);

    session.fail_next_command = true;
    match rows.next(&mut session) {
        Err(Error::FetchFailed {
            statement_id,
            source,
        }) => {
            assert_eq!(statement_id, STATEMENT_ID);
            assert!(matches!(*source, Error::IoError(_)));
        }
        other => panic!("expected FetchFailed, got {other:?}"),
    }
    assert_eq!(rows.current_row_number(), 2);

    assert_eq!(row_id(rows.next(&mut session).unwrap().unwrap()), 2);
    assert_eq!(row_id(rows.next(&mut session).unwrap().unwrap()), 3);
    assert!(rows.next(&mut session).unwrap().is_none());
}

#[test]
fn test_rows_carry_metadata() {
    let mut session = FakeSession::with_rows(1);
    let mut rows = cursor(FetchSize::Rows(1));
    let row = rows.next(&mut session).unwrap().unwrap();
    assert_eq!(row.num_columns(), 1);
    assert_eq!(row.length(0).unwrap(), 8);
    assert!(!row.is_null(0).unwrap());
}

#[test]
fn test_for_each_row_visits_every_row() {
    let mut session = FakeSession::with_rows(25);
    let mut rows = cursor(FetchSize::Rows(10));

    let mut sum = 0;
    rows.for_each_row(&mut session, |row| {
        sum += row_id(row);
        Ok(())
    })
    .unwrap();
    assert_eq!(sum, (0..25).sum::<i64>());
    assert_eq!(session.commands.len(), 3);
}

#[test]
fn test_for_each_row_stops_on_callback_error() {
    let mut session = FakeSession::with_rows(5);
    let mut rows = cursor(FetchSize::Rows(5));

    let mut seen = 0;
    let result = rows.for_each_row(&mut session, |_| {
        seen += 1;
        if seen == 2 {
            Err(Error::BadUsageError("stop".to_string()))
        } else {
            Ok(())
        }
    });
    assert!(matches!(result, Err(Error::BadUsageError(_))));
    assert_eq!(seen, 2);
    assert_eq!(rows.current_row_number(), 2);
}

#[test]
fn test_boxed_session_is_a_session() {
    let mut session: Box<FakeSession> = Box::new(FakeSession::with_rows(2));
    let mut rows = cursor(FetchSize::Rows(2));
    assert!(rows.next(&mut session).unwrap().is_some());
    assert!(rows.next(&mut session).unwrap().is_some());
    assert!(rows.next(&mut session).unwrap().is_none());
}
