//! 생성된 binlog 이벤트 열에 대한 재시작 / heartbeat 성질 테스트

use binlog_stream_reader::events::{
    CellValue, DataEvent, GtidEvent, HandlerEvent, OperationType, QueryEvent, RawEvent, RowValues,
};
use binlog_stream_reader::heartbeat::HEARTBEAT_DB;
use binlog_stream_reader::position::HeartbeatMark;
use binlog_stream_reader::{MemoryEventSource, Position, ReplicationHandlerEvent, Result, StreamReaderWrapper};
use proptest::prelude::*;
use std::collections::HashMap;

#[derive(Debug, Clone, Copy)]
enum Kind {
    Query,
    Data,
    Heartbeat,
}

fn kind() -> impl Strategy<Value = Kind> {
    prop_oneof![
        1 => Just(Kind::Query),
        4 => Just(Kind::Data),
        1 => Just(Kind::Heartbeat),
    ]
}

fn transactions() -> impl Strategy<Value = Vec<Vec<Kind>>> {
    prop::collection::vec(prop::collection::vec(kind(), 0..6), 1..6)
}

/// 모든 레코드는 한 파일 안에서 서로 다른 바이트 위치를 가짐
fn build(transactions: &[Vec<Kind>]) -> Vec<RawEvent> {
    let mut events = Vec::new();
    let mut counter = 0i64;
    for (i, txn) in transactions.iter().enumerate() {
        let log_pos = 10 * (events.len() as u64 + 1);
        events.push(RawEvent::Gtid(GtidEvent {
            gtid: format!("3e11fa47-71ca-11e1-9e33-c80aa9429562:{}", i + 1),
            log_file: "binlog.001".to_string(),
            log_pos,
        }));
        for kind in txn {
            counter += 1;
            let log_pos = 10 * (events.len() as u64 + 1);
            let event = match kind {
                Kind::Query => RawEvent::Query(QueryEvent {
                    schema: "yelp".to_string(),
                    query: format!("ALTER TABLE t{} ADD COLUMN c INT", counter),
                    timestamp: 0,
                    log_file: "binlog.001".to_string(),
                    log_pos,
                }),
                Kind::Data => row("yelp", "business", vec![("id", CellValue::Int64(counter))], log_pos),
                Kind::Heartbeat => row(
                    HEARTBEAT_DB,
                    "heartbeat",
                    vec![
                        ("serial", CellValue::Int64(counter)),
                        ("timestamp", CellValue::Int64(1445429127 + counter)),
                    ],
                    log_pos,
                ),
            };
            events.push(event);
        }
    }
    events
}

fn row(schema: &str, table: &str, values: Vec<(&str, CellValue)>, log_pos: u64) -> RawEvent {
    let after: HashMap<String, CellValue> = values.into_iter().map(|(k, v)| (k.to_string(), v)).collect();
    RawEvent::Data(DataEvent {
        schema: schema.to_string(),
        table: table.to_string(),
        operation: OperationType::Insert,
        row: RowValues {
            before_values: None,
            after_values: Some(after),
        },
        timestamp: 0,
        log_file: "binlog.001".to_string(),
        log_pos,
    })
}

fn record_pos(event: &RawEvent) -> u64 {
    match event {
        RawEvent::Gtid(e) => e.log_pos,
        RawEvent::Query(e) => e.log_pos,
        RawEvent::Data(e) => e.log_pos,
    }
}

/// 체크포인트에서 리더가 다시 시작하는 인덱스
fn replay_index(events: &[RawEvent], start: &Position) -> usize {
    events
        .iter()
        .position(|event| match (start, event) {
            (Position::Gtid(p), RawEvent::Gtid(e)) => e.gtid == p.gtid,
            (Position::Log(p), event) => record_pos(event) == p.log_pos,
            _ => false,
        })
        .expect("checkpoint transaction is in the log")
}

fn run_from_beginning(events: &[RawEvent], gtid_enabled: bool) -> Vec<ReplicationHandlerEvent> {
    StreamReaderWrapper::from_beginning(MemoryEventSource::new(events.to_vec()), gtid_enabled)
        .collect::<Result<_>>()
        .unwrap()
}

proptest! {
    #[test]
    fn resume_yields_exact_suffix(
        txns in transactions(),
        gtid_enabled in any::<bool>(),
        pick in any::<prop::sample::Index>()
    ) {
        let events = build(&txns);
        let full = run_from_beginning(&events, gtid_enabled);
        prop_assume!(!full.is_empty());

        let k = pick.index(full.len());
        let start = full[k].position.clone();

        let replay = events[replay_index(&events, &start)..].to_vec();
        let resumed: Vec<_> = StreamReaderWrapper::new(MemoryEventSource::new(replay), start, gtid_enabled)
            .unwrap()
            .collect::<Result<_>>()
            .unwrap();

        prop_assert_eq!(&resumed[..], &full[k + 1..]);
    }

    #[test]
    fn heartbeats_are_stripped_and_sticky(
        txns in transactions(),
        gtid_enabled in any::<bool>()
    ) {
        let events = build(&txns);
        let delivered = run_from_beginning(&events, gtid_enabled);

        let mut last: Option<HeartbeatMark> = None;
        let mut expected = Vec::new();
        for event in &events {
            match event {
                RawEvent::Data(data) if data.schema == HEARTBEAT_DB => {
                    let after = data.row.after_values.as_ref().unwrap();
                    last = Some(HeartbeatMark {
                        serial: after["serial"].as_i64().unwrap(),
                        timestamp: after["timestamp"].as_i64().unwrap(),
                    });
                }
                RawEvent::Gtid(_) => {}
                _ => expected.push(last),
            }
        }

        prop_assert_eq!(delivered.len(), expected.len());
        for (event, mark) in delivered.iter().zip(expected) {
            if let HandlerEvent::Data(data) = &event.event {
                prop_assert_ne!(data.schema.as_str(), HEARTBEAT_DB);
            }
            prop_assert_eq!(event.position.heartbeat(), mark);
        }
    }

    #[test]
    fn offsets_restart_at_each_boundary(txns in transactions()) {
        let events = build(&txns);
        let delivered = run_from_beginning(&events, true);

        // GTID 모드에서는 heartbeat 행도 오프셋을 차지
        let mut expected = Vec::new();
        for txn in &txns {
            for (offset, kind) in txn.iter().enumerate() {
                if !matches!(kind, Kind::Heartbeat) {
                    expected.push(offset as u64);
                }
            }
        }
        let offsets: Vec<_> = delivered.iter().map(|e| e.position.offset()).collect();
        prop_assert_eq!(offsets, expected);
    }
}
