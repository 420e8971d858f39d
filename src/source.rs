//! 원본 이벤트 소스
//!
//! 코어는 `peek` 으로 이벤트를 들여다보고 건너뛸지 전달할지 결정한 뒤에야 `pop` 합니다.
//! 한 번 읽은 데이터를 되돌릴 수 없는 전송 계층 위에서도 커서가 보존됩니다.

use crate::error::{CdcError, Result};
use crate::events::*;
use crate::gtid::Gtid;
use crate::position::ReplicationStart;
use std::collections::{HashMap, VecDeque};
use tokio::sync::mpsc;
use tracing::{debug, trace};

/// peek/pop 프로토콜
pub trait RawEventSource {
    /// 다음 이벤트를 소비하지 않고 확인. 소진되면 `CdcError::EndOfStream`
    fn peek(&mut self) -> Result<&RawEvent>;

    /// 직전에 `peek` 한 이벤트를 소비
    fn pop(&mut self) -> Result<RawEvent>;
}

impl<S: RawEventSource + ?Sized> RawEventSource for Box<S> {
    fn peek(&mut self) -> Result<&RawEvent> {
        (**self).peek()
    }

    fn pop(&mut self) -> Result<RawEvent> {
        (**self).pop()
    }
}

/// 메모리에 올려둔 이벤트 목록 (재생, 테스트용)
#[derive(Debug, Clone, Default)]
pub struct MemoryEventSource {
    events: VecDeque<RawEvent>,
}

impl MemoryEventSource {
    pub fn new(events: impl IntoIterator<Item = RawEvent>) -> Self {
        MemoryEventSource {
            events: events.into_iter().collect(),
        }
    }

    pub fn remaining(&self) -> usize {
        self.events.len()
    }
}

impl RawEventSource for MemoryEventSource {
    fn peek(&mut self) -> Result<&RawEvent> {
        self.events.front().ok_or(CdcError::EndOfStream)
    }

    fn pop(&mut self) -> Result<RawEvent> {
        self.events.pop_front().ok_or(CdcError::EndOfStream)
    }
}

/// 백그라운드 binlog 읽기 태스크의 채널을 블로킹 이터레이터로 변환
///
/// 송신 측이 모두 닫히면 끝납니다. tokio 런타임 스레드 안에서 호출하면 안 됩니다
/// (`spawn_blocking` 등에서 사용).
pub struct ChannelEvents {
    rx: mpsc::UnboundedReceiver<Result<BinlogEvent>>,
}

impl ChannelEvents {
    pub fn new(rx: mpsc::UnboundedReceiver<Result<BinlogEvent>>) -> Self {
        ChannelEvents { rx }
    }
}

impl Iterator for ChannelEvents {
    type Item = Result<BinlogEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        self.rx.blocking_recv()
    }
}

/// 파서가 만든 binlog 이벤트를 행 단위 원본 이벤트로 펼치는 소스
///
/// - ROTATE: 현재 binlog 파일명 변경
/// - TABLE_MAP: table_id → 스키마/테이블/컬럼명 등록
/// - WRITE/UPDATE/DELETE_ROWS: 행마다 `DataEvent` 하나
/// - QUERY: BEGIN/COMMIT 은 버리고 나머지는 `QueryEvent`
/// - GTID: 트랜잭션 경계
pub struct BinlogEventSource<I> {
    events: I,
    log_file: String,
    table_maps: HashMap<u64, TableMapData>,
    pending: VecDeque<RawEvent>,
    /// 아직 도달하지 않은 시작 지점
    start: Option<ReplicationStart>,
}

impl<I> BinlogEventSource<I>
where
    I: Iterator<Item = Result<BinlogEvent>>,
{
    /// `log_file` 은 리더가 시작하는 binlog 파일명 (ROTATE 가 오면 바뀜)
    pub fn new(events: I, log_file: impl Into<String>) -> Self {
        BinlogEventSource {
            events,
            log_file: log_file.into(),
            table_maps: HashMap::new(),
            pending: VecDeque::new(),
            start: None,
        }
    }

    /// `start` 에 도달하기 전의 레코드를 버림
    ///
    /// 서버에 위치를 지정해 접속한 것처럼 덤프를 재생할 때 씁니다.
    /// ROTATE / TABLE_MAP 은 버리는 구간에서도 반영합니다.
    pub fn starting_at(mut self, start: ReplicationStart) -> Self {
        self.start = Some(start);
        self
    }

    pub fn log_file(&self) -> &str {
        &self.log_file
    }

    /// 행 단위 이벤트가 하나 이상 준비될 때까지 읽기
    fn fill(&mut self) -> Result<()> {
        while self.pending.is_empty() {
            match self.events.next() {
                Some(event) => self.expand(event?)?,
                None => return Err(CdcError::EndOfStream),
            }
        }
        Ok(())
    }

    fn expand(&mut self, event: BinlogEvent) -> Result<()> {
        let log_pos = event.header.log_pos();
        let timestamp = event.header.timestamp;

        match &event.data {
            BinlogEventData::Rotate(_) | BinlogEventData::TableMap(_) => {}
            _ if !self.reached(&event) => {
                trace!("Skipping record before replication start at {}:{}", self.log_file, log_pos);
                return Ok(());
            }
            _ => {}
        }

        match event.data {
            BinlogEventData::Rotate(rotate) => {
                debug!("Rotate to {}:{}", rotate.next_binlog_name, rotate.position);
                self.log_file = rotate.next_binlog_name;
            }
            BinlogEventData::TableMap(table_map) => {
                trace!(
                    "Table map {} -> {}.{}",
                    table_map.table_id,
                    table_map.database,
                    table_map.table
                );
                self.table_maps.insert(table_map.table_id, table_map);
            }
            BinlogEventData::Gtid(gtid) => {
                self.pending.push_back(RawEvent::Gtid(GtidEvent {
                    gtid: gtid.gtid,
                    log_file: self.log_file.clone(),
                    log_pos,
                }));
            }
            BinlogEventData::Query(query) => {
                if is_transaction_control(&query.query) {
                    return Ok(());
                }
                self.pending.push_back(RawEvent::Query(QueryEvent {
                    schema: query.database,
                    query: query.query,
                    timestamp,
                    log_file: self.log_file.clone(),
                    log_pos,
                }));
            }
            BinlogEventData::WriteRows(rows) => {
                let table = self.table(rows.table_id)?.clone();
                let events: Vec<_> = rows
                    .rows
                    .iter()
                    .map(|row| RowValues {
                        before_values: None,
                        after_values: Some(zip_columns(&table, row)),
                    })
                    .collect();
                self.push_rows(&table, OperationType::Insert, events, timestamp, log_pos);
            }
            BinlogEventData::UpdateRows(rows) => {
                let table = self.table(rows.table_id)?.clone();
                let events: Vec<_> = rows
                    .rows
                    .iter()
                    .map(|(before, after)| RowValues {
                        before_values: Some(zip_columns(&table, before)),
                        after_values: Some(zip_columns(&table, after)),
                    })
                    .collect();
                self.push_rows(&table, OperationType::Update, events, timestamp, log_pos);
            }
            BinlogEventData::DeleteRows(rows) => {
                let table = self.table(rows.table_id)?.clone();
                let events: Vec<_> = rows
                    .rows
                    .iter()
                    .map(|row| RowValues {
                        before_values: Some(zip_columns(&table, row)),
                        after_values: None,
                    })
                    .collect();
                self.push_rows(&table, OperationType::Delete, events, timestamp, log_pos);
            }
            BinlogEventData::RowsQuery(_) | BinlogEventData::Unknown(_) => {}
        }
        Ok(())
    }

    fn reached(&mut self, event: &BinlogEvent) -> bool {
        let reached = match &self.start {
            None => return true,
            Some(ReplicationStart::LogFile { log_file, log_pos }) => {
                *log_file == self.log_file && event.header.log_pos() >= *log_pos
            }
            // 실행 완료 집합에 없는 첫 트랜잭션부터
            Some(ReplicationStart::AutoPosition(executed)) => match &event.data {
                BinlogEventData::Gtid(gtid) => match gtid.gtid.parse::<Gtid>() {
                    Ok(gtid) => !gtid.is_executed_in(executed),
                    Err(_) => true,
                },
                _ => false,
            },
        };
        if reached {
            debug!("Reached replication start at {}:{}", self.log_file, event.header.log_pos());
            self.start = None;
        }
        reached
    }

    fn table(&self, table_id: u64) -> Result<&TableMapData> {
        self.table_maps
            .get(&table_id)
            .ok_or_else(|| CdcError::InvalidEvent(format!("Row event for unmapped table id {}", table_id)))
    }

    fn push_rows(
        &mut self,
        table: &TableMapData,
        operation: OperationType,
        rows: Vec<RowValues>,
        timestamp: u32,
        log_pos: u64,
    ) {
        for row in rows {
            self.pending.push_back(RawEvent::Data(DataEvent {
                schema: table.database.clone(),
                table: table.table.clone(),
                operation,
                row,
                timestamp,
                log_file: self.log_file.clone(),
                log_pos,
            }));
        }
    }
}

impl<I> RawEventSource for BinlogEventSource<I>
where
    I: Iterator<Item = Result<BinlogEvent>>,
{
    fn peek(&mut self) -> Result<&RawEvent> {
        self.fill()?;
        self.pending.front().ok_or(CdcError::EndOfStream)
    }

    fn pop(&mut self) -> Result<RawEvent> {
        self.fill()?;
        self.pending.pop_front().ok_or(CdcError::EndOfStream)
    }
}

fn is_transaction_control(query: &str) -> bool {
    let statement = query.trim().trim_end_matches(';').trim();
    statement.eq_ignore_ascii_case("BEGIN") || statement.eq_ignore_ascii_case("COMMIT")
}

/// 컬럼명과 값을 묶음 (값이 모자라면 남는 컬럼은 생략)
fn zip_columns(table: &TableMapData, values: &[CellValue]) -> RowMap {
    table
        .column_names
        .iter()
        .zip(values.iter())
        .map(|(name, value)| (name.clone(), value.clone()))
        .collect()
}
