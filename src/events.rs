//! MySQL Binlog 이벤트 타입 및 데이터 구조 정의
//!
//! 세 계층으로 나뉩니다:
//! - `BinlogEvent`: 파서가 만들어 주는 binlog 이벤트 (여러 행을 담을 수 있음)
//! - `RawEvent`: 코어가 소비하는 행 단위 이벤트 (트랜잭션 경계, 스키마 구문, 행 변경)
//! - `ReplicationHandlerEvent`: 위치가 붙어 하류로 전달되는 이벤트

use crate::position::Position;
use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Binlog 이벤트 헤더
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventHeader {
    /// 이벤트 타임스탬프 (초 단위)
    pub timestamp: u32,
    /// MySQL 서버 ID
    pub server_id: u32,
    /// 이벤트 길이 (바이트)
    pub event_length: u32,
    /// 다음 이벤트 위치
    pub next_pos: u64,
}

impl EventHeader {
    /// 이 이벤트 레코드가 시작하는 바이트 위치
    pub fn log_pos(&self) -> u64 {
        self.next_pos.saturating_sub(self.event_length as u64)
    }
}

/// 테이블 맵 정보
///
/// 컬럼명은 optional metadata (binlog_row_metadata=FULL) 또는 스키마 추적기에서 채워집니다.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TableMapData {
    /// 테이블 ID
    pub table_id: u64,
    /// 데이터베이스명
    pub database: String,
    /// 테이블명
    pub table: String,
    /// 컬럼명들
    pub column_names: Vec<String>,
}

/// WRITE_ROWS 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WriteRowsData {
    pub table_id: u64,
    pub rows: Vec<Vec<CellValue>>,
}

/// UPDATE_ROWS 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UpdateRowsData {
    pub table_id: u64,
    /// 변경 전후 데이터 쌍들
    pub rows: Vec<(Vec<CellValue>, Vec<CellValue>)>,
}

/// DELETE_ROWS 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeleteRowsData {
    pub table_id: u64,
    pub rows: Vec<Vec<CellValue>>,
}

/// 셀 값 (다양한 MySQL 타입 지원)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CellValue {
    Null,
    Int8(i8),
    Int16(i16),
    Int32(i32),
    Int64(i64),
    UInt8(u8),
    UInt16(u16),
    UInt32(u32),
    UInt64(u64),
    Float(f32),
    Double(f64),
    String(String),
    Bytes(Vec<u8>),
    DateTime(DateTime<Utc>),
    Date(String),
    Time(String),
    Decimal(String),
    Json(serde_json::Value),
}

impl CellValue {
    /// 정수형 값을 i64 로 변환
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            CellValue::Int8(v) => Some(*v as i64),
            CellValue::Int16(v) => Some(*v as i64),
            CellValue::Int32(v) => Some(*v as i64),
            CellValue::Int64(v) => Some(*v),
            CellValue::UInt8(v) => Some(*v as i64),
            CellValue::UInt16(v) => Some(*v as i64),
            CellValue::UInt32(v) => Some(*v as i64),
            CellValue::UInt64(v) => i64::try_from(*v).ok(),
            _ => None,
        }
    }

    /// 시간 값을 unix 초로 변환
    ///
    /// DATETIME/TIMESTAMP 값, 정수 epoch 초, "YYYY-MM-DD HH:MM:SS" 또는 RFC 3339 문자열을 받습니다.
    /// 타임존이 없는 문자열은 UTC 로 간주합니다.
    pub fn as_unix_timestamp(&self) -> Option<i64> {
        match self {
            CellValue::DateTime(dt) => Some(dt.timestamp()),
            CellValue::String(s) => DateTime::parse_from_rfc3339(s)
                .map(|dt| dt.timestamp())
                .or_else(|_| {
                    NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
                        .map(|naive| naive.and_utc().timestamp())
                })
                .ok(),
            other => other.as_i64(),
        }
    }
}

/// GTID 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtidEventData {
    /// GTID 문자열 (format: uuid:sequence-number)
    pub gtid: String,
}

/// 쿼리 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEventData {
    /// 스레드 ID
    pub thread_id: u32,
    /// 실행 시간 (초)
    pub exec_time: u32,
    /// 데이터베이스명
    pub database: String,
    /// 쿼리 문자열
    pub query: String,
}

/// 회전 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RotateEventData {
    /// 새 바이너리 로그 파일명
    pub next_binlog_name: String,
    /// 새 파일의 시작 위치
    pub position: u64,
}

/// 파서가 만들어 주는 Binlog 이벤트 데이터
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum BinlogEventData {
    TableMap(TableMapData),
    WriteRows(WriteRowsData),
    UpdateRows(UpdateRowsData),
    DeleteRows(DeleteRowsData),
    Query(QueryEventData),
    Rotate(RotateEventData),
    Gtid(GtidEventData),
    RowsQuery(String),
    Unknown(Vec<u8>),
}

/// 완성된 Binlog 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BinlogEvent {
    /// 이벤트 헤더
    pub header: EventHeader,
    /// 이벤트 데이터
    pub data: BinlogEventData,
}

/// 변경 연산 타입
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationType {
    Insert,
    Update,
    Delete,
}

impl OperationType {
    pub fn as_str(&self) -> &'static str {
        match self {
            OperationType::Insert => "INSERT",
            OperationType::Update => "UPDATE",
            OperationType::Delete => "DELETE",
        }
    }
}

/// 컬럼명 → 값
pub type RowMap = HashMap<String, CellValue>;

/// 한 행의 변경 전후 값
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RowValues {
    /// 변경 전 데이터 (UPDATE/DELETE)
    pub before_values: Option<RowMap>,
    /// 변경 후 데이터 (INSERT/UPDATE)
    pub after_values: Option<RowMap>,
}

/// 트랜잭션 경계 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtidEvent {
    pub gtid: String,
    pub log_file: String,
    /// 경계 레코드의 바이트 위치
    pub log_pos: u64,
}

/// 스키마 구문 (DDL) 이벤트
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryEvent {
    /// 구문이 실행된 데이터베이스
    pub schema: String,
    pub query: String,
    pub timestamp: u32,
    pub log_file: String,
    pub log_pos: u64,
}

/// 한 행의 변경 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DataEvent {
    pub schema: String,
    pub table: String,
    pub operation: OperationType,
    pub row: RowValues,
    pub timestamp: u32,
    pub log_file: String,
    pub log_pos: u64,
}

/// 코어가 소비하는 행 단위 원본 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum RawEvent {
    Gtid(GtidEvent),
    Query(QueryEvent),
    Data(DataEvent),
}

impl RawEvent {
    pub fn kind(&self) -> &'static str {
        match self {
            RawEvent::Gtid(_) => "gtid",
            RawEvent::Query(_) => "query",
            RawEvent::Data(_) => "data",
        }
    }
}

/// 하류로 전달되는 이벤트 본문
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HandlerEvent {
    Data(DataEvent),
    Query(QueryEvent),
}

/// 위치가 붙은 정규화 이벤트
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReplicationHandlerEvent {
    pub event: HandlerEvent,
    pub position: Position,
}
