//! Heartbeat 행 인식 및 지연 메타데이터 추출
//!
//! heartbeat 데몬은 예약된 스키마의 테이블에 주기적으로 (serial, timestamp) 행을 씁니다.
//! 이 행들은 하류로 전달되지 않고, 이후 위치의 hb_serial/hb_timestamp 로만 남습니다.

use crate::error::{CdcError, Result};
use crate::events::DataEvent;
use crate::position::HeartbeatMark;

/// heartbeat 행이 기록되는 예약 스키마 (대소문자 구분)
pub const HEARTBEAT_DB: &str = "yelp_heartbeat";

#[derive(Debug, Clone)]
pub struct HeartbeatExtractor {
    schema: String,
}

impl Default for HeartbeatExtractor {
    fn default() -> Self {
        HeartbeatExtractor {
            schema: HEARTBEAT_DB.to_string(),
        }
    }
}

impl HeartbeatExtractor {
    pub fn is_heartbeat(&self, event: &DataEvent) -> bool {
        event.schema == self.schema
    }

    /// heartbeat 행이면 메타데이터를 반환, 아니면 None
    ///
    /// heartbeat 스키마인데 serial/timestamp 가 없으면 에러입니다.
    pub fn extract(&self, event: &DataEvent) -> Result<Option<HeartbeatMark>> {
        if !self.is_heartbeat(event) {
            return Ok(None);
        }

        let after = event.row.after_values.as_ref().ok_or_else(|| {
            CdcError::MalformedHeartbeat(format!(
                "{}.{} at {}:{} has no after_values",
                event.schema, event.table, event.log_file, event.log_pos
            ))
        })?;

        let serial = after
            .get("serial")
            .and_then(|v| v.as_i64())
            .ok_or_else(|| missing_field(event, "serial"))?;
        let timestamp = after
            .get("timestamp")
            .and_then(|v| v.as_unix_timestamp())
            .ok_or_else(|| missing_field(event, "timestamp"))?;

        Ok(Some(HeartbeatMark { serial, timestamp }))
    }
}

fn missing_field(event: &DataEvent, field: &str) -> CdcError {
    CdcError::MalformedHeartbeat(format!(
        "{}.{} at {}:{} is missing {}",
        event.schema, event.table, event.log_file, event.log_pos, field
    ))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{CellValue, OperationType, RowValues};
    use chrono::{TimeZone, Utc};
    use std::collections::HashMap;

    fn row_event(schema: &str, after: Option<Vec<(&str, CellValue)>>) -> DataEvent {
        DataEvent {
            schema: schema.to_string(),
            table: "heartbeat".to_string(),
            operation: OperationType::Update,
            row: RowValues {
                before_values: None,
                after_values: after.map(|cols| {
                    cols.into_iter()
                        .map(|(k, v)| (k.to_string(), v))
                        .collect::<HashMap<_, _>>()
                }),
            },
            timestamp: 0,
            log_file: "binlog.001".to_string(),
            log_pos: 10,
        }
    }

    #[test]
    fn test_extract_heartbeat() {
        let ts = Utc.timestamp_opt(1445429127, 0).unwrap();
        let event = row_event(
            HEARTBEAT_DB,
            Some(vec![("serial", CellValue::Int64(123)), ("timestamp", CellValue::DateTime(ts))]),
        );
        let mark = HeartbeatExtractor::default().extract(&event).unwrap();
        assert_eq!(mark, Some(HeartbeatMark { serial: 123, timestamp: 1445429127 }));
    }

    #[test]
    fn test_regular_row_is_not_heartbeat() {
        let extractor = HeartbeatExtractor::default();
        assert_eq!(extractor.extract(&row_event("yelp", None)).unwrap(), None);
        // 스키마 이름은 대소문자를 구분
        assert_eq!(extractor.extract(&row_event("Yelp_Heartbeat", None)).unwrap(), None);
    }

    #[test]
    fn test_malformed_heartbeat() {
        let extractor = HeartbeatExtractor::default();

        let no_row = row_event(HEARTBEAT_DB, None);
        assert!(matches!(extractor.extract(&no_row), Err(CdcError::MalformedHeartbeat(_))));

        let no_timestamp = row_event(HEARTBEAT_DB, Some(vec![("serial", CellValue::Int64(1))]));
        assert!(matches!(extractor.extract(&no_timestamp), Err(CdcError::MalformedHeartbeat(_))));

        let bad_serial = row_event(
            HEARTBEAT_DB,
            Some(vec![
                ("serial", CellValue::String("x".to_string())),
                ("timestamp", CellValue::Int64(1)),
            ]),
        );
        assert!(matches!(extractor.extract(&bad_serial), Err(CdcError::MalformedHeartbeat(_))));
    }
}
