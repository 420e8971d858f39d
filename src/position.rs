//! Binlog 처리 위치 (재시작 가능한 체크포인트)
//!
//! 두 가지 표현을 사용합니다:
//! - GTID 기반: "uuid:N" 트랜잭션 + 트랜잭션 내 오프셋
//! - 파일 기반: binlog 파일명 + 경계 레코드의 바이트 위치 + 그 이후 오프셋
//!
//! 두 표현 모두 heartbeat 에서 얻은 지연 메타데이터 (hb_serial, hb_timestamp) 를 가집니다.
//! 한 스트림에서는 설정 (gtid_enabled) 에 따라 한 가지 표현만 사용합니다.

use crate::error::{CdcError, Result};
use crate::gtid::Gtid;
use serde::{Deserialize, Serialize};
use std::fmt;

/// heartbeat 행에서 얻은 지연 모니터링 정보
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct HeartbeatMark {
    pub serial: i64,
    /// unix 초
    pub timestamp: i64,
}

/// GTID 기반 위치
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct GtidPosition {
    pub gtid: String,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_serial: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_timestamp: Option<i64>,
}

impl GtidPosition {
    pub fn new(gtid: impl Into<String>, offset: u64) -> Self {
        GtidPosition {
            gtid: gtid.into(),
            offset,
            hb_serial: None,
            hb_timestamp: None,
        }
    }
}

/// 파일 기반 위치
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogPosition {
    /// 바이너리 로그 파일명 (e.g., "mysql-bin.000001")
    pub log_file: String,
    /// 경계 레코드의 바이트 위치
    pub log_pos: u64,
    pub offset: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_serial: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub hb_timestamp: Option<i64>,
}

impl LogPosition {
    pub fn new(log_file: impl Into<String>, log_pos: u64, offset: u64) -> Self {
        LogPosition {
            log_file: log_file.into(),
            log_pos,
            offset,
            hb_serial: None,
            hb_timestamp: None,
        }
    }
}

/// 재시작 가능한 위치
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Position {
    Gtid(GtidPosition),
    Log(LogPosition),
}

/// 트랜잭션 식별자 (위치의 굵은 단위)
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TransactionId {
    Gtid(String),
    Log { log_file: String, log_pos: u64 },
}

impl TransactionId {
    /// `other` 보다 확실히 앞선 트랜잭션이면 true
    ///
    /// 같은 서버 uuid 의 GTID 끼리, 또는 같은 binlog 파일 안에서만 비교할 수 있습니다.
    /// 비교할 수 없으면 false.
    pub fn precedes(&self, other: &TransactionId) -> bool {
        match (self, other) {
            (TransactionId::Gtid(a), TransactionId::Gtid(b)) => {
                match (a.parse::<Gtid>(), b.parse::<Gtid>()) {
                    (Ok(a), Ok(b)) => a.server_uuid == b.server_uuid && a.transaction_id < b.transaction_id,
                    _ => false,
                }
            }
            (
                TransactionId::Log { log_file: file_a, log_pos: pos_a },
                TransactionId::Log { log_file: file_b, log_pos: pos_b },
            ) => file_a == file_b && pos_a < pos_b,
            _ => false,
        }
    }
}

/// binlog 리더를 어디서부터 시작할지
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReplicationStart {
    /// 실행 완료된 GTID 집합 (빈 문자열이면 처음부터)
    AutoPosition(String),
    LogFile { log_file: String, log_pos: u64 },
}

impl Position {
    /// 아무것도 읽지 않은 상태의 위치
    pub fn origin(gtid_enabled: bool) -> Self {
        if gtid_enabled {
            Position::Gtid(GtidPosition::default())
        } else {
            Position::Log(LogPosition::default())
        }
    }

    pub fn is_gtid(&self) -> bool {
        matches!(self, Position::Gtid(_))
    }

    pub fn kind(&self) -> &'static str {
        variant_name(self.is_gtid())
    }

    pub fn offset(&self) -> u64 {
        match self {
            Position::Gtid(p) => p.offset,
            Position::Log(p) => p.offset,
        }
    }

    pub fn hb_serial(&self) -> Option<i64> {
        match self {
            Position::Gtid(p) => p.hb_serial,
            Position::Log(p) => p.hb_serial,
        }
    }

    pub fn hb_timestamp(&self) -> Option<i64> {
        match self {
            Position::Gtid(p) => p.hb_timestamp,
            Position::Log(p) => p.hb_timestamp,
        }
    }

    pub fn heartbeat(&self) -> Option<HeartbeatMark> {
        match (self.hb_serial(), self.hb_timestamp()) {
            (Some(serial), Some(timestamp)) => Some(HeartbeatMark { serial, timestamp }),
            _ => None,
        }
    }

    pub fn transaction_id(&self) -> TransactionId {
        match self {
            Position::Gtid(p) => TransactionId::Gtid(p.gtid.clone()),
            Position::Log(p) => TransactionId::Log {
                log_file: p.log_file.clone(),
                log_pos: p.log_pos,
            },
        }
    }

    /// 같은 트랜잭션 안에서 오프셋만 바꾼 위치
    pub fn with_offset(&self, offset: u64) -> Position {
        let mut next = self.clone();
        match &mut next {
            Position::Gtid(p) => p.offset = offset,
            Position::Log(p) => p.offset = offset,
        }
        next
    }

    pub fn with_heartbeat(&self, mark: HeartbeatMark) -> Position {
        let mut next = self.clone();
        let (serial, timestamp) = match &mut next {
            Position::Gtid(p) => (&mut p.hb_serial, &mut p.hb_timestamp),
            Position::Log(p) => (&mut p.hb_serial, &mut p.hb_timestamp),
        };
        *serial = Some(mark.serial);
        *timestamp = Some(mark.timestamp);
        next
    }

    /// 설정된 모드와 위치 타입이 같은지 확인
    pub fn ensure_variant(&self, gtid_enabled: bool) -> Result<()> {
        if self.is_gtid() == gtid_enabled {
            Ok(())
        } else {
            Err(CdcError::PositionVariantMismatch {
                expected: variant_name(gtid_enabled),
                actual: self.kind(),
            })
        }
    }

    /// 체크포인트 저장용 JSON
    pub fn to_checkpoint(&self) -> Result<serde_json::Value> {
        Ok(serde_json::to_value(self)?)
    }

    /// 저장된 체크포인트에서 위치 복원
    pub fn from_checkpoint(value: &serde_json::Value, gtid_enabled: bool) -> Result<Position> {
        let position: Position = serde_json::from_value(value.clone())
            .map_err(|e| CdcError::InvalidPosition(format!("{}: {}", value, e)))?;
        position.ensure_variant(gtid_enabled)?;
        Ok(position)
    }

    /// 이 위치의 트랜잭션부터 다시 읽도록 리더 시작점 계산
    pub fn replication_start(&self) -> Result<ReplicationStart> {
        match self {
            Position::Gtid(p) if p.gtid.is_empty() => Ok(ReplicationStart::AutoPosition(String::new())),
            Position::Gtid(p) => {
                let gtid: Gtid = p.gtid.parse()?;
                Ok(ReplicationStart::AutoPosition(gtid.executed_before()))
            }
            Position::Log(p) => Ok(ReplicationStart::LogFile {
                log_file: p.log_file.clone(),
                log_pos: p.log_pos,
            }),
        }
    }
}

fn variant_name(gtid_enabled: bool) -> &'static str {
    if gtid_enabled {
        "gtid"
    } else {
        "log"
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Position::Gtid(p) => write!(f, "{}+{}", p.gtid, p.offset)?,
            Position::Log(p) => write!(f, "{}:{}+{}", p.log_file, p.log_pos, p.offset)?,
        }
        if let Some(hb) = self.heartbeat() {
            write!(f, " (hb {}@{})", hb.serial, hb.timestamp)?;
        }
        Ok(())
    }
}
