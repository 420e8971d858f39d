//! GTID (Global Transaction ID) 처리
//!
//! GTID 형식: UUID:sequence-number
//! 재시작 시 binlog 리더는 "uuid:1-(N-1)" 집합을 실행 완료로 전달받아
//! 트랜잭션 N 부터 다시 읽습니다.

use crate::error::{CdcError, Result};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// 단일 GTID
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Gtid {
    /// 원본 서버 UUID
    pub server_uuid: String,
    /// 트랜잭션 번호 (1부터 시작)
    pub transaction_id: u64,
}

impl Gtid {
    pub fn new(server_uuid: impl Into<String>, transaction_id: u64) -> Self {
        Gtid {
            server_uuid: server_uuid.into(),
            transaction_id,
        }
    }

    /// 이 트랜잭션 직전까지 실행된 GTID 집합
    ///
    /// 첫 번째 트랜잭션이면 빈 문자열 (처음부터 읽기).
    pub fn executed_before(&self) -> String {
        match self.transaction_id {
            0 | 1 => String::new(),
            n => format!("{}:1-{}", self.server_uuid, n - 1),
        }
    }

    /// 실행 완료 GTID 집합 (`uuid:1-12:15,other:1-3`) 에 포함되는지
    ///
    /// 해석할 수 없는 구간은 무시합니다.
    pub fn is_executed_in(&self, executed: &str) -> bool {
        executed
            .split(',')
            .filter_map(|entry| entry.trim().split_once(':'))
            .filter(|(uuid, _)| *uuid == self.server_uuid)
            .flat_map(|(_, intervals)| intervals.split(':'))
            .any(|interval| match interval.split_once('-') {
                Some((start, end)) => match (start.parse::<u64>(), end.parse::<u64>()) {
                    (Ok(start), Ok(end)) => (start..=end).contains(&self.transaction_id),
                    _ => false,
                },
                None => interval.parse::<u64>().ok() == Some(self.transaction_id),
            })
    }
}

impl FromStr for Gtid {
    type Err = CdcError;

    fn from_str(gtid: &str) -> Result<Self> {
        // uuid 자체에는 ':' 이 없으므로 마지막 ':' 기준으로 분리
        let (uuid, sequence) = gtid
            .rsplit_once(':')
            .ok_or_else(|| CdcError::GtidError(format!("Invalid GTID format: {}", gtid)))?;

        if uuid.is_empty() {
            return Err(CdcError::GtidError(format!("Missing server uuid: {}", gtid)));
        }

        let transaction_id = sequence
            .parse::<u64>()
            .map_err(|_| CdcError::GtidError(format!("Invalid sequence: {}", sequence)))?;

        Ok(Gtid::new(uuid, transaction_id))
    }
}

impl fmt::Display for Gtid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.server_uuid, self.transaction_id)
    }
}
