//! CDC 관련 에러 타입

use thiserror::Error;
use std::io;

#[derive(Error, Debug)]
pub enum CdcError {
    /// 원본 이벤트 소스가 소진됨 (스트림의 정상 종료 신호)
    #[error("이벤트 스트림이 끝났습니다")]
    EndOfStream,

    #[error("잘못된 heartbeat 행: {0}")]
    MalformedHeartbeat(String),

    #[error("위치 타입 불일치: 설정은 {expected}, 시작 위치는 {actual}")]
    PositionVariantMismatch {
        expected: &'static str,
        actual: &'static str,
    },

    #[error("유효하지 않은 위치: {0}")]
    InvalidPosition(String),

    #[error("모니터링 처리 에러: {0}")]
    Monitoring(String),

    /// 외부 binlog 리더 (RawEventSource 구현) 가 연결을 잃음
    #[error("MySQL 연결 에러: {0}")]
    ConnectionError(String),

    /// 외부 binlog 파서가 레코드를 해석하지 못함
    #[error("Binlog 파싱 에러: {0}")]
    BinlogParseError(String),

    #[error("유효하지 않은 이벤트: {0}")]
    InvalidEvent(String),

    #[error("GTID 처리 에러: {0}")]
    GtidError(String),

    #[error("I/O 에러: {0}")]
    IoError(String),

    #[error("직렬화 에러: {0}")]
    SerializationError(#[from] serde_json::Error),
}

impl From<io::Error> for CdcError {
    fn from(err: io::Error) -> Self {
        CdcError::IoError(err.to_string())
    }
}

impl CdcError {
    pub fn is_end_of_stream(&self) -> bool {
        matches!(self, CdcError::EndOfStream)
    }
}

pub type Result<T> = std::result::Result<T, CdcError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_source_errors_are_not_end_of_stream() {
        let errors = vec![
            CdcError::ConnectionError("lost connection".to_string()),
            CdcError::BinlogParseError("bad header".to_string()),
            CdcError::from(io::Error::new(io::ErrorKind::UnexpectedEof, "eof")),
        ];
        for error in errors {
            assert!(!error.is_end_of_stream());
        }
        assert!(CdcError::EndOfStream.is_end_of_stream());
        assert_eq!(
            CdcError::ConnectionError("lost connection".to_string()).to_string(),
            "MySQL 연결 에러: lost connection"
        );
    }
}
