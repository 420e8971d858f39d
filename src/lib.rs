//! MySQL Binlog CDC 스트림 리더
//!
//! binlog 리더가 넘겨주는 이벤트를 정규화하고, 재시작 가능한 위치를 붙여 전달합니다.
//! 주요 기능:
//! - GTID 기반 / 파일 기반 위치 추적
//! - 체크포인트에서 재시작 시 중복 없이, 누락 없이 이어서 전달
//! - heartbeat 행 제거 및 지연 메타데이터 수집
//! - 모니터링 훅 (지연 게이지, 지연 경고)

pub mod config;
pub mod error;
pub mod events;
pub mod gtid;
pub mod heartbeat;
pub mod monitoring;
pub mod position;
pub mod resume;
pub mod source;
pub mod stream;
pub mod tracker;

pub use config::{MonitoringConfig, StreamConfig};
pub use error::{CdcError, Result};
pub use events::{BinlogEvent, DataEvent, HandlerEvent, QueryEvent, RawEvent, ReplicationHandlerEvent};
pub use monitoring::{MonitoringHooks, PeriodicProcessor};
pub use position::{GtidPosition, LogPosition, Position};
pub use source::{BinlogEventSource, ChannelEvents, MemoryEventSource, RawEventSource};
pub use stream::StreamReaderWrapper;
