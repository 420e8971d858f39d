//! 위치 추적기
//!
//! 커서는 "다음에 세어질 이벤트가 받을 위치" 입니다. 트랜잭션 경계는 커서를
//! 새 트랜잭션의 오프셋 0 으로 옮기고, 행/구문 이벤트는 현재 커서를 자기 위치로
//! 받은 뒤 오프셋을 1 올립니다. 따라서 경계 직후의 구문은 오프셋 0, 그 뒤의
//! 이벤트는 하나씩 증가한 오프셋을 받습니다.

use crate::error::Result;
use crate::events::{DataEvent, GtidEvent, RawEvent};
use crate::heartbeat::HeartbeatExtractor;
use crate::position::{GtidPosition, HeartbeatMark, LogPosition, Position};

/// 원본 이벤트 하나를 반영한 결과
#[derive(Debug, Clone, PartialEq)]
pub struct Advance {
    /// 이벤트 자신의 위치 (트랜잭션 경계는 None)
    pub position: Option<Position>,
    /// 갱신된 커서
    pub next: Position,
    /// heartbeat 행 여부
    pub heartbeat: bool,
}

impl Advance {
    fn boundary(next: Position, heartbeat: bool) -> Self {
        Advance {
            position: None,
            next,
            heartbeat,
        }
    }

    fn counted(position: Position, heartbeat: bool) -> Self {
        let next = position.with_offset(position.offset() + 1);
        Advance {
            position: Some(position),
            next,
            heartbeat,
        }
    }

    pub fn is_boundary(&self) -> bool {
        self.position.is_none()
    }
}

#[derive(Debug, Clone, Default)]
pub struct PositionTracker {
    heartbeat: HeartbeatExtractor,
}

impl PositionTracker {
    pub fn new(heartbeat: HeartbeatExtractor) -> Self {
        PositionTracker { heartbeat }
    }

    /// `current` 커서에서 `event` 를 반영한 다음 상태를 계산
    ///
    /// 커서의 타입 (GTID/파일) 이 그대로 유지됩니다.
    pub fn advance(&self, current: &Position, event: &RawEvent) -> Result<Advance> {
        match event {
            RawEvent::Gtid(gtid_event) => Ok(Advance::boundary(open_transaction(current, gtid_event), false)),
            RawEvent::Query(_) => Ok(Advance::counted(current.clone(), false)),
            RawEvent::Data(data) => match self.heartbeat.extract(data)? {
                None => Ok(Advance::counted(current.clone(), false)),
                Some(mark) => Ok(self.advance_heartbeat(current, data, mark)),
            },
        }
    }

    fn advance_heartbeat(&self, current: &Position, data: &DataEvent, mark: HeartbeatMark) -> Advance {
        match current {
            // GTID 모드: 일반 행처럼 오프셋을 차지
            Position::Gtid(_) => Advance::counted(current.with_heartbeat(mark), true),
            // 파일 모드: heartbeat 행이 (log_file, log_pos) 기준점이 됨
            Position::Log(_) => {
                let anchor = Position::Log(LogPosition {
                    log_file: data.log_file.clone(),
                    log_pos: data.log_pos,
                    offset: 0,
                    hb_serial: Some(mark.serial),
                    hb_timestamp: Some(mark.timestamp),
                });
                Advance::boundary(anchor, true)
            }
        }
    }
}

fn open_transaction(current: &Position, event: &GtidEvent) -> Position {
    match current {
        Position::Gtid(p) => Position::Gtid(GtidPosition {
            gtid: event.gtid.clone(),
            offset: 0,
            hb_serial: p.hb_serial,
            hb_timestamp: p.hb_timestamp,
        }),
        Position::Log(p) => Position::Log(LogPosition {
            log_file: event.log_file.clone(),
            log_pos: event.log_pos,
            offset: 0,
            hb_serial: p.hb_serial,
            hb_timestamp: p.hb_timestamp,
        }),
    }
}
