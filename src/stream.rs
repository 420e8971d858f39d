//! 재시작 가능한 binlog 이벤트 스트림
//!
//! 원본 소스 → 재시작 필터 → 위치 추적 → heartbeat 추출 순서로 묶은
//! 지연 평가 이터레이터입니다. 소비자가 다음 값을 요청할 때만 소스를 읽습니다.

use crate::error::{CdcError, Result};
use crate::events::{HandlerEvent, RawEvent, ReplicationHandlerEvent};
use crate::monitoring::MonitoringHooks;
use crate::position::Position;
use crate::resume::ResumeFilter;
use crate::source::RawEventSource;
use crate::tracker::PositionTracker;
use tracing::{debug, error, trace};

pub struct StreamReaderWrapper<S> {
    source: S,
    cursor: Position,
    tracker: PositionTracker,
    filter: ResumeFilter,
    hooks: MonitoringHooks,
    finished: bool,
}

impl<S: RawEventSource> StreamReaderWrapper<S> {
    /// `start` (마지막으로 전달 완료된 위치) 이후부터 이벤트를 전달
    ///
    /// 시작 위치 타입이 `gtid_enabled` 와 다르면 이벤트를 읽기 전에 실패합니다.
    pub fn new(source: S, start: Position, gtid_enabled: bool) -> Result<Self> {
        start.ensure_variant(gtid_enabled)?;
        debug!("Resuming binlog stream after {}", start);

        let filter = ResumeFilter::new(&start);
        Ok(StreamReaderWrapper {
            source,
            // 소스는 체크포인트 트랜잭션의 처음부터 재생됨
            cursor: start.with_offset(0),
            tracker: PositionTracker::default(),
            filter,
            hooks: MonitoringHooks::default(),
            finished: false,
        })
    }

    /// 처음부터 모든 이벤트를 전달
    pub fn from_beginning(source: S, gtid_enabled: bool) -> Self {
        StreamReaderWrapper {
            source,
            cursor: Position::origin(gtid_enabled),
            tracker: PositionTracker::default(),
            filter: ResumeFilter::disabled(),
            hooks: MonitoringHooks::default(),
            finished: false,
        }
    }

    pub fn with_hooks(mut self, hooks: MonitoringHooks) -> Self {
        self.hooks = hooks;
        self
    }

    /// 다음에 세어질 이벤트가 받을 위치
    pub fn cursor(&self) -> &Position {
        &self.cursor
    }

    fn next_event(&mut self) -> Result<Option<ReplicationHandlerEvent>> {
        loop {
            let advance = match self.source.peek() {
                Ok(raw) => self.tracker.advance(&self.cursor, raw)?,
                Err(CdcError::EndOfStream) => return Ok(None),
                Err(e) => return Err(e),
            };

            let admitted = self.filter.admits(&advance);
            let raw = self.source.pop()?;
            self.cursor = advance.next;

            let Some(position) = advance.position else {
                // 파일 모드 heartbeat 는 경계지만 모니터링 대상
                if admitted && advance.heartbeat {
                    self.hooks.run(&self.cursor);
                }
                trace!("Transaction boundary, cursor at {}", self.cursor);
                continue;
            };
            if !admitted {
                trace!("Skipping already delivered {} at {}", raw.kind(), position);
                continue;
            }

            self.hooks.run(&position);

            let event = match raw {
                RawEvent::Data(_) if advance.heartbeat => continue,
                RawEvent::Data(data) => HandlerEvent::Data(data),
                RawEvent::Query(query) => HandlerEvent::Query(query),
                RawEvent::Gtid(_) => continue,
            };
            return Ok(Some(ReplicationHandlerEvent { event, position }));
        }
    }
}

impl<S: RawEventSource> Iterator for StreamReaderWrapper<S> {
    type Item = Result<ReplicationHandlerEvent>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_event() {
            Ok(Some(event)) => Some(Ok(event)),
            Ok(None) => {
                debug!("Binlog stream exhausted at {}", self.cursor);
                self.finished = true;
                None
            }
            Err(e) => {
                error!("Binlog stream failed at {}: {}", self.cursor, e);
                self.finished = true;
                Some(Err(e))
            }
        }
    }
}
