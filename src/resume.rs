//! 재시작 필터
//!
//! 마지막으로 전달한 위치 이하의 이벤트를 건너뛰고, 그보다 뒤의 첫 이벤트부터 전달합니다.
//! 한 번 전달을 시작하면 이후 이벤트는 모두 통과합니다.
//!
//! 리더는 체크포인트 트랜잭션의 처음부터 다시 읽도록 위치가 잡힙니다
//! (`Position::replication_start`). 그래서 체크포인트보다 앞서지 않은 첫 트랜잭션
//! 경계는 체크포인트 트랜잭션의 재생으로 보고 기준 식별자를 옮깁니다.
//! 체크포인트보다 확실히 앞선 트랜잭션은 통째로 건너뜁니다.

use crate::position::{Position, TransactionId};
use crate::tracker::Advance;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct ResumeFilter {
    /// 아직 건너뛰는 중이면 (기준 트랜잭션, 마지막 전달 오프셋)
    pending: Option<(TransactionId, u64)>,
    /// 체크포인트 이후 (또는 체크포인트) 의 이벤트를 하나라도 봤는지
    observed_any: bool,
    /// 체크포인트보다 앞선 트랜잭션 안에 있음
    before_start: bool,
}

impl ResumeFilter {
    /// `start` 이후부터 전달
    pub fn new(start: &Position) -> Self {
        ResumeFilter {
            pending: Some((start.transaction_id(), start.offset())),
            observed_any: false,
            before_start: false,
        }
    }

    /// 처음부터 모두 전달
    pub fn disabled() -> Self {
        ResumeFilter {
            pending: None,
            observed_any: true,
            before_start: false,
        }
    }

    pub fn is_resumed(&self) -> bool {
        self.pending.is_none()
    }

    /// 이 이벤트가 아직 전달되지 않은 것이면 true
    pub fn admits(&mut self, advance: &Advance) -> bool {
        let Some((anchor, last_offset)) = self.pending.as_mut() else {
            return true;
        };

        let admitted = match &advance.position {
            None => {
                let opened = advance.next.transaction_id();
                if opened.precedes(anchor) {
                    debug!("Skipping transaction {} before checkpoint", advance.next);
                    self.before_start = true;
                    false
                } else if !self.observed_any {
                    debug!("Replaying checkpointed transaction as {}", advance.next);
                    *anchor = opened;
                    self.before_start = false;
                    false
                } else {
                    opened != *anchor
                }
            }
            Some(_) if self.before_start => false,
            Some(position) => position.transaction_id() != *anchor || position.offset() > *last_offset,
        };

        if !self.before_start {
            self.observed_any = true;
        }
        if admitted {
            debug!("Resumed at {}", advance.position.as_ref().unwrap_or(&advance.next));
            self.pending = None;
        }
        admitted
    }
}
