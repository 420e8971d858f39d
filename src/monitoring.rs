//! 모니터링 훅
//!
//! 전달되는 이벤트마다 한 번씩 호출됩니다. 실제 작업은 각 프로세서가 자기 주기에 맞춰
//! 수행합니다. 프로세서의 실패는 로그로만 남기고 스트림을 멈추지 않습니다.

use crate::config::MonitoringConfig;
use crate::error::Result;
use crate::position::Position;
use chrono::Utc;
use parking_lot::RwLock;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 주기적으로 실행되는 모니터링 작업
pub trait PeriodicProcessor: Send {
    fn name(&self) -> &str;

    fn periodic_process(&mut self, position: &Position) -> Result<()>;
}

/// 아무것도 하지 않는 프로세서
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopProcessor;

impl PeriodicProcessor for NoopProcessor {
    fn name(&self) -> &str {
        "noop"
    }

    fn periodic_process(&mut self, _position: &Position) -> Result<()> {
        Ok(())
    }
}

/// 주기 판단
#[derive(Debug, Clone)]
struct Period {
    interval: Duration,
    last_run: Option<Instant>,
}

impl Period {
    fn new(interval: Duration) -> Self {
        Period {
            interval,
            last_run: None,
        }
    }

    /// 실행할 때가 되었으면 true 를 반환하고 시각을 기록
    fn due(&mut self) -> bool {
        let now = Instant::now();
        match self.last_run {
            Some(last) if now.duration_since(last) < self.interval => false,
            _ => {
                self.last_run = Some(now);
                true
            }
        }
    }
}

/// heartbeat 시각 기준 복제 지연 (초)
fn lag_seconds(position: &Position) -> Option<i64> {
    position
        .hb_timestamp()
        .map(|ts| (Utc::now().timestamp() - ts).max(0))
}

/// 마지막으로 측정한 지연을 다른 스레드에서 읽기 위한 핸들
#[derive(Debug, Clone, Default)]
pub struct LagHandle {
    inner: Arc<RwLock<Option<i64>>>,
}

impl LagHandle {
    pub fn lag_seconds(&self) -> Option<i64> {
        *self.inner.read()
    }

    fn set(&self, lag: i64) {
        *self.inner.write() = Some(lag);
    }
}

/// 복제 지연 게이지
pub struct LagGauge {
    period: Period,
    handle: LagHandle,
}

impl LagGauge {
    pub fn new(interval: Duration) -> Self {
        LagGauge {
            period: Period::new(interval),
            handle: LagHandle::default(),
        }
    }

    pub fn handle(&self) -> LagHandle {
        self.handle.clone()
    }
}

impl PeriodicProcessor for LagGauge {
    fn name(&self) -> &str {
        "lag_gauge"
    }

    fn periodic_process(&mut self, position: &Position) -> Result<()> {
        // heartbeat 정보가 없으면 측정하지 않음
        let Some(lag) = lag_seconds(position) else {
            return Ok(());
        };
        if self.period.due() {
            self.handle.set(lag);
            info!(lag_seconds = lag, position = %position, "Replication lag");
        }
        Ok(())
    }
}

/// 지연이 임계값을 넘으면 경고
pub struct LagAlert {
    period: Period,
    threshold: Duration,
    firing: bool,
}

impl LagAlert {
    pub fn new(threshold: Duration, interval: Duration) -> Self {
        LagAlert {
            period: Period::new(interval),
            threshold,
            firing: false,
        }
    }

    pub fn is_firing(&self) -> bool {
        self.firing
    }
}

impl PeriodicProcessor for LagAlert {
    fn name(&self) -> &str {
        "lag_alert"
    }

    fn periodic_process(&mut self, position: &Position) -> Result<()> {
        let Some(lag) = lag_seconds(position) else {
            return Ok(());
        };
        if !self.period.due() {
            return Ok(());
        }

        let threshold = self.threshold.as_secs() as i64;
        if lag > threshold {
            self.firing = true;
            warn!(lag_seconds = lag, threshold, position = %position, "Replication lag above threshold");
        } else if self.firing {
            self.firing = false;
            info!(lag_seconds = lag, threshold, "Replication lag recovered");
        }
        Ok(())
    }
}

/// 스트림에 주입되는 프로세서 묶음
#[derive(Default)]
pub struct MonitoringHooks {
    processors: Vec<Box<dyn PeriodicProcessor>>,
}

impl MonitoringHooks {
    pub fn new() -> Self {
        Self::default()
    }

    /// 설정에 따라 지연 게이지와 경고 구성
    pub fn from_config(config: &MonitoringConfig) -> (Self, LagHandle) {
        let gauge = LagGauge::new(config.gauge_interval);
        let handle = gauge.handle();
        let hooks = MonitoringHooks::new()
            .with(gauge)
            .with(LagAlert::new(config.alert_threshold, config.alert_interval));
        (hooks, handle)
    }

    pub fn with(mut self, processor: impl PeriodicProcessor + 'static) -> Self {
        self.processors.push(Box::new(processor));
        self
    }

    pub fn len(&self) -> usize {
        self.processors.len()
    }

    pub fn is_empty(&self) -> bool {
        self.processors.is_empty()
    }

    /// 모든 프로세서를 한 번씩 실행. 실패는 로그만 남김
    pub fn run(&mut self, position: &Position) {
        for processor in self.processors.iter_mut() {
            if let Err(e) = processor.periodic_process(position) {
                warn!("Monitoring processor {} failed at {}: {}", processor.name(), position, e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::CdcError;
    use crate::position::{GtidPosition, HeartbeatMark};
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Failing(Arc<AtomicUsize>);

    impl PeriodicProcessor for Failing {
        fn name(&self) -> &str {
            "failing"
        }

        fn periodic_process(&mut self, _position: &Position) -> Result<()> {
            self.0.fetch_add(1, Ordering::SeqCst);
            Err(CdcError::Monitoring("sink unavailable".to_string()))
        }
    }

    fn position_with_lag(lag: i64) -> Position {
        Position::Gtid(GtidPosition::new("sid:1", 0)).with_heartbeat(HeartbeatMark {
            serial: 1,
            timestamp: Utc::now().timestamp() - lag,
        })
    }

    #[test]
    fn test_failures_are_swallowed() {
        let calls = Arc::new(AtomicUsize::new(0));
        let mut hooks = MonitoringHooks::new()
            .with(Failing(calls.clone()))
            .with(NoopProcessor);
        let position = Position::origin(true);
        hooks.run(&position);
        hooks.run(&position);
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        assert_eq!(hooks.len(), 2);
    }

    #[test]
    fn test_lag_gauge() {
        let mut gauge = LagGauge::new(Duration::from_secs(3600));
        let handle = gauge.handle();

        gauge.periodic_process(&Position::origin(true)).unwrap();
        assert_eq!(handle.lag_seconds(), None);

        gauge.periodic_process(&position_with_lag(30)).unwrap();
        let lag = handle.lag_seconds().unwrap();
        assert!((30..=32).contains(&lag));

        // 주기 안에서는 갱신하지 않음
        gauge.periodic_process(&position_with_lag(500)).unwrap();
        assert!(handle.lag_seconds().unwrap() < 500);
    }

    #[test]
    fn test_lag_alert() {
        let mut alert = LagAlert::new(Duration::from_secs(60), Duration::ZERO);
        alert.periodic_process(&position_with_lag(5)).unwrap();
        assert!(!alert.is_firing());
        alert.periodic_process(&position_with_lag(600)).unwrap();
        assert!(alert.is_firing());
        alert.periodic_process(&position_with_lag(5)).unwrap();
        assert!(!alert.is_firing());
    }

    #[test]
    fn test_from_config() {
        let (hooks, handle) = MonitoringHooks::from_config(&MonitoringConfig::default());
        assert_eq!(hooks.len(), 2);
        assert_eq!(handle.lag_seconds(), None);
    }
}
