//! 스트림 설정

use std::env;
use std::time::Duration;

/// 모니터링 프로세서 설정
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MonitoringConfig {
    /// 지연 게이지 갱신 주기
    pub gauge_interval: Duration,
    /// 이 이상 지연되면 경고
    pub alert_threshold: Duration,
    /// 경고 판단 주기
    pub alert_interval: Duration,
}

impl Default for MonitoringConfig {
    fn default() -> Self {
        MonitoringConfig {
            gauge_interval: Duration::from_secs(10),
            alert_threshold: Duration::from_secs(300),
            alert_interval: Duration::from_secs(30),
        }
    }
}

/// 스트림 설정
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StreamConfig {
    /// true 면 GTID 기반 위치, false 면 파일 기반 위치
    pub gtid_enabled: bool,
    pub monitoring: MonitoringConfig,
}

impl StreamConfig {
    /// 환경 변수에서 설정 읽기 (없거나 잘못된 값은 기본값)
    pub fn from_env() -> Self {
        let defaults = MonitoringConfig::default();
        StreamConfig {
            gtid_enabled: env::var("GTID_ENABLED")
                .map(|v| matches!(v.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
                .unwrap_or(false),
            monitoring: MonitoringConfig {
                gauge_interval: env_secs("LAG_GAUGE_INTERVAL_SECS", defaults.gauge_interval),
                alert_threshold: env_secs("LAG_ALERT_THRESHOLD_SECS", defaults.alert_threshold),
                alert_interval: env_secs("LAG_ALERT_INTERVAL_SECS", defaults.alert_interval),
            },
        }
    }
}

fn env_secs(key: &str, default: Duration) -> Duration {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<u64>().ok())
        .map(Duration::from_secs)
        .unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = StreamConfig::default();
        assert!(!config.gtid_enabled);
        assert_eq!(config.monitoring.alert_threshold, Duration::from_secs(300));
    }

    #[test]
    fn test_env_secs_fallback() {
        let default = Duration::from_secs(7);
        assert_eq!(env_secs("BINLOG_STREAM_READER_UNSET_VAR", default), default);
    }
}
