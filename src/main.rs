/// binlog 이벤트 덤프 재생기
///
/// JSON lines 형식의 binlog 이벤트 파일을 읽어 정규화된 이벤트를 JSON 으로 출력합니다.
/// 사용법: binlog_stream_reader <events.jsonl>
/// START_POSITION 환경 변수에 체크포인트 JSON 을 주면 그 뒤부터 출력합니다.
use binlog_stream_reader::position::ReplicationStart;
use binlog_stream_reader::{
    BinlogEvent, BinlogEventSource, CdcError, ChannelEvents, MonitoringHooks, Position,
    StreamConfig, StreamReaderWrapper,
};
use std::env;
use tokio::fs::File;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 로깅 초기화 (stdout 은 이벤트 출력용)
    tracing_subscriber::fmt().with_writer(std::io::stderr).init();

    let path = env::args()
        .nth(1)
        .ok_or("usage: binlog_stream_reader <events.jsonl>")?;
    let config = StreamConfig::from_env();

    let start = match env::var("START_POSITION") {
        Ok(raw) => Some(Position::from_checkpoint(&serde_json::from_str(&raw)?, config.gtid_enabled)?),
        Err(_) => None,
    };
    let replication_start = start.as_ref().map(|p| p.replication_start()).transpose()?;
    let log_file = match &replication_start {
        Some(ReplicationStart::LogFile { log_file, .. }) => log_file.clone(),
        _ => String::new(),
    };

    info!("Replaying {} (gtid_enabled: {})", path, config.gtid_enabled);

    // 백그라운드에서 파일 읽기
    let (tx, rx) = mpsc::unbounded_channel();
    let reader = tokio::spawn(async move {
        let file = match File::open(&path).await {
            Ok(f) => f,
            Err(e) => {
                let _ = tx.send(Err(CdcError::from(e)));
                return;
            }
        };
        let mut lines = BufReader::new(file).lines();
        loop {
            let item = match lines.next_line().await {
                Ok(Some(line)) if line.trim().is_empty() => continue,
                Ok(Some(line)) => serde_json::from_str::<BinlogEvent>(&line).map_err(CdcError::from),
                Ok(None) => break,
                Err(e) => Err(CdcError::from(e)),
            };
            let failed = item.is_err();
            if tx.send(item).is_err() || failed {
                break;
            }
        }
    });

    // 코어는 동기식이므로 블로킹 스레드에서 실행
    let delivered = tokio::task::spawn_blocking(move || -> Result<u64, CdcError> {
        // 덤프에서 체크포인트 트랜잭션 이전 레코드는 버림
        let mut source = BinlogEventSource::new(ChannelEvents::new(rx), log_file);
        if let Some(replication_start) = replication_start {
            source = source.starting_at(replication_start);
        }
        let (hooks, _lag) = MonitoringHooks::from_config(&config.monitoring);
        let stream = match start {
            Some(start) => StreamReaderWrapper::new(source, start, config.gtid_enabled)?,
            None => StreamReaderWrapper::from_beginning(source, config.gtid_enabled),
        }
        .with_hooks(hooks);

        let mut delivered = 0;
        for event in stream {
            let event = event?;
            println!("{}", serde_json::to_string(&event)?);
            delivered += 1;
        }
        Ok(delivered)
    })
    .await?;

    reader.await?;

    match delivered {
        Ok(count) => {
            info!("Delivered {} events", count);
            Ok(())
        }
        Err(e) => {
            error!("Replay failed: {}", e);
            Err(e.into())
        }
    }
}
