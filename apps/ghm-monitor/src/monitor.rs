//! 采集链路装配模块
//!
//! 该模块把采集源和数据流水线组装在一起：从 MQTT 读数主题接收
//! 原始报文，交给流水线完成解码、聚合、持久化与均值发布，并把
//! 每个处理周期的观测结果记入指标和日志。采集会话断开后由监督
//! 任务按指数退避重连。

use ghm_config::AppConfig;
use ghm_ingest::{IngestError, MqttSource, MqttSourceConfig, NoopSource, RawMessageHandler, Source};
use ghm_pipeline::Pipeline;
use ghm_telemetry::{
    record_aggregate_published, record_decode_failure, record_persist_failure,
    record_persist_success, record_publish_failure, record_reading_received,
};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{info, warn};

/// 重连退避参数。
const INITIAL_BACKOFF: Duration = Duration::from_secs(1);
const MAX_BACKOFF: Duration = Duration::from_secs(60);
/// 会话存活超过该时长后认为连接稳定，退避回到初始值。
const SESSION_STABLE_AFTER: Duration = Duration::from_secs(60);

/// 监控处理器
///
/// 实现 `RawMessageHandler`，把每条原始报文交给流水线处理，
/// 并根据处理结果记录指标。
struct MonitorHandler {
    pipeline: Pipeline,
}

#[async_trait::async_trait]
impl RawMessageHandler for MonitorHandler {
    async fn handle(&self, message: domain::RawMessage) -> Result<(), IngestError> {
        record_reading_received();
        info!(
            target: "ghm.ingest",
            topic = %message.topic,
            payload_size = message.payload.len(),
            received_at_ms = message.received_at_ms,
            "raw_message_received"
        );

        match self.pipeline.handle(&message.payload).await {
            Ok(Some(result)) => {
                if result.persisted {
                    record_persist_success();
                } else {
                    record_persist_failure();
                }
                if result.published {
                    record_aggregate_published();
                } else {
                    record_publish_failure();
                }
                info!(
                    target: "ghm.ingest",
                    sensor_id = %result.sensor_id,
                    avg_air_temperature = result.aggregate.air_temperature,
                    avg_air_humidity = result.aggregate.air_humidity,
                    avg_soil_moisture = result.aggregate.soil_moisture,
                    avg_light_intensity = result.aggregate.light_intensity,
                    persisted = result.persisted,
                    published = result.published,
                    "reading_cycle_completed"
                );
                Ok(())
            }
            Ok(None) => {
                // 解码失败已由流水线记录日志；坏报文只影响自己
                record_decode_failure();
                Ok(())
            }
            Err(err) => Err(IngestError::Handler(err.to_string())),
        }
    }
}

/// 启动监控任务。
///
/// 选择采集源（MQTT 或空操作源），并在后台以指数退避监督
/// 订阅会话：会话断开记录日志、等待后重连；聚合状态在进程内
/// 保留，不随会话重建而清空。
pub fn spawn_monitor(config: &AppConfig, pipeline: Pipeline) -> tokio::task::JoinHandle<()> {
    let handler = Arc::new(MonitorHandler { pipeline });

    let source: Arc<dyn Source> = if config.ingest_enabled {
        let mqtt_config = MqttSourceConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            client_id: config.mqtt_client_id.clone(),
            readings_topic: config.readings_topic.clone(),
            qos: config.mqtt_qos,
        };
        info!(
            "ingest source: mqtt {}:{} topic={}",
            mqtt_config.host, mqtt_config.port, mqtt_config.readings_topic
        );
        Arc::new(MqttSource::new(mqtt_config))
    } else {
        info!("ingest source: noop (GHM_INGEST_ENABLED=off)");
        Arc::new(NoopSource)
    };

    tokio::spawn(async move {
        let mut backoff = INITIAL_BACKOFF;
        loop {
            let started_at = Instant::now();
            match source.run(handler.clone()).await {
                Ok(()) => {
                    info!(target: "ghm.ingest", "ingest source finished");
                    return;
                }
                Err(err) => {
                    if started_at.elapsed() >= SESSION_STABLE_AFTER {
                        backoff = INITIAL_BACKOFF;
                    }
                    warn!(
                        target: "ghm.ingest",
                        error = %err,
                        retry_in_s = backoff.as_secs(),
                        "ingest session lost"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = next_backoff(backoff);
                }
            }
        }
    })
}

fn next_backoff(current: Duration) -> Duration {
    (current * 2).min(MAX_BACKOFF)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn backoff_doubles_until_capped() {
        let mut backoff = INITIAL_BACKOFF;
        let mut seen = Vec::new();
        for _ in 0..8 {
            seen.push(backoff.as_secs());
            backoff = next_backoff(backoff);
        }
        assert_eq!(seen, vec![1, 2, 4, 8, 16, 32, 60, 60]);
    }
}
