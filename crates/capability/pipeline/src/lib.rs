//! 数据流水线：每条入站消息的解码 → 聚合 → 持久化/发布编排。
//!
//! 每条消息是一次独立的处理；除聚合存储外没有跨消息状态。
//! 解码失败、持久化失败、发布失败都只影响当前消息，流水线本身
//! 永不因此停止。

use domain::Reading;
use ghm_aggregate::AggregationStore;
use ghm_persist::ReadingStore;
use ghm_publish::AggregatePublisher;
use std::sync::Arc;
use tokio::sync::Mutex;
use tracing::{info, warn};

/// 单条消息的处理结果。
#[derive(Debug, Clone)]
pub struct CycleResult {
    pub sensor_id: String,
    /// 本次处理后计算出的合成均值读数。
    pub aggregate: Reading,
    pub persisted: bool,
    pub published: bool,
}

/// 流水线错误。
#[derive(Debug, thiserror::Error)]
pub enum PipelineError {
    #[error("aggregate encode error: {0}")]
    Encode(String),
}

struct PipelineInner {
    store: Mutex<AggregationStore>,
    reading_store: Arc<dyn ReadingStore>,
    publisher: Arc<dyn AggregatePublisher>,
    averages_topic: String,
}

/// 流水线入口。
#[derive(Clone)]
pub struct Pipeline {
    inner: Arc<PipelineInner>,
}

impl Pipeline {
    pub fn new(
        reading_store: Arc<dyn ReadingStore>,
        publisher: Arc<dyn AggregatePublisher>,
        averages_topic: impl Into<String>,
    ) -> Self {
        Self {
            inner: Arc::new(PipelineInner {
                store: Mutex::new(AggregationStore::new()),
                reading_store,
                publisher,
                averages_topic: averages_topic.into(),
            }),
        }
    }

    /// 处理一条入站读数报文。
    ///
    /// 返回 `Ok(None)` 表示报文解码失败、已记录日志并丢弃；
    /// 返回的 [`CycleResult`] 中 persisted / published 表示两个
    /// 协作者调用的观测结果，失败不会中断本次处理。
    pub async fn handle(&self, payload: &[u8]) -> Result<Option<CycleResult>, PipelineError> {
        let mut reading = match ghm_codec::decode(payload) {
            Ok(reading) => reading,
            Err(err) => {
                warn!(
                    target: "ghm.pipeline",
                    payload = %String::from_utf8_lossy(payload),
                    error = %err,
                    "reading_decode_failed"
                );
                return Ok(None);
            }
        };
        reading.ts_ms = now_epoch_ms();
        let sensor_id = reading.sensor_id.clone();

        // 持久化与聚合并发进行：聚合与发布不等待写入结果，
        // 但写入结果仍在处理结束前被观测并上报。
        let persist_task = {
            let reading_store = self.inner.reading_store.clone();
            let reading = reading.clone();
            tokio::spawn(async move {
                match reading_store.store(&reading).await {
                    Ok(()) => {
                        info!(
                            target: "ghm.persist",
                            sensor_id = %reading.sensor_id,
                            ts_ms = reading.ts_ms,
                            "reading_persisted"
                        );
                        true
                    }
                    Err(err) => {
                        warn!(
                            target: "ghm.persist",
                            sensor_id = %reading.sensor_id,
                            error = %err,
                            "reading_persist_failed"
                        );
                        false
                    }
                }
            })
        };

        // upsert 与 compute_average 在同一次加锁内完成：并发消息
        // 不会读到半更新的存储。锁在任何 I/O await 之前释放。
        let mut aggregate = {
            let mut store = self.inner.store.lock().await;
            store.upsert(reading);
            store.compute_average()
        };
        aggregate.ts_ms = now_epoch_ms();

        let aggregate_payload =
            ghm_codec::encode(&aggregate).map_err(|err| PipelineError::Encode(err.to_string()))?;
        let published = match self
            .inner
            .publisher
            .publish(&self.inner.averages_topic, aggregate_payload)
            .await
        {
            Ok(()) => true,
            Err(err) => {
                warn!(
                    target: "ghm.publish",
                    topic = %self.inner.averages_topic,
                    sensor_id = %sensor_id,
                    error = %err,
                    "aggregate_publish_failed"
                );
                false
            }
        };

        let persisted = persist_task.await.unwrap_or(false);

        Ok(Some(CycleResult {
            sensor_id,
            aggregate,
            persisted,
            published,
        }))
    }

    /// 当前跟踪的传感器数量（用于测试与状态日志）。
    pub async fn tracked_sensors(&self) -> usize {
        self.inner.store.lock().await.len()
    }
}

fn now_epoch_ms() -> i64 {
    let now = std::time::SystemTime::now();
    let duration = now
        .duration_since(std::time::UNIX_EPOCH)
        .unwrap_or_default();
    duration.as_millis() as i64
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use ghm_persist::{InMemoryReadingStore, PersistError};
    use ghm_publish::PublishError;

    struct RecordingPublisher {
        messages: Mutex<Vec<(String, Vec<u8>)>>,
    }

    impl RecordingPublisher {
        fn new() -> Self {
            Self {
                messages: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl AggregatePublisher for RecordingPublisher {
        async fn publish(&self, topic: &str, payload: Vec<u8>) -> Result<(), PublishError> {
            let mut messages = self.messages.lock().await;
            messages.push((topic.to_string(), payload));
            Ok(())
        }
    }

    struct FailingPublisher;

    #[async_trait]
    impl AggregatePublisher for FailingPublisher {
        async fn publish(&self, _topic: &str, _payload: Vec<u8>) -> Result<(), PublishError> {
            Err(PublishError::Publish("forced failure".to_string()))
        }
    }

    struct FailingStore;

    #[async_trait]
    impl ReadingStore for FailingStore {
        async fn store(&self, _reading: &domain::Reading) -> Result<(), PersistError> {
            Err(PersistError::Request("forced failure".to_string()))
        }
    }

    fn payload(sensor_id: &str, temp: f64, humidity: f64, soil: f64, light: i64) -> Vec<u8> {
        format!(
            r#"{{"airTemperature":{},"airHumidity":{},"soilMoisture":{},"lightIntensity":{},"sensorId":"{}"}}"#,
            temp, humidity, soil, light, sensor_id
        )
        .into_bytes()
    }

    #[tokio::test]
    async fn well_formed_payload_runs_full_cycle() {
        let store = Arc::new(InMemoryReadingStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = Pipeline::new(store.clone(), publisher.clone(), "greenhouse/averages");

        let result = pipeline
            .handle(&payload("node-1", 21.0, 45.0, 33.0, 700))
            .await
            .expect("handled")
            .expect("cycle");

        assert_eq!(result.sensor_id, "node-1");
        assert!(result.persisted);
        assert!(result.published);
        assert_eq!(store.len(), 1);
        assert!(result.aggregate.ts_ms > 0);

        let messages = publisher.messages.lock().await;
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].0, "greenhouse/averages");
        let aggregate = ghm_codec::decode(&messages[0].1).expect("aggregate decodes");
        assert!(aggregate.is_aggregate());
        assert_eq!(aggregate.air_temperature, 21.0);
    }

    #[tokio::test]
    async fn malformed_payload_is_dropped_without_side_effects() {
        let store = Arc::new(InMemoryReadingStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = Pipeline::new(store.clone(), publisher.clone(), "greenhouse/averages");

        let dropped = pipeline.handle(b"not json").await.expect("handled");
        assert!(dropped.is_none());
        assert!(store.is_empty());
        assert_eq!(pipeline.tracked_sensors().await, 0);
        assert!(publisher.messages.lock().await.is_empty());

        // 后续的合法报文正常走完一个周期
        let result = pipeline
            .handle(&payload("node-1", 20.0, 0.0, 30.0, 500))
            .await
            .expect("handled")
            .expect("cycle");
        assert!(result.persisted);
        assert_eq!(store.len(), 1);
        assert_eq!(publisher.messages.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn averages_follow_per_field_contributors() {
        let store = Arc::new(InMemoryReadingStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = Pipeline::new(store, publisher.clone(), "greenhouse/averages");

        pipeline
            .handle(&payload("a", 20.0, 0.0, 30.0, 500))
            .await
            .expect("handled");
        let result = pipeline
            .handle(&payload("b", 24.0, 50.0, 0.0, 0))
            .await
            .expect("handled")
            .expect("cycle");

        assert_eq!(result.aggregate.air_temperature, 22.0);
        assert_eq!(result.aggregate.air_humidity, 50.0);
        assert_eq!(result.aggregate.soil_moisture, 30.0);
        assert_eq!(result.aggregate.light_intensity, 500);
    }

    #[tokio::test]
    async fn persist_failure_does_not_abort_cycle() {
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = Pipeline::new(
            Arc::new(FailingStore),
            publisher.clone(),
            "greenhouse/averages",
        );

        let result = pipeline
            .handle(&payload("node-1", 21.0, 45.0, 33.0, 700))
            .await
            .expect("handled")
            .expect("cycle");

        assert!(!result.persisted);
        assert!(result.published);
        assert_eq!(publisher.messages.lock().await.len(), 1);
    }

    #[tokio::test]
    async fn publish_failure_is_reported_not_fatal() {
        let store = Arc::new(InMemoryReadingStore::new());
        let pipeline = Pipeline::new(store.clone(), Arc::new(FailingPublisher), "greenhouse/averages");

        let result = pipeline
            .handle(&payload("node-1", 21.0, 45.0, 33.0, 700))
            .await
            .expect("handled")
            .expect("cycle");

        assert!(result.persisted);
        assert!(!result.published);
        assert_eq!(store.len(), 1);
        assert_eq!(pipeline.tracked_sensors().await, 1);
    }

    #[tokio::test]
    async fn concurrent_messages_never_tear_the_aggregate() {
        let store = Arc::new(InMemoryReadingStore::new());
        let publisher = Arc::new(RecordingPublisher::new());
        let pipeline = Pipeline::new(store, publisher.clone(), "greenhouse/averages");

        let mut handles = Vec::new();
        for i in 0..10 {
            let pipeline = pipeline.clone();
            handles.push(tokio::spawn(async move {
                pipeline
                    .handle(&payload(&format!("node-{}", i), 10.0, 0.0, 0.0, 0))
                    .await
            }));
        }
        for handle in handles {
            handle.await.expect("join").expect("handled");
        }

        assert_eq!(pipeline.tracked_sensors().await, 10);
        assert_eq!(publisher.messages.lock().await.len(), 10);

        // 每条并发消息都上报相同温度：任何中间聚合的温度均值都必须
        // 恰好是 10.0，否则说明 compute_average 读到了半更新状态
        for (_, message) in publisher.messages.lock().await.iter() {
            let aggregate = ghm_codec::decode(message).expect("aggregate decodes");
            assert_eq!(aggregate.air_temperature, 10.0);
        }

        let result = pipeline
            .handle(&payload("node-extra", 10.0, 80.0, 0.0, 0))
            .await
            .expect("handled")
            .expect("cycle");
        assert_eq!(result.aggregate.air_temperature, 10.0);
        assert_eq!(result.aggregate.air_humidity, 80.0);
    }
}
