//! 温室监控服务入口：装配采集、聚合、持久化与发布链路。

mod monitor;

use ghm_config::AppConfig;
use ghm_persist::{HttpReadingStore, HttpReadingStoreConfig, NoopReadingStore, ReadingStore};
use ghm_pipeline::Pipeline;
use ghm_publish::{AggregatePublisher, MqttPublisher, MqttPublisherConfig, NoopPublisher};
use ghm_telemetry::init_tracing;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 加载本地 .env（如存在），便于直接 cargo run 启动
    dotenvy::dotenv().ok();
    // 从环境变量加载运行配置
    let config = AppConfig::from_env()?;
    // 初始化结构化日志
    init_tracing();

    // 持久化存储：Web API 或空实现
    let reading_store: Arc<dyn ReadingStore> = if config.persist_enabled {
        let store = HttpReadingStore::new(HttpReadingStoreConfig {
            base_url: config.web_api_url.clone(),
            readings_path: config.web_api_readings_path.clone(),
            timeout: Duration::from_secs(10),
        })?;
        info!("persistence: web api {}", store.url());
        Arc::new(store)
    } else {
        info!("persistence: noop (GHM_PERSIST_ENABLED=off)");
        Arc::new(NoopReadingStore)
    };

    // 均值发布器：订阅与发布使用各自独立的 MQTT 连接
    let publisher: Arc<dyn AggregatePublisher> = if config.ingest_enabled {
        let (publisher, _driver) = MqttPublisher::connect(MqttPublisherConfig {
            host: config.mqtt_host.clone(),
            port: config.mqtt_port,
            username: config.mqtt_username.clone(),
            password: config.mqtt_password.clone(),
            client_id: config.mqtt_client_id.clone(),
            qos: config.mqtt_qos,
        })?;
        Arc::new(publisher)
    } else {
        Arc::new(NoopPublisher)
    };

    let pipeline = Pipeline::new(reading_store, publisher, config.averages_topic.clone());
    let _monitor = monitor::spawn_monitor(&config, pipeline);

    info!(
        readings_topic = %config.readings_topic,
        averages_topic = %config.averages_topic,
        "monitoring service started"
    );

    // 进程生命周期由取消信号决定，而不是空转循环
    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    Ok(())
}
