//! 应用运行配置加载。

use std::env;

/// 配置加载错误。
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing required env: {0}")]
    Missing(String),
    #[error("invalid value for {0}: {1}")]
    Invalid(String, String),
}

/// 应用运行配置。
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub mqtt_host: String,
    pub mqtt_port: u16,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_client_id: String,
    pub readings_topic: String,
    pub averages_topic: String,
    pub mqtt_qos: u8,
    pub web_api_url: String,
    pub web_api_readings_path: String,
    pub persist_enabled: bool,
    pub ingest_enabled: bool,
}

impl AppConfig {
    /// 从环境变量读取配置。
    ///
    /// 读数主题与均值主题相同会被拒绝：聚合器订阅自己的输出
    /// 主题会形成反馈环。
    pub fn from_env() -> Result<Self, ConfigError> {
        let mqtt_host = env::var("GHM_MQTT_HOST").unwrap_or_else(|_| "127.0.0.1".to_string());
        let mqtt_port = read_u16_with_default("GHM_MQTT_PORT", 1883)?;
        let mqtt_username = read_optional("GHM_MQTT_USERNAME");
        let mqtt_password = read_optional("GHM_MQTT_PASSWORD");
        let mqtt_client_id =
            env::var("GHM_MQTT_CLIENT_ID").unwrap_or_else(|_| "monitoring-service".to_string());
        let readings_topic =
            env::var("GHM_READINGS_TOPIC").unwrap_or_else(|_| "greenhouse/conditions".to_string());
        let averages_topic =
            env::var("GHM_AVERAGES_TOPIC").unwrap_or_else(|_| "greenhouse/averages".to_string());
        let mqtt_qos = read_u8_with_default("GHM_MQTT_QOS", 1)?;
        let web_api_url =
            env::var("GHM_WEB_API_URL").unwrap_or_else(|_| "http://127.0.0.1:8888".to_string());
        let web_api_readings_path = env::var("GHM_WEB_API_READINGS_PATH")
            .unwrap_or_else(|_| "api/conditionsreadings".to_string());
        let persist_enabled = read_bool_with_default("GHM_PERSIST_ENABLED", true);
        let ingest_enabled = read_bool_with_default("GHM_INGEST_ENABLED", true);

        if readings_topic == averages_topic {
            return Err(ConfigError::Invalid(
                "GHM_AVERAGES_TOPIC".to_string(),
                format!("must differ from readings topic {}", readings_topic),
            ));
        }

        Ok(Self {
            mqtt_host,
            mqtt_port,
            mqtt_username,
            mqtt_password,
            mqtt_client_id,
            readings_topic,
            averages_topic,
            mqtt_qos,
            web_api_url,
            web_api_readings_path,
            persist_enabled,
            ingest_enabled,
        })
    }
}

fn read_u16_with_default(key: &str, default: u16) -> Result<u16, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u16>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_u8_with_default(key: &str, default: u8) -> Result<u8, ConfigError> {
    let value = match env::var(key) {
        Ok(value) => value,
        Err(_) => return Ok(default),
    };
    value
        .parse::<u8>()
        .map_err(|_| ConfigError::Invalid(key.to_string(), value))
}

fn read_optional(key: &str) -> Option<String> {
    match env::var(key) {
        Ok(value) if !value.is_empty() => Some(value),
        _ => None,
    }
}

fn read_bool_with_default(key: &str, default: bool) -> bool {
    match env::var(key) {
        Ok(value) => matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "on"),
        Err(_) => default,
    }
}
