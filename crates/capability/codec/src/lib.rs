//! 读数报文编解码。
//!
//! 线上格式为字段命名的 JSON（camelCase），同时接受旧版传感器固件
//! 使用的 PascalCase 字段名。解码是纯函数，不盖时间戳。

use domain::Reading;
use serde::{Deserialize, Serialize};

/// 解码错误。
#[derive(Debug, thiserror::Error)]
pub enum DecodeError {
    #[error("malformed payload: {0}")]
    MalformedPayload(String),
    #[error("sensor id missing or empty")]
    MissingSensorId,
}

/// 编码错误。
#[derive(Debug, thiserror::Error)]
pub enum EncodeError {
    #[error("serialize failed: {0}")]
    Serialize(String),
}

/// 读数的线上表示。
///
/// 四个测量字段与 sensorId 为必填；timestamp 可缺省（由流水线盖章覆盖，
/// 保留解析仅为保证 encode → decode 往返无损）。
#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ReadingFrame {
    #[serde(alias = "AirTemperature")]
    air_temperature: f64,
    #[serde(alias = "AirHumidity")]
    air_humidity: f64,
    #[serde(alias = "SoilMoisture")]
    soil_moisture: f64,
    #[serde(alias = "LightIntensity")]
    light_intensity: i64,
    #[serde(default, alias = "TimeStamp")]
    timestamp: i64,
    #[serde(alias = "SensorNodeId", alias = "SensorId")]
    sensor_id: String,
}

/// 将原始报文解码为读数。
///
/// 必填字段缺失或类型不符返回 [`DecodeError::MalformedPayload`]；
/// sensorId 为空白返回 [`DecodeError::MissingSensorId`]。
pub fn decode(payload: &[u8]) -> Result<Reading, DecodeError> {
    let frame: ReadingFrame = serde_json::from_slice(payload)
        .map_err(|err| DecodeError::MalformedPayload(err.to_string()))?;
    if frame.sensor_id.trim().is_empty() {
        return Err(DecodeError::MissingSensorId);
    }
    Ok(Reading {
        sensor_id: frame.sensor_id,
        air_temperature: frame.air_temperature,
        air_humidity: frame.air_humidity,
        soil_moisture: frame.soil_moisture,
        light_intensity: frame.light_intensity,
        ts_ms: frame.timestamp,
    })
}

/// 将读数编码为线上 JSON。
pub fn encode(reading: &Reading) -> Result<Vec<u8>, EncodeError> {
    let frame = ReadingFrame {
        air_temperature: reading.air_temperature,
        air_humidity: reading.air_humidity,
        soil_moisture: reading.soil_moisture,
        light_intensity: reading.light_intensity,
        timestamp: reading.ts_ms,
        sensor_id: reading.sensor_id.clone(),
    };
    serde_json::to_vec(&frame).map_err(|err| EncodeError::Serialize(err.to_string()))
}
