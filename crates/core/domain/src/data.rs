/// 合成均值读数使用的传感器标识。
pub const AGGREGATE_SENSOR_ID: &str = "averaged";

/// 单个传感器节点在某一时刻的环境快照。
///
/// 数值字段恰好为 0 按约定表示"该传感器未上报此测量项"，
/// 参与均值计算时会被排除。`ts_ms` 在流水线接收时盖章，
/// 不信任线上报文携带的时间。
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    pub sensor_id: String,
    pub air_temperature: f64,
    pub air_humidity: f64,
    pub soil_moisture: f64,
    pub light_intensity: i64,
    pub ts_ms: i64,
}

impl Reading {
    /// 是否为聚合得到的合成读数。
    pub fn is_aggregate(&self) -> bool {
        self.sensor_id == AGGREGATE_SENSOR_ID
    }
}

/// 传输层投递的原始消息。
#[derive(Debug, Clone)]
pub struct RawMessage {
    pub topic: String,
    pub payload: Vec<u8>,
    pub received_at_ms: i64,
}
