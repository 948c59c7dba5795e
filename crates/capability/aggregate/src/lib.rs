//! 聚合存储：按传感器保存最近一次读数并按需计算全体均值。

use domain::{AGGREGATE_SENSOR_ID, Reading};
use std::collections::HashMap;

/// 聚合存储。
///
/// 每个 sensor_id 至多保留一条最新读数；同一传感器再次写入时
/// 直接覆盖（按到达顺序的 last-write-wins）。所有操作对当前状态
/// 都是全函数，没有失败分支。
#[derive(Debug, Default)]
pub struct AggregationStore {
    latest: HashMap<String, Reading>,
}

/// 单个字段的均值累加器。值为 0 的读数不参与该字段的均值。
#[derive(Debug, Default)]
struct MeanAcc {
    sum: f64,
    count: u32,
}

impl MeanAcc {
    fn add(&mut self, value: f64) {
        if value != 0.0 {
            self.sum += value;
            self.count += 1;
        }
    }

    /// 两位小数的均值；没有贡献者时为 0。
    fn mean(&self) -> f64 {
        if self.count == 0 {
            0.0
        } else {
            round2(self.sum / f64::from(self.count))
        }
    }
}

impl AggregationStore {
    pub fn new() -> Self {
        Self {
            latest: HashMap::new(),
        }
    }

    /// 写入或覆盖该传感器的最新读数。
    pub fn upsert(&mut self, reading: Reading) {
        self.latest.insert(reading.sensor_id.clone(), reading);
    }

    /// 当前跟踪的所有最新读数的稳定拷贝（非实时视图）。
    pub fn snapshot(&self) -> Vec<Reading> {
        self.latest.values().cloned().collect()
    }

    /// 当前跟踪的传感器数量。
    pub fn len(&self) -> usize {
        self.latest.len()
    }

    pub fn is_empty(&self) -> bool {
        self.latest.is_empty()
    }

    /// 计算全体传感器最新读数的合成均值。
    ///
    /// 四个数值字段各自独立取贡献者集合（该字段非 0 的读数）：
    /// 只上报湿度的传感器参与湿度均值，而不会拉低温度均值。
    /// 浮点字段四舍五入到两位小数（`f64::round`，远离零方向）；
    /// 光照使用截断整除。没有贡献者的字段结果为 0。
    /// 返回值的 `ts_ms` 为 0，由调用方盖章。
    pub fn compute_average(&self) -> Reading {
        let mut temperature = MeanAcc::default();
        let mut humidity = MeanAcc::default();
        let mut moisture = MeanAcc::default();
        let mut light_sum: i64 = 0;
        let mut light_count: i64 = 0;

        for reading in self.latest.values() {
            temperature.add(reading.air_temperature);
            humidity.add(reading.air_humidity);
            moisture.add(reading.soil_moisture);
            if reading.light_intensity != 0 {
                light_sum += reading.light_intensity;
                light_count += 1;
            }
        }

        Reading {
            sensor_id: AGGREGATE_SENSOR_ID.to_string(),
            air_temperature: temperature.mean(),
            air_humidity: humidity.mean(),
            soil_moisture: moisture.mean(),
            light_intensity: if light_count == 0 {
                0
            } else {
                light_sum / light_count
            },
            ts_ms: 0,
        }
    }
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}
