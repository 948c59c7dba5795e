pub mod data;

pub use data::{AGGREGATE_SENSOR_ID, RawMessage, Reading};
