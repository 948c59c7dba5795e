use domain::{AGGREGATE_SENSOR_ID, Reading};

#[test]
fn reading_builds() {
    let reading = Reading {
        sensor_id: "node-1".to_string(),
        air_temperature: 21.5,
        air_humidity: 48.0,
        soil_moisture: 33.2,
        light_intensity: 640,
        ts_ms: 1_700_000_000_000,
    };

    assert_eq!(reading.sensor_id, "node-1");
    assert!(!reading.is_aggregate());
}

#[test]
fn aggregate_reading_is_flagged() {
    let reading = Reading {
        sensor_id: AGGREGATE_SENSOR_ID.to_string(),
        air_temperature: 0.0,
        air_humidity: 0.0,
        soil_moisture: 0.0,
        light_intensity: 0,
        ts_ms: 0,
    };

    assert!(reading.is_aggregate());
}
