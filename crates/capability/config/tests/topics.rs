use ghm_config::{AppConfig, ConfigError};

#[test]
fn identical_readings_and_averages_topics_are_rejected() {
    // 单独的测试进程：不与其他配置测试共享环境变量。
    unsafe {
        std::env::set_var("GHM_READINGS_TOPIC", "greenhouse/conditions");
        std::env::set_var("GHM_AVERAGES_TOPIC", "greenhouse/conditions");
    }

    let err = AppConfig::from_env().expect_err("feedback loop config");
    assert!(matches!(err, ConfigError::Invalid(key, _) if key == "GHM_AVERAGES_TOPIC"));
}
