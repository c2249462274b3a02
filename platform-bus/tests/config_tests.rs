//! Bus configuration tests

use platform_bus::BusConfig;

#[test]
fn test_config_from_json() {
    let json = r#"{ "max_devices": 32, "bti_capacity": 64, "i2c_thread_prefix": "vim2-i2c" }"#;
    let config: BusConfig = serde_json::from_str(json).unwrap();
    assert_eq!(config.max_devices, 32);
    assert_eq!(config.bti_capacity, 64);
    assert_eq!(config.i2c_thread_prefix, "vim2-i2c");
    assert!(config.validate().is_ok());
}

#[test]
fn test_missing_fields_take_defaults() {
    let config: BusConfig = serde_json::from_str(r#"{ "max_devices": 8 }"#).unwrap();
    assert_eq!(config.max_devices, 8);
    assert_eq!(config.bti_capacity, BusConfig::default().bti_capacity);
    assert_eq!(config.i2c_thread_prefix, "pbus-i2c");
}

#[test]
fn test_config_round_trip() {
    let config = BusConfig::default().with_max_devices(12).with_i2c_thread_prefix("board-i2c");
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(serde_json::from_str::<BusConfig>(&json).unwrap(), config);
}

#[test]
fn test_invalid_values_parse_but_fail_validation() {
    let config: BusConfig = serde_json::from_str(r#"{ "bti_capacity": 0 }"#).unwrap();
    assert!(config.validate().is_err());
}
