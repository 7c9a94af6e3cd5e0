use assertables::assert_contains;
use canode_common::{
    node_config::ConfigLoadError, CommParams, NmtControl, NodeConfig, NodeId,
};

#[test]
fn test_full_config() {
    const CONFIG: &str = r#"
        node_id = 12
        bitrate_kbps = 250
        tick_period_us = 500

        [communication]
        nmt_control = 0x0100
        first_heartbeat_ms = 100
        sdo_server_timeout_ms = 2000
        sdo_client_timeout_ms = 750
        sdo_client_block_transfer = true
    "#;

    let config = NodeConfig::load_from_str(CONFIG).expect("Failed to parse node config");
    assert_eq!(NodeId::new(12).unwrap(), config.node_id);
    assert_eq!(250, config.bitrate_kbps);
    assert_eq!(500, config.tick_period_us);
    assert_eq!(
        CommParams {
            nmt_control: NmtControl::STARTUP_TO_OPERATIONAL,
            first_heartbeat_ms: 100,
            sdo_server_timeout_ms: 2000,
            sdo_client_timeout_ms: 750,
            sdo_client_block_transfer: true,
        },
        config.communication
    );
}

/// Fields left out of the file take their default values
#[test]
fn test_defaults() {
    let config = NodeConfig::load_from_str("bitrate_kbps = 1000").unwrap();
    assert_eq!(NodeId::Unconfigured, config.node_id);
    assert_eq!(1000, config.bitrate_kbps);
    assert_eq!(1000, config.tick_period_us);
    assert_eq!(CommParams::default(), config.communication);

    let config = NodeConfig::load_from_str("node_id = 255").unwrap();
    assert!(config.node_id.is_unconfigured());
}

#[test]
fn test_invalid_configs() {
    let err = NodeConfig::load_from_str("node_id = 0").unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));
    assert_contains!(err.to_string(), "Invalid node ID 0");

    let err = NodeConfig::load_from_str("node_id = 5\nunknown = 1").unwrap_err();
    assert!(matches!(err, ConfigLoadError::Parse { .. }));

    let err = NodeConfig::load_from_str("tick_period_us = 0").unwrap_err();
    assert!(matches!(err, ConfigLoadError::InvalidTickPeriod));
}

#[test]
fn test_missing_file() {
    let err = NodeConfig::load_from_file("/nonexistent/canode.toml").unwrap_err();
    assert!(matches!(err, ConfigLoadError::Io { .. }));
}
