//! Layered configuration: defaults, TOML file, CLI overrides.

use std::io::Write;
use std::time::Duration;

use bridge_rpc::config::{deep_merge, overlay_at, ConfigError, ConfigOrigin};
use bridge_rpc::{EffectiveConfig, MaxRequestTime, RpcOptions};
use serde_json::json;
use tempfile::NamedTempFile;

fn toml_file(contents: &str) -> NamedTempFile {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

#[test]
fn test_defaults_only() {
    let effective = EffectiveConfig::build(None, None).unwrap();
    let rpc = effective.rpc_config().unwrap();

    assert_eq!(rpc.max_request_time, MaxRequestTime::from_millis(1000));
    assert_eq!(rpc.max_request_id, 10_000_000_000);
    assert_eq!(effective.get_str("peer.program"), Some("bridge-peer"));
    assert_eq!(effective.sources.len(), 1);
    assert_eq!(effective.sources[0].origin, ConfigOrigin::Builtin);
}

#[test]
fn test_file_then_cli_precedence() {
    let file = toml_file(
        r#"
        [rpc]
        max_request_time = 250
        max_request_id = 99

        [log]
        filter = "debug"
        "#,
    );
    let cli = overlay_at("rpc.max_request_time", json!("infinite"));

    let effective = EffectiveConfig::build(Some(file.path()), Some(cli)).unwrap();
    let rpc = effective.rpc_config().unwrap();

    assert_eq!(rpc.max_request_time, MaxRequestTime::Infinite);
    assert_eq!(rpc.max_request_id, 99);
    assert_eq!(effective.get_str("log.filter"), Some("debug"));

    let origins: Vec<ConfigOrigin> = effective.sources.iter().map(|s| s.origin.clone()).collect();
    assert_eq!(origins, vec![ConfigOrigin::Builtin, ConfigOrigin::File, ConfigOrigin::Cli]);
    assert_eq!(effective.sources[1].digest.as_ref().map(|d| d.len()), Some(64));
}

#[test]
fn test_invalid_values_are_rejected() {
    let zero_time = toml_file("[rpc]\nmax_request_time = 0\n");
    assert!(matches!(
        EffectiveConfig::build(Some(zero_time.path()), None),
        Err(ConfigError::ValidationError(_))
    ));

    let zero_id = overlay_at("rpc.max_request_id", json!(0));
    assert!(EffectiveConfig::build(None, Some(zero_id)).is_err());

    let broken = toml_file("[rpc\n");
    assert!(matches!(
        EffectiveConfig::build(Some(broken.path()), None),
        Err(ConfigError::ParseError(_))
    ));
}

#[test]
fn test_overrides_merge_without_clobbering_siblings() {
    let merged = deep_merge(
        overlay_at("rpc.max_request_time", json!(10)),
        overlay_at("rpc.max_request_id", json!(5)),
    );
    assert_eq!(merged, json!({"rpc": {"max_request_time": 10, "max_request_id": 5}}));
}

#[tokio::test]
async fn test_options_follow_config() {
    let effective =
        EffectiveConfig::build(None, Some(overlay_at("rpc.max_request_time", json!(75)))).unwrap();
    let rpc = bridge_rpc::RpcInstance::new(RpcOptions::from_config(&effective.rpc_config().unwrap()));

    assert_eq!(
        rpc.max_request_time(),
        MaxRequestTime::Finite(Duration::from_millis(75))
    );
}
