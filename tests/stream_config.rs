use std::io::Write;
use std::sync::Mutex;

use tempfile::NamedTempFile;

use defect_stream::config::{StreamConfig, TransportMode};
use defect_stream::ProfileKind;

static ENV_LOCK: Mutex<()> = Mutex::new(());

fn clear_env() {
    for key in [
        "DEFECT_STREAM_CONFIG",
        "DEFECT_STREAM_PROFILE",
        "DEFECT_STREAM_TRANSPORT",
        "DEFECT_STREAM_MIN_CONFIDENCE",
        "DEFECT_STREAM_TEMPORAL_THRESHOLD",
    ] {
        std::env::remove_var(key);
    }
}

#[test]
fn defaults_without_file_or_env() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let cfg = StreamConfig::load().expect("load config");
    assert_eq!(cfg.profile_kind, ProfileKind::Property);
    assert_eq!(cfg.profile.min_confidence, 60.0);
    assert_eq!(cfg.profile.temporal_threshold, 1);
    assert_eq!(cfg.transport, TransportMode::Live);
}

#[test]
fn loads_json_config_and_env_overrides() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    let json = r#"{
        "profile": "forensic",
        "transport": "periodic",
        "overrides": {
            "spatial_tolerance": 0.1,
            "nms_iou_threshold": 0.6
        }
    }"#;
    file.write_all(json.as_bytes()).expect("write config");

    std::env::set_var("DEFECT_STREAM_CONFIG", file.path());
    std::env::set_var("DEFECT_STREAM_TEMPORAL_THRESHOLD", "2");
    std::env::set_var("DEFECT_STREAM_MIN_CONFIDENCE", "75");

    let cfg = StreamConfig::load().expect("load config");
    assert_eq!(cfg.profile_kind, ProfileKind::Forensic);
    assert_eq!(cfg.transport, TransportMode::Periodic);
    assert_eq!(cfg.profile.dedup_window_ms, 45_000);
    assert_eq!(cfg.profile.spatial_tolerance, 0.1);
    assert_eq!(cfg.profile.nms_iou_threshold, 0.6);
    assert_eq!(cfg.profile.temporal_threshold, 2);
    assert_eq!(cfg.profile.min_confidence, 75.0);

    clear_env();
}

#[test]
fn loads_toml_config() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    let mut file = tempfile::Builder::new()
        .suffix(".toml")
        .tempfile()
        .expect("temp config");
    let toml = r#"
profile = "property"
transport = "live"

[overrides]
dedup_window_ms = 20000
temporal_threshold = 3
"#;
    file.write_all(toml.as_bytes()).expect("write config");
    std::env::set_var("DEFECT_STREAM_CONFIG", file.path());

    let cfg = StreamConfig::load().expect("load config");
    assert_eq!(cfg.profile.dedup_window_ms, 20_000);
    assert_eq!(cfg.profile.temporal_threshold, 3);
    assert_eq!(cfg.profile.spatial_tolerance, 0.15);

    clear_env();
}

#[test]
fn rejects_invalid_values() {
    let _guard = ENV_LOCK.lock().unwrap();
    clear_env();

    std::env::set_var("DEFECT_STREAM_TEMPORAL_THRESHOLD", "0");
    assert!(StreamConfig::load().is_err());
    clear_env();

    std::env::set_var("DEFECT_STREAM_MIN_CONFIDENCE", "high");
    assert!(StreamConfig::load().is_err());
    clear_env();

    std::env::set_var("DEFECT_STREAM_PROFILE", "archaeology");
    assert!(StreamConfig::load().is_err());
    clear_env();

    let mut file = NamedTempFile::new().expect("temp config");
    file.write_all(br#"{"overrides": {"iou_threshold": 2.0}}"#)
        .expect("write config");
    std::env::set_var("DEFECT_STREAM_CONFIG", file.path());
    assert!(StreamConfig::load().is_err());

    clear_env();
}
