use serde_json::json;
use vexil_domain::config::{CommandLineSettings, StorageSettings, TelemetrySettings, VexilConfig};
use vexil_domain::{Channel, Platform};

#[test]
fn config_defaults_are_sane() {
    let storage = StorageSettings::default();
    assert_eq!(storage.session_path, std::path::PathBuf::from("flags/session.json"));
    assert!(!storage.background_writes);

    let cl = CommandLineSettings::default();
    assert_eq!(cl.enable_features_switch, "enable-features");
    assert_eq!(cl.disable_features_switch, "disable-features");
    assert!(cl.sentinels);

    let telemetry = TelemetrySettings::default();
    assert!(telemetry.enabled);
    assert_eq!(telemetry.histogram, "Launch.FlagsAtStartup");

    let cfg = VexilConfig::default();
    assert_eq!(cfg.build.milestone, 0);
    assert_eq!(cfg.build.platform, Platform::current());
}

#[test]
fn vexil_config_deserializes() {
    let raw = json!({
        "build": {
            "milestone": 110,
            "channel": "beta",
            "platform": ["chromeos"],
            "capabilities": ["webgpu"]
        },
        "storage": { "owner_path": "/var/lib/flags.json", "background_writes": true },
        "telemetry": { "enabled": false }
    });

    let cfg: VexilConfig = serde_json::from_value(raw).expect("config deserialize");
    assert_eq!(cfg.build.milestone, 110);
    assert_eq!(cfg.build.channel, Channel::Beta);
    assert_eq!(cfg.build.platform, Platform::CHROMEOS);
    assert!(cfg.build.has_capability("webgpu"));
    assert_eq!(cfg.storage.owner_path, std::path::PathBuf::from("/var/lib/flags.json"));
    assert_eq!(cfg.storage.session_path, std::path::PathBuf::from("flags/session.json"));
    assert!(!cfg.telemetry.enabled);
    assert_eq!(cfg.command_line.force_variation_ids_switch, "force-variation-ids");
}

#[test]
fn config_is_copy_on_write() {
    let original = VexilConfig::default();
    let mut changed = original.clone();
    changed.build.show_all = true;

    assert!(!original.build.show_all);
    assert!(changed.build.show_all);
}
