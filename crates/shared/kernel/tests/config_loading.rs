use serial_test::serial;
use std::fs;
use vexil_kernel::config::{ConfigError, ConfigLoader, load_config};
use vexil_kernel::domain::Channel;
use vexil_kernel::domain::config::VexilConfig;

fn write_toml(dir: &tempfile::TempDir, body: &str) -> std::path::PathBuf {
    let path = dir.path().join("vexil.toml");
    fs::write(&path, body).expect("write config");
    path
}

#[test]
#[serial]
fn loads_file_values_over_defaults() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_toml(
        &dir,
        r#"
[build]
milestone = 118
channel = "dev"

[telemetry]
histogram = "Test.Flags"
"#,
    );

    let cfg: VexilConfig = ConfigLoader::new().path(&path).env_source(Default::default()).load().expect("load");
    assert_eq!(cfg.build.milestone, 118);
    assert_eq!(cfg.build.channel, Channel::Dev);
    assert_eq!(cfg.telemetry.histogram, "Test.Flags");
    assert!(cfg.telemetry.enabled);
    assert_eq!(cfg.command_line.enable_features_switch, "enable-features");
}

#[test]
#[serial]
fn environment_overrides_file() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_toml(&dir, "[build]\nmilestone = 100\n");

    let mut env = config::Map::new();
    env.insert("VEXIL__BUILD__MILESTONE".to_owned(), "120".to_owned());
    env.insert("VEXIL__STORAGE__BACKGROUND_WRITES".to_owned(), "true".to_owned());

    let cfg: VexilConfig = ConfigLoader::new().path(&path).env_source(env).load().expect("load");
    assert_eq!(cfg.build.milestone, 120);
    assert!(cfg.storage.background_writes);
}

#[test]
#[serial]
fn explicit_missing_file_is_an_error() {
    let dir = tempfile::tempdir().expect("tempdir");
    let missing = dir.path().join("absent.toml");

    let err = load_config::<VexilConfig>(Some(&missing)).unwrap_err();
    assert!(matches!(err, ConfigError::Config { .. }));
    assert!(err.to_string().contains("Failed to build config"));
}

#[test]
#[serial]
fn malformed_values_fail_deserialization() {
    let dir = tempfile::tempdir().expect("tempdir");
    let path = write_toml(&dir, "[build]\nmilestone = \"soon\"\n");

    let err = ConfigLoader::new()
        .path(&path)
        .env_source(Default::default())
        .load::<VexilConfig>()
        .unwrap_err();
    assert!(err.to_string().contains("Failed to deserialize config"));
}
