use clap::Parser;
use std::path::Path;
use tempfile::TempDir;
use vexil::domain::config::VexilConfig;
use vexil_cli::{Cli, execute};

const REGISTRY: &str = r#"{
    "flags": [
        {
            "internal_name": "x",
            "label": "Experiment X",
            "supported_platforms": ["all"],
            "kind": { "type": "single", "switch": { "name": "x" } }
        },
        {
            "internal_name": "y",
            "label": "Feature Y",
            "supported_platforms": ["all"],
            "kind": {
                "type": "feature_with_params",
                "feature": "FeatureY",
                "trial_name": "TrialY",
                "variations": [{ "name": "fast", "params": [{ "name": "mode", "value": "fast" }] }]
            }
        }
    ]
}"#;

struct Fixture {
    dir: TempDir,
}

impl Fixture {
    fn new() -> Self {
        let dir = TempDir::new().unwrap();
        std::fs::write(dir.path().join("registry.json"), REGISTRY).unwrap();
        Self { dir }
    }

    fn path(&self) -> &Path {
        self.dir.path()
    }

    fn config(&self) -> VexilConfig {
        let mut config = VexilConfig::default();
        config.storage.session_path = self.path().join("session.json");
        config.storage.owner_path = self.path().join("owner.json");
        config
    }

    async fn run(&self, args: &[&str]) -> String {
        self.run_with(self.config(), args).await
    }

    async fn run_with(&self, config: VexilConfig, args: &[&str]) -> String {
        let registry = self.path().join("registry.json");
        let argv = ["vexil", "--registry", registry.to_str().unwrap()].into_iter().chain(args.iter().copied());
        let cli = Cli::parse_from(argv);
        let mut out = Vec::new();
        execute(cli, config, &mut out).await.unwrap();
        String::from_utf8(out).unwrap()
    }
}

#[tokio::test]
async fn test_enable_then_list() {
    let fixture = Fixture::new();

    let out = fixture.run(&["enable", "x"]).await;
    assert!(out.contains("Restart required"));

    let out = fixture.run(&["list"]).await;
    let line = out.lines().find(|l| l.starts_with('x')).unwrap();
    assert!(line.contains("enabled"));
}

#[tokio::test]
async fn test_switches_merge_into_given_command_line() {
    let fixture = Fixture::new();
    fixture.run(&["enable", "x"]).await;
    fixture.run(&["choose", "y", "2"]).await;

    let out = fixture.run(&["switches", "--no-sentinels", "--", "--enable-features=Mine"]).await;
    assert_eq!(out.trim(), "browser --enable-features=Mine,FeatureY:mode/fast --x");
}

#[tokio::test]
async fn test_json_listing_and_reset() {
    let fixture = Fixture::new();
    fixture.run(&["enable", "y@1"]).await;

    let out = fixture.run(&["list", "--json"]).await;
    let listing: serde_json::Value = serde_json::from_str(&out).unwrap();
    let y = listing["supported"].as_array().unwrap().iter().find(|r| r["internal_name"] == "y").unwrap();
    assert_eq!(y["state"]["state"], "enabled");

    let out = fixture.run(&["reset"]).await;
    assert!(out.contains("Restart required"));
    let out = fixture.run(&["reset"]).await;
    assert!(out.contains("No change"));
}

#[tokio::test]
async fn test_missing_registry_is_an_error() {
    let fixture = Fixture::new();
    let cli = Cli::parse_from(["vexil", "--registry", "/nonexistent/registry.json", "list"]);
    let err = execute(cli, fixture.config(), &mut Vec::new()).await.unwrap_err();
    assert!(err.to_string().contains("Cannot load flag registry"));
}

#[tokio::test]
async fn test_background_writes_are_flushed_before_exit() {
    let fixture = Fixture::new();
    let mut config = fixture.config();
    config.storage.background_writes = true;

    fixture.run_with(config, &["enable", "x"]).await;

    let stored = std::fs::read_to_string(fixture.path().join("session.json")).unwrap();
    assert!(stored.contains("\"x\""), "unexpected session file: {stored}");
}
