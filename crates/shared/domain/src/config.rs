use crate::build::BuildInfo;
use serde::Deserialize;
use std::ops::{Deref, DerefMut};
use std::path::PathBuf;
use std::sync::Arc;

/// Top-level configuration shared by the engine, storage and binaries.
#[derive(Default, Debug, Clone, Deserialize)]
#[serde(default)]
pub struct VexilConfigInner {
    pub build: BuildInfo,
    pub storage: StorageSettings,
    pub command_line: CommandLineSettings,
    pub telemetry: TelemetrySettings,
    pub log: LogSettings,
}

/// Thin Arc-wrapped config for inexpensive cloning into subsystems.
#[derive(Default, Debug, Clone, Deserialize)]
pub struct VexilConfig {
    #[serde(flatten, default)]
    inner: Arc<VexilConfigInner>,
}

impl Deref for VexilConfig {
    type Target = VexilConfigInner;

    fn deref(&self) -> &Self::Target {
        &self.inner
    }
}

impl DerefMut for VexilConfig {
    fn deref_mut(&mut self) -> &mut VexilConfigInner {
        Arc::make_mut(&mut self.inner)
    }
}

/// Where selections are persisted.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct StorageSettings {
    /// Per-session store used by non-owners.
    pub session_path: PathBuf,
    /// System-wide store used by the device owner.
    pub owner_path: PathBuf,
    /// Hand commits to a background writer instead of writing inline.
    pub background_writes: bool,
}

/// Switch names the materializer merges into.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct CommandLineSettings {
    pub enable_features_switch: String,
    pub disable_features_switch: String,
    pub force_variation_ids_switch: String,
    /// Wrap injected switches with begin/end markers.
    pub sentinels: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct TelemetrySettings {
    pub enabled: bool,
    pub histogram: String,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct LogSettings {
    pub level: String,
    pub env_filter: Option<String>,
    /// Rolling file output directory; console only when absent.
    pub dir: Option<PathBuf>,
    pub json: bool,
    pub console: bool,
}

// --- Default ---

impl Default for StorageSettings {
    fn default() -> Self {
        Self {
            session_path: PathBuf::from("flags/session.json"),
            owner_path: PathBuf::from("flags/owner.json"),
            background_writes: false,
        }
    }
}

impl Default for CommandLineSettings {
    fn default() -> Self {
        Self {
            enable_features_switch: "enable-features".to_owned(),
            disable_features_switch: "disable-features".to_owned(),
            force_variation_ids_switch: "force-variation-ids".to_owned(),
            sentinels: true,
        }
    }
}

impl Default for TelemetrySettings {
    fn default() -> Self {
        Self { enabled: true, histogram: "Launch.FlagsAtStartup".to_owned() }
    }
}

impl Default for LogSettings {
    fn default() -> Self {
        Self { level: "info".to_owned(), env_filter: None, dir: None, json: false, console: true }
    }
}
