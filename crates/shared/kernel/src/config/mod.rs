use config::{Config, Environment, File, Map};
use serde::de::DeserializeOwned;
use std::borrow::Cow;
use std::path::{Path, PathBuf};
use tracing::info;

/// Prefix of environment overrides (`VEXIL__BUILD__MILESTONE=120`).
pub const ENV_PREFIX: &str = "VEXIL";
const ENV_SEPARATOR: &str = "__";
const DEFAULT_FILE: &str = "vexil";

/// Custom error type for config loading.
#[vexil_derive::vexil_error]
pub enum ConfigError {
    #[error("Config error{}: {source}", format_context(.context))]
    Config { source: config::ConfigError, context: Option<Cow<'static, str>> },
}

/// Layered configuration loader: a file source overlaid with environment
/// overrides.
///
/// The file is required when given explicitly. Without a path the loader looks
/// for `vexil.{toml,json,yaml,...}` in the working directory and falls back to
/// defaults when it is missing.
#[derive(Debug, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: Option<Map<String, String>>,
}

impl ConfigLoader {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn path(mut self, path: impl AsRef<Path>) -> Self {
        self.path = Some(path.as_ref().to_path_buf());
        self
    }

    /// Replaces the process environment with `vars` as the override source.
    #[must_use]
    pub fn env_source(mut self, vars: Map<String, String>) -> Self {
        self.env = Some(vars);
        self
    }

    /// Builds and deserializes the configuration.
    ///
    /// # Errors
    /// * [`ConfigError::Config`] if an explicit file is missing, a source is
    ///   malformed, or the merged values do not fit `T`.
    pub fn load<T>(self) -> Result<T, ConfigError>
    where
        T: DeserializeOwned,
    {
        let (file, required) = match &self.path {
            Some(path) => (path.clone(), true),
            None => (PathBuf::from(DEFAULT_FILE), false),
        };

        let builder = Config::builder()
            .add_source(File::from(file.as_path()).required(required))
            .add_source(
                Environment::with_prefix(ENV_PREFIX)
                    .separator(ENV_SEPARATOR)
                    .convert_case(config::Case::Snake)
                    .try_parsing(true)
                    .source(self.env),
            );

        info!(path = %file.display(), required, "Loading config");

        let config = builder
            .build()
            .context("Failed to build config")?
            .try_deserialize::<T>()
            .context("Failed to deserialize config")?;

        Ok(config)
    }
}

/// Loads `T` from `path` (or the default `vexil.*` file) plus `VEXIL__*`
/// environment overrides. Nested keys use double underscores:
/// `VEXIL__STORAGE__BACKGROUND_WRITES=true` maps to `storage.background_writes`.
///
/// # Errors
/// This function will return an error if:
/// * The specified configuration file cannot be found.
/// * The content of the file does not match the structure of type `T`.
///
/// # Example
/// ```rust
/// use vexil_kernel::config::load_config;
///
/// #[derive(Default, serde::Deserialize)]
/// struct AppConfig {
///     milestone: u32,
/// }
///
/// let cfg: AppConfig = load_config(Some("config/local")).unwrap_or_default();
/// ```
pub fn load_config<T>(path: Option<impl AsRef<Path>>) -> Result<T, ConfigError>
where
    T: DeserializeOwned,
{
    match path {
        Some(path) => ConfigLoader::new().path(path).load(),
        None => ConfigLoader::new().load(),
    }
}
