use std::path::{Path, PathBuf};

use anyhow::{Context, Result, bail};
use serde::{Deserialize, Serialize};
use trafficlight::StreamConfig;

const APP_DIR: &str = "trafficlight";
const CONFIG_FILE: &str = "config.toml";
const CREDENTIALS_FILE: &str = "credentials.toml";

/// Contents of the TOML configuration file.
///
/// ```toml
/// credentials_file = "/path/to/credentials.toml"
///
/// [stream]
/// stale_threshold_ms = 15000
/// tick_period_ms = 1000
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Where secrets are stored; defaults to `credentials.toml` next to the
    /// configuration file
    pub credentials_file: Option<PathBuf>,
    pub stream: StreamConfig,
    #[serde(skip)]
    source: Option<PathBuf>,
}

impl AppConfig {
    /// `<config dir>/trafficlight/config.toml`
    pub fn default_path() -> Option<PathBuf> {
        dirs::config_dir().map(|dir| dir.join(APP_DIR).join(CONFIG_FILE))
    }

    /// Load the configuration.
    ///
    /// An explicit `path` must exist. The default location is optional and
    /// falls back to built-in defaults.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let (path, required) = match path {
            Some(path) => (Some(path.to_path_buf()), true),
            None => (Self::default_path(), false),
        };

        let mut config = match &path {
            Some(path) if path.exists() => {
                let content = std::fs::read_to_string(path)
                    .with_context(|| format!("Failed to read {}", path.display()))?;
                toml::from_str::<Self>(&content)
                    .with_context(|| format!("Failed to parse {}", path.display()))?
            }
            Some(path) if required => bail!("Configuration file {} not found", path.display()),
            _ => Self::default(),
        };

        config.stream.validate()?;
        config.source = path;
        Ok(config)
    }

    pub fn with_credentials_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.credentials_file = Some(path.into());
        self
    }

    /// File the credential store reads and writes.
    pub fn credentials_path(&self) -> Result<PathBuf> {
        if let Some(path) = &self.credentials_file {
            return Ok(path.clone());
        }

        let dir = match &self.source {
            Some(source) => source.parent().map(Path::to_path_buf),
            None => dirs::config_dir().map(|dir| dir.join(APP_DIR)),
        };
        dir.map(|dir| dir.join(CREDENTIALS_FILE))
            .context("Could not determine a location for the credentials file")
    }

    pub fn show(&self) -> Result<String> {
        toml::to_string_pretty(self).context("Failed to serialize configuration")
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::*;

    #[test]
    fn overrides_are_merged_with_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(
            &path,
            "[stream]\nstale_threshold_ms = 30000\nstatus_event = \"light_changed\"\n",
        )
        .unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(config.stream.stale_threshold(), Duration::from_secs(30));
        assert_eq!(config.stream.status_event, "light_changed");
        assert_eq!(config.stream.tick_period(), Duration::from_secs(1));
        assert_eq!(
            config.credentials_path().unwrap(),
            dir.path().join("credentials.toml")
        );
    }

    #[test]
    fn explicit_credentials_file_wins() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "credentials_file = \"/tmp/secrets.toml\"\n").unwrap();

        let config = AppConfig::load(Some(&path)).unwrap();
        assert_eq!(
            config.credentials_path().unwrap(),
            PathBuf::from("/tmp/secrets.toml")
        );
    }

    #[test]
    fn builder_sets_credentials_file() {
        let config = AppConfig::default().with_credentials_file("/tmp/other.toml");
        assert_eq!(
            config.credentials_path().unwrap(),
            PathBuf::from("/tmp/other.toml")
        );
    }

    #[test]
    fn missing_explicit_file_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        assert!(AppConfig::load(Some(&dir.path().join("nope.toml"))).is_err());
    }

    #[test]
    fn invalid_values_are_rejected() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("config.toml");
        std::fs::write(&path, "[stream]\ntick_period_ms = 0\n").unwrap();
        assert!(AppConfig::load(Some(&path)).is_err());
    }

    #[test]
    fn show_renders_toml() {
        let shown = AppConfig::default().show().unwrap();
        assert!(shown.contains("[stream]"));
        assert!(shown.contains("stale_threshold_ms = 15000"));
    }
}
