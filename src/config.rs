use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::capture::SIDECAR_EXTENSION;

/// Top-level configuration for ev-shift.
///
/// Controls how generated presets are named, the EV steps behind the four
/// shift actions, where sidecars live, and output behavior (dry run, backups).
///
/// # Loading
///
/// ```rust,no_run
/// use ev_shift::config::Config;
///
/// // From a JSON file
/// let config = Config::load(Some("config.json".as_ref())).unwrap();
///
/// // Or use defaults and customize
/// let mut config = Config::default();
/// config.output.dry_run = true;
/// ```
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Naming of the temporary presets.
    pub style: StyleConfig,
    /// EV offsets used by the shift actions.
    pub steps: StepConfig,
    /// Sidecar location.
    pub sidecar: SidecarConfig,
    /// Output behavior (dry run, backups).
    pub output: OutputConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleConfig {
    /// Prefix of every generated preset name; a timestamp is appended.
    pub name_prefix: String,
}

/// EV offsets for the `minus-one`, `minus-third`, `plus-third` and `plus-one` actions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StepConfig {
    pub minus_one: f32,
    pub minus_third: f32,
    pub plus_third: f32,
    pub plus_one: f32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SidecarConfig {
    /// Extension appended to the image file name (`IMG_0001.CR2` → `IMG_0001.CR2.xmp`).
    pub extension: String,
}

/// Output behavior configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// If `true`, report what would change without writing any sidecar.
    pub dry_run: bool,
    /// If `true`, create a `.bak` copy of a sidecar before its first modification.
    pub backup_sidecars: bool,
}

impl Default for StyleConfig {
    fn default() -> Self {
        Self {
            name_prefix: "ev-shift".to_string(),
        }
    }
}

impl Default for StepConfig {
    fn default() -> Self {
        Self {
            minus_one: -1.0,
            minus_third: -1.0 / 3.0,
            plus_third: 1.0 / 3.0,
            plus_one: 1.0,
        }
    }
}

impl Default for SidecarConfig {
    fn default() -> Self {
        Self {
            extension: SIDECAR_EXTENSION.to_string(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            backup_sidecars: true,
        }
    }
}

impl Config {
    /// Resolve the config file path: `config.json` beside the executable.
    pub fn config_path() -> Result<PathBuf> {
        let exe_path = std::env::current_exe().context("Cannot locate the ev-shift executable")?;
        exe_path
            .parent()
            .map(|dir| dir.join("config.json"))
            .context("Executable has no parent directory")
    }

    /// Load config from `path`, or from [`Config::config_path`].
    ///
    /// A missing file yields the defaults. A file that exists must parse and
    /// pass [`Config::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        let config_path = Self::resolve(path)?;

        let contents = match std::fs::read_to_string(&config_path) {
            Ok(contents) => contents,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                log::warn!(
                    "No config at {}, using default EV steps and sidecar settings",
                    config_path.display()
                );
                return Ok(Self::default());
            }
            Err(e) => {
                return Err(e).with_context(|| format!("Cannot read {}", config_path.display()));
            }
        };

        let config: Config = serde_json::from_str(&contents)
            .with_context(|| format!("Invalid config JSON in {}", config_path.display()))?;
        config
            .validate()
            .with_context(|| format!("Rejected config {}", config_path.display()))?;
        log::debug!("Loaded config from {}", config_path.display());
        Ok(config)
    }

    /// Write this config as pretty JSON to `path`, or to [`Config::config_path`].
    pub fn save(&self, path: Option<&Path>) -> Result<()> {
        let config_path = Self::resolve(path)?;
        let contents = serde_json::to_string_pretty(self).context("Cannot serialize config")?;
        std::fs::write(&config_path, contents)
            .with_context(|| format!("Cannot write {}", config_path.display()))?;
        log::info!("Config saved to {}", config_path.display());
        Ok(())
    }

    fn resolve(path: Option<&Path>) -> Result<PathBuf> {
        match path {
            Some(p) => Ok(p.to_path_buf()),
            None => Self::config_path(),
        }
    }

    /// Reject values that would produce broken presets or sidecar paths.
    pub fn validate(&self) -> Result<()> {
        let prefix = &self.style.name_prefix;
        if prefix.trim().is_empty() {
            anyhow::bail!("style.name_prefix must not be empty");
        }
        if prefix.contains(['<', '>', '&']) {
            anyhow::bail!("style.name_prefix must not contain markup characters: {prefix:?}");
        }
        if self.sidecar.extension.is_empty() || self.sidecar.extension.contains(['/', '\\']) {
            anyhow::bail!("sidecar.extension is invalid: {:?}", self.sidecar.extension);
        }
        let steps = [
            self.steps.minus_one,
            self.steps.minus_third,
            self.steps.plus_third,
            self.steps.plus_one,
        ];
        if steps.iter().any(|s| !s.is_finite()) {
            anyhow::bail!("steps must be finite numbers");
        }
        Ok(())
    }
}
