//! CLI configuration management.
//!
//! Reads/writes JSON at `$XDG_CONFIG_HOME/slotkeeper/config.json`
//! (`~/.config/slotkeeper/config.json` when unset).

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use slotkeeper_file_ops::expand_home;
use slotkeeper_install::PipelineConfig;

/// On-disk config format.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ConfigFile {
    #[serde(default)]
    install_root: String,
    #[serde(default)]
    library_root: String,
    #[serde(default)]
    metadata_path: String,
    /// `None` keeps the default runner; an empty string runs the game
    /// directly.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    runner: Option<String>,
}

/// CLI configuration with `~` already expanded.
#[derive(Debug, Clone)]
pub struct CliConfig {
    pub install_root: PathBuf,
    pub library_root: PathBuf,
    pub metadata_path: PathBuf,
    /// Program the game executable is handed to; empty runs it directly.
    pub runner: String,
    file_path: PathBuf,
}

const DEFAULT_INSTALL_ROOT: &str = "~/.steam/root/steamapps/common";
const DEFAULT_LIBRARY_ROOT: &str = "~/.local/share/slotkeeper";
const DEFAULT_METADATA_PATH: &str = "~/.local/share/slotkeeper/metadata.json";
const DEFAULT_RUNNER: &str = "wine";

impl Default for CliConfig {
    fn default() -> Self {
        Self {
            install_root: expand_home(DEFAULT_INSTALL_ROOT),
            library_root: expand_home(DEFAULT_LIBRARY_ROOT),
            metadata_path: expand_home(DEFAULT_METADATA_PATH),
            runner: DEFAULT_RUNNER.into(),
            file_path: config_file_path(),
        }
    }
}

impl CliConfig {
    /// Loads configuration from `path`, or from the default location.
    ///
    /// A missing or unparsable file yields defaults.
    pub fn load(path: Option<&Path>) -> anyhow::Result<Self> {
        let file_path = path.map(Path::to_path_buf).unwrap_or_else(config_file_path);
        let mut config = CliConfig {
            file_path: file_path.clone(),
            ..Default::default()
        };

        if file_path.exists() {
            let content = std::fs::read_to_string(&file_path)?;
            if let Ok(file) = serde_json::from_str::<ConfigFile>(&content) {
                if !file.install_root.is_empty() {
                    config.install_root = expand_home(&file.install_root);
                }
                if !file.library_root.is_empty() {
                    config.library_root = expand_home(&file.library_root);
                }
                if !file.metadata_path.is_empty() {
                    config.metadata_path = expand_home(&file.metadata_path);
                }
                if let Some(runner) = file.runner {
                    config.runner = runner;
                }
            } else {
                tracing::warn!(
                    path = %file_path.display(),
                    "failed to parse config, using defaults"
                );
            }
        }

        Ok(config)
    }

    /// Saves configuration to disk.
    pub fn save(&self) -> anyhow::Result<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let file = ConfigFile {
            install_root: self.install_root.to_string_lossy().into_owned(),
            library_root: self.library_root.to_string_lossy().into_owned(),
            metadata_path: self.metadata_path.to_string_lossy().into_owned(),
            runner: Some(self.runner.clone()),
        };

        let json = serde_json::to_string_pretty(&file)?;
        std::fs::write(&self.file_path, &json)?;
        set_permissions_0600(&self.file_path);

        tracing::debug!(path = %self.file_path.display(), "configuration saved");
        Ok(())
    }

    pub fn file_path(&self) -> &Path {
        &self.file_path
    }

    /// Roots handed to the pipeline.
    pub fn pipeline_config(&self) -> PipelineConfig {
        PipelineConfig {
            install_root: self.install_root.clone(),
            library_root: self.library_root.clone(),
        }
    }
}

fn set_permissions_0600(path: &Path) {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let _ = std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o600));
    }
    #[cfg(not(unix))]
    {
        let _ = path;
    }
}

fn config_file_path() -> PathBuf {
    config_base_dir().join("slotkeeper").join("config.json")
}

fn config_base_dir() -> PathBuf {
    match std::env::var_os("XDG_CONFIG_HOME") {
        Some(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => slotkeeper_file_ops::home_dir().join(".config"),
    }
}
