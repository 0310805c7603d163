//! Locating and reading the runner config file.

use std::path::{Path, PathBuf};

use super::RunnerConfig;

/// File name looked up in the working directory.
pub const LOCAL_CONFIG_FILE: &str = ".qoder-runner.toml";

/// Directory under the user config dir, e.g. `~/.config/qoder-runner`.
pub const USER_CONFIG_DIR: &str = "qoder-runner";

/// Where the loader looks for a config file.
#[derive(Debug, Clone, PartialEq, Eq)]
enum Source {
    /// Given with `--config`; must exist.
    Explicit(PathBuf),
    /// First existing candidate wins; none is fine.
    Search(Vec<PathBuf>),
}

/// Resolves the config file and parses it into a [`RunnerConfig`].
#[derive(Debug, Clone)]
pub struct ConfigLoader {
    source: Source,
}

impl ConfigLoader {
    /// Search `./.qoder-runner.toml`, then `<config dir>/qoder-runner/config.toml`.
    #[must_use]
    pub fn new() -> Self {
        let mut candidates = vec![PathBuf::from(LOCAL_CONFIG_FILE)];
        if let Some(dir) = dirs::config_dir() {
            candidates.push(dir.join(USER_CONFIG_DIR).join("config.toml"));
        }
        Self {
            source: Source::Search(candidates),
        }
    }

    /// Read exactly `path`; a missing file is an error.
    #[must_use]
    pub fn with_path(path: PathBuf) -> Self {
        Self {
            source: Source::Explicit(path),
        }
    }

    /// Candidate paths in lookup order.
    #[must_use]
    pub fn search_paths(&self) -> &[PathBuf] {
        match &self.source {
            Source::Explicit(path) => std::slice::from_ref(path),
            Source::Search(paths) => paths,
        }
    }

    /// The file that [`ConfigLoader::load`] would read, if any.
    #[must_use]
    pub fn locate(&self) -> Option<&Path> {
        match &self.source {
            Source::Explicit(path) => Some(path.as_path()),
            Source::Search(paths) => paths.iter().find(|p| p.is_file()).map(PathBuf::as_path),
        }
    }

    /// Load the config, falling back to defaults when searching finds nothing.
    ///
    /// # Errors
    ///
    /// Returns an error if an explicit file is missing, or if the chosen file
    /// cannot be read or parsed.
    pub fn load(&self) -> Result<RunnerConfig, ConfigError> {
        let Some(path) = self.locate() else {
            tracing::debug!(candidates = ?self.search_paths(), "No config file, using defaults");
            return Ok(RunnerConfig::default());
        };

        let content = std::fs::read_to_string(path).map_err(|source| {
            if source.kind() == std::io::ErrorKind::NotFound {
                ConfigError::NotFound(path.to_path_buf())
            } else {
                ConfigError::ReadError {
                    path: path.to_path_buf(),
                    source,
                }
            }
        })?;

        let config = toml::from_str(&content).map_err(|source| ConfigError::ParseError {
            path: path.to_path_buf(),
            source,
        })?;
        tracing::debug!(path = %path.display(), "Loaded config file");
        Ok(config)
    }
}

impl Default for ConfigLoader {
    fn default() -> Self {
        Self::new()
    }
}

/// Errors that can occur during configuration loading.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file {0} does not exist")]
    NotFound(PathBuf),

    #[error("Failed to read config file {path}: {source}")]
    ReadError {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {source}")]
    ParseError {
        path: PathBuf,
        source: toml::de::Error,
    },
}
