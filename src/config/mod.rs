//! Pipeline configuration from `imgcast.toml`.
//!
//! # Module Structure
//!
//! ```text
//! config/
//! ├── section/   # [build], [cache], [serve]
//! ├── error      # ConfigError
//! ├── util       # config file discovery
//! └── mod.rs     # PipelineConfig (this file)
//! ```
//!
//! # Sections
//!
//! | Section   | Purpose                                          |
//! |-----------|--------------------------------------------------|
//! | `[build]` | Output dir, asset namespace, flushed file names  |
//! | `[cache]` | Remote source cache directory                    |
//! | `[serve]` | Development server (interface, port, public dir) |

mod error;
pub mod section;
mod util;

pub use error::ConfigError;
pub use section::{BuildConfig, CacheConfig, ServeConfig};
pub use util::find_config_file;

use std::fs;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::asset::{FilenameTemplate, namespace};

/// Default config file name.
pub const CONFIG_FILE: &str = "imgcast.toml";

/// Root configuration structure representing `imgcast.toml`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PipelineConfig {
    /// Absolute path to the config file, if one was found.
    #[serde(skip)]
    pub config_path: Option<PathBuf>,

    /// Project root: the config file's directory, or the cwd.
    #[serde(skip)]
    pub root: PathBuf,

    #[serde(default)]
    pub build: BuildConfig,

    #[serde(default)]
    pub cache: CacheConfig,

    #[serde(default)]
    pub serve: ServeConfig,
}

impl PipelineConfig {
    /// Find `config_name` upward from `cwd` and load it, or fall back to
    /// defaults rooted at `cwd` when there is none.
    pub fn discover(config_name: &Path, cwd: &Path) -> Result<Self, ConfigError> {
        let mut config = match find_config_file(config_name, cwd) {
            Some(path) => {
                let mut config = Self::from_path(&path)?;
                config.config_path = Some(path);
                config
            }
            None => Self::default(),
        };

        let root = config
            .config_path
            .as_deref()
            .and_then(Path::parent)
            .map_or_else(|| cwd.to_path_buf(), Path::to_path_buf);
        config.finalize(&root);
        config.validate()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn from_str(content: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(content)?)
    }

    fn from_path(path: &Path) -> Result<Self, ConfigError> {
        let content =
            fs::read_to_string(path).map_err(|err| ConfigError::Io(path.to_path_buf(), err))?;
        Self::from_str(&content)
    }

    /// Anchor relative paths at `root`.
    fn finalize(&mut self, root: &Path) {
        self.root = root.to_path_buf();
        for path in [
            &mut self.build.output,
            &mut self.cache.dir,
            &mut self.serve.public,
        ] {
            if path.is_relative() {
                *path = root.join(&*path);
            }
        }
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        let problems = self.build.check();
        if problems.is_empty() {
            Ok(())
        } else {
            Err(ConfigError::from_problems(&problems))
        }
    }

    /// Key prefix of every delivery path, e.g. `/assets/`.
    pub fn namespace(&self) -> String {
        namespace(&self.build.base, &self.build.assets_dir)
    }

    pub fn file_template(&self) -> FilenameTemplate {
        FilenameTemplate::parse(&self.build.file_names)
    }

    /// Apply `serve` command-line overrides.
    pub fn apply_serve_options(&mut self, interface: Option<IpAddr>, port: Option<u16>) {
        if let Some(interface) = interface {
            self.serve.interface = interface;
        }
        if let Some(port) = port {
            self.serve.port = port;
        }
    }

    /// Apply the `--output` override (relative to the root).
    pub fn apply_output(&mut self, output: Option<&Path>) {
        if let Some(output) = output {
            self.build.output = self.root.join(output);
        }
    }
}

#[cfg(test)]
pub fn test_parse_config(content: &str) -> PipelineConfig {
    PipelineConfig::from_str(content).unwrap()
}
