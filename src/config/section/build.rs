//! `[build]` section configuration.
//!
//! # Example
//!
//! ```toml
//! [build]
//! output = "dist"                        # Output directory
//! assets_dir = "assets"                  # Namespace under the public base
//! base = "/"                             # Public base path
//! file_names = "[name].[hash][extname]"  # Flushed file names, under assets_dir
//! ```
//!
//! Delivery paths are `{base}{assets_dir}/{name}@{width}w.{hash}.{ext}`.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::asset::FilenameTemplate;

/// Build output settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BuildConfig {
    /// Output directory (relative to the project root).
    pub output: PathBuf,

    /// Asset namespace, relative to `base` and to `output`.
    pub assets_dir: String,

    /// Public base path the site is served under.
    pub base: String,

    /// File name template for flushed images.
    /// Placeholders: `[name]`, `[hash]`, `[ext]`, `[extname]`.
    pub file_names: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output: PathBuf::from("dist"),
            assets_dir: "assets".to_string(),
            base: "/".to_string(),
            file_names: FilenameTemplate::DEFAULT.to_string(),
        }
    }
}

impl BuildConfig {
    /// Problems found in this section, as `(field, message)` pairs.
    pub fn check(&self) -> Vec<(&'static str, String)> {
        let mut problems = Vec::new();

        if !self.base.starts_with('/') {
            problems.push(("build.base", format!("`{}` must start with `/`", self.base)));
        }
        if self.assets_dir.trim_matches('/').is_empty() {
            problems.push(("build.assets_dir", "must not be empty".to_string()));
        }
        if has_parent_segment(&self.assets_dir) {
            problems.push(("build.assets_dir", "must not contain `..`".to_string()));
        }
        if self.file_names.trim().is_empty() {
            problems.push(("build.file_names", "must not be empty".to_string()));
        } else if self.file_names.starts_with('/') || has_parent_segment(&self.file_names) {
            problems.push((
                "build.file_names",
                "must be relative to assets_dir and must not contain `..`".to_string(),
            ));
        }

        problems
    }
}

fn has_parent_segment(path: &str) -> bool {
    path.split(['/', '\\']).any(|segment| segment == "..")
}

#[cfg(test)]
mod tests {
    use crate::config::test_parse_config;

    #[test]
    fn test_build_config() {
        let config = test_parse_config(
            "[build]\noutput = \"out\"\nassets_dir = \"_img\"\nbase = \"/blog/\"\nfile_names = \"[hash][extname]\"",
        );
        assert_eq!(config.build.output.to_str(), Some("out"));
        assert_eq!(config.build.assets_dir, "_img");
        assert_eq!(config.build.base, "/blog/");
        assert_eq!(config.build.file_names, "[hash][extname]");
    }

    #[test]
    fn test_build_config_defaults() {
        let config = test_parse_config("");
        assert_eq!(config.build.output.to_str(), Some("dist"));
        assert_eq!(config.build.assets_dir, "assets");
        assert_eq!(config.build.base, "/");
        assert_eq!(config.build.file_names, "[name].[hash][extname]");
        assert!(config.build.check().is_empty());
    }

    #[test]
    fn test_build_config_check() {
        let mut config = test_parse_config("");
        config.build.base = "blog".to_string();
        config.build.assets_dir = "../up".to_string();
        config.build.file_names = "/abs/[name]".to_string();

        let fields: Vec<_> = config.build.check().into_iter().map(|(f, _)| f).collect();
        assert_eq!(fields, ["build.base", "build.assets_dir", "build.file_names"]);
    }
}
