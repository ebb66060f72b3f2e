//! Command-line interface definitions.

use clap::{ColorChoice, Parser, Subcommand};
use std::path::PathBuf;

/// Responsive image pipeline CLI
#[derive(Parser, Debug, Clone)]
#[command(version, about, long_about = None, arg_required_else_help = true)]
pub struct Cli {
    /// Control colored output (auto, always, never)
    #[arg(long, global = true, default_value = "auto")]
    pub color: ColorChoice,

    /// Print per-request details
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Output directory path (relative to project root)
    #[arg(short, long, global = true, value_hint = clap::ValueHint::DirPath)]
    pub output: Option<PathBuf>,

    /// Config file path (default: imgcast.toml)
    #[arg(short = 'C', long, global = true, default_value = "imgcast.toml", value_hint = clap::ValueHint::FilePath)]
    pub config: PathBuf,

    /// subcommands
    #[command(subcommand)]
    pub command: Commands,
}

/// Available subcommands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// Render every image in the manifest and write them to the output directory
    #[command(visible_alias = "b")]
    Build {
        /// File with one module id per line (`#` starts a comment)
        #[arg(value_hint = clap::ValueHint::FilePath)]
        manifest: PathBuf,
    },

    /// Render every image in the manifest and serve them from memory
    #[command(visible_alias = "s")]
    Serve {
        /// File with one module id per line (`#` starts a comment)
        #[arg(value_hint = clap::ValueHint::FilePath)]
        manifest: PathBuf,

        /// Network interface to bind (e.g., 127.0.0.1, 0.0.0.0)
        #[arg(short, long)]
        interface: Option<std::net::IpAddr>,

        /// Port number to listen on
        #[arg(short, long)]
        port: Option<u16>,
    },
}

impl Commands {
    pub fn manifest(&self) -> &PathBuf {
        match self {
            Self::Build { manifest } | Self::Serve { manifest, .. } => manifest,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_build() {
        let cli = Cli::try_parse_from(["imgcast", "build", "images.txt", "-v"]).unwrap();
        assert!(cli.verbose);
        assert_eq!(cli.config, PathBuf::from("imgcast.toml"));
        assert!(matches!(cli.command, Commands::Build { .. }));
        assert_eq!(cli.command.manifest(), &PathBuf::from("images.txt"));
    }

    #[test]
    fn test_parse_serve_overrides() {
        let cli = Cli::try_parse_from([
            "imgcast", "-C", "site.toml", "serve", "m.txt", "--port", "8080", "-i", "0.0.0.0",
        ])
        .unwrap();
        let Commands::Serve { port, interface, .. } = cli.command else {
            panic!("expected serve");
        };
        assert_eq!(port, Some(8080));
        assert!(interface.is_some());
        assert_eq!(cli.config, PathBuf::from("site.toml"));
    }

    #[test]
    fn test_manifest_required() {
        assert!(Cli::try_parse_from(["imgcast", "build"]).is_err());
    }
}
