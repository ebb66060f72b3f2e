//! Build mode for production/development runs.

/// Build mode configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildMode {
    /// Whether completed file variants are written to the output directory
    /// at the end of the run.
    pub write_assets: bool,
}

impl BuildMode {
    /// Production mode: flush file variants to disk.
    pub const PRODUCTION: Self = Self { write_assets: true };

    /// Development mode: variants stay in memory and are served live.
    pub const DEVELOPMENT: Self = Self {
        write_assets: false,
    };
}
