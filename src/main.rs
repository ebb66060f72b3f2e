//! imgcast - on-demand responsive image variants.

use std::sync::Arc;

use anyhow::{Context, Result, bail};
use clap::{ColorChoice, Parser};
use imgcast::cli::{Cli, Commands, read_manifest};
use imgcast::config::PipelineConfig;
use imgcast::core::BuildMode;
use imgcast::{Pipeline, log, logger, serve};
use tokio::runtime::Runtime;

fn main() -> Result<()> {
    // Setup global Ctrl+C handler (before any blocking operations)
    serve::setup_shutdown_handler()?;

    let cli = Cli::parse();

    // Set global color override based on CLI option
    match cli.color {
        ColorChoice::Always => owo_colors::set_override(true),
        ColorChoice::Never => owo_colors::set_override(false),
        ColorChoice::Auto => {} // owo-colors auto-detects TTY
    }
    logger::set_verbose(cli.verbose);

    let cwd = std::env::current_dir().context("failed to get current working directory")?;
    let mut config = PipelineConfig::discover(&cli.config, &cwd)?;
    config.apply_output(cli.output.as_deref());
    if let Commands::Serve {
        interface, port, ..
    } = &cli.command
    {
        config.apply_serve_options(*interface, *port);
    }

    let ids = read_manifest(cli.command.manifest())?;
    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()
        .context("failed to create tokio runtime")?;
    let pipeline = Pipeline::new(config)?;

    match &cli.command {
        Commands::Build { .. } => build_all(&runtime, &pipeline, &ids),
        Commands::Serve { .. } => serve_all(&runtime, &pipeline, &ids),
    }
}

// =============================================================================
// Build Command
// =============================================================================

/// Dispatch every id, then flush file variants to the output directory.
fn build_all(runtime: &Runtime, pipeline: &Pipeline, ids: &[String]) -> Result<()> {
    let (failures, report) = runtime.block_on(async {
        let failures = pipeline.dispatch_all(ids).await;
        let report = pipeline.flush(BuildMode::PRODUCTION).await;
        (failures, report)
    });
    let report = report?;

    log!(
        "build";
        "{} written, {} failed to dispatch, {} failed to write",
        report.written.len(),
        failures.len(),
        report.failures.len()
    );
    if !failures.is_empty() || !report.is_clean() {
        bail!("build finished with errors");
    }
    Ok(())
}

// =============================================================================
// Serve Command
// =============================================================================

/// Dispatch every id, then serve variants from memory until Ctrl+C.
fn serve_all(runtime: &Runtime, pipeline: &Pipeline, ids: &[String]) -> Result<()> {
    let bound = serve::bind(pipeline.config().serve.interface, pipeline.config().serve.port)?;

    let failures = runtime.block_on(pipeline.dispatch_all(ids));
    if !failures.is_empty() {
        log!("serve"; "{} image(s) failed, serving the rest", failures.len());
    }
    log!("serve"; "{} variant(s) ready at http://{}", pipeline.store().len(), bound.addr());

    bound.run(Arc::new(pipeline.dev_server()))
}
