//! Lightprobe: headless light-probe stitching.
//!
//! Builds project files from mirror-ball photographs, adjusts their
//! calibration and renders chart, polar, cube or preview views to float
//! TIFF files.

mod cli;
mod commands;
mod config;
mod error;

use std::process::ExitCode;

use clap::Parser;
use lightprobe_core::request::RenderRequest;
use tracing::error;
use tracing_subscriber::EnvFilter;

use cli::{Cli, Command};
use config::CliConfig;
use error::CliError;

fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

fn run(cli: Cli) -> Result<(), CliError> {
    let config = CliConfig::default();
    match cli.command {
        Command::Init { output, images } => commands::init(&output, &images),
        Command::Calibrate {
            project,
            slot,
            assignments,
            hide,
            show,
        } => {
            let hidden = match (hide, show) {
                (true, _) => Some(true),
                (_, true) => Some(false),
                _ => None,
            };
            commands::calibrate(&project, slot, &assignments, hidden)
        }
        Command::Export {
            source,
            kind,
            size,
            flags,
            output,
        } => {
            let config = config.with_overrides(cli.mesh_rows, cli.mesh_columns, size);
            commands::export(
                &source,
                &config,
                kind.into(),
                flags.render_flags(),
                &output,
            )
        }
        Command::Render {
            source,
            mode,
            face,
            width,
            height,
            pan,
            zoom,
            exposure,
            flags,
            output,
        } => {
            let config = config.with_overrides(cli.mesh_rows, cli.mesh_columns, None);
            let mode = mode.render_mode(face).ok_or(CliError::CubeFace(face))?;
            let mut request =
                RenderRequest::new(mode, width, height).with_flags(flags.render_flags());
            if let Some([x, y]) = pan.as_deref() {
                request.pan = [*x, *y];
            }
            request.zoom = zoom;
            request.exposure = exposure;
            commands::render(&source, &config, request, &output)
        }
    }
}

fn main() -> ExitCode {
    init_tracing();
    match run(Cli::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %e, "lightprobe failed");
            ExitCode::FAILURE
        }
    }
}
