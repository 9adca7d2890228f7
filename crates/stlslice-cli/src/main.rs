//! stlslice CLI - slice a mesh into cross-sections.
//!
//! Writes a JSON document next to the input by default, or a directory of
//! per-layer DXF/SVG files.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use anyhow::{bail, Context, Result};
use clap::Parser;
use log::LevelFilter;
use stlslice::{SlicerConfig, SlicerSession};

#[derive(Parser)]
#[command(name = "stlslice")]
#[command(about = "Slice a triangle mesh into 2D cross-sections", long_about = None)]
struct Cli {
    /// Mesh file to slice (.stl or .obj)
    input: PathBuf,

    /// Distance between slicing planes (model units)
    pitch: Option<f64>,

    /// Export format: json, dxf or svg
    #[arg(short, long, default_value = "json")]
    format: String,

    /// TOML configuration file
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Directory for exported files (default: next to the input)
    #[arg(short, long)]
    output_dir: Option<PathBuf>,

    /// Height of the first plane (default: the mesh's minimum Z)
    #[arg(long)]
    origin_z: Option<f64>,

    /// Endpoint distance below which segments are chained
    #[arg(long)]
    chain_tolerance: Option<f64>,

    /// Keep the raw triangle soup instead of welding vertices
    #[arg(long)]
    no_merge: bool,

    /// Print mesh information and exit
    #[arg(long)]
    info: bool,

    /// Log progress
    #[arg(short, long)]
    verbose: bool,

    /// Log debugging details
    #[arg(short, long)]
    debug: bool,
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    let log_level = if cli.debug {
        LevelFilter::Debug
    } else if cli.verbose {
        LevelFilter::Info
    } else {
        LevelFilter::Warn
    };
    env_logger::Builder::new()
        .filter_level(log_level)
        .parse_default_env()
        .format_timestamp(None)
        .init();

    let code = match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("error: {e:#}");
            ExitCode::FAILURE
        }
    };
    log::logger().flush();
    code
}

fn run(cli: Cli) -> Result<()> {
    let mut config = match &cli.config {
        Some(path) => SlicerConfig::from_file(path)
            .with_context(|| format!("failed to read config {}", path.display()))?,
        None => SlicerConfig::default(),
    };
    if let Some(pitch) = cli.pitch {
        config.pitch = pitch;
    }
    if let Some(dir) = cli.output_dir {
        config.output_dir = Some(dir);
    }
    if let Some(z) = cli.origin_z {
        config.origin_z = Some(z);
    }
    if let Some(tol) = cli.chain_tolerance {
        config.chain_tolerance = tol;
    }
    if cli.no_merge {
        config.merge_vertices = false;
    }

    let mut session = SlicerSession::new(config).context("invalid settings")?;
    session
        .load_mesh(&cli.input)
        .with_context(|| format!("failed to load {}", cli.input.display()))?;

    if cli.info {
        show_info(&session, &cli.input);
        return Ok(());
    }

    let layers = session.slice_mesh(None)?;
    let non_empty = layers.non_empty_count();
    let total = layers.len();

    if !session.export_layers(&cli.format)? {
        bail!(
            "unsupported format '{}' (expected one of: json, dxf, svg)",
            cli.format
        );
    }

    println!(
        "Sliced {} into {} layers ({} non-empty), exported as {}",
        cli.input.display(),
        total,
        non_empty,
        cli.format.to_ascii_lowercase()
    );
    Ok(())
}

fn show_info(session: &SlicerSession, path: &Path) {
    let Some(mesh) = session.mesh() else {
        return;
    };
    println!("File: {}", path.display());
    println!("Vertices: {}", mesh.vertex_count());
    println!("Faces: {}", mesh.face_count());
    println!("Units: {}", mesh.units);
    if let Some(bounds) = mesh.bounds() {
        let size = bounds.extents();
        println!(
            "Bounds: [{:.3}, {:.3}, {:.3}] to [{:.3}, {:.3}, {:.3}]",
            bounds.min.x, bounds.min.y, bounds.min.z, bounds.max.x, bounds.max.y, bounds.max.z
        );
        println!("Size: {:.3} x {:.3} x {:.3}", size.x, size.y, size.z);
    }
    if let Some(c) = mesh.centroid() {
        println!("Centroid: [{:.3}, {:.3}, {:.3}]", c.x, c.y, c.z);
    }
    println!("Watertight: {}", session.is_watertight());
}
