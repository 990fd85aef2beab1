//! polyptych CLI: calibrate a wall of e-paper panels from a photo and
//! drive it with tiled images.

use std::path::{Path, PathBuf};
use std::process::ExitCode;

use clap::{ArgAction, Args, Parser, Subcommand};
use log::{info, LevelFilter};
use thiserror::Error;

use polyptych::core::RansacParams;
use polyptych::layout::{
    read_layout, write_layout, LayoutFileError, RegistryError, ScreenRegistry,
};
use polyptych::marker::{build_payload, render_marker, EncodeError};
use polyptych::pipeline;
use polyptych::tile::{panel_tile, scale_to_layout, TileError, TransportError};
use polyptych::{
    clear_panels, send_layout_image, DispatchReport, HttpTransport, ReconstructParams, Transport,
};

#[derive(Debug, Error)]
enum CliError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Image(#[from] image::ImageError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    #[error(transparent)]
    Registry(#[from] RegistryError),
    #[error(transparent)]
    LayoutFile(#[from] LayoutFileError),
    #[error(transparent)]
    Tile(#[from] TileError),
    #[error(transparent)]
    Transport(#[from] TransportError),
    #[error("{failed} of {total} panels failed")]
    PartialFailure { failed: usize, total: usize },
    #[error("{0}")]
    Usage(String),
}

#[derive(Parser)]
#[command(name = "polyptych")]
#[command(about = "Tile images across a wall of networked e-paper panels, calibrated from a photo")]
#[command(version)]
struct Cli {
    /// Log more (-v debug, -vv trace). RUST_LOG overrides.
    #[arg(short, long, action = ArgAction::Count, global = true)]
    verbose: u8,

    /// Extra screen types JSON, merged over the built-ins.
    #[arg(long, global = true)]
    registry: Option<PathBuf>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Push identification markers to panels, or render one to a file.
    Marker(MarkerArgs),

    /// Reconstruct the panel layout from a photograph of the wall.
    Calibrate(CalibrateArgs),

    /// Tile an image across a saved layout and deliver it.
    Send(SendArgs),

    /// Blank every panel in a saved layout.
    Clear {
        /// Path to the layout JSON.
        #[arg(long)]
        layout: PathBuf,
    },

    /// Query one panel and print what it reports.
    Info {
        /// Device host (IP or hostname).
        #[arg(long)]
        device: String,
    },
}

#[derive(Debug, Clone, Args)]
struct MarkerArgs {
    /// Devices to query and push markers to.
    #[arg(long, num_args = 1..)]
    devices: Vec<String>,

    /// Render offline for this device id instead of pushing.
    #[arg(long, conflicts_with = "devices")]
    device_id: Option<String>,

    /// Screen type recorded in the offline marker.
    #[arg(long, requires = "device_id")]
    screen_type: Option<String>,

    /// Panel width in pixels (defaults to the screen type's native width).
    #[arg(long, requires = "device_id")]
    width: Option<u32>,

    /// Panel height in pixels (defaults to the screen type's native height).
    #[arg(long, requires = "device_id")]
    height: Option<u32>,

    /// Output bitmap path for offline rendering.
    #[arg(long, requires = "device_id")]
    out: Option<PathBuf>,
}

#[derive(Debug, Clone, Args)]
struct CalibrateArgs {
    /// Photograph of the wall with every panel showing its marker.
    #[arg(long)]
    photo: PathBuf,

    /// Where to write the reconstructed layout JSON.
    #[arg(long, default_value = "layout.json")]
    out: PathBuf,

    /// Width over height every marker shows on an undistorted wall.
    #[arg(long, default_value = "1.45")]
    aspect_ratio: f64,

    /// Margin between the wall origin and the nearest panel, millimeters.
    #[arg(long, default_value = "20.0")]
    margin_mm: f64,

    /// RANSAC inlier threshold in pixels for the perspective fit.
    #[arg(long, default_value = "5.0")]
    ransac_threshold_px: f64,

    /// Maximum RANSAC iterations for the perspective fit.
    #[arg(long, default_value = "500")]
    ransac_iterations: usize,
}

#[derive(Debug, Clone, Args)]
struct SendArgs {
    /// Source image to tile across the wall.
    #[arg(long)]
    image: PathBuf,

    /// Path to the layout JSON produced by `calibrate`.
    #[arg(long)]
    layout: PathBuf,

    /// Write per-panel tiles to files instead of pushing them.
    #[arg(long)]
    dry_run: bool,

    /// Directory for --dry-run tiles.
    #[arg(long, default_value = "tiles")]
    out_dir: PathBuf,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logger(cli.verbose);
    match run(&cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("error: {err}");
            ExitCode::FAILURE
        }
    }
}

fn init_logger(verbose: u8) {
    let level = match verbose {
        0 => LevelFilter::Info,
        1 => LevelFilter::Debug,
        _ => LevelFilter::Trace,
    };
    env_logger::Builder::new()
        .filter_level(level)
        .parse_default_env()
        .init();
}

fn run(cli: &Cli) -> Result<(), CliError> {
    let registry = match &cli.registry {
        Some(path) => ScreenRegistry::load_json(path)?,
        None => ScreenRegistry::default(),
    };
    match &cli.command {
        Commands::Marker(args) => run_marker(args, &registry),
        Commands::Calibrate(args) => run_calibrate(args, &registry),
        Commands::Send(args) => run_send(args),
        Commands::Clear { layout } => run_clear(layout),
        Commands::Info { device } => run_info(device),
    }
}

fn run_marker(args: &MarkerArgs, registry: &ScreenRegistry) -> Result<(), CliError> {
    if let Some(device_id) = &args.device_id {
        let (Some(screen_type), Some(out)) = (&args.screen_type, &args.out) else {
            return Err(CliError::Usage(
                "offline rendering needs --screen-type and --out".into(),
            ));
        };
        let (width, height) = match (args.width, args.height) {
            (Some(w), Some(h)) => (w, h),
            (w, h) => {
                let spec = registry.require(screen_type)?;
                (
                    w.unwrap_or(spec.native_width_px),
                    h.unwrap_or(spec.native_height_px),
                )
            }
        };
        let payload = build_payload(device_id, screen_type, width, height);
        let marker = render_marker(&payload)?;
        marker.save(out)?;
        println!("{device_id}: marker written to {}", out.display());
        return Ok(());
    }
    if args.devices.is_empty() {
        return Err(CliError::Usage(
            "pass --devices to push markers or --device-id to render one offline".into(),
        ));
    }
    let transport = HttpTransport::new()?;
    let report = pipeline::display_markers(&transport, &args.devices);
    print_report(&report)
}

fn run_calibrate(args: &CalibrateArgs, registry: &ScreenRegistry) -> Result<(), CliError> {
    let params = ReconstructParams {
        known_aspect_ratio: args.aspect_ratio,
        margin_mm: args.margin_mm,
        ransac: RansacParams {
            inlier_threshold: args.ransac_threshold_px,
            max_iterations: args.ransac_iterations,
            ..RansacParams::default()
        },
    };

    let photo = image::open(&args.photo)?;
    let layout = pipeline::layout_from_photo(&photo, registry, &params);
    if layout.is_empty() {
        return Err(CliError::Usage(format!(
            "no usable markers found in {}",
            args.photo.display()
        )));
    }
    write_layout(&args.out, &layout)?;

    for placement in layout.values() {
        println!(
            "{}: {} at ({:.1}, {:.1}) mm, {:.0}x{:.0} mm, rotated {:.0} deg",
            placement.device_id,
            placement.screen_type,
            placement.position.x,
            placement.position.y,
            placement.detected_size.width,
            placement.detected_size.height,
            placement.rotation_deg
        );
    }
    info!(
        "layout with {} panels written to {}",
        layout.len(),
        args.out.display()
    );
    Ok(())
}

fn run_send(args: &SendArgs) -> Result<(), CliError> {
    let layout = read_layout(&args.layout)?;
    let source = image::open(&args.image)?;

    if args.dry_run {
        let scaled = scale_to_layout(&source, &layout)?;
        std::fs::create_dir_all(&args.out_dir)?;
        for placement in layout.values() {
            let tile = panel_tile(&scaled, placement);
            let path = args.out_dir.join(format!("{}.png", placement.device_id));
            tile.save(&path)?;
            println!("{}: tile written to {}", placement.device_id, path.display());
        }
        return Ok(());
    }

    let transport = HttpTransport::new()?;
    let report = send_layout_image(&transport, &layout, &source)?;
    print_report(&report)
}

fn run_clear(layout_path: &Path) -> Result<(), CliError> {
    let layout = read_layout(layout_path)?;
    if layout.is_empty() {
        return Err(CliError::Usage("layout has no panels".into()));
    }
    let transport = HttpTransport::new()?;
    let report = clear_panels(&transport, &layout);
    print_report(&report)
}

fn run_info(device: &str) -> Result<(), CliError> {
    let transport = HttpTransport::new()?;
    let device_info = transport.query(device)?;
    println!("device:       {device}");
    println!("screen model: {}", device_info.screen_model);
    println!(
        "resolution:   {}x{}",
        device_info.width, device_info.height
    );
    println!("temperature:  {} C", device_info.temperature);
    Ok(())
}

fn print_report(report: &DispatchReport) -> Result<(), CliError> {
    for (device_id, outcome) in &report.outcomes {
        match outcome {
            Ok(()) => println!("{device_id}: ok"),
            Err(err) => println!("{device_id}: failed ({err})"),
        }
    }
    let failed = report.failed().len();
    if failed > 0 {
        return Err(CliError::PartialFailure {
            failed,
            total: report.outcomes.len(),
        });
    }
    Ok(())
}
