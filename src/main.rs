use std::path::PathBuf;
use std::process::ExitCode;

use clap::Parser;
#[allow(unused_imports)]
use log::{debug, info, warn, error};

use slotatlas::logging::setup_logger;
use slotatlas::utils::timing::{ScopedTimer, TimingStats};
use slotatlas::{
    AtlasError, AtlasTexture, GraphicsDevice, RecordingDevice, UserSettings, WgpuDevice,
};

/// Pack images into a fixed-capacity GPU texture atlas and report their slots.
#[derive(Debug, Parser)]
#[command(name = "slotatlas", version, about)]
struct Args {
    /// Images to insert, in order
    #[arg(required = true)]
    images: Vec<PathBuf>,

    /// Settings file (defaults to the per-user config directory)
    #[arg(long)]
    settings: Option<PathBuf>,

    /// Side of the square grid texture in pixels
    #[arg(long)]
    atlas_resolution: Option<u32>,

    /// Side of one slot in pixels
    #[arg(long)]
    tile_resolution: Option<u32>,

    /// Array layers; 0 selects grid mode
    #[arg(long)]
    layers: Option<u32>,

    /// Premultiply color by alpha while uploading
    #[arg(long)]
    premultiply: bool,

    /// Slot ids to remove after inserting
    #[arg(long, num_args = 1..)]
    remove: Vec<u32>,

    /// Record device calls in memory instead of using a GPU
    #[arg(long)]
    dry_run: bool,

    /// Write the effective settings to this path
    #[arg(long)]
    write_settings: Option<PathBuf>,
}

fn apply_overrides(mut settings: UserSettings, args: &Args) -> UserSettings {
    if let Some(resolution) = args.atlas_resolution {
        settings.atlas_resolution = resolution;
    }
    if let Some(resolution) = args.tile_resolution {
        settings.tile_resolution = resolution;
    }
    if let Some(layers) = args.layers {
        settings.layer_count = layers;
    }
    if args.premultiply {
        settings.premultiply_alpha = true;
    }
    settings
}

fn run<D: GraphicsDevice>(
    atlas: &mut AtlasTexture,
    device: &mut D,
    args: &Args,
) -> Result<(), AtlasError> {
    let mut upload_stats = TimingStats::new("Slot upload");

    for path in &args.images {
        let image = match image::open(path) {
            Ok(image) => image.to_rgba8(),
            Err(e) => {
                warn!("Skipping {}: {}", path.display(), e);
                continue;
            }
        };

        let result = {
            let _timer = ScopedTimer::new(&mut upload_stats);
            atlas.add_image(device, &image)
        };

        match result {
            Ok((id, uv)) => {
                let [u0, v0, su, sv] = uv.to_array();
                println!(
                    "{} -> slot {id}, uv ({u0:.4}, {v0:.4}, {su:.4}, {sv:.4})",
                    path.display()
                );
            }
            Err(AtlasError::AtlasFull { capacity }) => {
                warn!("Atlas full after {capacity} images; {} not inserted", path.display());
                println!("atlas full ({capacity} slots), stopping");
                break;
            }
            Err(e) => return Err(e),
        }
    }

    for &id in &args.remove {
        atlas.remove_image(device, id)?;
        println!("removed slot {id}");
    }

    info!("{}", upload_stats.summary());
    println!(
        "{} of {} slots live",
        atlas.live_count(),
        atlas.capacity()
    );
    Ok(())
}

fn main() -> ExitCode {
    let args = Args::parse();
    setup_logger("slotatlas");

    let settings = apply_overrides(UserSettings::load(args.settings.as_deref()), &args);
    if let Some(path) = &args.write_settings {
        if let Err(e) = settings.save(Some(path.as_path())) {
            error!("{e}");
            return ExitCode::FAILURE;
        }
    }

    let mut atlas = match AtlasTexture::new(settings.to_config()) {
        Ok(atlas) => atlas,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            return ExitCode::FAILURE;
        }
    };

    let result = if args.dry_run {
        let mut device = RecordingDevice::new();
        let result = run(&mut atlas, &mut device, &args);
        info!("Dry run issued {} device calls", device.calls().len());
        result
    } else {
        match WgpuDevice::new_headless() {
            Ok(mut device) => {
                let result = run(&mut atlas, &mut device, &args);
                device.flush();
                result
            }
            Err(e) => {
                error!("Could not open a GPU device: {e}");
                eprintln!("error: {e} (try --dry-run)");
                return ExitCode::FAILURE;
            }
        }
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!("{e}");
            eprintln!("error: {e}");
            ExitCode::FAILURE
        }
    }
}
