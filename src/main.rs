//! Tidewright - Spectral ocean synthesizer
//!
//! Evolves a Phillips-spectrum ocean for a fixed duration and writes the
//! displacement and normal maps of every cascade to PNG.

use std::time::Instant;

use clap::Parser;
use log::{error, info};

use tidewright::cli::{Args, BackendChoice};
use tidewright::export::save_maps;
use tidewright::gpu::{GpuBackend, GpuContext};
use tidewright::ocean::mesh::query_height;
use tidewright::ocean::{ComputeBackend, CpuBackend, OceanMesh, OceanSystem};
use tidewright::params::{ExportConfig, MeshConfig};
use tidewright::Result;

/// Step the simulation and export maps as configured
fn simulate<B: ComputeBackend>(
    ocean: &mut OceanSystem<B>,
    export: &ExportConfig,
    mesh_config: &MeshConfig,
) -> Result<()> {
    let total_frames = export.total_frames().max(1);
    let cascades = ocean.pipeline().cascade_count();

    for frame in 0..total_frames {
        ocean.update(export.frame_dt())?;

        let last = frame + 1 == total_frames;
        if export.every_frame || last {
            for cascade in 0..cascades {
                let maps = ocean.maps(cascade)?;
                save_maps(export, frame, cascade, &maps)?;
            }
        }
    }

    // Sample the final surface through the mesh binding
    let maps = ocean.all_maps()?;
    let mesh = OceanMesh::new(mesh_config)?;
    let settings = ocean.pipeline().settings().clone();
    let displaced = mesh.displaced_vertices(&settings, &maps);
    let (lowest, highest) = displaced
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), v| (lo.min(v.position[1]), hi.max(v.position[1])));

    println!("  Frames: {} (t = {:.2}s)", total_frames, ocean.time_s());
    println!(
        "  Surface: {:.2}m to {:.2}m over {} vertices",
        lowest,
        highest,
        displaced.len()
    );
    println!("  Height at origin: {:.3}m", query_height(0.0, 0.0, &settings, &maps));
    Ok(())
}

fn run(args: &Args) -> Result<()> {
    let settings = args.simulation_settings();
    let spectrum = args.spectrum_params();
    let export = args.export_config();
    let mesh_config = args.mesh_config();
    export.validate()?;
    std::fs::create_dir_all(&export.output_dir)?;

    println!("Tidewright - Spectral ocean synthesizer");
    println!(
        "  Resolution: {}x{}, {} cascade(s), backend {:?}",
        settings.resolution, settings.resolution, settings.cascade_count, args.backend
    );
    println!("  Output: {}", export.output_dir);

    let start = Instant::now();
    match args.backend {
        BackendChoice::Cpu => {
            let mut ocean = OceanSystem::with_backend(settings, spectrum, args.variant(), CpuBackend::new)?;
            simulate(&mut ocean, &export, &mesh_config)?;
        }
        BackendChoice::Gpu => {
            let mut ocean = OceanSystem::with_backend(settings, spectrum, args.variant(), |s, v| {
                GpuBackend::new(GpuContext::new_blocking()?, s, v)
            })?;
            simulate(&mut ocean, &export, &mesh_config)?;
        }
    }
    info!("Finished in {:.2}s", start.elapsed().as_secs_f64());
    println!("  Time: {:.2}ms", start.elapsed().as_secs_f64() * 1000.0);
    Ok(())
}

fn main() {
    env_logger::init();
    let args = Args::parse();

    if let Err(e) = run(&args) {
        error!("{}", e);
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
