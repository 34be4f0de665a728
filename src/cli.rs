//! Command-line argument parsing.

use clap::{Parser, ValueEnum};
use glam::Vec2;

use crate::ocean::PipelineVariant;
use crate::params::{ExportConfig, MeshConfig, SimulationSettings, SpectrumParams};

/// Executor running the compute kernels
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum BackendChoice {
    /// Reference kernels on the CPU
    Cpu,
    /// wgpu compute kernels
    Gpu,
}

/// Forced pipeline variant (defaults to what the choppiness implies)
#[derive(Copy, Clone, Debug, PartialEq, Eq, ValueEnum)]
pub enum VariantChoice {
    Height,
    Choppy,
}

/// Command line arguments
#[derive(Parser, Debug)]
#[command(name = "tidewright")]
#[command(about = "Spectral FFT ocean synthesizer: exports displacement and normal maps", long_about = None)]
pub struct Args {
    /// FFT resolution (power of two)
    #[arg(long, value_name = "TEXELS", default_value_t = 256)]
    pub resolution: u32,

    /// World-space extent of the first cascade's tile
    #[arg(long, value_name = "METERS", default_value_t = 1000.0)]
    pub ocean_size: f32,

    /// Wind speed at 10m
    #[arg(long, value_name = "M_PER_S", default_value_t = 30.0)]
    pub wind_speed: f32,

    /// Wind direction in degrees from +x towards +z
    #[arg(long, value_name = "DEGREES", default_value_t = 0.0)]
    pub wind_dir: f32,

    /// Phillips constant A
    #[arg(long, default_value_t = 0.02)]
    pub amplitude: f32,

    /// Short-wave damping as a fraction of V²/g
    #[arg(long, default_value_t = 0.001)]
    pub suppression: f32,

    /// Horizontal displacement strength (0 = height field only)
    #[arg(long, default_value_t = 1.2)]
    pub choppiness: f32,

    /// World-space scale of a tile
    #[arg(long, default_value_t = 1.0)]
    pub tile_scale: f32,

    /// Number of cascades (each 4× smaller than the previous)
    #[arg(long, default_value_t = 1)]
    pub cascades: u32,

    /// RNG seed for the Gaussian draws
    #[arg(long, default_value_t = 42)]
    pub seed: u64,

    /// Simulated duration
    #[arg(long, value_name = "SECONDS", default_value_t = 5.0)]
    pub seconds: f32,

    /// Simulation steps per second
    #[arg(long, default_value_t = 30)]
    pub fps: u32,

    /// Executor: cpu or gpu
    #[arg(long, value_enum, default_value_t = BackendChoice::Gpu)]
    pub backend: BackendChoice,

    /// Force a pipeline variant
    #[arg(long, value_enum)]
    pub variant: Option<VariantChoice>,

    /// Output directory for the exported maps
    #[arg(long, value_name = "DIR", default_value = "ocean_maps")]
    pub output: String,

    /// Export every simulated frame instead of only the last
    #[arg(long)]
    pub every_frame: bool,
}

impl Args {
    pub fn simulation_settings(&self) -> SimulationSettings {
        SimulationSettings {
            resolution: self.resolution,
            ocean_size_m: self.ocean_size,
            time_s: 0.0,
            choppiness: self.choppiness,
            tile_scale: self.tile_scale,
            cascade_count: self.cascades,
        }
    }

    pub fn spectrum_params(&self) -> SpectrumParams {
        let radians = self.wind_dir.to_radians();
        SpectrumParams {
            wind_speed_m_per_s: self.wind_speed,
            wind_direction: Vec2::new(radians.cos(), radians.sin()),
            amplitude: self.amplitude,
            suppression: self.suppression,
            seed: self.seed,
        }
    }

    pub fn variant(&self) -> Option<PipelineVariant> {
        self.variant.map(|choice| match choice {
            VariantChoice::Height => PipelineVariant::HeightOnly,
            VariantChoice::Choppy => PipelineVariant::Choppy,
        })
    }

    /// Mesh matching the first cascade's tile at one vertex per texel
    pub fn mesh_config(&self) -> MeshConfig {
        MeshConfig {
            visual_grid_size: self.resolution.max(1) as usize,
            grid_spacing_m: self.ocean_size * self.tile_scale / self.resolution.max(1) as f32,
        }
    }

    pub fn export_config(&self) -> ExportConfig {
        ExportConfig {
            output_dir: self.output.clone(),
            fps: self.fps,
            every_frame: self.every_frame,
            ..ExportConfig::new(self.seconds)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_map_to_valid_config() {
        let args = Args::parse_from(["tidewright"]);
        assert!(args.simulation_settings().validate().is_ok());
        assert!(args.spectrum_params().validate().is_ok());
        assert!(args.mesh_config().validate().is_ok());
        assert_eq!(args.backend, BackendChoice::Gpu);
        assert_eq!(args.variant(), None);
    }

    #[test]
    fn test_wind_direction_degrees() {
        let args = Args::parse_from(["tidewright", "--wind-dir", "90", "--backend", "cpu"]);
        let wind = args.spectrum_params().wind_direction;
        assert!(wind.x.abs() < 1e-6);
        assert!((wind.y - 1.0).abs() < 1e-6);
        assert_eq!(args.backend, BackendChoice::Cpu);
    }

    #[test]
    fn test_forced_variant() {
        let args = Args::parse_from(["tidewright", "--variant", "height"]);
        assert_eq!(args.variant(), Some(PipelineVariant::HeightOnly));
    }
}
