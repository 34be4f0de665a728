//! Visual grid and map export configuration.

use crate::error::{OceanError, Result};

/// Static ocean mesh layout (decoupled from the simulation resolution)
#[derive(Debug, Clone)]
pub struct MeshConfig {
    /// Quads per side of the visual grid (e.g., 128 = 16,641 vertices)
    pub visual_grid_size: usize,

    /// Spacing between grid vertices in world units (meters)
    pub grid_spacing_m: f32,
}

impl Default for MeshConfig {
    fn default() -> Self {
        Self {
            visual_grid_size: 256,
            grid_spacing_m: 4.0, // 1024m across, roughly one default tile
        }
    }
}

impl MeshConfig {
    /// World-space width of the grid (meters)
    pub fn extent_m(&self) -> f32 {
        self.visual_grid_size as f32 * self.grid_spacing_m
    }

    pub fn validate(&self) -> Result<()> {
        if self.visual_grid_size == 0 {
            return Err(OceanError::invalid("visual_grid_size", "must be > 0"));
        }
        if !(self.grid_spacing_m.is_finite() && self.grid_spacing_m > 0.0) {
            return Err(OceanError::invalid("grid_spacing_m", "must be > 0"));
        }
        Ok(())
    }
}

/// Map export configuration
#[derive(Debug, Clone)]
pub struct ExportConfig {
    /// Duration to simulate (seconds)
    pub duration_secs: f32,

    /// Output directory for exported maps
    pub output_dir: String,

    /// Simulation steps per second
    pub fps: u32,

    /// Export every frame instead of only the last one
    pub every_frame: bool,
}

impl ExportConfig {
    pub fn new(duration_secs: f32) -> Self {
        Self {
            duration_secs,
            output_dir: "ocean_maps".to_string(),
            fps: 30,
            every_frame: false,
        }
    }

    /// Total number of frames to simulate
    pub fn total_frames(&self) -> usize {
        (self.duration_secs * self.fps as f32).ceil() as usize
    }

    /// Fixed timestep (seconds)
    pub fn frame_dt(&self) -> f32 {
        1.0 / self.fps.max(1) as f32
    }

    pub fn validate(&self) -> Result<()> {
        if !self.duration_secs.is_finite() || self.duration_secs < 0.0 {
            return Err(OceanError::invalid("duration_secs", "must be >= 0"));
        }
        if self.fps == 0 {
            return Err(OceanError::invalid("fps", "must be > 0"));
        }
        Ok(())
    }

    /// Displacement map path for a frame and cascade
    pub fn displacement_path(&self, frame: usize, cascade: usize) -> String {
        format!(
            "{}/displacement_c{}_{:05}.png",
            self.output_dir, cascade, frame
        )
    }

    /// Normal map path for a frame and cascade
    pub fn normal_path(&self, frame: usize, cascade: usize) -> String {
        format!("{}/normal_c{}_{:05}.png", self.output_dir, cascade, frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_total_frames_rounds_up() {
        let config = ExportConfig::new(1.01);
        assert_eq!(config.total_frames(), 31);
        assert!((config.frame_dt() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_zero_fps_rejected() {
        let config = ExportConfig {
            fps: 0,
            ..ExportConfig::new(1.0)
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_export_paths() {
        let config = ExportConfig::new(1.0);
        assert_eq!(
            config.displacement_path(7, 1),
            "ocean_maps/displacement_c1_00007.png"
        );
        assert_eq!(config.normal_path(0, 0), "ocean_maps/normal_c0_00000.png");
    }
}
