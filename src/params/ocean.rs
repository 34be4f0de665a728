//! Ocean simulation settings and wind spectrum parameters.

use glam::Vec2;

use crate::error::{OceanError, Result};

/// Gravitational acceleration (m/s²)
pub const GRAVITY: f32 = 9.81;

/// Largest accepted simulation resolution (texels per side)
pub const MAX_RESOLUTION: u32 = 4096;

/// Each cascade's patch is this many times smaller than the previous one
pub const CASCADE_SIZE_RATIO: f32 = 4.0;

/// Number of lowest modes of a cascade that are left to the coarser cascade
///
/// Below 48 texels the coarser grid cannot reach this many of the finer
/// cascade's modes, so the split is clamped to the coarser grid's Nyquist
/// wavenumber instead (see [`SimulationSettings::cascade_band`]).
pub const CASCADE_BAND_MODES: f32 = 6.0;

/// Simulation grid and per-frame synthesis settings
#[derive(Debug, Clone, PartialEq)]
pub struct SimulationSettings {
    /// FFT resolution N (texels per side, power of two)
    pub resolution: u32,

    /// World-space extent of the first cascade's tile (meters)
    pub ocean_size_m: f32,

    /// Accumulated simulation time (seconds), advanced by the owner every frame
    pub time_s: f32,

    /// Horizontal displacement strength (0 = plain height field)
    pub choppiness: f32,

    /// World-space scale of a tile (dimensionless, 1.0 = one tile per `ocean_size_m`)
    pub tile_scale: f32,

    /// Number of independent tiles at decreasing patch sizes
    pub cascade_count: u32,
}

impl Default for SimulationSettings {
    fn default() -> Self {
        Self {
            resolution: 256,
            ocean_size_m: 1000.0,
            time_s: 0.0,
            choppiness: 1.2,
            tile_scale: 1.0,
            cascade_count: 1,
        }
    }
}

impl SimulationSettings {
    /// Number of butterfly stages per direction (log2 N)
    pub fn stage_count(&self) -> u32 {
        self.resolution.trailing_zeros()
    }

    /// Cells per frequency field
    pub fn cell_count(&self) -> usize {
        (self.resolution as usize) * (self.resolution as usize)
    }

    /// Patch length of a cascade (meters, before tile scaling)
    pub fn patch_length(&self, cascade: usize) -> f32 {
        self.ocean_size_m / CASCADE_SIZE_RATIO.powi(cascade as i32)
    }

    /// Wavenumber band `[low, high)` kept by a cascade (rad/m)
    ///
    /// The first cascade starts at zero and the last one is unbounded, so a
    /// single cascade keeps the whole spectrum.
    pub fn cascade_band(&self, cascade: usize) -> (f32, f32) {
        let low = if cascade == 0 { 0.0 } else { self.band_split(cascade) };
        let high = if cascade + 1 >= self.cascade_count as usize {
            f32::MAX
        } else {
            self.band_split(cascade + 1)
        };
        (low, high)
    }

    /// Wavenumber where cascade `finer - 1` hands over to cascade `finer`
    ///
    /// Never above the coarser grid's axis Nyquist `π·N / L`, so nothing the
    /// coarser grid cannot hold falls between the two bands.
    fn band_split(&self, finer: usize) -> f32 {
        let modes = CASCADE_BAND_MODES * std::f32::consts::TAU / self.patch_length(finer);
        let nyquist = std::f32::consts::PI * self.resolution as f32 / self.patch_length(finer - 1);
        modes.min(nyquist)
    }

    /// Check invariants the pipeline relies on
    pub fn validate(&self) -> Result<()> {
        if !self.resolution.is_power_of_two() || self.resolution > MAX_RESOLUTION {
            return Err(OceanError::InvalidResolution {
                got: self.resolution,
                max: MAX_RESOLUTION,
            });
        }
        if !(self.ocean_size_m.is_finite() && self.ocean_size_m > 0.0) {
            return Err(OceanError::invalid("ocean_size_m", "must be > 0"));
        }
        if !(self.tile_scale.is_finite() && self.tile_scale > 0.0) {
            return Err(OceanError::invalid("tile_scale", "must be > 0"));
        }
        if !self.choppiness.is_finite() || self.choppiness < 0.0 {
            return Err(OceanError::invalid("choppiness", "must be >= 0"));
        }
        if self.cascade_count == 0 {
            return Err(OceanError::invalid("cascade_count", "must be at least 1"));
        }
        Ok(())
    }
}

/// Wind-driven Phillips spectrum parameters
#[derive(Debug, Clone, PartialEq)]
pub struct SpectrumParams {
    /// Wind speed at 10m (m/s)
    pub wind_speed_m_per_s: f32,

    /// Direction the wind blows towards (normalized on use)
    pub wind_direction: Vec2,

    /// Phillips constant A (dimensionless)
    pub amplitude: f32,

    /// Short-wave damping length as a fraction of the wind length V²/g
    pub suppression: f32,

    /// Seed for the Gaussian draws (fixed seed = reproducible ocean)
    pub seed: u64,
}

impl Default for SpectrumParams {
    fn default() -> Self {
        Self {
            wind_speed_m_per_s: 30.0,
            wind_direction: Vec2::X,
            amplitude: 0.02,
            suppression: 0.001,
            seed: 42,
        }
    }
}

impl SpectrumParams {
    /// Largest wave arising from a continuous wind (meters)
    pub fn wind_length(&self) -> f32 {
        self.wind_speed_m_per_s * self.wind_speed_m_per_s / GRAVITY
    }

    /// Damping length for waves much shorter than the wind length (meters)
    pub fn damping_length(&self) -> f32 {
        self.suppression * self.wind_length()
    }

    /// Unit wind direction
    pub fn wind_unit(&self) -> Vec2 {
        self.wind_direction.normalize_or(Vec2::X)
    }

    pub fn validate(&self) -> Result<()> {
        if !self.wind_speed_m_per_s.is_finite() || self.wind_speed_m_per_s < 0.0 {
            return Err(OceanError::invalid("wind_speed_m_per_s", "must be >= 0"));
        }
        if !self.wind_direction.is_finite() || self.wind_direction.length_squared() == 0.0 {
            return Err(OceanError::invalid(
                "wind_direction",
                "must be a finite, non-zero vector",
            ));
        }
        if !self.amplitude.is_finite() || self.amplitude < 0.0 {
            return Err(OceanError::invalid("amplitude", "must be >= 0"));
        }
        if !self.suppression.is_finite() || self.suppression < 0.0 {
            return Err(OceanError::invalid("suppression", "must be >= 0"));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_settings_are_valid() {
        assert!(SimulationSettings::default().validate().is_ok());
        assert!(SpectrumParams::default().validate().is_ok());
    }

    #[test]
    fn test_non_power_of_two_resolution_rejected() {
        for resolution in [0, 3, 6, 100, 513] {
            let settings = SimulationSettings {
                resolution,
                ..Default::default()
            };
            assert!(matches!(
                settings.validate(),
                Err(OceanError::InvalidResolution { got, .. }) if got == resolution
            ));
        }
    }

    #[test]
    fn test_stage_count_is_log2() {
        for shift in 0..=9 {
            let settings = SimulationSettings {
                resolution: 1 << shift,
                ..Default::default()
            };
            assert_eq!(settings.stage_count(), shift);
        }
    }

    #[test]
    fn test_cascade_bands_are_contiguous() {
        let settings = SimulationSettings {
            cascade_count: 3,
            ..Default::default()
        };
        let bands: Vec<_> = (0..3).map(|c| settings.cascade_band(c)).collect();
        assert_eq!(bands[0].0, 0.0);
        assert_eq!(bands[0].1, bands[1].0);
        assert_eq!(bands[1].1, bands[2].0);
        assert_eq!(bands[2].1, f32::MAX);
        assert!((settings.patch_length(1) - 250.0).abs() < 1e-3);
    }

    #[test]
    fn test_small_grid_split_clamped_to_nyquist() {
        let small = SimulationSettings {
            resolution: 16,
            cascade_count: 3,
            ..Default::default()
        };
        for c in 0..2 {
            let nyquist = std::f32::consts::PI * 16.0 / small.patch_length(c);
            let (_, high) = small.cascade_band(c);
            assert!((high - nyquist).abs() <= 1e-6 * nyquist);
            assert_eq!(high, small.cascade_band(c + 1).0);
        }

        // Large grids keep the mode-count split
        let large = SimulationSettings {
            resolution: 256,
            cascade_count: 2,
            ..Default::default()
        };
        let expected = CASCADE_BAND_MODES * std::f32::consts::TAU / large.patch_length(1);
        assert_eq!(large.cascade_band(0).1, expected);
    }

    #[test]
    fn test_zero_wind_direction_rejected() {
        let params = SpectrumParams {
            wind_direction: Vec2::ZERO,
            ..Default::default()
        };
        assert!(params.validate().is_err());
    }
}
