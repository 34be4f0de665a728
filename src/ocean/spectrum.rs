//! Phillips spectrum initialisation of h0(k).
//!
//! The Gaussian draws are made once on the CPU from a seeded ChaCha stream and
//! uploaded; the amplitude shaping runs as a kernel (or its CPU reference
//! below) so both executors produce the same h0 for the same seed.

use bytemuck::{Pod, Zeroable};
use glam::Vec2;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

use super::field::{Complex32, FrequencyField};
use crate::params::{SimulationSettings, SpectrumParams, GRAVITY};

/// Channel holding h0(k) in the initial spectrum field
pub const H0_CHANNEL: u32 = 0;
/// Channel holding conj(h0(-k)) in the initial spectrum field
pub const H0_CONJ_CHANNEL: u32 = 1;
/// Channels in the initial spectrum field
pub const INITIAL_SPECTRUM_CHANNELS: u32 = 2;

/// Per-cascade spectrum constants, laid out for a WGSL uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct SpectrumConstants {
    pub resolution: u32,
    pub patch_length: f32,
    pub amplitude: f32,
    pub wind_length: f32,
    pub wind_direction: [f32; 2],
    pub damping_length: f32,
    pub band_low: f32,
    pub band_high: f32,
    pub gravity: f32,
    pub _padding: [f32; 2],
}

impl SpectrumConstants {
    pub fn new(settings: &SimulationSettings, params: &SpectrumParams, cascade: usize) -> Self {
        let (band_low, band_high) = settings.cascade_band(cascade);
        Self {
            resolution: settings.resolution,
            patch_length: settings.patch_length(cascade),
            amplitude: params.amplitude,
            wind_length: params.wind_length(),
            wind_direction: params.wind_unit().to_array(),
            damping_length: params.damping_length(),
            band_low,
            band_high,
            gravity: GRAVITY,
            _padding: [0.0; 2],
        }
    }
}

/// Signed frequency of FFT index `i` (natural order: 0, 1, .., N/2-1, -N/2, .., -1)
#[inline]
pub fn signed_frequency(i: u32, resolution: u32) -> i32 {
    if 2 * i < resolution {
        i as i32
    } else {
        i as i32 - resolution as i32
    }
}

/// Index of the cell holding -k
#[inline]
pub fn mirror_index(i: u32, resolution: u32) -> u32 {
    (resolution - i) % resolution
}

/// Wavevector (rad/m) of cell `(row, col)`; x follows columns, z follows rows
#[inline]
pub fn wave_vector(row: u32, col: u32, resolution: u32, patch_length: f32) -> Vec2 {
    let dk = std::f32::consts::TAU / patch_length;
    Vec2::new(
        signed_frequency(col, resolution) as f32,
        signed_frequency(row, resolution) as f32,
    ) * dk
}

/// Phillips spectrum P(k), restricted to the cascade band
///
/// Zero at k = 0, outside the band, and when the wind length vanishes.
pub fn phillips(k: Vec2, constants: &SpectrumConstants) -> f32 {
    let k_len = k.length();
    if k_len < 1e-6 || k_len < constants.band_low || k_len >= constants.band_high {
        return 0.0;
    }
    let kl = k_len * constants.wind_length;
    if kl < 1e-6 {
        return 0.0;
    }

    let alignment = (k / k_len).dot(Vec2::from_array(constants.wind_direction));
    let k2 = k_len * k_len;
    let damping = constants.damping_length;

    constants.amplitude * (-1.0 / (kl * kl)).exp() / (k2 * k2)
        * alignment
        * alignment
        * (-k2 * damping * damping).exp()
}

/// Seeded standard-normal complex draws, one per cell
pub fn gaussian_noise(resolution: u32, seed: u64, cascade: usize) -> FrequencyField {
    let stream_seed = seed.wrapping_add((cascade as u64).wrapping_mul(0x9E37_79B9_7F4A_7C15));
    let mut rng = ChaCha8Rng::seed_from_u64(stream_seed);
    let mut field = FrequencyField::new(resolution, 1);

    for cell in field.as_mut_slice() {
        // Box-Muller; 1 - u keeps the logarithm finite
        let u1: f32 = 1.0 - rng.gen::<f32>();
        let u2: f32 = rng.gen::<f32>();
        let radius = (-2.0 * u1.ln()).sqrt();
        let theta = std::f32::consts::TAU * u2;
        *cell = Complex32::new(radius * theta.cos(), radius * theta.sin());
    }
    field
}

/// Builds h0(k) and conj(h0(-k)) for one cascade
#[derive(Debug, Clone)]
pub struct SpectrumInitializer {
    pub constants: SpectrumConstants,
    pub noise: FrequencyField,
}

impl SpectrumInitializer {
    pub fn new(settings: &SimulationSettings, params: &SpectrumParams, cascade: usize) -> Self {
        Self {
            constants: SpectrumConstants::new(settings, params, cascade),
            noise: gaussian_noise(settings.resolution, params.seed, cascade),
        }
    }

    /// Amplitude of cell `(row, col)`: ξ · sqrt(P(k) / 2)
    fn amplitude_at(&self, row: u32, col: u32) -> Complex32 {
        let c = &self.constants;
        let k = wave_vector(row, col, c.resolution, c.patch_length);
        self.noise.get(0, row, col) * (phillips(k, c) * 0.5).sqrt()
    }

    /// CPU reference of the initial-spectrum kernel
    pub fn build_into(&self, out: &mut FrequencyField) {
        let n = self.constants.resolution;
        for row in 0..n {
            for col in 0..n {
                let h0 = self.amplitude_at(row, col);
                let h0_mirror = self.amplitude_at(mirror_index(row, n), mirror_index(col, n));
                out.set(H0_CHANNEL, row, col, h0);
                out.set(H0_CONJ_CHANNEL, row, col, h0_mirror.conj());
            }
        }
    }

    pub fn build(&self) -> FrequencyField {
        let mut field = FrequencyField::new(self.constants.resolution, INITIAL_SPECTRUM_CHANNELS);
        self.build_into(&mut field);
        field
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn small_settings() -> SimulationSettings {
        SimulationSettings {
            resolution: 16,
            ocean_size_m: 200.0,
            ..Default::default()
        }
    }

    #[test]
    fn test_signed_frequency_order() {
        let order: Vec<i32> = (0..8).map(|i| signed_frequency(i, 8)).collect();
        assert_eq!(order, vec![0, 1, 2, 3, -4, -3, -2, -1]);
        assert_eq!(signed_frequency(0, 1), 0);
        assert_eq!(mirror_index(0, 8), 0);
        assert_eq!(mirror_index(3, 8), 5);
        assert_eq!(mirror_index(4, 8), 4);
    }

    #[test]
    fn test_phillips_zero_at_origin_and_for_calm_wind() {
        let settings = small_settings();
        let constants = SpectrumConstants::new(&settings, &SpectrumParams::default(), 0);
        assert_eq!(phillips(Vec2::ZERO, &constants), 0.0);
        assert!(phillips(Vec2::new(0.05, 0.0), &constants) > 0.0);

        let calm = SpectrumParams {
            wind_speed_m_per_s: 0.0,
            ..Default::default()
        };
        let calm_constants = SpectrumConstants::new(&settings, &calm, 0);
        assert_eq!(phillips(Vec2::new(0.05, 0.0), &calm_constants), 0.0);
    }

    #[test]
    fn test_phillips_suppresses_crosswind_waves() {
        let constants = SpectrumConstants::new(&small_settings(), &SpectrumParams::default(), 0);
        let along = phillips(Vec2::new(0.1, 0.0), &constants);
        let across = phillips(Vec2::new(0.0, 0.1), &constants);
        assert!(along > 0.0);
        assert!(across.abs() < 1e-12);
    }

    #[test]
    fn test_noise_is_deterministic_per_seed() {
        let a = gaussian_noise(8, 7, 0);
        let b = gaussian_noise(8, 7, 0);
        let c = gaussian_noise(8, 8, 0);
        let other_cascade = gaussian_noise(8, 7, 1);
        assert_eq!(a, b);
        assert_ne!(a, c);
        assert_ne!(a, other_cascade);
    }

    #[test]
    fn test_build_is_idempotent() {
        let settings = small_settings();
        let params = SpectrumParams::default();
        let first = SpectrumInitializer::new(&settings, &params, 0).build();
        let second = SpectrumInitializer::new(&settings, &params, 0).build();
        assert_eq!(first, second);
        assert!(first.energy() > 0.0);
    }

    #[test]
    fn test_conjugate_channel_mirrors_h0() {
        let field = SpectrumInitializer::new(&small_settings(), &SpectrumParams::default(), 0).build();
        let n = field.resolution();
        for row in 0..n {
            for col in 0..n {
                let mirrored = field.get(H0_CHANNEL, mirror_index(row, n), mirror_index(col, n));
                assert_eq!(field.get(H0_CONJ_CHANNEL, row, col), mirrored.conj());
            }
        }
    }
}
