//! Time evolution of the spectrum via the deep-water dispersion relation.

use super::field::{Complex32, FrequencyField};
use super::spectrum::{wave_vector, SpectrumConstants, H0_CHANNEL, H0_CONJ_CHANNEL};
use super::variant::PipelineVariant;

/// Channel indices of the packed time spectrum
pub mod channel {
    /// height (re) + slope x (im) in the choppy variant; height only otherwise
    pub const HEIGHT_SLOPE_X: u32 = 0;
    /// slope z (re) + horizontal offset x (im)
    pub const SLOPE_Z_OFFSET_X: u32 = 1;
    /// horizontal offset z (re)
    pub const OFFSET_Z: u32 = 2;
}

/// Angular frequency ω(k) = sqrt(g·|k|)
#[inline]
pub fn dispersion(k_len: f32, gravity: f32) -> f32 {
    (gravity * k_len).sqrt()
}

#[inline]
fn times_i(c: Complex32) -> Complex32 {
    Complex32::new(-c.im, c.re)
}

/// Cell on the Nyquist row or column, where the ±N/2 frequency is its own
/// mirror. `i·k·h` is not Hermitian there, so gradient terms are dropped.
#[inline]
pub fn on_nyquist(row: u32, col: u32, resolution: u32) -> bool {
    let half = resolution / 2;
    resolution > 1 && (row == half || col == half)
}

/// `a + i·b`: after the inverse transform, a lands in the real part and b in
/// the imaginary part as long as both spectra are Hermitian.
#[inline]
pub fn pack(a: Complex32, b: Complex32) -> Complex32 {
    a + times_i(b)
}

/// h(k,t) = h0(k)·e^{iωt} + conj(h0(-k))·e^{-iωt}
#[inline]
pub fn evolve_cell(h0: Complex32, h0_conj: Complex32, omega: f32, time_s: f32) -> Complex32 {
    let rotation = Complex32::from_polar(1.0, omega * time_s);
    h0 * rotation + h0_conj * rotation.conj()
}

/// Produces the packed h(k,t) channels for the configured variant
#[derive(Debug, Clone, Copy)]
pub struct SpectrumEvolver {
    pub variant: PipelineVariant,
}

impl SpectrumEvolver {
    pub fn new(variant: PipelineVariant) -> Self {
        Self { variant }
    }

    /// CPU reference of the time-spectrum kernel
    pub fn evolve_into(
        &self,
        initial: &FrequencyField,
        constants: &SpectrumConstants,
        time_s: f32,
        out: &mut FrequencyField,
    ) {
        let n = constants.resolution;
        for row in 0..n {
            for col in 0..n {
                let k = wave_vector(row, col, n, constants.patch_length);
                let k_len = k.length();
                let omega = dispersion(k_len, constants.gravity);
                let h = evolve_cell(
                    initial.get(H0_CHANNEL, row, col),
                    initial.get(H0_CONJ_CHANNEL, row, col),
                    omega,
                    time_s,
                );

                match self.variant {
                    PipelineVariant::HeightOnly => {
                        out.set(channel::HEIGHT_SLOPE_X, row, col, h);
                    }
                    PipelineVariant::Choppy => {
                        let zero = Complex32::new(0.0, 0.0);
                        let (slope_x, slope_z, offset_x, offset_z) =
                            if k_len < 1e-6 || on_nyquist(row, col, n) {
                                (zero, zero, zero, zero)
                            } else {
                                let ih = times_i(h);
                                // i·k·h and -i·k̂·h
                                (ih * k.x, ih * k.y, -ih * (k.x / k_len), -ih * (k.y / k_len))
                            };
                        out.set(channel::HEIGHT_SLOPE_X, row, col, pack(h, slope_x));
                        out.set(channel::SLOPE_Z_OFFSET_X, row, col, pack(slope_z, offset_x));
                        out.set(channel::OFFSET_Z, row, col, pack(offset_z, zero));
                    }
                }
            }
        }
    }
}
