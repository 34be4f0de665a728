//! Turns the spatial-domain FFT output into displacement and normal maps.
//!
//! The 1/N² inverse-transform scale is applied here and nowhere else.

use bytemuck::{Pod, Zeroable};
use glam::{Vec3, Vec4};

use super::evolve::channel;
use super::field::{FrequencyField, OceanMaps};
use super::variant::PipelineVariant;
use crate::params::SimulationSettings;

/// Per-frame derivation constants, laid out for a WGSL uniform block
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct DerivationConstants {
    pub resolution: u32,
    pub variant: u32,
    pub patch_length: f32,
    pub choppiness: f32,
    pub tile_scale: f32,
    pub normalization: f32,
    pub _padding: [f32; 2],
}

impl DerivationConstants {
    pub fn new(settings: &SimulationSettings, variant: PipelineVariant, cascade: usize) -> Self {
        let n = settings.resolution as f32;
        Self {
            resolution: settings.resolution,
            variant: variant.tag(),
            patch_length: settings.patch_length(cascade),
            choppiness: settings.choppiness,
            tile_scale: settings.tile_scale,
            normalization: 1.0 / (n * n),
            _padding: [0.0; 2],
        }
    }

    /// Distance between neighbouring texels before tile scaling (meters)
    pub fn texel_spacing(&self) -> f32 {
        self.patch_length / self.resolution as f32
    }
}

/// Spatial samples of one texel after normalisation
#[derive(Debug, Clone, Copy, Default)]
struct SurfaceSample {
    height: f32,
    slope_x: f32,
    slope_z: f32,
    offset_x: f32,
    offset_z: f32,
}

/// CPU reference of the derivation kernel
#[derive(Debug, Clone, Copy)]
pub struct DisplacementNormalDeriver {
    pub variant: PipelineVariant,
}

impl DisplacementNormalDeriver {
    pub fn new(variant: PipelineVariant) -> Self {
        Self { variant }
    }

    fn sample(&self, spatial: &FrequencyField, scale: f32, x: i64, z: i64) -> SurfaceSample {
        let n = spatial.resolution() as i64;
        let (col, row) = (x.rem_euclid(n) as u32, z.rem_euclid(n) as u32);
        let first = spatial.get(channel::HEIGHT_SLOPE_X, row, col) * scale;
        match self.variant {
            PipelineVariant::HeightOnly => SurfaceSample {
                height: first.re,
                ..Default::default()
            },
            PipelineVariant::Choppy => {
                let second = spatial.get(channel::SLOPE_Z_OFFSET_X, row, col) * scale;
                let third = spatial.get(channel::OFFSET_Z, row, col) * scale;
                SurfaceSample {
                    height: first.re,
                    slope_x: first.im,
                    slope_z: second.re,
                    offset_x: second.im,
                    offset_z: third.re,
                }
            }
        }
    }

    pub fn derive_into(&self, spatial: &FrequencyField, constants: &DerivationConstants, maps: &mut OceanMaps) {
        let n = constants.resolution;
        let scale = constants.normalization;
        let inv_2dx = 0.5 / constants.texel_spacing();
        let lambda = constants.choppiness;

        for z in 0..n {
            for x in 0..n {
                let (xi, zi) = (x as i64, z as i64);
                let center = self.sample(spatial, scale, xi, zi);
                let left = self.sample(spatial, scale, xi - 1, zi);
                let right = self.sample(spatial, scale, xi + 1, zi);
                let back = self.sample(spatial, scale, xi, zi - 1);
                let front = self.sample(spatial, scale, xi, zi + 1);

                let (displacement, normal) = match self.variant {
                    PipelineVariant::HeightOnly => {
                        let slope_x = (right.height - left.height) * inv_2dx;
                        let slope_z = (front.height - back.height) * inv_2dx;
                        let normal = Vec3::new(-slope_x, 1.0, -slope_z).normalize();
                        (
                            Vec4::new(0.0, center.height * constants.tile_scale, 0.0, 0.0),
                            normal.extend(1.0),
                        )
                    }
                    PipelineVariant::Choppy => {
                        let offset = Vec3::new(
                            -lambda * center.offset_x,
                            center.height,
                            -lambda * center.offset_z,
                        );
                        let normal = Vec3::new(-center.slope_x, 1.0, -center.slope_z).normalize();

                        let dox_dx = (right.offset_x - left.offset_x) * inv_2dx;
                        let dox_dz = (front.offset_x - back.offset_x) * inv_2dx;
                        let doz_dx = (right.offset_z - left.offset_z) * inv_2dx;
                        let doz_dz = (front.offset_z - back.offset_z) * inv_2dx;
                        let jacobian = (1.0 - lambda * dox_dx) * (1.0 - lambda * doz_dz)
                            - lambda * lambda * dox_dz * doz_dx;

                        ((offset * constants.tile_scale).extend(0.0), normal.extend(jacobian))
                    }
                };
                maps.displacement.set(x, z, displacement);
                maps.normal.set(x, z, normal);
            }
        }
    }
}
