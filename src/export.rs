//! PNG export of read-back ocean maps.

use image::{GrayImage, Luma, Rgb, RgbImage};
use log::debug;

use crate::error::Result;
use crate::ocean::{OceanMaps, OutputField};
use crate::params::ExportConfig;

/// Height (displacement.y) as grayscale, stretched to the field's own range
pub fn height_image(displacement: &OutputField) -> GrayImage {
    let n = displacement.resolution();
    let heights: Vec<f32> = displacement.texels().iter().map(|t| t.y).collect();
    let (min, max) = heights
        .iter()
        .fold((f32::MAX, f32::MIN), |(lo, hi), &h| (lo.min(h), hi.max(h)));
    let range = (max - min).max(1e-6);

    let mut img = GrayImage::new(n, n);
    for z in 0..n {
        for x in 0..n {
            let h = heights[(z * n + x) as usize];
            let gray = ((h - min) / range * 255.0).clamp(0.0, 255.0) as u8;
            img.put_pixel(x, z, Luma([gray]));
        }
    }
    img
}

/// Unit normals mapped from [-1, 1] to RGB
pub fn normal_image(normal: &OutputField) -> RgbImage {
    let n = normal.resolution();
    let mut img = RgbImage::new(n, n);
    for z in 0..n {
        for x in 0..n {
            let texel = normal.get(x as i64, z as i64);
            let encode = |c: f32| ((c * 0.5 + 0.5) * 255.0).clamp(0.0, 255.0) as u8;
            img.put_pixel(x, z, Rgb([encode(texel.x), encode(texel.y), encode(texel.z)]));
        }
    }
    img
}

/// Write one cascade's maps for a frame
pub fn save_maps(config: &ExportConfig, frame: usize, cascade: usize, maps: &OceanMaps) -> Result<()> {
    let displacement_path = config.displacement_path(frame, cascade);
    let normal_path = config.normal_path(frame, cascade);
    height_image(&maps.displacement).save(&displacement_path)?;
    normal_image(&maps.normal).save(&normal_path)?;
    debug!("Saved {} and {}", displacement_path, normal_path);
    Ok(())
}
