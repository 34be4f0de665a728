//! Static ocean grid and the sampling contract between it and the maps.
//!
//! The grid is built once and never moves; the renderer offsets each vertex
//! by the displacement map sampled at `uv_for_world`. The CPU helpers here
//! do the same thing against read-back maps.

use bytemuck::{Pod, Zeroable};
use glam::{Vec2, Vec3};

use super::field::OceanMaps;
use crate::error::Result;
use crate::params::{MeshConfig, SimulationSettings};

/// Vertex data for ocean mesh (position + UV coordinates)
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
pub struct Vertex {
    pub position: [f32; 3],
    pub uv: [f32; 2],
}

/// Flat tessellated plane the maps are bound to at draw time
#[derive(Debug, Clone)]
pub struct OceanMesh {
    pub vertices: Vec<Vertex>,
    pub indices: Vec<u32>,
    config: MeshConfig,
}

impl OceanMesh {
    /// Create the grid, centred on the origin in the XZ plane
    pub fn new(config: &MeshConfig) -> Result<Self> {
        config.validate()?;
        let grid_size = config.visual_grid_size;
        let spacing = config.grid_spacing_m;
        let half_size = config.extent_m() / 2.0;

        let mut vertices = Vec::with_capacity((grid_size + 1).pow(2));
        let mut indices = Vec::with_capacity(grid_size * grid_size * 6);

        for z in 0..=grid_size {
            for x in 0..=grid_size {
                vertices.push(Vertex {
                    position: [
                        x as f32 * spacing - half_size,
                        0.0,
                        z as f32 * spacing - half_size,
                    ],
                    uv: [x as f32 / grid_size as f32, z as f32 / grid_size as f32],
                });
            }
        }

        // Counter-clockwise winding seen from +y
        for z in 0..grid_size {
            for x in 0..grid_size {
                let top_left = (z * (grid_size + 1) + x) as u32;
                let top_right = top_left + 1;
                let bottom_left = ((z + 1) * (grid_size + 1) + x) as u32;
                let bottom_right = bottom_left + 1;

                indices.extend_from_slice(&[
                    top_left,
                    bottom_left,
                    top_right,
                    top_right,
                    bottom_left,
                    bottom_right,
                ]);
            }
        }

        Ok(Self {
            vertices,
            indices,
            config: config.clone(),
        })
    }

    pub fn config(&self) -> &MeshConfig {
        &self.config
    }

    pub fn triangle_count(&self) -> usize {
        self.indices.len() / 3
    }

    /// Displaced copy of the grid, summing every cascade's offset
    pub fn displaced_vertices(&self, settings: &SimulationSettings, maps: &[OceanMaps]) -> Vec<Vertex> {
        self.vertices
            .iter()
            .map(|vertex| {
                let rest = Vec3::from_array(vertex.position);
                let offset = displacement_at(rest.x, rest.z, settings, maps);
                Vertex {
                    position: (rest + offset).to_array(),
                    uv: vertex.uv,
                }
            })
            .collect()
    }
}

/// Texture coordinate of a world position within a cascade's tile
///
/// Repeats every `L_c · tile_scale` meters; the result is wrapped into
/// `[0, 1)` so it can index the periodic maps directly.
pub fn uv_for_world(world_x: f32, world_z: f32, settings: &SimulationSettings, cascade: usize) -> Vec2 {
    let extent = settings.patch_length(cascade) * settings.tile_scale;
    let uv = Vec2::new(world_x, world_z) / extent;
    uv - uv.floor()
}

/// Summed world-space offset of all cascades at a rest position
pub fn displacement_at(world_x: f32, world_z: f32, settings: &SimulationSettings, maps: &[OceanMaps]) -> Vec3 {
    maps.iter()
        .enumerate()
        .map(|(cascade, m)| {
            m.displacement
                .sample(uv_for_world(world_x, world_z, settings, cascade))
                .truncate()
        })
        .sum()
}

/// Surface height above a rest position, ignoring horizontal drift
pub fn query_height(world_x: f32, world_z: f32, settings: &SimulationSettings, maps: &[OceanMaps]) -> f32 {
    displacement_at(world_x, world_z, settings, maps).y
}

/// Blended surface normal at a rest position
///
/// Slopes add across cascades, so the per-cascade normals are combined
/// through their slope form `(-sx, 1, -sz)`.
pub fn normal_at(world_x: f32, world_z: f32, settings: &SimulationSettings, maps: &[OceanMaps]) -> Vec3 {
    let slope: Vec2 = maps
        .iter()
        .enumerate()
        .map(|(cascade, m)| {
            let n = m.normal.sample(uv_for_world(world_x, world_z, settings, cascade));
            if n.y.abs() < 1e-6 {
                Vec2::ZERO
            } else {
                Vec2::new(n.x, n.z) / n.y
            }
        })
        .sum();
    Vec3::new(slope.x, 1.0, slope.y).normalize()
}
