//! Grids shared by the pipeline stages: frequency fields, the FFT ping-pong
//! pair and the spatial output maps.

use glam::{Vec2, Vec4};
use rustfft::num_complex::Complex;

pub type Complex32 = Complex<f32>;

/// Channel-major stack of `resolution × resolution` complex grids
///
/// Cell `(row, col)` of channel `c` lives at `c·N² + row·N + col`. Columns run
/// along x, rows along z; this is also the layout of the GPU storage buffers.
#[derive(Debug, Clone, PartialEq)]
pub struct FrequencyField {
    resolution: u32,
    channels: u32,
    data: Vec<Complex32>,
}

impl FrequencyField {
    pub fn new(resolution: u32, channels: u32) -> Self {
        let len = (resolution as usize).pow(2) * channels as usize;
        Self {
            resolution,
            channels,
            data: vec![Complex32::new(0.0, 0.0); len],
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn channels(&self) -> u32 {
        self.channels
    }

    /// Cells per channel
    pub fn plane_len(&self) -> usize {
        (self.resolution as usize).pow(2)
    }

    #[inline]
    pub fn index(&self, channel: u32, row: u32, col: u32) -> usize {
        channel as usize * self.plane_len() + (row * self.resolution + col) as usize
    }

    #[inline]
    pub fn get(&self, channel: u32, row: u32, col: u32) -> Complex32 {
        self.data[self.index(channel, row, col)]
    }

    #[inline]
    pub fn set(&mut self, channel: u32, row: u32, col: u32, value: Complex32) {
        let idx = self.index(channel, row, col);
        self.data[idx] = value;
    }

    pub fn channel(&self, channel: u32) -> &[Complex32] {
        let len = self.plane_len();
        let start = channel as usize * len;
        &self.data[start..start + len]
    }

    pub fn as_slice(&self) -> &[Complex32] {
        &self.data
    }

    pub fn as_mut_slice(&mut self) -> &mut [Complex32] {
        &mut self.data
    }

    /// Sum of squared magnitudes over every channel
    pub fn energy(&self) -> f64 {
        self.data.iter().map(|c| c.norm_sqr() as f64).sum()
    }

    /// Interleaved `[re, im, re, im, ...]` view for GPU upload
    pub fn to_interleaved(&self) -> Vec<[f32; 2]> {
        self.data.iter().map(|c| [c.re, c.im]).collect()
    }

    pub fn from_interleaved(resolution: u32, channels: u32, values: &[[f32; 2]]) -> Self {
        let mut field = Self::new(resolution, channels);
        for (dst, src) in field.data.iter_mut().zip(values) {
            *dst = Complex32::new(src[0], src[1]);
        }
        field
    }
}

/// Which of the two ping-pong grids a stage touches
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PingPongSlot {
    A,
    B,
}

impl PingPongSlot {
    /// Slot for a selector value (`0 → A`, `1 → B`)
    pub fn from_selector(selector: u32) -> Self {
        if selector % 2 == 0 {
            Self::A
        } else {
            Self::B
        }
    }

    pub fn selector(self) -> u32 {
        match self {
            Self::A => 0,
            Self::B => 1,
        }
    }

    pub fn other(self) -> Self {
        match self {
            Self::A => Self::B,
            Self::B => Self::A,
        }
    }
}

/// Two same-shaped frequency fields the FFT stages alternate between
#[derive(Debug, Clone)]
pub struct PingPongBuffer {
    a: FrequencyField,
    b: FrequencyField,
}

impl PingPongBuffer {
    pub fn new(resolution: u32, channels: u32) -> Self {
        Self {
            a: FrequencyField::new(resolution, channels),
            b: FrequencyField::new(resolution, channels),
        }
    }

    pub fn slot(&self, slot: PingPongSlot) -> &FrequencyField {
        match slot {
            PingPongSlot::A => &self.a,
            PingPongSlot::B => &self.b,
        }
    }

    pub fn slot_mut(&mut self, slot: PingPongSlot) -> &mut FrequencyField {
        match slot {
            PingPongSlot::A => &mut self.a,
            PingPongSlot::B => &mut self.b,
        }
    }

    /// Borrow one slot for reading and the other for writing
    pub fn split(&mut self, read: PingPongSlot) -> (&FrequencyField, &mut FrequencyField) {
        match read {
            PingPongSlot::A => (&self.a, &mut self.b),
            PingPongSlot::B => (&self.b, &mut self.a),
        }
    }
}

/// `resolution × resolution` grid of 4-component texels (row-major, rows along z)
#[derive(Debug, Clone, PartialEq)]
pub struct OutputField {
    resolution: u32,
    texels: Vec<Vec4>,
}

impl OutputField {
    pub fn new(resolution: u32) -> Self {
        Self {
            resolution,
            texels: vec![Vec4::ZERO; (resolution as usize).pow(2)],
        }
    }

    pub fn from_texels(resolution: u32, texels: Vec<Vec4>) -> Self {
        debug_assert_eq!(texels.len(), (resolution as usize).pow(2));
        Self { resolution, texels }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn texels(&self) -> &[Vec4] {
        &self.texels
    }

    /// Texel at `(x, z)`, wrapping around the periodic tile
    #[inline]
    pub fn get(&self, x: i64, z: i64) -> Vec4 {
        let n = self.resolution as i64;
        let (x, z) = (x.rem_euclid(n), z.rem_euclid(n));
        self.texels[(z * n + x) as usize]
    }

    #[inline]
    pub fn set(&mut self, x: u32, z: u32, value: Vec4) {
        let idx = (z * self.resolution + x) as usize;
        self.texels[idx] = value;
    }

    /// Bilinear sample with repeat addressing; `uv` in tile units
    ///
    /// Texel centres sit at `(i + 0.5) / N`, matching a GPU sampler.
    pub fn sample(&self, uv: Vec2) -> Vec4 {
        let n = self.resolution as f32;
        let p = uv * n - Vec2::splat(0.5);
        let base = p.floor();
        let frac = p - base;
        let (x0, z0) = (base.x as i64, base.y as i64);

        let top = self.get(x0, z0).lerp(self.get(x0 + 1, z0), frac.x);
        let bottom = self.get(x0, z0 + 1).lerp(self.get(x0 + 1, z0 + 1), frac.x);
        top.lerp(bottom, frac.y)
    }
}

/// Renderer-facing outputs of one cascade
#[derive(Debug, Clone, PartialEq)]
pub struct OceanMaps {
    /// xyz = world-space offset (x, height, z), w unused
    pub displacement: OutputField,
    /// xyz = unit surface normal, w = Jacobian of the horizontal displacement
    pub normal: OutputField,
}

impl OceanMaps {
    pub fn new(resolution: u32) -> Self {
        Self {
            displacement: OutputField::new(resolution),
            normal: OutputField::new(resolution),
        }
    }

    pub fn resolution(&self) -> u32 {
        self.displacement.resolution()
    }
}
