//! Separable 2D inverse FFT: iterative radix-2 Cooley-Tukey stages along rows
//! then columns, alternating between the two ping-pong grids.
//!
//! The transform is unnormalised, `out(x) = Σ F(k)·e^{+2πi·k·x/N}`; the 1/N²
//! factor is applied by the deriver.

use bytemuck::{Pod, Zeroable};

use super::field::{Complex32, FrequencyField, PingPongBuffer, PingPongSlot};

/// Axis a butterfly pass runs along
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FftDirection {
    /// Along rows (x)
    Horizontal,
    /// Along columns (z)
    Vertical,
}

impl FftDirection {
    pub fn tag(self) -> u32 {
        match self {
            Self::Horizontal => 0,
            Self::Vertical => 1,
        }
    }
}

/// Parameters of one butterfly dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FftStageParams {
    /// Stage within its direction, `0..log2(N)`
    pub stage: u32,
    pub direction: FftDirection,
    pub resolution: u32,
    /// Ping-pong grid written by this stage (0 = A, 1 = B)
    pub ping_pong_selector: u32,
}

impl FftStageParams {
    pub fn new(stage: u32, direction: FftDirection, resolution: u32) -> Self {
        let stage_count = resolution.trailing_zeros();
        Self {
            stage,
            direction,
            resolution,
            ping_pong_selector: global_stage_index(stage, direction, stage_count) % 2,
        }
    }

    /// Where this stage reads from and writes to
    pub fn io(&self) -> StageIo {
        stage_io(self.stage, self.direction, self.resolution.trailing_zeros())
    }
}

/// Input of a butterfly stage
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StageSource {
    /// h(k,t), read by the very first stage only
    TimeSpectrum,
    PingPong(PingPongSlot),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StageIo {
    pub read: StageSource,
    pub write: PingPongSlot,
}

/// Position of a stage in the frame's stage chain (horizontal first)
pub fn global_stage_index(stage: u32, direction: FftDirection, stage_count: u32) -> u32 {
    match direction {
        FftDirection::Horizontal => stage,
        FftDirection::Vertical => stage_count + stage,
    }
}

/// Ping-pong selection as a pure function of stage and direction
///
/// Stage `i` of the chain writes slot `i mod 2` and reads whatever stage
/// `i - 1` wrote, so the vertical pass picks up the last horizontal output
/// regardless of the parity of log2(N).
pub fn stage_io(stage: u32, direction: FftDirection, stage_count: u32) -> StageIo {
    let index = global_stage_index(stage, direction, stage_count);
    let read = if index == 0 {
        StageSource::TimeSpectrum
    } else {
        StageSource::PingPong(PingPongSlot::from_selector(index - 1))
    };
    StageIo {
        read,
        write: PingPongSlot::from_selector(index),
    }
}

/// Grid holding the finished spatial-domain result
pub fn final_output(stage_count: u32) -> StageSource {
    if stage_count == 0 {
        StageSource::TimeSpectrum
    } else {
        StageSource::PingPong(PingPongSlot::from_selector(2 * stage_count - 1))
    }
}

/// Every dispatch of one frame's transform, in recording order
pub fn stage_plan(resolution: u32) -> Vec<FftStageParams> {
    let stage_count = resolution.trailing_zeros();
    [FftDirection::Horizontal, FftDirection::Vertical]
        .into_iter()
        .flat_map(|direction| {
            (0..stage_count).map(move |stage| FftStageParams::new(stage, direction, resolution))
        })
        .collect()
}

/// Reverse the lowest `bits` bits of `i`
#[inline]
pub fn bit_reverse(i: u32, bits: u32) -> u32 {
    if bits == 0 {
        0
    } else {
        i.reverse_bits() >> (32 - bits)
    }
}

/// `out[index] = in[input_a] + twiddle · in[input_b]`
#[repr(C)]
#[derive(Copy, Clone, Debug, PartialEq, Pod, Zeroable)]
pub struct ButterflyEntry {
    pub input_a: u32,
    pub input_b: u32,
    pub twiddle: [f32; 2],
}

/// Per-stage input indices and twiddle factors for one resolution
///
/// Stage 0 reads its inputs in bit-reversed order, which folds the
/// permutation into the first butterfly.
#[derive(Debug, Clone)]
pub struct ButterflyTable {
    resolution: u32,
    stage_count: u32,
    entries: Vec<ButterflyEntry>,
}

impl ButterflyTable {
    pub fn new(resolution: u32) -> Self {
        let stage_count = resolution.trailing_zeros();
        let n = resolution as usize;
        let mut entries = vec![ButterflyEntry::zeroed(); n * stage_count as usize];

        for stage in 0..stage_count {
            let half = 1u32 << stage; // butterfly span
            let blocks = resolution >> (stage + 1);
            for block in 0..blocks {
                for k in 0..half {
                    let top = block * 2 * half + k;
                    let bottom = top + half;
                    let (a, b) = if stage == 0 {
                        (bit_reverse(top, stage_count), bit_reverse(bottom, stage_count))
                    } else {
                        (top, bottom)
                    };

                    let angle = std::f64::consts::TAU * k as f64 / (2 * half) as f64;
                    let (sin, cos) = angle.sin_cos();
                    let row = stage as usize * n;
                    entries[row + top as usize] = ButterflyEntry {
                        input_a: a,
                        input_b: b,
                        twiddle: [cos as f32, sin as f32],
                    };
                    entries[row + bottom as usize] = ButterflyEntry {
                        input_a: a,
                        input_b: b,
                        twiddle: [-cos as f32, -sin as f32],
                    };
                }
            }
        }

        Self {
            resolution,
            stage_count,
            entries,
        }
    }

    pub fn resolution(&self) -> u32 {
        self.resolution
    }

    pub fn stage_count(&self) -> u32 {
        self.stage_count
    }

    pub fn entries(&self) -> &[ButterflyEntry] {
        &self.entries
    }

    #[inline]
    pub fn entry(&self, stage: u32, index: u32) -> ButterflyEntry {
        self.entries[(stage * self.resolution + index) as usize]
    }
}

/// CPU reference of the butterfly kernel
#[derive(Debug, Clone)]
pub struct FftExecutor {
    table: ButterflyTable,
}

impl FftExecutor {
    pub fn new(resolution: u32) -> Self {
        Self {
            table: ButterflyTable::new(resolution),
        }
    }

    pub fn table(&self) -> &ButterflyTable {
        &self.table
    }

    /// Run one stage over every channel of `src`, writing `dst`
    pub fn execute_stage(&self, params: &FftStageParams, src: &FrequencyField, dst: &mut FrequencyField) {
        let n = self.table.resolution;
        for channel in 0..src.channels() {
            for line in 0..n {
                for index in 0..n {
                    let entry = self.table.entry(params.stage, index);
                    let (a, b, row, col) = match params.direction {
                        FftDirection::Horizontal => (
                            src.get(channel, line, entry.input_a),
                            src.get(channel, line, entry.input_b),
                            line,
                            index,
                        ),
                        FftDirection::Vertical => (
                            src.get(channel, entry.input_a, line),
                            src.get(channel, entry.input_b, line),
                            index,
                            line,
                        ),
                    };
                    let twiddle = Complex32::new(entry.twiddle[0], entry.twiddle[1]);
                    dst.set(channel, row, col, a + twiddle * b);
                }
            }
        }
    }

    /// Full unnormalised inverse transform, following the same ping-pong
    /// schedule as the recorded frame
    pub fn inverse_2d(&self, input: &FrequencyField) -> FrequencyField {
        let mut buffers = PingPongBuffer::new(input.resolution(), input.channels());
        for params in stage_plan(self.table.resolution) {
            let io = params.io();
            match io.read {
                StageSource::TimeSpectrum => {
                    self.execute_stage(&params, input, buffers.slot_mut(io.write));
                }
                StageSource::PingPong(read) => {
                    let (src, dst) = buffers.split(read);
                    self.execute_stage(&params, src, dst);
                }
            }
        }
        match final_output(self.table.stage_count) {
            StageSource::TimeSpectrum => input.clone(),
            StageSource::PingPong(slot) => buffers.slot(slot).clone(),
        }
    }
}
