//! Closed set of pipeline variants, chosen once at configuration time.

/// Which quantities the frequency-domain channels carry
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum PipelineVariant {
    /// One channel: height. Normals come from finite differences.
    HeightOnly,
    /// Three packed channels: (height, slope x), (slope z, offset x), (offset z, -).
    Choppy,
}

impl PipelineVariant {
    /// Pick the variant implied by a choppiness setting
    pub fn for_choppiness(choppiness: f32) -> Self {
        if choppiness > 0.0 {
            Self::Choppy
        } else {
            Self::HeightOnly
        }
    }

    /// Complex channels transformed by the FFT each frame
    pub fn channels(self) -> u32 {
        match self {
            Self::HeightOnly => 1,
            Self::Choppy => 3,
        }
    }

    /// Tag passed to the kernels
    pub fn tag(self) -> u32 {
        match self {
            Self::HeightOnly => 0,
            Self::Choppy => 1,
        }
    }
}
