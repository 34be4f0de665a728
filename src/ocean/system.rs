//! High-level ocean system: owns the pipeline, accumulates time and drives a
//! compute backend once per frame.

use glam::Vec2;
use log::{debug, warn};

use super::field::OceanMaps;
use super::pipeline::{ComputeBackend, OceanPipeline};
use super::variant::PipelineVariant;
use crate::error::Result;
use crate::params::{SimulationSettings, SpectrumParams};

/// Ocean simulation bound to one executor
pub struct OceanSystem<B: ComputeBackend> {
    pipeline: OceanPipeline,
    backend: B,
    frames_submitted: u64,
}

impl<B: ComputeBackend> OceanSystem<B> {
    /// Wrap an already-created backend; both must agree on settings
    pub fn new(pipeline: OceanPipeline, backend: B) -> Self {
        Self {
            pipeline,
            backend,
            frames_submitted: 0,
        }
    }

    /// Build a system, letting `make_backend` allocate for the chosen variant
    pub fn with_backend<F>(
        settings: SimulationSettings,
        spectrum: SpectrumParams,
        variant: Option<PipelineVariant>,
        make_backend: F,
    ) -> Result<Self>
    where
        F: FnOnce(&SimulationSettings, PipelineVariant) -> Result<B>,
    {
        let pipeline = OceanPipeline::new(settings, spectrum, variant)?;
        let backend = make_backend(pipeline.settings(), pipeline.variant())?;
        Ok(Self::new(pipeline, backend))
    }

    pub fn pipeline(&self) -> &OceanPipeline {
        &self.pipeline
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn backend_mut(&mut self) -> &mut B {
        &mut self.backend
    }

    pub fn time_s(&self) -> f32 {
        self.pipeline.settings().time_s
    }

    pub fn frames_submitted(&self) -> u64 {
        self.frames_submitted
    }

    /// Advance simulation time and run one frame
    ///
    /// # Arguments
    /// * `dt_s` - Time step in seconds (negative steps are allowed; the
    ///   dispersion relation is time-reversible)
    pub fn update(&mut self, dt_s: f32) -> Result<()> {
        let time_s = self.time_s() + dt_s;
        self.render_at(time_s)
    }

    /// Run one frame at an absolute simulation time
    ///
    /// A failed submit rolls the pipeline back: time, frame counter, buffer
    /// states and a pending spectrum rebuild are as they were before the call.
    pub fn render_at(&mut self, time_s: f32) -> Result<()> {
        let committed = self.pipeline.clone();
        self.pipeline.set_time(time_s);
        let frame = match self.pipeline.record_frame() {
            Ok(frame) => frame,
            Err(e) => {
                self.pipeline = committed;
                return Err(e);
            }
        };
        debug!(
            "Submitting frame {} at t={:.3}s ({} commands)",
            frame.stream.frame,
            time_s,
            frame.stream.len()
        );
        if let Err(e) = self.backend.submit(&frame) {
            warn!("Frame {} failed, rolling back: {e}", frame.stream.frame);
            self.pipeline = committed;
            return Err(e);
        }
        self.frames_submitted += 1;
        Ok(())
    }

    /// Displacement and normal maps of one cascade from the last frame
    pub fn maps(&mut self, cascade: usize) -> Result<OceanMaps> {
        self.backend.read_maps(cascade)
    }

    /// Maps of every cascade, coarsest first
    pub fn all_maps(&mut self) -> Result<Vec<OceanMaps>> {
        (0..self.pipeline.cascade_count())
            .map(|c| self.backend.read_maps(c))
            .collect()
    }

    pub fn set_spectrum(&mut self, spectrum: SpectrumParams) -> Result<()> {
        self.pipeline.set_spectrum(spectrum)
    }

    pub fn set_wind_speed(&mut self, wind_speed_m_per_s: f32) -> Result<()> {
        self.pipeline.set_wind_speed(wind_speed_m_per_s)
    }

    pub fn set_wind_direction(&mut self, direction: Vec2) -> Result<()> {
        self.pipeline.set_wind_direction(direction)
    }

    pub fn set_amplitude(&mut self, amplitude: f32) -> Result<()> {
        self.pipeline.set_amplitude(amplitude)
    }

    pub fn set_suppression(&mut self, suppression: f32) -> Result<()> {
        self.pipeline.set_suppression(suppression)
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.pipeline.set_seed(seed)
    }

    pub fn set_choppiness(&mut self, choppiness: f32) -> Result<()> {
        self.pipeline.set_choppiness(choppiness)
    }

    pub fn set_tile_scale(&mut self, tile_scale: f32) -> Result<()> {
        self.pipeline.set_tile_scale(tile_scale)
    }
}
