//! Frame recording: turns the current configuration into an ordered command
//! stream of kernel dispatches and state transitions.

use log::{debug, info, trace, warn};

use super::barrier::{BufferKind, ResourceId, ResourceStateCoordinator};
use super::command::{CommandStream, Dispatch, Kernel};
use super::derive::DerivationConstants;
use super::fft::{final_output, stage_plan, FftStageParams, StageSource};
use super::field::OceanMaps;
use super::spectrum::{SpectrumConstants, SpectrumInitializer};
use super::variant::PipelineVariant;
use crate::error::{OceanError, Result};
use crate::params::{SimulationSettings, SpectrumParams};

/// Executes recorded frames and hands the outputs to the renderer
pub trait ComputeBackend {
    /// Run one frame's commands, in order
    ///
    /// On error the backend's buffer states are left as they were before the
    /// call, so the same frame can be submitted again.
    fn submit(&mut self, frame: &FrameRecording) -> Result<()>;

    /// Copy of a cascade's displacement and normal maps
    fn read_maps(&mut self, cascade: usize) -> Result<OceanMaps>;
}

/// One frame's commands plus the data its kernels consume
#[derive(Debug, Clone)]
pub struct FrameRecording {
    pub stream: CommandStream,
    pub time_s: f32,
    /// Per-cascade derivation uniforms
    pub derivation: Vec<DerivationConstants>,
    /// Present when the initial spectrum is (re)built this frame
    pub spectrum: Option<Vec<SpectrumInitializer>>,
}

/// Records the spectrum → evolve → FFT → derive chain for every cascade
#[derive(Debug, Clone)]
pub struct OceanPipeline {
    settings: SimulationSettings,
    spectrum: SpectrumParams,
    variant: PipelineVariant,
    stages: Vec<FftStageParams>,
    coordinator: ResourceStateCoordinator,
    spectrum_dirty: bool,
    frame: u64,
}

impl OceanPipeline {
    /// Build a pipeline; the variant defaults to what the choppiness implies
    pub fn new(
        settings: SimulationSettings,
        spectrum: SpectrumParams,
        variant: Option<PipelineVariant>,
    ) -> Result<Self> {
        settings.validate()?;
        spectrum.validate()?;
        let variant = variant.unwrap_or_else(|| PipelineVariant::for_choppiness(settings.choppiness));

        info!(
            "Ocean pipeline: {}x{} texels, {} cascade(s), {:?}, {} stages per pass",
            settings.resolution,
            settings.resolution,
            settings.cascade_count,
            variant,
            settings.stage_count()
        );
        if spectrum.wind_speed_m_per_s < 1e-3 {
            warn!("Wind speed is ~0; the spectrum will be flat");
        }

        Ok(Self {
            stages: stage_plan(settings.resolution),
            coordinator: ResourceStateCoordinator::new(settings.cascade_count as usize),
            settings,
            spectrum,
            variant,
            spectrum_dirty: true,
            frame: 0,
        })
    }

    pub fn settings(&self) -> &SimulationSettings {
        &self.settings
    }

    pub fn spectrum_params(&self) -> &SpectrumParams {
        &self.spectrum
    }

    pub fn variant(&self) -> PipelineVariant {
        self.variant
    }

    pub fn cascade_count(&self) -> usize {
        self.settings.cascade_count as usize
    }

    pub fn coordinator(&self) -> &ResourceStateCoordinator {
        &self.coordinator
    }

    /// Frames recorded so far
    pub fn frame(&self) -> u64 {
        self.frame
    }

    pub fn set_time(&mut self, time_s: f32) {
        self.settings.time_s = time_s;
    }

    /// Replace the spectrum parameters; h0 is rebuilt on the next frame
    pub fn set_spectrum(&mut self, spectrum: SpectrumParams) -> Result<()> {
        spectrum.validate()?;
        if spectrum != self.spectrum {
            debug!("Spectrum parameters changed, rebuilding h0 next frame");
            self.spectrum = spectrum;
            self.spectrum_dirty = true;
        }
        Ok(())
    }

    pub fn set_wind_speed(&mut self, wind_speed_m_per_s: f32) -> Result<()> {
        self.set_spectrum(SpectrumParams {
            wind_speed_m_per_s,
            ..self.spectrum.clone()
        })
    }

    pub fn set_wind_direction(&mut self, wind_direction: glam::Vec2) -> Result<()> {
        self.set_spectrum(SpectrumParams {
            wind_direction,
            ..self.spectrum.clone()
        })
    }

    pub fn set_amplitude(&mut self, amplitude: f32) -> Result<()> {
        self.set_spectrum(SpectrumParams {
            amplitude,
            ..self.spectrum.clone()
        })
    }

    pub fn set_suppression(&mut self, suppression: f32) -> Result<()> {
        self.set_spectrum(SpectrumParams {
            suppression,
            ..self.spectrum.clone()
        })
    }

    pub fn set_seed(&mut self, seed: u64) -> Result<()> {
        self.set_spectrum(SpectrumParams {
            seed,
            ..self.spectrum.clone()
        })
    }

    pub fn set_choppiness(&mut self, choppiness: f32) -> Result<()> {
        let candidate = SimulationSettings {
            choppiness,
            ..self.settings.clone()
        };
        candidate.validate()?;
        if self.variant == PipelineVariant::HeightOnly && choppiness > 0.0 {
            warn!("Choppiness has no effect on a height-only pipeline");
        }
        self.settings = candidate;
        Ok(())
    }

    pub fn set_tile_scale(&mut self, tile_scale: f32) -> Result<()> {
        let candidate = SimulationSettings {
            tile_scale,
            ..self.settings.clone()
        };
        candidate.validate()?;
        self.settings = candidate;
        Ok(())
    }

    pub fn spectrum_constants(&self, cascade: usize) -> SpectrumConstants {
        SpectrumConstants::new(&self.settings, &self.spectrum, cascade)
    }

    pub fn derivation_constants(&self, cascade: usize) -> DerivationConstants {
        DerivationConstants::new(&self.settings, self.variant, cascade)
    }

    /// Buffer holding the finished inverse transform
    pub fn fft_output(&self, cascade: usize) -> ResourceId {
        match final_output(self.settings.stage_count()) {
            StageSource::TimeSpectrum => ResourceId::new(cascade, BufferKind::TimeSpectrum),
            StageSource::PingPong(slot) => ResourceId::new(cascade, BufferKind::PingPong(slot)),
        }
    }

    fn dispatch(
        &mut self,
        stream: &mut CommandStream,
        cascade: usize,
        kernel: Kernel,
        reads: Vec<ResourceId>,
        writes: Vec<ResourceId>,
    ) -> Result<()> {
        for &id in &reads {
            self.coordinator.require_readable(id)?;
        }
        for &id in &writes {
            self.coordinator.prepare_write(id, stream)?;
        }
        trace!("frame {} cascade {}: {}", stream.frame, cascade, kernel.label());
        stream.push_dispatch(Dispatch {
            cascade,
            kernel,
            reads,
            writes: writes.clone(),
        });
        for id in writes {
            self.coordinator.publish(id, stream)?;
        }
        Ok(())
    }

    fn record_cascade(&mut self, stream: &mut CommandStream, cascade: usize, rebuild: bool) -> Result<()> {
        let id = |kind| ResourceId::new(cascade, kind);

        if rebuild {
            self.dispatch(
                stream,
                cascade,
                Kernel::InitialSpectrum,
                vec![],
                vec![id(BufferKind::InitialSpectrum)],
            )?;
        }

        self.dispatch(
            stream,
            cascade,
            Kernel::TimeSpectrum,
            vec![id(BufferKind::InitialSpectrum)],
            vec![id(BufferKind::TimeSpectrum)],
        )?;

        for params in self.stages.clone() {
            let io = params.io();
            let source = match io.read {
                StageSource::TimeSpectrum => id(BufferKind::TimeSpectrum),
                StageSource::PingPong(slot) => id(BufferKind::PingPong(slot)),
            };
            self.dispatch(
                stream,
                cascade,
                Kernel::Butterfly(params),
                vec![source],
                vec![id(BufferKind::PingPong(io.write))],
            )?;
        }

        let spatial = self.fft_output(cascade);
        self.dispatch(
            stream,
            cascade,
            Kernel::Derive,
            vec![spatial],
            vec![id(BufferKind::Displacement), id(BufferKind::Normal)],
        )
    }

    /// Record the next frame at the current simulation time
    pub fn record_frame(&mut self) -> Result<FrameRecording> {
        let mut stream = CommandStream::new(self.frame);
        let rebuild = self.spectrum_dirty;

        self.coordinator.begin_frame(&mut stream)?;
        for cascade in 0..self.cascade_count() {
            self.record_cascade(&mut stream, cascade, rebuild)?;
        }
        self.coordinator.end_frame()?;

        let spectrum = rebuild.then(|| {
            (0..self.cascade_count())
                .map(|c| SpectrumInitializer::new(&self.settings, &self.spectrum, c))
                .collect()
        });
        let derivation = (0..self.cascade_count())
            .map(|c| self.derivation_constants(c))
            .collect();

        self.spectrum_dirty = false;
        self.frame += 1;

        Ok(FrameRecording {
            stream,
            time_s: self.settings.time_s,
            derivation,
            spectrum,
        })
    }
}

/// Validate a cascade index against a pipeline's cascade count
pub(crate) fn check_cascade(cascade: usize, count: usize) -> Result<()> {
    if cascade < count {
        Ok(())
    } else {
        Err(OceanError::CascadeOutOfRange { cascade, count })
    }
}
