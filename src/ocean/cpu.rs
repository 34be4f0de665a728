//! Reference executor: runs a recorded frame on the CPU, enforcing every
//! transition in the stream against its own view of buffer states.

use log::{debug, trace};

use super::barrier::{BufferKind, ResourceId, ResourceState, StateTracker};
use super::command::{Command, Dispatch, Kernel};
use super::derive::DisplacementNormalDeriver;
use super::evolve::SpectrumEvolver;
use super::fft::FftExecutor;
use super::field::{FrequencyField, OceanMaps, PingPongBuffer, PingPongSlot};
use super::pipeline::{check_cascade, ComputeBackend, FrameRecording};
use super::spectrum::{SpectrumConstants, SpectrumInitializer, INITIAL_SPECTRUM_CHANNELS};
use super::variant::PipelineVariant;
use crate::error::{OceanError, Result};
use crate::params::SimulationSettings;

/// Buffers owned by one cascade
#[derive(Debug, Clone)]
struct CascadeBuffers {
    initializer: Option<SpectrumInitializer>,
    initial: FrequencyField,
    time: FrequencyField,
    ping_pong: PingPongBuffer,
    maps: OceanMaps,
}

impl CascadeBuffers {
    fn new(resolution: u32, channels: u32) -> Self {
        Self {
            initializer: None,
            initial: FrequencyField::new(resolution, INITIAL_SPECTRUM_CHANNELS),
            time: FrequencyField::new(resolution, channels),
            ping_pong: PingPongBuffer::new(resolution, channels),
            maps: OceanMaps::new(resolution),
        }
    }

    fn spectrum_constants(&self) -> Result<&SpectrumConstants> {
        self.initializer
            .as_ref()
            .map(|init| &init.constants)
            .ok_or_else(|| OceanError::invalid(
                "initial_spectrum",
                "time spectrum dispatched before the initial spectrum was built",
            ))
    }

    fn field(&self, kind: BufferKind) -> Result<&FrequencyField> {
        match kind {
            BufferKind::InitialSpectrum => Ok(&self.initial),
            BufferKind::TimeSpectrum => Ok(&self.time),
            BufferKind::PingPong(slot) => Ok(self.ping_pong.slot(slot)),
            BufferKind::Displacement | BufferKind::Normal => Err(OceanError::invalid(
                "kind",
                "output maps are not frequency fields; use read_maps",
            )),
        }
    }
}

/// Executes frames with the CPU reference kernels
#[derive(Debug, Clone)]
pub struct CpuBackend {
    fft: FftExecutor,
    evolver: SpectrumEvolver,
    deriver: DisplacementNormalDeriver,
    cascades: Vec<CascadeBuffers>,
    states: StateTracker,
}

impl CpuBackend {
    pub fn new(settings: &SimulationSettings, variant: PipelineVariant) -> Result<Self> {
        settings.validate()?;
        let count = settings.cascade_count as usize;

        debug!(
            "CPU backend: {} cascade(s) of {}² texels, {} channel(s)",
            count,
            settings.resolution,
            variant.channels()
        );

        Ok(Self {
            fft: FftExecutor::new(settings.resolution),
            evolver: SpectrumEvolver::new(variant),
            deriver: DisplacementNormalDeriver::new(variant),
            cascades: vec![CascadeBuffers::new(settings.resolution, variant.channels()); count],
            states: StateTracker::new(count),
        })
    }

    pub fn state(&self, resource: ResourceId) -> ResourceState {
        self.states.state(resource)
    }

    fn run_dispatch(&mut self, dispatch: &Dispatch, frame: &FrameRecording) -> Result<()> {
        check_cascade(dispatch.cascade, self.cascades.len())?;
        trace!("cpu: cascade {} {}", dispatch.cascade, dispatch.kernel.label());

        let buffers = &mut self.cascades[dispatch.cascade];
        match dispatch.kernel {
            Kernel::InitialSpectrum => {
                let initializer = frame
                    .spectrum
                    .as_ref()
                    .and_then(|all| all.get(dispatch.cascade))
                    .ok_or_else(|| OceanError::invalid(
                        "spectrum",
                        "initial spectrum dispatched without initializer data",
                    ))?;
                initializer.build_into(&mut buffers.initial);
                buffers.initializer = Some(initializer.clone());
            }
            Kernel::TimeSpectrum => {
                let constants = *buffers.spectrum_constants()?;
                self.evolver
                    .evolve_into(&buffers.initial, &constants, frame.time_s, &mut buffers.time);
            }
            Kernel::Butterfly(params) => {
                let write = PingPongSlot::from_selector(params.ping_pong_selector);
                match dispatch.reads.first().map(|id| id.kind) {
                    Some(BufferKind::PingPong(read)) => {
                        let (src, dst) = buffers.ping_pong.split(read);
                        self.fft.execute_stage(&params, src, dst);
                    }
                    _ => {
                        let dst = buffers.ping_pong.slot_mut(write);
                        self.fft.execute_stage(&params, &buffers.time, dst);
                    }
                }
            }
            Kernel::Derive => {
                let constants = frame.derivation.get(dispatch.cascade).ok_or(
                    OceanError::CascadeOutOfRange {
                        cascade: dispatch.cascade,
                        count: frame.derivation.len(),
                    },
                )?;
                let source = dispatch
                    .reads
                    .first()
                    .map(|id| id.kind)
                    .unwrap_or(BufferKind::TimeSpectrum);
                let CascadeBuffers {
                    initial,
                    time,
                    ping_pong,
                    maps,
                    ..
                } = buffers;
                let spatial = match source {
                    BufferKind::InitialSpectrum => &*initial,
                    BufferKind::PingPong(slot) => ping_pong.slot(slot),
                    _ => &*time,
                };
                self.deriver.derive_into(spatial, constants, maps);
            }
        }
        Ok(())
    }

    /// Complex grid behind a buffer, for inspecting intermediate results
    pub fn field(&self, cascade: usize, kind: BufferKind) -> Result<&FrequencyField> {
        check_cascade(cascade, self.cascades.len())?;
        self.cascades[cascade].field(kind)
    }
}

impl ComputeBackend for CpuBackend {
    fn submit(&mut self, frame: &FrameRecording) -> Result<()> {
        // States only advance once the whole frame has run
        let mut states = self.states.clone();
        for command in frame.stream.commands() {
            match command {
                Command::Transition(transition) => states.apply(transition)?,
                Command::Dispatch(dispatch) => {
                    states.check_dispatch(dispatch)?;
                    self.run_dispatch(dispatch, frame)?;
                }
            }
        }
        self.states = states;
        Ok(())
    }

    fn read_maps(&mut self, cascade: usize) -> Result<OceanMaps> {
        check_cascade(cascade, self.cascades.len())?;
        for kind in [BufferKind::Displacement, BufferKind::Normal] {
            self.states
                .expect(ResourceId::new(cascade, kind), ResourceState::Readable)?;
        }
        Ok(self.cascades[cascade].maps.clone())
    }
}
