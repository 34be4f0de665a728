//! Ordered per-frame command stream shared by both executors.

use super::barrier::{ResourceId, Transition};
use super::fft::FftStageParams;

/// Compute kernel to run over a cascade's full grid
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Kernel {
    InitialSpectrum,
    TimeSpectrum,
    Butterfly(FftStageParams),
    Derive,
}

impl Kernel {
    pub fn label(&self) -> &'static str {
        match self {
            Self::InitialSpectrum => "initial_spectrum",
            Self::TimeSpectrum => "time_spectrum",
            Self::Butterfly(_) => "butterfly",
            Self::Derive => "derive",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Dispatch {
    pub cascade: usize,
    pub kernel: Kernel,
    /// Must be Readable when the dispatch is recorded
    pub reads: Vec<ResourceId>,
    /// Must be Writable when the dispatch is recorded
    pub writes: Vec<ResourceId>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Dispatch(Dispatch),
    Transition(Transition),
}

/// Everything recorded for one frame, in submission order
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CommandStream {
    pub frame: u64,
    commands: Vec<Command>,
}

impl CommandStream {
    pub fn new(frame: u64) -> Self {
        Self {
            frame,
            commands: Vec::new(),
        }
    }

    pub fn push_dispatch(&mut self, dispatch: Dispatch) {
        self.commands.push(Command::Dispatch(dispatch));
    }

    pub fn push_transition(&mut self, transition: Transition) {
        self.commands.push(Command::Transition(transition));
    }

    pub fn commands(&self) -> &[Command] {
        &self.commands
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }

    pub fn dispatches(&self) -> impl Iterator<Item = &Dispatch> {
        self.commands.iter().filter_map(|c| match c {
            Command::Dispatch(d) => Some(d),
            Command::Transition(_) => None,
        })
    }

    pub fn transitions(&self) -> impl Iterator<Item = &Transition> {
        self.commands.iter().filter_map(|c| match c {
            Command::Transition(t) => Some(t),
            Command::Dispatch(_) => None,
        })
    }
}
