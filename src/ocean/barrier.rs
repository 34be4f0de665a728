//! Resource state machine: which buffers are compute targets and which are
//! sources, and the transitions recorded between kernels.
//!
//! Transitions are recorded into the command stream right after the producer
//! (Writable → Readable) and right before the next overwrite (Readable →
//! Writable). The two output maps stay Readable from the end of one frame until
//! the start of the next, so every frame but the first opens by handing them
//! back to the compute side.

use std::collections::HashMap;

use log::trace;

use super::command::{CommandStream, Dispatch};
use super::field::PingPongSlot;
use crate::error::{OceanError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum BufferKind {
    /// h0(k) and conj(h0(-k))
    InitialSpectrum,
    /// Packed h(k,t) channels
    TimeSpectrum,
    PingPong(PingPongSlot),
    Displacement,
    Normal,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ResourceId {
    pub cascade: usize,
    pub kind: BufferKind,
}

impl ResourceId {
    pub fn new(cascade: usize, kind: BufferKind) -> Self {
        Self { cascade, kind }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ResourceState {
    /// Target of a compute kernel
    Writable,
    /// Source for a kernel or the renderer
    Readable,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Transition {
    pub resource: ResourceId,
    pub from: ResourceState,
    pub to: ResourceState,
}

/// Every buffer a cascade owns, in allocation order
pub fn cascade_resources(cascade: usize) -> [ResourceId; 6] {
    [
        BufferKind::InitialSpectrum,
        BufferKind::TimeSpectrum,
        BufferKind::PingPong(PingPongSlot::A),
        BufferKind::PingPong(PingPongSlot::B),
        BufferKind::Displacement,
        BufferKind::Normal,
    ]
    .map(|kind| ResourceId::new(cascade, kind))
}

/// Current state of every buffer, checked against each transition
#[derive(Debug, Clone, Default)]
pub struct StateTracker {
    states: HashMap<ResourceId, ResourceState>,
}

impl StateTracker {
    /// All buffers of `cascade_count` cascades, starting Writable
    pub fn new(cascade_count: usize) -> Self {
        let states = (0..cascade_count)
            .flat_map(cascade_resources)
            .map(|id| (id, ResourceState::Writable))
            .collect();
        Self { states }
    }

    pub fn state(&self, resource: ResourceId) -> ResourceState {
        self.states
            .get(&resource)
            .copied()
            .unwrap_or(ResourceState::Writable)
    }

    pub fn expect(&self, resource: ResourceId, expected: ResourceState) -> Result<()> {
        let actual = self.state(resource);
        if actual == expected {
            Ok(())
        } else {
            Err(OceanError::Hazard {
                resource,
                expected,
                actual,
            })
        }
    }

    pub fn apply(&mut self, transition: &Transition) -> Result<()> {
        self.expect(transition.resource, transition.from)?;
        self.states.insert(transition.resource, transition.to);
        Ok(())
    }

    /// Reads must be Readable and writes Writable
    pub fn check_dispatch(&self, dispatch: &Dispatch) -> Result<()> {
        for &id in &dispatch.reads {
            self.expect(id, ResourceState::Readable)?;
        }
        for &id in &dispatch.writes {
            self.expect(id, ResourceState::Writable)?;
        }
        Ok(())
    }
}

/// Tracks buffer states and records the transitions between them
#[derive(Debug, Clone)]
pub struct ResourceStateCoordinator {
    states: StateTracker,
    cascade_count: usize,
    /// Set once a frame has left the output maps Readable for the renderer
    outputs_published: bool,
    log: Vec<Transition>,
}

impl ResourceStateCoordinator {
    pub fn new(cascade_count: usize) -> Self {
        Self {
            states: StateTracker::new(cascade_count),
            cascade_count,
            outputs_published: false,
            log: Vec::new(),
        }
    }

    pub fn state(&self, resource: ResourceId) -> ResourceState {
        self.states.state(resource)
    }

    pub fn outputs_published(&self) -> bool {
        self.outputs_published
    }

    /// Transitions recorded since the last `begin_frame`
    pub fn log(&self) -> &[Transition] {
        &self.log
    }

    fn transition(
        &mut self,
        resource: ResourceId,
        from: ResourceState,
        to: ResourceState,
        stream: &mut CommandStream,
    ) -> Result<()> {
        let transition = Transition { resource, from, to };
        self.states.apply(&transition)?;
        trace!("{:?}: {:?} -> {:?}", resource, from, to);
        self.log.push(transition);
        stream.push_transition(transition);
        Ok(())
    }

    /// Start a frame; reclaims the output maps unless this is the first frame
    pub fn begin_frame(&mut self, stream: &mut CommandStream) -> Result<()> {
        self.log.clear();
        if !self.outputs_published {
            return Ok(());
        }
        for cascade in 0..self.cascade_count {
            for kind in [BufferKind::Displacement, BufferKind::Normal] {
                self.transition(
                    ResourceId::new(cascade, kind),
                    ResourceState::Readable,
                    ResourceState::Writable,
                    stream,
                )?;
            }
        }
        Ok(())
    }

    /// Make a buffer writable ahead of the kernel that overwrites it
    pub fn prepare_write(&mut self, resource: ResourceId, stream: &mut CommandStream) -> Result<()> {
        if self.state(resource) == ResourceState::Readable {
            self.transition(resource, ResourceState::Readable, ResourceState::Writable, stream)?;
        }
        Ok(())
    }

    /// Expose a freshly written buffer to its consumers
    pub fn publish(&mut self, resource: ResourceId, stream: &mut CommandStream) -> Result<()> {
        self.transition(resource, ResourceState::Writable, ResourceState::Readable, stream)
    }

    pub fn require_readable(&self, resource: ResourceId) -> Result<()> {
        self.states.expect(resource, ResourceState::Readable)
    }

    /// Close a frame; the output maps now stay Readable for the renderer
    pub fn end_frame(&mut self) -> Result<()> {
        for cascade in 0..self.cascade_count {
            self.require_readable(ResourceId::new(cascade, BufferKind::Displacement))?;
            self.require_readable(ResourceId::new(cascade, BufferKind::Normal))?;
        }
        self.outputs_published = true;
        Ok(())
    }
}
