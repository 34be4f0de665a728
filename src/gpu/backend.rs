//! GPU executor: one compute pipeline per kernel, per-cascade storage buffers
//! and `Rgba32Float` storage textures, one queue submission per frame.
//!
//! Frequency fields use the same channel-major `vec2<f32>` layout as
//! [`FrequencyField`], so read-backs compare directly with the CPU executor.

use std::sync::mpsc;

use bytemuck::{Pod, Zeroable};
use glam::Vec4;
use log::{debug, info, trace};
use wgpu::util::DeviceExt;

use super::context::GpuContext;
use crate::error::{OceanError, Result};
use crate::ocean::barrier::{BufferKind, ResourceId, ResourceState, StateTracker};
use crate::ocean::command::{Command, Dispatch, Kernel};
use crate::ocean::derive::DerivationConstants;
use crate::ocean::fft::{final_output, global_stage_index, stage_plan, ButterflyTable, StageSource};
use crate::ocean::field::{FrequencyField, OceanMaps, OutputField, PingPongSlot};
use crate::ocean::pipeline::{check_cascade, ComputeBackend, FrameRecording};
use crate::ocean::spectrum::{SpectrumConstants, INITIAL_SPECTRUM_CHANNELS};
use crate::ocean::variant::PipelineVariant;
use crate::params::SimulationSettings;

/// Threads per workgroup side (8×8)
const WORKGROUP_SIZE: u32 = 8;

/// Stride between per-stage uniforms (default min uniform offset alignment)
const STAGE_UNIFORM_STRIDE: u64 = 256;

/// Bytes per `Rgba32Float` texel
const TEXEL_BYTES: u32 = 16;

/// Bytes per complex cell
const COMPLEX_BYTES: u64 = 8;

const OUTPUT_FORMAT: wgpu::TextureFormat = wgpu::TextureFormat::Rgba32Float;

/// Per-frame evolution uniform
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct EvolveConstants {
    time_s: f32,
    variant: u32,
    _padding: [f32; 2],
}

/// Butterfly stage uniform, one per stage at `STAGE_UNIFORM_STRIDE`
#[repr(C)]
#[derive(Copy, Clone, Debug, Pod, Zeroable)]
struct StageUniform {
    stage: u32,
    direction: u32,
    resolution: u32,
    ping_pong_selector: u32,
}

/// Bind group layouts and pipelines for the four kernels
struct Kernels {
    initial_layout: wgpu::BindGroupLayout,
    time_layout: wgpu::BindGroupLayout,
    butterfly_layout: wgpu::BindGroupLayout,
    derive_layout: wgpu::BindGroupLayout,
    initial: wgpu::ComputePipeline,
    time: wgpu::ComputePipeline,
    butterfly: wgpu::ComputePipeline,
    derive: wgpu::ComputePipeline,
}

fn uniform_entry(binding: u32, dynamic_size: Option<u64>) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Uniform,
            has_dynamic_offset: dynamic_size.is_some(),
            min_binding_size: dynamic_size.and_then(wgpu::BufferSize::new),
        },
        count: None,
    }
}

fn storage_entry(binding: u32, read_only: bool) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::Buffer {
            ty: wgpu::BufferBindingType::Storage { read_only },
            has_dynamic_offset: false,
            min_binding_size: None,
        },
        count: None,
    }
}

fn buffer_entry(binding: u32, buffer: &wgpu::Buffer) -> wgpu::BindGroupEntry<'_> {
    wgpu::BindGroupEntry {
        binding,
        resource: buffer.as_entire_binding(),
    }
}

fn texture_entry(binding: u32) -> wgpu::BindGroupLayoutEntry {
    wgpu::BindGroupLayoutEntry {
        binding,
        visibility: wgpu::ShaderStages::COMPUTE,
        ty: wgpu::BindingType::StorageTexture {
            access: wgpu::StorageTextureAccess::WriteOnly,
            format: OUTPUT_FORMAT,
            view_dimension: wgpu::TextureViewDimension::D2,
        },
        count: None,
    }
}

impl Kernels {
    fn new(context: &GpuContext) -> Result<Self> {
        let device = &context.device;
        let layout = |label: &str, entries: &[wgpu::BindGroupLayoutEntry]| {
            device.create_bind_group_layout(&wgpu::BindGroupLayoutDescriptor {
                label: Some(label),
                entries,
            })
        };

        let initial_layout = layout(
            "Initial Spectrum Layout",
            &[uniform_entry(0, None), storage_entry(1, true), storage_entry(2, false)],
        );
        let time_layout = layout(
            "Time Spectrum Layout",
            &[
                uniform_entry(0, None),
                uniform_entry(1, None),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        let butterfly_layout = layout(
            "Butterfly Layout",
            &[
                uniform_entry(0, Some(std::mem::size_of::<StageUniform>() as u64)),
                storage_entry(1, true),
                storage_entry(2, true),
                storage_entry(3, false),
            ],
        );
        let derive_layout = layout(
            "Derive Layout",
            &[
                uniform_entry(0, None),
                storage_entry(1, true),
                texture_entry(2),
                texture_entry(3),
            ],
        );

        Ok(Self {
            initial: context.create_kernel(
                "initial_spectrum",
                include_str!("../shaders/initial_spectrum.wgsl"),
                &initial_layout,
            )?,
            time: context.create_kernel(
                "time_spectrum",
                include_str!("../shaders/time_spectrum.wgsl"),
                &time_layout,
            )?,
            butterfly: context.create_kernel(
                "butterfly",
                include_str!("../shaders/butterfly.wgsl"),
                &butterfly_layout,
            )?,
            derive: context.create_kernel(
                "derive",
                include_str!("../shaders/derive.wgsl"),
                &derive_layout,
            )?,
            initial_layout,
            time_layout,
            butterfly_layout,
            derive_layout,
        })
    }
}

/// Reject resolutions whose field buffers exceed the device limits
///
/// wgpu reports oversized buffers through its uncaptured-error handler, so
/// this runs before anything is allocated.
fn check_field_limits(resolution: u32, variant: PipelineVariant, limits: &wgpu::Limits) -> Result<()> {
    let cells = (resolution as u64).pow(2);
    let limit = limits
        .max_buffer_size
        .min(limits.max_storage_buffer_binding_size as u64);
    for (buffer, channels) in [
        ("initial spectrum", INITIAL_SPECTRUM_CHANNELS),
        ("time spectrum", variant.channels()),
    ] {
        let size = cells * channels as u64 * COMPLEX_BYTES;
        if size > limit {
            return Err(OceanError::BufferTooLarge { buffer, size, limit });
        }
    }
    Ok(())
}

/// GPU resources owned by one cascade
struct CascadeResources {
    spectrum_uniform: wgpu::Buffer,
    derive_uniform: wgpu::Buffer,
    noise: wgpu::Buffer,
    initial: wgpu::Buffer,
    time: wgpu::Buffer,
    ping_pong: [wgpu::Buffer; 2],
    displacement: wgpu::Texture,
    normal: wgpu::Texture,
    initial_group: wgpu::BindGroup,
    time_group: wgpu::BindGroup,
    /// Indexed by source: time spectrum, slot A, slot B
    butterfly_groups: [wgpu::BindGroup; 3],
    derive_group: wgpu::BindGroup,
    spectrum_ready: bool,
}

fn butterfly_group_index(source: Option<BufferKind>) -> usize {
    match source {
        Some(BufferKind::PingPong(PingPongSlot::A)) => 1,
        Some(BufferKind::PingPong(PingPongSlot::B)) => 2,
        _ => 0,
    }
}

/// Executes frames with wgpu compute kernels
pub struct GpuBackend {
    context: GpuContext,
    kernels: Kernels,
    resolution: u32,
    stage_count: u32,
    variant: PipelineVariant,
    evolve_uniform: wgpu::Buffer,
    stage_uniforms: wgpu::Buffer,
    butterfly_table: wgpu::Buffer,
    cascades: Vec<CascadeResources>,
    states: StateTracker,
}

impl GpuBackend {
    /// Allocate buffers, textures and kernels for every cascade
    pub fn new(context: GpuContext, settings: &SimulationSettings, variant: PipelineVariant) -> Result<Self> {
        settings.validate()?;
        check_field_limits(settings.resolution, variant, &context.device.limits())?;
        let kernels = Kernels::new(&context)?;
        let device = &context.device;
        let resolution = settings.resolution;
        let stage_count = settings.stage_count();

        device.push_error_scope(wgpu::ErrorFilter::OutOfMemory);
        device.push_error_scope(wgpu::ErrorFilter::Validation);

        let evolve_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Evolve Uniform"),
            size: std::mem::size_of::<EvolveConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });

        // Stage uniforms are frame-invariant, so they are written once
        let plan = stage_plan(resolution);
        let mut stage_bytes = vec![0u8; (plan.len().max(1) as u64 * STAGE_UNIFORM_STRIDE) as usize];
        for (i, params) in plan.iter().enumerate() {
            let uniform = StageUniform {
                stage: params.stage,
                direction: params.direction.tag(),
                resolution,
                ping_pong_selector: params.ping_pong_selector,
            };
            let start = i * STAGE_UNIFORM_STRIDE as usize;
            stage_bytes[start..start + std::mem::size_of::<StageUniform>()]
                .copy_from_slice(bytemuck::bytes_of(&uniform));
        }
        let stage_uniforms = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Butterfly Stage Uniforms"),
            contents: &stage_bytes,
            usage: wgpu::BufferUsages::UNIFORM,
        });

        let table = ButterflyTable::new(resolution);
        let mut entries = table.entries().to_vec();
        if entries.is_empty() {
            // Bindings cannot be empty; N = 1 never dispatches a stage
            entries.push(Zeroable::zeroed());
        }
        let butterfly_table = device.create_buffer_init(&wgpu::util::BufferInitDescriptor {
            label: Some("Butterfly Table"),
            contents: bytemuck::cast_slice(&entries),
            usage: wgpu::BufferUsages::STORAGE,
        });

        let mut backend = Self {
            kernels,
            resolution,
            stage_count,
            variant,
            evolve_uniform,
            stage_uniforms,
            butterfly_table,
            cascades: Vec::new(),
            states: StateTracker::new(settings.cascade_count as usize),
            context,
        };
        for cascade in 0..settings.cascade_count as usize {
            let resources = backend.create_cascade(cascade);
            backend.cascades.push(resources);
        }

        let device = &backend.context.device;
        let validation = pollster::block_on(device.pop_error_scope());
        let out_of_memory = pollster::block_on(device.pop_error_scope());
        if let Some(error) = validation.or(out_of_memory) {
            return Err(OceanError::ResourceCreation(error.to_string()));
        }

        info!(
            "GPU backend ready: {} cascade(s), {}x{} texels, {:?}",
            settings.cascade_count, resolution, resolution, variant
        );
        Ok(backend)
    }

    pub fn adapter_info(&self) -> &wgpu::AdapterInfo {
        &self.context.adapter_info
    }

    fn field_buffer(&self, label: &str, channels: u32) -> wgpu::Buffer {
        let cells = (self.resolution as u64).pow(2);
        self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(label),
            size: cells * channels as u64 * COMPLEX_BYTES,
            usage: wgpu::BufferUsages::STORAGE
                | wgpu::BufferUsages::COPY_DST
                | wgpu::BufferUsages::COPY_SRC,
            mapped_at_creation: false,
        })
    }

    fn output_texture(&self, label: &str) -> wgpu::Texture {
        self.context.device.create_texture(&wgpu::TextureDescriptor {
            label: Some(label),
            size: wgpu::Extent3d {
                width: self.resolution,
                height: self.resolution,
                depth_or_array_layers: 1,
            },
            mip_level_count: 1,
            sample_count: 1,
            dimension: wgpu::TextureDimension::D2,
            format: OUTPUT_FORMAT,
            usage: wgpu::TextureUsages::STORAGE_BINDING
                | wgpu::TextureUsages::TEXTURE_BINDING
                | wgpu::TextureUsages::COPY_SRC,
            view_formats: &[],
        })
    }

    fn create_cascade(&self, cascade: usize) -> CascadeResources {
        let device = &self.context.device;
        let channels = self.variant.channels();
        let label = |what: &str| format!("Cascade {cascade} {what}");

        let spectrum_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label("Spectrum Uniform")),
            size: std::mem::size_of::<SpectrumConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let derive_uniform = device.create_buffer(&wgpu::BufferDescriptor {
            label: Some(&label("Derive Uniform")),
            size: std::mem::size_of::<DerivationConstants>() as u64,
            usage: wgpu::BufferUsages::UNIFORM | wgpu::BufferUsages::COPY_DST,
            mapped_at_creation: false,
        });
        let noise = self.field_buffer(&label("Noise"), 1);
        let initial = self.field_buffer(&label("Initial Spectrum"), INITIAL_SPECTRUM_CHANNELS);
        let time = self.field_buffer(&label("Time Spectrum"), channels);
        let ping_pong = [
            self.field_buffer(&label("Ping Pong A"), channels),
            self.field_buffer(&label("Ping Pong B"), channels),
        ];
        let displacement = self.output_texture(&label("Displacement"));
        let normal = self.output_texture(&label("Normal"));

        let initial_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label("Initial Spectrum Group")),
            layout: &self.kernels.initial_layout,
            entries: &[
                buffer_entry(0, &spectrum_uniform),
                buffer_entry(1, &noise),
                buffer_entry(2, &initial),
            ],
        });
        let time_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label("Time Spectrum Group")),
            layout: &self.kernels.time_layout,
            entries: &[
                buffer_entry(0, &spectrum_uniform),
                buffer_entry(1, &self.evolve_uniform),
                buffer_entry(2, &initial),
                buffer_entry(3, &time),
            ],
        });

        let stage_binding = wgpu::BindGroupEntry {
            binding: 0,
            resource: wgpu::BindingResource::Buffer(wgpu::BufferBinding {
                buffer: &self.stage_uniforms,
                offset: 0,
                size: wgpu::BufferSize::new(std::mem::size_of::<StageUniform>() as u64),
            }),
        };
        // time -> A, A -> B, B -> A
        let sources = [
            (&time, &ping_pong[0]),
            (&ping_pong[0], &ping_pong[1]),
            (&ping_pong[1], &ping_pong[0]),
        ];
        let butterfly_groups = sources.map(|(src, dst)| {
                device.create_bind_group(&wgpu::BindGroupDescriptor {
                    label: Some(&label("Butterfly Group")),
                    layout: &self.kernels.butterfly_layout,
                    entries: &[
                        stage_binding.clone(),
                        buffer_entry(1, &self.butterfly_table),
                        buffer_entry(2, src),
                        buffer_entry(3, dst),
                    ],
                })
            });

        let spatial = match final_output(self.stage_count) {
            StageSource::TimeSpectrum => &time,
            StageSource::PingPong(slot) => &ping_pong[slot.selector() as usize],
        };
        let displacement_view = displacement.create_view(&wgpu::TextureViewDescriptor::default());
        let normal_view = normal.create_view(&wgpu::TextureViewDescriptor::default());
        let derive_group = device.create_bind_group(&wgpu::BindGroupDescriptor {
            label: Some(&label("Derive Group")),
            layout: &self.kernels.derive_layout,
            entries: &[
                buffer_entry(0, &derive_uniform),
                buffer_entry(1, spatial),
                wgpu::BindGroupEntry {
                    binding: 2,
                    resource: wgpu::BindingResource::TextureView(&displacement_view),
                },
                wgpu::BindGroupEntry {
                    binding: 3,
                    resource: wgpu::BindingResource::TextureView(&normal_view),
                },
            ],
        });

        CascadeResources {
            spectrum_uniform,
            derive_uniform,
            noise,
            initial,
            time,
            ping_pong,
            displacement,
            normal,
            initial_group,
            time_group,
            butterfly_groups,
            derive_group,
            spectrum_ready: false,
        }
    }

    fn workgroups(&self) -> u32 {
        self.resolution.div_ceil(WORKGROUP_SIZE)
    }

    /// Upload per-frame uniforms ahead of the frame's commands
    fn write_uniforms(&self, frame: &FrameRecording) -> Result<()> {
        let queue = &self.context.queue;
        if let Some(initializers) = &frame.spectrum {
            for (cascade, init) in initializers.iter().enumerate() {
                check_cascade(cascade, self.cascades.len())?;
                let resources = &self.cascades[cascade];
                queue.write_buffer(&resources.spectrum_uniform, 0, bytemuck::bytes_of(&init.constants));
                queue.write_buffer(&resources.noise, 0, bytemuck::cast_slice(&init.noise.to_interleaved()));
            }
        }

        let evolve = EvolveConstants {
            time_s: frame.time_s,
            variant: self.variant.tag(),
            _padding: [0.0; 2],
        };
        queue.write_buffer(&self.evolve_uniform, 0, bytemuck::bytes_of(&evolve));

        for (cascade, constants) in frame.derivation.iter().enumerate() {
            check_cascade(cascade, self.cascades.len())?;
            queue.write_buffer(&self.cascades[cascade].derive_uniform, 0, bytemuck::bytes_of(constants));
        }
        Ok(())
    }

    fn encode_dispatch(
        &mut self,
        pass: &mut wgpu::ComputePass<'_>,
        dispatch: &Dispatch,
        states: &StateTracker,
    ) -> Result<()> {
        check_cascade(dispatch.cascade, self.cascades.len())?;
        states.check_dispatch(dispatch)?;
        let groups = self.workgroups();
        let resources = &mut self.cascades[dispatch.cascade];

        match dispatch.kernel {
            Kernel::InitialSpectrum => {
                pass.set_pipeline(&self.kernels.initial);
                pass.set_bind_group(0, &resources.initial_group, &[]);
                pass.dispatch_workgroups(groups, groups, 1);
                resources.spectrum_ready = true;
            }
            Kernel::TimeSpectrum => {
                if !resources.spectrum_ready {
                    return Err(OceanError::invalid(
                        "initial_spectrum",
                        "time spectrum dispatched before the initial spectrum was built",
                    ));
                }
                pass.set_pipeline(&self.kernels.time);
                pass.set_bind_group(0, &resources.time_group, &[]);
                pass.dispatch_workgroups(groups, groups, 1);
            }
            Kernel::Butterfly(params) => {
                let index = global_stage_index(params.stage, params.direction, self.stage_count);
                let offset = (index as u64 * STAGE_UNIFORM_STRIDE) as u32;
                let group = butterfly_group_index(dispatch.reads.first().map(|id| id.kind));
                pass.set_pipeline(&self.kernels.butterfly);
                pass.set_bind_group(0, &resources.butterfly_groups[group], &[offset]);
                pass.dispatch_workgroups(groups, groups, self.variant.channels());
            }
            Kernel::Derive => {
                pass.set_pipeline(&self.kernels.derive);
                pass.set_bind_group(0, &resources.derive_group, &[]);
                pass.dispatch_workgroups(groups, groups, 1);
            }
        }
        Ok(())
    }

    /// Block until a mapped staging buffer is readable
    fn map_staging(&self, staging: &wgpu::Buffer) -> Result<()> {
        let (sender, receiver) = mpsc::channel();
        staging
            .slice(..)
            .map_async(wgpu::MapMode::Read, move |result| {
                let _ = sender.send(result);
            });
        self.context.device.poll(wgpu::Maintain::Wait);
        receiver.recv().map_err(|_| OceanError::ChannelClosed)??;
        Ok(())
    }

    fn read_texture(&self, texture: &wgpu::Texture) -> Result<OutputField> {
        let n = self.resolution;
        let unpadded_bytes_per_row = n * TEXEL_BYTES;
        let align = wgpu::COPY_BYTES_PER_ROW_ALIGNMENT;
        let padded_bytes_per_row = unpadded_bytes_per_row.div_ceil(align) * align;

        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Map Readback Buffer"),
            size: (padded_bytes_per_row * n) as u64,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });

        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Map Readback Encoder"),
            });
        encoder.copy_texture_to_buffer(
            wgpu::ImageCopyTexture {
                texture,
                mip_level: 0,
                origin: wgpu::Origin3d::ZERO,
                aspect: wgpu::TextureAspect::All,
            },
            wgpu::ImageCopyBuffer {
                buffer: &staging,
                layout: wgpu::ImageDataLayout {
                    offset: 0,
                    bytes_per_row: Some(padded_bytes_per_row),
                    rows_per_image: Some(n),
                },
            },
            wgpu::Extent3d {
                width: n,
                height: n,
                depth_or_array_layers: 1,
            },
        );
        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.map_staging(&staging)?;

        let data = staging.slice(..).get_mapped_range();
        let mut texels = Vec::with_capacity((n * n) as usize);
        // Remove padding
        for row in 0..n {
            let start = (row * padded_bytes_per_row) as usize;
            let bytes = &data[start..start + unpadded_bytes_per_row as usize];
            texels.extend(
                bytes
                    .chunks_exact(TEXEL_BYTES as usize)
                    .map(|texel| Vec4::from_array(bytemuck::pod_read_unaligned(texel))),
            );
        }
        drop(data);
        staging.unmap();

        Ok(OutputField::from_texels(n, texels))
    }

    /// Copy of a frequency-domain or FFT scratch buffer
    pub fn read_field(&self, cascade: usize, kind: BufferKind) -> Result<FrequencyField> {
        check_cascade(cascade, self.cascades.len())?;
        let resources = &self.cascades[cascade];
        let (buffer, channels) = match kind {
            BufferKind::InitialSpectrum => (&resources.initial, INITIAL_SPECTRUM_CHANNELS),
            BufferKind::TimeSpectrum => (&resources.time, self.variant.channels()),
            BufferKind::PingPong(slot) => (&resources.ping_pong[slot.selector() as usize], self.variant.channels()),
            BufferKind::Displacement | BufferKind::Normal => {
                return Err(OceanError::invalid(
                    "kind",
                    "output maps are not frequency fields; use read_maps",
                ))
            }
        };

        let size = buffer.size();
        let staging = self.context.device.create_buffer(&wgpu::BufferDescriptor {
            label: Some("Field Readback Buffer"),
            size,
            usage: wgpu::BufferUsages::COPY_DST | wgpu::BufferUsages::MAP_READ,
            mapped_at_creation: false,
        });
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Field Readback Encoder"),
            });
        encoder.copy_buffer_to_buffer(buffer, 0, &staging, 0, size);
        self.context.queue.submit(std::iter::once(encoder.finish()));
        self.map_staging(&staging)?;

        let data = staging.slice(..).get_mapped_range();
        let values: Vec<[f32; 2]> = data
            .chunks_exact(COMPLEX_BYTES as usize)
            .map(bytemuck::pod_read_unaligned)
            .collect();
        drop(data);
        staging.unmap();

        Ok(FrequencyField::from_interleaved(self.resolution, channels, &values))
    }
}

impl GpuBackend {
    /// Encode one frame's commands, applying its transitions to `states`
    fn encode_frame(&mut self, frame: &FrameRecording, states: &mut StateTracker) -> Result<wgpu::CommandBuffer> {
        let mut encoder = self
            .context
            .device
            .create_command_encoder(&wgpu::CommandEncoderDescriptor {
                label: Some("Ocean Frame Encoder"),
            });
        {
            let mut pass = encoder.begin_compute_pass(&wgpu::ComputePassDescriptor {
                label: Some("Ocean Compute Pass"),
                timestamp_writes: None,
            });
            for command in frame.stream.commands() {
                match command {
                    Command::Transition(transition) => {
                        states.apply(transition)?;
                        // wgpu inserts the real barrier between dispatches
                        pass.insert_debug_marker(&format!(
                            "{:?}: {:?} -> {:?}",
                            transition.resource, transition.from, transition.to
                        ));
                    }
                    Command::Dispatch(dispatch) => {
                        trace!("gpu: cascade {} {}", dispatch.cascade, dispatch.kernel.label());
                        self.encode_dispatch(&mut pass, dispatch, states)?;
                    }
                }
            }
        }
        Ok(encoder.finish())
    }
}

impl ComputeBackend for GpuBackend {
    fn submit(&mut self, frame: &FrameRecording) -> Result<()> {
        self.write_uniforms(frame)?;

        // Nothing reaches the queue unless the whole frame encodes
        let ready: Vec<bool> = self.cascades.iter().map(|c| c.spectrum_ready).collect();
        let mut states = self.states.clone();
        match self.encode_frame(frame, &mut states) {
            Ok(commands) => {
                self.context.queue.submit(std::iter::once(commands));
                self.states = states;
                debug!("Submitted frame {} ({} commands)", frame.stream.frame, frame.stream.len());
                Ok(())
            }
            Err(e) => {
                for (resources, was_ready) in self.cascades.iter_mut().zip(ready) {
                    resources.spectrum_ready = was_ready;
                }
                Err(e)
            }
        }
    }

    fn read_maps(&mut self, cascade: usize) -> Result<OceanMaps> {
        check_cascade(cascade, self.cascades.len())?;
        for kind in [BufferKind::Displacement, BufferKind::Normal] {
            self.states
                .expect(ResourceId::new(cascade, kind), ResourceState::Readable)?;
        }
        let resources = &self.cascades[cascade];
        Ok(OceanMaps {
            displacement: self.read_texture(&resources.displacement)?,
            normal: self.read_texture(&resources.normal)?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_uniform_layouts_match_wgsl() {
        assert_eq!(std::mem::size_of::<SpectrumConstants>(), 48);
        assert_eq!(std::mem::size_of::<DerivationConstants>(), 32);
        assert_eq!(std::mem::size_of::<EvolveConstants>(), 16);
        assert_eq!(std::mem::size_of::<StageUniform>(), 16);
        assert_eq!(
            std::mem::size_of::<crate::ocean::fft::ButterflyEntry>(),
            16
        );
    }

    #[test]
    fn test_oversized_fields_rejected_before_allocation() {
        let limits = wgpu::Limits::default();
        assert!(check_field_limits(2048, PipelineVariant::Choppy, &limits).is_ok());
        // 4096² cells × 2 channels × 8 bytes
        assert!(matches!(
            check_field_limits(4096, PipelineVariant::Choppy, &limits),
            Err(OceanError::BufferTooLarge { size: 268_435_456, .. })
        ));
        assert!(matches!(
            check_field_limits(4096, PipelineVariant::HeightOnly, &limits),
            Err(OceanError::BufferTooLarge { .. })
        ));
    }

    #[test]
    fn test_butterfly_group_follows_source() {
        assert_eq!(butterfly_group_index(Some(BufferKind::TimeSpectrum)), 0);
        assert_eq!(
            butterfly_group_index(Some(BufferKind::PingPong(PingPongSlot::A))),
            1
        );
        assert_eq!(
            butterfly_group_index(Some(BufferKind::PingPong(PingPongSlot::B))),
            2
        );
    }
}
