//! End-to-end properties of the ocean pipeline, run on the CPU executor and,
//! when an adapter is available, cross-checked against the GPU executor.

use glam::Vec2;
use rustfft::FftPlanner;

use tidewright::gpu::{GpuBackend, GpuContext};
use tidewright::ocean::command::Command;
use tidewright::ocean::evolve::{self, dispersion, evolve_cell};
use tidewright::ocean::fft::{stage_plan, FftDirection, FftStageParams, StageSource};
use tidewright::ocean::spectrum::wave_vector;
use tidewright::ocean::{
    uv_for_world, BufferKind, CommandStream, Complex32, ComputeBackend, CpuBackend, FftExecutor, FrameRecording,
    FrequencyField, OceanMaps, OceanPipeline, OceanSystem, PipelineVariant, SpectrumEvolver, SpectrumInitializer,
};
use tidewright::params::{SimulationSettings, SpectrumParams};
use tidewright::OceanError;

fn settings(resolution: u32) -> SimulationSettings {
    SimulationSettings {
        resolution,
        ocean_size_m: 250.0,
        ..Default::default()
    }
}

fn cpu_ocean(settings: SimulationSettings, spectrum: SpectrumParams) -> OceanSystem<CpuBackend> {
    OceanSystem::with_backend(settings, spectrum, None, CpuBackend::new).unwrap()
}

/// Unnormalised 2D DFT of a row-major grid using rustfft (rows, then columns)
fn dft_2d(mut data: Vec<Complex32>, n: usize, direction: rustfft::FftDirection) -> Vec<Complex32> {
    let fft = FftPlanner::<f32>::new().plan_fft(n, direction);
    for row in data.chunks_exact_mut(n) {
        fft.process(row);
    }
    for col in 0..n {
        let mut column: Vec<Complex32> = (0..n).map(|row| data[row * n + col]).collect();
        fft.process(&mut column);
        for (row, value) in column.into_iter().enumerate() {
            data[row * n + col] = value;
        }
    }
    data
}

fn forward_2d(field: &FrequencyField) -> Vec<Complex32> {
    let n = field.resolution() as usize;
    dft_2d(field.channel(0).to_vec(), n, rustfft::FftDirection::Forward)
}

/// Height-only and choppy spectra of the same ocean at time `t`
fn evolved_pair(settings: &SimulationSettings, params: &SpectrumParams, t: f32) -> (FrequencyField, FrequencyField) {
    let init = SpectrumInitializer::new(settings, params, 0);
    let initial = init.build();
    let n = settings.resolution;
    let mut height = FrequencyField::new(n, 1);
    let mut choppy = FrequencyField::new(n, 3);
    SpectrumEvolver::new(PipelineVariant::HeightOnly).evolve_into(&initial, &init.constants, t, &mut height);
    SpectrumEvolver::new(PipelineVariant::Choppy).evolve_into(&initial, &init.constants, t, &mut choppy);
    (height, choppy)
}

fn peak(values: impl Iterator<Item = f32>) -> f32 {
    values.map(f32::abs).fold(0.0, f32::max)
}

#[test]
fn test_stage_counts_and_vertical_handoff() {
    for shift in 2..=9 {
        let plan = stage_plan(1 << shift);
        let (horizontal, vertical): (Vec<&FftStageParams>, Vec<&FftStageParams>) = plan
            .iter()
            .partition(|p| p.direction == FftDirection::Horizontal);
        assert_eq!(horizontal.len(), shift);
        assert_eq!(vertical.len(), shift);
        assert_eq!(
            vertical[0].io().read,
            StageSource::PingPong(horizontal.last().unwrap().io().write)
        );
    }
}

#[test]
fn test_same_spectrum_twice_gives_same_h0() {
    let settings = settings(32);
    let params = SpectrumParams::default();
    let first = SpectrumInitializer::new(&settings, &params, 0).build();

    let mut again = FrequencyField::new(32, 2);
    let init = SpectrumInitializer::new(&settings, &params.clone(), 0);
    init.build_into(&mut again);
    init.build_into(&mut again);
    assert_eq!(first, again);
}

#[test]
fn test_time_zero_is_h0_plus_conjugate_term() {
    let settings = settings(16);
    let init = SpectrumInitializer::new(&settings, &SpectrumParams::default(), 0);
    let initial = init.build();
    let mut evolved = FrequencyField::new(16, 1);
    SpectrumEvolver::new(PipelineVariant::HeightOnly).evolve_into(&initial, &init.constants, 0.0, &mut evolved);

    for row in 0..16 {
        for col in 0..16 {
            let expected = initial.get(0, row, col) + initial.get(1, row, col);
            assert_eq!(evolved.get(0, row, col), expected);
        }
    }
}

#[test]
fn test_forward_dft_of_spatial_output_recovers_spectrum() {
    let n = 8;
    let settings = SimulationSettings {
        resolution: n,
        ocean_size_m: 40.0,
        ..Default::default()
    };
    let init = SpectrumInitializer::new(&settings, &SpectrumParams::default(), 0);
    let mut spectrum = FrequencyField::new(n, 1);
    SpectrumEvolver::new(PipelineVariant::HeightOnly).evolve_into(&init.build(), &init.constants, 1.25, &mut spectrum);

    let spatial = FftExecutor::new(n).inverse_2d(&spectrum);
    let recovered = forward_2d(&spatial);
    let scale = 1.0 / (n * n) as f32;

    let mut err = 0.0f64;
    let mut norm = 0.0f64;
    for (got, want) in recovered.iter().zip(spectrum.channel(0)) {
        err += (*got * scale - *want).norm_sqr() as f64;
        norm += want.norm_sqr() as f64;
    }
    assert!(norm > 0.0);
    assert!((err / norm).sqrt() < 1e-3, "relative error {}", (err / norm).sqrt());
}

#[test]
fn test_evolution_preserves_h0_energy() {
    let settings = settings(32);
    let init = SpectrumInitializer::new(&settings, &SpectrumParams::default(), 0);
    let initial = init.build();
    let energy = initial.energy();
    let evolver = SpectrumEvolver::new(PipelineVariant::Choppy);
    let mut out = FrequencyField::new(32, 3);

    for t in [0.0, 0.5, 3.7, 120.0] {
        evolver.evolve_into(&initial, &init.constants, t, &mut out);
        assert_eq!(initial.energy(), energy);

        // Each term only rotates: |h0 e^{iwt}| = |h0|
        for (row, col) in [(1, 2), (5, 0), (17, 30)] {
            let h0 = initial.get(0, row, col);
            let k = wave_vector(row, col, 32, init.constants.patch_length).length();
            let omega = dispersion(k, init.constants.gravity);
            let rotated = evolve_cell(h0, Complex32::new(0.0, 0.0), omega, t);
            assert!((rotated.norm() - h0.norm()).abs() <= 1e-5 * h0.norm().max(1e-6));
        }
    }
}

#[test]
fn test_height_field_tiles_seamlessly() {
    let n = 16u32;
    let settings = SimulationSettings {
        tile_scale: 1.5,
        ..settings(n)
    };
    let mut ocean = OceanSystem::with_backend(
        settings.clone(),
        SpectrumParams::default(),
        Some(PipelineVariant::HeightOnly),
        CpuBackend::new,
    )
    .unwrap();
    ocean.render_at(2.0).unwrap();
    let maps = ocean.maps(0).unwrap();
    let spectrum = ocean.backend().field(0, BufferKind::TimeSpectrum).unwrap().clone();

    // Inverse sum with the physical wave vectors, evaluated at any point of the plane
    let length = settings.ocean_size_m;
    let dx = length as f64 / n as f64;
    let height = |x: f64, z: f64| -> (f64, f64) {
        let (mut re, mut im) = (0.0f64, 0.0f64);
        for row in 0..n {
            for col in 0..n {
                let k = wave_vector(row, col, n, length);
                let phase = k.x as f64 * x + k.y as f64 * z;
                let h = spectrum.get(0, row, col);
                re += h.re as f64 * phase.cos() - h.im as f64 * phase.sin();
                im += h.re as f64 * phase.sin() + h.im as f64 * phase.cos();
            }
        }
        let scale = 1.0 / (n * n) as f64;
        (re * scale, im * scale)
    };

    let scale = settings.tile_scale;
    let tallest = peak(maps.displacement.texels().iter().map(|t| t.y)) / scale;
    assert!(tallest > 0.0);
    let tolerance = 1e-3 * tallest as f64;

    for row in 0..n {
        let z = row as f64 * dx;
        let (start, start_im) = height(0.0, z);
        let (wrapped, _) = height(length as f64, z);
        let (last, _) = height(length as f64 - dx, z);
        assert!(start_im.abs() < tolerance, "row {row}: imaginary part {start_im}");
        assert!((wrapped - start).abs() < tolerance, "row {row}: {wrapped} vs {start}");

        // Column 0 and column N-1 of the map sit on either side of the seam
        let first_texel = (maps.displacement.get(0, row as i64).y / scale) as f64;
        let last_texel = (maps.displacement.get(n as i64 - 1, row as i64).y / scale) as f64;
        assert!((first_texel - start).abs() < tolerance, "row {row}: {first_texel} vs {start}");
        assert!((last_texel - last).abs() < tolerance, "row {row}: {last_texel} vs {last}");
    }

    // A world position and its neighbour one tile over read the same surface
    let extent = length * scale;
    for offset in [0.3f32, 17.0, 120.5] {
        for (x, z) in [(offset, 40.0), (-offset, 40.0), (40.0, offset), (40.0, -offset)] {
            let here = maps.displacement.sample(uv_for_world(x, z, &settings, 0));
            let east = maps.displacement.sample(uv_for_world(x + extent, z, &settings, 0));
            let south = maps.displacement.sample(uv_for_world(x, z + extent, &settings, 0));
            assert!((here - east).abs().max_element() < 1e-3 * tallest * scale);
            assert!((here - south).abs().max_element() < 1e-3 * tallest * scale);
        }
    }
}

#[test]
fn test_choppy_height_matches_height_only() {
    for (resolution, ocean_size_m) in [(64, 250.0), (16, 250.0), (64, 40.0)] {
        let settings = SimulationSettings {
            resolution,
            ocean_size_m,
            ..Default::default()
        };
        let run = |variant| {
            let mut ocean = OceanSystem::with_backend(
                settings.clone(),
                SpectrumParams::default(),
                Some(variant),
                CpuBackend::new,
            )
            .unwrap();
            ocean.render_at(5.0).unwrap();
            ocean.maps(0).unwrap()
        };
        let height_only = run(PipelineVariant::HeightOnly);
        let choppy = run(PipelineVariant::Choppy);

        let tallest = peak(height_only.displacement.texels().iter().map(|t| t.y));
        assert!(tallest > 0.0);
        for (a, b) in height_only
            .displacement
            .texels()
            .iter()
            .zip(choppy.displacement.texels())
        {
            assert!(
                (a.y - b.y).abs() <= 1e-4 * tallest,
                "N={resolution} L={ocean_size_m}: {} vs {}",
                a.y,
                b.y
            );
        }
    }
}

#[test]
fn test_choppy_slopes_match_height_gradient() {
    let n = 64u32;
    let settings = SimulationSettings {
        resolution: n,
        ocean_size_m: 200.0,
        ..Default::default()
    };
    // Strong short-wave damping keeps the surface smooth enough for central differences
    let params = SpectrumParams {
        suppression: 0.25,
        ..Default::default()
    };
    let (_, choppy) = evolved_pair(&settings, &params, 4.0);
    let spatial = FftExecutor::new(n).inverse_2d(&choppy);
    let norm = 1.0 / (n * n) as f32;
    let dx = settings.ocean_size_m / n as f32;

    let height = |row: u32, col: u32| spatial.get(evolve::channel::HEIGHT_SLOPE_X, row % n, col % n).re * norm;
    let slope_x = |row: u32, col: u32| spatial.get(evolve::channel::HEIGHT_SLOPE_X, row, col).im * norm;
    let slope_z = |row: u32, col: u32| spatial.get(evolve::channel::SLOPE_Z_OFFSET_X, row, col).re * norm;

    let steepest = (0..n)
        .flat_map(|row| (0..n).map(move |col| (row, col)))
        .map(|(row, col)| slope_x(row, col).abs().max(slope_z(row, col).abs()))
        .fold(0.0f32, f32::max);
    assert!(steepest > 0.0);

    for row in 0..n {
        for col in 0..n {
            let dh_dx = (height(row, col + 1) - height(row, col + n - 1)) / (2.0 * dx);
            let dh_dz = (height(row + 1, col) - height(row + n - 1, col)) / (2.0 * dx);
            assert!(
                (slope_x(row, col) - dh_dx).abs() < 0.03 * steepest,
                "({row}, {col}) x: {} vs {dh_dx}",
                slope_x(row, col)
            );
            assert!(
                (slope_z(row, col) - dh_dz).abs() < 0.03 * steepest,
                "({row}, {col}) z: {} vs {dh_dz}",
                slope_z(row, col)
            );
        }
    }
}

#[test]
fn test_choppy_offsets_match_direct_transform() {
    let n = 32u32;
    let settings = settings(n);
    let (height, choppy) = evolved_pair(&settings, &SpectrumParams::default(), 5.0);
    let spatial = FftExecutor::new(n).inverse_2d(&choppy);

    // -i·k̂·h built straight from the height spectrum
    let offsets = |axis: fn(glam::Vec2) -> f32| -> Vec<Complex32> {
        let mut data = vec![Complex32::new(0.0, 0.0); (n * n) as usize];
        for row in 0..n {
            for col in 0..n {
                let k = wave_vector(row, col, n, settings.ocean_size_m);
                if k.length() < 1e-6 || row == n / 2 || col == n / 2 {
                    continue;
                }
                let h = height.get(0, row, col);
                data[(row * n + col) as usize] = Complex32::new(0.0, -1.0) * h * (axis(k) / k.length());
            }
        }
        dft_2d(data, n as usize, rustfft::FftDirection::Inverse)
    };
    let reference_x = offsets(|k| k.x);
    let reference_z = offsets(|k| k.y);

    let norm = 1.0 / (n * n) as f32;
    let widest = peak(reference_x.iter().chain(&reference_z).map(|c| c.re * norm));
    assert!(widest > 0.0);
    let tolerance = 1e-3 * widest;

    for row in 0..n {
        for col in 0..n {
            let idx = (row * n + col) as usize;
            let (want_x, want_z) = (reference_x[idx] * norm, reference_z[idx] * norm);
            assert!(want_x.im.abs() < tolerance && want_z.im.abs() < tolerance);

            let got_x = spatial.get(evolve::channel::SLOPE_Z_OFFSET_X, row, col).im * norm;
            let got_z = spatial.get(evolve::channel::OFFSET_Z, row, col).re * norm;
            assert!((got_x - want_x.re).abs() < tolerance, "({row}, {col}) x: {got_x} vs {}", want_x.re);
            assert!((got_z - want_z.re).abs() < tolerance, "({row}, {col}) z: {got_z} vs {}", want_z.re);
        }
    }
}

#[test]
fn test_snapshot_is_deterministic() {
    let run = || -> OceanMaps {
        let spectrum = SpectrumParams {
            wind_speed_m_per_s: 30.0,
            wind_direction: Vec2::new(1.0, 0.0),
            amplitude: 0.02,
            ..Default::default()
        };
        let mut ocean = cpu_ocean(settings(64), spectrum);
        ocean.render_at(5.0).unwrap();
        ocean.maps(0).unwrap()
    };
    let first = run();
    let second = run();
    assert_eq!(first, second);
    assert!(first.displacement.texels().iter().any(|t| t.y != 0.0));
}

/// Copy of `frame` without the transitions of the time spectrum
fn drop_time_spectrum_publish(frame: &FrameRecording) -> FrameRecording {
    let mut stream = CommandStream::new(frame.stream.frame);
    for command in frame.stream.commands() {
        match command {
            Command::Transition(t) if t.resource.kind == BufferKind::TimeSpectrum => {}
            Command::Transition(t) => stream.push_transition(*t),
            Command::Dispatch(d) => stream.push_dispatch(d.clone()),
        }
    }
    FrameRecording {
        stream,
        ..frame.clone()
    }
}

#[test]
fn test_misordered_stream_is_a_hazard() {
    let settings = settings(8);
    let mut pipeline = OceanPipeline::new(settings.clone(), SpectrumParams::default(), None).unwrap();
    let mut backend = CpuBackend::new(&settings, pipeline.variant()).unwrap();
    let frame = pipeline.record_frame().unwrap();

    // The first butterfly now reads a Writable buffer
    let broken = drop_time_spectrum_publish(&frame);
    assert!(matches!(backend.submit(&broken), Err(OceanError::Hazard { .. })));
}

#[test]
fn test_gpu_rejected_frame_can_be_resubmitted() {
    let context = match GpuContext::new_blocking() {
        Ok(context) => context,
        Err(e) => {
            eprintln!("Skipping GPU resubmit: {e}");
            return;
        }
    };
    let settings = settings(16);
    let mut pipeline = OceanPipeline::new(settings.clone(), SpectrumParams::default(), None).unwrap();
    let mut backend = GpuBackend::new(context, &settings, pipeline.variant()).unwrap();
    let frame = pipeline.record_frame().unwrap();

    let broken = drop_time_spectrum_publish(&frame);
    assert!(matches!(backend.submit(&broken), Err(OceanError::Hazard { .. })));
    backend.submit(&frame).unwrap();
    let maps = backend.read_maps(0).unwrap();
    assert!(maps.displacement.texels().iter().any(|t| t.y != 0.0));
}

#[test]
fn test_cascades_split_the_spectrum() {
    let settings = SimulationSettings {
        resolution: 32,
        ocean_size_m: 1000.0,
        cascade_count: 3,
        ..Default::default()
    };
    let params = SpectrumParams::default();
    for cascade in 0..3 {
        let constants = SpectrumInitializer::new(&settings, &params, cascade).constants;
        let h0 = SpectrumInitializer::new(&settings, &params, cascade).build();
        for row in 0..32 {
            for col in 0..32 {
                let k = wave_vector(row, col, 32, constants.patch_length).length();
                if k < constants.band_low || k >= constants.band_high {
                    assert_eq!(h0.get(0, row, col), Complex32::new(0.0, 0.0));
                }
            }
        }
    }
}

fn max_abs_diff(a: &OceanMaps, b: &OceanMaps) -> (f32, f32) {
    let diff = |x: &[glam::Vec4], y: &[glam::Vec4]| {
        x.iter()
            .zip(y)
            .map(|(p, q)| (*p - *q).abs().max_element())
            .fold(0.0f32, f32::max)
    };
    let scale = a
        .displacement
        .texels()
        .iter()
        .map(|t| t.abs().max_element())
        .fold(0.0f32, f32::max);
    (
        diff(a.displacement.texels(), b.displacement.texels()) / scale.max(1e-6),
        diff(a.normal.texels(), b.normal.texels()),
    )
}

#[test]
fn test_gpu_matches_cpu() {
    if let Err(e) = GpuContext::new_blocking() {
        eprintln!("Skipping GPU comparison: {e}");
        return;
    }

    let settings = SimulationSettings {
        resolution: 32,
        ocean_size_m: 200.0,
        cascade_count: 2,
        ..Default::default()
    };
    let spectrum = SpectrumParams::default();

    for variant in [PipelineVariant::HeightOnly, PipelineVariant::Choppy] {
        let mut cpu =
            OceanSystem::with_backend(settings.clone(), spectrum.clone(), Some(variant), CpuBackend::new)
                .unwrap();
        let mut gpu = OceanSystem::with_backend(settings.clone(), spectrum.clone(), Some(variant), |s, v| {
            GpuBackend::new(GpuContext::new_blocking()?, s, v)
        })
        .unwrap();

        for dt in [0.0, 0.5, 0.5] {
            cpu.update(dt).unwrap();
            gpu.update(dt).unwrap();
        }
        for cascade in 0..2 {
            let (displacement_err, normal_err) =
                max_abs_diff(&cpu.maps(cascade).unwrap(), &gpu.maps(cascade).unwrap());
            assert!(displacement_err < 1e-2, "{variant:?} cascade {cascade}: {displacement_err}");
            assert!(normal_err < 1e-2, "{variant:?} cascade {cascade}: {normal_err}");
        }
    }
}
