//! Benchmarks for the per-tick hot paths: peak search and calibration evaluation.
//!
//! Run:
//! - cargo bench

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use whistle_breaker::audio::{find_peak, ByteSpectrumAnalyser, SpectrumSnapshot};
use whistle_breaker::calibration::{CalibrationState, CalibrationStep};

const SAMPLE_RATE: f32 = 48_000.0;
const TRANSFORM_SIZES: [usize; 3] = [512, 2048, 8192];
/// Ten seconds of sampling at 60 ticks per second.
const SAMPLES_PER_STEP: usize = 600;

fn noisy_spectrum(bins: usize) -> SpectrumSnapshot {
    let magnitudes = (0..bins)
        .map(|i| ((i * 37 + 11) % 97) as u8 + if i == bins / 3 { 150 } else { 0 })
        .collect();
    SpectrumSnapshot::new(magnitudes, SAMPLE_RATE / (bins * 2) as f32)
}

fn filled_state(len: usize) -> CalibrationState {
    let mut state = CalibrationState::new();
    for i in 0..len {
        let wobble = ((i * 7919) % 1000) as f32;
        state.record(CalibrationStep::VoiceAmplitude, 120.0 + wobble / 20.0);
        state.record(CalibrationStep::NoiseAmplitude, 15.0 + wobble / 100.0);
        state.record(CalibrationStep::FrequencyRange, 400.0 + wobble * 1.5);
    }
    state
}

fn bench_find_peak(c: &mut Criterion) {
    let mut group = c.benchmark_group("find_peak");
    for &size in &TRANSFORM_SIZES {
        let spectrum = noisy_spectrum(size / 2);
        group.bench_with_input(BenchmarkId::new("unbounded", size), &spectrum, |b, spectrum| {
            b.iter(|| find_peak(black_box(spectrum), None, None))
        });
        group.bench_with_input(BenchmarkId::new("band", size), &spectrum, |b, spectrum| {
            b.iter(|| find_peak(black_box(spectrum), Some(500.0), Some(2500.0)))
        });
    }
    group.finish();
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("evaluate");
    for &len in &[SAMPLES_PER_STEP / 10, SAMPLES_PER_STEP] {
        let state = filled_state(len);
        group.bench_with_input(BenchmarkId::from_parameter(len), &state, |b, state| {
            b.iter(|| black_box(state).evaluate())
        });
    }
    group.finish();
}

fn bench_analyser(c: &mut Criterion) {
    let mut group = c.benchmark_group("analyse");
    for &size in &TRANSFORM_SIZES {
        let step = 2.0 * std::f32::consts::PI * 1200.0 / SAMPLE_RATE;
        let block: Vec<f32> = (0..size).map(|i| 0.1 * (step * i as f32).sin()).collect();
        let mut analyser = ByteSpectrumAnalyser::new(size);
        group.bench_function(BenchmarkId::from_parameter(size), |b| {
            b.iter(|| analyser.analyse(black_box(&block)))
        });
    }
    group.finish();
}

criterion_group!(benches, bench_find_peak, bench_evaluate, bench_analyser);
criterion_main!(benches);
