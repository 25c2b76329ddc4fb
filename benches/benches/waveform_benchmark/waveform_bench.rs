//! Пропускная способность генераторов: сколько выборок в секунду они
//! выдают по сравнению с частотой дискретизации радио.
//!
//! Запуск: cargo bench -p wavgen-benchmark

use std::hint::black_box;

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use wavgen_core::{SymbolSource, SymbolStream, SymbolStreamConfig, WidebandSynth};
use wavgen_types::{Modulation, NoiseScheme, SymbolScheme, IQ_ZERO};

fn bench_wideband(c: &mut Criterion) {
    let mut group = c.benchmark_group("wideband_generate");

    for workers in [1usize, 4, 16] {
        let mut synth = WidebandSynth::new(2_400, 0, workers, Some(1)).unwrap();
        let mut buf = vec![IQ_ZERO; synth.buf_len()];

        group.throughput(Throughput::Elements(buf.len() as u64));
        group.bench_with_input(BenchmarkId::new("workers", workers), &workers, |b, _| {
            b.iter(|| synth.generate(black_box(&mut buf)))
        });
    }

    group.finish();
}

fn bench_symbol_stream(c: &mut Criterion) {
    let mut group = c.benchmark_group("symbol_stream");
    let block = 800;

    for (name, scheme) in [
        ("qpsk", SymbolScheme::Linear(Modulation::Qpsk)),
        ("qam64", SymbolScheme::Linear(Modulation::Qam64)),
        ("noise", SymbolScheme::Noise(NoiseScheme::Awgn)),
    ] {
        let mut stream = SymbolStream::new(SymbolStreamConfig {
            bandwidth: 0.7,
            scheme,
            seed: Some(7),
            ..Default::default()
        })
        .unwrap();
        let mut buf = vec![IQ_ZERO; block];

        group.throughput(Throughput::Elements(block as u64));
        group.bench_function(name, |b| {
            b.iter(|| stream.write_samples(black_box(&mut buf)))
        });
    }

    group.finish();
}

criterion_group!(benches, bench_wideband, bench_symbol_stream);
criterion_main!(benches);
