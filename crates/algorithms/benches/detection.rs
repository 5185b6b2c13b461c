//! Benchmarks for detector sweeps over index rasters

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use geowatch_algorithms::detection::{ConstructionCusumDetector, CusumDetector, EwmaDetector};
use geowatch_core::{Raster, RowWindows};

fn create_index(size: usize, base: f64) -> Raster<f64> {
    let mut r = Raster::new(size, size);
    for row in 0..size {
        for col in 0..size {
            let v = base + ((row * 7 + col * 13) % 100) as f64 * 0.002;
            r.set(row, col, v).unwrap();
        }
    }
    r
}

fn bench_cusum_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection/cusum_sweep");
    let detector = CusumDetector::default();
    for size in [256, 512, 1024, 2048] {
        let values = create_index(size, 0.2);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| detector.process_spatial_data(black_box(&values), 0.3, 0.05, None).unwrap())
        });
    }
    group.finish();
}

fn bench_ewma_sweep(c: &mut Criterion) {
    let mut group = c.benchmark_group("detection/ewma_sweep");
    let detector = EwmaDetector::default();
    for size in [256, 512, 1024, 2048] {
        let values = create_index(size, 0.5);
        group.bench_with_input(BenchmarkId::from_parameter(size), &size, |b, _| {
            b.iter(|| detector.process_spatial_data(black_box(&values), 0.6, 0.05, None).unwrap())
        });
    }
    group.finish();
}

fn bench_construction_windows(c: &mut Criterion) {
    let size = 1024;
    let bsi = create_index(size, -0.3);
    let ndvi = create_index(size, 0.4);
    let detector = ConstructionCusumDetector::new();
    c.bench_function("detection/construction_windows/1024", |b| {
        b.iter(|| {
            RowWindows::new(size, 128)
                .map(|w| {
                    detector
                        .analyze_construction_window(&bsi, &ndvi, -0.35, 0.05, 0.6, None, w)
                        .unwrap()
                        .0
                        .changed_count()
                })
                .sum::<usize>()
        })
    });
}

criterion_group!(benches, bench_cusum_sweep, bench_ewma_sweep, bench_construction_windows);
criterion_main!(benches);
