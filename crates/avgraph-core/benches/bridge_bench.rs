//! Criterion benchmarks for the avgraph Frame Bridge and clock tracker
//!
//! Run with: cargo bench -p avgraph-core
#![allow(missing_docs)]

use criterion::{BenchmarkId, Criterion, black_box, criterion_group, criterion_main};
use avgraph_core::bridge::{from_native, to_native};
use avgraph_core::formats::{pixel_format_to_flow, pixel_planes};
use avgraph_core::{ClockTracker, MediaDescriptor};
use avgraph_engine::{NativeFrame, PixelFormat, VideoProps};
use avgraph_media::{BufferAllocator, FlowDef, Rational};

const SIZES: &[(u32, u32)] = &[(320, 240), (1280, 720), (1920, 1080)];

fn descriptor(width: u32, height: u32) -> MediaDescriptor {
    let mut flow = FlowDef::picture();
    pixel_format_to_flow(PixelFormat::Yuv420p, &mut flow).unwrap();
    flow.set_hsize(u64::from(width));
    flow.set_vsize(u64::from(height));
    flow.set_fps(Rational::new(25, 1));
    MediaDescriptor::from_flow_def(&flow).unwrap()
}

fn bench_round_trip(c: &mut Criterion) {
    let mut group = c.benchmark_group("Bridge");
    let alloc = BufferAllocator::new();
    let planes = pixel_planes(PixelFormat::Yuv420p).unwrap();

    for &(width, height) in SIZES {
        let desc = descriptor(width, height);
        let label = format!("{width}x{height}");

        group.bench_with_input(BenchmarkId::new("round_trip", &label), &desc, |b, desc| {
            let source = alloc
                .picture(width as usize, height as usize, &planes)
                .build();
            b.iter(|| {
                let frame = to_native(source.share(), desc).unwrap();
                black_box(from_native(frame, &alloc).unwrap());
            });
        });

        group.bench_with_input(BenchmarkId::new("wrap_native", &label), &(), |b, ()| {
            let frame = NativeFrame::alloc_video(VideoProps::new(PixelFormat::Yuv420p, width, height));
            b.iter(|| black_box(from_native(frame.clone(), &alloc).unwrap()));
        });
    }

    group.finish();
}

fn bench_clock(c: &mut Criterion) {
    c.bench_function("ClockTracker/stamp_1000", |b| {
        b.iter(|| {
            let mut tracker = ClockTracker::new();
            for i in 0..1000u64 {
                // Every 100th frame jumps back.
                let pts = if i % 100 == 99 { i * 1000 - 5000 } else { i * 1000 };
                black_box(tracker.stamp(Some(pts), Some(0)));
            }
        });
    });
}

criterion_group!(benches, bench_round_trip, bench_clock);
criterion_main!(benches);
