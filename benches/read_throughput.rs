//! Benchmark suite for recordchain read throughput
//!
//! This benchmark measures:
//! - Sequential scan throughput over framed files (records/sec, MB/s)
//! - Scans over many small files (per-file open/close overhead)
//! - Recovery cost when frames are corrupt
//! - Checkpoint save/restore cost
//!
//! # Configuration
//!
//! Benchmark behavior can be configured via environment variables:
//!
//! - `BENCH_SAMPLE_SIZE`: Number of samples to collect (default: 100)
//! - `BENCH_MEASUREMENT_TIME`: Measurement time in seconds (default: 5)
//! - `BENCH_WARM_UP_TIME`: Warm-up time in seconds (default: 3)
//!
//! # Examples
//!
//! ```bash
//! BENCH_SAMPLE_SIZE=50 BENCH_MEASUREMENT_TIME=3 cargo bench
//! ```

use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion, Throughput};
use std::hint::black_box;
use std::path::Path;
use std::time::Duration;

use recordchain::source::{FramedConfig, FramedOpener, FramedWriter};
use recordchain::{FileList, StreamIterator};
use tempfile::TempDir;

/// Configure Criterion based on environment variables
fn configure_criterion() -> Criterion {
    let mut criterion = Criterion::default();

    if let Ok(sample_size) = std::env::var("BENCH_SAMPLE_SIZE") {
        match sample_size.parse::<usize>() {
            Ok(size) => criterion = criterion.sample_size(size),
            Err(_) => eprintln!("Warning: Invalid BENCH_SAMPLE_SIZE value: {}", sample_size),
        }
    }

    if let Ok(measurement_time) = std::env::var("BENCH_MEASUREMENT_TIME") {
        match measurement_time.parse::<u64>() {
            Ok(secs) => criterion = criterion.measurement_time(Duration::from_secs(secs)),
            Err(_) => eprintln!(
                "Warning: Invalid BENCH_MEASUREMENT_TIME value: {}",
                measurement_time
            ),
        }
    }

    if let Ok(warm_up_time) = std::env::var("BENCH_WARM_UP_TIME") {
        match warm_up_time.parse::<u64>() {
            Ok(secs) => criterion = criterion.warm_up_time(Duration::from_secs(secs)),
            Err(_) => eprintln!("Warning: Invalid BENCH_WARM_UP_TIME value: {}", warm_up_time),
        }
    }

    criterion
}

/// Write `files` framed files of `records` records each, returning their paths.
fn write_files(dir: &Path, files: usize, records: usize, record_size: usize) -> FileList {
    let payload = vec![0xA5u8; record_size];
    let paths: Vec<String> = (0..files)
        .map(|i| {
            let path = dir.join(format!("part-{:04}.rcf", i));
            let mut writer = FramedWriter::create(&path).unwrap();
            for _ in 0..records {
                writer.write_record(&payload).unwrap();
            }
            writer.finish().unwrap();
            path.to_str().unwrap().to_string()
        })
        .collect();
    FileList::new(paths)
}

/// Read every record, returning the record count.
fn scan(files: &FileList) -> usize {
    let iter = StreamIterator::new(files.clone(), FramedOpener::new(FramedConfig::default()));
    iter.filter(Result::is_ok).count()
}

fn bench_record_sizes(c: &mut Criterion) {
    let mut group = c.benchmark_group("record_size");

    for record_size in [64usize, 1024, 16 * 1024] {
        let dir = TempDir::new().unwrap();
        let records = (8 * 1024 * 1024) / record_size;
        let files = write_files(dir.path(), 1, records, record_size);

        group.throughput(Throughput::Bytes((records * record_size) as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(record_size),
            &files,
            |b, files| b.iter(|| black_box(scan(files))),
        );
    }

    group.finish();
}

fn bench_many_files(c: &mut Criterion) {
    let mut group = c.benchmark_group("file_count");

    for file_count in [1usize, 16, 256] {
        let dir = TempDir::new().unwrap();
        let total_records = 16 * 1024;
        let files = write_files(dir.path(), file_count, total_records / file_count, 256);

        group.throughput(Throughput::Elements(total_records as u64));
        group.bench_with_input(
            BenchmarkId::from_parameter(file_count),
            &files,
            |b, files| b.iter(|| black_box(scan(files))),
        );
    }

    group.finish();
}

fn bench_recovery(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), 1, 10_000, 256);

    // Damage every 100th frame's payload
    let path = &files[0];
    let mut data = std::fs::read(path).unwrap();
    let frame_len = 16 + 2 + 256 + 4;
    for frame in (0..10_000).step_by(100) {
        data[20 + frame * frame_len + 16 + 2] ^= 0xFF;
    }
    std::fs::write(path, data).unwrap();

    c.bench_function("scan_with_corruption", |b| b.iter(|| black_box(scan(&files))));
}

fn bench_checkpoint(c: &mut Criterion) {
    let dir = TempDir::new().unwrap();
    let files = write_files(dir.path(), 4, 1000, 128);
    let mut iter = StreamIterator::new(files.clone(), FramedOpener::new(FramedConfig::default()));
    for _ in 0..2500 {
        iter.next_record().unwrap();
    }

    c.bench_function("save_bytes", |b| b.iter(|| black_box(iter.save_bytes())));

    let checkpoint = iter.save_bytes();
    let mut target = StreamIterator::new(files, FramedOpener::new(FramedConfig::default()));
    c.bench_function("restore_bytes", |b| {
        b.iter(|| target.restore_bytes(black_box(&checkpoint)).unwrap())
    });
}

criterion_group! {
    name = benches;
    config = configure_criterion();
    targets = bench_record_sizes, bench_many_files, bench_recovery, bench_checkpoint
}

criterion_main!(benches);
