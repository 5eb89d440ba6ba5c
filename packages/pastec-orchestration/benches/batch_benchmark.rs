//! Benchmark for batch planning and result merging
//!
//! Measures:
//! - Splitting a consensus file into batches
//! - Merging per-batch classification parts
//! - Scaling with the number of sequences

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use pastec_orchestration::{plan_batch_size, BatchPlanner, ResultMerger, SequenceCollection};
use std::path::{Path, PathBuf};

const MAX_JOBS: usize = 10;

/// Generate a consensus FASTA file of `count` sequences of 500 bp
fn generate_fasta(dir: &Path, count: usize) -> PathBuf {
    let mut content = String::new();
    for i in 0..count {
        content.push_str(&format!(">DmelChr4-B-G{}-Map3\n", i));
        for _ in 0..5 {
            content.push_str(&"ACGTTGCAAC".repeat(10));
            content.push('\n');
        }
    }
    let path = dir.join("consensus.fa");
    std::fs::write(&path, content).unwrap();
    path
}

/// Generate `parts` classification parts of `per_part` records each
fn generate_parts(dir: &Path, parts: usize, per_part: usize) {
    for part in 1..=parts {
        let mut content = String::new();
        for i in 0..per_part {
            content.push_str(&format!(
                "DmelChr4-B-G{}-Map3\t500\t+\tok\tI\tLTR\tcomplete\tCI=100\n",
                part * per_part + i
            ));
        }
        std::fs::write(dir.join(format!("proj.classif_{}", part)), content).unwrap();
    }
}

fn bench_split(c: &mut Criterion) {
    let mut group = c.benchmark_group("split");

    for num_sequences in [100, 1_000, 10_000].iter() {
        let dir = tempfile::tempdir().unwrap();
        let source = SequenceCollection::new(generate_fasta(dir.path(), *num_sequences));
        let planner = BatchPlanner::new(dir.path());
        let batch_size = plan_batch_size(*num_sequences, MAX_JOBS, 100);

        group.bench_with_input(
            BenchmarkId::from_parameter(num_sequences),
            num_sequences,
            |b, _| {
                b.iter(|| {
                    let batches = planner.split(&source, black_box(batch_size)).unwrap();
                    black_box(batches.len())
                });
            },
        );
    }

    group.finish();
}

fn bench_merge(c: &mut Criterion) {
    let mut group = c.benchmark_group("merge");

    for num_records in [100, 1_000, 10_000].iter() {
        let dir = tempfile::tempdir().unwrap();
        generate_parts(dir.path(), MAX_JOBS, num_records / MAX_JOBS);
        let merger = ResultMerger::new(dir.path());
        let destination = dir.path().join("proj.classif");

        group.bench_with_input(
            BenchmarkId::from_parameter(num_records),
            num_records,
            |b, _| {
                b.iter(|| {
                    let report = merger.merge("proj.classif_", &destination, false).unwrap();
                    black_box(report.bytes_written)
                });
            },
        );
    }

    group.finish();
}

criterion_group!(benches, bench_split, bench_merge);
criterion_main!(benches);
