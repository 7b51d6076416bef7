//! Combinatorics Benchmarks - Bet Intake Hot Path
//!
//! Benchmarks the pure functions that run on every ticket and on every
//! pending bet scanned during an exposure check.
//!
//! Run with: cargo bench --bench combinatorics_bench

use criterion::{Criterion, black_box, criterion_group, criterion_main};
use rust_decimal::Decimal;

use bicho_risk_engine::domain::combinatorics::{distinct_permutations, normalize};
use bicho_risk_engine::domain::modality::Modality;
use bicho_risk_engine::domain::positions::parse_position_token;
use bicho_risk_engine::domain::selection::comparable_number;
use bicho_risk_engine::domain::units::UnitCalculator;

/// Distinct permutations of a milhar with one repeated digit.
fn bench_distinct_permutations(c: &mut Criterion) {
    c.bench_function("distinct_permutations_1123", |b| {
        b.iter(|| distinct_permutations(black_box("1123")));
    });
}

/// Inverted milhar over five tiers.
fn bench_compute_units(c: &mut Criterion) {
    let calculator = UnitCalculator::new();
    let stake = Decimal::new(1000, 2);

    c.bench_function("compute_units_milhar_invertida_1_5", |b| {
        b.iter(|| {
            calculator.compute_units(
                black_box(Modality::MilharInvertida),
                black_box("1123"),
                black_box(1),
                black_box(5),
                black_box(stake),
            )
        });
    });
}

/// Per-row work of an exposure scan: token parse plus number normalization.
fn bench_scan_row(c: &mut Criterion) {
    c.bench_function("scan_row_parse_and_normalize", |b| {
        b.iter(|| {
            let tiers = parse_position_token(black_box("1-5"));
            let number = comparable_number(black_box(Modality::Dezena), black_box("4321"));
            (tiers, number)
        });
    });

    c.bench_function("normalize_pad", |b| {
        b.iter(|| normalize(black_box("7"), black_box(4)));
    });
}

criterion_group!(
    benches,
    bench_distinct_permutations,
    bench_compute_units,
    bench_scan_row,
);
criterion_main!(benches);
