use criterion::{BenchmarkId, Criterion, criterion_group, criterion_main};
use rand::rngs::SmallRng;
use rand::{Rng, SeedableRng};
use std::sync::Arc;

use table_xmatch::prelude::*;
use table_xmatch::progress::NullProgress;
use table_xmatch::tuple::reals;

const ARCSEC: f64 = std::f64::consts::PI / (180.0 * 3600.0);

/// Radian sky positions in a one-degree patch, plus a jittered partial copy.
fn catalogues(n: usize, seed: u64) -> (Vec<Tuple>, Vec<Tuple>) {
    let mut rng = SmallRng::seed_from_u64(seed);
    let deg = ARCSEC * 3600.0;
    let a: Vec<(f64, f64)> = (0..n)
        .map(|_| (rng.gen_range(0.0..deg), rng.gen_range(-0.5 * deg..0.5 * deg)))
        .collect();
    let b: Vec<Tuple> = a
        .iter()
        .filter_map(|&(ra, dec)| {
            rng.gen_bool(0.8)
                .then(|| reals(&[ra + rng.gen_range(-ARCSEC..ARCSEC), dec + rng.gen_range(-ARCSEC..ARCSEC)]))
        })
        .collect();
    (a.iter().map(|&(ra, dec)| reals(&[ra, dec])).collect(), b)
}

fn bench_sky_pairs(c: &mut Criterion) {
    let (a, b) = catalogues(50_000, 42);
    let engine = MatchEngine::parse("sky", PixellatorKind::Healpix, false)
        .unwrap()
        .configure(&[2.0 * ARCSEC], &[])
        .unwrap();

    let mut group = c.benchmark_group("sky_pair_best");
    group.sample_size(10);
    for mode in [RunnerMode::Classic, RunnerMode::Sequential, RunnerMode::Parallel] {
        let runner = RowRunner::new(mode, None, CancelToken::new(), Arc::new(NullProgress)).unwrap();
        let matcher = RowMatcher::new(engine.clone(), vec![a.clone(), b.clone()], runner).unwrap();
        group.bench_with_input(BenchmarkId::from_parameter(mode), &matcher, |bch, m| {
            bch.iter(|| m.find_pair_matches(PairMode::Best).unwrap().len())
        });
    }
    group.finish();
}

fn bench_group(c: &mut Criterion) {
    let (a, b) = catalogues(20_000, 7);
    let engine = MatchEngine::parse("sky", PixellatorKind::Healpix, false)
        .unwrap()
        .configure(&[2.0 * ARCSEC], &[])
        .unwrap();
    let runner = RowRunner::new(RunnerMode::Parallel, None, CancelToken::new(), Arc::new(NullProgress)).unwrap();
    let matcher = RowMatcher::new(engine, vec![a.clone(), b, a], runner).unwrap();
    c.bench_function("sky_group_3_tables", |bch| {
        bch.iter(|| {
            matcher
                .find_group_matches(&[MultiJoinType::Default; 3])
                .unwrap()
                .len()
        })
    });
}

criterion_group!(benches, bench_sky_pairs, bench_group);
criterion_main!(benches);
