mod util;

use serial_test::serial;
use table_xmatch::prelude::*;
use util::{perturbed, random_patch, sky_table};

const MODES: [RunnerMode; 4] = [
    RunnerMode::Classic,
    RunnerMode::Sequential,
    RunnerMode::Parallel,
    RunnerMode::ParTest,
];

fn catalogues() -> (Table, Table, Table) {
    let base = random_patch(3000, 7);
    let a = sky_table("a", &base);
    let b = sky_table("b", &perturbed(&base, 0.7, 2.0, 500, 11));
    let c = sky_table("c", &perturbed(&base, 0.5, 2.0, 200, 13));
    (a, b, c)
}

fn task(runner: RunnerMode, tweak: impl Fn(&mut MatchConfig)) -> MatchTask {
    let mut cfg = MatchConfig {
        runner,
        threads: Some(4),
        ..MatchConfig::new("sky", &[3.0])
    };
    tweak(&mut cfg);
    MatchTask::new(cfg).unwrap()
}

const RADEC: [&str; 2] = ["ra", "dec"];

#[test]
#[serial]
fn pair_match_is_identical_in_every_runner_mode() {
    let (a, b, _) = catalogues();
    for find in [PairMode::All, PairMode::Best, PairMode::Best1, PairMode::Best2] {
        let outputs: Vec<Table> = MODES
            .iter()
            .map(|&mode| {
                task(mode, |c| {
                    c.find = find;
                    c.join = JoinType::OneOrTwo;
                })
                .pair_match(&a, &b, &RADEC, &RADEC)
                .unwrap()
            })
            .collect();
        assert!(outputs[0].row_count() > 1000, "{find}: too few rows");
        for (mode, out) in MODES.iter().zip(&outputs).skip(1) {
            assert_eq!(out, &outputs[0], "{find}: {mode} differs from classic");
        }
    }
}

#[test]
#[serial]
fn multi_table_modes_are_identical_in_every_runner_mode() {
    let (a, b, c) = catalogues();
    let exprs: [&[&str]; 3] = [&RADEC, &RADEC, &RADEC];
    for multi in [MultiMode::Pairs, MultiMode::Group] {
        let outputs: Vec<Table> = MODES
            .iter()
            .map(|&mode| {
                task(mode, |cfg| cfg.multi_mode = multi)
                    .multi_match(&[&a, &b, &c], &exprs)
                    .unwrap()
            })
            .collect();
        assert!(outputs[0].row_count() > 0);
        for out in &outputs[1..] {
            assert_eq!(out, &outputs[0], "{multi}");
        }
    }
}

#[test]
#[serial]
fn internal_match_is_identical_in_every_runner_mode() {
    let mut positions = random_patch(2000, 3);
    positions.extend(perturbed(&positions.clone(), 0.3, 1.0, 0, 5));
    let t = sky_table("t", &positions);
    let outputs: Vec<Table> = MODES
        .iter()
        .map(|&mode| task(mode, |_| {}).internal_match(&t, &RADEC).unwrap())
        .collect();
    for out in &outputs[1..] {
        assert_eq!(out, &outputs[0]);
    }
}

#[test]
#[serial]
fn htm_and_healpix_agree() {
    let (a, b, _) = catalogues();
    let healpix = task(RunnerMode::ParTest, |_| {})
        .pair_links(&a, &b, &RADEC, &RADEC)
        .unwrap();
    let htm = task(RunnerMode::ParTest, |c| c.pixellator = PixellatorKind::Htm)
        .pair_links(&a, &b, &RADEC, &RADEC)
        .unwrap();
    assert_eq!(healpix, htm);
}
