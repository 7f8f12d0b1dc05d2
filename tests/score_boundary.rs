use table_xmatch::prelude::*;
use table_xmatch::tuple::reals;

fn iso(ndim: usize, err: f64) -> MatchEngine {
    MatchEngine::parse(&format!("{ndim}d"), PixellatorKind::Healpix, false)
        .unwrap()
        .configure(&[err], &[])
        .unwrap()
}

#[test]
fn distance_equal_to_tolerance_matches() {
    let e = iso(1, 0.25);
    assert_eq!(e.score(&reals(&[0.75]), &reals(&[1.0])), Some(0.25));
    assert_eq!(e.score(&reals(&[0.75]), &reals(&[1.0 + 1e-9])), None);

    let e = iso(2, 0.5);
    assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[0.5, 0.0])), Some(0.5));
    assert_eq!(e.score(&reals(&[0.0, 0.0]), &reals(&[0.5, 1e-6])), None);
}

#[test]
fn nan_coordinates_never_match() {
    let e = iso(2, 1.0);
    assert_eq!(e.score(&reals(&[f64::NAN, 0.0]), &reals(&[0.0, 0.0])), None);
    let mut bins = Vec::new();
    e.bins(&reals(&[f64::NAN, 0.0]), &mut bins).unwrap();
    assert!(bins.is_empty());
}

#[test]
fn indexed_matcher_finds_boundary_pairs() {
    // Pairs exactly at the tolerance, straddling cell edges.
    let left: Vec<f64> = (0..40).map(|i| i as f64).collect();
    let right: Vec<f64> = left.iter().map(|x| x + 0.25).collect();
    let tuples = vec![
        left.iter().map(|&x| reals(&[x])).collect(),
        right.iter().map(|&x| reals(&[x])).collect(),
    ];
    let m = RowMatcher::new(iso(1, 0.25), tuples, RowRunner::sequential()).unwrap();
    let best = m.find_pair_matches(PairMode::Best1).unwrap();
    assert_eq!(best.len(), 40);
    for link in &best {
        let [a, b] = link.refs() else { panic!("not a pair") };
        assert_eq!(a.row(), b.row(), "row {} should pair with its shifted copy", a.row());
        assert_eq!(link.score(), Some(0.25));
    }
}
