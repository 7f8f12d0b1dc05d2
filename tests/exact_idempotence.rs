use table_xmatch::link::RowLink;
use table_xmatch::prelude::*;
use table_xmatch::tuple::{ColumnExpressions, extract_tuples};

const KEYS: [&str; 7] = ["a", "b", "a", "c", "b", "a", "d"];

fn keyed() -> Table {
    Table::from_rows(
        "keys",
        vec![ColumnInfo::new("key", ValueKind::Text)],
        KEYS.iter().map(|k| vec![Value::from(*k)]),
    )
    .unwrap()
}

fn exact_matcher(copies: usize) -> RowMatcher {
    let engine = MatchEngine::parse("exact", PixellatorKind::Healpix, false).unwrap();
    let t = keyed();
    let ex = ColumnExpressions::compile(0, &t, &["key"], &engine.tuple_infos(), "exact").unwrap();
    let tuples = extract_tuples(&t, &ex, |v| engine.prepare(v)).unwrap();
    RowMatcher::new(engine, vec![tuples; copies], RowRunner::sequential()).unwrap()
}

fn key_of(link: &RowLink) -> &'static str {
    KEYS[link.refs()[0].row()]
}

fn count(key: &str) -> usize {
    KEYS.iter().filter(|k| **k == key).count()
}

#[test]
fn internal_groups_are_the_distinct_keys() {
    let links = exact_matcher(1).find_internal_matches(true).unwrap();
    let mut keys: Vec<&str> = links.iter().map(key_of).collect();
    keys.sort_unstable();
    assert_eq!(keys, ["a", "b", "c", "d"]);
    for link in &links {
        assert_eq!(link.len(), count(key_of(link)), "{}", key_of(link));
        assert!(link.refs().iter().all(|r| KEYS[r.row()] == key_of(link)));
    }
}

#[test]
fn group_match_against_itself_gives_one_link_per_key() {
    let links = exact_matcher(2)
        .find_group_matches(&[MultiJoinType::Default, MultiJoinType::Default])
        .unwrap();
    let firsts: Vec<(usize, usize)> = links
        .iter()
        .map(|l| (l.refs()[0].row(), l.refs()[1].row()))
        .collect();
    // Earliest row of each key, paired with itself in the copy.
    assert_eq!(firsts, [(0, 0), (1, 1), (3, 3), (6, 6)]);
    assert!(links.iter().all(|l| l.len() == 2));
}

#[test]
fn task_level_group_match() {
    let t = keyed();
    let cfg = MatchConfig {
        multi_mode: MultiMode::Group,
        runner: RunnerMode::Sequential,
        ..MatchConfig::new("exact", &[])
    };
    let exprs: [&[&str]; 2] = [&["key"], &["$1"]];
    let out = MatchTask::new(cfg).unwrap().multi_match(&[&t, &t], &exprs).unwrap();
    assert_eq!(out.row_count(), 4);
    assert_eq!(out.columns()[0].name, "key_1");
    assert_eq!(out.columns()[1].name, "key_2");
}
