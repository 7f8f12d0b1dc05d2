//! Find modes and join policies.

use crate::link::{RowLink, missing_singles};
use crate::match_error::MatchError;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Which pairs a two-table match keeps.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PairMode {
    /// Every matching pair.
    All,
    /// Pairs that are the best candidate of both their rows.
    #[default]
    Best,
    /// Best table-2 match for each table-1 row.
    Best1,
    /// Best table-1 match for each table-2 row.
    Best2,
}

impl FromStr for PairMode {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "all" => Ok(PairMode::All),
            "best" => Ok(PairMode::Best),
            "best1" => Ok(PairMode::Best1),
            "best2" => Ok(PairMode::Best2),
            _ => Err(MatchError::Config(format!(
                "unknown find mode `{s}` (all, best, best1, best2)"
            ))),
        }
    }
}

impl fmt::Display for PairMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            PairMode::All => "all",
            PairMode::Best => "best",
            PairMode::Best1 => "best1",
            PairMode::Best2 => "best2",
        })
    }
}

/// Which rows of a two-table match appear in the output.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub enum JoinType {
    /// Matched pairs only.
    #[default]
    #[serde(rename = "1and2")]
    OneAndTwo,
    /// Matched pairs plus unmatched rows of both tables.
    #[serde(rename = "1or2")]
    OneOrTwo,
    /// Matched pairs plus unmatched rows of table 1.
    #[serde(rename = "all1")]
    AllFromOne,
    /// Matched pairs plus unmatched rows of table 2.
    #[serde(rename = "all2")]
    AllFromTwo,
    /// Unmatched rows of table 1 only.
    #[serde(rename = "1not2", alias = "1")]
    OneNotTwo,
    /// Unmatched rows of table 2 only.
    #[serde(rename = "2not1", alias = "2")]
    TwoNotOne,
    /// Unmatched rows of either table.
    #[serde(rename = "1xor2")]
    OneXorTwo,
}

impl JoinType {
    pub const ALL: [JoinType; 7] = [
        JoinType::OneAndTwo,
        JoinType::OneOrTwo,
        JoinType::AllFromOne,
        JoinType::AllFromTwo,
        JoinType::OneNotTwo,
        JoinType::TwoNotOne,
        JoinType::OneXorTwo,
    ];

    pub fn name(self) -> &'static str {
        match self {
            JoinType::OneAndTwo => "1and2",
            JoinType::OneOrTwo => "1or2",
            JoinType::AllFromOne => "all1",
            JoinType::AllFromTwo => "all2",
            JoinType::OneNotTwo => "1not2",
            JoinType::TwoNotOne => "2not1",
            JoinType::OneXorTwo => "1xor2",
        }
    }

    /// Whether each input table contributes columns to the output.
    pub fn used_tables(self) -> [bool; 2] {
        match self {
            JoinType::OneNotTwo => [true, false],
            JoinType::TwoNotOne => [false, true],
            _ => [true, true],
        }
    }

    /// Whether output rows can carry a match score at all.
    pub fn has_scores(self) -> bool {
        !matches!(
            self,
            JoinType::OneNotTwo | JoinType::TwoNotOne | JoinType::OneXorTwo
        )
    }

    /// Turn matched pairs into the links to output, in canonical order.
    pub fn process_links(self, pairs: Vec<RowLink>, row_counts: [usize; 2]) -> Vec<RowLink> {
        let singles = |itable: usize| missing_singles(&pairs, itable, row_counts[itable]);
        let mut out = match self {
            JoinType::OneAndTwo => pairs,
            JoinType::OneOrTwo => {
                let mut extra = singles(0);
                extra.extend(singles(1));
                let mut all = pairs;
                all.extend(extra);
                all
            }
            JoinType::AllFromOne => {
                let extra = singles(0);
                let mut all = pairs;
                all.extend(extra);
                all
            }
            JoinType::AllFromTwo => {
                let extra = singles(1);
                let mut all = pairs;
                all.extend(extra);
                all
            }
            JoinType::OneNotTwo => singles(0),
            JoinType::TwoNotOne => singles(1),
            JoinType::OneXorTwo => {
                let mut extra = singles(0);
                extra.extend(singles(1));
                extra
            }
        };
        out.sort_unstable();
        out
    }
}

impl FromStr for JoinType {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let lower = s.trim().to_ascii_lowercase();
        match lower.as_str() {
            "1" => return Ok(JoinType::OneNotTwo),
            "2" => return Ok(JoinType::TwoNotOne),
            _ => {}
        }
        JoinType::ALL
            .into_iter()
            .find(|j| j.name() == lower)
            .ok_or_else(|| MatchError::InvalidJoinType(s.to_owned()))
    }
}

impl fmt::Display for JoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Per-table inclusion rule for N-table matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MultiJoinType {
    /// No constraint on this table.
    #[default]
    Default,
    /// Output rows must include this table.
    Match,
    /// Output rows must not include this table.
    NoMatch,
    /// Every row of this table appears in the output.
    Always,
}

impl MultiJoinType {
    /// Whether a link touching the tables flagged in `present` is output.
    pub fn accept(types: &[MultiJoinType], present: &[bool]) -> bool {
        let mut any_always = false;
        for (t, &p) in types.iter().zip(present) {
            match t {
                MultiJoinType::Match if !p => return false,
                MultiJoinType::NoMatch if p => return false,
                MultiJoinType::Always if p => any_always = true,
                _ => {}
            }
        }
        any_always || present.iter().filter(|&&p| p).count() >= 2
    }

    /// [`accept`](Self::accept) applied to a link.
    pub fn accept_link(types: &[MultiJoinType], link: &RowLink) -> bool {
        let mut present = vec![false; types.len()];
        for r in link.refs() {
            if let Some(p) = present.get_mut(r.table()) {
                *p = true;
            }
        }
        Self::accept(types, &present)
    }
}

impl FromStr for MultiJoinType {
    type Err = MatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "default" => Ok(MultiJoinType::Default),
            "match" => Ok(MultiJoinType::Match),
            "nomatch" => Ok(MultiJoinType::NoMatch),
            "always" => Ok(MultiJoinType::Always),
            _ => Err(MatchError::InvalidJoinType(s.to_owned())),
        }
    }
}

impl fmt::Display for MultiJoinType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MultiJoinType::Default => "default",
            MultiJoinType::Match => "match",
            MultiJoinType::NoMatch => "nomatch",
            MultiJoinType::Always => "always",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::link::RowRef;

    fn r(t: usize, i: usize) -> RowRef {
        RowRef::new(t, i)
    }

    #[test]
    fn join_names_and_aliases() {
        for j in JoinType::ALL {
            assert_eq!(j.name().parse::<JoinType>().unwrap(), j);
        }
        assert_eq!("1".parse::<JoinType>().unwrap(), JoinType::OneNotTwo);
        assert_eq!("2".parse::<JoinType>().unwrap(), JoinType::TwoNotOne);
        assert_eq!("ALL1".parse::<JoinType>().unwrap(), JoinType::AllFromOne);
        assert!(matches!("3and4".parse::<JoinType>(), Err(MatchError::InvalidJoinType(_))));
    }

    #[test]
    fn process_links_per_join_type() {
        let pairs = vec![RowLink::pair(r(0, 1), r(1, 0), 0.5)];
        let counts = [3, 2];
        let len = |j: JoinType| j.process_links(pairs.clone(), counts).len();
        assert_eq!(len(JoinType::OneAndTwo), 1);
        assert_eq!(len(JoinType::OneOrTwo), 4);
        assert_eq!(len(JoinType::AllFromOne), 3);
        assert_eq!(len(JoinType::AllFromTwo), 2);
        assert_eq!(len(JoinType::OneNotTwo), 2);
        assert_eq!(len(JoinType::TwoNotOne), 1);
        assert_eq!(len(JoinType::OneXorTwo), 3);
        let all1 = JoinType::AllFromOne.process_links(pairs.clone(), counts);
        assert_eq!(all1[0], RowLink::single(r(0, 0)));
        assert_eq!(all1[1].score(), Some(0.5));
    }

    #[test]
    fn multi_accept_rules() {
        use MultiJoinType::*;
        assert!(MultiJoinType::accept(&[Default, Default, Default], &[true, false, true]));
        assert!(!MultiJoinType::accept(&[Default, Default, Default], &[true, false, false]));
        assert!(MultiJoinType::accept(&[Always, Default], &[true, false]));
        assert!(!MultiJoinType::accept(&[Always, Match], &[true, false]));
        assert!(!MultiJoinType::accept(&[Default, NoMatch, Default], &[true, true, true]));
        assert!(MultiJoinType::accept(&[Default, NoMatch, Always], &[false, false, true]));
        assert_eq!("NoMatch".parse::<MultiJoinType>().unwrap(), NoMatch);
    }

    #[test]
    fn serde_names() {
        let j: JoinType = serde_json::from_str("\"1xor2\"").unwrap();
        assert_eq!(j, JoinType::OneXorTwo);
        let j: JoinType = serde_json::from_str("\"1\"").unwrap();
        assert_eq!(j, JoinType::OneNotTwo);
        assert_eq!(serde_json::to_string(&MultiJoinType::NoMatch).unwrap(), "\"nomatch\"");
    }
}
