use std::collections::HashMap;

use crate::config::*;
use crate::profile::{rank_of, Profile};

/// Weighted number of voters who rank `a` strictly above `b`.
///
/// Only the ballots that rank both candidates are counted: a candidate that
/// is missing from a truncated ballot is not compared with the others.
pub fn preference_count(profile: &Profile, a: Candidate, b: Candidate) -> u64 {
    if a == b {
        return 0;
    }
    profile
        .pairs()
        .iter()
        .filter_map(|wb| match (rank_of(&wb.ballot, a), rank_of(&wb.ballot, b)) {
            (Some(ra), Some(rb)) if ra < rb => Some(wb.frequency),
            _ => None,
        })
        .sum()
}

/// Net preference of `a` over `b`: the voters ranking `a` above `b` minus
/// the voters ranking `b` above `a`.
pub fn net_preference(profile: &Profile, a: Candidate, b: Candidate) -> i64 {
    preference_count(profile, a, b) as i64 - preference_count(profile, b, a) as i64
}

/// All the pairwise preference counts of a profile, computed in one pass.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct PairwiseMatrix {
    candidates: Vec<Candidate>,
    index: HashMap<Candidate, usize>,
    // counts[i][j]: voters ranking candidates[i] above candidates[j]
    counts: Vec<Vec<u64>>,
}

impl PairwiseMatrix {
    pub fn new(profile: &Profile) -> PairwiseMatrix {
        let candidates = profile.candidates().to_vec();
        let index: HashMap<Candidate, usize> = candidates
            .iter()
            .enumerate()
            .map(|(idx, c)| (*c, idx))
            .collect();
        let n = candidates.len();
        let mut counts = vec![vec![0u64; n]; n];
        for wb in profile.pairs().iter() {
            for (pos, x) in wb.ballot.iter().enumerate() {
                for y in wb.ballot[pos + 1..].iter() {
                    if let (Some(&ix), Some(&iy)) = (index.get(x), index.get(y)) {
                        counts[ix][iy] += wb.frequency;
                    }
                }
            }
        }
        PairwiseMatrix {
            candidates,
            index,
            counts,
        }
    }

    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn count(&self, a: Candidate, b: Candidate) -> u64 {
        match (self.index.get(&a), self.index.get(&b)) {
            (Some(&ia), Some(&ib)) => self.counts[ia][ib],
            _ => 0,
        }
    }

    pub fn net(&self, a: Candidate, b: Candidate) -> i64 {
        self.count(a, b) as i64 - self.count(b, a) as i64
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_profile() -> Profile {
        Profile::new(
            &[
                WeightedBallot::new(5, &[1, 2, 3]),
                WeightedBallot::new(6, &[3, 2, 1]),
                WeightedBallot::new(6, &[1, 3, 2]),
            ],
            None,
        )
        .unwrap()
    }

    #[test]
    fn net_preference_is_antisymmetric() {
        let p = reference_profile();
        for &a in p.candidates() {
            for &b in p.candidates() {
                assert_eq!(net_preference(&p, a, b), -net_preference(&p, b, a));
            }
            assert_eq!(net_preference(&p, a, a), 0);
        }
        // 1 over 2: 5 + 6 against 6.
        assert_eq!(net_preference(&p, Candidate(1), Candidate(2)), 5);
        assert_eq!(preference_count(&p, Candidate(3), Candidate(2)), 12);
    }

    #[test]
    fn truncated_ballots_do_not_compare_missing_candidates() {
        let cands = [Candidate(1), Candidate(2), Candidate(3)];
        let p = Profile::new(
            &[
                WeightedBallot::new(4, &[1]),
                WeightedBallot::new(2, &[2, 1]),
            ],
            Some(&cands[..]),
        )
        .unwrap();
        assert_eq!(net_preference(&p, Candidate(1), Candidate(2)), -2);
        assert_eq!(net_preference(&p, Candidate(1), Candidate(3)), 0);
    }

    #[test]
    fn matrix_matches_direct_query() {
        let p = reference_profile();
        let m = PairwiseMatrix::new(&p);
        for &a in p.candidates() {
            for &b in p.candidates() {
                assert_eq!(m.count(a, b), preference_count(&p, a, b));
                assert_eq!(m.net(a, b), net_preference(&p, a, b));
            }
        }
    }
}
