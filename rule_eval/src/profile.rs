use log::debug;

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::config::*;

/// A weighted collection of distinct ballots over a set of candidates.
///
/// A profile is validated at construction and never changes afterwards.
/// The pairs are kept sorted by ballot, so two profiles with the same
/// content compare equal.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct Profile {
    // Sorted, without duplicates.
    candidates: Vec<Candidate>,
    // Sorted by ballot, ballots pairwise distinct.
    pairs: Vec<WeightedBallot>,
}

impl Profile {
    /// Builds a profile from a list of weighted ballots.
    ///
    /// Arguments:
    /// * `pairs` the weighted ballots. Two pairs may not share the same ballot.
    /// * `candidates` the registered candidates. If not provided, the
    /// candidates are inferred from the ballots.
    pub fn new(
        pairs: &[WeightedBallot],
        candidates: Option<&[Candidate]>,
    ) -> Result<Profile, RuleError> {
        if pairs.is_empty() {
            return Err(RuleError::InvalidProfile("no ballot provided".to_string()));
        }

        let declared: Option<BTreeSet<Candidate>> = match candidates {
            Some(cands) => {
                let s: BTreeSet<Candidate> = cands.iter().cloned().collect();
                if s.len() != cands.len() {
                    return Err(RuleError::InvalidProfile(format!(
                        "duplicate candidates in {:?}",
                        cands
                    )));
                }
                Some(s)
            }
            None => None,
        };

        let mut seen_ballots: HashSet<&Ballot> = HashSet::new();
        let mut inferred: BTreeSet<Candidate> = BTreeSet::new();
        for wb in pairs.iter() {
            if wb.frequency == 0 {
                return Err(RuleError::InvalidProfile(format!(
                    "ballot {:?} has a zero frequency",
                    wb.ballot
                )));
            }
            if wb.ballot.is_empty() {
                return Err(RuleError::InvalidProfile("empty ballot".to_string()));
            }
            let mut in_ballot: HashSet<Candidate> = HashSet::new();
            for c in wb.ballot.iter() {
                if !in_ballot.insert(*c) {
                    return Err(RuleError::InvalidProfile(format!(
                        "candidate {} appears twice in ballot {:?}",
                        c, wb.ballot
                    )));
                }
                if let Some(decl) = declared.as_ref() {
                    if !decl.contains(c) {
                        return Err(RuleError::InvalidProfile(format!(
                            "ballot {:?} references unknown candidate {}",
                            wb.ballot, c
                        )));
                    }
                }
                inferred.insert(*c);
            }
            if !seen_ballots.insert(&wb.ballot) {
                return Err(RuleError::InvalidProfile(format!(
                    "ballot {:?} is provided more than once",
                    wb.ballot
                )));
            }
        }

        let all_candidates: Vec<Candidate> = declared.unwrap_or(inferred).into_iter().collect();
        let mut sorted_pairs: Vec<WeightedBallot> = pairs.to_vec();
        sorted_pairs.sort_by(|a, b| a.ballot.cmp(&b.ballot));
        debug!(
            "Profile::new: {} candidates, {} distinct ballots",
            all_candidates.len(),
            sorted_pairs.len()
        );
        Ok(Profile {
            candidates: all_candidates,
            pairs: sorted_pairs,
        })
    }

    /// The candidates, in increasing order of identifier.
    pub fn candidates(&self) -> &[Candidate] {
        &self.candidates
    }

    pub fn pairs(&self) -> &[WeightedBallot] {
        &self.pairs
    }

    pub fn num_candidates(&self) -> usize {
        self.candidates.len()
    }

    pub fn total_voters(&self) -> u64 {
        self.pairs.iter().map(|wb| wb.frequency).sum()
    }

    /// The average length of the distinct ballots.
    pub fn average_ballot_length(&self) -> f64 {
        let total: usize = self.pairs.iter().map(|wb| wb.ballot.len()).sum();
        total as f64 / self.pairs.len() as f64
    }

    /// How much the ballots have been truncated: 0 for complete ballots,
    /// close to 1 when the ballots only hold a first choice.
    pub fn distortion_ratio(&self) -> f64 {
        1.0 - self.average_ballot_length() / self.num_candidates() as f64
    }

    /// A digest of the content of the profile.
    ///
    /// Two profiles have the same key if and only if they have the same
    /// candidates and the same weighted ballots.
    pub fn content_key(&self) -> String {
        let mut repr = String::from("c");
        for c in self.candidates.iter() {
            repr.push_str(&format!(":{}", c.0));
        }
        for wb in self.pairs.iter() {
            repr.push_str(&format!("|{}", wb.frequency));
            for c in wb.ballot.iter() {
                repr.push_str(&format!(":{}", c.0));
            }
        }
        sha256::digest(repr.as_str())
    }

    /// The profile obtained by removing all the candidates that are not in
    /// `keep` from the ballots.
    ///
    /// Ballots that become identical are merged and ballots that become empty
    /// are dropped.
    pub fn restricted_to(&self, keep: &[Candidate]) -> Result<Profile, RuleError> {
        let kept: BTreeSet<Candidate> = keep
            .iter()
            .filter(|c| self.candidates.contains(c))
            .cloned()
            .collect();
        let filtered: Vec<(Ballot, u64)> = self
            .pairs
            .iter()
            .filter_map(|wb| {
                let ballot: Ballot = wb
                    .ballot
                    .iter()
                    .filter(|c| kept.contains(c))
                    .cloned()
                    .collect();
                if ballot.is_empty() {
                    None
                } else {
                    Some((ballot, wb.frequency))
                }
            })
            .collect();
        let candidates: Vec<Candidate> = kept.into_iter().collect();
        Profile::new(&aggregate(filtered), Some(&candidates[..]))
    }
}

/// Merges identical ballots by summing their frequencies.
pub(crate) fn aggregate<I>(ballots: I) -> Vec<WeightedBallot>
where
    I: IntoIterator<Item = (Ballot, u64)>,
{
    let mut merged: BTreeMap<Ballot, u64> = BTreeMap::new();
    for (ballot, count) in ballots {
        *merged.entry(ballot).or_insert(0) += count;
    }
    merged
        .into_iter()
        .filter(|(_, frequency)| *frequency > 0)
        .map(|(ballot, frequency)| WeightedBallot { frequency, ballot })
        .collect()
}

/// The zero-based position of a candidate in a ballot.
pub(crate) fn rank_of(ballot: &[Candidate], candidate: Candidate) -> Option<usize> {
    ballot.iter().position(|c| *c == candidate)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn reference_pairs() -> Vec<WeightedBallot> {
        vec![
            WeightedBallot::new(5, &[1, 2, 3]),
            WeightedBallot::new(6, &[3, 2, 1]),
            WeightedBallot::new(6, &[1, 3, 2]),
        ]
    }

    #[test]
    fn infers_candidates_and_counts_voters() {
        let p = Profile::new(&reference_pairs(), None).unwrap();
        assert_eq!(p.candidates(), &[Candidate(1), Candidate(2), Candidate(3)]);
        assert_eq!(p.total_voters(), 17);
        assert_eq!(p.pairs().len(), 3);
        assert_eq!(p.distortion_ratio(), 0.0);
    }

    #[test]
    fn rejects_duplicate_ballots() {
        let mut pairs = reference_pairs();
        pairs.push(WeightedBallot::new(2, &[1, 2, 3]));
        let res = Profile::new(&pairs, None);
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
    }

    #[test]
    fn rejects_unknown_candidate() {
        let cands = [Candidate(1), Candidate(2)];
        let res = Profile::new(&reference_pairs(), Some(&cands[..]));
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
    }

    #[test]
    fn rejects_zero_frequency_and_empty_ballots() {
        let res = Profile::new(&[WeightedBallot::new(0, &[1, 2])], None);
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
        let res = Profile::new(&[WeightedBallot::new(1, &[])], None);
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
        let res = Profile::new(&[WeightedBallot::new(1, &[1, 1])], None);
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
        let res = Profile::new(&[], None);
        assert!(matches!(res, Err(RuleError::InvalidProfile(_))));
    }

    #[test]
    fn declared_candidates_may_be_unranked() {
        let cands = [Candidate(1), Candidate(2), Candidate(3), Candidate(4)];
        let p = Profile::new(&[WeightedBallot::new(3, &[2, 1])], Some(&cands[..])).unwrap();
        assert_eq!(p.num_candidates(), 4);
        assert_eq!(p.distortion_ratio(), 0.5);
    }

    #[test]
    fn content_key_ignores_input_order() {
        let mut pairs = reference_pairs();
        let p1 = Profile::new(&pairs, None).unwrap();
        pairs.reverse();
        let p2 = Profile::new(&pairs, None).unwrap();
        assert_eq!(p1, p2);
        assert_eq!(p1.content_key(), p2.content_key());
        let p3 = Profile::new(&pairs[1..], None).unwrap();
        assert_ne!(p1.content_key(), p3.content_key());
    }

    #[test]
    fn restriction_merges_ballots() {
        let p = Profile::new(&reference_pairs(), None).unwrap();
        let r = p.restricted_to(&[Candidate(1), Candidate(2)]).unwrap();
        assert_eq!(r.num_candidates(), 2);
        // [1,2,3] and [1,3,2] both become [1,2].
        assert_eq!(
            r.pairs(),
            &[
                WeightedBallot::new(11, &[1, 2]),
                WeightedBallot::new(6, &[2, 1]),
            ]
        );
        assert_eq!(r.total_voters(), p.total_voters());
    }

    #[test]
    fn restriction_ignores_unknown_candidates() {
        let p = Profile::new(&reference_pairs(), None).unwrap();
        let r = p.restricted_to(&[Candidate(9), Candidate(2)]).unwrap();
        assert_eq!(r.candidates(), &[Candidate(2)]);
        assert_eq!(r.pairs(), &[WeightedBallot::new(17, &[2])]);
        let truncated = Profile::new(
            &[WeightedBallot::new(4, &[1]), WeightedBallot::new(3, &[2, 1])],
            None,
        )
        .unwrap();
        // [1] becomes empty and is dropped.
        let r = truncated.restricted_to(&[Candidate(2)]).unwrap();
        assert_eq!(r.pairs(), &[WeightedBallot::new(3, &[2])]);
        assert_eq!(r.total_voters(), 3);
    }
}
