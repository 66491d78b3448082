use log::{debug, info};

use std::collections::{HashMap, HashSet};

use crate::config::*;
use crate::profile::Profile;
use crate::rules::Rule;

type RoundId = u32;

/// Statistics for one elimination round.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct RoundTally {
    pub round: RoundId,
    /// The tally of every live candidate at the start of the round.
    pub tally: Vec<(Candidate, u64)>,
    pub eliminated: Candidate,
    /// Whether several candidates shared the lowest tally.
    pub tiebreak: bool,
}

#[derive(Eq, PartialEq, Debug, Clone)]
pub struct StvOutcome {
    /// The candidates, in the order in which they were eliminated.
    pub elimination_order: Vec<Candidate>,
    /// The last candidate standing.
    pub winner: Candidate,
    pub rounds: Vec<RoundTally>,
}

impl StvOutcome {
    /// All the candidates, winner first.
    pub fn ranking(&self) -> Vec<Candidate> {
        let mut res = vec![self.winner];
        res.extend(self.elimination_order.iter().rev());
        res
    }
}

/// Sequential elimination of the candidate with the lowest tally, until a
/// single candidate remains.
///
/// A candidate eliminated in round `r` (starting at 1) scores `r`, the last
/// candidate standing scores the number of candidates.
pub struct StvTabulator {
    tiebreak: TieBreakMode,
}

impl StvTabulator {
    pub fn new(tiebreak: TieBreakMode) -> StvTabulator {
        StvTabulator { tiebreak }
    }

    pub fn tabulate(&self, profile: &Profile) -> Result<StvOutcome, RuleError> {
        info!(
            "StvTabulator::tabulate: {} candidates, {} voters, tiebreak: {:?}",
            profile.num_candidates(),
            profile.total_voters(),
            self.tiebreak
        );
        self.run_rounds(profile, profile.candidates().to_vec())
    }

    /// Runs the elimination rounds from the given live candidates.
    fn run_rounds(
        &self,
        profile: &Profile,
        mut live: Vec<Candidate>,
    ) -> Result<StvOutcome, RuleError> {
        let mut rounds: Vec<RoundTally> = Vec::new();

        while live.len() > 1 {
            let round_id = (rounds.len() + 1) as RoundId;
            let tally = compute_tally(profile, &live);
            debug!("round {}: tally: {:?}", round_id, tally);
            if tally.iter().all(|(_, vc)| *vc == 0) {
                return Err(RuleError::DegenerateProfile { round: round_id });
            }

            let (eliminated, tiebreak) = self.find_eliminated_candidate(&tally, round_id)?;
            debug!(
                "round {}: eliminated: {} (tiebreak: {})",
                round_id, eliminated, tiebreak
            );
            live.retain(|c| *c != eliminated);
            rounds.push(RoundTally {
                round: round_id,
                tally,
                eliminated,
                tiebreak,
            });
        }

        let winner = *live.first().ok_or_else(|| {
            RuleError::InvalidProfile("the profile has no candidate".to_string())
        })?;
        info!("StvTabulator::tabulate: winner: {}", winner);
        Ok(StvOutcome {
            elimination_order: rounds.iter().map(|r| r.eliminated).collect(),
            winner,
            rounds,
        })
    }

    fn find_eliminated_candidate(
        &self,
        tally: &[(Candidate, u64)],
        round_id: RoundId,
    ) -> Result<(Candidate, bool), RuleError> {
        let min_count = tally
            .iter()
            .map(|(_, vc)| *vc)
            .min()
            .ok_or(RuleError::DegenerateProfile { round: round_id })?;
        let all_smallest: Vec<Candidate> = tally
            .iter()
            .filter_map(|(c, vc)| if *vc == min_count { Some(*c) } else { None })
            .collect();
        debug!("round {}: all_smallest: {:?}", round_id, all_smallest);

        // No tiebreak, the logic below is not relevant.
        if let [single] = all_smallest.as_slice() {
            return Ok((*single, false));
        }

        let sorted_candidates: Vec<Candidate> = match self.tiebreak {
            TieBreakMode::LowestCandidate => {
                let mut res = all_smallest;
                res.sort();
                res
            }
            TieBreakMode::Random(seed) => candidate_permutation_crypto(&all_smallest, seed, round_id),
        };
        sorted_candidates
            .first()
            .map(|c| (*c, true))
            .ok_or(RuleError::DegenerateProfile { round: round_id })
    }
}

/// The weighted number of ballots whose highest live choice is each live
/// candidate. Exhausted ballots are not counted.
fn compute_tally(profile: &Profile, live: &[Candidate]) -> Vec<(Candidate, u64)> {
    let still_valid: HashSet<Candidate> = live.iter().cloned().collect();
    let mut tally: HashMap<Candidate, u64> = live.iter().map(|c| (*c, 0)).collect();
    for wb in profile.pairs().iter() {
        if let Some(first_valid) = wb.ballot.iter().find(|c| still_valid.contains(c)) {
            if let Some(vc) = tally.get_mut(first_valid) {
                *vc += wb.frequency;
            }
        }
    }
    live.iter()
        .map(|c| (*c, tally.get(c).cloned().unwrap_or(0)))
        .collect()
}

/// Generates a "random" permutation of the candidates. Random in this context
/// means hard to guess in advance, and reproducible given the seed.
/// The candidates are ordered by a SHA-256 digest of the seed, the round and
/// the candidate.
fn candidate_permutation_crypto(
    candidates: &[Candidate],
    seed: u32,
    num_round: RoundId,
) -> Vec<Candidate> {
    let mut data: Vec<(Candidate, String)> = candidates
        .iter()
        .map(|c| {
            let key = format!("{:08}{:08}{}", seed, num_round, c.0);
            (*c, sha256::digest(key.as_str()))
        })
        .collect();
    data.sort_by(|a, b| a.1.cmp(&b.1).then(a.0.cmp(&b.0)));
    data.iter().map(|p| p.0).collect()
}

impl Rule for StvTabulator {
    fn name(&self) -> String {
        "stv".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        self.score_all(profile)?
            .into_iter()
            .find(|(c, _)| *c == candidate)
            .map(|(_, s)| s)
            .ok_or_else(|| RuleError::InvalidProfile(format!("unknown candidate {}", candidate)))
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        let outcome = self.tabulate(profile)?;
        let mut scores: Vec<(Candidate, f64)> = outcome
            .rounds
            .iter()
            .map(|r| (r.eliminated, r.round as f64))
            .collect();
        scores.push((outcome.winner, profile.num_candidates() as f64));
        scores.sort_by_key(|(c, _)| *c);
        Ok(scores)
    }
}
