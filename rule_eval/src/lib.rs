/*!
Scoring of candidates under social-choice rules, and measurement of how well
the ranking elected by a rule serves the voters.

The entry points are:
* [`build_profile`] (or [`builder::ProfileBuilder`]) to assemble a weighted
  profile of ballots;
* the [`Rule`] trait and the [`RuleRegistry`] of standard rules, including the
  exact [`KemenySolver`] and the [`StvTabulator`];
* [`evaluate`] to measure a rule against the ballots;
* [`generate`] and [`distort`] to synthesize profiles from a voter model.

```
use rule_eval::*;

let profile = build_profile(
    &[
        WeightedBallot::new(5, &[1, 2, 3]),
        WeightedBallot::new(6, &[3, 2, 1]),
        WeightedBallot::new(6, &[1, 3, 2]),
    ],
    None,
)?;
let registry = RuleRegistry::standard(&EngineRules::DEFAULT_RULES);
let copeland = registry.get("copeland").unwrap();
let res = evaluate(&profile, copeland.as_ref(), 1, &EngineRules::DEFAULT_RULES)?;
assert_eq!(res.ranking, vec![Candidate(1), Candidate(3), Candidate(2)]);
# Ok::<(), RuleError>(())
```

See the [manual] for the list of rules and their exact scoring laws.
*/

mod config;
mod evaluate;
mod generator;
mod kemeny;
mod pairwise;
mod profile;
mod rules;
mod stv;

pub mod builder;
pub mod manual;

pub use crate::config::*;
pub use crate::evaluate::{elected_ranking, evaluate, evaluate_ranking, oracle, voter_utility, OracleResult};
pub use crate::generator::{distort, generate, generate_distorted};
pub use crate::kemeny::{KemenyOutcome, KemenySolver};
pub use crate::pairwise::{net_preference, preference_count, PairwiseMatrix};
pub use crate::profile::Profile;
pub use crate::rules::*;
pub use crate::stv::{RoundTally, StvOutcome, StvTabulator};

/// Builds a profile from weighted ballots.
///
/// Arguments:
/// * `pairs` the weighted ballots. Two pairs may not share the same ballot.
/// * `candidates` the registered candidates. If not provided, the candidates
/// are inferred from the ballots.
pub fn build_profile(
    pairs: &[WeightedBallot],
    candidates: Option<&[Candidate]>,
) -> Result<Profile, RuleError> {
    Profile::new(pairs, candidates)
}

/// The score of one candidate under a rule.
pub fn score(profile: &Profile, rule: &dyn Rule, candidate: Candidate) -> Result<f64, RuleError> {
    rule.score(profile, candidate)
}
