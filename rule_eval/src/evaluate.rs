use log::{debug, info};

use crate::config::*;
use crate::kemeny::next_permutation;
use crate::profile::{rank_of, Profile};
use crate::rules::Rule;

/// Scores all the candidates with the rule and sorts them, best first.
///
/// Candidates with the same score are ordered by increasing identifier.
pub fn elected_ranking(profile: &Profile, rule: &dyn Rule) -> Result<Vec<Candidate>, RuleError> {
    let mut scores = rule.score_all(profile)?;
    debug!("elected_ranking: {}: scores: {:?}", rule.name(), scores);
    scores.sort_by(|(c1, s1), (c2, s2)| s2.total_cmp(s1).then(c1.cmp(c2)));
    Ok(scores.into_iter().map(|(c, _)| c).collect())
}

/// The utility of one voter for an elected ranking.
///
/// Returns `(top1, topn)`, both in `[0, 1]`:
/// * `top1` measures the elected winner against the ballot, following `scheme`;
/// * `topn` is the fraction of the first `n` choices of the voter that are in
/// the first `n` elected candidates, where `n` is `topn` capped at the number
/// of elected candidates.
pub fn voter_utility(
    ballot: &[Candidate],
    elected: &[Candidate],
    topn: usize,
    scheme: UtilityScheme,
) -> (f64, f64) {
    let top1 = match (elected.first(), scheme) {
        (None, _) => 0.0,
        (Some(winner), UtilityScheme::FirstChoice) => {
            if ballot.first() == Some(winner) {
                1.0
            } else {
                0.0
            }
        }
        (Some(winner), UtilityScheme::ReciprocalRank) => match rank_of(ballot, *winner) {
            Some(pos) => 1.0 / (1.0 + pos as f64),
            None => 0.0,
        },
    };

    let n = topn.min(elected.len());
    if n == 0 {
        return (top1, 0.0);
    }
    let elected_top = &elected[..n];
    let hits = ballot
        .iter()
        .take(n)
        .filter(|c| elected_top.contains(c))
        .count();
    (top1, hits as f64 / n as f64)
}

/// The frequency-weighted average utility of the voters for a ranking.
pub fn evaluate_ranking(
    profile: &Profile,
    ranking: &[Candidate],
    topn: usize,
    scheme: UtilityScheme,
) -> (f64, f64) {
    let mut top_total = 0.0;
    let mut topn_total = 0.0;
    for wb in profile.pairs().iter() {
        let (u1, un) = voter_utility(&wb.ballot, ranking, topn, scheme);
        top_total += wb.frequency as f64 * u1;
        topn_total += wb.frequency as f64 * un;
    }
    let voters = profile.total_voters() as f64;
    (top_total / voters, topn_total / voters)
}

/// Evaluates a rule on a profile: the ranking elected by the rule, and the
/// average utility of the voters for it.
pub fn evaluate(
    profile: &Profile,
    rule: &dyn Rule,
    topn: usize,
    rules: &EngineRules,
) -> Result<Evaluation, RuleError> {
    if topn == 0 {
        return Err(RuleError::InvalidProfile(
            "topn must be at least 1".to_string(),
        ));
    }
    info!(
        "evaluate: rule {} on {} voters, {} candidates, topn {}",
        rule.name(),
        profile.total_voters(),
        profile.num_candidates(),
        topn
    );
    let ranking = elected_ranking(profile, rule)?;
    let (top, topn) = evaluate_ranking(profile, &ranking, topn, rules.utility_scheme);
    debug!(
        "evaluate: {}: ranking {:?}, top {}, topn {}",
        rule.name(),
        ranking,
        top,
        topn
    );
    Ok(Evaluation { top, topn, ranking })
}

/// The best rankings that any rule could elect for a profile.
#[derive(PartialEq, Debug, Clone)]
pub struct OracleResult {
    pub best_top: Vec<Candidate>,
    pub best_top_score: f64,
    pub best_topn: Vec<Candidate>,
    pub best_topn_score: f64,
}

/// Tries every ranking of the candidates and keeps the ones with the best
/// top-1 and top-n utilities. The first ranking found (in lexicographic
/// order) wins a tie.
///
/// This is an upper bound for the utility of any rule on this profile. It is
/// limited to `kemeny_max_candidates` candidates.
pub fn oracle(profile: &Profile, topn: usize, rules: &EngineRules) -> Result<OracleResult, RuleError> {
    let candidates = profile.candidates();
    let n = candidates.len();
    if n > rules.kemeny_max_candidates {
        return Err(RuleError::IntractableProfile {
            candidates: n,
            max: rules.kemeny_max_candidates,
        });
    }
    if topn == 0 {
        return Err(RuleError::InvalidProfile(
            "topn must be at least 1".to_string(),
        ));
    }
    info!("oracle: searching {} candidates, topn {}", n, topn);

    let to_ranking = |perm: &[usize]| -> Vec<Candidate> { perm.iter().map(|i| candidates[*i]).collect() };
    let mut perm: Vec<usize> = (0..n).collect();
    let first = to_ranking(&perm);
    let (top, tn) = evaluate_ranking(profile, &first, topn, rules.utility_scheme);
    let mut res = OracleResult {
        best_top: first.clone(),
        best_top_score: top,
        best_topn: first,
        best_topn_score: tn,
    };
    while next_permutation(&mut perm) {
        let ranking = to_ranking(&perm);
        let (top, tn) = evaluate_ranking(profile, &ranking, topn, rules.utility_scheme);
        if top > res.best_top_score {
            res.best_top_score = top;
            res.best_top = ranking.clone();
        }
        if tn > res.best_topn_score {
            res.best_topn_score = tn;
            res.best_topn = ranking;
        }
    }
    debug!("oracle: {:?}", res);
    Ok(res)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::rules::{Copeland, Plurality, RankingRule};

    fn c(ids: &[u32]) -> Vec<Candidate> {
        ids.iter().map(|i| Candidate(*i)).collect()
    }

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
    fn voter_utility_first_choice() {
        let ballot = c(&[1, 2, 3, 4, 5]);
        let elected = c(&[3, 1, 5, 2, 4]);
        let (top, topn) = voter_utility(&ballot, &elected, 3, UtilityScheme::FirstChoice);
        assert_eq!(top, 0.0);
        // 1 and 3 are among the first three elected.
        assert!((topn - 2.0 / 3.0).abs() < 1e-12);
        let (top, topn) = voter_utility(&ballot, &c(&[1, 2, 3, 4, 5]), 3, UtilityScheme::FirstChoice);
        assert_eq!((top, topn), (1.0, 1.0));
    }

    #[test]
    fn voter_utility_reciprocal_rank() {
        let ballot = c(&[1, 2, 3]);
        let (top, _) = voter_utility(&ballot, &c(&[3, 1, 2]), 1, UtilityScheme::ReciprocalRank);
        assert!((top - 1.0 / 3.0).abs() < 1e-12);
        let (top, _) = voter_utility(&c(&[1]), &c(&[3, 1, 2]), 1, UtilityScheme::ReciprocalRank);
        assert_eq!(top, 0.0);
    }

    #[test]
    fn voter_utility_caps_topn() {
        let (_, topn) = voter_utility(&c(&[2]), &c(&[2, 1]), 10, UtilityScheme::FirstChoice);
        assert_eq!(topn, 0.5);
    }

    #[test]
    fn plurality_end_to_end() {
        let p = reference_profile();
        let res = evaluate(&p, &Plurality, 1, &EngineRules::DEFAULT_RULES).unwrap();
        assert_eq!(res.ranking, c(&[1, 3, 2]));
        // Candidate 1 is the first choice of 11 voters out of 17.
        assert!((res.top - 11.0 / 17.0).abs() < 1e-12);
        assert!((res.topn - 11.0 / 17.0).abs() < 1e-12);
    }

    #[test]
    fn copeland_end_to_end() {
        let p = reference_profile();
        let first = evaluate(&p, &Copeland, 1, &EngineRules::DEFAULT_RULES).unwrap();
        let second = evaluate(&p, &Copeland, 1, &EngineRules::DEFAULT_RULES).unwrap();
        assert_eq!(first, second);
        assert!(first.top >= 0.0 && first.top <= 1.0);
        assert_eq!(first.ranking, c(&[1, 3, 2]));
    }

    #[test]
    fn ties_in_scores_keep_candidate_order() {
        let p = Profile::new(
            &[WeightedBallot::new(1, &[2, 1]), WeightedBallot::new(1, &[1, 2])],
            None,
        )
        .unwrap();
        assert_eq!(elected_ranking(&p, &Plurality).unwrap(), c(&[1, 2]));
    }

    #[test]
    fn rejects_zero_topn() {
        let p = reference_profile();
        assert!(evaluate(&p, &Plurality, 0, &EngineRules::DEFAULT_RULES).is_err());
    }

    #[test]
    fn oracle_bounds_every_rule() {
        let p = reference_profile();
        let rules = EngineRules::DEFAULT_RULES;
        let best = oracle(&p, 2, &rules).unwrap();
        assert_eq!(best.best_top, c(&[1, 2, 3]));
        assert!((best.best_top_score - 11.0 / 17.0).abs() < 1e-12);
        let fixed = RankingRule {
            ranking: best.best_topn.clone(),
        };
        let res = evaluate(&p, &fixed, 2, &rules).unwrap();
        assert_eq!(res.ranking, best.best_topn);
        assert_eq!(res.topn, best.best_topn_score);
        let plurality = evaluate(&p, &Plurality, 2, &rules).unwrap();
        assert!(plurality.topn <= best.best_topn_score);
    }
}
