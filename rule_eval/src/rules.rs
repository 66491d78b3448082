use log::{debug, warn};

use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::*;
use crate::kemeny::KemenySolver;
use crate::pairwise::PairwiseMatrix;
use crate::profile::{rank_of, Profile};
use crate::stv::StvTabulator;

/// A voting rule: scores a candidate given a profile. Higher is better.
///
/// Rules must be deterministic and must not depend on anything else than
/// the profile and their own parameters.
pub trait Rule: Send + Sync {
    /// The name under which the rule is registered.
    fn name(&self) -> String;

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError>;

    /// Scores all the candidates of the profile, in candidate order.
    ///
    /// Rules that share work between candidates may override it.
    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        profile
            .candidates()
            .iter()
            .map(|c| self.score(profile, *c).map(|s| (*c, s)))
            .collect()
    }
}

/// Sum of the frequencies of a function of the rank, over the ballots that
/// rank the candidate.
fn positional_sum<F>(profile: &Profile, candidate: Candidate, weight: F) -> f64
where
    F: Fn(usize) -> f64,
{
    profile
        .pairs()
        .iter()
        .filter_map(|wb| rank_of(&wb.ballot, candidate).map(|r| wb.frequency as f64 * weight(r)))
        .sum()
}

pub struct Plurality;

impl Rule for Plurality {
    fn name(&self) -> String {
        "plurality".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        Ok(positional_sum(profile, candidate, |r| {
            if r == 0 {
                1.0
            } else {
                0.0
            }
        }))
    }
}

pub struct Borda;

impl Rule for Borda {
    fn name(&self) -> String {
        "borda".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        let top_score = profile.num_candidates() as f64 - 1.0;
        Ok(positional_sum(profile, candidate, |r| top_score - r as f64))
    }
}

/// Borda with a geometric decay: a rank `r` is worth `gamma^r`.
///
/// `gamma` must be in (0, 1]. With `gamma = 1` every ranked position is
/// worth the same, and a small `gamma` gives almost all the weight to the
/// first place.
pub struct BordaGamma {
    gamma: f64,
}

impl BordaGamma {
    /// Returns `None` if `gamma` is not in (0, 1].
    pub fn new(gamma: f64) -> Option<BordaGamma> {
        if gamma > 0.0 && gamma <= 1.0 {
            Some(BordaGamma { gamma })
        } else {
            warn!("BordaGamma: rejecting gamma {}, expected a value in (0, 1]", gamma);
            None
        }
    }

    pub fn gamma(&self) -> f64 {
        self.gamma
    }
}

impl Rule for BordaGamma {
    fn name(&self) -> String {
        format!("borda_gamma_{}", self.gamma)
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        Ok(positional_sum(profile, candidate, |r| self.gamma.powi(r as i32)))
    }
}

pub struct Dowdall;

impl Rule for Dowdall {
    fn name(&self) -> String {
        "dowdall".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        let top_score = profile.num_candidates() as f64 - 1.0;
        Ok(positional_sum(profile, candidate, |r| {
            (top_score - r as f64) / (r as f64 + 1.0)
        }))
    }
}

pub struct Veto;

impl Rule for Veto {
    fn name(&self) -> String {
        "veto".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        let num_candidates = profile.num_candidates();
        let vetoes: u64 = profile
            .pairs()
            .iter()
            .filter(|wb| {
                if wb.ballot.len() == num_candidates {
                    wb.ballot.last() == Some(&candidate)
                } else {
                    // On a truncated ballot, all the missing candidates share the last place.
                    !wb.ballot.contains(&candidate)
                }
            })
            .map(|wb| wb.frequency)
            .sum();
        Ok(-(vetoes as f64))
    }
}

/// The number of approved candidates at the top of each ballot.
#[derive(PartialEq, Debug, Clone, Copy)]
pub enum ApprovalSize {
    Fixed(usize),
    /// A percentage of the candidate count, rounded up, at least 2.
    Percentage(f64),
}

pub struct KApproval {
    pub size: ApprovalSize,
}

impl KApproval {
    fn k(&self, num_candidates: usize) -> usize {
        match self.size {
            ApprovalSize::Fixed(k) => k,
            ApprovalSize::Percentage(p) => {
                let k = (num_candidates as f64 * p / 100.0).ceil() as usize;
                k.max(2)
            }
        }
    }
}

impl Rule for KApproval {
    fn name(&self) -> String {
        match self.size {
            ApprovalSize::Fixed(k) => format!("k_approval_k_{}", k),
            ApprovalSize::Percentage(p) => format!("k_approval_pct_{}", p),
        }
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        let k = self.k(profile.num_candidates());
        Ok(positional_sum(profile, candidate, |r| {
            if r < k {
                1.0
            } else {
                0.0
            }
        }))
    }
}

/// Applies a pairwise law to every opponent of the candidate.
fn pairwise_scores<F>(profile: &Profile, law: F) -> Vec<(Candidate, f64)>
where
    F: Fn(&PairwiseMatrix, Candidate) -> f64,
{
    let m = PairwiseMatrix::new(profile);
    profile
        .candidates()
        .iter()
        .map(|c| (*c, law(&m, *c)))
        .collect()
}

fn lookup(scores: Vec<(Candidate, f64)>, candidate: Candidate) -> Result<f64, RuleError> {
    scores
        .into_iter()
        .find(|(c, _)| *c == candidate)
        .map(|(_, s)| s)
        .ok_or_else(|| RuleError::InvalidProfile(format!("unknown candidate {}", candidate)))
}

fn copeland_law(m: &PairwiseMatrix, candidate: Candidate) -> f64 {
    m.candidates()
        .iter()
        .map(|other| m.net(candidate, *other).signum() as f64)
        .sum()
}

fn maximin_law(m: &PairwiseMatrix, candidate: Candidate) -> f64 {
    m.candidates()
        .iter()
        .filter(|other| **other != candidate)
        .map(|other| {
            if m.net(candidate, *other) > 0 {
                m.count(candidate, *other)
            } else {
                0
            }
        })
        .min()
        .unwrap_or(0) as f64
}

fn simpson_law(m: &PairwiseMatrix, candidate: Candidate) -> f64 {
    m.candidates()
        .iter()
        .filter(|other| **other != candidate)
        .map(|other| m.net(candidate, *other))
        .min()
        .unwrap_or(0) as f64
}

/// Wins minus losses in the pairwise contests.
pub struct Copeland;

impl Rule for Copeland {
    fn name(&self) -> String {
        "copeland".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        lookup(self.score_all(profile)?, candidate)
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        Ok(pairwise_scores(profile, copeland_law))
    }
}

/// The weakest winning contest of the candidate, counted in voters. A lost
/// or tied contest counts as zero.
pub struct Maximin;

impl Rule for Maximin {
    fn name(&self) -> String {
        "maximin".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        lookup(self.score_all(profile)?, candidate)
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        Ok(pairwise_scores(profile, maximin_law))
    }
}

/// The smallest net margin of the candidate against any opponent.
pub struct Simpson;

impl Rule for Simpson {
    fn name(&self) -> String {
        "simpson".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        lookup(self.score_all(profile)?, candidate)
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        Ok(pairwise_scores(profile, simpson_law))
    }
}

/// Veto on heavily truncated profiles, Borda otherwise.
pub struct BordaVetoHybrid {
    pub threshold: f64,
}

impl Rule for BordaVetoHybrid {
    fn name(&self) -> String {
        "borda_veto_hybrid".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        if profile.distortion_ratio() >= self.threshold {
            Veto.score(profile, candidate)
        } else {
            Borda.score(profile, candidate)
        }
    }
}

/// Exact Kemeny on the best candidates according to Borda.
///
/// The candidates with the highest Borda scores, as many as the solver
/// accepts, are ranked by Kemeny consensus on the profile restricted to them. The other
/// candidates are placed below, in Borda order: the best of them scores -1,
/// the next one -2, and so on.
pub struct BordaKemenyHybrid {
    pub solver: Arc<KemenySolver>,
}

impl Rule for BordaKemenyHybrid {
    fn name(&self) -> String {
        "borda_kemeny_hybrid".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        lookup(self.score_all(profile)?, candidate)
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        let max_candidates = self.solver.max_candidates();
        if profile.num_candidates() <= max_candidates {
            return self.solver.score_all(profile);
        }
        let mut by_borda = Borda.score_all(profile)?;
        // Best first; ties favour the lowest identifier.
        by_borda.sort_by(|(c1, s1), (c2, s2)| s2.total_cmp(s1).then(c1.cmp(c2)));
        let (head, tail) = by_borda.split_at(max_candidates);
        let kept: Vec<Candidate> = head.iter().map(|(c, _)| *c).collect();
        debug!(
            "BordaKemenyHybrid: running Kemeny on {:?}, {} candidates left out",
            kept,
            tail.len()
        );
        let restricted = profile.restricted_to(&kept)?;
        let mut scores = self.solver.score_all(&restricted)?;
        for (idx, (c, _)) in tail.iter().enumerate() {
            scores.push((*c, -(idx as f64 + 1.0)));
        }
        scores.sort_by_key(|(c, _)| *c);
        Ok(scores)
    }
}

/// A rule that always returns the same ranking.
///
/// The first candidate of the ranking scores -1, the second -2, and so on.
/// Candidates missing from the ranking score below all the others.
pub struct RankingRule {
    pub ranking: Vec<Candidate>,
}

impl Rule for RankingRule {
    fn name(&self) -> String {
        let names: Vec<String> = self.ranking.iter().map(|c| c.to_string()).collect();
        format!("ranking_{}", names.join("_"))
    }

    fn score(&self, _profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        let pos = rank_of(&self.ranking, candidate).unwrap_or(self.ranking.len());
        Ok(-(pos as f64 + 1.0))
    }
}

/// Scores all the candidates of a profile with a rule.
pub fn score_all(profile: &Profile, rule: &dyn Rule) -> Result<Vec<(Candidate, f64)>, RuleError> {
    rule.score_all(profile)
}

/// An immutable collection of named rules.
pub struct RuleRegistry {
    rules: BTreeMap<String, Arc<dyn Rule>>,
}

impl RuleRegistry {
    /// Registers the given rules under their own names. A later rule with
    /// the same name replaces an earlier one.
    pub fn from_rules(rules: Vec<Arc<dyn Rule>>) -> RuleRegistry {
        RuleRegistry {
            rules: rules.into_iter().map(|r| (r.name(), r)).collect(),
        }
    }

    /// All the rules of the library, configured with the given rules.
    pub fn standard(config: &EngineRules) -> RuleRegistry {
        let solver = Arc::new(KemenySolver::new(config));
        let mut rules: Vec<Arc<dyn Rule>> = vec![
            Arc::new(Plurality),
            Arc::new(Borda),
            Arc::new(Dowdall),
            Arc::new(Veto),
            Arc::new(Copeland),
            Arc::new(Maximin),
            Arc::new(Simpson),
            Arc::new(BordaVetoHybrid {
                threshold: config.hybrid_distortion_threshold,
            }),
            solver.clone(),
            Arc::new(BordaKemenyHybrid { solver }),
            Arc::new(StvTabulator::new(config.stv_tiebreak)),
        ];
        for rule in [0.975, 0.75, 0.6, 0.25].into_iter().filter_map(BordaGamma::new) {
            rules.push(Arc::new(rule));
        }
        for k in [2, 3, 4, 5] {
            rules.push(Arc::new(KApproval {
                size: ApprovalSize::Fixed(k),
            }));
        }
        RuleRegistry::from_rules(rules)
    }

    pub fn get(&self, name: &str) -> Option<Arc<dyn Rule>> {
        self.rules.get(name).cloned()
    }

    pub fn names(&self) -> Vec<String> {
        self.rules.keys().cloned().collect()
    }

    pub fn len(&self) -> usize {
        self.rules.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }
}
