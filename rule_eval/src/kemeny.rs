use log::{debug, info};

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, RwLock};

use crate::config::*;
use crate::profile::Profile;
use crate::rules::Rule;

/// The consensus ranking found by the exhaustive search.
#[derive(Eq, PartialEq, Debug, Clone)]
pub struct KemenyOutcome {
    /// All the candidates, best first.
    pub ranking: Vec<Candidate>,
    /// The weighted number of pairwise disagreements with the ballots.
    pub distance: u64,
}

type ScoreTable = Arc<Vec<(Candidate, f64)>>;

// Insertion-ordered so that the oldest table is evicted first.
#[derive(Default)]
struct ScoreCache {
    tables: HashMap<String, ScoreTable>,
    order: VecDeque<String>,
}

/// Exact Kemeny consensus, with a bounded memo of the score tables.
///
/// The search enumerates every permutation of the candidates, so it refuses
/// profiles with more than `kemeny_max_candidates` candidates.
///
/// The score tables are keyed by the content of the profile. Two threads may
/// compute the same table at the same time; both get the same result.
pub struct KemenySolver {
    max_candidates: usize,
    capacity: usize,
    cache: RwLock<ScoreCache>,
}

impl KemenySolver {
    pub fn new(rules: &EngineRules) -> KemenySolver {
        KemenySolver {
            max_candidates: rules.kemeny_max_candidates,
            capacity: rules.kemeny_cache_capacity,
            cache: RwLock::new(ScoreCache::default()),
        }
    }

    pub fn max_candidates(&self) -> usize {
        self.max_candidates
    }

    /// Finds the ranking with the smallest weighted Kendall tau distance to
    /// the ballots.
    ///
    /// When several rankings reach the minimum, the lexicographically
    /// smallest one (comparing candidate identifiers) is returned.
    pub fn solve(&self, profile: &Profile) -> Result<KemenyOutcome, RuleError> {
        let candidates = profile.candidates();
        let n = candidates.len();
        if n > self.max_candidates {
            return Err(RuleError::IntractableProfile {
                candidates: n,
                max: self.max_candidates,
            });
        }
        info!(
            "KemenySolver::solve: {} candidates, {} distinct ballots",
            n,
            profile.pairs().len()
        );

        let prefers = disagreement_matrix(profile);
        let mut perm: Vec<usize> = (0..n).collect();
        let mut best: Vec<usize> = perm.clone();
        let mut best_distance: u64 = ranking_distance(&prefers, &perm);
        let mut num_perms: u64 = 1;
        while next_permutation(&mut perm) {
            num_perms += 1;
            let d = ranking_distance(&prefers, &perm);
            // Strict comparison: the first ranking in lexicographic order wins ties.
            if d < best_distance {
                best_distance = d;
                best.copy_from_slice(&perm);
            }
        }
        debug!(
            "KemenySolver::solve: visited {} rankings, best distance {}",
            num_perms, best_distance
        );
        Ok(KemenyOutcome {
            ranking: best.iter().map(|idx| candidates[*idx]).collect(),
            distance: best_distance,
        })
    }

    /// The Kemeny score of every candidate: `C - position` in the consensus
    /// ranking. Reuses a previously computed table for the same profile.
    pub fn scores(&self, profile: &Profile) -> Result<ScoreTable, RuleError> {
        let key = profile.content_key();
        {
            let cache = self.cache.read().unwrap_or_else(|e| e.into_inner());
            if let Some(table) = cache.tables.get(&key) {
                debug!("KemenySolver::scores: cache hit for {}", key);
                return Ok(table.clone());
            }
        }

        let outcome = self.solve(profile)?;
        let n = outcome.ranking.len();
        let mut table: Vec<(Candidate, f64)> = outcome
            .ranking
            .iter()
            .enumerate()
            .map(|(pos, c)| (*c, (n - pos) as f64))
            .collect();
        table.sort_by_key(|(c, _)| *c);
        let table = Arc::new(table);

        if self.capacity > 0 {
            let mut cache = self.cache.write().unwrap_or_else(|e| e.into_inner());
            if !cache.tables.contains_key(&key) {
                while cache.order.len() >= self.capacity {
                    if let Some(old) = cache.order.pop_front() {
                        cache.tables.remove(&old);
                    }
                }
                cache.order.push_back(key.clone());
                cache.tables.insert(key, table.clone());
            }
        }
        Ok(table)
    }

    /// The number of score tables currently memoized.
    pub fn cached_tables(&self) -> usize {
        self.cache
            .read()
            .unwrap_or_else(|e| e.into_inner())
            .tables
            .len()
    }
}

impl Rule for KemenySolver {
    fn name(&self) -> String {
        "kemeny".to_string()
    }

    fn score(&self, profile: &Profile, candidate: Candidate) -> Result<f64, RuleError> {
        self.scores(profile)?
            .iter()
            .find(|(c, _)| *c == candidate)
            .map(|(_, s)| *s)
            .ok_or_else(|| RuleError::InvalidProfile(format!("unknown candidate {}", candidate)))
    }

    fn score_all(&self, profile: &Profile) -> Result<Vec<(Candidate, f64)>, RuleError> {
        Ok(self.scores(profile)?.as_ref().clone())
    }
}

/// `m[i][j]`: the weighted number of voters whose ballot orders candidate
/// `i` before candidate `j`.
///
/// A ranked candidate is ordered before every candidate missing from the
/// ballot. Two missing candidates are not ordered.
fn disagreement_matrix(profile: &Profile) -> Vec<Vec<u64>> {
    let candidates = profile.candidates();
    let n = candidates.len();
    let index: HashMap<Candidate, usize> = candidates
        .iter()
        .enumerate()
        .map(|(idx, c)| (*c, idx))
        .collect();
    let mut m = vec![vec![0u64; n]; n];
    for wb in profile.pairs().iter() {
        let positions: Vec<usize> = wb
            .ballot
            .iter()
            .filter_map(|c| index.get(c).cloned())
            .collect();
        let mut ranked = vec![false; n];
        for (pos, &i) in positions.iter().enumerate() {
            ranked[i] = true;
            for &j in positions[pos + 1..].iter() {
                m[i][j] += wb.frequency;
            }
        }
        for &i in positions.iter() {
            for (j, is_ranked) in ranked.iter().enumerate() {
                if !is_ranked {
                    m[i][j] += wb.frequency;
                }
            }
        }
    }
    m
}

/// The weighted number of disagreements between a ranking (of candidate
/// indices) and the ballots.
fn ranking_distance(prefers: &[Vec<u64>], ranking: &[usize]) -> u64 {
    let mut d = 0;
    for (pos, &above) in ranking.iter().enumerate() {
        for &below in ranking[pos + 1..].iter() {
            d += prefers[below][above];
        }
    }
    d
}

/// Rearranges `perm` into the next permutation in lexicographic order.
/// Returns false (and leaves `perm` sorted) after the last one.
pub(crate) fn next_permutation(perm: &mut [usize]) -> bool {
    let n = perm.len();
    if n < 2 {
        return false;
    }
    let mut i = n - 1;
    while i > 0 && perm[i - 1] >= perm[i] {
        i -= 1;
    }
    if i == 0 {
        perm.reverse();
        return false;
    }
    let mut j = n - 1;
    while perm[j] <= perm[i - 1] {
        j -= 1;
    }
    perm.swap(i - 1, j);
    perm[i..].reverse();
    true
}
