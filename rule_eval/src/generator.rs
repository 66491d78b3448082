use log::{debug, info, warn};
use rand::seq::SliceRandom;
use rand::Rng;
use rand_distr::{Distribution, Gamma, StandardNormal};

use crate::config::*;
use crate::profile::{aggregate, Profile};

/// Generates a profile from a voter model.
///
/// The candidates are numbered from 0. All the randomness comes from `rng`,
/// so the same seed always produces the same profile.
///
/// Some models can fail to sample (degenerate weights). The sampling is then
/// retried, up to `generation_max_attempts` times in total.
pub fn generate<R: Rng + ?Sized>(
    params: &GeneratorParams,
    rng: &mut R,
    rules: &EngineRules,
) -> Result<Profile, RuleError> {
    check_params(params)?;
    info!(
        "generate: model {:?}, {} voters, {} candidates",
        params.model, params.voters, params.candidates
    );
    let candidates: Vec<Candidate> = (0..params.candidates).map(Candidate).collect();

    for attempt in 1..=rules.generation_max_attempts {
        let sampled = match params.model {
            VoterModel::Random => Some(sample_random(params, &candidates, rng)),
            VoterModel::Spatial => sample_spatial(params, &candidates, rng),
            VoterModel::Dirichlet => sample_dirichlet(params, &candidates, rng)?,
        };
        match sampled {
            Some(ballots) => {
                let pairs = aggregate(ballots.into_iter().map(|b| (b, 1)));
                debug!(
                    "generate: attempt {}: {} distinct ballots",
                    attempt,
                    pairs.len()
                );
                return Profile::new(&pairs, Some(&candidates[..]));
            }
            None => {
                debug!("generate: attempt {} failed, resampling", attempt);
            }
        }
    }
    Err(RuleError::GenerationFailed {
        model: params.model,
        attempts: rules.generation_max_attempts,
    })
}

const DISTORTION_EPSILON: f64 = 1e-9;

/// Truncates every ballot to a common prefix length, and merges the ballots
/// that become identical.
///
/// The kept length is `C - floor(C * ratio)`, at least 1 and at most the
/// number of candidates `C`. A ratio outside of `[0, 1]` is clamped.
pub fn distort(profile: &Profile, ratio: f64) -> Result<Profile, RuleError> {
    let ratio = if (0.0..=1.0).contains(&ratio) {
        ratio
    } else {
        let clamped = if ratio.is_nan() {
            0.0
        } else {
            ratio.clamp(0.0, 1.0)
        };
        warn!(
            "distort: distortion ratio {} is out of range, using {}",
            ratio, clamped
        );
        clamped
    };
    let num_candidates = profile.num_candidates();
    // Counted in removed entries so that 1.0 - ratio does not round up.
    let removed = (num_candidates as f64 * ratio + DISTORTION_EPSILON).floor() as usize;
    let keep = num_candidates
        .saturating_sub(removed)
        .clamp(1, num_candidates.max(1));
    debug!("distort: ratio {}: keeping {} choices", ratio, keep);
    let truncated = profile
        .pairs()
        .iter()
        .map(|wb| (wb.ballot.iter().take(keep).cloned().collect(), wb.frequency));
    Profile::new(&aggregate(truncated), Some(profile.candidates()))
}

/// Generates a profile, then distorts it.
pub fn generate_distorted<R: Rng + ?Sized>(
    params: &GeneratorParams,
    ratio: f64,
    rng: &mut R,
    rules: &EngineRules,
) -> Result<Profile, RuleError> {
    let profile = generate(params, rng, rules)?;
    distort(&profile, ratio)
}

fn check_params(params: &GeneratorParams) -> Result<(), RuleError> {
    if params.voters == 0 {
        return Err(RuleError::InvalidProfile(
            "at least one voter is required".to_string(),
        ));
    }
    if params.candidates == 0 {
        return Err(RuleError::InvalidProfile(
            "at least one candidate is required".to_string(),
        ));
    }
    if params.model == VoterModel::Spatial && params.dimensions == 0 {
        return Err(RuleError::InvalidProfile(
            "the spatial model needs at least one dimension".to_string(),
        ));
    }
    if params.model == VoterModel::Dirichlet && !(params.alpha.is_finite() && params.alpha > 0.0) {
        return Err(RuleError::InvalidProfile(format!(
            "invalid dirichlet concentration: {}",
            params.alpha
        )));
    }
    Ok(())
}

fn sample_random<R: Rng + ?Sized>(
    params: &GeneratorParams,
    candidates: &[Candidate],
    rng: &mut R,
) -> Vec<Ballot> {
    (0..params.voters)
        .map(|_| {
            let mut ballot = candidates.to_vec();
            ballot.shuffle(rng);
            ballot
        })
        .collect()
}

fn sample_point<R: Rng + ?Sized>(dimensions: usize, rng: &mut R) -> Vec<f64> {
    (0..dimensions)
        .map(|_| rng.sample::<f64, _>(StandardNormal))
        .collect()
}

fn sample_spatial<R: Rng + ?Sized>(
    params: &GeneratorParams,
    candidates: &[Candidate],
    rng: &mut R,
) -> Option<Vec<Ballot>> {
    let positions: Vec<Vec<f64>> = candidates
        .iter()
        .map(|_| sample_point(params.dimensions, rng))
        .collect();
    let mut ballots = Vec::with_capacity(params.voters as usize);
    for _ in 0..params.voters {
        let voter = sample_point(params.dimensions, rng);
        let mut by_distance: Vec<(Candidate, f64)> = candidates
            .iter()
            .zip(positions.iter())
            .map(|(c, pos)| {
                let d2: f64 = pos.iter().zip(voter.iter()).map(|(x, y)| (x - y) * (x - y)).sum();
                (*c, d2)
            })
            .collect();
        if by_distance.iter().any(|(_, d2)| !d2.is_finite()) {
            return None;
        }
        by_distance.sort_by(|(c1, d1), (c2, d2)| d1.total_cmp(d2).then(c1.cmp(c2)));
        ballots.push(by_distance.into_iter().map(|(c, _)| c).collect());
    }
    Some(ballots)
}

/// Draws a popularity vector from a symmetric Dirichlet distribution, then
/// samples each ballot from it without replacement (Plackett-Luce).
fn sample_dirichlet<R: Rng + ?Sized>(
    params: &GeneratorParams,
    candidates: &[Candidate],
    rng: &mut R,
) -> Result<Option<Vec<Ballot>>, RuleError> {
    let gamma = Gamma::new(params.alpha, 1.0).map_err(|e| {
        RuleError::InvalidProfile(format!("invalid dirichlet concentration: {}", e))
    })?;
    let draws: Vec<f64> = candidates.iter().map(|_| gamma.sample(rng)).collect();
    let total: f64 = draws.iter().sum();
    if !total.is_finite() || total <= 0.0 {
        debug!("sample_dirichlet: degenerate popularity vector {:?}", draws);
        return Ok(None);
    }
    let popularity: Vec<f64> = draws.iter().map(|g| g / total).collect();

    let mut ballots = Vec::with_capacity(params.voters as usize);
    for _ in 0..params.voters {
        let mut remaining: Vec<(Candidate, f64)> =
            candidates.iter().cloned().zip(popularity.iter().cloned()).collect();
        let mut ballot: Ballot = Vec::with_capacity(candidates.len());
        while !remaining.is_empty() {
            let mass: f64 = remaining.iter().map(|(_, w)| *w).sum();
            if mass <= 0.0 {
                // Only zero weights are left: they come in a uniform order.
                let mut rest: Vec<Candidate> = remaining.iter().map(|(c, _)| *c).collect();
                rest.shuffle(rng);
                ballot.extend(rest);
                break;
            }
            let mut target = rng.gen::<f64>() * mass;
            let mut picked = remaining.len() - 1;
            for (idx, (_, w)) in remaining.iter().enumerate() {
                if *w > 0.0 && target < *w {
                    picked = idx;
                    break;
                }
                target -= *w;
            }
            // Rounding may run past the end: fall back to the last positive weight.
            if remaining[picked].1 <= 0.0 {
                if let Some(idx) = remaining.iter().rposition(|(_, w)| *w > 0.0) {
                    picked = idx;
                }
            }
            ballot.push(remaining.remove(picked).0);
        }
        ballots.push(ballot);
    }
    Ok(Some(ballots))
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;

    #[test]
    fn generates_complete_ballots() {
        let rules = EngineRules::DEFAULT_RULES;
        for model in [VoterModel::Random, VoterModel::Spatial, VoterModel::Dirichlet] {
            let mut rng = StdRng::seed_from_u64(42);
            let params = GeneratorParams::new(model, 50, 4);
            let p = generate(&params, &mut rng, &rules).unwrap();
            assert_eq!(p.total_voters(), 50);
            assert_eq!(p.num_candidates(), 4);
            assert_eq!(p.distortion_ratio(), 0.0);
            assert!(p.pairs().iter().all(|wb| wb.ballot.len() == 4));
        }
    }

    #[test]
    fn same_seed_same_profile() {
        let rules = EngineRules::DEFAULT_RULES;
        let params = GeneratorParams::new(VoterModel::Spatial, 30, 5);
        let p1 = generate(&params, &mut StdRng::seed_from_u64(7), &rules).unwrap();
        let p2 = generate(&params, &mut StdRng::seed_from_u64(7), &rules).unwrap();
        assert_eq!(p1, p2);
    }

    #[test]
    fn identical_ballots_are_merged() {
        let rules = EngineRules::DEFAULT_RULES;
        let params = GeneratorParams::new(VoterModel::Random, 100, 2);
        let p = generate(&params, &mut StdRng::seed_from_u64(1), &rules).unwrap();
        assert!(p.pairs().len() <= 2);
        assert_eq!(p.total_voters(), 100);
    }

    #[test]
    fn rejects_empty_requests() {
        let rules = EngineRules::DEFAULT_RULES;
        let mut rng = StdRng::seed_from_u64(0);
        let params = GeneratorParams::new(VoterModel::Random, 0, 3);
        assert!(matches!(
            generate(&params, &mut rng, &rules),
            Err(RuleError::InvalidProfile(_))
        ));
        let params = GeneratorParams {
            alpha: -1.0,
            ..GeneratorParams::new(VoterModel::Dirichlet, 3, 3)
        };
        assert!(matches!(
            generate(&params, &mut rng, &rules),
            Err(RuleError::InvalidProfile(_))
        ));
    }

    #[test]
    fn gives_up_after_the_last_attempt() {
        let rules = EngineRules {
            generation_max_attempts: 0,
            ..EngineRules::DEFAULT_RULES
        };
        let params = GeneratorParams::new(VoterModel::Random, 3, 3);
        assert_eq!(
            generate(&params, &mut StdRng::seed_from_u64(0), &rules),
            Err(RuleError::GenerationFailed {
                model: VoterModel::Random,
                attempts: 0
            })
        );
    }

    #[test]
    fn distortion_truncates_and_merges() {
        let p = Profile::new(
            &[
                WeightedBallot::new(5, &[1, 2, 3, 4]),
                WeightedBallot::new(6, &[1, 2, 4, 3]),
                WeightedBallot::new(2, &[3, 2, 1, 4]),
            ],
            None,
        )
        .unwrap();
        assert_eq!(distort(&p, 0.0).unwrap(), p);
        let d = distort(&p, 0.5).unwrap();
        assert_eq!(
            d.pairs(),
            &[WeightedBallot::new(11, &[1, 2]), WeightedBallot::new(2, &[3, 2])]
        );
        assert_eq!(d.num_candidates(), 4);
        assert_eq!(d.total_voters(), p.total_voters());
        // Every ballot keeps at least its first choice.
        let d = distort(&p, 1.0).unwrap();
        assert!(d.pairs().iter().all(|wb| wb.ballot.len() == 1));
    }

    #[test]
    fn distortion_keeps_the_requested_length() {
        let ballot: Vec<u32> = (0..10).collect();
        let p = Profile::new(&[WeightedBallot::new(1, &ballot)], None).unwrap();
        for (ratio, kept) in [(0.6, 4), (0.7, 3), (0.9, 1), (0.95, 1), (0.05, 10)] {
            let d = distort(&p, ratio).unwrap();
            assert_eq!(d.pairs()[0].ballot.len(), kept, "ratio {}", ratio);
        }
        assert_eq!(distort(&p, 0.7).unwrap().distortion_ratio(), 1.0 - 3.0 / 10.0);

        let ballot: Vec<u32> = (0..100).collect();
        let p = Profile::new(&[WeightedBallot::new(1, &ballot)], None).unwrap();
        assert_eq!(distort(&p, 0.7).unwrap().pairs()[0].ballot.len(), 30);
        assert_eq!(distort(&p, 0.3).unwrap().pairs()[0].ballot.len(), 70);
    }

    #[test]
    fn distortion_clamps_the_ratio() {
        let p = Profile::new(&[WeightedBallot::new(1, &[1, 2, 3, 4])], None).unwrap();
        assert_eq!(distort(&p, -3.0).unwrap(), p);
        assert_eq!(distort(&p, 7.0).unwrap(), distort(&p, 1.0).unwrap());
    }

    #[test]
    fn generates_distorted_profiles() {
        let rules = EngineRules::DEFAULT_RULES;
        let params = GeneratorParams::new(VoterModel::Dirichlet, 40, 4);
        let p = generate_distorted(&params, 0.5, &mut StdRng::seed_from_u64(3), &rules).unwrap();
        assert_eq!(p.total_voters(), 40);
        assert!(p.pairs().iter().all(|wb| wb.ballot.len() == 2));
        assert_eq!(p.distortion_ratio(), 0.5);
    }
}
