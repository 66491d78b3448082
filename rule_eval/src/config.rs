// ********* Input data structures ***********

use std::error::Error;
use std::fmt::Display;

/// A candidate of an election.
///
/// Candidates are opaque identifiers. The numeric value is only used as a
/// deterministic key when ties must be broken.
#[derive(Eq, PartialEq, Debug, Clone, Copy, Hash, Ord, PartialOrd)]
pub struct Candidate(pub u32);

impl Display for Candidate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The ranked choices of a voter, best first.
///
/// A ballot may be shorter than the number of candidates. The candidates
/// that do not appear are considered worse than all the candidates that do.
pub type Ballot = Vec<Candidate>;

/// A ballot, with the number of voters who cast it.
#[derive(Eq, PartialEq, Debug, Clone, Hash)]
pub struct WeightedBallot {
    pub frequency: u64,
    pub ballot: Ballot,
}

impl WeightedBallot {
    pub fn new(frequency: u64, ballot: &[u32]) -> WeightedBallot {
        WeightedBallot {
            frequency,
            ballot: ballot.iter().map(|c| Candidate(*c)).collect(),
        }
    }
}

// ******** Output data structures *********

/// The outcome of evaluating a rule against a profile.
#[derive(PartialEq, Debug, Clone)]
pub struct Evaluation {
    /// Weighted average of the top-1 utility of the voters.
    pub top: f64,
    /// Weighted average of the top-n utility of the voters.
    pub topn: f64,
    /// The elected ranking, best candidate first.
    pub ranking: Vec<Candidate>,
}

/// Errors that prevent a rule or a generator from completing successfully.
#[derive(PartialEq, Debug, Clone)]
pub enum RuleError {
    /// The input data does not describe a valid profile.
    InvalidProfile(String),
    /// Too many candidates for an exhaustive search.
    IntractableProfile { candidates: usize, max: usize },
    /// The STV tabulation could not compute a tally.
    DegenerateProfile { round: u32 },
    /// The voter model did not produce a profile.
    GenerationFailed { model: VoterModel, attempts: u32 },
}

impl Error for RuleError {}

impl Display for RuleError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RuleError::InvalidProfile(msg) => write!(f, "invalid profile: {}", msg),
            RuleError::IntractableProfile { candidates, max } => write!(
                f,
                "intractable profile: {} candidates, exhaustive search supports at most {}",
                candidates, max
            ),
            RuleError::DegenerateProfile { round } => write!(
                f,
                "degenerate profile: no live candidate has any vote in round {}",
                round
            ),
            RuleError::GenerationFailed { model, attempts } => write!(
                f,
                "generation failed: model {:?} did not produce a profile after {} attempts",
                model, attempts
            ),
        }
    }
}

// ********* Configuration **********

/// How to break a tie between the candidates with the lowest tally in STV.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum TieBreakMode {
    /// Eliminates the candidate with the lowest identifier.
    LowestCandidate,
    /// Eliminates a candidate picked by a keyed hash of the seed, the round
    /// and the candidates. The same seed always gives the same outcome.
    Random(u32),
}

/// How the utility of a voter for the elected winner is measured.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum UtilityScheme {
    /// 1 if the winner is the first choice of the voter, 0 otherwise.
    FirstChoice,
    /// 1 / (1 + position of the winner in the ballot), 0 if not ranked.
    ReciprocalRank,
}

/// The voter models known to the generator.
#[derive(Eq, PartialEq, Debug, Clone, Copy)]
pub enum VoterModel {
    /// Every voter casts a uniformly random permutation.
    Random,
    /// Voters rank the candidates by their distance in a latent space.
    Spatial,
    /// Voters sample ballots from a Dirichlet-distributed popularity vector.
    Dirichlet,
}

#[derive(PartialEq, Debug, Clone)]
pub struct GeneratorParams {
    pub model: VoterModel,
    pub voters: u32,
    pub candidates: u32,
    /// Number of dimensions of the latent space (spatial model).
    pub dimensions: usize,
    /// Concentration of the symmetric Dirichlet prior (dirichlet model).
    pub alpha: f64,
}

impl GeneratorParams {
    pub fn new(model: VoterModel, voters: u32, candidates: u32) -> GeneratorParams {
        GeneratorParams {
            model,
            voters,
            candidates,
            dimensions: 2,
            alpha: 1.0,
        }
    }
}

#[derive(PartialEq, Debug, Clone)]
pub struct EngineRules {
    pub stv_tiebreak: TieBreakMode,
    /// The largest candidate count accepted by the exhaustive searches.
    pub kemeny_max_candidates: usize,
    /// The number of Kemeny score tables kept in memory.
    pub kemeny_cache_capacity: usize,
    pub utility_scheme: UtilityScheme,
    /// Above this distortion ratio, the Borda/Veto hybrid switches to Veto.
    pub hybrid_distortion_threshold: f64,
    pub generation_max_attempts: u32,
}

impl EngineRules {
    pub const DEFAULT_RULES: EngineRules = EngineRules {
        stv_tiebreak: TieBreakMode::LowestCandidate,
        kemeny_max_candidates: 9,
        kemeny_cache_capacity: 64,
        utility_scheme: UtilityScheme::FirstChoice,
        hybrid_distortion_threshold: 0.8,
        generation_max_attempts: 10,
    };
}

impl Default for EngineRules {
    fn default() -> Self {
        EngineRules::DEFAULT_RULES
    }
}
