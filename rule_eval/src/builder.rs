pub use crate::config::*;
use crate::profile::{aggregate, Profile};

/// A builder for adding ballots.
///
/// Repeated ballots are merged when the profile is built, so ballots can be
/// added one voter at a time.
///
/// ```
/// pub use rule_eval::builder::ProfileBuilder;
/// # use rule_eval::RuleError;
///
/// let mut builder = ProfileBuilder::new().candidates(&[1, 2, 3])?;
///
/// builder.add_ballot_simple(&[1, 2, 3])?;
/// builder.add_ballot_simple(&[1, 2, 3])?;
/// builder.add_ballot(&[3, 2], 4)?;
///
/// let profile = builder.build()?;
/// assert_eq!(profile.total_voters(), 6);
/// assert_eq!(profile.pairs().len(), 2);
/// # Ok::<(), RuleError>(())
/// ```
#[derive(Default)]
pub struct ProfileBuilder {
    pub(crate) _candidates: Option<Vec<Candidate>>,
    pub(crate) _ballots: Vec<(Ballot, u64)>,
}

impl ProfileBuilder {
    pub fn new() -> ProfileBuilder {
        ProfileBuilder::default()
    }

    /// Registers the candidates. Candidates that receive no vote are still
    /// part of the profile.
    pub fn candidates(self, cands: &[u32]) -> Result<ProfileBuilder, RuleError> {
        Ok(ProfileBuilder {
            _candidates: Some(cands.iter().map(|c| Candidate(*c)).collect()),
            _ballots: self._ballots,
        })
    }

    /// Adds the ballot of a single voter.
    pub fn add_ballot_simple(&mut self, ballot: &[u32]) -> Result<(), RuleError> {
        self.add_ballot(ballot, 1)
    }

    /// Adds a ballot, cast by `count` voters.
    ///
    /// The ballot itself is checked when the profile is built.
    pub fn add_ballot(&mut self, ballot: &[u32], count: u64) -> Result<(), RuleError> {
        if count == 0 {
            return Err(RuleError::InvalidProfile(format!(
                "ballot {:?} has a zero count",
                ballot
            )));
        }
        self._ballots
            .push((ballot.iter().map(|c| Candidate(*c)).collect(), count));
        Ok(())
    }

    pub fn build(&self) -> Result<Profile, RuleError> {
        let pairs = aggregate(self._ballots.iter().cloned());
        Profile::new(&pairs, self._candidates.as_deref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_repeated_ballots() {
        let mut builder = ProfileBuilder::new();
        builder.add_ballot(&[1, 2, 3], 5).unwrap();
        builder.add_ballot(&[3, 2, 1], 6).unwrap();
        builder.add_ballot(&[1, 2, 3], 1).unwrap();
        let p = builder.build().unwrap();
        assert_eq!(
            p.pairs(),
            &[
                WeightedBallot::new(6, &[1, 2, 3]),
                WeightedBallot::new(6, &[3, 2, 1]),
            ]
        );
    }

    #[test]
    fn checks_candidates_on_build() {
        let mut builder = ProfileBuilder::new().candidates(&[1, 2]).unwrap();
        builder.add_ballot_simple(&[1, 4]).unwrap();
        assert!(matches!(builder.build(), Err(RuleError::InvalidProfile(_))));
        assert!(builder.add_ballot(&[1], 0).is_err());
    }

    #[test]
    fn empty_builder_is_invalid() {
        assert!(ProfileBuilder::new().build().is_err());
    }
}
