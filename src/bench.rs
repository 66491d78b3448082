use log::{debug, info, warn};

use rule_eval::*;
use snafu::{prelude::*, Snafu};

use std::fs;
use std::sync::Arc;

use rand::rngs::StdRng;
use rand::SeedableRng;
use serde_json::json;
use serde_json::Value as JSValue;
use text_diff::print_diff;

use crate::args::Args;
use crate::bench::config_reader::*;

#[derive(Debug, Snafu)]
pub enum BenchError {
    #[snafu(display("Error opening file {path}"))]
    OpeningJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error writing file {path}"))]
    WritingJson {
        source: std::io::Error,
        path: String,
    },
    #[snafu(display("Error parsing JSON"))]
    ParsingJson { source: serde_json::Error },
    #[snafu(display("Unknown rule {name}"))]
    UnknownRule { name: String },
    #[snafu(display("The run needs either a profile or a generator"))]
    MissingProfile {},
    #[snafu(display("Evaluation failed"))]
    Rule { source: RuleError },

    #[snafu(whatever, display("{message}"))]
    Whatever {
        message: String,
        #[snafu(source(from(Box<dyn std::error::Error>, Some)))]
        source: Option<Box<dyn std::error::Error>>,
    },
}

type BenchResult<T> = Result<T, BenchError>;

pub mod config_reader {
    use crate::bench::*;

    use serde::{Deserialize, Serialize};

    #[derive(Eq, PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct BallotEntry {
        pub frequency: u64,
        pub ballot: Vec<u32>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct GeneratorSettings {
        pub model: String,
        pub voters: u32,
        pub candidates: u32,
        pub seed: Option<u64>,
        #[serde(rename = "distortionRatio")]
        pub distortion_ratio: Option<f64>,
        pub dimensions: Option<usize>,
        pub alpha: Option<f64>,
    }

    #[derive(PartialEq, Debug, Clone, Serialize, Deserialize)]
    pub struct RunConfig {
        pub profile: Option<Vec<BallotEntry>>,
        pub candidates: Option<Vec<u32>>,
        pub generator: Option<GeneratorSettings>,
        #[serde(default)]
        pub rules: Vec<String>,
        pub topn: Option<usize>,
        #[serde(rename = "tiebreakMode")]
        pub tiebreak_mode: Option<String>,
        #[serde(rename = "randomSeed")]
        pub random_seed: Option<String>,
        #[serde(rename = "utilityScheme")]
        pub utility_scheme: Option<String>,
    }

    pub fn read_config(path: &str) -> BenchResult<RunConfig> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        let config: RunConfig = serde_json::from_str(&contents).context(ParsingJsonSnafu {})?;
        Ok(config)
    }

    pub fn read_summary(path: &str) -> BenchResult<JSValue> {
        let contents = fs::read_to_string(path).context(OpeningJsonSnafu { path })?;
        debug!("read content: {:?}", contents);
        let js: JSValue = serde_json::from_str(contents.as_str()).context(ParsingJsonSnafu {})?;
        Ok(js)
    }
}

fn validate_rules(config: &RunConfig) -> BenchResult<EngineRules> {
    let res = EngineRules {
        stv_tiebreak: match config.tiebreak_mode.as_deref() {
            None | Some("lowestCandidate") => TieBreakMode::LowestCandidate,
            Some("random") => {
                let seed = match config.random_seed.clone().map(|s| s.parse::<u32>()) {
                    Some(Result::Ok(x)) => x,
                    x => {
                        whatever!("Cannot use tiebreak mode random with seed {:?}", x)
                    }
                };
                TieBreakMode::Random(seed)
            }
            Some(x) => {
                whatever!("Cannot use tiebreak mode {:?}", x)
            }
        },
        utility_scheme: match config.utility_scheme.as_deref() {
            None | Some("firstChoice") => UtilityScheme::FirstChoice,
            Some("reciprocalRank") => UtilityScheme::ReciprocalRank,
            Some(x) => {
                whatever!("Cannot use utility scheme {:?}", x)
            }
        },
        ..EngineRules::DEFAULT_RULES
    };
    Ok(res)
}

fn read_model(name: &str) -> BenchResult<VoterModel> {
    match name {
        "random" => Ok(VoterModel::Random),
        "spatial" => Ok(VoterModel::Spatial),
        "dirichlet" => Ok(VoterModel::Dirichlet),
        x => whatever!("Unknown voter model {:?}", x),
    }
}

fn read_profile(config: &RunConfig, seed: Option<u64>, rules: &EngineRules) -> BenchResult<Profile> {
    if let Some(entries) = config.profile.as_ref() {
        let pairs: Vec<WeightedBallot> = entries
            .iter()
            .map(|e| WeightedBallot::new(e.frequency, &e.ballot))
            .collect();
        let candidates: Option<Vec<Candidate>> = config
            .candidates
            .as_ref()
            .map(|cs| cs.iter().map(|c| Candidate(*c)).collect());
        return build_profile(&pairs, candidates.as_deref()).context(RuleSnafu {});
    }
    let gen = config.generator.as_ref().context(MissingProfileSnafu {})?;
    let mut params = GeneratorParams::new(read_model(&gen.model)?, gen.voters, gen.candidates);
    if let Some(d) = gen.dimensions {
        params.dimensions = d;
    }
    if let Some(a) = gen.alpha {
        params.alpha = a;
    }
    let seed = seed.or(gen.seed).unwrap_or(0);
    info!("Generating profile: {:?}, seed {}", params, seed);
    let mut rng = StdRng::seed_from_u64(seed);
    let profile = match gen.distortion_ratio {
        Some(ratio) => generate_distorted(&params, ratio, &mut rng, rules),
        None => generate(&params, &mut rng, rules),
    };
    profile.context(RuleSnafu {})
}

fn select_rules(registry: &RuleRegistry, names: &[String]) -> BenchResult<Vec<Arc<dyn Rule>>> {
    if names.is_empty() {
        return Ok(registry
            .names()
            .iter()
            .filter_map(|n| registry.get(n))
            .collect());
    }
    names
        .iter()
        .map(|n| {
            registry
                .get(n)
                .context(UnknownRuleSnafu { name: n.clone() })
        })
        .collect()
}

fn build_summary_js(profile: &Profile, topn: usize, results: &[(String, Evaluation)]) -> JSValue {
    let results_js: Vec<JSValue> = results
        .iter()
        .map(|(name, ev)| {
            let ranking: Vec<u32> = ev.ranking.iter().map(|c| c.0).collect();
            json!({
                "ranking": ranking,
                "rule": name,
                "top": ev.top,
                "topn": ev.topn,
            })
        })
        .collect();
    json!({
        "profile": {
            "candidates": profile.num_candidates(),
            "distinctBallots": profile.pairs().len(),
            "distortionRatio": profile.distortion_ratio(),
            "voters": profile.total_voters(),
        },
        "results": results_js,
        "topn": topn,
    })
}

/// Evaluates the rules of a run and assembles the summary.
pub fn compute_summary(config: &RunConfig, args: &Args) -> BenchResult<JSValue> {
    let rules = validate_rules(config)?;
    let profile = read_profile(config, args.seed, &rules)?;
    info!(
        "profile: {} voters, {} candidates, {} distinct ballots",
        profile.total_voters(),
        profile.num_candidates(),
        profile.pairs().len()
    );

    let registry = RuleRegistry::standard(&rules);
    let names: Vec<String> = args.rule.clone().unwrap_or_else(|| config.rules.clone());
    let selected = select_rules(&registry, &names)?;
    let topn = args.topn.or(config.topn).unwrap_or(1);

    let mut results: Vec<(String, Evaluation)> = Vec::new();
    for rule in selected.iter() {
        let ev = match evaluate(&profile, rule.as_ref(), topn, &rules) {
            Ok(ev) => ev,
            // Rules that were not asked for explicitly are skipped when the
            // profile is too large for them.
            Err(e @ RuleError::IntractableProfile { .. }) if names.is_empty() => {
                warn!("Skipping rule {}: {}", rule.name(), e);
                continue;
            }
            Err(e) => return Err(e).context(RuleSnafu {}),
        };
        debug!("{}: {:?}", rule.name(), ev);
        results.push((rule.name(), ev));
    }
    Ok(build_summary_js(&profile, topn, &results))
}

pub fn run_bench(args: &Args) -> BenchResult<()> {
    let config_path = match args.config.as_deref() {
        Some(p) => p,
        None => whatever!("No run description provided, use --config"),
    };
    let config = read_config(config_path)?;
    info!("config: {:?}", config);

    let result_js = compute_summary(&config, args)?;
    let pretty_js_stats = serde_json::to_string_pretty(&result_js).context(ParsingJsonSnafu {})?;

    match args.out.as_deref() {
        None | Some("stdout") => println!("{}", pretty_js_stats),
        Some(out_path) => {
            info!("Writing summary to {}", out_path);
            fs::write(out_path, &pretty_js_stats).context(WritingJsonSnafu { path: out_path })?;
        }
    }

    // The reference summary, if provided for comparison
    if let Some(summary_p) = args.reference.as_deref() {
        let summary_ref = read_summary(summary_p)?;
        let pretty_js_summary_ref =
            serde_json::to_string_pretty(&summary_ref).context(ParsingJsonSnafu {})?;
        if pretty_js_summary_ref != pretty_js_stats {
            warn!("Found differences with the reference string");
            print_diff(
                pretty_js_summary_ref.as_str(),
                pretty_js_stats.as_ref(),
                "\n",
            );
            whatever!("Difference detected between calculated summary and reference summary")
        }
    }

    Ok(())
}

#[cfg(test)]
fn demo_args(test_name: &str, with_reference: bool) -> Args {
    let test_dir = format!("{}/demos/{}", env!("CARGO_MANIFEST_DIR"), test_name);
    Args {
        config: Some(format!("{}/{}_config.json", test_dir, test_name)),
        reference: if with_reference {
            Some(format!("{}/{}_expected_summary.json", test_dir, test_name))
        } else {
            None
        },
        out: None,
        rule: None,
        topn: None,
        seed: None,
        verbose: false,
    }
}

#[cfg(test)]
pub fn test_wrapper(test_name: &str) {
    info!("Running test {}", test_name);
    let res = run_bench(&demo_args(test_name, true));
    if let Err(e) = res {
        panic!("Test {} failed: {} ({:?})", test_name, e, e);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn condorcet_winner() {
        test_wrapper("condorcet_winner");
    }

    #[test]
    fn truncated_ballots() {
        test_wrapper("truncated_ballots");
    }

    #[test]
    fn generated_profile() {
        let args = demo_args("generated_profile", false);
        let config = read_config(args.config.as_deref().unwrap()).unwrap();
        let js = compute_summary(&config, &args).unwrap();
        assert_eq!(js["profile"]["voters"], json!(200));
        assert_eq!(js["profile"]["distortionRatio"], json!(0.5));
        assert_eq!(js["results"].as_array().unwrap().len(), 3);
        // Same seed, same summary.
        assert_eq!(compute_summary(&config, &args).unwrap(), js);
    }

    #[test]
    fn overrides_take_precedence() {
        let mut args = demo_args("condorcet_winner", false);
        args.rule = Some(vec!["veto".to_string()]);
        args.topn = Some(3);
        let config = read_config(args.config.as_deref().unwrap()).unwrap();
        let js = compute_summary(&config, &args).unwrap();
        assert_eq!(js["topn"], json!(3));
        assert_eq!(js["results"][0]["rule"], json!("veto"));
        assert_eq!(js["results"][0]["topn"], json!(1.0));
    }

    fn large_profile_config(rules: &str) -> RunConfig {
        let ballot: Vec<u32> = (1..=10).collect();
        let reversed: Vec<u32> = ballot.iter().rev().cloned().collect();
        let js = format!(
            r#"{{"profile": [{{"frequency": 3, "ballot": {:?}}}, {{"frequency": 2, "ballot": {:?}}}], "rules": {}}}"#,
            ballot, reversed, rules
        );
        serde_json::from_str(&js).unwrap()
    }

    #[test]
    fn default_run_skips_intractable_rules() {
        let args = demo_args("condorcet_winner", false);
        let js = compute_summary(&large_profile_config("[]"), &args).unwrap();
        let names: Vec<&str> = js["results"]
            .as_array()
            .unwrap()
            .iter()
            .map(|r| r["rule"].as_str().unwrap())
            .collect();
        assert_eq!(names.len(), 18);
        assert!(!names.contains(&"kemeny"));
        assert!(names.contains(&"borda_kemeny_hybrid"));
        assert_eq!(js["profile"]["candidates"], json!(10));
    }

    #[test]
    fn requested_intractable_rule_is_an_error() {
        let args = demo_args("condorcet_winner", false);
        let res = compute_summary(&large_profile_config(r#"["borda", "kemeny"]"#), &args);
        assert!(matches!(
            res,
            Err(BenchError::Rule {
                source: RuleError::IntractableProfile { candidates: 10, .. }
            })
        ));
    }

    #[test]
    fn unknown_rule_is_an_error() {
        let mut args = demo_args("condorcet_winner", false);
        args.rule = Some(vec!["approval_voting".to_string()]);
        let config = read_config(args.config.as_deref().unwrap()).unwrap();
        let res = compute_summary(&config, &args);
        assert!(matches!(res, Err(BenchError::UnknownRule { .. })));
    }

    #[test]
    fn rejects_invalid_settings() {
        let config: RunConfig = serde_json::from_str(
            r#"{"profile": [{"frequency": 1, "ballot": [1]}], "tiebreakMode": "random"}"#,
        )
        .unwrap();
        assert!(validate_rules(&config).is_err());
        let config: RunConfig = serde_json::from_str(r#"{"rules": ["borda"]}"#).unwrap();
        let args = demo_args("condorcet_winner", false);
        assert!(matches!(
            compute_summary(&config, &args),
            Err(BenchError::MissingProfile {})
        ));
    }
}
