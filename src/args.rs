use clap::Parser;

/// This is a program to evaluate voting rules against the preferences of the voters.
#[derive(Parser, Debug, Clone)]
#[clap(author, version, about, long_about = None)]
pub struct Args {
    /// (file path) The file describing the run, in JSON: the profile (or the voter model
    /// to generate it) and the rules to evaluate. See the manual of rule_eval for the format.
    #[clap(short, long, value_parser)]
    pub config: Option<String>,
    /// (file path) A reference file containing the summary of a run in JSON format. If provided,
    /// rulebench will check that the computed summary matches the reference.
    #[clap(short, long, value_parser)]
    pub reference: Option<String>,

    /// (file path, 'stdout' or empty) If specified, the summary of the run will be written in JSON
    /// format to the given location. Otherwise it is printed on the standard output.
    #[clap(short, long, value_parser)]
    pub out: Option<String>,

    /// (rule name, may be repeated) If specified, the rules to evaluate. Setting this option
    /// overrides the rules listed in the --config file.
    #[clap(long, value_parser)]
    pub rule: Option<Vec<String>>,

    /// (integer) If specified, overrides the number of top choices compared by the utility.
    #[clap(long, value_parser)]
    pub topn: Option<usize>,

    /// (integer) If specified, overrides the seed of the voter model.
    #[clap(long, value_parser)]
    pub seed: Option<u64>,

    // Other arguments
    /// If passed as an argument, will turn on verbose logging to the standard output.
    #[clap(long, takes_value = false)]
    pub verbose: bool,
}
