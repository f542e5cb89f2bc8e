use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

use crate::{enrich::InningPolicy, reconcile::DEFAULT_SAMPLE_SIZE};

#[derive(Debug, Parser)]
#[command(author, version, about = "Wrangle ball-by-ball cricket records into modelling-ready tables", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Debug, Subcommand)]
pub enum Commands {
    /// Convert a zip archive of match records into one enriched CSV table per match
    Transcode(TranscodeArgs),
    /// Vote a column type map over a sample of match tables and save it as YAML
    Reconcile(ReconcileArgs),
    /// Coerce match tables to a column type map and stack them into one dataset
    Merge(MergeArgs),
    /// Count rows (or wickets) per category of a dataset column
    Counts(CountsArgs),
    /// Fit a wicket classifier on a merged dataset and report its accuracy
    Train(TrainArgs),
}

#[derive(Debug, Args)]
pub struct TranscodeArgs {
    /// Zip archive holding one JSON record per match
    #[arg(short = 'i', long = "input")]
    pub archive: PathBuf,
    /// Directory receiving `<match_id>.csv` tables (created if missing)
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// How deliveries by teams beyond the first two are assigned an inning
    #[arg(long = "inning-policy", value_enum, default_value_t = InningPolicy::FirstTeam)]
    pub inning_policy: InningPolicy,
}

#[derive(Debug, Args)]
pub struct ReconcileArgs {
    /// Directory holding per-match tables
    #[arg(short = 'd', long = "dir")]
    pub input_dir: PathBuf,
    /// Destination YAML column type map
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Number of leading tables that vote
    #[arg(long = "sample-size", default_value_t = DEFAULT_SAMPLE_SIZE)]
    pub sample_size: usize,
    /// Table file names to consider, in order (defaults to every `*.csv` in the directory, sorted)
    #[arg(short = 't', long = "table", action = clap::ArgAction::Append)]
    pub tables: Vec<String>,
}

#[derive(Debug, Args)]
pub struct MergeArgs {
    /// Directory holding per-match tables
    #[arg(short = 'd', long = "dir")]
    pub input_dir: PathBuf,
    /// YAML column type map from `reconcile` (voted on the fly if omitted)
    #[arg(short = 'm', long = "dtypes")]
    pub dtypes: Option<PathBuf>,
    /// Destination CSV for the merged dataset
    #[arg(short = 'o', long = "output")]
    pub output: PathBuf,
    /// Number of leading tables that vote when no type map is given
    #[arg(long = "sample-size", default_value_t = DEFAULT_SAMPLE_SIZE)]
    pub sample_size: usize,
    /// Table file names to merge, in order (defaults to every `*.csv` in the directory, sorted)
    #[arg(short = 't', long = "table", action = clap::ArgAction::Append)]
    pub tables: Vec<String>,
}

#[derive(Debug, Args)]
pub struct CountsArgs {
    /// Merged dataset CSV
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Column to group by; append `:N` to treat a numeric column as nominal
    #[arg(short = 'c', long = "column")]
    pub column: String,
    /// Sum the `wicket` column per category instead of counting rows
    #[arg(long)]
    pub wickets: bool,
    /// Write counts to this CSV instead of printing a table
    #[arg(short = 'o', long = "output")]
    pub output: Option<PathBuf>,
}

#[derive(Debug, Args)]
pub struct TrainArgs {
    /// Merged dataset CSV
    #[arg(short = 'i', long = "input")]
    pub input: PathBuf,
    /// Write the test-set confusion matrix to this CSV
    #[arg(long = "confusion-matrix")]
    pub confusion_matrix: Option<PathBuf>,
    /// Seed for the train/test shuffle
    #[arg(long, default_value_t = 123)]
    pub seed: u64,
    /// Share of rows used for training
    #[arg(long = "train-fraction", default_value_t = 0.7, value_parser = parse_fraction)]
    pub train_fraction: f64,
}

fn parse_fraction(value: &str) -> Result<f64, String> {
    let fraction = value
        .parse::<f64>()
        .map_err(|err| format!("'{value}' is not a number: {err}"))?;
    if fraction > 0.0 && fraction < 1.0 {
        Ok(fraction)
    } else {
        Err(format!("'{value}' must be strictly between 0 and 1"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_fraction_rejects_bounds() {
        assert_eq!(parse_fraction("0.7"), Ok(0.7));
        assert!(parse_fraction("0").is_err());
        assert!(parse_fraction("1").is_err());
        assert!(parse_fraction("x").is_err());
    }

    #[test]
    fn merge_defaults_to_voting_when_no_map_given() {
        let cli = Cli::try_parse_from(["cricket-pred", "merge", "-d", "tables", "-o", "out.csv"])
            .expect("parse merge");
        match cli.command {
            Commands::Merge(args) => {
                assert!(args.dtypes.is_none());
                assert!(args.tables.is_empty());
                assert_eq!(args.sample_size, DEFAULT_SAMPLE_SIZE);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn inning_policy_accepts_kebab_case() {
        let cli = Cli::try_parse_from([
            "cricket-pred",
            "transcode",
            "-i",
            "all.zip",
            "-o",
            "out",
            "--inning-policy",
            "strict-two-teams",
        ])
        .expect("parse transcode");
        match cli.command {
            Commands::Transcode(args) => {
                assert_eq!(args.inning_policy, InningPolicy::StrictTwoTeams)
            }
            other => panic!("unexpected command {other:?}"),
        }
    }
}
