//! Majority-vote column typing across a sample of persisted match tables.

use std::{
    collections::{BTreeMap, HashMap},
    fs::File,
    io::BufReader,
    path::Path,
};

use anyhow::{Context, Result};
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};

use crate::{
    cli::ReconcileArgs,
    frame::ColumnType,
    io_utils::{self, SkippedTable},
};

pub const DEFAULT_SAMPLE_SIZE: usize = 21;

/// Column name → the type most tables in the sample agreed on.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DtypeMap(BTreeMap<String, ColumnType>);

impl DtypeMap {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, column: &str) -> Option<ColumnType> {
        self.0.get(column).copied()
    }

    pub fn insert(&mut self, column: impl Into<String>, datatype: ColumnType) {
        self.0.insert(column.into(), datatype);
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, ColumnType)> {
        self.0.iter().map(|(name, ty)| (name.as_str(), *ty))
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path).with_context(|| format!("Creating dtype map {path:?}"))?;
        serde_yaml::to_writer(file, self).context("Writing dtype map YAML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path).with_context(|| format!("Opening dtype map {path:?}"))?;
        let reader = BufReader::new(file);
        serde_yaml::from_reader(reader).context("Parsing dtype map YAML")
    }
}

impl FromIterator<(String, ColumnType)> for DtypeMap {
    fn from_iter<I: IntoIterator<Item = (String, ColumnType)>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

#[derive(Debug, Clone, Default)]
pub struct Reconciliation {
    pub dtypes: DtypeMap,
    /// Tables that were loaded and voted.
    pub sampled: usize,
    pub skipped: Vec<SkippedTable>,
}

/// Vote tallies in first-seen order, per column and per type.
#[derive(Debug, Default)]
struct DtypeVotes {
    columns: Vec<(String, Vec<(ColumnType, usize)>)>,
    positions: HashMap<String, usize>,
}

impl DtypeVotes {
    fn record(&mut self, column: &str, datatype: ColumnType) {
        let position = match self.positions.get(column) {
            Some(position) => *position,
            None => {
                self.columns.push((column.to_string(), Vec::new()));
                self.positions
                    .insert(column.to_string(), self.columns.len() - 1);
                self.columns.len() - 1
            }
        };
        let tallies = &mut self.columns[position].1;
        match tallies.iter_mut().find(|(ty, _)| *ty == datatype) {
            Some((_, count)) => *count += 1,
            None => tallies.push((datatype, 1)),
        }
    }

    /// Highest count wins; on a tie the type voted for first wins.
    fn winners(self) -> DtypeMap {
        self.columns
            .into_iter()
            .filter_map(|(column, tallies)| {
                let mut best: Option<(ColumnType, usize)> = None;
                for (ty, count) in tallies {
                    if best.is_none_or(|(_, top)| count > top) {
                        best = Some((ty, count));
                    }
                }
                best.map(|(ty, _)| (column, ty))
            })
            .collect()
    }
}

pub fn execute(args: &ReconcileArgs) -> Result<()> {
    let names = if args.tables.is_empty() {
        io_utils::list_table_names(&args.input_dir)?
    } else {
        args.tables.clone()
    };
    info!(
        "Reconciling column types over {} of {} table(s) in {:?}",
        names.len().min(args.sample_size),
        names.len(),
        args.input_dir
    );
    let reconciliation = reconcile_with_report(&names, &args.input_dir, args.sample_size);
    if reconciliation.dtypes.is_empty() {
        warn!("No sampled table could be loaded; the dtype map is empty");
    }
    reconciliation
        .dtypes
        .save(&args.output)
        .with_context(|| format!("Writing dtype map to {:?}", args.output))?;
    info!(
        "Dtype map for {} column(s) from {} table(s) written to {:?}",
        reconciliation.dtypes.len(),
        reconciliation.sampled,
        args.output
    );
    Ok(())
}

/// Majority type per column over the first `sample_size` tables of
/// `table_names`. Tables that fail to load are logged and left out.
pub fn reconcile(table_names: &[String], input_dir: &Path, sample_size: usize) -> DtypeMap {
    reconcile_with_report(table_names, input_dir, sample_size).dtypes
}

pub fn reconcile_with_report(
    table_names: &[String],
    input_dir: &Path,
    sample_size: usize,
) -> Reconciliation {
    let mut votes = DtypeVotes::default();
    let mut sampled = 0usize;
    let mut skipped = Vec::new();

    for name in table_names.iter().take(sample_size) {
        let path = input_dir.join(name);
        match io_utils::read_table(&path) {
            Ok(table) => {
                for column in table.columns() {
                    debug!("{name}: '{}' is {}", column.name, column.datatype);
                    votes.record(&column.name, column.datatype);
                }
                sampled += 1;
            }
            Err(err) => {
                warn!("Error processing {name}: {err}");
                skipped.push(SkippedTable {
                    name: name.clone(),
                    reason: err.to_string(),
                });
            }
        }
    }

    Reconciliation {
        dtypes: votes.winners(),
        sampled,
        skipped,
    }
}
