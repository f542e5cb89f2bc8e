//! Coercing per-match tables to a reconciled schema and stacking them.
//!
//! Tables are loaded one at a time and appended to the running output, so
//! only the merged result and the table being added are held in memory.
//! Coercion is per column: a column that cannot be converted keeps its
//! loaded type, the failure is recorded in the [`MergeReport`], and the
//! merged column surfaces as [`ColumnType::Mixed`] when tables disagree.

use std::path::Path;

use anyhow::{Context, Result};
use log::{debug, info, warn};

use crate::{
    cli::MergeArgs,
    frame::{ColumnType, Table},
    io_utils::{self, SkippedTable},
    reconcile::{self, DtypeMap},
};

pub const SEASON_COLUMN: &str = "season";

#[derive(Debug, Clone, PartialEq)]
pub enum CoercionOutcome {
    /// Values were converted to the target type.
    Converted,
    /// The column already had the target type.
    Unchanged,
    /// At least one value could not be converted; the column was left as is.
    Failed { reason: String },
}

#[derive(Debug, Clone, PartialEq)]
pub struct ColumnCoercion {
    pub column: String,
    pub from: ColumnType,
    pub target: ColumnType,
    pub outcome: CoercionOutcome,
}

#[derive(Debug, Clone, PartialEq)]
pub struct LoadedTable {
    pub name: String,
    pub rows: usize,
    pub coercions: Vec<ColumnCoercion>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct MergeReport {
    pub loaded: Vec<LoadedTable>,
    pub skipped: Vec<SkippedTable>,
}

impl MergeReport {
    /// `(table, coercion)` for every column that kept its loaded type.
    pub fn coercion_failures(&self) -> impl Iterator<Item = (&str, &ColumnCoercion)> {
        self.loaded.iter().flat_map(|table| {
            table
                .coercions
                .iter()
                .filter(|c| matches!(c.outcome, CoercionOutcome::Failed { .. }))
                .map(move |c| (table.name.as_str(), c))
        })
    }
}

#[derive(Debug, Clone, Default)]
pub struct MergedDataset {
    pub table: Table,
    pub report: MergeReport,
}

pub fn execute(args: &MergeArgs) -> Result<()> {
    let names = if args.tables.is_empty() {
        io_utils::list_table_names(&args.input_dir)?
    } else {
        args.tables.clone()
    };
    let dtypes = match &args.dtypes {
        Some(path) => {
            DtypeMap::load(path).with_context(|| format!("Loading dtype map from {path:?}"))?
        }
        None => {
            info!(
                "No dtype map given; reconciling over the first {} table(s)",
                args.sample_size
            );
            reconcile::reconcile(&names, &args.input_dir, args.sample_size)
        }
    };

    let merged = merge(&names, &args.input_dir, &dtypes);
    for (table, coercion) in merged.report.coercion_failures() {
        if let CoercionOutcome::Failed { reason } = &coercion.outcome {
            warn!(
                "{table}: column '{}' kept type {} ({reason})",
                coercion.column, coercion.from
            );
        }
    }
    io_utils::write_table(&args.output, &merged.table)
        .with_context(|| format!("Writing merged dataset to {:?}", args.output))?;
    info!(
        "Merged {} row(s) from {} table(s) into {:?} ({} skipped)",
        merged.table.row_count(),
        merged.report.loaded.len(),
        args.output,
        merged.report.skipped.len()
    );
    Ok(())
}

/// Applies `dtype_map` to every column it names, then forces `season` to text.
pub fn coerce_table(table: &mut Table, dtype_map: &DtypeMap) -> Vec<ColumnCoercion> {
    let targets = dtype_map
        .iter()
        .filter(|(column, _)| *column != SEASON_COLUMN)
        .chain(std::iter::once((SEASON_COLUMN, ColumnType::String)));

    let mut coercions = Vec::new();
    for (name, target) in targets {
        let Some(column) = table.column_mut(name) else {
            continue;
        };
        let from = column.datatype;
        let outcome = if from == target {
            CoercionOutcome::Unchanged
        } else {
            match column.coerce(target) {
                Ok(()) => CoercionOutcome::Converted,
                Err(err) => CoercionOutcome::Failed {
                    reason: err.to_string(),
                },
            }
        };
        coercions.push(ColumnCoercion {
            column: name.to_string(),
            from,
            target,
            outcome,
        });
    }
    coercions
}

/// Loads, coerces and concatenates `table_names` in order. Tables that fail
/// to load are skipped; with nothing loaded the result is an empty table.
pub fn merge(table_names: &[String], input_dir: &Path, dtype_map: &DtypeMap) -> MergedDataset {
    let mut merged = MergedDataset::default();

    for name in table_names {
        let path = input_dir.join(name);
        let mut table = match io_utils::read_table(&path) {
            Ok(table) => table,
            Err(err) => {
                warn!("Skipping {name} due to an error: {err}");
                merged.report.skipped.push(SkippedTable {
                    name: name.clone(),
                    reason: err.to_string(),
                });
                continue;
            }
        };
        let coercions = coerce_table(&mut table, dtype_map);
        debug!("{name}: {} row(s), {} coercion(s)", table.row_count(), coercions.len());
        merged.report.loaded.push(LoadedTable {
            name: name.clone(),
            rows: table.row_count(),
            coercions,
        });
        merged.table.append(table);
    }

    if merged.report.loaded.is_empty() {
        warn!("No valid tables were found or successfully read");
    }
    merged
}
