use std::{cmp::Ordering, collections::HashMap, path::Path};

use anyhow::{Context, Result};
use log::info;
use thiserror::Error;

use crate::{
    cli::CountsArgs,
    frame::{Column, Table, Value},
    io_utils, table,
};

/// Suffix asking for a column to be counted as nominal categories.
pub const NOMINAL_SUFFIX: &str = ":N";
pub const WICKET_COLUMN: &str = "wicket";
const EMPTY_CATEGORY: &str = "<empty>";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ExploreError {
    #[error("Dataset shouldn't be empty")]
    EmptyDataset,
    #[error("Column '{column}' must be in the dataset")]
    MissingColumn { column: String },
}

/// A column reference, optionally marked nominal with a trailing `:N`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ColumnSpec {
    pub name: String,
    pub nominal: bool,
}

impl ColumnSpec {
    pub fn parse(spec: &str) -> Self {
        match spec.strip_suffix(NOMINAL_SUFFIX) {
            Some(name) => Self {
                name: name.to_string(),
                nominal: true,
            },
            None => Self {
                name: spec.to_string(),
                nominal: false,
            },
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CategoryCount {
    pub category: String,
    pub count: i64,
}

pub fn execute(args: &CountsArgs) -> Result<()> {
    let dataset = io_utils::read_table(&args.input)
        .with_context(|| format!("Loading dataset from {:?}", args.input))?;
    let (label, counts) = if args.wickets {
        (
            "wickets",
            wicket_counts(&dataset, &args.column)
                .with_context(|| format!("Counting wickets by '{}'", args.column))?,
        )
    } else {
        (
            "count",
            value_counts(&dataset, &args.column)
                .with_context(|| format!("Counting values of '{}'", args.column))?,
        )
    };

    let headers = vec![ColumnSpec::parse(&args.column).name, label.to_string()];
    let rows = counts
        .iter()
        .map(|c| vec![c.category.clone(), c.count.to_string()])
        .collect::<Vec<_>>();
    match &args.output {
        Some(path) => write_counts(path, &headers, &rows)?,
        None => table::print_table(&headers, &rows),
    }
    info!("Counted {} categories over {} row(s)", rows.len(), dataset.row_count());
    Ok(())
}

/// Row count per distinct value of the column named by `spec`.
pub fn value_counts(dataset: &Table, spec: &str) -> Result<Vec<CategoryCount>, ExploreError> {
    let spec = ColumnSpec::parse(spec);
    let column = checked_column(dataset, &spec.name)?;
    let numeric = !spec.nominal && column.datatype.is_numeric();
    let mut counts = Accumulator::default();
    for value in &column.values {
        counts.add(value.as_ref(), 1);
    }
    Ok(counts.into_sorted(numeric))
}

/// Sum of `wicket` per category of `column`.
pub fn wicket_counts(dataset: &Table, column: &str) -> Result<Vec<CategoryCount>, ExploreError> {
    let category = checked_column(dataset, column)?;
    let wickets = checked_column(dataset, WICKET_COLUMN)?;
    let mut counts = Accumulator::default();
    for (value, wicket) in category.values.iter().zip(&wickets.values) {
        let taken = wicket.as_ref().and_then(Value::as_i64).unwrap_or(0);
        counts.add(value.as_ref(), taken);
    }
    Ok(counts.into_sorted(category.datatype.is_numeric()))
}

fn checked_column<'a>(
    dataset: &'a Table,
    name: &str,
) -> Result<&'a Column, ExploreError> {
    if dataset.is_empty() {
        return Err(ExploreError::EmptyDataset);
    }
    dataset
        .column(name)
        .ok_or_else(|| ExploreError::MissingColumn {
            column: name.to_string(),
        })
}

#[derive(Default)]
struct Accumulator {
    totals: HashMap<String, i64>,
    numeric_keys: HashMap<String, f64>,
}

impl Accumulator {
    fn add(&mut self, value: Option<&Value>, amount: i64) {
        let category = value
            .map(Value::as_display)
            .unwrap_or_else(|| EMPTY_CATEGORY.to_string());
        if let Some(number) = value.and_then(Value::as_f64) {
            self.numeric_keys.insert(category.clone(), number);
        }
        *self.totals.entry(category).or_insert(0) += amount;
    }

    fn into_sorted(self, numeric: bool) -> Vec<CategoryCount> {
        let mut items = self
            .totals
            .into_iter()
            .map(|(category, count)| CategoryCount { category, count })
            .collect::<Vec<_>>();
        let keys = &self.numeric_keys;
        items.sort_by(|a, b| {
            if numeric {
                match (keys.get(&a.category), keys.get(&b.category)) {
                    (Some(x), Some(y)) => return x.total_cmp(y),
                    (Some(_), None) => return Ordering::Less,
                    (None, Some(_)) => return Ordering::Greater,
                    (None, None) => {}
                }
            }
            a.category.cmp(&b.category)
        });
        items
    }
}

fn write_counts(path: &Path, headers: &[String], rows: &[Vec<String>]) -> Result<()> {
    let mut writer = io_utils::open_csv_writer(path)?;
    writer
        .write_record(headers)
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in rows {
        writer
            .write_record(row)
            .with_context(|| format!("Writing counts to {path:?}"))?;
    }
    writer.flush().with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset() -> Table {
        Table::from_columns(vec![
            Column::integers("over", [10, 2, 2, 0]),
            Column::integers("wicket", [1, 0, 1, 1]),
            Column::strings("wicket_type", ["caught", "", "bowled", "caught"]),
        ])
        .unwrap()
    }

    fn pairs(counts: &[CategoryCount]) -> Vec<(&str, i64)> {
        counts.iter().map(|c| (c.category.as_str(), c.count)).collect()
    }

    #[test]
    fn numeric_columns_sort_by_value() {
        let counts = value_counts(&dataset(), "over").unwrap();
        assert_eq!(pairs(&counts), vec![("0", 1), ("2", 2), ("10", 1)]);
    }

    #[test]
    fn nominal_suffix_sorts_as_text() {
        let counts = value_counts(&dataset(), "over:N").unwrap();
        assert_eq!(pairs(&counts), vec![("0", 1), ("10", 1), ("2", 2)]);
    }

    #[test]
    fn wickets_are_summed_per_category() {
        let counts = wicket_counts(&dataset(), "over").unwrap();
        assert_eq!(pairs(&counts), vec![("0", 1), ("2", 1), ("10", 1)]);
    }

    #[test]
    fn unknown_columns_are_rejected_after_stripping_suffix() {
        assert_eq!(
            value_counts(&dataset(), "inning:N").unwrap_err(),
            ExploreError::MissingColumn {
                column: "inning".into()
            }
        );
    }

    #[test]
    fn empty_dataset_is_rejected() {
        let empty = Table::from_columns(vec![Column::integers("over", [])]).unwrap();
        assert_eq!(
            value_counts(&empty, "over").unwrap_err(),
            ExploreError::EmptyDataset
        );
    }

    #[test]
    fn wicket_counts_need_wicket_column() {
        let table = Table::from_columns(vec![Column::integers("over", [1])]).unwrap();
        assert_eq!(
            wicket_counts(&table, "over").unwrap_err(),
            ExploreError::MissingColumn {
                column: WICKET_COLUMN.into()
            }
        );
    }
}
