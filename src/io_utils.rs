//! Reading and writing persisted per-match tables.
//!
//! Every table artifact flows through this module:
//!
//! - **Naming**: one `<match_id>.csv` file per match.
//! - **Writing**: header row plus one record per row, every field quoted
//!   (`QuoteStyle::Always`) so team and player names round-trip untouched.
//! - **Loading**: column types are inferred per file on read (see
//!   [`crate::frame::Column::from_raw`]); any failure is a [`LoadError`].
//! - **Discovery**: [`list_table_names`] is the only place that scans a
//!   directory; the reconciler and merger only take explicit name lists.

use std::{
    fs::{self, File},
    io::{BufReader, BufWriter, Read},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use csv::QuoteStyle;
use log::debug;
use thiserror::Error;

use crate::frame::{Column, FrameError, Table};

pub const TABLE_EXTENSION: &str = "csv";
const STAGING_SUFFIX: &str = ".partial";

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("Opening table {path:?}: {source}")]
    Open {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("Reading table {path:?}: {source}")]
    Csv {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },
    #[error("Table {path:?} has no header row")]
    MissingHeader { path: PathBuf },
    #[error("Assembling table: {0}")]
    Frame(#[from] FrameError),
}

/// A table that was named for loading but could not be used.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SkippedTable {
    pub name: String,
    pub reason: String,
}

pub fn table_file_name(match_id: &str) -> String {
    format!("{match_id}.{TABLE_EXTENSION}")
}

pub fn open_csv_reader<R>(reader: R) -> csv::Reader<R>
where
    R: Read,
{
    let mut builder = csv::ReaderBuilder::new();
    builder.has_headers(true).double_quote(true).flexible(false);
    builder.from_reader(reader)
}

pub fn open_csv_writer(path: &Path) -> Result<csv::Writer<BufWriter<File>>> {
    let file = File::create(path).with_context(|| format!("Creating output file {path:?}"))?;
    let mut builder = csv::WriterBuilder::new();
    builder.quote_style(QuoteStyle::Always).double_quote(true);
    Ok(builder.from_writer(BufWriter::new(file)))
}

/// Writes `table` to `path` through a staging file that is renamed into
/// place once complete, so a failed write never leaves a partial table.
pub fn write_table(path: &Path, table: &Table) -> Result<()> {
    let staging = staging_path(path);
    let written = write_rows(&staging, table).and_then(|()| {
        fs::rename(&staging, path)
            .with_context(|| format!("Moving {staging:?} into place at {path:?}"))
    });
    if written.is_err()
        && let Err(err) = fs::remove_file(&staging)
    {
        debug!("Could not remove staging file {staging:?}: {err}");
    }
    written
}

/// `1001.csv` → `1001.csv.partial`, which table listing ignores.
pub fn staging_path(path: &Path) -> PathBuf {
    let mut name = path.file_name().unwrap_or_default().to_os_string();
    name.push(STAGING_SUFFIX);
    path.with_file_name(name)
}

fn write_rows(path: &Path, table: &Table) -> Result<()> {
    let mut writer = open_csv_writer(path)?;
    writer
        .write_record(table.headers())
        .with_context(|| format!("Writing headers to {path:?}"))?;
    for row in 0..table.row_count() {
        writer
            .write_record(table.render_row(row))
            .with_context(|| format!("Writing row {} to {path:?}", row + 2))?;
    }
    writer
        .flush()
        .with_context(|| format!("Flushing {path:?}"))?;
    Ok(())
}

pub fn read_table(path: &Path) -> Result<Table, LoadError> {
    let file = File::open(path).map_err(|source| LoadError::Open {
        path: path.to_path_buf(),
        source,
    })?;
    let csv_error = |source| LoadError::Csv {
        path: path.to_path_buf(),
        source,
    };
    let mut reader = open_csv_reader(BufReader::new(file));
    let headers = reader.headers().map_err(csv_error)?.clone();
    if headers.is_empty() {
        return Err(LoadError::MissingHeader {
            path: path.to_path_buf(),
        });
    }

    let mut fields: Vec<Vec<String>> = vec![Vec::new(); headers.len()];
    for record in reader.records() {
        let record = record.map_err(csv_error)?;
        for (idx, field) in record.iter().enumerate() {
            fields[idx].push(field.to_string());
        }
    }

    let columns = headers
        .iter()
        .zip(fields.iter())
        .map(|(name, raw)| Column::from_raw(name, raw))
        .collect();
    Ok(Table::from_columns(columns)?)
}

/// Lists persisted table file names in `dir`, sorted lexicographically.
pub fn list_table_names(dir: &Path) -> Result<Vec<String>> {
    let mut names = Vec::new();
    for entry in fs::read_dir(dir).with_context(|| format!("Listing tables in {dir:?}"))? {
        let entry = entry.with_context(|| format!("Reading entry in {dir:?}"))?;
        let path = entry.path();
        let is_table = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(TABLE_EXTENSION));
        if is_table
            && path.is_file()
            && let Some(name) = path.file_name().and_then(|name| name.to_str())
        {
            names.push(name.to_string());
        }
    }
    names.sort();
    Ok(names)
}
