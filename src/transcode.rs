//! Batch conversion of a zip archive of match records into per-match tables.
//!
//! Each `.json` entry is parsed, enriched and written as `<match_id>.csv`.
//! A failing entry is recorded as skipped in the [`TranscodeReport`] and the
//! batch carries on; only an unusable archive or output directory aborts.

use std::{
    fs::{self, File},
    io::{BufReader, Read, Seek},
    path::{Path, PathBuf},
};

use anyhow::{Context, Result};
use log::{info, warn};
use zip::ZipArchive;

use crate::{
    cli::TranscodeArgs,
    enrich::{InningPolicy, enrich_with_policy},
    io_utils, record,
};

pub const RECORD_EXTENSION: &str = ".json";

#[derive(Debug, Clone, Copy, Default)]
pub struct TranscodeOptions {
    pub inning_policy: InningPolicy,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EntryStatus {
    Written { path: PathBuf, rows: usize },
    Skipped { reason: String },
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EntryOutcome {
    pub entry: String,
    pub match_id: String,
    pub status: EntryStatus,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TranscodeReport {
    pub outcomes: Vec<EntryOutcome>,
}

impl TranscodeReport {
    /// Number of record entries found in the archive.
    pub fn qualifying(&self) -> usize {
        self.outcomes.len()
    }

    pub fn processed(&self) -> usize {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, EntryStatus::Written { .. }))
            .count()
    }

    pub fn skipped(&self) -> impl Iterator<Item = &EntryOutcome> {
        self.outcomes
            .iter()
            .filter(|o| matches!(o.status, EntryStatus::Skipped { .. }))
    }
}

pub fn execute(args: &TranscodeArgs) -> Result<()> {
    info!(
        "Transcoding '{}' into {:?}",
        args.archive.display(),
        args.output
    );
    let options = TranscodeOptions {
        inning_policy: args.inning_policy,
    };
    let report = transcode_with_options(&args.archive, &args.output, options)?;
    for outcome in report.skipped() {
        if let EntryStatus::Skipped { reason } = &outcome.status {
            warn!("Skipped {}: {reason}", outcome.entry);
        }
    }
    info!(
        "Wrote {} of {} match table(s) to {:?}",
        report.processed(),
        report.qualifying(),
        args.output
    );
    Ok(())
}

pub fn transcode(archive: &Path, output_dir: &Path) -> Result<TranscodeReport> {
    transcode_with_options(archive, output_dir, TranscodeOptions::default())
}

pub fn transcode_with_options(
    archive: &Path,
    output_dir: &Path,
    options: TranscodeOptions,
) -> Result<TranscodeReport> {
    fs::create_dir_all(output_dir)
        .with_context(|| format!("Creating output directory {output_dir:?}"))?;
    let file = File::open(archive).with_context(|| format!("Opening archive {archive:?}"))?;
    let mut zip = ZipArchive::new(BufReader::new(file))
        .with_context(|| format!("Reading archive {archive:?}"))?;
    transcode_archive(&mut zip, output_dir, options)
}

pub fn transcode_archive<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    output_dir: &Path,
    options: TranscodeOptions,
) -> Result<TranscodeReport> {
    let mut entries = Vec::new();
    for index in 0..archive.len() {
        let entry = archive
            .by_index(index)
            .with_context(|| format!("Reading archive entry {index}"))?;
        if entry.is_file() && entry.name().ends_with(RECORD_EXTENSION) {
            entries.push((index, entry.name().to_string()));
        }
    }

    let total = entries.len();
    let mut report = TranscodeReport::default();
    for (attempted, (index, name)) in entries.into_iter().enumerate() {
        let match_id = match_id_from_entry(&name);
        let status = match transcode_entry(archive, index, &match_id, output_dir, options) {
            Ok((path, rows)) => EntryStatus::Written { path, rows },
            Err(err) => {
                warn!("Skipping {name}: {err:#}");
                EntryStatus::Skipped {
                    reason: format!("{err:#}"),
                }
            }
        };
        report.outcomes.push(EntryOutcome {
            entry: name,
            match_id,
            status,
        });
        info!(
            "Progress: {:.2}%",
            (attempted + 1) as f64 / total as f64 * 100.0
        );
    }
    Ok(report)
}

fn transcode_entry<R: Read + Seek>(
    archive: &mut ZipArchive<R>,
    index: usize,
    match_id: &str,
    output_dir: &Path,
    options: TranscodeOptions,
) -> Result<(PathBuf, usize)> {
    let entry = archive
        .by_index(index)
        .with_context(|| format!("Opening archive entry {index}"))?;
    let table = record::parse_reader(entry, match_id)?;
    let table = enrich_with_policy(table, options.inning_policy)
        .with_context(|| format!("Enriching match {match_id}"))?;
    let path = output_dir.join(io_utils::table_file_name(match_id));
    io_utils::write_table(&path, &table)?;
    Ok((path, table.row_count()))
}

/// `data/t20s/211028.json` → `211028`.
pub fn match_id_from_entry(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or(name);
    base.strip_suffix(RECORD_EXTENSION)
        .unwrap_or(base)
        .to_string()
}
