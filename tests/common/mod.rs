#![allow(dead_code)]

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use serde_json::{Value, json};
use tempfile::{TempDir, tempdir};
use zip::{ZipWriter, write::SimpleFileOptions};

/// Scratch directory helper that cleans up files automatically on drop.
pub struct TestWorkspace {
    temp_dir: TempDir,
}

impl TestWorkspace {
    /// Creates a fresh scratch directory for the current test case.
    pub fn new() -> Self {
        Self {
            temp_dir: tempdir().expect("temp dir"),
        }
    }

    /// Returns the root path for all files owned by this workspace.
    pub fn path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Writes `contents` into a file under the workspace and returns the path.
    pub fn write(&self, name: &str, contents: &str) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create parent dirs");
        }
        let mut file = File::create(&path).expect("create temp file");
        file.write_all(contents.as_bytes())
            .expect("write temp file contents");
        path
    }

    /// Builds a zip archive under the workspace from `(entry name, contents)` pairs.
    pub fn zip(&self, name: &str, entries: &[(&str, String)]) -> PathBuf {
        let path = self.temp_dir.path().join(name);
        let file = File::create(&path).expect("create archive");
        let mut writer = ZipWriter::new(file);
        for (entry, contents) in entries {
            writer
                .start_file(*entry, SimpleFileOptions::default())
                .expect("start zip entry");
            writer
                .write_all(contents.as_bytes())
                .expect("write zip entry");
        }
        writer.finish().expect("finish archive");
        path
    }
}

/// A delivery with no extras and no wicket.
pub fn ball(batter: &str, bowler: &str, runs: u32) -> Value {
    json!({
        "batter": batter,
        "bowler": bowler,
        "non_striker": "Runner",
        "runs": { "batter": runs, "extras": 0, "total": runs }
    })
}

/// A delivery on which `batter` is caught by `fielder`.
pub fn caught(batter: &str, bowler: &str, fielder: &str) -> Value {
    json!({
        "batter": batter,
        "bowler": bowler,
        "non_striker": "Runner",
        "runs": { "batter": 0, "extras": 0, "total": 0 },
        "wickets": [ { "player_out": batter, "kind": "caught", "fielders": [ { "name": fielder } ] } ]
    })
}

/// A match record JSON document; `innings` is `(team, overs)` with each
/// over given as a list of deliveries.
pub fn match_record(season: Value, innings: &[(&str, Vec<Vec<Value>>)]) -> String {
    let innings = innings
        .iter()
        .map(|(team, overs)| {
            let overs = overs
                .iter()
                .enumerate()
                .map(|(over, deliveries)| json!({ "over": over, "deliveries": deliveries }))
                .collect::<Vec<_>>();
            json!({ "team": team, "overs": overs })
        })
        .collect::<Vec<_>>();
    json!({
        "info": {
            "season": season,
            "registry": { "people": {
                "Opener": "p001",
                "Quick": "p002",
                "Runner": "p003",
                "Keeper": "p004"
            }}
        },
        "innings": innings
    })
    .to_string()
}

/// Two innings of two overs each, with one wicket in the second inning.
pub fn standard_match(season: Value) -> String {
    match_record(
        season,
        &[
            (
                "India",
                vec![
                    vec![ball("Opener", "Quick", 1), ball("Opener", "Quick", 4)],
                    vec![ball("Opener", "Quick", 0)],
                ],
            ),
            (
                "Australia",
                vec![
                    vec![ball("Opener", "Quick", 6), caught("Opener", "Quick", "Keeper")],
                    vec![ball("Opener", "Quick", 2)],
                ],
            ),
        ],
    )
}
