//! Flattening of nested ball-by-ball match records into delivery rows.
//!
//! A match record is a JSON document with `innings[].overs[].deliveries[]`
//! plus an `info` block holding the season and a registry mapping player
//! display names to stable identifiers. Each delivery becomes exactly one
//! [`DeliveryRow`], in innings → overs → deliveries order.

use std::{collections::HashMap, io::Read};

use log::debug;
use serde::Deserialize;
use thiserror::Error;

use crate::frame::{Column, FrameError, Table};

pub const UNKNOWN_PLAYER: &str = "Unknown";

pub const DELIVERY_COLUMNS: [&str; 23] = [
    "match_id",
    "season",
    "team",
    "over",
    "batter",
    "batter_id",
    "bowler",
    "bowler_id",
    "non_striker",
    "non_striker_id",
    "wides",
    "noballs",
    "legbyes",
    "byes",
    "wicket",
    "player_out",
    "player_out_id",
    "fielders_name",
    "fielders_id",
    "wicket_type",
    "runs_batter",
    "runs_extras",
    "runs_total",
];

#[derive(Debug, Error)]
pub enum ParseError {
    #[error("Malformed match record '{match_id}': {source}")]
    Malformed {
        match_id: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("Assembling delivery table: {0}")]
    Frame(#[from] FrameError),
}

#[derive(Debug, Deserialize)]
struct RawMatch {
    innings: Vec<RawInning>,
    info: RawInfo,
}

#[derive(Debug, Deserialize)]
struct RawInfo {
    registry: RawRegistry,
    season: RawSeason,
}

#[derive(Debug, Deserialize)]
struct RawRegistry {
    people: HashMap<String, String>,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum RawSeason {
    Text(String),
    Number(serde_json::Number),
}

impl RawSeason {
    fn into_text(self) -> String {
        match self {
            RawSeason::Text(text) => text,
            RawSeason::Number(number) => number.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct RawInning {
    team: String,
    overs: Vec<RawOver>,
}

#[derive(Debug, Deserialize)]
struct RawOver {
    over: u32,
    deliveries: Vec<RawDelivery>,
}

#[derive(Debug, Deserialize)]
struct RawDelivery {
    batter: String,
    bowler: String,
    non_striker: String,
    runs: RawRuns,
    #[serde(default)]
    extras: RawExtras,
    #[serde(default)]
    wickets: Vec<RawWicket>,
}

#[derive(Debug, Deserialize)]
struct RawRuns {
    batter: u32,
    extras: u32,
    total: u32,
}

#[derive(Debug, Default, Deserialize)]
struct RawExtras {
    #[serde(default)]
    wides: u32,
    #[serde(default)]
    noballs: u32,
    #[serde(default)]
    legbyes: u32,
    #[serde(default)]
    byes: u32,
}

#[derive(Debug, Deserialize)]
struct RawWicket {
    player_out: String,
    kind: String,
    #[serde(default)]
    fielders: Vec<RawFielder>,
}

#[derive(Debug, Deserialize)]
struct RawFielder {
    #[serde(default)]
    name: Option<String>,
}

/// One ball bowled, flattened.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeliveryRow {
    pub match_id: String,
    pub season: String,
    pub team: String,
    pub over: u32,
    pub batter: String,
    pub batter_id: String,
    pub bowler: String,
    pub bowler_id: String,
    pub non_striker: String,
    pub non_striker_id: String,
    pub wides: u32,
    pub noballs: u32,
    pub legbyes: u32,
    pub byes: u32,
    pub wicket: u8,
    pub player_out: String,
    pub player_out_id: String,
    pub fielders_name: String,
    pub fielders_id: String,
    pub wicket_type: String,
    pub runs_batter: u32,
    pub runs_extras: u32,
    pub runs_total: u32,
}

struct Registry<'a>(&'a HashMap<String, String>);

impl Registry<'_> {
    fn resolve(&self, name: &str) -> String {
        self.0
            .get(name)
            .cloned()
            .unwrap_or_else(|| UNKNOWN_PLAYER.to_string())
    }

    /// Like [`Registry::resolve`], but an absent player stays empty.
    fn resolve_optional(&self, name: &str) -> String {
        if name.is_empty() {
            String::new()
        } else {
            self.resolve(name)
        }
    }
}

pub fn parse_deliveries(json: &str, match_id: &str) -> Result<Vec<DeliveryRow>, ParseError> {
    let record: RawMatch =
        serde_json::from_str(json).map_err(|source| ParseError::Malformed {
            match_id: match_id.to_string(),
            source,
        })?;
    Ok(flatten(record, match_id))
}

pub fn parse_reader<R: Read>(reader: R, match_id: &str) -> Result<Table, ParseError> {
    let record: RawMatch =
        serde_json::from_reader(reader).map_err(|source| ParseError::Malformed {
            match_id: match_id.to_string(),
            source,
        })?;
    Ok(rows_to_table(&flatten(record, match_id))?)
}

/// Parses one match record into its per-match delivery table.
pub fn parse(json: &str, match_id: &str) -> Result<Table, ParseError> {
    let rows = parse_deliveries(json, match_id)?;
    Ok(rows_to_table(&rows)?)
}

fn flatten(record: RawMatch, match_id: &str) -> Vec<DeliveryRow> {
    let registry = Registry(&record.info.registry.people);
    let season = record.info.season.into_text();
    let mut rows = Vec::new();

    for inning in &record.innings {
        for over in &inning.overs {
            for delivery in &over.deliveries {
                let wicket = delivery.wickets.first();
                if delivery.wickets.len() > 1 {
                    debug!(
                        "Match {match_id}: keeping the first of {} wicket events in over {} of {}",
                        delivery.wickets.len(),
                        over.over,
                        inning.team
                    );
                }
                let player_out = wicket.map(|w| w.player_out.clone()).unwrap_or_default();
                let fielders_name = wicket
                    .and_then(|w| w.fielders.first())
                    .and_then(|f| f.name.clone())
                    .unwrap_or_default();

                rows.push(DeliveryRow {
                    match_id: match_id.to_string(),
                    season: season.clone(),
                    team: inning.team.clone(),
                    over: over.over,
                    batter: delivery.batter.clone(),
                    batter_id: registry.resolve(&delivery.batter),
                    bowler: delivery.bowler.clone(),
                    bowler_id: registry.resolve(&delivery.bowler),
                    non_striker: delivery.non_striker.clone(),
                    non_striker_id: registry.resolve(&delivery.non_striker),
                    wides: delivery.extras.wides,
                    noballs: delivery.extras.noballs,
                    legbyes: delivery.extras.legbyes,
                    byes: delivery.extras.byes,
                    wicket: u8::from(wicket.is_some()),
                    player_out_id: registry.resolve_optional(&player_out),
                    player_out,
                    fielders_id: registry.resolve_optional(&fielders_name),
                    fielders_name,
                    wicket_type: wicket.map(|w| w.kind.clone()).unwrap_or_default(),
                    runs_batter: delivery.runs.batter,
                    runs_extras: delivery.runs.extras,
                    runs_total: delivery.runs.total,
                });
            }
        }
    }
    rows
}

/// Lays delivery rows out as a table with [`DELIVERY_COLUMNS`], in order.
/// Zero rows still yield every column.
pub fn rows_to_table(rows: &[DeliveryRow]) -> Result<Table, FrameError> {
    let text = |name: &str, get: fn(&DeliveryRow) -> &str| {
        Column::strings(name, rows.iter().map(|row| get(row).to_string()))
    };
    let count = |name: &str, get: fn(&DeliveryRow) -> u32| {
        Column::integers(name, rows.iter().map(|row| i64::from(get(row))))
    };
    let wicket = Column::integers("wicket", rows.iter().map(|row| i64::from(row.wicket)));

    let columns = vec![
        text("match_id", |r| r.match_id.as_str()),
        text("season", |r| r.season.as_str()),
        text("team", |r| r.team.as_str()),
        count("over", |r| r.over),
        text("batter", |r| r.batter.as_str()),
        text("batter_id", |r| r.batter_id.as_str()),
        text("bowler", |r| r.bowler.as_str()),
        text("bowler_id", |r| r.bowler_id.as_str()),
        text("non_striker", |r| r.non_striker.as_str()),
        text("non_striker_id", |r| r.non_striker_id.as_str()),
        count("wides", |r| r.wides),
        count("noballs", |r| r.noballs),
        count("legbyes", |r| r.legbyes),
        count("byes", |r| r.byes),
        wicket,
        text("player_out", |r| r.player_out.as_str()),
        text("player_out_id", |r| r.player_out_id.as_str()),
        text("fielders_name", |r| r.fielders_name.as_str()),
        text("fielders_id", |r| r.fielders_id.as_str()),
        text("wicket_type", |r| r.wicket_type.as_str()),
        count("runs_batter", |r| r.runs_batter),
        count("runs_extras", |r| r.runs_extras),
        count("runs_total", |r| r.runs_total),
    ];
    Table::from_columns(columns)
}
