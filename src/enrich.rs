//! Derived per-delivery columns for a single match table.

use std::collections::HashMap;

use clap::ValueEnum;
use itertools::Itertools;
use thiserror::Error;

use crate::frame::{Column, FrameError, Table};

pub const TEAM_COLUMN: &str = "team";
pub const OVER_COLUMN: &str = "over";
pub const RUNS_TOTAL_COLUMN: &str = "runs_total";

pub const TEAM_OVER_COLUMN: &str = "team_over";
pub const OVER_BALL_COLUMN: &str = "over_ball";
pub const INNING_COLUMN: &str = "inning";
pub const RUNS_CUMULATIVE_COLUMN: &str = "runs_cumulative";
pub const POWERPLAY_COLUMN: &str = "powerplay";

/// Overs are numbered from zero, so the powerplay is overs 0 through 5.
pub const POWERPLAY_LAST_OVER: i64 = 5;

const REQUIRED_COLUMNS: [&str; 3] = [TEAM_COLUMN, OVER_COLUMN, RUNS_TOTAL_COLUMN];

/// How `inning` is assigned from the teams seen in a table.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, ValueEnum)]
#[value(rename_all = "kebab-case")]
pub enum InningPolicy {
    /// The first row's team bats inning 1; every other team is inning 2.
    #[default]
    FirstTeam,
    /// As `FirstTeam`, but more than two distinct teams is an error.
    StrictTwoTeams,
}

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EnrichError {
    #[error("Columns are missing: '{column}' is required")]
    MissingColumn { column: String },
    #[error("Cannot enrich a table with no deliveries")]
    EmptyTable,
    #[error("Row {row} has no usable value in column '{column}'")]
    InvalidValue { column: String, row: usize },
    #[error("Found {found} distinct teams but inning assignment allows at most 2")]
    TooManyTeams { found: usize },
    #[error(transparent)]
    Frame(#[from] FrameError),
}

/// Appends `team_over`, `over_ball`, `inning`, `runs_cumulative` and
/// `powerplay` using the default [`InningPolicy`].
pub fn enrich(table: Table) -> Result<Table, EnrichError> {
    enrich_with_policy(table, InningPolicy::default())
}

pub fn enrich_with_policy(mut table: Table, policy: InningPolicy) -> Result<Table, EnrichError> {
    if let Some(missing) = REQUIRED_COLUMNS.iter().find(|name| !table.contains(name)) {
        return Err(EnrichError::MissingColumn {
            column: missing.to_string(),
        });
    }
    if table.is_empty() {
        return Err(EnrichError::EmptyTable);
    }

    let teams = text_values(&table, TEAM_COLUMN)?;
    let overs = integer_values(&table, OVER_COLUMN)?;
    let runs = integer_values(&table, RUNS_TOTAL_COLUMN)?;

    let first_team = &teams[0];
    if policy == InningPolicy::StrictTwoTeams {
        let found = teams.iter().unique().count();
        if found > 2 {
            return Err(EnrichError::TooManyTeams { found });
        }
    }

    let team_overs = teams
        .iter()
        .zip(&overs)
        .map(|(team, over)| format!("{team}_{over}"))
        .collect::<Vec<_>>();

    let mut balls_seen: HashMap<&str, i64> = HashMap::new();
    let over_balls = team_overs
        .iter()
        .map(|team_over| {
            let seen = balls_seen.entry(team_over.as_str()).or_insert(0);
            *seen += 1;
            *seen
        })
        .collect::<Vec<_>>();

    let innings = teams
        .iter()
        .map(|team| if team == first_team { 1 } else { 2 })
        .collect::<Vec<i64>>();

    let mut running = [0i64; 2];
    let cumulative = innings
        .iter()
        .zip(&runs)
        .map(|(inning, runs)| {
            let slot = &mut running[(*inning - 1) as usize];
            *slot += runs;
            *slot
        })
        .collect::<Vec<_>>();

    let powerplay = overs
        .iter()
        .map(|over| i64::from(*over <= POWERPLAY_LAST_OVER))
        .collect::<Vec<_>>();

    let derived = [
        Column::strings(TEAM_OVER_COLUMN, team_overs),
        Column::integers(OVER_BALL_COLUMN, over_balls),
        Column::integers(INNING_COLUMN, innings),
        Column::integers(RUNS_CUMULATIVE_COLUMN, cumulative),
        Column::integers(POWERPLAY_COLUMN, powerplay),
    ];
    for column in derived {
        table.set_column(column)?;
    }
    Ok(table)
}

fn text_values(table: &Table, name: &str) -> Result<Vec<String>, EnrichError> {
    let column = required(table, name)?;
    (0..column.len())
        .map(|row| {
            column
                .get(row)
                .map(|value| value.as_display())
                .ok_or_else(|| invalid(name, row))
        })
        .collect()
}

fn integer_values(table: &Table, name: &str) -> Result<Vec<i64>, EnrichError> {
    let column = required(table, name)?;
    (0..column.len())
        .map(|row| {
            column
                .get(row)
                .and_then(|value| value.as_i64())
                .ok_or_else(|| invalid(name, row))
        })
        .collect()
}

fn required<'a>(table: &'a Table, name: &str) -> Result<&'a Column, EnrichError> {
    table.column(name).ok_or_else(|| EnrichError::MissingColumn {
        column: name.to_string(),
    })
}

fn invalid(column: &str, row: usize) -> EnrichError {
    EnrichError::InvalidValue {
        column: column.to_string(),
        row,
    }
}
