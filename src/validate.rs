use std::path::{Path, PathBuf};

use polars::prelude::{DataType, col, len, lit};
use serde::Serialize;
use tracing::{debug, warn};

use crate::config::DataPaths;
use crate::schema::{
    self, GAMES_USED, MATCH_ID, PUUID, QUEUE_ID, RANKED_QUEUE_ID, ROLE, TEAM_ID, TEAM_SIDE,
    TEAM_WIN,
};
use crate::source::TableSource;
use crate::errors::TableError;
use crate::table::{Describe, Missing, NullCount, Table, is_numeric};

const TOP_NULL_COLUMNS: usize = 10;
const EXAMPLE_ROWS: usize = 5;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Severity {
    Ok,
    Warn,
    Error,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Check {
    FileReadable,
    ProfileKeyUnique,
    GamesUsedPresent,
    GamesUsedUpperBound,
    GamesUsedLowerBound,
    TwoRowsPerMatch,
    TwoTeamsPerMatch,
    RankedRowsPresent,
    OneRankedWinner,
    SideWinRate,
    ChampionColumnsPresent,
    HistoryColumnsPresent,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Finding {
    pub check: Check,
    pub severity: Severity,
    pub message: String,
    /// Offending rows, when the check can point at them.
    pub examples: Option<Table>,
}

impl Finding {
    fn new(check: Check, severity: Severity, message: impl Into<String>) -> Self {
        Self {
            check,
            severity,
            message: message.into(),
            examples: None,
        }
    }

    pub fn ok(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, Severity::Ok, message)
    }

    pub fn warn(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, Severity::Warn, message)
    }

    pub fn error(check: Check, message: impl Into<String>) -> Self {
        Self::new(check, Severity::Error, message)
    }

    fn with_examples(mut self, examples: Table) -> Self {
        self.examples = Some(examples);
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct SideWinRate {
    pub side: String,
    pub win_rate: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub enum Detail {
    GamesUsed(Describe),
    NullCounts {
        title: String,
        counts: Vec<NullCount>,
    },
    /// `(rows in a match, number of matches)`, by row count.
    RowsPerMatch(Vec<(i64, usize)>),
    SideWinRates(Vec<SideWinRate>),
    HistoryNulls {
        rows_with_nulls: usize,
        total_rows: usize,
    },
}

#[derive(Debug, Clone, PartialEq)]
pub enum Entry {
    Finding(Finding),
    Detail(Detail),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum DatasetKind {
    PlayerProfile,
    TeamOutcome,
    LobbyOutcome,
}

impl DatasetKind {
    pub fn title(self) -> &'static str {
        match self {
            DatasetKind::PlayerProfile => "PLAYER PROFILE",
            DatasetKind::TeamOutcome => "TEAM OUTCOME",
            DatasetKind::LobbyOutcome => "LOBBY OUTCOME",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Shape {
    pub rows: usize,
    pub columns: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct CheckReport {
    pub kind: DatasetKind,
    pub path: PathBuf,
    /// `None` when the table could not be loaded.
    pub shape: Option<Shape>,
    pub entries: Vec<Entry>,
}

impl CheckReport {
    pub fn findings(&self) -> impl Iterator<Item = &Finding> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Finding(f) => Some(f),
            Entry::Detail(_) => None,
        })
    }

    pub fn details(&self) -> impl Iterator<Item = &Detail> {
        self.entries.iter().filter_map(|e| match e {
            Entry::Detail(d) => Some(d),
            Entry::Finding(_) => None,
        })
    }

    pub fn finding(&self, check: Check) -> Option<&Finding> {
        self.findings().find(|f| f.check == check)
    }

    pub fn count(&self, severity: Severity) -> usize {
        self.findings().filter(|f| f.severity == severity).count()
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CheckOptions {
    /// Report shape only; skip every statistical check.
    pub form_only: bool,
    pub history_size: Option<i64>,
    pub min_matches: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CheckSelection {
    pub player_profile: bool,
    pub team_outcome: bool,
    pub lobby_outcome: bool,
}

impl CheckSelection {
    pub fn all() -> Self {
        Self {
            player_profile: true,
            team_outcome: true,
            lobby_outcome: true,
        }
    }

    /// Nothing selected means everything.
    pub fn or_all(self) -> Self {
        if self.player_profile || self.team_outcome || self.lobby_outcome {
            self
        } else {
            Self::all()
        }
    }
}

pub fn run_checks(
    source: &impl TableSource,
    paths: &DataPaths,
    selection: CheckSelection,
    options: &CheckOptions,
) -> Vec<CheckReport> {
    let selection = selection.or_all();
    let mut out = Vec::new();
    if selection.player_profile {
        out.push(run_check(
            source,
            DatasetKind::PlayerProfile,
            &paths.player_profile,
            options,
        ));
    }
    if selection.team_outcome {
        out.push(run_check(
            source,
            DatasetKind::TeamOutcome,
            &paths.team_outcome,
            options,
        ));
    }
    if selection.lobby_outcome {
        out.push(run_check(
            source,
            DatasetKind::LobbyOutcome,
            &paths.lobby_outcome,
            options,
        ));
    }
    out
}

/// Loads one table and runs its checklist. Load failures become a single
/// ERROR finding and the table is skipped.
pub fn run_check(
    source: &impl TableSource,
    kind: DatasetKind,
    path: &Path,
    options: &CheckOptions,
) -> CheckReport {
    let table = match source.load(path) {
        Ok(table) => table,
        Err(err) => {
            warn!("{} skipped: {err}", kind.title());
            return CheckReport {
                kind,
                path: path.to_path_buf(),
                shape: None,
                entries: vec![Entry::Finding(Finding::error(
                    Check::FileReadable,
                    err.to_string(),
                ))],
            };
        }
    };
    check_table(kind, path, &table, options)
}

pub fn check_table(
    kind: DatasetKind,
    path: &Path,
    table: &Table,
    options: &CheckOptions,
) -> CheckReport {
    debug!("checking {} ({} rows)", kind.title(), table.height());
    let shape = Shape {
        rows: table.height(),
        columns: table.column_names(),
    };
    let entries = if options.form_only {
        Vec::new()
    } else {
        match kind {
            DatasetKind::PlayerProfile => check_player_profile(table, options),
            DatasetKind::TeamOutcome => check_team_outcome(table),
            DatasetKind::LobbyOutcome => check_lobby_outcome(table),
        }
    };
    CheckReport {
        kind,
        path: path.to_path_buf(),
        shape: Some(shape),
        entries,
    }
}

pub fn check_player_profile(table: &Table, options: &CheckOptions) -> Vec<Entry> {
    let mut entries = Vec::new();

    // 1) (puuid, role) is a key
    entries.push(Entry::Finding(match table.distinct_count(&[PUUID, ROLE]) {
        Ok(distinct) => {
            let duplicates = table.height() - distinct;
            if duplicates > 0 {
                Finding::warn(
                    Check::ProfileKeyUnique,
                    format!(
                        "(puuid, role) is not unique: {duplicates} duplicate rows ({} rows, {distinct} distinct pairs)",
                        table.height()
                    ),
                )
            } else {
                Finding::ok(Check::ProfileKeyUnique, "(puuid, role) is a unique key")
            }
        }
        Err(err) => Finding::warn(
            Check::ProfileKeyUnique,
            format!("cannot check (puuid, role) uniqueness: {err}"),
        ),
    }));

    // 2) games_used against the profile builder's bounds
    entries.extend(check_games_used(table, options));

    // 3) null counts over numeric feature columns
    let numeric: Vec<String> = table
        .column_names()
        .into_iter()
        .filter(|c| c != GAMES_USED)
        .filter(|c| table.dtype(c).is_some_and(|t| is_numeric(&t)))
        .collect();
    if !numeric.is_empty() {
        let mut counts = table.null_counts(&numeric);
        counts.truncate(TOP_NULL_COLUMNS);
        entries.push(Entry::Detail(Detail::NullCounts {
            title: "Nulls per numeric column (top 10)".to_string(),
            counts,
        }));
    }

    entries
}

fn check_games_used(table: &Table, options: &CheckOptions) -> Vec<Entry> {
    let stats = match table.describe(GAMES_USED) {
        Ok(stats) => stats,
        Err(TableError::MissingColumn(_)) => {
            return vec![Entry::Finding(Finding::warn(
                Check::GamesUsedPresent,
                "'games_used' is missing from player_profile; history depth cannot be validated",
            ))];
        }
        Err(err) => {
            return vec![Entry::Finding(Finding::warn(
                Check::GamesUsedPresent,
                format!("cannot describe 'games_used': {err}"),
            ))];
        }
    };
    if stats.count == 0 {
        return vec![Entry::Finding(Finding::warn(
            Check::GamesUsedPresent,
            "'games_used' has no values",
        ))];
    }

    let mut entries = vec![Entry::Detail(Detail::GamesUsed(stats))];
    let gmin = stats.min as i64;
    let gmax = stats.max as i64;

    if let Some(history_size) = options.history_size {
        entries.push(Entry::Finding(if gmax > history_size {
            Finding::warn(
                Check::GamesUsedUpperBound,
                format!("games_used max={gmax} > history_size={history_size}"),
            )
        } else {
            Finding::ok(
                Check::GamesUsedUpperBound,
                format!("games_used <= history_size={history_size} (max={gmax})"),
            )
        }));
    }

    if let Some(min_matches) = options.min_matches {
        entries.push(Entry::Finding(if gmin < min_matches {
            Finding::warn(
                Check::GamesUsedLowerBound,
                format!("games_used min={gmin} < min_matches={min_matches}"),
            )
        } else {
            Finding::ok(
                Check::GamesUsedLowerBound,
                format!("games_used >= min_matches={min_matches} (min={gmin})"),
            )
        }));
    }

    entries
}

pub fn check_team_outcome(table: &Table) -> Vec<Entry> {
    let mut entries = check_rows_per_match(table);

    // 2) two distinct team ids per match
    let teams = table
        .group_agg(&[MATCH_ID], vec![col(TEAM_ID).n_unique().alias("teams")])
        .and_then(|per_match| per_match.filter(col("teams").neq(lit(2))));
    entries.push(Entry::Finding(match teams {
        Ok(bad) => {
            if bad.height() > 0 {
                Finding::warn(
                    Check::TwoTeamsPerMatch,
                    format!(
                        "{} match_id values do not have 2 distinct team_id",
                        bad.height()
                    ),
                )
                .with_examples(bad.head(EXAMPLE_ROWS))
            } else {
                Finding::ok(
                    Check::TwoTeamsPerMatch,
                    "every match_id has 2 distinct team_id",
                )
            }
        }
        Err(err) => Finding::warn(
            Check::TwoTeamsPerMatch,
            format!("cannot check team ids: {err}"),
        ),
    }));

    // 3) one winner per ranked match, 4) side win rate
    entries.extend(check_ranked_outcomes(table));
    entries
}

fn check_ranked_outcomes(table: &Table) -> Vec<Entry> {
    if !table.has_column(QUEUE_ID) {
        return vec![Entry::Finding(Finding::warn(
            Check::RankedRowsPresent,
            "'queue_id' is missing; ranked checks skipped",
        ))];
    }
    let ranked = match schema::ranked_rows(table) {
        Ok(ranked) => ranked,
        Err(err) => {
            return vec![Entry::Finding(Finding::warn(
                Check::RankedRowsPresent,
                format!("cannot filter ranked rows: {err}"),
            ))];
        }
    };
    if ranked.height() == 0 {
        return vec![Entry::Finding(Finding::warn(
            Check::RankedRowsPresent,
            format!("no rows with queue_id={RANKED_QUEUE_ID}"),
        ))];
    }

    let mut entries = Vec::new();
    let wins = ranked
        .group_agg(
            &[MATCH_ID],
            vec![col(TEAM_WIN).cast(DataType::Int64).sum().alias("wins_sum")],
        )
        .and_then(|per_match| per_match.filter(col("wins_sum").neq(lit(1))));
    entries.push(Entry::Finding(match wins {
        Ok(bad) => {
            if bad.height() > 0 {
                Finding::warn(
                    Check::OneRankedWinner,
                    format!(
                        "{} ranked match_id values have wins_sum != 1",
                        bad.height()
                    ),
                )
                .with_examples(bad.head(EXAMPLE_ROWS))
            } else {
                Finding::ok(
                    Check::OneRankedWinner,
                    "ranked matches always have exactly one team_win",
                )
            }
        }
        Err(err) => Finding::warn(
            Check::OneRankedWinner,
            format!("cannot check ranked winners: {err}"),
        ),
    }));

    match side_win_rates(&ranked) {
        Ok(rates) => entries.push(Entry::Detail(Detail::SideWinRates(rates))),
        Err(err) => entries.push(Entry::Finding(Finding::warn(
            Check::SideWinRate,
            format!("cannot compute side win rate: {err}"),
        ))),
    }
    entries
}

pub fn check_lobby_outcome(table: &Table) -> Vec<Entry> {
    let mut entries = check_rows_per_match(table);

    let champions = schema::champion_columns(table);
    if champions.is_empty() {
        entries.push(Entry::Finding(Finding::warn(
            Check::ChampionColumnsPresent,
            "no *_champion_id columns in lobby_outcome",
        )));
    } else {
        let mut counts = table.null_counts(&champions);
        counts.truncate(TOP_NULL_COLUMNS);
        entries.push(Entry::Detail(Detail::NullCounts {
            title: "Nulls in *_champion_id columns (top 10)".to_string(),
            counts,
        }));
    }

    let history = schema::history_columns(table);
    if history.is_empty() {
        entries.push(Entry::Finding(Finding::warn(
            Check::HistoryColumnsPresent,
            "no recent_* columns in lobby_outcome; was the profile join run?",
        )));
    } else {
        let rows_with_nulls = count_rows_with_any_null(table, &history);
        entries.push(Entry::Detail(Detail::HistoryNulls {
            rows_with_nulls,
            total_rows: table.height(),
        }));
    }
    entries
}

fn side_win_rates(ranked: &Table) -> Result<Vec<SideWinRate>, TableError> {
    let per_side = ranked.group_agg(
        &[TEAM_SIDE],
        vec![col(TEAM_WIN).cast(DataType::Float64).mean().alias("win_rate")],
    )?;
    let sides = per_side.str_values(TEAM_SIDE)?;
    let rates = per_side.f64_values("win_rate")?;
    let mut out: Vec<SideWinRate> = sides
        .into_iter()
        .zip(rates)
        .map(|(side, rate)| SideWinRate {
            side: side.unwrap_or_else(|| "null".to_string()),
            win_rate: rate.unwrap_or(f64::NAN),
        })
        .collect();
    out.sort_by(|a, b| a.side.cmp(&b.side));
    Ok(out)
}

fn check_rows_per_match(table: &Table) -> Vec<Entry> {
    let per_match = table.group_agg(&[MATCH_ID], vec![len().alias("rows")]);
    let per_match = match per_match {
        Ok(t) => t,
        Err(err) => {
            return vec![Entry::Finding(Finding::warn(
                Check::TwoRowsPerMatch,
                format!("cannot check rows per match: {err}"),
            ))];
        }
    };

    let mut entries = Vec::new();
    if let Ok(distribution) = per_match.value_counts("rows") {
        entries.push(Entry::Detail(Detail::RowsPerMatch(
            distribution
                .into_iter()
                .filter_map(|(rows, matches)| rows.map(|r| (r, matches)))
                .collect(),
        )));
    }
    let bad = match per_match.filter(col("rows").neq(lit(2))) {
        Ok(bad) => bad,
        Err(err) => {
            entries.push(Entry::Finding(Finding::warn(
                Check::TwoRowsPerMatch,
                format!("cannot check rows per match: {err}"),
            )));
            return entries;
        }
    };
    entries.push(Entry::Finding(if bad.height() > 0 {
        Finding::warn(
            Check::TwoRowsPerMatch,
            format!("{} match_id values do not have 2 rows", bad.height()),
        )
        .with_examples(bad.head(EXAMPLE_ROWS))
    } else {
        Finding::ok(Check::TwoRowsPerMatch, "every match_id has 2 rows")
    }));
    entries
}

/// Rows holding a null in any of `columns`. NaN floats are values here.
pub fn count_rows_with_any_null<S: AsRef<str>>(table: &Table, columns: &[S]) -> usize {
    table
        .drop_nulls(columns, Missing::Null)
        .map(|(_, dropped)| dropped)
        .unwrap_or(0)
}
