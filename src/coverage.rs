use std::path::{Path, PathBuf};
use std::sync::mpsc::{Receiver, RecvTimeoutError};
use std::time::Duration;

use polars::prelude::{DataType, col, lit};
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{DataPaths, EXCELLENT_COMPLETE_ROWS, VIABLE_COMPLETE_ROWS};
use crate::schema::{self, GAMES_USED};
use crate::source::TableSource;
use crate::table::{Missing, Table};

pub const PROFILE_DEPTHS: [i64; 3] = [5, 10, 20];

/// Participants per match; converts match counts into profile demand.
const PLAYERS_PER_MATCH: f64 = 10.0;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub enum Section<T> {
    Loaded(T),
    Unavailable { path: PathBuf, reason: String },
}

impl<T> Section<T> {
    pub fn loaded(&self) -> Option<&T> {
        match self {
            Section::Loaded(v) => Some(v),
            Section::Unavailable { .. } => None,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct MatchStats {
    pub total: usize,
    pub ranked: usize,
    pub ranked_fraction: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfileDepth {
    pub min_games: i64,
    pub count: usize,
    pub fraction: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileStats {
    pub total: usize,
    /// Empty when the table has no `games_used` column.
    pub depth: Vec<ProfileDepth>,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct LobbyStats {
    pub rows: usize,
    pub history_columns: usize,
    /// Rows with every history column populated.
    pub complete_rows: usize,
    pub coverage_ratio: f64,
    pub complete_matches: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Sufficiency {
    Insufficient { short_of_viable: u64 },
    Viable { short_of_excellent: u64 },
    Excellent,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Projection {
    pub coverage_rate: f64,
    pub matches_needed_viable: u64,
    pub matches_needed_excellent: u64,
    pub profiles_needed: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoverageReport {
    pub matches: Section<MatchStats>,
    pub players: Section<usize>,
    pub profiles: Section<ProfileStats>,
    pub lobby: Section<LobbyStats>,
    /// Present only when the lobby table has history columns.
    pub sufficiency: Option<Sufficiency>,
    pub projection: Option<Projection>,
}

pub fn classify_sufficiency(current: u64, viable: u64, excellent: u64) -> Sufficiency {
    if current >= excellent {
        Sufficiency::Excellent
    } else if current >= viable {
        Sufficiency::Viable {
            short_of_excellent: excellent - current,
        }
    } else {
        Sufficiency::Insufficient {
            short_of_viable: viable - current,
        }
    }
}

/// Rough demand estimate from the current complete-row yield per match.
/// `None` unless there are matches, profiles and a positive yield.
pub fn project(
    total_matches: usize,
    total_profiles: usize,
    complete_rows: usize,
) -> Option<Projection> {
    if total_matches == 0 || total_profiles == 0 {
        return None;
    }
    let coverage_rate = complete_rows as f64 / (total_matches as f64 * 2.0);
    if coverage_rate <= 0.0 {
        return None;
    }
    let needed = |threshold: u64| (threshold as f64 / coverage_rate / 2.0) as u64;
    let matches_needed_viable = needed(VIABLE_COMPLETE_ROWS);
    let matches_needed_excellent = needed(EXCELLENT_COMPLETE_ROWS);
    let matches_per_profile = total_matches as f64 / total_profiles as f64;
    let profiles_needed =
        (matches_needed_excellent as f64 * PLAYERS_PER_MATCH / matches_per_profile) as u64;

    Some(Projection {
        coverage_rate,
        matches_needed_viable,
        matches_needed_excellent,
        profiles_needed,
    })
}

fn load_section<T>(
    source: &impl TableSource,
    path: &Path,
    summarize: impl FnOnce(&Table) -> T,
) -> Section<T> {
    match source.load(path) {
        Ok(table) => Section::Loaded(summarize(&table)),
        Err(err) => {
            debug!("coverage section unavailable: {err}");
            Section::Unavailable {
                path: path.to_path_buf(),
                reason: err.to_string(),
            }
        }
    }
}

pub fn match_stats(table: &Table) -> MatchStats {
    let total = table.height();
    let ranked = schema::ranked_rows(table).map_or(0, |t| t.height());
    MatchStats {
        total,
        ranked,
        ranked_fraction: fraction(ranked, total),
    }
}

pub fn profile_stats(table: &Table) -> ProfileStats {
    let total = table.height();
    let depth = if table.has_column(GAMES_USED) {
        PROFILE_DEPTHS
            .iter()
            .map(|&min_games| {
                let count = table
                    .filter(
                        col(GAMES_USED)
                            .cast(DataType::Float64)
                            .gt_eq(lit(min_games as f64)),
                    )
                    .map_or(0, |t| t.height());
                ProfileDepth {
                    min_games,
                    count,
                    fraction: fraction(count, total),
                }
            })
            .collect()
    } else {
        Vec::new()
    };
    ProfileStats { total, depth }
}

/// A row is complete when none of its history cells is null.
pub fn lobby_stats(table: &Table) -> LobbyStats {
    let rows = table.height();
    let history = schema::history_columns(table);
    let complete_rows = if history.is_empty() {
        0
    } else {
        table
            .drop_nulls(&history, Missing::Null)
            .map(|(complete, _)| complete.height())
            .unwrap_or(0)
    };
    LobbyStats {
        rows,
        history_columns: history.len(),
        complete_rows,
        coverage_ratio: fraction(complete_rows, rows),
        complete_matches: complete_rows / 2,
    }
}

/// One stateless pass over the four tables. Each table is loaded on its
/// own; a failure only blanks its section.
pub fn analyze(source: &impl TableSource, paths: &DataPaths) -> CoverageReport {
    let matches = load_section(source, &paths.matches, match_stats);
    let players = load_section(source, &paths.players, Table::height);
    let profiles = load_section(source, &paths.player_profile, profile_stats);
    let lobby = load_section(source, &paths.lobby_outcome, lobby_stats);

    let (sufficiency, projection) = match lobby.loaded() {
        Some(stats) if stats.history_columns > 0 => {
            let total_matches = matches.loaded().map_or(0, |m| m.total);
            let total_profiles = profiles.loaded().map_or(0, |p| p.total);
            (
                Some(classify_sufficiency(
                    stats.complete_rows as u64,
                    VIABLE_COMPLETE_ROWS,
                    EXCELLENT_COMPLETE_ROWS,
                )),
                project(total_matches, total_profiles, stats.complete_rows),
            )
        }
        _ => (None, None),
    };

    CoverageReport {
        matches,
        players,
        profiles,
        lobby,
        sufficiency,
        projection,
    }
}

/// Re-runs `analyze` every `interval` until a stop message arrives, the
/// sender is dropped, or `max_iterations` passes have been emitted.
/// Returns the number of passes.
pub fn watch(
    source: &impl TableSource,
    paths: &DataPaths,
    interval: Duration,
    stop: &Receiver<()>,
    max_iterations: Option<usize>,
    mut on_report: impl FnMut(&CoverageReport),
) -> usize {
    let mut iterations = 0;
    loop {
        on_report(&analyze(source, paths));
        iterations += 1;
        if max_iterations.is_some_and(|max| iterations >= max) {
            break;
        }
        match stop.recv_timeout(interval) {
            Err(RecvTimeoutError::Timeout) => continue,
            Ok(()) | Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    info!(iterations, "coverage monitor stopped");
    iterations
}

fn fraction(part: usize, whole: usize) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

#[cfg(test)]
mod tests {
    use super::{Sufficiency, classify_sufficiency, project};

    #[test]
    fn boundaries_are_inclusive() {
        assert_eq!(classify_sufficiency(200_000, 100_000, 200_000), Sufficiency::Excellent);
        assert_eq!(
            classify_sufficiency(100_000, 100_000, 200_000),
            Sufficiency::Viable {
                short_of_excellent: 100_000
            }
        );
        assert_eq!(
            classify_sufficiency(0, 100_000, 200_000),
            Sufficiency::Insufficient {
                short_of_viable: 100_000
            }
        );
    }

    #[test]
    fn projection_uses_two_rows_per_match() {
        // 1000 matches, 500 complete rows => 25% of rows complete
        let p = project(1_000, 2_000, 500).unwrap();
        assert!((p.coverage_rate - 0.25).abs() < 1e-12);
        assert_eq!(p.matches_needed_viable, 200_000);
        assert_eq!(p.matches_needed_excellent, 400_000);
        // 0.5 matches per profile
        assert_eq!(p.profiles_needed, 8_000_000);
    }

    #[test]
    fn projection_needs_positive_inputs() {
        assert!(project(0, 10, 10).is_none());
        assert!(project(10, 0, 10).is_none());
        assert!(project(10, 10, 0).is_none());
    }
}
