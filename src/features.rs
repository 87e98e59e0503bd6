use std::fmt;

use clap::ValueEnum;
use once_cell::sync::Lazy;
use polars::prelude::{DataType, Series, col, lit};
use serde::Serialize;
use tracing::{info, warn};

use crate::errors::{FeatureError, TableError};
use crate::schema::{
    self, MATCH_ID, PROFILE_STATS, QUEUE_ID, ROLES, SIDE_BLUE, TEAM_SIDE, TEAM_WIN,
};
use crate::table::{Missing, Table};

pub const SIDE_BLUE_FEATURE: &str = "side_blue";

/// Team aggregates that are only known once the game is over.
pub const POST_GAME_FEATURES: [&str; 16] = [
    "team_kills",
    "team_deaths",
    "team_assists",
    "team_gold_earned",
    "team_gold_per_min",
    "team_damage_to_champions",
    "team_damage_per_min",
    "team_vision_score",
    "team_vision_score_per_min",
    "team_cs_total",
    "team_cs_per_min",
    "team_towers_destroyed",
    "team_inhibitors_destroyed",
    "team_dragons",
    "team_barons",
    "team_heralds",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum AblationMode {
    /// Side plus the ten drafted champions.
    Champs,
    /// Side plus recent-form stats for all ten players.
    Profiles,
    /// Champions, profiles and ally-minus-enemy deltas.
    Full,
}

impl fmt::Display for AblationMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            AblationMode::Champs => "champs",
            AblationMode::Profiles => "profiles",
            AblationMode::Full => "full",
        };
        f.write_str(name)
    }
}

fn champion_columns(side: &str) -> Vec<String> {
    ROLES
        .iter()
        .map(|role| format!("{side}_{role}_champion_id"))
        .collect()
}

fn profile_columns(side: &str) -> Vec<String> {
    ROLES
        .iter()
        .flat_map(|role| PROFILE_STATS.iter().map(move |stat| format!("{side}_{role}_{stat}")))
        .collect()
}

fn delta_name(role: &str, stat: &str) -> String {
    format!("{role}_diff_{stat}")
}

static DELTA_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    ROLES
        .iter()
        .flat_map(|role| PROFILE_STATS.iter().map(move |stat| delta_name(role, stat)))
        .collect()
});

static CHAMPS_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = vec![SIDE_BLUE_FEATURE.to_string()];
    cols.extend(champion_columns("ally"));
    cols.extend(champion_columns("enemy"));
    cols
});

static PROFILES_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = vec![SIDE_BLUE_FEATURE.to_string()];
    cols.extend(profile_columns("ally"));
    cols.extend(profile_columns("enemy"));
    cols
});

static FULL_COLUMNS: Lazy<Vec<String>> = Lazy::new(|| {
    let mut cols = vec![SIDE_BLUE_FEATURE.to_string()];
    cols.extend(champion_columns("ally"));
    cols.extend(champion_columns("enemy"));
    cols.extend(profile_columns("ally"));
    cols.extend(profile_columns("enemy"));
    cols.extend(DELTA_COLUMNS.iter().cloned());
    cols
});

/// Ordered feature columns for a mode.
pub fn feature_columns(mode: AblationMode) -> &'static [String] {
    match mode {
        AblationMode::Champs => &CHAMPS_COLUMNS,
        AblationMode::Profiles => &PROFILES_COLUMNS,
        AblationMode::Full => &FULL_COLUMNS,
    }
}

pub fn delta_columns() -> &'static [String] {
    &DELTA_COLUMNS
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BuildSummary {
    /// Rows in the table handed to the builder.
    pub input_rows: usize,
    /// Rows left after the ranked filter, before null cleaning.
    pub rows_before: usize,
    pub rows_after: usize,
    pub dropped: usize,
    /// Delta columns that were filled with nulls because an input was absent.
    pub missing_delta_inputs: Vec<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeatureMatrix {
    pub feature_names: Vec<String>,
    /// Row-major; NaN marks a missing cell.
    pub rows: Vec<Vec<f64>>,
    pub labels: Vec<u8>,
    /// `match_id` per row; a null id becomes the empty string.
    pub groups: Vec<String>,
    pub summary: BuildSummary,
}

impl FeatureMatrix {
    pub fn n_rows(&self) -> usize {
        self.rows.len()
    }

    pub fn n_features(&self) -> usize {
        self.feature_names.len()
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.feature_names.iter().position(|n| n == name)
    }

    pub fn subset(&self, indices: &[usize]) -> (Vec<Vec<f64>>, Vec<u8>) {
        let rows = indices.iter().map(|&i| self.rows[i].clone()).collect();
        let labels = indices.iter().map(|&i| self.labels[i]).collect();
        (rows, labels)
    }
}

/// `side_blue = 1` iff `team_side == "blue"`; a null side counts as red.
pub fn add_side_blue(table: &mut Table) -> Result<(), TableError> {
    table.require(TEAM_SIDE)?;
    table.with_exprs(vec![
        col(TEAM_SIDE)
            .eq(lit(SIDE_BLUE))
            .fill_null(lit(false))
            .cast(DataType::Int64)
            .alias(SIDE_BLUE_FEATURE),
    ])
}

/// Adds `{role}_diff_{stat} = ally - enemy` for every role and profile stat.
/// When either input column is absent the delta is added as an all-null
/// column and its name is returned.
pub fn add_delta_columns(table: &mut Table) -> Result<Vec<String>, TableError> {
    let mut missing = Vec::new();
    let mut deltas = Vec::new();
    for role in ROLES {
        for stat in PROFILE_STATS {
            let delta = delta_name(role, stat);
            let ally = format!("ally_{role}_{stat}");
            let enemy = format!("enemy_{role}_{stat}");

            if table.has_column(&ally) && table.has_column(&enemy) {
                deltas.push(
                    (col(ally.as_str()).cast(DataType::Float64)
                        - col(enemy.as_str()).cast(DataType::Float64))
                    .alias(delta.as_str()),
                );
            } else {
                warn!("missing columns for delta {delta}: {ally}, {enemy}; filled with nulls");
                table.push_column(Series::full_null(
                    delta.as_str().into(),
                    table.height(),
                    &DataType::Float64,
                ))?;
                missing.push(delta);
            }
        }
    }
    table.with_exprs(deltas)?;
    Ok(missing)
}

/// Ranked-only feature matrix for one ablation mode. Rows with a null or
/// NaN in any feature or the label are dropped.
pub fn build_feature_matrix(
    table: &Table,
    mode: AblationMode,
) -> Result<FeatureMatrix, FeatureError> {
    let mut ranked = schema::ranked_rows(table)?;
    info!(mode = %mode, rows = ranked.height(), "ranked rows loaded");

    let has_side = ranked.has_column(TEAM_SIDE);
    if has_side {
        add_side_blue(&mut ranked)?;
    }
    let missing_delta_inputs = if mode == AblationMode::Full {
        add_delta_columns(&mut ranked)?
    } else {
        Vec::new()
    };

    let features = feature_columns(mode);
    let mut required: Vec<&str> = features.iter().map(String::as_str).collect();
    required.push(TEAM_WIN);

    let missing: Vec<String> = required
        .iter()
        .chain([MATCH_ID].iter())
        .filter(|c| !ranked.has_column(c))
        .map(|c| {
            if *c == SIDE_BLUE_FEATURE && !has_side {
                TEAM_SIDE.to_string()
            } else {
                c.to_string()
            }
        })
        .collect();
    if !missing.is_empty() {
        return Err(FeatureError::MissingColumns(missing));
    }

    let (clean, dropped) = ranked.drop_nulls(&required, Missing::NullOrNan)?;
    info!(
        before = ranked.height(),
        after = clean.height(),
        dropped,
        "dropped rows with null features or label"
    );
    if clean.height() == 0 {
        return Err(FeatureError::EmptyMatrix {
            rows_before: ranked.height(),
        });
    }

    let summary = BuildSummary {
        input_rows: table.height(),
        rows_before: ranked.height(),
        rows_after: clean.height(),
        dropped,
        missing_delta_inputs,
    };
    assemble(&clean, features, summary)
}

/// Team-level baseline: side and the five champions, plus whatever
/// post-game aggregates exist unless `draft_only`.
pub fn build_team_matrix(table: &Table, draft_only: bool) -> Result<FeatureMatrix, FeatureError> {
    let ranked = if table.has_column(QUEUE_ID) {
        schema::ranked_rows(table)?
    } else {
        table.clone()
    };

    let champions: Vec<String> = ROLES
        .iter()
        .map(|role| format!("{role}_champion_id"))
        .collect();
    let mut required: Vec<&str> = vec![TEAM_SIDE, TEAM_WIN];
    required.extend(champions.iter().map(String::as_str));

    let missing: Vec<String> = [MATCH_ID]
        .iter()
        .chain(required.iter())
        .filter(|c| !ranked.has_column(c))
        .map(|c| c.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(FeatureError::MissingColumns(missing));
    }

    let (mut clean, dropped) = ranked.drop_nulls(&required, Missing::NullOrNan)?;
    info!(
        before = ranked.height(),
        after = clean.height(),
        dropped,
        "dropped rows with null champions, side or label"
    );
    if clean.height() == 0 {
        return Err(FeatureError::EmptyMatrix {
            rows_before: ranked.height(),
        });
    }
    add_side_blue(&mut clean)?;

    let mut features = vec![SIDE_BLUE_FEATURE.to_string()];
    features.extend(champions);
    if !draft_only {
        let post_game: Vec<String> = POST_GAME_FEATURES
            .iter()
            .filter(|c| clean.has_column(c))
            .map(|c| c.to_string())
            .collect();
        if !post_game.is_empty() {
            warn!(
                count = post_game.len(),
                "post-game team aggregates included; they leak the outcome"
            );
        }
        features.extend(post_game);
    }
    info!(features = features.len(), "team features selected");

    let summary = BuildSummary {
        input_rows: table.height(),
        rows_before: ranked.height(),
        rows_after: clean.height(),
        dropped,
        missing_delta_inputs: Vec::new(),
    };
    assemble(&clean, &features, summary)
}

fn assemble(
    table: &Table,
    features: &[String],
    summary: BuildSummary,
) -> Result<FeatureMatrix, FeatureError> {
    let columns = features
        .iter()
        .map(|name| table.f64_values(name))
        .collect::<Result<Vec<_>, _>>()?;
    let labels = table
        .f64_values(TEAM_WIN)?
        .into_iter()
        .map(|v| u8::from(v.is_some_and(|v| v > 0.5)))
        .collect();
    let groups = table
        .str_values(MATCH_ID)?
        .into_iter()
        .map(Option::unwrap_or_default)
        .collect();

    let rows = (0..table.height())
        .map(|i| columns.iter().map(|c| c[i].unwrap_or(f64::NAN)).collect())
        .collect();

    Ok(FeatureMatrix {
        feature_names: features.to_vec(),
        rows,
        labels,
        groups,
        summary,
    })
}

#[cfg(test)]
mod tests {
    use super::{AblationMode, delta_columns, feature_columns};

    #[test]
    fn catalog_sizes_per_mode() {
        assert_eq!(feature_columns(AblationMode::Champs).len(), 11);
        assert_eq!(feature_columns(AblationMode::Profiles).len(), 51);
        assert_eq!(feature_columns(AblationMode::Full).len(), 86);
        assert_eq!(delta_columns().len(), 25);
    }

    #[test]
    fn catalog_order_starts_with_side_then_champions() {
        let cols = feature_columns(AblationMode::Full);
        assert_eq!(cols[0], "side_blue");
        assert_eq!(cols[1], "ally_top_champion_id");
        assert_eq!(cols[10], "enemy_utility_champion_id");
        assert_eq!(cols[11], "ally_top_recent_games");
        assert_eq!(cols[85], "utility_diff_recent_vision_per_min");
    }
}
