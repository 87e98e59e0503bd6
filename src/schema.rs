use polars::prelude::{DataType, Expr, col, lit};

use crate::errors::TableError;
use crate::table::Table;

pub const RANKED_QUEUE_ID: i64 = 420;

pub const MATCH_ID: &str = "match_id";
pub const QUEUE_ID: &str = "queue_id";
pub const TEAM_ID: &str = "team_id";
pub const TEAM_SIDE: &str = "team_side";
pub const TEAM_WIN: &str = "team_win";
pub const PUUID: &str = "puuid";
pub const ROLE: &str = "role";
pub const GAMES_USED: &str = "games_used";

pub const SIDE_BLUE: &str = "blue";

pub const ROLES: [&str; 5] = ["top", "jungle", "middle", "bottom", "utility"];

pub const PROFILE_STATS: [&str; 5] = [
    "recent_games",
    "recent_winrate",
    "recent_gold_per_min",
    "recent_damage_per_min",
    "recent_vision_per_min",
];

/// Any column carrying trailing-window history for a participant.
pub fn is_history_column(name: &str) -> bool {
    name.contains("recent_")
}

pub fn is_champion_column(name: &str) -> bool {
    name.ends_with("_champion_id")
}

pub fn history_columns(table: &Table) -> Vec<String> {
    table
        .column_names()
        .into_iter()
        .filter(|c| is_history_column(c))
        .collect()
}

pub fn champion_columns(table: &Table) -> Vec<String> {
    table
        .column_names()
        .into_iter()
        .filter(|c| is_champion_column(c))
        .collect()
}

/// `queue_id == 420`, compared numerically so float-typed ids match too.
pub fn is_ranked() -> Expr {
    col(QUEUE_ID)
        .cast(DataType::Float64)
        .eq(lit(RANKED_QUEUE_ID as f64))
}

pub fn ranked_rows(table: &Table) -> Result<Table, TableError> {
    table.require(QUEUE_ID)?;
    table.filter(is_ranked())
}

#[cfg(test)]
mod tests {
    use polars::prelude::Column;

    use super::ranked_rows;
    use crate::table::Table;

    #[test]
    fn float_queue_ids_are_ranked() {
        let table = Table::from_columns(vec![Column::new(
            "queue_id".into(),
            &[Some(420.0), Some(440.0), None, Some(420.0)],
        )])
        .unwrap();
        assert_eq!(ranked_rows(&table).unwrap().height(), 2);
    }

    #[test]
    fn missing_queue_id_is_an_error() {
        let table =
            Table::from_columns(vec![Column::new("match_id".into(), &["a"])]).unwrap();
        assert!(ranked_rows(&table).is_err());
    }
}
