#![allow(dead_code)]

use polars::prelude::Column;

use lobby_kraken::schema::{PROFILE_STATS, RANKED_QUEUE_ID, ROLES};
use lobby_kraken::table::Table;

pub fn strs(name: &str, values: &[&str]) -> Column {
    Column::new(name.into(), values)
}

pub fn ints(name: &str, values: &[i64]) -> Column {
    Column::new(name.into(), values)
}

pub fn floats(name: &str, values: &[f64]) -> Column {
    Column::new(name.into(), values)
}

pub fn opt_floats(name: &str, values: &[Option<f64>]) -> Column {
    Column::new(name.into(), values)
}

pub fn bools(name: &str, values: &[bool]) -> Column {
    Column::new(name.into(), values)
}

pub fn table(columns: Vec<Column>) -> Table {
    Table::from_columns(columns).expect("equal column lengths")
}

/// Copy of `table` without the named columns.
pub fn without(table: &Table, drop: &[&str]) -> Table {
    let kept: Vec<Column> = table
        .frame()
        .get_columns()
        .iter()
        .filter(|c| !drop.contains(&c.name().as_str()))
        .cloned()
        .collect();
    Table::from_columns(kept).expect("columns from one table")
}

/// Two rows per match (blue then red), ranked, complete history.
/// Blue wins even-numbered matches. Profile stats are derived from the
/// match index so blue's `recent_winrate` is higher whenever it wins.
pub fn lobby_table(matches: usize) -> Table {
    let n = matches * 2;
    let mut match_ids = Vec::with_capacity(n);
    let mut sides = Vec::with_capacity(n);
    let mut wins = Vec::with_capacity(n);
    for m in 0..matches {
        let blue_wins = m % 2 == 0;
        for (side, win) in [("blue", blue_wins), ("red", !blue_wins)] {
            match_ids.push(format!("EUW1_{m:04}"));
            sides.push(side);
            wins.push(win);
        }
    }
    let match_refs: Vec<&str> = match_ids.iter().map(String::as_str).collect();

    let mut t = table(vec![
        strs("match_id", &match_refs),
        ints("queue_id", &vec![RANKED_QUEUE_ID; n]),
        strs("team_side", &sides),
        bools("team_win", &wins),
    ]);

    for (r, role) in ROLES.iter().enumerate() {
        let ally: Vec<i64> = (0..n).map(|i| 1 + ((i * 7 + r * 13) % 160) as i64).collect();
        let enemy: Vec<i64> = (0..n).map(|i| 1 + ((i * 11 + r * 17) % 160) as i64).collect();
        t.push_column(ints(&format!("ally_{role}_champion_id"), &ally))
            .unwrap();
        t.push_column(ints(&format!("enemy_{role}_champion_id"), &enemy))
            .unwrap();
    }

    for role in ROLES {
        for (s, stat) in PROFILE_STATS.iter().enumerate() {
            let ally: Vec<f64> = wins
                .iter()
                .enumerate()
                .map(|(i, &w)| stat_value(s, i, w))
                .collect();
            let enemy: Vec<f64> = wins
                .iter()
                .enumerate()
                .map(|(i, &w)| stat_value(s, i + 1, !w))
                .collect();
            t.push_column(floats(&format!("ally_{role}_{stat}"), &ally))
                .unwrap();
            t.push_column(floats(&format!("enemy_{role}_{stat}"), &enemy))
                .unwrap();
        }
    }
    t
}

fn stat_value(stat: usize, row: usize, strong: bool) -> f64 {
    let jitter = (row % 5) as f64 * 0.01;
    let base = if strong { 0.58 } else { 0.44 };
    match stat {
        0 => 10.0 + (row % 7) as f64,
        1 => base + jitter,
        2 => 380.0 + base * 100.0 + jitter,
        3 => 600.0 + base * 200.0,
        _ => 0.9 + jitter,
    }
}

/// Team-outcome rows from `(match_id, team_id, side, win)` tuples, all ranked.
pub fn team_table(rows: &[(&str, i64, &str, bool)]) -> Table {
    let n = rows.len();
    let mut t = table(vec![
        strs("match_id", &rows.iter().map(|r| r.0).collect::<Vec<_>>()),
        ints("queue_id", &vec![RANKED_QUEUE_ID; n]),
        ints("team_id", &rows.iter().map(|r| r.1).collect::<Vec<_>>()),
        strs("team_side", &rows.iter().map(|r| r.2).collect::<Vec<_>>()),
        bools("team_win", &rows.iter().map(|r| r.3).collect::<Vec<_>>()),
    ]);
    for (r, role) in ROLES.iter().enumerate() {
        let champs: Vec<i64> = (0..n).map(|i| 1 + ((i * 5 + r * 29) % 150) as i64).collect();
        t.push_column(ints(&format!("{role}_champion_id"), &champs))
            .unwrap();
    }
    t
}

/// A well-formed team table: two rows per match, blue wins even matches.
pub fn valid_team_table(matches: usize) -> Table {
    let ids: Vec<String> = (0..matches).map(|m| format!("NA1_{m}")).collect();
    let mut rows = Vec::new();
    for (m, id) in ids.iter().enumerate() {
        let blue_wins = m % 2 == 0;
        rows.push((id.as_str(), 100, "blue", blue_wins));
        rows.push((id.as_str(), 200, "red", !blue_wins));
    }
    team_table(&rows)
}

pub fn profile_table(puuids: &[&str], roles: &[&str], games_used: &[i64]) -> Table {
    let winrate: Vec<f64> = (0..puuids.len()).map(|i| 0.4 + i as f64 * 0.01).collect();
    table(vec![
        strs("puuid", puuids),
        strs("role", roles),
        ints("games_used", games_used),
        floats("recent_winrate", &winrate),
    ])
}
