mod common;

use lobby_kraken::errors::FeatureError;
use lobby_kraken::features::{
    AblationMode, add_delta_columns, build_feature_matrix, build_team_matrix, delta_columns,
};
use lobby_kraken::table::Missing;
use polars::prelude::Column;

use common::{floats, ints, lobby_table, opt_floats, valid_team_table, without};

#[test]
fn modes_produce_expected_widths() {
    let table = lobby_table(3);
    for (mode, width) in [
        (AblationMode::Champs, 11),
        (AblationMode::Profiles, 51),
        (AblationMode::Full, 86),
    ] {
        let matrix = build_feature_matrix(&table, mode).unwrap();
        assert_eq!(matrix.n_features(), width, "{mode}");
        assert_eq!(matrix.n_rows(), 6);
        assert!(matrix.rows.iter().all(|r| r.len() == width));
        assert_eq!(matrix.summary.dropped, 0);
    }
}

#[test]
fn building_twice_gives_the_same_matrix() {
    let mut table = lobby_table(4);
    table
        .push_column(opt_floats(
            "ally_middle_recent_games",
            &[
                Some(3.0),
                None,
                Some(5.0),
                Some(6.0),
                None,
                Some(8.0),
                Some(9.0),
                Some(1.0),
            ],
        ))
        .unwrap();
    let a = build_feature_matrix(&table, AblationMode::Full).unwrap();
    let b = build_feature_matrix(&table, AblationMode::Full).unwrap();
    assert_eq!(a, b);
    assert_eq!(a.summary.dropped, 2);
    assert_eq!(a.n_rows(), 6);
}

#[test]
fn delta_is_ally_minus_enemy() {
    let mut table = lobby_table(1);
    table
        .push_column(floats("ally_top_recent_winrate", &[0.6, 0.6]))
        .unwrap();
    table
        .push_column(floats("enemy_top_recent_winrate", &[0.4, 0.4]))
        .unwrap();
    let matrix = build_feature_matrix(&table, AblationMode::Full).unwrap();
    let idx = matrix.column_index("top_diff_recent_winrate").unwrap();
    for row in &matrix.rows {
        assert!((row[idx] - 0.2).abs() < 1e-9);
    }
}

#[test]
fn side_blue_and_labels_follow_team_columns() {
    let matrix = build_feature_matrix(&lobby_table(2), AblationMode::Champs).unwrap();
    let side = matrix.column_index("side_blue").unwrap();
    let sides: Vec<f64> = matrix.rows.iter().map(|r| r[side]).collect();
    assert_eq!(sides, vec![1.0, 0.0, 1.0, 0.0]);
    assert_eq!(matrix.labels, vec![1, 0, 0, 1]);
    assert_eq!(matrix.groups[0], matrix.groups[1]);
    assert_ne!(matrix.groups[1], matrix.groups[2]);
}

#[test]
fn nan_profile_values_are_cleaned_like_nulls() {
    let mut table = lobby_table(2);
    table
        .push_column(floats(
            "enemy_jungle_recent_winrate",
            &[0.5, f64::NAN, 0.5, 0.5],
        ))
        .unwrap();
    let matrix = build_feature_matrix(&table, AblationMode::Profiles).unwrap();
    assert_eq!(matrix.summary.dropped, 1);
    assert_eq!(matrix.n_rows(), 3);
    assert!(matrix.rows.iter().flatten().all(|v| !v.is_nan()));
}

#[test]
fn float_queue_ids_are_ranked() {
    let mut table = lobby_table(2);
    table
        .push_column(floats("queue_id", &[420.0, 420.0, 420.0, 440.0]))
        .unwrap();
    let matrix = build_feature_matrix(&table, AblationMode::Champs).unwrap();
    assert_eq!(matrix.summary.rows_before, 3);
}

#[test]
fn non_ranked_rows_are_filtered_first() {
    let mut table = lobby_table(2);
    table
        .push_column(ints("queue_id", &[420, 420, 440, 440]))
        .unwrap();
    let matrix = build_feature_matrix(&table, AblationMode::Champs).unwrap();
    assert_eq!(matrix.summary.input_rows, 4);
    assert_eq!(matrix.summary.rows_before, 2);
    assert_eq!(matrix.n_rows(), 2);
}

#[test]
fn absent_delta_input_yields_all_null_delta() {
    let mut table = without(&lobby_table(2), &["enemy_bottom_recent_games"]);
    let missing = add_delta_columns(&mut table).unwrap();
    assert_eq!(missing, vec!["bottom_diff_recent_games".to_string()]);
    assert_eq!(table.null_count("bottom_diff_recent_games").unwrap(), 4);
    assert_eq!(table.null_count("top_diff_recent_games").unwrap(), 0);
    for name in delta_columns() {
        assert!(table.has_column(name));
    }

    // an all-null delta empties the cleaned set
    let (clean, dropped) = table
        .drop_nulls(&["bottom_diff_recent_games"], Missing::Null)
        .unwrap();
    assert_eq!(clean.height(), 0);
    assert_eq!(dropped, 4);
}

#[test]
fn missing_required_columns_are_listed() {
    let table = without(&lobby_table(2), &["enemy_bottom_recent_games", "team_win"]);
    let err = build_feature_matrix(&table, AblationMode::Full).unwrap_err();
    assert_eq!(
        err,
        FeatureError::MissingColumns(vec![
            "enemy_bottom_recent_games".to_string(),
            "team_win".to_string()
        ])
    );

    // champs mode never touches profile columns
    let table = without(&lobby_table(2), &["enemy_bottom_recent_games"]);
    assert!(build_feature_matrix(&table, AblationMode::Champs).is_ok());
}

#[test]
fn missing_queue_id_is_fatal() {
    let table = without(&lobby_table(1), &["queue_id"]);
    assert!(matches!(
        build_feature_matrix(&table, AblationMode::Champs),
        Err(FeatureError::Table(_))
    ));
}

#[test]
fn all_rows_dropped_is_an_empty_matrix_error() {
    let mut table = lobby_table(2);
    table
        .push_column(Column::new(
            "ally_top_champion_id".into(),
            &[None::<i64>, None, None, None],
        ))
        .unwrap();
    let err = build_feature_matrix(&table, AblationMode::Champs).unwrap_err();
    assert_eq!(err, FeatureError::EmptyMatrix { rows_before: 4 });
}

#[test]
fn team_matrix_adds_post_game_columns_unless_draft_only() {
    let mut table = valid_team_table(3);
    table
        .push_column(floats("team_kills", &[20.0, 11.0, 9.0, 25.0, 30.0, 4.0]))
        .unwrap();

    let draft = build_team_matrix(&table, true).unwrap();
    assert_eq!(draft.n_features(), 6);
    assert_eq!(draft.feature_names[0], "side_blue");

    let full = build_team_matrix(&table, false).unwrap();
    assert_eq!(full.n_features(), 7);
    assert_eq!(full.feature_names[6], "team_kills");
    assert_eq!(full.rows[0][6], 20.0);
}

#[test]
fn team_matrix_requires_champions() {
    let table = without(&valid_team_table(2), &["jungle_champion_id"]);
    assert_eq!(
        build_team_matrix(&table, true).unwrap_err(),
        FeatureError::MissingColumns(vec!["jungle_champion_id".to_string()])
    );
}
