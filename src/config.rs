use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::gbdt::GbdtParams;

pub const VIABLE_COMPLETE_ROWS: u64 = 100_000;
pub const EXCELLENT_COMPLETE_ROWS: u64 = 200_000;
pub const DEFAULT_WATCH_INTERVAL: Duration = Duration::from_secs(300);
pub const DEFAULT_TEST_SIZE: f64 = 0.2;
pub const DEFAULT_RANDOM_STATE: u64 = 42;

const DATA_DIR_ENV: &str = "KRAKEN_DATA_DIR";

/// Locations of the five tables, relative to a data root.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DataPaths {
    pub players: PathBuf,
    pub matches: PathBuf,
    pub player_profile: PathBuf,
    pub team_outcome: PathBuf,
    pub lobby_outcome: PathBuf,
}

impl DataPaths {
    pub fn under(root: &Path) -> Self {
        Self {
            players: root.join("parquet").join("player.parquet"),
            matches: root.join("parquet").join("match.parquet"),
            player_profile: root.join("ml").join("player_profile.parquet"),
            team_outcome: root.join("ml").join("ml_team_outcome.parquet"),
            lobby_outcome: root.join("ml").join("ml_lobby_outcome.parquet"),
        }
    }

    /// `KRAKEN_DATA_DIR` (also read from `.env`) or `./data`.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let root = std::env::var(DATA_DIR_ENV)
            .ok()
            .filter(|v| !v.trim().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("data"));
        Self::under(&root)
    }

    pub fn all(&self) -> [&Path; 5] {
        [
            &self.players,
            &self.matches,
            &self.player_profile,
            &self.team_outcome,
            &self.lobby_outcome,
        ]
    }
}

impl Default for DataPaths {
    fn default() -> Self {
        Self::under(Path::new("data"))
    }
}

/// Model parameters from a JSON file; absent keys keep their defaults.
pub fn load_model_params(path: &Path) -> Result<GbdtParams> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse model params {}", path.display()))
}

#[cfg(test)]
mod tests {
    use std::path::Path;

    use super::DataPaths;

    #[test]
    fn paths_follow_pipeline_layout() {
        let paths = DataPaths::under(Path::new("/srv/kraken"));
        assert_eq!(
            paths.lobby_outcome,
            Path::new("/srv/kraken/ml/ml_lobby_outcome.parquet")
        );
        assert_eq!(paths.matches, Path::new("/srv/kraken/parquet/match.parquet"));
    }
}
