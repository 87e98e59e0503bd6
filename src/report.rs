//! Console rendering for the typed reports. Everything here is a
//! `Display` impl so the binary can print and tests can inspect text.

use std::fmt::{self, Write};

use crate::coverage::{CoverageReport, Section, Sufficiency};
use crate::table::Table;
use crate::train::EvaluationReport;
use crate::validate::{CheckReport, Detail, Entry, Finding, Severity};

pub const TOP_IMPORTANCES: usize = 25;

const RULE_WIDTH: usize = 80;

fn rule(f: &mut impl Write) -> fmt::Result {
    writeln!(f, "{}", "=".repeat(RULE_WIDTH))
}

pub fn header(f: &mut impl Write, title: &str) -> fmt::Result {
    rule(f)?;
    writeln!(f, "{title}")?;
    rule(f)
}

fn tag(severity: Severity) -> &'static str {
    match severity {
        Severity::Ok => "[OK]",
        Severity::Warn => "[WARN]",
        Severity::Error => "[ERROR]",
    }
}

fn pct(fraction: f64) -> String {
    format!("{:.1}%", fraction * 100.0)
}

/// `1234567` -> `1,234,567`.
pub fn thousands(n: u64) -> String {
    let digits = n.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push(',');
        }
        out.push(c);
    }
    out
}

fn write_table(f: &mut impl Write, table: &Table, indent: &str) -> fmt::Result {
    let names = table.column_names();
    let columns: Vec<Vec<String>> = names
        .iter()
        .map(|n| {
            table
                .str_values(n)
                .unwrap_or_default()
                .into_iter()
                .map(|v| v.unwrap_or_else(|| "null".to_string()))
                .collect()
        })
        .collect();
    let cells: Vec<Vec<String>> = (0..table.height())
        .map(|i| {
            columns
                .iter()
                .map(|c| c.get(i).cloned().unwrap_or_default())
                .collect()
        })
        .collect();
    let widths: Vec<usize> = names
        .iter()
        .enumerate()
        .map(|(j, n)| {
            cells
                .iter()
                .map(|r| r[j].len())
                .chain([n.len()])
                .max()
                .unwrap_or(0)
        })
        .collect();

    write!(f, "{indent}")?;
    for (n, &w) in names.iter().zip(&widths) {
        write!(f, "{n:>w$}  ")?;
    }
    writeln!(f)?;
    for row in &cells {
        write!(f, "{indent}")?;
        for (v, &w) in row.iter().zip(&widths) {
            write!(f, "{v:>w$}  ")?;
        }
        writeln!(f)?;
    }
    Ok(())
}

fn write_finding(f: &mut impl Write, finding: &Finding) -> fmt::Result {
    writeln!(f, "{} {}", tag(finding.severity), finding.message)?;
    if let Some(examples) = &finding.examples {
        writeln!(f, "       examples:")?;
        write_table(f, examples, "       ")?;
    }
    Ok(())
}

fn write_detail(f: &mut impl Write, detail: &Detail) -> fmt::Result {
    match detail {
        Detail::GamesUsed(d) => {
            writeln!(f, "\n--- games_used ---")?;
            writeln!(f, "  count   {}", d.count)?;
            writeln!(f, "  nulls   {}", d.null_count)?;
            writeln!(f, "  mean    {:.4}", d.mean)?;
            writeln!(f, "  std     {:.4}", d.std)?;
            writeln!(f, "  min     {}", d.min)?;
            writeln!(f, "  25%     {}", d.q25)?;
            writeln!(f, "  50%     {}", d.median)?;
            writeln!(f, "  75%     {}", d.q75)?;
            writeln!(f, "  max     {}", d.max)?;
        }
        Detail::NullCounts { title, counts } => {
            writeln!(f, "\n--- {title} ---")?;
            let width = counts.iter().map(|c| c.column.len()).max().unwrap_or(0);
            for c in counts {
                writeln!(f, "  {:<width$}  {}", c.column, c.nulls)?;
            }
        }
        Detail::RowsPerMatch(distribution) => {
            writeln!(f, "\n--- rows per match_id ---")?;
            for (rows, matches) in distribution {
                writeln!(f, "  {rows} rows: {matches} matches")?;
            }
        }
        Detail::SideWinRates(rates) => {
            writeln!(f, "\n--- ranked win rate by team_side ---")?;
            for r in rates {
                writeln!(f, "  {:<6} {:.4}", r.side, r.win_rate)?;
            }
        }
        Detail::HistoryNulls {
            rows_with_nulls,
            total_rows,
        } => {
            let share = if *total_rows == 0 {
                0.0
            } else {
                *rows_with_nulls as f64 / *total_rows as f64
            };
            writeln!(
                f,
                "\n[INFO] rows with >=1 null in recent_* columns: {rows_with_nulls}/{total_rows} ({})",
                pct(share)
            )?;
        }
    }
    Ok(())
}

impl fmt::Display for CheckReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, &format!("{}: {}", self.kind.title(), self.path.display()))?;
        if let Some(shape) = &self.shape {
            writeln!(
                f,
                "[INFO] shape: {} rows x {} columns",
                shape.rows,
                shape.columns.len()
            )?;
            writeln!(f, "[INFO] columns: {}", shape.columns.join(", "))?;
        }
        for entry in &self.entries {
            match entry {
                Entry::Finding(finding) => write_finding(f, finding)?,
                Entry::Detail(detail) => write_detail(f, detail)?,
            }
        }
        writeln!(f)
    }
}

fn write_unavailable<T>(f: &mut impl Write, what: &str, section: &Section<T>) -> fmt::Result {
    if let Section::Unavailable { path, reason } = section {
        writeln!(f, "[ERROR] Could not read {what} ({}): {reason}", path.display())?;
    }
    Ok(())
}

impl fmt::Display for CoverageReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, "Dataset coverage analysis")?;

        if let Some(m) = self.matches.loaded() {
            writeln!(f, "\n[OK] Total matches: {}", thousands(m.total as u64))?;
            writeln!(
                f,
                "     Ranked matches: {} ({})",
                thousands(m.ranked as u64),
                pct(m.ranked_fraction)
            )?;
        }
        write_unavailable(f, "matches", &self.matches)?;

        if let Some(players) = self.players.loaded() {
            writeln!(f, "\n[OK] Player rows: {}", thousands(*players as u64))?;
        }
        write_unavailable(f, "players", &self.players)?;

        if let Some(p) = self.profiles.loaded() {
            writeln!(f, "\n[OK] Player profiles: {}", thousands(p.total as u64))?;
            for d in &p.depth {
                writeln!(
                    f,
                    "     With {}+ matches: {} ({})",
                    d.min_games,
                    thousands(d.count as u64),
                    pct(d.fraction)
                )?;
            }
        }
        write_unavailable(f, "profiles", &self.profiles)?;

        if let Some(l) = self.lobby.loaded() {
            writeln!(f, "\n[OK] Lobby outcome rows: {}", thousands(l.rows as u64))?;
            writeln!(f, "     History features: {}", l.history_columns)?;
            if l.history_columns > 0 {
                writeln!(f, "\nCoverage:")?;
                writeln!(
                    f,
                    "     Rows with complete coverage: {}",
                    thousands(l.complete_rows as u64)
                )?;
                writeln!(f, "     Coverage ratio: {}", pct(l.coverage_ratio))?;
                writeln!(
                    f,
                    "     Matches with complete coverage: {}",
                    thousands(l.complete_matches as u64)
                )?;
            } else {
                writeln!(f, "[WARN] no recent_* columns; coverage cannot be measured")?;
            }
        }
        write_unavailable(f, "lobby outcomes", &self.lobby)?;

        match self.sufficiency {
            Some(Sufficiency::Excellent) => {
                writeln!(f, "\n[OK] EXCELLENT: dataset ready for production training")?;
            }
            Some(Sufficiency::Viable { short_of_excellent }) => {
                writeln!(f, "\n[OK] VIABLE: dataset sufficient for initial training")?;
                writeln!(
                    f,
                    "     Need {} more complete rows for production",
                    thousands(short_of_excellent)
                )?;
            }
            Some(Sufficiency::Insufficient { short_of_viable }) => {
                writeln!(
                    f,
                    "\n[WARN] INSUFFICIENT: need {} more complete rows",
                    thousands(short_of_viable)
                )?;
                writeln!(f, "     Continue data collection")?;
            }
            None => {}
        }

        if let Some(p) = &self.projection {
            writeln!(f, "\nProjection (estimate):")?;
            writeln!(f, "     Current coverage rate: {}", pct(p.coverage_rate))?;
            writeln!(
                f,
                "     Matches needed for viable dataset: ~{}",
                thousands(p.matches_needed_viable)
            )?;
            writeln!(
                f,
                "     Matches needed for excellent dataset: ~{}",
                thousands(p.matches_needed_excellent)
            )?;
            writeln!(
                f,
                "     Profiles needed: ~{}",
                thousands(p.profiles_needed)
            )?;
        }
        writeln!(f)?;
        rule(f)
    }
}

impl fmt::Display for EvaluationReport {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        header(f, &format!("Model {}", self.model))?;
        let b = &self.build;
        let e = &self.evaluation;
        writeln!(f, "[config] parquet       = {}", self.parquet.display())?;
        writeln!(
            f,
            "[config] trees={} depth={} lr={} subsample={} colsample={} seed={}",
            self.params.n_estimators,
            self.params.max_depth,
            self.params.learning_rate,
            self.params.subsample,
            self.params.colsample_bytree,
            self.params.seed
        )?;
        writeln!(
            f,
            "[load] input rows={} ranked rows={} after null cleaning={} (dropped {})",
            b.input_rows, b.rows_before, b.rows_after, b.dropped
        )?;
        if !b.missing_delta_inputs.is_empty() {
            writeln!(
                f,
                "[warn] deltas without inputs: {}",
                b.missing_delta_inputs.join(", ")
            )?;
        }
        writeln!(f, "[features] {} columns", self.n_features)?;
        writeln!(
            f,
            "[split] train rows={} groups={} | test rows={} groups={}",
            e.train_rows, e.train_groups, e.test_rows, e.test_groups
        )?;

        writeln!(f)?;
        writeln!(f, "[metrics] Accuracy: {:.4}", e.accuracy)?;
        writeln!(f, "[metrics] ROC AUC : {:.4}", e.roc_auc)?;
        writeln!(f, "[metrics] Log loss: {:.4}", e.log_loss)?;
        writeln!(f, "[metrics] Brier   : {:.4}", e.brier)?;

        let c = &e.classification;
        writeln!(f, "\n[metrics] Classification report:")?;
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10} {:>10}",
            "", "precision", "recall", "f1-score", "support"
        )?;
        for m in &c.classes {
            writeln!(
                f,
                "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                m.label, m.precision, m.recall, m.f1, m.support
            )?;
        }
        writeln!(
            f,
            "{:>14} {:>10} {:>10} {:>10.4} {:>10}",
            "accuracy", "", "", c.accuracy, c.macro_avg.support
        )?;
        for (name, avg) in [("macro avg", &c.macro_avg), ("weighted avg", &c.weighted_avg)] {
            writeln!(
                f,
                "{:>14} {:>10.4} {:>10.4} {:>10.4} {:>10}",
                name, avg.precision, avg.recall, avg.f1, avg.support
            )?;
        }

        let top = e.importances.len().min(TOP_IMPORTANCES);
        writeln!(f, "\n[features] Top {top} importances:")?;
        for imp in e.importances.iter().take(TOP_IMPORTANCES) {
            writeln!(f, "  {:35} {:.4}", imp.name, imp.importance)?;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::thousands;

    #[test]
    fn thousands_groups_digits() {
        assert_eq!(thousands(0), "0");
        assert_eq!(thousands(999), "999");
        assert_eq!(thousands(1_000), "1,000");
        assert_eq!(thousands(1_234_567), "1,234,567");
    }
}
