use serde::Serialize;

pub const DECISION_THRESHOLD: f64 = 0.5;

const LOG_EPS: f64 = 1e-15;

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ClassMetrics {
    pub label: u8,
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Averages {
    pub precision: f64,
    pub recall: f64,
    pub f1: f64,
    pub support: usize,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ClassificationReport {
    pub classes: Vec<ClassMetrics>,
    pub accuracy: f64,
    pub macro_avg: Averages,
    pub weighted_avg: Averages,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureImportance {
    pub name: String,
    pub importance: f64,
}

pub fn predict_labels(probs: &[f64]) -> Vec<u8> {
    probs
        .iter()
        .map(|&p| u8::from(p >= DECISION_THRESHOLD))
        .collect()
}

pub fn accuracy(labels: &[u8], predicted: &[u8]) -> f64 {
    if labels.is_empty() {
        return f64::NAN;
    }
    let hits = labels
        .iter()
        .zip(predicted)
        .filter(|(a, b)| a == b)
        .count();
    hits as f64 / labels.len() as f64
}

/// Area under the ROC curve via the rank-sum statistic, with tied scores
/// sharing their average rank. NaN when only one class is present.
pub fn roc_auc(labels: &[u8], scores: &[f64]) -> f64 {
    let n = labels.len().min(scores.len());
    let positives = labels[..n].iter().filter(|&&y| y == 1).count();
    let negatives = n - positives;
    if positives == 0 || negatives == 0 {
        return f64::NAN;
    }

    let mut order: Vec<usize> = (0..n).collect();
    order.sort_by(|&a, &b| scores[a].total_cmp(&scores[b]));

    let mut rank_sum = 0.0;
    let mut i = 0;
    while i < n {
        let mut j = i;
        while j + 1 < n && scores[order[j + 1]] == scores[order[i]] {
            j += 1;
        }
        // ranks are 1-based; the tie block i..=j shares the mean rank
        let avg_rank = (i + j) as f64 / 2.0 + 1.0;
        for &idx in &order[i..=j] {
            if labels[idx] == 1 {
                rank_sum += avg_rank;
            }
        }
        i = j + 1;
    }

    let p = positives as f64;
    (rank_sum - p * (p + 1.0) / 2.0) / (p * negatives as f64)
}

pub fn brier_score(labels: &[u8], probs: &[f64]) -> f64 {
    if labels.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = labels
        .iter()
        .zip(probs)
        .map(|(&y, &p)| (p - f64::from(y)).powi(2))
        .sum();
    sum / labels.len() as f64
}

pub fn log_loss(labels: &[u8], probs: &[f64]) -> f64 {
    if labels.is_empty() {
        return f64::NAN;
    }
    let sum: f64 = labels
        .iter()
        .zip(probs)
        .map(|(&y, &p)| {
            let p = p.clamp(LOG_EPS, 1.0 - LOG_EPS);
            if y == 1 { -p.ln() } else { -(1.0 - p).ln() }
        })
        .sum();
    sum / labels.len() as f64
}

/// Per-class precision/recall/F1 for labels 0 and 1. Zero denominators
/// yield 0.
pub fn classification_report(labels: &[u8], predicted: &[u8]) -> ClassificationReport {
    let classes: Vec<ClassMetrics> = [0u8, 1u8]
        .iter()
        .map(|&class| {
            let mut tp = 0usize;
            let mut fp = 0usize;
            let mut fn_ = 0usize;
            for (&y, &p) in labels.iter().zip(predicted) {
                match (y == class, p == class) {
                    (true, true) => tp += 1,
                    (false, true) => fp += 1,
                    (true, false) => fn_ += 1,
                    (false, false) => {}
                }
            }
            let precision = ratio(tp, tp + fp);
            let recall = ratio(tp, tp + fn_);
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            ClassMetrics {
                label: class,
                precision,
                recall,
                f1,
                support: tp + fn_,
            }
        })
        .collect();

    let total: usize = classes.iter().map(|c| c.support).sum();
    let k = classes.len() as f64;
    let macro_avg = Averages {
        precision: classes.iter().map(|c| c.precision).sum::<f64>() / k,
        recall: classes.iter().map(|c| c.recall).sum::<f64>() / k,
        f1: classes.iter().map(|c| c.f1).sum::<f64>() / k,
        support: total,
    };
    let weight = |f: fn(&ClassMetrics) -> f64| {
        if total == 0 {
            0.0
        } else {
            classes
                .iter()
                .map(|c| f(c) * c.support as f64)
                .sum::<f64>()
                / total as f64
        }
    };
    let weighted_avg = Averages {
        precision: weight(|c| c.precision),
        recall: weight(|c| c.recall),
        f1: weight(|c| c.f1),
        support: total,
    };

    ClassificationReport {
        accuracy: accuracy(labels, predicted),
        classes,
        macro_avg,
        weighted_avg,
    }
}

/// Pairs names with scores, highest first; equal scores keep column order.
pub fn rank_importances(names: &[String], scores: &[f64]) -> Vec<FeatureImportance> {
    let mut ranked: Vec<FeatureImportance> = names
        .iter()
        .zip(scores)
        .map(|(name, &importance)| FeatureImportance {
            name: name.clone(),
            importance,
        })
        .collect();
    ranked.sort_by(|a, b| b.importance.total_cmp(&a.importance));
    ranked
}

fn ratio(num: usize, den: usize) -> f64 {
    if den == 0 { 0.0 } else { num as f64 / den as f64 }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auc_handles_ties_and_single_class() {
        assert!((roc_auc(&[0, 0, 1, 1], &[0.1, 0.4, 0.35, 0.8]) - 0.75).abs() < 1e-12);
        assert!((roc_auc(&[0, 1], &[0.5, 0.5]) - 0.5).abs() < 1e-12);
        assert!(roc_auc(&[1, 1, 1], &[0.2, 0.3, 0.9]).is_nan());
    }

    #[test]
    fn report_matches_hand_counts() {
        let labels = [1, 1, 1, 0, 0];
        let predicted = [1, 1, 0, 0, 1];
        let report = classification_report(&labels, &predicted);

        let pos = report.classes[1];
        assert_eq!(pos.support, 3);
        assert!((pos.precision - 2.0 / 3.0).abs() < 1e-12);
        assert!((pos.recall - 2.0 / 3.0).abs() < 1e-12);
        let neg = report.classes[0];
        assert!((neg.precision - 0.5).abs() < 1e-12);
        assert!((neg.recall - 0.5).abs() < 1e-12);
        assert!((report.accuracy - 0.6).abs() < 1e-12);
        assert!((report.weighted_avg.recall - 0.6).abs() < 1e-12);
    }

    #[test]
    fn missing_predicted_class_scores_zero() {
        let report = classification_report(&[0, 1], &[1, 1]);
        assert_eq!(report.classes[0].precision, 0.0);
        assert_eq!(report.classes[0].f1, 0.0);
    }

    #[test]
    fn importances_sorted_descending_stable() {
        let names: Vec<String> = ["a", "b", "c"].iter().map(|s| s.to_string()).collect();
        let ranked = rank_importances(&names, &[0.2, 0.6, 0.2]);
        let order: Vec<&str> = ranked.iter().map(|f| f.name.as_str()).collect();
        assert_eq!(order, vec!["b", "a", "c"]);
    }
}
