use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tracing::info;

use crate::config::{DEFAULT_RANDOM_STATE, DEFAULT_TEST_SIZE};
use crate::errors::TrainError;
use crate::features::{self, AblationMode, BuildSummary, FeatureMatrix};
use crate::gbdt::{Classifier, GbdtClassifier, GbdtParams};
use crate::metrics::{
    self, ClassificationReport, FeatureImportance, accuracy, brier_score, log_loss,
    predict_labels, roc_auc,
};
use crate::source::TableSource;
use crate::split::{GroupSplit, group_shuffle_split};

#[derive(Debug, Clone, PartialEq)]
pub struct TrainConfig {
    pub parquet: PathBuf,
    pub test_size: f64,
    pub random_state: u64,
    pub params: GbdtParams,
}

impl TrainConfig {
    pub fn new(parquet: impl Into<PathBuf>, params: GbdtParams) -> Self {
        Self {
            parquet: parquet.into(),
            test_size: DEFAULT_TEST_SIZE,
            random_state: DEFAULT_RANDOM_STATE,
            params,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Evaluation {
    pub train_rows: usize,
    pub test_rows: usize,
    pub train_groups: usize,
    pub test_groups: usize,
    pub accuracy: f64,
    /// NaN when the test labels hold a single class.
    pub roc_auc: f64,
    pub log_loss: f64,
    pub brier: f64,
    pub classification: ClassificationReport,
    pub importances: Vec<FeatureImportance>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EvaluationReport {
    /// "lobby/<mode>" or "team/<draft|full>".
    pub model: String,
    pub parquet: PathBuf,
    pub n_features: usize,
    pub build: BuildSummary,
    pub params: GbdtParams,
    pub evaluation: Evaluation,
}

/// `EvaluationReport` stamped for export.
#[derive(Debug, Clone, Serialize)]
pub struct ExportedReport<'a> {
    pub generated_at: DateTime<Utc>,
    #[serde(flatten)]
    pub report: &'a EvaluationReport,
}

impl EvaluationReport {
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(&ExportedReport {
            generated_at: Utc::now(),
            report: self,
        })
    }
}

/// Fits `model` on the train partition and scores the test partition.
pub fn fit_and_evaluate<C: Classifier>(
    model: &mut C,
    matrix: &FeatureMatrix,
    split: &GroupSplit,
) -> Result<Evaluation, TrainError> {
    let (x_train, y_train) = matrix.subset(&split.train);
    let (x_test, y_test) = matrix.subset(&split.test);
    info!(
        train = x_train.len(),
        test = x_test.len(),
        features = matrix.n_features(),
        "training"
    );

    model.fit(&x_train, &y_train)?;
    let probs = model.predict_proba(&x_test)?;
    let predicted = predict_labels(&probs);

    let evaluation = Evaluation {
        train_rows: x_train.len(),
        test_rows: x_test.len(),
        train_groups: split.train_groups,
        test_groups: split.test_groups,
        accuracy: accuracy(&y_test, &predicted),
        roc_auc: roc_auc(&y_test, &probs),
        log_loss: log_loss(&y_test, &probs),
        brier: brier_score(&y_test, &probs),
        classification: metrics::classification_report(&y_test, &predicted),
        importances: metrics::rank_importances(
            &matrix.feature_names,
            &model.feature_importances()?,
        ),
    };
    info!(
        accuracy = evaluation.accuracy,
        roc_auc = evaluation.roc_auc,
        "evaluation finished"
    );
    Ok(evaluation)
}

/// Split, fit and evaluate an already-built matrix with the in-crate GBDT.
pub fn evaluate_matrix(
    matrix: &FeatureMatrix,
    config: &TrainConfig,
) -> Result<Evaluation, TrainError> {
    let split = group_shuffle_split(&matrix.groups, config.test_size, config.random_state)?;
    let mut model = GbdtClassifier::new(config.params.clone().with_seed(config.random_state));
    fit_and_evaluate(&mut model, matrix, &split)
}

pub fn run_lobby_ablation(
    source: &impl TableSource,
    config: &TrainConfig,
    mode: AblationMode,
) -> Result<EvaluationReport, TrainError> {
    info!(path = %config.parquet.display(), mode = %mode, "loading lobby outcomes");
    let table = source.load(&config.parquet)?;
    let matrix = features::build_feature_matrix(&table, mode)?;
    let evaluation = evaluate_matrix(&matrix, config)?;
    Ok(EvaluationReport {
        model: format!("lobby/{mode}"),
        parquet: config.parquet.clone(),
        n_features: matrix.n_features(),
        build: matrix.summary,
        params: config.params.clone().with_seed(config.random_state),
        evaluation,
    })
}

pub fn run_team_baseline(
    source: &impl TableSource,
    config: &TrainConfig,
    draft_only: bool,
) -> Result<EvaluationReport, TrainError> {
    info!(path = %config.parquet.display(), draft_only, "loading team outcomes");
    let table = source.load(&config.parquet)?;
    let matrix = features::build_team_matrix(&table, draft_only)?;
    let evaluation = evaluate_matrix(&matrix, config)?;
    Ok(EvaluationReport {
        model: format!("team/{}", if draft_only { "draft" } else { "full" }),
        parquet: config.parquet.clone(),
        n_features: matrix.n_features(),
        build: matrix.summary,
        params: config.params.clone().with_seed(config.random_state),
        evaluation,
    })
}
