//! Binary classification metrics over a held-out set.
//!
//! Accuracy, Matthews correlation and the ROC curve come from `linfa::metrics`.
//! linfa orders the classes of its confusion matrix by hash-set iteration, so its
//! binary `precision`/`recall`/`f1_score` may describe either label; the
//! per-class ratios are therefore taken from the outcome counts below.

use crate::data::PurchaseRecord;
use crate::error::{PipelineError, Result};
use crate::model::{FittedModel, LogisticClassifier, sigmoid};
use linfa::metrics::{BinaryClassification, ConfusionMatrix as LinfaConfusion, ToConfusionMatrix};
use linfa::prelude::Pr;
use ndarray::Array1;
use std::fmt;
use tracing::info;

const LOG_LOSS_EPSILON: f64 = 1e-15;

/// Counts of each prediction outcome.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ConfusionMatrix {
    pub true_positive: usize,
    pub false_positive: usize,
    pub true_negative: usize,
    pub false_negative: usize,
}

impl ConfusionMatrix {
    pub fn record(&mut self, actual: bool, predicted: bool) {
        match (actual, predicted) {
            (true, true) => self.true_positive += 1,
            (false, true) => self.false_positive += 1,
            (false, false) => self.true_negative += 1,
            (true, false) => self.false_negative += 1,
        }
    }

    pub fn total(&self) -> usize {
        self.true_positive + self.false_positive + self.true_negative + self.false_negative
    }
}

/// Quality metrics for one evaluation run.
///
/// Ratios whose denominator is zero are `NaN`, as are AUC and Matthews
/// correlation when a class is missing; callers decide how to report them.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct EvaluationMetrics {
    pub accuracy: f64,
    pub area_under_roc_curve: f64,
    pub f1_score: f64,
    pub positive_precision: f64,
    pub positive_recall: f64,
    pub negative_precision: f64,
    pub negative_recall: f64,
    pub matthews_correlation: f64,
    pub log_loss: f64,
    pub confusion: ConfusionMatrix,
}

impl EvaluationMetrics {
    /// Computes metrics from actual labels and raw scores.
    pub fn from_scores(labels: &[bool], scores: &[f64]) -> Result<Self> {
        if labels.is_empty() {
            return Err(PipelineError::Evaluation("test set is empty".to_string()));
        }
        if labels.len() != scores.len() {
            return Err(PipelineError::Evaluation(format!(
                "{} labels but {} scores",
                labels.len(),
                scores.len()
            )));
        }
        if let Some(i) = scores.iter().position(|s| !s.is_finite()) {
            return Err(PipelineError::Evaluation(format!(
                "score of row {} is not finite",
                i + 1
            )));
        }

        let truth = Array1::from(labels.to_vec());
        let predicted: Array1<bool> =
            scores.iter().map(|&s| LogisticClassifier::decide(s)).collect();

        let mut confusion = ConfusionMatrix::default();
        let mut log_loss = 0.0;
        for ((&actual, &decision), &score) in labels.iter().zip(&predicted).zip(scores) {
            confusion.record(actual, decision);
            let p = sigmoid(score).clamp(LOG_LOSS_EPSILON, 1.0 - LOG_LOSS_EPSILON);
            log_loss -= if actual { p.ln() } else { (1.0 - p).ln() };
        }

        let c = &confusion;
        let ratio = |num: usize, den: usize| num as f64 / den as f64;
        let precision = ratio(c.true_positive, c.true_positive + c.false_positive);
        let recall = ratio(c.true_positive, c.true_positive + c.false_negative);

        let (accuracy, matthews_correlation) = match linfa_confusion(&truth, &predicted)? {
            Some(cm) => (cm.accuracy() as f64, cm.mcc() as f64),
            // both sides hold one label: every row is right or every row is wrong
            None => (ratio(c.true_positive + c.true_negative, c.total()), f64::NAN),
        };

        Ok(EvaluationMetrics {
            accuracy,
            area_under_roc_curve: area_under_roc_curve(labels, scores)?,
            f1_score: 2.0 * precision * recall / (precision + recall),
            positive_precision: precision,
            positive_recall: recall,
            negative_precision: ratio(c.true_negative, c.true_negative + c.false_negative),
            negative_recall: ratio(c.true_negative, c.true_negative + c.false_positive),
            matthews_correlation,
            log_loss: log_loss / labels.len() as f64,
            confusion,
        })
    }
}

/// linfa takes the class set from the receiver and skips pairs whose label lies
/// outside it, so the side holding both labels builds the matrix.
fn linfa_confusion(
    truth: &Array1<bool>,
    predicted: &Array1<bool>,
) -> Result<Option<LinfaConfusion<bool>>> {
    let has_both = |a: &Array1<bool>| a.iter().any(|&v| v) && a.iter().any(|&v| !v);
    let cm = if has_both(truth) {
        truth.confusion_matrix(predicted)
    } else if has_both(predicted) {
        predicted.confusion_matrix(truth)
    } else {
        return Ok(None);
    };
    cm.map(Some).map_err(|e| PipelineError::Evaluation(e.to_string()))
}

/// Area under linfa's ROC curve over `sigmoid(score)`. `NaN` unless both classes are present.
///
/// linfa works in `f32` probabilities, so scores beyond roughly ±17 saturate and rank as ties.
pub fn area_under_roc_curve(labels: &[bool], scores: &[f64]) -> Result<f64> {
    let n_pos = labels.iter().filter(|&&l| l).count();
    if n_pos == 0 || n_pos == labels.len() {
        return Ok(f64::NAN);
    }

    let probabilities = scores
        .iter()
        .map(|&s| Pr::try_from(sigmoid(s) as f32))
        .collect::<std::result::Result<Array1<Pr>, f32>>()
        .map_err(|p| PipelineError::Evaluation(format!("{} is not a probability", p)))?;
    let roc = probabilities
        .roc(labels)
        .map_err(|e| PipelineError::Evaluation(e.to_string()))?;
    Ok(roc.area_under_curve() as f64)
}

impl fmt::Display for EvaluationMetrics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        writeln!(f, "*************************************************")?;
        writeln!(f, "*       Model quality metrics evaluation         ")?;
        writeln!(f, "*------------------------------------------------")?;
        writeln!(f, "*       Accuracy:      {:.2}", self.accuracy)?;
        writeln!(f, "*       AUC:           {:.2}", self.area_under_roc_curve)?;
        writeln!(f, "*       F1 Score:      {:.2}", self.f1_score)?;
        writeln!(f, "*       Precision:     {:.2}", self.positive_precision)?;
        writeln!(f, "*       Recall:        {:.2}", self.positive_recall)?;
        writeln!(f, "*       MCC:           {:.2}", self.matthews_correlation)?;
        writeln!(f, "*       Log-loss:      {:.2}", self.log_loss)?;
        writeln!(
            f,
            "*       Confusion:     TP={} FP={} TN={} FN={}",
            self.confusion.true_positive,
            self.confusion.false_positive,
            self.confusion.true_negative,
            self.confusion.false_negative
        )?;
        write!(f, "*************************************************")
    }
}

impl FittedModel {
    /// Scores every test record and aggregates the metrics.
    pub fn evaluate(&self, test: &[PurchaseRecord]) -> Result<EvaluationMetrics> {
        let scores = test
            .iter()
            .map(|r| self.score(r))
            .collect::<Result<Vec<_>>>()?;
        let labels: Vec<bool> = test.iter().map(|r| r.purchase_again).collect();

        let metrics = EvaluationMetrics::from_scores(&labels, &scores)?;
        info!(
            rows = test.len(),
            accuracy = metrics.accuracy,
            auc = metrics.area_under_roc_curve,
            "Evaluated purchase model"
        );
        Ok(metrics)
    }
}
