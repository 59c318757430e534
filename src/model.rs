//! Logistic-regression training, the fitted pipeline, and single-record prediction.

use crate::data::PurchaseRecord;
use crate::error::{PipelineError, Result};
use crate::features::{FeatureConcatenator, FeaturePipeline, OneHotEncoder, Row, UnknownCategory};
use linfa::prelude::*;
use linfa_logistic::LogisticRegression;
use ndarray::{Array1, Array2, Axis};
use rand::SeedableRng;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rmp_serde::{decode::from_read, encode::write_named};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, BufWriter};
use std::path::Path;
use tracing::{debug, info};

/// Optimizer settings for the logistic-regression trainer.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrainerConfig {
    /// L2 regularization strength.
    pub alpha: f64,
    pub max_iterations: u64,
    pub gradient_tolerance: f64,
    /// Seeds the order in which training rows are presented to the optimizer.
    pub seed: u64,
}

impl Default for TrainerConfig {
    fn default() -> Self {
        TrainerConfig {
            alpha: 1.0,
            max_iterations: 200,
            gradient_tolerance: 1e-4,
            seed: 0,
        }
    }
}

/// Linear scorer copied out of the fitted linfa model.
///
/// `score = bias + weights · features`; a positive score predicts `true`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LogisticClassifier {
    weights: Array1<f64>,
    bias: f64,
}

impl LogisticClassifier {
    pub fn new(weights: Array1<f64>, bias: f64) -> Self {
        LogisticClassifier { weights, bias }
    }

    pub fn weights(&self) -> &Array1<f64> {
        &self.weights
    }

    pub fn bias(&self) -> f64 {
        self.bias
    }

    /// Raw margin prior to the class decision.
    pub fn score(&self, features: &Array1<f64>) -> Result<f64> {
        if features.len() != self.weights.len() {
            return Err(PipelineError::Prediction(format!(
                "feature vector has {} entries, model expects {}",
                features.len(),
                self.weights.len()
            )));
        }
        if let Some(v) = features.iter().find(|v| !v.is_finite()) {
            return Err(PipelineError::Prediction(format!("feature value {} is not finite", v)));
        }
        Ok(self.bias + features.dot(&self.weights))
    }

    /// Decision rule shared by evaluation and prediction.
    pub fn decide(score: f64) -> bool {
        score > 0.0
    }

    pub fn apply<'r>(&self, mut row: Row<'r>) -> Result<Row<'r>> {
        let features = row.features.as_ref().ok_or_else(|| {
            PipelineError::Prediction("features must be built before scoring".to_string())
        })?;
        row.score = Some(self.score(features)?);
        Ok(row)
    }
}

/// Fits a binary logistic regression on `(features, label)` pairs.
pub fn train_classifier(
    x: &Array2<f64>,
    y: &Array1<bool>,
    config: &TrainerConfig,
) -> Result<LogisticClassifier> {
    if x.nrows() == 0 {
        return Err(PipelineError::Training("training set is empty".to_string()));
    }
    if x.nrows() != y.len() {
        return Err(PipelineError::Training(format!(
            "{} feature rows but {} labels",
            x.nrows(),
            y.len()
        )));
    }
    if y.iter().all(|&l| l == y[0]) {
        return Err(PipelineError::Training(format!(
            "training set contains a single class ({})",
            y[0]
        )));
    }

    let mut order: Vec<usize> = (0..x.nrows()).collect();
    order.shuffle(&mut StdRng::seed_from_u64(config.seed));
    let x = x.select(Axis(0), &order);
    let y = y.select(Axis(0), &order);

    let dataset = Dataset::new(x, y);
    let fitted = LogisticRegression::default()
        .alpha(config.alpha)
        .max_iterations(config.max_iterations)
        .gradient_tolerance(config.gradient_tolerance)
        .fit(&dataset)
        .map_err(|e| PipelineError::Training(e.to_string()))?;

    let mut weights = fitted.params().to_owned();
    let mut bias = fitted.intercept();

    // linfa picks its positive class internally; orient the margin towards `true`.
    let first = dataset.records().row(0);
    let predicted: Array1<bool> = fitted.predict(dataset.records());
    if predicted[0] != (bias + first.dot(&weights) >= 0.0) {
        weights.mapv_inplace(|w| -w);
        bias = -bias;
    }

    debug!(?weights, bias, "Fitted logistic regression");
    Ok(LogisticClassifier { weights, bias })
}

/// A pipeline stage. The fitted model is the fixed sequence
/// encoder → concatenator → classifier.
#[derive(Debug, Clone, Copy)]
pub enum Stage<'m> {
    OneHotEncoder(&'m OneHotEncoder),
    FeatureConcatenator(&'m FeatureConcatenator),
    LogisticClassifier(&'m LogisticClassifier),
}

impl Stage<'_> {
    pub fn apply<'r>(&self, row: Row<'r>) -> Result<Row<'r>> {
        match self {
            Stage::OneHotEncoder(s) => s.apply(row),
            Stage::FeatureConcatenator(s) => s.apply(row),
            Stage::LogisticClassifier(s) => s.apply(row),
        }
    }
}

/// Output of a single prediction.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PredictionResult {
    pub purchase_again: bool,
    /// Raw classifier margin.
    pub score: f64,
}

impl PredictionResult {
    /// Logistic squashing of the raw score. Not a calibrated probability.
    pub fn probability(&self) -> f64 {
        sigmoid(self.score)
    }
}

impl fmt::Display for PredictionResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let rule = "*".repeat(70);
        writeln!(f, "{rule}")?;
        writeln!(
            f,
            "Predicted Purchase Again: {} (Probability: {:.2})",
            self.purchase_again,
            self.probability()
        )?;
        writeln!(f, "Score (Raw): {}", self.score)?;
        write!(f, "{rule}")
    }
}

pub fn sigmoid(score: f64) -> f64 {
    1.0 / (1.0 + (-score).exp())
}

/// Trained feature pipeline plus classifier.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    pipeline: FeaturePipeline,
    classifier: LogisticClassifier,
}

impl FittedModel {
    /// Fits the feature pipeline and the classifier on the training records.
    pub fn train(
        records: &[PurchaseRecord],
        unknown: UnknownCategory,
        config: &TrainerConfig,
    ) -> Result<Self> {
        if records.is_empty() {
            return Err(PipelineError::Training("training set is empty".to_string()));
        }

        let pipeline = FeaturePipeline::fit(records, unknown);
        let x = pipeline.transform_batch(records)?;
        let y: Array1<bool> = records.iter().map(|r| r.purchase_again).collect();
        let classifier = train_classifier(&x, &y, config)?;

        info!(
            rows = records.len(),
            features = pipeline.width(),
            vocabulary = pipeline.encoder.width(),
            "Trained purchase model"
        );
        Ok(FittedModel { pipeline, classifier })
    }

    pub fn pipeline(&self) -> &FeaturePipeline {
        &self.pipeline
    }

    pub fn classifier(&self) -> &LogisticClassifier {
        &self.classifier
    }

    pub fn stages(&self) -> [Stage<'_>; 3] {
        [
            Stage::OneHotEncoder(&self.pipeline.encoder),
            Stage::FeatureConcatenator(&self.pipeline.concatenator),
            Stage::LogisticClassifier(&self.classifier),
        ]
    }

    /// Raw score of one record after running every stage.
    pub fn score(&self, record: &PurchaseRecord) -> Result<f64> {
        let row = self
            .stages()
            .iter()
            .try_fold(Row::new(record), |row, stage| stage.apply(row))?;
        row.score
            .ok_or_else(|| PipelineError::Prediction("no score produced".to_string()))
    }

    pub fn predict(&self, record: &PurchaseRecord) -> Result<PredictionResult> {
        let score = self.score(record)?;
        Ok(PredictionResult {
            purchase_again: LogisticClassifier::decide(score),
            score,
        })
    }

    /// Saves the model to a binary `.msgpack` file.
    pub fn save(&self, path: &Path) -> Result<()> {
        let file = File::create(path)
            .map_err(|e| PipelineError::Model(format!("{}: {}", path.display(), e)))?;
        let mut writer = BufWriter::new(file);
        write_named(&mut writer, self).map_err(|e| PipelineError::Model(e.to_string()))?;
        info!(path = %path.display(), "Saved model");
        Ok(())
    }

    /// Loads the model from a binary `.msgpack` file.
    pub fn load(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .map_err(|e| PipelineError::Model(format!("{}: {}", path.display(), e)))?;
        let reader = BufReader::new(file);
        from_read(reader).map_err(|e| PipelineError::Model(e.to_string()))
    }
}
