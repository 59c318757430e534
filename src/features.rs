//! Feature extraction: one-hot gender encoding followed by concatenation
//! with the numeric columns.

use crate::data::PurchaseRecord;
use crate::error::{PipelineError, Result};
use ndarray::{Array1, Array2, Axis, concatenate};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Handling of a gender value that was not seen while fitting.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnknownCategory {
    /// Encode as an all-zero indicator block.
    #[default]
    Ignore,
    /// Fail with [`PipelineError::Prediction`].
    Reject,
}

/// Intermediate state of one record as it moves through the pipeline stages.
#[derive(Debug, Clone)]
pub struct Row<'r> {
    pub record: &'r PurchaseRecord,
    pub gender: Option<Array1<f64>>,
    pub features: Option<Array1<f64>>,
    pub score: Option<f64>,
}

impl<'r> Row<'r> {
    pub fn new(record: &'r PurchaseRecord) -> Self {
        Row {
            record,
            gender: None,
            features: None,
            score: None,
        }
    }
}

/// One-hot encoder over the gender column. Vocabulary order is first-seen order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct OneHotEncoder {
    vocab: Vec<String>,
    unknown: UnknownCategory,
}

impl OneHotEncoder {
    pub fn fit<'a>(values: impl IntoIterator<Item = &'a str>, unknown: UnknownCategory) -> Self {
        let mut vocab: Vec<String> = Vec::new();
        for value in values {
            if !vocab.iter().any(|v| v == value) {
                vocab.push(value.to_string());
            }
        }
        OneHotEncoder { vocab, unknown }
    }

    pub fn vocabulary(&self) -> &[String] {
        &self.vocab
    }

    /// Width of the indicator block.
    pub fn width(&self) -> usize {
        self.vocab.len()
    }

    pub fn encode(&self, value: &str) -> Result<Array1<f64>> {
        let mut out = Array1::zeros(self.vocab.len());
        match self.vocab.iter().position(|v| v == value) {
            Some(i) => out[i] = 1.0,
            None => match self.unknown {
                UnknownCategory::Ignore => {
                    warn!(category = value, "Unseen gender category encoded as zeros");
                }
                UnknownCategory::Reject => {
                    return Err(PipelineError::Prediction(format!(
                        "gender category {:?} was not seen during training",
                        value
                    )));
                }
            },
        }
        Ok(out)
    }

    pub fn apply<'r>(&self, mut row: Row<'r>) -> Result<Row<'r>> {
        row.gender = Some(self.encode(&row.record.gender_type)?);
        Ok(row)
    }
}

/// Joins `[AgeCount, PrepurchaseAmount, one-hot(GenderType)]` into the `Features` vector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConcatenator;

impl FeatureConcatenator {
    pub const NUMERIC_COLUMNS: [&'static str; 2] = ["AgeCount", "PrepurchaseAmount"];

    pub fn apply<'r>(&self, mut row: Row<'r>) -> Result<Row<'r>> {
        let gender = row.gender.take().ok_or_else(|| {
            PipelineError::Features("gender must be encoded before concatenation".to_string())
        })?;
        let numeric = Array1::from(vec![row.record.age_count, row.record.prepurchase_amount]);
        let features = concatenate(Axis(0), &[numeric.view(), gender.view()])
            .map_err(|e| PipelineError::Features(e.to_string()))?;
        row.gender = Some(gender);
        row.features = Some(features);
        Ok(row)
    }
}

/// The fitted feature stages, applied identically to training, test and single records.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeaturePipeline {
    pub encoder: OneHotEncoder,
    pub concatenator: FeatureConcatenator,
}

impl FeaturePipeline {
    /// Learns the gender vocabulary from the training records.
    pub fn fit(records: &[PurchaseRecord], unknown: UnknownCategory) -> Self {
        let encoder = OneHotEncoder::fit(records.iter().map(|r| r.gender_type.as_str()), unknown);
        debug!(vocabulary = ?encoder.vocabulary(), "Fitted gender encoder");
        FeaturePipeline {
            encoder,
            concatenator: FeatureConcatenator,
        }
    }

    /// Number of entries in every feature vector.
    pub fn width(&self) -> usize {
        FeatureConcatenator::NUMERIC_COLUMNS.len() + self.encoder.width()
    }

    pub fn feature_names(&self) -> Vec<String> {
        FeatureConcatenator::NUMERIC_COLUMNS
            .iter()
            .map(|c| c.to_string())
            .chain(self.encoder.vocabulary().iter().map(|v| format!("GenderType={}", v)))
            .collect()
    }

    pub fn apply<'r>(&self, row: Row<'r>) -> Result<Row<'r>> {
        self.concatenator.apply(self.encoder.apply(row)?)
    }

    pub fn transform(&self, record: &PurchaseRecord) -> Result<Array1<f64>> {
        self.apply(Row::new(record))?
            .features
            .ok_or_else(|| PipelineError::Features("no features produced".to_string()))
    }

    /// Builds the `(n_records, width)` design matrix.
    pub fn transform_batch(&self, records: &[PurchaseRecord]) -> Result<Array2<f64>> {
        let mut x = Array2::zeros((records.len(), self.width()));
        for (mut out, record) in x.outer_iter_mut().zip(records) {
            out.assign(&self.transform(record)?);
        }
        Ok(x)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(gender: &str) -> PurchaseRecord {
        PurchaseRecord::unlabeled("1", 40.0, gender, 7.5)
    }

    #[test]
    fn test_vocabulary_in_first_seen_order() {
        let records = vec![record("Male"), record("Female"), record("Male")];
        let pipeline = FeaturePipeline::fit(&records, UnknownCategory::Ignore);

        assert_eq!(pipeline.encoder.vocabulary(), ["Male", "Female"]);
        assert_eq!(pipeline.width(), 4);
        assert_eq!(
            pipeline.feature_names(),
            vec!["AgeCount", "PrepurchaseAmount", "GenderType=Male", "GenderType=Female"]
        );
    }

    #[test]
    fn test_transform_layout() {
        let training = [record("Male"), record("Female")];
        let pipeline = FeaturePipeline::fit(&training, UnknownCategory::Ignore);
        let features = pipeline.transform(&record("Female")).unwrap();
        assert_eq!(features.to_vec(), vec![40.0, 7.5, 0.0, 1.0]);
    }

    #[test]
    fn test_width_fixed_at_fit_time() {
        let training = [record("Male"), record("Female")];
        let pipeline = FeaturePipeline::fit(&training, UnknownCategory::Ignore);
        let later = vec![record("Male"), record("Other"), record("Unknown")];
        let x = pipeline.transform_batch(&later).unwrap();
        assert_eq!(x.shape(), &[3, 4]);
    }

    #[test]
    fn test_unseen_category_policies() {
        let training = [record("Male"), record("Female")];

        let ignore = FeaturePipeline::fit(&training, UnknownCategory::Ignore);
        let features = ignore.transform(&record("Other")).unwrap();
        assert_eq!(features.to_vec(), vec![40.0, 7.5, 0.0, 0.0]);

        let reject = FeaturePipeline::fit(&training, UnknownCategory::Reject);
        let err = reject.transform(&record("Other")).unwrap_err();
        assert!(matches!(err, PipelineError::Prediction(_)));
    }

    #[test]
    fn test_concatenate_requires_encoded_gender() {
        let r = record("Male");
        let err = FeatureConcatenator.apply(Row::new(&r)).unwrap_err();
        assert!(matches!(err, PipelineError::Features(_)));
        assert_eq!(err.step(), crate::error::Step::Features);
    }
}
