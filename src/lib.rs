//! # purchase_again
//!
//! Predict whether a customer will purchase again from their age, gender and
//! previous purchase amount, using a [`linfa-logistic`](https://crates.io/crates/linfa-logistic)
//! binary logistic regression.
//!
//! The pipeline is strictly forward:
//! CSV → [`PurchaseRecord`] → one-hot gender + numeric columns → [`FittedModel`]
//! → [`EvaluationMetrics`] / [`PredictionResult`].
//!
//! ## Features
//! - Schema-table CSV loading with row-level error reporting
//! - One-hot encoding with a configurable policy for unseen categories
//! - Accuracy, AUC, F1, precision, recall, log-loss and the confusion matrix
//! - Model persistence with `rmp-serde` (MessagePack)
//!
//! ## Example
//! ```rust
//! use purchase_again::{synthetic, FittedModel, PurchaseRecord, TrainerConfig, UnknownCategory};
//! let records = synthetic::generate(200, 0);
//! let config = TrainerConfig::default();
//! let model = FittedModel::train(&records, UnknownCategory::Ignore, &config).unwrap();
//! let result = model.predict(&PurchaseRecord::unlabeled("499", 52.0, "Male", 3.0)).unwrap();
//! println!("Purchase again: {} (p = {:.2})", result.purchase_again, result.probability());
//! ```

pub mod config;
pub mod data;
pub mod error;
pub mod evaluate;
pub mod features;
pub mod model;
pub mod synthetic;

pub use config::Config;
pub use data::{
    LoadOptions, PurchaseRecord, RecordReader, load_records, train_test_split, write_records,
};
pub use error::{PipelineError, Result, Step};
pub use evaluate::{ConfusionMatrix, EvaluationMetrics};
pub use features::{FeaturePipeline, UnknownCategory};
pub use model::{FittedModel, LogisticClassifier, PredictionResult, Stage, TrainerConfig};
