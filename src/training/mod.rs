//! Offline training: dataset, split, evaluation and the end-to-end pipeline

pub mod dataset;
pub mod evaluation;
pub mod pipeline;
pub mod split;
pub mod synthetic;

pub use dataset::Dataset;
pub use evaluation::EvaluationReport;
pub use pipeline::{TrainingPipeline, TrainingReport};
pub use synthetic::SyntheticGenerator;
