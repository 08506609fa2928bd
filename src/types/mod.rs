//! Type definitions for the health risk pipeline

pub mod patient;
pub mod prediction;

pub use patient::{PatientPayload, PatientRecord};
pub use prediction::{ErrorResponse, HealthResponse, PredictionResponse};
