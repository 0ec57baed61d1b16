//! # LeafDoc Core
//!
//! Core logic for leaf disease diagnosis:
//! - the closed label set ([`DiseaseLabel`])
//! - the static treatment table ([`TreatmentCatalog`])
//! - image classification behind the [`Classifier`] trait (model-backed or stand-in)
//! - explanations from a local language model with a templated fallback
//! - the prediction pipeline tying these together ([`PredictionService`])
//!
//! **No API concerns**: HTTP, sessions and user accounts belong in `api-rest` and `api-shared`.

pub mod catalog;
pub mod classifier;
pub mod config;
pub mod constants;
pub mod error;
pub mod explain;
pub mod label;
pub mod pipeline;
pub mod validation;

pub use catalog::{Remedy, TreatmentCatalog, TreatmentRecord};
pub use classifier::{
    build_classifier, Classifier, ClassifierConfig, ClassifierError, ClassifierKind, Prediction,
    StandInClassifier,
};
pub use config::CoreConfig;
pub use error::{CoreError, CoreResult};
pub use explain::{
    CommandGenerator, ExplainError, ExplainerConfig, Explanation, ExplanationGenerator,
    ExplanationService, ExplanationSource, ExplanationText,
};
pub use label::{DiseaseLabel, UnknownLabel};
pub use leafdoc_types::{Confidence, NonEmptyText};
pub use pipeline::{is_low_confidence, Diagnosis, PredictionService, TreatmentReport};
