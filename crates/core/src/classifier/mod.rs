//! Leaf image classification.
//!
//! Two strategies sit behind the [`Classifier`] trait:
//! - [`StandInClassifier`]: dependency-free, returns a random label ordering with a fixed
//!   confidence shape so the rest of the pipeline runs unchanged.
//! - `ClipClassifier` (cargo feature `clip`): zero-shot CLIP similarity between the image and one
//!   text prompt per label.
//!
//! [`build_classifier`] picks the strategy once at startup from [`ClassifierConfig`]. Nothing else
//! in the crate inspects the environment to decide which classifier runs.

#[cfg(feature = "clip")]
mod clip;
mod stand_in;

#[cfg(feature = "clip")]
pub use clip::ClipClassifier;
pub use stand_in::StandInClassifier;

use crate::label::DiseaseLabel;
use leafdoc_types::Confidence;
use serde::Serialize;
use std::fmt;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::sync::Arc;

#[derive(Debug, thiserror::Error)]
pub enum ClassifierError {
    #[error("failed to load classifier model: {0}")]
    ModelLoad(String),
    #[error("classifier model support is not compiled in (enable the `clip` feature)")]
    Unavailable,
    #[error("failed to read image {path}: {reason}")]
    ImageRead { path: PathBuf, reason: String },
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("classifier returned no predictions")]
    EmptyPredictions,
}

pub type ClassifierResult<T> = std::result::Result<T, ClassifierError>;

/// A label with the classifier's confidence in it.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Prediction {
    pub label: DiseaseLabel,
    pub confidence: Confidence,
}

impl Prediction {
    pub fn new(label: DiseaseLabel, confidence: Confidence) -> Self {
        Self { label, confidence }
    }
}

/// Produces ranked predictions for an image on disk.
///
/// Implementations return predictions sorted by descending confidence. They may return every
/// label or only the top few; callers truncate for display.
pub trait Classifier: Send + Sync {
    /// Short identifier used in logs and health output.
    fn name(&self) -> &'static str;

    fn classify(&self, image_path: &Path) -> ClassifierResult<Vec<Prediction>>;
}

/// Sort predictions by descending confidence. Ties keep their original order.
pub fn rank(mut predictions: Vec<Prediction>) -> Vec<Prediction> {
    predictions.sort_by(|a, b| b.confidence.value().total_cmp(&a.confidence.value()));
    predictions
}

/// Which classifier the process should run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ClassifierKind {
    /// Use the model when it is compiled in and loads, otherwise the stand-in.
    #[default]
    Auto,
    /// Prefer the model; a load failure still degrades to the stand-in.
    Clip,
    StandIn,
}

impl fmt::Display for ClassifierKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            ClassifierKind::Auto => "auto",
            ClassifierKind::Clip => "clip",
            ClassifierKind::StandIn => "stand-in",
        })
    }
}

impl FromStr for ClassifierKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "auto" => Ok(ClassifierKind::Auto),
            "clip" => Ok(ClassifierKind::Clip),
            "stand-in" | "standin" | "stand_in" | "dummy" => Ok(ClassifierKind::StandIn),
            other => Err(format!(
                "unknown classifier kind '{other}' (expected auto, clip or stand-in)"
            )),
        }
    }
}

/// Startup settings for [`build_classifier`].
#[derive(Debug, Clone, Default)]
pub struct ClassifierConfig {
    pub kind: ClassifierKind,
    /// Directory holding `model.safetensors` and `tokenizer.json`; the hub is used when unset.
    pub clip_model_dir: Option<PathBuf>,
    /// Fixes the stand-in's ordering, mainly for tests and demos.
    pub stand_in_seed: Option<u64>,
}

/// Build the process-wide classifier.
///
/// A model that is not compiled in or fails to load is not an error: the stand-in is returned
/// and the reason is logged.
pub fn build_classifier(config: &ClassifierConfig) -> Arc<dyn Classifier> {
    let stand_in = || -> Arc<dyn Classifier> {
        Arc::new(match config.stand_in_seed {
            Some(seed) => StandInClassifier::seeded(seed),
            None => StandInClassifier::new(),
        })
    };

    match config.kind {
        ClassifierKind::StandIn => {
            tracing::info!("using stand-in classifier");
            stand_in()
        }
        ClassifierKind::Auto | ClassifierKind::Clip => match load_model(config) {
            Ok(model) => {
                tracing::info!("using {} classifier", model.name());
                model
            }
            Err(e) => {
                tracing::warn!("model classifier unavailable, falling back to stand-in: {e}");
                stand_in()
            }
        },
    }
}

#[cfg(feature = "clip")]
fn load_model(config: &ClassifierConfig) -> ClassifierResult<Arc<dyn Classifier>> {
    let model = ClipClassifier::load(config.clip_model_dir.as_deref())?;
    Ok(Arc::new(model))
}

#[cfg(not(feature = "clip"))]
fn load_model(_config: &ClassifierConfig) -> ClassifierResult<Arc<dyn Classifier>> {
    Err(ClassifierError::Unavailable)
}
