use super::{Classifier, ClassifierResult, Prediction};
use crate::constants::STAND_IN_CONFIDENCES;
use crate::label::DiseaseLabel;
use leafdoc_types::Confidence;
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use std::path::Path;

/// Classifier used when the model is unavailable.
///
/// Shuffles the label set and assigns the fixed confidences `0.78, 0.14, 0.08` to the first three
/// labels. The image is never read. With a seed, every call returns the same ordering.
#[derive(Debug, Clone, Default)]
pub struct StandInClassifier {
    seed: Option<u64>,
}

impl StandInClassifier {
    pub const NAME: &'static str = "stand-in";

    pub fn new() -> Self {
        Self { seed: None }
    }

    pub fn seeded(seed: u64) -> Self {
        Self { seed: Some(seed) }
    }

    fn predictions_from(rng: &mut impl Rng) -> Vec<Prediction> {
        let mut labels = DiseaseLabel::ALL;
        labels.shuffle(rng);
        labels
            .into_iter()
            .zip(STAND_IN_CONFIDENCES)
            .map(|(label, c)| Prediction::new(label, Confidence::saturating(c)))
            .collect()
    }
}

impl Classifier for StandInClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn classify(&self, image_path: &Path) -> ClassifierResult<Vec<Prediction>> {
        tracing::debug!("stand-in classification for {}", image_path.display());
        let predictions = match self.seed {
            Some(seed) => Self::predictions_from(&mut StdRng::seed_from_u64(seed)),
            None => Self::predictions_from(&mut rand::thread_rng()),
        };
        Ok(predictions)
    }
}
