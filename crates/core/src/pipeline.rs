//! Prediction pipeline: classify, pick the top label, look up its treatment, explain it.

use crate::catalog::{Remedy, TreatmentCatalog, TreatmentRecord};
use crate::classifier::{build_classifier, rank, Classifier, ClassifierError, Prediction};
use crate::config::CoreConfig;
use crate::constants::LOW_CONFIDENCE_WARNING;
use crate::explain::{CommandGenerator, Explanation, ExplanationGenerator, ExplanationService};
use crate::label::DiseaseLabel;
use crate::{CoreError, CoreResult};
use leafdoc_types::Confidence;
use serde::Serialize;
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// Top label with its treatment, the aggregate consumed by callers that do not need text.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TreatmentReport {
    pub predicted_disease: DiseaseLabel,
    pub confidence: Confidence,
    pub chemical_solution: Vec<Remedy>,
    pub organic_solution: Vec<Remedy>,
    pub prevention_tips: Vec<String>,
}

/// Everything shown to the user for one analysed image.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Diagnosis {
    /// Highest-confidence predictions, at most `max_results`.
    pub predictions: Vec<Prediction>,
    pub top: Prediction,
    pub treatment: TreatmentRecord,
    pub explanation: Explanation,
    pub low_confidence: bool,
    pub warning: Option<String>,
}

/// Whether `confidence` falls below the warning threshold.
pub fn is_low_confidence(confidence: Confidence, threshold: f32) -> bool {
    confidence.value() < threshold
}

/// Runs the full analysis for uploaded images.
///
/// Cheap to clone; all state is shared and read-only.
#[derive(Clone)]
pub struct PredictionService {
    classifier: Arc<dyn Classifier>,
    catalog: Arc<TreatmentCatalog>,
    explanations: ExplanationService,
    confidence_threshold: f32,
    max_results: usize,
}

impl PredictionService {
    pub fn new(
        classifier: Arc<dyn Classifier>,
        catalog: Arc<TreatmentCatalog>,
        generator: Arc<dyn ExplanationGenerator>,
        confidence_threshold: f32,
        max_results: usize,
    ) -> Self {
        let explanations = ExplanationService::new(generator, catalog.clone());
        Self {
            classifier,
            catalog,
            explanations,
            confidence_threshold,
            max_results: max_results.max(1),
        }
    }

    /// Wire the production services from startup configuration.
    ///
    /// The classifier strategy is chosen here, once.
    ///
    /// # Errors
    ///
    /// Returns an error if the treatment table cannot be loaded.
    pub fn from_config(cfg: &CoreConfig) -> CoreResult<Self> {
        let catalog = Arc::new(cfg.load_catalog()?);
        let classifier = build_classifier(cfg.classifier());
        let generator = Arc::new(CommandGenerator::from_config(cfg.explainer()));
        Ok(Self::new(
            classifier,
            catalog,
            generator,
            cfg.confidence_threshold(),
            cfg.max_results(),
        ))
    }

    pub fn catalog(&self) -> &TreatmentCatalog {
        &self.catalog
    }

    pub fn explanations(&self) -> &ExplanationService {
        &self.explanations
    }

    pub fn classifier_name(&self) -> &'static str {
        self.classifier.name()
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Classify and rank. Every classifier failure becomes `CoreError::AnalysisFailed`.
    pub fn classify(&self, image_path: &Path) -> CoreResult<Vec<Prediction>> {
        let predictions = self
            .classifier
            .classify(image_path)
            .map_err(CoreError::AnalysisFailed)?;
        if predictions.is_empty() {
            return Err(CoreError::AnalysisFailed(ClassifierError::EmptyPredictions));
        }
        Ok(rank(predictions))
    }

    /// Top label and its treatment, without an explanation.
    pub fn predict_and_treat(&self, image_path: &Path) -> CoreResult<TreatmentReport> {
        let predictions = self.classify(image_path)?;
        let top = predictions[0];
        let record = self.catalog.get(top.label);
        Ok(TreatmentReport {
            predicted_disease: top.label,
            confidence: top.confidence,
            chemical_solution: record.chemical.clone(),
            organic_solution: record.organic.clone(),
            prevention_tips: record.prevention.clone(),
        })
    }

    /// Full analysis of one image.
    ///
    /// The classifier runs on the blocking pool; the explanation is awaited afterwards.
    ///
    /// # Errors
    ///
    /// Only classification can fail (`CoreError::AnalysisFailed`); explanation failures are
    /// recovered with the fallback text.
    pub async fn diagnose(&self, image_path: PathBuf) -> CoreResult<Diagnosis> {
        let this = self.clone();
        let predictions = tokio::task::spawn_blocking(move || this.classify(&image_path))
            .await
            .map_err(|e| CoreError::AnalysisFailed(ClassifierError::Inference(e.to_string())))??;

        let top = predictions[0];
        let treatment = self.catalog.get(top.label).clone();
        let explanation = self
            .explanations
            .explain(top.label, Some(top.confidence))
            .await;

        let low_confidence = is_low_confidence(top.confidence, self.confidence_threshold);
        if low_confidence {
            tracing::info!(
                "low-confidence diagnosis: {} at {}",
                top.label,
                top.confidence
            );
        }

        Ok(Diagnosis {
            predictions: predictions.into_iter().take(self.max_results).collect(),
            top,
            treatment,
            explanation,
            low_confidence,
            warning: low_confidence.then(|| LOW_CONFIDENCE_WARNING.to_string()),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::{ClassifierResult, StandInClassifier};
    use crate::explain::{ExplainError, ExplainResult, ExplanationSource};
    use async_trait::async_trait;

    /// Returns a fixed ranking regardless of input.
    struct Fixed(Vec<(DiseaseLabel, f32)>);

    impl Classifier for Fixed {
        fn name(&self) -> &'static str {
            "fixed"
        }

        fn classify(&self, _: &Path) -> ClassifierResult<Vec<Prediction>> {
            Ok(self
                .0
                .iter()
                .map(|&(label, c)| Prediction::new(label, Confidence::new(c).unwrap()))
                .collect())
        }
    }

    struct Broken;

    impl Classifier for Broken {
        fn name(&self) -> &'static str {
            "broken"
        }

        fn classify(&self, path: &Path) -> ClassifierResult<Vec<Prediction>> {
            Err(ClassifierError::ImageRead {
                path: path.to_path_buf(),
                reason: "truncated file".into(),
            })
        }
    }

    struct Offline;

    #[async_trait]
    impl ExplanationGenerator for Offline {
        async fn generate(&self, _: DiseaseLabel, _: Option<Confidence>) -> ExplainResult<String> {
            Err(ExplainError::Timeout(std::time::Duration::from_secs(60)))
        }
    }

    fn service(classifier: impl Classifier + 'static) -> PredictionService {
        PredictionService::new(
            Arc::new(classifier),
            Arc::new(TreatmentCatalog::embedded().unwrap()),
            Arc::new(Offline),
            0.15,
            3,
        )
    }

    #[test]
    fn low_confidence_threshold_is_strict() {
        let c = |v| Confidence::new(v).unwrap();
        assert!(is_low_confidence(c(0.10), 0.15));
        assert!(!is_low_confidence(c(0.20), 0.15));
        assert!(!is_low_confidence(c(0.15), 0.15));
    }

    #[test]
    fn predict_and_treat_merges_top_label_with_treatment() {
        let svc = service(Fixed(vec![
            (DiseaseLabel::Healthy, 0.05),
            (DiseaseLabel::EarlyBlight, 0.78),
            (DiseaseLabel::LeafMold, 0.17),
        ]));
        let report = svc.predict_and_treat(Path::new("leaf.jpg")).unwrap();

        assert_eq!(report.predicted_disease, DiseaseLabel::EarlyBlight);
        assert!((report.confidence.value() - 0.78).abs() < 1e-6);
        assert_eq!(report.chemical_solution.len(), 3);
        assert_eq!(report.organic_solution[0].name, "Neem oil spray");
        assert_eq!(report.prevention_tips[0], "Rotate crops yearly");
    }

    #[test]
    fn classifier_error_is_analysis_failed() {
        let svc = service(Broken);
        assert!(matches!(
            svc.predict_and_treat(Path::new("leaf.jpg")),
            Err(CoreError::AnalysisFailed(ClassifierError::ImageRead { .. }))
        ));
    }

    #[test]
    fn empty_ranking_is_analysis_failed() {
        let svc = service(Fixed(vec![]));
        assert!(matches!(
            svc.classify(Path::new("leaf.jpg")),
            Err(CoreError::AnalysisFailed(ClassifierError::EmptyPredictions))
        ));
    }

    #[tokio::test]
    async fn diagnose_truncates_and_sorts() {
        let svc = service(Fixed(vec![
            (DiseaseLabel::Healthy, 0.02),
            (DiseaseLabel::LeafCurl, 0.40),
            (DiseaseLabel::LateBlight, 0.30),
            (DiseaseLabel::LeafMold, 0.20),
            (DiseaseLabel::BacterialSpot, 0.08),
        ]));
        let diagnosis = svc.diagnose(PathBuf::from("leaf.png")).await.unwrap();

        let labels: Vec<_> = diagnosis.predictions.iter().map(|p| p.label).collect();
        assert_eq!(
            labels,
            vec![
                DiseaseLabel::LeafCurl,
                DiseaseLabel::LateBlight,
                DiseaseLabel::LeafMold
            ]
        );
        assert_eq!(diagnosis.top.label, DiseaseLabel::LeafCurl);
        assert_eq!(diagnosis.explanation.source, ExplanationSource::Fallback);
        assert!(!diagnosis.low_confidence);
        assert!(diagnosis.warning.is_none());
    }

    #[tokio::test]
    async fn diagnose_flags_low_confidence() {
        let svc = service(Fixed(vec![
            (DiseaseLabel::LeafMold, 0.10),
            (DiseaseLabel::Healthy, 0.09),
        ]));
        let diagnosis = svc.diagnose(PathBuf::from("leaf.png")).await.unwrap();
        assert!(diagnosis.low_confidence);
        assert_eq!(diagnosis.warning.as_deref(), Some(LOW_CONFIDENCE_WARNING));

        let svc = service(Fixed(vec![(DiseaseLabel::LeafMold, 0.20)]));
        let diagnosis = svc.diagnose(PathBuf::from("leaf.png")).await.unwrap();
        assert!(!diagnosis.low_confidence);
    }

    #[tokio::test]
    async fn diagnose_with_stand_in_explains_top_label() {
        let svc = service(StandInClassifier::seeded(3));
        let diagnosis = svc.diagnose(PathBuf::from("leaf.jpg")).await.unwrap();

        assert_eq!(diagnosis.predictions.len(), 3);
        assert!(diagnosis
            .explanation
            .text
            .as_str()
            .contains(diagnosis.top.label.as_str()));
        assert_eq!(&diagnosis.treatment, svc.catalog().get(diagnosis.top.label));
    }

    #[tokio::test]
    async fn diagnose_propagates_classifier_failure() {
        let svc = service(Broken);
        let result = svc.diagnose(PathBuf::from("leaf.jpg")).await;
        assert!(matches!(result, Err(CoreError::AnalysisFailed(_))));
    }
}
