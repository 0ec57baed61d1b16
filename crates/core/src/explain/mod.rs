//! Human-readable explanations for a diagnosed label.
//!
//! [`ExplanationGenerator`] is the seam to the local language model. [`ExplanationService`] wraps
//! a generator and guarantees an answer: empty output or any generator error is replaced by the
//! deterministic template from [`template::fallback_explanation`], built from the treatment table.

mod command;
pub mod template;

pub use command::{CommandGenerator, ExplainerConfig};

use crate::catalog::TreatmentCatalog;
use crate::label::DiseaseLabel;
use async_trait::async_trait;
use leafdoc_types::{Confidence, NonEmptyText, TextError};
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

#[derive(Debug, thiserror::Error)]
pub enum ExplainError {
    #[error("failed to start explainer program {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },
    #[error("explainer I/O failed: {0}")]
    Io(#[from] std::io::Error),
    #[error("explainer timed out after {0:?}")]
    Timeout(Duration),
    #[error("explainer exited with status {code:?}: {stderr}")]
    NonZeroExit { code: Option<i32>, stderr: String },
}

pub type ExplainResult<T> = std::result::Result<T, ExplainError>;

/// Produces raw explanation text for a label.
///
/// Implementations may fail or return blank text; [`ExplanationService`] handles both.
#[async_trait]
pub trait ExplanationGenerator: Send + Sync {
    async fn generate(
        &self,
        label: DiseaseLabel,
        confidence: Option<Confidence>,
    ) -> ExplainResult<String>;
}

/// Explanation text that is never empty or all whitespace.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(transparent)]
pub struct ExplanationText(NonEmptyText);

impl ExplanationText {
    /// Trims `text`; fails if nothing is left.
    pub fn new(text: impl AsRef<str>) -> Result<Self, TextError> {
        NonEmptyText::new(text).map(Self)
    }

    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    pub fn into_string(self) -> String {
        self.0.into_string()
    }
}

impl std::fmt::Display for ExplanationText {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Where an explanation came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ExplanationSource {
    Model,
    Fallback,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Explanation {
    pub text: ExplanationText,
    pub source: ExplanationSource,
}

/// Generator plus fallback policy.
#[derive(Clone)]
pub struct ExplanationService {
    generator: Arc<dyn ExplanationGenerator>,
    catalog: Arc<TreatmentCatalog>,
}

impl ExplanationService {
    pub fn new(generator: Arc<dyn ExplanationGenerator>, catalog: Arc<TreatmentCatalog>) -> Self {
        Self { generator, catalog }
    }

    /// Explain `label`, falling back to the template on any generator failure.
    ///
    /// A generator that exits non-zero is treated as failed even if it printed something.
    pub async fn explain(
        &self,
        label: DiseaseLabel,
        confidence: Option<Confidence>,
    ) -> Explanation {
        match self.generator.generate(label, confidence).await {
            Ok(raw) => match ExplanationText::new(&raw) {
                Ok(text) => {
                    return Explanation {
                        text,
                        source: ExplanationSource::Model,
                    }
                }
                Err(_) => tracing::warn!("explainer returned empty output for {label}"),
            },
            Err(e) => tracing::warn!("explainer failed for {label}: {e}"),
        }

        Explanation {
            text: template::fallback_explanation(label, confidence, self.catalog.get(label)),
            source: ExplanationSource::Fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use template::section_items;

    struct Canned(&'static str);

    #[async_trait]
    impl ExplanationGenerator for Canned {
        async fn generate(&self, _: DiseaseLabel, _: Option<Confidence>) -> ExplainResult<String> {
            Ok(self.0.to_string())
        }
    }

    struct Failing;

    #[async_trait]
    impl ExplanationGenerator for Failing {
        async fn generate(&self, _: DiseaseLabel, _: Option<Confidence>) -> ExplainResult<String> {
            Err(ExplainError::NonZeroExit {
                code: Some(1),
                stderr: "model not found".into(),
            })
        }
    }

    fn service(generator: impl ExplanationGenerator + 'static) -> ExplanationService {
        ExplanationService::new(
            Arc::new(generator),
            Arc::new(TreatmentCatalog::embedded().unwrap()),
        )
    }

    #[tokio::test]
    async fn model_output_is_trimmed_and_used_verbatim() {
        let svc = service(Canned("\n  Disease Overview:\nIt is blight.  \n"));
        let explanation = svc.explain(DiseaseLabel::EarlyBlight, None).await;
        assert_eq!(explanation.source, ExplanationSource::Model);
        assert_eq!(explanation.text.as_str(), "Disease Overview:\nIt is blight.");
    }

    #[tokio::test]
    async fn blank_output_falls_back() {
        let svc = service(Canned(" \n\t "));
        let explanation = svc.explain(DiseaseLabel::LeafMold, None).await;
        assert_eq!(explanation.source, ExplanationSource::Fallback);
        assert!(explanation.text.as_str().contains("Leaf Mold disease"));
    }

    #[tokio::test]
    async fn never_empty_for_any_label_on_either_path() {
        let ok = service(Canned("Overview"));
        let failing = service(Failing);
        for label in DiseaseLabel::ALL {
            for svc in [&ok, &failing] {
                let explanation = svc.explain(label, None).await;
                assert!(!explanation.text.as_str().trim().is_empty());
            }
        }
    }

    #[tokio::test]
    async fn healthy_fallback_renders_none_and_two_tips() {
        let svc = service(Failing);
        let explanation = svc.explain(DiseaseLabel::Healthy, None).await;
        let text = explanation.text.as_str();

        assert_eq!(explanation.source, ExplanationSource::Fallback);
        assert_eq!(section_items(text, "Chemical:"), vec!["(none)"]);
        assert_eq!(section_items(text, "Organic:"), vec!["(none)"]);
        assert_eq!(
            section_items(text, "Prevention:"),
            vec!["Maintain regular plant care", "Monitor for pests and diseases"]
        );
    }

    #[tokio::test]
    async fn early_blight_fallback_includes_confidence_and_chemicals() {
        let svc = service(Failing);
        let confidence = Confidence::new(0.78).unwrap();
        let explanation = svc
            .explain(DiseaseLabel::EarlyBlight, Some(confidence))
            .await;
        let text = explanation.text.as_str();

        assert!(text.contains("78"), "confidence missing from:\n{text}");
        assert_eq!(
            section_items(text, "Chemical:"),
            vec!["Chlorothalonil", "Mancozeb", "Copper-based fungicides"]
        );
    }

    #[test]
    fn explanation_text_rejects_blank() {
        assert!(ExplanationText::new("   ").is_err());
        assert_eq!(ExplanationText::new(" x ").unwrap().as_str(), "x");
    }
}
