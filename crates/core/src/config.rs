//! Core runtime configuration.
//!
//! Everything here is resolved once at process startup and passed into the services. Request
//! handling never reads environment variables, which keeps behaviour consistent across threads
//! and test harnesses.

use crate::catalog::TreatmentCatalog;
use crate::classifier::{ClassifierConfig, ClassifierKind};
use crate::constants::{
    DEFAULT_CONFIDENCE_THRESHOLD, DEFAULT_EXPLAINER_MODEL, DEFAULT_EXPLAINER_PROGRAM,
    DEFAULT_EXPLAINER_TIMEOUT, DEFAULT_MAX_RESULTS, DEFAULT_UPLOAD_DIR,
};
use crate::explain::ExplainerConfig;
use crate::{CoreError, CoreResult};
use std::fmt::Display;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use std::time::Duration;

/// Core configuration resolved at startup.
#[derive(Clone, Debug)]
pub struct CoreConfig {
    upload_dir: PathBuf,
    classifier: ClassifierConfig,
    explainer: ExplainerConfig,
    confidence_threshold: f32,
    max_results: usize,
    treatments_file: Option<PathBuf>,
}

impl CoreConfig {
    /// Create a new `CoreConfig`.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if the threshold is outside `[0, 1]`, `max_results` is
    /// zero, the explainer program is blank, or the explainer timeout is zero.
    pub fn new(
        upload_dir: PathBuf,
        classifier: ClassifierConfig,
        explainer: ExplainerConfig,
        confidence_threshold: f32,
        max_results: usize,
        treatments_file: Option<PathBuf>,
    ) -> CoreResult<Self> {
        if !(0.0..=1.0).contains(&confidence_threshold) {
            return Err(CoreError::InvalidConfig(format!(
                "confidence threshold {confidence_threshold} is outside [0, 1]"
            )));
        }
        if max_results == 0 {
            return Err(CoreError::InvalidConfig(
                "max_results must be at least 1".into(),
            ));
        }
        if explainer.program.trim().is_empty() {
            return Err(CoreError::InvalidConfig(
                "explainer program cannot be empty".into(),
            ));
        }
        if explainer.timeout.is_zero() {
            return Err(CoreError::InvalidConfig(
                "explainer timeout must be greater than zero".into(),
            ));
        }

        Ok(Self {
            upload_dir,
            classifier,
            explainer,
            confidence_threshold,
            max_results,
            treatments_file,
        })
    }

    pub fn upload_dir(&self) -> &Path {
        &self.upload_dir
    }

    pub fn classifier(&self) -> &ClassifierConfig {
        &self.classifier
    }

    pub fn explainer(&self) -> &ExplainerConfig {
        &self.explainer
    }

    pub fn confidence_threshold(&self) -> f32 {
        self.confidence_threshold
    }

    pub fn max_results(&self) -> usize {
        self.max_results
    }

    /// Parse the configured treatment table, or the embedded one when none is configured.
    pub fn load_catalog(&self) -> CoreResult<TreatmentCatalog> {
        match &self.treatments_file {
            Some(path) => {
                tracing::info!("loading treatment table from {}", path.display());
                TreatmentCatalog::from_path(path)
            }
            None => TreatmentCatalog::embedded(),
        }
    }
}

impl CoreConfig {
    /// Build the configuration from `LEAFDOC_*` variables.
    ///
    /// `lookup` returns the raw value of a variable; binaries pass `std::env::var(..).ok()` and
    /// call this exactly once at startup. Unset or blank variables take their defaults.
    ///
    /// # Errors
    ///
    /// Returns `CoreError::InvalidConfig` if a variable does not parse or the resulting values
    /// are rejected by [`CoreConfig::new`].
    pub fn from_env_lookup(lookup: impl Fn(&str) -> Option<String>) -> CoreResult<Self> {
        let upload_dir = parse_env_value(
            "LEAFDOC_UPLOAD_DIR",
            lookup("LEAFDOC_UPLOAD_DIR"),
            PathBuf::from(DEFAULT_UPLOAD_DIR),
        )?;

        let classifier = ClassifierConfig {
            kind: parse_env_value(
                "LEAFDOC_CLASSIFIER",
                lookup("LEAFDOC_CLASSIFIER"),
                ClassifierKind::Auto,
            )?,
            clip_model_dir: parse_optional_env_value(
                "LEAFDOC_CLIP_MODEL_DIR",
                lookup("LEAFDOC_CLIP_MODEL_DIR"),
            )?,
            stand_in_seed: parse_optional_env_value(
                "LEAFDOC_STANDIN_SEED",
                lookup("LEAFDOC_STANDIN_SEED"),
            )?,
        };

        let timeout_secs: u64 = parse_env_value(
            "LEAFDOC_EXPLAINER_TIMEOUT_SECS",
            lookup("LEAFDOC_EXPLAINER_TIMEOUT_SECS"),
            DEFAULT_EXPLAINER_TIMEOUT.as_secs(),
        )?;
        let explainer = ExplainerConfig {
            program: parse_env_value(
                "LEAFDOC_EXPLAINER_PROGRAM",
                lookup("LEAFDOC_EXPLAINER_PROGRAM"),
                DEFAULT_EXPLAINER_PROGRAM.to_string(),
            )?,
            model: parse_env_value(
                "LEAFDOC_EXPLAINER_MODEL",
                lookup("LEAFDOC_EXPLAINER_MODEL"),
                DEFAULT_EXPLAINER_MODEL.to_string(),
            )?,
            timeout: Duration::from_secs(timeout_secs),
        };

        Self::new(
            upload_dir,
            classifier,
            explainer,
            parse_env_value(
                "LEAFDOC_CONFIDENCE_THRESHOLD",
                lookup("LEAFDOC_CONFIDENCE_THRESHOLD"),
                DEFAULT_CONFIDENCE_THRESHOLD,
            )?,
            parse_env_value(
                "LEAFDOC_MAX_RESULTS",
                lookup("LEAFDOC_MAX_RESULTS"),
                DEFAULT_MAX_RESULTS,
            )?,
            parse_optional_env_value("LEAFDOC_TREATMENTS_FILE", lookup("LEAFDOC_TREATMENTS_FILE"))?,
        )
    }
}

/// Parse an optional environment value, using `default` when it is unset or blank.
///
/// # Errors
///
/// Returns `CoreError::InvalidConfig` naming `name` when the value does not parse.
pub fn parse_env_value<T>(name: &str, value: Option<String>, default: T) -> CoreResult<T>
where
    T: FromStr,
    T::Err: Display,
{
    Ok(parse_optional_env_value(name, value)?.unwrap_or(default))
}

/// Parse an optional environment value; unset or blank yields `None`.
pub fn parse_optional_env_value<T>(name: &str, value: Option<String>) -> CoreResult<Option<T>>
where
    T: FromStr,
    T::Err: Display,
{
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
        .map(|v| {
            v.parse::<T>()
                .map_err(|e| CoreError::InvalidConfig(format!("{name}={v}: {e}")))
        })
        .transpose()
}
