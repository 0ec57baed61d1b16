//! Constants used throughout the LeafDoc core crate.
//!
//! Defaults for every startup setting live here so the binaries and tests agree on them.

use std::time::Duration;

/// Default directory for saved uploads when no explicit directory is configured.
pub const DEFAULT_UPLOAD_DIR: &str = "static/uploads";

/// File extensions accepted for uploaded images (compared case-insensitively).
pub const ALLOWED_IMAGE_EXTENSIONS: [&str; 3] = ["png", "jpg", "jpeg"];

/// Top confidence below which a diagnosis carries a low-confidence warning.
pub const DEFAULT_CONFIDENCE_THRESHOLD: f32 = 0.15;

/// Number of predictions shown to the caller.
pub const DEFAULT_MAX_RESULTS: usize = 3;

/// Warning attached to low-confidence diagnoses.
pub const LOW_CONFIDENCE_WARNING: &str = "Prediction confidence is low. Results may be inaccurate.";

/// Program used to run the local language model.
pub const DEFAULT_EXPLAINER_PROGRAM: &str = "ollama";

/// Model identifier handed to the explainer program.
pub const DEFAULT_EXPLAINER_MODEL: &str =
    "hf.co/CopyleftCultivars/Mistral7B-NaturalFarmerV4-GGUF:Q4_K_M";

/// Upper bound on a single explanation call.
pub const DEFAULT_EXPLAINER_TIMEOUT: Duration = Duration::from_secs(60);

/// Prompt template for the model-backed classifier; `{label}` is substituted per label.
pub const CLIP_PROMPT_TEMPLATE: &str = "clear photo of plant leaf with {label}";

/// Hugging Face repository holding the CLIP weights.
pub const CLIP_MODEL_REPO: &str = "openai/clip-vit-base-patch32";

/// Revision of [`CLIP_MODEL_REPO`] that ships `model.safetensors`.
pub const CLIP_MODEL_REVISION: &str = "refs/pr/15";

/// Confidence shape produced by the stand-in classifier, highest first.
pub const STAND_IN_CONFIDENCES: [f32; 3] = [0.78, 0.14, 0.08];
