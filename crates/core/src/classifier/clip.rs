use super::{rank, Classifier, ClassifierError, ClassifierResult, Prediction};
use crate::constants::{CLIP_MODEL_REPO, CLIP_MODEL_REVISION, CLIP_PROMPT_TEMPLATE};
use crate::label::DiseaseLabel;
use candle::{DType, Device, Tensor, D};
use candle_nn::VarBuilder;
use candle_transformers::models::clip;
use leafdoc_types::Confidence;
use std::path::{Path, PathBuf};
use tokenizers::Tokenizer;

const PAD_TOKEN: &str = "<|endoftext|>";

/// Zero-shot CLIP ViT-B/32 classifier.
///
/// Text prompts are tokenised once at load; each call encodes the image, takes
/// `logits_per_image` against every prompt and applies a softmax over labels.
pub struct ClipClassifier {
    model: clip::ClipModel,
    input_ids: Tensor,
    image_size: usize,
    device: Device,
}

fn load_err(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::ModelLoad(e.to_string())
}

fn infer_err(e: impl std::fmt::Display) -> ClassifierError {
    ClassifierError::Inference(e.to_string())
}

impl ClipClassifier {
    pub const NAME: &'static str = "clip";

    /// Load weights and tokenizer from `model_dir`, or from the Hugging Face hub when `None`.
    ///
    /// # Errors
    ///
    /// Returns `ClassifierError::ModelLoad` if the files cannot be fetched or parsed.
    pub fn load(model_dir: Option<&Path>) -> ClassifierResult<Self> {
        let (model_file, tokenizer_file) = resolve_model_files(model_dir)?;
        let device = Device::Cpu;

        let config = clip::ClipConfig::vit_base_patch32();
        // SAFETY: the safetensors file is not modified while mapped.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[model_file], DType::F32, &device) }
            .map_err(load_err)?;
        let model = clip::ClipModel::new(vb, &config).map_err(load_err)?;

        let tokenizer = Tokenizer::from_file(&tokenizer_file).map_err(load_err)?;
        let prompts: Vec<String> = DiseaseLabel::ALL
            .iter()
            .map(|label| CLIP_PROMPT_TEMPLATE.replace("{label}", label.as_str()))
            .collect();
        let input_ids = tokenize(&tokenizer, &prompts, &device)?;

        tracing::info!(
            "loaded CLIP model with {} prompts (image size {})",
            prompts.len(),
            config.image_size
        );

        Ok(Self {
            model,
            input_ids,
            image_size: config.image_size,
            device,
        })
    }

    fn load_image(&self, path: &Path) -> ClassifierResult<Tensor> {
        let read_err = |reason: String| ClassifierError::ImageRead {
            path: path.to_path_buf(),
            reason,
        };
        let img = image::ImageReader::open(path)
            .map_err(|e| read_err(e.to_string()))?
            .with_guessed_format()
            .map_err(|e| read_err(e.to_string()))?
            .decode()
            .map_err(|e| read_err(e.to_string()))?;

        let size = self.image_size as u32;
        let img = img
            .resize_exact(size, size, image::imageops::FilterType::Triangle)
            .to_rgb8()
            .into_raw();

        Tensor::from_vec(img, (self.image_size, self.image_size, 3), &self.device)
            .and_then(|t| t.permute((2, 0, 1)))
            .and_then(|t| t.to_dtype(DType::F32))
            .and_then(|t| t.affine(2. / 255., -1.))
            .map_err(infer_err)
    }
}

impl Classifier for ClipClassifier {
    fn name(&self) -> &'static str {
        Self::NAME
    }

    fn classify(&self, image_path: &Path) -> ClassifierResult<Vec<Prediction>> {
        let pixels = self.load_image(image_path)?.unsqueeze(0).map_err(infer_err)?;

        let (_logits_per_text, logits_per_image) = self
            .model
            .forward(&pixels, &self.input_ids)
            .map_err(infer_err)?;
        let probs = candle_nn::ops::softmax(&logits_per_image, D::Minus1)
            .and_then(|t| t.squeeze(0))
            .and_then(|t| t.to_vec1::<f32>())
            .map_err(infer_err)?;

        if probs.len() != DiseaseLabel::ALL.len() {
            return Err(ClassifierError::Inference(format!(
                "expected {} scores, got {}",
                DiseaseLabel::ALL.len(),
                probs.len()
            )));
        }

        let predictions = DiseaseLabel::ALL
            .into_iter()
            .zip(probs)
            .map(|(label, p)| Prediction::new(label, Confidence::saturating(p)))
            .collect();
        Ok(rank(predictions))
    }
}

fn resolve_model_files(model_dir: Option<&Path>) -> ClassifierResult<(PathBuf, PathBuf)> {
    match model_dir {
        Some(dir) => {
            let model = dir.join("model.safetensors");
            let tokenizer = dir.join("tokenizer.json");
            for file in [&model, &tokenizer] {
                if !file.is_file() {
                    return Err(ClassifierError::ModelLoad(format!(
                        "missing model file {}",
                        file.display()
                    )));
                }
            }
            Ok((model, tokenizer))
        }
        None => {
            let api = hf_hub::api::sync::Api::new().map_err(load_err)?;
            let repo = api.repo(hf_hub::Repo::with_revision(
                CLIP_MODEL_REPO.to_string(),
                hf_hub::RepoType::Model,
                CLIP_MODEL_REVISION.to_string(),
            ));
            let model = repo.get("model.safetensors").map_err(load_err)?;
            let tokenizer = repo.get("tokenizer.json").map_err(load_err)?;
            Ok((model, tokenizer))
        }
    }
}

/// Encode prompts and right-pad them to a common length.
fn tokenize(tokenizer: &Tokenizer, prompts: &[String], device: &Device) -> ClassifierResult<Tensor> {
    let pad_id = *tokenizer
        .get_vocab(true)
        .get(PAD_TOKEN)
        .ok_or_else(|| ClassifierError::ModelLoad(format!("tokenizer has no {PAD_TOKEN} token")))?;

    let mut tokens = Vec::with_capacity(prompts.len());
    for prompt in prompts {
        let encoding = tokenizer.encode(prompt.as_str(), true).map_err(load_err)?;
        tokens.push(encoding.get_ids().to_vec());
    }

    let max_len = tokens.iter().map(Vec::len).max().unwrap_or(0);
    for ids in tokens.iter_mut() {
        ids.resize(max_len, pad_id);
    }

    Tensor::new(tokens, device).map_err(load_err)
}
