//! Candle BERT cross-encoder.
//!
//! Loads a sequence-classification checkpoint (`config.json`,
//! `model.safetensors`, `tokenizer.json`) and scores query/document pairs in a
//! single padded batch. The score is the raw logit of the one-unit classifier
//! head on the `[CLS]` token.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use candle_core::{DType, Device, IndexOp, Tensor};
use candle_nn::{Linear, Module, VarBuilder};
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::{Encoding, Tokenizer};
use tracing::{debug, info};

use super::device::{device_label, select_device};
use super::error::ModelError;
use super::tokenizer::load_pair_tokenizer;
use super::{CrossEncoder, ModelLoader};

const REQUIRED_FILES: [&str; 3] = ["config.json", "model.safetensors", "tokenizer.json"];

struct SequenceClassifier {
    bert: BertModel,
    classifier: Linear,
}

impl SequenceClassifier {
    fn load(vb: VarBuilder, config: &BertConfig) -> candle_core::Result<Self> {
        // Checkpoints nest the encoder under a model-family prefix, or not at all.
        let bert = if vb.contains_tensor("bert.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("bert"), config)?
        } else if vb.contains_tensor("roberta.embeddings.word_embeddings.weight") {
            BertModel::load(vb.pp("roberta"), config)?
        } else {
            BertModel::load(vb.clone(), config)?
        };

        let classifier = candle_nn::linear(config.hidden_size, 1, vb.pp("classifier"))?;

        Ok(Self { bert, classifier })
    }

    fn forward(
        &self,
        input_ids: &Tensor,
        token_type_ids: &Tensor,
        attention_mask: &Tensor,
    ) -> candle_core::Result<Tensor> {
        let hidden = self
            .bert
            .forward(input_ids, token_type_ids, Some(attention_mask))?;
        let cls = hidden.i((.., 0, ..))?;
        self.classifier.forward(&cls)
    }
}

/// Cross-encoder backed by a local BERT-family checkpoint.
pub struct BertCrossEncoder {
    name: String,
    device: Device,
    model: SequenceClassifier,
    tokenizer: Tokenizer,
}

impl BertCrossEncoder {
    /// Loads the checkpoint in `model_dir` on the best available device.
    pub fn load(
        name: impl Into<String>,
        model_dir: &Path,
        max_length: usize,
    ) -> Result<Self, ModelError> {
        let name = name.into();

        if !model_dir.is_dir() {
            return Err(ModelError::ModelNotFound {
                path: model_dir.to_path_buf(),
            });
        }
        for file in REQUIRED_FILES {
            let path = model_dir.join(file);
            if !path.exists() {
                return Err(ModelError::ModelNotFound { path });
            }
        }

        let device = select_device();
        info!(
            model = %name,
            path = %model_dir.display(),
            device = device_label(&device),
            max_length,
            "Loading cross-encoder"
        );

        let config_text = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig =
            serde_json::from_str(&config_text).map_err(|e| ModelError::LoadFailed {
                reason: format!("invalid config.json: {e}"),
            })?;

        let weights = model_dir.join("model.safetensors");
        // SAFETY: the weights file is treated as read-only for the model's lifetime.
        let vb = unsafe { VarBuilder::from_mmaped_safetensors(&[weights], DType::F32, &device) }
            .map_err(|e| ModelError::LoadFailed {
                reason: format!("failed to map weights: {e}"),
            })?;

        let model = SequenceClassifier::load(vb, &config).map_err(|e| ModelError::LoadFailed {
            reason: format!("failed to build classifier: {e}"),
        })?;
        let tokenizer = load_pair_tokenizer(model_dir, max_length)?;

        info!(model = %name, "Cross-encoder loaded");

        Ok(Self {
            name,
            device,
            model,
            tokenizer,
        })
    }

    pub fn device(&self) -> &Device {
        &self.device
    }

    fn stack(&self, encodings: &[Encoding], field: fn(&Encoding) -> &[u32]) -> Result<Tensor, ModelError> {
        let rows = encodings
            .iter()
            .map(|encoding| Tensor::new(field(encoding), &self.device))
            .collect::<candle_core::Result<Vec<_>>>()?;
        Ok(Tensor::stack(&rows, 0)?)
    }
}

impl CrossEncoder for BertCrossEncoder {
    fn score(&self, query: &str, documents: &[String]) -> Result<Vec<f32>, ModelError> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        let pairs: Vec<(&str, &str)> = documents.iter().map(|d| (query, d.as_str())).collect();
        let encodings =
            self.tokenizer
                .encode_batch(pairs, true)
                .map_err(|e| ModelError::TokenizationFailed {
                    reason: e.to_string(),
                })?;

        let input_ids = self.stack(&encodings, Encoding::get_ids)?;
        let type_ids = self.stack(&encodings, Encoding::get_type_ids)?;
        let attention_mask = self.stack(&encodings, Encoding::get_attention_mask)?;

        debug!(
            batch = encodings.len(),
            seq_len = input_ids.dim(1)?,
            "Running cross-encoder batch"
        );

        let logits = self
            .model
            .forward(&input_ids, &type_ids, &attention_mask)
            .map_err(|e| ModelError::InferenceFailed {
                reason: e.to_string(),
            })?;

        Ok(logits.flatten_all()?.to_vec1::<f32>()?)
    }

    fn name(&self) -> &str {
        "bert"
    }
}

impl std::fmt::Debug for BertCrossEncoder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BertCrossEncoder")
            .field("name", &self.name)
            .field("device", &device_label(&self.device))
            .finish()
    }
}

/// Loads a [`BertCrossEncoder`] from a local model directory.
#[derive(Debug, Clone)]
pub struct BertLoader {
    model_id: String,
    model_dir: PathBuf,
    max_length: usize,
}

impl BertLoader {
    pub fn new(model_id: impl Into<String>, model_dir: impl Into<PathBuf>, max_length: usize) -> Self {
        Self {
            model_id: model_id.into(),
            model_dir: model_dir.into(),
            max_length,
        }
    }

    pub fn model_dir(&self) -> &Path {
        &self.model_dir
    }
}

impl ModelLoader for BertLoader {
    fn load(&self) -> Result<Arc<dyn CrossEncoder>, ModelError> {
        let encoder = BertCrossEncoder::load(&self.model_id, &self.model_dir, self.max_length)?;
        Ok(Arc::new(encoder))
    }

    fn model_id(&self) -> &str {
        &self.model_id
    }
}
