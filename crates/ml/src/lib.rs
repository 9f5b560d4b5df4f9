mod model;
mod tokenizer;

#[cfg(feature = "burn-ml")]
mod burn_impl;

use std::env;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use campus_core::SensitivityLabel;
use thiserror::Error;
use tracing::debug;

pub use model::{argmax, SequenceClassifierWeights};
pub use tokenizer::WordPieceTokenizer;

pub const DEFAULT_MODEL_DIR: &str = "models/intent-classifier";
const TOKENIZER_FILE: &str = "tokenizer.json";
const MODEL_FILE: &str = "model.json";

#[derive(Debug, Error)]
pub enum ClassifierError {
    #[error("failed to load classifier from {}: {reason}", path.display())]
    ModelLoad { path: PathBuf, reason: String },
    #[error("classifier inference failed: {0}")]
    Inference(String),
}

impl ClassifierError {
    pub(crate) fn model_load(path: &Path, reason: impl Into<String>) -> Self {
        Self::ModelLoad {
            path: path.to_path_buf(),
            reason: reason.into(),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Prediction {
    pub label: SensitivityLabel,
    pub class_id: usize,
    pub logits: Vec<f32>,
}

pub trait SensitivityClassifier: Send + Sync {
    fn model_name(&self) -> &str;
    fn classify(&self, text: &str) -> Result<Prediction, ClassifierError>;
}

/// Tokenizer plus sequence-classification weights read from a model directory
/// (`tokenizer.json` and `model.json`).
#[derive(Debug, Clone)]
pub struct PretrainedSequenceClassifier {
    tokenizer: WordPieceTokenizer,
    weights: SequenceClassifierWeights,
    #[cfg(feature = "burn-ml")]
    burn_head: burn_impl::BurnClassifierHead,
}

impl PretrainedSequenceClassifier {
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let model_dir = model_dir.as_ref();
        let tokenizer = WordPieceTokenizer::from_file(model_dir.join(TOKENIZER_FILE))?;
        let weights = SequenceClassifierWeights::from_file(model_dir.join(MODEL_FILE))?;

        if tokenizer.id_space() > weights.vocab_rows {
            return Err(ClassifierError::model_load(
                model_dir,
                format!(
                    "tokenizer ids reach {} but the embedding table has {} rows",
                    tokenizer.id_space(),
                    weights.vocab_rows
                ),
            ));
        }

        Ok(Self {
            #[cfg(feature = "burn-ml")]
            burn_head: burn_impl::BurnClassifierHead::new(&weights),
            tokenizer,
            weights,
        })
    }

    #[cfg(feature = "burn-ml")]
    fn logits(&self, ids: &[u32]) -> Result<Vec<f32>, ClassifierError> {
        self.burn_head.forward(ids)
    }

    #[cfg(not(feature = "burn-ml"))]
    fn logits(&self, ids: &[u32]) -> Result<Vec<f32>, ClassifierError> {
        Ok(self.weights.forward(ids))
    }
}

impl SensitivityClassifier for PretrainedSequenceClassifier {
    fn model_name(&self) -> &str {
        &self.weights.model_name
    }

    fn classify(&self, text: &str) -> Result<Prediction, ClassifierError> {
        let ids = self.tokenizer.encode(text);
        let logits = self.logits(&ids)?;
        if logits.len() != 2 {
            return Err(ClassifierError::Inference(format!(
                "expected 2 logits, got {}",
                logits.len()
            )));
        }

        let class_id = argmax(&logits)
            .ok_or_else(|| ClassifierError::Inference("logits are not comparable".to_string()))?;
        let label = SensitivityLabel::from_class_id(class_id)
            .map_err(|err| ClassifierError::Inference(err.to_string()))?;

        debug!(
            tokens = ids.len(),
            label = label.as_label(),
            "input classified"
        );

        Ok(Prediction {
            label,
            class_id,
            logits,
        })
    }
}

#[derive(Clone)]
pub struct ClassifierStack {
    pub classifier: Arc<dyn SensitivityClassifier>,
    pub burn_enabled: bool,
}

impl ClassifierStack {
    pub fn load(model_dir: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let classifier = PretrainedSequenceClassifier::load(model_dir)?;
        Ok(Self {
            classifier: Arc::new(classifier),
            burn_enabled: cfg!(feature = "burn-ml"),
        })
    }

    /// Loads from `CAMPUS_MODEL_DIR`, or [`DEFAULT_MODEL_DIR`] when unset.
    pub fn load_default() -> Result<Self, ClassifierError> {
        let model_dir =
            env::var("CAMPUS_MODEL_DIR").unwrap_or_else(|_| DEFAULT_MODEL_DIR.to_string());
        Self::load(model_dir)
    }

    pub fn from_classifier(classifier: Arc<dyn SensitivityClassifier>) -> Self {
        Self {
            classifier,
            burn_enabled: false,
        }
    }
}
