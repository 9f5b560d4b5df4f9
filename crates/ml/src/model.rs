use std::fs;
use std::path::Path;

use serde::Deserialize;

use crate::ClassifierError;

#[derive(Debug, Deserialize)]
struct ModelFile {
    model_name: Option<String>,
    labels: Vec<String>,
    hidden_size: usize,
    embeddings: Vec<Vec<f32>>,
    classifier: HeadFile,
}

#[derive(Debug, Deserialize)]
struct HeadFile {
    weight: Vec<Vec<f32>>,
    bias: Vec<f32>,
}

/// Token embedding table plus a linear classification head, stored row-major.
#[derive(Debug, Clone)]
pub struct SequenceClassifierWeights {
    pub model_name: String,
    pub labels: Vec<String>,
    pub hidden_size: usize,
    pub vocab_rows: usize,
    pub embeddings: Vec<f32>,
    pub weight: Vec<f32>,
    pub bias: Vec<f32>,
}

impl SequenceClassifierWeights {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| ClassifierError::model_load(path, err.to_string()))?;
        let file: ModelFile = serde_json::from_str(&raw)
            .map_err(|err| ClassifierError::model_load(path, err.to_string()))?;
        Self::from_model_file(file).map_err(|reason| ClassifierError::model_load(path, reason))
    }

    fn from_model_file(file: ModelFile) -> Result<Self, String> {
        let hidden = file.hidden_size;
        let num_labels = file.labels.len();

        if hidden == 0 {
            return Err("hidden_size must be positive".to_string());
        }
        if num_labels != 2 {
            return Err(format!("expected a binary classifier, found {num_labels} labels"));
        }
        if file.embeddings.is_empty() {
            return Err("embedding table is empty".to_string());
        }
        if let Some(row) = file.embeddings.iter().position(|row| row.len() != hidden) {
            return Err(format!("embedding row {row} does not have {hidden} values"));
        }
        if file.classifier.weight.len() != num_labels
            || file.classifier.weight.iter().any(|row| row.len() != hidden)
        {
            return Err(format!("classifier weight must be {num_labels}x{hidden}"));
        }
        if file.classifier.bias.len() != num_labels {
            return Err(format!("classifier bias must have {num_labels} values"));
        }

        Ok(Self {
            model_name: file
                .model_name
                .unwrap_or_else(|| "sequence-classifier".to_string()),
            labels: file.labels,
            hidden_size: hidden,
            vocab_rows: file.embeddings.len(),
            embeddings: file.embeddings.into_iter().flatten().collect(),
            weight: file.classifier.weight.into_iter().flatten().collect(),
            bias: file.classifier.bias,
        })
    }

    pub fn num_labels(&self) -> usize {
        self.labels.len()
    }

    /// Mean-pools the embeddings of `ids` and applies the classification head.
    /// Callers guarantee every id is below `vocab_rows`.
    pub fn forward(&self, ids: &[u32]) -> Vec<f32> {
        let hidden = self.hidden_size;
        let mut pooled = vec![0.0_f32; hidden];

        for id in ids {
            let row = &self.embeddings[*id as usize * hidden..(*id as usize + 1) * hidden];
            for (acc, value) in pooled.iter_mut().zip(row) {
                *acc += value;
            }
        }
        if !ids.is_empty() {
            for value in &mut pooled {
                *value /= ids.len() as f32;
            }
        }

        self.bias
            .iter()
            .enumerate()
            .map(|(label, bias)| {
                let row = &self.weight[label * hidden..(label + 1) * hidden];
                row.iter().zip(&pooled).map(|(w, h)| w * h).sum::<f32>() + bias
            })
            .collect()
    }
}

/// Index of the largest value; ties resolve to the lowest index.
pub fn argmax(values: &[f32]) -> Option<usize> {
    if values.iter().any(|value| value.is_nan()) {
        return None;
    }

    let mut best: Option<usize> = None;
    for (idx, value) in values.iter().enumerate() {
        if best.map_or(true, |current| *value > values[current]) {
            best = Some(idx);
        }
    }
    best
}
