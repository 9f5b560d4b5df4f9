use std::collections::HashMap;
use std::fs;
use std::path::Path;

use serde::Deserialize;
use unicode_segmentation::UnicodeSegmentation;

use crate::ClassifierError;

const MAX_WORD_CHARS: usize = 100;

#[derive(Debug, Deserialize)]
pub(crate) struct TokenizerConfig {
    #[serde(default = "default_lowercase")]
    pub do_lower_case: bool,
    pub max_length: usize,
    pub unk_token: String,
    pub cls_token: String,
    pub sep_token: String,
    pub vocab: HashMap<String, u32>,
}

fn default_lowercase() -> bool {
    true
}

/// Greedy longest-match-first WordPiece tokenizer.
#[derive(Debug, Clone)]
pub struct WordPieceTokenizer {
    vocab: HashMap<String, u32>,
    unk_id: u32,
    cls_id: u32,
    sep_id: u32,
    max_length: usize,
    lowercase: bool,
}

impl WordPieceTokenizer {
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self, ClassifierError> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .map_err(|err| ClassifierError::model_load(path, err.to_string()))?;
        let config: TokenizerConfig = serde_json::from_str(&raw)
            .map_err(|err| ClassifierError::model_load(path, err.to_string()))?;
        Self::from_config(config).map_err(|reason| ClassifierError::model_load(path, reason))
    }

    pub(crate) fn from_config(config: TokenizerConfig) -> Result<Self, String> {
        if config.max_length < 2 {
            return Err(format!("max_length {} leaves no room for text", config.max_length));
        }

        let lookup = |token: &str| {
            config
                .vocab
                .get(token)
                .copied()
                .ok_or_else(|| format!("special token {token} missing from vocab"))
        };
        let unk_id = lookup(&config.unk_token)?;
        let cls_id = lookup(&config.cls_token)?;
        let sep_id = lookup(&config.sep_token)?;

        Ok(Self {
            vocab: config.vocab,
            unk_id,
            cls_id,
            sep_id,
            max_length: config.max_length,
            lowercase: config.do_lower_case,
        })
    }

    /// Highest token id plus one.
    pub fn id_space(&self) -> usize {
        self.vocab
            .values()
            .max()
            .map(|max| *max as usize + 1)
            .unwrap_or(0)
    }

    /// `[CLS] pieces… [SEP]`, truncated to `max_length` ids.
    pub fn encode(&self, text: &str) -> Vec<u32> {
        let text = if self.lowercase {
            text.to_lowercase()
        } else {
            text.to_string()
        };

        let mut ids = vec![self.cls_id];
        for word in text.unicode_words() {
            ids.extend(self.word_pieces(word));
        }

        ids.truncate(self.max_length - 1);
        ids.push(self.sep_id);
        ids
    }

    fn word_pieces(&self, word: &str) -> Vec<u32> {
        let chars = word.chars().collect::<Vec<_>>();
        if chars.len() > MAX_WORD_CHARS {
            return vec![self.unk_id];
        }

        let mut pieces = Vec::new();
        let mut start = 0;
        while start < chars.len() {
            let mut end = chars.len();
            let mut matched = None;

            while start < end {
                let piece = chars[start..end].iter().collect::<String>();
                let key = if start > 0 {
                    format!("##{piece}")
                } else {
                    piece
                };
                if let Some(id) = self.vocab.get(&key) {
                    matched = Some(*id);
                    break;
                }
                end -= 1;
            }

            match matched {
                Some(id) => pieces.push(id),
                None => return vec![self.unk_id],
            }
            start = end;
        }

        pieces
    }
}
