//! Decoding configuration.
//!
//! Loaded from a small JSON file, e.g.
//!
//! ```json
//! { "blank_index": 0, "eos_index": 2, "beam_size": 4 }
//! ```
//!
//! or derived from a [`CtcTextEncoder`] so the special indices match the
//! registered vocabulary.

use std::path::Path;

use anyhow::{Context, Result};
use serde::Deserialize;

use crate::{
    error::{DecodeResult, EncoderResult},
    greedy::resolve_blank_index,
    text::CtcTextEncoder,
};

// ─────────────────────────────────────────────────────────────────────────────
// JSON schema
// ─────────────────────────────────────────────────────────────────────────────

/// Parameters shared by the greedy decoder and the prefix scorer.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct DecodingConfig {
    /// Blank label; negative values count from the end of the vocabulary axis.
    #[serde(default = "default_blank_index")]
    pub blank_index: i64,

    /// End-of-sentence label for the prefix scorer.
    #[serde(default)]
    pub eos_index: Option<usize>,

    /// Hypotheses kept per utterance.
    #[serde(default = "default_beam_size")]
    pub beam_size: usize,

    /// Merge consecutive repeats before removing blanks.
    #[serde(default = "default_merge_repeats")]
    pub merge_repeats: bool,
}

fn default_blank_index() -> i64 {
    -1
}

fn default_beam_size() -> usize {
    1
}

fn default_merge_repeats() -> bool {
    true
}

impl Default for DecodingConfig {
    fn default() -> Self {
        Self {
            blank_index: default_blank_index(),
            eos_index: None,
            beam_size: default_beam_size(),
            merge_repeats: default_merge_repeats(),
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Construction
// ─────────────────────────────────────────────────────────────────────────────

impl DecodingConfig {
    /// Read a config from a JSON file. Missing fields take their defaults.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let bytes = std::fs::read(path)
            .with_context(|| format!("Cannot read decoding config: {}", path.display()))?;
        let config: Self = serde_json::from_slice(&bytes)
            .with_context(|| format!("Failed to parse decoding config {}", path.display()))?;
        log::debug!("Loaded decoding config from {}: {:?}", path.display(), config);
        Ok(config)
    }

    /// Take the blank (required) and EOS (if registered) from an encoder.
    pub fn from_encoder(encoder: &CtcTextEncoder) -> EncoderResult<Self> {
        Ok(Self {
            blank_index: encoder.blank_index()? as i64,
            eos_index: encoder.eos_index().ok(),
            ..Self::default()
        })
    }

    /// Blank index resolved against a vocabulary of `vocab_size` labels.
    pub fn resolve_blank(&self, vocab_size: usize) -> DecodeResult<usize> {
        resolve_blank_index(self.blank_index, vocab_size)
    }
}
