//! Error types for the vocabulary and the CTC decoders.

use std::{fmt, io, path::PathBuf};

use thiserror::Error;

use crate::label::Label;

/// A reserved vocabulary slot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SpecialLabel {
    Unk,
    Bos,
    Eos,
    Blank,
}

impl fmt::Display for SpecialLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            SpecialLabel::Unk => "unk",
            SpecialLabel::Bos => "BOS",
            SpecialLabel::Eos => "EOS",
            SpecialLabel::Blank => "blank",
        })
    }
}

/// Failure while parsing a literal from a saved vocabulary.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum LiteralError {
    #[error("unexpected end of input at byte {0}")]
    UnexpectedEnd(usize),

    #[error("unexpected character {ch:?} at byte {pos}")]
    UnexpectedChar { ch: char, pos: usize },

    #[error("invalid escape sequence at byte {0}")]
    BadEscape(usize),

    #[error("integer literal {0:?} out of range")]
    IntOverflow(String),

    #[error("unsupported literal {0:?} (only strings, integers, None, True, False and tuples)")]
    Unsupported(String),

    #[error("trailing input {0:?}")]
    Trailing(String),
}

/// Failure inside a label encoder.
#[derive(Debug, Error)]
pub enum EncoderError {
    #[error("label {0} already present in encoder")]
    DuplicateLabel(Label),

    #[error("cannot encode unknown label {0}: no unk-label has been added (call add_unk())")]
    NoUnkLabel(Label),

    #[error("unknown label {0}, and the use of the existing unk-label was explicitly disallowed")]
    UnkDisallowed(Label),

    #[error("{0} label has not been added to the label set")]
    MissingSpecialLabel(SpecialLabel),

    #[error("BOS and EOS must be given together")]
    IncompleteBosEos,

    #[error("index {0} has no label")]
    UnknownIndex(i64),

    #[error("nested input mixes sequence depths")]
    MixedDepth,

    #[error("I/O error on {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("malformed encoder file {path} (line {line}): {message}")]
    Malformed {
        path: PathBuf,
        line: usize,
        message: String,
    },
}

impl EncoderError {
    /// True when the error means "the file is not there yet".
    pub fn is_not_found(&self) -> bool {
        matches!(self, EncoderError::Io { source, .. } if source.kind() == io::ErrorKind::NotFound)
    }

    /// True when the file existed but could not be parsed.
    pub fn is_malformed(&self) -> bool {
        matches!(self, EncoderError::Malformed { .. })
    }
}

/// Failure inside the greedy decoder or the prefix scorer.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("blank index {index} out of range for vocabulary of size {vocab_size}")]
    BlankOutOfRange { index: i64, vocab_size: usize },

    #[error("{what}: expected {expected}, got {got}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        got: usize,
    },

    #[error("{what} index {index} out of range (limit {limit})")]
    IndexOutOfRange {
        what: &'static str,
        index: usize,
        limit: usize,
    },

    #[error("utterance {utterance} has invalid length {length} (time axis {time})")]
    InvalidLength {
        utterance: usize,
        length: usize,
        time: usize,
    },

    #[error("prefixes in one step must share a length ({expected} vs {got})")]
    RaggedPrefix { expected: usize, got: usize },
}

pub type EncoderResult<T> = std::result::Result<T, EncoderError>;
pub type DecodeResult<T> = std::result::Result<T, DecodeError>;
