//! # ctckit
//!
//! Connectionist Temporal Classification (CTC) decoding and label-sequence
//! encoding for speech recognition.
//!
//! ## Quick start
//!
//! ```
//! use ndarray::array;
//! use ctckit::{ctc_greedy_decode, CtcTextEncoder, SpecialLabels};
//!
//! // Vocabulary: blank at index 0, then characters.
//! let mut encoder = CtcTextEncoder::with_special_labels(0, SpecialLabels::new().blank("<b>")).unwrap();
//! encoder.update_from_iterable("hi".chars());
//!
//! // (batch, time, vocab) posteriors: h h <b> i
//! let probs = array![[
//!     [0.1f32, 0.8, 0.1],
//!     [0.1, 0.8, 0.1],
//!     [0.8, 0.1, 0.1],
//!     [0.1, 0.1, 0.8],
//! ]];
//! let decoded = ctc_greedy_decode(probs.view(), &[1.0], 0).unwrap();
//! let text: String = encoder
//!     .decode_sequence(&decoded[0])
//!     .unwrap()
//!     .iter()
//!     .filter_map(|l| l.as_str())
//!     .collect();
//! assert_eq!(text, "hi");
//! ```
//!
//! ## Beam search scoring
//!
//! [`CtcPrefixScorer`] does not run a search itself. A beam search (usually
//! joint with an attention decoder) calls
//! [`forward_step`](CtcPrefixScorer::forward_step) once per output step to get
//! CTC prefix scores for every candidate, then
//! [`permute_mem`](CtcPrefixScorer::permute_mem) to follow the survivors.
//!
//! ## Modules
//! 1. **Labels** — [`Label`] values, the restricted literal parser used by
//!    saved vocabularies, and [`Nested`] inputs of arbitrary depth.
//! 2. **Encoders** — [`CategoricalEncoder`], [`TextEncoder`] (BOS/EOS) and
//!    [`CtcTextEncoder`] (blank, CTC collapsing), with a line-oriented save
//!    format.
//! 3. **Decoding** — greedy best-path decoding and the prefix scorer.
//! 4. **Configuration** — [`DecodingConfig`] from JSON or from an encoder.

pub mod config;
pub mod encoder;
pub mod error;
pub mod greedy;
pub mod label;
pub mod literal;
pub mod logmath;
pub mod nested;
pub mod prefix;
pub mod text;

// ─── Re-exports for convenience ─────────────────────────────────────────────

pub use config::DecodingConfig;
pub use encoder::{CategoricalEncoder, SpecialLabels};
pub use error::{DecodeError, EncoderError, LiteralError, SpecialLabel};
pub use greedy::{ctc_greedy_decode, filter_ctc_output};
pub use label::Label;
pub use nested::Nested;
pub use prefix::{CtcMemory, CtcPrefixScorer, CtcState};
pub use text::{CtcTextEncoder, TextEncoder};
