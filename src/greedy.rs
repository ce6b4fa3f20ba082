//! Greedy (best-path) CTC decoding.
//!
//! For each time step the highest-scoring label is taken, then the CTC rules
//! are applied: consecutive repeats are merged and blanks removed. Works on
//! probabilities or log-probabilities alike (only the arg-max matters).

use ndarray::{ArrayView3, Axis};

use crate::{
    error::{DecodeError, DecodeResult},
    text::collapse,
};

/// Resolve a possibly negative blank index against the vocabulary axis.
///
/// Negative values count down from the end: `-1` is the last label.
pub fn resolve_blank_index(blank_index: i64, vocab_size: usize) -> DecodeResult<usize> {
    let resolved = if blank_index < 0 {
        vocab_size as i64 + blank_index
    } else {
        blank_index
    };
    if resolved < 0 || resolved >= vocab_size as i64 {
        return Err(DecodeError::BlankOutOfRange { index: blank_index, vocab_size });
    }
    Ok(resolved as usize)
}

/// Number of valid frames for a relative length in `(0, 1]`.
///
/// Rounds half to even and clamps to `[0, max_len]`.
pub fn relative_to_frames(relative_length: f32, max_len: usize) -> usize {
    let frames = (relative_length * max_len as f32).round_ties_even();
    if frames.is_nan() || frames <= 0.0 {
        0
    } else {
        (frames as usize).min(max_len)
    }
}

/// Apply the CTC merge and filter rules to one decoded sequence.
///
/// Merges adjacent repeats, then removes every `blank`.
///
/// ```
/// use ctckit::greedy::filter_ctc_output;
///
/// let out = filter_ctc_output(&["a", "a", "blank", "b", "b", "blank", "c"], &"blank");
/// assert_eq!(out, vec!["a", "b", "c"]);
/// ```
pub fn filter_ctc_output<T: PartialEq + Clone>(string_pred: &[T], blank: &T) -> Vec<T> {
    collapse(string_pred, blank, true)
}

/// Index of the largest value; ties resolve to the lowest index.
fn argmax<'a, I: IntoIterator<Item = &'a f32>>(row: I) -> usize {
    let mut best = 0;
    let mut best_val = f32::NEG_INFINITY;
    for (i, &v) in row.into_iter().enumerate() {
        if v > best_val {
            best_val = v;
            best = i;
        }
    }
    best
}

/// Greedy-decode a batch and apply the CTC rules.
///
/// * `probabilities` — `(batch, time, vocab)` scores.
/// * `relative_lengths` — one value in `(0, 1]` per utterance; the longest
///   utterance has `1.0`.
/// * `blank_index` — the blank label, negative values counting from the end.
///
/// Returns one label-index sequence per utterance, padding removed.
///
/// ```
/// use ndarray::array;
/// use ctckit::greedy::ctc_greedy_decode;
///
/// let probs = array![[[0.3, 0.7], [0.0, 0.0]], [[0.2, 0.8], [0.9, 0.1]]];
/// let out = ctc_greedy_decode(probs.view(), &[0.51, 1.0], 0).unwrap();
/// assert_eq!(out, vec![vec![1], vec![1]]);
/// ```
pub fn ctc_greedy_decode(
    probabilities: ArrayView3<'_, f32>,
    relative_lengths: &[f32],
    blank_index: i64,
) -> DecodeResult<Vec<Vec<usize>>> {
    let (batch, max_len, vocab_size) = probabilities.dim();
    if relative_lengths.len() != batch {
        return Err(DecodeError::ShapeMismatch {
            what: "relative_lengths",
            expected: batch,
            got: relative_lengths.len(),
        });
    }
    let blank = resolve_blank_index(blank_index, vocab_size)?;

    let outputs = probabilities
        .axis_iter(Axis(0))
        .zip(relative_lengths)
        .map(|(seq, &rel)| {
            let frames = relative_to_frames(rel, max_len);
            let best_path: Vec<usize> = seq
                .axis_iter(Axis(0))
                .take(frames)
                .map(|row| argmax(row.iter()))
                .collect();
            filter_ctc_output(&best_path, &blank)
        })
        .collect();
    Ok(outputs)
}
