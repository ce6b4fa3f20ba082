//! CTC prefix scoring for beam search.
//!
//! [`CtcPrefixScorer`] is the scoring oracle an external beam search calls at
//! every expansion step. For every live hypothesis `g` and candidate label `c`
//! it returns the increase in CTC prefix log-probability of `h = g + c`
//! (summed over every alignment whose collapsed output starts with `h`).
//!
//! ## Call protocol
//! 1. [`CtcPrefixScorer::new`] with the `(batch, time, vocab)` log-probabilities.
//! 2. [`forward_step`](CtcPrefixScorer::forward_step) with the current prefixes
//!    and `None` state on the first step.
//! 3. The beam search picks the top `beam` continuations per utterance and calls
//!    [`permute_mem`](CtcPrefixScorer::permute_mem) with them; the returned
//!    [`CtcState`] goes into the next `forward_step`.
//!
//! ## Layout
//! Hypotheses are flattened as `n = utterance * beam + slot`. The DP table
//! `r[t, k, n, c]` holds the log forward probability of `g + c` at frame `t`,
//! ending in a non-blank (`k = 0`) or blank (`k = 1`).

use ndarray::{Array2, Array3, Array4, ArrayView2, ArrayView3};

use crate::{
    error::{DecodeError, DecodeResult},
    greedy::relative_to_frames,
    logmath::{log_add, log_sum_exp},
};

const NEG_INF: f32 = f32::NEG_INFINITY;

/// Output of [`CtcPrefixScorer::forward_step`], consumed by
/// [`CtcPrefixScorer::permute_mem`].
#[derive(Debug, Clone, PartialEq)]
pub struct CtcMemory {
    /// Forward probabilities per candidate: `(time, 2, batch·beam, candidates)`.
    pub r: Array4<f32>,
    /// Cumulative prefix log-probability: `(batch·beam, vocab)`.
    pub psi: Array2<f32>,
    /// Vocabulary label → candidate column, `-1` if not a candidate.
    /// Present only when scoring was restricted to candidates.
    pub scoring_table: Option<Array2<i64>>,
}

impl CtcMemory {
    pub fn num_candidates(&self) -> usize {
        self.r.dim().3
    }
}

/// DP state aligned with the surviving beam, passed into the next step.
#[derive(Debug, Clone, PartialEq)]
pub struct CtcState {
    /// Forward probabilities of each hypothesis: `(time, 2, batch·beam)`.
    pub r: Array3<f32>,
    /// Prefix log-probability of each hypothesis, repeated over the vocabulary:
    /// `(batch·beam, vocab)`.
    pub psi: Array2<f32>,
}

/// CTC prefix scorer over one batch of utterances.
#[derive(Debug, Clone)]
pub struct CtcPrefixScorer {
    blank_index: usize,
    eos_index: usize,
    batch_size: usize,
    beam_size: usize,
    vocab_size: usize,
    max_enc_len: usize,
    last_frame_index: Vec<usize>,
    /// Masked log-probabilities, `(time, batch, vocab)`.
    x: Array3<f32>,
}

impl CtcPrefixScorer {
    /// Build a scorer from `(batch, time, vocab)` log-probabilities and the
    /// number of valid frames of each utterance.
    ///
    /// Frames past an utterance's length get −∞ for every label except the
    /// blank, which gets 0 so padding neither adds nor removes mass.
    pub fn new(
        x: ArrayView3<'_, f32>,
        enc_lens: &[usize],
        batch_size: usize,
        beam_size: usize,
        blank_index: usize,
        eos_index: usize,
    ) -> DecodeResult<Self> {
        let (batch, max_enc_len, vocab_size) = x.dim();
        if batch != batch_size {
            return Err(DecodeError::ShapeMismatch { what: "emission batch", expected: batch_size, got: batch });
        }
        if enc_lens.len() != batch_size {
            return Err(DecodeError::ShapeMismatch {
                what: "enc_lens",
                expected: batch_size,
                got: enc_lens.len(),
            });
        }
        if beam_size == 0 {
            return Err(DecodeError::ShapeMismatch { what: "beam_size", expected: 1, got: 0 });
        }
        for (what, index) in [("blank", blank_index), ("eos", eos_index)] {
            if index >= vocab_size {
                return Err(DecodeError::IndexOutOfRange { what, index, limit: vocab_size });
            }
        }
        for (utterance, &length) in enc_lens.iter().enumerate() {
            if length == 0 || length > max_enc_len {
                return Err(DecodeError::InvalidLength { utterance, length, time: max_enc_len });
            }
        }

        let masked = Array3::from_shape_fn((max_enc_len, batch_size, vocab_size), |(t, b, v)| {
            if t < enc_lens[b] {
                x[[b, t, v]]
            } else if v == blank_index {
                0.0
            } else {
                NEG_INF
            }
        });

        Ok(Self {
            blank_index,
            eos_index,
            batch_size,
            beam_size,
            vocab_size,
            max_enc_len,
            last_frame_index: enc_lens.iter().map(|&l| l - 1).collect(),
            x: masked,
        })
    }

    /// Like [`new`](Self::new), with lengths given as fractions of the time axis.
    pub fn from_relative_lengths(
        x: ArrayView3<'_, f32>,
        relative_lengths: &[f32],
        batch_size: usize,
        beam_size: usize,
        blank_index: usize,
        eos_index: usize,
    ) -> DecodeResult<Self> {
        let max_len = x.dim().1;
        let lens: Vec<usize> = relative_lengths
            .iter()
            .map(|&r| relative_to_frames(r, max_len))
            .collect();
        Self::new(x, &lens, batch_size, beam_size, blank_index, eos_index)
    }

    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    pub fn beam_size(&self) -> usize {
        self.beam_size
    }

    pub fn vocab_size(&self) -> usize {
        self.vocab_size
    }

    pub fn max_enc_len(&self) -> usize {
        self.max_enc_len
    }

    pub fn blank_index(&self) -> usize {
        self.blank_index
    }

    pub fn eos_index(&self) -> usize {
        self.eos_index
    }

    fn n_hyps(&self) -> usize {
        self.batch_size * self.beam_size
    }

    /// Blank-only forward probabilities of the empty prefix.
    fn initial_r(&self) -> Array3<f32> {
        let n_hyps = self.n_hyps();
        let mut r = Array3::from_elem((self.max_enc_len, 2, n_hyps), NEG_INF);
        for n in 0..n_hyps {
            let b = n / self.beam_size;
            let mut acc = 0.0f32;
            for t in 0..self.max_enc_len {
                acc += self.x[[t, b, self.blank_index]];
                r[[t, 1, n]] = acc;
            }
        }
        r
    }

    fn check_state(&self, state: &CtcState) -> DecodeResult<()> {
        let (t, two, n) = state.r.dim();
        let n_hyps = self.n_hyps();
        if t != self.max_enc_len || two != 2 {
            return Err(DecodeError::ShapeMismatch { what: "state time axis", expected: self.max_enc_len, got: t });
        }
        if n != n_hyps {
            return Err(DecodeError::ShapeMismatch { what: "state hypotheses", expected: n_hyps, got: n });
        }
        if state.psi.dim() != (n_hyps, self.vocab_size) {
            return Err(DecodeError::ShapeMismatch {
                what: "state psi",
                expected: n_hyps * self.vocab_size,
                got: state.psi.len(),
            });
        }
        Ok(())
    }

    /// Score every hypothesis extended by every candidate label.
    ///
    /// * `prefix` — one label sequence per hypothesis (`batch·beam` of them),
    ///   all of the same length.
    /// * `state` — `None` on the first step, afterwards the output of
    ///   [`permute_mem`](Self::permute_mem).
    /// * `candidates` — optional `(batch·beam, C)` label subset to score instead
    ///   of the full vocabulary.
    ///
    /// Returns `(batch·beam, vocab)` score deltas (this step's prefix score
    /// minus the previous one) and the memory for `permute_mem`. The blank is
    /// always −∞; the EOS column holds the probability that the hypothesis ends
    /// at the utterance's last valid frame. Labels outside `candidates` are −∞.
    pub fn forward_step<S: AsRef<[usize]>>(
        &self,
        prefix: &[S],
        state: Option<&CtcState>,
        candidates: Option<ArrayView2<'_, usize>>,
    ) -> DecodeResult<(Array2<f32>, CtcMemory)> {
        let n_hyps = self.n_hyps();
        let (beam, vocab, t_max) = (self.beam_size, self.vocab_size, self.max_enc_len);

        // ── Validate ─────────────────────────────────────────────────────────
        if prefix.len() != n_hyps {
            return Err(DecodeError::ShapeMismatch { what: "prefix hypotheses", expected: n_hyps, got: prefix.len() });
        }
        let prefix_len = prefix.first().map(|g| g.as_ref().len()).unwrap_or(0);
        if let Some(g) = prefix.iter().find(|g| g.as_ref().len() != prefix_len) {
            return Err(DecodeError::RaggedPrefix { expected: prefix_len, got: g.as_ref().len() });
        }
        if let Some(state) = state {
            self.check_state(state)?;
        }
        if let Some(cand) = &candidates {
            if cand.nrows() != n_hyps {
                return Err(DecodeError::ShapeMismatch { what: "candidate rows", expected: n_hyps, got: cand.nrows() });
            }
            if let Some(&bad) = cand.iter().find(|&&c| c >= vocab) {
                return Err(DecodeError::IndexOutOfRange { what: "candidate", index: bad, limit: vocab });
            }
        }
        let num_candidates = candidates.as_ref().map_or(vocab, |c| c.ncols());
        let label = |n: usize, c: usize| candidates.as_ref().map_or(c, |cand| cand[[n, c]]);
        let last_char: Vec<Option<usize>> = prefix.iter().map(|g| g.as_ref().last().copied()).collect();

        // ── Previous state ───────────────────────────────────────────────────
        let initial;
        let (r_prev, psi_prev) = match state {
            Some(s) => (&s.r, Some(&s.psi)),
            None => {
                initial = self.initial_r();
                (&initial, None)
            }
        };

        // Scoring table for partial search.
        let scoring_table = candidates.as_ref().map(|cand| {
            let mut table = Array2::from_elem((n_hyps, vocab), -1i64);
            for ((n, c), &v) in cand.indexed_iter() {
                table[[n, v]] = c as i64;
            }
            table
        });

        // ── phi: mass of the unextended prefix ───────────────────────────────
        // r_sum = r^nb(g) + r^b(g); a repeat of g's last label needs a blank in
        // between, so only r^b(g) counts for it.
        let r_sum = Array2::from_shape_fn((t_max, n_hyps), |(t, n)| log_add(r_prev[[t, 0, n]], r_prev[[t, 1, n]]));
        let phi = Array3::from_shape_fn((t_max, n_hyps, num_candidates), |(t, n, c)| {
            if last_char[n] == Some(label(n, c)) {
                r_prev[[t, 1, n]]
            } else {
                r_sum[[t, n]]
            }
        });

        // Emission lookups for h = g + c.
        let x_nb = |t: usize, n: usize, c: usize| self.x[[t, n / beam, label(n, c)]];
        let x_b = |t: usize, n: usize| self.x[[t, n / beam, self.blank_index]];

        // ── Forward recursion ────────────────────────────────────────────────
        let mut r = Array4::from_elem((t_max, 2, n_hyps, num_candidates), NEG_INF);
        if prefix_len == 0 {
            for n in 0..n_hyps {
                for c in 0..num_candidates {
                    r[[0, 0, n, c]] = x_nb(0, n, c);
                }
            }
        }
        let start = prefix_len.max(1);
        for t in start..t_max {
            for n in 0..n_hyps {
                for c in 0..num_candidates {
                    let nb = log_add(r[[t - 1, 0, n, c]], phi[[t - 1, n, c]]) + x_nb(t, n, c);
                    let b = log_add(r[[t - 1, 0, n, c]], r[[t - 1, 1, n, c]]) + x_b(t, n);
                    r[[t, 0, n, c]] = nb;
                    r[[t, 1, n, c]] = b;
                }
            }
        }

        // ── Prefix probability: psi = r^nb_{start-1}(h) + Σ_t phi_{t-1}·p_t(c) ─
        let psi_cand = Array2::from_shape_fn((n_hyps, num_candidates), |(n, c)| {
            let init = if start - 1 < t_max { r[[start - 1, 0, n, c]] } else { NEG_INF };
            log_sum_exp((start..t_max).map(|t| phi[[t - 1, n, c]] + x_nb(t, n, c)).chain(Some(init)))
        });

        let mut psi = match &candidates {
            None => psi_cand,
            Some(cand) => {
                let mut full = Array2::from_elem((n_hyps, vocab), NEG_INF);
                for ((n, c), &v) in cand.indexed_iter() {
                    full[[n, v]] = psi_cand[[n, c]];
                }
                full
            }
        };

        // EOS: the hypothesis is complete at the last valid frame.
        for n in 0..n_hyps {
            let last = self.last_frame_index[n / beam];
            psi[[n, self.eos_index]] = r_sum[[last, n]];
        }
        // The blank is never an output token.
        psi.column_mut(self.blank_index).fill(NEG_INF);

        let scores = match psi_prev {
            None => psi.clone(),
            Some(prev) => Array2::from_shape_fn((n_hyps, vocab), |(n, v)| {
                let cur = psi[[n, v]];
                if cur == NEG_INF {
                    NEG_INF
                } else {
                    cur - prev[[n, v]]
                }
            }),
        };

        Ok((scores, CtcMemory { r, psi, scoring_table }))
    }

    /// Reorder the DP memory to follow the beam search's selection.
    ///
    /// `index` is `(batch, beam)`: for each utterance and each new beam slot,
    /// the flat position `old_slot · vocab + label` of the chosen continuation
    /// within that utterance's `(beam, vocab)` score block.
    pub fn permute_mem(&self, memory: &CtcMemory, index: ArrayView2<'_, usize>) -> DecodeResult<CtcState> {
        let n_hyps = self.n_hyps();
        let (beam, vocab, t_max) = (self.beam_size, self.vocab_size, self.max_enc_len);

        if index.dim() != (self.batch_size, beam) {
            return Err(DecodeError::ShapeMismatch {
                what: "beam reorder index",
                expected: n_hyps,
                got: index.len(),
            });
        }
        if memory.psi.dim() != (n_hyps, vocab) || memory.r.dim().2 != n_hyps || memory.r.dim().0 != t_max {
            return Err(DecodeError::ShapeMismatch {
                what: "memory hypotheses",
                expected: n_hyps,
                got: memory.psi.nrows(),
            });
        }
        if let Some(&bad) = index.iter().find(|&&i| i >= beam * vocab) {
            return Err(DecodeError::IndexOutOfRange { what: "beam reorder", index: bad, limit: beam * vocab });
        }

        let mut r = Array3::from_elem((t_max, 2, n_hyps), NEG_INF);
        let mut psi = Array2::from_elem((n_hyps, vocab), NEG_INF);

        for ((b, k), &flat) in index.indexed_iter() {
            let dst = b * beam + k;
            let src = b * beam + flat / vocab;
            let selected = flat % vocab;

            psi.row_mut(dst).fill(memory.psi[[src, selected]]);

            let column = match &memory.scoring_table {
                // A label outside the candidates falls back to column 0.
                Some(table) => usize::try_from(table[[src, selected]]).unwrap_or(0),
                None => selected,
            };
            for t in 0..t_max {
                r[[t, 0, dst]] = memory.r[[t, 0, src, column]];
                r[[t, 1, dst]] = memory.r[[t, 1, src, column]];
            }
        }

        Ok(CtcState { r, psi })
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use ndarray::{array, s, Array1, ArrayView2};

    const BLANK: usize = 0;
    const A: usize = 1;
    const B: usize = 2;
    const EOS: usize = 3;

    /// Probabilities over `[blank, a, b, eos]` for 3 frames.
    fn tiny_probs() -> Array3<f32> {
        array![[
            [0.5f32, 0.3, 0.1, 0.1],
            [0.4, 0.2, 0.3, 0.1],
            [0.6, 0.1, 0.2, 0.1],
        ]]
    }

    fn log_softmax_rows(logits: &Array3<f32>) -> Array3<f32> {
        let mut out = logits.clone();
        for mut row in out.rows_mut() {
            let lse = log_sum_exp(row.iter().copied());
            row.mapv_inplace(|v| v - lse);
        }
        out
    }

    /// Deterministic, non-degenerate log-probabilities.
    fn synthetic_log_probs(batch: usize, time: usize, vocab: usize) -> Array3<f32> {
        let logits = Array3::from_shape_fn((batch, time, vocab), |(b, t, v)| {
            ((b * 7 + t * 3 + v * 5) % 11) as f32 * 0.3
        });
        log_softmax_rows(&logits)
    }

    fn ctc_collapse(path: &[usize], blank: usize) -> Vec<usize> {
        crate::greedy::filter_ctc_output(path, &blank)
    }

    /// Sum of path probabilities over the first `len` frames whose collapsed
    /// output satisfies `keep`. Exhaustive over `vocab^len` paths.
    fn brute_force<F: Fn(&[usize]) -> bool>(log_probs: ArrayView2<'_, f32>, len: usize, keep: F) -> f64 {
        let vocab = log_probs.ncols();
        let total = vocab.pow(len as u32);
        let mut mass = 0.0f64;
        let mut path = vec![0usize; len];
        for code in 0..total {
            let mut rem = code;
            let mut p = 1.0f64;
            for t in 0..len {
                path[t] = rem % vocab;
                rem /= vocab;
                p *= (log_probs[[t, path[t]]] as f64).exp();
            }
            if keep(&ctc_collapse(&path, BLANK)) {
                mass += p;
            }
        }
        mass
    }

    fn brute_prefix(log_probs: ArrayView2<'_, f32>, len: usize, h: &[usize]) -> f32 {
        (brute_force(log_probs, len, |out| out.starts_with(h)) as f32).ln()
    }

    fn brute_exact(log_probs: ArrayView2<'_, f32>, len: usize, g: &[usize]) -> f32 {
        (brute_force(log_probs, len, |out| out == g) as f32).ln()
    }

    #[test]
    fn test_first_step_closed_form() {
        let x = tiny_probs().mapv(f32::ln);
        let scorer = CtcPrefixScorer::new(x.view(), &[3], 1, 1, BLANK, EOS).unwrap();
        let empty: Vec<Vec<usize>> = vec![vec![]];
        let (scores, memory) = scorer.forward_step(&empty, None, None).unwrap();

        // psi(a) = p_a(0) + p_blank(0)·p_a(1) + p_blank(0)·p_blank(1)·p_a(2)
        let psi_a = 0.3 + 0.5 * 0.2 + 0.5 * 0.4 * 0.1;
        let psi_b = 0.1 + 0.5 * 0.3 + 0.5 * 0.4 * 0.2;
        let p_empty = 0.5 * 0.4 * 0.6;
        assert_abs_diff_eq!(scores[[0, A]], f32::ln(psi_a), epsilon = 1e-4);
        assert_abs_diff_eq!(scores[[0, B]], f32::ln(psi_b), epsilon = 1e-4);
        assert_abs_diff_eq!(scores[[0, EOS]], f32::ln(p_empty), epsilon = 1e-4);
        assert_eq!(scores[[0, BLANK]], f32::NEG_INFINITY);
        assert_eq!(memory.psi, scores);
        assert!(memory.scoring_table.is_none());
    }

    #[test]
    fn test_second_step_matches_enumeration() {
        let x = tiny_probs().mapv(f32::ln);
        let scorer = CtcPrefixScorer::new(x.view(), &[3], 1, 1, BLANK, EOS).unwrap();
        let (s1, mem1) = scorer.forward_step(&[Vec::<usize>::new()], None, None).unwrap();

        // Keep "a": beam slot 0, label a.
        let state = scorer.permute_mem(&mem1, array![[A]].view()).unwrap();
        assert!(state.psi.iter().all(|&v| v == s1[[0, A]]));

        let (s2, _) = scorer.forward_step(&[vec![A]], Some(&state), None).unwrap();
        let utt = x.slice(s![0, .., ..]);
        let base = s1[[0, A]];
        assert_abs_diff_eq!(base + s2[[0, B]], brute_prefix(utt, 3, &[A, B]), epsilon = 1e-4);
        assert_abs_diff_eq!(base + s2[[0, A]], brute_prefix(utt, 3, &[A, A]), epsilon = 1e-4);
        assert_abs_diff_eq!(base + s2[[0, EOS]], brute_exact(utt, 3, &[A]), epsilon = 1e-4);
        assert_eq!(s2[[0, BLANK]], f32::NEG_INFINITY);
    }

    #[test]
    fn test_masked_batch_with_beam() {
        let (batch, beam, time, vocab) = (2, 2, 4, 4);
        let x = synthetic_log_probs(batch, time, vocab);
        let lens = [4, 3];
        let scorer = CtcPrefixScorer::new(x.view(), &lens, batch, beam, BLANK, EOS).unwrap();

        let empty = vec![Vec::<usize>::new(); batch * beam];
        let (s1, mem1) = scorer.forward_step(&empty, None, None).unwrap();
        for n in 0..batch * beam {
            let b = n / beam;
            let utt = x.slice(s![b, .., ..]);
            assert_abs_diff_eq!(s1[[n, A]], brute_prefix(utt, lens[b], &[A]), epsilon = 1e-4);
            assert_abs_diff_eq!(s1[[n, EOS]], brute_exact(utt, lens[b], &[]), epsilon = 1e-4);
        }

        // Utterance 0 keeps [a], [b]; utterance 1 keeps [b] (from slot 0), [a] (from slot 1).
        let reorder = array![[A, vocab + B], [B, vocab + A]];
        let state = scorer.permute_mem(&mem1, reorder.view()).unwrap();
        let prefixes = vec![vec![A], vec![B], vec![B], vec![A]];
        let (s2, _) = scorer.forward_step(&prefixes, Some(&state), None).unwrap();

        for (n, g) in prefixes.iter().enumerate() {
            let b = n / beam;
            let utt = x.slice(s![b, .., ..]);
            let base = brute_prefix(utt, lens[b], g);
            for c in [A, B] {
                let h: Vec<usize> = g.iter().copied().chain(Some(c)).collect();
                assert_abs_diff_eq!(base + s2[[n, c]], brute_prefix(utt, lens[b], &h), epsilon = 1e-4);
            }
            assert_abs_diff_eq!(base + s2[[n, EOS]], brute_exact(utt, lens[b], g), epsilon = 1e-4);
        }
    }

    #[test]
    fn test_partial_scoring_matches_full() {
        let (batch, beam, time, vocab) = (2, 2, 4, 4);
        let x = synthetic_log_probs(batch, time, vocab);
        let scorer = CtcPrefixScorer::new(x.view(), &[4, 3], batch, beam, BLANK, EOS).unwrap();
        let empty = vec![Vec::<usize>::new(); batch * beam];
        let candidates = Array2::from_shape_fn((batch * beam, 2), |(_, c)| [A, B][c]);

        let (full, full_mem) = scorer.forward_step(&empty, None, None).unwrap();
        let (part, part_mem) = scorer.forward_step(&empty, None, Some(candidates.view())).unwrap();
        for n in 0..batch * beam {
            for c in [A, B, EOS] {
                assert_abs_diff_eq!(part[[n, c]], full[[n, c]], epsilon = 1e-6);
            }
            assert_eq!(part[[n, BLANK]], f32::NEG_INFINITY);
        }
        let table = part_mem.scoring_table.as_ref().unwrap();
        assert_eq!(table.row(0).to_vec(), vec![-1, 0, 1, -1]);
        assert_eq!(part_mem.num_candidates(), 2);

        let reorder = array![[A, vocab + B], [B, vocab + A]];
        let full_state = scorer.permute_mem(&full_mem, reorder.view()).unwrap();
        let part_state = scorer.permute_mem(&part_mem, reorder.view()).unwrap();
        for (f, p) in full_state.r.iter().zip(part_state.r.iter()) {
            if f.is_finite() {
                assert_abs_diff_eq!(*f, *p, epsilon = 1e-6);
            } else {
                assert_eq!(f, p);
            }
        }
        for (f, p) in full_state.psi.iter().zip(part_state.psi.iter()) {
            assert_abs_diff_eq!(*f, *p, epsilon = 1e-6);
        }

        // Second step, partial again: same deltas as the full search.
        let prefixes = vec![vec![A], vec![B], vec![B], vec![A]];
        let (full2, _) = scorer.forward_step(&prefixes, Some(&full_state), None).unwrap();
        let (part2, _) = scorer
            .forward_step(&prefixes, Some(&part_state), Some(candidates.view()))
            .unwrap();
        for n in 0..batch * beam {
            for c in [A, B, EOS] {
                assert_abs_diff_eq!(part2[[n, c]], full2[[n, c]], epsilon = 1e-5);
            }
        }
    }

    #[test]
    fn test_padding_mask() {
        let x = synthetic_log_probs(2, 4, 4);
        let scorer = CtcPrefixScorer::new(x.view(), &[4, 2], 2, 1, BLANK, EOS).unwrap();
        assert_eq!(scorer.x[[3, 1, BLANK]], 0.0);
        assert_eq!(scorer.x[[2, 1, A]], f32::NEG_INFINITY);
        assert_eq!(scorer.x[[1, 1, A]], x[[1, 1, A]]);
        assert_eq!(scorer.x[[3, 0, A]], x[[0, 3, A]]);
    }

    #[test]
    fn test_relative_lengths_constructor() {
        let x = synthetic_log_probs(2, 4, 4);
        let a = CtcPrefixScorer::from_relative_lengths(x.view(), &[1.0, 0.5], 2, 1, BLANK, EOS).unwrap();
        let b = CtcPrefixScorer::new(x.view(), &[4, 2], 2, 1, BLANK, EOS).unwrap();
        assert_eq!(a.last_frame_index, b.last_frame_index);
        assert_eq!(
            (a.batch_size(), a.beam_size(), a.vocab_size(), a.max_enc_len()),
            (2, 1, 4, 4)
        );
        assert_eq!((a.blank_index(), a.eos_index()), (BLANK, EOS));
    }

    #[test]
    fn test_prefix_longer_than_utterance() {
        let x = tiny_probs().mapv(f32::ln);
        let scorer = CtcPrefixScorer::new(x.view(), &[3], 1, 1, BLANK, EOS).unwrap();
        let state = CtcState {
            r: Array3::from_elem((3, 2, 1), f32::NEG_INFINITY),
            psi: Array2::from_elem((1, 4), -1.0),
        };
        let (scores, _) = scorer.forward_step(&[vec![A, B, A, B]], Some(&state), None).unwrap();
        assert!(scores.iter().all(|&v| v == f32::NEG_INFINITY));
        assert!(!scores.iter().any(|v| v.is_nan()));
    }

    #[test]
    fn test_shape_errors() {
        let x = synthetic_log_probs(2, 4, 4);
        assert!(matches!(
            CtcPrefixScorer::new(x.view(), &[4], 2, 1, BLANK, EOS),
            Err(DecodeError::ShapeMismatch { what: "enc_lens", .. })
        ));
        assert!(matches!(
            CtcPrefixScorer::new(x.view(), &[4, 4], 3, 1, BLANK, EOS),
            Err(DecodeError::ShapeMismatch { what: "emission batch", .. })
        ));
        assert!(matches!(
            CtcPrefixScorer::new(x.view(), &[4, 0], 2, 1, BLANK, EOS),
            Err(DecodeError::InvalidLength { utterance: 1, .. })
        ));
        assert!(matches!(
            CtcPrefixScorer::new(x.view(), &[4, 4], 2, 1, BLANK, 9),
            Err(DecodeError::IndexOutOfRange { what: "eos", .. })
        ));

        let scorer = CtcPrefixScorer::new(x.view(), &[4, 4], 2, 2, BLANK, EOS).unwrap();
        let too_few = vec![Vec::<usize>::new(); 3];
        assert!(matches!(
            scorer.forward_step(&too_few, None, None),
            Err(DecodeError::ShapeMismatch { what: "prefix hypotheses", expected: 4, got: 3 })
        ));
        let ragged = vec![vec![A], vec![A], vec![], vec![B]];
        assert!(matches!(
            scorer.forward_step(&ragged, None, None),
            Err(DecodeError::RaggedPrefix { .. })
        ));
        let bad_cand = Array2::from_elem((4, 1), 7usize);
        let empty = vec![Vec::<usize>::new(); 4];
        assert!(matches!(
            scorer.forward_step(&empty, None, Some(bad_cand.view())),
            Err(DecodeError::IndexOutOfRange { what: "candidate", .. })
        ));

        let (_, mem) = scorer.forward_step(&empty, None, None).unwrap();
        assert!(matches!(
            scorer.permute_mem(&mem, array![[0usize, 1]].view()),
            Err(DecodeError::ShapeMismatch { .. })
        ));
        assert!(matches!(
            scorer.permute_mem(&mem, array![[0usize, 8], [0, 1]].view()),
            Err(DecodeError::IndexOutOfRange { what: "beam reorder", .. })
        ));
    }

    #[test]
    fn test_greedy_beam_follows_best_path() {
        // A one-best search driven only by the scorer recovers the dominant
        // labelling of a peaky emission matrix.
        let probs: Array3<f32> = array![[
            [0.05f32, 0.9, 0.03, 0.02],
            [0.9, 0.05, 0.03, 0.02],
            [0.05, 0.03, 0.9, 0.02],
            [0.9, 0.03, 0.05, 0.02],
        ]];
        let x = probs.mapv(f32::ln);
        let scorer = CtcPrefixScorer::new(x.view(), &[4], 1, 1, BLANK, EOS).unwrap();

        let mut hyp: Vec<usize> = Vec::new();
        let mut state: Option<CtcState> = None;
        for _ in 0..5 {
            let (scores, memory) = scorer.forward_step(&[hyp.clone()], state.as_ref(), None).unwrap();
            let row: Array1<f32> = scores.row(0).to_owned();
            let best = (0..row.len())
                .max_by(|&i, &j| row[i].partial_cmp(&row[j]).unwrap())
                .unwrap();
            if best == EOS {
                break;
            }
            state = Some(scorer.permute_mem(&memory, array![[best]].view()).unwrap());
            hyp.push(best);
        }
        assert_eq!(hyp, vec![A, B]);
    }
}
