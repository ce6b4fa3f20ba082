//! Categorical label encoder: a collision-free `label ↔ index` mapping.
//!
//! Used for encoding e.g. speaker identities, characters, phonemes or words as
//! dense integer codes. Indices are never shared: forcing a label onto an
//! occupied index moves the previous occupant to the next free slot.
//!
//! ## Persisted format
//!
//! ```text
//! '<unk>' => 0
//! 'a' => 1
//! ('tuple', 2) => 2
//! ================
//! 'starting_index' => 0
//! 'unk_label' => '<unk>'
//! ```
//!
//! Labels and extras are literals (see [`crate::literal`]), so a saved file is
//! safe to load from an untrusted source.

use std::{
    collections::{BTreeMap, HashMap},
    fs,
    io::{self, BufWriter, Write},
    path::Path,
};

use ndarray::{Array1, ArrayViewD, Axis};

use crate::{
    error::{EncoderError, EncoderResult, SpecialLabel},
    label::Label,
    literal::{parse_label, parse_label_prefix},
    nested::Nested,
};

/// Default label for out-of-vocabulary tokens.
pub const DEFAULT_UNK: &str = "<unk>";
/// Default beginning-of-sentence label.
pub const DEFAULT_BOS: &str = "<s>";
/// Default end-of-sentence label (same as BOS: one boundary label).
pub const DEFAULT_EOS: &str = "<s>";
/// Default CTC blank label.
pub const DEFAULT_BLANK: &str = "<b>";

const VALUE_SEPARATOR: &str = " => ";
const EXTRAS_SEPARATOR: &str = "================";

// ─────────────────────────────────────────────────────────────────────────────
// Special labels
// ─────────────────────────────────────────────────────────────────────────────

/// Reserved labels, each registered or absent.
///
/// Also used as a builder for the constructors of the encoder family.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SpecialLabels {
    pub unk_label: Option<Label>,
    pub bos_label: Option<Label>,
    pub eos_label: Option<Label>,
    pub blank_label: Option<Label>,
}

impl SpecialLabels {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn unk(mut self, label: impl Into<Label>) -> Self {
        self.unk_label = Some(label.into());
        self
    }

    pub fn bos_eos(mut self, bos: impl Into<Label>, eos: impl Into<Label>) -> Self {
        self.bos_label = Some(bos.into());
        self.eos_label = Some(eos.into());
        self
    }

    pub fn blank(mut self, label: impl Into<Label>) -> Self {
        self.blank_label = Some(label.into());
        self
    }

    fn get(&self, which: SpecialLabel) -> Option<&Label> {
        match which {
            SpecialLabel::Unk => self.unk_label.as_ref(),
            SpecialLabel::Bos => self.bos_label.as_ref(),
            SpecialLabel::Eos => self.eos_label.as_ref(),
            SpecialLabel::Blank => self.blank_label.as_ref(),
        }
    }

    /// Registered slots in save order, keyed by their extras name.
    fn registered(&self) -> impl Iterator<Item = (&'static str, &Label)> {
        [
            ("unk_label", self.unk_label.as_ref()),
            ("bos_label", self.bos_label.as_ref()),
            ("eos_label", self.eos_label.as_ref()),
            ("blank_label", self.blank_label.as_ref()),
        ]
        .into_iter()
        .filter_map(|(k, v)| v.map(|v| (k, v)))
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CategoricalEncoder
// ─────────────────────────────────────────────────────────────────────────────

/// Encode labels of a discrete set as integers.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoricalEncoder {
    lab2ind: HashMap<Label, usize>,
    ind2lab: BTreeMap<usize, Label>,
    starting_index: usize,
    pub(crate) special: SpecialLabels,
}

impl Default for CategoricalEncoder {
    fn default() -> Self {
        Self::new(0)
    }
}

impl CategoricalEncoder {
    /// Create an empty encoder whose first assigned index is `starting_index`.
    pub fn new(starting_index: usize) -> Self {
        Self {
            lab2ind: HashMap::new(),
            ind2lab: BTreeMap::new(),
            starting_index,
            special: SpecialLabels::default(),
        }
    }

    /// Create an encoder pre-seeded with an unk label.
    pub fn with_unk(starting_index: usize, unk_label: impl Into<Label>) -> Self {
        let unk_label = unk_label.into();
        let mut enc = Self::new(starting_index);
        enc.lab2ind.insert(unk_label.clone(), starting_index);
        enc.ind2lab.insert(starting_index, unk_label.clone());
        enc.special.unk_label = Some(unk_label);
        enc
    }

    /// Recreate a previously saved encoder directly.
    pub fn from_saved(path: impl AsRef<Path>) -> EncoderResult<Self> {
        let mut enc = Self::default();
        enc.load(path)?;
        Ok(enc)
    }

    // ── Inspection ────────────────────────────────────────────────────────────

    pub fn len(&self) -> usize {
        self.lab2ind.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lab2ind.is_empty()
    }

    pub fn starting_index(&self) -> usize {
        self.starting_index
    }

    pub fn contains(&self, label: &Label) -> bool {
        self.lab2ind.contains_key(label)
    }

    /// Index of `label`, without any unk fallback.
    pub fn index_of(&self, label: &Label) -> Option<usize> {
        self.lab2ind.get(label).copied()
    }

    /// Label stored at `index`.
    pub fn label_at(&self, index: usize) -> Option<&Label> {
        self.ind2lab.get(&index)
    }

    /// `(index, label)` pairs in ascending index order.
    pub fn iter(&self) -> impl Iterator<Item = (usize, &Label)> {
        self.ind2lab.iter().map(|(&i, l)| (i, l))
    }

    pub fn special_labels(&self) -> &SpecialLabels {
        &self.special
    }

    pub fn unk_label(&self) -> Option<&Label> {
        self.special.unk_label.as_ref()
    }

    /// Current index of a registered special label.
    pub(crate) fn special_index(&self, which: SpecialLabel) -> EncoderResult<usize> {
        let label = self
            .special
            .get(which)
            .ok_or(EncoderError::MissingSpecialLabel(which))?;
        self.index_of(label)
            .ok_or(EncoderError::MissingSpecialLabel(which))
    }

    pub fn unk_index(&self) -> EncoderResult<usize> {
        self.special_index(SpecialLabel::Unk)
    }

    // ── Growth ────────────────────────────────────────────────────────────────

    /// Update from an iterator of individual labels.
    ///
    /// Labels get indices in order of first appearance.
    pub fn update_from_iterable<I, L>(&mut self, iterable: I)
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        for label in iterable {
            self.ensure_label(label);
        }
    }

    /// Update from an iterator of label sequences (flattened one level).
    pub fn update_from_sequences<I, S, L>(&mut self, sequences: I)
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.update_from_iterable(sequences.into_iter().flatten());
    }

    /// Produce the label mapping from label counts, limiting the set size.
    ///
    /// Registers at most `n_most_common` labels (all if `None`), in descending
    /// count order, skipping labels seen fewer than `min_count` times. Equal
    /// counts keep their order of first appearance.
    ///
    /// Returns the unfiltered counts in order of first appearance.
    pub fn limited_labelset_from_iterable<I, L>(
        &mut self,
        iterable: I,
        n_most_common: Option<usize>,
        min_count: usize,
    ) -> EncoderResult<Vec<(Label, usize)>>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        if !self.is_empty() {
            log::info!(
                "limited_labelset_from_iterable called, but the encoder is not empty. \
                 The new labels will be added, i.e. won't overwrite. \
                 This is normal if there is e.g. an unk label already."
            );
        }

        let mut position: HashMap<Label, usize> = HashMap::new();
        let mut counts: Vec<(Label, usize)> = Vec::new();
        for label in iterable {
            let label = label.into();
            match position.get(&label) {
                Some(&i) => counts[i].1 += 1,
                None => {
                    position.insert(label.clone(), counts.len());
                    counts.push((label, 1));
                }
            }
        }

        // Stable sort: ties keep first-appearance order.
        let mut ranked: Vec<&(Label, usize)> = counts.iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));
        let limit = n_most_common.unwrap_or(ranked.len());
        for (label, count) in ranked.into_iter().take(limit) {
            if *count < min_count {
                // Descending order: nothing after this qualifies either.
                break;
            }
            self.add_label(label.clone())?;
        }
        Ok(counts)
    }

    /// [`limited_labelset_from_iterable`](Self::limited_labelset_from_iterable)
    /// over an iterator of label sequences.
    pub fn limited_labelset_from_sequences<I, S, L>(
        &mut self,
        sequences: I,
        n_most_common: Option<usize>,
        min_count: usize,
    ) -> EncoderResult<Vec<(Label, usize)>>
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        self.limited_labelset_from_iterable(sequences.into_iter().flatten(), n_most_common, min_count)
    }

    /// Add a new label at the next free index.
    pub fn add_label(&mut self, label: impl Into<Label>) -> EncoderResult<usize> {
        let label = label.into();
        if self.lab2ind.contains_key(&label) {
            return Err(EncoderError::DuplicateLabel(label));
        }
        let index = self.next_index();
        self.lab2ind.insert(label.clone(), index);
        self.ind2lab.insert(index, label);
        Ok(index)
    }

    /// Add `label` if it is not already present; return its index either way.
    pub fn ensure_label(&mut self, label: impl Into<Label>) -> usize {
        let label = label.into();
        if let Some(&index) = self.lab2ind.get(&label) {
            return index;
        }
        let index = self.next_index();
        self.lab2ind.insert(label.clone(), index);
        self.ind2lab.insert(index, label);
        index
    }

    /// Add a new label at a specific index.
    ///
    /// A label already holding that index is moved to the next free index.
    pub fn insert_label(&mut self, label: impl Into<Label>, index: usize) -> EncoderResult<()> {
        let label = label.into();
        if self.lab2ind.contains_key(&label) {
            return Err(EncoderError::DuplicateLabel(label));
        }
        self.enforce_label(label, index);
        Ok(())
    }

    /// Make sure `label` is present and encoded to `index`.
    ///
    /// If the label exists at another index it is moved. If another label
    /// holds `index`, that label is moved to the next free position.
    pub fn enforce_label(&mut self, label: impl Into<Label>, index: usize) {
        let label = label.into();
        if let Some(&old) = self.lab2ind.get(&label) {
            if old == index {
                return;
            }
            self.ind2lab.remove(&old);
        }
        let displaced = self.ind2lab.get(&index).cloned();
        self.lab2ind.insert(label.clone(), index);
        self.ind2lab.insert(index, label.clone());

        if let Some(moved) = displaced {
            let new_index = self.next_index();
            log::info!(
                "Moving label {} from index {} to {}, because {} was put at its place.",
                moved,
                index,
                new_index,
                label
            );
            self.lab2ind.insert(moved.clone(), new_index);
            self.ind2lab.insert(new_index, moved);
        }
    }

    /// Add a label for unknown (out-of-vocabulary) tokens.
    ///
    /// When asked to encode an unknown label, the encoder can map it here.
    pub fn add_unk(&mut self, unk_label: impl Into<Label>) -> EncoderResult<usize> {
        let unk_label = unk_label.into();
        let index = self.add_label(unk_label.clone())?;
        self.special.unk_label = Some(unk_label);
        Ok(index)
    }

    /// First unused index at or above `starting_index`.
    fn next_index(&self) -> usize {
        let mut index = self.starting_index;
        while self.ind2lab.contains_key(&index) {
            index += 1;
        }
        index
    }

    /// True if the occupied indices form one unbroken run that includes
    /// `starting_index`.
    ///
    /// With `starting_index = 1`: `[1,2,3]` and `[0,1,2]` are continuous,
    /// `[2,3,4]` and `[1,2,4]` are not.
    pub fn is_continuous(&self) -> bool {
        let indices: Vec<usize> = self.ind2lab.keys().copied().collect();
        self.ind2lab.contains_key(&self.starting_index)
            && indices.windows(2).all(|w| w[1] - w[0] == 1)
    }

    // ── Encoding ──────────────────────────────────────────────────────────────

    /// Encode one label to its index.
    ///
    /// Unknown labels map to the unk index when `allow_unk` is set and an unk
    /// label has been added; otherwise this fails.
    pub fn encode_label(&self, label: impl Into<Label>, allow_unk: bool) -> EncoderResult<usize> {
        let label = label.into();
        if let Some(&index) = self.lab2ind.get(&label) {
            return Ok(index);
        }
        match (&self.special.unk_label, allow_unk) {
            (Some(unk), true) => self
                .index_of(unk)
                .ok_or(EncoderError::MissingSpecialLabel(SpecialLabel::Unk)),
            (Some(_), false) => Err(EncoderError::UnkDisallowed(label)),
            (None, _) => Err(EncoderError::NoUnkLabel(label)),
        }
    }

    /// Encode a sequence of labels, preserving order.
    pub fn encode_sequence<I, L>(&self, sequence: I, allow_unk: bool) -> EncoderResult<Vec<usize>>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        sequence
            .into_iter()
            .map(|label| self.encode_label(label, allow_unk))
            .collect()
    }

    /// Encode a sequence of labels into a 1-D `i64` array.
    pub fn encode_sequence_array<I, L>(&self, sequence: I, allow_unk: bool) -> EncoderResult<Array1<i64>>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let ids = self.encode_sequence(sequence, allow_unk)?;
        Ok(ids.into_iter().map(|i| i as i64).collect())
    }

    // ── Decoding ──────────────────────────────────────────────────────────────

    /// Decode a single index.
    pub fn decode_label(&self, index: usize) -> EncoderResult<&Label> {
        self.ind2lab
            .get(&index)
            .ok_or(EncoderError::UnknownIndex(index as i64))
    }

    /// Decode a flat sequence of indices.
    pub fn decode_sequence(&self, indices: &[usize]) -> EncoderResult<Vec<Label>> {
        indices
            .iter()
            .map(|&i| self.decode_label(i).cloned())
            .collect()
    }

    /// Decode an arbitrarily nested structure of indices, keeping its shape.
    pub fn decode_ndim(&self, x: &Nested<usize>) -> EncoderResult<Nested<Label>> {
        x.try_map(&mut |&i: &usize| self.decode_label(i).cloned())
    }

    /// Decode an integer array of any dimensionality to nested labels.
    ///
    /// A 0-d array decodes to a single [`Nested::Leaf`].
    pub fn decode_array(&self, x: ArrayViewD<'_, i64>) -> EncoderResult<Nested<Label>> {
        if x.ndim() == 0 {
            let i = x.iter().next().copied().unwrap_or(-1);
            return self.decode_signed(i).map(Nested::Leaf);
        }
        if x.ndim() == 1 {
            return x
                .iter()
                .map(|&i| self.decode_signed(i).map(Nested::Leaf))
                .collect::<EncoderResult<Vec<_>>>()
                .map(Nested::Seq);
        }
        x.axis_iter(Axis(0))
            .map(|sub| self.decode_array(sub))
            .collect::<EncoderResult<Vec<_>>>()
            .map(Nested::Seq)
    }

    fn decode_signed(&self, i: i64) -> EncoderResult<Label> {
        usize::try_from(i)
            .ok()
            .and_then(|u| self.ind2lab.get(&u))
            .cloned()
            .ok_or(EncoderError::UnknownIndex(i))
    }

    // ── Persistence ───────────────────────────────────────────────────────────

    /// Save the encoding to `path` (overwrites).
    pub fn save(&self, path: impl AsRef<Path>) -> EncoderResult<()> {
        let path = path.as_ref();
        let io_err = |source: io::Error| EncoderError::Io { path: path.to_path_buf(), source };

        let file = fs::File::create(path).map_err(io_err)?;
        let mut w = BufWriter::new(file);
        for (index, label) in &self.ind2lab {
            writeln!(w, "{}{}{}", label, VALUE_SEPARATOR, index).map_err(io_err)?;
        }
        writeln!(w, "{}", EXTRAS_SEPARATOR).map_err(io_err)?;
        writeln!(w, "'starting_index'{}{}", VALUE_SEPARATOR, self.starting_index).map_err(io_err)?;
        for (key, label) in self.special.registered() {
            writeln!(w, "'{}'{}{}", key, VALUE_SEPARATOR, label).map_err(io_err)?;
        }
        w.flush().map_err(io_err)?;
        log::debug!("Saved categorical encoding to {}", path.display());
        Ok(())
    }

    /// Load the encoding from `path`, replacing everything in this encoder.
    pub fn load(&mut self, path: impl AsRef<Path>) -> EncoderResult<()> {
        let path = path.as_ref();
        if !self.is_empty() {
            log::info!(
                "Load called, but the encoder is not empty. Loaded data will overwrite everything. \
                 This is normal if there is e.g. an unk label defined at init."
            );
        }
        let bytes = fs::read(path).map_err(|source| EncoderError::Io { path: path.to_path_buf(), source })?;
        let text = String::from_utf8(bytes).map_err(|e| EncoderError::Malformed {
            path: path.to_path_buf(),
            line: 0,
            message: format!("not valid UTF-8: {}", e.utf8_error()),
        })?;
        *self = parse_saved(&text).map_err(|(line, message)| EncoderError::Malformed {
            path: path.to_path_buf(),
            line,
            message,
        })?;
        log::debug!("Loaded categorical encoding from {}", path.display());
        Ok(())
    }

    /// Load if possible; `Ok(false)` when the file is missing or corrupt.
    ///
    /// Meant for experiment scripts: build and save the encoding on the first
    /// run, load it on later runs. Other I/O failures still propagate.
    pub fn load_if_possible(&mut self, path: impl AsRef<Path>) -> EncoderResult<bool> {
        let path = path.as_ref();
        match self.load(path) {
            Ok(()) => Ok(true),
            Err(e) if e.is_not_found() => {
                log::debug!(
                    "Would load categorical encoding from {}, but file doesn't exist yet.",
                    path.display()
                );
                Ok(false)
            }
            Err(e) if e.is_malformed() => {
                log::debug!(
                    "Would load categorical encoding from {}, and file existed but seems to be \
                     corrupted or otherwise couldn't load: {}",
                    path.display(),
                    e
                );
                Ok(false)
            }
            Err(e) => Err(e),
        }
    }
}

/// Parse the saved text format. Errors carry a 1-based line number.
fn parse_saved(text: &str) -> Result<CategoricalEncoder, (usize, String)> {
    let mut lab2ind = HashMap::new();
    let mut ind2lab = BTreeMap::new();
    let mut lines = text.lines().enumerate().map(|(i, l)| (i + 1, l));
    let mut found_separator = false;

    for (n, line) in lines.by_ref() {
        if line.trim_end() == EXTRAS_SEPARATOR {
            found_separator = true;
            break;
        }
        if line.trim().is_empty() {
            continue;
        }
        let (label, rest) = parse_label_prefix(line).map_err(|e| (n, e.to_string()))?;
        let index = rest
            .strip_prefix(VALUE_SEPARATOR)
            .ok_or_else(|| (n, format!("expected '{}' after label", VALUE_SEPARATOR.trim())))?
            .trim()
            .parse::<usize>()
            .map_err(|e| (n, format!("bad index: {}", e)))?;
        if lab2ind.contains_key(&label) {
            return Err((n, format!("duplicate label {}", label)));
        }
        if ind2lab.contains_key(&index) {
            return Err((n, format!("duplicate index {}", index)));
        }
        lab2ind.insert(label.clone(), index);
        ind2lab.insert(index, label);
    }
    if !found_separator {
        return Err((text.lines().count(), "missing extras separator".to_string()));
    }

    let mut starting_index = None;
    let mut special = SpecialLabels::default();
    for (n, line) in lines {
        if line.trim().is_empty() {
            continue;
        }
        let (key, rest) = parse_label_prefix(line).map_err(|e| (n, e.to_string()))?;
        let value_src = rest
            .strip_prefix(VALUE_SEPARATOR)
            .ok_or_else(|| (n, format!("expected '{}' after key", VALUE_SEPARATOR.trim())))?;
        let value = parse_label(value_src).map_err(|e| (n, e.to_string()))?;
        match key.as_str() {
            Some("starting_index") => match value {
                Label::Int(i) if i >= 0 => starting_index = Some(i as usize),
                other => return Err((n, format!("bad starting_index {}", other))),
            },
            Some("unk_label") => special.unk_label = Some(value),
            Some("bos_label") => special.bos_label = Some(value),
            Some("eos_label") => special.eos_label = Some(value),
            Some("blank_label") => special.blank_label = Some(value),
            _ => log::warn!("Ignoring unknown extras key {} in saved encoding", key),
        }
    }
    let starting_index = starting_index.ok_or((0, "missing 'starting_index' extra".to_string()))?;
    for (key, label) in special.registered() {
        if !lab2ind.contains_key(label) {
            return Err((0, format!("{} {} is not in the label set", key, label)));
        }
    }

    Ok(CategoricalEncoder { lab2ind, ind2lab, starting_index, special })
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{arr0, arr2};

    /// Every index maps to a label that maps back to it, and vice versa.
    fn assert_bijection(enc: &CategoricalEncoder) {
        assert_eq!(enc.lab2ind.len(), enc.ind2lab.len());
        for (label, &index) in &enc.lab2ind {
            assert_eq!(enc.ind2lab.get(&index), Some(label));
        }
        for (&index, label) in &enc.ind2lab {
            assert_eq!(enc.encode_label(label, false).unwrap(), index);
        }
    }

    #[test]
    fn test_add_and_duplicate() {
        let mut enc = CategoricalEncoder::default();
        assert_eq!(enc.add_label("a").unwrap(), 0);
        assert_eq!(enc.add_label("b").unwrap(), 1);
        assert!(matches!(enc.add_label("a"), Err(EncoderError::DuplicateLabel(_))));
        assert_eq!(enc.ensure_label("a"), 0);
        assert_eq!(enc.ensure_label("c"), 2);
        assert_eq!(enc.len(), 3);
    }

    #[test]
    fn test_starting_index() {
        let mut enc = CategoricalEncoder::new(1);
        enc.update_from_iterable("abc".chars());
        assert_eq!(enc.encode_label('a', false).unwrap(), 1);
        assert_eq!(enc.encode_label('c', false).unwrap(), 3);
        assert!(enc.is_continuous());
    }

    #[test]
    fn test_update_from_sequences_first_appearance_order() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_sequences([vec!["b", "a"], vec!["c", "b"]]);
        let decoded = enc.decode_sequence(&[0, 1, 2]).unwrap();
        assert_eq!(decoded, vec![Label::from("b"), Label::from("a"), Label::from("c")]);
    }

    #[test]
    fn test_limited_labelset() {
        let mut enc = CategoricalEncoder::default();
        let counts = enc
            .limited_labelset_from_iterable("aabbbcd".chars(), Some(2), 1)
            .unwrap();
        assert_eq!(
            counts,
            vec![
                (Label::from('a'), 2),
                (Label::from('b'), 3),
                (Label::from('c'), 1),
                (Label::from('d'), 1),
            ]
        );
        assert_eq!(enc.len(), 2);
        assert_eq!(enc.index_of(&Label::from('b')), Some(0));
        assert_eq!(enc.index_of(&Label::from('a')), Some(1));
    }

    #[test]
    fn test_limited_labelset_min_count_and_ties() {
        let mut enc = CategoricalEncoder::default();
        enc.limited_labelset_from_sequences([vec!["x", "y"], vec!["y", "x", "z"]], None, 2)
            .unwrap();
        // x and y tie at 2; x appeared first. z is below min_count.
        assert_eq!(enc.index_of(&Label::from("x")), Some(0));
        assert_eq!(enc.index_of(&Label::from("y")), Some(1));
        assert!(!enc.contains(&Label::from("z")));
    }

    #[test]
    fn test_insert_moves_occupant() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable(["a", "b"]);
        enc.insert_label("new", 0).unwrap();
        assert_eq!(enc.index_of(&Label::from("new")), Some(0));
        assert_eq!(enc.index_of(&Label::from("a")), Some(2));
        assert_eq!(enc.index_of(&Label::from("b")), Some(1));
        assert!(matches!(enc.insert_label("b", 5), Err(EncoderError::DuplicateLabel(_))));
        assert_bijection(&enc);
    }

    #[test]
    fn test_enforce_moves_existing_label() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable(["a", "b", "c"]);
        assert!(enc.is_continuous());
        enc.enforce_label("b", 5);
        assert_eq!(enc.index_of(&Label::from("b")), Some(5));
        assert!(enc.label_at(1).is_none());
        assert!(!enc.is_continuous());
        // Enforcing onto an occupied index swaps the occupant out.
        enc.enforce_label("c", 5);
        assert_eq!(enc.index_of(&Label::from("c")), Some(5));
        assert_eq!(enc.index_of(&Label::from("b")), Some(1));
        assert_bijection(&enc);
    }

    #[test]
    fn test_enforce_same_index_is_noop() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable(["a", "b"]);
        let before = enc.clone();
        enc.enforce_label("b", 1);
        assert_eq!(enc, before);
    }

    #[test]
    fn test_is_continuous_cases() {
        let mut enc = CategoricalEncoder::new(1);
        assert!(!enc.is_continuous());
        enc.enforce_label("x", 0);
        enc.enforce_label("y", 1);
        enc.enforce_label("z", 2);
        assert!(enc.is_continuous());
        let mut gap = CategoricalEncoder::new(1);
        gap.enforce_label("x", 2);
        gap.enforce_label("y", 3);
        assert!(!gap.is_continuous());
    }

    #[test]
    fn test_unknown_label_behaviour() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable(["a", "b"]);
        assert!(matches!(enc.encode_label("zzz", true), Err(EncoderError::NoUnkLabel(_))));
        assert!(matches!(enc.encode_label("zzz", false), Err(EncoderError::NoUnkLabel(_))));

        let unk = enc.add_unk(DEFAULT_UNK).unwrap();
        assert_eq!(enc.encode_label("zzz", true).unwrap(), unk);
        assert!(matches!(enc.encode_label("zzz", false), Err(EncoderError::UnkDisallowed(_))));
        assert_eq!(enc.unk_index().unwrap(), unk);
    }

    #[test]
    fn test_none_is_a_valid_unk() {
        let mut enc = CategoricalEncoder::with_unk(0, Label::None);
        enc.add_label("a").unwrap();
        assert_eq!(enc.encode_label("?", true).unwrap(), 0);
        assert_eq!(enc.unk_label(), Some(&Label::None));
        assert_eq!(enc.special_labels(), &SpecialLabels::new().unk(Label::None));

        let shifted = CategoricalEncoder::with_unk(3, DEFAULT_UNK);
        assert_eq!(shifted.unk_index().unwrap(), 3);
        assert!(shifted.is_continuous());
    }

    #[test]
    fn test_encode_sequence() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable("hello".chars());
        assert_eq!(enc.encode_sequence("hole".chars(), false).unwrap(), vec![0, 3, 2, 1]);
        assert_eq!(
            enc.encode_sequence_array("he".chars(), false).unwrap().to_vec(),
            vec![0i64, 1]
        );
        assert!(enc.encode_sequence("hx".chars(), true).is_err());
    }

    #[test]
    fn test_decode_ndim_shapes() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable("abcd".chars());
        let decoded = enc.decode_ndim(&Nested::batch([vec![0, 1], vec![3]])).unwrap();
        assert_eq!(
            decoded,
            Nested::batch([vec![Label::from('a'), Label::from('b')], vec![Label::from('d')]])
        );
        assert_eq!(enc.decode_ndim(&Nested::Leaf(2)).unwrap(), Nested::Leaf(Label::from('c')));
        assert!(matches!(
            enc.decode_ndim(&Nested::flat([0, 9])),
            Err(EncoderError::UnknownIndex(9))
        ));
    }

    #[test]
    fn test_decode_array() {
        let mut enc = CategoricalEncoder::default();
        enc.update_from_iterable("ab".chars());
        let x = arr2(&[[0i64, 1], [1, 1]]).into_dyn();
        let decoded = enc.decode_array(x.view()).unwrap();
        assert_eq!(decoded.rows().unwrap()[1], vec![Label::from('b'), Label::from('b')]);
        let scalar = arr0(1i64).into_dyn();
        assert_eq!(enc.decode_array(scalar.view()).unwrap(), Nested::Leaf(Label::from('b')));
        let bad = arr2(&[[0i64, -1]]).into_dyn();
        assert!(matches!(enc.decode_array(bad.view()), Err(EncoderError::UnknownIndex(-1))));
    }

    #[test]
    fn test_save_load_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("label_encoder.txt");

        let mut enc = CategoricalEncoder::new(2);
        enc.add_unk(DEFAULT_UNK).unwrap();
        enc.update_from_iterable(["it's", "a => b", "plain"]);
        enc.add_label(Label::from(("tuple", 7))).unwrap();
        enc.add_label(Label::Int(-3)).unwrap();
        enc.enforce_label("plain", 20);
        enc.save(&path).unwrap();

        let loaded = CategoricalEncoder::from_saved(&path).unwrap();
        assert_eq!(loaded, enc);
        assert_eq!(loaded.starting_index(), 2);
        assert_eq!(loaded.unk_label(), Some(&Label::from(DEFAULT_UNK)));
        assert_bijection(&loaded);
    }

    #[test]
    fn test_load_replaces_special_labels() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("enc.txt");
        let mut plain = CategoricalEncoder::default();
        plain.update_from_iterable(["x", "y"]);
        plain.save(&path).unwrap();

        let mut enc = CategoricalEncoder::with_unk(0, DEFAULT_UNK);
        enc.load(&path).unwrap();
        assert!(enc.unk_label().is_none());
        assert_eq!(enc.special_labels(), &SpecialLabels::default());
        assert!(matches!(enc.encode_label("z", true), Err(EncoderError::NoUnkLabel(_))));
    }

    #[test]
    fn test_load_if_possible() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("encoding.txt");

        let mut enc = CategoricalEncoder::default();
        if !enc.load_if_possible(&path).unwrap() {
            enc.update_from_iterable("abcd".chars());
            enc.save(&path).unwrap();
        }
        let mut again = CategoricalEncoder::default();
        assert!(again.load_if_possible(&path).unwrap());
        let decoded = again.decode_sequence(&[0, 1, 2, 3]).unwrap();
        assert_eq!(decoded.iter().filter_map(Label::as_str).collect::<String>(), "abcd");
    }

    #[test]
    fn test_corrupt_files_are_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let cases = [
            ("no_sentinel.txt", "'a' => 0\n"),
            ("bad_literal.txt", "os.system('x') => 0\n================\n'starting_index' => 0\n"),
            ("dup_index.txt", "'a' => 0\n'b' => 0\n================\n'starting_index' => 0\n"),
            ("no_start.txt", "'a' => 0\n================\n"),
            ("bad_unk.txt", "'a' => 0\n================\n'starting_index' => 0\n'unk_label' => '<unk>'\n"),
        ];
        for (name, body) in cases {
            let path = dir.path().join(name);
            fs::write(&path, body).unwrap();
            let err = CategoricalEncoder::from_saved(&path).unwrap_err();
            assert!(err.is_malformed(), "{}: {}", name, err);
            let mut enc = CategoricalEncoder::default();
            assert!(!enc.load_if_possible(&path).unwrap(), "{}", name);
        }
    }

    #[test]
    fn test_non_utf8_file_is_malformed() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("binary.txt");
        fs::write(&path, [0xffu8, 0xfe, b'\'', b'a', b'\'']).unwrap();

        let err = CategoricalEncoder::from_saved(&path).unwrap_err();
        assert!(matches!(err, EncoderError::Malformed { line: 0, .. }), "{}", err);

        let mut enc = CategoricalEncoder::with_unk(0, DEFAULT_UNK);
        assert!(!enc.load_if_possible(&path).unwrap());
        // A failed load leaves the encoder untouched.
        assert_eq!(enc.unk_index().unwrap(), 0);
    }

    #[test]
    fn test_missing_file_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let err = CategoricalEncoder::from_saved(dir.path().join("absent.txt")).unwrap_err();
        assert!(err.is_not_found());
    }
}
