//! Text encoders: sentence boundaries (BOS/EOS) and the CTC blank.
//!
//! [`TextEncoder`] and [`CtcTextEncoder`] wrap a [`CategoricalEncoder`] and
//! dereference to it, so every mapping, encoding and persistence operation of
//! the base encoder is available on them directly.

use std::{
    ops::{Deref, DerefMut},
    path::Path,
};

use crate::{
    encoder::{CategoricalEncoder, SpecialLabels},
    error::{EncoderError, EncoderResult, SpecialLabel},
    label::Label,
    nested::Nested,
};

// ─────────────────────────────────────────────────────────────────────────────
// TextEncoder
// ─────────────────────────────────────────────────────────────────────────────

/// Categorical encoder with optional sentence-boundary labels.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TextEncoder {
    inner: CategoricalEncoder,
}

impl Deref for TextEncoder {
    type Target = CategoricalEncoder;

    fn deref(&self) -> &CategoricalEncoder {
        &self.inner
    }
}

impl DerefMut for TextEncoder {
    fn deref_mut(&mut self) -> &mut CategoricalEncoder {
        &mut self.inner
    }
}

impl From<CategoricalEncoder> for TextEncoder {
    fn from(inner: CategoricalEncoder) -> Self {
        Self { inner }
    }
}

impl TextEncoder {
    pub fn new(starting_index: usize) -> Self {
        Self { inner: CategoricalEncoder::new(starting_index) }
    }

    /// Create an encoder seeded with special labels.
    ///
    /// The unk label is appended first; BOS/EOS are then inserted at indices
    /// 0 and 1. BOS and EOS must be given together. A blank label is ignored
    /// here (see [`CtcTextEncoder::with_special_labels`]).
    pub fn with_special_labels(starting_index: usize, special: SpecialLabels) -> EncoderResult<Self> {
        let mut enc = Self::new(starting_index);
        if let Some(unk) = special.unk_label {
            enc.add_unk(unk)?;
        }
        match (special.bos_label, special.eos_label) {
            (Some(bos), Some(eos)) => enc.insert_bos_eos(bos, eos, 0)?,
            (None, None) => {}
            _ => return Err(EncoderError::IncompleteBosEos),
        }
        Ok(enc)
    }

    pub fn from_saved(path: impl AsRef<Path>) -> EncoderResult<Self> {
        CategoricalEncoder::from_saved(path).map(Self::from)
    }

    /// Add sentence boundary labels at the end of the index range.
    ///
    /// If BOS and EOS are the same label only one entry is added.
    pub fn add_bos_eos(&mut self, bos_label: impl Into<Label>, eos_label: impl Into<Label>) -> EncoderResult<()> {
        let (bos, eos) = (bos_label.into(), eos_label.into());
        if bos == eos {
            log::debug!("BOS and EOS labels are the same so using just one sentence boundary label");
            self.add_label(bos.clone())?;
        } else {
            self.add_label(bos.clone())?;
            self.add_label(eos.clone())?;
        }
        self.special.bos_label = Some(bos);
        self.special.eos_label = Some(eos);
        Ok(())
    }

    /// Insert sentence boundary labels: BOS at `bos_index`, EOS at `bos_index + 1`.
    ///
    /// If BOS and EOS are the same label only one entry is inserted.
    pub fn insert_bos_eos(
        &mut self,
        bos_label: impl Into<Label>,
        eos_label: impl Into<Label>,
        bos_index: usize,
    ) -> EncoderResult<()> {
        let (bos, eos) = (bos_label.into(), eos_label.into());
        if bos == eos {
            log::debug!("BOS and EOS labels are the same so using just one sentence boundary label");
            self.insert_label(bos.clone(), bos_index)?;
        } else {
            self.insert_label(bos.clone(), bos_index)?;
            self.insert_label(eos.clone(), bos_index + 1)?;
        }
        self.special.bos_label = Some(bos);
        self.special.eos_label = Some(eos);
        Ok(())
    }

    pub fn bos_label(&self) -> Option<&Label> {
        self.special.bos_label.as_ref()
    }

    pub fn eos_label(&self) -> Option<&Label> {
        self.special.eos_label.as_ref()
    }

    pub fn bos_index(&self) -> EncoderResult<usize> {
        self.special_index(SpecialLabel::Bos)
    }

    pub fn eos_index(&self) -> EncoderResult<usize> {
        self.special_index(SpecialLabel::Eos)
    }

    /// `x` with the BOS label prepended.
    pub fn prepend_bos_label<I, L>(&self, x: I) -> EncoderResult<Vec<Label>>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let bos = self
            .bos_label()
            .ok_or(EncoderError::MissingSpecialLabel(SpecialLabel::Bos))?;
        Ok(std::iter::once(bos.clone())
            .chain(x.into_iter().map(Into::into))
            .collect())
    }

    /// `x` with the BOS index prepended.
    pub fn prepend_bos_index(&self, x: &[usize]) -> EncoderResult<Vec<usize>> {
        let bos = self.bos_index()?;
        Ok(std::iter::once(bos).chain(x.iter().copied()).collect())
    }

    /// `x` with the EOS label appended.
    pub fn append_eos_label<I, L>(&self, x: I) -> EncoderResult<Vec<Label>>
    where
        I: IntoIterator<Item = L>,
        L: Into<Label>,
    {
        let eos = self
            .eos_label()
            .ok_or(EncoderError::MissingSpecialLabel(SpecialLabel::Eos))?
            .clone();
        let mut out: Vec<Label> = x.into_iter().map(Into::into).collect();
        out.push(eos);
        Ok(out)
    }

    /// `x` with the EOS index appended.
    pub fn append_eos_index(&self, x: &[usize]) -> EncoderResult<Vec<usize>> {
        let eos = self.eos_index()?;
        let mut out = x.to_vec();
        out.push(eos);
        Ok(out)
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// CtcTextEncoder
// ─────────────────────────────────────────────────────────────────────────────

/// Text encoder with a CTC blank label and the CTC collapsing rules.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CtcTextEncoder {
    inner: TextEncoder,
}

impl Deref for CtcTextEncoder {
    type Target = TextEncoder;

    fn deref(&self) -> &TextEncoder {
        &self.inner
    }
}

impl DerefMut for CtcTextEncoder {
    fn deref_mut(&mut self) -> &mut TextEncoder {
        &mut self.inner
    }
}

impl From<CategoricalEncoder> for CtcTextEncoder {
    fn from(inner: CategoricalEncoder) -> Self {
        Self { inner: TextEncoder::from(inner) }
    }
}

impl CtcTextEncoder {
    pub fn new(starting_index: usize) -> Self {
        Self { inner: TextEncoder::new(starting_index) }
    }

    /// Create an encoder seeded with special labels.
    ///
    /// Same as [`TextEncoder::with_special_labels`], then the blank label (if
    /// given) is inserted at index 0, displacing whatever was there.
    pub fn with_special_labels(starting_index: usize, special: SpecialLabels) -> EncoderResult<Self> {
        let blank = special.blank_label.clone();
        let mut enc = Self { inner: TextEncoder::with_special_labels(starting_index, special)? };
        if let Some(blank) = blank {
            enc.insert_blank(blank, 0)?;
        }
        Ok(enc)
    }

    pub fn from_saved(path: impl AsRef<Path>) -> EncoderResult<Self> {
        CategoricalEncoder::from_saved(path).map(Self::from)
    }

    /// Add the blank label at the next free index.
    pub fn add_blank(&mut self, blank_label: impl Into<Label>) -> EncoderResult<usize> {
        let blank = blank_label.into();
        let index = self.add_label(blank.clone())?;
        self.special.blank_label = Some(blank);
        Ok(index)
    }

    /// Insert the blank label at `index`.
    pub fn insert_blank(&mut self, blank_label: impl Into<Label>, index: usize) -> EncoderResult<()> {
        let blank = blank_label.into();
        self.insert_label(blank.clone(), index)?;
        self.special.blank_label = Some(blank);
        Ok(())
    }

    pub fn blank_label(&self) -> Option<&Label> {
        self.special.blank_label.as_ref()
    }

    pub fn blank_index(&self) -> EncoderResult<usize> {
        self.special_index(SpecialLabel::Blank)
    }

    /// Apply the CTC collapsing rules to one label sequence.
    ///
    /// With `merge_repeats`, adjacent repeats are merged before blanks are
    /// removed (basic CTC topology). Without it only blanks are removed
    /// (RNN-T style).
    pub fn collapse_labels(&self, x: &[Label], merge_repeats: bool) -> EncoderResult<Vec<Label>> {
        let blank = self
            .blank_label()
            .ok_or(EncoderError::MissingSpecialLabel(SpecialLabel::Blank))?;
        Ok(collapse(x, blank, merge_repeats))
    }

    /// Apply the CTC collapsing rules at the innermost level of a nested
    /// structure of indices.
    ///
    /// The nesting depth must be uniform; a single leaf is rejected.
    pub fn collapse_indices_ndim(&self, x: &Nested<usize>, merge_repeats: bool) -> EncoderResult<Nested<usize>> {
        let blank = self.blank_index()?;
        if x.depth()? == 0 {
            return Err(EncoderError::MixedDepth);
        }
        Ok(collapse_nested(x, blank, merge_repeats))
    }
}

pub(crate) fn collapse<T: PartialEq + Clone>(x: &[T], blank: &T, merge_repeats: bool) -> Vec<T> {
    x.iter()
        .enumerate()
        .filter(|&(i, v)| (!merge_repeats || i == 0 || *v != x[i - 1]) && v != blank)
        .map(|(_, v)| v.clone())
        .collect()
}

/// Depth has already been validated as uniform and ≥ 1.
fn collapse_nested(x: &Nested<usize>, blank: usize, merge_repeats: bool) -> Nested<usize> {
    match x.as_leaves() {
        Some(leaves) => {
            let seq: Vec<usize> = leaves.into_iter().copied().collect();
            Nested::flat(collapse(&seq, &blank, merge_repeats))
        }
        None => match x {
            Nested::Seq(items) => Nested::Seq(
                items
                    .iter()
                    .map(|item| collapse_nested(item, blank, merge_repeats))
                    .collect(),
            ),
            Nested::Leaf(v) => Nested::Leaf(*v),
        },
    }
}
