//! Arbitrarily nested sequences with a uniform depth.
//!
//! Used where the vocabulary operates on "any shape" input: decoding a nested
//! batch of indices back to labels, or applying CTC collapsing at the innermost
//! level of a batch of index sequences.

use crate::error::{EncoderError, EncoderResult};

/// A leaf value or a sequence of nested values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Nested<T> {
    Leaf(T),
    Seq(Vec<Nested<T>>),
}

impl<T> Nested<T> {
    /// A one-level sequence of leaves.
    pub fn flat<I: IntoIterator<Item = T>>(items: I) -> Self {
        Nested::Seq(items.into_iter().map(Nested::Leaf).collect())
    }

    /// A two-level sequence (e.g. a batch of label sequences).
    pub fn batch<I, S>(rows: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: IntoIterator<Item = T>,
    {
        Nested::Seq(rows.into_iter().map(Nested::flat).collect())
    }

    /// Nesting depth: 0 for a leaf, 1 for a sequence of leaves, ...
    ///
    /// Fails with [`EncoderError::MixedDepth`] when siblings disagree. An empty
    /// sequence has depth 1 and is compatible with any sibling depth ≥ 1.
    pub fn depth(&self) -> EncoderResult<usize> {
        match self {
            Nested::Leaf(_) => Ok(0),
            Nested::Seq(items) => {
                let mut depth: Option<usize> = None;
                let mut saw_empty = false;
                for item in items {
                    if matches!(item, Nested::Seq(v) if v.is_empty()) {
                        saw_empty = true;
                        continue;
                    }
                    let d = item.depth()?;
                    match depth {
                        Some(prev) if prev != d => return Err(EncoderError::MixedDepth),
                        _ => depth = Some(d),
                    }
                }
                match depth {
                    Some(0) if saw_empty => Err(EncoderError::MixedDepth),
                    Some(d) => Ok(d + 1),
                    None if saw_empty => Ok(2),
                    None => Ok(1),
                }
            }
        }
    }

    /// Map every leaf through a fallible function, keeping the shape.
    pub fn try_map<U, E, F>(&self, f: &mut F) -> Result<Nested<U>, E>
    where
        F: FnMut(&T) -> Result<U, E>,
    {
        match self {
            Nested::Leaf(v) => Ok(Nested::Leaf(f(v)?)),
            Nested::Seq(items) => items
                .iter()
                .map(|item| item.try_map(f))
                .collect::<Result<Vec<_>, E>>()
                .map(Nested::Seq),
        }
    }

    /// The leaves of a depth-1 sequence, or `None` at any other depth.
    pub fn as_leaves(&self) -> Option<Vec<&T>> {
        match self {
            Nested::Seq(items) => items
                .iter()
                .map(|item| match item {
                    Nested::Leaf(v) => Some(v),
                    Nested::Seq(_) => None,
                })
                .collect(),
            Nested::Leaf(_) => None,
        }
    }
}

impl<T: Clone> Nested<T> {
    /// Flatten a two-level structure into rows. `None` unless depth is exactly 2.
    pub fn rows(&self) -> Option<Vec<Vec<T>>> {
        match self {
            Nested::Seq(rows) => rows
                .iter()
                .map(|row| row.as_leaves().map(|v| v.into_iter().cloned().collect()))
                .collect(),
            Nested::Leaf(_) => None,
        }
    }
}
