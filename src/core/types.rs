//! Core type definitions for SVM
//!
//! A [`SparseVector`] is a fixed-capacity list of `(index, value)` nodes
//! followed by a terminator node whose index is `-1`. Slots are filled with
//! [`SparseVector::put`], which keeps the written indices strictly ascending.

use crate::core::{Result, SVMError};
use serde::{Deserialize, Serialize};

/// Index carried by the terminator node and by slots that were never written
pub const TERMINATOR_INDEX: i32 = -1;

/// One `(index, value)` entry of a sparse vector
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeatureNode {
    pub index: i32,
    pub value: f64,
}

impl FeatureNode {
    /// The `(-1, 0.0)` node that ends every sparse vector
    pub const TERMINATOR: FeatureNode = FeatureNode {
        index: TERMINATOR_INDEX,
        value: 0.0,
    };

    pub fn new(index: i32, value: f64) -> Self {
        Self { index, value }
    }

    pub fn is_set(&self) -> bool {
        self.index >= 0
    }
}

/// Terminator-delimited sparse feature vector with sorted indices
#[derive(Clone, Debug, PartialEq)]
pub struct SparseVector {
    /// `capacity` entry slots plus the terminator at `nodes[capacity]`
    nodes: Vec<FeatureNode>,
}

impl SparseVector {
    /// Allocate storage for `n` entries plus the terminator
    ///
    /// Every entry slot starts unwritten. Fails with
    /// [`SVMError::AllocationError`] when the memory cannot be reserved.
    pub fn new(n: usize) -> Result<Self> {
        let slots = n.checked_add(1).ok_or_else(|| {
            SVMError::AllocationError(format!("sparse vector capacity {n} overflows"))
        })?;

        let mut nodes = Vec::new();
        nodes.try_reserve_exact(slots).map_err(|e| {
            SVMError::AllocationError(format!("sparse vector with {n} entries: {e}"))
        })?;
        nodes.resize(n, FeatureNode::TERMINATOR);
        nodes.push(FeatureNode::TERMINATOR);

        Ok(Self { nodes })
    }

    /// Create an empty vector holding only the terminator
    pub fn empty() -> Self {
        Self {
            nodes: vec![FeatureNode::TERMINATOR],
        }
    }

    /// Build a vector from `(index, value)` pairs in any order
    ///
    /// Pairs are sorted by index. Duplicate or negative indices are rejected.
    pub fn from_pairs<I>(pairs: I) -> Result<Self>
    where
        I: IntoIterator<Item = (i32, f64)>,
    {
        let mut pairs: Vec<(i32, f64)> = pairs.into_iter().collect();
        pairs.sort_by_key(|&(index, _)| index);

        let mut vector = Self::new(pairs.len())?;
        for (position, (index, value)) in pairs.into_iter().enumerate() {
            vector.put(position, index, value)?;
        }
        Ok(vector)
    }

    /// Build a vector from dense values, numbering features `1..=len`
    pub fn from_dense(values: &[f64]) -> Result<Self> {
        let mut vector = Self::new(values.len())?;
        for (position, &value) in values.iter().enumerate() {
            let index = i32::try_from(position + 1).map_err(|_| {
                SVMError::InvalidArgument(format!("dense position {position} exceeds i32"))
            })?;
            vector.put(position, index, value)?;
        }
        Ok(vector)
    }

    /// Write entry `position`
    ///
    /// `index` must be non-negative, and strictly between the indices of
    /// the nearest written slots on either side. On error the vector is
    /// left unchanged.
    pub fn put(&mut self, position: usize, index: i32, value: f64) -> Result<()> {
        let capacity = self.capacity();
        if position >= capacity {
            return Err(SVMError::InvalidArgument(format!(
                "position {position} out of range for capacity {capacity}"
            )));
        }
        if index < 0 {
            return Err(SVMError::InvalidArgument(format!(
                "feature index must be non-negative, got {index}"
            )));
        }

        if let Some(left) = self.nodes[..position].iter().rev().find(|n| n.is_set()) {
            if left.index >= index {
                return Err(SVMError::InvalidArgument(format!(
                    "index {index} at position {position} does not follow index {}",
                    left.index
                )));
            }
        }
        if let Some(right) = self.nodes[position + 1..capacity].iter().find(|n| n.is_set()) {
            if right.index <= index {
                return Err(SVMError::InvalidArgument(format!(
                    "index {index} at position {position} does not precede index {}",
                    right.index
                )));
            }
        }

        self.nodes[position] = FeatureNode::new(index, value);
        Ok(())
    }

    /// Number of entry slots, excluding the terminator
    pub fn capacity(&self) -> usize {
        self.nodes.len() - 1
    }

    /// Number of written entries
    pub fn nnz(&self) -> usize {
        self.entries().count()
    }

    /// True when every slot has been written
    pub fn is_complete(&self) -> bool {
        self.nodes[..self.capacity()].iter().all(FeatureNode::is_set)
    }

    /// Check if vector has no written entries
    pub fn is_empty(&self) -> bool {
        self.nnz() == 0
    }

    /// Written entries in ascending index order
    pub fn entries(&self) -> impl Iterator<Item = &FeatureNode> + '_ {
        self.nodes[..self.capacity()].iter().filter(|n| n.is_set())
    }

    /// All slots including the terminator
    pub fn nodes(&self) -> &[FeatureNode] {
        &self.nodes
    }

    pub fn terminator(&self) -> &FeatureNode {
        &self.nodes[self.capacity()]
    }

    /// Get the value at a feature index (0 if not present)
    pub fn get(&self, index: i32) -> f64 {
        self.entries()
            .find(|n| n.index == index)
            .map_or(0.0, |n| n.value)
    }

    /// Largest written feature index, if any
    pub fn max_index(&self) -> Option<i32> {
        self.entries().map(|n| n.index).last()
    }

    /// Compute squared L2 norm
    pub fn norm_squared(&self) -> f64 {
        self.entries().map(|n| n.value * n.value).sum()
    }

    /// Compact copy holding only the written entries
    pub fn compacted(&self) -> Self {
        let mut nodes: Vec<FeatureNode> = self.entries().copied().collect();
        nodes.push(FeatureNode::TERMINATOR);
        Self { nodes }
    }
}

impl Default for SparseVector {
    fn default() -> Self {
        Self::empty()
    }
}
