//! Training problem builder
//!
//! A [`Problem`] owns every sparse vector appended to it. Labels and vectors
//! always have the same length; [`Problem::add_train_instance`] is the only
//! mutation and extends both together.

use crate::core::{Dataset, Result, SVMError, SparseVector};

/// Labeled training instance with features in any order
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingInstance {
    pub label: f64,
    pub features: Vec<(i32, f64)>,
}

impl TrainingInstance {
    pub fn new(label: f64, features: Vec<(i32, f64)>) -> Self {
        Self { label, features }
    }

    /// Instance whose features are numbered `1..=values.len()`
    pub fn from_dense(label: f64, values: &[f64]) -> Self {
        let features = values
            .iter()
            .zip(1..)
            .map(|(&value, index)| (index, value))
            .collect();
        Self { label, features }
    }
}

/// Append-only collection of `(label, vector)` training instances
#[derive(Debug, Clone, Default)]
pub struct Problem {
    labels: Vec<f64>,
    vectors: Vec<SparseVector>,
}

impl Problem {
    /// Create an empty problem
    pub fn new() -> Self {
        Self::default()
    }

    /// Create an empty problem with room for `capacity` instances
    pub fn with_capacity(capacity: usize) -> Result<Self> {
        let mut problem = Self::new();
        problem.reserve(capacity)?;
        Ok(problem)
    }

    /// Append one instance, taking ownership of `vector`
    ///
    /// The vector must have all of its slots written. If the append fails
    /// the problem is left as it was.
    pub fn add_train_instance(&mut self, vector: SparseVector, label: f64) -> Result<()> {
        if !vector.is_complete() {
            return Err(SVMError::InvalidArgument(format!(
                "vector has {} of {} slots written",
                vector.nnz(),
                vector.capacity()
            )));
        }

        self.reserve(1)?;
        self.labels.push(label);
        self.vectors.push(vector);
        Ok(())
    }

    /// Append an instance given as unsorted `(index, value)` pairs
    pub fn add(&mut self, instance: TrainingInstance) -> Result<()> {
        let vector = SparseVector::from_pairs(instance.features)?;
        self.add_train_instance(vector, instance.label)
    }

    fn reserve(&mut self, additional: usize) -> Result<()> {
        self.labels.try_reserve(additional).map_err(|e| {
            SVMError::AllocationError(format!("growing problem labels: {e}"))
        })?;
        self.vectors.try_reserve(additional).map_err(|e| {
            SVMError::AllocationError(format!("growing problem vectors: {e}"))
        })?;
        Ok(())
    }

    /// Number of instances (`l`)
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    pub fn labels(&self) -> &[f64] {
        &self.labels
    }

    pub fn vectors(&self) -> &[SparseVector] {
        &self.vectors
    }

    /// Get instance `i` as `(vector, label)`
    pub fn instance(&self, i: usize) -> Option<(&SparseVector, f64)> {
        Some((self.vectors.get(i)?, *self.labels.get(i)?))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&SparseVector, f64)> + '_ {
        self.vectors.iter().zip(self.labels.iter().copied())
    }

    /// Largest feature index over all instances, 0 for an empty problem
    pub fn max_index(&self) -> i32 {
        self.vectors
            .iter()
            .filter_map(SparseVector::max_index)
            .max()
            .unwrap_or(0)
    }
}

impl Dataset for Problem {
    fn len(&self) -> usize {
        Problem::len(self)
    }

    fn dim(&self) -> usize {
        usize::try_from(self.max_index()).unwrap_or(0)
    }

    fn instance(&self, i: usize) -> (&SparseVector, f64) {
        (&self.vectors[i], self.labels[i])
    }

    fn labels(&self) -> &[f64] {
        &self.labels
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn vector(pairs: &[(i32, f64)]) -> SparseVector {
        SparseVector::from_pairs(pairs.iter().copied()).expect("valid pairs")
    }

    #[test]
    fn test_new_problem_is_empty() {
        let problem = Problem::new();
        assert_eq!(problem.len(), 0);
        assert!(problem.is_empty());
        assert_eq!(problem.max_index(), 0);
    }

    #[test]
    fn test_len_tracks_appends() {
        let mut problem = Problem::new();
        for k in 1..=50 {
            let v = vector(&[(1, k as f64), (4, 1.0)]);
            problem
                .add_train_instance(v, if k % 2 == 0 { 1.0 } else { -1.0 })
                .expect("append should succeed");
            assert_eq!(problem.len(), k);
            assert_eq!(problem.labels().len(), k);
            assert_eq!(problem.vectors().len(), k);
        }
    }

    #[test]
    fn test_incomplete_vector_rejected() {
        let mut problem = Problem::new();
        let mut v = SparseVector::new(2).expect("allocation should succeed");
        v.put(0, 1, 1.0).expect("put should succeed");

        let err = problem
            .add_train_instance(v, 1.0)
            .expect_err("incomplete vector must be rejected");
        assert!(matches!(err, SVMError::InvalidArgument(_)));
        assert_eq!(problem.len(), 0);
    }

    #[test]
    fn test_add_sorts_features() {
        let mut problem = Problem::new();
        problem
            .add(TrainingInstance::new(1.0, vec![(3, 0.5), (1, 1.0)]))
            .expect("add should succeed");

        let (v, label) = problem.instance(0).expect("instance exists");
        assert_eq!(label, 1.0);
        let indices: Vec<i32> = v.entries().map(|n| n.index).collect();
        assert_eq!(indices, vec![1, 3]);
        assert!(problem.instance(1).is_none());
    }

    #[test]
    fn test_dense_instance_and_dataset_view() {
        let mut problem = Problem::with_capacity(2).expect("allocation should succeed");
        problem
            .add(TrainingInstance::from_dense(0.0, &[1.0, 1.0, 1.0, 0.0, 0.0]))
            .expect("add should succeed");
        problem
            .add(TrainingInstance::from_dense(1.0, &[1.0, 0.0, 1.0, 1.0, 1.0]))
            .expect("add should succeed");

        assert_eq!(Dataset::len(&problem), 2);
        assert_eq!(problem.dim(), 5);
        assert_eq!(Dataset::labels(&problem), &[0.0, 1.0]);
        assert_eq!(Dataset::instance(&problem, 1).0.get(4), 1.0);
    }
}
