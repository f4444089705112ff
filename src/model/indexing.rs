//! # Column Indexing
//!
//! ## Role
//! Per-column enumeration of read-to-partition assignments and their
//! projections onto neighboring columns.
//!
//! ## Key Concepts
//! - `index`: a column's full partitioning packed in base `ploidy`, one
//!   digit per active read in column (read-ID) order.
//! - `forward projection`: the same packing restricted to reads that stay
//!   active in the next column.
//! - `backward projection`: the packing restricted to reads carried over
//!   from the previous column.
//! - The iterator walks all `ploidy^reads` partitionings as a loopless
//!   reflected mixed-radix Gray code: after the initial full partition,
//!   every step changes exactly one read's partition by one, and the full,
//!   forward and backward indices are maintained incrementally.
//!
//! Because adjacent columns list their shared reads in the same (read-ID)
//! order, the forward projection out of column `c` and the backward
//! projection into column `c + 1` encode identical shared-read assignments.

use crate::error::{PedPhaseError, Result};

fn partition_space(ploidy: usize, reads: usize) -> Result<usize> {
    ploidy.checked_pow(reads as u32).ok_or_else(|| {
        PedPhaseError::precondition(format!(
            "partitioning space {ploidy}^{reads} does not fit in usize; column coverage too high"
        ))
    })
}

/// Active-read bookkeeping for one column.
#[derive(Clone, Debug)]
pub struct ColumnIndexingScheme {
    ploidy: usize,
    read_ids: Vec<u32>,
    column_size: usize,
    weights: Vec<usize>,
    backward_mask: Vec<bool>,
    backward_weights: Vec<usize>,
    backward_projection_size: usize,
    forward_mask: Vec<bool>,
    forward_weights: Vec<usize>,
    forward_projection_size: usize,
}

impl ColumnIndexingScheme {
    /// Scheme for the first column: no reads are carried over.
    pub fn new(read_ids: Vec<u32>, ploidy: usize) -> Result<Self> {
        let n = read_ids.len();
        let column_size = partition_space(ploidy, n)?;
        let weights = (0..n).scan(1usize, |w, _| {
            let current = *w;
            *w = w.saturating_mul(ploidy);
            Some(current)
        });
        Ok(ColumnIndexingScheme {
            ploidy,
            column_size,
            weights: weights.collect(),
            backward_mask: vec![false; n],
            backward_weights: vec![0; n],
            backward_projection_size: 1,
            forward_mask: vec![false; n],
            forward_weights: vec![0; n],
            forward_projection_size: 1,
            read_ids,
        })
    }

    /// Scheme for a successor column: reads shared with the predecessor
    /// form the backward projection.
    pub fn with_predecessor(
        predecessor: &ColumnIndexingScheme,
        read_ids: Vec<u32>,
        ploidy: usize,
    ) -> Result<Self> {
        let mut scheme = ColumnIndexingScheme::new(read_ids, ploidy)?;
        let (mask, weights, size) = scheme.projection_onto(&predecessor.read_ids)?;
        scheme.backward_mask = mask;
        scheme.backward_weights = weights;
        scheme.backward_projection_size = size;
        Ok(scheme)
    }

    /// Record the next column's reads; computes the forward projection
    /// mapping eagerly. Must be called before iteration for every column
    /// that has a successor.
    pub fn wire_next(&mut self, next_read_ids: &[u32]) -> Result<()> {
        let (mask, weights, size) = self.projection_onto(next_read_ids)?;
        self.forward_mask = mask;
        self.forward_weights = weights;
        self.forward_projection_size = size;
        Ok(())
    }

    fn projection_onto(&self, other_ids: &[u32]) -> Result<(Vec<bool>, Vec<usize>, usize)> {
        let mask: Vec<bool> = self
            .read_ids
            .iter()
            .map(|id| other_ids.binary_search(id).is_ok())
            .collect();
        let shared = mask.iter().filter(|&&m| m).count();
        let size = partition_space(self.ploidy, shared)?;
        let mut weights = vec![0usize; mask.len()];
        let mut weight = 1usize;
        for (pos, &m) in mask.iter().enumerate() {
            if m {
                weights[pos] = weight;
                weight = weight.saturating_mul(self.ploidy);
            }
        }
        Ok((mask, weights, size))
    }

    pub fn read_ids(&self) -> &[u32] {
        &self.read_ids
    }

    pub fn column_size(&self) -> usize {
        self.column_size
    }

    pub fn forward_projection_size(&self) -> usize {
        self.forward_projection_size
    }

    pub fn backward_projection_size(&self) -> usize {
        self.backward_projection_size
    }

    /// Restrict a full partitioning index of this column to the reads
    /// carried over from the previous column.
    pub fn backward_projection_of(&self, mut index: usize) -> usize {
        let mut projected = 0;
        for pos in 0..self.read_ids.len() {
            let digit = index % self.ploidy;
            index /= self.ploidy;
            if self.backward_mask[pos] {
                projected += digit * self.backward_weights[pos];
            }
        }
        projected
    }

    pub fn iter(&self) -> ColumnIndexingIterator<'_> {
        let n = self.read_ids.len();
        ColumnIndexingIterator {
            scheme: self,
            digits: vec![0; n],
            directions: vec![1; n],
            focus: (0..=n).collect(),
            index: 0,
            forward_index: 0,
            backward_index: 0,
            started: false,
        }
    }
}

/// One step of the Gray-code walk.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum IndexingStep {
    /// Discontinuous transition (start of the walk): consume the full
    /// partition instead of a delta.
    Fresh,
    /// Exactly one read changed partition.
    Delta { position: usize, partition: usize },
}

/// Loopless reflected mixed-radix Gray-code walk over all partitionings of
/// a column, with incrementally maintained projection indices.
pub struct ColumnIndexingIterator<'a> {
    scheme: &'a ColumnIndexingScheme,
    digits: Vec<usize>,
    directions: Vec<i8>,
    focus: Vec<usize>,
    index: usize,
    forward_index: usize,
    backward_index: usize,
    started: bool,
}

impl<'a> ColumnIndexingIterator<'a> {
    pub fn has_next(&self) -> bool {
        if !self.started {
            return true;
        }
        if self.scheme.ploidy <= 1 {
            return false;
        }
        self.focus[0] != self.digits.len()
    }

    /// Move to the next partitioning. The caller must check `has_next`
    /// first; advancing past the end is an invariant violation.
    pub fn advance(&mut self) -> IndexingStep {
        if !self.started {
            self.started = true;
            return IndexingStep::Fresh;
        }
        let j = self.focus[0];
        self.focus[0] = 0;
        let direction = self.directions[j];
        if direction > 0 {
            self.digits[j] += 1;
            self.index += self.scheme.weights[j];
            if self.scheme.forward_mask[j] {
                self.forward_index += self.scheme.forward_weights[j];
            }
            if self.scheme.backward_mask[j] {
                self.backward_index += self.scheme.backward_weights[j];
            }
        } else {
            self.digits[j] -= 1;
            self.index -= self.scheme.weights[j];
            if self.scheme.forward_mask[j] {
                self.forward_index -= self.scheme.forward_weights[j];
            }
            if self.scheme.backward_mask[j] {
                self.backward_index -= self.scheme.backward_weights[j];
            }
        }
        if self.digits[j] == 0 || self.digits[j] + 1 == self.scheme.ploidy {
            self.directions[j] = -direction;
            self.focus[j] = self.focus[j + 1];
            self.focus[j + 1] = j + 1;
        }
        IndexingStep::Delta {
            position: j,
            partition: self.digits[j],
        }
    }

    /// Current full partitioning index.
    pub fn index(&self) -> usize {
        self.index
    }

    /// Current partitioning restricted to reads kept in the next column.
    pub fn forward_projection(&self) -> usize {
        self.forward_index
    }

    /// Current partitioning restricted to reads carried from the previous
    /// column.
    pub fn backward_projection(&self) -> usize {
        self.backward_index
    }

    /// Current per-read partition assignment, one digit per active read.
    pub fn partition(&self) -> &[usize] {
        &self.digits
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashSet;

    fn collect_walk(scheme: &ColumnIndexingScheme) -> Vec<usize> {
        let mut iterator = scheme.iter();
        let mut visited = Vec::new();
        while iterator.has_next() {
            iterator.advance();
            visited.push(iterator.index());
        }
        visited
    }

    #[test]
    fn test_walk_visits_each_index_once() {
        for (ploidy, reads) in [(2usize, 3usize), (3, 2), (2, 1), (4, 3)] {
            let ids: Vec<u32> = (0..reads as u32).collect();
            let scheme = ColumnIndexingScheme::new(ids, ploidy).unwrap();
            let visited = collect_walk(&scheme);
            assert_eq!(visited.len(), scheme.column_size());
            let unique: HashSet<usize> = visited.iter().copied().collect();
            assert_eq!(unique.len(), scheme.column_size());
            assert!(visited.iter().all(|&i| i < scheme.column_size()));
        }
    }

    #[test]
    fn test_walk_changes_one_digit_per_step() {
        let scheme = ColumnIndexingScheme::new(vec![0, 1, 2], 3).unwrap();
        let mut iterator = scheme.iter();
        assert_eq!(iterator.advance(), IndexingStep::Fresh);
        assert_eq!(iterator.partition(), &[0, 0, 0]);
        let mut previous = iterator.partition().to_vec();
        while iterator.has_next() {
            let step = iterator.advance();
            let current = iterator.partition().to_vec();
            match step {
                IndexingStep::Fresh => panic!("fresh transition after the start"),
                IndexingStep::Delta {
                    position,
                    partition,
                } => {
                    assert_eq!(current[position], partition);
                    let changed = previous
                        .iter()
                        .zip(current.iter())
                        .filter(|(a, b)| a != b)
                        .count();
                    assert_eq!(changed, 1);
                    let delta = previous[position] as i64 - current[position] as i64;
                    assert_eq!(delta.abs(), 1);
                }
            }
            previous = current;
        }
    }

    #[test]
    fn test_degenerate_walks() {
        // no reads: exactly one partitioning
        let scheme = ColumnIndexingScheme::new(vec![], 2).unwrap();
        assert_eq!(collect_walk(&scheme).len(), 1);
        // ploidy one: exactly one partitioning
        let scheme = ColumnIndexingScheme::new(vec![0, 1, 2], 1).unwrap();
        assert_eq!(scheme.column_size(), 1);
        assert_eq!(collect_walk(&scheme).len(), 1);
    }

    #[test]
    fn test_projection_sizes_agree_across_columns() {
        let ploidy = 2;
        let mut first = ColumnIndexingScheme::new(vec![0, 1, 2], ploidy).unwrap();
        let second =
            ColumnIndexingScheme::with_predecessor(&first, vec![1, 2, 3, 4], ploidy).unwrap();
        first.wire_next(second.read_ids()).unwrap();
        assert_eq!(
            first.forward_projection_size(),
            second.backward_projection_size()
        );
        assert_eq!(first.forward_projection_size(), 4); // reads 1 and 2 shared
    }

    #[test]
    fn test_projections_encode_shared_assignment() {
        let ploidy = 3;
        let mut first = ColumnIndexingScheme::new(vec![0, 1, 2], ploidy).unwrap();
        let second =
            ColumnIndexingScheme::with_predecessor(&first, vec![1, 2, 3], ploidy).unwrap();
        first.wire_next(second.read_ids()).unwrap();

        let mut iterator = first.iter();
        while iterator.has_next() {
            iterator.advance();
            let digits = iterator.partition();
            // shared reads 1 and 2 sit at positions 1, 2 of the first column
            let expected = digits[1] + digits[2] * ploidy;
            assert_eq!(iterator.forward_projection(), expected);

            // the same shared assignment, extended by any digit for read 3,
            // projects backward out of the second column to the same slot
            for extra in 0..ploidy {
                let second_index = digits[1] + digits[2] * ploidy + extra * ploidy * ploidy;
                assert_eq!(second.backward_projection_of(second_index), expected);
            }
        }
    }

    #[test]
    fn test_backward_projection_tracked_incrementally() {
        let ploidy = 2;
        let first = ColumnIndexingScheme::new(vec![0, 1], ploidy).unwrap();
        let second =
            ColumnIndexingScheme::with_predecessor(&first, vec![1, 2], ploidy).unwrap();
        let mut iterator = second.iter();
        while iterator.has_next() {
            iterator.advance();
            assert_eq!(
                iterator.backward_projection(),
                second.backward_projection_of(iterator.index())
            );
        }
    }

    #[test]
    fn test_oversized_column_rejected() {
        let ids: Vec<u32> = (0..200).collect();
        assert!(ColumnIndexingScheme::new(ids, 2).is_err());
    }
}
