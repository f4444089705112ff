//! # Column Cost Computer
//!
//! ## Role
//! For one column and one inheritance pattern, the minimum weighted
//! disagreement between the reads (under the current read-to-partition
//! assignment) and any allele assignment to the global haplotype classes
//! that is consistent with the pedigree genotypes.
//!
//! The computer keeps per-class, per-allele penalty accumulators so that a
//! single read changing partition is an O(`allele_count`) update; the DP
//! enumerates `ploidy^reads` partitionings per column, so recomputing from
//! scratch at every step would be unacceptable.
//!
//! Genotype handling: with trusted genotypes, an allele assignment whose
//! implied genotype differs from a recorded one is forbidden; with
//! distrusted genotypes every assignment is allowed and recorded genotype
//! likelihoods surcharge the implied genotype instead.

use crate::data::{Entry, Pedigree};
use crate::error::{PedPhaseError, Result};
use crate::model::partitions::PedigreePartitions;
use crate::utils::Cost;

pub struct ColumnCostComputer<'a> {
    entries: &'a [Entry<'a>],
    column_index: usize,
    read_sources: &'a [usize],
    pedigree: &'a Pedigree,
    partitions: &'a PedigreePartitions,
    distrust_genotypes: bool,
    allele_count: usize,
    assignment_count: usize,
    partitioning: Vec<usize>,
    /// Flattened `[class][allele]` penalty sums; wide to stay exact under
    /// incremental subtraction.
    penalties: Vec<u64>,
}

impl<'a> ColumnCostComputer<'a> {
    pub fn new(
        entries: &'a [Entry<'a>],
        column_index: usize,
        read_sources: &'a [usize],
        pedigree: &'a Pedigree,
        partitions: &'a PedigreePartitions,
        distrust_genotypes: bool,
        allele_count: usize,
    ) -> Result<Self> {
        let assignment_count = allele_count
            .checked_pow(partitions.count() as u32)
            .ok_or_else(|| {
                PedPhaseError::precondition(format!(
                    "allele assignment space {}^{} does not fit in usize",
                    allele_count,
                    partitions.count()
                ))
            })?;
        Ok(ColumnCostComputer {
            entries,
            column_index,
            read_sources,
            pedigree,
            partitions,
            distrust_genotypes,
            allele_count,
            assignment_count,
            partitioning: vec![0; entries.len()],
            penalties: vec![0; partitions.count() * allele_count],
        })
    }

    fn class_of(&self, entry: &Entry<'_>, partition: usize) -> usize {
        let individual = self.read_sources[entry.read_id() as usize];
        self.partitions.haplotype_class(individual, partition)
    }

    /// Initialize from a full partitioning index in base `ploidy`.
    pub fn set_partitioning(&mut self, index: usize) {
        self.penalties.fill(0);
        let ploidy = self.partitions.ploidy();
        let mut remaining = index;
        for position in 0..self.entries.len() {
            let partition = remaining % ploidy;
            remaining /= ploidy;
            self.partitioning[position] = partition;
            let class = self.class_of(&self.entries[position], partition);
            for allele in 0..self.allele_count {
                self.penalties[class * self.allele_count + allele] +=
                    self.entries[position].penalty(allele) as u64;
            }
        }
    }

    /// Move one read to a new partition.
    pub fn update_partitioning(&mut self, position: usize, new_partition: usize) {
        let entry = &self.entries[position];
        let old_class = self.class_of(entry, self.partitioning[position]);
        let new_class = self.class_of(entry, new_partition);
        for allele in 0..self.allele_count {
            let penalty = entry.penalty(allele) as u64;
            self.penalties[old_class * self.allele_count + allele] -= penalty;
            self.penalties[new_class * self.allele_count + allele] += penalty;
        }
        self.partitioning[position] = new_partition;
    }

    /// Cost of one allele assignment (digits, one per class), or `None` if
    /// it violates a trusted genotype.
    fn assignment_cost(&self, digits: &[usize]) -> Option<u64> {
        let mut total: u64 = digits
            .iter()
            .enumerate()
            .map(|(class, &allele)| self.penalties[class * self.allele_count + allele])
            .sum();

        let ploidy = self.partitions.ploidy();
        let mut counts = vec![0u32; self.allele_count];
        for individual in 0..self.pedigree.size() {
            counts.fill(0);
            for slot in 0..ploidy {
                let class = self.partitions.haplotype_class(individual, slot);
                counts[digits[class]] += 1;
            }
            if self.distrust_genotypes {
                if let Some(likelihoods) = self
                    .pedigree
                    .genotype_likelihoods(individual, self.column_index)
                {
                    let implied = crate::data::Genotype::from_counts(&counts);
                    if let Some(cost) = likelihoods.cost(&implied).finite() {
                        total += cost as u64;
                    }
                }
            } else if let Some(genotype) = self.pedigree.genotype(individual, self.column_index) {
                if !genotype.matches_counts(&counts) {
                    return None;
                }
            }
        }
        Some(total)
    }

    fn next_assignment(&self, digits: &mut [usize]) -> bool {
        for digit in digits.iter_mut() {
            *digit += 1;
            if *digit < self.allele_count {
                return true;
            }
            *digit = 0;
        }
        false
    }

    /// Minimum cost over all consistent allele assignments, or
    /// `Cost::UNREACHABLE` if no assignment is consistent.
    pub fn cost(&self) -> Cost {
        let mut digits = vec![0usize; self.partitions.count()];
        let mut best = Cost::UNREACHABLE;
        for _ in 0..self.assignment_count {
            if let Some(cost) = self.assignment_cost(&digits) {
                let cost = Cost::from_u64(cost);
                if cost < best {
                    best = cost;
                }
            }
            if !self.next_assignment(&mut digits) {
                break;
            }
        }
        best
    }

    /// The allele of every local haplotype slot (`[individual][slot]`)
    /// under the cheapest consistent assignment.
    pub fn alleles(&self) -> Result<Vec<Vec<u8>>> {
        let mut digits = vec![0usize; self.partitions.count()];
        let mut best = Cost::UNREACHABLE;
        let mut best_digits: Option<Vec<usize>> = None;
        for _ in 0..self.assignment_count {
            if let Some(cost) = self.assignment_cost(&digits) {
                let cost = Cost::from_u64(cost);
                if cost < best {
                    best = cost;
                    best_digits = Some(digits.clone());
                }
            }
            if !self.next_assignment(&mut digits) {
                break;
            }
        }
        let digits = best_digits.ok_or(PedPhaseError::MendelianConflict)?;
        let ploidy = self.partitions.ploidy();
        Ok((0..self.pedigree.size())
            .map(|individual| {
                (0..ploidy)
                    .map(|slot| {
                        digits[self.partitions.haplotype_class(individual, slot)] as u8
                    })
                    .collect()
            })
            .collect())
    }
}
