//! # Pedigree Phasing DP Engine
//!
//! ## Role
//! Chooses, for every column, a read-to-partition assignment and an
//! inheritance pattern for each trio so that per-column disagreement cost
//! plus per-transition recombination cost is minimal, then reconstructs the
//! phased super-reads and the transmission vector.
//!
//! ## Key Concepts
//! - The per-column state space is `ploidy^reads x 4^triples`; partitions
//!   are walked by the Gray-code iterator so every inheritance pattern's
//!   cost computer updates in O(`allele_count`) per step.
//! - The transition between inheritance patterns `i` and `j` costs
//!   `popcount(i XOR j) * recombcost[c]`: each differing bit is one meiotic
//!   recombination in one parent of one triple.
//! - Backtrace memory is kept at O(sqrt(columns)) live columns: projection
//!   and backtrace tables survive only at checkpoint columns and are
//!   recomputed (idempotently) from the nearest checkpoint when the
//!   backward sweep needs them.

use tracing::debug;

use crate::data::{ColumnIterator, Pedigree, Read, ReadSet, ReadVariant};
use crate::error::{PedPhaseError, Result};
use crate::model::cost::ColumnCostComputer;
use crate::model::indexing::{ColumnIndexingScheme, IndexingStep};
use crate::model::partitions::PedigreePartitions;
use crate::utils::{Cost, Table2};

/// Quality assigned to the non-chosen alleles of a super-read entry.
const SUPERREAD_DEFAULT_QUALITY: u32 = 10;

/// The chosen solution for one column.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
struct PathNode {
    index: usize,
    inheritance: usize,
}

/// Pedigree-aware haplotype phaser.
///
/// Construction validates the inputs and runs the full dynamic program (or
/// the precomputed-partitioning shortcut); accessors read off the solution.
pub struct PedigreePhaser<'a> {
    read_set: &'a ReadSet,
    recombcost: &'a [u32],
    pedigree: &'a Pedigree,
    ploidy: usize,
    distrust_genotypes: bool,
    allele_counts: &'a [u32],
    columns: ColumnIterator<'a>,
    transmission_configurations: usize,
    pedigree_partitions: Vec<PedigreePartitions>,
    read_sources: Vec<usize>,
    indexers: Vec<ColumnIndexingScheme>,
    projection_columns: Vec<Option<Table2<Cost>>>,
    index_backtraces: Vec<Option<Table2<usize>>>,
    transmission_backtraces: Vec<Option<Table2<usize>>>,
    index_path: Vec<PathNode>,
    checkpoint_stride: usize,
    optimal_score: Cost,
    optimal_score_index: usize,
    optimal_transmission_value: usize,
    previous_transmission_value: usize,
}

impl<'a> PedigreePhaser<'a> {
    /// Phase a read set against a pedigree.
    ///
    /// # Arguments
    /// * `read_set` - reads with dense IDs (`reassign_read_ids` first)
    /// * `recombcost` - per-column recombination penalty, one per column
    /// * `pedigree` - individuals and trios; every read's sample must
    ///   resolve against it
    /// * `ploidy` - haplotypes per individual (2 whenever trios exist)
    /// * `distrust_genotypes` - genotypes as soft (surcharged) instead of
    ///   hard constraints
    /// * `allele_counts` - per-column distinct allele counts
    /// * `positions` - strictly increasing column positions
    /// * `precomputed_partitioning` - optional per-read partition values;
    ///   skips the sweeps and only scores the given assignment
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        read_set: &'a ReadSet,
        recombcost: &'a [u32],
        pedigree: &'a Pedigree,
        ploidy: u32,
        distrust_genotypes: bool,
        allele_counts: &'a [u32],
        positions: &'a [u32],
        precomputed_partitioning: Option<&[u32]>,
    ) -> Result<Self> {
        validate_inputs(
            read_set,
            recombcost,
            pedigree,
            ploidy,
            allele_counts,
            positions,
            precomputed_partitioning,
        )?;

        let triple_count = pedigree.triple_count();
        let transmission_configurations =
            4usize.checked_pow(triple_count as u32).ok_or_else(|| {
                PedPhaseError::precondition(format!(
                    "4^{triple_count} inheritance patterns do not fit in usize"
                ))
            })?;
        let pedigree_partitions: Vec<PedigreePartitions> = (0..transmission_configurations)
            .map(|i| PedigreePartitions::new(pedigree, i, ploidy as usize))
            .collect();

        let read_sources = read_set
            .iter()
            .map(|read| {
                pedigree.id_to_index(read.sample()).ok_or_else(|| {
                    PedPhaseError::precondition(format!(
                        "read {} has sample {} which is not in the pedigree",
                        read.name(),
                        read.sample()
                    ))
                })
            })
            .collect::<Result<Vec<usize>>>()?;

        let columns = ColumnIterator::new(read_set, positions);
        let column_count = columns.column_count();

        let mut phaser = PedigreePhaser {
            read_set,
            recombcost,
            pedigree,
            ploidy: ploidy as usize,
            distrust_genotypes,
            allele_counts,
            columns,
            transmission_configurations,
            pedigree_partitions,
            read_sources,
            indexers: Vec::new(),
            projection_columns: (0..column_count).map(|_| None).collect(),
            index_backtraces: (0..column_count).map(|_| None).collect(),
            transmission_backtraces: (0..column_count).map(|_| None).collect(),
            index_path: Vec::new(),
            checkpoint_stride: 1,
            optimal_score: Cost::ZERO,
            optimal_score_index: 0,
            optimal_transmission_value: 0,
            previous_transmission_value: 0,
        };

        match precomputed_partitioning {
            None => phaser.compute_table()?,
            Some(partitioning) => phaser.score_fixed_partitioning(partitioning)?,
        }
        Ok(phaser)
    }

    /// The minimum aggregate cost.
    pub fn optimal_score(&self) -> u32 {
        // finite by construction: an unreachable optimum aborts `new`
        self.optimal_score.finite().unwrap_or(u32::MAX)
    }

    /// The chosen partition of every read, in read-ID order.
    pub fn optimal_partitioning(&self) -> Vec<u32> {
        let mut partitioning = vec![0u32; self.read_set.len()];
        for (column_index, node) in self.index_path.iter().enumerate() {
            let mut index = node.index;
            for entry in self.columns.column(column_index) {
                partitioning[entry.read_id() as usize] = (index % self.ploidy) as u32;
                index /= self.ploidy;
            }
        }
        partitioning
    }

    /// Reconstruct the phased super-reads (one read set per individual,
    /// `ploidy` super-reads each) and the transmission vector.
    pub fn superreads(&self) -> Result<(Vec<ReadSet>, Vec<usize>)> {
        let mut superreads: Vec<Vec<Read>> = (0..self.pedigree.size())
            .map(|individual| {
                (0..self.ploidy)
                    .map(|slot| {
                        Read::new(
                            format!("superread_{slot}_{individual}"),
                            self.pedigree.index_to_id(individual),
                        )
                    })
                    .collect()
            })
            .collect();
        let mut transmission_vector = Vec::with_capacity(self.index_path.len());

        for (column_index, node) in self.index_path.iter().enumerate() {
            let entries = self.columns.column(column_index);
            let allele_count = self.allele_counts[column_index] as usize;
            let mut computer = ColumnCostComputer::new(
                entries,
                column_index,
                &self.read_sources,
                self.pedigree,
                &self.pedigree_partitions[node.inheritance],
                self.distrust_genotypes,
                allele_count,
            )?;
            computer.set_partitioning(node.index);
            let alleles = computer.alleles()?;

            let position = self.columns.positions()[column_index];
            for (individual, slots) in alleles.iter().enumerate() {
                for (slot, &allele) in slots.iter().enumerate() {
                    let mut qualities = vec![SUPERREAD_DEFAULT_QUALITY; allele_count];
                    qualities[allele as usize] = 0;
                    superreads[individual][slot]
                        .add_variant(ReadVariant::new(position, allele, qualities));
                }
            }
            transmission_vector.push(node.inheritance);
        }

        let output = superreads
            .into_iter()
            .map(|reads| {
                let mut set = ReadSet::new();
                for read in reads {
                    set.add(read);
                }
                set.reassign_read_ids();
                set
            })
            .collect();
        Ok((output, transmission_vector))
    }

    /// Forward sweep, then backward sweep.
    fn compute_table(&mut self) -> Result<()> {
        let column_count = self.columns.column_count();
        if column_count == 0 {
            self.optimal_score = Cost::ZERO;
            return Ok(());
        }
        self.optimal_score = Cost::UNREACHABLE;

        // build the indexing schemes, wiring each to its successor
        let mut indexers: Vec<ColumnIndexingScheme> = Vec::with_capacity(column_count);
        for column_index in 0..column_count {
            let read_ids = self.columns.read_ids(column_index);
            let scheme = if let Some(previous) = indexers.last() {
                ColumnIndexingScheme::with_predecessor(previous, read_ids, self.ploidy)?
            } else {
                ColumnIndexingScheme::new(read_ids, self.ploidy)?
            };
            if let Some(previous) = indexers.last_mut() {
                previous.wire_next(scheme.read_ids())?;
            }
            indexers.push(scheme);
        }
        for column_index in 1..column_count {
            if indexers[column_index - 1].forward_projection_size()
                != indexers[column_index].backward_projection_size()
            {
                return Err(PedPhaseError::invariant(format!(
                    "projection size mismatch between columns {} and {}",
                    column_index - 1,
                    column_index
                )));
            }
        }
        self.indexers = indexers;

        let stride = ((column_count as f64).sqrt().floor() as usize).max(1);
        self.checkpoint_stride = stride;
        debug!(
            column_count,
            transmission_configurations = self.transmission_configurations,
            checkpoint_stride = stride,
            "starting forward sweep"
        );

        for column_index in 0..column_count {
            self.compute_column(column_index)?;
            // release the previous column unless it is a checkpoint
            if stride > 1 && column_index > 0 && (column_index - 1) % stride != 0 {
                self.release_column(column_index - 1);
            }
        }

        if !self.optimal_score.is_finite() {
            return Err(PedPhaseError::MendelianConflict);
        }
        self.backtrace()
    }

    /// Backward sweep over the sparse table, recomputing dropped columns
    /// from their nearest checkpoint.
    fn backtrace(&mut self) -> Result<()> {
        let column_count = self.columns.column_count();
        let stride = self.checkpoint_stride;
        self.index_path = vec![PathNode::default(); column_count];

        let mut node = PathNode {
            index: self.optimal_score_index,
            inheritance: self.optimal_transmission_value,
        };
        let mut previous_inheritance = self.previous_transmission_value;
        self.index_path[column_count - 1] = node;

        for column_index in (1..column_count).rev() {
            if self.projection_columns[column_index - 1].is_none() {
                let checkpoint = (column_index - 1) / stride * stride;
                if self.projection_columns[checkpoint].is_none() {
                    return Err(PedPhaseError::invariant(format!(
                        "checkpoint column {checkpoint} missing during backtrace"
                    )));
                }
                debug!(
                    from = checkpoint + 1,
                    to = column_index - 1,
                    "recomputing dropped columns for backtrace"
                );
                for recompute in checkpoint + 1..column_index {
                    self.compute_column(recompute)?;
                }
            }

            let backtrace_index =
                self.indexers[column_index].backward_projection_of(node.index);
            let index_backtrace = self.index_backtraces[column_index - 1]
                .as_ref()
                .ok_or_else(|| {
                    PedPhaseError::invariant(format!(
                        "index backtrace table {} missing",
                        column_index - 1
                    ))
                })?;
            let transmission_backtrace = self.transmission_backtraces[column_index - 1]
                .as_ref()
                .ok_or_else(|| {
                    PedPhaseError::invariant(format!(
                        "transmission backtrace table {} missing",
                        column_index - 1
                    ))
                })?;

            let previous_index = index_backtrace.at(backtrace_index, previous_inheritance);
            if previous_index == usize::MAX {
                return Err(PedPhaseError::invariant(format!(
                    "backtrace consulted an unreached projection slot in column {}",
                    column_index - 1
                )));
            }
            node = PathNode {
                index: previous_index,
                inheritance: previous_inheritance,
            };
            previous_inheritance =
                transmission_backtrace.at(backtrace_index, node.inheritance);
            self.index_path[column_index - 1] = node;

            // free the checkpoint block once traversed
            if column_index % stride == 0 {
                for release in column_index..(column_index + stride).min(column_count - 1) {
                    self.release_column(release);
                }
            }
        }
        Ok(())
    }

    /// Forward computation of one column: fill its DP cells and, unless it
    /// is the last column, its projection and backtrace tables.
    ///
    /// Recomputation is idempotent: a second run writes bit-identical
    /// tables, which the backward sweep relies on.
    fn compute_column(&mut self, column_index: usize) -> Result<()> {
        let column_count = self.columns.column_count();
        // already materialized (checkpoint or still live)
        if self.projection_columns[column_index].is_some() {
            return Ok(());
        }

        let indexer = &self.indexers[column_index];
        let entries = self.columns.column(column_index);
        let configurations = self.transmission_configurations;
        let is_last = column_index + 1 == column_count;
        let allele_count = self.allele_counts[column_index] as usize;

        let mut dp_column = Table2::new(indexer.column_size(), configurations, Cost::ZERO);
        let previous_projection = if column_index > 0 {
            Some(
                self.projection_columns[column_index - 1]
                    .as_ref()
                    .ok_or_else(|| {
                        PedPhaseError::invariant(format!(
                            "projection table {} missing while computing column {}",
                            column_index - 1,
                            column_index
                        ))
                    })?,
            )
        } else {
            None
        };

        let mut projection_column = (!is_last).then(|| {
            Table2::new(
                indexer.forward_projection_size(),
                configurations,
                Cost::UNREACHABLE,
            )
        });
        let mut index_backtrace = (!is_last).then(|| {
            Table2::new(indexer.forward_projection_size(), configurations, usize::MAX)
        });
        let mut transmission_backtrace = (!is_last).then(|| {
            Table2::new(indexer.forward_projection_size(), configurations, usize::MAX)
        });

        let mut cost_computers = (0..configurations)
            .map(|i| {
                ColumnCostComputer::new(
                    entries,
                    column_index,
                    &self.read_sources,
                    self.pedigree,
                    &self.pedigree_partitions[i],
                    self.distrust_genotypes,
                    allele_count,
                )
            })
            .collect::<Result<Vec<_>>>()?;

        let recombination = self.recombcost[column_index] as u64;
        let mut min_recomb_index = vec![0usize; configurations];
        let mut column_has_finite_cost = false;
        let mut optimal_score = self.optimal_score;
        let mut optimal_score_index = self.optimal_score_index;
        let mut optimal_transmission_value = self.optimal_transmission_value;
        let mut previous_transmission_value = self.previous_transmission_value;

        let mut iterator = indexer.iter();
        while iterator.has_next() {
            match iterator.advance() {
                IndexingStep::Fresh => {
                    let index = iterator.index();
                    for computer in &mut cost_computers {
                        computer.set_partitioning(index);
                    }
                }
                IndexingStep::Delta {
                    position,
                    partition,
                } => {
                    for computer in &mut cost_computers {
                        computer.update_partitioning(position, partition);
                    }
                }
            }
            let current_index = iterator.index();
            let backward_projection_index = iterator.backward_projection();

            for i in 0..configurations {
                let current_cost = cost_computers[i].cost();
                if current_cost.is_finite() {
                    column_has_finite_cost = true;
                }
                let (minimum, minimum_index) = match previous_projection {
                    None => (current_cost, 0),
                    Some(previous) => {
                        let mut minimum = Cost::UNREACHABLE;
                        let mut minimum_index = 0;
                        for j in 0..configurations {
                            let previous_cost = previous.at(backward_projection_index, j);
                            let recombinations = (i ^ j).count_ones() as u64;
                            let candidate = current_cost
                                + previous_cost
                                + Cost::from_u64(recombinations * recombination);
                            if candidate < minimum {
                                minimum = candidate;
                                minimum_index = j;
                            }
                        }
                        (minimum, minimum_index)
                    }
                };
                dp_column.set(current_index, i, minimum);
                min_recomb_index[i] = minimum_index;
            }

            if is_last {
                for i in 0..configurations {
                    let cell = dp_column.at(current_index, i);
                    if cell < optimal_score {
                        optimal_score = cell;
                        optimal_score_index = current_index;
                        optimal_transmission_value = i;
                        previous_transmission_value = min_recomb_index[i];
                    }
                }
            } else {
                let forward_index = iterator.forward_projection();
                let projection = projection_column.as_mut().ok_or_else(|| {
                    PedPhaseError::invariant("forward projection table absent mid-column")
                })?;
                let index_table = index_backtrace.as_mut().ok_or_else(|| {
                    PedPhaseError::invariant("index backtrace table absent mid-column")
                })?;
                let transmission_table = transmission_backtrace.as_mut().ok_or_else(|| {
                    PedPhaseError::invariant("transmission backtrace table absent mid-column")
                })?;
                for i in 0..configurations {
                    let cell = dp_column.at(current_index, i);
                    if cell < projection.at(forward_index, i) {
                        projection.set(forward_index, i, cell);
                        index_table.set(forward_index, i, current_index);
                        transmission_table.set(forward_index, i, min_recomb_index[i]);
                    }
                }
            }
        }

        if !column_has_finite_cost {
            return Err(PedPhaseError::MendelianConflict);
        }

        if is_last {
            self.optimal_score = optimal_score;
            self.optimal_score_index = optimal_score_index;
            self.optimal_transmission_value = optimal_transmission_value;
            self.previous_transmission_value = previous_transmission_value;
        } else {
            self.projection_columns[column_index] = projection_column;
            self.index_backtraces[column_index] = index_backtrace;
            self.transmission_backtraces[column_index] = transmission_backtrace;
        }
        Ok(())
    }

    fn release_column(&mut self, column_index: usize) {
        self.projection_columns[column_index] = None;
        self.index_backtraces[column_index] = None;
        self.transmission_backtraces[column_index] = None;
    }

    /// Precomputed-partitioning shortcut: pack the given per-read partition
    /// values into an index per column, fix the inheritance pattern to 0,
    /// and accumulate the column costs.
    fn score_fixed_partitioning(&mut self, partitioning: &[u32]) -> Result<()> {
        let column_count = self.columns.column_count();
        self.index_path = Vec::with_capacity(column_count);
        self.optimal_score = Cost::ZERO;

        for column_index in 0..column_count {
            let entries = self.columns.column(column_index);
            self.ploidy
                .checked_pow(entries.len() as u32)
                .ok_or_else(|| {
                    PedPhaseError::precondition(format!(
                        "partitioning space {}^{} does not fit in usize; column coverage too high",
                        self.ploidy,
                        entries.len()
                    ))
                })?;
            let mut index = 0usize;
            let mut weight = 1usize;
            for entry in entries {
                index += partitioning[entry.read_id() as usize] as usize * weight;
                weight = weight.saturating_mul(self.ploidy);
            }
            let node = PathNode {
                index,
                inheritance: 0,
            };

            let mut computer = ColumnCostComputer::new(
                entries,
                column_index,
                &self.read_sources,
                self.pedigree,
                &self.pedigree_partitions[node.inheritance],
                self.distrust_genotypes,
                self.allele_counts[column_index] as usize,
            )?;
            computer.set_partitioning(node.index);
            let cost = computer.cost();
            if !cost.is_finite() {
                return Err(PedPhaseError::MendelianConflict);
            }
            self.optimal_score = self.optimal_score + cost;
            self.index_path.push(node);
        }
        Ok(())
    }
}

fn validate_inputs(
    read_set: &ReadSet,
    recombcost: &[u32],
    pedigree: &Pedigree,
    ploidy: u32,
    allele_counts: &[u32],
    positions: &[u32],
    precomputed_partitioning: Option<&[u32]>,
) -> Result<()> {
    if ploidy == 0 {
        return Err(PedPhaseError::precondition("ploidy must be positive"));
    }
    if positions.len() != recombcost.len() || positions.len() != allele_counts.len() {
        return Err(PedPhaseError::precondition(format!(
            "per-column input lengths disagree: {} positions, {} recombination costs, {} allele counts",
            positions.len(),
            recombcost.len(),
            allele_counts.len()
        )));
    }
    if !positions.windows(2).all(|w| w[0] < w[1]) {
        return Err(PedPhaseError::precondition(
            "positions must be strictly increasing",
        ));
    }
    if let Some(&bad) = allele_counts.iter().find(|&&n| n < 2) {
        return Err(PedPhaseError::precondition(format!(
            "allele counts must be at least 2, found {bad}"
        )));
    }
    if pedigree.triple_count() > 0 && ploidy != 2 {
        return Err(PedPhaseError::precondition(
            "pedigrees with trios require ploidy 2",
        ));
    }
    pedigree.validate()?;
    if !read_set.has_dense_ids() {
        return Err(PedPhaseError::precondition(
            "read IDs must be dense; call reassign_read_ids first",
        ));
    }
    if let Some(partitioning) = precomputed_partitioning {
        if partitioning.len() != read_set.len() {
            return Err(PedPhaseError::precondition(format!(
                "precomputed partitioning covers {} reads, read set has {}",
                partitioning.len(),
                read_set.len()
            )));
        }
        if let Some(&bad) = partitioning.iter().find(|&&p| p >= ploidy) {
            return Err(PedPhaseError::precondition(format!(
                "precomputed partition {bad} is outside [0, {ploidy})"
            )));
        }
    }

    // per-column observation sanity
    let column_of: std::collections::HashMap<u32, usize> = positions
        .iter()
        .enumerate()
        .map(|(c, &p)| (p, c))
        .collect();
    for read in read_set.iter() {
        let mut seen = std::collections::HashSet::new();
        for variant in read.variants() {
            if let Some(&column) = column_of.get(&variant.position()) {
                if !seen.insert(column) {
                    return Err(PedPhaseError::precondition(format!(
                        "read {} has multiple observations at position {}",
                        read.name(),
                        variant.position()
                    )));
                }
                let allele_count = allele_counts[column] as usize;
                if variant.allele() as usize >= allele_count {
                    return Err(PedPhaseError::precondition(format!(
                        "read {} observes allele {} at position {} which allows {} alleles",
                        read.name(),
                        variant.allele(),
                        variant.position(),
                        allele_count
                    )));
                }
                if variant.qualities().len() < allele_count {
                    return Err(PedPhaseError::precondition(format!(
                        "read {} carries {} allele penalties at position {}, expected {}",
                        read.name(),
                        variant.qualities().len(),
                        variant.position(),
                        allele_count
                    )));
                }
            }
        }
    }
    Ok(())
}
