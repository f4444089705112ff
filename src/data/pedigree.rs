//! # Pedigree Structure
//!
//! ## Role
//! Individuals, parent-offspring trios, and the per-site genotype
//! information the cost computer consults.
//!
//! Individuals are registered by sample ID and addressed by dense index.
//! A `Genotype` is an unordered allele multiset of size `ploidy`; its
//! `index()` is the colexicographic rank among all such multisets, which is
//! how `PhredGenotypeLikelihoods` vectors are addressed.

use std::collections::HashMap;

use crate::error::{PedPhaseError, Result};
use crate::utils::Cost;

fn binomial(n: u64, k: u64) -> u64 {
    if k > n {
        return 0;
    }
    let k = k.min(n - k);
    let mut result = 1u64;
    for i in 0..k {
        result = result * (n - i) / (i + 1);
    }
    result
}

/// An unordered allele multiset of size `ploidy`.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Genotype {
    alleles: Vec<u8>,
}

impl Genotype {
    /// Build a genotype; allele order is normalized.
    pub fn new(mut alleles: Vec<u8>) -> Self {
        alleles.sort_unstable();
        Genotype { alleles }
    }

    /// Shorthand for a diploid genotype.
    pub fn diploid(a: u8, b: u8) -> Self {
        Genotype::new(vec![a, b])
    }

    pub fn ploidy(&self) -> usize {
        self.alleles.len()
    }

    pub fn alleles(&self) -> &[u8] {
        &self.alleles
    }

    /// Colexicographic rank of this multiset among all allele multisets of
    /// the same size: `sum_i C(a_i + i, i + 1)` over the sorted alleles.
    /// For biallelic diploids this is simply the alternative-allele count.
    pub fn index(&self) -> usize {
        self.alleles
            .iter()
            .enumerate()
            .map(|(i, &a)| binomial(a as u64 + i as u64, i as u64 + 1))
            .sum::<u64>() as usize
    }

    /// Whether this genotype equals the multiset given as per-allele counts.
    pub fn matches_counts(&self, counts: &[u32]) -> bool {
        if counts.iter().map(|&c| c as usize).sum::<usize>() != self.alleles.len() {
            return false;
        }
        counts.iter().enumerate().all(|(a, &count)| {
            self.alleles.iter().filter(|&&x| x as usize == a).count() == count as usize
        })
    }

    /// Rebuild a genotype from per-allele counts.
    pub fn from_counts(counts: &[u32]) -> Self {
        let mut alleles = Vec::with_capacity(counts.iter().map(|&c| c as usize).sum());
        for (a, &count) in counts.iter().enumerate() {
            for _ in 0..count {
                alleles.push(a as u8);
            }
        }
        Genotype { alleles }
    }
}

/// Phred-scaled genotype costs for one individual at one site, addressed by
/// `Genotype::index()`. Consulted only when genotypes are distrusted.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PhredGenotypeLikelihoods {
    costs: Vec<u32>,
}

impl PhredGenotypeLikelihoods {
    pub fn new(costs: Vec<u32>) -> Self {
        PhredGenotypeLikelihoods { costs }
    }

    /// Cost of calling the given genotype; genotypes outside the stored
    /// range are free.
    pub fn cost(&self, genotype: &Genotype) -> Cost {
        Cost::new(self.costs.get(genotype.index()).copied().unwrap_or(0))
    }
}

/// A parent-offspring triple, by individual index.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Trio {
    pub father: usize,
    pub mother: usize,
    pub child: usize,
}

/// An ordered list of individuals plus parent-offspring trios.
#[derive(Clone, Debug, Default)]
pub struct Pedigree {
    ids: Vec<String>,
    index: HashMap<String, usize>,
    genotypes: Vec<Vec<Option<Genotype>>>,
    likelihoods: Vec<Vec<Option<PhredGenotypeLikelihoods>>>,
    trios: Vec<Trio>,
}

impl Pedigree {
    pub fn new() -> Self {
        Pedigree::default()
    }

    /// Register an individual with its per-column genotypes and optional
    /// genotype likelihoods. Returns the individual's dense index.
    ///
    /// A `None` genotype leaves the individual unconstrained at that column.
    pub fn add_individual(
        &mut self,
        id: impl Into<String>,
        genotypes: Vec<Option<Genotype>>,
        likelihoods: Vec<Option<PhredGenotypeLikelihoods>>,
    ) -> Result<usize> {
        let id = id.into();
        if self.index.contains_key(&id) {
            return Err(PedPhaseError::precondition(format!(
                "duplicate individual {id}"
            )));
        }
        let idx = self.ids.len();
        self.index.insert(id.clone(), idx);
        self.ids.push(id);
        self.genotypes.push(genotypes);
        self.likelihoods.push(likelihoods);
        Ok(idx)
    }

    /// Record a father/mother/child relationship between registered
    /// individuals.
    pub fn add_trio(&mut self, father: &str, mother: &str, child: &str) -> Result<()> {
        let resolve = |id: &str| {
            self.index
                .get(id)
                .copied()
                .ok_or_else(|| PedPhaseError::precondition(format!("unknown individual {id}")))
        };
        let trio = Trio {
            father: resolve(father)?,
            mother: resolve(mother)?,
            child: resolve(child)?,
        };
        self.trios.push(trio);
        Ok(())
    }

    pub fn size(&self) -> usize {
        self.ids.len()
    }

    pub fn triple_count(&self) -> usize {
        self.trios.len()
    }

    pub fn trios(&self) -> &[Trio] {
        &self.trios
    }

    pub fn id_to_index(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn index_to_id(&self, index: usize) -> &str {
        &self.ids[index]
    }

    pub fn genotype(&self, individual: usize, column: usize) -> Option<&Genotype> {
        self.genotypes
            .get(individual)
            .and_then(|g| g.get(column))
            .and_then(|g| g.as_ref())
    }

    pub fn genotype_likelihoods(
        &self,
        individual: usize,
        column: usize,
    ) -> Option<&PhredGenotypeLikelihoods> {
        self.likelihoods
            .get(individual)
            .and_then(|l| l.get(column))
            .and_then(|l| l.as_ref())
    }

    /// Structural sanity checks: each individual is the child of at most one
    /// trio, and the transmission graph is acyclic.
    pub fn validate(&self) -> Result<()> {
        let mut child_of = vec![None; self.size()];
        for (t, trio) in self.trios.iter().enumerate() {
            if trio.father == trio.child || trio.mother == trio.child {
                return Err(PedPhaseError::precondition(format!(
                    "individual {} is its own parent",
                    self.ids[trio.child]
                )));
            }
            if child_of[trio.child].is_some() {
                return Err(PedPhaseError::precondition(format!(
                    "individual {} is the child of more than one trio",
                    self.ids[trio.child]
                )));
            }
            child_of[trio.child] = Some(t);
        }
        // depth-first search over child -> parent edges; a gray node seen
        // again is a cycle
        let mut state = vec![0u8; self.size()];
        for start in 0..self.size() {
            if state[start] != 0 {
                continue;
            }
            state[start] = 1;
            let mut stack: Vec<(usize, usize)> = vec![(start, 0)];
            while let Some(&(node, edge)) = stack.last() {
                let trio_index = match child_of[node] {
                    Some(t) if edge < 2 => t,
                    _ => {
                        state[node] = 2;
                        stack.pop();
                        continue;
                    }
                };
                if let Some(top) = stack.last_mut() {
                    top.1 += 1;
                }
                let trio = self.trios[trio_index];
                let parent = if edge == 0 { trio.father } else { trio.mother };
                match state[parent] {
                    0 => {
                        state[parent] = 1;
                        stack.push((parent, 0));
                    }
                    1 => {
                        return Err(PedPhaseError::precondition(
                            "pedigree transmission graph contains a cycle",
                        ));
                    }
                    _ => {}
                }
            }
        }
        Ok(())
    }
}
