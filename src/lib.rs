//! # Pedphase Library
//!
//! Pedigree-aware haplotype phasing by dynamic programming. Given allele
//! observations from sequencing reads, per-column recombination costs and a
//! pedigree, the engine assigns every read to a haplotype partition and
//! every trio an inheritance pattern so that disagreement plus
//! recombination cost is minimal, then reconstructs the phased super-reads.
//!
//! ## Modules
//! - `data`: In-memory representations of reads, pedigrees and columns
//! - `error`: Error types and result aliases
//! - `model`: Partitions, column indexing, cost computation, the DP engine
//! - `utils`: Cost arithmetic and dense 2-D tables

pub mod data;
pub mod error;
pub mod model;
pub mod utils;

// Re-export commonly used types
pub use data::{ColumnIterator, Entry, Genotype, Pedigree, PhredGenotypeLikelihoods, Read, ReadSet, ReadVariant, Trio};
pub use error::{PedPhaseError, Result};
pub use model::{ColumnCostComputer, ColumnIndexingScheme, PedigreePartitions, PedigreePhaser};
pub use utils::{Cost, Table2};
