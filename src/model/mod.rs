//! # Model Module
//!
//! ## Role
//! The phasing algorithm itself, layered leaves-first:
//! - `partitions`: inheritance-pattern slot-to-class mapping
//! - `indexing`: per-column partitioning enumeration and projections
//! - `cost`: per-column disagreement cost under genotype constraints
//! - `dp`: the dynamic-programming engine and reconstruction

pub mod cost;
pub mod dp;
pub mod indexing;
pub mod partitions;

pub use cost::ColumnCostComputer;
pub use dp::PedigreePhaser;
pub use indexing::{ColumnIndexingIterator, ColumnIndexingScheme, IndexingStep};
pub use partitions::PedigreePartitions;
