//! # Column Access
//!
//! ## Role
//! The vertical view of a read set: for every requested site, the ordered
//! list of allele observations from reads covering that site. The engine
//! re-scans columns several times (forward sweep, checkpoint recomputation
//! during backtrace, super-read reconstruction), so the per-column entry
//! lists are indexed eagerly and served by column number.

use std::collections::HashMap;

use crate::data::read::{ReadSet, ReadVariant};

/// One observation inside a column: the owning read and its variant.
#[derive(Clone, Copy, Debug)]
pub struct Entry<'a> {
    read_id: u32,
    variant: &'a ReadVariant,
}

impl<'a> Entry<'a> {
    pub fn read_id(&self) -> u32 {
        self.read_id
    }

    pub fn variant(&self) -> &'a ReadVariant {
        self.variant
    }

    pub fn allele(&self) -> u8 {
        self.variant.allele()
    }

    /// Penalty for placing the owning read on a haplotype carrying `allele`.
    #[inline]
    pub fn penalty(&self, allele: usize) -> u32 {
        self.variant.penalty(allele)
    }
}

/// Random-access column index over a read set for an ordered position list.
///
/// Entries within a column are ordered by read ID; positions covered by no
/// read form empty columns. Read variants at positions outside the list are
/// ignored.
#[derive(Debug)]
pub struct ColumnIterator<'a> {
    positions: &'a [u32],
    columns: Vec<Vec<Entry<'a>>>,
}

impl<'a> ColumnIterator<'a> {
    pub fn new(read_set: &'a ReadSet, positions: &'a [u32]) -> Self {
        let slot: HashMap<u32, usize> = positions
            .iter()
            .enumerate()
            .map(|(c, &p)| (p, c))
            .collect();
        let mut columns: Vec<Vec<Entry<'a>>> = vec![Vec::new(); positions.len()];
        for read in read_set.iter() {
            for variant in read.variants() {
                if let Some(&c) = slot.get(&variant.position()) {
                    columns[c].push(Entry {
                        read_id: read.id(),
                        variant,
                    });
                }
            }
        }
        for column in &mut columns {
            column.sort_by_key(|e| e.read_id);
        }
        ColumnIterator { positions, columns }
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn positions(&self) -> &'a [u32] {
        self.positions
    }

    pub fn column(&self, index: usize) -> &[Entry<'a>] {
        &self.columns[index]
    }

    /// The IDs of reads active in a column, in column (read-ID) order.
    pub fn read_ids(&self, index: usize) -> Vec<u32> {
        self.columns[index].iter().map(|e| e.read_id).collect()
    }
}
