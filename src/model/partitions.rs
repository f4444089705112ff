//! # Pedigree Partitions
//!
//! ## Role
//! For one inheritance pattern, maps every local haplotype slot
//! `(individual, partition)` to a global haplotype class. Two bits per trio
//! select which parental chromosome each parent transmitted; a child's slots
//! are thereby linked to parental slots, and linked slots collapse into one
//! class. Classes are numbered in first-occurrence slot order, so the
//! mapping is total, deterministic and pure.
//!
//! One instance per inheritance index is precomputed at engine start.

use crate::data::Pedigree;

#[derive(Clone, Debug)]
pub struct PedigreePartitions {
    ploidy: usize,
    classes: Vec<usize>,
    count: usize,
}

impl PedigreePartitions {
    /// Derive the slot-to-class mapping for `inheritance_index` in
    /// `[0, 4^triple_count)`.
    ///
    /// Trios require `ploidy == 2` (the engine enforces this); without
    /// trios any ploidy is supported and every slot is its own class.
    pub fn new(pedigree: &Pedigree, inheritance_index: usize, ploidy: usize) -> Self {
        let slots = pedigree.size() * ploidy;
        let mut link: Vec<usize> = (0..slots).collect();
        for (t, trio) in pedigree.trios().iter().enumerate() {
            let father_bit = (inheritance_index >> (2 * t)) & 1;
            let mother_bit = (inheritance_index >> (2 * t + 1)) & 1;
            link[trio.child * ploidy] = trio.father * ploidy + father_bit;
            link[trio.child * ploidy + 1] = trio.mother * ploidy + mother_bit;
        }

        let mut classes = vec![usize::MAX; slots];
        let mut class_of_root = vec![usize::MAX; slots];
        let mut count = 0;
        for slot in 0..slots {
            let mut root = slot;
            while link[root] != root {
                root = link[root];
            }
            if class_of_root[root] == usize::MAX {
                class_of_root[root] = count;
                count += 1;
            }
            classes[slot] = class_of_root[root];
        }

        PedigreePartitions {
            ploidy,
            classes,
            count,
        }
    }

    /// Number of distinct global haplotype classes.
    pub fn count(&self) -> usize {
        self.count
    }

    pub fn ploidy(&self) -> usize {
        self.ploidy
    }

    /// Global class of one local haplotype slot.
    #[inline]
    pub fn haplotype_class(&self, individual: usize, partition: usize) -> usize {
        self.classes[individual * self.ploidy + partition]
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trio_pedigree() -> Pedigree {
        let mut ped = Pedigree::new();
        ped.add_individual("father", vec![], vec![]).unwrap();
        ped.add_individual("mother", vec![], vec![]).unwrap();
        ped.add_individual("child", vec![], vec![]).unwrap();
        ped.add_trio("father", "mother", "child").unwrap();
        ped
    }

    #[test]
    fn test_founders_get_distinct_classes() {
        let mut ped = Pedigree::new();
        ped.add_individual("a", vec![], vec![]).unwrap();
        ped.add_individual("b", vec![], vec![]).unwrap();
        let parts = PedigreePartitions::new(&ped, 0, 2);
        assert_eq!(parts.count(), 4);
        let all: Vec<usize> = (0..2)
            .flat_map(|k| (0..2).map(move |j| (k, j)))
            .map(|(k, j)| parts.haplotype_class(k, j))
            .collect();
        assert_eq!(all, vec![0, 1, 2, 3]);
    }

    #[test]
    fn test_trio_collapses_child_slots() {
        let ped = trio_pedigree();
        for inheritance in 0..4 {
            let parts = PedigreePartitions::new(&ped, inheritance, 2);
            // 6 slots, child's two slots are inherited
            assert_eq!(parts.count(), 4);
            let father_bit = inheritance & 1;
            let mother_bit = (inheritance >> 1) & 1;
            assert_eq!(
                parts.haplotype_class(2, 0),
                parts.haplotype_class(0, father_bit)
            );
            assert_eq!(
                parts.haplotype_class(2, 1),
                parts.haplotype_class(1, mother_bit)
            );
            // untransmitted parental slots stay distinct
            assert_ne!(
                parts.haplotype_class(0, 0),
                parts.haplotype_class(0, 1)
            );
        }
    }

    #[test]
    fn test_grandparent_chain_follows_links() {
        let mut ped = Pedigree::new();
        ped.add_individual("gf", vec![], vec![]).unwrap();
        ped.add_individual("gm", vec![], vec![]).unwrap();
        ped.add_individual("father", vec![], vec![]).unwrap();
        ped.add_individual("mother", vec![], vec![]).unwrap();
        ped.add_individual("child", vec![], vec![]).unwrap();
        ped.add_trio("gf", "gm", "father").unwrap();
        ped.add_trio("father", "mother", "child").unwrap();

        // father transmits his paternal slot (bit 0 of trio 1 clear), which
        // is itself grandfather's slot 0 under inheritance 0
        let parts = PedigreePartitions::new(&ped, 0, 2);
        assert_eq!(parts.count(), 6);
        assert_eq!(
            parts.haplotype_class(4, 0),
            parts.haplotype_class(0, 0)
        );
    }

    #[test]
    fn test_higher_ploidy_without_trios() {
        let mut ped = Pedigree::new();
        ped.add_individual("only", vec![], vec![]).unwrap();
        let parts = PedigreePartitions::new(&ped, 0, 4);
        assert_eq!(parts.count(), 4);
        assert_eq!(parts.haplotype_class(0, 3), 3);
    }
}
