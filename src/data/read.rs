//! # Reads and Read Sets
//!
//! ## Role
//! In-memory representation of sequencing-read allele observations, the
//! horizontal input of the phasing problem. A `Read` carries its identity,
//! the sample it was drawn from, and one `ReadVariant` per covered site.
//!
//! A variant stores a per-allele penalty vector: `qualities[a]` is the
//! phred-scaled cost of placing this read on a haplotype that carries
//! allele `a` at the site. For a plain observation this is zero at the
//! observed allele and the observation quality everywhere else.

/// One allele observation of a read at a genomic position.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ReadVariant {
    position: u32,
    allele: u8,
    qualities: Vec<u32>,
}

impl ReadVariant {
    /// Create a variant from an explicit per-allele penalty vector.
    pub fn new(position: u32, allele: u8, qualities: Vec<u32>) -> Self {
        ReadVariant {
            position,
            allele,
            qualities,
        }
    }

    /// Create a variant from a single observation: zero penalty for the
    /// observed allele, `quality` for each of the other `allele_count - 1`.
    pub fn observed(position: u32, allele: u8, quality: u32, allele_count: usize) -> Self {
        let qualities = (0..allele_count)
            .map(|a| if a == allele as usize { 0 } else { quality })
            .collect();
        ReadVariant {
            position,
            allele,
            qualities,
        }
    }

    pub fn position(&self) -> u32 {
        self.position
    }

    pub fn allele(&self) -> u8 {
        self.allele
    }

    pub fn qualities(&self) -> &[u32] {
        &self.qualities
    }

    /// Penalty for placing this read on a haplotype carrying `allele`.
    #[inline]
    pub fn penalty(&self, allele: usize) -> u32 {
        self.qualities.get(allele).copied().unwrap_or(0)
    }
}

/// A sequencing read: identity, sample ownership and covered variants.
#[derive(Clone, Debug)]
pub struct Read {
    id: u32,
    name: String,
    sample: String,
    variants: Vec<ReadVariant>,
}

impl Read {
    pub fn new(name: impl Into<String>, sample: impl Into<String>) -> Self {
        Read {
            id: 0,
            name: name.into(),
            sample: sample.into(),
            variants: Vec::new(),
        }
    }

    pub fn id(&self) -> u32 {
        self.id
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn sample(&self) -> &str {
        &self.sample
    }

    pub fn variants(&self) -> &[ReadVariant] {
        &self.variants
    }

    pub fn add_variant(&mut self, variant: ReadVariant) {
        self.variants.push(variant);
    }
}

/// An ordered collection of reads.
#[derive(Clone, Debug, Default)]
pub struct ReadSet {
    reads: Vec<Read>,
}

impl ReadSet {
    pub fn new() -> Self {
        ReadSet { reads: Vec::new() }
    }

    pub fn add(&mut self, read: Read) {
        self.reads.push(read);
    }

    pub fn len(&self) -> usize {
        self.reads.len()
    }

    pub fn is_empty(&self) -> bool {
        self.reads.is_empty()
    }

    pub fn get(&self, index: usize) -> &Read {
        &self.reads[index]
    }

    pub fn iter(&self) -> impl Iterator<Item = &Read> {
        self.reads.iter()
    }

    /// Renumber read IDs densely in `[0, len)` in container order.
    pub fn reassign_read_ids(&mut self) {
        for (i, read) in self.reads.iter_mut().enumerate() {
            read.id = i as u32;
        }
    }

    /// Whether read IDs equal container positions, as the engine requires.
    pub fn has_dense_ids(&self) -> bool {
        self.reads.iter().enumerate().all(|(i, r)| r.id == i as u32)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_observed_penalties() {
        let v = ReadVariant::observed(100, 1, 17, 3);
        assert_eq!(v.qualities(), &[17, 0, 17]);
        assert_eq!(v.penalty(0), 17);
        assert_eq!(v.penalty(1), 0);
        assert_eq!(v.penalty(2), 17);
    }

    #[test]
    fn test_reassign_read_ids() {
        let mut rs = ReadSet::new();
        rs.add(Read::new("r0", "s"));
        rs.add(Read::new("r1", "s"));
        rs.add(Read::new("r2", "s"));
        rs.reassign_read_ids();
        assert!(rs.has_dense_ids());

        // rebuilding in a different order breaks density until reassignment
        let mut rs2 = ReadSet::new();
        rs2.add(rs.get(2).clone());
        rs2.add(rs.get(0).clone());
        assert!(!rs2.has_dense_ids());
        rs2.reassign_read_ids();
        assert!(rs2.has_dense_ids());
        assert_eq!(rs2.get(0).name(), "r2");
        assert_eq!(rs2.get(0).id(), 0);
    }
}
