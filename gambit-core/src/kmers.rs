//! K-mer parameters and nucleotide encoding
//!
//! K-mers are located by a short literal prefix and indexed by the positional
//! base-4 encoding of the `k` nucleotides that follow it (A=0, C=1, G=2, T=3,
//! first base most significant).

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::{GambitError, GambitResult};

/// Largest supported k, so that `4^k` fits in a `u64`
pub const MAX_K: u32 = 31;

/// Parameters defining how k-mers are found and indexed
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "KmerSpecRepr", into = "KmerSpecRepr")]
pub struct KmerSpec {
    k: u32,
    prefix: Vec<u8>,
    prefix_rc: Vec<u8>,
}

/// Serialized form, validated on the way back in
#[derive(Serialize, Deserialize)]
struct KmerSpecRepr {
    k: u32,
    prefix: String,
}

impl KmerSpec {
    /// Create a new spec, validating `k` and the prefix alphabet
    pub fn new<P: AsRef<[u8]>>(k: u32, prefix: P) -> GambitResult<Self> {
        if k == 0 || k > MAX_K {
            return Err(GambitError::validation(format!(
                "k must be between 1 and {}, got {}",
                MAX_K, k
            )));
        }

        let prefix = prefix.as_ref().to_ascii_uppercase();
        if prefix.is_empty() {
            return Err(GambitError::validation("k-mer prefix must not be empty"));
        }
        if let Some(&bad) = prefix.iter().find(|&&b| encode_nucleotide(b).is_none()) {
            return Err(GambitError::validation(format!(
                "k-mer prefix contains invalid nucleotide {:?}",
                bad as char
            )));
        }

        let prefix_rc = revcomp(&prefix);
        Ok(Self { k, prefix, prefix_rc })
    }

    pub fn k(&self) -> u32 {
        self.k
    }

    pub fn prefix(&self) -> &[u8] {
        &self.prefix
    }

    pub fn prefix_str(&self) -> &str {
        // Validated as ACGT on construction
        std::str::from_utf8(&self.prefix).unwrap_or_default()
    }

    /// Reverse complement of the prefix
    pub fn prefix_rc(&self) -> &[u8] {
        &self.prefix_rc
    }

    pub fn prefix_len(&self) -> usize {
        self.prefix.len()
    }

    /// Length of prefix plus k-mer
    pub fn total_len(&self) -> usize {
        self.prefix.len() + self.k as usize
    }

    /// Size of the k-mer index space, `4^k`
    pub fn nkmers(&self) -> u64 {
        1u64 << (2 * self.k)
    }

    /// Largest valid k-mer index
    pub fn max_index(&self) -> u64 {
        self.nkmers() - 1
    }
}

impl fmt::Display for KmerSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "KmerSpec(k={}, prefix={})", self.k, self.prefix_str())
    }
}

impl TryFrom<KmerSpecRepr> for KmerSpec {
    type Error = GambitError;

    fn try_from(repr: KmerSpecRepr) -> Result<Self, Self::Error> {
        KmerSpec::new(repr.k, repr.prefix)
    }
}

impl From<KmerSpec> for KmerSpecRepr {
    fn from(spec: KmerSpec) -> Self {
        KmerSpecRepr {
            k: spec.k,
            prefix: spec.prefix_str().to_string(),
        }
    }
}

/// Encode a nucleotide to 2-bit representation
pub fn encode_nucleotide(nucleotide: u8) -> Option<u64> {
    match nucleotide.to_ascii_uppercase() {
        b'A' => Some(0),
        b'C' => Some(1),
        b'G' => Some(2),
        b'T' => Some(3),
        _ => None,
    }
}

/// Get complement of a single nucleotide, preserving case
pub fn complement_nucleotide(nucleotide: u8) -> u8 {
    match nucleotide {
        b'A' => b'T',
        b'T' => b'A',
        b'C' => b'G',
        b'G' => b'C',
        b'a' => b't',
        b't' => b'a',
        b'c' => b'g',
        b'g' => b'c',
        _ => nucleotide,
    }
}

/// Reverse complement of a sequence
pub fn revcomp(sequence: &[u8]) -> Vec<u8> {
    sequence
        .iter()
        .rev()
        .map(|&nucleotide| complement_nucleotide(nucleotide))
        .collect()
}

/// Index of a k-mer, or `None` if it contains a non-ACGT character
pub fn kmer_to_index(kmer: &[u8]) -> Option<u64> {
    kmer.iter()
        .try_fold(0u64, |index, &nuc| Some((index << 2) | encode_nucleotide(nuc)?))
}

/// Index of the reverse complement of a k-mer, without building it
pub fn kmer_to_index_rc(kmer: &[u8]) -> Option<u64> {
    kmer.iter()
        .rev()
        .try_fold(0u64, |index, &nuc| Some((index << 2) | (3 - encode_nucleotide(nuc)?)))
}

/// Upper case k-mer for an index
pub fn index_to_kmer(index: u64, k: u32) -> Vec<u8> {
    const NUCLEOTIDES: [u8; 4] = [b'A', b'C', b'G', b'T'];

    (0..k)
        .rev()
        .map(|i| NUCLEOTIDES[((index >> (2 * i)) & 3) as usize])
        .collect()
}
