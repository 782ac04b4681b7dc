//! Conversion between sparse and dense signature representations

use bitvec::prelude::*;

use super::index::IndexInt;
use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;

/// Dense signature: one bit per possible k-mer
pub type DenseSignature = BitVec<u64, Lsb0>;

/// Largest k-mer space that can be expanded into a dense signature (k = 16)
pub const MAX_DENSE_KMERS: u64 = 1 << 32;

/// Expand a sparse signature into a bit vector of length `4^k`
///
/// Fails with a validation error when `4^k` exceeds [`MAX_DENSE_KMERS`].
pub fn sparse_to_dense<T: IndexInt>(kmerspec: &KmerSpec, sparse: &[T]) -> GambitResult<DenseSignature> {
    let nkmers = usize::try_from(kmerspec.nkmers())
        .ok()
        .filter(|&n| n as u64 <= MAX_DENSE_KMERS && n <= BitSlice::<u64, Lsb0>::MAX_BITS)
        .ok_or_else(|| GambitError::validation(format!("{} is too large for a dense signature", kmerspec)))?;

    let mut dense = bitvec![u64, Lsb0; 0; nkmers];
    for &value in sparse {
        let index = value
            .try_to_u64()
            .and_then(|v| usize::try_from(v).ok())
            .filter(|&v| v < nkmers)
            .ok_or_else(|| GambitError::validation(format!("k-mer index {:?} out of range for {}", value, kmerspec)))?;
        dense.set(index, true);
    }

    Ok(dense)
}

/// Sorted indices of the set bits of a dense signature
pub fn dense_to_sparse(dense: &BitSlice<u64, Lsb0>) -> Vec<u64> {
    dense.iter_ones().map(|i| i as u64).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dense_conversion() {
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let sparse: Vec<u16> = vec![0, 3, 17, 255];

        let dense = sparse_to_dense(&kspec, &sparse).unwrap();
        assert_eq!(dense.len(), 256);
        assert_eq!(dense.count_ones(), 4);
        assert!(dense[17]);
        assert!(!dense[18]);

        assert_eq!(dense_to_sparse(&dense), vec![0u64, 3, 17, 255]);
    }

    #[test]
    fn test_dense_out_of_range() {
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        assert!(sparse_to_dense(&kspec, &[256u32]).is_err());
        assert!(sparse_to_dense(&kspec, &[-1i32]).is_err());
    }

    #[test]
    fn test_empty_dense() {
        let kspec = KmerSpec::new(3, "ATG").unwrap();
        let dense = sparse_to_dense::<u8>(&kspec, &[]).unwrap();
        assert_eq!(dense.len(), 64);
        assert!(dense_to_sparse(&dense).is_empty());
    }

    #[test]
    fn test_dense_too_large() {
        let kspec = KmerSpec::new(31, "A").unwrap();
        let err = sparse_to_dense::<u64>(&kspec, &[]).unwrap_err();
        assert!(err.is_validation());

        let kspec = KmerSpec::new(17, "ATGAC").unwrap();
        assert!(sparse_to_dense::<u64>(&kspec, &[1, 2]).unwrap_err().is_validation());
    }
}
