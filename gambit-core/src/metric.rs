//! Jaccard similarity and distance between k-mer signatures
//!
//! Distances between sorted sparse signatures use a single merge pass.
//! Signatures of different index types are compared through `u64` and never
//! truncated. Two empty signatures have distance 0.

use bitvec::prelude::*;
use rayon::prelude::*;
use std::collections::HashSet;

use crate::error::{GambitError, GambitResult};
use crate::progress::ProgressConfig;
use crate::signatures::{with_array, AnySignatureArray, IndexInt, SignatureArray};

/// Column chunk size used when none is given
pub const DEFAULT_CHUNKSIZE: usize = 1000;

/// Sizes of the intersection and union of two sorted sparse signatures
pub fn intersection_union<A: IndexInt, B: IndexInt>(a: &[A], b: &[B]) -> (usize, usize) {
    let (mut i, mut j) = (0, 0);
    let mut inter = 0;

    while i < a.len() && j < b.len() {
        let x = a[i].to_u64();
        let y = b[j].to_u64();
        if x == y {
            inter += 1;
            i += 1;
            j += 1;
        } else if x < y {
            i += 1;
        } else {
            j += 1;
        }
    }

    (inter, a.len() + b.len() - inter)
}

fn distance_from_counts(inter: usize, union: usize) -> f32 {
    if union == 0 {
        0.0
    } else {
        (1.0 - inter as f64 / union as f64) as f32
    }
}

/// Jaccard distance between two sorted sparse signatures
#[inline]
pub fn jaccarddist<A: IndexInt, B: IndexInt>(a: &[A], b: &[B]) -> f32 {
    let (inter, union) = intersection_union(a, b);
    distance_from_counts(inter, union)
}

/// Jaccard similarity, always exactly `1 - jaccarddist`
#[inline]
pub fn jaccard<A: IndexInt, B: IndexInt>(a: &[A], b: &[B]) -> f32 {
    1.0 - jaccarddist(a, b)
}

/// Jaccard similarity of two dense signatures of equal length
pub fn jaccard_bits(a: &BitSlice<u64, Lsb0>, b: &BitSlice<u64, Lsb0>) -> GambitResult<f32> {
    if a.len() != b.len() {
        return Err(GambitError::validation(format!(
            "dense signatures have different lengths ({} and {})",
            a.len(),
            b.len()
        )));
    }

    let mut and = a.to_bitvec();
    and &= b;
    let mut or = a.to_bitvec();
    or |= b;

    Ok(1.0 - distance_from_counts(and.count_ones(), or.count_ones()))
}

/// Jaccard similarity of two arbitrary collections of k-mer indices
///
/// Does not require sorted or duplicate-free input.
pub fn jaccard_generic<I, J>(a: I, b: J) -> f32
where
    I: IntoIterator<Item = u64>,
    J: IntoIterator<Item = u64>,
{
    let a: HashSet<u64> = a.into_iter().collect();
    let b: HashSet<u64> = b.into_iter().collect();
    let inter = a.intersection(&b).count();
    let union = a.len() + b.len() - inter;
    1.0 - distance_from_counts(inter, union)
}

/// Distances from one signature to every signature of `refs`
pub fn jaccarddist_array<A: IndexInt, B: IndexInt>(query: &[A], refs: &SignatureArray<B>) -> Vec<f32> {
    let mut out = vec![0.0; refs.len()];
    fill_array(query, refs, &mut out);
    out
}

/// Like [`jaccarddist_array`], writing into `out`
///
/// `out` must have one element per reference; it is left untouched otherwise.
pub fn jaccarddist_array_into<A: IndexInt, B: IndexInt>(
    query: &[A],
    refs: &SignatureArray<B>,
    out: &mut [f32],
) -> GambitResult<()> {
    if out.len() != refs.len() {
        return Err(GambitError::validation(format!(
            "output has length {}, expected {}",
            out.len(),
            refs.len()
        )));
    }
    fill_array(query, refs, out);
    Ok(())
}

fn fill_array<A: IndexInt, B: IndexInt>(query: &[A], refs: &SignatureArray<B>, out: &mut [f32]) {
    out.par_iter_mut()
        .enumerate()
        .for_each(|(i, d)| *d = jaccarddist(query, &refs[i]));
}

/// Distance array against a reference array of run-time index type
pub fn jaccarddist_array_any<A: IndexInt>(query: &[A], refs: &AnySignatureArray) -> Vec<f32> {
    with_array!(refs, r => jaccarddist_array(query, r))
}

/// Dense row-major matrix of pairwise distances
#[derive(Debug, Clone, PartialEq)]
pub struct DistanceMatrix {
    nrows: usize,
    ncols: usize,
    data: Vec<f32>,
}

impl DistanceMatrix {
    pub fn zeros(nrows: usize, ncols: usize) -> Self {
        Self {
            nrows,
            ncols,
            data: vec![0.0; nrows * ncols],
        }
    }

    pub fn nrows(&self) -> usize {
        self.nrows
    }

    pub fn ncols(&self) -> usize {
        self.ncols
    }

    pub fn shape(&self) -> (usize, usize) {
        (self.nrows, self.ncols)
    }

    pub fn get(&self, row: usize, col: usize) -> Option<f32> {
        if row < self.nrows && col < self.ncols {
            Some(self.data[row * self.ncols + col])
        } else {
            None
        }
    }

    pub fn row(&self, row: usize) -> &[f32] {
        &self.data[row * self.ncols..(row + 1) * self.ncols]
    }

    pub fn rows(&self) -> impl Iterator<Item = &[f32]> + '_ {
        (0..self.nrows).map(move |r| self.row(r))
    }

    pub fn as_slice(&self) -> &[f32] {
        &self.data
    }
}

/// Options for distance matrix calculation
#[derive(Debug, Clone)]
pub struct MatrixOptions<'a> {
    /// Columns of the result in terms of reference positions, any order
    pub ref_indices: Option<&'a [usize]>,
    /// Number of reference columns computed per pass
    pub chunksize: usize,
    pub progress: ProgressConfig,
}

impl Default for MatrixOptions<'_> {
    fn default() -> Self {
        Self {
            ref_indices: None,
            chunksize: DEFAULT_CHUNKSIZE,
            progress: ProgressConfig::Off,
        }
    }
}

impl<'a> MatrixOptions<'a> {
    pub fn with_ref_indices(mut self, ref_indices: &'a [usize]) -> Self {
        self.ref_indices = Some(ref_indices);
        self
    }

    pub fn with_chunksize(mut self, chunksize: usize) -> Self {
        self.chunksize = chunksize;
        self
    }

    pub fn with_progress(mut self, progress: ProgressConfig) -> Self {
        self.progress = progress;
        self
    }

    fn ncols(&self, nrefs: usize) -> usize {
        self.ref_indices.map_or(nrefs, |idx| idx.len())
    }

    fn validate(&self, nrefs: usize) -> GambitResult<()> {
        if self.chunksize == 0 {
            return Err(GambitError::validation("chunksize must be positive"));
        }
        if let Some(&bad) = self.ref_indices.and_then(|idx| idx.iter().find(|&&i| i >= nrefs)) {
            return Err(GambitError::validation(format!(
                "reference index {} out of range for {} references",
                bad, nrefs
            )));
        }
        Ok(())
    }
}

/// Pairwise distances between every query and the selected references
pub fn jaccarddist_matrix<A: IndexInt, B: IndexInt>(
    queries: &SignatureArray<A>,
    refs: &SignatureArray<B>,
    opts: &MatrixOptions<'_>,
) -> GambitResult<DistanceMatrix> {
    let mut out = DistanceMatrix::zeros(queries.len(), opts.ncols(refs.len()));
    jaccarddist_matrix_into(queries, refs, opts, &mut out)?;
    Ok(out)
}

/// Like [`jaccarddist_matrix`], writing into `out`
///
/// Fails with a validation error before writing anything if `out` has the
/// wrong shape, the k-mer specs differ or a reference index is out of range.
pub fn jaccarddist_matrix_into<A: IndexInt, B: IndexInt>(
    queries: &SignatureArray<A>,
    refs: &SignatureArray<B>,
    opts: &MatrixOptions<'_>,
    out: &mut DistanceMatrix,
) -> GambitResult<()> {
    if queries.kmerspec() != refs.kmerspec() {
        return Err(GambitError::validation(format!(
            "query {} does not match reference {}",
            queries.kmerspec(),
            refs.kmerspec()
        )));
    }
    opts.validate(refs.len())?;

    let nrows = queries.len();
    let ncols = opts.ncols(refs.len());
    if out.shape() != (nrows, ncols) {
        return Err(GambitError::validation(format!(
            "output has shape {:?}, expected {:?}",
            out.shape(),
            (nrows, ncols)
        )));
    }

    let progress = opts.progress.start((nrows * ncols) as u64, "Calculating distances");
    let ref_index = |col: usize| opts.ref_indices.map_or(col, |idx| idx[col]);

    if nrows > 0 && ncols > 0 {
        for start in (0..ncols).step_by(opts.chunksize) {
            let end = (start + opts.chunksize).min(ncols);
            log::trace!("Distance matrix columns {}..{} of {}", start, end, ncols);

            out.data
                .par_chunks_mut(ncols)
                .enumerate()
                .for_each(|(r, row)| {
                    let query = &queries[r];
                    for (col, d) in row[start..end].iter_mut().enumerate() {
                        *d = jaccarddist(query, &refs[ref_index(start + col)]);
                    }
                });

            progress.increment((nrows * (end - start)) as u64);
        }
    }

    progress.finish();
    Ok(())
}

/// Distance matrix between arrays of run-time index types
pub fn jaccarddist_matrix_any(
    queries: &AnySignatureArray,
    refs: &AnySignatureArray,
    opts: &MatrixOptions<'_>,
) -> GambitResult<DistanceMatrix> {
    with_array!(queries, q => with_array!(refs, r => jaccarddist_matrix(q, r, opts)))
}
