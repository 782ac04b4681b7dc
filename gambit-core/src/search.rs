//! K-mer signature extraction
//!
//! A k-mer is recorded wherever the prefix occurs on the forward strand
//! (the `k` bases after it) or its reverse complement occurs (the reverse
//! complement of the `k` bases before it). Windows containing any byte other
//! than ACGT in either case are skipped.

use bitvec::prelude::*;

use crate::concurrency::Concurrency;
use crate::error::GambitResult;
use crate::kmers::{kmer_to_index, kmer_to_index_rc, KmerSpec};
use crate::progress::ProgressConfig;
use crate::seq::{for_each_record, SeqFormat, SequenceFile, SequenceSource};
use crate::signatures::Signature;

/// Largest k-mer space collected in a dense bit set rather than a list
const DENSE_ACCUMULATOR_MAX: u64 = 1 << 26;

/// Collects k-mer indices from one or more sequences into a signature
pub struct KmerAccumulator {
    kmers: Accumulated,
}

enum Accumulated {
    Dense(BitVec<u64, Lsb0>),
    Sparse(Vec<u64>),
}

impl KmerAccumulator {
    pub fn new(kspec: &KmerSpec) -> Self {
        let kmers = if kspec.nkmers() <= DENSE_ACCUMULATOR_MAX {
            Accumulated::Dense(bitvec![u64, Lsb0; 0; kspec.nkmers() as usize])
        } else {
            Accumulated::Sparse(Vec::new())
        };
        Self { kmers }
    }

    fn insert(&mut self, index: u64) {
        match &mut self.kmers {
            Accumulated::Dense(bits) => bits.set(index as usize, true),
            Accumulated::Sparse(values) => values.push(index),
        }
    }

    /// Add all k-mers found in `seq`
    pub fn add_sequence(&mut self, kspec: &KmerSpec, seq: &[u8]) {
        let k = kspec.k() as usize;
        let plen = kspec.prefix_len();
        let prefix = kspec.prefix();
        let prefix_rc = kspec.prefix_rc();

        if seq.len() < plen {
            return;
        }

        for i in 0..=(seq.len() - plen) {
            let window = &seq[i..i + plen];

            // Forward: prefix followed by k-mer
            if window.eq_ignore_ascii_case(prefix) && i + plen + k <= seq.len() {
                if let Some(index) = kmer_to_index(&seq[i + plen..i + plen + k]) {
                    self.insert(index);
                }
            }

            // Reverse: k-mer followed by reverse complement of prefix
            if window.eq_ignore_ascii_case(prefix_rc) && i >= k {
                if let Some(index) = kmer_to_index_rc(&seq[i - k..i]) {
                    self.insert(index);
                }
            }
        }
    }

    /// Sorted, duplicate-free indices seen so far
    pub fn finish(self) -> Signature {
        match self.kmers {
            Accumulated::Dense(bits) => bits.iter_ones().map(|i| i as u64).collect(),
            Accumulated::Sparse(mut values) => {
                values.sort_unstable();
                values.dedup();
                values
            }
        }
    }
}

/// Signature of a single sequence
pub fn calc_signature(kspec: &KmerSpec, seq: &[u8]) -> Signature {
    let mut acc = KmerAccumulator::new(kspec);
    acc.add_sequence(kspec, seq);
    acc.finish()
}

/// Union of the signatures of all records read from `source`
pub fn calc_signature_parse(kspec: &KmerSpec, source: SequenceSource<'_>, format: SeqFormat) -> GambitResult<Signature> {
    let mut acc = KmerAccumulator::new(kspec);
    for_each_record(source, format, |seq| acc.add_sequence(kspec, seq))?;
    Ok(acc.finish())
}

/// Signature of all records in a sequence file
pub fn calc_file_signature(kspec: &KmerSpec, file: &SequenceFile) -> GambitResult<Signature> {
    calc_signature_parse(kspec, SequenceSource::Path(file.clone()), file.format)
}

/// Signatures of many files, in input order
///
/// The first file that fails aborts the batch and the error names it.
pub fn calc_file_signatures(
    kspec: &KmerSpec,
    files: &[SequenceFile],
    concurrency: &Concurrency,
    progress: &ProgressConfig,
) -> GambitResult<Vec<Signature>> {
    log::info!("Calculating signatures for {} files ({:?})", files.len(), concurrency);
    let executor = concurrency.executor()?;
    executor.compute_all(kspec, files, progress)
}
