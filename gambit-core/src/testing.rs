//! Helpers for tests and benchmarks
//!
//! Available to other crates with the `test-utils` feature.

use rand::rngs::StdRng;
use rand::seq::index::sample;
use rand::{Rng, SeedableRng};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use crate::kmers::{index_to_kmer, revcomp, KmerSpec};
use crate::progress::{ProgressConfig, ProgressMeter};
use crate::signatures::Signature;

/// `n` random signatures for `kspec`, reproducible from `seed`
///
/// Sizes vary from empty to a few thousand k-mers so that pairs share a
/// realistic fraction of their k-mers in small k-mer spaces.
pub fn make_signatures(kspec: &KmerSpec, n: usize, seed: u64) -> Vec<Signature> {
    let mut rng = StdRng::seed_from_u64(seed);
    let nkmers = kspec.nkmers().min(1 << 30) as usize;
    let max_size = nkmers.min(2000);

    (0..n)
        .map(|_| {
            let size = rng.gen_range(0..=max_size);
            let mut sig: Vec<u64> = sample(&mut rng, nkmers, size).into_iter().map(|i| i as u64).collect();
            sig.sort_unstable();
            sig
        })
        .collect()
}

/// Sequence whose signature under `kspec` is exactly `kmers`
///
/// Each k-mer is written after the prefix, on a random strand and in random
/// case, separated by runs of `N`.
pub fn make_kmer_seq(kspec: &KmerSpec, kmers: &[u64], seed: u64) -> Vec<u8> {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seq = Vec::new();

    for &index in kmers {
        let mut piece = kspec.prefix().to_vec();
        piece.extend(index_to_kmer(index, kspec.k()));

        if rng.gen_bool(0.5) {
            piece = revcomp(&piece);
        }
        if rng.gen_bool(0.5) {
            piece.make_ascii_lowercase();
        }

        seq.extend_from_slice(b"NN");
        seq.extend(piece);
    }
    seq.extend_from_slice(b"NN");
    seq
}

/// Assert two floats are equal within numpy-style default tolerances
#[track_caller]
pub fn assert_close<A: Into<f64>, B: Into<f64>>(actual: A, expected: B) {
    let (a, b) = (actual.into(), expected.into());
    let tol = 1e-7 + 1e-5 * b.abs();
    assert!((a - b).abs() <= tol, "{} is not close to {}", a, b);
}

#[derive(Default)]
struct Recorded {
    total: Mutex<Option<u64>>,
    increments: Mutex<Vec<u64>>,
    starts: AtomicUsize,
    finishes: AtomicUsize,
}

impl ProgressMeter for Recorded {
    fn start(&self, total: u64, _desc: &str) {
        self.starts.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut t) = self.total.lock() {
            *t = Some(total);
        }
    }

    fn increment(&self, n: u64) {
        if let Ok(mut incs) = self.increments.lock() {
            incs.push(n);
        }
    }

    fn finish(&self) {
        self.finishes.fetch_add(1, Ordering::SeqCst);
    }
}

/// Progress meter that records every update for later checks
#[derive(Clone, Default)]
pub struct ProgressRecorder {
    inner: Arc<Recorded>,
}

impl ProgressRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Progress config that reports to this recorder
    pub fn config(&self) -> ProgressConfig {
        ProgressConfig::Custom(self.inner.clone())
    }

    pub fn total(&self) -> Option<u64> {
        *self.inner.total.lock().unwrap()
    }

    pub fn increments(&self) -> Vec<u64> {
        self.inner.increments.lock().unwrap().clone()
    }

    pub fn value(&self) -> u64 {
        self.increments().iter().sum()
    }

    /// Assert progress was started and finished once and reached `total` exactly
    #[track_caller]
    pub fn check(&self, total: u64) {
        assert_eq!(self.inner.starts.load(Ordering::SeqCst), 1, "progress started more than once");
        assert_eq!(self.inner.finishes.load(Ordering::SeqCst), 1, "progress not finished exactly once");
        assert_eq!(self.total(), Some(total));
        assert_eq!(self.value(), total);
    }
}
