use gambit_core::concurrency::Concurrency;
use gambit_core::kmers::{kmer_to_index, revcomp};
use gambit_core::{calc_file_signatures, calc_signature, KmerSpec, ProgressConfig, SequenceFile};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Write;

/// 100 kb of A/C background with a prefix and a T-free k-mer inserted every 50 bases
///
/// Neither the prefix nor its reverse complement can occur anywhere else.
fn synthetic_sequence(kspec: &KmerSpec, seed: u64) -> (Vec<u8>, Vec<u64>) {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut seq = Vec::with_capacity(100_000);
    let mut expected = Vec::new();

    while seq.len() + 50 <= 100_000 {
        let kmer: Vec<u8> = (0..kspec.k()).map(|_| b"ACG"[rng.gen_range(0..3)]).collect();
        expected.push(kmer_to_index(&kmer).unwrap());

        seq.extend_from_slice(kspec.prefix());
        seq.extend_from_slice(&kmer);
        while seq.len() % 50 != 0 {
            seq.push(b"AC"[rng.gen_range(0..2)]);
        }
    }

    expected.sort_unstable();
    expected.dedup();
    (seq, expected)
}

#[test]
fn known_kmer_insertions() {
    let kspec = KmerSpec::new(11, "ATGAC").unwrap();
    let (seq, expected) = synthetic_sequence(&kspec, 0);
    assert_eq!(seq.len(), 100_000);
    assert!(expected.len() > 1900);

    let sig = calc_signature(&kspec, &seq);
    assert_eq!(sig, expected);
    assert_eq!(calc_signature(&kspec, &revcomp(&seq)), expected);
    assert_eq!(calc_signature(&kspec, &seq.to_ascii_lowercase()), expected);
}

#[test]
fn batch_extraction_keeps_input_order() {
    let kspec = KmerSpec::new(11, "ATGAC").unwrap();
    let dir = tempfile::tempdir().unwrap();

    let mut files = Vec::new();
    let mut expected = Vec::new();
    for i in 0..6u64 {
        let (seq, sig) = synthetic_sequence(&kspec, i + 10);
        let path = dir.path().join(format!("genome{}.fasta", i));
        let mut f = std::fs::File::create(&path).unwrap();
        // Split into two records to exercise the union over records
        let (a, b) = seq.split_at(50_000);
        writeln!(f, ">part1\n{}\n>part2\n{}", String::from_utf8_lossy(a), String::from_utf8_lossy(b)).unwrap();
        files.push(SequenceFile::fasta(path));
        expected.push(sig);
    }

    for concurrency in [Concurrency::Sequential, Concurrency::Threads { workers: 3 }] {
        let sigs = calc_file_signatures(&kspec, &files, &concurrency, &ProgressConfig::Off).unwrap();
        assert_eq!(sigs, expected, "{:?}", concurrency);
    }
}
