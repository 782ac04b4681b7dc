//! GAMBIT core library
//!
//! K-mer signatures, Jaccard distances against reference databases and
//! threshold-based taxonomic classification.

pub mod error;
pub mod kmers;
pub mod signatures;
pub mod seq;
pub mod progress;
pub mod search;
pub mod concurrency;
pub mod metric;
pub mod taxonomy;
pub mod db;
pub mod classify;
pub mod query;
pub mod results;
#[cfg(any(test, feature = "test-utils"))]
pub mod testing;

// Re-export commonly used types and functions
pub use error::{GambitError, GambitResult};
pub use kmers::KmerSpec;
pub use signatures::{AnySignatureArray, IndexDtype, Signature, SignatureArray, SignaturesMeta, StoredSignatures};
pub use seq::{SeqFormat, SequenceFile};
pub use progress::{ProgressConfig, ProgressMeter};
pub use search::{calc_file_signature, calc_file_signatures, calc_signature};
pub use concurrency::{Concurrency, Executor};
pub use metric::{jaccard, jaccarddist, jaccarddist_matrix, DistanceMatrix, MatrixOptions};
pub use taxonomy::{Taxon, Taxonomy};
pub use db::ReferenceDatabase;
pub use classify::{classify, ClassifierResult, Match};
pub use query::{query, query_parse, QueryParams, QueryResults};
pub use results::{ExportFormat, OutputTarget, ResultsExporter};

/// Version information for the GAMBIT core library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
