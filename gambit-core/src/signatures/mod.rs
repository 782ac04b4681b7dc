//! K-mer signatures and their storage

pub mod array;
pub mod convert;
pub mod index;
pub mod meta;
pub mod store;

pub use array::{sparse_eq, AnySignatureArray, SignatureArray};
pub use convert::{dense_to_sparse, sparse_to_dense, DenseSignature};
pub use index::{IndexDtype, IndexInt};
pub use meta::SignaturesMeta;
pub use store::{load_signatures, load_signatures_file, write_signatures, write_signatures_file, StoredSignatures};

pub(crate) use array::with_array;

/// Sorted, duplicate-free k-mer indices found in a sequence
pub type Signature = Vec<u64>;
