//! Compact storage for collections of sparse signatures
//!
//! All signatures of a [`SignatureArray`] share one `values` buffer. Signature
//! `i` occupies `values[bounds[i]..bounds[i + 1]]`.

use std::ops::{Index, Range};

use super::index::{IndexDtype, IndexInt};
use super::Signature;
use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;

/// Immutable array of sparse k-mer signatures stored with index type `T`
#[derive(Debug, Clone)]
pub struct SignatureArray<T: IndexInt> {
    kmerspec: KmerSpec,
    values: Vec<T>,
    bounds: Vec<usize>,
}

impl<T: IndexInt> SignatureArray<T> {
    /// Build from individual sorted signatures of any index type
    ///
    /// Fails with `OverflowRisk` if `T` is too narrow for `kmerspec` and with a
    /// validation error if any signature is unsorted, has duplicates or holds
    /// an index outside the k-mer space.
    pub fn build<U, S, I>(signatures: I, kmerspec: KmerSpec) -> GambitResult<Self>
    where
        U: IndexInt,
        S: AsRef<[U]>,
        I: IntoIterator<Item = S>,
    {
        T::DTYPE.check(&kmerspec)?;
        let max_index = kmerspec.max_index();

        let mut values = Vec::new();
        let mut bounds = vec![0usize];

        for (i, signature) in signatures.into_iter().enumerate() {
            let signature = signature.as_ref();
            check_sparse(signature, max_index).map_err(|msg| {
                GambitError::validation(format!("signature {}: {}", i, msg))
            })?;

            values.reserve(signature.len());
            for &value in signature {
                // Range checked above, so conversion only fails for a too-narrow T
                let converted = T::from_u64(value.to_u64()).ok_or_else(|| GambitError::OverflowRisk {
                    dtype: T::DTYPE.to_string(),
                    max_index,
                })?;
                values.push(converted);
            }
            bounds.push(values.len());
        }

        Ok(Self { kmerspec, values, bounds })
    }

    /// Build from a pre-populated values buffer and bounds of any integer type
    pub fn from_arrays<B>(values: Vec<T>, bounds: &[B], kmerspec: KmerSpec) -> GambitResult<Self>
    where
        B: Copy + TryInto<usize>,
    {
        T::DTYPE.check(&kmerspec)?;

        let bounds = bounds
            .iter()
            .map(|&b| b.try_into().map_err(|_| GambitError::validation("bounds must be non-negative")))
            .collect::<GambitResult<Vec<usize>>>()?;

        if bounds.first() != Some(&0) {
            return Err(GambitError::validation("bounds must start at 0"));
        }
        if bounds.windows(2).any(|w| w[0] > w[1]) {
            return Err(GambitError::validation("bounds must be non-decreasing"));
        }
        if bounds.last() != Some(&values.len()) {
            return Err(GambitError::validation(format!(
                "last bound must equal number of values ({})",
                values.len()
            )));
        }

        let max_index = kmerspec.max_index();
        for (i, w) in bounds.windows(2).enumerate() {
            check_sparse(&values[w[0]..w[1]], max_index).map_err(|msg| {
                GambitError::validation(format!("signature {}: {}", i, msg))
            })?;
        }

        Ok(Self { kmerspec, values, bounds })
    }

    /// Empty array
    pub fn empty(kmerspec: KmerSpec) -> GambitResult<Self> {
        Self::build(std::iter::empty::<&[u64]>(), kmerspec)
    }

    pub fn kmerspec(&self) -> &KmerSpec {
        &self.kmerspec
    }

    pub fn dtype(&self) -> IndexDtype {
        T::DTYPE
    }

    pub fn len(&self) -> usize {
        self.bounds.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn values(&self) -> &[T] {
        &self.values
    }

    pub fn bounds(&self) -> &[usize] {
        &self.bounds
    }

    /// Size in bytes of the values buffer
    pub fn sizeof_values(&self) -> usize {
        self.values.len() * T::DTYPE.size()
    }

    /// Number of k-mers in signature `i`
    pub fn size_of(&self, i: usize) -> usize {
        self.bounds[i + 1] - self.bounds[i]
    }

    /// Borrowed view of signature `i`
    pub fn get(&self, i: usize) -> Option<&[T]> {
        if i < self.len() {
            Some(&self.values[self.bounds[i]..self.bounds[i + 1]])
        } else {
            None
        }
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = &[T]> + '_ {
        self.bounds
            .windows(2)
            .map(move |w| &self.values[w[0]..w[1]])
    }

    /// New array holding a contiguous range of signatures
    pub fn slice(&self, range: Range<usize>) -> GambitResult<Self> {
        if range.start > range.end || range.end > self.len() {
            return Err(GambitError::validation(format!(
                "range {:?} out of bounds for {} signatures",
                range,
                self.len()
            )));
        }

        let start = self.bounds[range.start];
        let end = self.bounds[range.end];
        let bounds = self.bounds[range.start..=range.end]
            .iter()
            .map(|b| b - start)
            .collect();

        Ok(Self {
            kmerspec: self.kmerspec.clone(),
            values: self.values[start..end].to_vec(),
            bounds,
        })
    }

    /// New array holding the signatures at `indices`, in that order
    pub fn take(&self, indices: &[usize]) -> GambitResult<Self> {
        let mut values = Vec::new();
        let mut bounds = Vec::with_capacity(indices.len() + 1);
        bounds.push(0);

        for &i in indices {
            let sig = self.get(i).ok_or_else(|| {
                GambitError::validation(format!("index {} out of bounds for {} signatures", i, self.len()))
            })?;
            values.extend_from_slice(sig);
            bounds.push(values.len());
        }

        Ok(Self {
            kmerspec: self.kmerspec.clone(),
            values,
            bounds,
        })
    }

    /// Every `step`-th signature starting at `start`
    pub fn step_by(&self, start: usize, step: usize) -> GambitResult<Self> {
        if step == 0 {
            return Err(GambitError::validation("step must be positive"));
        }
        let indices: Vec<usize> = (start..self.len()).step_by(step).collect();
        self.take(&indices)
    }

    /// Convert to another index type, validating it is wide enough
    pub fn convert<U: IndexInt>(&self) -> GambitResult<SignatureArray<U>> {
        SignatureArray::<U>::build(self.iter(), self.kmerspec.clone())
    }

    /// Copy every signature out as `u64` indices
    pub fn to_u64_vecs(&self) -> Vec<Signature> {
        self.iter()
            .map(|sig| sig.iter().map(|v| v.to_u64()).collect())
            .collect()
    }
}

impl<T: IndexInt> Index<usize> for SignatureArray<T> {
    type Output = [T];

    fn index(&self, i: usize) -> &[T] {
        &self.values[self.bounds[i]..self.bounds[i + 1]]
    }
}

impl<T: IndexInt, U: IndexInt> PartialEq<SignatureArray<U>> for SignatureArray<T> {
    fn eq(&self, other: &SignatureArray<U>) -> bool {
        self.kmerspec == other.kmerspec
            && self.len() == other.len()
            && self.iter().zip(other.iter()).all(|(a, b)| sparse_eq(a, b))
    }
}

impl<T: IndexInt> Eq for SignatureArray<T> {}

/// Element-wise equality of two sparse signatures of any index types
pub fn sparse_eq<A: IndexInt, B: IndexInt>(a: &[A], b: &[B]) -> bool {
    a.len() == b.len() && a.iter().zip(b).all(|(x, y)| x.to_u64() == y.to_u64())
}

/// Verify a signature is strictly increasing and within the index space
fn check_sparse<U: IndexInt>(signature: &[U], max_index: u64) -> Result<(), String> {
    let mut prev: Option<u64> = None;

    for &value in signature {
        let value = value
            .try_to_u64()
            .ok_or_else(|| "negative k-mer index".to_string())?;
        if value > max_index {
            return Err(format!("k-mer index {} exceeds maximum {}", value, max_index));
        }
        if prev.is_some_and(|p| p >= value) {
            return Err("indices must be sorted and unique".to_string());
        }
        prev = Some(value);
    }

    Ok(())
}

/// Signature array with its index type chosen at run time
#[derive(Debug, Clone)]
pub enum AnySignatureArray {
    U8(SignatureArray<u8>),
    U16(SignatureArray<u16>),
    I32(SignatureArray<i32>),
    U32(SignatureArray<u32>),
    U64(SignatureArray<u64>),
}

/// Evaluate an expression with the concrete array inside an [`AnySignatureArray`]
macro_rules! with_array {
    ($any:expr, $arr:ident => $body:expr) => {
        match $any {
            $crate::signatures::AnySignatureArray::U8($arr) => $body,
            $crate::signatures::AnySignatureArray::U16($arr) => $body,
            $crate::signatures::AnySignatureArray::I32($arr) => $body,
            $crate::signatures::AnySignatureArray::U32($arr) => $body,
            $crate::signatures::AnySignatureArray::U64($arr) => $body,
        }
    };
}
pub(crate) use with_array;

impl AnySignatureArray {
    /// Build using `dtype`, or the narrowest type for `kmerspec` if not given
    pub fn build<U, S, I>(signatures: I, kmerspec: KmerSpec, dtype: Option<IndexDtype>) -> GambitResult<Self>
    where
        U: IndexInt,
        S: AsRef<[U]>,
        I: IntoIterator<Item = S>,
    {
        let dtype = dtype.unwrap_or_else(|| IndexDtype::narrowest(&kmerspec));

        Ok(match dtype {
            IndexDtype::U8 => Self::U8(SignatureArray::build(signatures, kmerspec)?),
            IndexDtype::U16 => Self::U16(SignatureArray::build(signatures, kmerspec)?),
            IndexDtype::I32 => Self::I32(SignatureArray::build(signatures, kmerspec)?),
            IndexDtype::U32 => Self::U32(SignatureArray::build(signatures, kmerspec)?),
            IndexDtype::U64 => Self::U64(SignatureArray::build(signatures, kmerspec)?),
        })
    }

    pub fn kmerspec(&self) -> &KmerSpec {
        with_array!(self, a => a.kmerspec())
    }

    pub fn dtype(&self) -> IndexDtype {
        with_array!(self, a => a.dtype())
    }

    pub fn len(&self) -> usize {
        with_array!(self, a => a.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn bounds(&self) -> &[usize] {
        with_array!(self, a => a.bounds())
    }

    pub fn sizeof_values(&self) -> usize {
        with_array!(self, a => a.sizeof_values())
    }

    /// Signature `i` widened to `u64`
    pub fn signature(&self, i: usize) -> Option<Signature> {
        with_array!(self, a => a.get(i).map(|sig| sig.iter().map(|v| v.to_u64()).collect()))
    }

    pub fn take(&self, indices: &[usize]) -> GambitResult<Self> {
        Ok(with_array!(self, a => a.take(indices)?.into()))
    }

    pub fn slice(&self, range: Range<usize>) -> GambitResult<Self> {
        Ok(with_array!(self, a => a.slice(range)?.into()))
    }

    pub fn to_u64_vecs(&self) -> Vec<Signature> {
        with_array!(self, a => a.to_u64_vecs())
    }
}

impl PartialEq for AnySignatureArray {
    fn eq(&self, other: &Self) -> bool {
        with_array!(self, a => with_array!(other, b => a == b))
    }
}

impl Eq for AnySignatureArray {}

macro_rules! impl_from_array {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<SignatureArray<$ty>> for AnySignatureArray {
                fn from(array: SignatureArray<$ty>) -> Self {
                    AnySignatureArray::$variant(array)
                }
            }
        )*
    };
}

impl_from_array!(u8 => U8, u16 => U16, i32 => I32, u32 => U32, u64 => U64);
