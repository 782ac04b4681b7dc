//! Integer widths for stored k-mer indices

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;

/// Integer type a signature's k-mer indices can be stored as
pub trait IndexInt: Copy + Ord + Send + Sync + fmt::Debug + 'static {
    /// Run-time tag for this type
    const DTYPE: IndexDtype;

    /// Widen to the common comparison type. Only valid for non-negative values.
    fn to_u64(self) -> u64;

    /// Checked widening, `None` for negative values
    fn try_to_u64(self) -> Option<u64>;

    /// Checked narrowing, `None` if the value does not fit
    fn from_u64(value: u64) -> Option<Self>;
}

macro_rules! impl_index_int {
    ($($ty:ty => $dtype:ident),* $(,)?) => {
        $(
            impl IndexInt for $ty {
                const DTYPE: IndexDtype = IndexDtype::$dtype;

                #[inline]
                fn to_u64(self) -> u64 {
                    self as u64
                }

                #[inline]
                fn try_to_u64(self) -> Option<u64> {
                    u64::try_from(self).ok()
                }

                #[inline]
                fn from_u64(value: u64) -> Option<Self> {
                    <$ty>::try_from(value).ok()
                }
            }
        )*
    };
}

impl_index_int!(u8 => U8, u16 => U16, i32 => I32, u32 => U32, u64 => U64);

/// Run-time name of an index integer type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexDtype {
    U8,
    U16,
    I32,
    U32,
    U64,
}

impl IndexDtype {
    /// Unsigned types in order of increasing width, for automatic selection
    const UNSIGNED: [IndexDtype; 4] = [IndexDtype::U8, IndexDtype::U16, IndexDtype::U32, IndexDtype::U64];

    /// Largest k-mer index this type can store
    pub fn max_index(self) -> u64 {
        match self {
            IndexDtype::U8 => u8::MAX as u64,
            IndexDtype::U16 => u16::MAX as u64,
            IndexDtype::I32 => i32::MAX as u64,
            IndexDtype::U32 => u32::MAX as u64,
            IndexDtype::U64 => u64::MAX,
        }
    }

    /// Size of one stored value in bytes
    pub fn size(self) -> usize {
        match self {
            IndexDtype::U8 => 1,
            IndexDtype::U16 => 2,
            IndexDtype::I32 | IndexDtype::U32 => 4,
            IndexDtype::U64 => 8,
        }
    }

    /// Narrowest unsigned type able to store every index of `kspec`
    pub fn narrowest(kspec: &KmerSpec) -> IndexDtype {
        let max_index = kspec.max_index();
        Self::UNSIGNED
            .into_iter()
            .find(|dtype| dtype.max_index() >= max_index)
            .unwrap_or(IndexDtype::U64)
    }

    /// Fail with `OverflowRisk` if this type is too narrow for `kspec`
    pub fn check(self, kspec: &KmerSpec) -> GambitResult<()> {
        if self.max_index() < kspec.max_index() {
            return Err(GambitError::OverflowRisk {
                dtype: self.to_string(),
                max_index: kspec.max_index(),
            });
        }
        Ok(())
    }

    pub fn as_str(self) -> &'static str {
        match self {
            IndexDtype::U8 => "u8",
            IndexDtype::U16 => "u16",
            IndexDtype::I32 => "i32",
            IndexDtype::U32 => "u32",
            IndexDtype::U64 => "u64",
        }
    }

    /// Tag byte used by the binary signature file
    pub(crate) fn code(self) -> u8 {
        match self {
            IndexDtype::U8 => 1,
            IndexDtype::U16 => 2,
            IndexDtype::I32 => 3,
            IndexDtype::U32 => 4,
            IndexDtype::U64 => 8,
        }
    }

    pub(crate) fn from_code(code: u8) -> Option<Self> {
        match code {
            1 => Some(IndexDtype::U8),
            2 => Some(IndexDtype::U16),
            3 => Some(IndexDtype::I32),
            4 => Some(IndexDtype::U32),
            8 => Some(IndexDtype::U64),
            _ => None,
        }
    }
}

impl fmt::Display for IndexDtype {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IndexDtype {
    type Err = GambitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "u8" => Ok(IndexDtype::U8),
            "u16" => Ok(IndexDtype::U16),
            "i32" => Ok(IndexDtype::I32),
            "u32" => Ok(IndexDtype::U32),
            "u64" => Ok(IndexDtype::U64),
            other => Err(GambitError::validation(format!("unknown index type: {}", other))),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_narrowest() {
        let cases = [(3, IndexDtype::U8), (4, IndexDtype::U8), (5, IndexDtype::U16), (8, IndexDtype::U16),
                     (9, IndexDtype::U32), (11, IndexDtype::U32), (16, IndexDtype::U32), (17, IndexDtype::U64)];

        for (k, expected) in cases {
            let kspec = KmerSpec::new(k, "ATGAC").unwrap();
            assert_eq!(IndexDtype::narrowest(&kspec), expected, "k={}", k);
            assert!(expected.check(&kspec).is_ok());
        }
    }

    #[test]
    fn test_check_too_narrow() {
        let kspec = KmerSpec::new(11, "ATGAC").unwrap();
        let err = IndexDtype::U16.check(&kspec).unwrap_err();
        assert!(matches!(err, GambitError::OverflowRisk { .. }));

        // 4^16 - 1 does not fit in a signed 32-bit integer
        let kspec = KmerSpec::new(16, "ATGAC").unwrap();
        assert!(IndexDtype::I32.check(&kspec).is_err());
        assert!(IndexDtype::U32.check(&kspec).is_ok());
    }

    #[test]
    fn test_index_int_conversions() {
        assert_eq!(u16::from_u64(65535), Some(65535u16));
        assert_eq!(u16::from_u64(65536), None);
        assert_eq!(i32::from_u64(u32::MAX as u64), None);
        assert_eq!((-1i32).try_to_u64(), None);
        assert_eq!(7i32.to_u64(), 7);
    }

    #[test]
    fn test_parse_and_code_roundtrip() {
        for dtype in [IndexDtype::U8, IndexDtype::U16, IndexDtype::I32, IndexDtype::U32, IndexDtype::U64] {
            assert_eq!(dtype.as_str().parse::<IndexDtype>().unwrap(), dtype);
            assert_eq!(IndexDtype::from_code(dtype.code()), Some(dtype));
        }
        assert!("f32".parse::<IndexDtype>().is_err());
    }
}
