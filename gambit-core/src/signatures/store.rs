//! Binary signature file (`.gs`)
//!
//! Layout, all integers little endian:
//! - Header  { magic="GSIG", version, k, prefix, dtype tag, count }
//! - Meta    { JSON-encoded [`SignaturesMeta`] }
//! - Ids     { count length-prefixed UTF-8 strings }
//! - Bounds  { count + 1 offsets as u64 }
//! - Values  { raw length, compressed length, xxh64 of raw bytes, zstd block }

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::fs::File;
use std::io::{BufReader, BufWriter, Read, Write};
use std::path::Path;

use super::array::{with_array, AnySignatureArray, SignatureArray};
use super::index::{IndexDtype, IndexInt};
use super::meta::SignaturesMeta;
use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;

const GSIG_MAGIC: &[u8; 4] = b"GSIG";
const GSIG_VERSION: u32 = 1;
const ZSTD_LEVEL: i32 = 3;

/// Upper bound on any single length field, guards against allocating garbage sizes
const MAX_FIELD_LEN: u64 = 1 << 40;

/// Signatures together with their ids and metadata, as stored on disk
#[derive(Debug, Clone, PartialEq)]
pub struct StoredSignatures {
    pub signatures: AnySignatureArray,
    pub ids: Vec<String>,
    pub meta: SignaturesMeta,
}

impl StoredSignatures {
    pub fn new(signatures: AnySignatureArray, ids: Vec<String>, meta: SignaturesMeta) -> GambitResult<Self> {
        check_ids(&signatures, &ids)?;
        Ok(Self { signatures, ids, meta })
    }

    pub fn kmerspec(&self) -> &KmerSpec {
        self.signatures.kmerspec()
    }

    pub fn len(&self) -> usize {
        self.signatures.len()
    }

    pub fn is_empty(&self) -> bool {
        self.signatures.is_empty()
    }
}

fn check_ids(signatures: &AnySignatureArray, ids: &[String]) -> GambitResult<()> {
    if ids.len() != signatures.len() {
        return Err(GambitError::validation(format!(
            "got {} ids for {} signatures",
            ids.len(),
            signatures.len()
        )));
    }
    Ok(())
}

/// Write signatures to any writer
pub fn write_signatures<W: Write>(
    writer: &mut W,
    signatures: &AnySignatureArray,
    ids: &[String],
    meta: &SignaturesMeta,
) -> GambitResult<()> {
    check_ids(signatures, ids)?;

    let kspec = signatures.kmerspec();
    writer.write_all(GSIG_MAGIC)?;
    writer.write_u32::<LittleEndian>(GSIG_VERSION)?;
    writer.write_u32::<LittleEndian>(kspec.k())?;
    write_bytes(writer, kspec.prefix())?;
    writer.write_u8(signatures.dtype().code())?;
    writer.write_u64::<LittleEndian>(signatures.len() as u64)?;

    write_bytes(writer, &serde_json::to_vec(meta)?)?;

    for id in ids {
        write_bytes(writer, id.as_bytes())?;
    }

    for &bound in signatures.bounds() {
        writer.write_u64::<LittleEndian>(bound as u64)?;
    }

    let raw = with_array!(signatures, a => encode_values(a.values()));
    let compressed = zstd::encode_all(raw.as_slice(), ZSTD_LEVEL)?;
    writer.write_u64::<LittleEndian>(raw.len() as u64)?;
    writer.write_u64::<LittleEndian>(compressed.len() as u64)?;
    writer.write_u64::<LittleEndian>(xxhash_rust::xxh64::xxh64(&raw, 0))?;
    writer.write_all(&compressed)?;

    Ok(())
}

/// Write signatures to a file, creating or truncating it
pub fn write_signatures_file<P: AsRef<Path>>(
    path: P,
    signatures: &AnySignatureArray,
    ids: &[String],
    meta: &SignaturesMeta,
) -> GambitResult<()> {
    let path = path.as_ref();
    let mut writer = BufWriter::new(File::create(path)?);
    write_signatures(&mut writer, signatures, ids, meta)?;
    writer.flush()?;
    log::info!("Wrote {} signatures to {}", signatures.len(), path.display());
    Ok(())
}

/// Read signatures from any reader; `label` names the source in errors
pub fn load_signatures<R: Read>(reader: &mut R, label: &str) -> GambitResult<StoredSignatures> {
    let truncated = |e: std::io::Error| GambitError::input(label, format!("truncated signature file: {}", e));

    let mut magic = [0u8; 4];
    reader.read_exact(&mut magic).map_err(truncated)?;
    if &magic != GSIG_MAGIC {
        return Err(GambitError::input(label, "not a signature file (bad magic bytes)"));
    }

    let version = reader.read_u32::<LittleEndian>().map_err(truncated)?;
    if version != GSIG_VERSION {
        return Err(GambitError::input(label, format!("unsupported signature file version {}", version)));
    }

    let k = reader.read_u32::<LittleEndian>().map_err(truncated)?;
    let prefix = read_bytes(reader, label)?;
    let kspec = KmerSpec::new(k, prefix).map_err(|e| GambitError::input(label, e.to_string()))?;

    let code = reader.read_u8().map_err(truncated)?;
    let dtype = IndexDtype::from_code(code)
        .ok_or_else(|| GambitError::input(label, format!("unknown index type tag {}", code)))?;

    let count = read_len(reader, label)?;

    let meta_bytes = read_bytes(reader, label)?;
    let meta: SignaturesMeta = serde_json::from_slice(&meta_bytes)
        .map_err(|e| GambitError::input(label, format!("invalid metadata: {}", e)))?;

    let mut ids = Vec::with_capacity(count.min(1 << 20));
    for _ in 0..count {
        let bytes = read_bytes(reader, label)?;
        let id = String::from_utf8(bytes).map_err(|_| GambitError::input(label, "signature id is not valid UTF-8"))?;
        ids.push(id);
    }

    let mut bounds = Vec::with_capacity(count.min(1 << 20) + 1);
    for _ in 0..=count {
        bounds.push(reader.read_u64::<LittleEndian>().map_err(truncated)?);
    }

    let raw_len = read_len(reader, label)?;
    let comp_len = read_len(reader, label)?;
    let checksum = reader.read_u64::<LittleEndian>().map_err(truncated)?;

    let mut compressed = vec![0u8; comp_len];
    reader.read_exact(&mut compressed).map_err(truncated)?;
    let raw = zstd::decode_all(compressed.as_slice())
        .map_err(|e| GambitError::input(label, format!("failed to decompress values: {}", e)))?;

    if raw.len() != raw_len {
        return Err(GambitError::input(label, "decompressed value block has wrong length"));
    }
    if xxhash_rust::xxh64::xxh64(&raw, 0) != checksum {
        return Err(GambitError::input(label, "value block checksum mismatch"));
    }

    let invalid = |e: GambitError| GambitError::input(label, e.to_string());
    let signatures: AnySignatureArray = match dtype {
        IndexDtype::U8 => decode_array::<u8>(&raw, &bounds, kspec, label)?.into(),
        IndexDtype::U16 => decode_array::<u16>(&raw, &bounds, kspec, label)?.into(),
        IndexDtype::I32 => decode_array::<i32>(&raw, &bounds, kspec, label)?.into(),
        IndexDtype::U32 => decode_array::<u32>(&raw, &bounds, kspec, label)?.into(),
        IndexDtype::U64 => decode_array::<u64>(&raw, &bounds, kspec, label)?.into(),
    };

    StoredSignatures::new(signatures, ids, meta).map_err(invalid)
}

/// Read signatures from a file
pub fn load_signatures_file<P: AsRef<Path>>(path: P) -> GambitResult<StoredSignatures> {
    let path = path.as_ref();
    let file = File::open(path).map_err(|e| GambitError::input_path(path, e.to_string()))?;
    let stored = load_signatures(&mut BufReader::new(file), &path.display().to_string())?;
    log::debug!(
        "Loaded {} signatures ({}, {}) from {}",
        stored.len(),
        stored.kmerspec(),
        stored.signatures.dtype(),
        path.display()
    );
    Ok(stored)
}

fn encode_values<T: IndexInt>(values: &[T]) -> Vec<u8> {
    let size = T::DTYPE.size();
    let mut raw = Vec::with_capacity(values.len() * size);
    for value in values {
        // Writing into a Vec cannot fail; values are validated non-negative
        let _ = raw.write_uint::<LittleEndian>(value.to_u64(), size);
    }
    raw
}

fn decode_array<T: IndexInt>(raw: &[u8], bounds: &[u64], kspec: KmerSpec, label: &str) -> GambitResult<SignatureArray<T>> {
    let size = T::DTYPE.size();
    if raw.len() % size != 0 {
        return Err(GambitError::input(label, "value block length is not a multiple of the index size"));
    }

    let mut values = Vec::with_capacity(raw.len() / size);
    let mut cursor = raw;
    while !cursor.is_empty() {
        let v = cursor.read_uint::<LittleEndian>(size)?;
        let v = T::from_u64(v).ok_or_else(|| GambitError::input(label, "stored value does not fit its index type"))?;
        values.push(v);
    }

    SignatureArray::from_arrays(values, bounds, kspec).map_err(|e| GambitError::input(label, e.to_string()))
}

fn write_bytes<W: Write>(writer: &mut W, bytes: &[u8]) -> GambitResult<()> {
    writer.write_u32::<LittleEndian>(bytes.len() as u32)?;
    writer.write_all(bytes)?;
    Ok(())
}

fn read_bytes<R: Read>(reader: &mut R, label: &str) -> GambitResult<Vec<u8>> {
    let len = reader
        .read_u32::<LittleEndian>()
        .map_err(|e| GambitError::input(label, format!("truncated signature file: {}", e)))? as usize;
    let mut bytes = vec![0u8; len];
    reader
        .read_exact(&mut bytes)
        .map_err(|e| GambitError::input(label, format!("truncated signature file: {}", e)))?;
    Ok(bytes)
}

fn read_len<R: Read>(reader: &mut R, label: &str) -> GambitResult<usize> {
    let len = reader
        .read_u64::<LittleEndian>()
        .map_err(|e| GambitError::input(label, format!("truncated signature file: {}", e)))?;
    if len > MAX_FIELD_LEN {
        return Err(GambitError::input(label, format!("implausible length field {}", len)));
    }
    usize::try_from(len).map_err(|_| GambitError::input(label, format!("length {} too large", len)))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    fn example() -> StoredSignatures {
        let kspec = KmerSpec::new(8, "ATGAC").unwrap();
        let sigs = vec![vec![1u64, 5, 9], vec![], vec![0, 2, 65535]];
        let signatures = AnySignatureArray::build(&sigs, kspec, None).unwrap();
        let ids = vec!["a".to_string(), "b".to_string(), "c".to_string()];
        let mut meta = SignaturesMeta::with_name("test");
        meta.id_attr = Some("key".to_string());
        StoredSignatures::new(signatures, ids, meta).unwrap()
    }

    fn encode(stored: &StoredSignatures) -> Vec<u8> {
        let mut buf = Vec::new();
        write_signatures(&mut buf, &stored.signatures, &stored.ids, &stored.meta).unwrap();
        buf
    }

    #[test]
    fn test_store_roundtrip() -> GambitResult<()> {
        let stored = example();
        let buf = encode(&stored);
        assert_eq!(&buf[..4], b"GSIG");

        let loaded = load_signatures(&mut Cursor::new(buf), "mem")?;
        assert_eq!(loaded, stored);
        assert_eq!(loaded.signatures.dtype(), IndexDtype::U16);
        Ok(())
    }

    #[test]
    fn test_store_file_roundtrip() -> GambitResult<()> {
        let stored = example();
        let tmp = tempfile::NamedTempFile::new()?;
        write_signatures_file(tmp.path(), &stored.signatures, &stored.ids, &stored.meta)?;
        let loaded = load_signatures_file(tmp.path())?;
        assert_eq!(loaded.ids, stored.ids);
        assert_eq!(loaded.meta, stored.meta);
        Ok(())
    }

    #[test]
    fn test_rejects_bad_magic() {
        let mut buf = encode(&example());
        buf[0] = b'X';
        let err = load_signatures(&mut Cursor::new(buf), "mem").unwrap_err();
        assert!(matches!(err, GambitError::Input { .. }));
    }

    #[test]
    fn test_rejects_checksum_mismatch() {
        let stored = example();
        let mut buf = encode(&stored);

        // Checksum is the 8 bytes before the compressed block
        let comp_len = {
            let raw = with_array!(&stored.signatures, a => encode_values(a.values()));
            zstd::encode_all(raw.as_slice(), ZSTD_LEVEL).unwrap().len()
        };
        let pos = buf.len() - comp_len - 1;
        buf[pos] ^= 0xff;

        let err = load_signatures(&mut Cursor::new(buf), "mem").unwrap_err();
        assert!(err.to_string().contains("checksum"));
    }

    #[test]
    fn test_rejects_truncated() {
        let buf = encode(&example());
        for len in [2, 10, buf.len() / 2, buf.len() - 1] {
            let err = load_signatures(&mut Cursor::new(&buf[..len]), "mem").unwrap_err();
            assert!(matches!(err, GambitError::Input { .. }), "len={}", len);
        }
    }

    #[test]
    fn test_id_count_mismatch() {
        let stored = example();
        let mut buf = Vec::new();
        let err = write_signatures(&mut buf, &stored.signatures, &stored.ids[..2], &stored.meta).unwrap_err();
        assert!(err.is_validation());
        assert!(buf.is_empty());
    }
}
