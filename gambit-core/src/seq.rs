//! Sequence file input
//!
//! FASTA and FASTQ parsing uses needletail. Gzip-compressed files are
//! decompressed with flate2 before parsing.

use flate2::read::GzDecoder;
use needletail::errors::ParseErrorKind;
use needletail::parse_fastx_reader;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufReader, Read};
use std::path::{Path, PathBuf};
use std::str::FromStr;

use crate::error::{GambitError, GambitResult};

/// Sequence file format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SeqFormat {
    Fasta,
    Fastq,
}

impl fmt::Display for SeqFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SeqFormat::Fasta => f.write_str("fasta"),
            SeqFormat::Fastq => f.write_str("fastq"),
        }
    }
}

impl FromStr for SeqFormat {
    type Err = GambitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "fasta" | "fa" | "fna" => Ok(SeqFormat::Fasta),
            "fastq" | "fq" => Ok(SeqFormat::Fastq),
            other => Err(GambitError::validation(format!("unknown sequence format: {}", other))),
        }
    }
}

/// Compression applied to a sequence file
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Compression {
    None,
    Gzip,
    /// Gzip if the file name ends in `.gz`
    #[default]
    Auto,
}

/// Location and format of a sequence file on disk
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SequenceFile {
    pub path: PathBuf,
    pub format: SeqFormat,
    #[serde(default)]
    pub compression: Compression,
}

impl SequenceFile {
    pub fn new<P: Into<PathBuf>>(path: P, format: SeqFormat, compression: Compression) -> Self {
        Self {
            path: path.into(),
            format,
            compression,
        }
    }

    /// FASTA file with compression detected from the file name
    pub fn fasta<P: Into<PathBuf>>(path: P) -> Self {
        Self::new(path, SeqFormat::Fasta, Compression::Auto)
    }

    pub fn from_paths<I, P>(paths: I, format: SeqFormat) -> Vec<Self>
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        paths
            .into_iter()
            .map(|p| Self::new(p, format, Compression::Auto))
            .collect()
    }

    pub fn is_gzipped(&self) -> bool {
        match self.compression {
            Compression::None => false,
            Compression::Gzip => true,
            Compression::Auto => self.path.extension().is_some_and(|ext| ext == "gz"),
        }
    }

    /// File name without sequence and compression extensions
    pub fn stem(&self) -> String {
        file_stem(&self.path)
    }

    /// Open for reading, decompressing if needed
    pub fn open(&self) -> GambitResult<Box<dyn Read + Send>> {
        let file = File::open(&self.path).map_err(|e| GambitError::input_path(&self.path, e.to_string()))?;

        if self.is_gzipped() {
            Ok(Box::new(BufReader::new(GzDecoder::new(file))))
        } else {
            Ok(Box::new(BufReader::new(file)))
        }
    }
}

/// Strip directory and common sequence file extensions from a path
pub fn file_stem(path: &Path) -> String {
    let mut name = path
        .file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_default();

    if let Some(stripped) = name.strip_suffix(".gz") {
        name = stripped.to_string();
    }
    for ext in [".fasta", ".fastq", ".fna", ".fa", ".fq", ".ffn"] {
        if let Some(stripped) = name.strip_suffix(ext) {
            return stripped.to_string();
        }
    }
    name
}

/// Where sequence data is read from
pub enum SequenceSource<'a> {
    /// File opened and closed by the reader
    Path(SequenceFile),
    /// Caller-owned stream, left open; `label` names it in errors
    Reader {
        reader: Box<dyn Read + Send + 'a>,
        label: String,
    },
}

impl<'a> SequenceSource<'a> {
    pub fn reader<R: Read + Send + 'a, S: Into<String>>(reader: R, label: S) -> Self {
        SequenceSource::Reader {
            reader: Box::new(reader),
            label: label.into(),
        }
    }

    pub fn label(&self) -> String {
        match self {
            SequenceSource::Path(file) => file.path.display().to_string(),
            SequenceSource::Reader { label, .. } => label.clone(),
        }
    }
}

impl From<SequenceFile> for SequenceSource<'_> {
    fn from(file: SequenceFile) -> Self {
        SequenceSource::Path(file)
    }
}

/// Call `f` with the sequence of each record in `source`
///
/// Multi-line FASTA records are joined before being passed on. An empty input
/// has no records and is not an error. Returns the number of records read.
pub fn for_each_record<F>(source: SequenceSource<'_>, format: SeqFormat, mut f: F) -> GambitResult<usize>
where
    F: FnMut(&[u8]),
{
    let label = source.label();
    let reader: Box<dyn Read + Send + '_> = match source {
        SequenceSource::Path(file) => file.open()?,
        SequenceSource::Reader { reader, .. } => reader,
    };

    let mut fastx = match parse_fastx_reader(reader) {
        Ok(fastx) => fastx,
        Err(e) if matches!(e.kind, ParseErrorKind::EmptyFile) => return Ok(0),
        Err(e) => return Err(GambitError::input(label, e.to_string())),
    };

    let mut count = 0;
    while let Some(record) = fastx.next() {
        let record = record.map_err(|e| GambitError::input(label.as_str(), e.to_string()))?;

        let actual = match record.format() {
            needletail::parser::Format::Fasta => SeqFormat::Fasta,
            needletail::parser::Format::Fastq => SeqFormat::Fastq,
        };
        if actual != format {
            return Err(GambitError::input(
                label.as_str(),
                format!("expected {} records, found {}", format, actual),
            ));
        }

        let seq = record.seq();
        f(seq.as_ref());
        count += 1;
    }

    log::trace!("Read {} records from {}", count, label);
    Ok(count)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::{Cursor, Write};

    fn collect(source: SequenceSource<'_>, format: SeqFormat) -> GambitResult<Vec<Vec<u8>>> {
        let mut seqs = Vec::new();
        for_each_record(source, format, |seq| seqs.push(seq.to_vec()))?;
        Ok(seqs)
    }

    #[test]
    fn test_read_fasta_reader() {
        let data = b">seq1\nACGT\nAACC\n>seq2 desc\nGGGG\n";
        let seqs = collect(SequenceSource::reader(Cursor::new(&data[..]), "mem"), SeqFormat::Fasta).unwrap();
        assert_eq!(seqs, vec![b"ACGTAACC".to_vec(), b"GGGG".to_vec()]);
    }

    #[test]
    fn test_read_fastq() {
        let data = b"@r1\nACGT\n+\nIIII\n@r2\nTTTT\n+\nIIII\n";
        let seqs = collect(SequenceSource::reader(Cursor::new(&data[..]), "mem"), SeqFormat::Fastq).unwrap();
        assert_eq!(seqs.len(), 2);

        let err = collect(SequenceSource::reader(Cursor::new(&data[..]), "mem"), SeqFormat::Fasta).unwrap_err();
        assert!(matches!(err, GambitError::Input { .. }));
    }

    #[test]
    fn test_empty_input_has_no_records() {
        let n = for_each_record(SequenceSource::reader(Cursor::new(Vec::new()), "empty"), SeqFormat::Fasta, |_| {}).unwrap();
        assert_eq!(n, 0);
    }

    #[test]
    fn test_malformed_input() {
        let err = collect(SequenceSource::reader(Cursor::new(&b"not a fasta file"[..]), "bad"), SeqFormat::Fasta).unwrap_err();
        match err {
            GambitError::Input { file, .. } => assert_eq!(file, "bad"),
            other => panic!("unexpected error {:?}", other),
        }
    }

    #[test]
    fn test_gzipped_file() -> GambitResult<()> {
        use flate2::write::GzEncoder;

        let dir = tempfile::tempdir()?;
        let path = dir.path().join("genome.fasta.gz");
        let mut encoder = GzEncoder::new(File::create(&path)?, flate2::Compression::default());
        encoder.write_all(b">chr\nACGTACGT\n")?;
        encoder.finish()?;

        let file = SequenceFile::fasta(&path);
        assert!(file.is_gzipped());
        assert_eq!(file.stem(), "genome");
        assert_eq!(collect(file.into(), SeqFormat::Fasta)?, vec![b"ACGTACGT".to_vec()]);
        Ok(())
    }

    #[test]
    fn test_missing_file_is_input_error() {
        let file = SequenceFile::fasta("/nonexistent/genome.fa");
        let err = collect(file.into(), SeqFormat::Fasta).unwrap_err();
        assert!(matches!(err, GambitError::Input { .. }));
    }

    #[test]
    fn test_file_stem_and_format_parse() {
        assert_eq!(file_stem(Path::new("/a/b/GCF_0001.fna.gz")), "GCF_0001");
        assert_eq!(file_stem(Path::new("reads.fq")), "reads");
        assert_eq!(file_stem(Path::new("plain")), "plain");
        assert_eq!("FASTQ".parse::<SeqFormat>().unwrap(), SeqFormat::Fastq);
        assert!("bam".parse::<SeqFormat>().is_err());
    }
}
