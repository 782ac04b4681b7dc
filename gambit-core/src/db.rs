//! Reference database: genome set, taxonomy and reference signatures
//!
//! A database directory holds one genome file (`*.gdb.json`) and one
//! signature file (`*.gs`). Genomes are matched to signatures by key.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fs::File;
use std::io::{BufReader, BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;
use crate::signatures::{load_signatures_file, StoredSignatures};
use crate::taxonomy::{Taxon, TaxonId, Taxonomy};

pub const GENOMES_EXTENSION: &str = ".gdb.json";
pub const SIGNATURES_EXTENSION: &str = ".gs";

/// Identifies a collection of reference genomes and its version
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReferenceGenomeSet {
    pub key: String,
    #[serde(default)]
    pub version: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// A reference genome with its assigned taxon
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnnotatedGenome {
    pub key: String,
    #[serde(default)]
    pub description: String,
    pub taxon_id: TaxonId,
}

/// On-disk JSON layout of the genome file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GenomeDatabase {
    pub genomeset: ReferenceGenomeSet,
    pub taxa: Vec<Taxon>,
    pub genomes: Vec<AnnotatedGenome>,
}

impl GenomeDatabase {
    pub fn load_from_file<P: AsRef<Path>>(path: P) -> GambitResult<Self> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|e| GambitError::input_path(path, e.to_string()))?;
        serde_json::from_reader(BufReader::new(file))
            .map_err(|e| GambitError::input_path(path, format!("invalid genome database: {}", e)))
    }

    pub fn save_to_file<P: AsRef<Path>>(&self, path: P) -> GambitResult<()> {
        let mut writer = BufWriter::new(File::create(path.as_ref())?);
        serde_json::to_writer_pretty(&mut writer, self)?;
        writer.flush()?;
        Ok(())
    }
}

/// Everything needed to classify queries
#[derive(Debug, Clone)]
pub struct ReferenceDatabase {
    genomeset: ReferenceGenomeSet,
    taxonomy: Taxonomy,
    genomes: Vec<AnnotatedGenome>,
    signatures: StoredSignatures,
    /// Position in `signatures` of each genome's signature
    ref_indices: Vec<usize>,
}

impl ReferenceDatabase {
    /// Link genomes to their taxa and signatures
    pub fn new(
        genomeset: ReferenceGenomeSet,
        taxonomy: Taxonomy,
        genomes: Vec<AnnotatedGenome>,
        signatures: StoredSignatures,
    ) -> GambitResult<Self> {
        let mut by_id = HashMap::with_capacity(signatures.ids.len());
        for (i, id) in signatures.ids.iter().enumerate() {
            if by_id.insert(id.as_str(), i).is_some() {
                return Err(GambitError::validation(format!("duplicate signature id {:?}", id)));
            }
        }

        let mut ref_indices = Vec::with_capacity(genomes.len());
        for genome in &genomes {
            if !taxonomy.contains(genome.taxon_id) {
                return Err(GambitError::validation(format!(
                    "genome {:?} has unknown taxon {}",
                    genome.key, genome.taxon_id
                )));
            }
            let index = by_id.get(genome.key.as_str()).ok_or_else(|| {
                GambitError::validation(format!("no signature for genome {:?}", genome.key))
            })?;
            ref_indices.push(*index);
        }

        if genomes.len() < signatures.len() {
            log::warn!(
                "{} signatures have no matching genome and will be ignored",
                signatures.len() - genomes.len()
            );
        }

        Ok(Self {
            genomeset,
            taxonomy,
            genomes,
            signatures,
            ref_indices,
        })
    }

    /// Load from a genome file and a signature file
    pub fn load<P: AsRef<Path>, Q: AsRef<Path>>(genomes_path: P, signatures_path: Q) -> GambitResult<Self> {
        let gdb = GenomeDatabase::load_from_file(genomes_path)?;
        let signatures = load_signatures_file(signatures_path)?;
        let taxonomy = Taxonomy::new(gdb.taxa)?;
        let db = Self::new(gdb.genomeset, taxonomy, gdb.genomes, signatures)?;

        log::info!(
            "Loaded database {} ({} genomes, {} taxa, {})",
            db.genomeset.key,
            db.genomes.len(),
            db.taxonomy.len(),
            db.kmerspec()
        );
        Ok(db)
    }

    /// Load the single genome file and signature file found in `dir`
    pub fn load_dir<P: AsRef<Path>>(dir: P) -> GambitResult<Self> {
        let dir = dir.as_ref();
        let genomes_path = find_one(dir, GENOMES_EXTENSION)?;
        let signatures_path = find_one(dir, SIGNATURES_EXTENSION)?;
        Self::load(genomes_path, signatures_path)
    }

    pub fn genomeset(&self) -> &ReferenceGenomeSet {
        &self.genomeset
    }

    pub fn taxonomy(&self) -> &Taxonomy {
        &self.taxonomy
    }

    pub fn genomes(&self) -> &[AnnotatedGenome] {
        &self.genomes
    }

    pub fn signatures(&self) -> &StoredSignatures {
        &self.signatures
    }

    pub fn ref_indices(&self) -> &[usize] {
        &self.ref_indices
    }

    pub fn kmerspec(&self) -> &KmerSpec {
        self.signatures.kmerspec()
    }
}

/// Exactly one file in `dir` whose name ends with `suffix`
fn find_one(dir: &Path, suffix: &str) -> GambitResult<PathBuf> {
    let entries = std::fs::read_dir(dir).map_err(|e| GambitError::input_path(dir, e.to_string()))?;

    let mut found = Vec::new();
    for entry in entries {
        let path = entry?.path();
        let matches = path
            .file_name()
            .and_then(|n| n.to_str())
            .is_some_and(|n| n.ends_with(suffix));
        if matches && path.is_file() {
            found.push(path);
        }
    }

    match found.len() {
        1 => Ok(found.remove(0)),
        0 => Err(GambitError::input_path(dir, format!("no {} file found in database directory", suffix))),
        n => Err(GambitError::input_path(dir, format!("found {} {} files, expected one", n, suffix))),
    }
}
