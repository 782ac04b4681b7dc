//! Command implementations for the GAMBIT CLI

pub mod dist;
pub mod query;
pub mod signatures;
pub mod worker;

use anyhow::{Context, Result};
use gambit_core::{KmerSpec, ProgressConfig, ReferenceDatabase};
use std::path::{Path, PathBuf};

use crate::config::Config;
use crate::error::CliError;

/// State shared by all commands
pub struct AppContext {
    pub config: Config,
    pub db: Option<PathBuf>,
    pub progress: ProgressConfig,
}

impl AppContext {
    pub fn load_db(&self) -> Result<ReferenceDatabase> {
        let dir = self.db.as_ref().ok_or(CliError::NoDatabase)?;
        ReferenceDatabase::load_dir(dir)
            .with_context(|| format!("Failed to load reference database from {}", dir.display()))
    }

    /// K-mer parameters from flags, falling back to the configuration
    pub fn kmerspec(&self, k: Option<u32>, prefix: Option<&str>) -> Result<KmerSpec> {
        let mut kmers = self.config.kmers.clone();
        if let Some(k) = k {
            kmers.k = k;
        }
        if let Some(prefix) = prefix {
            kmers.prefix = prefix.to_string();
        }
        kmers.kmerspec()
    }
}

/// Paths listed one per line in `listfile`, relative to `ldir`
pub fn read_list_file(listfile: &Path, ldir: &Path) -> Result<Vec<PathBuf>> {
    let content = std::fs::read_to_string(listfile)
        .with_context(|| format!("Failed to read list file: {}", listfile.display()))?;

    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(|line| ldir.join(line))
        .collect())
}

/// Genome files from positional arguments or a list file, all of which must exist
pub fn collect_genome_files(files: &[PathBuf], listfile: Option<&Path>, ldir: &Path) -> Result<Vec<PathBuf>> {
    let paths = match listfile {
        Some(listfile) => read_list_file(listfile, ldir)?,
        None => files.to_vec(),
    };

    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
        return Err(CliError::file_not_found(missing.clone()).into());
    }
    Ok(paths)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_read_list_file() -> Result<()> {
        let dir = TempDir::new()?;
        let list = dir.path().join("genomes.txt");
        std::fs::write(&list, "a.fasta\n\n  b.fasta.gz  \n")?;

        let paths = read_list_file(&list, Path::new("/data"))?;
        assert_eq!(paths, vec![PathBuf::from("/data/a.fasta"), PathBuf::from("/data/b.fasta.gz")]);
        Ok(())
    }

    #[test]
    fn test_missing_genome_file() -> Result<()> {
        let dir = TempDir::new()?;
        let present = dir.path().join("a.fasta");
        std::fs::write(&present, ">a\nACGT\n")?;

        let files = vec![present.clone(), dir.path().join("b.fasta")];
        let err = collect_genome_files(&files, None, Path::new(".")).unwrap_err();
        assert!(matches!(err.downcast_ref::<CliError>(), Some(CliError::FileNotFound { .. })));

        assert_eq!(collect_genome_files(&files[..1], None, Path::new("."))?, vec![present]);
        Ok(())
    }
}
