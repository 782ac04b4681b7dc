//! Configuration handling for the GAMBIT CLI
//!
//! Supports loading configuration from gambit.toml files with CLI argument overrides.

use anyhow::{Context, Result};
use gambit_core::concurrency::{Concurrency, WorkerCommand};
use gambit_core::results::ExportFormat;
use gambit_core::{KmerSpec, QueryParams};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_CONFIG_FILE: &str = "gambit.toml";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub general: GeneralConfig,
    #[serde(default)]
    pub kmers: KmersConfig,
    #[serde(default)]
    pub query: QueryConfig,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyMode {
    Sequential,
    #[default]
    Threads,
    Processes,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GeneralConfig {
    /// Number of worker threads or processes
    #[serde(default = "default_threads")]
    pub threads: usize,

    /// Backend for batch signature calculation
    #[serde(default)]
    pub concurrency: ConcurrencyMode,

    /// Show progress bars on stderr
    #[serde(default = "default_true")]
    pub progress: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct KmersConfig {
    /// Default k-mer length for new signatures
    #[serde(default = "default_k")]
    pub k: u32,

    /// Default k-mer prefix for new signatures
    #[serde(default = "default_prefix")]
    pub prefix: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QueryConfig {
    /// Strict classification mode
    #[serde(default)]
    pub strict: bool,

    /// Reference columns per distance calculation pass
    #[serde(default = "default_chunksize")]
    pub chunksize: usize,

    /// Closest reference genomes listed per query
    #[serde(default = "default_report_closest")]
    pub report_closest: usize,

    /// Results format
    #[serde(default)]
    pub outfmt: ExportFormat,
}

// Default value functions
fn default_threads() -> usize { num_cpus::get() }
fn default_true() -> bool { true }
fn default_k() -> u32 { 11 }
fn default_prefix() -> String { "ATGAC".to_string() }
fn default_chunksize() -> usize { QueryParams::default().chunksize }
fn default_report_closest() -> usize { QueryParams::default().report_closest }

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            threads: default_threads(),
            concurrency: ConcurrencyMode::default(),
            progress: true,
        }
    }
}

impl Default for KmersConfig {
    fn default() -> Self {
        Self {
            k: default_k(),
            prefix: default_prefix(),
        }
    }
}

impl Default for QueryConfig {
    fn default() -> Self {
        Self {
            strict: false,
            chunksize: default_chunksize(),
            report_closest: default_report_closest(),
            outfmt: ExportFormat::default(),
        }
    }
}

impl KmersConfig {
    pub fn kmerspec(&self) -> Result<KmerSpec> {
        KmerSpec::new(self.k, &self.prefix)
            .with_context(|| format!("Invalid k-mer settings k={} prefix={}", self.k, self.prefix))
    }
}

impl QueryConfig {
    pub fn params(&self) -> QueryParams {
        QueryParams {
            classify_strict: self.strict,
            chunksize: self.chunksize,
            report_closest: self.report_closest,
        }
    }
}

impl GeneralConfig {
    /// Batch calculation backend for the configured mode and worker count
    pub fn concurrency(&self) -> Result<Concurrency> {
        let workers = self.threads.max(1);
        Ok(match self.concurrency {
            ConcurrencyMode::Sequential => Concurrency::Sequential,
            ConcurrencyMode::Threads => Concurrency::Threads { workers },
            ConcurrencyMode::Processes => Concurrency::Processes {
                workers,
                command: WorkerCommand::current_exe().context("Failed to locate the gambit executable")?,
            },
        })
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(config_path: Option<&Path>) -> Result<Self> {
        let config = match config_path {
            Some(path) => {
                log::info!("Loading configuration from: {}", path.display());
                Self::load_from_file(path)?
            }
            None => {
                let default_path = PathBuf::from(DEFAULT_CONFIG_FILE);
                if default_path.exists() {
                    log::info!("Loading configuration from: {}", DEFAULT_CONFIG_FILE);
                    Self::load_from_file(&default_path)?
                } else {
                    log::debug!("Using default configuration");
                    Self::default()
                }
            }
        };

        Ok(config)
    }

    /// Load configuration from a specific TOML file
    pub fn load_from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read configuration file: {}", path.display()))?;

        let config: Config = toml::from_str(&content)
            .with_context(|| format!("Failed to parse configuration file: {}", path.display()))?;

        Ok(config)
    }

    /// Save configuration to a TOML file
    pub fn save_to_file(&self, path: &Path) -> Result<()> {
        let content = toml::to_string_pretty(self).context("Failed to serialize configuration")?;

        std::fs::write(path, content)
            .with_context(|| format!("Failed to write configuration file: {}", path.display()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::NamedTempFile;

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.kmers.k, 11);
        assert_eq!(config.kmers.prefix, "ATGAC");
        assert_eq!(config.query.chunksize, 1000);
        assert_eq!(config.query.outfmt, ExportFormat::Csv);
        assert!(config.general.threads >= 1);
    }

    #[test]
    fn test_config_roundtrip() -> Result<()> {
        let mut config = Config::default();
        config.query.strict = true;
        config.general.concurrency = ConcurrencyMode::Processes;
        let temp_file = NamedTempFile::new()?;

        config.save_to_file(temp_file.path())?;
        let loaded = Config::load_from_file(temp_file.path())?;

        assert!(loaded.query.strict);
        assert_eq!(loaded.general.concurrency, ConcurrencyMode::Processes);
        assert_eq!(loaded.kmers.prefix, config.kmers.prefix);

        Ok(())
    }

    #[test]
    fn test_partial_file() -> Result<()> {
        let config: Config = toml::from_str("[query]\noutfmt = \"json\"\n\n[kmers]\nk = 9\n")?;
        assert_eq!(config.query.outfmt, ExportFormat::Json);
        assert_eq!(config.query.report_closest, 10);
        assert_eq!(config.kmers.k, 9);
        assert_eq!(config.kmers.prefix, "ATGAC");
        assert!(config.general.progress);
        Ok(())
    }

    #[test]
    fn test_bad_kmers() {
        let kmers = KmersConfig {
            k: 40,
            prefix: "ATG".to_string(),
        };
        assert!(kmers.kmerspec().is_err());
    }
}
