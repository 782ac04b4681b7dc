//! Export of query results

pub mod csv;
pub mod json;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::PathBuf;
use std::str::FromStr;

use crate::error::{GambitError, GambitResult};
use crate::query::QueryResults;

pub use self::csv::CsvResultsExporter;
pub use self::json::JsonResultsExporter;

/// Destination for exported results
pub enum OutputTarget<'a> {
    /// File created, written and closed by the exporter
    Path(PathBuf),
    /// Caller-owned stream, flushed but left open
    Writer(&'a mut dyn Write),
}

/// Writes query results in some format
pub trait ResultsExporter {
    fn write_results(&self, writer: &mut dyn Write, results: &QueryResults) -> GambitResult<()>;

    fn export(&self, target: OutputTarget<'_>, results: &QueryResults) -> GambitResult<()> {
        match target {
            OutputTarget::Path(path) => {
                let file = File::create(&path).map_err(|e| GambitError::input_path(&path, e.to_string()))?;
                let mut writer = BufWriter::new(file);
                self.write_results(&mut writer, results)?;
                writer.flush()?;
                log::info!("Wrote results for {} queries to {}", results.items.len(), path.display());
            }
            OutputTarget::Writer(writer) => {
                self.write_results(writer, results)?;
                writer.flush()?;
            }
        }
        Ok(())
    }
}

/// Export results to an in-memory string
pub fn export_to_string(exporter: &dyn ResultsExporter, results: &QueryResults) -> GambitResult<String> {
    let mut buf = Vec::new();
    exporter.export(OutputTarget::Writer(&mut buf), results)?;
    String::from_utf8(buf).map_err(|e| GambitError::validation(format!("exported results are not UTF-8: {}", e)))
}

/// Supported result formats
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExportFormat {
    #[default]
    Csv,
    Json,
}

impl ExportFormat {
    pub fn exporter(self, pretty: bool) -> Box<dyn ResultsExporter> {
        match self {
            ExportFormat::Csv => Box::new(CsvResultsExporter::default()),
            ExportFormat::Json => Box::new(JsonResultsExporter { pretty }),
        }
    }
}

impl fmt::Display for ExportFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExportFormat::Csv => f.write_str("csv"),
            ExportFormat::Json => f.write_str("json"),
        }
    }
}

impl FromStr for ExportFormat {
    type Err = GambitError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "csv" => Ok(ExportFormat::Csv),
            "json" => Ok(ExportFormat::Json),
            other => Err(GambitError::validation(format!("unknown output format: {}", other))),
        }
    }
}
