use serde::Serialize;
use serde_json::ser::{PrettyFormatter, Serializer};
use std::io::Write;

use super::ResultsExporter;
use crate::error::GambitResult;
use crate::query::QueryResults;

/// Full results as a single JSON document
#[derive(Debug, Clone, Default)]
pub struct JsonResultsExporter {
    /// Indented output instead of a single line
    pub pretty: bool,
}

impl ResultsExporter for JsonResultsExporter {
    fn write_results(&self, writer: &mut dyn Write, results: &QueryResults) -> GambitResult<()> {
        if self.pretty {
            let mut ser = Serializer::with_formatter(writer, PrettyFormatter::with_indent(b"    "));
            results.serialize(&mut ser)?;
        } else {
            serde_json::to_writer(writer, results)?;
        }
        Ok(())
    }
}
