use std::io::Write;

use super::ResultsExporter;
use crate::error::GambitResult;
use crate::query::{QueryResultItem, QueryResults};
use crate::taxonomy::Taxon;

const COLUMNS: [&str; 11] = [
    "query",
    "predicted.name",
    "predicted.rank",
    "predicted.ncbi_id",
    "predicted.threshold",
    "closest.distance",
    "closest.description",
    "next.name",
    "next.rank",
    "next.ncbi_id",
    "next.threshold",
];

/// One row per query with the predicted, closest and next taxa
#[derive(Debug, Clone)]
pub struct CsvResultsExporter {
    pub delimiter: u8,
}

impl Default for CsvResultsExporter {
    fn default() -> Self {
        Self { delimiter: b',' }
    }
}

fn taxon_fields(taxon: Option<&Taxon>) -> [String; 4] {
    match taxon {
        Some(t) => [
            t.name.clone(),
            t.rank.clone().unwrap_or_default(),
            t.ncbi_id.map(|id| id.to_string()).unwrap_or_default(),
            t.distance_threshold.map(|d| d.to_string()).unwrap_or_default(),
        ],
        None => Default::default(),
    }
}

fn row(item: &QueryResultItem) -> Vec<String> {
    let result = &item.classifier_result;
    let mut row = Vec::with_capacity(COLUMNS.len());

    row.push(item.input.label.clone());
    row.extend(taxon_fields(result.predicted_taxon.as_ref()));

    match &result.closest_match {
        Some(m) => {
            row.push(m.distance.to_string());
            row.push(m.genome.description.clone());
        }
        None => row.extend([String::new(), String::new()]),
    }

    row.extend(taxon_fields(result.next_taxon.as_ref()));
    row
}

impl ResultsExporter for CsvResultsExporter {
    fn write_results(&self, writer: &mut dyn Write, results: &QueryResults) -> GambitResult<()> {
        let mut csv = csv::WriterBuilder::new().delimiter(self.delimiter).from_writer(writer);

        csv.write_record(COLUMNS)?;
        for item in &results.items {
            csv.write_record(row(item))?;
        }
        csv.flush()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::results::export_to_string;
    use crate::results::tests::example_results;

    #[test]
    fn test_csv_rows() {
        let text = export_to_string(&CsvResultsExporter::default(), &example_results()).unwrap();
        let mut reader = csv::Reader::from_reader(text.as_bytes());

        let headers: Vec<String> = reader.headers().unwrap().iter().map(String::from).collect();
        assert_eq!(headers, COLUMNS);

        let rows: Vec<csv::StringRecord> = reader.records().map(|r| r.unwrap()).collect();
        assert_eq!(rows.len(), 2);

        let ok = &rows[0];
        assert_eq!(&ok[0], "query1.fa");
        assert_eq!(&ok[1], "Genus species");
        assert_eq!(&ok[2], "species");
        assert_eq!(&ok[3], "1002");
        assert_eq!(&ok[4], "0.3");
        assert_eq!(&ok[5], "0.25");
        // Comma in the description is quoted, not split
        assert_eq!(&ok[6], "Genus species strain, 1");
        assert_eq!(&ok[7], "Genus species A");

        let failed = &rows[1];
        assert_eq!(&failed[0], "query2.fa");
        assert!(failed.iter().skip(1).all(|f| f.is_empty()));
    }

    #[test]
    fn test_tab_delimiter() {
        let exporter = CsvResultsExporter { delimiter: b'\t' };
        let text = export_to_string(&exporter, &example_results()).unwrap();
        assert!(text.lines().next().unwrap().starts_with("query\tpredicted.name"));
    }
}
