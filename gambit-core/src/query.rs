//! Query pipeline: signatures in, classified results out

use chrono::{DateTime, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::classify::{classify, make_match, ClassifierResult, Match};
use crate::concurrency::Concurrency;
use crate::db::{ReferenceDatabase, ReferenceGenomeSet};
use crate::error::{GambitError, GambitResult};
use crate::metric::{jaccarddist_matrix_any, MatrixOptions, DEFAULT_CHUNKSIZE};
use crate::progress::ProgressConfig;
use crate::seq::SequenceFile;
use crate::signatures::{AnySignatureArray, Signature, SignaturesMeta};
use crate::taxonomy::Taxon;

fn default_chunksize() -> usize {
    DEFAULT_CHUNKSIZE
}

fn default_report_closest() -> usize {
    10
}

/// Parameters for running a query
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct QueryParams {
    #[serde(default)]
    pub classify_strict: bool,

    #[serde(default = "default_chunksize")]
    pub chunksize: usize,

    /// Number of closest reference genomes listed per query
    #[serde(default = "default_report_closest")]
    pub report_closest: usize,
}

impl Default for QueryParams {
    fn default() -> Self {
        Self {
            classify_strict: false,
            chunksize: default_chunksize(),
            report_closest: default_report_closest(),
        }
    }
}

/// Identifies one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryInput {
    pub label: String,
    pub file: Option<SequenceFile>,
}

impl QueryInput {
    pub fn new<S: Into<String>>(label: S) -> Self {
        Self {
            label: label.into(),
            file: None,
        }
    }

    /// Input labeled with the file's name
    pub fn from_file(file: SequenceFile) -> Self {
        let label = file
            .path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| file.path.display().to_string());
        Self { label, file: Some(file) }
    }
}

/// Result for one query
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryResultItem {
    pub input: QueryInput,
    pub classifier_result: ClassifierResult,
    /// Nearest ancestor-or-self of the predicted taxon flagged for reporting
    pub report_taxon: Option<Taxon>,
    /// Nearest reference genomes by ascending distance
    pub closest_genomes: Vec<Match>,
}

/// Results of a query against a reference database
#[derive(Debug, Clone, Serialize)]
pub struct QueryResults {
    pub items: Vec<QueryResultItem>,
    pub params: QueryParams,
    pub genomeset: ReferenceGenomeSet,
    pub signaturesmeta: SignaturesMeta,
    pub gambit_version: String,
    pub timestamp: DateTime<Utc>,
}

impl QueryResults {
    fn new(db: &ReferenceDatabase, params: &QueryParams, items: Vec<QueryResultItem>) -> Self {
        Self {
            items,
            params: params.clone(),
            genomeset: db.genomeset().clone(),
            signaturesmeta: db.signatures().meta.clone(),
            gambit_version: env!("CARGO_PKG_VERSION").to_string(),
            timestamp: Utc::now(),
        }
    }
}

struct Classified {
    result: ClassifierResult,
    report_taxon: Option<Taxon>,
    closest_genomes: Vec<Match>,
}

fn classify_queries(
    db: &ReferenceDatabase,
    queries: &AnySignatureArray,
    params: &QueryParams,
    progress: &ProgressConfig,
) -> GambitResult<Vec<Classified>> {
    if queries.kmerspec() != db.kmerspec() {
        return Err(GambitError::validation(format!(
            "query signatures use {} but the database uses {}",
            queries.kmerspec(),
            db.kmerspec()
        )));
    }

    log::debug!("Computing distances for {} queries against {} genomes", queries.len(), db.genomes().len());

    let opts = MatrixOptions::default()
        .with_ref_indices(db.ref_indices())
        .with_chunksize(params.chunksize)
        .with_progress(progress.clone());
    let dmat = jaccarddist_matrix_any(queries, &db.signatures().signatures, &opts)?;

    let taxonomy = db.taxonomy();
    let genomes = db.genomes();

    let classified = (0..dmat.nrows())
        .into_par_iter()
        .map(|i| {
            let distances = dmat.row(i);
            log::trace!("Query {}: assigning taxon", i);

            let result = classify(taxonomy, genomes, distances, params.classify_strict);
            let report_taxon = result
                .predicted_taxon
                .as_ref()
                .and_then(|t| taxonomy.report_taxon(t.id))
                .cloned();
            let closest_genomes = closest_genomes(db, distances, params.report_closest);

            log::trace!("Query {}: done, predicted {:?}", i, result.predicted_taxon.as_ref().map(|t| &t.name));
            Classified {
                result,
                report_taxon,
                closest_genomes,
            }
        })
        .collect();

    Ok(classified)
}

/// `n` nearest genomes, ties kept in reference order
fn closest_genomes(db: &ReferenceDatabase, distances: &[f32], n: usize) -> Vec<Match> {
    let mut order: Vec<usize> = (0..distances.len()).collect();
    order.sort_by(|&a, &b| distances[a].total_cmp(&distances[b]));
    order
        .into_iter()
        .take(n)
        .map(|i| make_match(db.taxonomy(), db.genomes(), distances, i))
        .collect()
}

/// Classify precomputed query signatures
///
/// `inputs` describes each query and must have one entry per signature.
pub fn query(
    db: &ReferenceDatabase,
    queries: &AnySignatureArray,
    params: &QueryParams,
    inputs: Vec<QueryInput>,
    progress: &ProgressConfig,
) -> GambitResult<QueryResults> {
    if inputs.len() != queries.len() {
        return Err(GambitError::validation(format!(
            "got {} query inputs for {} signatures",
            inputs.len(),
            queries.len()
        )));
    }

    let classified = classify_queries(db, queries, params, progress)?;
    let items = inputs
        .into_iter()
        .zip(classified)
        .map(|(input, c)| QueryResultItem {
            input,
            classifier_result: c.result,
            report_taxon: c.report_taxon,
            closest_genomes: c.closest_genomes,
        })
        .collect();

    Ok(QueryResults::new(db, params, items))
}

/// Compute signatures for sequence files and classify them
///
/// Signatures are computed with `concurrency`. A file that cannot be read or
/// parsed gets a failed result of its own; the remaining queries are
/// unaffected.
pub fn query_parse(
    db: &ReferenceDatabase,
    files: &[SequenceFile],
    params: &QueryParams,
    concurrency: &Concurrency,
    progress: &ProgressConfig,
) -> GambitResult<QueryResults> {
    let kspec = db.kmerspec();

    log::debug!("Calculating query signatures for {} files ({:?})", files.len(), concurrency);
    let signatures = concurrency.executor()?.compute_each(kspec, files, progress);

    let ok: Vec<&Signature> = signatures.iter().filter_map(|s| s.as_ref().ok()).collect();
    let queries = AnySignatureArray::build(ok, kspec.clone(), None)?;
    let mut classified = classify_queries(db, &queries, params, progress)?.into_iter();

    let mut items = Vec::with_capacity(files.len());
    for (file, sig) in files.iter().zip(&signatures) {
        let input = QueryInput::from_file(file.clone());
        let item = match sig {
            Err(e) => {
                log::warn!("{}: {}", input.label, e);
                QueryResultItem {
                    input,
                    classifier_result: ClassifierResult::failed(e.to_string()),
                    report_taxon: None,
                    closest_genomes: Vec::new(),
                }
            }
            Ok(_) => {
                let c = classified
                    .next()
                    .ok_or_else(|| GambitError::validation("classification results out of step with inputs"))?;
                QueryResultItem {
                    input,
                    classifier_result: c.result,
                    report_taxon: c.report_taxon,
                    closest_genomes: c.closest_genomes,
                }
            }
        };
        items.push(item);
    }

    Ok(QueryResults::new(db, params, items))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_params_defaults() {
        let params: QueryParams = serde_json::from_str("{}").unwrap();
        assert_eq!(params, QueryParams::default());
        assert_eq!(params.chunksize, 1000);
        assert_eq!(params.report_closest, 10);
        assert!(!params.classify_strict);
    }

    #[test]
    fn test_input_label_from_file() {
        let input = QueryInput::from_file(SequenceFile::fasta("/data/queries/sample1.fasta.gz"));
        assert_eq!(input.label, "sample1.fasta.gz");
        assert!(input.file.is_some());
    }
}
