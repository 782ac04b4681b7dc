//! Dist command implementation - distance matrix between query and reference genomes

use anyhow::{Context, Result};
use clap::Args;
use gambit_core::error::GambitError;
use gambit_core::metric::jaccarddist_matrix_any;
use gambit_core::signatures::load_signatures_file;
use gambit_core::{
    calc_file_signatures, AnySignatureArray, DistanceMatrix, KmerSpec, MatrixOptions, SeqFormat, SequenceFile,
};
use std::io::Write;
use std::path::{Path, PathBuf};

use super::AppContext;
use crate::error::CliError;

#[derive(Args, Debug)]
pub struct DistArgs {
    /// Query genome files
    #[arg(short = 'q', num_args = 1..)]
    pub query: Vec<PathBuf>,

    /// Query signature file, in place of query genomes
    #[arg(long = "qs", value_name = "SIGFILE")]
    pub query_sigs: Option<PathBuf>,

    /// Reference genome files
    #[arg(short = 'r', num_args = 1..)]
    pub refs: Vec<PathBuf>,

    /// Reference signature file, in place of reference genomes
    #[arg(long = "rs", value_name = "SIGFILE")]
    pub ref_sigs: Option<PathBuf>,

    /// Use the reference genomes of the database given with --db
    #[arg(long)]
    pub use_db: bool,

    /// Output CSV file
    #[arg(short, long, required = true)]
    pub output: PathBuf,

    /// K-mer length when calculating signatures
    #[arg(short)]
    pub k: Option<u32>,

    /// K-mer prefix when calculating signatures
    #[arg(short, long)]
    pub prefix: Option<String>,
}

/// Signatures for one side of the matrix, labeled
struct LabeledSignatures {
    ids: Vec<String>,
    signatures: AnySignatureArray,
    /// Reference order when the signatures come from a database
    ref_indices: Option<Vec<usize>>,
}

fn exactly_one(flags: &[bool], what: &str) -> Result<()> {
    if flags.iter().filter(|&&f| f).count() != 1 {
        return Err(CliError::usage(format!("give exactly one source of {} signatures", what)).into());
    }
    Ok(())
}

fn from_sigfile(path: &Path) -> Result<LabeledSignatures> {
    let sigs = load_signatures_file(path)
        .with_context(|| format!("Failed to load signatures from {}", path.display()))?;
    Ok(LabeledSignatures {
        ids: sigs.ids,
        signatures: sigs.signatures,
        ref_indices: None,
    })
}

fn from_genomes(ctx: &AppContext, paths: &[PathBuf], kspec: &KmerSpec) -> Result<LabeledSignatures> {
    if let Some(missing) = paths.iter().find(|p| !p.is_file()) {
        return Err(CliError::file_not_found(missing.clone()).into());
    }

    let files = SequenceFile::from_paths(paths.iter().cloned(), SeqFormat::Fasta);
    let concurrency = ctx.config.general.concurrency()?;
    let sigs = calc_file_signatures(kspec, &files, &concurrency, &ctx.progress)?;

    Ok(LabeledSignatures {
        ids: files.iter().map(SequenceFile::stem).collect(),
        signatures: AnySignatureArray::build(&sigs, kspec.clone(), None)?,
        ref_indices: None,
    })
}

/// Row per query, column per reference, labeled with signature ids
pub fn write_matrix_csv<W: Write>(
    writer: W,
    query_ids: &[String],
    ref_ids: &[String],
    dmat: &DistanceMatrix,
) -> Result<()> {
    let mut csv = csv::Writer::from_writer(writer);

    let mut header = vec![String::new()];
    header.extend(ref_ids.iter().cloned());
    csv.write_record(&header)?;

    for (id, row) in query_ids.iter().zip(dmat.rows()) {
        let mut record = vec![id.clone()];
        record.extend(row.iter().map(|d| d.to_string()));
        csv.write_record(&record)?;
    }
    csv.flush()?;
    Ok(())
}

pub fn execute(ctx: &AppContext, args: DistArgs) -> Result<()> {
    exactly_one(&[!args.query.is_empty(), args.query_sigs.is_some()], "query")?;
    exactly_one(&[!args.refs.is_empty(), args.ref_sigs.is_some(), args.use_db], "reference")?;

    let refs = if args.use_db {
        let db = ctx.load_db()?;
        LabeledSignatures {
            ids: db.genomes().iter().map(|g| g.key.clone()).collect(),
            signatures: db.signatures().signatures.clone(),
            ref_indices: Some(db.ref_indices().to_vec()),
        }
    } else if let Some(path) = &args.ref_sigs {
        from_sigfile(path)?
    } else {
        let kspec = ctx.kmerspec(args.k, args.prefix.as_deref())?;
        from_genomes(ctx, &args.refs, &kspec)?
    };

    // Query genomes use the references' k-mers unless given explicitly
    let queries = match &args.query_sigs {
        Some(path) => from_sigfile(path)?,
        None => {
            let kspec = if args.k.is_some() || args.prefix.is_some() {
                ctx.kmerspec(args.k, args.prefix.as_deref())?
            } else {
                refs.signatures.kmerspec().clone()
            };
            from_genomes(ctx, &args.query, &kspec)?
        }
    };

    if queries.signatures.kmerspec() != refs.signatures.kmerspec() {
        return Err(GambitError::validation(format!(
            "query signatures use {} but reference signatures use {}",
            queries.signatures.kmerspec(),
            refs.signatures.kmerspec()
        ))
        .into());
    }

    log::info!("Calculating {} x {} distance matrix", queries.ids.len(), refs.ids.len());
    let mut opts = MatrixOptions::default().with_progress(ctx.progress.clone());
    if let Some(indices) = &refs.ref_indices {
        opts = opts.with_ref_indices(indices);
    }
    let dmat = jaccarddist_matrix_any(&queries.signatures, &refs.signatures, &opts)?;

    let file = std::fs::File::create(&args.output)
        .with_context(|| format!("Failed to create output file: {}", args.output.display()))?;
    write_matrix_csv(std::io::BufWriter::new(file), &queries.ids, &refs.ids, &dmat)?;
    log::info!("Wrote distance matrix to {}", args.output.display());

    Ok(())
}
