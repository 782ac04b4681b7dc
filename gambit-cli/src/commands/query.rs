//! Query command implementation - predict taxonomy of genome sequences

use anyhow::{Context, Result};
use clap::Args;
use gambit_core::query::QueryInput;
use gambit_core::results::{ExportFormat, OutputTarget};
use gambit_core::signatures::load_signatures_file;
use gambit_core::{query, query_parse, SeqFormat, SequenceFile};
use std::path::PathBuf;

use super::{collect_genome_files, AppContext};
use crate::error::CliError;
use crate::OutputFormat;

#[derive(Args, Debug)]
pub struct QueryArgs {
    /// Genome sequence files (FASTA, optionally gzipped)
    pub files: Vec<PathBuf>,

    /// File containing paths to genomes, one per line
    #[arg(short = 'l', value_name = "LISTFILE")]
    pub listfile: Option<PathBuf>,

    /// Parent directory of paths in LISTFILE
    #[arg(long, default_value = ".")]
    pub ldir: PathBuf,

    /// File containing query signatures, used in place of genome files
    #[arg(short = 's', long)]
    pub sigfile: Option<PathBuf>,

    /// Output file (stdout if omitted)
    #[arg(short, long)]
    pub output: Option<PathBuf>,

    /// Results format
    #[arg(short = 'f', long)]
    pub outfmt: Option<OutputFormat>,

    /// Indent JSON output
    #[arg(long)]
    pub pretty: bool,

    /// Strict classification mode
    #[arg(long, overrides_with = "no_strict")]
    pub strict: bool,

    #[arg(long, overrides_with = "strict", hide = true)]
    pub no_strict: bool,
}

impl QueryArgs {
    fn strict(&self) -> Option<bool> {
        if self.strict {
            Some(true)
        } else if self.no_strict {
            Some(false)
        } else {
            None
        }
    }
}

pub fn execute(ctx: &AppContext, args: QueryArgs) -> Result<()> {
    let given = [!args.files.is_empty(), args.listfile.is_some(), args.sigfile.is_some()];
    if given.iter().filter(|&&g| g).count() != 1 {
        return Err(CliError::usage("give exactly one of genome files, -l LISTFILE or -s SIGFILE").into());
    }

    let db = ctx.load_db()?;

    let mut params = ctx.config.query.params();
    if let Some(strict) = args.strict() {
        params.classify_strict = strict;
    }
    log::debug!("Query parameters: {:?}", params);

    let results = match &args.sigfile {
        Some(sigfile) => {
            let sigs = load_signatures_file(sigfile)
                .with_context(|| format!("Failed to load query signatures from {}", sigfile.display()))?;
            log::info!("Querying {} signatures from {}", sigs.len(), sigfile.display());

            let inputs = sigs.ids.iter().map(QueryInput::new).collect();
            query(&db, &sigs.signatures, &params, inputs, &ctx.progress)?
        }
        None => {
            let paths = collect_genome_files(&args.files, args.listfile.as_deref(), &args.ldir)?;
            log::info!("Querying {} genome files", paths.len());

            let files = SequenceFile::from_paths(paths, SeqFormat::Fasta);
            let concurrency = ctx.config.general.concurrency()?;
            query_parse(&db, &files, &params, &concurrency, &ctx.progress)?
        }
    };

    let failed = results.items.iter().filter(|item| !item.classifier_result.success).count();
    if failed > 0 {
        log::warn!("{} of {} queries failed", failed, results.items.len());
    }

    let format = args.outfmt.map(ExportFormat::from).unwrap_or(ctx.config.query.outfmt);
    let exporter = format.exporter(args.pretty);
    match args.output {
        Some(path) => exporter
            .export(OutputTarget::Path(path.clone()), &results)
            .with_context(|| format!("Failed to write results to {}", path.display()))?,
        None => {
            let stdout = std::io::stdout();
            let mut handle = stdout.lock();
            exporter.export(OutputTarget::Writer(&mut handle), &results)?;
        }
    }

    Ok(())
}
