//! Signatures commands - create and inspect signature files

use anyhow::{Context, Result};
use clap::{Args, Subcommand};
use gambit_core::signatures::{load_signatures_file, write_signatures_file};
use gambit_core::{calc_file_signatures, AnySignatureArray, IndexDtype, SeqFormat, SequenceFile, SignaturesMeta};
use std::path::{Path, PathBuf};

use super::{collect_genome_files, AppContext};
use crate::error::CliError;

#[derive(Subcommand, Debug)]
pub enum SignaturesCommands {
    /// Calculate signatures of genome files
    Create(CreateArgs),

    /// Show information about a signature file
    Info(InfoArgs),
}

#[derive(Args, Debug)]
pub struct CreateArgs {
    /// Genome sequence files (FASTA, optionally gzipped)
    pub files: Vec<PathBuf>,

    /// K-mer length
    #[arg(short)]
    pub k: Option<u32>,

    /// K-mer prefix
    #[arg(short, long)]
    pub prefix: Option<String>,

    /// Output signature file (.gs)
    #[arg(short, long, required = true)]
    pub output: PathBuf,

    /// File containing paths to genomes, one per line
    #[arg(short = 'l', value_name = "LISTFILE")]
    pub listfile: Option<PathBuf>,

    /// Parent directory of paths in LISTFILE
    #[arg(long, default_value = ".")]
    pub ldir: PathBuf,

    /// File of signature ids, one per line (default: file names without extension)
    #[arg(short, long)]
    pub ids: Option<PathBuf>,

    /// Integer type for stored k-mer indices (default: narrowest that fits)
    #[arg(long)]
    pub dtype: Option<IndexDtype>,

    /// Name recorded in the file's metadata
    #[arg(long)]
    pub name: Option<String>,
}

#[derive(Args, Debug)]
pub struct InfoArgs {
    /// Signature file
    pub file: PathBuf,

    /// Print metadata as JSON
    #[arg(long)]
    pub json: bool,

    /// List all signature ids
    #[arg(long)]
    pub ids: bool,
}

pub fn execute(ctx: &AppContext, command: SignaturesCommands) -> Result<()> {
    match command {
        SignaturesCommands::Create(args) => create(ctx, args),
        SignaturesCommands::Info(args) => info(args),
    }
}

fn read_ids(path: &Path) -> Result<Vec<String>> {
    let content =
        std::fs::read_to_string(path).with_context(|| format!("Failed to read ids file: {}", path.display()))?;
    Ok(content
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .map(String::from)
        .collect())
}

fn create(ctx: &AppContext, args: CreateArgs) -> Result<()> {
    if args.files.is_empty() == args.listfile.is_none() {
        return Err(CliError::usage("give either genome files or -l LISTFILE").into());
    }

    let kspec = ctx.kmerspec(args.k, args.prefix.as_deref())?;
    let paths = collect_genome_files(&args.files, args.listfile.as_deref(), &args.ldir)?;
    let files = SequenceFile::from_paths(paths, SeqFormat::Fasta);

    let ids = match &args.ids {
        Some(path) => read_ids(path)?,
        None => files.iter().map(SequenceFile::stem).collect(),
    };
    if ids.len() != files.len() {
        return Err(CliError::usage(format!("got {} ids for {} genome files", ids.len(), files.len())).into());
    }

    log::info!("Calculating {} signatures with {}", files.len(), kspec);
    let concurrency = ctx.config.general.concurrency()?;
    let signatures = calc_file_signatures(&kspec, &files, &concurrency, &ctx.progress)?;

    let array = AnySignatureArray::build(&signatures, kspec, args.dtype)?;
    let meta = SignaturesMeta {
        name: args.name,
        id_attr: Some("key".to_string()),
        ..SignaturesMeta::default()
    };
    write_signatures_file(&args.output, &array, &ids, &meta)
        .with_context(|| format!("Failed to write signatures to {}", args.output.display()))?;

    Ok(())
}

fn info(args: InfoArgs) -> Result<()> {
    let sigs = load_signatures_file(&args.file)
        .with_context(|| format!("Failed to load signatures from {}", args.file.display()))?;

    if args.json {
        let value = serde_json::json!({
            "count": sigs.len(),
            "kmerspec": sigs.kmerspec(),
            "dtype": sigs.signatures.dtype().as_str(),
            "metadata": &sigs.meta,
        });
        let text = serde_json::to_string_pretty(&value)?;
        println!("{}", text);
    } else {
        let kspec = sigs.kmerspec();
        println!("File: {}", args.file.display());
        println!("Count: {}", sigs.len());
        println!("K: {}", kspec.k());
        println!("Prefix: {}", kspec.prefix_str());
        println!("Data type: {}", sigs.signatures.dtype());
        println!("Total k-mers: {}", sigs.signatures.bounds().last().copied().unwrap_or(0));
        for (label, field) in [
            ("ID", &sigs.meta.id),
            ("Name", &sigs.meta.name),
            ("Version", &sigs.meta.version),
            ("ID attribute", &sigs.meta.id_attr),
            ("Description", &sigs.meta.description),
        ] {
            println!("{}: {}", label, field.as_deref().unwrap_or("-"));
        }
    }

    if args.ids {
        for id in &sigs.ids {
            println!("{}", id);
        }
    }

    Ok(())
}
