//! Backends for batch signature calculation
//!
//! Every backend returns signatures in input order. `compute_all` stops at
//! the first file that fails and discards partial results; `compute_each`
//! keeps going and reports every file's outcome.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::io::{Read, Write};
use std::path::PathBuf;
use std::process::{Command, Stdio};

use crate::error::{GambitError, GambitResult};
use crate::kmers::KmerSpec;
use crate::progress::{Progress, ProgressConfig};
use crate::search::calc_file_signature;
use crate::seq::SequenceFile;
use crate::signatures::Signature;

/// Program and arguments that run a signature worker
///
/// The worker reads one [`WorkerRequest`] as JSON from stdin and writes the
/// signature to stdout as a little endian `u64` count followed by the values.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerCommand {
    pub program: PathBuf,
    pub args: Vec<String>,
}

impl WorkerCommand {
    pub fn new<P: Into<PathBuf>>(program: P, args: Vec<String>) -> Self {
        Self {
            program: program.into(),
            args,
        }
    }

    /// `worker` subcommand of the running executable
    pub fn current_exe() -> GambitResult<Self> {
        Ok(Self::new(std::env::current_exe()?, vec!["worker".to_string()]))
    }
}

/// How batch signature calculation is parallelized
#[derive(Debug, Clone, Default)]
pub enum Concurrency {
    #[default]
    Sequential,
    /// In-process thread pool
    Threads { workers: usize },
    /// One child process per file, `workers` at a time
    Processes { workers: usize, command: WorkerCommand },
}

impl Concurrency {
    /// Create the executor for this concurrency mode
    pub fn executor(&self) -> GambitResult<Box<dyn Executor>> {
        Ok(match self {
            Concurrency::Sequential => Box::new(SequentialExecutor),
            Concurrency::Threads { workers } => Box::new(ThreadExecutor::new(*workers)?),
            Concurrency::Processes { workers, command } => Box::new(ProcessExecutor::new(*workers, command.clone())?),
        })
    }
}

/// Computes signatures for a batch of files
pub trait Executor: Send + Sync {
    fn compute_all(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> GambitResult<Vec<Signature>>;

    /// Signature or error for every file, in input order
    fn compute_each(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> Vec<GambitResult<Signature>>;
}

/// Compute one file's signature, wrapping any failure in `BatchAbort`
fn compute_one<F>(file: &SequenceFile, progress: &Progress, f: F) -> GambitResult<Signature>
where
    F: FnOnce(&SequenceFile) -> GambitResult<Signature>,
{
    log::trace!("Computing signature for {}", file.path.display());
    let signature = f(file).map_err(|e| GambitError::batch_abort(file.path.clone(), e))?;
    progress.increment(1);
    Ok(signature)
}

/// Compute one file's signature, counting it as done whatever the outcome
fn attempt_one<F>(file: &SequenceFile, progress: &Progress, f: F) -> GambitResult<Signature>
where
    F: FnOnce(&SequenceFile) -> GambitResult<Signature>,
{
    log::trace!("Computing signature for {}", file.path.display());
    let signature = f(file);
    progress.increment(1);
    signature
}

pub struct SequentialExecutor;

impl Executor for SequentialExecutor {
    fn compute_all(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> GambitResult<Vec<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = files
            .iter()
            .map(|file| compute_one(file, &progress, |f| calc_file_signature(kspec, f)))
            .collect();
        progress.finish();
        result
    }

    fn compute_each(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> Vec<GambitResult<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = files
            .iter()
            .map(|file| attempt_one(file, &progress, |f| calc_file_signature(kspec, f)))
            .collect();
        progress.finish();
        result
    }
}

fn build_pool(workers: usize) -> GambitResult<rayon::ThreadPool> {
    if workers == 0 {
        return Err(GambitError::validation("number of workers must be positive"));
    }
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers)
        .build()
        .map_err(|e| GambitError::validation(format!("failed to create thread pool: {}", e)))
}

/// Computes signatures on a dedicated rayon pool
pub struct ThreadExecutor {
    pool: rayon::ThreadPool,
}

impl ThreadExecutor {
    pub fn new(workers: usize) -> GambitResult<Self> {
        Ok(Self {
            pool: build_pool(workers)?,
        })
    }
}

impl Executor for ThreadExecutor {
    fn compute_all(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> GambitResult<Vec<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| compute_one(file, &progress, |f| calc_file_signature(kspec, f)))
                .collect()
        });
        progress.finish();
        result
    }

    fn compute_each(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> Vec<GambitResult<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| attempt_one(file, &progress, |f| calc_file_signature(kspec, f)))
                .collect()
        });
        progress.finish();
        result
    }
}

/// Request sent to a worker process
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkerRequest {
    pub kmerspec: KmerSpec,
    pub file: SequenceFile,
}

/// Computes each signature in a child process, `workers` processes at a time
pub struct ProcessExecutor {
    pool: rayon::ThreadPool,
    command: WorkerCommand,
}

impl ProcessExecutor {
    pub fn new(workers: usize, command: WorkerCommand) -> GambitResult<Self> {
        Ok(Self {
            pool: build_pool(workers)?,
            command,
        })
    }

    fn run_worker(&self, kspec: &KmerSpec, file: &SequenceFile) -> GambitResult<Signature> {
        let label = file.path.display().to_string();

        let mut child = Command::new(&self.command.program)
            .args(&self.command.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .spawn()
            .map_err(|e| GambitError::input(label.as_str(), format!("failed to start worker: {}", e)))?;

        let request = WorkerRequest {
            kmerspec: kspec.clone(),
            file: file.clone(),
        };
        // Dropping stdin closes the pipe so the worker sees EOF
        let sent = match child.stdin.take() {
            Some(mut stdin) => serde_json::to_writer(&mut stdin, &request),
            None => Ok(()),
        };
        if sent.is_err() {
            // Kill errors only mean the worker has already exited
            let _ = child.kill();
        }

        let output = child.wait_with_output()?;
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(GambitError::input(
                label,
                format!("worker exited with {}: {}", output.status, stderr.trim()),
            ));
        }
        sent.map_err(|e| GambitError::input(label.as_str(), format!("failed to send request to worker: {}", e)))?;

        read_signature(&mut output.stdout.as_slice())
            .map_err(|e| GambitError::input(label, format!("malformed worker response: {}", e)))
    }
}

impl Executor for ProcessExecutor {
    fn compute_all(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> GambitResult<Vec<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| compute_one(file, &progress, |f| self.run_worker(kspec, f)))
                .collect()
        });
        progress.finish();
        result
    }

    fn compute_each(&self, kspec: &KmerSpec, files: &[SequenceFile], progress: &ProgressConfig) -> Vec<GambitResult<Signature>> {
        let progress = progress.start(files.len() as u64, "Calculating signatures");
        let result = self.pool.install(|| {
            files
                .par_iter()
                .map(|file| attempt_one(file, &progress, |f| self.run_worker(kspec, f)))
                .collect()
        });
        progress.finish();
        result
    }
}

/// Encode a signature as a worker response
pub fn write_signature<W: Write>(writer: &mut W, signature: &[u64]) -> std::io::Result<()> {
    writer.write_u64::<LittleEndian>(signature.len() as u64)?;
    for &value in signature {
        writer.write_u64::<LittleEndian>(value)?;
    }
    Ok(())
}

/// Decode a worker response, rejecting trailing bytes
pub fn read_signature<R: Read>(reader: &mut R) -> std::io::Result<Signature> {
    let count = reader.read_u64::<LittleEndian>()?;
    let mut signature = Vec::with_capacity(count.min(1 << 24) as usize);
    for _ in 0..count {
        signature.push(reader.read_u64::<LittleEndian>()?);
    }

    let mut rest = Vec::new();
    reader.read_to_end(&mut rest)?;
    if !rest.is_empty() {
        return Err(std::io::Error::new(
            std::io::ErrorKind::InvalidData,
            format!("{} unexpected trailing bytes", rest.len()),
        ));
    }
    Ok(signature)
}

/// Worker side of the process backend: read a request, write the signature
pub fn serve_worker<R: Read, W: Write>(input: R, output: &mut W) -> GambitResult<()> {
    let request: WorkerRequest = serde_json::from_reader(input)?;
    let signature = calc_file_signature(&request.kmerspec, &request.file)?;
    write_signature(output, &signature)?;
    output.flush()?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::ProgressRecorder;
    use std::io::Cursor;

    fn write_fasta(dir: &std::path::Path, name: &str, seq: &str) -> SequenceFile {
        let path = dir.join(name);
        std::fs::write(&path, format!(">seq\n{}\n", seq)).unwrap();
        SequenceFile::fasta(path)
    }

    #[test]
    fn test_signature_wire_format() {
        let mut buf = Vec::new();
        write_signature(&mut buf, &[1, 2, 300]).unwrap();
        assert_eq!(buf.len(), 8 * 4);
        assert_eq!(&buf[..8], &3u64.to_le_bytes());
        assert_eq!(read_signature(&mut buf.as_slice()).unwrap(), vec![1, 2, 300]);

        buf.push(0);
        assert!(read_signature(&mut buf.as_slice()).is_err());
        assert!(read_signature(&mut &buf[..12]).is_err());
    }

    #[test]
    fn test_serve_worker() {
        let dir = tempfile::tempdir().unwrap();
        let file = write_fasta(dir.path(), "a.fa", "AAATGCCGTAA");
        let kspec = KmerSpec::new(4, "ATG").unwrap();

        let request = serde_json::to_vec(&WorkerRequest { kmerspec: kspec.clone(), file: file.clone() }).unwrap();
        let mut out = Vec::new();
        serve_worker(Cursor::new(request), &mut out).unwrap();

        let expected = calc_file_signature(&kspec, &file).unwrap();
        assert_eq!(read_signature(&mut out.as_slice()).unwrap(), expected);
    }

    #[test]
    fn test_sequential_and_threads_agree() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files: Vec<_> = ["AAATGCCGTAA", "ATGAAAACATGTTTT", "GGGG", "CCCCATGGGGG"]
            .iter()
            .enumerate()
            .map(|(i, seq)| write_fasta(dir.path(), &format!("{}.fa", i), seq))
            .collect();

        let sequential = SequentialExecutor.compute_all(&kspec, &files, &ProgressConfig::Off).unwrap();
        let threaded = ThreadExecutor::new(3).unwrap().compute_all(&kspec, &files, &ProgressConfig::Off).unwrap();
        assert_eq!(sequential, threaded);
        assert_eq!(sequential.len(), files.len());
    }

    #[test]
    fn test_progress_reaches_file_count() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files: Vec<_> = (0..5)
            .map(|i| write_fasta(dir.path(), &format!("{}.fa", i), "AAATGCCGTAACATGGG"))
            .collect();

        for concurrency in [Concurrency::Sequential, Concurrency::Threads { workers: 2 }] {
            let recorder = ProgressRecorder::new();
            let sigs = concurrency
                .executor()
                .unwrap()
                .compute_all(&kspec, &files, &recorder.config())
                .unwrap();
            assert_eq!(sigs.len(), files.len());
            recorder.check(files.len() as u64);
        }
    }

    #[test]
    fn test_first_failure_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files = vec![
            write_fasta(dir.path(), "ok.fa", "AAATGCCGTAA"),
            SequenceFile::fasta(dir.path().join("missing.fa")),
        ];

        for concurrency in [Concurrency::Sequential, Concurrency::Threads { workers: 2 }] {
            let err = concurrency
                .executor()
                .unwrap()
                .compute_all(&kspec, &files, &ProgressConfig::Off)
                .unwrap_err();
            match err {
                GambitError::BatchAbort { file, .. } => assert!(file.ends_with("missing.fa")),
                other => panic!("unexpected error {:?}", other),
            }
        }
    }

    #[test]
    fn test_zero_workers_rejected() {
        assert!(Concurrency::Threads { workers: 0 }.executor().is_err());
    }

    #[cfg(unix)]
    #[test]
    fn test_worker_exiting_early() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files: Vec<_> = (0..3)
            .map(|i| write_fasta(dir.path(), &format!("{}.fa", i), "AAATGCCGTAA"))
            .collect();
        // Exits without reading its request
        let command = WorkerCommand::new("sh", vec!["-c".to_string(), "exit 3".to_string()]);
        let executor = ProcessExecutor::new(2, command).unwrap();

        let err = executor.compute_all(&kspec, &files, &ProgressConfig::Off).unwrap_err();
        match err {
            GambitError::BatchAbort { source, .. } => {
                assert!(source.to_string().contains("worker exited with"), "{}", source)
            }
            other => panic!("unexpected error {:?}", other),
        }

        let each = executor.compute_each(&kspec, &files, &ProgressConfig::Off);
        assert_eq!(each.len(), 3);
        assert!(each.iter().all(|r| r.is_err()));
    }

    #[test]
    fn test_compute_each_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files = vec![
            write_fasta(dir.path(), "a.fa", "AAATGCCGTAA"),
            SequenceFile::fasta(dir.path().join("missing.fa")),
            write_fasta(dir.path(), "b.fa", "CCCCATGGGGG"),
        ];

        for concurrency in [Concurrency::Sequential, Concurrency::Threads { workers: 2 }] {
            let recorder = ProgressRecorder::new();
            let each = concurrency.executor().unwrap().compute_each(&kspec, &files, &recorder.config());
            recorder.check(3);
            assert_eq!(each[0].as_ref().unwrap(), &calc_file_signature(&kspec, &files[0]).unwrap());
            assert!(matches!(each[1], Err(GambitError::Input { .. })));
            assert_eq!(each[2].as_ref().unwrap(), &calc_file_signature(&kspec, &files[2]).unwrap());
        }
    }

    #[test]
    fn test_missing_worker_program() {
        let dir = tempfile::tempdir().unwrap();
        let kspec = KmerSpec::new(4, "ATG").unwrap();
        let files = vec![write_fasta(dir.path(), "a.fa", "AAATGCCGTAA")];
        let command = WorkerCommand::new(dir.path().join("no-such-worker"), vec![]);

        let err = ProcessExecutor::new(1, command)
            .unwrap()
            .compute_all(&kspec, &files, &ProgressConfig::Off)
            .unwrap_err();
        assert!(matches!(err, GambitError::BatchAbort { .. }));
    }
}
