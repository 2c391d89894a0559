//! File-level pipelines: one image, or a whole directory tree.
//!
//! Both read the source, decode it, resolve the output format and hand the
//! raster to [`search`]. The result goes through a buffered file writer.
//!
//! ## Single file
//!
//! [`downsize_file`] is what the bare `downsize -i IN -o OUT` command runs.
//! An empty format tag keeps the input's format; the chosen format is logged.
//!
//! ## Batch
//!
//! [`process_dir`] walks an input directory, mirrors its layout into the
//! output directory and downsizes every supported image in parallel:
//!
//! ```text
//! photos/                        small/
//! ├── a.jpg                      ├── .downsize-cache.json
//! └── trip/                 →    ├── a.jpg
//!     ├── b.png                  └── trip/
//!     └── notes.txt                  └── b.png
//! ```
//!
//! Output extensions follow the output format (`b.png` becomes `b.jpg` when
//! `format = "jpeg"`). Non-image files are ignored. Results already produced
//! with the same source bytes and settings are reused from the
//! [cache](crate::cache). The first failure aborts the run; results finished
//! before it are still recorded in the cache manifest.
//!
//! Output paths are resolved for every input before anything is encoded. Two
//! sources that would land on the same output (`a.jpg` and `a.png` with
//! `format = "jpeg"`) fail the run with [`ProcessError::OutputCollision`].
//!
//! Images are processed in parallel using [rayon](https://docs.rs/rayon); all
//! workers share one [`BufferPool`].

use crate::cache::{self, CacheEntry, CacheManifest, CacheStats};
use crate::config::DownsizeConfig;
use crate::imaging::{
    BackendError, EncodeConfig, ImageBackend, OutputFormat, decode, is_supported_input,
    resolve_encode_config,
};
use crate::pool::BufferPool;
use crate::search::{SearchError, SearchOutcome, search};
use rayon::prelude::*;
use std::collections::HashMap;
use std::fs;
use std::io::{BufWriter, Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use std::sync::mpsc::Sender;
use thiserror::Error;
use tracing::{debug, info};
use walkdir::WalkDir;

#[derive(Error, Debug)]
pub enum ProcessError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Image processing failed: {0}")]
    Imaging(#[from] BackendError),
    #[error("Size search failed: {0}")]
    Search(#[from] SearchError),
    #[error("Source image not found: {0}")]
    SourceNotFound(PathBuf),
    #[error("Failed to walk input directory: {0}")]
    Walk(#[from] walkdir::Error),
    #[error("{} and {} both map to output {}", first.display(), second.display(), output.display())]
    OutputCollision {
        first: PathBuf,
        second: PathBuf,
        output: PathBuf,
    },
    #[error("{} failed: {source}", path.display())]
    File {
        path: PathBuf,
        #[source]
        source: Box<ProcessError>,
    },
}

/// Result of downsizing one file.
#[derive(Debug, Clone)]
pub struct FileReport {
    pub source: PathBuf,
    pub output: PathBuf,
    pub format: OutputFormat,
    /// True when no format was requested and the input's was kept.
    pub format_inherited: bool,
    pub outcome: SearchOutcome,
}

/// Downsize in-memory image bytes into `sink`.
///
/// Returns the output format and the search outcome.
pub fn downsize_bytes<B, W>(
    backend: &B,
    pool: &BufferPool,
    bytes: &[u8],
    config: &DownsizeConfig,
    sink: &mut W,
) -> Result<(OutputFormat, SearchOutcome), ProcessError>
where
    B: ImageBackend + ?Sized,
    W: Write + ?Sized,
{
    let (image, decoded) = decode(bytes)?;
    let encode = resolve_encode_config(
        &config.format,
        decoded,
        config.quality(),
        config.gif_options(),
    )?;
    let format = encode.format();
    if config.format.trim().is_empty() {
        info!(%format, "Output format");
    }
    let outcome = search(backend, pool, &image, config.target(), &encode, sink)?;
    Ok((format, outcome))
}

/// Downsize the image at `input` and write the result to `output`.
///
/// The output file is only left behind when the search succeeds.
pub fn downsize_file<B>(
    backend: &B,
    pool: &BufferPool,
    input: &Path,
    output: &Path,
    config: &DownsizeConfig,
) -> Result<FileReport, ProcessError>
where
    B: ImageBackend + ?Sized,
{
    if !input.is_file() {
        return Err(ProcessError::SourceNotFound(input.to_path_buf()));
    }
    let bytes = fs::read(input)?;
    let (format, outcome) = write_or_remove(output, |writer| {
        downsize_bytes(backend, pool, &bytes, config, writer)
    })?;

    Ok(FileReport {
        source: input.to_path_buf(),
        output: output.to_path_buf(),
        format,
        format_inherited: config.format.trim().is_empty(),
        outcome,
    })
}

/// Create `path`, fill it through a buffered writer and flush.
///
/// Any failure removes the file again.
fn write_or_remove<T, F>(path: &Path, write: F) -> Result<T, ProcessError>
where
    F: FnOnce(&mut BufWriter<fs::File>) -> Result<T, ProcessError>,
{
    let mut writer = BufWriter::new(fs::File::create(path)?);
    let result = write(&mut writer)
        .and_then(|done| writer.flush().map(|()| done).map_err(ProcessError::from));
    if result.is_err() {
        drop(writer);
        let _ = fs::remove_file(path);
    }
    result
}

// =============================================================================
// Batch processing
// =============================================================================

/// How a batch entry was produced.
#[derive(Debug, Clone, PartialEq)]
pub enum FileStatus {
    /// Output already on disk from a previous run.
    Cached { size: u64 },
    /// Output found under another path and copied.
    Copied { size: u64 },
    /// Freshly searched and encoded.
    Encoded(SearchOutcome),
}

impl FileStatus {
    pub fn size(&self) -> u64 {
        match self {
            Self::Cached { size } | Self::Copied { size } => *size,
            Self::Encoded(outcome) => outcome.size,
        }
    }
}

/// Progress events sent while a batch runs.
#[derive(Debug, Clone)]
pub enum ProcessEvent {
    Started {
        total: usize,
    },
    FileProcessed {
        /// 1-based position in walk order.
        index: usize,
        /// Source path relative to the input directory.
        source: String,
        /// Output path relative to the output directory.
        output: String,
        status: FileStatus,
    },
}

/// Outcome of a batch run.
#[derive(Debug)]
pub struct ProcessResult {
    /// One entry per processed file, in walk order.
    pub files: Vec<(String, FileStatus)>,
    pub cache_stats: CacheStats,
}

/// Collect supported images under `input_dir`, sorted for a stable order.
pub fn collect_inputs(input_dir: &Path) -> Result<Vec<PathBuf>, ProcessError> {
    let mut inputs = Vec::new();
    for entry in WalkDir::new(input_dir).sort_by_file_name() {
        let entry = entry?;
        if entry.file_type().is_file() && is_supported_input(entry.path()) {
            inputs.push(entry.into_path());
        }
    }
    Ok(inputs)
}

/// Mirror `relative` under the output directory with the format's extension.
pub fn output_relative_path(relative: &Path, format: OutputFormat) -> PathBuf {
    relative.with_extension(format.extension())
}

/// Slash-separated form of a relative path, used as manifest key.
fn manifest_key(path: &Path) -> String {
    path.components()
        .map(|c| c.as_os_str().to_string_lossy())
        .collect::<Vec<_>>()
        .join("/")
}

/// Bytes read from each input to detect its format while planning.
const SIGNATURE_LEN: u64 = 64;

/// One batch input with its output location resolved.
#[derive(Debug)]
struct BatchJob {
    source: PathBuf,
    /// Source path relative to the input directory.
    relative: PathBuf,
    encode: EncodeConfig,
    /// Output path relative to the output directory.
    output: PathBuf,
}

/// Pick the encode configuration for `path` from its file signature.
///
/// Only the first bytes are read; full decoding waits until the cache misses.
fn sniff_encode_config(
    path: &Path,
    config: &DownsizeConfig,
) -> Result<EncodeConfig, ProcessError> {
    let mut head = Vec::with_capacity(SIGNATURE_LEN as usize);
    fs::File::open(path)?.take(SIGNATURE_LEN).read_to_end(&mut head)?;
    let detected =
        image::guess_format(&head).map_err(|e| BackendError::Decode(e.to_string()))?;
    Ok(resolve_encode_config(
        &config.format,
        detected,
        config.quality(),
        config.gif_options(),
    )?)
}

/// Resolve every input's output path and reject inputs that share one.
fn plan_batch(
    inputs: &[PathBuf],
    input_dir: &Path,
    config: &DownsizeConfig,
) -> Result<Vec<BatchJob>, ProcessError> {
    let mut claimed: HashMap<PathBuf, PathBuf> = HashMap::new();
    let mut jobs = Vec::with_capacity(inputs.len());
    for path in inputs {
        let relative = path.strip_prefix(input_dir).unwrap_or(path.as_path());
        let encode = sniff_encode_config(path, config).map_err(|e| ProcessError::File {
            path: path.clone(),
            source: Box::new(e),
        })?;
        let output = output_relative_path(relative, encode.format());
        if let Some(first) = claimed.insert(output.clone(), path.clone()) {
            return Err(ProcessError::OutputCollision {
                first,
                second: path.clone(),
                output,
            });
        }
        jobs.push(BatchJob {
            source: path.clone(),
            relative: relative.to_path_buf(),
            encode,
            output,
        });
    }
    Ok(jobs)
}

/// Downsize every supported image under `input_dir` into `output_dir`.
pub fn process_dir<B>(
    backend: &B,
    input_dir: &Path,
    output_dir: &Path,
    config: &DownsizeConfig,
    use_cache: bool,
    events: Option<Sender<ProcessEvent>>,
) -> Result<ProcessResult, ProcessError>
where
    B: ImageBackend + ?Sized,
{
    if !input_dir.is_dir() {
        return Err(ProcessError::SourceNotFound(input_dir.to_path_buf()));
    }
    let inputs = collect_inputs(input_dir)?;
    let jobs = plan_batch(&inputs, input_dir, config)?;
    fs::create_dir_all(output_dir)?;

    let manifest = Mutex::new(if use_cache {
        CacheManifest::load(output_dir)
    } else {
        CacheManifest::empty()
    });
    let pool = BufferPool::default();
    let emit = |event: ProcessEvent| {
        if let Some(tx) = &events {
            // A dropped receiver only silences progress output.
            let _ = tx.send(event);
        }
    };
    emit(ProcessEvent::Started { total: jobs.len() });

    let files = jobs
        .par_iter()
        .enumerate()
        .map(|(i, job)| -> Result<(String, FileStatus), ProcessError> {
            let status = process_one(backend, &pool, &manifest, job, output_dir, config)
                .map_err(|e| ProcessError::File {
                    path: job.source.clone(),
                    source: Box::new(e),
                })?;
            let source = manifest_key(&job.relative);
            emit(ProcessEvent::FileProcessed {
                index: i + 1,
                source: source.clone(),
                output: manifest_key(&job.output),
                status: status.clone(),
            });
            Ok((source, status))
        })
        .collect::<Result<Vec<_>, _>>();

    // Outputs finished before a failure stay reusable on the next run.
    let manifest = manifest
        .into_inner()
        .unwrap_or_else(std::sync::PoisonError::into_inner);
    let saved = manifest.save(output_dir);
    let files = files?;
    saved?;

    let mut cache_stats = CacheStats::default();
    for (_, status) in &files {
        match status {
            FileStatus::Cached { .. } => cache_stats.hits += 1,
            FileStatus::Copied { .. } => cache_stats.copies += 1,
            FileStatus::Encoded(_) => cache_stats.misses += 1,
        }
    }
    Ok(ProcessResult { files, cache_stats })
}

/// Downsize one batch entry, consulting the cache first.
fn process_one<B>(
    backend: &B,
    pool: &BufferPool,
    manifest: &Mutex<CacheManifest>,
    job: &BatchJob,
    output_dir: &Path,
    config: &DownsizeConfig,
) -> Result<FileStatus, ProcessError>
where
    B: ImageBackend + ?Sized,
{
    let bytes = fs::read(&job.source)?;
    let output_key = manifest_key(&job.output);
    let output_path = output_dir.join(&job.output);
    if let Some(parent) = output_path.parent() {
        fs::create_dir_all(parent)?;
    }

    let source_hash = cache::hash_bytes(&bytes);
    let params_hash = cache::hash_params(config.target(), &job.encode);

    let hit = {
        let manifest = manifest
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        manifest
            .find_cached(&source_hash, &params_hash, output_dir)
            .map(|(stored, entry)| (stored.to_string(), entry.size))
    };
    if let Some((stored, size)) = hit {
        let status = if stored == output_key {
            FileStatus::Cached { size }
        } else {
            fs::copy(output_dir.join(&stored), &output_path)?;
            FileStatus::Copied { size }
        };
        debug!(source = %job.relative.display(), ?status, "reused cached output");
        record(manifest, output_key, source_hash, params_hash, size);
        return Ok(status);
    }

    let (image, _) = decode(&bytes)?;
    let outcome = write_or_remove(&output_path, |writer| {
        Ok(search(backend, pool, &image, config.target(), &job.encode, writer)?)
    })?;
    record(manifest, output_key, source_hash, params_hash, outcome.size);
    Ok(FileStatus::Encoded(outcome))
}

fn record(
    manifest: &Mutex<CacheManifest>,
    output_key: String,
    source_hash: String,
    params_hash: String,
    size: u64,
) {
    manifest
        .lock()
        .unwrap_or_else(std::sync::PoisonError::into_inner)
        .insert(
            output_key,
            CacheEntry {
                source_hash,
                params_hash,
                size,
            },
        );
}
