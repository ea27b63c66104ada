use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::shared::constants::MODEL_DIR_ENV;

#[derive(Error, Debug)]
pub enum ModelResolveError {
    #[error("failed to create cache directory: {0}")]
    CacheDir(#[source] std::io::Error),
    #[error("download failed for {url}: {source}")]
    Download {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("failed to write model to {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("model {name} not found (searched: {searched}) and no download URL configured")]
    NotFound { name: String, searched: String },
    #[error("could not determine cache directory")]
    NoCacheDir,
}

/// Progress callback: `(bytes_downloaded, total_bytes)`.
/// `total_bytes` is 0 if the server didn't provide Content-Length.
pub type ProgressFn = Box<dyn Fn(u64, u64) + Send>;

/// A model file and where to fetch it if it is not installed locally.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ModelSpec {
    pub file_name: String,
    pub url: Option<String>,
}

impl ModelSpec {
    pub fn new(file_name: &str, url: Option<String>) -> Self {
        Self {
            file_name: file_name.to_string(),
            url,
        }
    }
}

/// Locate a model file, downloading it into the cache as a last resort.
///
/// Resolution order:
/// 1. `model_dir` (explicit setting)
/// 2. `$PALSY_MODEL_DIR`
/// 3. User cache directory (platform-specific)
/// 4. Download from `spec.url` into the cache
pub fn resolve(
    spec: &ModelSpec,
    model_dir: Option<&Path>,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let mut search_dirs: Vec<PathBuf> = model_dir.map(Path::to_path_buf).into_iter().collect();
    if let Some(dir) = std::env::var_os(MODEL_DIR_ENV).filter(|v| !v.is_empty()) {
        search_dirs.push(PathBuf::from(dir));
    }
    resolve_in(spec, &search_dirs, &model_cache_dir()?, progress)
}

fn resolve_in(
    spec: &ModelSpec,
    search_dirs: &[PathBuf],
    cache_dir: &Path,
    progress: Option<ProgressFn>,
) -> Result<PathBuf, ModelResolveError> {
    let candidates: Vec<PathBuf> = search_dirs
        .iter()
        .chain(std::iter::once(&cache_dir.to_path_buf()))
        .map(|dir| dir.join(&spec.file_name))
        .collect();
    if let Some(found) = candidates.iter().find(|p| p.is_file()) {
        return Ok(found.clone());
    }

    let Some(url) = spec.url.as_deref() else {
        return Err(ModelResolveError::NotFound {
            name: spec.file_name.clone(),
            searched: candidates
                .iter()
                .map(|p| p.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
        });
    };

    fs::create_dir_all(cache_dir).map_err(ModelResolveError::CacheDir)?;
    let cached_path = cache_dir.join(&spec.file_name);
    log::info!("Downloading {} from {url}", spec.file_name);
    download(url, &cached_path, progress)?;
    Ok(cached_path)
}

/// Platform-specific model cache directory.
///
/// - macOS: `~/Library/Application Support/PalsyScreen/models/`
/// - Linux: `$XDG_CACHE_HOME/PalsyScreen/models/` or `~/.cache/PalsyScreen/models/`
/// - Windows: `%LOCALAPPDATA%/PalsyScreen/models/`
pub fn model_cache_dir() -> Result<PathBuf, ModelResolveError> {
    #[cfg(target_os = "macos")]
    let base = dirs::data_dir();
    #[cfg(not(target_os = "macos"))]
    let base = dirs::cache_dir();

    base.map(|d| d.join("PalsyScreen").join("models"))
        .ok_or(ModelResolveError::NoCacheDir)
}

/// Streams `url` into `dest` through a `.part` file so a failed download
/// never leaves a truncated model behind.
fn download(url: &str, dest: &Path, progress: Option<ProgressFn>) -> Result<(), ModelResolveError> {
    let temp_path = dest.with_extension("part");
    let result = download_inner(url, dest, &temp_path, progress);
    if result.is_err() {
        let _ = fs::remove_file(&temp_path);
    }
    result
}

fn download_inner(
    url: &str,
    dest: &Path,
    temp_path: &Path,
    progress: Option<ProgressFn>,
) -> Result<(), ModelResolveError> {
    let mut response = reqwest::blocking::get(url)
        .and_then(|r| r.error_for_status())
        .map_err(|e| ModelResolveError::Download {
            url: url.to_string(),
            source: e,
        })?;

    let write_err = |source: std::io::Error| ModelResolveError::Write {
        path: temp_path.to_path_buf(),
        source,
    };

    let total = response.content_length().unwrap_or(0);
    let mut file = fs::File::create(temp_path).map_err(write_err)?;
    let mut buf = vec![0u8; 1024 * 1024];
    let mut downloaded: u64 = 0;
    loop {
        let n = response.read(&mut buf).map_err(write_err)?;
        if n == 0 {
            break;
        }
        file.write_all(&buf[..n]).map_err(write_err)?;
        downloaded += n as u64;
        if let Some(ref cb) = progress {
            cb(downloaded, total);
        }
    }
    file.flush().map_err(write_err)?;
    drop(file);

    fs::rename(temp_path, dest).map_err(|e| ModelResolveError::Write {
        path: dest.to_path_buf(),
        source: e,
    })
}
