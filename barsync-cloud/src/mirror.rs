//! Remote mirror — walk the local layout and copy each CSV to object storage.
//!
//! The walk assumes the exact `<year>/<month>.csv` layout the local writer
//! produces. Anything else under the base is a precondition violation and
//! fails the mirror instead of producing a mangled key.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::store::{ObjectStore, StoreError};

#[derive(Debug, Error)]
pub enum MirrorError {
    #[error("walk {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("unexpected layout under {base}: {path} (want <year>/<month>.csv)")]
    Layout { base: PathBuf, path: PathBuf },

    #[error(transparent)]
    Store(#[from] StoreError),
}

/// Progress callbacks for the upload loop.
pub trait MirrorProgress {
    /// Called after each successful upload.
    fn on_upload(&self, bucket: &str, key: &str);

    /// Called once the walk is exhausted.
    fn on_complete(&self, uploaded: usize);
}

/// Prints one line per uploaded object, the way the original sync did.
pub struct StdoutProgress;

impl MirrorProgress for StdoutProgress {
    fn on_upload(&self, bucket: &str, key: &str) {
        println!("Uploaded: s3://{bucket}/{key}");
    }

    fn on_complete(&self, uploaded: usize) {
        println!("Mirror complete: {uploaded} object(s)");
    }
}

/// Silent progress for tests and embedding.
pub struct NoProgress;

impl MirrorProgress for NoProgress {
    fn on_upload(&self, _bucket: &str, _key: &str) {}
    fn on_complete(&self, _uploaded: usize) {}
}

/// Upload every CSV under `local_base` to `bucket` under Hive-style keys.
///
/// Returns the number of uploaded objects. A failure mid-loop leaves the
/// already-uploaded objects in place; there is no compensating cleanup.
pub fn mirror(
    local_base: &Path,
    bucket: &str,
    prefix: &str,
    store: &dyn ObjectStore,
    progress: &dyn MirrorProgress,
) -> Result<usize, MirrorError> {
    let mut files = Vec::new();
    collect_csv_files(local_base, &mut files)?;
    files.sort();

    let mut uploaded = 0;
    for path in files {
        let key = derive_key(local_base, &path, prefix)?;
        let body = fs::read(&path).map_err(|source| MirrorError::Io {
            path: path.clone(),
            source,
        })?;
        store.put_object(bucket, &key, &body)?;
        progress.on_upload(bucket, &key);
        uploaded += 1;
    }

    progress.on_complete(uploaded);
    Ok(uploaded)
}

fn collect_csv_files(dir: &Path, out: &mut Vec<PathBuf>) -> Result<(), MirrorError> {
    let io_err = |source| MirrorError::Io {
        path: dir.to_path_buf(),
        source,
    };

    for entry in fs::read_dir(dir).map_err(io_err)? {
        let path = entry.map_err(io_err)?.path();
        if path.is_dir() {
            collect_csv_files(&path, out)?;
        } else if has_csv_extension(&path) {
            out.push(path);
        }
    }

    Ok(())
}

fn has_csv_extension(path: &Path) -> bool {
    path.extension()
        .and_then(|e| e.to_str())
        .is_some_and(|e| e.eq_ignore_ascii_case("csv"))
}

/// `<base>/2022/07.csv` + prefix `btc` → `btc/year=2022/month=07/07.csv`.
///
/// The relative path must be exactly one numeric year directory and one
/// `<month>.csv` file with a calendar month stem.
pub fn derive_key(base: &Path, file: &Path, prefix: &str) -> Result<String, MirrorError> {
    let layout_err = || MirrorError::Layout {
        base: base.to_path_buf(),
        path: file.to_path_buf(),
    };

    let rel = file.strip_prefix(base).map_err(|_| layout_err())?;
    let mut segments = rel.iter();
    let (year, name) = match (segments.next(), segments.next(), segments.next()) {
        (Some(year), Some(name), None) => (year, name),
        _ => return Err(layout_err()),
    };

    let year = year
        .to_str()
        .filter(|y| !y.is_empty() && y.bytes().all(|b| b.is_ascii_digit()))
        .ok_or_else(layout_err)?;

    let name = name.to_str().ok_or_else(layout_err)?;
    let month = name.split_once('.').map(|(stem, _)| stem).unwrap_or(name);
    let month_ok = !month.is_empty()
        && month.bytes().all(|b| b.is_ascii_digit())
        && month.parse::<u32>().is_ok_and(|m| (1..=12).contains(&m));
    if !month_ok {
        return Err(layout_err());
    }

    let key = format!("{}/year={year}/month={month}/{name}", prefix.trim_matches('/'));
    Ok(key.trim_start_matches('/').to_string())
}
