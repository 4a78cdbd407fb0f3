//! Local CSV layout — `<base>/<year>/<month>.csv`, one file per group.
//!
//! Writing is idempotent: directories are created if absent and rewriting
//! a group overwrites its file, last write wins. Floats are written in
//! Rust's shortest round-trip notation so a re-parse reproduces the rows.

use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};

use thiserror::Error;

use crate::partition::{PartitionGroup, PartitionKey, PartitionRow};

/// Header row of every partition file.
pub const CSV_HEADER: [&str; 6] = ["date", "open", "high", "low", "close", "volume"];

#[derive(Debug, Error)]
pub enum LayoutError {
    #[error("create dir {path}: {source}")]
    CreateDir {
        path: PathBuf,
        #[source]
        source: io::Error,
    },

    #[error("write {path}: {source}")]
    Write {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: csv::Error,
    },

    #[error("malformed row in {path}: {message}")]
    MalformedRow { path: PathBuf, message: String },
}

/// Write every group under `base_dir`, returning the written paths in the
/// mapping's iteration order (ascending year, then month).
pub fn write_groups(
    groups: &BTreeMap<PartitionKey, PartitionGroup>,
    base_dir: &Path,
) -> Result<Vec<PathBuf>, LayoutError> {
    fs::create_dir_all(base_dir).map_err(|source| LayoutError::CreateDir {
        path: base_dir.to_path_buf(),
        source,
    })?;

    let mut written = Vec::with_capacity(groups.len());

    for (key, group) in groups {
        let year_dir = base_dir.join(key.year.to_string());
        fs::create_dir_all(&year_dir).map_err(|source| LayoutError::CreateDir {
            path: year_dir.clone(),
            source,
        })?;

        let path = year_dir.join(key.file_name());
        write_group(group, &path)?;
        written.push(path);
    }

    Ok(written)
}

fn write_group(group: &PartitionGroup, path: &Path) -> Result<(), LayoutError> {
    let write_err = |source| LayoutError::Write {
        path: path.to_path_buf(),
        source,
    };

    let mut writer = csv::Writer::from_path(path).map_err(write_err)?;
    writer.write_record(CSV_HEADER).map_err(write_err)?;

    for row in &group.rows {
        writer
            .write_record([
                row.date.as_str(),
                &row.open.to_string(),
                &row.high.to_string(),
                &row.low.to_string(),
                &row.close.to_string(),
                &row.volume.to_string(),
            ])
            .map_err(write_err)?;
    }

    writer.flush().map_err(|source| LayoutError::Write {
        path: path.to_path_buf(),
        source: csv::Error::from(source),
    })
}

/// Read one partition file back into a group. Used to verify the layout
/// round-trips; the forward pipeline never reads its own output.
pub fn read_group(path: &Path) -> Result<PartitionGroup, LayoutError> {
    let read_err = |source| LayoutError::Read {
        path: path.to_path_buf(),
        source,
    };

    let mut reader = csv::Reader::from_path(path).map_err(read_err)?;
    let mut rows = Vec::new();

    for record in reader.records() {
        let record = record.map_err(read_err)?;
        if record.len() != CSV_HEADER.len() {
            return Err(LayoutError::MalformedRow {
                path: path.to_path_buf(),
                message: format!("{} columns (want {})", record.len(), CSV_HEADER.len()),
            });
        }

        let field = |i: usize| -> Result<f64, LayoutError> {
            record[i].parse().map_err(|_| LayoutError::MalformedRow {
                path: path.to_path_buf(),
                message: format!("bad float in column '{}': {}", CSV_HEADER[i], &record[i]),
            })
        };

        rows.push(PartitionRow {
            date: record[0].to_string(),
            open: field(1)?,
            high: field(2)?,
            low: field(3)?,
            close: field(4)?,
            volume: field(5)?,
        });
    }

    Ok(PartitionGroup { rows })
}
