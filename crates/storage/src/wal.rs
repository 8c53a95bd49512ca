// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Write-ahead log for gate operations

use std::fs::{self, File, OpenOptions};
use std::io::{self, BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use thiserror::Error;
use throttle_core::GateOperation;

/// Errors that can occur in WAL operations
#[derive(Debug, Error)]
pub enum WalError {
    #[error("IO error: {0}")]
    Io(#[from] io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Write-ahead log for durable operation storage
pub struct Wal {
    path: PathBuf,
    file: File,
    sequence: u64,
}

impl Wal {
    /// Open or create a WAL at the given path
    pub fn open(path: &Path) -> Result<Self, WalError> {
        let file = OpenOptions::new()
            .create(true)
            .append(true)
            .read(true)
            .open(path)?;

        // Count existing entries to set sequence number
        let reader = BufReader::new(File::open(path)?);
        let mut sequence = 0;
        for line in reader.lines() {
            if !line?.trim().is_empty() {
                sequence += 1;
            }
        }

        Ok(Self {
            path: path.to_path_buf(),
            file,
            sequence,
        })
    }

    /// Append an operation to the log
    pub fn append(&mut self, op: &GateOperation) -> Result<u64, WalError> {
        self.sequence += 1;
        let entry = WalEntry {
            seq: self.sequence,
            op: op.clone(),
        };
        let line = serde_json::to_string(&entry)?;
        writeln!(self.file, "{}", line)?;
        self.file.sync_all()?;
        tracing::trace!(seq = self.sequence, op = op.name(), "wal append");
        Ok(self.sequence)
    }

    /// Get the current sequence number
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Replace the log with `ops`, atomically via rename
    pub fn rewrite(&mut self, ops: &[GateOperation]) -> Result<(), WalError> {
        let tmp = self.path.with_extension("wal.tmp");
        {
            let mut file = File::create(&tmp)?;
            for (i, op) in ops.iter().enumerate() {
                let entry = WalEntry {
                    seq: i as u64 + 1,
                    op: op.clone(),
                };
                writeln!(file, "{}", serde_json::to_string(&entry)?)?;
            }
            file.sync_all()?;
        }
        fs::rename(&tmp, &self.path)?;

        self.file = OpenOptions::new()
            .append(true)
            .read(true)
            .open(&self.path)?;
        self.sequence = ops.len() as u64;
        tracing::debug!(entries = ops.len(), "wal compacted");
        Ok(())
    }

    /// Replay all operations from the log
    ///
    /// A final line that does not parse is a write torn by a crash and is
    /// dropped; a bad line anywhere else is an error.
    pub fn replay(path: &Path) -> Result<Vec<GateOperation>, WalError> {
        let file = match File::open(path) {
            Ok(f) => f,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };

        let lines: Vec<String> = BufReader::new(file)
            .lines()
            .collect::<Result<_, _>>()?;
        let lines: Vec<&str> = lines
            .iter()
            .map(|l| l.trim())
            .filter(|l| !l.is_empty())
            .collect();

        let mut ops = Vec::with_capacity(lines.len());
        for (i, line) in lines.iter().enumerate() {
            match serde_json::from_str::<WalEntry>(line) {
                Ok(entry) => ops.push(entry.op),
                Err(e) if i + 1 == lines.len() => {
                    tracing::warn!(error = %e, "dropping torn final wal entry");
                }
                Err(e) => return Err(e.into()),
            }
        }

        Ok(ops)
    }
}

#[cfg(test)]
impl Wal {
    /// Swap the handle for a read-only one so every append fails
    pub(crate) fn make_read_only(&mut self) -> Result<(), WalError> {
        self.file = File::open(&self.path)?;
        Ok(())
    }
}

#[derive(Debug, serde::Serialize, serde::Deserialize)]
struct WalEntry {
    seq: u64,
    op: GateOperation,
}

#[cfg(test)]
#[path = "wal_tests.rs"]
mod tests;
