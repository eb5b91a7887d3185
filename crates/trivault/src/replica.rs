//! Triple-replica record I/O and voting.
//!
//! Every record exists as three files, one under each base directory:
//!
//! ```text
//! <base_i>/<module>/.<data_key>.jkl      i ∈ {0, 1, 2}
//! ```
//!
//! Writes go to all three bases and succeed if at least one replica lands;
//! reads pull all three and feed the survivors through decode-then-agree
//! voting.  Voting runs strictly after decryption and the integrity check,
//! so forged or corrupted ciphertext cannot cast a vote.

use std::fs;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::envelope::{DecodeFailure, EnvelopeCodec};
use crate::error::{Result, StoreError};
use crate::namespace::ModulePath;
use crate::value::TypeTag;

/// Number of independent replica bases.
pub const REPLICA_COUNT: usize = 3;

/// File name of a record inside its module directory.
pub(crate) fn record_file_name(data_key: &str) -> String {
    format!(".{data_key}.jkl")
}

/// Extract the data key from a record file name, or `None` for any file
/// that is not a record.
pub(crate) fn key_from_file_name(name: &str) -> Option<&str> {
    let stem = name.strip_prefix('.')?.strip_suffix(".jkl")?;
    if stem.is_empty() {
        None
    } else {
        Some(stem)
    }
}

/// How many replicas answered a read.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoadStatus {
    /// No replica has the record.
    AllMissing,
    /// Exactly one replica is alive; the reader proceeds without voting.
    Partial,
    /// Two or three replicas are alive.
    Quorum,
}

/// Whether a successful read was backed by full replica agreement.
///
/// `Drifted` reads carry a correct value recovered from the surviving
/// replicas; callers may re-store the value to re-synchronize the triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Consistency {
    /// All three replicas were present and bitwise equal.
    Clean,
    /// Replicas disagreed or at least one was missing.
    Drifted,
}

/// The three on-disk homes of every record.
pub struct ReplicaSet {
    bases: [PathBuf; 3],
}

impl ReplicaSet {
    /// Create a replica set over three existing base directories.
    pub fn new(bases: [PathBuf; 3]) -> Self {
        Self { bases }
    }

    /// Full path of replica `i` for one record.
    fn record_path(&self, i: usize, module: &ModulePath, data_key: &str) -> PathBuf {
        let mut dir = self.bases[i].clone();
        if !module.is_root() {
            dir.push(module.as_rel_path());
        }
        dir.join(record_file_name(data_key))
    }

    /// Write one ciphertext to all three replicas.
    ///
    /// Individual replica failures are logged and absorbed; the write
    /// succeeds iff at least one replica was written.
    ///
    /// # Errors
    ///
    /// Returns [`StoreError::ReplicasFailed`] when every replica write
    /// failed (for module-level writes this includes the module directory
    /// being absent on every base).
    pub fn write(&self, module: &ModulePath, data_key: &str, ciphertext: &[u8]) -> Result<()> {
        let mut written = 0;
        for i in 0..REPLICA_COUNT {
            match self.write_one(i, module, data_key, ciphertext) {
                Ok(()) => written += 1,
                Err(e) => warn!(replica = i, data_key, error = %e, "replica write failed"),
            }
        }
        if written == 0 {
            return Err(StoreError::ReplicasFailed { operation: "write" });
        }
        debug!(data_key, module = %module.as_str(), written, "record written");
        Ok(())
    }

    fn write_one(
        &self,
        i: usize,
        module: &ModulePath,
        data_key: &str,
        ciphertext: &[u8],
    ) -> std::io::Result<()> {
        // Root-level writes recreate a wiped base; module directories must
        // already exist (modules are created explicitly, never as a side
        // effect of a write).
        if module.is_root() {
            fs::create_dir_all(&self.bases[i])?;
        }

        let path = self.record_path(i, module, data_key);
        if path.exists() {
            let _ = fs::remove_file(&path);
        }

        // Best-effort atomic per file: land the bytes under a temporary
        // name, then rename into place.
        let tmp = path.with_extension("jkl.tmp");
        fs::write(&tmp, ciphertext)?;
        fs::rename(&tmp, &path)?;
        Ok(())
    }

    /// Read all three replicas.  Missing and empty files are absence and
    /// come back as empty buffers.
    pub fn read(&self, module: &ModulePath, data_key: &str) -> (LoadStatus, [Vec<u8>; 3]) {
        let mut raw: [Vec<u8>; 3] = Default::default();
        for i in 0..REPLICA_COUNT {
            if let Ok(bytes) = fs::read(self.record_path(i, module, data_key)) {
                raw[i] = bytes;
            }
        }

        let missing = raw.iter().filter(|r| r.is_empty()).count();
        let status = match missing {
            3 => LoadStatus::AllMissing,
            2 => LoadStatus::Partial,
            _ => LoadStatus::Quorum,
        };
        (status, raw)
    }

    /// Best-effort removal of one record from every replica.
    pub fn remove(&self, module: &ModulePath, data_key: &str) {
        for i in 0..REPLICA_COUNT {
            let path = self.record_path(i, module, data_key);
            if let Err(e) = fs::remove_file(&path) {
                if e.kind() != std::io::ErrorKind::NotFound {
                    warn!(replica = i, data_key, error = %e, "replica delete failed");
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Voting
// ---------------------------------------------------------------------------

/// Decode-then-agree voting over up to three raw replicas.
///
/// 1. Bitwise equality of all three non-empty replicas marks the read
///    `Clean`; because ciphertext is salted, equality proves the files came
///    from one store call and were never touched since.
/// 2. Every non-empty replica is decoded independently; only decodes that
///    pass decryption, the integrity check, and the tag check become
///    candidates.
/// 3. Two identical candidates win outright; otherwise the first survivor
///    is returned as best-effort recovery from a single good replica.
pub(crate) fn vote(
    codec: &EnvelopeCodec,
    data_key: &str,
    raw: &[Vec<u8>; 3],
    expected: TypeTag,
) -> Result<(Vec<u8>, Consistency)> {
    let mut equal_pairs = 0;
    for i in 0..REPLICA_COUNT {
        for j in (i + 1)..REPLICA_COUNT {
            if !raw[i].is_empty() && raw[i] == raw[j] {
                equal_pairs += 1;
            }
        }
    }
    // Two or more equal pairs can only mean all three are present and equal.
    let consistency = if equal_pairs >= 2 {
        Consistency::Clean
    } else {
        Consistency::Drifted
    };

    let mut candidates: Vec<Vec<u8>> = Vec::new();
    let mut tag_mismatch = false;
    for bytes in raw.iter().filter(|bytes| !bytes.is_empty()) {
        match codec.open(data_key, bytes, expected) {
            Ok(text) => candidates.push(text),
            Err(DecodeFailure::TagMismatch) => tag_mismatch = true,
            Err(DecodeFailure::Invalid) => {}
        }
    }

    if candidates.is_empty() {
        return Err(if tag_mismatch {
            StoreError::TypeMismatch {
                data_key: data_key.to_string(),
                expected,
            }
        } else {
            StoreError::NotFound {
                data_key: data_key.to_string(),
            }
        });
    }

    for i in 0..candidates.len() {
        for j in (i + 1)..candidates.len() {
            if candidates[i] == candidates[j] {
                let value = candidates.swap_remove(i);
                return Ok((value, consistency));
            }
        }
    }
    let value = candidates.swap_remove(0);
    Ok((value, consistency))
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
