//! Post-write integrity gate.
//!
//! Defense in depth, fail closed: after every artifact is on disk, walk the
//! whole output tree and run the full credential pattern library against
//! each file's raw text. Any match deletes the file on the spot and fails
//! the run. The gate deliberately performs the destructive action *and*
//! still signals failure upward — an operator must never be able to assume
//! a tree that survived compilation is complete.
//!
//! Per-file errors are isolated: an unreadable file is logged and skipped
//! so one bad file cannot shield the rest of the tree from the sweep, and
//! deleting an already-missing file is treated as done.

use crate::patterns::find_credential;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Outcome of one sweep of the output tree.
#[derive(Debug, Default)]
pub struct SweepReport {
    /// True when no file matched any credential pattern.
    pub clean: bool,
    /// Files that matched and were deleted.
    pub removed: Vec<PathBuf>,
}

/// Sweep every file under `root` for credential fragments, deleting any
/// file that matches. A missing or empty root is clean — nothing was
/// emitted, nothing can leak.
pub fn sweep(root: &Path) -> SweepReport {
    let mut removed = Vec::new();

    for entry in WalkDir::new(root).into_iter().filter_map(|e| e.ok()) {
        if !entry.file_type().is_file() {
            continue;
        }
        let path = entry.path();

        let text = match std::fs::read_to_string(path) {
            Ok(text) => text,
            Err(e) => {
                eprintln!("warning: gate could not read {}: {e}", path.display());
                continue;
            }
        };

        if let Some(pattern) = find_credential(&text) {
            eprintln!(
                "SECURITY: {} matched credential pattern ({pattern}), deleting",
                path.display()
            );
            match std::fs::remove_file(path) {
                Ok(()) => {}
                // Idempotent delete: a concurrent removal already did the job
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => eprintln!("warning: could not delete {}: {e}", path.display()),
            }
            removed.push(path.to_path_buf());
        }
    }

    SweepReport {
        clean: removed.is_empty(),
        removed,
    }
}
