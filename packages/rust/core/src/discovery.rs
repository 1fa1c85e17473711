//! Contribution discovery.
//!
//! A book root holds one directory per contribution (`contrib-*` by
//! default). Each directory contributes its text sources and metadata files
//! to a single rendered document.

use std::path::{Path, PathBuf};

use globset::{Glob, GlobMatcher};
use tracing::{debug, instrument};

use procbook_shared::{AssemblyConfig, Contribution, ProcbookError, Result};

/// Find every contribution directory under `config.root`, in book order.
///
/// Only direct children whose name matches `config.contrib_pattern` are
/// considered. The result is sorted by directory name.
#[instrument(skip_all, fields(root = %config.root.display(), pattern = %config.contrib_pattern))]
pub fn discover_contributions(config: &AssemblyConfig) -> Result<Vec<Contribution>> {
    let matcher = compile_pattern(&config.contrib_pattern)?;
    let root = config
        .root
        .canonicalize()
        .map_err(|e| ProcbookError::io(&config.root, e))?;

    let mut dirs: Vec<(String, PathBuf)> = Vec::new();
    for entry in std::fs::read_dir(&root).map_err(|e| ProcbookError::io(&root, e))? {
        let entry = entry.map_err(|e| ProcbookError::io(&root, e))?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let name = entry.file_name().to_string_lossy().into_owned();
        if matcher.is_match(&name) {
            dirs.push((name, path));
        }
    }
    dirs.sort();

    dirs.into_iter()
        .map(|(name, dir)| {
            scan_contribution(
                name,
                dir,
                &config.source_extension,
                &config.metadata_extension,
            )
        })
        .collect()
}

/// Collect the source and metadata files of one contribution directory.
pub fn scan_contribution(
    name: String,
    dir: PathBuf,
    source_extension: &str,
    metadata_extension: &str,
) -> Result<Contribution> {
    let sources = files_with_extension(&dir, source_extension)?;
    let metadata = files_with_extension(&dir, metadata_extension)?;

    debug!(
        contribution = %name,
        sources = sources.len(),
        metadata = metadata.len(),
        "scanned contribution"
    );

    Ok(Contribution {
        dir,
        name,
        sources,
        metadata,
    })
}

fn compile_pattern(pattern: &str) -> Result<GlobMatcher> {
    Glob::new(pattern)
        .map(|glob| glob.compile_matcher())
        .map_err(|e| ProcbookError::config(format!("invalid contribution pattern '{pattern}': {e}")))
}

/// Regular files directly inside `dir` with the given extension, sorted.
fn files_with_extension(dir: &Path, extension: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();
    for entry in std::fs::read_dir(dir).map_err(|e| ProcbookError::io(dir, e))? {
        let path = entry.map_err(|e| ProcbookError::io(dir, e))?.path();
        if path.is_file() && path.extension().is_some_and(|ext| ext == extension) {
            files.push(path);
        }
    }
    files.sort();
    Ok(files)
}
