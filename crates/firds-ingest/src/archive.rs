//! ZIP extraction

use crate::error::ExtractError;
use std::fs::File;
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::{debug, info, instrument};

/// Unpacks an archive into a directory.
pub trait ArchiveExtractor: Send + Sync {
    /// Extracts every regular file of `archive` below `dest_dir` and returns
    /// their paths in archive order.
    fn extract_archive(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError>;
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ZipExtractor;

impl ArchiveExtractor for ZipExtractor {
    #[instrument(skip(self), fields(archive = %archive.display(), dest = %dest_dir.display()))]
    fn extract_archive(&self, archive: &Path, dest_dir: &Path) -> Result<Vec<PathBuf>, ExtractError> {
        let archive_name = archive.display().to_string();

        let file = File::open(archive).map_err(|source| ExtractError::Open {
            path: archive_name.clone(),
            source,
        })?;
        let mut zip = zip::ZipArchive::new(file).map_err(|source| ExtractError::Archive {
            path: archive_name.clone(),
            source,
        })?;

        std::fs::create_dir_all(dest_dir).map_err(|source| ExtractError::Io {
            path: archive_name.clone(),
            entry: dest_dir.display().to_string(),
            source,
        })?;

        let mut extracted = Vec::new();

        for i in 0..zip.len() {
            let mut entry = zip.by_index(i).map_err(|source| ExtractError::Archive {
                path: archive_name.clone(),
                source,
            })?;

            if entry.is_dir() {
                continue;
            }

            let entry_name = entry.name().to_string();
            let relative = entry
                .enclosed_name()
                .map(Path::to_path_buf)
                .ok_or_else(|| ExtractError::UnsafeEntry {
                    entry: entry_name.clone(),
                })?;
            let target = dest_dir.join(relative);

            let io_error = |source| ExtractError::Io {
                path: archive_name.clone(),
                entry: entry_name.clone(),
                source,
            };

            if let Some(parent) = target.parent() {
                std::fs::create_dir_all(parent).map_err(io_error)?;
            }

            let mut out = BufWriter::new(File::create(&target).map_err(io_error)?);
            let bytes = std::io::copy(&mut entry, &mut out).map_err(io_error)?;
            out.into_inner()
                .map_err(|e| io_error(e.into_error()))?;

            debug!(entry = %entry_name, bytes, "extracted");
            extracted.push(target);
        }

        info!(files = extracted.len(), "archive extracted");
        Ok(extracted)
    }
}

/// Paths whose extension matches `extension`, ignoring case.
pub fn filter_by_extension(paths: &[PathBuf], extension: &str) -> Vec<PathBuf> {
    paths
        .iter()
        .filter(|p| {
            p.extension()
                .map(|ext| ext.to_string_lossy().eq_ignore_ascii_case(extension))
                .unwrap_or(false)
        })
        .cloned()
        .collect()
}
