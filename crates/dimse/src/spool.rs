//! Crash-safe spool writer: atomic write of dataset + sidecar, rename state
//! machine (§4.3).
//!
//! The two-step write-then-rename guarantees the out-of-scope scheduler never
//! observes a partially written file (Invariant 2). The sidecar captures
//! routing context that cannot be recovered from the dataset alone and sits
//! next to the payload so it survives process restarts.

use std::path::{Path, PathBuf};

use dicom_object::mem::InMemDicomObject;
use dicom_object::meta::FileMetaTableBuilder;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::{DimseError, Result};

/// Writes and retires spool entries under `<base_dir>/<destination_aet>/…`.
///
/// The temp file is given a random name (prefix `dcm`, suffix `.part`) so
/// concurrent creates for different requests never collide; the SOP
/// Instance UID correlation only applies to the post-rename final file,
/// which is what lets the N-SET half of an MPPS exchange locate the
/// N-CREATE half's `.ncreate` file by that UID (see DESIGN.md).
#[derive(Debug, Clone, Default)]
pub struct SpoolWriter;

impl SpoolWriter {
    pub fn new() -> Self {
        Self
    }

    /// Ensure `base_dir/destination_aet` exists, write `fmi` + `data` to a
    /// randomly-named `.part` temp file, and write its `.info` sidecar under
    /// the same (temp) stem. Returns the temp file's path for the caller to
    /// pass to `rename`.
    pub async fn create(
        &self,
        base_dir: &Path,
        destination_aet: &str,
        iuid: &str,
        fmi: FileMetaTableBuilder,
        data: &InMemDicomObject,
        source_aet: &str,
        use_calling_aet: Option<&str>,
    ) -> Result<PathBuf> {
        let dest_dir = base_dir.join(destination_aet);
        tokio::fs::create_dir_all(&dest_dir).await?;

        let temp_path = dest_dir.join(format!("dcm{}.part", Uuid::new_v4()));
        let sidecar_path = sidecar_path_for(&temp_path);

        match self
            .write_part10(&temp_path, fmi, data)
            .and_then(|()| self.write_sidecar(&sidecar_path, source_aet, use_calling_aet))
        {
            Ok(()) => {
                debug!(path = %temp_path.display(), iuid, "spooled temp file");
                Ok(temp_path)
            }
            Err(e) => {
                let _ = std::fs::remove_file(&temp_path);
                let _ = std::fs::remove_file(&sidecar_path);
                Err(e)
            }
        }
    }

    fn write_part10(
        &self,
        path: &Path,
        fmi: FileMetaTableBuilder,
        data: &InMemDicomObject,
    ) -> Result<()> {
        let meta = fmi
            .build()
            .map_err(|e| DimseError::DicomObject(e.to_string()))?;
        let file_obj = data.clone().with_exact_meta(meta);

        file_obj
            .write_to_file(path)
            .map_err(|e| DimseError::DicomObject(e.to_string()))?;

        // fsync before the caller renames, so the scheduler never observes a
        // file whose content hasn't hit disk.
        let f = std::fs::File::open(path)?;
        f.sync_all()?;
        Ok(())
    }

    fn write_sidecar(
        &self,
        path: &Path,
        source_aet: &str,
        use_calling_aet: Option<&str>,
    ) -> Result<()> {
        let mut contents = format!("source-aet={source_aet}\n");
        if let Some(aet) = use_calling_aet {
            contents.push_str(&format!("use-calling-aet={aet}\n"));
        }
        std::fs::write(path, contents)?;
        Ok(())
    }

    /// Atomically rename a `.part` temp file to its final `{iuid}{suffix}`
    /// name (`.dcm` or `.ncreate`), and move its `.info` sidecar alongside
    /// it. The temp file's own (random) stem plays no part in the final
    /// name: `iuid` is passed explicitly by the caller (§9).
    ///
    /// The sidecar is renamed first: if a crash lands between the two
    /// renames, the dataset is left behind at its `.part` name, which the
    /// recovery sweep deletes as an orphaned partial write, leaking only the
    /// now-unreferenced `.info` file rather than discarding a completed
    /// dataset.
    pub async fn rename(&self, temp_path: &Path, iuid: &str, suffix: &str) -> Result<PathBuf> {
        let final_path = temp_path.with_file_name(format!("{iuid}{suffix}"));

        let temp_sidecar = sidecar_path_for(temp_path);
        let final_sidecar = sidecar_path_for(&final_path);
        tokio::fs::rename(&temp_sidecar, &final_sidecar)
            .await
            .map_err(|e| DimseError::RenameFailed(e.to_string()))?;

        tokio::fs::rename(temp_path, &final_path)
            .await
            .map_err(|e| DimseError::RenameFailed(e.to_string()))?;

        let now = std::time::SystemTime::now();
        if let Ok(f) = std::fs::File::open(&final_path) {
            let _ = f.set_modified(now);
        }

        debug!(path = %final_path.display(), "renamed spool entry to final state");
        Ok(final_path)
    }

    /// Delete a dataset file and its sidecar; prune the enclosing directory
    /// if it is now empty. Failures are logged, never raised (§4.3).
    pub async fn delete(&self, dataset_path: &Path) {
        let sidecar = sidecar_path_for(dataset_path);

        if let Err(e) = tokio::fs::remove_file(dataset_path).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %dataset_path.display(), error = %e, "failed to delete spool dataset");
            }
        }
        if let Err(e) = tokio::fs::remove_file(&sidecar).await {
            if e.kind() != std::io::ErrorKind::NotFound {
                warn!(path = %sidecar.display(), error = %e, "failed to delete spool sidecar");
            }
        }

        if let Some(dir) = dataset_path.parent() {
            if dir_is_empty(dir) {
                if let Err(e) = tokio::fs::remove_dir(dir).await {
                    if e.kind() != std::io::ErrorKind::NotFound {
                        warn!(dir = %dir.display(), error = %e, "failed to prune empty spool dir");
                    }
                }
            }
        }
    }
}

/// The stem of a spool filename: its name with the *final* extension
/// stripped (Invariant 6). `<iuid>.dcm`'s sidecar is `<iuid>.info`, not
/// `<first-dot-prefix>.info`.
pub fn stem_of(path: &Path) -> String {
    path.file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_default()
}

fn sidecar_path_for(path: &Path) -> PathBuf {
    with_stem_suffix(path, ".info")
}

fn with_stem_suffix(path: &Path, suffix: &str) -> PathBuf {
    let stem = stem_of(path);
    path.with_file_name(format!("{stem}{suffix}"))
}

fn dir_is_empty(dir: &Path) -> bool {
    std::fs::read_dir(dir)
        .map(|mut entries| entries.next().is_none())
        .unwrap_or(false)
}
