//! Recovery Sweeper: reconciles spool roots with the on-disk state machine
//! on startup and shutdown (§4.5).
//!
//! Runs depth-first, one AE's spool roots at a time; no action here is
//! fatal to the sweep as a whole, matching the Spool Writer's own
//! log-and-continue approach to filesystem failures (§4.3).

use std::path::Path;

use tracing::{info, warn};

use crate::config::ProxyAeConfig;
use crate::spool::{stem_of, SpoolWriter};

#[derive(Debug, Clone, Default)]
pub struct RecoverySweeper {
    spool: SpoolWriter,
}

impl RecoverySweeper {
    pub fn new() -> Self {
        Self {
            spool: SpoolWriter::new(),
        }
    }

    /// Sweep every spool root of one proxy AE.
    pub async fn sweep_ae(&self, ae_config: &ProxyAeConfig) {
        let is_cstore_root = |root: &Path| root == ae_config.spool.cstore_dir;

        for root in [
            &ae_config.spool.cstore_dir,
            &ae_config.spool.ncreate_dir,
            &ae_config.spool.nset_dir,
            &ae_config.spool.dose_sr_dir,
            &ae_config.spool.naction_dir,
            &ae_config.spool.nevent_dir,
        ] {
            self.sweep_root(root, is_cstore_root(root)).await;
        }
    }

    async fn sweep_root(&self, root: &Path, is_cstore_root: bool) {
        let Ok(mut destinations) = tokio::fs::read_dir(root).await else {
            return;
        };

        while let Ok(Some(dest_entry)) = destinations.next_entry().await {
            let dest_dir = dest_entry.path();
            if !dest_dir.is_dir() {
                continue;
            }
            self.sweep_destination_dir(&dest_dir, is_cstore_root).await;
        }
    }

    async fn sweep_destination_dir(&self, dest_dir: &Path, is_cstore_root: bool) {
        let Ok(mut entries) = tokio::fs::read_dir(dest_dir).await else {
            return;
        };

        while let Ok(Some(entry)) = entries.next_entry().await {
            let path = entry.path();
            let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
                continue;
            };

            if name.ends_with(".part") {
                info!(path = %path.display(), "recovery: deleting orphaned .part file");
                self.spool.delete(&path).await;
            } else if is_cstore_root && name.ends_with(".tmpBulkData") {
                info!(path = %path.display(), "recovery: deleting orphaned bulk data temp file");
                let _ = tokio::fs::remove_file(&path).await;
            } else if name.ends_with(".snd") {
                self.restore_snd(&path).await;
            } else if name.ends_with(".dcm") {
                self.prune_orphan_dcm(&path).await;
            }
        }
    }

    /// A `.snd` file means a prior process was mid-send when it crashed: the
    /// entry is eligible for resend, so strip the `.snd` suffix to restore
    /// its pre-transmit form (`.dcm` or `.ncreate`, whichever it was).
    /// Renaming unconditionally to `.dcm` would corrupt a `.ncreate` caught
    /// mid-send.
    async fn restore_snd(&self, path: &Path) {
        let Some(file_name) = path.file_name().and_then(|n| n.to_str()) else {
            return;
        };
        let Some(restored_name) = file_name.strip_suffix(".snd") else {
            return;
        };
        if restored_name.is_empty() {
            warn!(path = %path.display(), "recovery: malformed .snd file, deleting");
            self.spool.delete(path).await;
            return;
        }

        let restored_path = path.with_file_name(restored_name);
        match tokio::fs::rename(path, &restored_path).await {
            Ok(()) => info!(path = %restored_path.display(), "recovery: restored .snd to its pre-transmit form"),
            Err(e) => warn!(path = %path.display(), error = %e, "recovery: failed to restore .snd"),
        }
    }

    /// A `.dcm` entry with no matching `.info` sidecar cannot be routed; it
    /// is orphaned and safe to discard.
    async fn prune_orphan_dcm(&self, path: &Path) {
        let sidecar = path.with_file_name(format!("{}.info", stem_of(path)));
        if !sidecar.exists() {
            info!(path = %path.display(), "recovery: deleting orphan .dcm with no sidecar");
            self.spool.delete(path).await;
        }
    }
}
