//! Stage2 image resolution, shared by both negotiators.
//!
//! Given a located candidate stage2 file: copy it to local staging storage,
//! loopback-mount it, and check that it belongs to the expected product. On
//! success the mount is left active (it becomes the final runtime mount);
//! on any other outcome everything this step created is torn down.

use crate::copy::copy_file;
use crate::error::{LoaderError, Result};
use crate::mount::{MountGuard, MountService};
use crate::validate::TreeValidator;
use std::fs;
use std::path::Path;
use tracing::{info, warn};

/// Classification of a stage2 candidate.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StageOutcome {
    /// The image mounted and validated; the runtime mount is active.
    Success,
    /// The image mounted but belongs to a different product.
    WrongTree,
    /// The candidate could not be retrieved or mounted.
    TransferFailed,
}

pub struct StageImageResolver<'a> {
    mounter: &'a dyn MountService,
    validator: &'a dyn TreeValidator,
}

impl<'a> StageImageResolver<'a> {
    pub fn new(mounter: &'a dyn MountService, validator: &'a dyn TreeValidator) -> Self {
        Self { mounter, validator }
    }

    /// Stage and mount a candidate stage2 image.
    pub fn resolve(
        &self,
        candidate: &Path,
        staging: &Path,
        mountpoint: &Path,
        device: &str,
    ) -> Result<StageOutcome> {
        if let Err(e) = copy_file(candidate, staging) {
            warn!("unable to access {}: {e}", candidate.display());
            return Ok(StageOutcome::TransferFailed);
        }
        info!("staged stage2 candidate {}", candidate.display());
        self.mount_staged(staging, mountpoint, device)
    }

    /// Mount and classify an already-staged stage2 image. Used directly by
    /// the URL negotiator, where the transfer itself produced the staged
    /// copy.
    pub fn mount_staged(
        &self,
        staging: &Path,
        mountpoint: &Path,
        device: &str,
    ) -> Result<StageOutcome> {
        let guard = match MountGuard::loopback(self.mounter, staging, mountpoint, device) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("failed to loopback mount {}: {e}", staging.display());
                let _ = fs::remove_file(staging);
                return Ok(StageOutcome::TransferFailed);
            }
        };

        if !self.validator.validate_tree(guard.target()) {
            warn!("staged image at {} is not the right tree", staging.display());
            guard.release();
            let _ = fs::remove_file(staging);
            return Ok(StageOutcome::WrongTree);
        }

        // The runtime mount outlives this negotiation; everything else the
        // resolver created has been paired with a release above.
        guard.promote();
        Ok(StageOutcome::Success)
    }
}

/// Split an explicitly given stage2 path into its parent directory and
/// filename. The path must contain a separator; a trailing separator is
/// ignored.
pub fn split_override_path(directory: &str) -> Result<(String, String)> {
    let trimmed = directory.trim_end_matches('/');
    let Some(idx) = trimmed.rfind('/') else {
        return Err(LoaderError::Param(format!(
            "stage2 override {directory} has no path separator"
        )));
    };
    let file = &trimmed[idx + 1..];
    if file.is_empty() {
        return Err(LoaderError::Param(format!(
            "stage2 override {directory} has no filename"
        )));
    }
    let parent = if idx == 0 { "/" } else { &trimmed[..idx] };
    Ok((parent.to_string(), file.to_string()))
}
