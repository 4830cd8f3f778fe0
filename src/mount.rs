//! Mount collaborator and the scoped mount guard.
//!
//! Every mount made during a negotiation attempt is wrapped in a
//! [`MountGuard`] so it is released on every exit path. The one exception is
//! the resolved stage2 runtime mount, which the caller promotes so the rest
//! of the installer can keep using it.

use crate::error::{LoaderError, Result};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tracing::{debug, warn};

/// Blocking mount/unmount of network filesystems and loopback devices.
///
/// Unmounts are idempotent: releasing a path that is not mounted is a no-op.
pub trait MountService {
    fn mount(&self, source: &str, target: &Path, fstype: &str, options: &str) -> Result<()>;
    fn mount_loopback(&self, image: &Path, target: &Path, device: &str) -> Result<()>;
    fn unmount(&self, target: &Path) -> Result<()>;
    fn unmount_loopback(&self, target: &Path, device: &str) -> Result<()>;
}

/// Real mounter shelling out to mount(8)/umount(8)/losetup(8).
pub struct SystemMounter;

impl SystemMounter {
    fn run_mount(&self, args: &[&str], source: &str, target: &Path) -> Result<()> {
        fs::create_dir_all(target)?;
        let output = Command::new("mount").args(args).output()?;
        if output.status.success() {
            debug!("mounted {} on {}", source, target.display());
            Ok(())
        } else {
            Err(LoaderError::Mount {
                mount_source: source.to_string(),
                target: target.to_path_buf(),
                detail: String::from_utf8_lossy(&output.stderr).trim().to_string(),
            })
        }
    }

    fn is_mounted(target: &Path) -> bool {
        let Ok(mounts) = fs::read_to_string("/proc/mounts") else {
            return false;
        };
        let needle = target.to_string_lossy();
        mounts
            .lines()
            .filter_map(|line| line.split_whitespace().nth(1))
            .any(|mp| mp == needle)
    }
}

impl MountService for SystemMounter {
    fn mount(&self, source: &str, target: &Path, fstype: &str, options: &str) -> Result<()> {
        let target_str = target.to_string_lossy().into_owned();
        self.run_mount(
            &["-t", fstype, "-o", options, source, &target_str],
            source,
            target,
        )
    }

    fn mount_loopback(&self, image: &Path, target: &Path, device: &str) -> Result<()> {
        let image_str = image.to_string_lossy().into_owned();
        let target_str = target.to_string_lossy().into_owned();
        let options = format!("ro,loop={device}");
        self.run_mount(
            &["-o", &options, &image_str, &target_str],
            &image_str,
            target,
        )
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        if !Self::is_mounted(target) {
            return Ok(());
        }
        let output = Command::new("umount").arg(target).output()?;
        if !output.status.success() {
            // Lazy detach as a last resort; a stuck transient mount must not
            // wedge the whole negotiation.
            warn!(
                "umount {} failed ({}), retrying lazily",
                target.display(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
            let _ = Command::new("umount").args(["-l"]).arg(target).output()?;
        }
        Ok(())
    }

    fn unmount_loopback(&self, target: &Path, device: &str) -> Result<()> {
        self.unmount(target)?;
        let _ = Command::new("losetup").args(["-d", device]).output();
        Ok(())
    }
}

/// Scoped mount that is released when dropped, unless promoted.
pub struct MountGuard<'a> {
    mounter: &'a dyn MountService,
    target: PathBuf,
    loop_device: Option<String>,
    armed: bool,
}

impl<'a> MountGuard<'a> {
    /// Mount a network filesystem and guard it.
    pub fn network(
        mounter: &'a dyn MountService,
        source: &str,
        target: &Path,
        fstype: &str,
        options: &str,
    ) -> Result<Self> {
        mounter.mount(source, target, fstype, options)?;
        Ok(Self {
            mounter,
            target: target.to_path_buf(),
            loop_device: None,
            armed: true,
        })
    }

    /// Loopback-mount an image file and guard it.
    pub fn loopback(
        mounter: &'a dyn MountService,
        image: &Path,
        target: &Path,
        device: &str,
    ) -> Result<Self> {
        mounter.mount_loopback(image, target, device)?;
        Ok(Self {
            mounter,
            target: target.to_path_buf(),
            loop_device: Some(device.to_string()),
            armed: true,
        })
    }

    /// Keep the mount past the guard's scope. Only the resolved stage2
    /// runtime mount is ever promoted.
    pub fn promote(mut self) -> PathBuf {
        self.armed = false;
        self.target.clone()
    }

    /// Release the mount now instead of at end of scope.
    pub fn release(mut self) {
        self.unmount();
    }

    pub fn target(&self) -> &Path {
        &self.target
    }

    fn unmount(&mut self) {
        if !self.armed {
            return;
        }
        self.armed = false;
        let result = match &self.loop_device {
            Some(device) => self.mounter.unmount_loopback(&self.target, device),
            None => self.mounter.unmount(&self.target),
        };
        if let Err(e) = result {
            warn!("failed to release mount {}: {e}", self.target.display());
        }
    }
}

impl Drop for MountGuard<'_> {
    fn drop(&mut self) {
        self.unmount();
    }
}
