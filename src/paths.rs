//! Well-known mountpoints and staging locations.
//!
//! The loader works against a small fixed set of paths. They are collected
//! here, rooted at a configurable prefix, so tests can relocate the whole
//! layout into a temporary directory.

use std::path::{Path, PathBuf};

/// Loop device used for the final runtime stage2 mount.
pub const STAGE2_LOOP: &str = "/dev/loop0";
/// Loop device used when mounting an ISO found on an NFS export.
pub const ISO_LOOP: &str = "/dev/loop1";
/// Loop device used for short-lived auxiliary image mounts.
pub const AUX_LOOP: &str = "/dev/loop7";

/// The fixed path layout, rooted at a prefix ("/" in production).
#[derive(Debug, Clone)]
pub struct WellKnownPaths {
    root: PathBuf,
}

impl Default for WellKnownPaths {
    fn default() -> Self {
        Self::rooted("/")
    }
}

impl WellKnownPaths {
    pub fn rooted(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    fn at(&self, rel: &str) -> PathBuf {
        self.root.join(rel)
    }

    /// Where the network export is mounted while looking for stage2.
    pub fn source_mount(&self) -> PathBuf {
        self.at("mnt/source")
    }

    /// Dedicated mountpoint for scanning an export for ISO images.
    pub fn iso_scan_mount(&self) -> PathBuf {
        self.at("mnt/isodir")
    }

    /// Probe point for locally attached installer media.
    pub fn local_media_mount(&self) -> PathBuf {
        self.at("mnt/stage2")
    }

    /// The final persistent runtime mount used by the second stage.
    pub fn runtime_mount(&self) -> PathBuf {
        self.at("mnt/runtime")
    }

    /// Local staging copy of the stage2 image.
    pub fn staged_stage2(&self) -> PathBuf {
        self.at("tmp/stage2.img")
    }

    /// Scratch mountpoint for the single-file NFS fetch.
    pub fn fetch_mount(&self) -> PathBuf {
        self.at("tmp/mnt")
    }

    /// Staged copy of an updates image found beside an ISO.
    pub fn updates_image(&self) -> PathBuf {
        self.at("tmp/updates.img")
    }

    /// Staging triple for the auxiliary updates image: downloaded image,
    /// transient loopback mountpoint, accumulation directory.
    pub fn updates_staging(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.at("tmp/updates-disk.img"),
            self.at("tmp/update-disk"),
            self.at("tmp/updates"),
        )
    }

    /// Staging triple for the auxiliary product image.
    pub fn product_staging(&self) -> (PathBuf, PathBuf, PathBuf) {
        (
            self.at("tmp/product-disk.img"),
            self.at("tmp/product-disk"),
            self.at("tmp/product"),
        )
    }

    /// Scratch mountpoint used while probing ISO candidates.
    pub fn iso_probe_mount(&self) -> PathBuf {
        self.at("tmp/iso-probe")
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}
