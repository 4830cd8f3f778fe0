//! Tree validation: does a mounted/copied tree belong to our product?

use crate::mount::MountService;
use crate::paths;
use crate::product::ProductInfo;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};
use walkdir::WalkDir;

/// Result of scanning a directory for installer ISO images.
///
/// `found_invalid` records whether any candidate mounted cleanly but failed
/// validation; the negotiators use it to distinguish "wrong product" from
/// "not an install tree at all" in user messaging.
#[derive(Debug, Clone, Default)]
pub struct IsoScan {
    pub image: Option<PathBuf>,
    pub found_invalid: bool,
}

/// Collaborator contract for product/tree validation.
pub trait TreeValidator {
    /// True if `path` holds an installation tree for the expected product.
    fn validate_tree(&self, path: &Path) -> bool;

    /// Scan `dir` (non-recursively) for a valid installer ISO. With
    /// `want_stage2` the ISO must also carry a stage2 image.
    fn find_iso_images(&self, dir: &Path, want_stage2: bool) -> IsoScan;

    /// Probe the fixed local-media mountpoint for already-surfaced
    /// installer media.
    fn find_local_media(&self, mountpoint: &Path) -> bool;
}

/// Validator backed by the `.discinfo` product stamp.
///
/// The stamp is three lines: a build timestamp, the product name, and the
/// architecture. A tree matches when the name and architecture agree with
/// the booted product.
pub struct DiscInfoValidator<'a> {
    product: ProductInfo,
    mounter: &'a dyn MountService,
    probe_mount: PathBuf,
}

impl<'a> DiscInfoValidator<'a> {
    pub fn new(product: ProductInfo, mounter: &'a dyn MountService, probe_mount: PathBuf) -> Self {
        Self {
            product,
            mounter,
            probe_mount,
        }
    }

    fn stamp_matches(&self, stamp: &str) -> bool {
        let mut lines = stamp.lines();
        let _timestamp = lines.next();
        let name = lines.next().unwrap_or("");
        let arch = lines.next().unwrap_or("");
        name == self.product.name && arch == self.product.arch
    }
}

impl TreeValidator for DiscInfoValidator<'_> {
    fn validate_tree(&self, path: &Path) -> bool {
        match fs::read_to_string(path.join(".discinfo")) {
            Ok(stamp) => self.stamp_matches(&stamp),
            Err(_) => false,
        }
    }

    fn find_iso_images(&self, dir: &Path, want_stage2: bool) -> IsoScan {
        let mut scan = IsoScan::default();

        let mut candidates: Vec<PathBuf> = WalkDir::new(dir)
            .min_depth(1)
            .max_depth(1)
            .into_iter()
            .filter_map(|e| e.ok())
            .filter(|e| e.file_type().is_file())
            .map(|e| e.into_path())
            .filter(|p| {
                p.extension()
                    .map(|ext| ext.eq_ignore_ascii_case("iso"))
                    .unwrap_or(false)
            })
            .collect();
        candidates.sort();

        for iso in candidates {
            let Ok(guard) = crate::mount::MountGuard::loopback(
                self.mounter,
                &iso,
                &self.probe_mount,
                paths::AUX_LOOP,
            ) else {
                debug!("could not loopback mount {}, skipping", iso.display());
                continue;
            };

            let mut valid = self.validate_tree(guard.target());
            if valid && want_stage2 {
                valid = guard
                    .target()
                    .join("images")
                    .join(crate::meminfo::STAGE2_IMAGE)
                    .exists();
            }
            guard.release();

            if valid {
                info!("found valid installer image {}", iso.display());
                scan.image = Some(iso);
                return scan;
            }
            scan.found_invalid = true;
        }
        scan
    }

    fn find_local_media(&self, mountpoint: &Path) -> bool {
        self.validate_tree(mountpoint)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Result;

    struct NoMounter;

    impl MountService for NoMounter {
        fn mount(&self, _: &str, _: &Path, _: &str, _: &str) -> Result<()> {
            panic!("unexpected mount");
        }
        fn mount_loopback(&self, _: &Path, _: &Path, _: &str) -> Result<()> {
            panic!("unexpected loopback mount");
        }
        fn unmount(&self, _: &Path) -> Result<()> {
            Ok(())
        }
        fn unmount_loopback(&self, _: &Path, _: &str) -> Result<()> {
            Ok(())
        }
    }

    fn product() -> ProductInfo {
        ProductInfo {
            name: "TestOS".to_string(),
            version: "1.0".to_string(),
            arch: "x86_64".to_string(),
        }
    }

    #[test]
    fn test_validate_tree_matches_stamp() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".discinfo"), "1227000000\nTestOS\nx86_64\n").unwrap();

        let validator = DiscInfoValidator::new(product(), &NoMounter, PathBuf::from("/unused"));
        assert!(validator.validate_tree(dir.path()));
    }

    #[test]
    fn test_validate_tree_rejects_other_product() {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join(".discinfo"), "1227000000\nOtherOS\nx86_64\n").unwrap();

        let validator = DiscInfoValidator::new(product(), &NoMounter, PathBuf::from("/unused"));
        assert!(!validator.validate_tree(dir.path()));
    }

    #[test]
    fn test_validate_tree_no_stamp() {
        let dir = tempfile::tempdir().unwrap();
        let validator = DiscInfoValidator::new(product(), &NoMounter, PathBuf::from("/unused"));
        assert!(!validator.validate_tree(dir.path()));
    }
}
