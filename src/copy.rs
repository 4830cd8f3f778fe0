//! File and directory copy primitives used while staging images.

use crate::error::Result;
use std::fs;
use std::path::Path;
use tracing::warn;
use walkdir::WalkDir;

/// Copy a single file, creating the destination's parent directories.
pub fn copy_file(src: &Path, dest: &Path) -> Result<()> {
    if let Some(parent) = dest.parent() {
        fs::create_dir_all(parent)?;
    }
    fs::copy(src, dest)?;
    Ok(())
}

/// Merge the contents of `src` into `dest`, warning on (and skipping)
/// entries that cannot be copied. Used to accumulate auxiliary image
/// contents, where a partial merge is better than no merge.
pub fn copy_directory(src: &Path, dest: &Path) -> Result<()> {
    fs::create_dir_all(dest)?;
    for entry in WalkDir::new(src).min_depth(1) {
        let entry = match entry {
            Ok(entry) => entry,
            Err(e) => {
                warn!("skipping unreadable entry under {}: {e}", src.display());
                continue;
            }
        };
        let rel = entry
            .path()
            .strip_prefix(src)
            .expect("walkdir yields paths under its root");
        let target = dest.join(rel);
        if entry.file_type().is_dir() {
            if let Err(e) = fs::create_dir_all(&target) {
                warn!("could not create {}: {e}", target.display());
            }
        } else if let Err(e) = copy_file(entry.path(), &target) {
            warn!("could not copy {}: {e}", entry.path().display());
        }
    }
    Ok(())
}

/// Pick up an externally supplied updates image if one exists beside the
/// located ISO. Missing or unreadable images are fine.
pub fn copy_updates_image(src: &Path, dest: &Path) {
    if src.exists() {
        if let Err(e) = copy_file(src, dest) {
            warn!("found updates image {} but could not stage it: {e}", src.display());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_copy_file_creates_parents() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt");
        fs::write(&src, "hello").unwrap();
        let dest = dir.path().join("deep/nested/a.txt");
        copy_file(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest).unwrap(), "hello");
    }

    #[test]
    fn test_copy_directory_merges() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("src");
        fs::create_dir_all(src.join("sub")).unwrap();
        fs::write(src.join("top.txt"), "1").unwrap();
        fs::write(src.join("sub/inner.txt"), "2").unwrap();

        let dest = dir.path().join("dest");
        fs::create_dir_all(&dest).unwrap();
        fs::write(dest.join("existing.txt"), "keep").unwrap();

        copy_directory(&src, &dest).unwrap();
        assert_eq!(fs::read_to_string(dest.join("top.txt")).unwrap(), "1");
        assert_eq!(fs::read_to_string(dest.join("sub/inner.txt")).unwrap(), "2");
        assert_eq!(fs::read_to_string(dest.join("existing.txt")).unwrap(), "keep");
    }

    #[test]
    fn test_copy_updates_image_missing_is_ok() {
        let dir = tempfile::tempdir().unwrap();
        copy_updates_image(&dir.path().join("nope.img"), &dir.path().join("out.img"));
        assert!(!dir.path().join("out.img").exists());
    }
}
