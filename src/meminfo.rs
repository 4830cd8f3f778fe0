//! Total-memory detection and stage2 variant selection.

use crate::error::Result;
use std::fs;
use std::path::Path;

/// Minimum RAM (in KiB) for the graphical stage2 image. Systems at or below
/// this get the minimal text-mode variant instead.
pub const GUI_STAGE2_RAM_KB: u64 = 128 * 1024;

/// Filename of the full (graphical) stage2 image.
pub const STAGE2_IMAGE: &str = "stage2.img";
/// Filename of the memory-constrained stage2 image.
pub const MIN_STAGE2_IMAGE: &str = "minstg2.img";

/// Pick the stage2 image variant for the given total memory.
pub fn stage2_image_for(total_kb: u64) -> &'static str {
    if total_kb <= GUI_STAGE2_RAM_KB {
        MIN_STAGE2_IMAGE
    } else {
        STAGE2_IMAGE
    }
}

/// Total system memory in KiB, from /proc/meminfo.
pub fn total_memory_kb() -> Result<u64> {
    parse_meminfo(&fs::read_to_string("/proc/meminfo")?)
}

/// Same, but from an arbitrary meminfo-format file.
pub fn total_memory_kb_from(path: &Path) -> Result<u64> {
    parse_meminfo(&fs::read_to_string(path)?)
}

fn parse_meminfo(content: &str) -> Result<u64> {
    for line in content.lines() {
        if let Some(rest) = line.strip_prefix("MemTotal:") {
            let kb = rest
                .trim()
                .trim_end_matches(" kB")
                .trim()
                .parse::<u64>()
                .map_err(|_| {
                    crate::error::LoaderError::Param(format!("bad MemTotal line: {line}"))
                })?;
            return Ok(kb);
        }
    }
    Err(crate::error::LoaderError::Param(
        "no MemTotal in meminfo".to_string(),
    ))
}
