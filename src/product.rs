//! Product identity used for tree validation and transfer headers.
//!
//! The identity normally comes from a JSON stamp baked into the boot image;
//! when no stamp is present the compiled defaults apply.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// Name, version, and architecture of the product being installed.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProductInfo {
    pub name: String,
    pub version: String,
    pub arch: String,
}

impl Default for ProductInfo {
    fn default() -> Self {
        Self {
            name: "LevitateOS".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            arch: std::env::consts::ARCH.to_string(),
        }
    }
}

impl ProductInfo {
    /// Load the product stamp from a JSON file, falling back to defaults
    /// when the file does not exist.
    pub fn load(stamp: &Path) -> Result<Self> {
        if !stamp.exists() {
            return Ok(Self::default());
        }
        let content = fs::read_to_string(stamp)
            .with_context(|| format!("failed to read product stamp {}", stamp.display()))?;
        serde_json::from_str(&content)
            .with_context(|| format!("malformed product stamp {}", stamp.display()))
    }
}
