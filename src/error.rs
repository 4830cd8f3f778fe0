//! Error taxonomy for source negotiation.
//!
//! Soft failures (auxiliary images, silent reachability probes) are not
//! represented here; they are logged and swallowed at the call site and
//! never alter the bound method or flags.

use std::path::PathBuf;
use thiserror::Error;

/// Error type for loader source resolution.
#[derive(Debug, Error)]
pub enum LoaderError {
    /// Missing or malformed required parameter. Hard, no retry.
    #[error("bad parameter: {0}")]
    Param(String),

    /// A hostname was given but no DNS is available to resolve it.
    #[error("hostname {0} specified with no DNS configured")]
    HostNeedsDns(String),

    /// The transport rejected a mount request.
    #[error("failed to mount {mount_source} on {target}: {detail}")]
    Mount {
        mount_source: String,
        target: PathBuf,
        detail: String,
    },

    /// A required remote file could not be retrieved.
    #[error("unable to retrieve {0}")]
    Transfer(String),

    /// The mounted/copied location does not contain an installation tree.
    #[error("no installation tree found at {0}")]
    NoTree(String),

    /// An installation tree was found but belongs to a different product.
    #[error("installation tree at {0} does not match the boot media")]
    WrongTree(String),

    /// I/O error during staging or cleanup.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type for loader operations.
pub type Result<T> = std::result::Result<T, LoaderError>;
