//! Single-file fetch, used to retrieve a kickstart configuration before any
//! source negotiation runs.
//!
//! Reuses the mount and transfer primitives but skips the stage2 pipeline:
//! mount or connect just long enough to copy exactly one file, then release
//! everything, on both success and failure paths.

use crate::copy::copy_file;
use crate::error::{LoaderError, Result};
use crate::mount::{MountGuard, MountService};
use crate::netinfo::{dhcp_fetch_target, NetworkService};
use crate::paths::WellKnownPaths;
use crate::product::ProductInfo;
use crate::source::{InstallSourceSpec, UrlSource};
use crate::state::LoaderFlags;
use crate::transfer::{identifying_headers, TransferService};
use std::path::Path;
use tracing::info;

/// Resolve a raw source string into one retrieved file at `dest`.
///
/// With no source string, the target is synthesized from the DHCP-provided
/// next-server and boot-file data.
#[allow(clippy::too_many_arguments)]
pub fn fetch_single_file(
    source: Option<&str>,
    dest: &Path,
    mounter: &dyn MountService,
    transfer: &dyn TransferService,
    net: &dyn NetworkService,
    flags: LoaderFlags,
    product: &ProductInfo,
    paths: &WellKnownPaths,
) -> Result<()> {
    let net_info = net.bring_up()?;
    let source = match source {
        Some(source) => source.to_string(),
        None => dhcp_fetch_target(&net_info)?,
    };
    info!("fetching {source}");

    if source.starts_with("http://") || source.starts_with("ftp://") {
        fetch_from_url(&source, dest, transfer, net, flags, product)
    } else {
        fetch_from_nfs(&source, dest, mounter, paths)
    }
}

fn fetch_from_url(
    raw: &str,
    dest: &Path,
    transfer: &dyn TransferService,
    net: &dyn NetworkService,
    flags: LoaderFlags,
    product: &ProductInfo,
) -> Result<()> {
    let InstallSourceSpec::Url(url) = InstallSourceSpec::parse(raw)? else {
        return Err(LoaderError::Param(format!("not a url source: {raw}")));
    };
    let path = url.prefix.clone();
    let base = UrlSource {
        prefix: String::new(),
        ..url
    };

    let headers = identifying_headers(product, flags, net);
    transfer.fetch(&base, &path, &headers, Some(dest))
}

fn fetch_from_nfs(
    raw: &str,
    dest: &Path,
    mounter: &dyn MountService,
    paths: &WellKnownPaths,
) -> Result<()> {
    let (opts, host, path) = split_nfs_fetch_source(raw)?;
    let (export, file) = nfs_export_and_file(&host, &path);
    info!("file location: nfs:{export}/{file}");

    let guard = MountGuard::network(
        mounter,
        &export,
        &paths.fetch_mount(),
        "nfs",
        opts.as_deref().unwrap_or("ro"),
    )?;
    let result = copy_file(&guard.target().join(&file), dest);
    guard.release();
    result
}

/// Split a raw NFS fetch source into mount options, host, and path. The
/// accepted shapes are `host:path` and `opts:host:path`.
pub fn split_nfs_fetch_source(raw: &str) -> Result<(Option<String>, String, String)> {
    let parts: Vec<&str> = raw.splitn(3, ':').collect();
    match parts.as_slice() {
        [host, path] if !host.is_empty() && !path.is_empty() => {
            Ok((None, host.to_string(), path.to_string()))
        }
        [opts, host, path] if !host.is_empty() && !path.is_empty() => Ok((
            Some(opts.to_string()),
            host.to_string(),
            path.to_string(),
        )),
        _ => Err(LoaderError::Param(format!(
            "nfs fetch source must be [opts:]host:path, got {raw}"
        ))),
    }
}

/// Split the path into the export to mount (`host:dir`) and the single
/// file to copy. The file is the last path component; an empty or missing
/// directory part mounts the export root.
pub fn nfs_export_and_file(host: &str, path: &str) -> (String, String) {
    let (dir, file) = match path.rfind('/') {
        None => ("/", path),
        Some(0) => ("/", &path[1..]),
        Some(idx) => (&path[..idx], &path[idx + 1..]),
    };
    (format!("{host}:{dir}"), file.to_string())
}
