//! Single-file transfer collaborator for HTTP and FTP trees.

use crate::error::{LoaderError, Result};
use crate::netinfo::NetworkService;
use crate::product::ProductInfo;
use crate::source::{UrlProtocol, UrlSource};
use crate::state::LoaderFlags;
use std::fs;
use std::path::Path;
use std::process::Command;
use tracing::debug;

/// Opens, reads, and closes one remote file over HTTP or FTP.
pub trait TransferService {
    /// Fetch `path` from the served tree. With `dest == None` the file is
    /// only opened and closed, which makes this a reachability probe.
    fn fetch(
        &self,
        url: &UrlSource,
        path: &str,
        headers: &[String],
        dest: Option<&Path>,
    ) -> Result<()>;
}

/// Real transfer implementation shelling out to curl.
pub struct CurlTransfer;

impl CurlTransfer {
    fn full_url(url: &UrlSource, path: &str) -> String {
        format!(
            "{}://{}/{}",
            url.protocol.scheme(),
            url.address,
            path.trim_start_matches('/')
        )
    }
}

impl TransferService for CurlTransfer {
    fn fetch(
        &self,
        url: &UrlSource,
        path: &str,
        headers: &[String],
        dest: Option<&Path>,
    ) -> Result<()> {
        let remote = Self::full_url(url, path);
        let mut cmd = Command::new("curl");
        cmd.args(["-sSf", "--connect-timeout", "30"]);

        if let Some(login) = &url.login {
            let user = match &url.password {
                Some(password) => format!("{login}:{password}"),
                None => login.clone(),
            };
            cmd.args(["--user", &user]);
        }
        if url.protocol == UrlProtocol::Http {
            for header in headers {
                cmd.args(["-H", header]);
            }
        }
        match dest {
            Some(dest) => {
                if let Some(parent) = dest.parent() {
                    fs::create_dir_all(parent)?;
                }
                cmd.args(["-o", &dest.to_string_lossy()]);
            }
            None => {
                cmd.args(["-o", "/dev/null"]);
            }
        }

        debug!("fetching {remote}");
        let output = cmd.arg(&remote).output()?;
        if !output.status.success() {
            if let Some(dest) = dest {
                let _ = fs::remove_file(dest);
            }
            return Err(LoaderError::Transfer(remote));
        }
        Ok(())
    }
}

/// Identifying headers sent with HTTP transfers: product identity plus,
/// when enabled, one provisioning header per detected interface.
pub fn identifying_headers(
    product: &ProductInfo,
    flags: LoaderFlags,
    net: &dyn NetworkService,
) -> Vec<String> {
    let mut headers = vec![
        format!("User-Agent: stagesrc/{}", product.version),
        format!("X-Installer-Architecture: {}", product.arch),
        format!("X-Installer-System-Release: {}", product.name),
    ];
    if flags.send_mac_headers {
        for (i, iface) in net.interfaces().iter().enumerate() {
            headers.push(format!(
                "X-Provisioning-MAC-{i}: {} {}",
                iface.name, iface.mac
            ));
        }
    }
    headers
}
