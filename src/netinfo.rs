//! Network collaborator interface.
//!
//! Interface bring-up and DHCP negotiation happen elsewhere in the loader;
//! this module only exposes what source resolution needs: the DHCP-provided
//! next-server/boot-file pair and the interface list for MAC headers.

use crate::error::{LoaderError, Result};
use std::fs;
use std::net::Ipv4Addr;

/// What DHCP/bootp told us, surfaced after bring-up.
#[derive(Debug, Clone, Default)]
pub struct NetworkInfo {
    /// TFTP/boot server offered by DHCP, if any.
    pub next_server: Option<Ipv4Addr>,
    /// Boot file name offered by DHCP, if any.
    pub boot_file: Option<String>,
}

/// A detected network interface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NetInterface {
    pub name: String,
    pub mac: String,
}

/// Collaborator contract for network state.
pub trait NetworkService {
    /// Ensure the network is up and return the DHCP-derived info.
    fn bring_up(&self) -> Result<NetworkInfo>;

    /// Enumerate ethernet interfaces with their MAC addresses.
    fn interfaces(&self) -> Vec<NetInterface>;
}

/// Real implementation reading interface state from sysfs. Bring-up itself
/// is owned by the loader's network stage; by the time source resolution
/// runs the link is already configured, so `bring_up` only reports what the
/// lease recorded.
pub struct SysfsNetwork {
    pub info: NetworkInfo,
}

impl SysfsNetwork {
    pub fn new(info: NetworkInfo) -> Self {
        Self { info }
    }
}

impl NetworkService for SysfsNetwork {
    fn bring_up(&self) -> Result<NetworkInfo> {
        Ok(self.info.clone())
    }

    fn interfaces(&self) -> Vec<NetInterface> {
        let Ok(entries) = fs::read_dir("/sys/class/net") else {
            return Vec::new();
        };
        let mut found = Vec::new();
        for entry in entries.flatten() {
            let name = entry.file_name().to_string_lossy().into_owned();
            if name == "lo" {
                continue;
            }
            if let Ok(mac) = fs::read_to_string(entry.path().join("address")) {
                let mac = mac.trim().to_string();
                if !mac.is_empty() {
                    found.push(NetInterface { name, mac });
                }
            }
        }
        found.sort_by(|a, b| a.name.cmp(&b.name));
        found
    }
}

/// Build the fetch target for a kickstart file from DHCP data: next-server
/// plus boot-file, with `/kickstart/` as the default path when no boot-file
/// was offered.
pub fn dhcp_fetch_target(info: &NetworkInfo) -> Result<String> {
    let server = info
        .next_server
        .ok_or_else(|| LoaderError::Param("no boot server offered by DHCP".to_string()))?;
    match info.boot_file.as_deref() {
        Some(boot_file) if !boot_file.is_empty() => Ok(format!("{server}:{boot_file}")),
        _ => {
            tracing::warn!("bootp: no bootfile received, using default kickstart path");
            Ok(format!("{server}:/kickstart/"))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_dhcp_target_with_bootfile() {
        let info = NetworkInfo {
            next_server: Some("10.0.0.1".parse().unwrap()),
            boot_file: Some("pxelinux/ks.cfg".to_string()),
        };
        assert_eq!(dhcp_fetch_target(&info).unwrap(), "10.0.0.1:pxelinux/ks.cfg");
    }

    #[test]
    fn test_dhcp_target_without_bootfile() {
        let info = NetworkInfo {
            next_server: Some("10.0.0.1".parse().unwrap()),
            boot_file: None,
        };
        assert_eq!(dhcp_fetch_target(&info).unwrap(), "10.0.0.1:/kickstart/");
    }

    #[test]
    fn test_dhcp_target_without_server() {
        assert!(dhcp_fetch_target(&NetworkInfo::default()).is_err());
    }
}
