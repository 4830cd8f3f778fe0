//! Kickstart method binding.
//!
//! Maps the declarative option sets (`--server/--dir/--opts` for NFS,
//! `--url` for HTTP/FTP) onto negotiator inputs so the interactive panels
//! can be skipped. Malformed option syntax is a hard error; a recognized
//! but incomplete NFS set is logged and leaves the method unbound so the
//! default interactive flow proceeds.

use crate::error::{LoaderError, Result};
use crate::source::{InstallSourceSpec, NfsSource};
use crate::state::{LoaderState, MethodData};
use clap::Parser;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(name = "nfs", no_binary_name = true, disable_help_flag = true)]
struct NfsKickstartArgs {
    #[arg(long)]
    server: Option<String>,
    #[arg(long)]
    dir: Option<String>,
    #[arg(long)]
    opts: Option<String>,
}

#[derive(Parser, Debug)]
#[command(name = "url", no_binary_name = true, disable_help_flag = true)]
struct UrlKickstartArgs {
    #[arg(long)]
    url: Option<String>,
}

/// Bind NFS kickstart data onto the loader state.
pub fn bind_nfs<S: AsRef<str>>(state: &mut LoaderState, args: &[S]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(|s| s.as_ref()).collect();
    let parsed = NfsKickstartArgs::try_parse_from(args)
        .map_err(|e| LoaderError::Param(format!("bad argument to nfs kickstart method: {e}")))?;

    match (parsed.server, parsed.dir) {
        (Some(host), Some(directory)) => {
            info!("nfs kickstart: host {host}, dir {directory}, opts {:?}", parsed.opts);
            state.method = Some(MethodData::Nfs(NfsSource {
                host,
                directory,
                mount_options: parsed.opts,
            }));
        }
        _ => {
            // Partial data must not influence the default flow.
            warn!("host and directory for nfs kickstart not specified");
        }
    }
    Ok(())
}

/// Bind URL kickstart data onto the loader state.
pub fn bind_url<S: AsRef<str>>(state: &mut LoaderState, args: &[S]) -> Result<()> {
    let args: Vec<&str> = args.iter().map(|s| s.as_ref()).collect();
    let parsed = UrlKickstartArgs::try_parse_from(args)
        .map_err(|e| LoaderError::Param(format!("bad argument to url kickstart method: {e}")))?;

    let Some(raw) = parsed.url else {
        return Err(LoaderError::Param(
            "must supply a --url argument to the url kickstart method".to_string(),
        ));
    };

    match InstallSourceSpec::parse(&raw)? {
        InstallSourceSpec::Url(url) => {
            info!("url kickstart: {raw}");
            state.method = Some(MethodData::Url(url));
            Ok(())
        }
        _ => Err(LoaderError::Param(format!("unknown url method {raw}"))),
    }
}
