//! stagesrc - resolves the installer's stage2 installation source.
//!
//! Given kickstart-style parameters (or interactive prompts when they are
//! absent), locates a stage2 runtime image over NFS or HTTP/FTP, mounts it,
//! and prints the canonical source encoding for downstream installer code.

use anyhow::{bail, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::net::Ipv4Addr;
use std::path::PathBuf;

use stagesrc::fetch::fetch_single_file;
use stagesrc::kickstart;
use stagesrc::meminfo;
use stagesrc::mount::SystemMounter;
use stagesrc::netinfo::{NetworkInfo, SysfsNetwork};
use stagesrc::nfs::NfsNegotiator;
use stagesrc::paths::WellKnownPaths;
use stagesrc::product::ProductInfo;
use stagesrc::state::{LoaderFlags, LoaderState, Negotiation};
use stagesrc::transfer::CurlTransfer;
use stagesrc::ui::ConsoleUi;
use stagesrc::url::UrlNegotiator;
use stagesrc::validate::DiscInfoValidator;

#[derive(Parser)]
#[command(name = "stagesrc")]
#[command(about = "Resolve the stage2 installation source")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Clone, Copy, Debug, ValueEnum)]
enum Method {
    Nfs,
    Url,
}

#[derive(Subcommand)]
enum Commands {
    /// Negotiate an installation source and print its canonical encoding
    Resolve {
        /// Transport to negotiate
        #[arg(long, value_enum)]
        method: Method,

        /// Kickstart method arguments, e.g. "--server=10.0.0.5 --dir=/export/os"
        #[arg(long)]
        ks: Option<String>,

        /// The stage2 location was given explicitly in the directory/url
        #[arg(long)]
        stage2: bool,

        /// Negotiate parameters only; perform no mounts or transfers
        #[arg(long)]
        testing: bool,

        /// No DNS available; hostnames must be literal IPv4 addresses
        #[arg(long)]
        no_dns: bool,

        /// Send identifying MAC headers on HTTP transfers
        #[arg(long)]
        send_mac_headers: bool,

        /// Root prefix for the well-known mountpoint layout
        #[arg(long, default_value = "/")]
        root: PathBuf,

        /// Product stamp file (JSON); compiled defaults apply if absent
        #[arg(long)]
        product_stamp: Option<PathBuf>,
    },

    /// Retrieve a kickstart configuration file
    FetchKs {
        /// Source ("[opts:]host:path" or an http/ftp URL); synthesized from
        /// DHCP next-server/boot-file data when omitted
        #[arg(long)]
        source: Option<String>,

        /// Where to place the retrieved file
        #[arg(long, default_value = "/tmp/ks.cfg")]
        dest: PathBuf,

        /// DHCP next-server, when known
        #[arg(long)]
        next_server: Option<Ipv4Addr>,

        /// DHCP boot-file, when known
        #[arg(long)]
        boot_file: Option<String>,

        /// Send identifying MAC headers on HTTP transfers
        #[arg(long)]
        send_mac_headers: bool,
    },
}

fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    match Cli::parse().command {
        Commands::Resolve {
            method,
            ks,
            stage2,
            testing,
            no_dns,
            send_mac_headers,
            root,
            product_stamp,
        } => {
            let flags = LoaderFlags {
                stage2_override: stage2,
                testing_mode: testing,
                no_dns,
                send_mac_headers,
            };
            let mut loader = LoaderState {
                method: None,
                flags,
            };
            if let Some(ks) = ks {
                let args: Vec<&str> = ks.split_whitespace().collect();
                match method {
                    Method::Nfs => kickstart::bind_nfs(&mut loader, &args)?,
                    Method::Url => kickstart::bind_url(&mut loader, &args)?,
                }
            }

            let paths = WellKnownPaths::rooted(root);
            let product = ProductInfo::load(
                product_stamp
                    .as_deref()
                    .unwrap_or(std::path::Path::new("/.buildstamp.json")),
            )?;
            let mounter = SystemMounter;
            let validator = DiscInfoValidator::new(
                product.clone(),
                &mounter,
                paths.iso_probe_mount(),
            );
            let mut ui = ConsoleUi;

            let outcome = match method {
                Method::Nfs => {
                    let mut negotiator = NfsNegotiator {
                        mounter: &mounter,
                        validator: &validator,
                        ui: &mut ui,
                        paths,
                        product,
                    };
                    negotiator.run(&mut loader)?
                }
                Method::Url => {
                    let transfer = CurlTransfer;
                    let net = SysfsNetwork::new(NetworkInfo::default());
                    let mut negotiator = UrlNegotiator {
                        mounter: &mounter,
                        validator: &validator,
                        transfer: &transfer,
                        net: &net,
                        ui: &mut ui,
                        paths,
                        product,
                        total_memory_kb: meminfo::total_memory_kb()?,
                    };
                    negotiator.run(&mut loader)?
                }
            };

            match outcome {
                Negotiation::Resolved(encoded) => println!("{encoded}"),
                Negotiation::Back => println!("cancelled"),
                Negotiation::Unset => bail!("no installation source resolved"),
            }
        }

        Commands::FetchKs {
            source,
            dest,
            next_server,
            boot_file,
            send_mac_headers,
        } => {
            let flags = LoaderFlags {
                send_mac_headers,
                ..Default::default()
            };
            let mounter = SystemMounter;
            let transfer = CurlTransfer;
            let net = SysfsNetwork::new(NetworkInfo {
                next_server,
                boot_file,
            });
            fetch_single_file(
                source.as_deref(),
                &dest,
                &mounter,
                &transfer,
                &net,
                flags,
                &ProductInfo::default(),
                &WellKnownPaths::default(),
            )?;
            println!("retrieved {}", dest.display());
        }
    }

    Ok(())
}
