//! HTTP/FTP source negotiation.
//!
//! Drives the primary and secondary parameter panels, the local-media
//! short-circuit (verified by fetching a sentinel `.discinfo`, since this
//! transport cannot enumerate directories), auxiliary image retrieval, and
//! stage2 retrieval with the low-memory variant substitution.

use crate::error::Result;
use crate::meminfo::{stage2_image_for, GUI_STAGE2_RAM_KB};
use crate::mount::{MountGuard, MountService};
use crate::netinfo::NetworkService;
use crate::paths::{self, WellKnownPaths};
use crate::product::ProductInfo;
use crate::source::{InstallSourceSpec, UrlSource};
use crate::stage2::{split_override_path, StageImageResolver, StageOutcome};
use crate::state::{LoaderState, MethodData, Negotiation};
use crate::transfer::{identifying_headers, TransferService};
use crate::ui::{LoaderUi, Panel};
use crate::validate::TreeValidator;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info, warn};

/// Negotiation states, carrying the parameters acquired so far.
enum UrlStage {
    Main,
    Secondary(UrlSource),
    Fetch(UrlSource),
}

/// Outcome of one fetch attempt.
enum FetchAttempt {
    Done(InstallSourceSpec),
    Retry,
}

pub struct UrlNegotiator<'a> {
    pub mounter: &'a dyn MountService,
    pub validator: &'a dyn TreeValidator,
    pub transfer: &'a dyn TransferService,
    pub net: &'a dyn NetworkService,
    pub ui: &'a mut dyn LoaderUi,
    pub paths: WellKnownPaths,
    pub product: ProductInfo,
    /// Total system memory, for the stage2 variant decision.
    pub total_memory_kb: u64,
}

impl UrlNegotiator<'_> {
    /// Run the negotiation state machine to completion.
    pub fn run(&mut self, loader: &mut LoaderState) -> Result<Negotiation> {
        let mut stage = UrlStage::Main;
        loop {
            stage = match stage {
                UrlStage::Main => {
                    if let Some(MethodData::Url(url)) = &loader.method {
                        // Kickstart info was adequate; skip straight to the
                        // fetch.
                        info!("url from kickstart: {}", url.address);
                        UrlStage::Fetch(url.clone())
                    } else {
                        loader.flags.stage2_override = false;
                        match self.ui.url_main(&self.product.name) {
                            Panel::Back => return Ok(Negotiation::Back),
                            Panel::Submitted((url, true)) => UrlStage::Secondary(url),
                            Panel::Submitted((url, false)) => UrlStage::Fetch(url),
                        }
                    }
                }
                UrlStage::Secondary(mut url) => match self.ui.url_secondary(&mut url) {
                    Panel::Back => UrlStage::Main,
                    Panel::Submitted(()) => UrlStage::Fetch(url),
                },
                UrlStage::Fetch(url) => match self.fetch_stage(loader, &url)? {
                    FetchAttempt::Done(spec) => {
                        return Ok(Negotiation::Resolved(spec.serialize()))
                    }
                    FetchAttempt::Retry => UrlStage::Main,
                },
            };
        }
    }

    fn fetch_stage(&mut self, loader: &mut LoaderState, url: &UrlSource) -> Result<FetchAttempt> {
        let flags = loader.flags;
        if flags.testing_mode {
            return Ok(FetchAttempt::Done(InstallSourceSpec::Url(url.clone())));
        }

        let headers = identifying_headers(&self.product, flags, self.net);

        // A stage2 on local media beats pulling one over the network, but
        // only if the URL points at a matching tree: verify with a sentinel
        // fetch before committing.
        if !flags.stage2_override
            && self
                .validator
                .find_local_media(&self.paths.local_media_mount())
        {
            let sentinel = format!("{}/.discinfo", url.prefix.trim_end_matches('/'));
            if self.transfer.fetch(url, &sentinel, &headers, None).is_err() {
                warn!(
                    "local media found but {} does not serve the matching tree",
                    url.address
                );
                let _ = self.mounter.unmount(&self.paths.runtime_mount());
                let _ = self.mounter.unmount(&self.paths.local_media_mount());
                loader.clear_method();
                return Ok(FetchAttempt::Retry);
            }
            info!("detected stage2 image on local media");
            self.ui.status("Local installation media detected...");
            return Ok(FetchAttempt::Done(InstallSourceSpec::Url(url.clone())));
        }

        let images = match images_path(&url.prefix, flags.stage2_override) {
            Ok(images) => images,
            Err(e) => {
                warn!("bad stage2 override prefix: {e}");
                loader.clear_method();
                loader.flags.stage2_override = false;
                return Ok(FetchAttempt::Retry);
            }
        };

        // Auxiliary images first, to keep ramdisk usage low while they are
        // merged. Both are best-effort.
        self.load_auxiliary(url, &images, &headers, "updates.img", self.paths.updates_staging());
        self.load_auxiliary(url, &images, &headers, "product.img", self.paths.product_staging());

        let (remote_path, staged) = if flags.stage2_override {
            let (_parent, file) = split_override_path(&url.prefix)?;
            (url.prefix.clone(), self.paths.root().join("tmp").join(file))
        } else {
            let image = stage2_image_for(self.total_memory_kb);
            if self.total_memory_kb <= GUI_STAGE2_RAM_KB {
                warn!(
                    "falling back to {image} due to insufficient RAM ({} kB)",
                    self.total_memory_kb
                );
            }
            (
                format!("{images}/{image}"),
                self.paths.root().join("tmp").join(image),
            )
        };

        self.ui.status(&format!("Retrieving {remote_path}..."));
        if let Err(e) = self.transfer.fetch(url, &remote_path, &headers, Some(&staged)) {
            warn!("{e}");
            return Ok(self.fail_hard(loader, "Unable to retrieve the install image."));
        }

        let resolver = StageImageResolver::new(self.mounter, self.validator);
        let outcome =
            resolver.mount_staged(&staged, &self.paths.runtime_mount(), paths::STAGE2_LOOP)?;
        match outcome {
            StageOutcome::Success => Ok(FetchAttempt::Done(InstallSourceSpec::Url(url.clone()))),
            StageOutcome::WrongTree => {
                let message = format!(
                    "The {} installation tree in that directory does not seem to match your boot media.",
                    self.product.name
                );
                Ok(self.fail_hard(loader, &message))
            }
            StageOutcome::TransferFailed => {
                Ok(self.fail_hard(loader, "Unable to retrieve the install image."))
            }
        }
    }

    fn fail_hard(&mut self, loader: &mut LoaderState, message: &str) -> FetchAttempt {
        self.ui.message("Error", message);
        loader.clear_method();
        loader.flags.stage2_override = false;
        FetchAttempt::Retry
    }

    /// Retrieve one auxiliary image and merge its contents into the
    /// accumulation directory. Failures are logged and swallowed; a missing
    /// auxiliary image never aborts the flow.
    fn load_auxiliary(
        &self,
        url: &UrlSource,
        images: &str,
        headers: &[String],
        name: &str,
        staging: (PathBuf, PathBuf, PathBuf),
    ) {
        let (image, mountpoint, accumulate) = staging;
        let remote = format!("{images}/{name}");

        if self
            .transfer
            .fetch(url, &remote, headers, Some(&image))
            .is_err()
        {
            debug!("no {name} at {remote}");
            return;
        }

        match MountGuard::loopback(self.mounter, &image, &mountpoint, paths::AUX_LOOP) {
            Ok(guard) => {
                if let Err(e) = crate::copy::copy_directory(guard.target(), &accumulate) {
                    warn!("could not merge {name} contents: {e}");
                }
                guard.release();
            }
            Err(e) => warn!("could not mount {name}: {e}"),
        }
        let _ = fs::remove_file(&image);
        let _ = fs::remove_dir_all(&mountpoint);
    }
}

/// The directory the images live in: `<prefix>/images` normally, or the
/// prefix truncated before its last component under stage2 override.
pub fn images_path(prefix: &str, stage2_override: bool) -> Result<String> {
    if stage2_override {
        let (parent, _file) = split_override_path(prefix)?;
        Ok(parent)
    } else {
        Ok(format!("{}/images", prefix.trim_end_matches('/')))
    }
}
