//! NFS source negotiation.
//!
//! Drives parameter acquisition, export mounting, and stage2 discovery,
//! with the NFSISO fallback (stage2 extracted from an ISO image found on
//! the export) when the export does not serve a tree directly.

use crate::error::Result;
use crate::mount::{MountGuard, MountService};
use crate::paths::{self, WellKnownPaths};
use crate::product::ProductInfo;
use crate::source::{InstallSourceSpec, NfsSource};
use crate::stage2::{split_override_path, StageImageResolver, StageOutcome};
use crate::state::{LoaderState, MethodData, Negotiation};
use crate::ui::{LoaderUi, Panel};
use crate::validate::TreeValidator;
use std::net::Ipv4Addr;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Outcome of the parameter-acquisition stage.
enum Acquired {
    Params(NfsSource),
    Back,
    Unset,
}

/// Outcome of one mount-and-resolve attempt.
enum Attempt {
    Done(InstallSourceSpec),
    Retry,
    Unset,
}

pub struct NfsNegotiator<'a> {
    pub mounter: &'a dyn MountService,
    pub validator: &'a dyn TreeValidator,
    pub ui: &'a mut dyn LoaderUi,
    pub paths: WellKnownPaths,
    pub product: ProductInfo,
}

impl<'a> NfsNegotiator<'a> {
    /// Run the negotiation state machine to completion.
    pub fn run(&mut self, loader: &mut LoaderState) -> Result<Negotiation> {
        let mut previous: Option<NfsSource> = None;
        loop {
            let nfs = match self.acquire_params(loader, previous.take())? {
                Acquired::Params(nfs) => nfs,
                Acquired::Back => return Ok(Negotiation::Back),
                Acquired::Unset => return Ok(Negotiation::Unset),
            };

            match self.mount_and_resolve(loader, &nfs)? {
                Attempt::Done(spec) => return Ok(Negotiation::Resolved(spec.serialize())),
                Attempt::Retry => previous = Some(nfs),
                Attempt::Unset => return Ok(Negotiation::Unset),
            }
        }
    }

    fn acquire_params(
        &mut self,
        loader: &mut LoaderState,
        previous: Option<NfsSource>,
    ) -> Result<Acquired> {
        if let Some(MethodData::Nfs(data)) = &loader.method {
            // Kickstart data has no interactive fallback: an incomplete
            // specification aborts outright.
            if data.host.is_empty() || data.directory.is_empty() {
                warn!("missing host or directory in nfs kickstart data");
                loader.flags.stage2_override = false;
                loader.clear_method();
                return Ok(Acquired::Unset);
            }
            info!(
                "nfs params from kickstart: host {}, dir {}, opts '{}'",
                data.host,
                data.directory,
                data.effective_mount_options()
            );
            return Ok(Acquired::Params(data.clone()));
        }

        let (host, directory) = previous
            .map(|nfs| (nfs.host, nfs.directory))
            .unwrap_or_default();
        match self.ui.nfs_setup(&self.product.name, &host, &directory) {
            Panel::Submitted((host, directory)) => {
                Ok(Acquired::Params(NfsSource::new(host, directory)))
            }
            Panel::Back => {
                loader.flags.stage2_override = false;
                Ok(Acquired::Back)
            }
        }
    }

    fn mount_and_resolve(&mut self, loader: &mut LoaderState, nfs: &NfsSource) -> Result<Attempt> {
        let flags = loader.flags;
        let mut found_invalid = false;

        if flags.no_dns && nfs.host.parse::<Ipv4Addr>().is_err() {
            self.ui
                .message("Error", "Hostname specified with no DNS configured");
            loader.clear_method();
            loader.flags.stage2_override = false;
            return Ok(Attempt::Retry);
        }

        // Booted off local media that already carries stage2? Skip the
        // network entirely; the export only decides the encoding.
        if !flags.stage2_override && self.validator.find_local_media(&self.paths.local_media_mount())
        {
            info!("detected stage2 image on local media");
            self.ui.status("Local installation media detected...");
            let iso = self.scan_export_for_iso(nfs, false, &mut found_invalid)?;
            let spec = match iso {
                Some((guard, _iso)) => {
                    // The export stays mounted on the ISO-scan mountpoint;
                    // downstream package installation reads from it.
                    guard.promote();
                    InstallSourceSpec::NfsIso(nfs.clone())
                }
                None => InstallSourceSpec::Nfs(nfs.clone()),
            };
            return Ok(Attempt::Done(spec));
        }

        let export = match export_for_mount(nfs, flags.stage2_override) {
            Ok(export) => export,
            Err(e) => {
                warn!("bad stage2 override directory: {e}");
                loader.flags.stage2_override = false;
                loader.clear_method();
                return Ok(Attempt::Unset);
            }
        };
        info!("mounting nfs path {export}");

        if flags.testing_mode {
            return Ok(Attempt::Done(InstallSourceSpec::Nfs(nfs.clone())));
        }

        let source_mount = self.paths.source_mount();
        let export_guard = match MountGuard::network(
            self.mounter,
            &export,
            &source_mount,
            "nfs",
            &nfs.effective_mount_options(),
        ) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("{e}");
                self.ui.message(
                    "Error",
                    "That directory could not be mounted from the server.",
                );
                loader.clear_method();
                return Ok(Attempt::Retry);
            }
        };

        let candidate = stage2_candidate(&source_mount, nfs, flags.stage2_override)?;
        self.ui
            .status(&format!("Retrieving {}...", candidate.display()));

        let resolver = StageImageResolver::new(self.mounter, self.validator);
        let outcome = resolver.resolve(
            &candidate,
            &self.paths.staged_stage2(),
            &self.paths.runtime_mount(),
            paths::STAGE2_LOOP,
        )?;
        match outcome {
            StageOutcome::Success => {
                // The export itself becomes the package source.
                export_guard.promote();
                return Ok(Attempt::Done(InstallSourceSpec::Nfs(nfs.clone())));
            }
            StageOutcome::WrongTree => found_invalid = true,
            StageOutcome::TransferFailed => {}
        }
        export_guard.release();

        // The export did not serve a tree directly; it may hold installer
        // ISO images instead.
        if let Some(attempt) = self.try_nfsiso(loader, nfs, &mut found_invalid)? {
            return Ok(attempt);
        }

        let message = if found_invalid {
            format!(
                "The {} installation tree in that directory does not seem to match your boot media.",
                self.product.name
            )
        } else {
            format!(
                "That directory does not seem to contain a {} installation tree.",
                self.product.name
            )
        };
        self.ui.message("Error", &message);
        loader.clear_method();
        loader.flags.stage2_override = false;
        Ok(Attempt::Retry)
    }

    /// NFSISO fallback: remount the export on the ISO-scan mountpoint, look
    /// for a valid installer ISO, and retry stage2 resolution inside it.
    fn try_nfsiso(
        &mut self,
        loader: &LoaderState,
        nfs: &NfsSource,
        found_invalid: &mut bool,
    ) -> Result<Option<Attempt>> {
        let Some((scan_guard, iso)) = self.scan_export_for_iso(nfs, true, found_invalid)? else {
            return Ok(None);
        };
        info!("path to valid iso is {}", iso.display());

        crate::copy::copy_updates_image(
            &scan_guard.target().join("updates.img"),
            &self.paths.updates_image(),
        );

        let source_mount = self.paths.source_mount();
        let iso_guard =
            match MountGuard::loopback(self.mounter, &iso, &source_mount, paths::ISO_LOOP) {
                Ok(guard) => guard,
                Err(e) => {
                    warn!("failed to mount iso {} loopback: {e}", iso.display());
                    scan_guard.release();
                    return Ok(None);
                }
            };

        let candidate = stage2_candidate(&source_mount, nfs, loader.flags.stage2_override)?;
        let resolver = StageImageResolver::new(self.mounter, self.validator);
        let outcome = resolver.resolve(
            &candidate,
            &self.paths.staged_stage2(),
            &self.paths.runtime_mount(),
            paths::STAGE2_LOOP,
        )?;
        // The stage2 runs from its staged copy; the ISO mount is transient
        // either way.
        iso_guard.release();

        match outcome {
            StageOutcome::Success => {
                scan_guard.promote();
                Ok(Some(Attempt::Done(InstallSourceSpec::NfsIso(nfs.clone()))))
            }
            StageOutcome::WrongTree => {
                *found_invalid = true;
                scan_guard.release();
                Ok(None)
            }
            StageOutcome::TransferFailed => {
                scan_guard.release();
                Ok(None)
            }
        }
    }

    /// Mount the export on the ISO-scan mountpoint and look for a valid
    /// installer ISO. On a hit the scan mount is returned still held.
    fn scan_export_for_iso(
        &self,
        nfs: &NfsSource,
        want_stage2: bool,
        found_invalid: &mut bool,
    ) -> Result<Option<(MountGuard<'a>, PathBuf)>> {
        let guard = match MountGuard::network(
            self.mounter,
            &nfs.export_path(),
            &self.paths.iso_scan_mount(),
            "nfs",
            &nfs.effective_mount_options(),
        ) {
            Ok(guard) => guard,
            Err(e) => {
                warn!("could not mount {} for iso scan: {e}", nfs.export_path());
                return Ok(None);
            }
        };

        let scan = self.validator.find_iso_images(guard.target(), want_stage2);
        *found_invalid |= scan.found_invalid;
        match scan.image {
            Some(iso) => Ok(Some((guard, iso))),
            None => {
                guard.release();
                Ok(None)
            }
        }
    }
}

/// The export path handed to the mounter: `host:directory` normally, or the
/// directory truncated before its last component under stage2 override.
pub fn export_for_mount(nfs: &NfsSource, stage2_override: bool) -> Result<String> {
    if stage2_override {
        let (parent, _file) = split_override_path(&nfs.directory)?;
        Ok(format!("{}:{}", nfs.host, parent))
    } else {
        Ok(nfs.export_path())
    }
}

/// Where the stage2 candidate lives under the mounted export.
pub fn stage2_candidate(
    mount_root: &Path,
    nfs: &NfsSource,
    stage2_override: bool,
) -> Result<PathBuf> {
    if stage2_override {
        let (_parent, file) = split_override_path(&nfs.directory)?;
        Ok(mount_root.join(file))
    } else {
        Ok(mount_root.join("images").join(crate::meminfo::STAGE2_IMAGE))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_export_for_mount() {
        let nfs = NfsSource::new("10.0.0.5", "/export/os/images/stage2.img");
        assert_eq!(
            export_for_mount(&nfs, false).unwrap(),
            "10.0.0.5:/export/os/images/stage2.img"
        );
        assert_eq!(
            export_for_mount(&nfs, true).unwrap(),
            "10.0.0.5:/export/os/images"
        );
    }

    #[test]
    fn test_stage2_candidate_paths() {
        let nfs = NfsSource::new("h", "/export/os/custom/mystg2.img");
        let root = Path::new("/mnt/source");
        assert_eq!(
            stage2_candidate(root, &nfs, false).unwrap(),
            root.join("images/stage2.img")
        );
        assert_eq!(
            stage2_candidate(root, &nfs, true).unwrap(),
            root.join("mystg2.img")
        );
    }
}
