//! Shared test utilities for stagesrc tests.
//!
//! The fakes stand in for the mount/transfer/network/UI collaborators.
//! Mounts are simulated with symlinks: a "mount" links the target at the
//! backing directory, an "image file" holds the absolute path of the
//! directory it would expose when loopback-mounted. That lets the real
//! staging and validation code run unchanged against a TempDir layout.

#![allow(dead_code)]

use std::cell::RefCell;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

use stagesrc::error::{LoaderError, Result};
use stagesrc::mount::MountService;
use stagesrc::netinfo::{NetInterface, NetworkInfo, NetworkService};
use stagesrc::paths::WellKnownPaths;
use stagesrc::product::ProductInfo;
use stagesrc::source::UrlSource;
use stagesrc::transfer::TransferService;
use stagesrc::ui::{LoaderUi, Panel};

/// Test environment rooted in a temporary directory.
pub struct TestEnv {
    pub _temp_dir: TempDir,
    pub paths: WellKnownPaths,
    pub product: ProductInfo,
}

impl TestEnv {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("failed to create temp dir");
        let paths = WellKnownPaths::rooted(temp_dir.path());
        let product = ProductInfo {
            name: "TestOS".to_string(),
            version: "1.0".to_string(),
            arch: "x86_64".to_string(),
        };
        Self {
            _temp_dir: temp_dir,
            paths,
            product,
        }
    }

    pub fn root(&self) -> &Path {
        self.paths.root()
    }

    /// Make a backing directory under the temp root.
    pub fn backing_dir(&self, name: &str) -> PathBuf {
        let dir = self.root().join("backing").join(name);
        fs::create_dir_all(&dir).expect("failed to create backing dir");
        dir
    }
}

/// Write a `.discinfo` product stamp into a tree.
pub fn write_discinfo(dir: &Path, name: &str, arch: &str) {
    fs::create_dir_all(dir).unwrap();
    fs::write(dir.join(".discinfo"), format!("1227000000\n{name}\n{arch}\n")).unwrap();
}

/// Create a fake image file exposing `backing` when loopback-mounted.
pub fn write_fake_image(image: &Path, backing: &Path) {
    fs::create_dir_all(image.parent().unwrap()).unwrap();
    fs::write(image, backing.to_string_lossy().as_bytes()).unwrap();
}

/// A backing tree that validates as the test product, for use as the
/// contents of a stage2 image.
pub fn valid_stage2_backing(env: &TestEnv, name: &str) -> PathBuf {
    let backing = env.backing_dir(name);
    write_discinfo(&backing, &env.product.name, &env.product.arch);
    backing
}

fn place_link(backing: &Path, target: &Path) -> std::io::Result<()> {
    if let Some(parent) = target.parent() {
        fs::create_dir_all(parent)?;
    }
    match fs::symlink_metadata(target) {
        Ok(meta) if meta.file_type().is_symlink() => fs::remove_file(target)?,
        Ok(meta) if meta.is_dir() => fs::remove_dir(target)?,
        _ => {}
    }
    std::os::unix::fs::symlink(backing, target)
}

/// Fake mounter backed by symlinks.
#[derive(Default)]
pub struct FakeMounter {
    /// Export/source string -> backing directory.
    pub exports: RefCell<HashMap<String, PathBuf>>,
    /// Every mount performed, in order (source, target).
    pub mounts: RefCell<Vec<(String, PathBuf)>>,
    /// Every unmount call, in order.
    pub unmounts: RefCell<Vec<PathBuf>>,
}

impl FakeMounter {
    pub fn with_export(self, source: &str, backing: &Path) -> Self {
        self.exports
            .borrow_mut()
            .insert(source.to_string(), backing.to_path_buf());
        self
    }

    pub fn mount_count(&self) -> usize {
        self.mounts.borrow().len()
    }
}

impl MountService for FakeMounter {
    fn mount(&self, source: &str, target: &Path, _fstype: &str, _options: &str) -> Result<()> {
        let backing = self.exports.borrow().get(source).cloned();
        let Some(backing) = backing else {
            return Err(LoaderError::Mount {
                mount_source: source.to_string(),
                target: target.to_path_buf(),
                detail: "no such export".to_string(),
            });
        };
        place_link(&backing, target)?;
        self.mounts
            .borrow_mut()
            .push((source.to_string(), target.to_path_buf()));
        Ok(())
    }

    fn mount_loopback(&self, image: &Path, target: &Path, _device: &str) -> Result<()> {
        let backing = fs::read_to_string(image).map_err(|_| LoaderError::Mount {
            mount_source: image.to_string_lossy().into_owned(),
            target: target.to_path_buf(),
            detail: "unreadable image".to_string(),
        })?;
        let backing = PathBuf::from(backing.trim());
        if !backing.is_dir() {
            return Err(LoaderError::Mount {
                mount_source: image.to_string_lossy().into_owned(),
                target: target.to_path_buf(),
                detail: "not a mountable image".to_string(),
            });
        }
        place_link(&backing, target)?;
        self.mounts
            .borrow_mut()
            .push((image.to_string_lossy().into_owned(), target.to_path_buf()));
        Ok(())
    }

    fn unmount(&self, target: &Path) -> Result<()> {
        self.unmounts.borrow_mut().push(target.to_path_buf());
        if let Ok(meta) = fs::symlink_metadata(target) {
            if meta.file_type().is_symlink() {
                fs::remove_file(target)?;
            }
        }
        Ok(())
    }

    fn unmount_loopback(&self, target: &Path, _device: &str) -> Result<()> {
        self.unmount(target)
    }
}

/// Fake transfer backed by an in-memory file map keyed on the request path
/// (leading slashes ignored).
#[derive(Default)]
pub struct FakeTransfer {
    pub files: HashMap<String, Vec<u8>>,
    pub requests: RefCell<Vec<String>>,
}

impl FakeTransfer {
    pub fn with_file(mut self, path: &str, content: &[u8]) -> Self {
        self.files
            .insert(path.trim_start_matches('/').to_string(), content.to_vec());
        self
    }

    /// Register a fake image at `path` exposing `backing` when mounted.
    pub fn with_image(self, path: &str, backing: &Path) -> Self {
        self.with_file(path, backing.to_string_lossy().as_bytes())
    }

    pub fn requested(&self, path: &str) -> bool {
        self.requests.borrow().iter().any(|r| r == path)
    }
}

impl TransferService for FakeTransfer {
    fn fetch(
        &self,
        _url: &UrlSource,
        path: &str,
        _headers: &[String],
        dest: Option<&Path>,
    ) -> Result<()> {
        let key = path.trim_start_matches('/').to_string();
        self.requests.borrow_mut().push(key.clone());
        let Some(content) = self.files.get(&key) else {
            return Err(LoaderError::Transfer(path.to_string()));
        };
        if let Some(dest) = dest {
            if let Some(parent) = dest.parent() {
                fs::create_dir_all(parent)?;
            }
            fs::write(dest, content)?;
        }
        Ok(())
    }
}

/// Fake network collaborator with a fixed lease and interface list.
#[derive(Default)]
pub struct FakeNetwork {
    pub info: NetworkInfo,
    pub nics: Vec<NetInterface>,
}

impl NetworkService for FakeNetwork {
    fn bring_up(&self) -> Result<NetworkInfo> {
        Ok(self.info.clone())
    }
    fn interfaces(&self) -> Vec<NetInterface> {
        self.nics.clone()
    }
}

/// Scripted UI: panels answer from queues; an exhausted queue answers Back,
/// so a negotiation that unexpectedly loops ends instead of hanging.
#[derive(Default)]
pub struct ScriptedUi {
    pub nfs_answers: Vec<(String, String)>,
    pub url_answers: Vec<(UrlSource, bool)>,
    pub secondary_answers: Vec<(String, String)>,
    pub messages: Vec<String>,
}

impl ScriptedUi {
    pub fn saw_message_containing(&self, needle: &str) -> bool {
        self.messages.iter().any(|m| m.contains(needle))
    }
}

impl LoaderUi for ScriptedUi {
    fn nfs_setup(&mut self, _product: &str, _host: &str, _directory: &str) -> Panel<(String, String)> {
        if self.nfs_answers.is_empty() {
            Panel::Back
        } else {
            Panel::Submitted(self.nfs_answers.remove(0))
        }
    }

    fn url_main(&mut self, _product: &str) -> Panel<(UrlSource, bool)> {
        if self.url_answers.is_empty() {
            Panel::Back
        } else {
            Panel::Submitted(self.url_answers.remove(0))
        }
    }

    fn url_secondary(&mut self, url: &mut UrlSource) -> Panel<()> {
        if self.secondary_answers.is_empty() {
            Panel::Back
        } else {
            let (login, password) = self.secondary_answers.remove(0);
            url.login = Some(login);
            url.password = Some(password);
            Panel::Submitted(())
        }
    }

    fn message(&mut self, _title: &str, body: &str) {
        self.messages.push(body.to_string());
    }

    fn status(&mut self, _body: &str) {}
}
