//! Mount guard pairing and unmount idempotency.

mod helpers;

use helpers::*;
use stagesrc::mount::{MountGuard, MountService};

#[test]
fn test_guard_releases_on_drop() {
    let env = TestEnv::new();
    let backing = env.backing_dir("export");
    let mounter = FakeMounter::default().with_export("h:/export", &backing);
    let target = env.paths.source_mount();

    {
        let _guard = MountGuard::network(&mounter, "h:/export", &target, "nfs", "ro").unwrap();
        assert!(std::fs::symlink_metadata(&target).is_ok());
    }
    assert!(std::fs::symlink_metadata(&target).is_err());
    assert_eq!(mounter.unmounts.borrow().as_slice(), [target]);
}

#[test]
fn test_promote_keeps_the_mount() {
    let env = TestEnv::new();
    let backing = env.backing_dir("export");
    let mounter = FakeMounter::default().with_export("h:/export", &backing);
    let target = env.paths.source_mount();

    let guard = MountGuard::network(&mounter, "h:/export", &target, "nfs", "ro").unwrap();
    let kept = guard.promote();
    assert_eq!(kept, target);
    assert!(std::fs::symlink_metadata(&target).is_ok());
    assert!(mounter.unmounts.borrow().is_empty());
}

#[test]
fn test_unmount_is_idempotent() {
    let env = TestEnv::new();
    let backing = env.backing_dir("export");
    let mounter = FakeMounter::default().with_export("h:/export", &backing);
    let target = env.paths.source_mount();

    let guard = MountGuard::network(&mounter, "h:/export", &target, "nfs", "ro").unwrap();
    guard.release();
    // Releasing an already-released target is a no-op, not an error.
    mounter.unmount(&target).unwrap();
    mounter.unmount(&env.paths.runtime_mount()).unwrap();
}
