//! Device selection against a host runtime sharing one lock directory.

use std::fs;
use std::path::Path;

use ipurun::config::{DeviceEntry, RuntimeConfig};
use ipurun::device::{device_from_options, ipu_hw_device};
use ipurun::runtime::{Device, HostRuntime, Runtime, TargetKind};
use ipurun::{Error, Options};

fn runtime(lock_dir: &Path, pool: &[(u32, usize)]) -> HostRuntime {
    HostRuntime::new(RuntimeConfig {
        lock_dir: lock_dir.to_path_buf(),
        devices: pool
            .iter()
            .map(|&(id, ipus)| DeviceEntry { id, ipus })
            .collect(),
        ..RuntimeConfig::default()
    })
}

/// Claim a device the way a competing process would.
fn claim(rt: &HostRuntime, num_ipus: usize, id: u32) -> impl Device {
    let mut device = rt
        .devices(num_ipus)
        .into_iter()
        .find(|d| d.id() == id)
        .unwrap();
    assert!(device.attach());
    device
}

#[test]
fn binds_first_unclaimed_device() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[(0, 1), (1, 1), (2, 1), (3, 1)]);

    // First K = 2 candidates are held elsewhere.
    let _held: Vec<_> = [0, 1].iter().map(|&id| claim(&rt, 1, id)).collect();

    let device = ipu_hw_device(&rt, 1).unwrap();
    assert_eq!(device.id(), 2);
    assert!(device.is_attached());
    assert!(dir.path().join("ipu-2.lock").exists());
    assert!(!dir.path().join("ipu-3.lock").exists());
}

#[test]
fn fails_when_every_candidate_is_claimed() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[(0, 1), (1, 1), (16, 2)]);
    let _held: Vec<_> = [0, 1].iter().map(|&id| claim(&rt, 1, id)).collect();

    assert!(matches!(
        ipu_hw_device(&rt, 1),
        Err(Error::NoDeviceAvailable { num_ipus: 1 })
    ));
}

#[test]
fn larger_groups_do_not_satisfy_smaller_requests() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[(16, 2), (24, 4)]);

    assert!(matches!(
        ipu_hw_device(&rt, 1),
        Err(Error::NoDeviceAvailable { num_ipus: 1 })
    ));
    assert_eq!(ipu_hw_device(&rt, 4).unwrap().id(), 24);
}

#[test]
fn released_device_can_be_claimed_again() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[(0, 1)]);

    let first = ipu_hw_device(&rt, 1).unwrap();
    assert!(ipu_hw_device(&rt, 1).is_err());

    drop(first);
    assert_eq!(ipu_hw_device(&rt, 1).unwrap().id(), 0);
}

#[test]
fn model_device_ignores_a_busy_pool() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[(24, 4)]);
    let _held = claim(&rt, 4, 24);
    let locks_before = fs::read_dir(dir.path()).unwrap().count();

    let options = Options::resolve(["ipurun", "--model", "--ipus", "4"]).unwrap();
    let device = device_from_options(&rt, &options).unwrap();

    assert!(device.is_model());
    assert_eq!(device.target().kind, TargetKind::IpuModel);
    assert_eq!(device.target().num_ipus, 4);
    assert_eq!(fs::read_dir(dir.path()).unwrap().count(), locks_before);
}

#[test]
fn hardware_is_requested_by_default() {
    let dir = tempfile::tempdir().unwrap();
    let rt = runtime(dir.path(), &[]);
    let options = Options::resolve(["ipurun"]).unwrap();

    assert!(matches!(
        device_from_options(&rt, &options),
        Err(Error::NoDeviceAvailable { num_ipus: 1 })
    ));
}
