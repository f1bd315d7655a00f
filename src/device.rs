//! Device selection.

use log::{debug, info};

use crate::config::Options;
use crate::error::{Error, Result};
use crate::runtime::{Device, Runtime};

/// Return an attached device as requested by `options`.
pub fn device_from_options<R: Runtime>(runtime: &R, options: &Options) -> Result<R::Device> {
    if options.use_ipu_model() {
        let device = ipu_model_device(runtime, options.num_ipus());
        info!("Using IPU model");
        Ok(device)
    } else {
        let device = ipu_hw_device(runtime, options.num_ipus())?;
        info!("Using HW device ID: {}", device.id());
        Ok(device)
    }
}

/// Return a HW device with exactly `num_ipus` IPUs.
///
/// Candidates are tried in enumeration order and the first one that attaches
/// wins. Devices held by other processes are skipped, never waited on.
pub fn ipu_hw_device<R: Runtime>(runtime: &R, num_ipus: usize) -> Result<R::Device> {
    runtime
        .devices(num_ipus)
        .into_iter()
        .find_map(|mut device| {
            if device.attach() {
                Some(device)
            } else {
                debug!("device {} busy, trying next", device.id());
                None
            }
        })
        .ok_or(Error::NoDeviceAvailable { num_ipus })
}

/// Return an IPU model device with `num_ipus` IPUs.
pub fn ipu_model_device<R: Runtime>(runtime: &R, num_ipus: usize) -> R::Device {
    runtime.model_device(num_ipus)
}

#[cfg(test)]
mod tests {
    use std::cell::{Cell, RefCell};
    use std::io::{Read, Write};

    use super::*;
    use crate::program::Program;
    use crate::runtime::{CompileOptions, Executable, RuntimeError, Target, TargetKind};

    /// Pool whose attach outcomes are fixed up front.
    struct FakeRuntime {
        pool: Vec<(u32, usize, bool)>,
        enumerations: Cell<usize>,
        attempts: RefCell<Vec<u32>>,
    }

    struct FakeDevice<'a> {
        id: u32,
        free: bool,
        target: Target,
        attempts: &'a RefCell<Vec<u32>>,
    }

    impl Device for FakeDevice<'_> {
        fn id(&self) -> u32 {
            self.id
        }

        fn attach(&mut self) -> bool {
            self.attempts.borrow_mut().push(self.id);
            self.free
        }

        fn target(&self) -> &Target {
            &self.target
        }
    }

    impl FakeRuntime {
        fn new(pool: &[(u32, usize, bool)]) -> Self {
            Self {
                pool: pool.to_vec(),
                enumerations: Cell::new(0),
                attempts: RefCell::new(Vec::new()),
            }
        }

        fn target(kind: TargetKind, num_ipus: usize) -> Target {
            Target {
                kind,
                num_ipus,
                tiles_per_ipu: 4,
                bytes_per_tile: 256,
            }
        }
    }

    impl<'a> Runtime for &'a FakeRuntime {
        type Device = FakeDevice<'a>;

        fn devices(&self, num_ipus: usize) -> Vec<FakeDevice<'a>> {
            let rt: &'a FakeRuntime = *self;
            rt.enumerations.set(rt.enumerations.get() + 1);
            rt.pool
                .iter()
                .filter(|(_, ipus, _)| *ipus == num_ipus)
                .map(|&(id, ipus, free)| FakeDevice {
                    id,
                    free,
                    target: FakeRuntime::target(TargetKind::Ipu, ipus),
                    attempts: &rt.attempts,
                })
                .collect()
        }

        fn model_device(&self, num_ipus: usize) -> FakeDevice<'a> {
            let rt: &'a FakeRuntime = *self;
            FakeDevice {
                id: 0,
                free: true,
                target: FakeRuntime::target(TargetKind::IpuModel, num_ipus),
                attempts: &rt.attempts,
            }
        }

        fn compile(
            &self,
            _: &Target,
            _: &Program,
            _: &CompileOptions,
        ) -> Result<Executable, RuntimeError> {
            unreachable!()
        }

        fn serialize(&self, _: &Executable, _: &mut dyn Write) -> Result<(), RuntimeError> {
            unreachable!()
        }

        fn deserialize(&self, _: &mut dyn Read) -> Result<Executable, RuntimeError> {
            unreachable!()
        }
    }

    #[test]
    fn first_free_candidate_wins() {
        let rt = FakeRuntime::new(&[(0, 1, false), (1, 1, false), (2, 1, true), (3, 1, true)]);

        let device = ipu_hw_device(&&rt, 1).unwrap();
        assert_eq!(device.id(), 2);
        assert_eq!(*rt.attempts.borrow(), vec![0, 1, 2]);
    }

    #[test]
    fn only_exact_ipu_count_is_considered() {
        let rt = FakeRuntime::new(&[(16, 2, true), (0, 1, false), (24, 4, true), (1, 1, true)]);

        let device = ipu_hw_device(&&rt, 1).unwrap();
        assert_eq!(device.id(), 1);
        assert_eq!(*rt.attempts.borrow(), vec![0, 1]);
    }

    #[test]
    fn exhausted_pool_fails() {
        let rt = FakeRuntime::new(&[(0, 1, false), (1, 1, false), (16, 2, true)]);

        assert!(matches!(
            ipu_hw_device(&&rt, 1),
            Err(Error::NoDeviceAvailable { num_ipus: 1 })
        ));
        assert_eq!(*rt.attempts.borrow(), vec![0, 1]);
    }

    #[test]
    fn empty_pool_fails() {
        let rt = FakeRuntime::new(&[]);
        assert!(matches!(
            ipu_hw_device(&&rt, 4),
            Err(Error::NoDeviceAvailable { num_ipus: 4 })
        ));
    }

    #[test]
    fn model_never_touches_the_pool() {
        let rt = FakeRuntime::new(&[(0, 4, false)]);
        let options = Options::resolve(["ipurun", "--model", "--ipus", "4"]).unwrap();

        let device = device_from_options(&&rt, &options).unwrap();
        assert_eq!(device.target().kind, TargetKind::IpuModel);
        assert_eq!(device.target().num_ipus, 4);
        assert_eq!(rt.enumerations.get(), 0);
        assert!(rt.attempts.borrow().is_empty());
    }

    #[test]
    fn hardware_path_uses_requested_ipus() {
        let rt = FakeRuntime::new(&[(0, 1, true), (16, 2, true)]);
        let options = Options::resolve(["ipurun", "--ipus", "2"]).unwrap();

        let device = device_from_options(&&rt, &options).unwrap();
        assert_eq!(device.id(), 16);
        assert_eq!(device.target().kind, TargetKind::Ipu);
        assert_eq!(rt.enumerations.get(), 1);
    }
}
