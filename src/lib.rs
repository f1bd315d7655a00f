//! IPU job front-end.
//!
//! Resolves run options, binds a physical or simulated IPU device and either
//! loads a previously saved executable or compiles a fresh one.

pub mod cli;
pub mod config;
pub mod device;
pub mod error;
pub mod executable;
pub mod program;
pub mod runtime;

pub use config::Options;
pub use error::{Error, Result};

use runtime::{Executable, Runtime};

/// An attached device together with the executable that will run on it.
#[derive(Debug)]
pub struct Prepared<D> {
    pub device: D,
    pub executable: Executable,
}

/// Select the device, then compile or load the executable for it.
///
/// A compiled executable is saved when `--save-exe` is set and profiled when
/// `--profile` is set.
pub fn prepare<R: Runtime>(runtime: &R, options: &Options) -> Result<Prepared<R::Device>> {
    let device = device::device_from_options(runtime, options)?;

    let executable = executable::compile_or_load_exe(runtime, &device, options, |target| {
        program::build(options, target)
    })?;

    if options.save_exe() && !options.load_exe() {
        executable::save_exe(runtime, &executable, &options.exe_file_name())?;
    }

    if options.profile() {
        executable::write_profile(&executable, options.profile_name())?;
    }

    Ok(Prepared { device, executable })
}
