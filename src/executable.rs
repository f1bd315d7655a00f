//! Compile-or-load of the job executable.

use std::fs::{self, File};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use log::{debug, error, info};
use tempfile::NamedTempFile;

use crate::config::Options;
use crate::error::{Error, Result};
use crate::program::Program;
use crate::runtime::{CompileOptions, Device, Executable, Runtime, RuntimeError, Target};

/// Load the executable saved under `--exe-name`, or compile a fresh one for
/// `device`.
///
/// `build` is only called on the compile path; a load never constructs the
/// program. A failed load is returned as is and never falls back to
/// compiling. A loaded executable must have been compiled for exactly the
/// target of `device`.
pub fn compile_or_load_exe<R, F>(
    runtime: &R,
    device: &R::Device,
    options: &Options,
    build: F,
) -> Result<Executable>
where
    R: Runtime,
    F: FnOnce(&Target) -> Program,
{
    if options.load_exe() {
        load_exe(runtime, &options.exe_file_name(), device.target())
    } else {
        let target = device.target();
        let program = build(target);
        let compile_options = CompileOptions {
            instrument: options.profile(),
        };

        debug!(
            "compiling {} ({} compute sets) for {} x{}",
            program.name,
            program.compute_sets.len(),
            target.kind,
            target.num_ipus
        );

        runtime
            .compile(target, &program, &compile_options)
            .map_err(Error::CompilationFailed)
    }
}

pub fn load_exe<R: Runtime>(runtime: &R, path: &Path, target: &Target) -> Result<Executable> {
    let loaded = File::open(path)
        .map_err(RuntimeError::from)
        .and_then(|file| runtime.deserialize(&mut BufReader::new(file)))
        .and_then(|executable| {
            if executable.target == *target {
                Ok(executable)
            } else {
                Err(RuntimeError::TargetMismatch {
                    expected: *target,
                    found: executable.target,
                })
            }
        });

    match loaded {
        Ok(executable) => {
            info!("Loaded executable '{}'", path.display());
            Ok(executable)
        }
        Err(source) => {
            error!("Failed to load executable '{}'", path.display());
            Err(Error::ArtifactLoadFailed {
                path: path.to_path_buf(),
                source,
            })
        }
    }
}

/// Serialize `executable` to `path`.
///
/// The bytes go to a temporary file next to `path` that is renamed into
/// place once complete, so `path` holds either the previous executable or
/// the new one, never a partial write.
pub fn save_exe<R: Runtime>(runtime: &R, executable: &Executable, path: &Path) -> Result<()> {
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };

    let saved = NamedTempFile::new_in(dir)
        .map_err(RuntimeError::from)
        .and_then(|mut tmp| {
            let mut out = BufWriter::new(tmp.as_file_mut());
            runtime.serialize(executable, &mut out)?;
            out.flush()?;
            drop(out);
            tmp.persist(path).map_err(|err| RuntimeError::Io(err.error))?;
            Ok(())
        });

    saved.map_err(|source| Error::ArtifactSaveFailed {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Saved executable '{}'", path.display());
    Ok(())
}

pub fn write_profile(executable: &Executable, path: &Path) -> Result<()> {
    fs::write(path, executable.report()).map_err(|source| Error::ProfileWriteFailed {
        path: path.to_path_buf(),
        source,
    })?;

    info!("Profile written to '{}'", path.display());
    Ok(())
}
