//! Host runtime.
//!
//! Physical devices come from the configured pool. Attaching a device takes
//! an exclusive advisory lock on `<lock_dir>/ipu-<id>.lock`. The lock lives
//! on the open file, so it is released when the owning [`HostDevice`] is
//! dropped or the process exits, however it exits. A lock file left on disk
//! by a dead process does not keep the unit claimed.

use std::fs::{self, File, OpenOptions, TryLockError};
use std::io::{Read, Write};
use std::path::{Path, PathBuf};

use log::{debug, warn};

use super::{
    format, CompileOptions, Device, Executable, PlacedComputeSet, Runtime, RuntimeError, Target,
    TargetKind,
};
use crate::config::RuntimeConfig;
use crate::program::Program;

/// Floating point operations a tile retires per cycle.
const FLOPS_PER_CYCLE: u64 = 2;

#[derive(Debug, Clone)]
pub struct HostRuntime {
    config: RuntimeConfig,
}

impl HostRuntime {
    pub fn new(config: RuntimeConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &RuntimeConfig {
        &self.config
    }

    fn target(&self, kind: TargetKind, num_ipus: usize) -> Target {
        Target {
            kind,
            num_ipus,
            tiles_per_ipu: self.config.tiles_per_ipu,
            bytes_per_tile: self.config.bytes_per_tile,
        }
    }

    fn lock_path(&self, id: u32) -> PathBuf {
        self.config.lock_dir.join(format!("ipu-{}.lock", id))
    }
}

impl Runtime for HostRuntime {
    type Device = HostDevice;

    fn devices(&self, num_ipus: usize) -> Vec<HostDevice> {
        self.config
            .devices
            .iter()
            .filter(|entry| entry.ipus == num_ipus)
            .map(|entry| HostDevice {
                id: entry.id,
                target: self.target(TargetKind::Ipu, entry.ipus),
                claim: Claim::Unattached(self.lock_path(entry.id)),
            })
            .collect()
    }

    fn model_device(&self, num_ipus: usize) -> HostDevice {
        HostDevice {
            id: 0,
            target: self.target(TargetKind::IpuModel, num_ipus),
            claim: Claim::Model,
        }
    }

    fn compile(
        &self,
        target: &Target,
        program: &Program,
        options: &CompileOptions,
    ) -> Result<Executable, RuntimeError> {
        let mut compute_sets = Vec::with_capacity(program.compute_sets.len());

        for cs in &program.compute_sets {
            if cs.tiles > target.num_tiles() {
                return Err(RuntimeError::ResourceExceeded {
                    compute_set: cs.name.clone(),
                    resource: "tiles",
                    required: cs.tiles,
                    available: target.num_tiles(),
                });
            }

            if cs.bytes_per_tile > target.bytes_per_tile {
                return Err(RuntimeError::ResourceExceeded {
                    compute_set: cs.name.clone(),
                    resource: "bytes per tile",
                    required: cs.bytes_per_tile,
                    available: target.bytes_per_tile,
                });
            }

            let estimated_cycles = options
                .instrument
                .then(|| cs.flops.div_ceil(FLOPS_PER_CYCLE.saturating_mul(cs.tiles.max(1) as u64)));

            debug!(
                "placed {} on {} tile(s), {} bytes/tile",
                cs.name, cs.tiles, cs.bytes_per_tile
            );

            compute_sets.push(PlacedComputeSet {
                name: cs.name.clone(),
                tiles: cs.tiles,
                bytes_per_tile: cs.bytes_per_tile,
                estimated_cycles,
            });
        }

        Ok(Executable {
            program: program.name.clone(),
            target: *target,
            instrumented: options.instrument,
            compute_sets,
        })
    }

    fn serialize(&self, executable: &Executable, out: &mut dyn Write) -> Result<(), RuntimeError> {
        let data = format::encode(executable)?;
        out.write_all(&data)?;
        out.flush()?;
        debug!("serialized {} bytes", data.len());
        Ok(())
    }

    fn deserialize(&self, input: &mut dyn Read) -> Result<Executable, RuntimeError> {
        let mut data = Vec::new();
        input.read_to_end(&mut data)?;
        debug!("deserializing {} bytes", data.len());
        format::decode(&data)
    }
}

#[derive(Debug)]
enum Claim {
    Model,
    Unattached(PathBuf),
    /// Holds the locked file; closing it releases the claim.
    Attached(File),
}

/// Device handle handed out by [`HostRuntime`].
#[derive(Debug)]
pub struct HostDevice {
    id: u32,
    target: Target,
    claim: Claim,
}

impl HostDevice {
    pub fn is_attached(&self) -> bool {
        matches!(self.claim, Claim::Model | Claim::Attached(_))
    }

    pub fn is_model(&self) -> bool {
        matches!(self.claim, Claim::Model)
    }
}

/// Open the lock file and try to lock it exclusively without blocking.
/// `Ok(None)` means another handle holds the lock.
fn try_lock(path: &Path) -> std::io::Result<Option<File>> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    let mut file = OpenOptions::new()
        .read(true)
        .write(true)
        .create(true)
        .truncate(false)
        .open(path)?;

    match file.try_lock() {
        Ok(()) => {}
        Err(TryLockError::WouldBlock) => return Ok(None),
        Err(TryLockError::Error(err)) => return Err(err),
    }

    // Owner pid, for operators only; the lock itself is what counts.
    file.set_len(0)?;
    writeln!(file, "{}", std::process::id())?;
    Ok(Some(file))
}

impl Device for HostDevice {
    fn id(&self) -> u32 {
        self.id
    }

    fn attach(&mut self) -> bool {
        let path = match &self.claim {
            Claim::Model | Claim::Attached(_) => return true,
            Claim::Unattached(path) => path.clone(),
        };

        match try_lock(&path) {
            Ok(Some(file)) => {
                self.claim = Claim::Attached(file);
                true
            }
            Ok(None) => false,
            Err(err) => {
                warn!("could not attach device {} ({}): {}", self.id, path.display(), err);
                false
            }
        }
    }

    fn target(&self) -> &Target {
        &self.target
    }
}

impl Drop for HostDevice {
    fn drop(&mut self) {
        if let Claim::Attached(_) = self.claim {
            debug!("released device {}", self.id);
        }
    }
}
