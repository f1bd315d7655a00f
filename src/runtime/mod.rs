//! Hardware runtime interface.
//!
//! Device enumeration, attach, compilation and executable (de)serialization
//! are owned by the runtime. The rest of the crate only drives these
//! operations and reacts to their outcome.
//!
//! ```text
//!   Options ──► device selection ──► Runtime::devices / Device::attach
//!                                    Runtime::model_device
//!           ──► executable resolution ──► Runtime::compile
//!                                         Runtime::serialize / deserialize
//! ```

pub mod format;
pub mod host;

use std::fmt;
use std::io::{Read, Write};

use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use host::{HostDevice, HostRuntime};

use crate::program::Program;

/// Kind of device a target describes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TargetKind {
    /// Physical IPU hardware
    Ipu,
    /// Software IPU model
    IpuModel,
}

impl fmt::Display for TargetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ipu => f.write_str("IPU"),
            Self::IpuModel => f.write_str("IPU model"),
        }
    }
}

/// Target characteristics a program is compiled against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Target {
    pub kind: TargetKind,
    pub num_ipus: usize,
    pub tiles_per_ipu: usize,
    pub bytes_per_tile: usize,
}

impl Target {
    /// Total tile count, saturating at `usize::MAX`.
    pub fn num_tiles(&self) -> usize {
        self.num_ipus.saturating_mul(self.tiles_per_ipu)
    }
}

impl fmt::Display for Target {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} x{}", self.kind, self.num_ipus)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CompileOptions {
    /// Emit per compute set cycle estimates for profiling.
    pub instrument: bool,
}

/// A compute set after placement onto tiles.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlacedComputeSet {
    pub name: String,
    pub tiles: usize,
    pub bytes_per_tile: usize,
    pub estimated_cycles: Option<u64>,
}

/// A compiled program image bound to a target.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Executable {
    pub program: String,
    pub target: Target,
    pub instrumented: bool,
    pub compute_sets: Vec<PlacedComputeSet>,
}

impl Executable {
    /// Human readable compile report, written out when profiling is enabled.
    pub fn report(&self) -> String {
        let mut out = format!(
            "Program: {}\nTarget: {} x{} ({} tiles, {} bytes/tile)\n",
            self.program,
            self.target.kind,
            self.target.num_ipus,
            self.target.num_tiles(),
            self.target.bytes_per_tile
        );

        let mut total_cycles = 0u64;
        for cs in &self.compute_sets {
            out.push_str(&format!(
                "  {:<24} tiles={:<6} bytes/tile={:<8}",
                cs.name, cs.tiles, cs.bytes_per_tile
            ));
            if let Some(cycles) = cs.estimated_cycles {
                total_cycles = total_cycles.saturating_add(cycles);
                out.push_str(&format!(" cycles={}", cycles));
            }
            out.push('\n');
        }

        if self.instrumented {
            out.push_str(&format!("Total estimated cycles: {}\n", total_cycles));
        }

        out
    }
}

#[derive(Debug, Error)]
pub enum RuntimeError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("malformed executable: {0}")]
    Malformed(&'static str),
    #[error("unsupported executable version {found} (expected {expected})")]
    UnsupportedVersion { found: u8, expected: u8 },
    #[error("executable digest mismatch, file may be corrupted")]
    DigestMismatch,
    #[error("executable was compiled for {found}, device is {expected}")]
    TargetMismatch { expected: Target, found: Target },
    #[error("could not decode executable payload")]
    Decode(#[source] serde_json::Error),
    #[error("could not encode executable payload")]
    Encode(#[source] serde_json::Error),
    #[error("compute set '{compute_set}' needs {required} {resource} but the target has {available}")]
    ResourceExceeded {
        compute_set: String,
        resource: &'static str,
        required: usize,
        available: usize,
    },
}

/// A claimable accelerator, physical or simulated.
pub trait Device {
    /// Runtime assigned identifier.
    fn id(&self) -> u32;

    /// Try to claim the device for this process. Returns `false` if it is
    /// held elsewhere. Attaching an already attached handle succeeds.
    fn attach(&mut self) -> bool;

    fn target(&self) -> &Target;
}

pub trait Runtime {
    type Device: Device;

    /// Physical devices made of exactly `num_ipus` IPUs, in enumeration order.
    /// None of the returned handles is attached.
    fn devices(&self, num_ipus: usize) -> Vec<Self::Device>;

    /// A simulated device with `num_ipus` IPUs.
    fn model_device(&self, num_ipus: usize) -> Self::Device;

    fn compile(
        &self,
        target: &Target,
        program: &Program,
        options: &CompileOptions,
    ) -> Result<Executable, RuntimeError>;

    fn serialize(&self, executable: &Executable, out: &mut dyn Write) -> Result<(), RuntimeError>;

    fn deserialize(&self, input: &mut dyn Read) -> Result<Executable, RuntimeError>;
}
