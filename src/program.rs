//! Program description handed to the compiler.

use crate::config::Options;
use crate::runtime::Target;

const F32_BYTES: usize = 4;

/// Work that runs in parallel across a set of tiles.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ComputeSet {
    pub name: String,
    pub tiles: usize,
    pub bytes_per_tile: usize,
    pub flops: u64,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Program {
    pub name: String,
    pub compute_sets: Vec<ComputeSet>,
}

/// Build the reference matrix workload for `options`.
///
/// A `dimension x dimension` product is split by rows over as many tiles as
/// there are rows, with the right hand matrix replicated on every tile, then
/// handed to the consumption task selected by `--con_task`.
pub fn build(options: &Options, target: &Target) -> Program {
    let n = options.dimensions().unsigned_abs().max(1) as usize;
    let tiles = n.min(target.num_tiles()).max(1);
    let rows_per_tile = n.div_ceil(tiles);

    // Sizes saturate so that oversized workloads reach the compiler and are
    // rejected there instead of wrapping.
    let square = n.saturating_mul(n);
    let matmul_elems = rows_per_tile
        .saturating_mul(n)
        .saturating_mul(2)
        .saturating_add(square);

    let matmul = ComputeSet {
        name: "matmul".to_string(),
        tiles,
        bytes_per_tile: matmul_elems.saturating_mul(F32_BYTES),
        flops: (n as u64).saturating_pow(3).saturating_mul(2),
    };

    let consume = ComputeSet {
        name: format!("consume/task{}", options.con_task()),
        tiles,
        bytes_per_tile: rows_per_tile.saturating_mul(n).saturating_mul(F32_BYTES),
        flops: square as u64,
    };

    Program {
        name: format!(
            "matmul{n}x{n}-source{}-device{}",
            options.source(),
            options.devices()
        ),
        compute_sets: vec![matmul, consume],
    }
}
