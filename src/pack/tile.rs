//! Mutable tiles and the per-tile greedy box packer
//!
//! Packing runs two passes over the tile's voxel slots:
//!
//! 1. Run lengths. Visiting slots from the far corner back to the origin,
//!    each slot's `+x`, `+y` and `+z` run is one more than its neighbour's
//!    when the neighbour has the same type, zero otherwise.
//! 2. Greedy boxes. Visiting slots bottom-up (y, then x, then z), every
//!    unclaimed non-void slot grows the largest x/z rectangle its runs allow,
//!    extends it upward as far as every column agrees, claims the box and
//!    emits it as a fill (or a setblock for a single slot).
//!
//! Boxes never grow over slots an earlier box already claimed, so output
//! commands never overlap.

use serde::{Deserialize, Serialize};

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::pack::packed::{LocalPos, PackedTile, TileCommand};
use crate::pack::symbols::{SymbolTable, VOID_ID};
use crate::tile::{TileDims, TileKey};

/// Exclusive bound on tile-local type IDs (type words use 15 bits)
pub const LOCAL_TYPE_LIMIT: u32 = 1 << 15;

/// Whether packing leaves each tile's most frequent type to a caller prefill
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PrefillMode {
    /// Every non-void voxel is emitted
    #[default]
    Off,
    /// Voxels of each tile's most frequent type are not emitted; replaying
    /// leaves those positions to whatever the target already holds there
    MostFrequent,
}

/// Transient per-slot packing state
#[derive(Clone, Copy, Debug, Default)]
struct RunCell {
    run_x: u8,
    run_y: u8,
    run_z: u8,
    claimed: bool,
}

/// A tile receiving writes
#[derive(Clone, Debug)]
pub struct MutableTile {
    key: TileKey,
    dims: TileDims,
    /// Local type per slot
    voxels: Vec<u16>,
    /// Global symbol ID <-> local type ID
    locals: SymbolTable<u32>,
    /// Slot count per local type, void included
    counts: Vec<u32>,
}

impl MutableTile {
    /// Create an all-void tile
    pub fn new(key: TileKey, dims: TileDims) -> Self {
        let volume = dims.volume();
        Self {
            key,
            dims,
            voxels: vec![VOID_ID as u16; volume],
            locals: SymbolTable::with_limit(VOID_ID, LOCAL_TYPE_LIMIT),
            counts: vec![volume as u32],
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn dims(&self) -> TileDims {
        self.dims
    }

    fn slot(&self, local: IVec3) -> Result<usize> {
        if !self.dims.contains(local) {
            return Err(Error::OutsideTile { x: local.x, y: local.y, z: local.z });
        }
        Ok(self.dims.index(local.x as usize, local.y as usize, local.z as usize))
    }

    /// Overwrite one slot with a global type. Returns whether the slot changed.
    pub fn set(&mut self, local: IVec3, global: u32) -> Result<bool> {
        let slot = self.slot(local)?;
        let old = self.voxels[slot];
        if self.locals.id(&global) == Some(old as u32) {
            return Ok(false);
        }
        // Release first so the vacated ID is the one handed to the new type.
        self.counts[old as usize] -= 1;
        if self.counts[old as usize] == 0 && old as u32 != VOID_ID {
            self.locals.release(old as u32)?;
        }
        let new = match self.locals.intern(&global) {
            Ok(id) => id as u16,
            Err(e) => {
                // Exhaustion implies nothing was released above.
                self.counts[old as usize] += 1;
                return Err(e);
            }
        };
        self.voxels[slot] = new;
        if self.counts.len() <= new as usize {
            self.counts.resize(new as usize + 1, 0);
        }
        self.counts[new as usize] += 1;
        Ok(true)
    }

    /// Global type at a local position (void included)
    pub fn get(&self, local: IVec3) -> Result<u32> {
        let slot = self.slot(local)?;
        self.global_of(self.voxels[slot])
    }

    fn global_of(&self, local_type: u16) -> Result<u32> {
        self.locals.get(local_type as u32).copied().ok_or_else(|| {
            let key = self.key.0;
            Error::Internal(format!("tile {key:#x}: slot holds released type {local_type}"))
        })
    }

    /// Number of non-void slots
    pub fn filled(&self) -> usize {
        self.voxels.len() - self.counts[VOID_ID as usize] as usize
    }

    pub fn is_empty(&self) -> bool {
        self.filled() == 0
    }

    /// Number of live local types, void included
    pub fn local_type_count(&self) -> usize {
        self.locals.len()
    }

    /// One past the highest local type ever allocated
    pub fn local_type_bound(&self) -> u32 {
        self.locals.id_bound()
    }

    /// Most frequent local type by slot count; ties go to the lower ID
    pub fn most_frequent_type(&self) -> u16 {
        let mut best = VOID_ID as usize;
        for (id, &count) in self.counts.iter().enumerate() {
            if count > self.counts[best] {
                best = id;
            }
        }
        best as u16
    }

    /// Non-void slots as (local position, global type)
    pub fn blocks(&self) -> impl Iterator<Item = (IVec3, u32)> + '_ {
        let dims = self.dims;
        (0..dims.y()).flat_map(move |y| {
            (0..dims.x()).flat_map(move |x| {
                (0..dims.z()).filter_map(move |z| {
                    let t = self.voxels[dims.index(x, y, z)];
                    if t as u32 == VOID_ID {
                        return None;
                    }
                    let global = self.locals.get(t as u32).copied()?;
                    Some((IVec3::new(x as i32, y as i32, z as i32), global))
                })
            })
        })
    }

    /// Pack into a command list. The tile itself is left untouched.
    pub fn pack(&self, mode: PrefillMode) -> Result<PackedTile> {
        let prefill = match mode {
            PrefillMode::Off => VOID_ID as u16,
            PrefillMode::MostFrequent => self.most_frequent_type(),
        };
        let local_types: Vec<u32> = self
            .locals
            .slots()
            .iter()
            .map(|s| s.unwrap_or(VOID_ID))
            .collect();

        let mut runs = self.compute_runs();
        let mut packed = PackedTile::new(self.key, local_types, prefill);
        self.emit_boxes(&mut runs, prefill, &mut packed)?;

        log::debug!(
            "packed tile {:#x}: {} voxels -> {} fills, {} setblocks",
            self.key.0,
            self.filled(),
            packed.fill_count(),
            packed.setblock_count()
        );
        Ok(packed)
    }

    /// Pass 1: run lengths along +x, +y and +z
    fn compute_runs(&self) -> Vec<RunCell> {
        let d = self.dims;
        let mut runs = vec![RunCell::default(); d.volume()];
        for x in (0..d.x()).rev() {
            for z in (0..d.z()).rev() {
                for y in (0..d.y()).rev() {
                    let i = d.index(x, y, z);
                    let t = self.voxels[i];
                    let run = |runs: &[RunCell], n: usize, pick: fn(&RunCell) -> u8| {
                        if self.voxels[n] == t { pick(&runs[n]) + 1 } else { 0 }
                    };
                    let cell = RunCell {
                        run_x: if x + 1 < d.x() {
                            run(&runs, d.index(x + 1, y, z), |c| c.run_x)
                        } else {
                            0
                        },
                        run_y: if y + 1 < d.y() {
                            run(&runs, d.index(x, y + 1, z), |c| c.run_y)
                        } else {
                            0
                        },
                        run_z: if z + 1 < d.z() {
                            run(&runs, d.index(x, y, z + 1), |c| c.run_z)
                        } else {
                            0
                        },
                        claimed: false,
                    };
                    runs[i] = cell;
                }
            }
        }
        runs
    }

    /// Pass 2: greedy box emission, bottom-up
    fn emit_boxes(&self, runs: &mut [RunCell], prefill: u16, out: &mut PackedTile) -> Result<()> {
        let d = self.dims;
        for y in 0..d.y() {
            for x in 0..d.x() {
                for z in 0..d.z() {
                    let i = d.index(x, y, z);
                    let t = self.voxels[i];
                    if runs[i].claimed || t as u32 == VOID_ID || t == prefill {
                        continue;
                    }

                    let (dx, dz) = best_rectangle(d, runs, x, y, z);
                    let dy = vertical_extent(d, runs, x, y, z, dx, dz);

                    for by in y..=y + dy {
                        for bx in x..=x + dx {
                            for bz in z..=z + dz {
                                let cell = &mut runs[d.index(bx, by, bz)];
                                if cell.claimed {
                                    return Err(Error::Internal(format!(
                                        "tile {:#x}: slot ({bx}, {by}, {bz}) claimed twice",
                                        self.key.0
                                    )));
                                }
                                cell.claimed = true;
                            }
                        }
                    }

                    let min = LocalPos::new(x, y, z);
                    if dx == 0 && dy == 0 && dz == 0 {
                        out.push(TileCommand::Setblock { local_type: t, pos: min });
                    } else {
                        out.push(TileCommand::Fill {
                            local_type: t,
                            min,
                            max: LocalPos::new(x + dx, y + dy, z + dz),
                        });
                    }
                }
            }
        }
        Ok(())
    }
}

/// Unclaimed +z extent of the column starting at (x, y, z)
fn free_z_extent(d: TileDims, runs: &[RunCell], x: usize, y: usize, z: usize) -> usize {
    let limit = runs[d.index(x, y, z)].run_z as usize;
    let mut dz = 0;
    while dz < limit && !runs[d.index(x, y, z + dz + 1)].claimed {
        dz += 1;
    }
    dz
}

/// Widest-area x/z rectangle at the base layer. Only a strictly larger area
/// replaces the best so far, so smaller extents win ties.
fn best_rectangle(d: TileDims, runs: &[RunCell], x: usize, y: usize, z: usize) -> (usize, usize) {
    let max_dx = runs[d.index(x, y, z)].run_x as usize;
    let mut best = (0, 0);
    let mut best_area = 0;
    let mut min_dz = usize::MAX;
    for dx in 0..=max_dx {
        if runs[d.index(x + dx, y, z)].claimed {
            break;
        }
        min_dz = min_dz.min(free_z_extent(d, runs, x + dx, y, z));
        let area = (dx + 1) * (min_dz + 1);
        if area > best_area {
            best_area = area;
            best = (dx, min_dz);
        }
    }
    best
}

/// How many layers above the base the rectangle can grow
fn vertical_extent(
    d: TileDims,
    runs: &[RunCell],
    x: usize,
    y: usize,
    z: usize,
    dx: usize,
    dz: usize,
) -> usize {
    let mut max_dy = usize::MAX;
    for bx in x..=x + dx {
        for bz in z..=z + dz {
            max_dy = max_dy.min(runs[d.index(bx, y, bz)].run_y as usize);
        }
    }
    for dy in 1..=max_dy {
        let layer_free = (x..=x + dx)
            .all(|bx| (z..=z + dz).all(|bz| !runs[d.index(bx, y + dy, bz)].claimed));
        if !layer_free {
            return dy - 1;
        }
    }
    max_dy
}
