//! Host world collaborators
//!
//! A host world is read through [`VoxelSource`] and written through
//! [`CommandSink`]. [`VoxelGrid`] is a position-indexed in-memory world
//! implementing both, used for previews, tests and the command-line tool.

use std::collections::HashMap;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::BlockBox;
use crate::pack::{Accumulator, CommandSink};

/// Reads raw voxel state from a host world
pub trait VoxelSource {
    /// Call `visitor` once per non-empty voxel inside the inclusive box
    /// `min..=max`. Order is up to the source.
    fn visit_blocks(
        &self,
        min: IVec3,
        max: IVec3,
        visitor: &mut dyn FnMut(IVec3, &str) -> Result<()>,
    ) -> Result<()>;
}

/// Copy every non-empty voxel of the box spanned by `a` and `b` into `acc`.
///
/// Boxes holding more than `scan_limit` positions, or reaching outside the
/// accumulator's build volume, are refused before the source is read.
/// Returns the number of voxels copied.
pub fn capture<S: VoxelSource + ?Sized>(
    source: &S,
    a: IVec3,
    b: IVec3,
    scan_limit: u64,
    acc: &mut Accumulator,
) -> Result<usize> {
    let region = BlockBox::new(a, b);
    let requested = region.volume();
    if requested > scan_limit {
        return Err(Error::ScanLimitExceeded { requested, limit: scan_limit });
    }
    let volume = acc.grid().volume();
    volume.check(region.min)?;
    volume.check(region.max)?;

    let mut copied = 0;
    source.visit_blocks(region.min, region.max, &mut |pos, block_type| {
        if !region.contains(pos) {
            return Err(Error::Internal(format!("source yielded {pos} outside {region:?}")));
        }
        acc.setblock(pos, block_type)?;
        copied += 1;
        Ok(())
    })?;

    log::debug!("captured {copied} voxels from a {requested} voxel region");
    Ok(copied)
}

/// Sparse in-memory world
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct VoxelGrid {
    blocks: HashMap<IVec3, String>,
}

impl VoxelGrid {
    pub fn new() -> Self {
        Self::default()
    }

    /// Block type at a position, None for empty
    pub fn get(&self, pos: IVec3) -> Option<&str> {
        self.blocks.get(&pos).map(String::as_str)
    }

    /// Place a block; the empty string clears the position
    pub fn set(&mut self, pos: IVec3, block_type: &str) {
        if block_type.is_empty() {
            self.blocks.remove(&pos);
        } else {
            self.blocks.insert(pos, block_type.to_string());
        }
    }

    pub fn len(&self) -> usize {
        self.blocks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.blocks.is_empty()
    }

    /// Non-empty voxels sorted by (y, x, z)
    pub fn sorted_blocks(&self) -> Vec<(IVec3, &str)> {
        let mut out: Vec<_> = self.blocks.iter().map(|(p, t)| (*p, t.as_str())).collect();
        out.sort_by_key(|(p, _)| (p.y, p.x, p.z));
        out
    }

    /// Smallest box holding every non-empty voxel
    pub fn bounds(&self) -> Option<BlockBox> {
        self.blocks.keys().fold(None, |acc, &p| match acc {
            None => Some(BlockBox::from_point(p)),
            Some(mut b) => {
                b.expand(p);
                Some(b)
            }
        })
    }
}

impl VoxelSource for VoxelGrid {
    fn visit_blocks(
        &self,
        min: IVec3,
        max: IVec3,
        visitor: &mut dyn FnMut(IVec3, &str) -> Result<()>,
    ) -> Result<()> {
        let region = BlockBox::new(min, max);
        if region.volume() <= self.blocks.len() as u64 {
            for pos in region.positions() {
                if let Some(block_type) = self.blocks.get(&pos) {
                    visitor(pos, block_type)?;
                }
            }
        } else {
            for (pos, block_type) in self.sorted_blocks() {
                if region.contains(pos) {
                    visitor(pos, block_type)?;
                }
            }
        }
        Ok(())
    }
}

impl CommandSink for VoxelGrid {
    fn setblock(&mut self, pos: IVec3, block_type: &str) -> Result<()> {
        self.set(pos, block_type);
        Ok(())
    }

    fn fill(&mut self, min: IVec3, max: IVec3, block_type: &str) -> Result<()> {
        for pos in BlockBox::new(min, max).positions() {
            self.set(pos, block_type);
        }
        Ok(())
    }
}
