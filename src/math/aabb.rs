//! Inclusive axis-aligned integer block box

use glam::I64Vec3;

use crate::core::types::IVec3;

/// Axis-aligned box of block positions, both corners inclusive
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub struct BlockBox {
    pub min: IVec3,
    pub max: IVec3,
}

impl BlockBox {
    /// Create a box spanning two corners given in any order
    pub fn new(a: IVec3, b: IVec3) -> Self {
        Self {
            min: a.min(b),
            max: a.max(b),
        }
    }

    /// Box covering a single position
    pub fn from_point(p: IVec3) -> Self {
        Self { min: p, max: p }
    }

    /// Number of blocks along each axis, widened so full-range boxes fit
    pub fn size(&self) -> I64Vec3 {
        self.max.as_i64vec3() - self.min.as_i64vec3() + I64Vec3::ONE
    }

    /// Number of blocks covered, saturating at `u64::MAX`
    pub fn volume(&self) -> u64 {
        let s = self.size().as_u64vec3();
        s.x.checked_mul(s.y)
            .and_then(|xy| xy.checked_mul(s.z))
            .unwrap_or(u64::MAX)
    }

    /// Check if a position is inside the box
    pub fn contains(&self, p: IVec3) -> bool {
        p.x >= self.min.x && p.x <= self.max.x &&
        p.y >= self.min.y && p.y <= self.max.y &&
        p.z >= self.min.z && p.z <= self.max.z
    }

    /// Check if two boxes share at least one block
    pub fn intersects(&self, other: &BlockBox) -> bool {
        self.min.x <= other.max.x && self.max.x >= other.min.x &&
        self.min.y <= other.max.y && self.max.y >= other.min.y &&
        self.min.z <= other.max.z && self.max.z >= other.min.z
    }

    /// Expand box to include position
    pub fn expand(&mut self, p: IVec3) {
        self.min = self.min.min(p);
        self.max = self.max.max(p);
    }

    /// Return merged box containing both
    pub fn merged(&self, other: &BlockBox) -> BlockBox {
        BlockBox {
            min: self.min.min(other.min),
            max: self.max.max(other.max),
        }
    }

    /// Iterate every position, y outermost then x then z
    pub fn positions(&self) -> impl Iterator<Item = IVec3> + use<> {
        let BlockBox { min, max } = *self;
        (min.y..=max.y).flat_map(move |y| {
            (min.x..=max.x).flat_map(move |x| (min.z..=max.z).map(move |z| IVec3::new(x, y, z)))
        })
    }
}
