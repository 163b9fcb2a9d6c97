//! Rotation + translation applied to block coordinates during replay

use glam::I64Vec3;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::aabb::BlockBox;

/// Integer 3x3 rotation followed by a translation.
///
/// The matrix is row-major and is expected to be a signed permutation
/// (one of the 24 axis-aligned rotations); it is not validated.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Default)]
pub struct Transform {
    pub rotation: Option<[i32; 9]>,
    pub offset: IVec3,
}

impl Transform {
    /// Identity transform
    pub const IDENTITY: Transform = Transform {
        rotation: None,
        offset: IVec3::ZERO,
    };

    /// Create from an optional row-major matrix and an optional offset
    pub fn new(rotation: Option<[i32; 9]>, offset: Option<IVec3>) -> Self {
        Self {
            rotation,
            offset: offset.unwrap_or(IVec3::ZERO),
        }
    }

    /// Pure translation
    pub fn translation(offset: IVec3) -> Self {
        Self { rotation: None, offset }
    }

    /// Rotation about +y by `quarter_turns` * 90 degrees, then `offset`
    pub fn rotate_y(quarter_turns: i32, offset: IVec3) -> Self {
        let rotation = match quarter_turns.rem_euclid(4) {
            0 => None,
            1 => Some([0, 0, 1, 0, 1, 0, -1, 0, 0]),
            2 => Some([-1, 0, 0, 0, 1, 0, 0, 0, -1]),
            _ => Some([0, 0, -1, 0, 1, 0, 1, 0, 0]),
        };
        Self { rotation, offset }
    }

    pub fn is_identity(&self) -> bool {
        self.rotation.is_none() && self.offset == IVec3::ZERO
    }

    /// Map a single position. Results outside the i32 range are an error.
    pub fn apply(&self, p: IVec3) -> Result<IVec3> {
        let p = p.as_i64vec3();
        let rotated = match &self.rotation {
            None => p,
            Some(m) => {
                let m = m.map(i64::from);
                I64Vec3::new(
                    m[0] * p.x + m[1] * p.y + m[2] * p.z,
                    m[3] * p.x + m[4] * p.y + m[5] * p.z,
                    m[6] * p.x + m[7] * p.y + m[8] * p.z,
                )
            }
        };
        let out = rotated + self.offset.as_i64vec3();
        match (i32::try_from(out.x), i32::try_from(out.y), i32::try_from(out.z)) {
            (Ok(x), Ok(y), Ok(z)) => Ok(IVec3::new(x, y, z)),
            _ => Err(Error::CoordinateOverflow { x: out.x, y: out.y, z: out.z }),
        }
    }

    /// Map a box; corners are re-normalized since rotation can swap them
    pub fn apply_box(&self, b: BlockBox) -> Result<BlockBox> {
        Ok(BlockBox::new(self.apply(b.min)?, self.apply(b.max)?))
    }
}
