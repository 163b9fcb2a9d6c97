//! Command consumers for snapshot replay

use crate::core::types::{IVec3, Result};

/// Receives replayed commands in world coordinates
pub trait CommandSink {
    /// Place one block
    fn setblock(&mut self, pos: IVec3, block_type: &str) -> Result<()>;

    /// Fill the inclusive box `min..=max`; corners are already normalized
    fn fill(&mut self, min: IVec3, max: IVec3, block_type: &str) -> Result<()>;
}

/// An owned replayed command
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum BlockCommand {
    Setblock { pos: IVec3, block_type: String },
    Fill { min: IVec3, max: IVec3, block_type: String },
}

impl BlockCommand {
    pub fn block_type(&self) -> &str {
        match self {
            BlockCommand::Setblock { block_type, .. } | BlockCommand::Fill { block_type, .. } => {
                block_type
            }
        }
    }

    /// Lowest y the command touches
    pub fn base_y(&self) -> i32 {
        match self {
            BlockCommand::Setblock { pos, .. } => pos.y,
            BlockCommand::Fill { min, .. } => min.y,
        }
    }
}

/// Collects commands in replay order
impl CommandSink for Vec<BlockCommand> {
    fn setblock(&mut self, pos: IVec3, block_type: &str) -> Result<()> {
        self.push(BlockCommand::Setblock { pos, block_type: block_type.to_string() });
        Ok(())
    }

    fn fill(&mut self, min: IVec3, max: IVec3, block_type: &str) -> Result<()> {
        self.push(BlockCommand::Fill { min, max, block_type: block_type.to_string() });
        Ok(())
    }
}

/// Placement pass a block type belongs to
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Layer {
    /// Placed in the first pass
    Stable,
    /// Placed after every stable block (falling or flowing material)
    Unstable,
}

/// Classifies block types into placement layers
pub trait LayerPolicy {
    fn layer(&self, block_type: &str) -> Layer;
}

/// Treats every block type as stable, giving a single bottom-up pass
#[derive(Clone, Copy, Debug, Default)]
pub struct AllStable;

impl LayerPolicy for AllStable {
    fn layer(&self, _block_type: &str) -> Layer {
        Layer::Stable
    }
}

impl<F: Fn(&str) -> Layer> LayerPolicy for F {
    fn layer(&self, block_type: &str) -> Layer {
        self(block_type)
    }
}
