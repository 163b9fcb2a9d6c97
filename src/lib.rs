//! Blockpack - tile-partitioned voxel accumulation and greedy fill/setblock packing

pub mod core;
pub mod math;
pub mod tile;
pub mod pack;
pub mod codec;
pub mod world;
pub mod job;
pub mod config;

pub use crate::config::PackConfig;
pub use crate::core::error::Error;
pub use crate::core::types::{IVec3, Result};
pub use crate::math::{BlockBox, Transform};
pub use crate::pack::{Accumulator, BlockCommand, CommandSink, Snapshot};
