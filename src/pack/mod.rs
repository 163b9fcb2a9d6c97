//! Accumulation, tile packing and snapshots

pub mod symbols;
pub mod packed;
pub mod tile;
pub mod sink;
pub mod snapshot;
pub mod accumulator;

pub use accumulator::Accumulator;
pub use packed::{PackedTile, TileCommand};
pub use sink::{AllStable, BlockCommand, CommandSink, Layer, LayerPolicy};
pub use snapshot::{Snapshot, SnapshotStats};
pub use symbols::{SymbolTable, VOID_ID};
pub use tile::{MutableTile, PrefillMode};
