//! Tile partitioning of the build volume

pub mod dims;
pub mod key;

pub use dims::{BuildVolume, TileDims};
pub use key::{TileGrid, TileKey};
