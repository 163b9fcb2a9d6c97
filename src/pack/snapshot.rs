//! Immutable packed snapshots and command replay

use std::collections::BTreeMap;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::{BlockBox, Transform};
use crate::pack::packed::{PackedTile, TileCommand};
use crate::pack::sink::{AllStable, CommandSink, Layer, LayerPolicy};
use crate::pack::symbols::VOID_ID;
use crate::tile::{TileGrid, TileKey};

/// Summary counts of a snapshot
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SnapshotStats {
    pub tiles: usize,
    pub fills: usize,
    pub setblocks: usize,
    pub symbols: usize,
}

/// Frozen packed tiles plus the symbol table they reference.
///
/// Only `comments_mut` mutates a snapshot; everything else is read-only, so a
/// shared snapshot can be replayed from several threads at once.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    grid: TileGrid,
    bounds: Option<BlockBox>,
    /// Block type per global ID; empty for void and unused IDs
    symbols: Vec<String>,
    tiles: BTreeMap<TileKey, PackedTile>,
    comments: BTreeMap<String, String>,
}

impl Snapshot {
    /// Assemble a snapshot, checking every tile against the symbol table
    pub fn from_parts(
        grid: TileGrid,
        bounds: Option<BlockBox>,
        symbols: Vec<String>,
        tiles: BTreeMap<TileKey, PackedTile>,
        comments: BTreeMap<String, String>,
    ) -> Result<Self> {
        for (key, tile) in &tiles {
            if tile.key() != *key {
                return Err(Error::Corrupt(format!(
                    "tile {:#x} stored under key {:#x}",
                    tile.key().0,
                    key.0
                )));
            }
            for (local, &global) in tile.local_types().iter().enumerate() {
                let live = symbols.get(global as usize).is_some_and(|s| !s.is_empty());
                if global != VOID_ID && !live {
                    return Err(Error::Corrupt(format!(
                        "tile {:#x}: local type {local} maps to missing symbol {global}",
                        key.0
                    )));
                }
            }
        }
        Ok(Self { grid, bounds, symbols, tiles, comments })
    }

    /// An empty snapshot on the given grid
    pub fn empty(grid: TileGrid) -> Self {
        Self {
            grid,
            bounds: None,
            symbols: vec![String::new()],
            tiles: BTreeMap::new(),
            comments: BTreeMap::new(),
        }
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    /// Min and max corner over every written position, None when nothing was written
    pub fn block_bounds(&self) -> Option<(IVec3, IVec3)> {
        self.bounds.map(|b| (b.min, b.max))
    }

    pub fn bounds(&self) -> Option<BlockBox> {
        self.bounds
    }

    pub fn symbols(&self) -> &[String] {
        &self.symbols
    }

    pub fn tiles(&self) -> impl Iterator<Item = &PackedTile> {
        self.tiles.values()
    }

    pub fn tile(&self, key: TileKey) -> Option<&PackedTile> {
        self.tiles.get(&key)
    }

    pub fn comments(&self) -> &BTreeMap<String, String> {
        &self.comments
    }

    /// Metadata stays editable after packing; voxel data does not
    pub fn comments_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.comments
    }

    pub fn stats(&self) -> SnapshotStats {
        SnapshotStats {
            tiles: self.tiles.len(),
            fills: self.tiles.values().map(PackedTile::fill_count).sum(),
            setblocks: self.tiles.values().map(PackedTile::setblock_count).sum(),
            symbols: self.symbols.iter().filter(|s| !s.is_empty()).count(),
        }
    }

    /// Whether the snapshot holds no commands
    pub fn is_empty(&self) -> bool {
        self.tiles.values().all(PackedTile::is_empty)
    }

    /// Replay every command bottom-up: tiles in key order, and inside each
    /// tile fills and setblocks merged by ascending y.
    pub fn replay<S: CommandSink + ?Sized>(
        &self,
        transform: &Transform,
        sink: &mut S,
    ) -> Result<()> {
        self.replay_layered(transform, &AllStable, sink)
    }

    /// Replay once per layer, stable types first. Each pass is bottom-up.
    pub fn replay_layered<S: CommandSink + ?Sized>(
        &self,
        transform: &Transform,
        policy: &dyn LayerPolicy,
        sink: &mut S,
    ) -> Result<()> {
        let layers: Vec<Layer> = self.symbols.iter().map(|s| policy.layer(s)).collect();
        for pass in [Layer::Stable, Layer::Unstable] {
            for tile in self.tiles.values() {
                self.replay_tile(tile, transform, sink, |global| layers[global as usize] == pass)?;
            }
        }
        Ok(())
    }

    fn replay_tile<S: CommandSink + ?Sized>(
        &self,
        tile: &PackedTile,
        transform: &Transform,
        sink: &mut S,
        include: impl Fn(u32) -> bool,
    ) -> Result<()> {
        let origin = self.grid.origin(tile.key());
        for cmd in tile.replay_order() {
            let global = tile
                .global_type(cmd.local_type())
                .filter(|&g| (g as usize) < self.symbols.len())
                .ok_or_else(|| {
                    let key = tile.key().0;
                    Error::Internal(format!("tile {key:#x}: unresolved command {cmd:?}"))
                })?;
            if !include(global) {
                continue;
            }
            let block_type = &self.symbols[global as usize];
            match cmd {
                TileCommand::Setblock { pos, .. } => {
                    sink.setblock(transform.apply(origin + pos.as_ivec3())?, block_type)?;
                }
                TileCommand::Fill { min, max, .. } => {
                    let b = transform.apply_box(BlockBox {
                        min: origin + min.as_ivec3(),
                        max: origin + max.as_ivec3(),
                    })?;
                    sink.fill(b.min, b.max, block_type)?;
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::accumulator::Accumulator;
    use crate::pack::sink::BlockCommand;

    fn stone_at_origin() -> Snapshot {
        let mut acc = Accumulator::new();
        acc.setblock(IVec3::ZERO, "stone").unwrap();
        acc.pack([]).unwrap()
    }

    #[test]
    fn test_rotated_replay_of_single_block() {
        let snapshot = stone_at_origin();
        let mut out: Vec<BlockCommand> = Vec::new();
        snapshot
            .replay(&Transform::rotate_y(1, IVec3::new(10, 0, 10)), &mut out)
            .unwrap();
        assert_eq!(out, vec![BlockCommand::Setblock {
            pos: IVec3::new(10, 0, 10),
            block_type: "stone".to_string(),
        }]);
    }

    #[test]
    fn test_rotated_fill_corners_are_normalized() {
        let mut acc = Accumulator::new();
        acc.fill(IVec3::ZERO, IVec3::new(3, 0, 1), "oak_planks").unwrap();
        let snapshot = acc.pack([]).unwrap();

        let mut out: Vec<BlockCommand> = Vec::new();
        snapshot.replay(&Transform::rotate_y(1, IVec3::ZERO), &mut out).unwrap();
        assert_eq!(out, vec![BlockCommand::Fill {
            min: IVec3::new(0, 0, -3),
            max: IVec3::new(1, 0, 0),
            block_type: "oak_planks".to_string(),
        }]);
    }

    #[test]
    fn test_replay_is_bottom_up_across_tiles() {
        let mut acc = Accumulator::new();
        // Written top-down and in scattered x/z order on purpose.
        for y in (0..48).step_by(7).rev() {
            acc.setblock(IVec3::new(40 - y, y, y * 3 - 50), "glass").unwrap();
            acc.fill(IVec3::new(0, y, 0), IVec3::new(2, y, 2), "dirt").unwrap();
        }
        let snapshot = acc.pack([]).unwrap();

        let mut out: Vec<BlockCommand> = Vec::new();
        snapshot.replay(&Transform::IDENTITY, &mut out).unwrap();
        assert_eq!(out.len(), 14);

        // Every command of a lower tile row precedes every command of a higher one.
        let grid = snapshot.grid();
        let rows: Vec<u64> = out
            .iter()
            .map(|c| grid.key(IVec3::new(0, c.base_y(), 0)).unwrap().y_index())
            .collect();
        assert!(rows.windows(2).all(|w| w[0] <= w[1]), "{rows:?}");
    }

    #[test]
    fn test_layered_replay_puts_unstable_last() {
        let mut acc = Accumulator::new();
        acc.setblock(IVec3::new(0, 5, 0), "sand").unwrap();
        acc.setblock(IVec3::new(0, 0, 0), "sand").unwrap();
        acc.setblock(IVec3::new(0, 40, 0), "stone").unwrap();
        let snapshot = acc.pack([]).unwrap();

        let policy = |t: &str| if t == "sand" { Layer::Unstable } else { Layer::Stable };
        let mut out: Vec<BlockCommand> = Vec::new();
        snapshot.replay_layered(&Transform::IDENTITY, &policy, &mut out).unwrap();
        let order: Vec<(&str, i32)> = out.iter().map(|c| (c.block_type(), c.base_y())).collect();
        assert_eq!(order, vec![("stone", 40), ("sand", 0), ("sand", 5)]);
    }

    #[test]
    fn test_stats_and_bounds() {
        let mut acc = Accumulator::new();
        acc.fill(IVec3::new(-3, 0, -3), IVec3::new(3, 0, 3), "grass_block").unwrap();
        acc.setblock(IVec3::new(0, 8, 0), "torch").unwrap();
        let snapshot = acc.pack([]).unwrap();

        assert_eq!(snapshot.block_bounds(), Some((IVec3::new(-3, 0, -3), IVec3::new(3, 8, 3))));
        let stats = snapshot.stats();
        assert_eq!(stats.symbols, 2);
        assert_eq!(stats.setblocks, 1);
        // The 7x7 square straddles four tiles.
        assert_eq!(stats.tiles, 4);
        assert_eq!(stats.fills, 4);
    }

    #[test]
    fn test_comments_editable_after_packing() {
        let mut snapshot = stone_at_origin();
        snapshot.comments_mut().insert("author".to_string(), "builder".to_string());
        assert_eq!(snapshot.comments().get("author").map(String::as_str), Some("builder"));
        assert_eq!(snapshot.stats().setblocks, 1);
    }

    #[test]
    fn test_concurrent_replay() {
        let mut acc = Accumulator::new();
        acc.fill(IVec3::ZERO, IVec3::new(20, 20, 20), "stone").unwrap();
        let snapshot = std::sync::Arc::new(acc.pack([]).unwrap());

        let expected = {
            let mut out: Vec<BlockCommand> = Vec::new();
            snapshot.replay(&Transform::IDENTITY, &mut out).unwrap();
            out
        };
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let snapshot = snapshot.clone();
                std::thread::spawn(move || {
                    let mut out: Vec<BlockCommand> = Vec::new();
                    snapshot.replay(&Transform::IDENTITY, &mut out).unwrap();
                    out
                })
            })
            .collect();
        for h in handles {
            assert_eq!(h.join().unwrap(), expected);
        }
    }

    #[test]
    fn test_from_parts_rejects_dangling_symbol() {
        let mut tiles = BTreeMap::new();
        tiles.insert(TileKey(0), PackedTile::new(TileKey(0), vec![0, 3], 0));
        let symbols = vec![String::new()];
        let err = Snapshot::from_parts(TileGrid::default(), None, symbols, tiles, BTreeMap::new());
        assert!(matches!(err, Err(Error::Corrupt(_))));
    }
}
