//! The mutable accumulator: routes writes to tiles and packs them into snapshots

use std::collections::BTreeMap;

use rayon::prelude::*;

use crate::config::PackConfig;
use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::{BlockBox, Transform};
use crate::pack::sink::CommandSink;
use crate::pack::snapshot::Snapshot;
use crate::pack::symbols::{SymbolTable, VOID_ID};
use crate::pack::tile::{MutableTile, PrefillMode};
use crate::tile::{TileGrid, TileKey};

/// Receives point and box writes, packs them on demand.
///
/// Not internally synchronized: one owner drives all mutation.
#[derive(Clone, Debug)]
pub struct Accumulator {
    grid: TileGrid,
    prefill: PrefillMode,
    /// Block type <-> global ID, shared by every tile
    symbols: SymbolTable<String>,
    tiles: BTreeMap<TileKey, MutableTile>,
    bounds: Option<BlockBox>,
    comments: BTreeMap<String, String>,
}

impl Accumulator {
    /// Empty accumulator on the default grid
    pub fn new() -> Self {
        Self::with_grid(TileGrid::default(), PrefillMode::Off)
    }

    pub fn with_grid(grid: TileGrid, prefill: PrefillMode) -> Self {
        Self {
            grid,
            prefill,
            symbols: SymbolTable::new(String::new()),
            tiles: BTreeMap::new(),
            bounds: None,
            comments: BTreeMap::new(),
        }
    }

    /// Empty accumulator using the config's grid and prefill mode
    pub fn from_config(config: &PackConfig) -> Result<Self> {
        Ok(Self::with_grid(config.grid()?, config.prefill))
    }

    pub fn grid(&self) -> TileGrid {
        self.grid
    }

    /// Set one block. The empty string is void and clears the position.
    pub fn setblock(&mut self, pos: IVec3, block_type: &str) -> Result<()> {
        let (key, local) = self.grid.locate(pos)?;
        let global = self.symbols.intern(block_type)?;
        self.write(key, local, global)?;
        self.extend_bounds(BlockBox::from_point(pos));
        Ok(())
    }

    /// Set every block in the box spanned by two corners, given in any order.
    ///
    /// Both corners are checked against the build volume before anything is
    /// written, so a rejected fill leaves no partial state.
    pub fn fill(&mut self, a: IVec3, b: IVec3, block_type: &str) -> Result<()> {
        let volume = self.grid.volume();
        volume.check(a)?;
        volume.check(b)?;
        let region = BlockBox::new(a, b);
        let global = self.symbols.intern(block_type)?;

        let mut current: Option<(TileKey, IVec3)> = None;
        for pos in region.positions() {
            let key = self.grid.key(pos)?;
            let origin = match current {
                Some((k, origin)) if k == key => origin,
                _ => {
                    let origin = self.grid.origin(key);
                    current = Some((key, origin));
                    origin
                }
            };
            self.write(key, pos - origin, global)?;
        }
        self.extend_bounds(region);
        Ok(())
    }

    fn write(&mut self, key: TileKey, local: IVec3, global: u32) -> Result<()> {
        let tile = match self.tiles.get_mut(&key) {
            Some(tile) => tile,
            // Clearing a position in a tile that was never created is a no-op.
            None if global == VOID_ID => return Ok(()),
            None => {
                let dims = self.grid.dims();
                self.tiles.entry(key).or_insert_with(|| MutableTile::new(key, dims))
            }
        };
        tile.set(local, global)?;
        Ok(())
    }

    fn extend_bounds(&mut self, region: BlockBox) {
        self.bounds = Some(match self.bounds {
            Some(b) => b.merged(&region),
            None => region,
        });
    }

    /// Replay a snapshot into this accumulator through `transform`
    pub fn absorb(&mut self, snapshot: &Snapshot, transform: &Transform) -> Result<()> {
        let before = self.tiles.len();
        snapshot.replay(transform, self)?;
        log::debug!(
            "absorbed {} tiles, accumulator now spans {} tiles (was {})",
            snapshot.stats().tiles,
            self.tiles.len(),
            before
        );
        Ok(())
    }

    /// Pack every non-empty tile into a new snapshot.
    ///
    /// `metadata` is merged over the accumulator's own comments in the
    /// snapshot only. The accumulator is left unchanged and can keep taking
    /// writes and be packed again.
    pub fn pack<I>(&self, metadata: I) -> Result<Snapshot>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mode = self.prefill;
        let tiles: BTreeMap<TileKey, _> = self
            .tiles
            .par_iter()
            .filter(|(_, tile)| !tile.is_empty())
            .map(|(key, tile)| tile.pack(mode).map(|packed| (*key, packed)))
            .collect::<Result<_>>()?;

        let symbols: Vec<String> = self
            .symbols
            .slots()
            .iter()
            .map(|s| s.clone().unwrap_or_default())
            .collect();

        let mut comments = self.comments.clone();
        comments.extend(metadata);

        let snapshot = Snapshot::from_parts(self.grid, self.bounds, symbols, tiles, comments)?;
        let stats = snapshot.stats();
        log::info!(
            "packed {} tiles: {} fills, {} setblocks, {} block types",
            stats.tiles,
            stats.fills,
            stats.setblocks,
            stats.symbols
        );
        Ok(snapshot)
    }

    /// Block type at a position, None for void
    pub fn block_at(&self, pos: IVec3) -> Result<Option<&str>> {
        let (key, local) = self.grid.locate(pos)?;
        let Some(tile) = self.tiles.get(&key) else {
            return Ok(None);
        };
        let global = tile.get(local)?;
        if global == VOID_ID {
            return Ok(None);
        }
        self.symbols
            .get(global)
            .map(|s| Some(s.as_str()))
            .ok_or_else(|| Error::Internal(format!("global type {global} has no symbol")))
    }

    /// Every non-void block, tiles in key order
    pub fn blocks(&self) -> impl Iterator<Item = (IVec3, &str)> + '_ {
        self.tiles.iter().flat_map(move |(key, tile)| {
            let origin = self.grid.origin(*key);
            tile.blocks().filter_map(move |(local, global)| {
                self.symbols.get(global).map(|s| (origin + local, s.as_str()))
            })
        })
    }

    /// Number of tiles holding at least one block
    pub fn tile_count(&self) -> usize {
        self.tiles.values().filter(|t| !t.is_empty()).count()
    }

    /// Number of distinct block types interned so far
    pub fn symbol_count(&self) -> usize {
        self.symbols.len() - 1
    }

    /// Union of every written position
    pub fn bounds(&self) -> Option<BlockBox> {
        self.bounds
    }

    pub fn comments(&self) -> &BTreeMap<String, String> {
        &self.comments
    }

    pub fn comments_mut(&mut self) -> &mut BTreeMap<String, String> {
        &mut self.comments
    }
}

impl Default for Accumulator {
    fn default() -> Self {
        Self::new()
    }
}

impl CommandSink for Accumulator {
    fn setblock(&mut self, pos: IVec3, block_type: &str) -> Result<()> {
        Accumulator::setblock(self, pos, block_type)
    }

    fn fill(&mut self, min: IVec3, max: IVec3, block_type: &str) -> Result<()> {
        Accumulator::fill(self, min, max, block_type)
    }
}
