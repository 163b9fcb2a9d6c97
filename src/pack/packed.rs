//! Immutable packed tiles and their 16-bit command words
//!
//! A local position packs into one word as `x << 10 | y << 5 | z`. A fill is
//! three words `[type, min, max]`, a setblock two words `[type, pos]`. Type
//! words are tile-local IDs resolved through the tile's local-to-global table.

use std::iter::Peekable;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::pack::symbols::VOID_ID;
use crate::tile::{TileDims, TileKey};

/// Bits per local coordinate component
pub const COORD_BITS: u32 = 5;
const COORD_MASK: u16 = (1 << COORD_BITS) - 1;

/// Words per encoded fill
pub const FILL_WORDS: usize = 3;
/// Words per encoded setblock
pub const SETBLOCK_WORDS: usize = 2;

/// Position inside a tile
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct LocalPos {
    pub x: u8,
    pub y: u8,
    pub z: u8,
}

impl LocalPos {
    pub fn new(x: usize, y: usize, z: usize) -> Self {
        Self { x: x as u8, y: y as u8, z: z as u8 }
    }

    pub fn to_word(self) -> u16 {
        ((self.x as u16) << (2 * COORD_BITS)) | ((self.y as u16) << COORD_BITS) | self.z as u16
    }

    pub fn from_word(word: u16) -> Self {
        Self {
            x: ((word >> (2 * COORD_BITS)) & COORD_MASK) as u8,
            y: ((word >> COORD_BITS) & COORD_MASK) as u8,
            z: (word & COORD_MASK) as u8,
        }
    }

    pub fn as_ivec3(self) -> IVec3 {
        IVec3::new(self.x as i32, self.y as i32, self.z as i32)
    }
}

/// One decoded command of a packed tile, in local coordinates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TileCommand {
    Fill { local_type: u16, min: LocalPos, max: LocalPos },
    Setblock { local_type: u16, pos: LocalPos },
}

impl TileCommand {
    /// Lowest y the command touches
    pub fn base_y(&self) -> u8 {
        match self {
            TileCommand::Fill { min, .. } => min.y,
            TileCommand::Setblock { pos, .. } => pos.y,
        }
    }

    pub fn local_type(&self) -> u16 {
        match self {
            TileCommand::Fill { local_type, .. } | TileCommand::Setblock { local_type, .. } => {
                *local_type
            }
        }
    }
}

/// Finished command list for one tile
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct PackedTile {
    key: TileKey,
    /// Global symbol ID per local type ID (0 for void and unused slots)
    local_types: Vec<u32>,
    fills: Vec<u16>,
    setblocks: Vec<u16>,
    /// Local type left to the caller's prefill, or void when prefill is off
    prefill: u16,
}

impl PackedTile {
    /// Start an empty command list
    pub fn new(key: TileKey, local_types: Vec<u32>, prefill: u16) -> Self {
        Self {
            key,
            local_types,
            fills: Vec::new(),
            setblocks: Vec::new(),
            prefill,
        }
    }

    /// Rebuild from raw parts, validating every word against `dims`.
    ///
    /// Commands are re-sorted by base y when a foreign encoder wrote them in
    /// another order, so replay can always merge bottom-up.
    pub fn from_parts(
        key: TileKey,
        dims: TileDims,
        local_types: Vec<u32>,
        fills: Vec<u16>,
        setblocks: Vec<u16>,
        prefill: u16,
    ) -> Result<Self> {
        if fills.len() % FILL_WORDS != 0 || setblocks.len() % SETBLOCK_WORDS != 0 {
            return Err(Error::Corrupt(format!(
                "tile {:#x}: command word counts {}/{} are not whole commands",
                key.0,
                fills.len(),
                setblocks.len()
            )));
        }
        let mut tile = Self { key, local_types, fills, setblocks, prefill };
        for cmd in tile.commands() {
            tile.validate(cmd, dims)?;
        }
        if (prefill as usize) >= tile.local_types.len().max(1) {
            return Err(Error::Corrupt(format!(
                "tile {:#x}: prefill type {prefill} unknown",
                key.0
            )));
        }
        if !is_sorted_by_y(tile.fills().map(|c| c.base_y()))
            || !is_sorted_by_y(tile.setblocks().map(|c| c.base_y()))
        {
            tile.sort_by_base_y();
        }
        Ok(tile)
    }

    fn validate(&self, cmd: TileCommand, dims: TileDims) -> Result<()> {
        let ty = cmd.local_type();
        if ty as u32 == VOID_ID || self.global_type(ty).is_none_or(|g| g == VOID_ID) {
            return Err(Error::Corrupt(format!(
                "tile {:#x}: command references void or unknown type {ty}",
                self.key.0
            )));
        }
        let in_tile = |p: LocalPos| dims.contains(p.as_ivec3());
        let ok = match cmd {
            TileCommand::Fill { min, max, .. } => {
                in_tile(min) && in_tile(max) && min.x <= max.x && min.y <= max.y && min.z <= max.z
            }
            TileCommand::Setblock { pos, .. } => in_tile(pos),
        };
        if ok {
            Ok(())
        } else {
            Err(Error::Corrupt(format!("tile {:#x}: command {cmd:?} outside tile", self.key.0)))
        }
    }

    fn sort_by_base_y(&mut self) {
        let mut fills: Vec<TileCommand> = self.fills().collect();
        let mut setblocks: Vec<TileCommand> = self.setblocks().collect();
        fills.sort_by_key(TileCommand::base_y);
        setblocks.sort_by_key(TileCommand::base_y);
        self.fills.clear();
        self.setblocks.clear();
        for cmd in fills.into_iter().chain(setblocks) {
            self.push(cmd);
        }
    }

    /// Append a command
    pub fn push(&mut self, cmd: TileCommand) {
        match cmd {
            TileCommand::Fill { local_type, min, max } => {
                self.fills.extend_from_slice(&[local_type, min.to_word(), max.to_word()]);
            }
            TileCommand::Setblock { local_type, pos } => {
                self.setblocks.extend_from_slice(&[local_type, pos.to_word()]);
            }
        }
    }

    pub fn key(&self) -> TileKey {
        self.key
    }

    pub fn local_types(&self) -> &[u32] {
        &self.local_types
    }

    pub fn fill_words(&self) -> &[u16] {
        &self.fills
    }

    pub fn setblock_words(&self) -> &[u16] {
        &self.setblocks
    }

    /// Local type the caller is expected to prefill, if any
    pub fn prefill_type(&self) -> Option<u16> {
        (self.prefill as u32 != VOID_ID).then_some(self.prefill)
    }

    /// Global symbol ID of a local type
    pub fn global_type(&self, local_type: u16) -> Option<u32> {
        self.local_types.get(local_type as usize).copied()
    }

    pub fn fill_count(&self) -> usize {
        self.fills.len() / FILL_WORDS
    }

    pub fn setblock_count(&self) -> usize {
        self.setblocks.len() / SETBLOCK_WORDS
    }

    pub fn is_empty(&self) -> bool {
        self.fills.is_empty() && self.setblocks.is_empty()
    }

    /// Decoded fills in emission order
    pub fn fills(&self) -> impl Iterator<Item = TileCommand> + '_ {
        self.fills.chunks_exact(FILL_WORDS).map(|w| TileCommand::Fill {
            local_type: w[0],
            min: LocalPos::from_word(w[1]),
            max: LocalPos::from_word(w[2]),
        })
    }

    /// Decoded setblocks in emission order
    pub fn setblocks(&self) -> impl Iterator<Item = TileCommand> + '_ {
        self.setblocks.chunks_exact(SETBLOCK_WORDS).map(|w| TileCommand::Setblock {
            local_type: w[0],
            pos: LocalPos::from_word(w[1]),
        })
    }

    /// All commands, fills first
    pub fn commands(&self) -> impl Iterator<Item = TileCommand> + '_ {
        self.fills().chain(self.setblocks())
    }

    /// Fills and setblocks interleaved so lower base y always comes first;
    /// on equal y the fill goes first.
    pub fn replay_order(
        &self,
    ) -> BottomUp<impl Iterator<Item = TileCommand> + '_, impl Iterator<Item = TileCommand> + '_> {
        BottomUp {
            fills: self.fills().peekable(),
            setblocks: self.setblocks().peekable(),
        }
    }
}

fn is_sorted_by_y(mut ys: impl Iterator<Item = u8>) -> bool {
    let Some(mut prev) = ys.next() else {
        return true;
    };
    ys.all(|y| {
        let ok = prev <= y;
        prev = y;
        ok
    })
}

/// Merge of two y-sorted command streams
pub struct BottomUp<F: Iterator<Item = TileCommand>, S: Iterator<Item = TileCommand>> {
    fills: Peekable<F>,
    setblocks: Peekable<S>,
}

impl<F, S> Iterator for BottomUp<F, S>
where
    F: Iterator<Item = TileCommand>,
    S: Iterator<Item = TileCommand>,
{
    type Item = TileCommand;

    fn next(&mut self) -> Option<TileCommand> {
        match (self.fills.peek(), self.setblocks.peek()) {
            (Some(f), Some(s)) if s.base_y() < f.base_y() => self.setblocks.next(),
            (Some(_), _) => self.fills.next(),
            (None, _) => self.setblocks.next(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn setblock(local_type: u16, x: usize, y: usize, z: usize) -> TileCommand {
        TileCommand::Setblock { local_type, pos: LocalPos::new(x, y, z) }
    }

    type Corner = (usize, usize, usize);

    fn fill(local_type: u16, min: Corner, max: Corner) -> TileCommand {
        TileCommand::Fill {
            local_type,
            min: LocalPos::new(min.0, min.1, min.2),
            max: LocalPos::new(max.0, max.1, max.2),
        }
    }

    #[test]
    fn test_word_layout() {
        let p = LocalPos::new(31, 1, 2);
        assert_eq!(p.to_word(), (31 << 10) | (1 << 5) | 2);
        assert_eq!(LocalPos::from_word(p.to_word()), p);
        assert_eq!(p.to_word() & 0x8000, 0);
    }

    #[test]
    fn test_counts() {
        let mut tile = PackedTile::new(TileKey(0), vec![0, 7], 0);
        tile.push(fill(1, (0, 0, 0), (1, 0, 1)));
        tile.push(setblock(1, 3, 0, 3));
        tile.push(setblock(1, 3, 1, 3));
        assert_eq!(tile.fill_count(), 1);
        assert_eq!(tile.setblock_count(), 2);
        assert_eq!(tile.fill_words().len(), 3);
        assert_eq!(tile.global_type(1), Some(7));
        assert_eq!(tile.prefill_type(), None);
    }

    #[test]
    fn test_replay_order_interleaves_by_y() {
        let mut tile = PackedTile::new(TileKey(0), vec![0, 1, 2], 0);
        tile.push(fill(1, (0, 0, 0), (3, 5, 3)));
        tile.push(fill(2, (0, 2, 0), (3, 2, 3)));
        tile.push(setblock(1, 5, 0, 5));
        tile.push(setblock(2, 5, 1, 5));
        tile.push(setblock(2, 5, 4, 5));

        let ys: Vec<(u8, bool)> = tile
            .replay_order()
            .map(|c| (c.base_y(), matches!(c, TileCommand::Fill { .. })))
            .collect();
        assert_eq!(ys, vec![(0, true), (0, false), (1, false), (2, true), (4, false)]);
    }

    #[test]
    fn test_from_parts_rejects_bad_words() {
        let dims = TileDims::new(4, 4, 4).unwrap();
        let parts = |fills: Vec<u16>, setblocks: Vec<u16>| {
            PackedTile::from_parts(TileKey(0), dims, vec![0, 1], fills, setblocks, 0)
        };
        // Dangling word
        assert!(parts(vec![1, 0], vec![]).is_err());
        // Void type
        let pos = LocalPos::new(0, 0, 0).to_word();
        assert!(parts(vec![], vec![0, pos]).is_err());
        // Outside a 4-wide tile
        let far = LocalPos::new(5, 0, 0).to_word();
        assert!(parts(vec![], vec![1, far]).is_err());
        // Inverted fill
        let hi = LocalPos::new(2, 2, 2).to_word();
        assert!(parts(vec![1, hi, pos], vec![]).is_err());
    }

    #[test]
    fn test_from_parts_sorts_foreign_order() {
        let dims = TileDims::default();
        let high = LocalPos::new(0, 9, 0).to_word();
        let low = LocalPos::new(0, 1, 0).to_word();
        let setblocks = vec![1, high, 1, low];
        let tile =
            PackedTile::from_parts(TileKey(0), dims, vec![0, 4], vec![], setblocks, 0).unwrap();
        let ys: Vec<u8> = tile.setblocks().map(|c| c.base_y()).collect();
        assert_eq!(ys, vec![1, 9]);
    }
}
