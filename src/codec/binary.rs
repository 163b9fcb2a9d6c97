//! Versioned big-endian snapshot layout
//!
//! ```text
//! magic      b"BLKP"
//! version    u32  (major << 16) | (minor << 8) | patch
//! tile dims  3 x u8
//! volume     6 x i32  (min xyz, max xyz)
//! bounds     u8 flag, 6 x i32  (zero when the flag is 0)
//! comments   u32 count, then (str key, str value) pairs
//! symbols    u32 count, then str per global ID, void and gaps empty
//! tiles      u32 count, then per tile:
//!              u64 key, u16 prefill local type,
//!              u32 count + u32 global ID per local type,
//!              u32 count + u16 fill words,
//!              u32 count + u16 setblock words
//! str        u32 byte length + UTF-8
//! ```

use std::collections::{BTreeMap, HashSet};
use std::fmt;

use crate::core::error::Error;
use crate::core::types::{IVec3, Result};
use crate::math::BlockBox;
use crate::pack::{PackedTile, Snapshot, VOID_ID};
use crate::tile::{BuildVolume, TileDims, TileGrid, TileKey};

/// Leading bytes of every encoded snapshot
pub const MAGIC: [u8; 4] = *b"BLKP";

/// Layout revision
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub struct FormatVersion {
    pub major: u16,
    pub minor: u8,
    pub patch: u8,
}

impl FormatVersion {
    /// The version this build writes
    pub const CURRENT: FormatVersion = FormatVersion { major: 1, minor: 0, patch: 0 };

    pub fn to_u32(self) -> u32 {
        ((self.major as u32) << 16) | ((self.minor as u32) << 8) | self.patch as u32
    }

    pub fn from_u32(v: u32) -> Self {
        Self {
            major: (v >> 16) as u16,
            minor: (v >> 8) as u8,
            patch: v as u8,
        }
    }
}

impl fmt::Display for FormatVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}

/// Serialize a snapshot
pub fn encode(snapshot: &Snapshot) -> Result<Vec<u8>> {
    let mut w = ByteWriter::default();
    w.bytes(&MAGIC);
    w.u32(FormatVersion::CURRENT.to_u32());

    let grid = snapshot.grid();
    for axis in <[u32; 3]>::from(grid.dims()) {
        w.u8(axis as u8);
    }
    w.ivec3(grid.volume().min);
    w.ivec3(grid.volume().max);

    match snapshot.bounds() {
        Some(b) => {
            w.u8(1);
            w.ivec3(b.min);
            w.ivec3(b.max);
        }
        None => {
            w.u8(0);
            w.ivec3(IVec3::ZERO);
            w.ivec3(IVec3::ZERO);
        }
    }

    w.prefix(snapshot.comments().len())?;
    for (key, value) in snapshot.comments() {
        w.str(key)?;
        w.str(value)?;
    }

    w.prefix(snapshot.symbols().len())?;
    for symbol in snapshot.symbols() {
        w.str(symbol)?;
    }

    let stats = snapshot.stats();
    w.prefix(stats.tiles)?;
    for tile in snapshot.tiles() {
        w.u64(tile.key().0);
        w.u16(tile.prefill_type().unwrap_or(VOID_ID as u16));
        w.prefix(tile.local_types().len())?;
        for &global in tile.local_types() {
            w.u32(global);
        }
        w.words(tile.fill_words())?;
        w.words(tile.setblock_words())?;
    }

    log::debug!(
        "encoded {} tiles ({} fills, {} setblocks) into {} bytes",
        stats.tiles,
        stats.fills,
        stats.setblocks,
        w.buf.len()
    );
    Ok(w.buf)
}

/// Parse a snapshot, validating magic and major version before anything else
pub fn decode(data: &[u8]) -> Result<Snapshot> {
    let mut r = ByteReader::new(data);

    let magic: [u8; 4] = r.array()?;
    if magic != MAGIC {
        return Err(Error::BadMagic { expected: MAGIC, found: magic });
    }
    let version = FormatVersion::from_u32(r.u32()?);
    if version.major != FormatVersion::CURRENT.major {
        return Err(Error::UnsupportedVersion {
            found: version.to_string(),
            supported: FormatVersion::CURRENT.major,
        });
    }

    let [dx, dy, dz]: [u8; 3] = r.array()?;
    let dims = TileDims::new(dx as u32, dy as u32, dz as u32).map_err(corrupt)?;
    let volume = BuildVolume::new(r.ivec3()?, r.ivec3()?).map_err(corrupt)?;
    let grid = TileGrid::new(dims, volume).map_err(corrupt)?;

    let has_bounds = r.u8()?;
    let (bmin, bmax) = (r.ivec3()?, r.ivec3()?);
    let bounds = match has_bounds {
        0 => None,
        1 if bmin.cmple(bmax).all() => Some(BlockBox { min: bmin, max: bmax }),
        1 => return Err(Error::Corrupt(format!("inverted bounds {bmin}..{bmax}"))),
        flag => return Err(Error::Corrupt(format!("bounds flag {flag}"))),
    };

    let mut comments = BTreeMap::new();
    for _ in 0..r.count(8)? {
        let key = r.str()?;
        let value = r.str()?;
        comments.insert(key, value);
    }

    let symbol_count = r.count(4)?;
    let mut symbols = Vec::with_capacity(symbol_count);
    let mut seen = HashSet::new();
    for id in 0..symbol_count {
        let symbol = r.str()?;
        if !symbol.is_empty() && !seen.insert(symbol.clone()) {
            return Err(Error::Corrupt(format!("symbol {symbol:?} appears twice (id {id})")));
        }
        symbols.push(symbol);
    }
    if symbols.first().is_none_or(|s| !s.is_empty()) {
        return Err(Error::Corrupt("symbol 0 must be the empty void symbol".to_string()));
    }

    let mut tiles = BTreeMap::new();
    for _ in 0..r.count(22)? {
        let key = TileKey(r.u64()?);
        if !grid.contains_key(key) {
            return Err(Error::Corrupt(format!("tile {:#x} lies outside the build volume", key.0)));
        }
        let prefill = r.u16()?;
        let local_types = (0..r.count(4)?).map(|_| r.u32()).collect::<Result<Vec<_>>>()?;
        let fills = r.words()?;
        let setblocks = r.words()?;
        let tile = PackedTile::from_parts(key, dims, local_types, fills, setblocks, prefill)?;
        if tiles.insert(key, tile).is_some() {
            return Err(Error::Corrupt(format!("tile {:#x} appears twice", key.0)));
        }
    }

    if r.remaining() > 0 {
        if version.minor > FormatVersion::CURRENT.minor {
            log::debug!("ignoring {} trailing bytes from format {version}", r.remaining());
        } else {
            return Err(Error::Corrupt(format!("{} trailing bytes", r.remaining())));
        }
    }

    Snapshot::from_parts(grid, bounds, symbols, tiles, comments)
}

fn corrupt(e: Error) -> Error {
    Error::Corrupt(e.to_string())
}

#[derive(Default)]
struct ByteWriter {
    buf: Vec<u8>,
}

impl ByteWriter {
    fn bytes(&mut self, b: &[u8]) {
        self.buf.extend_from_slice(b);
    }

    fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    fn u16(&mut self, v: u16) {
        self.bytes(&v.to_be_bytes());
    }

    fn u32(&mut self, v: u32) {
        self.bytes(&v.to_be_bytes());
    }

    fn u64(&mut self, v: u64) {
        self.bytes(&v.to_be_bytes());
    }

    fn ivec3(&mut self, v: IVec3) {
        for c in v.to_array() {
            self.bytes(&c.to_be_bytes());
        }
    }

    fn prefix(&mut self, n: usize) -> Result<()> {
        let n = u32::try_from(n)
            .map_err(|_| Error::Internal(format!("length {n} does not fit a u32 prefix")))?;
        self.u32(n);
        Ok(())
    }

    fn str(&mut self, s: &str) -> Result<()> {
        self.prefix(s.len())?;
        self.bytes(s.as_bytes());
        Ok(())
    }

    fn words(&mut self, words: &[u16]) -> Result<()> {
        self.prefix(words.len())?;
        for &w in words {
            self.u16(w);
        }
        Ok(())
    }
}

struct ByteReader<'a> {
    data: &'a [u8],
    offset: usize,
}

impl<'a> ByteReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self { data, offset: 0 }
    }

    fn remaining(&self) -> usize {
        self.data.len() - self.offset
    }

    fn take(&mut self, n: usize) -> Result<&'a [u8]> {
        if self.remaining() < n {
            return Err(Error::Truncated { needed: n, offset: self.offset });
        }
        let slice = &self.data[self.offset..self.offset + n];
        self.offset += n;
        Ok(slice)
    }

    fn array<const N: usize>(&mut self) -> Result<[u8; N]> {
        let mut out = [0u8; N];
        out.copy_from_slice(self.take(N)?);
        Ok(out)
    }

    fn u8(&mut self) -> Result<u8> {
        Ok(self.array::<1>()?[0])
    }

    fn u16(&mut self) -> Result<u16> {
        Ok(u16::from_be_bytes(self.array()?))
    }

    fn u32(&mut self) -> Result<u32> {
        Ok(u32::from_be_bytes(self.array()?))
    }

    fn u64(&mut self) -> Result<u64> {
        Ok(u64::from_be_bytes(self.array()?))
    }

    fn i32(&mut self) -> Result<i32> {
        Ok(i32::from_be_bytes(self.array()?))
    }

    fn ivec3(&mut self) -> Result<IVec3> {
        Ok(IVec3::new(self.i32()?, self.i32()?, self.i32()?))
    }

    /// Element count whose payload, at `min_size` bytes each, must still fit.
    /// Stops a corrupt count from driving a huge allocation.
    fn count(&mut self, min_size: usize) -> Result<usize> {
        let n = self.u32()? as usize;
        let needed = n.saturating_mul(min_size);
        if needed > self.remaining() {
            return Err(Error::Truncated { needed, offset: self.offset });
        }
        Ok(n)
    }

    fn str(&mut self) -> Result<String> {
        let n = self.count(1)?;
        let bytes = self.take(n)?;
        let start = self.offset - n;
        String::from_utf8(bytes.to_vec())
            .map_err(|e| Error::Corrupt(format!("invalid UTF-8 at offset {start}: {e}")))
    }

    fn words(&mut self) -> Result<Vec<u16>> {
        (0..self.count(2)?).map(|_| self.u16()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::pack::{Accumulator, BlockCommand, PrefillMode};
    use crate::math::Transform;

    fn sample() -> Snapshot {
        let mut acc = Accumulator::new();
        acc.fill(IVec3::new(-20, -64, -20), IVec3::new(20, -60, 20), "stone").unwrap();
        acc.fill(IVec3::new(-2, -59, -2), IVec3::new(2, -50, 2), "oak_log").unwrap();
        acc.setblock(IVec3::new(0, -49, 0), "torch").unwrap();
        acc.comments_mut().insert("name".to_string(), "pillar".to_string());
        acc.pack([("author".to_string(), "builder".to_string())]).unwrap()
    }

    fn commands(snapshot: &Snapshot) -> Vec<BlockCommand> {
        let mut out = Vec::new();
        snapshot.replay(&Transform::IDENTITY, &mut out).unwrap();
        out
    }

    #[test]
    fn test_encode_decode_preserves_snapshot() {
        let snapshot = sample();
        let decoded = decode(&encode(&snapshot).unwrap()).unwrap();
        assert_eq!(decoded, snapshot);
        assert_eq!(commands(&decoded), commands(&snapshot));
        assert_eq!(decoded.comments().len(), 2);
    }

    #[test]
    fn test_prefill_survives_encoding() {
        let mut acc = Accumulator::with_grid(TileGrid::default(), PrefillMode::MostFrequent);
        acc.fill(IVec3::ZERO, IVec3::new(15, 15, 15), "stone").unwrap();
        acc.setblock(IVec3::new(3, 3, 3), "diamond_ore").unwrap();
        let snapshot = acc.pack([]).unwrap();
        let tile = snapshot.tiles().next().unwrap();
        assert!(tile.prefill_type().is_some());
        assert_eq!(snapshot.stats().setblocks, 1);
        assert_eq!(decode(&encode(&snapshot).unwrap()).unwrap(), snapshot);
    }

    #[test]
    fn test_empty_snapshot_layout() {
        let bytes = encode(&Snapshot::empty(TileGrid::default())).unwrap();
        assert_eq!(&bytes[0..4], b"BLKP");
        assert_eq!(&bytes[4..8], &[0, 1, 0, 0]);
        assert_eq!(&bytes[8..11], &[16, 16, 16]);
        // magic, version, dims, volume, bounds, comments, one empty symbol, tiles
        assert_eq!(bytes.len(), 4 + 4 + 3 + 24 + 25 + 4 + 8 + 4);
    }

    #[test]
    fn test_command_words_are_big_endian() {
        let mut acc = Accumulator::new();
        acc.setblock(IVec3::new(1, 2, 3), "stone").unwrap();
        let bytes = encode(&acc.pack([]).unwrap()).unwrap();
        // Trailing setblock: local type 1, position word 1 << 10 | 2 << 5 | 3.
        assert_eq!(&bytes[bytes.len() - 4..], &[0x00, 0x01, 0x04, 0x43]);
    }

    #[test]
    fn test_bad_magic() {
        let mut bytes = encode(&sample()).unwrap();
        bytes[0] = b'X';
        assert!(matches!(decode(&bytes), Err(Error::BadMagic { found, .. }) if &found == b"XLKP"));
    }

    #[test]
    fn test_unsupported_major_version() {
        let mut bytes = encode(&sample()).unwrap();
        let version = FormatVersion { major: 2, minor: 0, patch: 0 };
        bytes[4..8].copy_from_slice(&version.to_u32().to_be_bytes());
        match decode(&bytes) {
            Err(Error::UnsupportedVersion { found, supported }) => {
                assert_eq!(found, "2.0.0");
                assert_eq!(supported, 1);
            }
            other => panic!("expected version error, got {other:?}"),
        }
    }

    #[test]
    fn test_newer_minor_may_append_data() {
        let snapshot = sample();
        let mut bytes = encode(&snapshot).unwrap();
        let version = FormatVersion { major: 1, minor: 3, patch: 7 };
        bytes[4..8].copy_from_slice(&version.to_u32().to_be_bytes());
        bytes.extend_from_slice(b"future extension");
        assert_eq!(decode(&bytes).unwrap(), snapshot);
    }

    #[test]
    fn test_trailing_data_at_current_version_is_corrupt() {
        let mut bytes = encode(&sample()).unwrap();
        bytes.push(0);
        assert!(matches!(decode(&bytes), Err(Error::Corrupt(_))));
    }

    #[test]
    fn test_every_truncation_fails_cleanly() {
        let bytes = encode(&sample()).unwrap();
        for n in 0..bytes.len() {
            assert!(decode(&bytes[..n]).is_err(), "prefix of {n} bytes decoded");
        }
    }

    #[test]
    fn test_huge_count_is_rejected_without_allocating() {
        let mut bytes = encode(&Snapshot::empty(TileGrid::default())).unwrap();
        let n = bytes.len();
        bytes[n - 4..].copy_from_slice(&u32::MAX.to_be_bytes());
        assert!(matches!(decode(&bytes), Err(Error::Truncated { .. })));
    }

    #[test]
    fn test_command_outside_tile_is_corrupt() {
        let mut acc = Accumulator::with_grid(
            TileGrid::new(TileDims::new(4, 4, 4).unwrap(), BuildVolume::default()).unwrap(),
            PrefillMode::Off,
        );
        acc.setblock(IVec3::new(1, 1, 1), "stone").unwrap();
        let mut bytes = encode(&acc.pack([]).unwrap()).unwrap();
        let n = bytes.len();
        // Move the setblock to local x = 20 in a 4-wide tile.
        bytes[n - 2..].copy_from_slice(&((20u16 << 10) | (1 << 5) | 1).to_be_bytes());
        assert!(matches!(decode(&bytes), Err(Error::Corrupt(_))));
    }
}
