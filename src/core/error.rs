//! Error types for the block packer

use thiserror::Error;

/// Main error type for the crate
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid tile dimensions {x}x{y}x{z}: axes must be 1..=32, volume at most 32767")]
    InvalidTileDims { x: u32, y: u32, z: u32 },

    #[error("invalid build volume: {0}")]
    InvalidBuildVolume(String),

    #[error("coordinate ({x}, {y}, {z}) is outside the build volume")]
    OutOfBuildVolume { x: i32, y: i32, z: i32 },

    #[error("transformed coordinate ({x}, {y}, {z}) does not fit in 32 bits")]
    CoordinateOverflow { x: i64, y: i64, z: i64 },

    /// A direct tile write missed the tile. The accumulator routes writes,
    /// so this indicates a routing bug rather than bad input.
    #[error("local coordinate ({x}, {y}, {z}) is outside the tile")]
    OutsideTile { x: i32, y: i32, z: i32 },

    #[error("symbol table exhausted: more than {limit} ids in use")]
    SymbolsExhausted { limit: u32 },

    #[error("symbol id {0} cannot be released")]
    InvalidRelease(u32),

    #[error("bad magic {found:?}, expected {expected:?}")]
    BadMagic { expected: [u8; 4], found: [u8; 4] },

    #[error("unsupported format version {found}, this build reads major version {supported}")]
    UnsupportedVersion { found: String, supported: u16 },

    #[error("stream truncated: needed {needed} bytes at offset {offset}")]
    Truncated { needed: usize, offset: usize },

    #[error("corrupt stream: {0}")]
    Corrupt(String),

    #[error("scan of {requested} voxels exceeds the limit of {limit}")]
    ScanLimitExceeded { requested: u64, limit: u64 },

    #[error("unknown {kind} handle {handle}")]
    UnknownHandle { kind: &'static str, handle: u32 },

    /// Internal invariant violation (packing or routing bug).
    #[error("internal error: {0}")]
    Internal(String),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("archive error: {0}")]
    Archive(#[from] zip::result::ZipError),

    #[error("transport decode error: {0}")]
    Transport(#[from] base64::DecodeError),

    #[error("config error: {0}")]
    Config(#[from] serde_json::Error),
}
