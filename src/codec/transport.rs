//! Text-safe transport encoding

use base64::Engine;
use base64::engine::general_purpose::STANDARD;

use crate::codec::binary;
use crate::core::types::Result;
use crate::pack::Snapshot;

/// Encode a snapshot as standard base64
pub fn export_string(snapshot: &Snapshot) -> Result<String> {
    Ok(STANDARD.encode(binary::encode(snapshot)?))
}

/// Decode a snapshot from standard base64; surrounding whitespace is ignored
pub fn import_string(text: &str) -> Result<Snapshot> {
    let bytes = STANDARD.decode(text.trim())?;
    binary::decode(&bytes)
}
