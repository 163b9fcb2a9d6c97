//! Single-entry zip archive around the binary layout
//!
//! The entry is stored uncompressed and named after the archive's file stem,
//! so `castle.zip` holds one entry `castle`. Writes go to a temporary file in
//! the destination directory which is then renamed over the target: a failed
//! write leaves either no file or the previous one.

use std::fs::File;
use std::io::{Read, Write};
use std::path::Path;

use tempfile::NamedTempFile;
use zip::write::SimpleFileOptions;
use zip::{CompressionMethod, ZipArchive, ZipWriter};

use crate::codec::binary;
use crate::core::error::Error;
use crate::core::types::Result;
use crate::pack::Snapshot;

const FALLBACK_ENTRY: &str = "blockpack";

/// Inner entry name for an archive path
pub fn entry_name(path: &Path) -> String {
    path.file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or(FALLBACK_ENTRY)
        .to_string()
}

/// Encode and persist a snapshot to `path`
pub fn write_archive(path: impl AsRef<Path>, snapshot: &Snapshot) -> Result<()> {
    let path = path.as_ref();
    let payload = binary::encode(snapshot)?;

    let dir = match path.parent() {
        Some(p) if !p.as_os_str().is_empty() => p,
        _ => Path::new("."),
    };
    std::fs::create_dir_all(dir)?;

    let mut zip = ZipWriter::new(NamedTempFile::new_in(dir)?);
    let options = SimpleFileOptions::default().compression_method(CompressionMethod::Stored);
    zip.start_file(entry_name(path), options)?;
    zip.write_all(&payload)?;
    let temp = zip.finish()?;
    temp.as_file().sync_all()?;
    temp.persist(path).map_err(|e| Error::Io(e.error))?;

    log::info!("wrote {} ({} byte payload)", path.display(), payload.len());
    Ok(())
}

/// Read and decode a snapshot archive
pub fn read_archive(path: impl AsRef<Path>) -> Result<Snapshot> {
    let path = path.as_ref();
    let mut zip = ZipArchive::new(File::open(path)?)?;

    let expected = entry_name(path);
    let index = match zip.index_for_name(&expected) {
        Some(i) => i,
        None if zip.len() == 1 => {
            let found = zip.file_names().next().unwrap_or_default().to_string();
            log::warn!(
                "{}: entry {found:?} does not match {expected:?}, reading it anyway",
                path.display()
            );
            0
        }
        None => {
            return Err(Error::Corrupt(format!(
                "{}: {} entries and none named {expected:?}",
                path.display(),
                zip.len()
            )));
        }
    };

    let mut payload = Vec::new();
    zip.by_index(index)?.read_to_end(&mut payload)?;
    let snapshot = binary::decode(&payload)?;
    log::debug!("read {} ({} byte payload)", path.display(), payload.len());
    Ok(snapshot)
}
