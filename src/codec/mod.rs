//! Snapshot persistence: binary layout, zip archive and base64 transport

pub mod binary;
pub mod archive;
pub mod transport;

pub use archive::{read_archive, write_archive};
pub use binary::{decode, encode, FormatVersion, MAGIC};
pub use transport::{export_string, import_string};
