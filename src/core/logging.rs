//! Logger setup for the library and the command-line tool

/// Install an env_logger filtered at `info` unless RUST_LOG says otherwise.
///
/// Does nothing when a logger is already installed, so tests and embedding
/// hosts can call it freely.
pub fn init() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .try_init();
}

/// Same as [`init`] with millisecond timestamps, for command-line runs
pub fn init_with_timestamps() {
    let _ = env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"))
        .format_timestamp_millis()
        .try_init();
}
