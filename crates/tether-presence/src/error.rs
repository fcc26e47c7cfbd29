//! Error types for presence lookups.

/// Errors from the destination directory or the tracker.
///
/// None of these are fatal to a session: the tracker logs directory
/// failures and keeps its fallback table.
#[derive(Debug, thiserror::Error)]
pub enum PresenceError {
    /// The directory service couldn't be reached or refused the query.
    #[error("destination directory unavailable: {0}")]
    Directory(String),

    /// A static table failed to parse.
    #[error("invalid destination table: {0}")]
    Parse(#[from] serde_json::Error),

    /// The destination isn't in the directory.
    #[error("unknown destination {0:?}")]
    UnknownDestination(String),
}
