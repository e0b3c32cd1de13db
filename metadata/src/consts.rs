//! Distinguished constants shared across the front-end.

/// Name of the distinguished database in which user and database
/// administration statements are legal.
pub const SYSTEM_DB_NAME: &str = "system";

/// Default maximum number of rows per fragment for newly created tables.
pub const DEFAULT_FRAGMENT_SIZE: i64 = 8_000_000;

/// Default page size in bytes for fragment storage.
pub const DEFAULT_PAGE_SIZE: i64 = 1_048_576;

/// File name of the on-disk catalog snapshot.
pub const METADATA_FILE_NAME: &str = "catalog.json";
