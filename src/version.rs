// Build-time identity reported by GET /version

/// Daemon version (from Cargo.toml).
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Daemon name (from Cargo.toml).
pub const NAME: &str = env!("CARGO_PKG_NAME");

/// Prefix every pup container carries.
pub const CONTAINER_PREFIX: &str = "pup-";
