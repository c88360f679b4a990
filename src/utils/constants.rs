//! Shared constants and invariants

/// Subtracted from the issuer-reported lifetime before storing.
pub const DEFAULT_SAFETY_MARGIN_SECS: u64 = 300;
/// Used when the issuer does not report `expires_in` (60 days).
pub const DEFAULT_TTL_SECS: u64 = 5_184_000;
pub const DEFAULT_HTTP_TIMEOUT_MS: u64 = 5000;
pub const DEFAULT_GRANT_TYPE: &str = "client_credentials";
pub const DEFAULT_SQLITE_MAX_CONNECTIONS: u32 = 5;
pub const SQLITE_BUSY_TIMEOUT_MS: u64 = 5000;

// Labels
pub const RESULT_HIT: &str = "hit";
pub const RESULT_MISS: &str = "miss";
pub const OUTCOME_WRITTEN: &str = "written";
pub const OUTCOME_SKIPPED: &str = "skipped";
