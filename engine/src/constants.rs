// =============================================================================
// Configuration
// =============================================================================

/// Environment variable for config file path
pub const ENV_CONFIG: &str = "FILTER_ENGINE_CONFIG";

/// Environment variable for log level/filter
pub const ENV_LOG: &str = "FILTER_ENGINE_LOG";

/// Environment variable overriding `limits.max_filters`
pub const ENV_MAX_FILTERS: &str = "FILTER_ENGINE_MAX_FILTERS";

/// Environment variable overriding `limits.max_depth`
pub const ENV_MAX_DEPTH: &str = "FILTER_ENGINE_MAX_DEPTH";

/// Environment variable overriding `limits.max_input_bytes`
pub const ENV_MAX_INPUT_BYTES: &str = "FILTER_ENGINE_MAX_INPUT_BYTES";

// =============================================================================
// Parser Limits
// =============================================================================

/// Maximum size of a delimited expression or filter document in bytes (64KB)
pub const DEFAULT_MAX_INPUT_BYTES: usize = 64 * 1024;

/// Maximum number of leaf filters in one tree
pub const DEFAULT_MAX_FILTERS: usize = 50;

/// Maximum nesting depth of filter groups
pub const DEFAULT_MAX_DEPTH: usize = 8;

// =============================================================================
// Error Reports
// =============================================================================

/// Problem type URI attached to every error report
pub const DEFAULT_PROBLEM_TYPE: &str = "https://filter-engine.dev/problems/invalid-filter";

/// Problem title attached to every error report
pub const DEFAULT_PROBLEM_TITLE: &str = "Invalid filter";

/// HTTP status analog for validation failures (Unprocessable Entity)
pub const DEFAULT_PROBLEM_STATUS: u16 = 422;
