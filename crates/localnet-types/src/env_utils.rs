//! Environment variable parsing utilities.
//!
//! Type-safe helpers for reading environment variables with defaults,
//! replacing the repeated `std::env::var(..).ok().and_then(..)` pattern.
//!
//! # Example
//!
//! ```
//! use localnet_sandbox_types::env_utils::{env_bool, env_var_or};
//!
//! let timeout: u64 = env_var_or("LOCALNET_TIMEOUT_MS", 5000);
//! let debug = env_bool("LOCALNET_DEBUG");
//! ```

use std::str::FromStr;

/// Parse an environment variable into a type that implements `FromStr`.
///
/// Returns `None` if the variable is not set or cannot be parsed.
pub fn env_var<T: FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}

/// Parse an environment variable with a default value.
pub fn env_var_or<T: FromStr>(key: &str, default: T) -> T {
    env_var(key).unwrap_or(default)
}

/// Check if an environment variable is set to a truthy value.
///
/// Returns `true` if the variable is set to "1", "true", "yes", or "on" (case-insensitive).
pub fn env_bool(key: &str) -> bool {
    std::env::var(key)
        .ok()
        .map(|v| matches!(v.to_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(false)
}

/// Check whether an environment variable is present at all, whatever its value.
///
/// CI systems export indicator variables such as `CI` with differing values
/// (`true`, `1`, a provider name), so presence is the only reliable signal.
pub fn env_flag_set(key: &str) -> bool {
    std::env::var_os(key).is_some()
}
