//! Environment variable helpers
//!
//! Helper functions for reading environment variables with fallback to
//! deprecated variable names with warning logs.

/// Get an environment variable with fallback to a deprecated name
///
/// If the new variable name is set, returns its value.
/// If only the old (deprecated) variable name is set, returns its value
/// and logs a deprecation warning.
///
/// # Example
/// ```
/// use shardlb_common::env::get_env_with_fallback;
///
/// let port = get_env_with_fallback("SHARDLB_PORT", "PORT");
/// ```
pub fn get_env_with_fallback(new_name: &str, old_name: &str) -> Option<String> {
    if let Ok(val) = std::env::var(new_name) {
        return Some(val);
    }
    if let Ok(val) = std::env::var(old_name) {
        if old_name != new_name {
            tracing::warn!(
                "Environment variable '{}' is deprecated, use '{}' instead",
                old_name,
                new_name
            );
        }
        return Some(val);
    }
    None
}

/// Get an environment variable with fallback and default value
pub fn get_env_with_fallback_or(new_name: &str, old_name: &str, default: &str) -> String {
    get_env_with_fallback(new_name, old_name).unwrap_or_else(|| default.to_string())
}

/// Get an environment variable with fallback, parsing to a specific type
///
/// Returns `default` if neither variable is set or parsing fails.
pub fn get_env_with_fallback_parse<T: std::str::FromStr>(
    new_name: &str,
    old_name: &str,
    default: T,
) -> T {
    match get_env_with_fallback(new_name, old_name) {
        Some(raw) => match raw.trim().parse() {
            Ok(value) => value,
            Err(_) => {
                tracing::warn!(
                    variable = new_name,
                    value = %raw,
                    "Failed to parse environment variable, using default"
                );
                default
            }
        },
        None => default,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_get_env_with_fallback_new_name() {
        std::env::set_var("SHARDLB_TEST_NEW_VAR", "new_value");
        std::env::remove_var("SHARDLB_TEST_OLD_VAR");

        let result = get_env_with_fallback("SHARDLB_TEST_NEW_VAR", "SHARDLB_TEST_OLD_VAR");
        assert_eq!(result, Some("new_value".to_string()));

        std::env::remove_var("SHARDLB_TEST_NEW_VAR");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_old_name() {
        std::env::remove_var("SHARDLB_TEST_NEW_VAR2");
        std::env::set_var("SHARDLB_TEST_OLD_VAR2", "old_value");

        let result = get_env_with_fallback("SHARDLB_TEST_NEW_VAR2", "SHARDLB_TEST_OLD_VAR2");
        assert_eq!(result, Some("old_value".to_string()));

        std::env::remove_var("SHARDLB_TEST_OLD_VAR2");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_neither() {
        std::env::remove_var("SHARDLB_TEST_NEW_VAR3");
        std::env::remove_var("SHARDLB_TEST_OLD_VAR3");

        let result = get_env_with_fallback("SHARDLB_TEST_NEW_VAR3", "SHARDLB_TEST_OLD_VAR3");
        assert_eq!(result, None);
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_new_takes_precedence() {
        std::env::set_var("SHARDLB_TEST_NEW_VAR4", "new_value");
        std::env::set_var("SHARDLB_TEST_OLD_VAR4", "old_value");

        let result = get_env_with_fallback("SHARDLB_TEST_NEW_VAR4", "SHARDLB_TEST_OLD_VAR4");
        assert_eq!(result, Some("new_value".to_string()));

        std::env::remove_var("SHARDLB_TEST_NEW_VAR4");
        std::env::remove_var("SHARDLB_TEST_OLD_VAR4");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_or_default() {
        std::env::remove_var("SHARDLB_TEST_NEW_VAR5");
        std::env::remove_var("SHARDLB_TEST_OLD_VAR5");

        let result =
            get_env_with_fallback_or("SHARDLB_TEST_NEW_VAR5", "SHARDLB_TEST_OLD_VAR5", "fallback");
        assert_eq!(result, "fallback");
    }

    #[test]
    #[serial]
    fn test_get_env_with_fallback_parse_invalid_uses_default() {
        std::env::set_var("SHARDLB_TEST_NEW_VAR6", "not-a-number");

        let result: f64 =
            get_env_with_fallback_parse("SHARDLB_TEST_NEW_VAR6", "SHARDLB_TEST_OLD_VAR6", 0.5);
        assert_eq!(result, 0.5);

        std::env::set_var("SHARDLB_TEST_NEW_VAR6", " 0.25 ");
        let result: f64 =
            get_env_with_fallback_parse("SHARDLB_TEST_NEW_VAR6", "SHARDLB_TEST_OLD_VAR6", 0.5);
        assert_eq!(result, 0.25);

        std::env::remove_var("SHARDLB_TEST_NEW_VAR6");
    }
}
