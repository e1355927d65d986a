//! Environment variable loading utilities
//!
//! Every override is read as `<PREFIX>_<SUFFIX>`; values that are missing or fail
//! to parse fall back to the supplied default rather than aborting startup.

use std::env;
use std::path::PathBuf;
use std::str::FromStr;

/// Builder for loading multiple environment variables with consistent prefix
#[derive(Debug, Clone)]
pub struct EnvLoader {
    prefix: String,
}

impl EnvLoader {
    /// Create a new environment loader with the given prefix
    pub fn new(prefix: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
        }
    }

    fn key(&self, suffix: &str) -> String {
        format!("{}_{}", self.prefix, suffix)
    }

    /// Load a string value with default
    pub fn load_string(&self, suffix: &str, default: &str) -> String {
        env::var(self.key(suffix)).unwrap_or_else(|_| default.to_string())
    }

    /// Load a parsed value with default
    pub fn load_parsed<T>(&self, suffix: &str, default: T) -> T
    where
        T: FromStr,
    {
        self.load_optional(suffix).unwrap_or(default)
    }

    /// Load an optional value
    pub fn load_optional<T>(&self, suffix: &str) -> Option<T>
    where
        T: FromStr,
    {
        env::var(self.key(suffix)).ok().and_then(|v| v.trim().parse().ok())
    }

    /// Load a path value with default
    pub fn load_path(&self, suffix: &str, default: &PathBuf) -> PathBuf {
        env::var_os(self.key(suffix))
            .filter(|v| !v.is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| default.clone())
    }

    /// Load a value, keeping the default when the parsed value fails validation
    pub fn load_validated<T, F>(&self, suffix: &str, default: T, validator: F) -> T
    where
        T: FromStr + Clone,
        F: Fn(&T) -> bool,
    {
        match self.load_optional::<T>(suffix) {
            Some(value) if validator(&value) => value,
            Some(_) => {
                tracing::warn!(
                    "Ignoring out-of-range value for {}; keeping default",
                    self.key(suffix)
                );
                default
            }
            None => default,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    #[serial]
    fn test_env_loader_string_and_parsed() {
        let loader = EnvLoader::new("ISSUEFLOW_TEST");

        env::remove_var("ISSUEFLOW_TEST_QUERY");
        assert_eq!(loader.load_string("QUERY", "project = X"), "project = X");

        env::set_var("ISSUEFLOW_TEST_QUERY", "project = Y");
        assert_eq!(loader.load_string("QUERY", "project = X"), "project = Y");

        env::set_var("ISSUEFLOW_TEST_PAGE_SIZE", " 50 ");
        assert_eq!(loader.load_parsed::<usize>("PAGE_SIZE", 100), 50);

        env::set_var("ISSUEFLOW_TEST_PAGE_SIZE", "lots");
        assert_eq!(loader.load_parsed::<usize>("PAGE_SIZE", 100), 100);

        env::remove_var("ISSUEFLOW_TEST_QUERY");
        env::remove_var("ISSUEFLOW_TEST_PAGE_SIZE");
    }

    #[test]
    #[serial]
    fn test_env_loader_optional_and_path() {
        let loader = EnvLoader::new("ISSUEFLOW_TEST");

        env::remove_var("ISSUEFLOW_TEST_BUDGET");
        assert_eq!(loader.load_optional::<u32>("BUDGET"), None);
        env::set_var("ISSUEFLOW_TEST_BUDGET", "250");
        assert_eq!(loader.load_optional::<u32>("BUDGET"), Some(250));

        let default = PathBuf::from(".issueflow");
        env::set_var("ISSUEFLOW_TEST_DATA_DIR", "");
        assert_eq!(loader.load_path("DATA_DIR", &default), default);
        env::set_var("ISSUEFLOW_TEST_DATA_DIR", "/var/lib/issueflow");
        assert_eq!(
            loader.load_path("DATA_DIR", &default),
            PathBuf::from("/var/lib/issueflow")
        );

        env::remove_var("ISSUEFLOW_TEST_BUDGET");
        env::remove_var("ISSUEFLOW_TEST_DATA_DIR");
    }

    #[test]
    #[serial]
    fn test_env_loader_validated() {
        let loader = EnvLoader::new("ISSUEFLOW_TEST");
        let validator = |v: &u32| *v >= 1 && *v <= 24;

        env::remove_var("ISSUEFLOW_TEST_HOUR");
        assert_eq!(loader.load_validated("HOUR", 9u32, validator), 9);

        env::set_var("ISSUEFLOW_TEST_HOUR", "8");
        assert_eq!(loader.load_validated("HOUR", 9u32, validator), 8);

        env::set_var("ISSUEFLOW_TEST_HOUR", "30");
        assert_eq!(loader.load_validated("HOUR", 9u32, validator), 9);

        env::remove_var("ISSUEFLOW_TEST_HOUR");
    }
}
