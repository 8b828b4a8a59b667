use serde::Deserialize;
use tracing::warn;

#[cfg(feature = "toml-config")]
use crate::error::CacheError;

/// Environment variable bounding the number of cached script classes.
/// `unbounded` disables the bound.
pub const MAX_ENTRIES_VAR: &str = "SCRIPTCACHE_MAX_ENTRIES";

/// Bound used when nothing is configured. Cached classes keep their loader
/// chain alive, so the process-wide cache never grows without limit by default.
pub const DEFAULT_MAX_ENTRIES: usize = 512;

const UNBOUNDED: &str = "unbounded";

/// Settings for the process-wide cache.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    /// Upper bound on stored entries; `None` keeps everything.
    pub max_entries: Option<usize>,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            max_entries: Some(DEFAULT_MAX_ENTRIES),
        }
    }
}

impl CacheConfig {
    pub fn from_env() -> Self {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();
        if let Some(value) = lookup(MAX_ENTRIES_VAR) {
            if value.trim().eq_ignore_ascii_case(UNBOUNDED) {
                config.max_entries = None;
                return config;
            }
            match value.trim().parse::<usize>() {
                Ok(max_entries) => config.max_entries = Some(max_entries),
                Err(err) => warn!(%value, "ignoring invalid {MAX_ENTRIES_VAR}: {err}"),
            }
        }
        config
    }

    #[cfg(feature = "toml-config")]
    pub fn from_toml_str(input: &str) -> Result<Self, CacheError> {
        Ok(toml::from_str(input)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unset_uses_default_bound() {
        let config = CacheConfig::from_lookup(|_| None);
        assert_eq!(config.max_entries, Some(DEFAULT_MAX_ENTRIES));
    }

    #[test]
    fn bound_can_be_lifted() {
        let config = CacheConfig::from_lookup(|_| Some("Unbounded".to_string()));
        assert_eq!(config.max_entries, None);
    }

    #[test]
    fn reads_max_entries() {
        let config = CacheConfig::from_lookup(|name| {
            (name == MAX_ENTRIES_VAR).then(|| " 128 ".to_string())
        });
        assert_eq!(config.max_entries, Some(128));
    }

    #[test]
    fn invalid_max_entries_is_ignored() {
        let config = CacheConfig::from_lookup(|_| Some("lots".to_string()));
        assert_eq!(config.max_entries, Some(DEFAULT_MAX_ENTRIES));
    }

    #[cfg(feature = "toml-config")]
    #[test]
    fn parses_toml() {
        let config = CacheConfig::from_toml_str("max_entries = 4\n").expect("valid config");
        assert_eq!(config.max_entries, Some(4));
        assert_eq!(
            CacheConfig::from_toml_str("").expect("empty config"),
            CacheConfig::default()
        );
    }
}
