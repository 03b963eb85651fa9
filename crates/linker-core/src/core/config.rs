use std::env;

const DEFAULT_PRELINK_CACHE_BYTES: u64 = 20 * 1024 * 1024;

/// Environment read once at process start (spec.md §6), rather than scattered
/// `std::env::var` calls through the core logic, so tests can construct a
/// `LinkerConfig` directly instead of mutating process environment.
#[derive(Debug, Clone)]
pub struct LinkerConfig {
    /// `LINKER_DEBUG_BUILD` — emit nested start/done debug lines around every
    /// `capture`/`enter_job`, independent of the `tracing` filter.
    pub debug_build: bool,
    /// `LINKER_APP_PRELINK_CACHE_SIZE` — byte budget for the app prelink cache.
    pub app_prelink_cache_bytes: u64,
    /// `LINKER_LEGACY` — if set to anything other than `"new"`, `full_link`
    /// fails fast with `LinkerError::LegacyLinkerUnsupported` (spec.md §9's
    /// open question resolved: no legacy path is implemented here).
    pub legacy: Option<String>,
    /// `LINKER_ENABLE_CLIENT_TOP_LEVEL_AWAIT` — read and threaded onto
    /// `LinkerOptions`, but otherwise inert: the behaviour it would gate
    /// lives in the static-analysis collaborator's parser configuration,
    /// not in this repository.
    pub enable_client_top_level_await: bool,
}

impl LinkerConfig {
    pub fn from_env() -> Self {
        Self {
            debug_build: non_empty_env("LINKER_DEBUG_BUILD"),
            app_prelink_cache_bytes: env::var("LINKER_APP_PRELINK_CACHE_SIZE")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(DEFAULT_PRELINK_CACHE_BYTES),
            legacy: env::var("LINKER_LEGACY").ok(),
            enable_client_top_level_await: non_empty_env("LINKER_ENABLE_CLIENT_TOP_LEVEL_AWAIT"),
        }
    }

    /// `true` iff the legacy flag is set and not equal to `"new"`.
    pub fn requires_legacy_linker(&self) -> bool {
        matches!(&self.legacy, Some(v) if v != "new")
    }
}

impl Default for LinkerConfig {
    fn default() -> Self {
        Self {
            debug_build: false,
            app_prelink_cache_bytes: DEFAULT_PRELINK_CACHE_BYTES,
            legacy: None,
            enable_client_top_level_await: false,
        }
    }
}

fn non_empty_env(key: &str) -> bool {
    env::var(key).map(|v| !v.is_empty()).unwrap_or(false)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_uses_20_mib_budget() {
        let config = LinkerConfig::default();
        assert_eq!(config.app_prelink_cache_bytes, 20 * 1024 * 1024);
        assert!(!config.requires_legacy_linker());
    }

    #[test]
    fn legacy_new_is_not_legacy() {
        let config = LinkerConfig {
            legacy: Some("new".to_string()),
            ..LinkerConfig::default()
        };
        assert!(!config.requires_legacy_linker());
    }

    #[test]
    fn legacy_other_value_requires_legacy_linker() {
        let config = LinkerConfig {
            legacy: Some("old".to_string()),
            ..LinkerConfig::default()
        };
        assert!(config.requires_legacy_linker());
    }
}
