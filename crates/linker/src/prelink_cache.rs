//! The two prelink caches (spec.md §4.E): a byte-budget LRU of fully
//! prelinked package output, and an entry-bounded LRU of dynamic-module
//! output. Both are process-global, so every access goes through a mutex
//! even though within one `fullLink` call the scheduling model is
//! cooperative (spec.md §5 "Shared resources").

use crate::combined_file::CombinedFile;
use crate::file::File;
use linker_core::core::path::colon_escape;
use linker_core::sourcemap::RawSourceMap;
use lru::LruCache;
use std::num::NonZeroUsize;
use std::sync::{Mutex, OnceLock};

pub const DEFAULT_APP_PRELINK_CACHE_BYTES: u64 = 20 * 1024 * 1024;
pub const DYNAMIC_CACHE_ENTRY_LIMIT: usize = 2048;

/// A cached fully-prelinked `{source, sourceMap}` pair.
#[derive(Debug, Clone)]
pub struct PrelinkedEntry {
    pub source: String,
    pub source_map: Option<RawSourceMap>,
}

impl PrelinkedEntry {
    fn weight(&self) -> u64 {
        let map_len = self
            .source_map
            .as_ref()
            .and_then(|m| serde_json::to_string(m).ok())
            .map(|s| s.len())
            .unwrap_or(0);
        (self.source.len() + map_len) as u64
    }
}

/// `{hash, arch, bare, servePath, options}` key for `APP_PRELINK_CACHE`
/// (spec.md §4.E).
pub fn app_cache_key(
    hash: &str,
    arch: &str,
    bare: bool,
    serve_path: &str,
    options: Option<&serde_json::Value>,
) -> String {
    serde_json::json!({
        "hash": hash,
        "arch": arch,
        "bare": bare,
        "servePath": serve_path,
        "options": options,
    })
    .to_string()
}

/// `{hash, arch, bare, servePath, dynamic}` key for
/// `DYNAMIC_PRELINKED_OUTPUT_CACHE` (spec.md §4.B, §4.E).
pub fn dynamic_cache_key(hash: &str, arch: &str, bare: bool, serve_path: &str) -> String {
    serde_json::json!({
        "hash": hash,
        "arch": arch,
        "bare": bare,
        "servePath": serve_path,
        "dynamic": true,
    })
    .to_string()
}

/// `APP_PRELINK_CACHE`: not entry-bounded, weighed to a byte budget
/// (spec.md §9 "LRU weighted by bytes").
pub struct AppPrelinkCache {
    inner: Mutex<LruCache<String, PrelinkedEntry>>,
    budget_bytes: u64,
    used_bytes: Mutex<u64>,
}

impl AppPrelinkCache {
    pub fn new(budget_bytes: u64) -> Self {
        Self {
            inner: Mutex::new(LruCache::unbounded()),
            budget_bytes,
            used_bytes: Mutex::new(0),
        }
    }

    pub fn get(&self, key: &str) -> Option<PrelinkedEntry> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: String, entry: PrelinkedEntry) {
        let weight = entry.weight();
        let mut cache = self.inner.lock().unwrap();
        let mut used = self.used_bytes.lock().unwrap();

        if let Some(old) = cache.put(key, entry) {
            *used = used.saturating_sub(old.weight());
        }
        *used += weight;

        while *used > self.budget_bytes {
            match cache.pop_lru() {
                Some((_, evicted)) => *used = used.saturating_sub(evicted.weight()),
                None => break,
            }
        }
    }

    /// Look up `file`'s fully prelinked output by its `app_cache_key`,
    /// computing and storing it on a miss (spec.md §4.E).
    pub fn get_or_compute(&self, file: &File, arch: &str) -> PrelinkedEntry {
        let key = app_cache_key(
            file.hash(),
            arch,
            file.bare(),
            file.serve_path(),
            file.install_options().map(std::convert::AsRef::as_ref),
        );
        if let Some(entry) = self.get(&key) {
            return entry;
        }
        let entry = merge_prelinked(file);
        self.put(key, entry.clone());
        entry
    }
}

/// Process-global `APP_PRELINK_CACHE` (spec.md §4.E), lazily sized from the
/// first caller's budget.
pub fn app_prelink_cache(budget_bytes: u64) -> &'static AppPrelinkCache {
    static CACHE: OnceLock<AppPrelinkCache> = OnceLock::new();
    CACHE.get_or_init(|| AppPrelinkCache::new(budget_bytes))
}

/// `DYNAMIC_PRELINKED_OUTPUT_CACHE`: entry-bounded at
/// `DYNAMIC_CACHE_ENTRY_LIMIT` (spec.md §4.B, §4.E).
pub struct DynamicPrelinkCache {
    inner: Mutex<LruCache<String, PrelinkedEntry>>,
}

impl Default for DynamicPrelinkCache {
    fn default() -> Self {
        Self {
            inner: Mutex::new(LruCache::new(
                NonZeroUsize::new(DYNAMIC_CACHE_ENTRY_LIMIT).unwrap(),
            )),
        }
    }
}

impl DynamicPrelinkCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<PrelinkedEntry> {
        self.inner.lock().unwrap().get(key).cloned()
    }

    pub fn put(&self, key: String, entry: PrelinkedEntry) {
        self.inner.lock().unwrap().put(key, entry);
    }

    /// Look up `file`'s fully prelinked dynamic-module output by its
    /// `dynamic_cache_key`, computing and storing it on a miss (spec.md
    /// §4.E).
    pub fn get_or_compute(&self, file: &File, arch: &str) -> PrelinkedEntry {
        let key = dynamic_cache_key(file.hash(), arch, file.bare(), file.serve_path());
        if let Some(entry) = self.get(&key) {
            return entry;
        }
        let entry = merge_prelinked(file);
        self.put(key, entry.clone());
        entry
    }
}

/// Process-global `DYNAMIC_PRELINKED_OUTPUT_CACHE` (spec.md §4.E).
pub fn dynamic_prelink_cache() -> &'static DynamicPrelinkCache {
    static CACHE: OnceLock<DynamicPrelinkCache> = OnceLock::new();
    CACHE.get_or_init(DynamicPrelinkCache::new)
}

/// Runs `getPrelinkedOutputFast()` and folds header/code/footer into one
/// `{source, sourceMap}` pair via `CombinedFile`, so the map is correctly
/// shifted for the banner/closure wrapper and the source name is
/// colon-escaped like any other mapped chunk (spec.md §3 SourceMap, §4.E).
fn merge_prelinked(file: &File) -> PrelinkedEntry {
    let prelinked = file.get_prelinked_output_fast();
    let mut combined = CombinedFile::new();
    combined.add_generated_code(prelinked.header);
    combined.add_code_with_map(colon_escape(file.serve_path()), prelinked.code, prelinked.map);
    combined.add_generated_code(prelinked.footer);
    let (source, source_map) = combined.finish();
    PrelinkedEntry {
        source,
        source_map: Some(source_map),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn entry(len: usize) -> PrelinkedEntry {
        PrelinkedEntry {
            source: "x".repeat(len),
            source_map: None,
        }
    }

    #[test]
    fn app_cache_evicts_oldest_once_over_budget() {
        let cache = AppPrelinkCache::new(10);
        cache.put("a".to_string(), entry(6));
        cache.put("b".to_string(), entry(6));
        assert!(cache.get("a").is_none());
        assert!(cache.get("b").is_some());
    }

    #[test]
    fn dynamic_cache_is_bounded_by_entry_count() {
        let cache = DynamicPrelinkCache::new();
        for i in 0..(DYNAMIC_CACHE_ENTRY_LIMIT + 1) {
            cache.put(format!("key{i}"), entry(1));
        }
        assert!(cache.get("key0").is_none());
        assert!(cache.get(&format!("key{DYNAMIC_CACHE_ENTRY_LIMIT}")).is_some());
    }

    #[test]
    fn keys_are_stable_for_identical_inputs() {
        let a = app_cache_key("hash", "web.browser", false, "a.js", None);
        let b = app_cache_key("hash", "web.browser", false, "a.js", None);
        assert_eq!(a, b);
    }

    fn file_with_serve_path(serve_path: &str) -> crate::file::File {
        crate::file::File::new(crate::file::InputFile {
            source: "exports.x = 1;\n".to_string(),
            content_hash: None,
            source_path: serve_path.to_string(),
            serve_path: serve_path.to_string(),
            abs_module_id: Some(format!("/{serve_path}")),
            alias_id: None,
            source_map: None,
            deps: Vec::new(),
            lazy: false,
            imported: crate::file::Imported::Static,
            main_module: false,
            bare: false,
            json_data: None,
            install_options: None,
        })
        .unwrap()
    }

    #[test]
    fn app_cache_get_or_compute_escapes_colons_in_the_source_name() {
        let cache = AppPrelinkCache::new(DEFAULT_APP_PRELINK_CACHE_BYTES);
        let file = file_with_serve_path("packages/foo:bar/baz.js");
        let entry = cache.get_or_compute(&file, "web.browser");
        let sources = entry.source_map.unwrap().sources;
        assert_eq!(sources, vec!["packages/foo_bar/baz.js".to_string()]);
    }

    #[test]
    fn app_cache_get_or_compute_reuses_a_cached_entry() {
        let cache = AppPrelinkCache::new(DEFAULT_APP_PRELINK_CACHE_BYTES);
        let file = file_with_serve_path("a.js");
        let first = cache.get_or_compute(&file, "web.browser");
        let second = cache.get_or_compute(&file, "web.browser");
        assert_eq!(first.source, second.source);
    }

    #[test]
    fn dynamic_cache_get_or_compute_produces_mergeable_output() {
        let cache = DynamicPrelinkCache::new();
        let file = file_with_serve_path("a.js");
        let entry = cache.get_or_compute(&file, "web.browser");
        assert!(entry.source.contains("exports.x = 1;"));
        assert!(entry.source_map.is_some());
    }
}
