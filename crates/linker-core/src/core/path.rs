/// Join path segments with `/`, the bundle's on-disk separator regardless of
/// host platform (serve paths and module ids are always `/`-delimited).
pub fn path_join(segments: &[&str]) -> String {
    segments
        .iter()
        .filter(|s| !s.is_empty())
        .cloned()
        .collect::<Vec<_>>()
        .join("/")
}

/// Split an absolute module id into its path segments, skipping the empty
/// segment produced by a leading slash (spec.md §3, ModuleTree key rule).
pub fn split_module_id(abs_module_id: &str) -> Vec<&str> {
    abs_module_id.split('/').filter(|s| !s.is_empty()).collect()
}

/// A source map `sources[]` entry is derived from a file's serve path with
/// colons replaced by a filesystem-safe substitute (spec.md §3, SourceMap).
pub fn colon_escape(serve_path: &str) -> String {
    serve_path.replace(':', "_")
}
