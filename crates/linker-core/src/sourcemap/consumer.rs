use crate::core::error::{LinkerError, LinkerResult};
use sourcemap::SourceMap as UpstreamSourceMap;

/// A position resolved back through an upstream source map.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OriginalPosition {
    pub source: Option<String>,
    pub line: u32,
    pub column: u32,
}

/// Decode `map_json` and look up the original position for a generated
/// `(line, column)` (spec.md §6 `SourceMapConsumer`). Used to translate a
/// static-analysis parse error's reported position back through a file's
/// own upstream map before attaching it to a diagnostic message.
pub fn original_position_for(
    map_json: &str,
    line: u32,
    column: u32,
) -> LinkerResult<Option<OriginalPosition>> {
    let sm = UpstreamSourceMap::from_slice(map_json.as_bytes())
        .map_err(|e| LinkerError::SourceMap(e.to_string()))?;
    Ok(sm.lookup_token(line, column).map(|token| OriginalPosition {
        source: token.get_source().map(|s| s.to_string()),
        line: token.get_src_line(),
        column: token.get_src_col(),
    }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn malformed_map_reports_source_map_error() {
        let err = original_position_for("not json", 0, 0).unwrap_err();
        assert!(matches!(err, LinkerError::SourceMap(_)));
    }

    #[test]
    fn valid_map_with_no_token_at_position_returns_none() {
        let map = r#"{"version":3,"sources":["a.js"],"names":[],"mappings":""}"#;
        let result = original_position_for(map, 0, 0).unwrap();
        assert!(result.is_none());
    }
}
