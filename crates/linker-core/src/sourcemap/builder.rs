use super::vlq;
use super::RawSourceMap;
use crate::core::error::{LinkerError, LinkerResult};
use sourcemap::SourceMap as UpstreamSourceMap;

#[derive(Debug, Clone)]
struct Segment {
    generated_line: u32,
    generated_column: u32,
    source: Option<String>,
    source_content: Option<String>,
    original_line: Option<u32>,
    original_column: Option<u32>,
    name: Option<String>,
}

/// Allocator for a composed source map (spec.md §6 `SourceMap()`). Accepts
/// either an upstream map folded in at an offset, or a synthesized
/// straight-line map for a chunk with no map of its own, and serialises the
/// accumulated segments into a single version-3 `RawSourceMap`.
#[derive(Default)]
pub struct SourceMapBuilder {
    segments: Vec<Segment>,
}

impl SourceMapBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fold every token of an upstream map into this builder, shifting each
    /// token's generated line down by `offset` (spec.md §4.C VLQ strategy
    /// "fold its map at its offset").
    pub fn add_vlq_map(
        &mut self,
        map_json: &str,
        offset: u32,
        source_content: Option<&str>,
    ) -> LinkerResult<()> {
        let sm = UpstreamSourceMap::from_slice(map_json.as_bytes())
            .map_err(|e| LinkerError::SourceMap(e.to_string()))?;
        for token in sm.tokens() {
            self.segments.push(Segment {
                generated_line: token.get_dst_line() + offset,
                generated_column: token.get_dst_col(),
                source: token.get_source().map(|s| s.to_string()),
                source_content: source_content.map(|s| s.to_string()),
                original_line: Some(token.get_src_line()),
                original_column: Some(token.get_src_col()),
                name: token.get_name().map(|s| s.to_string()),
            });
        }
        Ok(())
    }

    /// Synthesize an identity mapping for `line_count` generated lines
    /// starting at `offset`, each attributed to the matching original line
    /// of `name` (spec.md §4.C "synthesise an empty map that spans the
    /// chunk").
    pub fn add_empty_map(&mut self, name: &str, line_count: u32, offset: u32) {
        for i in 0..line_count {
            self.segments.push(Segment {
                generated_line: offset + i,
                generated_column: 0,
                source: Some(name.to_string()),
                source_content: None,
                original_line: Some(i),
                original_column: Some(0),
                name: None,
            });
        }
    }

    /// Serialise accumulated segments into a version-3 map. Segments are
    /// grouped by generated line and sorted by generated column; `sources`/
    /// `names` tables are built in first-use order.
    pub fn to_raw_map(&self) -> RawSourceMap {
        let mut sources: Vec<String> = Vec::new();
        let mut sources_content: Vec<Option<String>> = Vec::new();
        let mut names: Vec<String> = Vec::new();

        let max_line = self
            .segments
            .iter()
            .map(|s| s.generated_line)
            .max()
            .map(|m| m as usize + 1)
            .unwrap_or(0);
        let mut by_line: Vec<Vec<&Segment>> = vec![Vec::new(); max_line];
        for seg in &self.segments {
            by_line[seg.generated_line as usize].push(seg);
        }
        for line in &mut by_line {
            line.sort_by_key(|s| s.generated_column);
        }

        let mut prev_source_idx: i64 = 0;
        let mut prev_src_line: i64 = 0;
        let mut prev_src_col: i64 = 0;
        let mut prev_name_idx: i64 = 0;

        let mut lines_out = Vec::with_capacity(by_line.len());
        for line_segments in &by_line {
            let mut prev_gen_col: i64 = 0;
            let mut group = String::new();
            let mut first = true;

            for seg in line_segments {
                let source_idx = seg.source.as_ref().map(|s| match sources.iter().position(|e| e == s) {
                    Some(i) => i as i64,
                    None => {
                        sources.push(s.clone());
                        sources_content.push(seg.source_content.clone());
                        (sources.len() - 1) as i64
                    }
                });
                let name_idx = seg.name.as_ref().map(|n| match names.iter().position(|e| e == n) {
                    Some(i) => i as i64,
                    None => {
                        names.push(n.clone());
                        (names.len() - 1) as i64
                    }
                });

                let mut fields = vec![seg.generated_column as i64 - prev_gen_col];
                prev_gen_col = seg.generated_column as i64;

                if let Some(src_idx) = source_idx {
                    fields.push(src_idx - prev_source_idx);
                    prev_source_idx = src_idx;

                    let line_val = seg.original_line.unwrap_or(0) as i64;
                    fields.push(line_val - prev_src_line);
                    prev_src_line = line_val;

                    let col_val = seg.original_column.unwrap_or(0) as i64;
                    fields.push(col_val - prev_src_col);
                    prev_src_col = col_val;

                    if let Some(n_idx) = name_idx {
                        fields.push(n_idx - prev_name_idx);
                        prev_name_idx = n_idx;
                    }
                }

                if !first {
                    group.push(',');
                }
                first = false;
                group.push_str(&vlq::encode_group(&fields));
            }
            lines_out.push(group);
        }

        let any_content = sources_content.iter().any(|c| c.is_some());
        RawSourceMap {
            version: 3,
            sources,
            sources_content: any_content
                .then(|| sources_content.into_iter().map(|c| c.unwrap_or_default()).collect()),
            names,
            mappings: lines_out.join(";"),
        }
    }
}

/// Prepend `count` empty mapping groups to `mappings` (spec.md §4.C biased
/// strategy: `";".repeat(count) + originalMappings`), shifting every
/// generated-line position down by `count` without re-tokenising the VLQ.
pub fn prepend_empty_groups(mappings: &str, count: u32) -> String {
    let mut out = ";".repeat(count as usize);
    out.push_str(mappings);
    out
}
