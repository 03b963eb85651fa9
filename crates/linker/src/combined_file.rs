//! `CombinedFile` (spec.md §4.C): the incremental chunk builder that
//! concatenates generated text and composes a single output source map,
//! using whichever of the two documented strategies its chunk count calls
//! for.

use linker_core::sourcemap::{prepend_empty_groups, RawSourceMap, SourceMapBuilder};

enum Chunk {
    Generated(String),
    Mapped {
        source_name: String,
        code: String,
        map: Option<RawSourceMap>,
        line_offset: u32,
        line_count: u32,
    },
}

/// Mutable chunk list plus a running line offset (spec.md §3 CombinedFile).
#[derive(Default)]
pub struct CombinedFile {
    chunks: Vec<Chunk>,
    line_offset: u32,
}

impl CombinedFile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn line_offset(&self) -> u32 {
        self.line_offset
    }

    /// `addEmptyLines(n)`.
    pub fn add_empty_lines(&mut self, n: u32) {
        if n == 0 {
            return;
        }
        self.chunks.push(Chunk::Generated("\n".repeat(n as usize)));
        self.line_offset += n;
    }

    /// `addGeneratedCode(text)`.
    pub fn add_generated_code(&mut self, text: impl Into<String>) {
        let text = text.into();
        let newlines = text.matches('\n').count() as u32;
        self.chunks.push(Chunk::Generated(text));
        self.line_offset += newlines;
    }

    /// `addCodeWithMap(sourceName, code, map?)`.
    pub fn add_code_with_map(
        &mut self,
        source_name: impl Into<String>,
        code: impl Into<String>,
        map: Option<RawSourceMap>,
    ) {
        let code = code.into();
        let newlines = code.matches('\n').count() as u32;
        let offset = self.line_offset;
        self.chunks.push(Chunk::Mapped {
            source_name: source_name.into(),
            code,
            map,
            line_offset: offset,
            line_count: newlines.max(1),
        });
        self.line_offset += newlines;
    }

    fn render_source(&self) -> String {
        let mut out = String::new();
        for chunk in &self.chunks {
            match chunk {
                Chunk::Generated(text) => out.push_str(text),
                Chunk::Mapped { code, .. } => out.push_str(code),
            }
        }
        out
    }

    fn mapped_chunk_count(&self) -> usize {
        self.chunks
            .iter()
            .filter(|c| matches!(c, Chunk::Mapped { .. }))
            .count()
    }

    /// Finalise into `{source, sourceMap}`. Picks the biased strategy for
    /// zero or one mapped chunk, the VLQ composition strategy for two or
    /// more (spec.md §4.C, §9 "Two source-map strategies").
    pub fn finish(&self) -> (String, RawSourceMap) {
        let source = self.render_source();
        if self.mapped_chunk_count() <= 1 {
            (source, self.finish_biased())
        } else {
            (source, self.finish_vlq())
        }
    }

    fn finish_biased(&self) -> RawSourceMap {
        let only_mapped = self.chunks.iter().find_map(|c| match c {
            Chunk::Mapped {
                source_name,
                map,
                line_offset,
                line_count,
                ..
            } => Some((source_name, map, *line_offset, *line_count)),
            Chunk::Generated(_) => None,
        });

        match only_mapped {
            Some((_, Some(map), line_offset, _)) => RawSourceMap {
                mappings: prepend_empty_groups(&map.mappings, line_offset),
                ..map.clone()
            },
            Some((source_name, None, line_offset, line_count)) => {
                let mut builder = SourceMapBuilder::new();
                builder.add_empty_map(source_name, line_count, line_offset);
                builder.to_raw_map()
            }
            None => RawSourceMap::empty(),
        }
    }

    fn finish_vlq(&self) -> RawSourceMap {
        let mut builder = SourceMapBuilder::new();
        for chunk in &self.chunks {
            if let Chunk::Mapped {
                source_name,
                map,
                line_offset,
                line_count,
                ..
            } = chunk
            {
                match map {
                    Some(raw) => {
                        if let Ok(json) = serde_json::to_string(raw) {
                            let _ = builder.add_vlq_map(&json, *line_offset, None);
                        }
                    }
                    None => builder.add_empty_map(source_name, *line_count, *line_offset),
                }
            }
        }
        builder.to_raw_map()
    }
}
