//! Source-map composition (spec.md §4.C, §6, §9). Two collaborators:
//! [`consumer`] decodes an upstream map for position lookups, [`builder`]
//! composes a fresh map from many chunks, and [`vlq`] is the shared
//! base64-VLQ codec both rely on.

pub mod builder;
pub mod consumer;
pub mod vlq;

use serde::{Deserialize, Serialize};

pub use builder::{prepend_empty_groups, SourceMapBuilder};
pub use consumer::{original_position_for, OriginalPosition};

/// Standard version-3 source map (spec.md §3 SourceMap).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RawSourceMap {
    pub version: u8,
    pub sources: Vec<String>,
    #[serde(rename = "sourcesContent", skip_serializing_if = "Option::is_none")]
    pub sources_content: Option<Vec<String>>,
    pub names: Vec<String>,
    pub mappings: String,
}

impl RawSourceMap {
    /// An empty version-3 map with no sources, names, or mappings, spanning
    /// nothing (spec.md S1 "map present with no mappings").
    pub fn empty() -> Self {
        Self {
            version: 3,
            sources: Vec::new(),
            sources_content: None,
            names: Vec::new(),
            mappings: String::new(),
        }
    }
}
