//! `InputFile`/`File` (spec.md §3, §4.B): the external descriptor handed to
//! the linker, and the linker's own hashed, validated view of it.

use linker_core::buildmessage::{self, ErrorOptions};
use linker_core::core::hash;
use linker_core::core::{LinkerError, LinkerResult};
use linker_core::sourcemap::{original_position_for, RawSourceMap};
use linker_core::staticanalysis::{self, ParseFailure};
use std::cell::RefCell;
use std::collections::HashSet;
use std::sync::Arc;

/// Opaque per-file install-options object. Grouped by pointer identity, not
/// structural equality (spec.md §9 "Structural sharing of install-options").
pub type InstallOptions = Arc<serde_json::Value>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Imported {
    No,
    Static,
    Dynamic,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DepInfo {
    pub dynamic: bool,
}

/// Immutable descriptor supplied to the linker (spec.md §3 InputFile). `deps`
/// is an ordered list, not a map: bundle determinism (spec.md §8 property 7)
/// depends on iterating dependencies in the order the compiler reported
/// them, and a hash map would not preserve that.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InputFile {
    pub source: String,
    pub content_hash: Option<String>,
    pub source_path: String,
    pub serve_path: String,
    pub abs_module_id: Option<String>,
    pub alias_id: Option<String>,
    pub source_map: Option<RawSourceMap>,
    pub deps: Vec<(String, DepInfo)>,
    pub lazy: bool,
    pub imported: Imported,
    pub main_module: bool,
    pub bare: bool,
    pub json_data: Option<serde_json::Value>,
    pub install_options: Option<InstallOptions>,
}

impl InputFile {
    fn validate(&self) -> LinkerResult<()> {
        if self.bare && (self.lazy || self.install_options.is_some()) {
            return Err(LinkerError::InvalidInputFile(format!(
                "{}: bare file must not be lazy or carry install options",
                self.serve_path
            )));
        }

        let unused = self.lazy && self.imported == Imported::No;
        if self.abs_module_id.is_none() && !self.bare && !unused {
            return Err(LinkerError::InvalidInputFile(format!(
                "{}: a file with no absolute module id must be bare or unused",
                self.serve_path
            )));
        }

        Ok(())
    }
}

/// The linker's hashed, validated view of one `InputFile` (spec.md §3/§4.B
/// File). `source` is a `RefCell` because `compute_assigned_variables`
/// recovers from a parse failure by zeroing it in place, and every other
/// reader (prelinking) must see that recovery.
pub struct File {
    input: InputFile,
    hash: String,
    static_dep_ids: Vec<String>,
    source: RefCell<String>,
}

/// `getPrelinkedOutputFast()`'s result (spec.md §4.B).
#[derive(Debug, Clone)]
pub struct PrelinkedOutput {
    pub header: String,
    pub code: String,
    pub map: Option<RawSourceMap>,
    pub footer: String,
}

const HEADER_PARAM_CANDIDATES: [&str; 5] =
    ["require", "exports", "module", "__filename", "__dirname"];

fn header_params(source: &str) -> String {
    let mut max_index = 0;
    for (i, name) in HEADER_PARAM_CANDIDATES.iter().enumerate() {
        if source.contains(name) {
            max_index = i + 1;
        }
    }
    HEADER_PARAM_CANDIDATES[..max_index].join(", ")
}

fn banner(serve_path: &str, bare: bool) -> String {
    let mut body = vec![serve_path.to_string()];
    if bare {
        body.push("bare mode: concatenated as-is, not wrapped in a closure".to_string());
    }
    let width = body.iter().map(|l| l.len()).max().unwrap_or(0) + 6;
    let border = format!("//{}", "-".repeat(width.saturating_sub(2)));

    let mut out = String::new();
    out.push_str(&border);
    out.push('\n');
    for line in &body {
        out.push_str("// ");
        out.push_str(line);
        out.push('\n');
    }
    out.push_str(&border);
    out.push('\n');
    out
}

impl File {
    pub fn new(input: InputFile) -> LinkerResult<Self> {
        input.validate()?;

        let hash = input
            .content_hash
            .clone()
            .unwrap_or_else(|| hash::sha1(&input.source));

        let static_dep_ids = input
            .deps
            .iter()
            .filter(|(_, info)| !info.dynamic)
            .map(|(id, _)| id.clone())
            .collect();

        let source = RefCell::new(input.source.clone());

        Ok(Self {
            input,
            hash,
            static_dep_ids,
            source,
        })
    }

    pub fn hash(&self) -> &str {
        &self.hash
    }

    pub fn serve_path(&self) -> &str {
        &self.input.serve_path
    }

    pub fn source_path(&self) -> &str {
        &self.input.source_path
    }

    pub fn abs_module_id(&self) -> Option<&str> {
        self.input.abs_module_id.as_deref()
    }

    pub fn alias_id(&self) -> Option<&str> {
        self.input.alias_id.as_deref()
    }

    pub fn lazy(&self) -> bool {
        self.input.lazy
    }

    pub fn imported(&self) -> Imported {
        self.input.imported
    }

    pub fn bare(&self) -> bool {
        self.input.bare
    }

    pub fn main_module(&self) -> bool {
        self.input.main_module
    }

    pub fn json_data(&self) -> Option<&serde_json::Value> {
        self.input.json_data.as_ref()
    }

    pub fn install_options(&self) -> Option<&InstallOptions> {
        self.input.install_options.as_ref()
    }

    /// `File.isDynamic() ⇔ lazy ∧ imported = "dynamic"` (spec.md §3, §8
    /// property 2).
    pub fn is_dynamic(&self) -> bool {
        self.input.lazy && self.input.imported == Imported::Dynamic
    }

    /// Non-dynamic dependency ids, in the order the compiler reported them.
    pub fn static_deps(&self) -> &[String] {
        &self.static_dep_ids
    }

    /// Every dependency id regardless of its `dynamic` flag, used for the
    /// dependency-list stub a dynamic file contributes to its tree leaf
    /// (spec.md §4.D, S3).
    pub fn all_dep_ids(&self) -> Vec<String> {
        self.input.deps.iter().map(|(id, _)| id.clone()).collect()
    }

    /// `computeAssignedVariables()` (spec.md §4.B). On a parse failure,
    /// reports it to the current job (mapping the position through the
    /// file's own source map when present) and recovers by zeroing the
    /// visible source, returning an empty set either way.
    pub fn compute_assigned_variables(&self) -> LinkerResult<HashSet<String>> {
        let snapshot = self.source.borrow().clone();
        match staticanalysis::find_assigned_globals(&snapshot, &self.hash) {
            Ok(globals) => Ok(globals),
            Err(failure) => {
                let (file, line, column) = self.map_parse_failure(&failure);
                buildmessage::error(
                    failure.message.clone(),
                    ErrorOptions {
                        file: Some(file),
                        line: Some(line),
                        column: Some(column),
                        ..Default::default()
                    },
                )?;
                *self.source.borrow_mut() = String::new();
                Ok(HashSet::new())
            }
        }
    }

    fn map_parse_failure(&self, failure: &ParseFailure) -> (String, u32, u32) {
        if let Some(map) = &self.input.source_map {
            if let Ok(json) = serde_json::to_string(map) {
                if let Ok(Some(pos)) = original_position_for(&json, failure.line, failure.column) {
                    return (
                        pos.source.unwrap_or_else(|| self.input.serve_path.clone()),
                        pos.line,
                        pos.column,
                    );
                }
            }
        }
        (self.input.serve_path.clone(), failure.line, failure.column)
    }

    /// `getPrelinkedOutputFast()` (spec.md §4.B).
    pub fn get_prelinked_output_fast(&self) -> PrelinkedOutput {
        let mut code = self.source.borrow().clone();
        if !code.ends_with('\n') {
            code.push('\n');
        }

        let mut header = banner(&self.input.serve_path, self.input.bare);

        let footer = if self.input.bare {
            String::new()
        } else if self.input.install_options.is_some() {
            header.push_str(&format!("function ({}) {{\n", header_params(&code)));
            "}".to_string()
        } else {
            header.push_str("(function(){\n");
            "}).call(this);\n".to_string()
        };

        PrelinkedOutput {
            header,
            code,
            map: self.input.source_map.clone(),
            footer,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn input(source: &str) -> InputFile {
        InputFile {
            source: source.to_string(),
            content_hash: None,
            source_path: "a.js".to_string(),
            serve_path: "a.js".to_string(),
            abs_module_id: Some("/a.js".to_string()),
            alias_id: None,
            source_map: None,
            deps: Vec::new(),
            lazy: false,
            imported: Imported::Static,
            main_module: false,
            bare: false,
            json_data: None,
            install_options: None,
        }
    }

    #[test]
    fn bare_file_with_install_options_is_rejected() {
        let mut file = input("x");
        file.bare = true;
        file.install_options = Some(Arc::new(serde_json::json!({})));
        assert!(File::new(file).is_err());
    }

    #[test]
    fn moduleless_file_needs_bare_or_unused() {
        let mut file = input("x");
        file.abs_module_id = None;
        assert!(File::new(file).is_err());

        file.bare = false;
        file.lazy = true;
        file.imported = Imported::No;
        assert!(File::new(file).is_ok());
    }

    #[test]
    fn is_dynamic_requires_lazy_and_dynamic_import() {
        let mut file = input("x");
        file.lazy = true;
        file.imported = Imported::Dynamic;
        let file = File::new(file).unwrap();
        assert!(file.is_dynamic());
    }

    #[test]
    fn prelinked_output_without_install_options_is_an_iife() {
        let file = File::new(input("exports.x = 1;")).unwrap();
        let output = file.get_prelinked_output_fast();
        assert!(output.header.contains("(function(){"));
        assert_eq!(output.footer, "}).call(this);\n");
        assert!(output.code.ends_with('\n'));
    }

    #[test]
    fn prelinked_output_with_install_options_picks_up_module_params() {
        let mut file = input("exports.x = require('./b');");
        file.install_options = Some(Arc::new(serde_json::json!({})));
        let file = File::new(file).unwrap();
        let output = file.get_prelinked_output_fast();
        assert!(output.header.contains("function (require, exports)"));
        assert_eq!(output.footer, "}");
    }

    #[test]
    fn bare_file_has_no_closure_wrapper() {
        let mut file = input("print('hi');");
        file.bare = true;
        let file = File::new(file).unwrap();
        let output = file.get_prelinked_output_fast();
        assert!(!output.header.contains("function"));
        assert_eq!(output.footer, "");
    }
}
