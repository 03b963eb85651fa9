//! Top-level orchestrator, `fullLink` (spec.md §4.F).

use crate::combined_file::CombinedFile;
use crate::file::{File, InputFile};
use crate::module::Module;
use crate::module_tree::{build_module_trees, chunkify_module_trees};
use crate::prelink_cache;
use linker_core::buildmessage::{self, JobOptions};
use linker_core::core::{LinkerConfig, LinkerError, LinkerResult};
use linker_core::core::path::colon_escape;
use linker_core::sourcemap::{prepend_empty_groups, RawSourceMap};
use std::collections::HashSet;

/// A symbol imported from another package (spec.md §4.F Header "imports
/// block").
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ImportedSymbol {
    pub dotted_name: String,
    pub from_package: String,
}

#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct DepEntry {
    pub package: String,
    pub unordered: bool,
}

/// Inputs to `fullLink` (spec.md §4.F).
#[derive(serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FullLinkInput {
    pub input_files: Vec<InputFile>,
    pub is_app: bool,
    pub bundle_arch: String,
    pub combined_serve_path: String,
    pub name: Option<String>,
    pub declared_exports: Vec<String>,
    pub imports: Vec<ImportedSymbol>,
    pub include_source_map_instructions: bool,
    pub deps: Vec<DepEntry>,
}

/// One entry of the output file list (spec.md §6 "Produced to
/// collaborators").
#[derive(Debug, Clone)]
pub struct OutputFile {
    pub source: String,
    pub source_map: Option<RawSourceMap>,
    pub serve_path: String,
    pub source_path: Option<String>,
    pub dynamic: bool,
}

const SOURCE_MAP_INSTRUCTIONS_BANNER: &str = "\
//--------------------------------------------------------------------//
// This bundle ships source maps; set breakpoints in the original     //
// sources rather than in this generated file.                        //
//--------------------------------------------------------------------//
";

fn package_accessor(name: &str) -> String {
    let is_plain = name
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic())
        .unwrap_or(false)
        && name.chars().all(|c| c.is_ascii_alphanumeric());
    if is_plain {
        format!("Package.{}", name)
    } else {
        format!("Package['{}']", name)
    }
}

fn is_js_identifier(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(c) if c.is_ascii_alphabetic() || c == '_' || c == '$' => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '$')
}

fn identifier_or_quoted(name: &str) -> String {
    if is_js_identifier(name) {
        name.to_string()
    } else {
        serde_json::to_string(name).unwrap()
    }
}

enum ImportNode {
    Dir(Vec<(String, ImportNode)>),
    Leaf(String),
}

fn insert_import(root: &mut Vec<(String, ImportNode)>, segments: &[&str], value: String) {
    if segments.len() == 1 {
        root.push((segments[0].to_string(), ImportNode::Leaf(value)));
        return;
    }
    let idx = match root.iter().position(|(k, _)| k == segments[0]) {
        Some(i) => i,
        None => {
            root.push((segments[0].to_string(), ImportNode::Dir(Vec::new())));
            root.len() - 1
        }
    };
    if let ImportNode::Dir(children) = &mut root[idx].1 {
        insert_import(children, &segments[1..], value);
    }
}

fn render_import_node(node: &ImportNode) -> String {
    match node {
        ImportNode::Leaf(expr) => expr.clone(),
        ImportNode::Dir(children) => {
            let parts: Vec<String> = children
                .iter()
                .map(|(k, child)| format!("{}: {}", identifier_or_quoted(k), render_import_node(child)))
                .collect();
            format!("{{{}}}", parts.join(", "))
        }
    }
}

/// Builds the nested `{Foo: {bar: "Package.x.Foo.bar"}}` symbol tree and
/// renders one `var K = { … };` per root key, omitting `var` for app
/// bundles (spec.md §4.F Header).
fn build_imports_block(imports: &[ImportedSymbol], is_app: bool) -> String {
    let mut roots: Vec<(String, ImportNode)> = Vec::new();
    for imp in imports {
        let segments: Vec<&str> = imp.dotted_name.split('.').collect();
        let value = format!("{}.{}", package_accessor(&imp.from_package), imp.dotted_name);
        insert_import(&mut roots, &segments, value);
    }

    let mut out = String::new();
    for (key, node) in &roots {
        if is_app {
            out.push_str(&format!("{} = {};\n", key, render_import_node(node)));
        } else {
            out.push_str(&format!("var {} = {};\n", key, render_import_node(node)));
        }
    }
    out
}

fn build_export_tree(declared_exports: &[String]) -> String {
    let parts: Vec<String> = declared_exports
        .iter()
        .map(|name| format!("{}: {}", identifier_or_quoted(name), name))
        .collect();
    format!("{{{}}}", parts.join(", "))
}

fn build_header(
    name: &Option<String>,
    deps: &[DepEntry],
    imports: &[ImportedSymbol],
    is_app: bool,
    has_runtime: bool,
    package_scope_vars: &[String],
) -> String {
    if !has_runtime {
        return "(function() {\n\n".to_string();
    }

    let dep_names: Vec<String> = deps
        .iter()
        .map(|d| serde_json::to_string(&d.package).unwrap())
        .collect();

    let mut out = format!(
        "Package[\"core-runtime\"].queue(\"{}\", [{}], function () {{\n",
        name.clone().unwrap_or_default(),
        dep_names.join(", ")
    );
    out.push_str(&build_imports_block(imports, is_app));

    if !package_scope_vars.is_empty() {
        out.push_str(&format!("var {};\n", package_scope_vars.join(", ")));
    }
    out
}

fn build_footer(
    declared_exports: &[String],
    has_runtime: bool,
    has_modules: bool,
    main_module_path: &Option<String>,
    eager_module_paths: &[String],
) -> String {
    if !has_runtime {
        return "\n})();\n".to_string();
    }

    let mut parts = Vec::new();
    if !declared_exports.is_empty() {
        parts.push(format!(
            "export: function () {{ return {}; }}",
            build_export_tree(declared_exports)
        ));
    }
    if has_modules {
        parts.push("require: require".to_string());
    }
    if !eager_module_paths.is_empty() {
        let list = eager_module_paths
            .iter()
            .map(|p| serde_json::to_string(p).unwrap())
            .collect::<Vec<_>>()
            .join(", ");
        parts.push(format!("eagerModulePaths: [{}]", list));
    }
    if let Some(main) = main_module_path {
        parts.push(format!("mainModulePath: {}", serde_json::to_string(main).unwrap()));
    }

    format!("\nreturn {{ {} }};\n}});\n", parts.join(", "))
}

/// `assertInJob` plus the full six-step pipeline described in spec.md §4.F.
pub async fn full_link(input: FullLinkInput) -> LinkerResult<Vec<OutputFile>> {
    buildmessage::assert_in_job()?;

    let FullLinkInput {
        input_files,
        is_app,
        bundle_arch,
        combined_serve_path,
        name,
        declared_exports,
        imports,
        include_source_map_instructions,
        deps,
    } = input;

    let mut files = Vec::with_capacity(input_files.len());
    for input_file in input_files {
        files.push(File::new(input_file)?);
    }
    let has_modules = files.iter().any(|f| f.install_options().is_some());

    let module = Module::new(files, name.clone(), bundle_arch, combined_serve_path);

    let mut combined = CombinedFile::new();
    let mut dynamic_files: Vec<OutputFile> = Vec::new();

    if has_modules {
        let builder = build_module_trees(&module);
        chunkify_module_trees(&mut combined, &builder, &module)?;
        collect_dynamic_outputs(&module, &mut dynamic_files);
        append_bare_files(&mut combined, &module);
    } else {
        append_non_lazy_files(&mut combined, &module);
    }

    let main_module_path = module
        .files()
        .iter()
        .find(|f| f.main_module())
        .and_then(|f| f.abs_module_id().map(str::to_string));
    let eager_module_paths: Vec<String> = module
        .files()
        .iter()
        .filter(|f| !f.lazy() && !f.bare())
        .filter_map(|f| f.abs_module_id().map(str::to_string))
        .collect();

    let has_runtime = deps.iter().any(|d| !d.unordered);
    if !has_runtime
        && (!declared_exports.is_empty() || main_module_path.is_some() || !eager_module_paths.is_empty())
    {
        return Err(LinkerError::RuntimeRequired);
    }

    let mut package_vars: HashSet<String> = HashSet::new();
    if !is_app {
        let (vars, job_failed): (HashSet<String>, bool) = buildmessage::enter_job(
            JobOptions::titled("analyzing package-scope globals"),
            || async {
                let mut vars = HashSet::new();
                for index in 0..module.files().len() {
                    if !module.is_used(index) {
                        continue;
                    }
                    let file = &module.files()[index];
                    if file.bare() {
                        continue;
                    }
                    if let Ok(globals) = file.compute_assigned_variables() {
                        vars.extend(globals);
                    }
                }
                let job_failed = buildmessage::job_has_messages();
                (vars, job_failed)
            },
        )
        .await;

        if job_failed {
            return Ok(Vec::new());
        }
        package_vars = vars;
    }

    let imported_roots: HashSet<String> = imports
        .iter()
        .filter_map(|i| i.dotted_name.split('.').next().map(str::to_string))
        .collect();

    let mut package_scope_vars: Vec<String> = declared_exports
        .iter()
        .cloned()
        .chain(package_vars.into_iter())
        .filter(|v| !imported_roots.contains(v))
        .collect::<HashSet<_>>()
        .into_iter()
        .collect();
    package_scope_vars.sort();

    let any_files_used = (0..module.files().len()).any(|i| module.is_used(i));
    let pruned_imports: Vec<ImportedSymbol> = if any_files_used {
        imports
    } else {
        let declared: HashSet<&str> = declared_exports.iter().map(String::as_str).collect();
        imports
            .into_iter()
            .filter(|i| declared.contains(i.dotted_name.as_str()))
            .collect()
    };

    let (main_source, main_map) = combined.finish();

    let header = build_header(
        &name,
        &deps,
        &pruned_imports,
        is_app,
        has_runtime,
        &package_scope_vars,
    );
    let footer = build_footer(
        &declared_exports,
        has_runtime,
        has_modules,
        &main_module_path,
        &eager_module_paths,
    );

    let mut wrapped_source = String::new();
    if include_source_map_instructions {
        wrapped_source.push_str(SOURCE_MAP_INSTRUCTIONS_BANNER);
    }
    wrapped_source.push_str(&header);
    wrapped_source.push_str(&main_source);
    wrapped_source.push_str(&footer);

    let header_lines = header.matches('\n').count() as u32
        + if include_source_map_instructions {
            SOURCE_MAP_INSTRUCTIONS_BANNER.matches('\n').count() as u32
        } else {
            0
        };
    let wrapped_map = RawSourceMap {
        mappings: prepend_empty_groups(&main_map.mappings, header_lines),
        ..main_map
    };

    let mut outputs = vec![OutputFile {
        source: wrapped_source,
        source_map: Some(wrapped_map),
        serve_path: module.combined_serve_path().to_string(),
        source_path: None,
        dynamic: false,
    }];
    outputs.extend(dynamic_files);

    Ok(outputs)
}

fn append_bare_files(combined: &mut CombinedFile, module: &Module) {
    let config = LinkerConfig::from_env();
    let cache = prelink_cache::app_prelink_cache(config.app_prelink_cache_bytes);
    let mut first = true;
    for file in module.files() {
        if !file.bare() {
            continue;
        }
        if !first {
            combined.add_empty_lines(1);
        }
        first = false;
        let entry = cache.get_or_compute(file, module.bundle_arch());
        combined.add_code_with_map(colon_escape(file.serve_path()), entry.source, entry.source_map);
    }
}

fn append_non_lazy_files(combined: &mut CombinedFile, module: &Module) {
    let config = LinkerConfig::from_env();
    let cache = prelink_cache::app_prelink_cache(config.app_prelink_cache_bytes);
    let mut first = true;
    for (index, file) in module.files().iter().enumerate() {
        if file.lazy() {
            continue;
        }
        if !first {
            combined.add_empty_lines(6);
        }
        first = false;
        module.mark_used(index);
        let entry = cache.get_or_compute(file, module.bundle_arch());
        combined.add_code_with_map(colon_escape(file.serve_path()), entry.source, entry.source_map);
    }
}

fn collect_dynamic_outputs(module: &Module, dynamic_files: &mut Vec<OutputFile>) {
    let cache = prelink_cache::dynamic_prelink_cache();
    for (index, file) in module.files().iter().enumerate() {
        if !module.is_used(index) || !file.is_dynamic() {
            continue;
        }
        let entry = cache.get_or_compute(file, module.bundle_arch());
        let serve_path = format!("dynamic/{}", file.abs_module_id().unwrap_or(file.serve_path()));
        dynamic_files.push(OutputFile {
            source: entry.source,
            source_map: entry.source_map,
            serve_path,
            source_path: Some(file.source_path().to_string()),
            dynamic: true,
        });
    }
}
