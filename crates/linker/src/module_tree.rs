//! Module tree builder (spec.md §4.D): groups a module's files by
//! install-options identity, classifies each as alias/dynamic/static, and
//! chunkifies the resulting trees into a `meteorInstall(...)` call per
//! group.

use crate::combined_file::CombinedFile;
use crate::file::InstallOptions;
use crate::module::Module;
use crate::prelink_cache::{self, AppPrelinkCache};
use linker_core::core::path::{colon_escape, split_module_id};
use linker_core::core::{LinkerConfig, LinkerResult};
use std::sync::Arc;

/// One node of a module tree (spec.md §3 ModuleTree). `FalseLeaf` is part of
/// the node-kind vocabulary the spec documents but is never constructed by
/// this builder: resolving a `browser` override down to a literal `false`
/// belongs to the package compiler that supplies `InputFile.jsonData`, not
/// to the linker's own insertion rules (spec.md §4.D only specifies
/// alias/dynamic/static insertion).
pub enum TreeNode {
    Dir(Vec<(String, TreeNode)>),
    FileLeaf(usize),
    DynamicLeaf {
        deps: Vec<String>,
        stub: Option<serde_json::Value>,
    },
    AliasLeaf(String),
    FalseLeaf,
}

impl TreeNode {
    fn new_dir() -> Self {
        TreeNode::Dir(Vec::new())
    }

    fn has_dynamic_leaf(&self) -> bool {
        match self {
            TreeNode::DynamicLeaf { .. } => true,
            TreeNode::Dir(children) => children.iter().any(|(_, c)| c.has_dynamic_leaf()),
            _ => false,
        }
    }
}

/// One install-options group's tree, keyed by the options object's pointer
/// identity (spec.md §9 "Structural sharing of install-options").
pub struct TreeGroup {
    pub options: Option<InstallOptions>,
    pub root: TreeNode,
}

#[derive(Default)]
pub struct ModuleTreeBuilder {
    groups: Vec<TreeGroup>,
}

impl ModuleTreeBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn groups(&self) -> &[TreeGroup] {
        &self.groups
    }

    fn group_index(&mut self, options: Option<&InstallOptions>) -> usize {
        let found = self.groups.iter().position(|g| match (&g.options, options) {
            (Some(a), Some(b)) => Arc::ptr_eq(a, b),
            (None, None) => true,
            _ => false,
        });
        match found {
            Some(i) => i,
            None => {
                self.groups.push(TreeGroup {
                    options: options.cloned(),
                    root: TreeNode::new_dir(),
                });
                self.groups.len() - 1
            }
        }
    }
}

fn child_index(children: &[(String, TreeNode)], segment: &str) -> Option<usize> {
    children.iter().position(|(k, _)| k == segment)
}

fn insert_leaf(root: &mut TreeNode, path: &[&str], leaf: TreeNode) {
    let TreeNode::Dir(children) = root else {
        return;
    };
    if path.len() == 1 {
        match child_index(children, path[0]) {
            Some(i) => children[i].1 = leaf,
            None => children.push((path[0].to_string(), leaf)),
        }
        return;
    }
    let idx = match child_index(children, path[0]) {
        Some(i) => i,
        None => {
            children.push((path[0].to_string(), TreeNode::new_dir()));
            children.len() - 1
        }
    };
    insert_leaf(&mut children[idx].1, &path[1..], leaf);
}

fn package_json_stub(json: &serde_json::Value) -> Option<serde_json::Value> {
    let mut stub = serde_json::Map::new();
    for key in ["browser", "module", "main"] {
        if let Some(value) = json.get(key) {
            if value.is_string() || value.is_object() {
                stub.insert(key.to_string(), value.clone());
            }
        }
    }
    if stub.is_empty() {
        None
    } else {
        Some(serde_json::Value::Object(stub))
    }
}

/// `_buildModuleTrees` (spec.md §4.D). Skips uninstalled files, defers bare
/// files (the caller appends them after the trees), and inserts every other
/// file at the path its absolute module id names, in its install-options
/// group.
pub fn build_module_trees(module: &Module) -> ModuleTreeBuilder {
    let mut builder = ModuleTreeBuilder::new();

    for (index, file) in module.files().iter().enumerate() {
        if file.lazy() && file.imported() == crate::file::Imported::No {
            continue;
        }
        if file.bare() {
            module.mark_used(index);
            continue;
        }
        let Some(abs_id) = file.abs_module_id() else {
            continue;
        };

        module.mark_used(index);
        let group_idx = builder.group_index(file.install_options());
        let path = split_module_id(abs_id);
        if path.is_empty() {
            continue;
        }

        let leaf = if let Some(alias) = file.alias_id() {
            TreeNode::AliasLeaf(alias.to_string())
        } else if file.is_dynamic() {
            let stub = file.json_data().and_then(package_json_stub);
            TreeNode::DynamicLeaf {
                deps: file.all_dep_ids(),
                stub,
            }
        } else {
            TreeNode::FileLeaf(index)
        };

        insert_leaf(&mut builder.groups[group_idx].root, &path, leaf);
    }

    builder
}

fn serialize_tree(
    combined: &mut CombinedFile,
    node: &TreeNode,
    module: &Module,
    cache: &AppPrelinkCache,
) -> LinkerResult<()> {
    match node {
        TreeNode::Dir(children) => {
            combined.add_generated_code("{");
            for (i, (key, child)) in children.iter().enumerate() {
                if i > 0 {
                    combined.add_generated_code(",");
                }
                combined.add_generated_code(format!("{}:", serde_json::to_string(key).unwrap()));
                serialize_tree(combined, child, module, cache)?;
            }
            combined.add_generated_code("}");
        }
        TreeNode::FileLeaf(index) => {
            let file = &module.files()[*index];
            let entry = cache.get_or_compute(file, module.bundle_arch());
            combined.add_code_with_map(colon_escape(file.serve_path()), entry.source, entry.source_map);
        }
        TreeNode::AliasLeaf(alias) => {
            combined.add_generated_code(serde_json::to_string(alias).unwrap());
        }
        TreeNode::DynamicLeaf { deps, stub } => {
            let mut items: Vec<serde_json::Value> =
                deps.iter().cloned().map(serde_json::Value::String).collect();
            if let Some(stub) = stub {
                items.push(stub.clone());
            }
            combined.add_generated_code(serde_json::to_string(&items).unwrap());
        }
        TreeNode::FalseLeaf => {
            combined.add_generated_code("function(){}");
        }
    }
    Ok(())
}

fn serialize_install_options(group: &TreeGroup, is_app: bool) -> String {
    let value = group
        .options
        .as_deref()
        .cloned()
        .unwrap_or_else(|| serde_json::json!({}));
    let mut pretty = serde_json::to_string_pretty(&value).unwrap_or_else(|_| "{}".to_string());

    if !is_app && group.root.has_dynamic_leaf() {
        if let Some(pos) = pretty.rfind('}') {
            pretty.insert_str(pos, ",\n  \"eval\": function () { return eval(arguments[0]); }\n");
        } else {
            pretty = "{\n  \"eval\": function () { return eval(arguments[0]); }\n}".to_string();
        }
    }
    pretty
}

/// `_chunkifyModuleTrees` (spec.md §4.D). Walks each group in insertion
/// order, emitting one `meteorInstall(tree, options)` call.
pub fn chunkify_module_trees(
    combined: &mut CombinedFile,
    builder: &ModuleTreeBuilder,
    module: &Module,
) -> LinkerResult<()> {
    if !builder.groups().is_empty() {
        combined.add_generated_code("var require = ");
    }
    let config = LinkerConfig::from_env();
    let cache = prelink_cache::app_prelink_cache(config.app_prelink_cache_bytes);
    for group in builder.groups() {
        combined.add_generated_code("meteorInstall(");
        serialize_tree(combined, &group.root, module, cache)?;
        combined.add_generated_code(", ");
        combined.add_generated_code(serialize_install_options(group, module.use_global_namespace()));
        combined.add_generated_code(");\n");
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{File, Imported, InputFile};
    use crate::module::Module;

    fn static_file(id: &str, options: Option<InstallOptions>) -> File {
        File::new(InputFile {
            source: "exports.x = 1;\n".to_string(),
            content_hash: None,
            source_path: id.to_string(),
            serve_path: id.to_string(),
            abs_module_id: Some(format!("/{id}")),
            alias_id: None,
            source_map: None,
            deps: Vec::new(),
            lazy: false,
            imported: Imported::Static,
            main_module: false,
            bare: false,
            json_data: None,
            install_options: options,
        })
        .unwrap()
    }

    #[test]
    fn files_sharing_options_identity_land_in_one_group() {
        let options: InstallOptions = Arc::new(serde_json::json!({"name": "p"}));
        let module = Module::new(
            vec![
                static_file("a.js", Some(options.clone())),
                static_file("b.js", Some(options.clone())),
            ],
            Some("p".to_string()),
            "web.browser",
            "p.js",
        );
        let builder = build_module_trees(&module);
        assert_eq!(builder.groups().len(), 1);
    }

    #[test]
    fn distinct_option_objects_create_distinct_groups_even_if_structurally_equal() {
        let module = Module::new(
            vec![
                static_file("a.js", Some(Arc::new(serde_json::json!({"name": "p"})))),
                static_file("b.js", Some(Arc::new(serde_json::json!({"name": "p"})))),
            ],
            Some("p".to_string()),
            "web.browser",
            "p.js",
        );
        let builder = build_module_trees(&module);
        assert_eq!(builder.groups().len(), 2);
    }

    #[test]
    fn lazy_unimported_file_never_enters_a_tree() {
        let mut input = InputFile {
            source: "x".to_string(),
            content_hash: None,
            source_path: "a.js".to_string(),
            serve_path: "a.js".to_string(),
            abs_module_id: Some("/a.js".to_string()),
            alias_id: None,
            source_map: None,
            deps: Vec::new(),
            lazy: true,
            imported: Imported::No,
            main_module: false,
            bare: false,
            json_data: None,
            install_options: None,
        };
        input.abs_module_id = None; // unused files legitimately have no module id
        let module = Module::new(vec![File::new(input).unwrap()], None, "web.browser", "app.js");
        let builder = build_module_trees(&module);
        assert!(builder.groups().is_empty());
    }

    #[test]
    fn alias_file_inserts_a_string_leaf() {
        let mut file = static_file("y.js", None);
        // rebuild with an alias id since the constructor above has none
        file = File::new(InputFile {
            source: String::new(),
            content_hash: None,
            source_path: "y.js".to_string(),
            serve_path: "y.js".to_string(),
            abs_module_id: Some("/y.js".to_string()),
            alias_id: Some("/x.js".to_string()),
            source_map: None,
            deps: Vec::new(),
            lazy: false,
            imported: Imported::Static,
            main_module: false,
            bare: false,
            json_data: None,
            install_options: None,
        })
        .unwrap();
        let module = Module::new(vec![file], None, "web.browser", "app.js");
        let builder = build_module_trees(&module);
        let TreeNode::Dir(children) = &builder.groups()[0].root else {
            panic!("expected dir");
        };
        assert_eq!(children.len(), 1);
        assert!(matches!(children[0].1, TreeNode::AliasLeaf(ref a) if a == "/x.js"));
    }
}
