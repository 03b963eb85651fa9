//! End-to-end coverage of the six linking scenarios through `full_link`,
//! exercised the way the teacher exercises its package-manager pipeline:
//! one test per scenario, asserting on the shape of the emitted source
//! rather than byte-for-byte output.

use linker::{DepEntry, File, FullLinkInput, Imported, ImportedSymbol, InputFile};
use linker_core::buildmessage::{self, JobOptions};
use std::sync::Arc;

fn base_input(source: &str) -> InputFile {
    InputFile {
        source: source.to_string(),
        content_hash: None,
        source_path: "a.js".to_string(),
        serve_path: "a.js".to_string(),
        abs_module_id: None,
        alias_id: None,
        source_map: None,
        deps: Vec::new(),
        lazy: false,
        imported: Imported::No,
        main_module: false,
        bare: false,
        json_data: None,
        install_options: None,
    }
}

async fn link(input: FullLinkInput) -> (linker_core::core::LinkerResult<Vec<linker::OutputFile>>, String) {
    let (result, message_set) = buildmessage::capture(Some(JobOptions::titled("test link")), || {
        linker::full_link(input)
    })
    .await;
    (result, message_set.format_messages())
}

#[tokio::test]
async fn s1_empty_bare_module() {
    let mut file = base_input("");
    file.bare = true;

    let (result, _) = link(FullLinkInput {
        input_files: vec![file],
        is_app: true,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "app.js".to_string(),
        name: None,
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: Vec::new(),
    })
    .await;

    let outputs = result.unwrap();
    assert_eq!(outputs.len(), 1);
    assert!(!outputs[0].source.contains("meteorInstall"));
    assert!(outputs[0].source_map.is_some());
}

#[tokio::test]
async fn s2_single_static_module_in_runtime_queue() {
    let mut file = base_input("exports.x = 1;\n");
    file.abs_module_id = Some("/a.js".to_string());
    file.install_options = Some(Arc::new(serde_json::json!({"name": "p"})));
    file.lazy = false;
    file.imported = Imported::Static;

    let (result, _) = link(FullLinkInput {
        input_files: vec![file],
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: vec![DepEntry {
            package: "meteor".to_string(),
            unordered: false,
        }],
    })
    .await;

    let outputs = result.unwrap();
    let source = &outputs[0].source;
    assert!(source.contains("var require = meteorInstall("));
    assert!(source.contains("\"a.js\":"));
    assert!(source.contains("function ("));
    assert!(source.contains("eagerModulePaths: [\"/a.js\"]"));
}

#[tokio::test]
async fn s3_dynamic_import_gets_its_own_output_entry() {
    let options = Arc::new(serde_json::json!({"name": "p"}));

    let mut main_file = base_input("require('/dyn.js');\n");
    main_file.abs_module_id = Some("/main.js".to_string());
    main_file.imported = Imported::Static;
    main_file.install_options = Some(options.clone());

    let mut dyn_file = base_input("exports.y = 2;\n");
    dyn_file.source_path = "dyn.js".to_string();
    dyn_file.serve_path = "dyn.js".to_string();
    dyn_file.abs_module_id = Some("/dyn.js".to_string());
    dyn_file.lazy = true;
    dyn_file.imported = Imported::Dynamic;
    dyn_file.deps = vec![("(deps of dyn)".to_string(), linker::DepInfo { dynamic: false })];
    dyn_file.install_options = Some(options.clone());

    let (result, _) = link(FullLinkInput {
        input_files: vec![main_file, dyn_file],
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: vec![DepEntry {
            package: "meteor".to_string(),
            unordered: false,
        }],
    })
    .await;

    let outputs = result.unwrap();
    assert!(outputs[0].source.contains("\"(deps of dyn)\""));

    let dynamic_entry = outputs.iter().find(|o| o.dynamic).expect("dynamic output entry");
    assert_eq!(dynamic_entry.serve_path, "dynamic//dyn.js");
}

#[tokio::test]
async fn s4_alias_inserts_string_leaf() {
    let mut file = base_input("");
    file.source_path = "y.js".to_string();
    file.serve_path = "y.js".to_string();
    file.abs_module_id = Some("/y.js".to_string());
    file.alias_id = Some("/x.js".to_string());
    file.imported = Imported::Static;
    file.install_options = Some(Arc::new(serde_json::json!({"name": "p"})));

    let (result, _) = link(FullLinkInput {
        input_files: vec![file],
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: vec![DepEntry {
            package: "meteor".to_string(),
            unordered: false,
        }],
    })
    .await;

    let outputs = result.unwrap();
    assert!(outputs[0].source.contains("\"y.js\":\"/x.js\""));
}

#[tokio::test]
async fn s5_package_json_browser_stub() {
    let mut file = base_input("");
    file.source_path = "package.json".to_string();
    file.serve_path = "package.json".to_string();
    file.abs_module_id = Some("/package.json".to_string());
    file.lazy = true;
    file.imported = Imported::Dynamic;
    file.json_data = Some(serde_json::json!({"browser": {"./foo": false}, "main": "./foo"}));
    file.install_options = Some(Arc::new(serde_json::json!({"name": "p"})));

    let (result, _) = link(FullLinkInput {
        input_files: vec![file],
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: vec![DepEntry {
            package: "meteor".to_string(),
            unordered: false,
        }],
    })
    .await;

    let outputs = result.unwrap();
    let source = &outputs[0].source;
    assert!(source.contains("\"browser\":{\"./foo\":false}"));
    assert!(source.contains("\"main\":\"./foo\""));
}

#[tokio::test]
async fn s6_parse_error_recovery_yields_empty_package_bundle() {
    let mut file = base_input("function ( { this is not javascript");
    file.abs_module_id = Some("/broken.js".to_string());
    file.install_options = Some(Arc::new(serde_json::json!({"name": "p"})));
    file.imported = Imported::Static;

    let (result, formatted) = link(FullLinkInput {
        input_files: vec![file],
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: Vec::new(),
        imports: Vec::new(),
        include_source_map_instructions: false,
        deps: vec![DepEntry {
            package: "meteor".to_string(),
            unordered: false,
        }],
    })
    .await;

    assert!(result.unwrap().is_empty());
    assert!(!formatted.is_empty());
}

#[test]
fn invalid_input_file_is_rejected_before_linking() {
    let mut file = base_input("x");
    file.bare = true;
    file.lazy = true;
    assert!(File::new(file).is_err());
}

#[tokio::test]
async fn runtime_required_is_fatal_without_a_runtime_dependency() {
    let (result, _) = link(FullLinkInput {
        input_files: Vec::new(),
        is_app: false,
        bundle_arch: "web.browser".to_string(),
        combined_serve_path: "p.js".to_string(),
        name: Some("p".to_string()),
        declared_exports: vec!["Foo".to_string()],
        imports: vec![ImportedSymbol {
            dotted_name: "Bar.baz".to_string(),
            from_package: "other".to_string(),
        }],
        include_source_map_instructions: false,
        deps: Vec::new(),
    })
    .await;

    assert!(matches!(result, Err(linker_core::core::LinkerError::RuntimeRequired)));
}
