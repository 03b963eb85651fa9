//! `Module` (spec.md §3): the bundle-construction context owning one
//! package's (or the application's) files.

use crate::file::File;
use std::cell::RefCell;
use std::collections::HashSet;

pub struct Module {
    files: Vec<File>,
    /// `None` for the application bundle.
    name: Option<String>,
    bundle_arch: String,
    combined_serve_path: String,
    /// Files actually emitted into the current bundle, reset per `fullLink`
    /// call (spec.md §3 "Transient fields ... reset per bundle").
    used_files: RefCell<HashSet<usize>>,
}

impl Module {
    pub fn new(
        files: Vec<File>,
        name: Option<String>,
        bundle_arch: impl Into<String>,
        combined_serve_path: impl Into<String>,
    ) -> Self {
        Self {
            files,
            name,
            bundle_arch: bundle_arch.into(),
            combined_serve_path: combined_serve_path.into(),
            used_files: RefCell::new(HashSet::new()),
        }
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// `true` iff this is the application bundle rather than a package.
    pub fn use_global_namespace(&self) -> bool {
        self.name.is_none()
    }

    pub fn bundle_arch(&self) -> &str {
        &self.bundle_arch
    }

    pub fn combined_serve_path(&self) -> &str {
        &self.combined_serve_path
    }

    pub fn mark_used(&self, file_index: usize) {
        self.used_files.borrow_mut().insert(file_index);
    }

    pub fn is_used(&self, file_index: usize) -> bool {
        self.used_files.borrow().contains(&file_index)
    }

    pub fn reset_used_files(&self) {
        self.used_files.borrow_mut().clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::{File, Imported, InputFile};

    fn file(id: &str) -> File {
        File::new(InputFile {
            source: "x".to_string(),
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
            install_options: None,
        })
        .unwrap()
    }

    #[test]
    fn app_module_has_no_name_and_uses_global_namespace() {
        let module = Module::new(vec![file("a.js")], None, "web.browser", "app.js");
        assert!(module.name().is_none());
        assert!(module.use_global_namespace());
    }

    #[test]
    fn package_module_is_named_and_scoped() {
        let module = Module::new(vec![file("a.js")], Some("p".to_string()), "web.browser", "p.js");
        assert_eq!(module.name(), Some("p"));
        assert!(!module.use_global_namespace());
    }

    #[test]
    fn used_files_reset_between_bundles() {
        let module = Module::new(vec![file("a.js")], None, "web.browser", "app.js");
        module.mark_used(0);
        assert!(module.is_used(0));
        module.reset_used_files();
        assert!(!module.is_used(0));
    }
}
