//! Module linker: turns a package's (or the application's) compiled files
//! into one concatenated bundle with a single composed source map.

pub mod combined_file;
pub mod file;
pub mod linker;
pub mod module;
pub mod module_tree;
pub mod prelink_cache;

pub use combined_file::CombinedFile;
pub use file::{DepInfo, File, Imported, InputFile, InstallOptions, PrelinkedOutput};
pub use linker::{full_link, DepEntry, FullLinkInput, ImportedSymbol, OutputFile};
pub use module::Module;
pub use module_tree::{build_module_trees, chunkify_module_trees, ModuleTreeBuilder, TreeGroup, TreeNode};
pub use prelink_cache::{
    app_cache_key, app_prelink_cache, dynamic_cache_key, dynamic_prelink_cache, AppPrelinkCache,
    DynamicPrelinkCache, PrelinkedEntry, DEFAULT_APP_PRELINK_CACHE_BYTES, DYNAMIC_CACHE_ENTRY_LIMIT,
};
