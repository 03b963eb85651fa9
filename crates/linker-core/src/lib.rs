//! Shared primitives for the module linker: the build-message diagnostic
//! substrate, source-path/content-hash helpers, source-map encode/decode, and
//! the assigned-globals static analysis collaborator.

pub mod buildmessage;
pub mod core;
pub mod sourcemap;
pub mod staticanalysis;

pub use core::{format_error_with_help, ErrorHelp, LinkerConfig, LinkerError, LinkerResult};
