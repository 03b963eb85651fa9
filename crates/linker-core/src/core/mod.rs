pub mod config;
pub mod error;
pub mod error_help;
pub mod hash;
pub mod path;
pub mod stack;

pub use config::LinkerConfig;
pub use error::{LinkerError, LinkerResult};
pub use error_help::{format_error_with_help, ErrorHelp};
