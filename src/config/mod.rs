pub mod parser;
pub mod types;

pub use types::*;
pub use parser::{apply_env_overrides, parse_config, validate_config};
