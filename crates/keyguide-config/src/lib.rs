//! Configuration parsing for keyguide
//!
//! This crate handles parsing the KDL configuration file into an immutable
//! settings snapshot and building the shortcut reference sheet.

mod cheatsheet;
mod error;
mod model;
mod parser;
mod paths;

pub use cheatsheet::{CheatEntry, CheatSheet};
pub use error::ConfigError;
pub use model::*;
pub use paths::{expand_path, pid_file_path, DEFAULT_CONFIG_PATH};
pub use parser::{parse_config, parse_config_str, parse_config_str_with_base, parse_config_with_base};
