//! Configuration module
//!
//! Handles credentials, commit identity, source identity and the run
//! switches, layered from defaults, an optional TOML file and the environment.

mod settings;

pub use settings::*;
