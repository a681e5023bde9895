//! Configuration module for GifSync
//!
//! Provides the CLI definition, config files, and runtime settings.

mod settings;

pub use settings::*;
