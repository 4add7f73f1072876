//! # lectern-settings
//!
//! Configuration for the Lectern server, loaded from three layers (in
//! priority order):
//! 1. **Compiled defaults**: [`LecternSettings::default()`]
//! 2. **Config file**: JSON, deep-merged over defaults
//! 3. **Environment variables**: `LECTERN_*` overrides (highest priority)
//!
//! Settings are an explicit value handed to the server at startup; there is
//! no process-global instance.

#![deny(unsafe_code)]

pub mod errors;
pub mod loader;
pub mod types;

pub use errors::{Result, SettingsError};
pub use loader::{
    DEFAULT_CONFIG_PATH, apply_overrides, deep_merge, load_settings_from_path,
    load_with,
};
pub use types::*;
