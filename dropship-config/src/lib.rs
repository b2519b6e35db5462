//! Configuration for the dropship daemon.
//!
//! Settings live in a single JSON file with PascalCase keys, matching the
//! format deployed alongside existing installations. This crate loads and
//! validates that file, provides sensible defaults for a fresh install, and
//! generates the deployment artifacts (`dropship.json` and a systemd unit)
//! used by `dropship init`.

pub mod loader;
pub mod model;
pub mod service_unit;

pub use loader::{
    ConfigLoadError, DEFAULT_CONFIG_FILE, load_settings, write_default_settings,
};
pub use model::{LoaderSettings, WatchSettings, WatcherSettings};
pub use service_unit::{SERVICE_FILE_NAME, render_unit, resolve_group_id, write_unit_file};
