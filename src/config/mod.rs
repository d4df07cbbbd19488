//! Settings file handling.

mod path;
mod settings;

pub use path::{APP_DIR, default_config_path, default_storage_path, home_dir, resolve_path};
pub use settings::{
    CONFIG_ENV, ConfigFormat, Settings, discover_settings, load_settings, load_settings_from_str,
};
