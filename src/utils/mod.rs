//! Settings and timing helpers

pub mod settings;
pub mod timing;

pub use settings::{ConfigError, RenderSettings, default_settings_path, load_settings, save_settings};
pub use timing::{FrameTimings, ScopedTimer};
