//! `settings.toml` as embedded by build.rs

use hal_abstractions::EmbeddedSettings;

include!(concat!(env!("OUT_DIR"), "/settings.rs"));

pub fn store() -> EmbeddedSettings {
    EmbeddedSettings(SETTINGS_TOML)
}
