//! Embeds `settings.toml` into the firmware image.
//!
//! The file is looked up next to this manifest unless `AIRQ_SETTINGS`
//! points elsewhere. A missing file is not a build error: the node boots
//! and reports "settings.toml missing" on its status surface.

use std::env;
use std::fs;
use std::path::PathBuf;

fn main() {
    println!("cargo:rerun-if-env-changed=AIRQ_SETTINGS");

    let manifest_dir = PathBuf::from(env::var("CARGO_MANIFEST_DIR").unwrap());
    let path = env::var_os("AIRQ_SETTINGS")
        .map(PathBuf::from)
        .unwrap_or_else(|| manifest_dir.join("settings.toml"));
    println!("cargo:rerun-if-changed={}", path.display());

    let generated = if path.is_file() {
        format!(
            "pub const SETTINGS_TOML: Option<&[u8]> = Some(include_bytes!({:?}));\n",
            path.canonicalize().unwrap()
        )
    } else {
        println!(
            "cargo:warning=no settings file at {}, firmware will report it missing",
            path.display()
        );
        "pub const SETTINGS_TOML: Option<&[u8]> = None;\n".to_string()
    };

    let out = PathBuf::from(env::var("OUT_DIR").unwrap()).join("settings.rs");
    fs::write(out, generated).unwrap();
}
