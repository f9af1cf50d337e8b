use std::env;
use std::path::Path;

/// Build-time settings read by `toml_cfg` (Wi-Fi credentials, broker, board)
const CONFIG_FILE: &str = "cfg.toml";

fn main() {
    println!("cargo:rerun-if-changed={}", CONFIG_FILE);

    // ESP-IDF link arguments only exist when building for the device,
    // host builds of the library and its tests skip them.
    if env::var("CARGO_CFG_TARGET_OS").as_deref() == Ok("espidf") {
        embuild::espidf::sysenv::output();

        if !Path::new(CONFIG_FILE).exists() {
            println!(
                "cargo:warning=Config file '{}' not found, using built-in defaults (see cfg.toml.example)",
                CONFIG_FILE
            );
        }
    }
}
