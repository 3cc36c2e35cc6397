//! Bakes the WiFi credentials into the firmware.
//!
//! Values come from the environment, falling back to a `.env` file in the
//! crate or workspace root. Missing credentials fail the build rather than
//! producing a device that can never associate.

use std::env;

const CREDENTIALS: [&str; 2] = ["WIFI_SSID", "WIFI_PASSWORD"];

fn main() {
    println!("cargo:rerun-if-changed=.env");
    println!("cargo:rerun-if-changed=../../.env");

    if dotenvy::dotenv().is_err() {
        // Building from the crate directory leaves the workspace .env two levels up.
        let _ = dotenvy::from_filename("../../.env");
    }

    for key in CREDENTIALS {
        println!("cargo:rerun-if-env-changed={key}");
        match env::var(key) {
            Ok(value) => println!("cargo:rustc-env={key}={value}"),
            Err(_) => {
                eprintln!("error: {key} is not set (export it or add it to .env)");
                std::process::exit(1);
            }
        }
    }
}
