//! Build script for the webpay crate.
//!
//! Generates content-based hashes for static assets so templates can link
//! them with immutable cache headers.

use std::env;
use std::fs;
use std::path::Path;

use sha2::{Digest, Sha256};

fn main() {
    hash_asset("css", "main.css", "CSS_HASH");
    hash_asset("js", "pay.js", "JS_HASH");
}

/// Hash a static asset and copy it to a derived directory with the hash in its filename.
///
/// Sets the `env_var` environment variable for use with `env!(...)`.
fn hash_asset(dir: &str, file: &str, env_var: &str) {
    let manifest_dir =
        env::var("CARGO_MANIFEST_DIR").expect("CARGO_MANIFEST_DIR must be set by Cargo");
    let asset_path = Path::new(&manifest_dir).join("static").join(dir).join(file);

    println!("cargo:rerun-if-changed={}", asset_path.display());

    let content = match fs::read(&asset_path) {
        Ok(content) => content,
        Err(e) => {
            println!("cargo:warning=Could not read {file}: {e}");
            println!("cargo:rustc-env={env_var}=");
            return;
        }
    };

    // First 8 chars of SHA256
    let hash = format!("{:x}", Sha256::digest(&content));
    let short_hash = &hash[..8];

    println!("cargo:rustc-env={env_var}={short_hash}");

    let (stem, ext) = file.rsplit_once('.').unwrap_or((file, ""));
    let derived_dir = Path::new(&manifest_dir)
        .join("static")
        .join(dir)
        .join("derived");
    fs::create_dir_all(&derived_dir).expect("Failed to create derived asset directory");

    let derived_path = derived_dir.join(format!("{stem}.{short_hash}.{ext}"));
    fs::copy(&asset_path, &derived_path).expect("Failed to copy asset to derived directory");
}
