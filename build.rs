use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::Path;

fn hash_file(path: &Path) -> String {
    let content = fs::read(path).unwrap_or_default();
    let mut hasher = DefaultHasher::new();
    content.hash(&mut hasher);
    format!("{:x}", hasher.finish())[..8].to_string()
}

fn main() {
    println!("cargo:rerun-if-changed=static/js/proctor.js");
    println!("cargo:rerun-if-changed=static/css/styles.css");
    println!("cargo:rerun-if-changed=templates/");

    // Hash static assets for cache busting
    let js_hash = hash_file(Path::new("static/js/proctor.js"));
    let css_hash = hash_file(Path::new("static/css/styles.css"));

    let out_dir = std::env::var("OUT_DIR").expect("OUT_DIR is set by cargo");
    fs::write(
        Path::new(&out_dir).join("asset_hashes.rs"),
        format!(
            r#"/// Hash of proctor.js for cache busting
pub const PROCTOR_JS_HASH: &str = "{}";
/// Hash of styles.css for cache busting
pub const STYLES_CSS_HASH: &str = "{}";"#,
            js_hash, css_hash
        ),
    )
    .expect("write asset_hashes.rs");
}
