use std::process::Command;

/// Embeds the release version as APP_VERSION.
///
/// An explicit APP_VERSION from the build environment wins, then the nearest
/// git tag, then the crate version.
fn main() {
    let version = std::env::var("APP_VERSION")
        .ok()
        .filter(|v| !v.trim().is_empty())
        .or_else(git_tag)
        .map(|v| strip_v(v.trim()))
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo:rustc-env=APP_VERSION={}", version);
    println!("cargo:rerun-if-env-changed=APP_VERSION");
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs/tags");
}

fn git_tag() -> Option<String> {
    let output = Command::new("git")
        .args(["describe", "--tags", "--abbrev=0"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout).ok()
}

fn strip_v(version: &str) -> String {
    version.strip_prefix('v').unwrap_or(version).to_string()
}
