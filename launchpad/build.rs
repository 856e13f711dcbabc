//! Build script for launchpad
//!
//! Stamps the short git revision and the build time into the binary.

use std::process::Command;

fn git_revision() -> Option<String> {
    let output = Command::new("git")
        .args(["rev-parse", "--short=12", "HEAD"])
        .output()
        .ok()?;
    if !output.status.success() {
        return None;
    }
    let revision = String::from_utf8(output.stdout).ok()?;
    Some(revision.trim().to_string()).filter(|r| !r.is_empty())
}

fn main() {
    let git_hash = git_revision().unwrap_or_else(|| "unknown".to_string());
    let build_time = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);

    println!("cargo:rustc-env=GIT_HASH={git_hash}");
    println!("cargo:rustc-env=BUILD_TIME={build_time}");
    println!("cargo:rerun-if-changed=../.git/HEAD");
}
