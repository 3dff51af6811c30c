//! Build script for outreach-campaigns
//!
//! Stamps the binary with the identification logged at startup. Release
//! pipelines without a git checkout can set `OUTREACH_BUILD_ID` instead.

use std::path::Path;
use std::process::Command;

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    if !output.status.success() {
        return None;
    }
    String::from_utf8(output.stdout)
        .ok()
        .map(|s| s.trim().to_string())
}

fn main() {
    println!("cargo:rerun-if-env-changed=OUTREACH_BUILD_ID");
    println!("cargo:rerun-if-changed=build.rs");

    // Rebuild when the checked-out commit moves
    if let Some(git_dir) = git(&["rev-parse", "--git-dir"]) {
        let git_dir = Path::new(&git_dir);
        println!("cargo:rerun-if-changed={}", git_dir.join("HEAD").display());
        if let Some(head_ref) = git(&["symbolic-ref", "-q", "HEAD"]) {
            println!("cargo:rerun-if-changed={}", git_dir.join(head_ref).display());
        }
    }

    let build_id = std::env::var("OUTREACH_BUILD_ID")
        .ok()
        .filter(|id| !id.trim().is_empty())
        .or_else(|| {
            let hash = git(&["rev-parse", "--short=8", "HEAD"])?;
            let dirty = git(&["status", "--porcelain", "--untracked-files=no"])
                .map(|status| !status.is_empty())
                .unwrap_or(false);
            Some(if dirty { format!("{}-dirty", hash) } else { hash })
        })
        .unwrap_or_else(|| "unknown".to_string());

    let build_timestamp = chrono::Utc::now().to_rfc3339_opts(chrono::SecondsFormat::Secs, true);
    let profile = std::env::var("PROFILE").unwrap_or_else(|_| "unknown".to_string());

    println!("cargo:rustc-env=GIT_HASH={}", build_id);
    println!("cargo:rustc-env=BUILD_TIMESTAMP={}", build_timestamp);
    println!("cargo:rustc-env=BUILD_PROFILE={}", profile);
}
