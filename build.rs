// SPDX-License-Identifier: GPL-3.0-only

use std::process::Command;

fn main() {
    println!("cargo::rerun-if-changed=.git/HEAD");
    println!("cargo::rerun-if-changed=.git/refs/tags");
    println!("cargo::rerun-if-env-changed=IRIS_CAMERA_VERSION");

    // Packagers building from a tarball set the version explicitly
    let version = std::env::var("IRIS_CAMERA_VERSION")
        .ok()
        .or_else(git_version)
        .unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string());

    println!("cargo::rustc-env=GIT_VERSION={}", version);
}

/// `0.1.0-abcdef1` at a tag, `0.1.0-dirty-abcdef1` after it
fn git_version() -> Option<String> {
    let describe = git(&["describe", "--tags", "--match", "v*"])?;
    let hash = git(&["rev-parse", "--short", "HEAD"])?;
    let describe = describe.strip_prefix('v').unwrap_or(&describe);

    // git describe: <tag>[-<commits>-g<hash>]
    let parts: Vec<&str> = describe.rsplitn(3, '-').collect();
    match parts.as_slice() {
        [_, _, base] => Some(format!("{}-dirty-{}", base, hash)),
        _ => Some(format!("{}-{}", describe, hash)),
    }
}

fn git(args: &[&str]) -> Option<String> {
    let output = Command::new("git").args(args).output().ok()?;
    output
        .status
        .success()
        .then(|| String::from_utf8_lossy(&output.stdout).trim().to_string())
}
