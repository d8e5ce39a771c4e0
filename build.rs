use std::path::PathBuf;
use std::process::Command;

/// The crate version, followed by the git revision when building from a checkout.
fn version() -> String {
    let version = env!("CARGO_PKG_VERSION");
    let revision = Command::new("git")
        .args(["describe", "--always", "--dirty=+dirty", "--long", "--tags"])
        .output()
        .ok()
        .filter(|output| output.status.success())
        .map(|output| String::from_utf8_lossy(&output.stdout).trim().to_string())
        .filter(|revision| !revision.is_empty());
    match revision {
        Some(revision) => format!("{version}\n\nRevision: {revision}"),
        None => version.to_string(),
    }
}

fn main() {
    let out_dir = PathBuf::from(std::env::var("OUT_DIR").expect("missing OUT_DIR"));
    let path = out_dir.join("version.txt");
    if let Err(e) = std::fs::write(&path, version()) {
        panic!("Failed to write {}: {}", path.display(), e);
    }
    println!("cargo:rerun-if-changed=.git/HEAD");
    println!("cargo:rerun-if-changed=.git/refs");
    println!("cargo:rerun-if-changed=.git/index");
}
