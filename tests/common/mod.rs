//! Shared helpers for tests that drive the `conport-import` binary.

use serde_json::Value;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::{Command, Output};
use tempfile::TempDir;

pub const EXPORT_REL: &str = "memory-bank/conport_export";

/// A temporary workspace with an export directory.
pub struct Workspace {
    _dir: TempDir,
    pub root: PathBuf,
}

impl Workspace {
    pub fn create() -> Self {
        let dir = tempfile::tempdir().expect("create workspace");
        let root = dir.path().canonicalize().expect("canonical workspace");
        fs::create_dir_all(root.join(EXPORT_REL)).expect("create export dir");
        Self { _dir: dir, root }
    }

    pub fn write_export(&self, rel: &str, contents: &str) {
        let path = self.root.join(EXPORT_REL).join(rel);
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).expect("create export parent");
        }
        fs::write(path, contents).expect("write export file");
    }

    pub fn with_sample_export(self) -> Self {
        self.write_export(
            "product_context.md",
            "# Product Context\n\n## Goal\n\nShip the importer.\n",
        );
        self.write_export(
            "decision_log.md",
            "# Decision Log\n\n---\n## Decision\n*   [2024-03-01 10:15:00] Use SQLite\n",
        );
        self
    }
}

/// Run the binary with `args` from `cwd`, with `RUST_LOG` cleared.
pub fn run_cli(cwd: &Path, args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_conport-import"))
        .args(args)
        .current_dir(cwd)
        .env_remove("RUST_LOG")
        .output()
        .expect("run conport-import")
}

/// Parse stdout of a successful run as JSON.
pub fn stdout_json(output: &Output) -> Value {
    assert!(
        output.status.success(),
        "exit {:?}, stderr: {}",
        output.status.code(),
        String::from_utf8_lossy(&output.stderr)
    );
    serde_json::from_slice(&output.stdout).expect("stdout is JSON")
}

pub fn populate_store(dir: &Path) {
    fs::create_dir_all(dir).expect("create store dir");
    fs::write(dir.join("context.db"), "stale").expect("write stale db");
    fs::write(dir.join("marker"), "stale").expect("write marker");
}
