//! Common test utilities for fieldset integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't pollute
//! the user's platform data directory.

#![allow(dead_code)]

use assert_cmd::Command;
pub use tempfile::TempDir;

/// A test environment with an isolated data directory.
///
/// The `fst()` method returns a `Command` that sets `FST_DATA_DIR`
/// per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub data_dir: TempDir,
}

impl TestEnv {
    /// Create a new test environment with an isolated data directory.
    pub fn new() -> Self {
        Self {
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Create a new test environment and initialize the settings store.
    pub fn init() -> Self {
        let env = Self::new();
        env.fst().args(["system", "init"]).assert().success();
        env
    }

    /// Get a Command for the fst binary with an isolated data directory.
    pub fn fst(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_fst"));
        cmd.env("FST_DATA_DIR", self.data_dir.path());
        cmd
    }

    /// Get the path to the data directory.
    pub fn data_path(&self) -> &std::path::Path {
        self.data_dir.path()
    }

    /// Run a command, assert success, and parse its JSON output.
    pub fn fst_json(&self, args: &[&str]) -> serde_json::Value {
        let output = self.fst().args(args).output().unwrap();
        assert!(
            output.status.success(),
            "command {:?} failed: {}",
            args,
            String::from_utf8_lossy(&output.stderr)
        );
        serde_json::from_slice(&output.stdout).unwrap()
    }

    /// Create a node via the CLI and return its generated id.
    pub fn create_node(&self, args: &[&str]) -> String {
        let mut full = vec!["node", "create"];
        full.extend_from_slice(args);
        let json = self.fst_json(&full);
        json["node"]["id"].as_str().unwrap().to_string()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
