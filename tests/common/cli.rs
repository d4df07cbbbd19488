//! CLI test runner with fluent assertions.
//!
//! Every runner owns a temp directory holding its settings file and
//! database, so runs never touch the user's real store and state carries
//! over between commands of the same runner.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::time::{Duration, Instant};

use serde_json::Value;
use tempfile::TempDir;

use super::fixtures::write_settings;

/// Runner for the `rdeck` binary.
pub struct CliRunner {
    binary_path: PathBuf,
    home: TempDir,
    config_path: PathBuf,
    env_vars: Vec<(String, String)>,
}

impl Default for CliRunner {
    fn default() -> Self {
        Self::new()
    }
}

impl CliRunner {
    /// Runner with an isolated store and short network timeouts.
    ///
    /// # Panics
    ///
    /// Panics if the temp directory cannot be created.
    #[must_use]
    pub fn new() -> Self {
        Self::with_settings("")
    }

    /// Like [`new`](Self::new) with extra TOML lines appended to the settings.
    #[must_use]
    pub fn with_settings(extra: &str) -> Self {
        let home = TempDir::new().expect("temp dir");
        let config_path = write_settings(home.path(), extra);
        Self {
            binary_path: PathBuf::from(env!("CARGO_BIN_EXE_rdeck")),
            home,
            config_path,
            env_vars: vec![("RUST_LOG".to_string(), "off".to_string())],
        }
    }

    #[must_use]
    pub fn with_env(mut self, key: &str, value: &str) -> Self {
        self.env_vars.push((key.to_string(), value.to_string()));
        self
    }

    #[must_use]
    pub fn home(&self) -> &Path {
        self.home.path()
    }

    #[must_use]
    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    /// Execute the binary with `args`.
    ///
    /// # Panics
    ///
    /// Panics if the binary cannot be spawned.
    #[must_use]
    pub fn run(&self, args: &[&str]) -> CliResult {
        let start = Instant::now();
        let mut cmd = Command::new(&self.binary_path);
        cmd.args(args)
            .env("RDECK_CONFIG", &self.config_path)
            .env_remove("RDECK_DEVICE")
            .env_remove("RDECK_FORMAT")
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped());
        for (key, value) in &self.env_vars {
            cmd.env(key, value);
        }

        let output = cmd.output().expect("Failed to execute rdeck");
        CliResult {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            exit_code: output.status.code().unwrap_or(-1),
            duration: start.elapsed(),
            args: args.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Execute with `--robot` for JSON output.
    #[must_use]
    pub fn run_robot(&self, args: &[&str]) -> CliResult {
        let mut full_args = vec!["--robot"];
        full_args.extend(args);
        self.run(&full_args)
    }
}

/// Captured output of one run.
#[derive(Debug, Clone)]
pub struct CliResult {
    pub stdout: String,
    pub stderr: String,
    pub exit_code: i32,
    pub duration: Duration,
    pub args: Vec<String>,
}

impl CliResult {
    #[must_use]
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }

    pub fn assert_success(&self) -> &Self {
        assert!(
            self.success(),
            "Command {:?} failed with exit code {}: {}",
            self.args,
            self.exit_code,
            self.stderr
        );
        self
    }

    pub fn assert_failure(&self) -> &Self {
        assert!(!self.success(), "Command {:?} unexpectedly succeeded", self.args);
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "stdout does not contain \"{text}\"\nActual stdout:\n{}",
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "stderr does not contain \"{text}\"\nActual stderr:\n{}",
            self.stderr
        );
        self
    }

    /// Parse stdout as JSON.
    ///
    /// # Panics
    ///
    /// Panics if stdout is not valid JSON.
    #[must_use]
    pub fn json(&self) -> Value {
        serde_json::from_str(self.stdout.trim())
            .unwrap_or_else(|_| panic!("Failed to parse JSON from stdout:\n{}", self.stdout))
    }

    /// Parse stderr as JSON (robot-mode errors).
    #[must_use]
    pub fn stderr_json(&self) -> Value {
        serde_json::from_str(self.stderr.trim())
            .unwrap_or_else(|_| panic!("Failed to parse JSON from stderr:\n{}", self.stderr))
    }

    pub fn assert_json_field(&self, json_pointer: &str, expected: &Value) -> &Self {
        let json = self.json();
        let actual = json
            .pointer(json_pointer)
            .unwrap_or_else(|| panic!("JSON path {json_pointer} not found in:\n{json:#}"));
        assert_eq!(actual, expected, "JSON field {json_pointer} mismatch");
        self
    }

    pub fn assert_json_array_len(&self, json_pointer: &str, expected_len: usize) -> &Self {
        let json = self.json();
        let arr = json
            .pointer(json_pointer)
            .and_then(Value::as_array)
            .unwrap_or_else(|| panic!("JSON path {json_pointer} is not an array in:\n{json:#}"));
        assert_eq!(arr.len(), expected_len, "Array at {json_pointer} has wrong length");
        self
    }
}
