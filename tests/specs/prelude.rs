//! Shared fixtures for behavioral specs

use assert_cmd::Command;
use predicates::prelude::*;
use predicates::str::contains;
use std::path::{Path, PathBuf};
use std::process::Output;
use tempfile::TempDir;

pub use fleetlog_core::frame;
pub use fleetlog_core::{LogDir, OriginId, Record};

/// Scratch directory holding one or more logs
pub struct Project {
    dir: TempDir,
}

impl Project {
    pub fn empty() -> Self {
        Self {
            dir: tempfile::tempdir().unwrap(),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Default log directory used by most specs
    pub fn log(&self) -> PathBuf {
        self.path().join("log")
    }

    pub fn log_arg(&self) -> String {
        self.log().display().to_string()
    }

    /// Write a file relative to the project root
    pub fn file(&self, rel: &str, content: impl AsRef<[u8]>) -> PathBuf {
        let path = self.path().join(rel);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).unwrap();
        }
        std::fs::write(&path, content).unwrap();
        path
    }

    /// Current tail file of a log directory
    pub fn tail_of(&self, log: &Path) -> PathBuf {
        let dir = LogDir::at(log);
        dir.log_path(dir.generation().unwrap())
    }

    pub fn tail(&self) -> PathBuf {
        self.tail_of(&self.log())
    }

    pub fn fleetlog(&self) -> CliBuilder {
        let mut cmd = Command::cargo_bin("fleetlog").unwrap();
        cmd.current_dir(self.path());
        cmd.env_remove("RUST_LOG");
        CliBuilder { cmd }
    }

    /// Append records through the CLI
    pub fn append(&self, origin: &str, payloads: &[&str]) {
        for payload in payloads {
            self.fleetlog()
                .args(&["append", "--dir", &self.log_arg(), "--origin", origin, payload])
                .passes();
        }
    }
}

pub struct CliBuilder {
    cmd: Command,
}

impl CliBuilder {
    pub fn args(mut self, args: &[&str]) -> Self {
        self.cmd.args(args);
        self
    }

    pub fn stdin(mut self, input: impl Into<Vec<u8>>) -> Self {
        self.cmd.write_stdin(input);
        self
    }

    /// Run and require exit code 0
    pub fn passes(self) -> RunAssert {
        self.exits_with(0)
    }

    /// Run and require a non-zero exit code
    pub fn fails(mut self) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert!(
            !run.output.status.success(),
            "expected failure\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }

    pub fn exits_with(mut self, code: i32) -> RunAssert {
        let output = self.cmd.output().unwrap();
        let run = RunAssert { output };
        assert_eq!(
            run.output.status.code(),
            Some(code),
            "unexpected exit code\nstdout: {}\nstderr: {}",
            run.stdout(),
            run.stderr()
        );
        run
    }
}

pub struct RunAssert {
    output: Output,
}

impl RunAssert {
    pub fn stdout(&self) -> String {
        String::from_utf8_lossy(&self.output.stdout).into_owned()
    }

    pub fn stderr(&self) -> String {
        String::from_utf8_lossy(&self.output.stderr).into_owned()
    }

    pub fn stdout_has(self, expected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            contains(expected).eval(stdout.as_str()),
            "stdout missing {:?}\nstdout: {}",
            expected,
            stdout
        );
        self
    }

    pub fn stdout_lacks(self, unexpected: &str) -> Self {
        let stdout = self.stdout();
        assert!(
            contains(unexpected).not().eval(stdout.as_str()),
            "stdout unexpectedly has {:?}\nstdout: {}",
            unexpected,
            stdout
        );
        self
    }

    pub fn stderr_has(self, expected: &str) -> Self {
        let stderr = self.stderr();
        assert!(
            contains(expected).eval(stderr.as_str()),
            "stderr missing {:?}\nstderr: {}",
            expected,
            stderr
        );
        self
    }

    /// Parse stdout as one JSON document
    pub fn json(&self) -> serde_json::Value {
        serde_json::from_str(&self.stdout()).unwrap()
    }

    /// Parse stdout as one JSON document per line
    pub fn json_lines(&self) -> Vec<serde_json::Value> {
        self.stdout()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

/// A record built outside the CLI, for crafting files on disk
pub fn record(origin: &str, seq: u64, clock: u64, payload: &str) -> Record {
    Record::new(
        OriginId::new(origin).unwrap(),
        seq,
        clock,
        0,
        payload.as_bytes().to_vec(),
    )
}
