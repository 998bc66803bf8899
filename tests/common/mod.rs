#![allow(dead_code)]

use std::fs;
use std::process::{Command, Output};
use tempfile::TempDir;

pub fn linkcode_binary() -> &'static str {
    env!("CARGO_BIN_EXE_linkcode")
}

/// Helper struct to run linkcode commands against an isolated config directory
pub struct LinkcodeTest {
    pub temp_dir: TempDir,
    api_url: Option<String>,
}

impl LinkcodeTest {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        LinkcodeTest {
            temp_dir,
            api_url: None,
        }
    }

    /// Point every command at `url` through `LINKCODE_API_URL`.
    pub fn with_api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    fn command(&self, args: &[&str]) -> Command {
        let mut cmd = Command::new(linkcode_binary());
        cmd.args(args)
            .current_dir(self.temp_dir.path())
            .env("LINKCODE_CONFIG_DIR", self.temp_dir.path())
            .env_remove("LINKCODE_API_URL")
            .env_remove("LINKCODE_TOKEN")
            .env_remove("LINKCODE_USER_ID")
            .env_remove("LINKCODE_LOG");
        if let Some(url) = &self.api_url {
            cmd.env("LINKCODE_API_URL", url);
        }
        cmd
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.command(args)
            .output()
            .expect("Failed to execute linkcode command")
    }

    pub fn run_with_env(&self, args: &[&str], env: &[(&str, &str)]) -> Output {
        let mut cmd = self.command(args);
        for (key, value) in env {
            cmd.env(key, value);
        }
        cmd.output().expect("Failed to execute linkcode command")
    }

    pub fn run_success(&self, args: &[&str]) -> String {
        let output = self.run(args);
        if !output.status.success() {
            panic!(
                "Command {:?} failed with status {:?}\nstdout: {}\nstderr: {}",
                args,
                output.status,
                String::from_utf8_lossy(&output.stdout),
                String::from_utf8_lossy(&output.stderr)
            );
        }
        String::from_utf8_lossy(&output.stdout).to_string()
    }

    pub fn run_failure(&self, args: &[&str]) -> String {
        let output = self.run(args);
        assert!(
            !output.status.success(),
            "Expected command {:?} to fail, but it succeeded",
            args
        );
        String::from_utf8_lossy(&output.stderr).to_string()
    }

    pub fn config_path(&self) -> std::path::PathBuf {
        self.temp_dir.path().join("config.yaml")
    }

    pub fn write_config(&self, content: &str) {
        fs::write(self.config_path(), content).expect("Failed to write config file");
    }

    pub fn read_config(&self) -> String {
        fs::read_to_string(self.config_path()).expect("Failed to read config file")
    }
}
