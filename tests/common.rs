use std::fs;
use std::path::PathBuf;
use std::process::{Command, Output};
use tempfile::TempDir;

// Some helpers are only used by the e2e tests behind the "e2e" feature.
#[allow(dead_code)]
pub struct TestContext {
    pub _temp_dir: TempDir,
    pub root: PathBuf,
    pub config_path: PathBuf,
    pub bin_dir: PathBuf,
    pub bin_path: PathBuf,
}

#[allow(dead_code)]
impl TestContext {
    pub fn new() -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let root = temp_dir.path().join(".kelp");
        let config_path = root.join("kelp.json");
        let bin_dir = root.join("bin");

        let bin_path = PathBuf::from(env!("CARGO_BIN_EXE_kelp"));

        Self {
            _temp_dir: temp_dir,
            root,
            config_path,
            bin_dir,
            bin_path,
        }
    }

    /// A kelp command isolated in the temp dir. The release API points at a
    /// closed local port so nothing reaches the network by accident.
    pub fn cmd(&self) -> Command {
        let mut cmd = Command::new(&self.bin_path);
        cmd.env("KELP_HOME", &self.root);
        cmd.env("HOME", self._temp_dir.path());
        cmd.env("KELP_GITHUB_API_URL", "http://127.0.0.1:9");
        cmd.env_remove("KELP_CONFIG");
        cmd.env_remove("GITHUB_TOKEN");
        cmd.env_remove("RUST_LOG");
        cmd
    }

    /// Same as [`cmd`](Self::cmd) but talking to the real GitHub API.
    pub fn online_cmd(&self) -> Command {
        let mut cmd = self.cmd();
        cmd.env_remove("KELP_GITHUB_API_URL");
        if let Ok(token) = std::env::var("GITHUB_TOKEN") {
            cmd.env("GITHUB_TOKEN", token);
        }
        cmd
    }

    pub fn run(&self, args: &[&str]) -> CommandOutput {
        self.cmd()
            .args(args)
            .output()
            .expect("Failed to run kelp")
            .into()
    }

    pub fn write_config(&self, json: &str) {
        fs::create_dir_all(&self.root).expect("Failed to create kelp root");
        fs::write(&self.config_path, json).expect("Failed to write config");
    }

    pub fn read_config(&self) -> serde_json::Value {
        let content = fs::read_to_string(&self.config_path).expect("Failed to read config");
        serde_json::from_str(&content).expect("Config was not valid JSON")
    }
}

#[allow(dead_code)]
pub struct CommandOutput {
    pub stdout: String,
    pub stderr: String,
    pub status: std::process::ExitStatus,
}

impl From<Output> for CommandOutput {
    fn from(output: Output) -> Self {
        Self {
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
            status: output.status,
        }
    }
}

#[allow(dead_code)]
impl CommandOutput {
    pub fn assert_success(&self) -> &Self {
        if !self.status.success() {
            panic!(
                "Command failed with status {:?}\nstdout: {}\nstderr: {}",
                self.status.code(),
                self.stdout,
                self.stderr
            );
        }
        self
    }

    pub fn assert_failure(&self) -> &Self {
        if self.status.success() {
            panic!(
                "Command unexpectedly succeeded\nstdout: {}\nstderr: {}",
                self.stdout, self.stderr
            );
        }
        self
    }

    pub fn assert_stdout_contains(&self, text: &str) -> &Self {
        assert!(
            self.stdout.contains(text),
            "Stdout did not contain '{}'\nActual stdout: {}",
            text,
            self.stdout
        );
        self
    }

    pub fn assert_stderr_contains(&self, text: &str) -> &Self {
        assert!(
            self.stderr.contains(text),
            "Stderr did not contain '{}'\nActual stderr: {}",
            text,
            self.stderr
        );
        self
    }
}
