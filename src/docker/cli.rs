// Subprocess execution for the container runtime CLI

use crate::docker::container::chomp;
use crate::errors::{MysqlTestError, Result};
use std::process::{Command, Output};

/// A docker-compatible command line tool.
///
/// `run` is for sub-commands whose stdout carries data (`run -d`, `inspect`),
/// `status` for those where only the exit code matters (`kill`, `rm`).
/// Errors come back as [`MysqlTestError::Io`] when the program could not be
/// spawned and as [`MysqlTestError::Launch`] on a non-zero exit; callers
/// re-classify as needed.
pub trait ContainerRuntime: Send + Sync {
    /// Execute and return stdout with trailing newlines removed
    fn run(&self, args: &[String]) -> Result<String>;

    /// Execute and report only whether the command succeeded
    fn status(&self, args: &[String]) -> Result<()>;
}

/// Production runtime: invokes `docker` (or a compatible program) directly, no shell
#[derive(Debug, Clone)]
pub struct DockerCli {
    program: String,
}

impl Default for DockerCli {
    fn default() -> Self {
        Self::new("docker")
    }
}

impl DockerCli {
    pub fn new(program: impl Into<String>) -> Self {
        Self {
            program: program.into(),
        }
    }

    pub fn program(&self) -> &str {
        &self.program
    }

    /// Check if the runtime is available on the system
    pub fn is_available(&self) -> bool {
        Command::new(&self.program)
            .arg("--version")
            .output()
            .map(|output| output.status.success())
            .unwrap_or(false)
    }

    fn execute(&self, args: &[String]) -> Result<Output> {
        tracing::debug!("{} {}", self.program, args.join(" "));

        let output = Command::new(&self.program).args(args).output()?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(MysqlTestError::Launch(format!(
                "{} {} exited with {}: {}",
                self.program,
                args.first().map(String::as_str).unwrap_or_default(),
                output.status,
                stderr.trim()
            )));
        }

        Ok(output)
    }
}

impl ContainerRuntime for DockerCli {
    fn run(&self, args: &[String]) -> Result<String> {
        let output = self.execute(args)?;
        Ok(chomp(&String::from_utf8_lossy(&output.stdout)).to_string())
    }

    fn status(&self, args: &[String]) -> Result<()> {
        self.execute(args).map(|_| ())
    }
}
