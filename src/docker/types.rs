use std::time::Duration;

/// Describes a `docker` invocation. `args` is the full argument list after
/// the binary name; `stdin` is written to the child and then closed.
#[derive(Debug, Clone)]
pub struct DockerCommand {
    pub args: Vec<String>,
    pub timeout: Duration,
    pub stdin: Option<String>,
}

impl DockerCommand {
    pub fn new(args: Vec<String>, timeout: Duration) -> Self {
        Self {
            args,
            timeout,
            stdin: None,
        }
    }

    /// Human-readable form for logs and errors. Never includes stdin.
    pub fn display(&self) -> String {
        format!("docker {}", self.args.join(" "))
    }
}

/// Outcome of a docker command that ran to completion.
#[derive(Debug, Clone, Default)]
pub struct CommandOutput {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_joins_args() {
        let cmd = DockerCommand::new(
            vec!["rm".into(), "-f".into(), "web".into()],
            Duration::from_secs(1),
        );
        assert_eq!(cmd.display(), "docker rm -f web");
    }

    #[test]
    fn display_hides_stdin() {
        let mut cmd = DockerCommand::new(vec!["login".into()], Duration::from_secs(1));
        cmd.stdin = Some("hunter2".into());
        assert!(!cmd.display().contains("hunter2"));
    }
}
