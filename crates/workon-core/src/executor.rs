//! Invocation of the external developer tool.
//!
//! Every step talks to the tool through [`CommandExecutor`] so tests can swap
//! in a scripted double instead of spawning processes.

use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use tracing::{debug, instrument, warn};

use crate::error::CommandError;

/// Runs the external tool with a fixed argument prefix.
pub trait CommandExecutor {
    /// Runs the tool with captured output and returns trimmed stdout.
    ///
    /// # Errors
    /// Returns [`CommandError::Failed`] carrying the captured output when the
    /// tool exits non-zero.
    fn run(&self, args: &[&str]) -> Result<String, CommandError>;

    /// Runs the tool with the caller's standard streams and returns its exit
    /// code. Used for long-lived or interactive invocations.
    fn run_streamed(&self, args: &[&str]) -> Result<i32, CommandError>;
}

/// Production executor spawning the `ffx` binary.
#[derive(Debug, Clone)]
pub struct FfxExecutor {
    tool: PathBuf,
    env_root: Option<PathBuf>,
}

impl FfxExecutor {
    /// Creates an executor for `tool`. When `env_root` is set every
    /// invocation is prefixed with `--env-root <env_root>`.
    pub fn new(tool: impl AsRef<Path>, env_root: Option<PathBuf>) -> Self {
        let tool = tool.as_ref();
        // The tool is run from the project root, so a relative path must be
        // pinned down before any invocation.
        let tool = std::fs::canonicalize(tool).unwrap_or_else(|e| {
            warn!("could not resolve tool path '{}': {}", tool.display(), e);
            tool.to_path_buf()
        });
        Self { tool, env_root }
    }

    pub fn tool(&self) -> &Path {
        &self.tool
    }

    fn argv(&self, args: &[&str]) -> Vec<String> {
        let mut argv = Vec::with_capacity(args.len() + 2);
        if let Some(root) = &self.env_root {
            argv.push("--env-root".to_string());
            argv.push(root.to_string_lossy().into_owned());
        }
        argv.extend(args.iter().map(|s| (*s).to_string()));
        argv
    }

    fn describe(&self, argv: &[String]) -> String {
        format!("{} {}", self.tool.display(), argv.join(" "))
    }
}

impl CommandExecutor for FfxExecutor {
    #[instrument(skip(self))]
    fn run(&self, args: &[&str]) -> Result<String, CommandError> {
        let argv = self.argv(args);
        let command = self.describe(&argv);
        debug!("run: {}", command);

        let output = Command::new(&self.tool)
            .args(&argv)
            .stdin(Stdio::null())
            .output()
            .map_err(|source| CommandError::Spawn {
                command: command.clone(),
                source,
            })?;

        if !output.status.success() {
            let mut captured = String::from_utf8_lossy(&output.stdout).into_owned();
            captured.push_str(&String::from_utf8_lossy(&output.stderr));
            debug!("'{}' failed with output: {}", command, captured.trim());
            return Err(CommandError::Failed {
                command,
                status: output.status.to_string(),
                output: captured,
            });
        }

        Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
    }

    #[instrument(skip(self))]
    fn run_streamed(&self, args: &[&str]) -> Result<i32, CommandError> {
        let argv = self.argv(args);
        let command = self.describe(&argv);
        debug!("run streamed: {}", command);

        let status = Command::new(&self.tool)
            .args(&argv)
            .status()
            .map_err(|source| CommandError::Spawn { command, source })?;

        // Killed by a signal: no exit code, report it as a generic failure.
        Ok(status.code().unwrap_or(-1))
    }
}

#[cfg(test)]
pub(crate) mod fake {
    use std::cell::RefCell;
    use std::collections::{HashMap, VecDeque};
    use std::rc::Rc;

    use super::CommandExecutor;
    use crate::error::CommandError;

    type Response = Result<String, String>;

    #[derive(Debug, Default)]
    struct Script {
        once: HashMap<String, VecDeque<Response>>,
        always: HashMap<String, Response>,
        calls: Vec<String>,
    }

    /// Records every invocation and answers from pre-configured responses.
    ///
    /// Responses are keyed by the space-joined argument list. Unscripted
    /// invocations succeed with empty output.
    #[derive(Debug, Clone, Default)]
    pub(crate) struct ScriptedExecutor {
        script: Rc<RefCell<Script>>,
    }

    impl ScriptedExecutor {
        pub(crate) fn new() -> Self {
            Self::default()
        }

        /// Answers every invocation of `command` with `stdout`.
        pub(crate) fn respond(&self, command: &str, stdout: &str) -> &Self {
            self.script
                .borrow_mut()
                .always
                .insert(command.to_string(), Ok(stdout.to_string()));
            self
        }

        /// Fails every invocation of `command`.
        pub(crate) fn fail(&self, command: &str) -> &Self {
            self.script
                .borrow_mut()
                .always
                .insert(command.to_string(), Err(format!("{command} failed")));
            self
        }

        /// Queues a one-shot response that takes priority over `respond`/`fail`.
        pub(crate) fn push(&self, command: &str, response: Response) -> &Self {
            self.script
                .borrow_mut()
                .once
                .entry(command.to_string())
                .or_default()
                .push_back(response);
            self
        }

        pub(crate) fn calls(&self) -> Vec<String> {
            self.script.borrow().calls.clone()
        }

        pub(crate) fn count(&self, command: &str) -> usize {
            self.script
                .borrow()
                .calls
                .iter()
                .filter(|c| c.as_str() == command)
                .count()
        }

        fn answer(&self, args: &[&str]) -> (String, Response) {
            let key = args.join(" ");
            let mut script = self.script.borrow_mut();
            script.calls.push(key.clone());
            let queued = script.once.get_mut(&key).and_then(VecDeque::pop_front);
            let response = queued
                .or_else(|| script.always.get(&key).cloned())
                .unwrap_or_else(|| Ok(String::new()));
            (key, response)
        }
    }

    impl CommandExecutor for ScriptedExecutor {
        fn run(&self, args: &[&str]) -> Result<String, CommandError> {
            match self.answer(args) {
                (_, Ok(stdout)) => Ok(stdout.trim().to_string()),
                (command, Err(output)) => Err(CommandError::Failed {
                    command,
                    status: "exit status: 1".to_string(),
                    output,
                }),
            }
        }

        fn run_streamed(&self, args: &[&str]) -> Result<i32, CommandError> {
            match self.answer(args) {
                (_, Ok(_)) => Ok(0),
                (_, Err(_)) => Ok(1),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use std::os::unix::fs::PermissionsExt;
    use tempfile::TempDir;

    fn create_mock_tool(dir: &TempDir) -> PathBuf {
        let script_path = dir.path().join("ffx");
        let script = r#"#!/usr/bin/env sh
if [ "$1" = "fail" ]; then
    echo "something broke"
    exit 3
fi
echo "  $@  "
"#;
        fs::write(&script_path, script).unwrap();
        let mut perms = fs::metadata(&script_path).unwrap().permissions();
        perms.set_mode(0o755);
        fs::set_permissions(&script_path, perms).unwrap();
        script_path
    }

    #[test]
    fn run_trims_stdout_and_prefixes_env_root() {
        let dir = tempfile::tempdir().unwrap();
        let tool = create_mock_tool(&dir);
        let executor = FfxExecutor::new(&tool, Some(PathBuf::from("/work/project")));

        let out = executor.run(&["sdk", "version"]).expect("mock tool should succeed");
        assert_eq!(out, "--env-root /work/project sdk version");
    }

    #[test]
    fn run_without_env_root_passes_args_through() {
        let dir = tempfile::tempdir().unwrap();
        let tool = create_mock_tool(&dir);
        let executor = FfxExecutor::new(&tool, None);

        let out = executor.run(&["target", "list"]).unwrap();
        assert_eq!(out, "target list");
    }

    #[test]
    fn run_failure_carries_captured_output() {
        let dir = tempfile::tempdir().unwrap();
        let tool = create_mock_tool(&dir);
        let executor = FfxExecutor::new(&tool, None);

        let err = executor.run(&["fail"]).expect_err("non-zero exit must fail");
        assert!(matches!(err, CommandError::Failed { .. }));
        assert!(err.output().contains("something broke"));
    }

    #[test]
    fn run_streamed_reports_exit_code() {
        let dir = tempfile::tempdir().unwrap();
        let tool = create_mock_tool(&dir);
        let executor = FfxExecutor::new(&tool, None);

        assert_eq!(executor.run_streamed(&["fail"]).unwrap(), 3);
        assert_eq!(executor.run_streamed(&["ok"]).unwrap(), 0);
    }

    #[test]
    fn missing_tool_is_a_spawn_error() {
        let executor = FfxExecutor::new("/nonexistent/ffx", None);
        let err = executor.run(&["sdk", "version"]).unwrap_err();
        assert!(matches!(err, CommandError::Spawn { .. }));
    }
}
