//! Release automation: run the test suite, package the crate, publish it.
//!
//! Each task expands to an ordered list of [`Step`]s. Steps run one after
//! another and the first failure stops the task with the failing command's
//! exit code.

use crate::utils::error::{EtlError, Result};
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Task {
    /// `cargo test`, with extra arguments passed through verbatim, `--` included.
    Test { args: Vec<String> },
    /// Clear the distribution directory, then `cargo package` into it.
    Build,
    /// Everything `Build` does, then `cargo publish` from the same target dir.
    Publish,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    RemoveDir(PathBuf),
    Run { program: String, args: Vec<String> },
}

impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Step::RemoveDir(path) => write!(f, "remove {}", path.display()),
            Step::Run { program, args } if args.is_empty() => write!(f, "{}", program),
            Step::Run { program, args } => write!(f, "{} {}", program, args.join(" ")),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskConfig {
    pub cargo: String,
    pub dist_dir: PathBuf,
}

impl Default for TaskConfig {
    fn default() -> Self {
        Self {
            cargo: std::env::var("CARGO").unwrap_or_else(|_| "cargo".to_string()),
            dist_dir: PathBuf::from("dist"),
        }
    }
}

impl Task {
    pub fn name(&self) -> &'static str {
        match self {
            Task::Test { .. } => "test",
            Task::Build => "build",
            Task::Publish => "publish",
        }
    }

    pub fn plan(&self, config: &TaskConfig) -> Vec<Step> {
        let cargo = |args: Vec<String>| Step::Run {
            program: config.cargo.clone(),
            args,
        };

        let target_dir = config.dist_dir.to_string_lossy().into_owned();

        match self {
            Task::Test { args } => {
                let mut full = vec!["test".to_string()];
                full.extend(args.iter().cloned());
                vec![cargo(full)]
            }
            Task::Build => vec![
                Step::RemoveDir(config.dist_dir.clone()),
                cargo(vec![
                    "package".to_string(),
                    "--target-dir".to_string(),
                    target_dir,
                ]),
            ],
            Task::Publish => {
                let mut steps = Task::Build.plan(config);
                // same target dir as the package step
                steps.push(cargo(vec![
                    "publish".to_string(),
                    "--target-dir".to_string(),
                    target_dir,
                ]));
                steps
            }
        }
    }
}

/// Outcome of one external command.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandStatus {
    pub success: bool,
    /// `None` when the process was terminated by a signal.
    pub code: Option<i32>,
}

/// Side effects of a task, separated so step ordering can be tested.
pub trait CommandRunner {
    fn run_command(&mut self, program: &str, args: &[String]) -> std::io::Result<CommandStatus>;

    /// Removing a directory that does not exist must succeed.
    fn remove_dir(&mut self, path: &Path) -> std::io::Result<()>;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemRunner;

impl CommandRunner for SystemRunner {
    fn run_command(&mut self, program: &str, args: &[String]) -> std::io::Result<CommandStatus> {
        let status = std::process::Command::new(program).args(args).status()?;
        Ok(CommandStatus {
            success: status.success(),
            code: status.code(),
        })
    }

    fn remove_dir(&mut self, path: &Path) -> std::io::Result<()> {
        match std::fs::remove_dir_all(path) {
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }
}

pub struct TaskRunner<R: CommandRunner> {
    runner: R,
    config: TaskConfig,
}

impl<R: CommandRunner> TaskRunner<R> {
    pub fn new(runner: R, config: TaskConfig) -> Self {
        Self { runner, config }
    }

    pub fn into_inner(self) -> R {
        self.runner
    }

    pub fn run(&mut self, task: &Task) -> Result<()> {
        tracing::info!("Running task '{}'", task.name());

        for step in task.plan(&self.config) {
            tracing::info!("> {}", step);
            match &step {
                Step::RemoveDir(path) => self.runner.remove_dir(path)?,
                Step::Run { program, args } => {
                    let status = self.runner.run_command(program, args)?;
                    if !status.success {
                        tracing::error!("'{}' exited with {:?}", step, status.code);
                        return Err(EtlError::TaskFailed {
                            step: step.to_string(),
                            code: status.code,
                        });
                    }
                }
            }
        }

        tracing::info!("Task '{}' finished", task.name());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    /// Records every step and fails the command whose first argument matches.
    #[derive(Default)]
    struct RecordingRunner {
        log: Vec<String>,
        fail_on: Option<(&'static str, i32)>,
    }

    impl CommandRunner for RecordingRunner {
        fn run_command(&mut self, program: &str, args: &[String]) -> std::io::Result<CommandStatus> {
            self.log.push(format!("{} {}", program, args.join(" ")));
            match self.fail_on {
                Some((sub, code)) if args.first().map(String::as_str) == Some(sub) => {
                    Ok(CommandStatus {
                        success: false,
                        code: Some(code),
                    })
                }
                _ => Ok(CommandStatus {
                    success: true,
                    code: Some(0),
                }),
            }
        }

        fn remove_dir(&mut self, path: &Path) -> std::io::Result<()> {
            self.log.push(format!("rm {}", path.display()));
            Ok(())
        }
    }

    fn config() -> TaskConfig {
        TaskConfig {
            cargo: "cargo".to_string(),
            dist_dir: PathBuf::from("dist"),
        }
    }

    #[test]
    fn test_forwards_extra_arguments() {
        let task = Task::Test {
            args: vec!["--lib".to_string(), "reader".to_string()],
        };
        assert_eq!(
            task.plan(&config()),
            vec![Step::Run {
                program: "cargo".to_string(),
                args: vec!["test".to_string(), "--lib".to_string(), "reader".to_string()],
            }]
        );
    }

    #[test]
    fn test_build_cleans_before_packaging() {
        let mut runner = TaskRunner::new(RecordingRunner::default(), config());
        runner.run(&Task::Build).unwrap();

        assert_eq!(
            runner.into_inner().log,
            vec!["rm dist", "cargo package --target-dir dist"]
        );
    }

    #[test]
    fn test_publish_builds_before_upload() {
        let mut runner = TaskRunner::new(RecordingRunner::default(), config());
        runner.run(&Task::Publish).unwrap();

        assert_eq!(
            runner.into_inner().log,
            vec![
                "rm dist",
                "cargo package --target-dir dist",
                "cargo publish --target-dir dist"
            ]
        );

        let steps = Task::Publish.plan(&config());
        assert_eq!(
            steps.last(),
            Some(&Step::Run {
                program: "cargo".to_string(),
                args: vec![
                    "publish".to_string(),
                    "--target-dir".to_string(),
                    "dist".to_string()
                ],
            })
        );
    }

    #[test]
    fn test_failure_stops_and_keeps_exit_code() {
        let recording = RecordingRunner {
            fail_on: Some(("package", 101)),
            ..Default::default()
        };
        let mut runner = TaskRunner::new(recording, config());

        let err = runner.run(&Task::Publish).unwrap_err();
        assert!(matches!(
            &err,
            EtlError::TaskFailed { step, code: Some(101) } if step == "cargo package --target-dir dist"
        ));
        assert_eq!(err.exit_code(), 101);
        assert!(!runner
            .into_inner()
            .log
            .iter()
            .any(|entry| entry.contains("publish")));
    }

    #[test]
    fn test_system_runner_removes_missing_dir() {
        let dir = TempDir::new().unwrap();
        let dist = dir.path().join("dist");
        let mut runner = SystemRunner;

        assert!(runner.remove_dir(&dist).is_ok());

        std::fs::create_dir_all(dist.join("nested")).unwrap();
        std::fs::write(dist.join("nested/pkg.crate"), b"x").unwrap();
        runner.remove_dir(&dist).unwrap();
        assert!(!dist.exists());
    }
}
