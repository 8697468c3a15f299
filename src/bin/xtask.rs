use anyhow::Context;
use clap::{Parser, Subcommand};
use endureio::tasks::{SystemRunner, Task, TaskConfig, TaskRunner};
use endureio::utils::logger;
use endureio::EtlError;

#[derive(Parser)]
#[command(name = "xtask")]
#[command(about = "Test, package and publish endureio")]
struct Args {
    #[command(subcommand)]
    command: Command,

    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Command {
    /// Run the test suite; extra arguments go to `cargo test`
    Test {
        /// Arguments for `cargo test`, e.g. a test name filter
        #[arg(allow_hyphen_values = true)]
        args: Vec<String>,

        /// Arguments after `--`, handed to the test binaries
        #[arg(last = true)]
        test_args: Vec<String>,
    },
    /// Remove `dist` and package the crate into it
    Build,
    /// Build, then upload to the registry
    Publish,
}

impl Command {
    fn into_task(self) -> Task {
        match self {
            Command::Test { mut args, test_args } => {
                // clap keeps a `--` that follows other arguments but strips a leading one
                if !test_args.is_empty() {
                    args.push("--".to_string());
                    args.extend(test_args);
                }
                Task::Test { args }
            }
            Command::Build => Task::Build,
            Command::Publish => Task::Publish,
        }
    }
}

fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    logger::init_cli_logger(args.verbose);

    let task = args.command.into_task();

    let mut runner = TaskRunner::new(SystemRunner, TaskConfig::default());
    match runner.run(&task) {
        Ok(()) => Ok(()),
        Err(EtlError::TaskFailed { step, code }) => {
            eprintln!("'{}' failed", step);
            std::process::exit(code.unwrap_or(1));
        }
        Err(e) => Err(e).with_context(|| format!("task '{}' could not run", task.name())),
    }
}
