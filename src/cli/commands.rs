//! CLI command definitions using clap.
//!
//! Defines the main CLI structure and subcommands:
//! - run: submit demo tasks to a queue and watch them execute
//! - queues: list configured queues

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use taskgate::Priority;

/// Taskgate - priority task scheduler with bounded concurrency
#[derive(Parser, Debug)]
#[command(name = "taskgate")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Optional config file path
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

impl Cli {
    /// Check if verbose mode is enabled
    pub fn is_verbose(&self) -> bool {
        self.verbose
    }
}

/// Main subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Submit demo tasks and wait until the queue drains
    Run {
        /// Tasks as `priority[:millis]`, e.g. `high:300 low medium:50`
        #[arg(required = true)]
        tasks: Vec<TaskSpec>,

        /// Queue to submit to
        #[arg(short, long, default_value = "default")]
        queue: String,

        /// Override the queue's concurrency limit
        #[arg(short, long)]
        max_concurrency: Option<usize>,

        /// Abort everything after this many milliseconds
        #[arg(short, long)]
        abort_after: Option<u64>,

        /// Print the final task states as JSON
        #[arg(long)]
        json: bool,
    },

    /// List configured queues
    Queues,
}

/// One demo task from the command line.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TaskSpec {
    pub priority: Priority,
    pub duration: Option<Duration>,
}

impl FromStr for TaskSpec {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (priority, millis) = match s.split_once(':') {
            Some((priority, millis)) => (priority, Some(millis)),
            None => (s, None),
        };

        let priority: Priority = priority.parse().map_err(|e| format!("{}", e))?;
        let duration = millis
            .map(|ms| {
                ms.parse::<u64>()
                    .map(Duration::from_millis)
                    .map_err(|_| format!("Invalid duration '{}' in task '{}'", ms, s))
            })
            .transpose()?;

        Ok(Self { priority, duration })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_debug_assert() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_requires_subcommand() {
        assert!(Cli::try_parse_from(["taskgate"]).is_err());
    }

    #[test]
    fn test_cli_verbose_flag() {
        let cli = Cli::try_parse_from(["taskgate", "-v", "queues"]).unwrap();
        assert!(cli.is_verbose());
    }

    #[test]
    fn test_cli_config_option() {
        let cli = Cli::try_parse_from(["taskgate", "queues", "-c", "/path/to/taskgate.yml"]).unwrap();
        assert_eq!(cli.config.as_ref(), Some(&PathBuf::from("/path/to/taskgate.yml")));
    }

    #[test]
    fn test_run_command_defaults() {
        let cli = Cli::try_parse_from(["taskgate", "run", "high:300", "low"]).unwrap();
        match cli.command {
            Commands::Run {
                tasks,
                queue,
                max_concurrency,
                abort_after,
                json,
            } => {
                assert_eq!(tasks.len(), 2);
                assert_eq!(tasks[0].priority, Priority::High);
                assert_eq!(tasks[0].duration, Some(Duration::from_millis(300)));
                assert_eq!(tasks[1].duration, None);
                assert_eq!(queue, "default");
                assert!(max_concurrency.is_none());
                assert!(abort_after.is_none());
                assert!(!json);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_command_options() {
        let cli = Cli::try_parse_from([
            "taskgate", "run", "-q", "images", "-m", "2", "-a", "150", "--json", "medium",
        ])
        .unwrap();
        match cli.command {
            Commands::Run {
                queue,
                max_concurrency,
                abort_after,
                json,
                ..
            } => {
                assert_eq!(queue, "images");
                assert_eq!(max_concurrency, Some(2));
                assert_eq!(abort_after, Some(150));
                assert!(json);
            }
            _ => panic!("Expected run command"),
        }
    }

    #[test]
    fn test_run_requires_tasks() {
        assert!(Cli::try_parse_from(["taskgate", "run"]).is_err());
    }

    #[test]
    fn test_task_spec_parse() {
        assert_eq!(
            "low:25".parse::<TaskSpec>().unwrap(),
            TaskSpec {
                priority: Priority::Low,
                duration: Some(Duration::from_millis(25)),
            }
        );
        assert_eq!("H".parse::<TaskSpec>().unwrap().priority, Priority::High);
    }

    #[test]
    fn test_task_spec_rejects_garbage() {
        assert!("urgent:10".parse::<TaskSpec>().is_err());
        assert!("high:soon".parse::<TaskSpec>().unwrap_err().contains("Invalid duration"));
    }
}
