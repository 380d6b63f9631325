//! Task execution and motion planning CLI.
//!
//! Parses instructions into tasks, shows the guarded plan, and runs tasks
//! against the table-top simulator configured in `taskbot.toml`.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result, bail};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use serde_json::{Value, json};
use tracing::debug;

use taskbot::core::parse::parse_instruction;
use taskbot::executor::{self, ExecutionResult, Executor};
use taskbot::exit_codes;
use taskbot::io::config::{DEFAULT_CONFIG_PATH, TaskbotConfig, load_config, write_config};
use taskbot::io::tabletop::TableTopSim;
use taskbot::logging;

#[derive(Parser)]
#[command(
    name = "taskbot",
    version,
    about = "Symbolic task execution with grid and trajectory planning"
)]
struct Cli {
    /// Config file; missing file means built-in defaults.
    #[arg(long, global = true, default_value = DEFAULT_CONFIG_PATH)]
    config: PathBuf,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Write the default config file.
    Init {
        /// Overwrite an existing file.
        #[arg(short, long)]
        force: bool,
    },
    /// Turn a free-text instruction into task JSON.
    Parse {
        /// Instruction such as "put the red mug on the shelf".
        text: String,
    },
    /// Validate a task and print it after guardrail injection.
    Plan {
        #[command(flatten)]
        input: TaskInput,
    },
    /// Execute a task in the simulator.
    Run {
        #[command(flatten)]
        input: TaskInput,
        /// Wall-clock budget in seconds (overrides config).
        #[arg(long)]
        timeout: Option<f64>,
        /// Extra attempts after the first failure (overrides config).
        #[arg(long)]
        retries: Option<u32>,
        /// Print the full result as JSON.
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
#[group(required = true, multiple = false)]
struct TaskInput {
    /// Task JSON file.
    #[arg(long)]
    task: Option<PathBuf>,
    /// Free-text instruction parsed into a task.
    #[arg(long)]
    text: Option<String>,
}

impl TaskInput {
    fn load(&self) -> Result<Value> {
        match (&self.task, &self.text) {
            (Some(path), _) => read_task_file(path),
            (None, Some(text)) => Ok(parse_instruction(text).to_value()),
            (None, None) => bail!("either --task or --text is required"),
        }
    }
}

fn main() {
    logging::init();
    match run() {
        Ok(code) => std::process::exit(code),
        Err(err) => {
            eprintln!("{:#}", err);
            std::process::exit(exit_codes::INVALID);
        }
    }
}

fn run() -> Result<i32> {
    let cli = Cli::parse();
    match cli.command {
        Command::Init { force } => cmd_init(&cli.config, force),
        Command::Parse { text } => cmd_parse(&text),
        Command::Plan { input } => cmd_plan(&input),
        Command::Run {
            input,
            timeout,
            retries,
            json,
        } => cmd_run(&cli.config, &input, timeout, retries, json),
    }
}

fn cmd_init(path: &Path, force: bool) -> Result<i32> {
    if path.exists() && !force {
        bail!("{} already exists (use --force to overwrite)", path.display());
    }
    write_config(path, &TaskbotConfig::default())?;
    println!("wrote {}", path.display());
    Ok(exit_codes::OK)
}

fn cmd_parse(text: &str) -> Result<i32> {
    print_json(&parse_instruction(text))?;
    Ok(exit_codes::OK)
}

fn cmd_plan(input: &TaskInput) -> Result<i32> {
    let raw = input.load()?;
    let guarded = executor::plan(&raw).context("invalid task")?;
    print_json(&json!({
        "validated_task": guarded.task,
        "corrections": guarded.corrections,
    }))?;
    Ok(exit_codes::OK)
}

fn cmd_run(
    config_path: &Path,
    input: &TaskInput,
    timeout: Option<f64>,
    retries: Option<u32>,
    as_json: bool,
) -> Result<i32> {
    let cfg = load_config(config_path)?;
    let timeout = match timeout {
        Some(secs) if secs > 0.0 => Duration::try_from_secs_f64(secs)
            .with_context(|| format!("--timeout {secs} is out of range"))?,
        Some(secs) => bail!("--timeout must be > 0 (got {secs})"),
        None => cfg.executor.timeout(),
    };
    let retries = retries.unwrap_or(cfg.executor.retries);
    debug!(?timeout, retries, "run settings");

    let mut executor = build_executor(&cfg);
    let raw = input.load()?;
    let result = executor
        .run(&raw, timeout, retries)
        .context("invalid task")?;

    if as_json {
        print_json(&result)?;
    } else {
        print_summary(&result);
    }
    Ok(if result.success {
        exit_codes::OK
    } else {
        exit_codes::FAILED
    })
}

fn build_executor(cfg: &TaskbotConfig) -> Executor<TableTopSim> {
    Executor::new(TableTopSim::new(cfg.scene.clone())).with_smoother(cfg.smoother.clone())
}

fn read_task_file(path: &Path) -> Result<Value> {
    let raw = fs::read_to_string(path).with_context(|| format!("read {}", path.display()))?;
    serde_json::from_str(&raw).with_context(|| format!("parse {}", path.display()))
}

fn print_json<T: Serialize>(value: &T) -> Result<()> {
    let payload = serde_json::to_string_pretty(value).context("serialize json")?;
    println!("{payload}");
    Ok(())
}

fn print_summary(result: &ExecutionResult) {
    println!("success: {}", result.success);
    println!("attempts: {}", result.attempts);
    println!("total_time_s: {:.4}", result.metrics.total_time_s);
    println!("planning_time_s: {:.4}", result.metrics.planning_time_s);
    println!("corrections: {}", result.metrics.corrections);
    println!("fallbacks: {}", result.metrics.fallbacks);
    if !result.notes.is_empty() {
        println!("notes: {}", result.notes);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_init() {
        let cli = Cli::parse_from(["taskbot", "init"]);
        assert!(matches!(cli.command, Command::Init { force: false }));
        assert_eq!(cli.config, PathBuf::from("taskbot.toml"));
    }

    #[test]
    fn parse_global_config_after_subcommand() {
        let cli = Cli::parse_from(["taskbot", "plan", "--text", "mug", "--config", "alt.toml"]);
        assert_eq!(cli.config, PathBuf::from("alt.toml"));
        assert!(matches!(cli.command, Command::Plan { .. }));
    }

    #[test]
    fn parse_run_overrides() {
        let cli = Cli::parse_from([
            "taskbot",
            "run",
            "--task",
            "task.json",
            "--timeout",
            "2.5",
            "--retries",
            "0",
            "--json",
        ]);
        let Command::Run {
            input,
            timeout,
            retries,
            json,
        } = cli.command
        else {
            panic!("expected run");
        };
        assert_eq!(input.task, Some(PathBuf::from("task.json")));
        assert_eq!(timeout, Some(2.5));
        assert_eq!(retries, Some(0));
        assert!(json);
    }

    #[test]
    fn task_and_text_are_mutually_exclusive() {
        assert!(Cli::try_parse_from(["taskbot", "run", "--task", "t.json", "--text", "mug"]).is_err());
        assert!(Cli::try_parse_from(["taskbot", "plan"]).is_err());
    }

    #[test]
    fn text_input_builds_parsed_task() {
        let input = TaskInput {
            task: None,
            text: Some("put the blue cube on the desk".to_string()),
        };
        let raw = input.load().expect("load");
        assert_eq!(raw["goal"], json!("tidy_table"));
        assert_eq!(raw["steps"][2]["args"]["location"], json!("table"));
    }

    #[test]
    fn run_with_config_file_reports_failure_code() {
        let (_dir, path) = taskbot::test_support::config_file(
            "[executor]\nretries = 0\n\n[[scene.obstacles]]\nx0 = 48\nx1 = 53\ny0 = 8\ny1 = 13\n",
        );
        let input = TaskInput {
            task: None,
            text: Some("put the mug on the shelf".to_string()),
        };
        let code = cmd_run(&path, &input, None, None, true).expect("run");
        assert_eq!(code, exit_codes::FAILED);
    }
}
