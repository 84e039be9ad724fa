use anyhow::{bail, Context, Result};
use clap::{Parser, Subcommand};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

use crate::config::Config;
use crate::driver::{self, Job};
use crate::interpreter::codec;
use crate::interpreter::{compile, Process, RunStatus, Script, SerializedState};

#[derive(Parser)]
#[command(name = "stagehand")]
#[command(about = "Stagehand - a resumable embedded scripting language", long_about = None)]
pub struct Cli {
    /// Path to config file (overrides default search)
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Steps each process runs per tick (overrides config file and env vars)
    #[arg(long, global = true)]
    pub steps_per_tick: Option<usize>,

    /// Maximum call depth (overrides config file and env vars)
    #[arg(long, global = true)]
    pub max_call_depth: Option<usize>,

    /// Log filter directive, e.g. "debug" or "stagehand=trace"
    #[arg(long, global = true)]
    pub log: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run one or more scripts, interleaved
    Run {
        /// Script source files or compiled scripts
        #[arg(required = true)]
        files: Vec<PathBuf>,
    },

    /// Compile a script and report errors without running it
    Check {
        file: PathBuf,
    },

    /// Print the compiled statement graph as JSON
    Dump {
        file: PathBuf,
    },

    /// Compile a script to its binary form
    Compile {
        file: PathBuf,

        /// Output path
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Run a script for a number of steps, then save its state
    Suspend {
        file: PathBuf,

        /// Steps to run before suspending
        #[arg(long, default_value = "100")]
        steps: usize,

        /// Where to write the suspended state
        #[arg(short = 'o', long = "output")]
        output: PathBuf,
    },

    /// Continue a suspended script to completion
    Resume {
        /// The script the state was saved from
        file: PathBuf,

        /// Suspended state written by `suspend`
        state: PathBuf,
    },
}

/// Run the CLI by parsing process arguments
pub async fn run_cli() -> Result<()> {
    let cli = Cli::parse();
    run_cli_with_args(cli).await
}

/// Run the CLI with provided arguments
pub async fn run_cli_from_args(args: Vec<String>) -> Result<()> {
    let cli = Cli::parse_from(args);
    run_cli_with_args(cli).await
}

async fn run_cli_with_args(cli: Cli) -> Result<()> {
    // Load configuration before any command so config errors show up first
    let config = Config::builder()
        .config_path(cli.config)
        .steps_per_tick(cli.steps_per_tick)
        .max_call_depth(cli.max_call_depth)
        .log_filter(cli.log)
        .build()
        .context("Failed to load configuration")?;
    init_tracing(&config);

    match cli.command {
        Commands::Run { files } => {
            let mut jobs = Vec::with_capacity(files.len());
            for file in &files {
                let script = load_script(file)?;
                let process = Process::new(script).with_limits(config.limits());
                jobs.push(Job::new(file.display().to_string(), process));
            }
            run_jobs(jobs, &config, files.len() > 1).await?;
        }

        Commands::Check { file } => {
            let script = load_script(&file)?;
            println!(
                "✓ {}: {} statement(s), {} expression(s), {} function(s)",
                file.display(),
                script.statements.len(),
                script.expressions.len(),
                script.functions.len()
            );
            println!("  fingerprint {}", codec::fingerprint_hex(&script)?);
        }

        Commands::Dump { file } => {
            let script = load_script(&file)?;
            let json = serde_json::to_string_pretty(script.as_ref())
                .context("Failed to render statement graph")?;
            println!("{}", json);
        }

        Commands::Compile { file, output } => {
            let script = load_script(&file)?;
            let bytes = script.to_bytes()?;
            std::fs::write(&output, &bytes)
                .with_context(|| format!("Failed to write {}", output.display()))?;
            println!("✓ Wrote {} ({} bytes)", output.display(), bytes.len());
        }

        Commands::Suspend {
            file,
            steps,
            output,
        } => {
            let script = load_script(&file)?;
            let mut process = Process::new(script).with_limits(config.limits());
            let status = process.run(steps);
            for line in process.take_output() {
                println!("{}", line);
            }
            if let Err(err) = status {
                bail!("{}: {}", file.display(), err);
            }

            let state = process.suspend()?;
            std::fs::write(&output, state.as_bytes())
                .with_context(|| format!("Failed to write {}", output.display()))?;
            if process.is_finished() {
                println!("✓ Finished; saved final state to {}", output.display());
            } else {
                println!(
                    "✓ Suspended at depth {}; saved {} bytes to {}",
                    process.depth(),
                    state.len(),
                    output.display()
                );
            }
        }

        Commands::Resume { file, state } => {
            let script = load_script(&file)?;
            let bytes = std::fs::read(&state)
                .with_context(|| format!("Failed to read {}", state.display()))?;
            let process = Process::resume(&SerializedState::from_bytes(bytes), script)
                .with_context(|| format!("Failed to resume {}", state.display()))?
                .with_limits(config.limits());
            run_jobs(vec![Job::new(file.display().to_string(), process)], &config, false).await?;
        }
    }

    Ok(())
}

/// Compiled scripts are recognized by their magic bytes; anything else is source
fn load_script(path: &Path) -> Result<Arc<Script>> {
    let bytes = std::fs::read(path).with_context(|| format!("Failed to read {}", path.display()))?;
    if bytes.starts_with(b"SHSC") {
        let script = Script::from_bytes(&bytes)
            .with_context(|| format!("Failed to load compiled script {}", path.display()))?;
        return Ok(Arc::new(script));
    }

    let source = String::from_utf8(bytes)
        .with_context(|| format!("{} is not valid UTF-8", path.display()))?;
    match compile(&source) {
        Ok(script) => Ok(script),
        Err(err) => bail!("{}: {}", path.display(), err),
    }
}

async fn run_jobs(jobs: Vec<Job>, config: &Config, prefix: bool) -> Result<()> {
    let total = jobs.len();
    let reports = driver::run_interleaved(jobs, config.interpreter.steps_per_tick).await?;

    let mut failed = 0;
    for report in reports {
        for line in &report.output {
            if prefix {
                println!("[{}] {}", report.name, line);
            } else {
                println!("{}", line);
            }
        }
        if let Err(err) = &report.outcome {
            eprintln!("{}: {}", report.name, err);
            failed += 1;
        }
    }

    if failed > 0 {
        bail!("{} of {} script(s) failed", failed, total);
    }
    Ok(())
}

fn init_tracing(config: &Config) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.filter));
    // Already initialised when embedded in a host that set its own subscriber
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parses_subcommands() {
        let cli = Cli::parse_from(["stagehand", "--steps-per-tick", "5", "run", "a.sh", "b.sh"]);
        assert_eq!(cli.steps_per_tick, Some(5));
        assert!(matches!(cli.command, Commands::Run { ref files } if files.len() == 2));

        let cli = Cli::parse_from(["stagehand", "suspend", "x.sh", "--steps", "3", "-o", "x.state"]);
        assert!(matches!(
            cli.command,
            Commands::Suspend { steps: 3, ref output, .. } if output == Path::new("x.state")
        ));
    }

    #[test]
    fn test_load_script_from_source_and_binary() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("hello.sh");
        std::fs::write(&source, "print 'hi'\n").unwrap();

        let from_source = load_script(&source).unwrap();
        let compiled = dir.path().join("hello.shc");
        std::fs::write(&compiled, from_source.to_bytes().unwrap()).unwrap();

        assert_eq!(load_script(&compiled).unwrap(), from_source);
    }

    #[test]
    fn test_load_script_reports_position() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("bad.sh");
        std::fs::write(&source, "x = (1 +\n").unwrap();

        let message = load_script(&source).unwrap_err().to_string();
        assert!(message.contains("bad.sh"), "{}", message);
        assert!(message.contains("line"), "{}", message);
    }

    #[tokio::test]
    async fn test_suspend_then_resume_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let script = dir.path().join("count.sh");
        let state = dir.path().join("count.state");
        std::fs::write(&script, "i = 0\nwhile i < 10: i += 1\nprint i\n").unwrap();

        let suspend = Cli::parse_from([
            "stagehand".to_string(),
            "suspend".to_string(),
            script.display().to_string(),
            "--steps".to_string(),
            "4".to_string(),
            "-o".to_string(),
            state.display().to_string(),
        ]);
        run_cli_with_args(suspend).await.unwrap();
        assert!(state.exists());

        let saved = SerializedState::from_bytes(std::fs::read(&state).unwrap());
        let mut process = Process::resume(&saved, load_script(&script).unwrap()).unwrap();
        assert!(!process.is_finished());
        assert_eq!(process.run(1000).unwrap(), RunStatus::Finished);
        assert_eq!(process.take_output(), vec!["10"]);
    }
}
