//! Smuggler - command adapter for pull-based CI resources
//!
//! Installed as `check`, `in` and `out` (or links to one binary whose name
//! contains the action), or run directly as `smuggler <action>`.
//!
//! ## Protocol
//!
//! - The request JSON is read from stdin.
//! - The response JSON is written to stdout; nothing else ever is.
//! - Diagnostics and the command's own output go to stderr.

use std::ffi::OsString;
use std::io::{self, Write};
use std::path::PathBuf;
use std::process;

use anyhow::{bail, Context, Result};
use clap::{Args, Parser, Subcommand};
use serde_json::Value;
use tokio::io::AsyncReadExt;
use tracing::{info, info_span, Level};

use smuggler_core::telemetry::{DEFAULT_LOG_PATH, LOG_PATH_VAR};
use smuggler_core::{init_tracing, Action, LocalConfig, LogSink, ResourceRequest};
use smuggler_runner::{ActionError, ActionPipeline, CommandOutput, ProcessInvoker};

#[derive(Parser)]
#[command(name = "smuggler")]
#[command(version = env!("CARGO_PKG_VERSION"))]
#[command(about = "Run operator-supplied commands as CI resource actions", long_about = None)]
struct Cli {
    #[command(flatten)]
    common: CommonArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Report available versions
    Check,

    /// Fetch the requested version into a directory
    In {
        /// Destination directory
        destination: PathBuf,
    },

    /// Publish from a directory and report the produced version
    Out {
        /// Sources directory
        sources: PathBuf,
    },
}

/// Arguments when the action comes from the program name.
#[derive(Parser)]
#[command(name = "smuggler")]
struct LinkArgs {
    #[command(flatten)]
    common: CommonArgs,

    /// Destination (in) or sources (out) directory
    dir: Option<PathBuf>,
}

#[derive(Args, Debug, Clone)]
struct CommonArgs {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Emit JSON-formatted log lines
    #[arg(long, global = true)]
    json: bool,

    /// Log file
    #[arg(long, global = true, env = LOG_PATH_VAR, default_value = DEFAULT_LOG_PATH)]
    log_file: PathBuf,
}

/// A fully resolved command line.
#[derive(Debug)]
struct Invocation {
    program: PathBuf,
    action: Action,
    data_dir: Option<PathBuf>,
    common: CommonArgs,
}

#[tokio::main]
async fn main() {
    let args: Vec<OsString> = std::env::args_os().collect();
    if let Err(err) = run(args).await {
        eprintln!("error: {err:#}");
        process::exit(exit_code(&err));
    }
}

async fn run(args: Vec<OsString>) -> Result<()> {
    let invocation = parse_invocation(args)?;

    let sink = LogSink::to_file(&invocation.common.log_file).with_context(|| {
        format!("opening log '{}'", invocation.common.log_file.display())
    })?;
    let level = if invocation.common.verbose {
        Level::DEBUG
    } else {
        Level::INFO
    };
    init_tracing(invocation.common.json, level, sink.clone());

    let request = read_request(&invocation).await?;
    sink.echo_to_stderr(request.debug);

    let span = info_span!("smuggler", action = %invocation.action);
    let pipeline = ActionPipeline::new(ProcessInvoker, span);
    let result = pipeline.run(&request).await;

    let output = match &result {
        Ok(outcome) => outcome.output.as_ref(),
        Err(err) => err.output.as_ref(),
    };
    if let Some(output) = output {
        echo_output(output, io::stderr().lock()).context("echoing command output")?;
    }

    let outcome = result.context("running command")?;
    let wire = outcome
        .response
        .to_wire()
        .context("encoding response")?;
    write_response(&wire, io::stdout().lock()).context("writing response to stdout")?;

    info!(state = %outcome.state, "Action complete");
    Ok(())
}

fn parse_invocation(args: Vec<OsString>) -> Result<Invocation> {
    let program = args.first().map(PathBuf::from).unwrap_or_default();

    match Action::from_program_name(&program.to_string_lossy()) {
        Some(action) => {
            let link = LinkArgs::parse_from(&args);
            let data_dir = match (action, link.dir) {
                (Action::Check, _) => None,
                (_, Some(dir)) => Some(dir),
                (Action::In, None) => bail!("usage: {} <dest directory>", program.display()),
                (Action::Out, None) => bail!("usage: {} <sources directory>", program.display()),
            };
            Ok(Invocation {
                program,
                action,
                data_dir,
                common: link.common,
            })
        }
        None => {
            let cli = Cli::parse_from(&args);
            let (action, data_dir) = match cli.command {
                Commands::Check => (Action::Check, None),
                Commands::In { destination } => (Action::In, Some(destination)),
                Commands::Out { sources } => (Action::Out, Some(sources)),
            };
            Ok(Invocation {
                program,
                action,
                data_dir,
                common: cli.common,
            })
        }
    }
}

/// Read stdin, apply the local config file and parse the request.
async fn read_request(invocation: &Invocation) -> Result<ResourceRequest> {
    let mut raw = Vec::new();
    tokio::io::stdin()
        .read_to_end(&mut raw)
        .await
        .context("reading request from stdin")?;
    let mut document: Value =
        serde_json::from_slice(&raw).context("reading request from stdin")?;

    let candidates = LocalConfig::candidate_paths(&invocation.program);
    if let Some(config) = LocalConfig::discover(&candidates).context("loading local config")? {
        config
            .merge_into(&mut document)
            .with_context(|| format!("merging local config {}", config.path.display()))?;
    }

    let request =
        ResourceRequest::from_value(invocation.action, document).context("parsing request")?;
    Ok(match &invocation.data_dir {
        Some(dir) => request.with_data_dir(dir),
        None => request,
    })
}

/// Copy the command's stderr then stdout to `out`.
fn echo_output(output: &CommandOutput, mut out: impl Write) -> io::Result<()> {
    if !output.stderr.is_empty() {
        writeln!(out, "Stderr:")?;
        out.write_all(&output.stderr)?;
    }
    if !output.stdout.is_empty() {
        writeln!(out, "Stdout:")?;
        out.write_all(&output.stdout)?;
    }
    out.flush()
}

fn write_response(wire: &Value, mut out: impl Write) -> Result<()> {
    serde_json::to_writer(&mut out, wire)?;
    writeln!(out)?;
    out.flush()?;
    Ok(())
}

/// The child's exit code for a failed command, 1 for everything else.
fn exit_code(err: &anyhow::Error) -> i32 {
    err.downcast_ref::<ActionError>()
        .map(ActionError::exit_code)
        .unwrap_or(1)
}
