//! `framehub replay`: drive a fresh core from a script of commands.
//!
//! The script is a JSON array of commands in the same shape the dispatcher
//! accepts. Each reply is printed as one JSON line; a command that does not
//! decode gets an `INVALID_PARAMETERS` reply and the script carries on. With `--observe`, an
//! observer subscribed before the first command has its whole event stream
//! printed once the script finished and running jobs settled.

use crate::error::CliError;
use crate::runner::CliRunner;
use framehub::CoordinationCore;
use serde_json::Value;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::{info, warn};

/// Default time to wait for jobs after the last command.
pub const DEFAULT_SETTLE_MS: u64 = 5_000;

/// Options for one replay run.
#[derive(Debug, Clone)]
pub struct ReplayArgs {
    pub script: PathBuf,
    pub observe: bool,
    pub settle: Duration,
}

/// Run a replay script.
pub fn run(runner: &CliRunner, args: ReplayArgs) -> Result<(), CliError> {
    runner.log_startup("replay");
    let commands = load_script(&args.script)?;
    info!(
        script = %args.script.display(),
        commands = commands.len(),
        "Loaded replay script"
    );

    let runtime = runner.runtime()?;
    runtime.block_on(async {
        let core = runner.create_core();
        let stdout = io::stdout();
        let mut out = stdout.lock();
        execute(&core, commands, args.observe, args.settle, &mut out)
            .await
            .map_err(CliError::Output)
    })
}

/// Read and parse a script file.
pub fn load_script(path: &Path) -> Result<Vec<Value>, CliError> {
    let text = std::fs::read_to_string(path).map_err(|error| CliError::FileRead {
        path: path.to_path_buf(),
        error,
    })?;
    parse_script(&text).map_err(|e| CliError::Script {
        path: path.to_path_buf(),
        reason: e.to_string(),
    })
}

/// Parses the outer array only. Each element is decoded when dispatched.
pub fn parse_script(text: &str) -> Result<Vec<Value>, serde_json::Error> {
    serde_json::from_str(text)
}

/// Dispatches every command in order and writes replies, then (when
/// observing) the observer's event stream. Shuts the core down on return.
pub async fn execute<W: Write>(
    core: &CoordinationCore,
    commands: Vec<Value>,
    observe: bool,
    settle: Duration,
    out: &mut W,
) -> io::Result<()> {
    let mut observer = if observe {
        Some(core.subscribe().await)
    } else {
        None
    };

    for command in commands {
        let reply = core.dispatch_value(command).await;
        writeln!(out, "{}", reply)?;
    }

    if !wait_for_jobs(core, settle).await {
        warn!(settle_ms = settle.as_millis() as u64, "Jobs still running after settle time");
    }
    core.shutdown();

    if let Some(observer) = observer.as_mut() {
        while let Some(message) = observer.recv().await {
            writeln!(out, "{}", message.to_json())?;
        }
    }
    out.flush()
}

/// Polls until no job is in a live state. Returns false on timeout.
async fn wait_for_jobs(core: &CoordinationCore, settle: Duration) -> bool {
    let poll = async {
        loop {
            let live = core
                .snapshot()
                .await
                .jobs
                .iter()
                .any(|job| !job.status.is_terminal());
            if !live {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    };
    tokio::time::timeout(settle, poll).await.is_ok()
}
