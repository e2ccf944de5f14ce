//! `framehub info`: print what a core built from this config reports.

use crate::error::CliError;
use crate::runner::CliRunner;

/// Print the server configuration reply as pretty JSON.
pub fn run(runner: &CliRunner) -> Result<(), CliError> {
    runner.log_startup("info");
    let runtime = runner.runtime()?;

    runtime.block_on(async {
        let core = runner.create_core();
        let rendered = serde_json::to_string_pretty(core.server_config())
            .map_err(|e| CliError::Config(e.to_string()))?;
        println!("{}", rendered);
        core.shutdown();
        Ok(())
    })
}
