/// vaultkeep-agent: line-delimited JSON front end for a vaultkeep vault.
///
/// Usage: vaultkeep-agent [config.json]
/// Reads one request per stdin line, writes one response per stdout line.
/// Logs go to stderr (RUST_LOG, default "warn").
mod config;
mod protocol;

use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use std::process::ExitCode;

use vaultkeep_core::Vault;

use protocol::{Handler, Response};

fn main() -> ExitCode {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("warn"))
        .target(env_logger::Target::Stderr)
        .init();

    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .unwrap_or_else(config::default_config_path);
    let agent_config = config::load_config(&config_path);
    let lookback_days = agent_config.lookback_days;

    let vault_config = match agent_config.into_vault_config(&config_path, config::env_vault_path()) {
        Ok(c) => c,
        Err(e) => {
            log::error!("[vaultkeep.agent] {}", e);
            eprintln!("vaultkeep-agent: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let vault = match Vault::open(vault_config) {
        Ok(v) => v,
        Err(e) => {
            log::error!("[vaultkeep.agent] {}", e);
            eprintln!("vaultkeep-agent: {}", e);
            return ExitCode::FAILURE;
        }
    };
    let handler = Handler::new(vault, lookback_days);

    match serve(&handler, io::stdin().lock(), io::stdout().lock()) {
        Ok(handled) => {
            log::info!("[vaultkeep.agent] stdin closed after {} requests", handled);
            ExitCode::SUCCESS
        }
        Err(e) => {
            log::error!("[vaultkeep.agent] I/O error: {}", e);
            ExitCode::FAILURE
        }
    }
}

/// Answer requests until `input` is exhausted. Blank lines are ignored.
fn serve(handler: &Handler, input: impl BufRead, mut output: impl Write) -> io::Result<usize> {
    let mut handled = 0;
    for line in input.lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let response = handler.handle_line(&line);
        let json = serde_json::to_string(&response).unwrap_or_else(|e| {
            serde_json::to_string(&Response::failure("internal_error", e.to_string()))
                .unwrap_or_default()
        });
        writeln!(output, "{}", json)?;
        output.flush()?;
        handled += 1;
    }
    Ok(handled)
}
