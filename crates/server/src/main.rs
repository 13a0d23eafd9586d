//! `lightning` - stream key-value mutations into a remote import engine
//!
//! Exit codes: 0 on success or `--help`, 2 on a configuration error, 1 when
//! the server fails.

use std::io::IsTerminal;
use std::process::ExitCode;

use lightning_server::{ConfigError, ShellConfig};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    // ANSI colors only when stdout is a terminal and NO_COLOR is unset.
    let ansi = std::io::stdout().is_terminal() && std::env::var_os("NO_COLOR").is_none();
    tracing_subscriber::fmt()
        .with_ansi(ansi)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "info".into()),
        )
        .init();

    let config = match ShellConfig::from_args(std::env::args_os()) {
        Ok(config) => config,
        Err(ConfigError::Help(text)) => {
            println!("{}", text);
            return ExitCode::SUCCESS;
        }
        Err(e) => {
            error!("{}", e);
            return ExitCode::from(2);
        }
    };

    match lightning_server::run(config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            error!(error = %format!("{:#}", e), "lightning exited with error");
            ExitCode::FAILURE
        }
    }
}
