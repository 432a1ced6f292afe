//! nodeagent-client - send RTML documents to a node agent

use std::process::ExitCode;

use nodeagent_cli::client::{parse_args, run};
use tracing::error;

#[tokio::main]
async fn main() -> ExitCode {
    let args = match parse_args(std::env::args_os()) {
        Ok(Some(args)) => args,
        Ok(None) => return ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("{}", err);
            return ExitCode::from(err.exit_code());
        }
    };

    nodeagent_cli::init_tracing(std::io::stderr);

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            error!(error = %err, "nodeagent-client failed");
            eprintln!("{}", err);
            ExitCode::from(err.exit_code())
        }
    }
}
