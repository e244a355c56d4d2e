mod cli;
mod console;
mod orchestrator;
mod session;
#[cfg(test)]
mod testing;

use std::process::ExitCode;

use tracing_subscriber::EnvFilter;

use parley_ai::{OpenAiClient, OpenAiConfig};
use parley_common::ParleyError;
use parley_tools::{EndpointDescriptor, TransportOptions};

use crate::console::{Console, QueryReader};
use crate::orchestrator::ConversationOptions;

const DEFAULT_LOG_DIRECTIVE: &str = "parley=info";

fn init_logging(log_level: Option<&str>) {
    let directive = log_level.unwrap_or(DEFAULT_LOG_DIRECTIVE);
    let filter = match directive.parse() {
        Ok(directive) => EnvFilter::from_default_env().add_directive(directive),
        Err(_) => {
            eprintln!("ignoring invalid --log-level {directive:?}");
            EnvFilter::from_default_env()
        }
    };

    // stdout belongs to the conversation.
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}

/// Resolves on Ctrl-C. If the handler cannot be installed it never resolves.
async fn interrupted() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!(error = %e, "cannot listen for Ctrl-C");
        std::future::pending::<()>().await;
    }
}

async fn run(args: cli::Args) -> Result<(), ParleyError> {
    let config = parley_config::load_config(args.config.as_deref())?;

    // Credentials and provider path are checked before anything is spawned.
    let openai = OpenAiConfig::from_model_config(&config.model)?;
    let endpoint = EndpointDescriptor::resolve(&args.provider, &config.provider)?;

    let client = OpenAiClient::new(openai).map_err(|e| ParleyError::Model(e.to_string()))?;
    let transport = TransportOptions::from_config(&config.provider, |key| std::env::var(key).ok());
    let options = ConversationOptions::from_config(&config, !args.no_stream);

    tracing::info!(
        model = %config.model.model,
        base_url = %config.model.base_url,
        provider = %endpoint,
        "parley starting"
    );

    let mut input = QueryReader::stdin();
    session::run_session(
        &endpoint,
        transport,
        &client,
        options,
        Console::stdout(),
        &mut input,
        interrupted(),
    )
    .await
}

#[tokio::main]
async fn main() -> ExitCode {
    // A missing .env file is normal.
    let _ = dotenvy::dotenv();

    let args = match cli::parse() {
        Ok(args) => args,
        Err(code) => return code,
    };

    init_logging(args.log_level.as_deref());

    match run(args).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(error = %e, "parley failed");
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
