//! m365mail - send mail through Microsoft Graph from the command line

mod cli;

use anyhow::{bail, Context, Result};
use clap::Parser;
use cli::{Cli, Command};
use m365mail_core::{DispatchResult, Mailer, MailerConfig};
use tracing::{debug, info};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let directive = if cli.verbose {
        "m365mail=debug"
    } else {
        "m365mail=info"
    };
    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(std::io::stderr))
        .with(EnvFilter::from_default_env().add_directive(directive.parse()?))
        .init();

    let config = match &cli.config {
        Some(path) => MailerConfig::from_toml_file(path)
            .with_context(|| format!("Failed to load {}", path.display()))?,
        None => MailerConfig::from_env().context("Failed to read configuration")?,
    };
    if !config.is_configured() {
        bail!("Client ID and client secret must be configured");
    }
    debug!("Using tenant {}", config.tenant_id);

    let mailer = Mailer::new(config);

    match cli.command {
        Command::Token => {
            let expires_at = mailer.check_token().await?;
            println!("Access token acquired; expires at {}", expires_at.to_rfc3339());
        }
        Command::Send(args) => {
            let message = args
                .into_message()
                .context("Failed to read message body")?;
            let result = mailer.send(message).await;
            report(&result, cli.json)?;
        }
        Command::Test(args) => {
            info!("Sending test message to {}", args.to);
            let result = mailer
                .send_test(&args.to, args.subject.as_deref(), args.body.as_deref())
                .await;
            report(&result, cli.json)?;
        }
    }

    Ok(())
}

fn report(result: &DispatchResult, json: bool) -> Result<()> {
    if json {
        println!("{}", serde_json::to_string_pretty(result)?);
    }
    match result {
        DispatchResult::Success { status, .. } => {
            if !json {
                println!("Message accepted by Graph (status {})", status);
            }
            Ok(())
        }
        DispatchResult::Failure(failure) => {
            let retry = if failure.is_retryable() {
                " (retryable)"
            } else {
                ""
            };
            bail!("Send failed: {}{}", failure.message, retry)
        }
    }
}
