//! Command-line arguments

use clap::{Args, Parser, Subcommand};
use m365mail_core::{Attachment, OutboundMessage};
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(
    name = "m365mail",
    version,
    about = "Send mail through Microsoft Graph with an app registration"
)]
pub struct Cli {
    /// TOML configuration file; M365_* environment variables are used when absent
    #[arg(short, long, global = true)]
    pub config: Option<PathBuf>,

    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Print send results as JSON
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Acquire an access token and show when it expires
    Token,
    /// Send a message
    Send(SendArgs),
    /// Send a plain-text test message from the configured sender
    Test(TestArgs),
}

#[derive(Debug, Args)]
pub struct SendArgs {
    /// Sender mailbox; defaults to the configured sender
    #[arg(long, default_value = "")]
    pub from: String,

    #[arg(long)]
    pub from_name: Option<String>,

    #[arg(long, required = true)]
    pub to: Vec<String>,

    #[arg(long)]
    pub cc: Vec<String>,

    #[arg(long)]
    pub bcc: Vec<String>,

    #[arg(short, long)]
    pub subject: String,

    /// Message body
    #[arg(short, long, default_value = "", conflicts_with = "body_file")]
    pub body: String,

    /// Read the message body from a file
    #[arg(long)]
    pub body_file: Option<PathBuf>,

    /// Send the body as HTML
    #[arg(long)]
    pub html: bool,

    /// File to attach; may be repeated
    #[arg(short, long)]
    pub attach: Vec<PathBuf>,
}

impl SendArgs {
    pub fn into_message(self) -> std::io::Result<OutboundMessage> {
        let body = match &self.body_file {
            Some(path) => std::fs::read_to_string(path)?,
            None => self.body,
        };

        let mut message = OutboundMessage::new(self.from, self.subject);
        message = if self.html {
            message.html(body)
        } else {
            message.text(body)
        };
        if let Some(name) = self.from_name {
            message = message.from_name(name);
        }
        message.to = self.to;
        message.cc = self.cc;
        message.bcc = self.bcc;
        message.attachments = self.attach.into_iter().map(Attachment::from_path).collect();
        Ok(message)
    }
}

#[derive(Debug, Args)]
pub struct TestArgs {
    /// Recipient of the test message
    pub to: String,

    #[arg(short, long)]
    pub subject: Option<String>,

    #[arg(short, long)]
    pub body: Option<String>,
}
