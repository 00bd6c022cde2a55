pub mod notification_commands;

use crate::cli::notification_commands::NotificationCommands;
use clap::Parser;
use std::path::PathBuf;

#[derive(Debug, Parser)]
#[command(name = "notification-sync", version, about = "Keep dashboard notifications in sync")]
pub struct Cli {
    /// Settings file (TOML); defaults to notification-sync.* plus NOTIFY_* variables
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Bearer token for the notification API
    #[arg(long, env = "NOTIFY_API_TOKEN", hide_env_values = true)]
    pub token: Option<String>,

    /// Use the in-memory gateway instead of the HTTP API
    #[arg(long)]
    pub offline: bool,

    #[command(subcommand)]
    pub command: NotificationCommands,
}

/*
CLI Module Tests

Argument parsing for the notification commands.
*/
