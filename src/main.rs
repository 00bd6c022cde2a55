// src/main.rs
use clap::Parser;
use env_logger::Env;
use log::{debug, info};
use notification_sync::application::ports::output::notification_port::NotificationGateway;
use notification_sync::cli::notification_commands::NotificationCommandHandler;
use notification_sync::cli::Cli;
use notification_sync::core::platform::container::notification::Notification;
use notification_sync::core::platform::manager::notification_service::NotificationSyncService;
use notification_sync::infrastructure::adapters::notifications::{
    HttpNotificationAdapter, SystemNotificationAdapter,
};
use notification_sync::infrastructure::adapters::session::SessionCredentials;
use notification_sync::Settings;
use std::sync::Arc;

const OFFLINE_TOKEN: &str = "offline";

fn offline_gateway() -> SystemNotificationAdapter {
    SystemNotificationAdapter::with_records(vec![
        Notification::new("welcome", "local", "info", "Offline mode: changes are not persisted"),
        Notification::new("evidence-due", "local", "deadline", "SOC 2 evidence is due on Friday"),
    ])
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    let settings = match &cli.config {
        Some(path) => Settings::load_from_file(path),
        None => Settings::new(),
    };
    let settings = match settings {
        Ok(settings) => settings,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    env_logger::Builder::from_env(Env::default().default_filter_or(settings.log_level.as_str())).init();
    debug!("Loaded configuration: {:?}", settings);

    let gateway: Arc<dyn NotificationGateway> = if cli.offline {
        Arc::new(offline_gateway())
    } else {
        Arc::new(HttpNotificationAdapter::from_settings(&settings)?)
    };

    let session = Arc::new(SessionCredentials::new());
    match (&cli.token, cli.offline) {
        (Some(token), _) => session.login(token.as_str()),
        (None, true) => session.login(OFFLINE_TOKEN),
        (None, false) => {}
    }

    let service = NotificationSyncService::with_poll_gate(gateway.clone(), session, settings.sync.poll_gate);
    info!("Using {} gateway ({:?} poll gate)", gateway.name(), service.poll_gate());

    let handler = NotificationCommandHandler::new(service, settings.sync.poll_interval());
    handler.handle_command(cli.command).await
}
