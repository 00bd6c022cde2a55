/*
CLI Commands for Notifications

Command-line access to the sync engine. One-shot commands fetch first so that the optimistic
operations act on known records; `watch` mounts the poller and prints each new snapshot until
interrupted.
*/

use crate::core::platform::container::notification::{Notification, NotificationDraft};
use crate::core::platform::container::notification_store::StoreSnapshot;
use crate::core::platform::manager::notification_service::{
    FetchOutcome, MutationOutcome, NotificationSyncService,
};
use crate::core::platform::manager::scheduler::{SchedulerState, SyncScheduler};
use clap::{Args, Subcommand};
use std::time::Duration;

#[derive(Debug, Subcommand)]
pub enum NotificationCommands {
    /// List notifications
    List,
    /// Keep polling and print every change until Ctrl-C
    Watch,
    /// Mark one notification as read
    Read(ReadArgs),
    /// Mark every notification as read
    ReadAll,
    /// Create a notification
    Add(AddArgs),
    /// Delete a notification
    Delete(DeleteArgs),
}

#[derive(Debug, Args)]
pub struct ReadArgs {
    /// Notification ID
    pub id: String,
}

#[derive(Debug, Args)]
pub struct AddArgs {
    /// Recipient user ID
    #[arg(long)]
    pub owner: String,

    /// Notification category
    #[arg(long = "type")]
    pub kind: String,

    /// Text shown to the user
    #[arg(short, long)]
    pub message: String,
}

#[derive(Debug, Args)]
pub struct DeleteArgs {
    /// Notification ID
    pub id: String,
}

/// Notification command handler
pub struct NotificationCommandHandler {
    service: NotificationSyncService,
    poll_interval: Duration,
}

impl NotificationCommandHandler {
    pub fn new(service: NotificationSyncService, poll_interval: Duration) -> Self {
        Self {
            service,
            poll_interval,
        }
    }

    pub async fn handle_command(&self, command: NotificationCommands) -> Result<(), Box<dyn std::error::Error>> {
        if !self.service.has_credential() {
            println!("🔒 Not signed in: pass --token or set NOTIFY_API_TOKEN");
            return Ok(());
        }

        match command {
            NotificationCommands::List => self.list().await,
            NotificationCommands::Watch => self.watch().await,
            NotificationCommands::Read(args) => {
                self.service.fetch_notifications(true).await?;
                self.mark_read(args).await
            }
            NotificationCommands::ReadAll => {
                self.service.fetch_notifications(true).await?;
                self.mark_all_read().await
            }
            NotificationCommands::Add(args) => self.add(args).await,
            NotificationCommands::Delete(args) => {
                self.service.fetch_notifications(true).await?;
                self.delete(args).await
            }
        }
    }

    async fn list(&self) -> Result<(), Box<dyn std::error::Error>> {
        match self.service.fetch_notifications(true).await? {
            FetchOutcome::Applied { .. } | FetchOutcome::Stale => {
                print_snapshot(&self.service.snapshot());
            }
            outcome => println!("⚠️  Nothing fetched: {:?}", outcome),
        }
        Ok(())
    }

    async fn mark_read(&self, args: ReadArgs) -> Result<(), Box<dyn std::error::Error>> {
        match self.service.mark_as_read(&args.id).await? {
            MutationOutcome::Confirmed => println!("✅ Marked as read: {}", args.id),
            MutationOutcome::Unchanged => println!("❌ Notification not found: {}", args.id),
            MutationOutcome::NoCredential => println!("🔒 Not signed in"),
        }
        Ok(())
    }

    async fn mark_all_read(&self) -> Result<(), Box<dyn std::error::Error>> {
        let unread = self.service.unread_count();
        match self.service.mark_all_as_read().await? {
            MutationOutcome::Confirmed => println!("✅ Marked {} notifications as read", unread),
            MutationOutcome::Unchanged => println!("📭 Nothing unread"),
            MutationOutcome::NoCredential => println!("🔒 Not signed in"),
        }
        Ok(())
    }

    async fn add(&self, args: AddArgs) -> Result<(), Box<dyn std::error::Error>> {
        let draft = NotificationDraft::new(args.owner, args.kind, args.message)?;
        if let Some(created) = self.service.add_notification(draft).await? {
            println!("✅ Notification created!");
            print_notification(&created);
        }
        Ok(())
    }

    async fn delete(&self, args: DeleteArgs) -> Result<(), Box<dyn std::error::Error>> {
        match self.service.delete_notification(&args.id).await? {
            MutationOutcome::Confirmed => println!("🗑️  Deleted: {}", args.id),
            MutationOutcome::Unchanged => println!("❌ Notification not found: {}", args.id),
            MutationOutcome::NoCredential => println!("🔒 Not signed in"),
        }
        Ok(())
    }

    async fn watch(&self) -> Result<(), Box<dyn std::error::Error>> {
        let mut updates = self.service.subscribe();
        let mut scheduler = SyncScheduler::new(self.service.clone(), self.poll_interval);
        if scheduler.mount() == SchedulerState::Idle {
            println!("🔒 Not signed in");
            return Ok(());
        }
        println!("👀 Watching notifications every {:?} (Ctrl-C to stop)", self.poll_interval);

        loop {
            tokio::select! {
                _ = tokio::signal::ctrl_c() => break,
                changed = updates.changed() => {
                    if changed.is_err() {
                        break;
                    }
                    let snapshot = updates.borrow_and_update().clone();
                    if !snapshot.loading {
                        print_snapshot(&snapshot);
                    }
                }
            }
            if scheduler.state() == SchedulerState::Idle {
                println!("🔒 Session ended");
                break;
            }
        }

        scheduler.shutdown().await;
        Ok(())
    }
}

fn print_snapshot(snapshot: &StoreSnapshot) {
    println!(
        "📋 Notifications ({} total, {} unread):",
        snapshot.notifications.len(),
        snapshot.unread_count()
    );
    for notification in snapshot.notifications.iter() {
        print_notification(notification);
    }
    if let Some(error) = &snapshot.error {
        println!("   ⚠️  {}", error);
    }
}

fn print_notification(notification: &Notification) {
    let marker = if notification.read { " " } else { "•" };
    println!(
        "   {} {} [{}] {} ({})",
        marker,
        notification.id,
        notification.kind,
        notification.message,
        notification.created_at.format("%Y-%m-%d %H:%M:%S UTC")
    );
}
