// src/lib.rs
pub mod application;
pub mod cli;
pub mod config;
pub mod core;
pub mod error;
pub mod infrastructure;

pub use crate::config::Settings;
pub use crate::core::platform::container::notification::{Notification, NotificationDraft, NotificationId};
pub use crate::core::platform::container::notification_store::StoreSnapshot;
pub use crate::core::platform::container::sync_state::{PollGate, SyncStatus};
pub use crate::core::platform::manager::notification_service::{
    FetchOutcome, MutationOutcome, NotificationSyncService,
};
pub use crate::core::platform::manager::scheduler::{SchedulerState, SyncScheduler};
pub use crate::error::{ConfigurationError, SyncError, SyncResult};
