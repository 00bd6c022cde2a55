// tests/common/mod.rs - Shared setup for integration tests
#![allow(dead_code)]

use std::sync::{Arc, Once};

use notification_sync::application::ports::output::notification_port::NotificationGateway;
use notification_sync::infrastructure::adapters::session::SessionCredentials;
use notification_sync::{Notification, NotificationSyncService, PollGate};

static INIT: Once = Once::new();

/// Enables logging once for the test binary when `TEST_LOG` is set
pub fn init_test_env() {
    INIT.call_once(|| {
        if std::env::var("TEST_LOG").is_ok() {
            env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("debug"))
                .is_test(true)
                .init();
        }
    });
}

pub fn notification(id: &str, read: bool) -> Notification {
    Notification::new(id, "user-1", "deadline", format!("Control {} needs evidence", id)).with_read(read)
}

pub fn signed_in_service(
    gateway: Arc<dyn NotificationGateway>,
    gate: PollGate,
) -> (Arc<SessionCredentials>, NotificationSyncService) {
    init_test_env();
    let session = Arc::new(SessionCredentials::with_token("integration-token"));
    let service = NotificationSyncService::with_poll_gate(gateway, session.clone(), gate);
    (session, service)
}

/// Lets spawned tasks run until they block on a held call
pub async fn settle() {
    for _ in 0..20 {
        tokio::task::yield_now().await;
    }
}
