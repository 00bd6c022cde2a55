/*
Scheduler

Runs the notification poller. While mounted, a background task keeps the engine in step with
the server:

- one forced fetch right away
- then one unforced fetch per poll interval, counted from mount rather than from the end of the
  first fetch; the engine's gate turns a tick into a no-op while writes are in flight, and
  ticks missed while a fetch is slow are skipped rather than queued
- when a tick finds the session credential gone, the engine is reset and the task ends

The task is owned by the scheduler: `unmount`, `shutdown` and dropping the scheduler all cancel
it.
*/

use std::time::Duration;

use log::{debug, info, warn};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::config::application_settings::Settings;
use crate::core::platform::manager::notification_service::{FetchOutcome, NotificationSyncService};

pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(30);

/// Shorter intervals are raised to this
pub const MIN_POLL_INTERVAL: Duration = Duration::from_secs(1);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SchedulerState {
    /// No poller running
    Idle,
    /// Poller task active
    Polling,
}

#[derive(Debug)]
struct Poller {
    cancel: CancellationToken,
    handle: JoinHandle<()>,
}

#[derive(Debug)]
pub struct SyncScheduler {
    service: NotificationSyncService,
    interval: Duration,
    poller: Option<Poller>,
}

impl SyncScheduler {
    pub fn new(service: NotificationSyncService, interval: Duration) -> Self {
        if interval < MIN_POLL_INTERVAL {
            warn!(
                "Poll interval {:?} is below the minimum; using {:?}",
                interval, MIN_POLL_INTERVAL
            );
        }
        let interval = interval.max(MIN_POLL_INTERVAL);
        Self {
            service,
            interval,
            poller: None,
        }
    }

    pub fn from_settings(service: NotificationSyncService, settings: &Settings) -> Self {
        Self::new(service, settings.sync.poll_interval())
    }

    pub fn interval(&self) -> Duration {
        self.interval
    }

    pub fn state(&self) -> SchedulerState {
        match &self.poller {
            Some(poller) if !poller.handle.is_finished() => SchedulerState::Polling,
            _ => SchedulerState::Idle,
        }
    }

    /// Starts polling if a credential is present. Must be called inside a tokio runtime.
    pub fn mount(&mut self) -> SchedulerState {
        if self.state() == SchedulerState::Polling {
            return SchedulerState::Polling;
        }
        self.poller = None;

        if !self.service.has_credential() {
            debug!("Not starting notification poller: no session credential");
            return SchedulerState::Idle;
        }

        let cancel = CancellationToken::new();
        let handle = tokio::spawn(run_poller(
            self.service.clone(),
            self.interval,
            cancel.clone(),
        ));
        info!("Notification poller started ({:?} interval)", self.interval);
        self.poller = Some(Poller { cancel, handle });
        SchedulerState::Polling
    }

    /// Cancels the poller without waiting for it
    pub fn unmount(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            info!("Notification poller stopped");
        }
    }

    /// Cancels the poller and waits for the task to finish
    pub async fn shutdown(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
            if let Err(e) = poller.handle.await {
                warn!("Notification poller ended abnormally: {}", e);
            }
            info!("Notification poller shut down");
        }
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if let Some(poller) = self.poller.take() {
            poller.cancel.cancel();
        }
    }
}

async fn run_poller(service: NotificationSyncService, period: Duration, cancel: CancellationToken) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    tokio::select! {
        biased;
        _ = cancel.cancelled() => return,
        result = service.fetch_notifications(true) => log_fetch(result),
    }

    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            _ = ticker.tick() => {}
        }

        if !service.has_credential() {
            info!("Session credential gone; clearing notifications and stopping poller");
            service.reset();
            break;
        }

        tokio::select! {
            biased;
            _ = cancel.cancelled() => break,
            result = service.fetch_notifications(false) => log_fetch(result),
        }
    }
}

fn log_fetch(result: crate::error::SyncResult<FetchOutcome>) {
    match result {
        Ok(FetchOutcome::Applied { count }) => debug!("Poll applied {} notifications", count),
        Ok(FetchOutcome::Deferred) => debug!("Poll deferred: writes in flight"),
        Ok(outcome) => debug!("Poll finished: {:?}", outcome),
        Err(e) => warn!("Poll failed: {}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use crate::application::ports::output::notification_port::GatewayOperation;
    use crate::core::platform::container::notification::Notification;
    use crate::infrastructure::adapters::notifications::system_notification_adapter::SystemNotificationAdapter;
    use crate::infrastructure::adapters::session::memory_session_adapter::SessionCredentials;

    const PERIOD: Duration = Duration::from_secs(30);

    fn setup() -> (Arc<SystemNotificationAdapter>, Arc<SessionCredentials>, NotificationSyncService) {
        let gateway = Arc::new(SystemNotificationAdapter::with_records(vec![
            Notification::new("a", "user-1", "deadline", "Evidence due"),
            Notification::new("b", "user-1", "policy", "Policy updated"),
        ]));
        let session = Arc::new(SessionCredentials::with_token("token"));
        let service = NotificationSyncService::new(gateway.clone(), session.clone());
        (gateway, session, service)
    }

    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    async fn advance(by: Duration) {
        tokio::time::advance(by).await;
        settle().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_fetches_immediately() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service.clone(), PERIOD);

        assert_eq!(scheduler.mount(), SchedulerState::Polling);
        settle().await;

        assert_eq!(gateway.call_count(GatewayOperation::List), 1);
        assert_eq!(service.notifications().len(), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_polls_once_per_interval() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service, PERIOD);
        scheduler.mount();
        settle().await;

        advance(PERIOD - Duration::from_secs(1)).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 1);

        advance(Duration::from_secs(1)).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 2);

        advance(PERIOD).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 3);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_first_tick_counts_from_mount_not_from_slow_fetch() {
        let (gateway, _, service) = setup();
        gateway.hold(GatewayOperation::List);
        let mut scheduler = SyncScheduler::new(service, PERIOD);
        scheduler.mount();
        settle().await;

        advance(Duration::from_secs(20)).await;
        gateway.release(GatewayOperation::List);
        settle().await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 1);

        advance(Duration::from_secs(10)).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_zero_interval_is_raised_to_minimum() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service, Duration::ZERO);
        assert_eq!(scheduler.interval(), MIN_POLL_INTERVAL);

        scheduler.mount();
        settle().await;
        advance(MIN_POLL_INTERVAL).await;

        assert_eq!(gateway.call_count(GatewayOperation::List), 2);
        assert_eq!(scheduler.state(), SchedulerState::Polling);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_from_settings_uses_configured_interval() {
        let (_, _, service) = setup();
        let mut settings = Settings::default();
        settings.sync.poll_interval_secs = 5;

        let scheduler = SyncScheduler::from_settings(service, &settings);

        assert_eq!(scheduler.interval(), Duration::from_secs(5));
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticks_are_deferred_while_write_pending() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service.clone(), PERIOD);
        scheduler.mount();
        settle().await;

        gateway.hold(GatewayOperation::UpdateRead);
        let write = {
            let service = service.clone();
            tokio::spawn(async move { service.mark_as_read("a").await })
        };
        settle().await;
        assert!(service.has_pending());

        advance(PERIOD).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 1);

        gateway.release(GatewayOperation::UpdateRead);
        write.await.unwrap().unwrap();

        advance(PERIOD).await;
        assert_eq!(gateway.call_count(GatewayOperation::List), 2);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_without_credential_stays_idle() {
        let (gateway, session, service) = setup();
        session.logout();
        let mut scheduler = SyncScheduler::new(service, PERIOD);

        assert_eq!(scheduler.mount(), SchedulerState::Idle);
        advance(PERIOD * 2).await;

        assert!(gateway.calls().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
    }

    #[tokio::test(start_paused = true)]
    async fn test_credential_loss_clears_store_and_stops() {
        let (gateway, session, service) = setup();
        let mut scheduler = SyncScheduler::new(service.clone(), PERIOD);
        scheduler.mount();
        settle().await;
        assert_eq!(service.notifications().len(), 2);

        session.logout();
        advance(PERIOD).await;

        assert!(service.notifications().is_empty());
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        assert_eq!(gateway.call_count(GatewayOperation::List), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unmount_stops_polling() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service, PERIOD);
        scheduler.mount();
        settle().await;

        scheduler.unmount();
        assert_eq!(scheduler.state(), SchedulerState::Idle);
        advance(PERIOD * 3).await;

        assert_eq!(gateway.call_count(GatewayOperation::List), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_mount_twice_keeps_single_poller() {
        let (gateway, _, service) = setup();
        let mut scheduler = SyncScheduler::new(service, PERIOD);
        scheduler.mount();
        scheduler.mount();
        settle().await;

        assert_eq!(gateway.call_count(GatewayOperation::List), 1);
        scheduler.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_mount_fetch_does_not_leave_loading() {
        let (gateway, _, service) = setup();
        gateway.hold(GatewayOperation::List);
        let mut scheduler = SyncScheduler::new(service.clone(), PERIOD);
        scheduler.mount();
        settle().await;
        assert!(service.loading());

        scheduler.shutdown().await;

        assert!(!service.loading());
    }
}
