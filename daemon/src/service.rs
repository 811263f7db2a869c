//! Ties the watcher, the relay and the bus together on one consumer task.

use std::future::Future;

use notify::Event as NotifyEvent;
use tokio::sync::mpsc;
use tracing::{debug, info, trace, warn};

use crate::bus::{Event, EventBus, SubscriptionId, Topic};
use crate::relay::{LocationRelay, LocationTable};
use crate::watcher::LogDirectoryWatcher;

/// Receiving end of [`crate::watcher::watch_directory`].
pub type Notifications = mpsc::UnboundedReceiver<notify::Result<NotifyEvent>>;

/// The running pipeline.
///
/// Filesystem notifications and inbound location tables are both handled on
/// the task that calls [`Service::run`], so the watcher needs no locking.
pub struct Service {
    bus: EventBus,
    watcher: LogDirectoryWatcher,
    relay: LocationRelay,
    inbound: mpsc::UnboundedReceiver<LocationTable>,
    forward: SubscriptionId,
}

impl Service {
    /// Wire `send_location` publishes into `relay`.
    pub fn new(
        bus: EventBus,
        watcher: LogDirectoryWatcher,
        relay: LocationRelay,
        inbound: mpsc::UnboundedReceiver<LocationTable>,
    ) -> Self {
        let sender = relay.clone();
        let forward = bus.subscribe(Topic::SendLocation, move |event| {
            if let Event::SendLocation(update) = event {
                sender.send(update.clone());
            }
        });
        Self {
            bus,
            watcher,
            relay,
            inbound,
            forward,
        }
    }

    pub fn bus(&self) -> &EventBus {
        &self.bus
    }

    pub fn watcher(&self) -> &LogDirectoryWatcher {
        &self.watcher
    }

    pub fn relay(&self) -> &LocationRelay {
        &self.relay
    }

    /// Process events until `shutdown` resolves or every source is closed,
    /// then stop the relay.
    pub async fn run<F>(mut self, mut notifications: Notifications, shutdown: F)
    where
        F: Future<Output = ()>,
    {
        tokio::pin!(shutdown);
        let mut relay_open = true;
        let mut watch_open = true;

        while relay_open || watch_open {
            tokio::select! {
                _ = &mut shutdown => {
                    info!("Shutdown requested");
                    break;
                }
                notification = notifications.recv(), if watch_open => match notification {
                    Some(Ok(event)) => {
                        let published = self.watcher.handle_notification(&event);
                        if published > 0 {
                            trace!(lines = published, "Published log lines");
                        }
                    }
                    Some(Err(e)) => warn!(error = %e, "Log directory watch error"),
                    None => {
                        warn!("Log directory watch ended");
                        watch_open = false;
                    }
                },
                table = self.inbound.recv(), if relay_open => match table {
                    Some(table) => self.publish_locations(table),
                    None => {
                        debug!("Relay inbound channel closed");
                        relay_open = false;
                    }
                },
            }
        }

        self.relay.stop().await;
        self.bus.unsubscribe(self.forward);
        info!("Service stopped");
    }

    fn publish_locations(&self, table: LocationTable) {
        debug!(zones = table.zones().count(), "Location table received");
        self.bus.publish(Event::LocationsUpdated(table));
    }
}
