use crate::views::{RoundView, TableView};
use gambit_engine::cards::Card;
use gambit_engine::logger::Street;
use gambit_engine::table::Payout;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tokio::sync::mpsc;

// Bounded so a stalled client cannot grow memory; full channels get pruned.
const EVENT_CHANNEL_BUFFER: usize = 1000;

/// An encounter id or a table id.
pub type ChannelId = String;
pub type EventSender = mpsc::Sender<Notification>;
pub type EventReceiver = mpsc::Receiver<Notification>;

/// Payloads pushed to the real-time channel of an encounter or table.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Notification {
    RoundTimeoutResolved {
        encounter_id: String,
        character_id: String,
        message: String,
        new_state: RoundView,
    },
    TimeoutWarning {
        encounter_id: String,
        character_id: String,
        seconds_remaining: u64,
    },
    RoundState {
        encounter_id: String,
        round: RoundView,
    },
    TableState {
        table_id: String,
        table: TableView,
    },
    StreetAdvanced {
        table_id: String,
        street: Street,
        board: Vec<Card>,
    },
    HandComplete {
        table_id: String,
        hand_id: String,
        payouts: Vec<Payout>,
    },
}

impl Notification {
    pub fn kind(&self) -> &'static str {
        match self {
            Notification::RoundTimeoutResolved { .. } => "round_timeout_resolved",
            Notification::TimeoutWarning { .. } => "timeout_warning",
            Notification::RoundState { .. } => "round_state",
            Notification::TableState { .. } => "table_state",
            Notification::StreetAdvanced { .. } => "street_advanced",
            Notification::HandComplete { .. } => "hand_complete",
        }
    }
}

pub struct EventSubscription {
    bus: EventBus,
    channel: ChannelId,
    subscriber_id: usize,
    pub receiver: EventReceiver,
}

impl EventSubscription {
    pub fn receiver(&mut self) -> &mut EventReceiver {
        &mut self.receiver
    }
}

impl Drop for EventSubscription {
    fn drop(&mut self) {
        self.bus.unsubscribe(&self.channel, self.subscriber_id);
    }
}

#[derive(Debug, Clone, Default)]
pub struct EventBus {
    inner: Arc<EventBusInner>,
}

#[derive(Debug, Default)]
struct EventBusInner {
    subscribers: RwLock<HashMap<ChannelId, Vec<(usize, EventSender)>>>,
    next_id: AtomicUsize,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&self, channel: impl Into<ChannelId>) -> EventSubscription {
        let channel = channel.into();
        let (subscriber_id, receiver) = self.subscribe_raw(channel.clone());
        EventSubscription {
            bus: self.clone(),
            channel,
            subscriber_id,
            receiver,
        }
    }

    fn subscribe_raw(&self, channel: ChannelId) -> (usize, EventReceiver) {
        let (tx, rx) = mpsc::channel(EVENT_CHANNEL_BUFFER);
        let id = self.inner.next_id.fetch_add(1, Ordering::AcqRel);
        self.write()
            .entry(channel.clone())
            .or_default()
            .push((id, tx));

        tracing::info!(
            channel = %channel,
            subscriber_id = id,
            "client subscribed to notifications"
        );

        (id, rx)
    }

    /// Delivers to every subscriber of `channel`; returns how many received it.
    pub fn publish(&self, channel: &str, event: Notification) -> usize {
        tracing::debug!(channel = %channel, kind = event.kind(), "publishing notification");

        let subscribers = self.read().get(channel).cloned();
        let Some(list) = subscribers else {
            tracing::trace!(channel = %channel, "no subscribers for channel");
            return 0;
        };

        let mut delivered = 0;
        let mut failed = Vec::new();
        for (id, sender) in list {
            // never block the publisher on a slow client
            match sender.try_send(event.clone()) {
                Ok(()) => delivered += 1,
                Err(e) => {
                    tracing::warn!(
                        channel = %channel,
                        subscriber_id = id,
                        error = %e,
                        "dropping subscriber that cannot keep up"
                    );
                    failed.push(id);
                }
            }
        }
        if !failed.is_empty() {
            self.remove_subscribers(channel, &failed);
        }
        delivered
    }

    pub fn unsubscribe(&self, channel: &str, subscriber_id: usize) {
        self.remove_subscribers(channel, &[subscriber_id]);
    }

    pub fn drop_channel(&self, channel: &str) {
        self.write().remove(channel);
    }

    pub fn subscriber_count(&self) -> usize {
        self.read().values().map(|list| list.len()).sum()
    }

    fn remove_subscribers(&self, channel: &str, ids: &[usize]) {
        let mut guard = self.write();
        if let Some(list) = guard.get_mut(channel) {
            list.retain(|(id, _)| !ids.contains(id));
            if list.is_empty() {
                guard.remove(channel);
            }
        }
    }

    // A panic while holding the lock leaves the map itself intact.
    fn read(&self) -> RwLockReadGuard<'_, HashMap<ChannelId, Vec<(usize, EventSender)>>> {
        self.inner
            .subscribers
            .read()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<ChannelId, Vec<(usize, EventSender)>>> {
        self.inner
            .subscribers
            .write()
            .unwrap_or_else(|poisoned| poisoned.into_inner())
    }
}
