use std::collections::HashSet;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::nmea::{SensorEvent, StreamKind};
use crate::source::NmeaSource;

#[derive(Debug, Clone, PartialEq)]
pub enum HubEvent {
    Sample(SensorEvent),
    /// A reader stopped by itself (EOF or I/O error). Its stream kinds have
    /// no live subscription any more.
    Ended { source: String, reason: String },
}

/// A running reader task. Aborted on drop.
struct Subscription {
    kinds: HashSet<StreamKind>,
    label: String,
    handle: JoinHandle<()>,
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.handle.abort();
        info!(source = %self.label, "unsubscribed");
    }
}

/// Owns the sensor reader tasks. At most one subscription serves each
/// stream kind; subscribing again replaces whatever overlapped.
pub struct SensorHub {
    subs: Vec<Subscription>,
    tx: mpsc::Sender<HubEvent>,
}

impl SensorHub {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<HubEvent>) {
        let (tx, rx) = mpsc::channel(capacity);
        (Self { subs: Vec::new(), tx }, rx)
    }

    pub fn subscribe(&mut self, kinds: &[StreamKind], mut source: NmeaSource) {
        let kinds: HashSet<StreamKind> = kinds.iter().copied().collect();
        self.subs.retain(|s| s.kinds.is_disjoint(&kinds));

        let label = source.label().to_string();
        let wanted = kinds.clone();
        let tx = self.tx.clone();
        let handle = tokio::spawn(async move {
            let reason = loop {
                match source.next_event().await {
                    Ok(Some(ev)) => {
                        if !wanted.contains(&ev.kind()) { continue; }
                        if tx.send(HubEvent::Sample(ev)).await.is_err() { return; }
                    }
                    Ok(None) => break "stream ended".to_string(),
                    Err(e) => {
                        warn!("sensor {} failed: {:#}", source.label(), e);
                        break format!("{:#}", e);
                    }
                }
            };
            let _ = tx.send(HubEvent::Ended { source: source.label().to_string(), reason }).await;
        });
        info!(source = %label, ?kinds, "subscribed");
        self.subs.push(Subscription { kinds, label, handle });
    }

    pub fn is_subscribed(&self, kind: StreamKind) -> bool {
        self.subs.iter().any(|s| s.kinds.contains(&kind))
    }

    pub fn active(&self) -> usize {
        self.subs.len()
    }

    pub fn shutdown(&mut self) {
        self.subs.clear();
    }
}
