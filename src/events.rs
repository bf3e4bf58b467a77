//! Lifecycle events published to the UI and other collaborators
//!
//! Each subscriber gets its own channel, so every subscriber sees events in
//! exactly the order they were published.

use serde::{Deserialize, Serialize};
use std::sync::mpsc::{self, Receiver, Sender};
use tracing::debug;

#[derive(Serialize, Deserialize, Debug, Clone, PartialEq, Eq)]
pub enum LifecycleEvent {
    /// The set of known profiles changed
    ProfileListChanged,

    /// A different profile is now active
    ProfileChanged { name: String },

    /// The set of known scene collections changed
    SceneCollectionListChanged,

    /// A different scene collection is now active
    SceneCollectionChanged { name: String },

    /// The program scene changed
    SceneChanged { scene: String },

    /// The preview scene changed
    PreviewSceneChanged { scene: String },

    /// Base canvas size changed after a video reset
    CanvasResized { width: u32, height: u32 },

    /// Output (scaled) size changed after a video reset
    OutputResized { width: u32, height: u32 },

    /// Bootstrap reached the UI-visible stage
    FinishedLoading,
}

#[derive(Default)]
pub struct EventBus {
    subscribers: Vec<Sender<LifecycleEvent>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register interest in all future events
    pub fn subscribe(&mut self) -> Receiver<LifecycleEvent> {
        let (tx, rx) = mpsc::channel();
        self.subscribers.push(tx);
        rx
    }

    pub fn publish(&mut self, event: LifecycleEvent) {
        debug!(event = ?event, subscribers = self.subscribers.len(), "Publishing lifecycle event");
        // Subscribers that dropped their receiver are forgotten
        self.subscribers.retain(|tx| tx.send(event.clone()).is_ok());
    }

    #[cfg(test)]
    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_events_delivered_in_publish_order() {
        let mut bus = EventBus::new();
        let rx = bus.subscribe();

        bus.publish(LifecycleEvent::SceneCollectionListChanged);
        bus.publish(LifecycleEvent::SceneCollectionChanged {
            name: "Main".to_string(),
        });
        bus.publish(LifecycleEvent::FinishedLoading);

        let received: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            received,
            vec![
                LifecycleEvent::SceneCollectionListChanged,
                LifecycleEvent::SceneCollectionChanged {
                    name: "Main".to_string()
                },
                LifecycleEvent::FinishedLoading,
            ]
        );
    }

    #[test]
    fn test_every_subscriber_receives_events() {
        let mut bus = EventBus::new();
        let a = bus.subscribe();
        let b = bus.subscribe();

        bus.publish(LifecycleEvent::ProfileListChanged);

        assert_eq!(a.try_recv().unwrap(), LifecycleEvent::ProfileListChanged);
        assert_eq!(b.try_recv().unwrap(), LifecycleEvent::ProfileListChanged);
    }

    #[test]
    fn test_dropped_subscriber_is_removed() {
        let mut bus = EventBus::new();
        let keep = bus.subscribe();
        drop(bus.subscribe());

        bus.publish(LifecycleEvent::FinishedLoading);

        assert_eq!(bus.subscriber_count(), 1);
        assert_eq!(keep.try_recv().unwrap(), LifecycleEvent::FinishedLoading);
    }
}
