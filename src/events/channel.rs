//! Crossbeam-backed event channel.
//!
//! The pipeline only ever pushes; the receiving side is whatever front-end
//! drains the iterator (the CLI progress thread, a test collecting events).

use crossbeam_channel::{unbounded, Receiver, Sender};

use super::Event;

/// Cloneable producer handed to batch conversion and duplicate detection
#[derive(Clone)]
pub struct EventSender {
    inner: Sender<Event>,
}

impl EventSender {
    /// Push an event. Dropped silently once the receiver is gone.
    pub fn send(&self, event: Event) {
        let _ = self.inner.send(event);
    }
}

/// Consumer end; iteration ends when every sender is dropped
pub struct EventReceiver {
    inner: Receiver<Event>,
}

impl EventReceiver {
    pub fn iter(&self) -> impl Iterator<Item = Event> + '_ {
        self.inner.iter()
    }
}

/// Constructor for connected sender/receiver pairs
pub struct EventChannel;

impl EventChannel {
    /// Unbounded pair. Progress events are small and a slow UI must never
    /// stall a conversion.
    pub fn new() -> (EventSender, EventReceiver) {
        let (sender, receiver) = unbounded();
        (
            EventSender { inner: sender },
            EventReceiver { inner: receiver },
        )
    }
}

/// Sender whose receiver is already gone, for runs nobody watches
pub fn null_sender() -> EventSender {
    let (sender, _) = EventChannel::new();
    sender
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::{ConversionEvent, DuplicateEvent};
    use std::thread;

    #[test]
    fn iteration_ends_after_all_senders_drop() {
        let (sender, receiver) = EventChannel::new();
        let worker = sender.clone();

        let handle = thread::spawn(move || {
            worker.send(Event::Conversion(ConversionEvent::Cancelled { completed_files: 3 }));
        });
        handle.join().unwrap();
        sender.send(Event::Duplicate(DuplicateEvent::Started {
            total_files: 2,
            strategy: "hash".to_string(),
        }));
        drop(sender);

        let events: Vec<_> = receiver.iter().collect();
        assert_eq!(events.len(), 2);
        assert!(matches!(
            events[0],
            Event::Conversion(ConversionEvent::Cancelled { completed_files: 3 })
        ));
    }

    #[test]
    fn null_sender_discards_events() {
        null_sender().send(Event::Conversion(ConversionEvent::Cancelled { completed_files: 0 }));
    }
}
