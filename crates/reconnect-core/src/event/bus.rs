// Copyright 2025 eraflo
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

/// A thread-safe channel for one event type.
///
/// Producers clone [`EventBus::sender`]; the owner of the bus reads from
/// [`EventBus::receiver`] or drains it between frames with [`EventBus::drain`].
#[derive(Debug)]
pub struct EventBus<T: Clone + Send + Sync + 'static> {
    sender: flume::Sender<T>,
    receiver: flume::Receiver<T>,
}

impl<T: Clone + Send + Sync + 'static> EventBus<T> {
    /// Creates a bus backed by an unbounded channel.
    pub fn new() -> Self {
        let (sender, receiver) = flume::unbounded();
        log::debug!("EventBus initialized.");
        Self { sender, receiver }
    }

    /// Sends an event, logging an error if every receiver is gone.
    pub fn publish(&self, event: T) {
        log::trace!("Publishing an event.");

        if let Err(e) = self.sender.send(event) {
            log::error!("Failed to send event: {e}. Receiver likely disconnected.");
        }
    }

    /// Returns a clone of the sending end.
    pub fn sender(&self) -> flume::Sender<T> {
        self.sender.clone()
    }

    /// Returns the receiving end.
    pub fn receiver(&self) -> &flume::Receiver<T> {
        &self.receiver
    }

    /// Takes every event currently queued without blocking.
    pub fn drain(&self) -> Vec<T> {
        self.receiver.try_iter().collect()
    }
}

impl<T: Clone + Send + Sync + 'static> Default for EventBus<T> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use flume::{SendError, TryRecvError};
    use std::{thread, time::Duration};

    #[derive(Debug, Clone, PartialEq)]
    enum TestEvent {
        RepCompleted { count: u32 },
        SafetyStop(String),
        SessionEnded,
    }

    #[test]
    fn test_empty_bus() {
        let bus = EventBus::<TestEvent>::new();
        assert!(bus.receiver().is_empty());
        assert_eq!(bus.receiver().try_recv(), Err(TryRecvError::Empty));
        assert!(bus.drain().is_empty());
    }

    #[test]
    fn test_publish_preserves_order() {
        let bus = EventBus::<TestEvent>::new();
        bus.publish(TestEvent::RepCompleted { count: 1 });
        bus.publish(TestEvent::SafetyStop("spasm".into()));
        bus.publish(TestEvent::SessionEnded);

        assert_eq!(
            bus.drain(),
            vec![
                TestEvent::RepCompleted { count: 1 },
                TestEvent::SafetyStop("spasm".into()),
                TestEvent::SessionEnded,
            ]
        );
    }

    #[test]
    fn test_send_from_thread() {
        let bus = EventBus::<TestEvent>::new();
        let sender = bus.sender();

        let handle = thread::spawn(move || {
            sender
                .send(TestEvent::RepCompleted { count: 7 })
                .expect("Send from thread failed");
        });

        let received = bus
            .receiver()
            .recv_timeout(Duration::from_secs(1))
            .expect("Failed to receive event from thread");
        assert_eq!(received, TestEvent::RepCompleted { count: 7 });
        handle.join().expect("Thread join failed");
    }

    #[test]
    fn test_send_error_on_bus_drop() {
        let bus = EventBus::<TestEvent>::new();
        let sender = bus.sender();
        drop(bus);

        match sender.send(TestEvent::SessionEnded) {
            Err(SendError(_)) => {}
            Ok(()) => panic!("Send unexpectedly succeeded after receiver drop"),
        }
    }
}
