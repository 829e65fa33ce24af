use std::sync::Arc;

use tokio::sync::broadcast;
use tracing::{debug, trace};

/// Trait implemented by payload types that can be carried on the bus.
pub trait Event: Clone + Send + Sync + std::fmt::Debug + 'static {}

impl<T> Event for T where T: Clone + Send + Sync + std::fmt::Debug + 'static {}

/// Fan-out of events to any number of listeners. Publishing never fails:
/// an event nobody listens to is dropped.
pub trait EventBus<E>: Send + Sync
where
    E: Event,
{
    /// Returns how many subscribers received `event`.
    fn publish(&self, event: E) -> usize;
    fn subscribe(&self) -> broadcast::Receiver<E>;
}

/// In-memory broadcast bus. Each subscriber buffers up to `capacity`
/// events; a slower one loses the oldest.
pub struct InMemoryBus<E>
where
    E: Event,
{
    sender: broadcast::Sender<E>,
}

impl<E> InMemoryBus<E>
where
    E: Event,
{
    pub fn new(capacity: usize) -> Arc<Self> {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Arc::new(Self { sender })
    }
}

impl<E> EventBus<E> for InMemoryBus<E>
where
    E: Event,
{
    fn publish(&self, event: E) -> usize {
        match self.sender.send(event) {
            Ok(delivered) => delivered,
            Err(_) => {
                trace!("event dropped; no subscribers");
                0
            }
        }
    }

    fn subscribe(&self) -> broadcast::Receiver<E> {
        self.sender.subscribe()
    }
}

/// Next event for `receiver`, stepping over whatever it lost to lag.
/// `None` once the bus is gone.
pub async fn next_event<E>(receiver: &mut broadcast::Receiver<E>) -> Option<E>
where
    E: Event,
{
    loop {
        match receiver.recv().await {
            Ok(event) => return Some(event),
            Err(broadcast::error::RecvError::Lagged(skipped)) => {
                debug!(skipped, "subscriber lagged behind the bus");
            }
            Err(broadcast::error::RecvError::Closed) => return None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn publish_without_subscribers_is_dropped() {
        let bus = InMemoryBus::<u32>::new(4);
        assert_eq!(bus.publish(1), 0);

        let mut rx = bus.subscribe();
        assert_eq!(bus.publish(2), 1);
        assert_eq!(rx.recv().await.unwrap(), 2);
    }

    #[tokio::test]
    async fn lagging_subscriber_resumes_at_the_oldest_kept_event() {
        let bus = InMemoryBus::<u32>::new(2);
        let mut rx = bus.subscribe();
        for value in 1..=5 {
            bus.publish(value);
        }
        assert_eq!(next_event(&mut rx).await, Some(4));
        assert_eq!(next_event(&mut rx).await, Some(5));
    }

    #[tokio::test]
    async fn closed_bus_ends_the_stream() {
        let bus = InMemoryBus::<u32>::new(2);
        let mut rx = bus.subscribe();
        bus.publish(7);
        drop(bus);
        assert_eq!(next_event(&mut rx).await, Some(7));
        assert_eq!(next_event(&mut rx).await, None);
    }
}
