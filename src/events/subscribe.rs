//! # Event subscriber extension point.
//!
//! [`Subscribe`] is how observers hook into the platform bus. Each
//! subscriber runs in its own listener task spawned by [`spawn_listener`];
//! a slow subscriber only lags its own receiver, never the publishers.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::broadcast::error::RecvError;
use tokio_util::sync::CancellationToken;
use tracing::warn;

use super::{Bus, Event};

/// Observer of platform events.
///
/// ### Rules
/// - `on_event` runs on the listener task, not in the publisher's context.
/// - Handle errors internally; do not panic.
#[async_trait]
pub trait Subscribe: Send + Sync + 'static {
    /// Called for every event the subscriber's receiver observes.
    async fn on_event(&self, ev: &Event);

    /// Stable subscriber name for diagnostics.
    fn name(&self) -> &'static str {
        "subscriber"
    }
}

/// Spawns a listener task that drains the bus into `subscriber` until the
/// token is cancelled or the bus closes. Lagged receivers skip old events.
pub fn spawn_listener(
    bus: &Bus,
    subscriber: Arc<dyn Subscribe>,
    token: CancellationToken,
) -> tokio::task::JoinHandle<()> {
    let mut rx = bus.subscribe();
    tokio::spawn(async move {
        loop {
            tokio::select! {
                _ = token.cancelled() => break,
                msg = rx.recv() => match msg {
                    Ok(ev) => subscriber.on_event(&ev).await,
                    Err(RecvError::Closed) => break,
                    Err(RecvError::Lagged(n)) => {
                        warn!(subscriber = subscriber.name(), skipped = n, "event listener lagged");
                        continue;
                    }
                }
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::EventKind;
    use std::sync::atomic::{AtomicUsize, Ordering};

    struct Counter(AtomicUsize);

    #[async_trait]
    impl Subscribe for Counter {
        async fn on_event(&self, _ev: &Event) {
            self.0.fetch_add(1, Ordering::SeqCst);
        }
        fn name(&self) -> &'static str {
            "counter"
        }
    }

    #[tokio::test]
    async fn listener_drains_until_cancelled() {
        let bus = Bus::new(16);
        let counter = Arc::new(Counter(AtomicUsize::new(0)));
        let token = CancellationToken::new();
        let handle = spawn_listener(&bus, counter.clone(), token.clone());

        bus.publish(Event::now(EventKind::ModeChanged));
        bus.publish(Event::now(EventKind::ModeChanged));
        tokio::time::sleep(std::time::Duration::from_millis(50)).await;

        token.cancel();
        handle.await.unwrap();
        assert_eq!(counter.0.load(Ordering::SeqCst), 2);
    }
}
