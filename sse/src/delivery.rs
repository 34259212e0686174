//! Bounded-time delivery of one payload to one subscriber channel.
//!
//! This is the hub's backpressure policy: a subscriber that does not accept a
//! message within the patience window loses that message. Nothing is queued
//! on its behalf and nobody else waits for it longer than the window.

use bytes::Bytes;
use std::time::Duration;
use tokio::sync::mpsc::error::{SendTimeoutError, TrySendError};
use tokio::sync::mpsc::Sender;

/// Default time the hub waits for a slow subscriber before dropping a message.
pub const DEFAULT_PATIENCE: Duration = Duration::from_secs(1);

/// Outcome of a single delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    Delivered,
    /// The subscriber's queue stayed full for the whole patience window
    TimedOut,
    /// The subscriber's receive end is gone
    Closed,
}

/// Try to hand `payload` to `sender`, waiting at most `patience` for queue space.
pub async fn send_with_patience(
    sender: &Sender<Bytes>,
    payload: Bytes,
    patience: Duration,
) -> Delivery {
    match sender.try_send(payload) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
        Err(TrySendError::Full(payload)) => match sender.send_timeout(payload, patience).await {
            Ok(()) => Delivery::Delivered,
            Err(SendTimeoutError::Timeout(_)) => Delivery::TimedOut,
            Err(SendTimeoutError::Closed(_)) => Delivery::Closed,
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;
    use tokio::sync::mpsc;

    #[tokio::test]
    async fn delivers_when_the_queue_has_room() {
        let (tx, mut rx) = mpsc::channel(1);

        let outcome = send_with_patience(&tx, Bytes::from_static(b"hello"), DEFAULT_PATIENCE).await;

        assert_eq!(outcome, Delivery::Delivered);
        assert_eq!(rx.recv().await.unwrap(), Bytes::from_static(b"hello"));
    }

    #[tokio::test]
    async fn gives_up_after_the_patience_window_on_a_full_queue() {
        let (tx, _rx) = mpsc::channel(1);
        tx.try_send(Bytes::from_static(b"first")).unwrap();

        let started = Instant::now();
        let outcome =
            send_with_patience(&tx, Bytes::from_static(b"second"), Duration::from_millis(50)).await;

        assert_eq!(outcome, Delivery::TimedOut);
        assert!(started.elapsed() >= Duration::from_millis(50));
    }

    #[tokio::test]
    async fn delivers_once_a_slow_reader_catches_up_within_the_window() {
        let (tx, mut rx) = mpsc::channel(1);
        tx.try_send(Bytes::from_static(b"first")).unwrap();

        let reader = tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            let first = rx.recv().await.unwrap();
            let second = rx.recv().await.unwrap();
            (first, second)
        });

        let outcome =
            send_with_patience(&tx, Bytes::from_static(b"second"), Duration::from_secs(2)).await;

        assert_eq!(outcome, Delivery::Delivered);
        let (first, second) = reader.await.unwrap();
        assert_eq!(first, Bytes::from_static(b"first"));
        assert_eq!(second, Bytes::from_static(b"second"));
    }

    #[tokio::test]
    async fn reports_a_dropped_receiver_as_closed() {
        let (tx, rx) = mpsc::channel::<Bytes>(1);
        drop(rx);

        let outcome = send_with_patience(&tx, Bytes::from_static(b"lost"), DEFAULT_PATIENCE).await;

        assert_eq!(outcome, Delivery::Closed);
    }
}
