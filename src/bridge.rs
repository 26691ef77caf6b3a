//! Stream bridge: adapts an asynchronous event sequence into an outbound
//! byte stream suitable for incremental HTTP delivery.
//!
//! The bridge is a pull-driven, one-event-at-a-time pipeline. [`drive`] owns
//! the loop: it reserves a slot on the transport channel, pulls the next
//! upstream item, encodes it, and pushes the frame — in that order. Both
//! suspension points are explicit awaits, and because the transport slot is
//! reserved *before* the next upstream pull, the bridge never materializes
//! more than one encoded frame and never pulls ahead of the transport.
//!
//! Two frame encoders are provided for the two supported streaming modes:
//! [`text_frame`] forwards raw text fragments verbatim (Mode A), and
//! [`json_frame`] / [`sse_frame`] emit one JSON-encoded envelope per event
//! (Mode B).
//!
//! # Lifecycle
//!
//! Per invocation the bridge moves `Idle → Streaming → {Closed, Errored}`.
//! `Closed` is reached only when the upstream sequence is exhausted;
//! `Errored` on the first upstream or encoding failure. Both are terminal.
//! A transport closure (client disconnect) is a cancellation, not an error:
//! the loop stops pulling and the upstream sequence is dropped without being
//! drained, leaving the terminal states untouched.
//!
//! No timeouts are enforced here — an unresponsive upstream holds the
//! connection open indefinitely. No retries are performed — a failure is
//! surfaced once and the stream ends.

use bytes::Bytes;
use futures::{Stream, StreamExt};
use thiserror::Error;
use tokio::sync::{mpsc, watch};
use tokio_stream::wrappers::ReceiverStream;

use crate::events::{AgentEvent, event_name};

/// Failure that terminates an outbound stream.
#[derive(Debug, Error)]
pub enum BridgeError {
    /// The upstream event sequence raised.
    #[error("upstream failure: {0}")]
    Upstream(anyhow::Error),
    /// A frame could not be encoded to JSON.
    ///
    /// An event that fails to serialize errors the whole stream rather than
    /// being skipped: dropping frames silently would corrupt the client's
    /// view of event order.
    #[error("frame encoding failed: {0}")]
    Encode(#[from] serde_json::Error),
}

/// Lifecycle state of one bridged stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BridgeState {
    /// Created, no upstream pull yet.
    Idle,
    /// At least one pull has been issued.
    Streaming,
    /// Upstream exhausted; output closed. Terminal.
    Closed,
    /// Upstream or encoding failure surfaced. Terminal.
    Errored,
}

/// Observer handle for a bridge invocation.
#[derive(Debug)]
pub struct BridgeHandle {
    state: watch::Receiver<BridgeState>,
}

impl BridgeHandle {
    /// Current lifecycle state.
    pub fn state(&self) -> BridgeState {
        *self.state.borrow()
    }

    /// Wait until the bridge reaches a terminal state.
    pub async fn terminated(&mut self) -> BridgeState {
        // wait_for returns Err only when the sender is dropped, which itself
        // means the drive loop ended; report whatever state was last seen.
        let _ = self
            .state
            .wait_for(|s| matches!(s, BridgeState::Closed | BridgeState::Errored))
            .await;
        *self.state.borrow()
    }
}

/// Drive one bridged stream to completion.
///
/// `upstream` is the pull handle; `tx` is the push handle. Pushing an `Err`
/// puts the output stream into its error state; dropping `tx` closes it.
/// The loop ends when the upstream is exhausted, when it raises, or when the
/// transport side of `tx` is gone.
pub async fn drive<S, T, E>(
    upstream: S,
    encode: E,
    tx: mpsc::Sender<Result<Bytes, BridgeError>>,
    state: watch::Sender<BridgeState>,
) where
    S: Stream<Item = anyhow::Result<T>>,
    E: Fn(T) -> Result<Bytes, BridgeError>,
{
    futures::pin_mut!(upstream);

    let _ = state.send(BridgeState::Streaming);

    loop {
        // The previous push must be accepted by the transport before the
        // next upstream event is pulled.
        let Ok(permit) = tx.reserve().await else {
            tracing::debug!("transport closed, cancelling upstream pull");
            return;
        };

        match upstream.next().await {
            Some(Ok(item)) => match encode(item) {
                Ok(frame) => permit.send(Ok(frame)),
                Err(e) => {
                    tracing::error!(error = %e, "frame encoding failed, erroring stream");
                    let _ = state.send(BridgeState::Errored);
                    permit.send(Err(e));
                    return;
                }
            },
            Some(Err(e)) => {
                tracing::error!(error = %e, "upstream failure, erroring stream");
                let _ = state.send(BridgeState::Errored);
                permit.send(Err(BridgeError::Upstream(e)));
                return;
            }
            None => {
                let _ = state.send(BridgeState::Closed);
                return;
            }
        }
    }
}

/// Spawn a bridge over `upstream` and return the outbound frame stream plus
/// its lifecycle handle.
///
/// The channel is bounded to a single frame, which is what enforces the
/// one-event-at-a-time pull discipline in [`drive`].
pub fn spawn<S, T, E>(
    upstream: S,
    encode: E,
) -> (ReceiverStream<Result<Bytes, BridgeError>>, BridgeHandle)
where
    S: Stream<Item = anyhow::Result<T>> + Send + 'static,
    T: Send + 'static,
    E: Fn(T) -> Result<Bytes, BridgeError> + Send + 'static,
{
    let (tx, rx) = mpsc::channel(1);
    let (state_tx, state_rx) = watch::channel(BridgeState::Idle);
    tokio::spawn(drive(upstream, encode, tx, state_tx));
    (ReceiverStream::new(rx), BridgeHandle { state: state_rx })
}

/// Mode A: forward a raw text fragment verbatim.
pub fn text_frame(fragment: String) -> Result<Bytes, BridgeError> {
    Ok(Bytes::from(fragment))
}

/// Mode B: one newline-delimited JSON envelope per item.
pub fn json_frame<T: serde::Serialize>(value: T) -> Result<Bytes, BridgeError> {
    let mut buf = serde_json::to_vec(&value)?;
    buf.push(b'\n');
    Ok(Bytes::from(buf))
}

/// Mode B: one SSE-framed JSON record per event.
pub fn sse_frame(event: AgentEvent) -> Result<Bytes, BridgeError> {
    let json = serde_json::to_string(&event)?;
    let name = event_name(&event);
    Ok(Bytes::from(format!("event: {name}\ndata: {json}\n\n")))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    fn fragments(items: Vec<anyhow::Result<String>>) -> impl Stream<Item = anyhow::Result<String>> {
        futures::stream::iter(items)
    }

    #[tokio::test]
    async fn test_mode_a_preserves_order() {
        let upstream = fragments(vec![Ok("Hel".to_string()), Ok("lo".to_string())]);
        let (mut frames, mut handle) = spawn(upstream, text_frame);

        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from("Hel"));
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from("lo"));
        assert!(frames.next().await.is_none());
        assert_eq!(handle.terminated().await, BridgeState::Closed);
    }

    #[tokio::test]
    async fn test_upstream_error_is_terminal() {
        let upstream = fragments(vec![
            Ok("a".to_string()),
            Ok("b".to_string()),
            Err(anyhow::anyhow!("boom")),
            Ok("never".to_string()),
        ]);
        let (mut frames, mut handle) = spawn(upstream, text_frame);

        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from("a"));
        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from("b"));
        let err = frames.next().await.unwrap().unwrap_err();
        assert!(matches!(err, BridgeError::Upstream(_)));
        // No further frames after the error state.
        assert!(frames.next().await.is_none());
        assert_eq!(handle.terminated().await, BridgeState::Errored);
    }

    #[tokio::test]
    async fn test_does_not_pull_ahead_of_transport() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let upstream = async_stream::stream! {
            for i in 0..4u32 {
                counter.fetch_add(1, Ordering::SeqCst);
                yield Ok(i.to_string());
            }
        };
        let (mut frames, _handle) = spawn(upstream, text_frame);

        // Without the consumer taking anything, only the first event may be
        // pulled: the reserve for the second frame blocks.
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 1);

        assert_eq!(frames.next().await.unwrap().unwrap(), Bytes::from("0"));
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(pulled.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_disconnect_cancels_upstream() {
        let pulled = Arc::new(AtomicUsize::new(0));
        let counter = Arc::clone(&pulled);
        let upstream = async_stream::stream! {
            loop {
                counter.fetch_add(1, Ordering::SeqCst);
                yield Ok::<_, anyhow::Error>("tick".to_string());
            }
        };

        let (tx, rx) = mpsc::channel(1);
        let (state_tx, state_rx) = watch::channel(BridgeState::Idle);
        let driver = tokio::spawn(drive(upstream, text_frame, tx, state_tx));

        // Simulate a client disconnect: drop the receiving side.
        drop(rx);
        driver.await.unwrap();

        // The loop stopped pulling instead of draining the infinite
        // sequence, and cancellation did not fabricate a terminal state.
        assert!(pulled.load(Ordering::SeqCst) <= 2);
        assert!(!matches!(
            *state_rx.borrow(),
            BridgeState::Closed | BridgeState::Errored
        ));
    }

    #[tokio::test]
    async fn test_empty_upstream_closes() {
        let upstream = fragments(vec![]);
        let (mut frames, mut handle) = spawn(upstream, text_frame);
        assert!(frames.next().await.is_none());
        assert_eq!(handle.terminated().await, BridgeState::Closed);
    }

    #[tokio::test]
    async fn test_json_frames_are_newline_delimited() {
        let upstream = futures::stream::iter(vec![
            Ok(serde_json::json!({"n": 1})),
            Ok(serde_json::json!({"n": 2})),
        ]);
        let (frames, _handle) = spawn(upstream, json_frame);
        let body: Vec<u8> = frames
            .collect::<Vec<_>>()
            .await
            .into_iter()
            .flat_map(|f| f.unwrap().to_vec())
            .collect();

        let lines: Vec<&str> = std::str::from_utf8(&body)
            .unwrap()
            .lines()
            .collect();
        assert_eq!(lines.len(), 2);
        for line in lines {
            let v: serde_json::Value = serde_json::from_str(line).unwrap();
            assert!(v["n"].is_u64());
        }
    }

    #[test]
    fn test_sse_frame_shape() {
        let frame = sse_frame(AgentEvent::MessageDelta {
            text: "hi".to_string(),
        })
        .unwrap();
        let text = std::str::from_utf8(&frame).unwrap();
        assert!(text.starts_with("event: message.delta\n"));
        assert!(text.contains("data: "));
        assert!(text.ends_with("\n\n"));
    }
}
