//! Bounded capture queue
//!
//! Browser callbacks only `try_send` into the queue; the orchestrator drains
//! it between steps. When the queue is full the event is dropped and counted,
//! callbacks never block.

use journey_browser::NetworkSink;
use journey_core::RawNetworkEvent;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::debug;

pub struct CaptureQueue {
    tx: mpsc::Sender<RawNetworkEvent>,
    rx: mpsc::Receiver<RawNetworkEvent>,
    dropped: Arc<AtomicUsize>,
}

impl CaptureQueue {
    /// Queue holding at most `capacity` undrained events (minimum 1)
    pub fn new(capacity: usize) -> Self {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        Self {
            tx,
            rx,
            dropped: Arc::new(AtomicUsize::new(0)),
        }
    }

    /// Sink to hand to [`journey_browser::Page::observe_network`]
    pub fn sink(&self) -> NetworkSink {
        let tx = self.tx.clone();
        let dropped = Arc::clone(&self.dropped);
        Arc::new(move |event: RawNetworkEvent| {
            if let Err(e) = tx.try_send(event) {
                dropped.fetch_add(1, Ordering::Relaxed);
                debug!("Capture queue rejected event: {}", e);
            }
        })
    }

    /// Everything queued so far, in arrival order
    pub fn drain(&mut self) -> Vec<RawNetworkEvent> {
        let mut events = Vec::new();
        while let Ok(event) = self.rx.try_recv() {
            events.push(event);
        }
        events
    }

    /// Events lost to a full queue
    pub fn dropped(&self) -> usize {
        self.dropped.load(Ordering::Relaxed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_drain_preserves_order() {
        let mut queue = CaptureQueue::new(8);
        let sink = queue.sink();
        sink(RawNetworkEvent::request("POST", "https://x/bff/a"));
        sink(RawNetworkEvent::response(200, "https://x/bff/a"));

        let drained = queue.drain();
        assert_eq!(drained.len(), 2);
        assert_eq!(drained[0].method.as_deref(), Some("POST"));
        assert_eq!(drained[1].status, Some(200));
        assert!(queue.drain().is_empty());
    }

    #[test]
    fn test_full_queue_drops_and_counts() {
        let mut queue = CaptureQueue::new(1);
        let sink = queue.sink();
        sink(RawNetworkEvent::response(200, "https://x/bff/1"));
        sink(RawNetworkEvent::response(200, "https://x/bff/2"));
        assert_eq!(queue.dropped(), 1);
        assert_eq!(queue.drain().len(), 1);

        sink(RawNetworkEvent::response(200, "https://x/bff/3"));
        assert_eq!(queue.drain()[0].url, "https://x/bff/3");
    }

    #[test]
    fn test_sink_from_another_thread() {
        let mut queue = CaptureQueue::new(16);
        let sink = queue.sink();
        std::thread::spawn(move || {
            for i in 0..4 {
                sink(RawNetworkEvent::response(200, format!("https://x/bff/{}", i)));
            }
        })
        .join()
        .unwrap();
        assert_eq!(queue.drain().len(), 4);
    }
}
