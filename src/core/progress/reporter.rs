// ─── Progress Reporter ───
// Shared item/byte counters fed by wrapped sequences and byte streams.

use std::pin::Pin;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::task::{Context, Poll};

use bytes::Bytes;
use futures_util::Stream;
use serde::Serialize;
use tokio::sync::mpsc::{self, error::TrySendError, Receiver, Sender};
use tracing::debug;

use crate::core::planner::{ContentItem, Phase};

/// Events buffered for a slow consumer before new ones are held back.
pub const DEFAULT_EVENT_CAPACITY: usize = 256;

/// Counters of one sync phase. Safe to bump from any worker.
#[derive(Debug, Default)]
pub struct SyncState {
    items_total: AtomicU64,
    items_done: AtomicU64,
    bytes_total: AtomicU64,
    bytes_done: AtomicU64,
}

/// Point-in-time copy of [`SyncState`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct SyncSnapshot {
    pub items_total: u64,
    pub items_done: u64,
    pub bytes_total: u64,
    pub bytes_done: u64,
}

/// Payload published to progress consumers.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum ProgressEvent {
    PhaseStarted { phase: Phase, items: u64, bytes: u64 },
    ItemCompleted { size: u64 },
    BytesConsumed { bytes: u64 },
    PhaseFinished { phase: Phase, snapshot: SyncSnapshot },
}

/// How much progress one produced value represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Tick {
    Item(u64),
    Bytes(u64),
    Nothing,
}

/// Values that can be counted when a tracked producer yields them.
pub trait Measure {
    fn measure(&self) -> Tick;
}

impl Measure for Bytes {
    fn measure(&self) -> Tick {
        Tick::Bytes(self.len() as u64)
    }
}

impl Measure for ContentItem {
    fn measure(&self) -> Tick {
        Tick::Item(self.size)
    }
}

impl<T: Measure, E> Measure for Result<T, E> {
    fn measure(&self) -> Tick {
        match self {
            Ok(value) => value.measure(),
            Err(_) => Tick::Nothing,
        }
    }
}

/// Sending side of the event channel.
///
/// Byte counts that do not fit into a full channel are carried over into
/// the next `BytesConsumed` event instead of being queued one per chunk.
#[derive(Debug)]
struct EventSink {
    tx: Sender<ProgressEvent>,
    unsent_bytes: AtomicU64,
}

/// Cloneable handle shared by every worker of a sync.
#[derive(Debug, Clone, Default)]
pub struct ProgressReporter {
    state: Arc<SyncState>,
    events: Option<Arc<EventSink>>,
}

impl ProgressReporter {
    /// Counters only, no event channel.
    pub fn new() -> Self {
        Self::default()
    }

    /// Reporter plus the receiving end of a channel holding at most
    /// `capacity` undelivered events.
    pub fn channel(capacity: usize) -> (Self, Receiver<ProgressEvent>) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        let reporter = Self {
            state: Arc::default(),
            events: Some(Arc::new(EventSink {
                tx,
                unsent_bytes: AtomicU64::new(0),
            })),
        };
        (reporter, rx)
    }

    /// Reset the counters for a new phase covering `items`.
    pub fn begin(&self, phase: Phase, items: &[ContentItem]) {
        let count = items.len() as u64;
        let bytes = items.iter().map(|i| i.size).sum();

        self.state.items_total.store(count, Ordering::SeqCst);
        self.state.items_done.store(0, Ordering::SeqCst);
        self.state.bytes_total.store(bytes, Ordering::SeqCst);
        self.state.bytes_done.store(0, Ordering::SeqCst);

        self.emit(ProgressEvent::PhaseStarted {
            phase,
            items: count,
            bytes,
        });
    }

    pub fn finish(&self, phase: Phase) -> SyncSnapshot {
        let snapshot = self.snapshot();
        self.emit(ProgressEvent::PhaseFinished { phase, snapshot });
        snapshot
    }

    pub fn item_completed(&self, size: u64) {
        self.state.items_done.fetch_add(1, Ordering::SeqCst);
        self.emit(ProgressEvent::ItemCompleted { size });
    }

    pub fn bytes_consumed(&self, bytes: u64) {
        self.state.bytes_done.fetch_add(bytes, Ordering::SeqCst);

        let Some(sink) = &self.events else {
            return;
        };
        let bytes = sink.unsent_bytes.swap(0, Ordering::SeqCst) + bytes;
        let event = ProgressEvent::BytesConsumed { bytes };
        if let Err(TrySendError::Full(_)) = sink.tx.try_send(event) {
            sink.unsent_bytes.fetch_add(bytes, Ordering::SeqCst);
        }
    }

    pub fn record(&self, tick: Tick) {
        match tick {
            Tick::Item(size) => self.item_completed(size),
            Tick::Bytes(n) => self.bytes_consumed(n),
            Tick::Nothing => {}
        }
    }

    pub fn snapshot(&self) -> SyncSnapshot {
        SyncSnapshot {
            items_total: self.state.items_total.load(Ordering::SeqCst),
            items_done: self.state.items_done.load(Ordering::SeqCst),
            bytes_total: self.state.bytes_total.load(Ordering::SeqCst),
            bytes_done: self.state.bytes_done.load(Ordering::SeqCst),
        }
    }

    /// Wrap a stream or iterator so every yielded value is counted.
    pub fn track<S>(&self, inner: S) -> Tracked<S> {
        Tracked {
            inner,
            reporter: self.clone(),
        }
    }

    fn emit(&self, event: ProgressEvent) {
        let Some(sink) = &self.events else {
            return;
        };
        // A closed channel just means nobody is watching.
        if let Err(TrySendError::Full(event)) = sink.tx.try_send(event) {
            debug!("Progress consumer is lagging; dropped {:?}", event);
        }
    }
}

/// A producer whose output feeds a [`ProgressReporter`].
pub struct Tracked<S> {
    inner: S,
    reporter: ProgressReporter,
}

impl<S> Stream for Tracked<S>
where
    S: Stream + Unpin,
    S::Item: Measure,
{
    type Item = S::Item;

    fn poll_next(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Option<Self::Item>> {
        let this = self.get_mut();
        let next = Pin::new(&mut this.inner).poll_next(cx);
        if let Poll::Ready(Some(value)) = &next {
            this.reporter.record(value.measure());
        }
        next
    }

    fn size_hint(&self) -> (usize, Option<usize>) {
        self.inner.size_hint()
    }
}

impl<I> Iterator for Tracked<I>
where
    I: Iterator,
    I::Item: Measure,
{
    type Item = I::Item;

    fn next(&mut self) -> Option<Self::Item> {
        let value = self.inner.next()?;
        self.reporter.record(value.measure());
        Some(value)
    }
}
