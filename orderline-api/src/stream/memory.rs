//! In-memory message stream for testing.

use super::{MessageStream, StreamError, StreamMessage};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use tokio::sync::Notify;

#[derive(Debug)]
enum Entry {
    Message(StreamMessage),
    Error(StreamError),
}

#[derive(Debug, Default)]
struct State {
    queue: VecDeque<Entry>,
    next_offset: i64,
    closed: bool,
    acked: Vec<i64>,
    nacked: Vec<i64>,
    deliveries: Vec<i64>,
    failing_acks: usize,
    failing_nacks: usize,
}

/// Single-partition stream backed by a queue.
///
/// Clones share state, so a test keeps one handle to feed messages and
/// inspect acknowledgements while the loop owns another. A stream built
/// with [`MemoryStream::new`] ends when the queue drains; one built with
/// [`MemoryStream::open`] waits for more messages until [`MemoryStream::close`].
#[derive(Debug, Clone)]
pub struct MemoryStream {
    state: Arc<Mutex<State>>,
    notify: Arc<Notify>,
}

impl Default for MemoryStream {
    fn default() -> Self {
        Self::new()
    }
}

impl MemoryStream {
    /// A stream that ends once every queued message has been consumed.
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(State {
                closed: true,
                ..Default::default()
            })),
            notify: Arc::new(Notify::new()),
        }
    }

    /// A stream that blocks on an empty queue until closed.
    pub fn open() -> Self {
        Self {
            state: Arc::new(Mutex::new(State::default())),
            notify: Arc::new(Notify::new()),
        }
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a message and return its offset.
    pub fn push(&self, payload: impl Into<Vec<u8>>) -> i64 {
        let offset = {
            let mut state = self.lock();
            let offset = state.next_offset;
            state.next_offset += 1;
            state.queue.push_back(Entry::Message(StreamMessage {
                partition: 0,
                offset,
                key: None,
                payload: payload.into(),
            }));
            offset
        };
        self.notify.notify_one();
        offset
    }

    /// Make a future fetch fail with `error`, in queue order.
    pub fn push_error(&self, error: StreamError) {
        self.lock().queue.push_back(Entry::Error(error));
        self.notify.notify_one();
    }

    /// Fail the next `n` acknowledgements with a transient error.
    pub fn fail_next_acks(&self, n: usize) {
        self.lock().failing_acks = n;
    }

    /// Fail the next `n` rewinds with a transient error. A failed rewind
    /// leaves the message consumed, so the next fetch moves past it.
    pub fn fail_next_nacks(&self, n: usize) {
        self.lock().failing_nacks = n;
    }

    /// End the stream once the queue drains.
    pub fn close(&self) {
        self.lock().closed = true;
        self.notify.notify_one();
    }

    /// Offsets acknowledged, in order.
    pub fn acked(&self) -> Vec<i64> {
        self.lock().acked.clone()
    }

    /// Offsets rewound, in order.
    pub fn nacked(&self) -> Vec<i64> {
        self.lock().nacked.clone()
    }

    /// How many times `offset` was handed out by `fetch`.
    pub fn delivery_count(&self, offset: i64) -> usize {
        self.lock()
            .deliveries
            .iter()
            .filter(|&&o| o == offset)
            .count()
    }

    /// Messages still waiting to be fetched.
    pub fn pending(&self) -> usize {
        self.lock()
            .queue
            .iter()
            .filter(|e| matches!(e, Entry::Message(_)))
            .count()
    }
}

#[async_trait]
impl MessageStream for MemoryStream {
    async fn fetch(&mut self) -> Result<Option<StreamMessage>, StreamError> {
        loop {
            {
                let mut state = self.lock();
                match state.queue.pop_front() {
                    Some(Entry::Message(message)) => {
                        state.deliveries.push(message.offset);
                        return Ok(Some(message));
                    }
                    Some(Entry::Error(error)) => return Err(error),
                    None if state.closed => return Ok(None),
                    None => {}
                }
            }
            self.notify.notified().await;
        }
    }

    async fn ack(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let mut state = self.lock();
        if state.failing_acks > 0 {
            state.failing_acks -= 1;
            return Err(StreamError::Transient("injected ack failure".to_string()));
        }
        state.acked.push(message.offset);
        Ok(())
    }

    async fn nack(&mut self, message: &StreamMessage) -> Result<(), StreamError> {
        let mut state = self.lock();
        if state.failing_nacks > 0 {
            state.failing_nacks -= 1;
            return Err(StreamError::Transient("injected nack failure".to_string()));
        }
        state.nacked.push(message.offset);
        state.queue.push_front(Entry::Message(message.clone()));
        Ok(())
    }
}
