//! Channel-backed N-buffer for cross-thread block hand-off.
//!
//! The same ownership cycle as [`crate::buffers::NBuffer`], but the two index
//! queues become channels and the producer and consumer live on different
//! threads. Whole [`SingleBuffer`] blocks travel through the channels, so at
//! any instant each block is owned by exactly one side — the channels are the
//! only synchronization, there is no shared lock around the payload.
//!
//! ```text
//! NBufferProducer --(filled)--> NBufferConsumer
//!        ^                            |
//!        +--------(recycled)----------+
//! ```
//!
//! Each half has its own maximum wait for drawing a block from its incoming
//! channel, and a non-blocking mode that never waits.

use std::sync::mpsc::{Receiver, RecvTimeoutError, Sender, TryRecvError, channel};
use std::time::Duration;

use crate::buffers::{AudioBuffer, SingleBuffer};

/// Creates a connected producer/consumer pair sharing `buffer_count` blocks
/// of `buffer_size` elements.
pub fn channel_nbuffer<T: Copy + Default + Send + 'static>(
    buffer_size: usize,
    buffer_count: usize,
) -> (NBufferProducer<T>, NBufferConsumer<T>) {
    let (recycled_tx, recycled_rx) = channel();
    let (filled_tx, filled_rx) = channel();

    for _ in 0..buffer_count {
        // unwrap is fine: both ends are alive right here
        recycled_tx.send(SingleBuffer::new(buffer_size)).unwrap();
    }

    (
        NBufferProducer {
            recycled: recycled_rx,
            filled: filled_tx,
            current: None,
            max_wait: None,
            non_blocking: false,
        },
        NBufferConsumer {
            filled: filled_rx,
            recycled: recycled_tx,
            current: None,
            max_wait: None,
            non_blocking: false,
        },
    )
}

/// Writing half: fills one block at a time and hands full blocks to the
/// consumer.
pub struct NBufferProducer<T> {
    recycled: Receiver<SingleBuffer<T>>,
    filled: Sender<SingleBuffer<T>>,
    current: Option<SingleBuffer<T>>,
    max_wait: Option<Duration>,
    non_blocking: bool,
}

/// Reading half: drains one block at a time and recycles empty blocks to the
/// producer.
pub struct NBufferConsumer<T> {
    filled: Receiver<SingleBuffer<T>>,
    recycled: Sender<SingleBuffer<T>>,
    current: Option<SingleBuffer<T>>,
    max_wait: Option<Duration>,
    non_blocking: bool,
}

fn draw<T>(
    rx: &Receiver<SingleBuffer<T>>,
    max_wait: Option<Duration>,
    non_blocking: bool,
) -> Option<SingleBuffer<T>> {
    if non_blocking {
        return match rx.try_recv() {
            Ok(buffer) => Some(buffer),
            Err(TryRecvError::Empty) | Err(TryRecvError::Disconnected) => None,
        };
    }
    match max_wait {
        None => rx.recv().ok(),
        Some(wait) => match rx.recv_timeout(wait) {
            Ok(buffer) => Some(buffer),
            Err(RecvTimeoutError::Timeout) | Err(RecvTimeoutError::Disconnected) => None,
        },
    }
}

impl<T: Copy + Default> NBufferProducer<T> {
    /// Maximum wait for an empty block; `None` waits forever.
    pub fn set_max_wait(&mut self, wait: Option<Duration>) {
        self.max_wait = wait;
    }

    /// Never wait for an empty block; writes fail instead.
    pub fn set_non_blocking(&mut self, active: bool) {
        self.non_blocking = active;
    }

    /// Writes as much of `data` as block ownership allows, returning the
    /// count written. Blocks for empty blocks per configuration.
    pub fn write_slice(&mut self, data: &[T]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let mut buffer = match self.take_current() {
                Some(buffer) => buffer,
                None => break,
            };
            written += buffer.write_slice(&data[written..]);
            if buffer.is_full() {
                if self.filled.send(buffer).is_err() {
                    // consumer is gone; drop the block and stop
                    break;
                }
            } else {
                self.current = Some(buffer);
            }
        }
        written
    }

    pub fn write(&mut self, value: T) -> bool {
        self.write_slice(std::slice::from_ref(&value)) == 1
    }

    /// Delivers the current partially filled block to the consumer, so a
    /// final short block still arrives.
    pub fn flush(&mut self) {
        if let Some(buffer) = self.current.take() {
            if !buffer.is_empty() {
                let _ = self.filled.send(buffer);
            } else {
                self.current = Some(buffer);
            }
        }
    }

    fn take_current(&mut self) -> Option<SingleBuffer<T>> {
        match self.current.take() {
            Some(buffer) => Some(buffer),
            None => draw(&self.recycled, self.max_wait, self.non_blocking),
        }
    }
}

impl<T: Copy + Default> NBufferConsumer<T> {
    /// Maximum wait for a filled block; `None` waits forever.
    pub fn set_max_wait(&mut self, wait: Option<Duration>) {
        self.max_wait = wait;
    }

    /// Never wait for a filled block; reads return 0 instead.
    pub fn set_non_blocking(&mut self, active: bool) {
        self.non_blocking = active;
    }

    /// Reads into `out`, returning the count read. Blocks for the first
    /// filled block per configuration; once some data has been read, only
    /// immediately available blocks are drained before returning.
    pub fn read_slice(&mut self, out: &mut [T]) -> usize {
        let mut read = 0;
        while read < out.len() {
            let mut buffer = match self.take_current(read > 0) {
                Some(buffer) => buffer,
                None => break,
            };
            read += buffer.read_slice(&mut out[read..]);
            if buffer.is_empty() {
                buffer.reset();
                let _ = self.recycled.send(buffer);
            } else {
                self.current = Some(buffer);
            }
        }
        read
    }

    pub fn read(&mut self) -> Option<T> {
        let mut value = T::default();
        if self.read_slice(std::slice::from_mut(&mut value)) == 1 {
            Some(value)
        } else {
            None
        }
    }

    /// Readable elements in the block currently held by the consumer.
    pub fn available(&self) -> usize {
        self.current
            .as_ref()
            .map(|buffer| buffer.available())
            .unwrap_or(0)
    }

    /// Recycles the currently held block immediately, discarding its
    /// remainder.
    pub fn read_end(&mut self) {
        if let Some(mut buffer) = self.current.take() {
            buffer.reset();
            let _ = self.recycled.send(buffer);
        }
    }

    fn take_current(&mut self, have_data: bool) -> Option<SingleBuffer<T>> {
        match self.current.take() {
            Some(buffer) => Some(buffer),
            None => draw(&self.filled, self.max_wait, self.non_blocking || have_data),
        }
    }
}
