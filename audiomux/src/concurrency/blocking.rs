use std::sync::{Condvar, Mutex};
use std::time::{Duration, Instant};

use crate::buffers::{AudioBuffer, RingBuffer};

struct Inner<T> {
    ring: RingBuffer<T>,
    read_timeout: Option<Duration>,
    write_timeout: Option<Duration>,
    non_blocking: bool,
}

/// Stream buffer with blocking semantics, the task/interrupt bridge of the
/// crate.
///
/// Readers and writers may wait on each other up to independently configured
/// timeouts (`None` waits forever). In non-blocking mode both paths transfer
/// whatever fits right now and return immediately — the discipline required
/// when one side runs in a context that must never wait. The mode is a flag
/// on the same type, so calling code does not change shape.
///
/// A short transfer after a timeout is indistinguishable from a buffer that
/// was momentarily full or empty.
pub struct BlockingBuffer<T> {
    inner: Mutex<Inner<T>>,
    readable: Condvar,
    writable: Condvar,
}

impl<T: Copy + Default> BlockingBuffer<T> {
    pub fn new(capacity: usize) -> Self {
        Self {
            inner: Mutex::new(Inner {
                ring: RingBuffer::new(capacity),
                read_timeout: None,
                write_timeout: None,
                non_blocking: false,
            }),
            readable: Condvar::new(),
            writable: Condvar::new(),
        }
    }

    /// Maximum wait on the read path; `None` waits forever.
    pub fn set_read_timeout(&self, timeout: Option<Duration>) {
        self.lock().read_timeout = timeout;
    }

    /// Maximum wait on the write path; `None` waits forever.
    pub fn set_write_timeout(&self, timeout: Option<Duration>) {
        self.lock().write_timeout = timeout;
    }

    /// Switches both paths to try-semantics that never wait.
    pub fn set_non_blocking(&self, active: bool) {
        self.lock().non_blocking = active;
        // wake any waiter so the new mode takes effect
        self.readable.notify_all();
        self.writable.notify_all();
    }

    /// Writes the whole slice, waiting for space as configured. Returns the
    /// count actually written, which is short when the deadline expires or
    /// the mode is non-blocking.
    pub fn write_slice(&self, data: &[T]) -> usize {
        let mut inner = self.lock();
        let deadline = inner.write_timeout.map(|t| Instant::now() + t);
        let mut written = 0;

        loop {
            written += inner.ring.write_slice(&data[written..]);
            if written > 0 {
                self.readable.notify_all();
            }
            if written == data.len() || inner.non_blocking {
                return written;
            }
            match self.wait(&self.writable, inner, deadline) {
                Some(guard) => inner = guard,
                None => return written,
            }
        }
    }

    /// Reads into the whole slice, waiting for data as configured. Returns
    /// the count actually read.
    pub fn read_slice(&self, out: &mut [T]) -> usize {
        let mut inner = self.lock();
        let deadline = inner.read_timeout.map(|t| Instant::now() + t);

        loop {
            let read = inner.ring.read_slice(out);
            if read > 0 {
                self.writable.notify_all();
                return read;
            }
            if out.is_empty() || inner.non_blocking {
                return 0;
            }
            match self.wait(&self.readable, inner, deadline) {
                Some(guard) => inner = guard,
                None => return 0,
            }
        }
    }

    pub fn write(&self, value: T) -> bool {
        self.write_slice(std::slice::from_ref(&value)) == 1
    }

    pub fn read(&self) -> Option<T> {
        let mut value = T::default();
        if self.read_slice(std::slice::from_mut(&mut value)) == 1 {
            Some(value)
        } else {
            None
        }
    }

    pub fn available(&self) -> usize {
        self.lock().ring.available()
    }

    pub fn available_for_write(&self) -> usize {
        self.lock().ring.available_for_write()
    }

    pub fn is_empty(&self) -> bool {
        self.available() == 0
    }

    pub fn is_full(&self) -> bool {
        self.available_for_write() == 0
    }

    pub fn capacity(&self) -> usize {
        self.lock().ring.capacity()
    }

    pub fn reset(&self) {
        self.lock().ring.reset();
        self.writable.notify_all();
    }

    /// Tears down and recreates the storage with a new capacity, discarding
    /// content. Only legal while no other thread is blocked on this buffer.
    pub fn resize(&self, capacity: usize) {
        self.lock().ring.resize(capacity);
        self.writable.notify_all();
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner<T>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }

    /// Waits on `condvar` until notified or `deadline`; `None` on timeout.
    fn wait<'a>(
        &self,
        condvar: &Condvar,
        guard: std::sync::MutexGuard<'a, Inner<T>>,
        deadline: Option<Instant>,
    ) -> Option<std::sync::MutexGuard<'a, Inner<T>>> {
        match deadline {
            None => Some(condvar.wait(guard).unwrap_or_else(|e| e.into_inner())),
            Some(deadline) => {
                let now = Instant::now();
                if now >= deadline {
                    return None;
                }
                let (guard, result) = condvar
                    .wait_timeout(guard, deadline - now)
                    .unwrap_or_else(|e| e.into_inner());
                if result.timed_out() {
                    None
                } else {
                    Some(guard)
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn timeout_returns_partial_count() {
        let buf = BlockingBuffer::<u8>::new(4);
        buf.set_write_timeout(Some(Duration::from_millis(10)));
        buf.set_read_timeout(Some(Duration::from_millis(10)));

        // 6 bytes into capacity 4: the deadline expires with 4 written
        assert_eq!(buf.write_slice(&[0, 1, 2, 3, 4, 5]), 4);

        let mut out = [0u8; 8];
        assert_eq!(buf.read_slice(&mut out), 4);
        // now empty: read times out with 0
        assert_eq!(buf.read_slice(&mut out), 0);
    }

    #[test]
    fn non_blocking_never_waits() {
        let buf = BlockingBuffer::<u8>::new(2);
        buf.set_non_blocking(true);
        assert_eq!(buf.write_slice(&[1, 2, 3]), 2);
        let mut out = [0u8; 4];
        assert_eq!(buf.read_slice(&mut out), 2);
        assert_eq!(buf.read_slice(&mut out), 0);
    }

    #[test]
    fn blocked_writer_resumes_when_reader_drains() {
        let buf = Arc::new(BlockingBuffer::<u32>::new(8));
        let writer = Arc::clone(&buf);

        let handle = std::thread::spawn(move || {
            let data: Vec<u32> = (0..100).collect();
            writer.write_slice(&data)
        });

        let mut received = Vec::new();
        while received.len() < 100 {
            let mut out = [0u32; 16];
            let n = buf.read_slice(&mut out);
            received.extend_from_slice(&out[..n]);
        }
        assert_eq!(handle.join().unwrap(), 100);
        assert_eq!(received, (0..100).collect::<Vec<u32>>());
    }
}
