use std::sync::Mutex;

use crate::buffers::AudioBuffer;

/// Wrapper that turns any buffer into a thread-safe one by serializing every
/// operation behind a mutex.
///
/// The lock covers exactly one operation and is released before returning;
/// there is no re-entrancy. Share it between threads as
/// `Arc<SynchronizedBuffer<_>>` — all methods take `&self`.
#[derive(Debug)]
pub struct SynchronizedBuffer<B> {
    inner: Mutex<B>,
}

impl<B> SynchronizedBuffer<B> {
    pub fn new(buffer: B) -> Self {
        Self {
            inner: Mutex::new(buffer),
        }
    }

    /// Consumes the wrapper and returns the inner buffer.
    pub fn into_inner(self) -> B {
        self.inner.into_inner().unwrap_or_else(|e| e.into_inner())
    }
}

impl<B> SynchronizedBuffer<B> {
    fn lock(&self) -> std::sync::MutexGuard<'_, B> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

impl<B> SynchronizedBuffer<B> {
    pub fn write<T: Copy>(&self, value: T) -> bool
    where
        B: AudioBuffer<T>,
    {
        self.lock().write(value)
    }

    pub fn read<T: Copy>(&self) -> Option<T>
    where
        B: AudioBuffer<T>,
    {
        self.lock().read()
    }

    pub fn peek<T: Copy>(&self) -> Option<T>
    where
        B: AudioBuffer<T>,
    {
        self.lock().peek()
    }

    pub fn write_slice<T: Copy>(&self, data: &[T]) -> usize
    where
        B: AudioBuffer<T>,
    {
        self.lock().write_slice(data)
    }

    pub fn read_slice<T: Copy>(&self, out: &mut [T]) -> usize
    where
        B: AudioBuffer<T>,
    {
        self.lock().read_slice(out)
    }

    pub fn available<T: Copy>(&self) -> usize
    where
        B: AudioBuffer<T>,
    {
        self.lock().available()
    }

    pub fn available_for_write<T: Copy>(&self) -> usize
    where
        B: AudioBuffer<T>,
    {
        self.lock().available_for_write()
    }

    pub fn reset<T: Copy>(&self)
    where
        B: AudioBuffer<T>,
    {
        self.lock().reset()
    }

    pub fn capacity<T: Copy>(&self) -> usize
    where
        B: AudioBuffer<T>,
    {
        self.lock().capacity()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::buffers::RingBuffer;
    use std::sync::Arc;

    #[test]
    fn concurrent_producer_consumer() {
        let buf = Arc::new(SynchronizedBuffer::new(RingBuffer::<u32>::new(64)));
        let writer = Arc::clone(&buf);

        let handle = std::thread::spawn(move || {
            let mut next = 0u32;
            while next < 1000 {
                if writer.write(next) {
                    next += 1;
                }
            }
        });

        let mut received = Vec::with_capacity(1000);
        while received.len() < 1000 {
            if let Some(value) = buf.read() {
                received.push(value);
            }
        }
        handle.join().unwrap();

        let expected: Vec<u32> = (0..1000).collect();
        assert_eq!(received, expected);
    }
}
