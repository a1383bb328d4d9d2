use std::collections::VecDeque;

use super::{AudioBuffer, SingleBuffer};

/// N-way pipelined buffer: a double/triple buffer generalized to N.
///
/// Owns an arena of `buffer_count` fixed-size [`SingleBuffer`]s and rotates
/// them between an *available* queue and a *filled* queue. The producer fills
/// exactly one buffer at a time; the consumer drains exactly one. A full
/// write buffer is handed to the filled queue, a drained read buffer is
/// recycled to the available queue, so ownership of a block is always
/// unambiguous:
///
/// `available -> current-write -> filled -> current-read -> available`
///
/// Data parked in a partially filled write buffer is not readable until the
/// buffer fills or [`NBuffer::write_end`] delivers it explicitly. When the
/// available queue runs dry, writes fail instead of blocking; see
/// [`crate::concurrency::sync_nbuffer`] for the blocking variant.
#[derive(Debug)]
pub struct NBuffer<T> {
    arena: Vec<SingleBuffer<T>>,
    available: VecDeque<usize>,
    filled: VecDeque<usize>,
    current_write: Option<usize>,
    current_read: Option<usize>,
    buffer_size: usize,
}

impl<T: Copy + Default> NBuffer<T> {
    pub fn new(buffer_size: usize, buffer_count: usize) -> Self {
        let arena = (0..buffer_count)
            .map(|_| SingleBuffer::new(buffer_size))
            .collect();
        Self {
            arena,
            available: (0..buffer_count).collect(),
            filled: VecDeque::with_capacity(buffer_count),
            current_write: None,
            current_read: None,
            buffer_size,
        }
    }

    pub fn buffer_count(&self) -> usize {
        self.arena.len()
    }

    /// Number of filled buffers waiting for the consumer.
    pub fn buffer_count_filled(&self) -> usize {
        self.filled.len()
    }

    /// Number of empty buffers waiting for the producer.
    pub fn buffer_count_empty(&self) -> usize {
        self.available.len()
    }

    /// Delivers the current write buffer to the consumer even if it is not
    /// full, so a partial final block still arrives.
    pub fn write_end(&mut self) {
        if let Some(index) = self.current_write.take() {
            if self.arena[index].is_empty() {
                self.available.push_back(index);
            } else {
                self.filled.push_back(index);
            }
        }
    }

    /// Recycles the current read buffer immediately, discarding whatever is
    /// left in it.
    pub fn read_end(&mut self) {
        if let Some(index) = self.current_read.take() {
            self.arena[index].reset();
            self.available.push_back(index);
        }
    }

    fn ensure_write_buffer(&mut self) -> Option<usize> {
        if self.current_write.is_none() {
            self.current_write = self.available.pop_front();
        }
        self.current_write
    }

    /// Hands a full write buffer to the filled queue and draws the next one.
    fn rotate_full_write_buffer(&mut self) {
        if let Some(index) = self.current_write {
            if self.arena[index].is_full() {
                self.filled.push_back(index);
                self.current_write = self.available.pop_front();
            }
        }
    }

    /// Makes sure the current read buffer has data, recycling drained buffers
    /// along the way.
    fn ensure_read_buffer(&mut self) -> Option<usize> {
        if self.current_read.is_none() {
            self.current_read = self.filled.pop_front();
        }
        if let Some(index) = self.current_read {
            if self.arena[index].is_empty() {
                self.arena[index].reset();
                self.available.push_back(index);
                self.current_read = self.filled.pop_front();
            }
        }
        self.current_read
    }
}

impl<T: Copy + Default> AudioBuffer<T> for NBuffer<T> {
    fn write(&mut self, value: T) -> bool {
        let Some(index) = self.ensure_write_buffer() else {
            return false;
        };
        let result = self.arena[index].write(value);
        self.rotate_full_write_buffer();
        result
    }

    fn read(&mut self) -> Option<T> {
        let index = self.ensure_read_buffer()?;
        self.arena[index].read()
    }

    fn peek(&self) -> Option<T> {
        // peek must not rotate buffers, so only the current read slot and the
        // oldest filled buffer are candidates
        if let Some(index) = self.current_read {
            if !self.arena[index].is_empty() {
                return self.arena[index].peek();
            }
        }
        self.filled.front().and_then(|&index| self.arena[index].peek())
    }

    /// Readable elements in the current read buffer.
    fn available(&self) -> usize {
        if let Some(index) = self.current_read {
            let n = self.arena[index].available();
            if n > 0 {
                return n;
            }
        }
        self.filled
            .front()
            .map(|&index| self.arena[index].available())
            .unwrap_or(0)
    }

    /// Writable space in the current write buffer; 0 once all buffers are
    /// filled.
    fn available_for_write(&self) -> usize {
        if let Some(index) = self.current_write {
            return self.arena[index].available_for_write();
        }
        if self.available.is_empty() {
            0
        } else {
            self.buffer_size
        }
    }

    fn reset(&mut self) {
        self.available.clear();
        self.filled.clear();
        self.current_write = None;
        self.current_read = None;
        for (index, buffer) in self.arena.iter_mut().enumerate() {
            buffer.reset();
            self.available.push_back(index);
        }
    }

    fn capacity(&self) -> usize {
        self.buffer_size * self.arena.len()
    }

    fn write_slice(&mut self, data: &[T]) -> usize {
        let mut written = 0;
        while written < data.len() {
            let Some(index) = self.ensure_write_buffer() else {
                break;
            };
            let n = self.arena[index].write_slice(&data[written..]);
            written += n;
            self.rotate_full_write_buffer();
            if n == 0 {
                break;
            }
        }
        written
    }

    fn read_slice(&mut self, out: &mut [T]) -> usize {
        let mut read = 0;
        while read < out.len() {
            let Some(index) = self.ensure_read_buffer() else {
                break;
            };
            let n = self.arena[index].read_slice(&mut out[read..]);
            read += n;
            if n == 0 {
                break;
            }
        }
        read
    }
}
