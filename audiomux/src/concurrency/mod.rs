//! Thread-synchronized buffer variants.
//!
//! Two call disciplines coexist here. Task-style callers may block up to a
//! configured timeout on both the read and the write path. Callers that must
//! never block (interrupt-style contexts, latency-critical callbacks) switch
//! the same object into non-blocking mode with a flag instead of using a
//! different type, so the surrounding code stays uniform.
//!
//! A timeout is reported as a short transfer (possibly zero elements), the
//! same way an instantaneously full or empty buffer is. Callers that need to
//! distinguish the two must track wall-clock time themselves.

mod blocking;
pub mod sync_nbuffer;
mod synchronized;

pub use blocking::BlockingBuffer;
pub use sync_nbuffer::{NBufferConsumer, NBufferProducer};
pub use synchronized::SynchronizedBuffer;
