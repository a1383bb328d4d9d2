//! Buffered demuxing of AVI and M4A audio streams.
//!
//! ## Technical Overview
//!
//! Incremental parsers for the two container families together with the
//! buffer machinery that feeds them: fixed-capacity linear and circular
//! buffers, an N-way pipelined buffer that rotates whole blocks between a
//! producer and a consumer, and thread-synchronized variants of both.
//!
//! ### Container Support
//!
//! **RIFF/AVI**: nested LIST/CHUNK structure, interleaved `##wb` audio and
//! `##db`/`##dc` video stream data inside the `movi` list.
//! **MP4/M4A**: ISO/IEC 14496-12 box tree, audio sample extraction driven by
//! the `stsd`/`stsz`/`stco` tables and the `mdat` payload.
//!
//! Both parsers accept arbitrarily chunked input: container state is carried
//! across `write` calls, so a stream may be fed byte by byte or in large
//! blocks with identical results.
//!
//! ## Quick Start
//!
//! Steps for demuxing an M4A stream:
//!
//! 1. Create an [`containers::m4a::M4aDemuxer`] and register a frame callback
//! 2. Feed container bytes through `write`
//! 3. Receive elementary-stream frames (ADTS-framed for AAC) in the callback
//!
//! ```rust
//! use audiomux::containers::m4a::M4aDemuxer;
//!
//! let mut demuxer = M4aDemuxer::new();
//! demuxer.set_frame_callback(|frame| {
//!     println!("{}: {} bytes", frame.mime, frame.data.len());
//! });
//!
//! let data: &[u8] = &[]; // container bytes from a file or socket
//! demuxer.write(data);
//! ```

/// Buffer implementations shared by the demuxers and their callers.
///
/// - **Trait contract** ([`buffers::AudioBuffer`]): read/write/peek with
///   silent partial-transfer semantics
/// - **Linear** ([`buffers::SingleBuffer`]): cursor pair over one allocation
/// - **Circular** ([`buffers::RingBuffer`]): head/tail with wraparound
/// - **Pipelined** ([`buffers::NBuffer`]): whole-block ownership rotation
pub mod buffers;

/// Thread-synchronized buffer variants.
///
/// - **Mutex wrapper** ([`concurrency::SynchronizedBuffer`]): serializes any
///   buffer behind a lock
/// - **Blocking stream** ([`concurrency::BlockingBuffer`]): condvar-backed
///   byte stream with independent read/write timeouts
/// - **Channel-backed N-buffer** ([`concurrency::sync_nbuffer`]): block
///   hand-off between threads through ownership-transferring queues
pub mod concurrency;

/// Container demuxers.
///
/// - **AVI** ([`containers::avi`]): RIFF LIST/CHUNK state machine splitting
///   interleaved audio/video stream data
/// - **M4A** ([`containers::m4a`]): MP4 box walker with streaming and
///   seekable-file sample extraction
pub mod containers;

/// Utility functions and supporting infrastructure.
///
/// - **Byte-order helpers** ([`utils::bytes`]): explicit little/big-endian
///   field reads
/// - **Error Handling** ([`utils::errors`]): error types
pub mod utils;
