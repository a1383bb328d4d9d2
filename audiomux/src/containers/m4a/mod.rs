//! MP4/M4A audio demuxing.
//!
//! Two demuxers share the box walker and the frame machinery:
//!
//! - [`M4aDemuxer`] consumes a byte stream through `write` and emits frames
//!   on the fly. It requires fast-start ordering (`moov` before `mdat`).
//! - [`M4aFileDemuxer`] works on a seekable source, keeps the `stsz` table
//!   out of memory by windowed re-reads, and accepts either box order.
//!
//! Codec identification is by sample-entry FOURCC inside `stsd`: `mp4a`
//! (AAC, configured from `esds`), `alac` (magic cookie preserved byte-exact)
//! and `.mp3`.

mod demuxer;
mod file;
mod parser;

pub use demuxer::{
    AudioConfig, Codec, EsdsInfo, Frame, FrameAssembler, M4aDemuxer, SampleExtractor,
    StszSampleSize, TrackTiming, write_adts_header,
};
pub use file::M4aFileDemuxer;
pub use parser::{BoxEvent, BoxHandler, Mp4Parser};

#[cfg(test)]
mod tests;
