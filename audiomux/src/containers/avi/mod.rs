//! RIFF/AVI container demuxing.
//!
//! [`AviDemuxer`] is fed through `write` with arbitrarily sized chunks and
//! splits the interleaved stream data of the `movi` list: audio chunk
//! payloads (`##wb`) go to an [`std::io::Write`] sink, video chunk payloads
//! (`##db`/`##dc`) are framed through a [`VideoSink`]. The headers needed to
//! configure those sinks (sample rate, channels, codec FOURCC, frame timing)
//! are available once [`AviDemuxer::is_metadata_ready`] reports true, which
//! happens before the first stream-data byte is forwarded.

mod headers;
mod object;
mod parse_buffer;

pub use headers::{
    AudioFormatTag, AviMainHeader, AviStreamHeader, BitmapInfoHeader, Rect, WavFormatEx,
};
pub use object::{CHUNK_HEADER_SIZE, LIST_HEADER_SIZE, ObjectKind, ParseObject};
pub use parse_buffer::ParseBuffer;

use std::io::Write;

use log::{debug, info, warn};

use crate::utils::bytes::{fourcc, fourcc_str, read_u32_le};
use crate::utils::errors::AviError;

/// Receiver of demuxed video frames.
pub trait VideoSink {
    /// Announces a frame of `size` payload bytes.
    fn begin_frame(&mut self, size: usize);
    /// Delivers part of the frame payload.
    fn write(&mut self, data: &[u8]);
    /// Closes the frame; returns the milliseconds spent rendering it.
    fn end_frame(&mut self) -> u32;
}

/// Pacing hook called between video frames.
///
/// The default implementation does nothing; a playback caller can sleep the
/// remainder of `micro_sec_per_frame` here to hold the nominal frame rate.
pub trait FrameSync {
    fn delay_frame(&mut self, _micro_sec_per_frame: u32, _render_ms: u32) {}
}

/// No-op pacing.
#[derive(Default)]
pub struct NoPacing;

impl FrameSync for NoPacing {}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StreamContent {
    Audio,
    Video,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ParseState {
    Header,
    Hdrl,
    Avih,
    Strl,
    Strf,
    AfterStrf,
    Movi,
    SubChunk,
    SubChunkContinue,
    Ignore,
}

enum ParseStep {
    /// One transition completed; try another.
    Advanced,
    /// Not enough buffered bytes; the caller must supply more.
    NeedData,
    /// Unexpected structure; parsing is disabled permanently.
    Failed(AviError),
}

const DEFAULT_BUFFER_SIZE: usize = 1024;

/// Incremental RIFF/AVI demuxer.
///
/// `write` accepts any chunking of the stream — a tag or header split across
/// calls is completed once the missing bytes arrive. A structural error
/// (wrong tag where a specific one is required) disables parsing permanently:
/// later writes are accepted and dropped so the caller's copy loop does not
/// stall, and the cause stays available through
/// [`AviDemuxer::last_error`].
pub struct AviDemuxer {
    state: ParseState,
    parse_buffer: ParseBuffer,
    current_pos: u64,
    object_stack: Vec<ParseObject>,

    main_header: AviMainHeader,
    stream_headers: Vec<AviStreamHeader>,
    content_types: Vec<StreamContent>,
    audio_info: Option<WavFormatEx>,
    video_info: Option<BitmapInfoHeader>,
    video_format: [u8; 4],
    video_seconds: u32,

    current_stream_data: Option<ParseObject>,
    payload_remaining: usize,
    pad_remaining: usize,
    skip_remaining: u64,
    movi_end_pos: u64,

    active: bool,
    metadata_ready: bool,
    last_error: Option<AviError>,
    mute: bool,
    audio_bytes: u64,
    video_frames: u64,

    audio_out: Option<Box<dyn Write>>,
    video_out: Option<Box<dyn VideoSink>>,
    pacing: Box<dyn FrameSync>,
    validation: Option<Box<dyn FnMut(&AviDemuxer) -> bool>>,
}

impl Default for AviDemuxer {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl AviDemuxer {
    /// `buffer_size` bounds the largest header chunk that can be matched; the
    /// default of 1 KiB is plenty for well-formed files.
    pub fn new(buffer_size: usize) -> Self {
        Self {
            state: ParseState::Header,
            parse_buffer: ParseBuffer::new(buffer_size),
            current_pos: 0,
            object_stack: Vec::new(),
            main_header: AviMainHeader::default(),
            stream_headers: Vec::new(),
            content_types: Vec::new(),
            audio_info: None,
            video_info: None,
            video_format: [0; 4],
            video_seconds: 0,
            current_stream_data: None,
            payload_remaining: 0,
            pad_remaining: 0,
            skip_remaining: 0,
            movi_end_pos: 0,
            active: true,
            metadata_ready: false,
            last_error: None,
            mute: false,
            audio_bytes: 0,
            video_frames: 0,
            audio_out: None,
            video_out: None,
            pacing: Box::new(NoPacing),
            validation: None,
        }
    }

    /// Restarts parsing from the beginning of a new stream. Sinks, hooks and
    /// the mute flag are kept.
    pub fn begin(&mut self) {
        self.state = ParseState::Header;
        self.parse_buffer.clear();
        self.current_pos = 0;
        self.object_stack.clear();
        self.main_header = AviMainHeader::default();
        self.stream_headers.clear();
        self.content_types.clear();
        self.audio_info = None;
        self.video_info = None;
        self.video_format = [0; 4];
        self.video_seconds = 0;
        self.current_stream_data = None;
        self.payload_remaining = 0;
        self.pad_remaining = 0;
        self.skip_remaining = 0;
        self.movi_end_pos = 0;
        self.active = true;
        self.metadata_ready = false;
        self.last_error = None;
        self.audio_bytes = 0;
        self.video_frames = 0;
    }

    /// Stops parsing; later writes are dropped.
    pub fn end(&mut self) {
        self.active = false;
    }

    pub fn set_audio_output<W: Write + 'static>(&mut self, out: W) {
        self.audio_out = Some(Box::new(out));
    }

    pub fn set_video_output<V: VideoSink + 'static>(&mut self, out: V) {
        self.video_out = Some(Box::new(out));
    }

    pub fn set_frame_sync<S: FrameSync + 'static>(&mut self, sync: S) {
        self.pacing = Box::new(sync);
    }

    /// Suppresses audio output without stopping the parse.
    pub fn set_mute(&mut self, mute: bool) {
        self.mute = mute;
    }

    /// Registers a hook that may veto continued parsing. It is invoked
    /// exactly once, right after the `movi` list is found and before any
    /// stream data is forwarded, with all header metadata available.
    pub fn set_validation_hook<F>(&mut self, hook: F)
    where
        F: FnMut(&AviDemuxer) -> bool + 'static,
    {
        self.validation = Some(Box::new(hook));
    }

    /// True while the stream is parseable; false after a structural error or
    /// a validation veto.
    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn last_error(&self) -> Option<&AviError> {
        self.last_error.as_ref()
    }

    /// True once all headers have been parsed; the accessors below carry
    /// their final values from this point on.
    pub fn is_metadata_ready(&self) -> bool {
        self.metadata_ready
    }

    pub fn main_header(&self) -> &AviMainHeader {
        &self.main_header
    }

    pub fn stream_header(&self, index: usize) -> Option<&AviStreamHeader> {
        self.stream_headers.get(index)
    }

    pub fn stream_count(&self) -> usize {
        self.stream_headers.len()
    }

    pub fn content_types(&self) -> &[StreamContent] {
        &self.content_types
    }

    pub fn audio_info(&self) -> Option<&WavFormatEx> {
        self.audio_info.as_ref()
    }

    pub fn video_info(&self) -> Option<&BitmapInfoHeader> {
        self.video_info.as_ref()
    }

    /// Video codec FOURCC from the stream header.
    pub fn video_format(&self) -> &[u8; 4] {
        &self.video_format
    }

    /// Length of the video in seconds, derived from the stream header rate.
    pub fn video_seconds(&self) -> u32 {
        self.video_seconds
    }

    /// Total audio payload bytes forwarded so far.
    pub fn audio_bytes(&self) -> u64 {
        self.audio_bytes
    }

    /// Video frames completed so far.
    pub fn video_frames(&self) -> u64 {
        self.video_frames
    }

    /// Feeds container bytes. Returns the count accepted, which is `len` in
    /// every case except an oversized header chunk that can never fit the
    /// parse buffer (also a permanent failure, so later writes return `len`
    /// again).
    pub fn write(&mut self, data: &[u8]) -> usize {
        if !self.active {
            return data.len();
        }
        let mut offset = 0;
        loop {
            offset += self.parse_buffer.write_slice(&data[offset..]);
            let progressed = self.drain();
            if !self.active {
                self.parse_buffer.clear();
                return data.len();
            }
            if offset >= data.len() {
                return data.len();
            }
            if !progressed && self.parse_buffer.available_for_write() == 0 {
                // a header unit larger than the whole parse buffer can never
                // be matched
                self.fail(AviError::ChunkTooLarge {
                    size: self.parse_buffer.available(),
                    capacity: self.parse_buffer.capacity(),
                });
                return data.len();
            }
        }
    }

    fn drain(&mut self) -> bool {
        let mut progressed = false;
        loop {
            match self.parse() {
                ParseStep::Advanced => progressed = true,
                ParseStep::NeedData => break,
                ParseStep::Failed(error) => {
                    self.fail(error);
                    break;
                }
            }
        }
        progressed
    }

    fn fail(&mut self, error: AviError) {
        log::error!("avi parse failed: {error}");
        self.last_error = Some(error);
        self.active = false;
        self.parse_buffer.clear();
    }

    /// Attempts exactly one state transition.
    fn parse(&mut self) -> ParseStep {
        if self.skip_remaining > 0 {
            let n = (self.parse_buffer.available() as u64).min(self.skip_remaining) as usize;
            if n == 0 {
                return ParseStep::NeedData;
            }
            self.consume(n);
            self.skip_remaining -= n as u64;
            return ParseStep::Advanced;
        }

        match self.state {
            ParseState::Header => self.parse_header(),
            ParseState::Hdrl => self.parse_hdrl(),
            ParseState::Avih => self.parse_avih(),
            ParseState::Strl => self.parse_strl(),
            ParseState::Strf => self.parse_strf(),
            ParseState::AfterStrf => self.parse_after_strf(),
            ParseState::Movi => self.parse_movi(),
            ParseState::SubChunk => self.parse_sub_chunk(),
            ParseState::SubChunkContinue => self.parse_sub_chunk_continue(),
            ParseState::Ignore => {
                let n = self.parse_buffer.available();
                if n == 0 {
                    return ParseStep::NeedData;
                }
                self.consume(n);
                ParseStep::Advanced
            }
        }
    }

    // 'RIFF' fileSize 'AVI '
    fn parse_header(&mut self) -> ParseStep {
        if self.parse_buffer.available() < LIST_HEADER_SIZE {
            return ParseStep::NeedData;
        }
        let data = self.parse_buffer.data();
        if &data[0..4] != b"RIFF" || &data[8..12] != b"AVI " {
            return ParseStep::Failed(AviError::NotAvi);
        }
        let file_size = read_u32_le(data, 4) as usize;
        let riff = ParseObject::new(self.current_pos, *b"AVI ", file_size, ObjectKind::Chunk);
        self.push_object(riff);
        self.consume(LIST_HEADER_SIZE);
        self.state = ParseState::Hdrl;
        ParseStep::Advanced
    }

    fn parse_hdrl(&mut self) -> ParseStep {
        match self.match_list(b"hdrl") {
            ListMatch::NeedData => ParseStep::NeedData,
            ListMatch::No => ParseStep::Failed(AviError::UnexpectedTag {
                expected: "hdrl",
                pos: self.current_pos,
            }),
            ListMatch::Yes(list) => {
                self.push_object(list);
                self.consume(LIST_HEADER_SIZE);
                self.state = ParseState::Avih;
                ParseStep::Advanced
            }
        }
    }

    fn parse_avih(&mut self) -> ParseStep {
        match self.match_chunk(b"avih") {
            ChunkMatch::NeedData => ParseStep::NeedData,
            ChunkMatch::TooLarge(size) => ParseStep::Failed(AviError::ChunkTooLarge {
                size,
                capacity: self.parse_buffer.capacity(),
            }),
            ChunkMatch::No => ParseStep::Failed(AviError::UnexpectedTag {
                expected: "avih",
                pos: self.current_pos,
            }),
            ChunkMatch::Yes(chunk) => {
                let payload = &self.parse_buffer.data()[CHUNK_HEADER_SIZE..];
                let Some(header) = AviMainHeader::decode(payload) else {
                    return ParseStep::Failed(AviError::UnexpectedTag {
                        expected: "avih",
                        pos: self.current_pos,
                    });
                };
                self.main_header = header;
                debug!(
                    "avih: {} streams, {} us/frame",
                    header.streams, header.micro_sec_per_frame
                );
                self.push_object(chunk);
                self.consume(CHUNK_HEADER_SIZE + chunk.data_size);
                self.state = ParseState::Strl;
                ParseStep::Advanced
            }
        }
    }

    // LIST 'strl' followed immediately by the 'strh' chunk
    fn parse_strl(&mut self) -> ParseStep {
        let list = match self.match_list(b"strl") {
            ListMatch::NeedData => return ParseStep::NeedData,
            ListMatch::No => {
                return ParseStep::Failed(AviError::UnexpectedTag {
                    expected: "strl",
                    pos: self.current_pos,
                });
            }
            ListMatch::Yes(list) => list,
        };

        // the strh chunk must be complete as well before anything is consumed
        let data = self.parse_buffer.data();
        if data.len() < LIST_HEADER_SIZE + CHUNK_HEADER_SIZE {
            return ParseStep::NeedData;
        }
        if &data[LIST_HEADER_SIZE..LIST_HEADER_SIZE + 4] != b"strh" {
            return ParseStep::Failed(AviError::UnexpectedTag {
                expected: "strh",
                pos: self.current_pos + LIST_HEADER_SIZE as u64,
            });
        }
        let strh_size = read_u32_le(data, LIST_HEADER_SIZE + 4) as usize;
        let strh_end = LIST_HEADER_SIZE + CHUNK_HEADER_SIZE + strh_size + (strh_size % 2);
        if data.len() < strh_end {
            return ParseStep::NeedData;
        }
        let payload = &data[LIST_HEADER_SIZE + CHUNK_HEADER_SIZE..strh_end];
        let Some(header) = AviStreamHeader::decode(payload) else {
            return ParseStep::Failed(AviError::UnexpectedTag {
                expected: "strh",
                pos: self.current_pos + LIST_HEADER_SIZE as u64,
            });
        };
        debug!(
            "strh[{}]: {}/{}",
            self.stream_headers.len(),
            fourcc_str(&header.fcc_type),
            fourcc_str(&header.fcc_handler)
        );
        self.stream_headers.push(header);
        self.push_object(list);
        let strh = ParseObject::new(
            self.current_pos + LIST_HEADER_SIZE as u64,
            *b"strh",
            strh_size,
            ObjectKind::Chunk,
        );
        self.push_object(strh);
        self.consume(strh_end);
        self.state = ParseState::Strf;
        ParseStep::Advanced
    }

    fn parse_strf(&mut self) -> ParseStep {
        let chunk = match self.match_chunk(b"strf") {
            ChunkMatch::NeedData => return ParseStep::NeedData,
            ChunkMatch::TooLarge(size) => {
                return ParseStep::Failed(AviError::ChunkTooLarge {
                    size,
                    capacity: self.parse_buffer.capacity(),
                });
            }
            ChunkMatch::No => {
                return ParseStep::Failed(AviError::UnexpectedTag {
                    expected: "strf",
                    pos: self.current_pos,
                });
            }
            ChunkMatch::Yes(chunk) => chunk,
        };

        let stream_index = self.stream_headers.len().saturating_sub(1);
        let Some(stream_header) = self.stream_headers.last().copied() else {
            return ParseStep::Failed(AviError::UnknownStreamFormat(0));
        };
        let payload =
            &self.parse_buffer.data()[CHUNK_HEADER_SIZE..CHUNK_HEADER_SIZE + chunk.payload_size];

        if stream_header.is_audio() {
            let Some(audio) = WavFormatEx::decode(payload) else {
                return ParseStep::Failed(AviError::UnknownStreamFormat(stream_index));
            };
            info!(
                "audio: {:?}, {} Hz, {} ch, {} bit",
                audio.format_tag, audio.samples_per_sec, audio.channels, audio.bits_per_sample
            );
            self.audio_info = Some(audio);
            self.content_types.push(StreamContent::Audio);
        } else if stream_header.is_video() {
            let Some(video) = BitmapInfoHeader::decode(payload) else {
                return ParseStep::Failed(AviError::UnknownStreamFormat(stream_index));
            };
            self.video_format = stream_header.fcc_handler;
            let scale = stream_header.scale.max(1);
            let rate = stream_header.rate / scale;
            self.video_seconds = if rate == 0 {
                0
            } else {
                stream_header.length / rate
            };
            info!(
                "video: {}, {} s",
                fourcc_str(&self.video_format),
                self.video_seconds
            );
            self.video_info = Some(video);
            self.content_types.push(StreamContent::Video);
        } else {
            return ParseStep::Failed(AviError::UnknownStreamFormat(stream_index));
        }

        self.push_object(chunk);
        self.consume(CHUNK_HEADER_SIZE + chunk.data_size);
        self.state = ParseState::AfterStrf;
        ParseStep::Advanced
    }

    // ignore everything until the next LIST, then dispatch on its type
    fn parse_after_strf(&mut self) -> ParseStep {
        match self.parse_buffer.index_of(b"LIST") {
            Some(0) => {
                if self.parse_buffer.available() < LIST_HEADER_SIZE {
                    return ParseStep::NeedData;
                }
                let data = self.parse_buffer.data();
                let list_type = fourcc(data, 8);
                match &list_type {
                    b"strl" => {
                        self.state = ParseState::Strl;
                        ParseStep::Advanced
                    }
                    b"movi" => {
                        self.state = ParseState::Movi;
                        ParseStep::Advanced
                    }
                    _ => {
                        // e.g. an INFO list: discard it wholesale
                        let size = read_u32_le(data, 4) as usize;
                        let list =
                            ParseObject::new(self.current_pos, list_type, size, ObjectKind::List);
                        debug!("ignoring list {}", fourcc_str(&list_type));
                        self.consume(LIST_HEADER_SIZE);
                        self.skip_remaining = (list.data_size - 4) as u64;
                        ParseStep::Advanced
                    }
                }
            }
            Some(pos) => {
                self.consume(pos);
                ParseStep::Advanced
            }
            None => {
                // keep a tail window in case 'LIST' straddles this write
                let n = self.parse_buffer.available().saturating_sub(3);
                if n == 0 {
                    return ParseStep::NeedData;
                }
                self.consume(n);
                ParseStep::Advanced
            }
        }
    }

    fn parse_movi(&mut self) -> ParseStep {
        match self.match_list(b"movi") {
            ListMatch::NeedData => ParseStep::NeedData,
            ListMatch::No => ParseStep::Failed(AviError::UnexpectedTag {
                expected: "movi",
                pos: self.current_pos,
            }),
            ListMatch::Yes(list) => {
                self.movi_end_pos = list.end_pos;
                self.push_object(list);
                self.consume(LIST_HEADER_SIZE);
                self.metadata_ready = true;
                info!("metadata complete, movi ends at {}", self.movi_end_pos);

                if let Some(mut hook) = self.validation.take() {
                    let approved = hook(self);
                    self.validation = Some(hook);
                    if !approved {
                        return ParseStep::Failed(AviError::Rejected);
                    }
                }
                self.state = ParseState::SubChunk;
                ParseStep::Advanced
            }
        }
    }

    fn parse_sub_chunk(&mut self) -> ParseStep {
        if self.movi_end_pos > 0 && self.current_pos >= self.movi_end_pos {
            self.state = ParseState::Ignore;
            return ParseStep::Advanced;
        }
        if self.parse_buffer.available() < CHUNK_HEADER_SIZE {
            return ParseStep::NeedData;
        }
        let data = self.parse_buffer.data();
        let tag = fourcc(data, 0);

        if &tag == b"LIST" {
            if self.parse_buffer.available() < LIST_HEADER_SIZE {
                return ParseStep::NeedData;
            }
            let size = read_u32_le(data, 4) as usize;
            let list_type = fourcc(data, 8);
            let list = ParseObject::new(self.current_pos, list_type, size, ObjectKind::List);
            if &list_type == b"rec " {
                // rec groups interleave chunks that belong together; its
                // children are ordinary stream data
                self.push_object(list);
                self.consume(LIST_HEADER_SIZE);
            } else {
                debug!("skipping list {} inside movi", fourcc_str(&list_type));
                self.consume(LIST_HEADER_SIZE);
                self.skip_remaining = (list.data_size - 4) as u64;
            }
            return ParseStep::Advanced;
        }

        if &tag == b"idx1" {
            // index chunk after the stream data: nothing left to demux
            self.state = ParseState::Ignore;
            return ParseStep::Advanced;
        }

        let size = read_u32_le(data, 4) as usize;
        let stream_data = ParseObject::new(self.current_pos, tag, size, ObjectKind::StreamData);
        if !stream_data.is_valid_stream_data() {
            warn!(
                "unknown subchunk '{}' at {}",
                fourcc_str(&tag),
                self.current_pos
            );
            self.consume(CHUNK_HEADER_SIZE);
            self.skip_remaining = stream_data.data_size as u64;
            return ParseStep::Advanced;
        }

        debug!(
            "{}: [{}..{}]",
            fourcc_str(&tag),
            stream_data.start_pos,
            stream_data.end_pos
        );
        if stream_data.is_video() {
            if let Some(video_out) = self.video_out.as_mut() {
                video_out.begin_frame(stream_data.payload_size);
            }
        }
        self.push_object(stream_data);
        self.consume(CHUNK_HEADER_SIZE);
        self.payload_remaining = stream_data.payload_size;
        self.pad_remaining = stream_data.data_size - stream_data.payload_size;
        self.current_stream_data = Some(stream_data);
        self.state = ParseState::SubChunkContinue;
        ParseStep::Advanced
    }

    fn parse_sub_chunk_continue(&mut self) -> ParseStep {
        if self.payload_remaining > 0 || self.pad_remaining > 0 {
            let consumed = self.route_payload();
            return if consumed == 0 {
                ParseStep::NeedData
            } else {
                ParseStep::Advanced
            };
        }

        if let Some(stream_data) = self.current_stream_data.take() {
            if stream_data.is_video() {
                let render_ms = self
                    .video_out
                    .as_mut()
                    .map(|out| out.end_frame())
                    .unwrap_or(0);
                self.video_frames += 1;
                self.pacing
                    .delay_frame(self.main_header.micro_sec_per_frame, render_ms);
            }
        }
        self.state = ParseState::SubChunk;
        ParseStep::Advanced
    }

    /// Forwards buffered payload to the matching sink and consumes it,
    /// including the trailing alignment pad.
    fn route_payload(&mut self) -> usize {
        let Some(stream_data) = self.current_stream_data else {
            return 0;
        };
        let to_data = self.parse_buffer.available().min(self.payload_remaining);
        if to_data > 0 {
            {
                let payload = &self.parse_buffer.data()[..to_data];
                if stream_data.is_audio() {
                    self.audio_bytes += to_data as u64;
                    if !self.mute {
                        if let Some(audio_out) = self.audio_out.as_mut() {
                            if let Err(e) = audio_out.write_all(payload) {
                                warn!("audio sink error: {e}");
                            }
                        }
                    }
                } else if let Some(video_out) = self.video_out.as_mut() {
                    video_out.write(payload);
                }
            }
            self.payload_remaining -= to_data;
            self.consume(to_data);
        }

        let mut consumed = to_data;
        if self.payload_remaining == 0 && self.pad_remaining > 0 {
            let to_pad = self.parse_buffer.available().min(self.pad_remaining);
            self.pad_remaining -= to_pad;
            self.consume(to_pad);
            consumed += to_pad;
        }
        consumed
    }

    fn push_object(&mut self, object: ParseObject) {
        self.cleanup_stack();
        debug!(
            "{}{} ({}..{}) size {}",
            "  ".repeat(self.object_stack.len()),
            fourcc_str(object.id()),
            object.start_pos,
            object.end_pos,
            object.data_size
        );
        self.object_stack.push(object);
    }

    /// Pops every stacked object whose extent has been passed.
    fn cleanup_stack(&mut self) {
        while let Some(top) = self.object_stack.last() {
            if top.end_pos <= self.current_pos {
                self.object_stack.pop();
            } else {
                break;
            }
        }
    }

    fn consume(&mut self, len: usize) {
        self.current_pos += len as u64;
        self.parse_buffer.consume(len);
        self.cleanup_stack();
    }

    fn match_list(&self, expected: &[u8; 4]) -> ListMatch {
        if self.parse_buffer.available() < LIST_HEADER_SIZE {
            return ListMatch::NeedData;
        }
        let data = self.parse_buffer.data();
        if &data[0..4] != b"LIST" || &data[8..12] != expected {
            return ListMatch::No;
        }
        let size = read_u32_le(data, 4) as usize;
        ListMatch::Yes(ParseObject::new(
            self.current_pos,
            *expected,
            size,
            ObjectKind::List,
        ))
    }

    /// Matches a chunk whose complete payload must fit the parse buffer.
    fn match_chunk(&self, expected: &[u8; 4]) -> ChunkMatch {
        if self.parse_buffer.available() < CHUNK_HEADER_SIZE {
            return ChunkMatch::NeedData;
        }
        let data = self.parse_buffer.data();
        if &data[0..4] != expected {
            return ChunkMatch::No;
        }
        let size = read_u32_le(data, 4) as usize;
        let padded = size + (size % 2);
        if CHUNK_HEADER_SIZE + padded > self.parse_buffer.capacity() {
            return ChunkMatch::TooLarge(size);
        }
        if self.parse_buffer.available() < CHUNK_HEADER_SIZE + padded {
            return ChunkMatch::NeedData;
        }
        ChunkMatch::Yes(ParseObject::new(
            self.current_pos,
            *expected,
            size,
            ObjectKind::Chunk,
        ))
    }
}

enum ListMatch {
    Yes(ParseObject),
    No,
    NeedData,
}

enum ChunkMatch {
    Yes(ParseObject),
    No,
    NeedData,
    TooLarge(usize),
}

#[cfg(test)]
mod tests;
