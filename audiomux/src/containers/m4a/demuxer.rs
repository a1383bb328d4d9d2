use log::{debug, error, info, warn};

use super::parser::{BoxEvent, Mp4Parser};
use crate::buffers::{AudioBuffer, SingleBuffer};
use crate::utils::bytes::{fourcc, fourcc_str, read_u32_be};
use crate::utils::errors::Mp4Error;

/// Sample sizes travel as u32 in the container, but audio frames are one or
/// two KiB at most, so the in-memory table narrows them to u16. This halves
/// the table for long recordings.
pub type StszSampleSize = u16;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Codec {
    #[default]
    Unknown,
    Aac,
    Alac,
    Mp3,
}

impl Codec {
    pub fn mime(&self) -> &'static str {
        match self {
            Codec::Aac => "audio/aac",
            Codec::Alac => "audio/alac",
            Codec::Mp3 => "audio/mpeg",
            Codec::Unknown => "",
        }
    }
}

/// One extracted elementary-stream frame.
///
/// `data` borrows demuxer-internal storage and is only valid inside the
/// callback; copy it for anything longer-lived. AAC frames arrive with the
/// 7-byte ADTS header already prepended. `timestamp_ms` is derived from the
/// `mdhd` timescale and the `stts` durations when both were seen.
#[derive(Debug)]
pub struct Frame<'a> {
    pub codec: Codec,
    pub mime: &'static str,
    pub data: &'a [u8],
    pub sample_index: usize,
    pub timestamp_ms: Option<u64>,
}

/// Media timing of the audio track: `mdhd` timescale plus the `stts`
/// sample-duration run-length table.
#[derive(Debug, Clone, Default)]
pub struct TrackTiming {
    timescale: u32,
    entries: Vec<(u32, u32)>,
}

impl TrackTiming {
    pub fn set_timescale(&mut self, timescale: u32) {
        self.timescale = timescale;
    }

    pub fn timescale(&self) -> u32 {
        self.timescale
    }

    /// Adds one stts run: `count` samples of `delta` media units each.
    pub fn push_entry(&mut self, count: u32, delta: u32) {
        self.entries.push((count, delta));
    }

    pub fn reset(&mut self) {
        self.timescale = 0;
        self.entries.clear();
    }

    /// Media time of the given sample in milliseconds; `None` until both
    /// timescale and durations are known.
    pub fn timestamp_ms(&self, sample_index: usize) -> Option<u64> {
        if self.timescale == 0 || self.entries.is_empty() {
            return None;
        }
        let mut remaining = sample_index as u64;
        let mut units = 0u64;
        let mut last_delta = 0u64;
        for &(count, delta) in &self.entries {
            let n = remaining.min(count as u64);
            units += n * delta as u64;
            remaining -= n;
            last_delta = delta as u64;
            if remaining == 0 {
                break;
            }
        }
        // samples past the table continue at the last known duration
        units += remaining * last_delta;
        Some(units * 1000 / self.timescale as u64)
    }
}

/// Audio configuration accumulated from the `stsd` sample entry.
#[derive(Debug, Clone)]
pub struct AudioConfig {
    pub codec: Codec,
    pub aac_profile: u8,
    pub aac_sample_rate_index: u8,
    pub aac_channel_config: u8,
    /// Raw ALAC decoder configuration ("magic cookie"), byte-exact as found
    /// in the nested `alac` box.
    pub alac_magic_cookie: Vec<u8>,
}

impl Default for AudioConfig {
    fn default() -> Self {
        Self {
            codec: Codec::Unknown,
            // AAC LC, 44100 Hz, stereo
            aac_profile: 2,
            aac_sample_rate_index: 4,
            aac_channel_config: 2,
            alac_magic_cookie: Vec::new(),
        }
    }
}

/// AAC configuration from the `esds` elementary stream descriptor chain.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EsdsInfo {
    pub audio_object_type: u8,
    pub sample_rate_index: u8,
    pub channel_config: u8,
}

impl EsdsInfo {
    /// Walks the descriptor chain of an `esds` payload (starting with the
    /// 4 version/flags bytes). Descriptor lengths use the variable 7-bit
    /// encoding.
    pub fn parse(data: &[u8]) -> Option<Self> {
        if data.len() < 4 {
            return None;
        }
        let mut pos = 4; // skip version + flags

        if *data.get(pos)? != 0x03 {
            return None;
        }
        pos += 1;
        let es_len = read_descriptor_length(data, &mut pos);
        if pos + es_len > data.len() {
            return None;
        }
        pos += 2; // ES_ID
        pos += 1; // stream dependence flags

        if *data.get(pos)? != 0x04 {
            return None;
        }
        pos += 1;
        let dec_len = read_descriptor_length(data, &mut pos);
        if pos + dec_len > data.len() {
            return None;
        }
        // objectTypeIndication, streamType, bufferSizeDB, maxBitrate,
        // avgBitrate
        pos += 13;

        if *data.get(pos)? != 0x05 {
            return None;
        }
        pos += 1;
        let dsi_len = read_descriptor_length(data, &mut pos);
        if dsi_len < 2 || pos + dsi_len > data.len() {
            return None;
        }

        let byte1 = data[pos];
        let byte2 = data[pos + 1];
        Some(Self {
            audio_object_type: (byte1 >> 3) & 0x1F,
            sample_rate_index: ((byte1 & 0x07) << 1) | ((byte2 >> 7) & 0x01),
            channel_config: (byte2 >> 3) & 0x0F,
        })
    }
}

fn read_descriptor_length(data: &[u8], pos: &mut usize) -> usize {
    let mut len = 0usize;
    for _ in 0..4 {
        let Some(&b) = data.get(*pos) else { break };
        *pos += 1;
        len = (len << 7) | (b & 0x7F) as usize;
        if b & 0x80 == 0 {
            break;
        }
    }
    len
}

/// Fills `adts` (7 bytes) with the ADTS header for an AAC frame of
/// `frame_len` payload bytes.
pub fn write_adts_header(
    adts: &mut [u8],
    profile: u8,
    sample_rate_index: u8,
    channel_config: u8,
    frame_len: usize,
) {
    let full_len = frame_len + 7;
    adts[0] = 0xFF;
    adts[1] = 0xF1;
    adts[2] = ((profile - 1) << 6) | (sample_rate_index << 2) | ((channel_config >> 2) & 0x1);
    adts[3] = ((channel_config & 0x3) << 6) | ((full_len >> 11) as u8 & 0x3);
    adts[4] = ((full_len >> 3) & 0xFF) as u8;
    adts[5] = (((full_len & 0x7) as u8) << 5) | 0x1F;
    adts[6] = 0xFC;
}

/// Builds the outgoing [`Frame`] for a completed sample, prepending the ADTS
/// header for AAC.
#[derive(Default)]
pub struct FrameAssembler {
    adts: Vec<u8>,
}

impl FrameAssembler {
    pub fn assemble<'a>(
        &'a mut self,
        config: &AudioConfig,
        sample_index: usize,
        timestamp_ms: Option<u64>,
        data: &'a [u8],
    ) -> Frame<'a> {
        match config.codec {
            Codec::Aac => {
                self.adts.resize(data.len() + 7, 0);
                write_adts_header(
                    &mut self.adts,
                    config.aac_profile,
                    config.aac_sample_rate_index,
                    config.aac_channel_config,
                    data.len(),
                );
                self.adts[7..].copy_from_slice(data);
                Frame {
                    codec: Codec::Aac,
                    mime: Codec::Aac.mime(),
                    data: &self.adts,
                    sample_index,
                    timestamp_ms,
                }
            }
            codec => Frame {
                codec,
                mime: codec.mime(),
                data,
                sample_index,
                timestamp_ms,
            },
        }
    }
}

/// Slices the `mdat` payload into frames along the `stsz` sample sizes.
///
/// Sizes come either from the table filled via
/// [`SampleExtractor::push_sample_size`] or from a fixed size/count pair
/// (`stsz` with a non-zero uniform sample size). Completed frames are handed
/// to the callback; the borrowed payload is valid only during the call.
pub struct SampleExtractor {
    pub config: AudioConfig,
    pub timing: TrackTiming,
    assembler: FrameAssembler,
    sample_sizes: SingleBuffer<StszSampleSize>,
    acc: SingleBuffer<u8>,
    fixed_sample_size: u32,
    fixed_sample_count: u32,
    current_size: Option<u32>,
    sample_index: usize,
    box_pos: u64,
    box_size: u64,
}

impl Default for SampleExtractor {
    fn default() -> Self {
        Self {
            config: AudioConfig::default(),
            timing: TrackTiming::default(),
            assembler: FrameAssembler::default(),
            sample_sizes: SingleBuffer::new(0),
            acc: SingleBuffer::new(1024),
            fixed_sample_size: 0,
            fixed_sample_count: 0,
            current_size: None,
            sample_index: 0,
            box_pos: 0,
            box_size: 0,
        }
    }
}

impl SampleExtractor {
    pub fn begin(&mut self) {
        self.config = AudioConfig::default();
        self.timing.reset();
        self.sample_sizes.reset();
        self.sample_sizes.resize(0);
        self.acc.reset();
        self.fixed_sample_size = 0;
        self.fixed_sample_count = 0;
        self.current_size = None;
        self.sample_index = 0;
        self.box_pos = 0;
        self.box_size = 0;
    }

    /// Reserves the sample size table.
    pub fn resize_table(&mut self, sample_count: u32) {
        self.sample_sizes.resize(sample_count as usize);
    }

    pub fn push_sample_size(&mut self, size: StszSampleSize) -> bool {
        self.sample_sizes.write(size)
    }

    /// Uniform sample size announced in the `stsz` header; replaces the
    /// per-sample table.
    pub fn set_fixed_sample_count(&mut self, sample_size: u32, sample_count: u32) {
        self.fixed_sample_size = sample_size;
        self.fixed_sample_count = sample_count;
    }

    /// True once any source of sample sizes is configured.
    pub fn has_sample_sizes(&self) -> bool {
        self.fixed_sample_size > 0 || self.sample_sizes.available() > 0
    }

    /// Total payload size of the `mdat` box about to be written.
    pub fn set_box_size(&mut self, size: u64) {
        self.box_size = size;
        self.box_pos = 0;
        // replaying the same stream: restart the walk
        self.sample_index = 0;
    }

    pub fn sample_index(&self) -> usize {
        self.sample_index
    }

    /// Consumes `mdat` payload, emitting every completed frame. Returns the
    /// count of bytes consumed, which is short once the sample table runs
    /// dry or the box ends.
    pub fn write(
        &mut self,
        data: &[u8],
        is_final: bool,
        callback: &mut dyn FnMut(&Frame<'_>),
    ) -> usize {
        let mut consumed = 0;
        while consumed < data.len() {
            let Some(current) = self.current_sample_size() else {
                error!(
                    "no sample size for sample {}: mdat before stsz?",
                    self.sample_index
                );
                return consumed;
            };
            let current = current as usize;
            if self.acc.capacity() < current {
                self.acc.resize(current);
            }

            let need = current - self.acc.available();
            let take = need.min(data.len() - consumed);
            self.acc.write_slice(&data[consumed..consumed + take]);
            consumed += take;

            if self.acc.available() == current {
                debug!("sample {}: {} bytes", self.sample_index, current);
                let timestamp = self.timing.timestamp_ms(self.sample_index);
                let frame = self.assembler.assemble(
                    &self.config,
                    self.sample_index,
                    timestamp,
                    self.acc.data(),
                );
                callback(&frame);
                self.acc.reset();
                self.box_pos += current as u64;
                self.sample_index += 1;
                self.current_size = None;
                if self.box_size > 0 && self.box_pos >= self.box_size {
                    debug!("end of mdat after sample {}", self.sample_index);
                    return consumed;
                }
            }
        }
        if is_final && self.acc.available() > 0 {
            warn!(
                "mdat ended inside sample {}: {} bytes dropped",
                self.sample_index,
                self.acc.available()
            );
        }
        consumed
    }

    fn current_sample_size(&mut self) -> Option<u32> {
        if let Some(size) = self.current_size {
            return Some(size);
        }
        let next = if self.fixed_sample_size > 0 && (self.sample_index as u32) < self.fixed_sample_count
        {
            self.fixed_sample_size
        } else {
            self.sample_sizes.read().map(u32::from).unwrap_or(0)
        };
        if next == 0 {
            return None;
        }
        self.current_size = Some(next);
        Some(next)
    }
}

/// Box dispatch state behind [`M4aDemuxer`]; separate from the parser so
/// both can be borrowed at once.
struct DemuxState {
    extractor: SampleExtractor,
    pending: SingleBuffer<u8>,
    stsd_processed: bool,
    stsz_processed: bool,
    stco_processed: bool,
    stsz_header_done: bool,
    stco_header_done: bool,
    sample_count: u32,
    stsz_offset: u64,
    chunk_offsets: SingleBuffer<u32>,
    chunk_offset_count: u32,
    error: Option<Mp4Error>,
    callback: Option<Box<dyn FnMut(&Frame<'_>)>>,
}

impl Default for DemuxState {
    fn default() -> Self {
        Self {
            extractor: SampleExtractor::default(),
            pending: SingleBuffer::new(0),
            stsd_processed: false,
            stsz_processed: false,
            stco_processed: false,
            stsz_header_done: false,
            stco_header_done: false,
            sample_count: 0,
            stsz_offset: 0,
            chunk_offsets: SingleBuffer::new(0),
            chunk_offset_count: 0,
            error: None,
            callback: None,
        }
    }
}

impl DemuxState {
    fn reset(&mut self) {
        self.extractor.begin();
        self.pending.reset();
        self.stsd_processed = false;
        self.stsz_processed = false;
        self.stco_processed = false;
        self.stsz_header_done = false;
        self.stco_header_done = false;
        self.sample_count = 0;
        self.stsz_offset = 0;
        self.chunk_offsets.reset();
        self.chunk_offset_count = 0;
        self.error = None;
    }

    fn append_pending(&mut self, data: &[u8]) {
        if self.pending.available_for_write() < data.len() {
            let needed = self.pending.available() + data.len();
            self.pending.resize(needed.max(self.pending.capacity() * 2));
        }
        self.pending.write_slice(data);
    }

    fn on_stsd(&mut self, event: &BoxEvent<'_>) {
        if self.stsd_processed {
            return;
        }
        if event.seq == 0 && event.is_complete {
            self.finish_stsd_from(event.data);
            return;
        }
        self.append_pending(event.data);
        if event.is_complete {
            let payload: Vec<u8> = self.pending.data().to_vec();
            self.pending.reset();
            self.finish_stsd_from(&payload);
        }
    }

    fn finish_stsd_from(&mut self, payload: &[u8]) {
        match parse_stsd_payload(payload, &mut self.extractor.config) {
            Ok(()) => info!("stsd: codec {:?}", self.extractor.config.codec),
            Err(e) => {
                warn!("stsd: {e}");
                self.error.get_or_insert(e);
            }
        }
        self.stsd_processed = true;
    }

    fn on_stsz(&mut self, event: &BoxEvent<'_>) {
        if self.stsz_processed {
            return;
        }
        if event.seq == 0 {
            // the demuxer reports where the table lives so a file-backed
            // walker can revisit it later
            self.stsz_offset = event.file_offset;
        }
        self.append_pending(event.data);

        if !self.stsz_header_done {
            if self.pending.available() < 12 {
                return;
            }
            let header = self.pending.data();
            let fixed_size = read_u32_be(header, 4);
            let count = read_u32_be(header, 8);
            self.sample_count = count;
            self.extractor.resize_table(count);
            if fixed_size != 0 {
                self.extractor.set_fixed_sample_count(fixed_size, count);
            }
            info!("stsz: {count} samples, fixed size {fixed_size}");
            self.pending.clear_slice(12);
            self.stsz_header_done = true;
        }

        while self.pending.available() >= 4 {
            let size = read_u32_be(self.pending.data(), 0);
            let narrowed = size.min(StszSampleSize::MAX as u32) as StszSampleSize;
            if size > StszSampleSize::MAX as u32 {
                warn!("sample size {size} exceeds the u16 table, clamped");
            }
            self.extractor.push_sample_size(narrowed);
            self.pending.clear_slice(4);
        }

        if event.is_complete {
            self.stsz_processed = true;
            self.pending.reset();
        }
    }

    fn on_stco(&mut self, event: &BoxEvent<'_>) {
        if self.stco_processed {
            return;
        }
        self.append_pending(event.data);

        if !self.stco_header_done {
            if self.pending.available() < 8 {
                return;
            }
            let count = read_u32_be(self.pending.data(), 4);
            self.chunk_offset_count = count;
            self.chunk_offsets.resize(count as usize);
            self.pending.clear_slice(8);
            self.stco_header_done = true;
        }

        while self.pending.available() >= 4 {
            let offset = read_u32_be(self.pending.data(), 0);
            self.chunk_offsets.write(offset);
            self.pending.clear_slice(4);
        }

        if event.is_complete {
            self.stco_processed = true;
            self.pending.reset();
        }
    }

    fn on_mdat(&mut self, event: &BoxEvent<'_>) {
        if event.seq == 0 {
            if !self.extractor.has_sample_sizes() {
                // a legal MP4 may put mdat first, but the streaming walk
                // cannot slice it without the tables
                error!("mdat before the sample tables, cannot demux this stream");
                self.error.get_or_insert(Mp4Error::MdatBeforeSampleTable);
                return;
            }
            self.extractor.set_box_size(event.data_size);
        }
        if self.error.is_some() {
            return;
        }
        if let Some(callback) = self.callback.as_mut() {
            self.extractor
                .write(event.data, event.is_complete, callback.as_mut());
        } else {
            warn!("no frame callback registered, dropping mdat data");
        }
    }
}

impl DemuxState {
    fn on_box(&mut self, event: &BoxEvent<'_>) {
        match &event.kind {
            b"stsd" => self.on_stsd(event),
            b"stsz" => self.on_stsz(event),
            b"stco" => self.on_stco(event),
            b"mdhd" => {
                if event.is_complete && event.seq == 0 {
                    parse_mdhd_payload(event.data, &mut self.extractor.timing);
                }
            }
            b"stts" => {
                if event.is_complete && event.seq == 0 {
                    parse_stts_payload(event.data, &mut self.extractor.timing);
                } else if event.is_complete {
                    warn!("oversized stts box, frame timestamps unavailable");
                }
            }
            b"mdat" => self.on_mdat(event),
            kind => {
                if event.seq == 0 {
                    debug!(
                        "box {} ({} bytes){}",
                        fourcc_str(kind),
                        event.data_size,
                        if event.is_container { " [container]" } else { "" }
                    );
                }
            }
        }
    }
}

/// Streaming M4A audio demuxer.
///
/// Feeds an [`Mp4Parser`] from `write` and turns `stsd`/`stsz`/`stco`/`mdat`
/// into elementary-stream frames delivered through the registered callback.
///
/// The stream must be in fast-start order: the sample tables (`moov`) have
/// to arrive before `mdat`. Streams with `mdat` first are legal MP4 but
/// cannot be sliced on the fly; they are reported as
/// [`Mp4Error::MdatBeforeSampleTable`]. Use
/// [`super::M4aFileDemuxer`] for seekable sources of either layout.
pub struct M4aDemuxer {
    parser: Mp4Parser,
    state: DemuxState,
}

impl Default for M4aDemuxer {
    fn default() -> Self {
        Self::new()
    }
}

impl M4aDemuxer {
    pub fn new() -> Self {
        Self {
            parser: Mp4Parser::default(),
            state: DemuxState::default(),
        }
    }

    /// `buffer_size` bounds the largest box delivered in one piece.
    pub fn with_buffer_size(buffer_size: usize) -> Self {
        Self {
            parser: Mp4Parser::new(buffer_size),
            state: DemuxState::default(),
        }
    }

    /// Restarts for a new stream; the callback is kept.
    pub fn begin(&mut self) {
        self.parser.begin();
        self.state.reset();
    }

    pub fn set_frame_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Frame<'_>) + 'static,
    {
        self.state.callback = Some(Box::new(callback));
    }

    /// Feeds container bytes; always accepts the full slice.
    pub fn write(&mut self, data: &[u8]) -> usize {
        let state = &mut self.state;
        self.parser
            .write(data, &mut |event: &BoxEvent<'_>| state.on_box(event))
    }

    pub fn codec(&self) -> Codec {
        self.state.extractor.config.codec
    }

    pub fn audio_config(&self) -> &AudioConfig {
        &self.state.extractor.config
    }

    pub fn alac_magic_cookie(&self) -> &[u8] {
        &self.state.extractor.config.alac_magic_cookie
    }

    /// Samples announced by the stsz header.
    pub fn sample_count(&self) -> u32 {
        self.state.sample_count
    }

    /// Frames delivered so far.
    pub fn frames_emitted(&self) -> usize {
        self.state.extractor.sample_index()
    }

    /// File offset of the stsz box, once seen.
    pub fn stsz_offset(&self) -> u64 {
        self.state.stsz_offset
    }

    pub fn chunk_offset_count(&self) -> u32 {
        self.state.chunk_offset_count
    }

    /// Chunk offsets collected from stco.
    pub fn chunk_offsets(&self) -> &[u32] {
        self.state.chunk_offsets.data()
    }

    /// Track timing from mdhd/stts, feeding the frame timestamps.
    pub fn timing(&self) -> &TrackTiming {
        &self.state.extractor.timing
    }

    /// First error from the walk or the dispatch, if any.
    pub fn error(&self) -> Option<&Mp4Error> {
        self.parser.error().or(self.state.error.as_ref())
    }
}

/// Walks the `stsd` payload (version/flags, entry count, sample entries) and
/// captures the codec configuration.
pub(crate) fn parse_stsd_payload(
    payload: &[u8],
    config: &mut AudioConfig,
) -> Result<(), Mp4Error> {
    if payload.len() < 16 {
        return Err(Mp4Error::UnsupportedCodec);
    }
    let entry_count = read_u32_be(payload, 4);
    let mut pos = 8;
    for _ in 0..entry_count {
        if pos + 8 > payload.len() {
            break;
        }
        let size = read_u32_be(payload, pos) as usize;
        if size < 8 || pos + size > payload.len() {
            break;
        }
        let kind = fourcc(payload, pos + 4);
        let entry = &payload[pos + 8..pos + size];
        match &kind {
            b"mp4a" => parse_mp4a_entry(entry, config),
            b"alac" => parse_alac_entry(entry, config),
            b".mp3" | b"mp3 " => {
                config.codec = Codec::Mp3;
            }
            other => {
                debug!("unsupported sample entry {}", fourcc_str(other));
            }
        }
        pos += size;
    }
    if config.codec == Codec::Unknown {
        Err(Mp4Error::UnsupportedCodec)
    } else {
        Ok(())
    }
}

/// Child boxes of an audio sample entry start after its 28 fixed bytes.
const SAMPLE_ENTRY_FIELDS: usize = 28;

fn parse_mp4a_entry(entry: &[u8], config: &mut AudioConfig) {
    config.codec = Codec::Aac;
    each_child_box(entry, |kind, payload| {
        if kind == b"esds" {
            match EsdsInfo::parse(payload) {
                Some(esds) => {
                    info!(
                        "esds: object {}, rate index {}, {} ch",
                        esds.audio_object_type, esds.sample_rate_index, esds.channel_config
                    );
                    config.aac_profile = esds.audio_object_type;
                    config.aac_sample_rate_index = esds.sample_rate_index;
                    config.aac_channel_config = esds.channel_config;
                }
                None => warn!("failed to parse esds box, keeping AAC defaults"),
            }
        }
    });
}

fn parse_alac_entry(entry: &[u8], config: &mut AudioConfig) {
    config.codec = Codec::Alac;
    each_child_box(entry, |kind, payload| {
        // the nested alac box carries the magic cookie after 4 version/flags
        // bytes; it must reach the decoder unmodified
        if kind == b"alac" && payload.len() > 4 {
            config.alac_magic_cookie = payload[4..].to_vec();
        }
    });
}

/// mdhd payload: version, flags, times, then the media timescale.
pub(crate) fn parse_mdhd_payload(payload: &[u8], timing: &mut TrackTiming) {
    if payload.is_empty() {
        return;
    }
    // v1 widens the creation/modification times to 64 bit
    let offset = if payload[0] == 1 { 20 } else { 12 };
    if payload.len() >= offset + 4 {
        timing.set_timescale(read_u32_be(payload, offset));
    }
}

/// stts payload: version/flags, entry count, then (count, delta) runs.
pub(crate) fn parse_stts_payload(payload: &[u8], timing: &mut TrackTiming) {
    if payload.len() < 8 {
        return;
    }
    let entry_count = read_u32_be(payload, 4) as usize;
    let mut pos = 8;
    for _ in 0..entry_count {
        if pos + 8 > payload.len() {
            break;
        }
        timing.push_entry(read_u32_be(payload, pos), read_u32_be(payload, pos + 4));
        pos += 8;
    }
}

fn each_child_box(entry: &[u8], mut visit: impl FnMut(&[u8; 4], &[u8])) {
    let mut pos = SAMPLE_ENTRY_FIELDS;
    while pos + 8 <= entry.len() {
        let size = read_u32_be(entry, pos) as usize;
        if size < 8 || pos + size > entry.len() {
            break;
        }
        let kind = fourcc(entry, pos + 4);
        visit(&kind, &entry[pos + 8..pos + size]);
        pos += size;
    }
}
