use std::io::{Read, Seek, SeekFrom};

use log::{info, warn};

use super::demuxer::{
    AudioConfig, Frame, FrameAssembler, TrackTiming, parse_mdhd_payload, parse_stsd_payload,
    parse_stts_payload,
};
use super::parser::{BoxEvent, Mp4Parser};
use crate::buffers::{AudioBuffer, SingleBuffer};
use crate::utils::bytes::read_u32_be;
use crate::utils::errors::Mp4Error;

/// Locates the boxes the file demuxer needs without touching their payloads
/// beyond the sample description.
#[derive(Default)]
struct FileLocator {
    config: AudioConfig,
    timing: TrackTiming,
    pending: Vec<u8>,
    stsd_processed: bool,
    stsz_offset: u64,
    stsz_size: u64,
    mdat_offset: u64,
    mdat_size: u64,
    mdat_header_size: u8,
}

impl FileLocator {
    fn reset(&mut self) {
        *self = Self::default();
    }

    fn found_all(&self) -> bool {
        self.stsd_processed && self.stsz_offset != 0 && self.mdat_offset != 0
    }
}

impl FileLocator {
    fn on_box(&mut self, event: &BoxEvent<'_>) {
        match &event.kind {
            b"stsd" if !self.stsd_processed => {
                self.pending.extend_from_slice(event.data);
                if event.is_complete {
                    let payload = std::mem::take(&mut self.pending);
                    if let Err(e) = parse_stsd_payload(&payload, &mut self.config) {
                        warn!("stsd: {e}");
                    }
                    self.stsd_processed = true;
                }
            }
            b"stsz" if event.seq == 0 => {
                self.stsz_offset = event.file_offset;
                self.stsz_size = event.data_size;
            }
            b"mdhd" if event.is_complete && event.seq == 0 => {
                parse_mdhd_payload(event.data, &mut self.timing);
            }
            b"stts" if event.is_complete && event.seq == 0 => {
                parse_stts_payload(event.data, &mut self.timing);
            }
            b"mdat" if event.seq == 0 => {
                self.mdat_offset = event.file_offset + event.header_size as u64;
                self.mdat_size = event.data_size;
                self.mdat_header_size = event.header_size;
            }
            _ => {}
        }
    }
}

const DEFAULT_STSZ_WINDOW: usize = 256;

/// M4A demuxer for seekable sources.
///
/// Instead of materializing the sample size table, it re-reads a small
/// window of `stsz` entries from the source on demand and pulls each sample
/// straight out of `mdat` — O(1) memory for the table, at the cost of
/// repeated seeks. Because the source is seekable, files with `mdat` before
/// `moov` work here, unlike the streaming [`super::M4aDemuxer`].
pub struct M4aFileDemuxer<R> {
    reader: Option<R>,
    parser: Mp4Parser,
    locator: FileLocator,
    assembler: FrameAssembler,
    acc: SingleBuffer<u8>,
    stsz_buf: SingleBuffer<u32>,
    stsz_window: usize,
    sample_index: u32,
    sample_count: u32,
    fixed_sample_size: u32,
    mdat_sample_pos: u64,
    callback: Option<Box<dyn FnMut(&Frame<'_>)>>,
}

impl<R: Read + Seek> Default for M4aFileDemuxer<R> {
    fn default() -> Self {
        Self::new()
    }
}

impl<R: Read + Seek> M4aFileDemuxer<R> {
    pub fn new() -> Self {
        Self {
            reader: None,
            parser: Mp4Parser::default(),
            locator: FileLocator::default(),
            assembler: FrameAssembler::default(),
            acc: SingleBuffer::new(0),
            stsz_buf: SingleBuffer::new(DEFAULT_STSZ_WINDOW),
            stsz_window: DEFAULT_STSZ_WINDOW,
            sample_index: 0,
            sample_count: 0,
            fixed_sample_size: 0,
            mdat_sample_pos: 0,
            callback: None,
        }
    }

    pub fn set_frame_callback<F>(&mut self, callback: F)
    where
        F: FnMut(&Frame<'_>) + 'static,
    {
        self.callback = Some(Box::new(callback));
    }

    /// Bytes of memory to spend on the sample size window; smaller values
    /// trade seeks for memory.
    pub fn set_sample_sizes_buffer_size(&mut self, bytes: usize) {
        self.stsz_window = (bytes / 4).max(1);
        self.stsz_buf.resize(self.stsz_window);
        self.stsz_buf.reset();
    }

    /// Scans `reader` for the sample description, `stsz` and `mdat`
    /// locations, then positions for frame extraction.
    pub fn begin(&mut self, mut reader: R) -> Result<(), Mp4Error> {
        self.end();
        self.parser.begin();
        self.locator.reset();

        reader.seek(SeekFrom::Start(0))?;
        let mut chunk = [0u8; 1024];
        loop {
            let n = reader.read(&mut chunk)?;
            if n == 0 {
                break;
            }
            let locator = &mut self.locator;
            self.parser
                .write(&chunk[..n], &mut |event: &BoxEvent<'_>| {
                    locator.on_box(event)
                });
            if self.locator.found_all() {
                break;
            }
        }

        if self.locator.stsz_offset == 0 {
            return Err(Mp4Error::NoSampleTable);
        }
        if self.locator.mdat_offset == 0 {
            return Err(Mp4Error::NoMediaData);
        }

        self.read_stsz_header(&mut reader)?;
        self.check_mdat(&mut reader)?;
        self.mdat_sample_pos = self.locator.mdat_offset;
        self.reader = Some(reader);
        info!(
            "m4a file: {:?}, {} samples, mdat at {}",
            self.locator.config.codec, self.sample_count, self.locator.mdat_offset
        );
        Ok(())
    }

    /// Drops the reader and resets extraction state; the callback and the
    /// window size are kept.
    pub fn end(&mut self) {
        self.reader = None;
        self.sample_index = 0;
        self.sample_count = 0;
        self.fixed_sample_size = 0;
        self.mdat_sample_pos = 0;
        self.stsz_buf.reset();
    }

    /// True while samples remain.
    pub fn is_active(&self) -> bool {
        self.sample_count > 0 && self.sample_index < self.sample_count
    }

    pub fn sample_index(&self) -> u32 {
        self.sample_index
    }

    /// Samples announced by the stsz header.
    pub fn sample_count(&self) -> u32 {
        self.sample_count
    }

    pub fn mdat_offset(&self) -> u64 {
        self.locator.mdat_offset
    }

    pub fn mdat_size(&self) -> u64 {
        self.locator.mdat_size
    }

    pub fn stsz_offset(&self) -> u64 {
        self.locator.stsz_offset
    }

    pub fn stsz_size(&self) -> u64 {
        self.locator.stsz_size
    }

    pub fn audio_config(&self) -> &AudioConfig {
        &self.locator.config
    }

    pub fn timing(&self) -> &TrackTiming {
        &self.locator.timing
    }

    /// Pulls the next frame out of `mdat` and hands it to the callback.
    /// Returns false once all samples are delivered or on an I/O problem.
    pub fn copy(&mut self) -> bool {
        if self.sample_index >= self.sample_count {
            return false;
        }
        let Some(size) = self.next_sample_size() else {
            return false;
        };
        let size = size as usize;
        if size == 0 {
            return false;
        }

        if self.acc.capacity() < size {
            self.acc.resize(size);
        }
        self.acc.reset();
        {
            let Some(reader) = self.reader.as_mut() else {
                return false;
            };
            if reader.seek(SeekFrom::Start(self.mdat_sample_pos)).is_err() {
                return false;
            }
            if reader.read_exact(&mut self.acc.backing_mut()[..size]).is_err() {
                warn!("short read in mdat at sample {}", self.sample_index);
                return false;
            }
        }
        self.acc.set_available(size);

        let Some(callback) = self.callback.as_mut() else {
            warn!("no frame callback registered");
            return false;
        };
        let timestamp = self.locator.timing.timestamp_ms(self.sample_index as usize);
        let frame = self.assembler.assemble(
            &self.locator.config,
            self.sample_index as usize,
            timestamp,
            self.acc.data(),
        );
        callback(&frame);

        self.mdat_sample_pos += size as u64;
        self.sample_index += 1;
        true
    }

    /// Positions the demuxer for reading sample sizes from an already-known
    /// table, without scanning the file again.
    pub fn begin_sample_size_access(&mut self, reader: R, sample_count: u32, stsz_offset: u64) {
        self.reader = Some(reader);
        self.sample_index = 0;
        self.sample_count = sample_count;
        self.locator.stsz_offset = stsz_offset;
        self.stsz_buf.reset();
    }

    /// Next entry of the `stsz` table, refilling the window from the file
    /// when it runs dry.
    pub fn next_sample_size(&mut self) -> Option<u32> {
        if self.fixed_sample_size > 0 {
            return Some(self.fixed_sample_size);
        }
        if self.stsz_buf.available() == 0 {
            let reader = self.reader.as_mut()?;
            let pos = self.locator.stsz_offset + 20 + self.sample_index as u64 * 4;
            reader.seek(SeekFrom::Start(pos)).ok()?;

            let remaining = (self.sample_count - self.sample_index) as usize;
            let entries = self.stsz_window.min(remaining);
            let mut raw = vec![0u8; entries * 4];
            reader.read_exact(&mut raw).ok()?;

            self.stsz_buf.reset();
            for entry in raw.chunks_exact(4) {
                self.stsz_buf.write(read_u32_be(entry, 0));
            }
        }
        self.stsz_buf.read()
    }

    /// stsz box layout: size, type, version/flags, fixed sample size, count.
    fn read_stsz_header(&mut self, reader: &mut R) -> Result<(), Mp4Error> {
        let mut header = [0u8; 20];
        reader.seek(SeekFrom::Start(self.locator.stsz_offset))?;
        reader.read_exact(&mut header)?;
        if &header[4..8] != b"stsz" {
            return Err(Mp4Error::NoSampleTable);
        }
        self.fixed_sample_size = read_u32_be(&header, 12);
        self.sample_count = read_u32_be(&header, 16);
        Ok(())
    }

    fn check_mdat(&mut self, reader: &mut R) -> Result<(), Mp4Error> {
        let header_size = self.locator.mdat_header_size.max(8) as u64;
        let mut header = vec![0u8; header_size as usize];
        reader.seek(SeekFrom::Start(self.locator.mdat_offset - header_size))?;
        reader.read_exact(&mut header)?;
        if &header[4..8] != b"mdat" {
            return Err(Mp4Error::NoMediaData);
        }
        Ok(())
    }
}
