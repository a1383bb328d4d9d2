use log::{debug, trace};

use crate::buffers::{AudioBuffer, SingleBuffer};
use crate::utils::bytes::{fourcc, read_u32_be, read_u64_be};
use crate::utils::errors::Mp4Error;

/// One delivery of box data to a [`BoxHandler`].
///
/// A box whose payload fits the internal buffer is delivered once with
/// `is_complete == true`. Larger boxes (typically `mdat` and `stsz`) are
/// delivered incrementally: `seq` counts the segments and `is_complete`
/// marks the last one. `data` is borrowed from the parser and only valid for
/// the duration of the callback.
#[derive(Debug)]
pub struct BoxEvent<'a> {
    /// Running box counter.
    pub id: u64,
    /// Segment counter within one box, starting at 0.
    pub seq: u32,
    /// Box type FOURCC.
    pub kind: [u8; 4],
    /// Payload bytes carried by this delivery.
    pub data: &'a [u8],
    /// Total payload size of the box (excluding the header).
    pub data_size: u64,
    /// Absolute offset of the box header (seq 0) or of this segment.
    pub file_offset: u64,
    /// Bytes of box header (8, or 16 with an extended size).
    pub header_size: u8,
    /// Nesting depth.
    pub level: u8,
    pub is_complete: bool,
    pub is_container: bool,
}

/// Receiver of parsed boxes.
pub trait BoxHandler {
    fn on_box(&mut self, event: &BoxEvent<'_>);
}

impl<F: FnMut(&BoxEvent<'_>)> BoxHandler for F {
    fn on_box(&mut self, event: &BoxEvent<'_>) {
        self(event)
    }
}

/// Box types that only group other boxes.
const CONTAINERS: [&[u8; 4]; 16] = [
    b"moov", b"trak", b"mdia", b"minf", b"stbl", b"edts", b"dinf", b"udta", b"ilst", b"moof",
    b"traf", b"mfra", b"tref", b"iprp", b"sinf", b"schi",
];

struct PendingBox {
    id: u64,
    kind: [u8; 4],
    remaining: u64,
    total: u64,
    header_size: u8,
    level: u8,
    seq: u32,
}

const DEFAULT_BUFFER_SIZE: usize = 2 * 1024;

/// Incremental MP4 box walker.
///
/// Feed container bytes through [`Mp4Parser::write`]; each recognized box is
/// reported to the supplied handler. Known container boxes are recursed into
/// via a stack of absolute end offsets, so the tree is walked without being
/// materialized. A 32-bit size of 1 announces a 64-bit extended size in the
/// following 8 bytes. A malformed box stops the walk silently: everything
/// reported before it remains valid and later writes are swallowed.
pub struct Mp4Parser {
    buffer: SingleBuffer<u8>,
    file_offset: u64,
    level_stack: Vec<u64>,
    box_counter: u64,
    pending: Option<PendingBox>,
    error: Option<Mp4Error>,
}

impl Default for Mp4Parser {
    fn default() -> Self {
        Self::new(DEFAULT_BUFFER_SIZE)
    }
}

impl Mp4Parser {
    pub fn new(buffer_size: usize) -> Self {
        Self {
            buffer: SingleBuffer::new(buffer_size.max(16)),
            file_offset: 0,
            level_stack: Vec::new(),
            box_counter: 0,
            pending: None,
            error: None,
        }
    }

    pub fn begin(&mut self) {
        self.buffer.reset();
        self.file_offset = 0;
        self.level_stack.clear();
        self.box_counter = 0;
        self.pending = None;
        self.error = None;
    }

    /// Error that stopped the walk, if any.
    pub fn error(&self) -> Option<&Mp4Error> {
        self.error.as_ref()
    }

    /// Absolute offset of the next unparsed byte.
    pub fn current_offset(&self) -> u64 {
        self.file_offset
    }

    /// Feeds container bytes, reporting boxes to `handler`. Always accepts
    /// the full slice; once the walk has stopped, input is discarded.
    pub fn write<H: BoxHandler>(&mut self, data: &[u8], handler: &mut H) -> usize {
        if self.error.is_some() {
            return data.len();
        }
        let mut offset = 0;
        while offset < data.len() {
            let written = self.buffer.write_slice(&data[offset..]);
            offset += written;
            self.parse(handler);
            if self.error.is_some() {
                return data.len();
            }
            if written == 0 {
                // no space and no progress: an oversized header cannot occur
                // (headers are at most 16 bytes), so this is unreachable in
                // practice, but never spin
                break;
            }
        }
        data.len()
    }

    fn parse<H: BoxHandler>(&mut self, handler: &mut H) {
        loop {
            if self.continue_pending(handler) {
                continue;
            }
            if self.pending.is_some() {
                return; // waiting for more payload
            }
            if !self.try_start_box(handler) {
                return;
            }
        }
    }

    /// Delivers buffered payload of the box in progress. Returns true when
    /// progress was made.
    fn continue_pending<H: BoxHandler>(&mut self, handler: &mut H) -> bool {
        let Some(pending) = self.pending.as_mut() else {
            return false;
        };
        let n = (self.buffer.available() as u64).min(pending.remaining) as usize;
        if n == 0 {
            return false;
        }
        pending.seq += 1;
        pending.remaining -= n as u64;
        let event = BoxEvent {
            id: pending.id,
            seq: pending.seq,
            kind: pending.kind,
            data: &self.buffer.data()[..n],
            data_size: pending.total,
            file_offset: self.file_offset,
            header_size: pending.header_size,
            level: pending.level,
            is_complete: pending.remaining == 0,
            is_container: false,
        };
        handler.on_box(&event);
        let done = pending.remaining == 0;
        self.buffer.clear_slice(n);
        self.file_offset += n as u64;
        if done {
            self.pending = None;
            self.pop_levels();
        }
        true
    }

    /// Starts the next box if its header is buffered. Returns true when
    /// progress was made.
    fn try_start_box<H: BoxHandler>(&mut self, handler: &mut H) -> bool {
        if self.buffer.available() < 8 {
            return false;
        }
        let data = self.buffer.data();
        let size32 = read_u32_be(data, 0);
        let kind = fourcc(data, 4);

        if !is_valid_box_type(&kind) {
            self.error = Some(Mp4Error::InvalidBoxType(self.file_offset));
            debug!("stopping at invalid box type, offset {}", self.file_offset);
            return false;
        }

        // size 1 announces a 64 bit size in the next 8 bytes
        let (box_size, header_size) = if size32 == 1 {
            if self.buffer.available() < 16 {
                return false;
            }
            (read_u64_be(data, 8), 16u64)
        } else {
            (size32 as u64, 8u64)
        };

        if box_size < header_size {
            self.error = Some(Mp4Error::BoxTooSmall {
                size: box_size,
                pos: self.file_offset,
            });
            debug!("stopping at undersized box, offset {}", self.file_offset);
            return false;
        }

        let payload_size = box_size - header_size;
        let level = self.level_stack.len() as u8;
        let box_offset = self.file_offset;
        self.box_counter += 1;

        if let Some(container_lead) = container_lead_bytes(&kind) {
            // container: descend instead of delivering payload
            let consumed = header_size + container_lead;
            if (self.buffer.available() as u64) < consumed {
                return false;
            }
            let event = BoxEvent {
                id: self.box_counter,
                seq: 0,
                kind,
                data: &[],
                data_size: payload_size,
                file_offset: box_offset,
                header_size: header_size as u8,
                level,
                is_complete: true,
                is_container: true,
            };
            handler.on_box(&event);
            trace!(
                "{}{} ({} bytes)",
                "  ".repeat(level as usize),
                crate::utils::bytes::fourcc_str(&kind),
                payload_size
            );
            self.level_stack.push(box_offset + box_size);
            self.buffer.clear_slice(consumed as usize);
            self.file_offset += consumed;
            self.pop_levels();
            return true;
        }

        let header = header_size as usize;
        let fits_buffer = header_size + payload_size <= self.buffer.capacity() as u64;
        if fits_buffer && (self.buffer.available() as u64) < header_size + payload_size {
            // wait for the rest: a box that fits the buffer is always
            // delivered in one piece
            return false;
        }
        if (self.buffer.available() as u64) >= header_size + payload_size {
            // complete box in the buffer
            let total = header + payload_size as usize;
            let event = BoxEvent {
                id: self.box_counter,
                seq: 0,
                kind,
                data: &self.buffer.data()[header..total],
                data_size: payload_size,
                file_offset: box_offset,
                header_size: header_size as u8,
                level,
                is_complete: true,
                is_container: false,
            };
            handler.on_box(&event);
            self.buffer.clear_slice(total);
            self.file_offset += total as u64;
            self.pop_levels();
            return true;
        }

        // payload exceeds the buffered bytes: deliver incrementally
        let present = self.buffer.available() - header;
        let event = BoxEvent {
            id: self.box_counter,
            seq: 0,
            kind,
            data: &self.buffer.data()[header..header + present],
            data_size: payload_size,
            file_offset: box_offset,
            header_size: header_size as u8,
            level,
            is_complete: false,
            is_container: false,
        };
        handler.on_box(&event);
        self.pending = Some(PendingBox {
            id: self.box_counter,
            kind,
            remaining: payload_size - present as u64,
            total: payload_size,
            header_size: header_size as u8,
            level,
            seq: 0,
        });
        self.buffer.clear_slice(header + present);
        self.file_offset += (header + present) as u64;
        true
    }

    fn pop_levels(&mut self) {
        while let Some(&end) = self.level_stack.last() {
            if self.file_offset >= end {
                self.level_stack.pop();
            } else {
                break;
            }
        }
    }
}

fn is_valid_box_type(kind: &[u8; 4]) -> bool {
    kind.iter()
        .all(|&b| b.is_ascii_alphanumeric() || b == b' ' || b == b'.' || b == b'_' || b == 0xA9)
}

/// Payload bytes to swallow before a container's children; `None` for
/// non-container boxes.
fn container_lead_bytes(kind: &[u8; 4]) -> Option<u64> {
    if CONTAINERS.contains(&kind) {
        return Some(0);
    }
    // meta carries 4 bytes of version/flags before its children
    if kind == b"meta" { Some(4) } else { None }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(payload);
        out
    }

    fn mp4_box_extended(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
        let mut out = Vec::new();
        out.extend_from_slice(&1u32.to_be_bytes());
        out.extend_from_slice(kind);
        out.extend_from_slice(&((payload.len() + 16) as u64).to_be_bytes());
        out.extend_from_slice(payload);
        out
    }

    #[derive(Default)]
    struct Collector {
        boxes: Vec<(String, u64, Vec<u8>, bool)>,
    }

    impl Collector {
        fn on_box(&mut self, event: &BoxEvent<'_>) {
            self.boxes.push((
                crate::utils::bytes::fourcc_str(&event.kind),
                event.data_size,
                event.data.to_vec(),
                event.is_container,
            ));
        }
    }

    #[test]
    fn walks_nested_containers() {
        let stsz = mp4_box(b"stsz", &[0; 12]);
        let stbl = mp4_box(b"stbl", &stsz);
        let minf = mp4_box(b"minf", &stbl);
        let moov = mp4_box(b"moov", &minf);

        let mut parser = Mp4Parser::default();
        let mut collector = Collector::default();
        parser.write(&moov, &mut |e: &BoxEvent<'_>| collector.on_box(e));

        let kinds: Vec<&str> = collector.boxes.iter().map(|b| b.0.as_str()).collect();
        assert_eq!(kinds, ["moov", "minf", "stbl", "stsz"]);
        assert!(collector.boxes[0].3); // containers flagged
        assert!(!collector.boxes[3].3);
        assert_eq!(collector.boxes[3].1, 12);
    }

    #[test]
    fn extended_size_parses_identically() {
        // size 1 + 64-bit size must behave like a directly encoded size
        let payload: Vec<u8> = (0..100u8).collect();
        let direct = mp4_box(b"free", &payload);
        let extended = mp4_box_extended(b"free", &payload);

        for stream in [direct, extended] {
            let mut parser = Mp4Parser::default();
            let mut collector = Collector::default();
            parser.write(&stream, &mut |e: &BoxEvent<'_>| collector.on_box(e));
            assert_eq!(collector.boxes.len(), 1);
            assert_eq!(collector.boxes[0].1, 100);
            assert_eq!(collector.boxes[0].2, payload);
        }
    }

    #[test]
    fn extended_size_above_u32_range() {
        // header of an mdat bigger than 4 GiB: only the first bytes arrive,
        // but the declared size must survive unclamped
        let huge = 0x1_0000_0010u64;
        let mut stream = Vec::new();
        stream.extend_from_slice(&1u32.to_be_bytes());
        stream.extend_from_slice(b"mdat");
        stream.extend_from_slice(&huge.to_be_bytes());
        stream.extend_from_slice(&[0xEE; 32]);

        let mut parser = Mp4Parser::default();
        let mut sizes = Vec::new();
        let mut completes = Vec::new();
        let mut handler = |event: &BoxEvent<'_>| {
            sizes.push(event.data_size);
            completes.push(event.is_complete);
        };
        parser.write(&stream, &mut handler);

        assert_eq!(sizes, [huge - 16]);
        assert_eq!(completes, [false]);
    }

    #[test]
    fn oversized_payload_is_delivered_incrementally() {
        let payload: Vec<u8> = (0..=255u8).cycle().take(5000).collect();
        let stream = mp4_box(b"mdat", &payload);

        let mut parser = Mp4Parser::new(512);
        let mut received = Vec::new();
        let mut complete = false;
        let mut handler = |event: &BoxEvent<'_>| {
            received.extend_from_slice(event.data);
            complete = event.is_complete;
        };
        for piece in stream.chunks(77) {
            parser.write(piece, &mut handler);
        }

        assert!(complete);
        assert_eq!(received, payload);
    }

    #[test]
    fn malformed_box_stops_walk_silently() {
        let good = mp4_box(b"free", &[1, 2, 3, 4]);
        let mut stream = good.clone();
        stream.extend_from_slice(&3u32.to_be_bytes()); // size < header
        stream.extend_from_slice(b"free");
        stream.extend_from_slice(&mp4_box(b"skip", &[9; 4]));

        let mut parser = Mp4Parser::default();
        let mut collector = Collector::default();
        parser.write(&stream, &mut |e: &BoxEvent<'_>| collector.on_box(e));

        assert_eq!(collector.boxes.len(), 1); // the good box survived
        assert!(matches!(
            parser.error(),
            Some(Mp4Error::BoxTooSmall { size: 3, .. })
        ));
        // later writes are swallowed
        assert_eq!(
            parser.write(&[0; 8], &mut |e: &BoxEvent<'_>| collector.on_box(e)),
            8
        );
        assert_eq!(collector.boxes.len(), 1);
    }
}
