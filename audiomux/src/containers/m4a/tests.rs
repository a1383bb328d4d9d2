use super::*;
use crate::utils::errors::Mp4Error;
use std::io::Cursor;
use std::sync::{Arc, Mutex};

type FrameLog = Arc<Mutex<Vec<Vec<u8>>>>;

fn frame_collector() -> (FrameLog, impl FnMut(&Frame<'_>) + 'static) {
    let log: FrameLog = Arc::default();
    let sink = Arc::clone(&log);
    let callback = move |frame: &Frame<'_>| {
        sink.lock().unwrap().push(frame.data.to_vec());
    };
    (log, callback)
}

fn mp4_box(kind: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(&((payload.len() + 8) as u32).to_be_bytes());
    out.extend_from_slice(kind);
    out.extend_from_slice(payload);
    out
}

/// Audio sample entry: 28 fixed bytes, then child boxes.
fn sample_entry(kind: &[u8; 4], children: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8; 28];
    payload[7] = 1; // data reference index
    payload.extend_from_slice(children);
    mp4_box(kind, &payload)
}

fn stsd_payload(entry: &[u8]) -> Vec<u8> {
    let mut payload = vec![0u8; 4]; // version + flags
    payload.extend_from_slice(&1u32.to_be_bytes()); // entry count
    payload.extend_from_slice(entry);
    payload
}

fn stsz_payload(fixed_size: u32, sizes: &[u32]) -> Vec<u8> {
    let mut payload = vec![0u8; 4];
    payload.extend_from_slice(&fixed_size.to_be_bytes());
    payload.extend_from_slice(&(sizes.len() as u32).to_be_bytes());
    for size in sizes {
        payload.extend_from_slice(&size.to_be_bytes());
    }
    payload
}

fn stco_payload(offsets: &[u32]) -> Vec<u8> {
    let mut payload = vec![0u8; 4];
    payload.extend_from_slice(&(offsets.len() as u32).to_be_bytes());
    for offset in offsets {
        payload.extend_from_slice(&offset.to_be_bytes());
    }
    payload
}

fn esds_payload(object_type: u8, rate_index: u8, channels: u8) -> Vec<u8> {
    let byte1 = (object_type << 3) | (rate_index >> 1);
    let byte2 = ((rate_index & 1) << 7) | (channels << 3);
    let mut payload = vec![0u8; 4]; // version + flags
    payload.extend_from_slice(&[0x03, 22, 0x00, 0x01, 0x00]); // ES descriptor
    payload.extend_from_slice(&[0x04, 17, 0x40, 0x15]); // decoder config
    payload.extend_from_slice(&[0; 11]); // buffer size + bitrates
    payload.extend_from_slice(&[0x05, 2, byte1, byte2]); // specific config
    payload
}

fn mdhd_payload(timescale: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 12]; // version/flags, creation, modification
    payload.extend_from_slice(&timescale.to_be_bytes());
    payload.extend_from_slice(&0u32.to_be_bytes()); // duration
    payload.extend_from_slice(&[0x55, 0xC4, 0, 0]); // language + predefined
    payload
}

fn stts_payload(count: u32, delta: u32) -> Vec<u8> {
    let mut payload = vec![0u8; 4];
    payload.extend_from_slice(&1u32.to_be_bytes()); // one run
    payload.extend_from_slice(&count.to_be_bytes());
    payload.extend_from_slice(&delta.to_be_bytes());
    payload
}

fn moov_for(entry: &[u8], stsz: &[u8], stco: &[u8]) -> Vec<u8> {
    let mut stbl_content = mp4_box(b"stsd", &stsd_payload(entry));
    stbl_content.extend_from_slice(&mp4_box(b"stts", &stts_payload(1000, 1024)));
    stbl_content.extend_from_slice(&mp4_box(b"stsz", stsz));
    stbl_content.extend_from_slice(&mp4_box(b"stco", stco));
    let stbl = mp4_box(b"stbl", &stbl_content);
    let minf = mp4_box(b"minf", &stbl);
    let mut mdia_content = mp4_box(b"mdhd", &mdhd_payload(44_100));
    mdia_content.extend_from_slice(&minf);
    let mdia = mp4_box(b"mdia", &mdia_content);
    let trak = mp4_box(b"trak", &mdia);
    mp4_box(b"moov", &trak)
}

fn build_m4a(entry: &[u8], sizes: &[u32], mdat_payload: &[u8]) -> Vec<u8> {
    let mut out = mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");
    out.extend_from_slice(&moov_for(
        entry,
        &stsz_payload(0, sizes),
        &stco_payload(&[0]),
    ));
    out.extend_from_slice(&mp4_box(b"mdat", mdat_payload));
    out
}

fn mp3_entry() -> Vec<u8> {
    sample_entry(b".mp3", &[])
}

#[test]
fn sample_table_drives_frame_emission() {
    // N samples out, their concatenation equals the mdat payload
    let sizes = [3u32, 5, 8, 2, 6];
    let payload: Vec<u8> = (0..24u8).collect();
    let stream = build_m4a(&mp3_entry(), &sizes, &payload);

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.write(&stream);

    assert!(demuxer.error().is_none(), "error: {:?}", demuxer.error());
    assert_eq!(demuxer.codec(), Codec::Mp3);
    assert_eq!(demuxer.sample_count(), 5);
    assert_eq!(demuxer.frames_emitted(), 5);

    let frames = frames.lock().unwrap();
    let lengths: Vec<usize> = frames.iter().map(|f| f.len()).collect();
    assert_eq!(lengths, [3, 5, 8, 2, 6]);
    let concatenated: Vec<u8> = frames.concat();
    assert_eq!(concatenated, payload);
}

#[test]
fn byte_wise_write_equals_single_write() {
    let sizes = [7u32, 7, 7];
    let payload = vec![0x5A; 21];
    let stream = build_m4a(&mp3_entry(), &sizes, &payload);

    let (single_frames, single_cb) = frame_collector();
    let mut single = M4aDemuxer::new();
    single.set_frame_callback(single_cb);
    single.write(&stream);

    let (split_frames, split_cb) = frame_collector();
    let mut split = M4aDemuxer::new();
    split.set_frame_callback(split_cb);
    for byte in &stream {
        split.write(std::slice::from_ref(byte));
    }

    assert_eq!(*single_frames.lock().unwrap(), *split_frames.lock().unwrap());
}

#[test]
fn aac_frames_carry_adts_headers() {
    let esds = mp4_box(b"esds", &esds_payload(2, 4, 2));
    let entry = sample_entry(b"mp4a", &esds);
    let sizes = [10u32, 20];
    let payload: Vec<u8> = (0..30u8).collect();
    let stream = build_m4a(&entry, &sizes, &payload);

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.write(&stream);

    assert_eq!(demuxer.codec(), Codec::Aac);
    let config = demuxer.audio_config();
    assert_eq!(config.aac_profile, 2);
    assert_eq!(config.aac_sample_rate_index, 4);
    assert_eq!(config.aac_channel_config, 2);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2);
    // 7 byte ADTS header precedes each frame
    assert_eq!(frames[0].len(), 17);
    assert_eq!(frames[0][0], 0xFF);
    assert_eq!(frames[0][1], 0xF1);
    assert_eq!(frames[0][2], 0x50); // AAC LC, 44100, stereo high bit
    assert_eq!(frames[0][4], (17 >> 3) as u8);
    assert_eq!(&frames[0][7..], &payload[..10]);
    assert_eq!(&frames[1][7..], &payload[10..30]);
}

#[test]
fn alac_magic_cookie_is_preserved_byte_exact() {
    let cookie: Vec<u8> = (0..24u8).map(|i| i.wrapping_mul(7)).collect();
    let mut nested_payload = vec![0u8; 4]; // version + flags
    nested_payload.extend_from_slice(&cookie);
    let nested = mp4_box(b"alac", &nested_payload);
    let entry = sample_entry(b"alac", &nested);

    let sizes = [4u32, 4];
    let payload = vec![0xCC; 8];
    let stream = build_m4a(&entry, &sizes, &payload);

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.write(&stream);

    assert_eq!(demuxer.codec(), Codec::Alac);
    assert_eq!(demuxer.alac_magic_cookie(), cookie.as_slice());
    // ALAC frames pass through untouched
    let frames = frames.lock().unwrap();
    assert_eq!(frames[0], vec![0xCC; 4]);
}

#[test]
fn fixed_sample_size_replaces_the_table() {
    let stsz = stsz_payload(4, &[]);
    let mut stsz_fixed = stsz.clone();
    // count lives in the same slot even without entries
    stsz_fixed[8..12].copy_from_slice(&6u32.to_be_bytes());

    let mut stream = mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");
    stream.extend_from_slice(&moov_for(&mp3_entry(), &stsz_fixed, &stco_payload(&[0])));
    let payload: Vec<u8> = (0..24u8).collect();
    stream.extend_from_slice(&mp4_box(b"mdat", &payload));

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.write(&stream);

    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 6);
    assert!(frames.iter().all(|f| f.len() == 4));
    assert_eq!(frames.concat(), payload);
}

#[test]
fn streaming_requires_moov_before_mdat() {
    let payload = vec![1u8; 12];
    let mut stream = mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");
    stream.extend_from_slice(&mp4_box(b"mdat", &payload));
    stream.extend_from_slice(&moov_for(
        &mp3_entry(),
        &stsz_payload(0, &[6, 6]),
        &stco_payload(&[0]),
    ));

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.write(&stream);

    assert_eq!(demuxer.error(), Some(&Mp4Error::MdatBeforeSampleTable));
    assert!(frames.lock().unwrap().is_empty());
}

#[test]
fn esds_descriptor_chain() {
    let info = EsdsInfo::parse(&esds_payload(2, 4, 2)).unwrap();
    assert_eq!(
        info,
        EsdsInfo {
            audio_object_type: 2,
            sample_rate_index: 4,
            channel_config: 2,
        }
    );

    // 5.1 at 48 kHz, object type 5 (SBR)
    let info = EsdsInfo::parse(&esds_payload(5, 3, 6)).unwrap();
    assert_eq!(info.audio_object_type, 5);
    assert_eq!(info.sample_rate_index, 3);
    assert_eq!(info.channel_config, 6);

    assert!(EsdsInfo::parse(&[0, 0, 0, 0, 0x42]).is_none());
}

#[test]
fn adts_header_golden_bytes() {
    let mut adts = [0u8; 7];
    write_adts_header(&mut adts, 2, 4, 2, 10);
    assert_eq!(adts, [0xFF, 0xF1, 0x50, 0x80, 0x02, 0x3F, 0xFC]);
}

#[test]
fn frame_timestamps_follow_the_stts_table() {
    // 1024 media units per sample at a 44100 timescale
    let sizes = [3u32, 5, 8];
    let payload: Vec<u8> = (0..16u8).collect();
    let stream = build_m4a(&mp3_entry(), &sizes, &payload);

    let timestamps: Arc<Mutex<Vec<Option<u64>>>> = Arc::default();
    let sink = Arc::clone(&timestamps);
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(move |frame: &Frame<'_>| {
        sink.lock().unwrap().push(frame.timestamp_ms);
    });
    demuxer.write(&stream);

    let timestamps = timestamps.lock().unwrap();
    assert_eq!(*timestamps, vec![Some(0), Some(23), Some(46)]);

    let timing = TrackTiming::default();
    assert_eq!(timing.timestamp_ms(5), None); // nothing known yet
}

#[test]
fn file_demuxer_with_windowed_sample_sizes() {
    let sizes = [3u32, 5, 8, 2, 6];
    let payload: Vec<u8> = (100..124u8).collect();
    let stream = build_m4a(&mp3_entry(), &sizes, &payload);

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aFileDemuxer::new();
    demuxer.set_frame_callback(callback);
    // window of two entries forces repeated stsz reads
    demuxer.set_sample_sizes_buffer_size(8);
    demuxer.begin(Cursor::new(stream)).unwrap();

    assert_eq!(demuxer.sample_count(), 5);
    assert_eq!(demuxer.audio_config().codec, Codec::Mp3);

    let mut copied = 0;
    while demuxer.copy() {
        copied += 1;
    }
    assert_eq!(copied, 5);
    assert!(!demuxer.is_active());

    let frames = frames.lock().unwrap();
    assert_eq!(frames.concat(), payload);
}

#[test]
fn file_demuxer_accepts_mdat_before_moov() {
    let sizes = [6u32, 6];
    let payload: Vec<u8> = (0..12u8).collect();

    let mut stream = mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");
    stream.extend_from_slice(&mp4_box(b"mdat", &payload));
    stream.extend_from_slice(&moov_for(
        &mp3_entry(),
        &stsz_payload(0, &sizes),
        &stco_payload(&[0]),
    ));

    let (frames, callback) = frame_collector();
    let mut demuxer = M4aFileDemuxer::new();
    demuxer.set_frame_callback(callback);
    demuxer.begin(Cursor::new(stream)).unwrap();

    while demuxer.copy() {}
    assert_eq!(frames.lock().unwrap().concat(), payload);
}

#[test]
fn file_demuxer_reports_missing_tables() {
    let stream = mp4_box(b"ftyp", b"M4A \x00\x00\x00\x00isomM4A ");
    let mut demuxer = M4aFileDemuxer::<Cursor<Vec<u8>>>::new();
    let result = demuxer.begin(Cursor::new(stream));
    assert!(matches!(result, Err(Mp4Error::NoSampleTable)));
}
