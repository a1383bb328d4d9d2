use super::*;
use std::sync::{Arc, Mutex};

/// Write sink that can be inspected after the demuxer is done with it.
#[derive(Clone, Default)]
struct SharedSink(Arc<Mutex<Vec<u8>>>);

impl SharedSink {
    fn bytes(&self) -> Vec<u8> {
        self.0.lock().unwrap().clone()
    }
}

impl Write for SharedSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

#[derive(Clone, Default)]
struct SharedVideoSink {
    frames: Arc<Mutex<Vec<Vec<u8>>>>,
    current: Arc<Mutex<Vec<u8>>>,
}

impl VideoSink for SharedVideoSink {
    fn begin_frame(&mut self, _size: usize) {
        self.current.lock().unwrap().clear();
    }

    fn write(&mut self, data: &[u8]) {
        self.current.lock().unwrap().extend_from_slice(data);
    }

    fn end_frame(&mut self) -> u32 {
        let frame = std::mem::take(&mut *self.current.lock().unwrap());
        self.frames.lock().unwrap().push(frame);
        0
    }
}

fn chunk(tag: &[u8; 4], payload: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(tag);
    out.extend_from_slice(&(payload.len() as u32).to_le_bytes());
    out.extend_from_slice(payload);
    if payload.len() % 2 != 0 {
        out.push(0); // alignment pad
    }
    out
}

fn list(list_type: &[u8; 4], content: &[u8]) -> Vec<u8> {
    let mut out = Vec::new();
    out.extend_from_slice(b"LIST");
    out.extend_from_slice(&((content.len() + 4) as u32).to_le_bytes());
    out.extend_from_slice(list_type);
    out.extend_from_slice(content);
    out
}

fn avih_payload(streams: u32) -> Vec<u8> {
    let mut data = vec![0u8; AviMainHeader::SIZE];
    data[0..4].copy_from_slice(&40_000u32.to_le_bytes()); // 25 fps
    data[16..20].copy_from_slice(&3u32.to_le_bytes()); // total frames
    data[24..28].copy_from_slice(&streams.to_le_bytes());
    data
}

fn strh_payload(fcc_type: &[u8; 4], handler: &[u8; 4], rate: u32) -> Vec<u8> {
    let mut data = vec![0u8; AviStreamHeader::SIZE];
    data[0..4].copy_from_slice(fcc_type);
    data[4..8].copy_from_slice(handler);
    data[20..24].copy_from_slice(&1u32.to_le_bytes()); // scale
    data[24..28].copy_from_slice(&rate.to_le_bytes());
    data[32..36].copy_from_slice(&(rate * 10).to_le_bytes()); // length
    data
}

fn pcm_strf_payload() -> Vec<u8> {
    let mut data = Vec::new();
    data.extend_from_slice(&1u16.to_le_bytes()); // PCM
    data.extend_from_slice(&1u16.to_le_bytes()); // mono
    data.extend_from_slice(&44_100u32.to_le_bytes());
    data.extend_from_slice(&88_200u32.to_le_bytes());
    data.extend_from_slice(&2u16.to_le_bytes());
    data.extend_from_slice(&16u16.to_le_bytes());
    data
}

fn video_strf_payload() -> Vec<u8> {
    let mut data = vec![0u8; BitmapInfoHeader::SIZE];
    data[0..4].copy_from_slice(&(BitmapInfoHeader::SIZE as u32).to_le_bytes());
    data[4..8].copy_from_slice(&320u32.to_le_bytes());
    data[12..16].copy_from_slice(&240u32.to_le_bytes());
    data
}

/// RIFF/AVI with one PCM audio stream and the given movi payload chunks.
fn audio_avi(movi_chunks: &[Vec<u8>]) -> Vec<u8> {
    let strl = list(
        b"strl",
        &[
            chunk(b"strh", &strh_payload(b"auds", &[0; 4], 44_100)),
            chunk(b"strf", &pcm_strf_payload()),
        ]
        .concat(),
    );
    let hdrl = list(b"hdrl", &[chunk(b"avih", &avih_payload(1)), strl].concat());
    let movi = list(b"movi", &movi_chunks.concat());

    let mut content = Vec::new();
    content.extend_from_slice(b"AVI ");
    content.extend_from_slice(&hdrl);
    content.extend_from_slice(&movi);

    let mut out = Vec::new();
    out.extend_from_slice(b"RIFF");
    out.extend_from_slice(&(content.len() as u32).to_le_bytes());
    out.extend_from_slice(&content);
    out
}

#[test]
fn minimal_audio_avi_in_seven_byte_writes() {
    let payloads: Vec<Vec<u8>> = (0..3u8)
        .map(|i| vec![i; 100])
        .map(|p| chunk(b"01wb", &p))
        .collect();
    let stream = audio_avi(&payloads);

    let sink = SharedSink::default();
    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(sink.clone());

    let mut metadata_before_audio = false;
    for piece in stream.chunks(7) {
        assert_eq!(demuxer.write(piece), piece.len());
        if demuxer.is_metadata_ready() && sink.bytes().is_empty() {
            metadata_before_audio = true;
        }
    }

    assert!(demuxer.is_active(), "error: {:?}", demuxer.last_error());
    assert!(demuxer.is_metadata_ready());
    assert!(metadata_before_audio);

    let audio = sink.bytes();
    assert_eq!(audio.len(), 300);
    let expected: Vec<u8> = (0..3u8).flat_map(|i| vec![i; 100]).collect();
    assert_eq!(audio, expected);

    let fmt = demuxer.audio_info().unwrap();
    assert_eq!(fmt.format_tag, AudioFormatTag::Pcm);
    assert_eq!(fmt.samples_per_sec, 44_100);
    assert_eq!(fmt.channels, 1);
    assert_eq!(demuxer.main_header().streams, 1);
}

#[test]
fn odd_chunk_sizes_keep_tag_sync() {
    // a 33 byte chunk occupies 34 bytes; the next tag must still be found
    let payload_a: Vec<u8> = (0..33u8).collect();
    let payload_b = vec![0xAB; 5];
    let stream = audio_avi(&[chunk(b"01wb", &payload_a), chunk(b"01wb", &payload_b)]);

    let sink = SharedSink::default();
    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(sink.clone());
    demuxer.write(&stream);

    assert!(demuxer.is_active(), "error: {:?}", demuxer.last_error());
    let mut expected = payload_a.clone();
    expected.extend_from_slice(&payload_b);
    assert_eq!(sink.bytes(), expected);
}

#[test]
fn byte_wise_write_equals_single_write() {
    // chunk boundaries must not influence the result
    let payloads: Vec<Vec<u8>> = vec![
        chunk(b"01wb", &(0..77u8).collect::<Vec<u8>>()),
        chunk(b"01wb", &[1, 2, 3]),
        chunk(b"01wb", &(0..64u8).rev().collect::<Vec<u8>>()),
    ];
    let stream = audio_avi(&payloads);

    let single_sink = SharedSink::default();
    let mut single = AviDemuxer::default();
    single.set_audio_output(single_sink.clone());
    single.write(&stream);

    let split_sink = SharedSink::default();
    let mut split = AviDemuxer::default();
    split.set_audio_output(split_sink.clone());
    for byte in &stream {
        split.write(std::slice::from_ref(byte));
    }

    assert!(single.is_active() && split.is_active());
    assert_eq!(single_sink.bytes(), split_sink.bytes());
    assert_eq!(single.main_header(), split.main_header());
    assert_eq!(single.audio_info(), split.audio_info());
    assert_eq!(single.audio_bytes(), split.audio_bytes());
}

#[test]
fn video_frames_are_framed_through_the_sink() {
    let strl_audio = list(
        b"strl",
        &[
            chunk(b"strh", &strh_payload(b"auds", &[0; 4], 44_100)),
            chunk(b"strf", &pcm_strf_payload()),
        ]
        .concat(),
    );
    let strl_video = list(
        b"strl",
        &[
            chunk(b"strh", &strh_payload(b"vids", b"MJPG", 25)),
            chunk(b"strf", &video_strf_payload()),
        ]
        .concat(),
    );
    let hdrl = list(
        b"hdrl",
        &[chunk(b"avih", &avih_payload(2)), strl_audio, strl_video].concat(),
    );
    let movi = list(
        b"movi",
        &[
            chunk(b"00dc", &[9; 40]),
            chunk(b"01wb", &[1; 10]),
            chunk(b"00dc", &[8; 20]),
        ]
        .concat(),
    );

    let mut content = Vec::new();
    content.extend_from_slice(b"AVI ");
    content.extend_from_slice(&hdrl);
    content.extend_from_slice(&movi);
    let mut stream = Vec::new();
    stream.extend_from_slice(b"RIFF");
    stream.extend_from_slice(&(content.len() as u32).to_le_bytes());
    stream.extend_from_slice(&content);

    let audio_sink = SharedSink::default();
    let video_sink = SharedVideoSink::default();
    let frames = Arc::clone(&video_sink.frames);

    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(audio_sink.clone());
    demuxer.set_video_output(video_sink);
    for piece in stream.chunks(11) {
        demuxer.write(piece);
    }

    assert!(demuxer.is_active(), "error: {:?}", demuxer.last_error());
    assert_eq!(demuxer.video_format(), b"MJPG");
    assert_eq!(audio_sink.bytes(), vec![1; 10]);
    let frames = frames.lock().unwrap();
    assert_eq!(frames.len(), 2);
    assert_eq!(frames[0], vec![9; 40]);
    assert_eq!(frames[1], vec![8; 20]);
    assert_eq!(demuxer.video_frames(), 2);
}

#[test]
fn validation_hook_can_veto() {
    let stream = audio_avi(&[chunk(b"01wb", &[1; 10])]);

    let sink = SharedSink::default();
    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(sink.clone());
    demuxer.set_validation_hook(|avi| {
        // metadata is complete at this point
        assert!(avi.is_metadata_ready());
        false
    });
    demuxer.write(&stream);

    assert!(!demuxer.is_active());
    assert_eq!(demuxer.last_error(), Some(&AviError::Rejected));
    // the veto fires before any stream data is forwarded
    assert!(sink.bytes().is_empty());
    // later writes are swallowed without complaint
    assert_eq!(demuxer.write(&[0; 32]), 32);
}

#[test]
fn garbage_input_fails_permanently() {
    let mut demuxer = AviDemuxer::default();
    assert_eq!(demuxer.write(b"this is not a RIFF stream at all"), 32);
    assert!(!demuxer.is_active());
    assert_eq!(demuxer.last_error(), Some(&AviError::NotAvi));
}

#[test]
fn mute_suppresses_audio_but_keeps_parsing() {
    let stream = audio_avi(&[chunk(b"01wb", &[5; 50])]);

    let sink = SharedSink::default();
    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(sink.clone());
    demuxer.set_mute(true);
    demuxer.write(&stream);

    assert!(demuxer.is_active());
    assert!(sink.bytes().is_empty());
    // consumption still tracked, only delivery is suppressed
    assert_eq!(demuxer.audio_bytes(), 50);
}

#[test]
fn ignored_info_list_is_skipped() {
    // an INFO list between hdrl and movi must be discarded wholesale
    let strl = list(
        b"strl",
        &[
            chunk(b"strh", &strh_payload(b"auds", &[0; 4], 44_100)),
            chunk(b"strf", &pcm_strf_payload()),
        ]
        .concat(),
    );
    let hdrl = list(b"hdrl", &[chunk(b"avih", &avih_payload(1)), strl].concat());
    let info = list(b"INFO", &chunk(b"ISFT", b"lavf61.1"));
    let movi = list(b"movi", &chunk(b"01wb", &[3; 20]));

    let mut content = Vec::new();
    content.extend_from_slice(b"AVI ");
    content.extend_from_slice(&hdrl);
    content.extend_from_slice(&info);
    content.extend_from_slice(&movi);
    let mut stream = Vec::new();
    stream.extend_from_slice(b"RIFF");
    stream.extend_from_slice(&(content.len() as u32).to_le_bytes());
    stream.extend_from_slice(&content);

    let sink = SharedSink::default();
    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(sink.clone());
    for piece in stream.chunks(9) {
        demuxer.write(piece);
    }

    assert!(demuxer.is_active(), "error: {:?}", demuxer.last_error());
    assert_eq!(sink.bytes(), vec![3; 20]);
}
