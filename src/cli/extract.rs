use std::fs::File;
use std::io::Write;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};

use audiomux::concurrency::sync_nbuffer::channel_nbuffer;
use audiomux::containers::avi::{AudioFormatTag, AviDemuxer};
use audiomux::containers::m4a::{Codec, Frame, M4aDemuxer, M4aFileDemuxer};

use super::ContainerKind;
use super::command::{Cli, ExtractArgs};
use crate::input::InputReader;
use crate::wav::WavWriter;

const CHUNK_SIZE: usize = 64 * 1024;
/// Block geometry of the reader/demuxer pipeline in --threaded mode.
const PIPELINE_BLOCK: usize = 64 * 1024;
const PIPELINE_BLOCKS: usize = 4;

pub fn cmd_extract(args: &ExtractArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Extracting audio from: {}", args.input.display());

    let mut reader = InputReader::new(&args.input)?;
    let mut first = vec![0u8; CHUNK_SIZE];
    let first_len = reader.read_chunk(&mut first)?;
    let Some(kind) = ContainerKind::detect(&first[..first_len], &args.input) else {
        bail!("unrecognized container: {}", args.input.display());
    };

    let pb = multi.map(|multi| {
        let pb = match reader.len_hint() {
            Some(len) => {
                let pb = multi.add(ProgressBar::new(len));
                pb.set_style(
                    ProgressStyle::with_template(
                        "{spinner:.green} [{bar:30}] {bytes}/{total_bytes} {msg}",
                    )
                    .unwrap_or_else(|_| ProgressStyle::default_bar()),
                );
                pb
            }
            None => multi.add(ProgressBar::new_spinner()),
        };
        pb.set_message("Extracting...");
        pb
    });

    match kind {
        ContainerKind::Avi => extract_avi(args, &mut reader, &first[..first_len], pb.as_ref()),
        ContainerKind::M4a => extract_m4a(args, &mut reader, &first[..first_len], pb.as_ref()),
    }
}

/// The audio sink is created lazily by the validation hook, once the stream
/// format is known and before the first audio byte arrives.
enum AudioTarget {
    Wav(WavWriter<File>),
    Raw(File),
}

#[derive(Clone)]
struct LazyAudioSink(Arc<Mutex<Option<AudioTarget>>>);

impl Write for LazyAudioSink {
    fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
        match self.0.lock().unwrap().as_mut() {
            Some(AudioTarget::Wav(writer)) => writer.write_data(buf)?,
            Some(AudioTarget::Raw(file)) => file.write_all(buf)?,
            None => {
                return Err(std::io::Error::other("audio sink not configured"));
            }
        }
        Ok(buf.len())
    }

    fn flush(&mut self) -> std::io::Result<()> {
        Ok(())
    }
}

fn extract_avi(
    args: &ExtractArgs,
    reader: &mut InputReader,
    first: &[u8],
    pb: Option<&ProgressBar>,
) -> Result<()> {
    let target: Arc<Mutex<Option<AudioTarget>>> = Arc::default();
    let target_path: Arc<Mutex<Option<PathBuf>>> = Arc::default();

    let mut demuxer = AviDemuxer::default();
    demuxer.set_audio_output(LazyAudioSink(Arc::clone(&target)));

    let requested_output = args.output.clone();
    let input_path = args.input.clone();
    let hook_target = Arc::clone(&target);
    let hook_path = Arc::clone(&target_path);
    demuxer.set_validation_hook(move |avi| {
        let Some(format) = avi.audio_info() else {
            log::error!("no audio stream in this AVI");
            return false;
        };
        let is_pcm = format.format_tag == AudioFormatTag::Pcm;
        let path = requested_output
            .clone()
            .unwrap_or_else(|| input_path.with_extension(if is_pcm { "wav" } else { "raw" }));
        let wants_wav = path.extension().is_some_and(|e| e.eq_ignore_ascii_case("wav"));
        if wants_wav && !is_pcm {
            log::error!(
                "audio format {:?} cannot be wrapped as WAV, choose a .raw output",
                format.format_tag
            );
            return false;
        }

        let file = match File::create(&path) {
            Ok(file) => file,
            Err(e) => {
                log::error!("cannot create {}: {e}", path.display());
                return false;
            }
        };
        let opened = if wants_wav {
            let mut writer = WavWriter::new(file);
            if writer
                .configure_audio_format(
                    format.samples_per_sec,
                    format.channels,
                    format.bits_per_sample,
                )
                .and_then(|_| writer.write_header())
                .is_err()
            {
                log::error!("cannot write WAV header");
                return false;
            }
            AudioTarget::Wav(writer)
        } else {
            AudioTarget::Raw(file)
        };
        *hook_target.lock().unwrap() = Some(opened);
        *hook_path.lock().unwrap() = Some(path);
        true
    });

    demuxer.write(first);
    let mut total = first.len() as u64;
    if args.threaded {
        feed_threaded(reader, &mut demuxer, &mut total, pb)?;
    } else {
        reader.process_chunks(CHUNK_SIZE, |chunk| {
            total += chunk.len() as u64;
            if let Some(pb) = pb {
                pb.set_position(total);
            }
            demuxer.write(chunk);
            Ok(demuxer.is_active())
        })?;
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    if let Some(error) = demuxer.last_error() {
        bail!("AVI extraction failed: {error}");
    }

    let mut target = target.lock().unwrap();
    match target.take() {
        Some(AudioTarget::Wav(mut writer)) => writer.finish()?,
        Some(AudioTarget::Raw(mut file)) => file.flush()?,
        None => bail!("input ended before any audio was found"),
    }
    if let Some(path) = target_path.lock().unwrap().take() {
        println!(
            "Extracted {} audio bytes to {}",
            demuxer.audio_bytes(),
            path.display()
        );
    }
    Ok(())
}

/// Reader thread fills pipeline blocks; the demuxer drains them here.
fn feed_threaded(
    reader: &mut InputReader,
    demuxer: &mut AviDemuxer,
    total: &mut u64,
    pb: Option<&ProgressBar>,
) -> Result<()> {
    let (mut producer, mut consumer) = channel_nbuffer::<u8>(PIPELINE_BLOCK, PIPELINE_BLOCKS);

    std::thread::scope(|scope| -> Result<()> {
        let handle = scope.spawn(move || -> Result<()> {
            let mut chunk = vec![0u8; CHUNK_SIZE];
            loop {
                let n = reader.read_chunk(&mut chunk)?;
                if n == 0 {
                    break;
                }
                let mut offset = 0;
                while offset < n {
                    offset += producer.write_slice(&chunk[offset..n]);
                }
            }
            producer.flush();
            Ok(())
        });

        let mut block = vec![0u8; PIPELINE_BLOCK];
        loop {
            let n = consumer.read_slice(&mut block);
            if n == 0 {
                break;
            }
            *total += n as u64;
            if let Some(pb) = pb {
                pb.set_position(*total);
            }
            demuxer.write(&block[..n]);
            if !demuxer.is_active() {
                break;
            }
        }
        // unblocks a producer still waiting for a recycled block
        drop(consumer);
        handle.join().expect("reader thread panicked")
    })
}

fn extract_m4a(
    args: &ExtractArgs,
    reader: &mut InputReader,
    first: &[u8],
    pb: Option<&ProgressBar>,
) -> Result<()> {
    if args.threaded {
        log::info!("--threaded only applies to AVI inputs, extracting directly");
    }

    // the sink opens on the first frame, when the codec is known
    let sink: Arc<Mutex<Option<(File, PathBuf, u64)>>> = Arc::default();
    let requested_output = args.output.clone();
    let input_path = args.input.clone();
    let cb_sink = Arc::clone(&sink);
    let callback = move |frame: &Frame<'_>| {
        let mut guard = cb_sink.lock().unwrap();
        if guard.is_none() {
            let path = requested_output
                .clone()
                .unwrap_or_else(|| input_path.with_extension(codec_extension(frame.codec)));
            match File::create(&path) {
                Ok(file) => *guard = Some((file, path, 0)),
                Err(e) => {
                    log::error!("cannot create output: {e}");
                    return;
                }
            }
        }
        if let Some((file, _, written)) = guard.as_mut() {
            if let Err(e) = file.write_all(frame.data) {
                log::error!("write failed: {e}");
            } else {
                *written += frame.data.len() as u64;
            }
        }
    };

    if args.input.to_string_lossy() != "-" {
        let mut demuxer = M4aFileDemuxer::new();
        demuxer.set_frame_callback(callback);
        demuxer
            .begin(File::open(&args.input)?)
            .context("locating sample tables")?;
        if let Some(pb) = pb {
            pb.set_length(demuxer.sample_count() as u64);
        }
        while demuxer.copy() {
            if let Some(pb) = pb {
                pb.set_position(demuxer.sample_index() as u64);
            }
        }
        if demuxer.is_active() {
            bail!("extraction stopped at sample {}", demuxer.sample_index());
        }
    } else {
        let mut demuxer = M4aDemuxer::new();
        demuxer.set_frame_callback(callback);
        demuxer.write(first);
        let mut total = first.len() as u64;
        reader.process_chunks(CHUNK_SIZE, |chunk| {
            total += chunk.len() as u64;
            if let Some(pb) = pb {
                pb.set_position(total);
            }
            demuxer.write(chunk);
            Ok(true)
        })?;
        if let Some(error) = demuxer.error() {
            bail!("M4A extraction failed: {error}");
        }
    }

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }
    let mut guard = sink.lock().unwrap();
    match guard.take() {
        Some((mut file, path, written)) => {
            file.flush()?;
            println!("Extracted {written} bytes to {}", path.display());
            Ok(())
        }
        None => bail!("no audio frames found"),
    }
}

fn codec_extension(codec: Codec) -> &'static str {
    match codec {
        Codec::Aac => "aac",
        Codec::Alac => "alac",
        Codec::Mp3 => "mp3",
        Codec::Unknown => "bin",
    }
}
