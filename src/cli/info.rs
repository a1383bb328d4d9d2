use std::fs::File;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Result, bail};
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use serde::Serialize;

use audiomux::containers::avi::AviDemuxer;
use audiomux::containers::m4a::{Codec, M4aDemuxer, M4aFileDemuxer};
use audiomux::utils::bytes::fourcc_str;

use super::ContainerKind;
use super::command::{Cli, InfoArgs, InfoFormat};
use crate::input::InputReader;

#[derive(Debug, Serialize)]
pub struct ContainerReport {
    pub container: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub audio: Option<AudioReport>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub video: Option<VideoReport>,
}

#[derive(Debug, Serialize)]
pub struct AudioReport {
    pub codec: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub sample_rate: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub channels: Option<u16>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub bits_per_sample: Option<u16>,
    /// Payload bytes (AVI) or sample count (M4A).
    pub units: u64,
    pub unit_kind: &'static str,
}

#[derive(Debug, Serialize)]
pub struct VideoReport {
    pub codec: String,
    pub width: u64,
    pub height: u64,
    pub frames: u64,
    pub seconds: u32,
}

pub fn cmd_info(args: &InfoArgs, _cli: &Cli, multi: Option<&MultiProgress>) -> Result<()> {
    log::info!("Analyzing container: {}", args.input.display());

    let mut reader = InputReader::new(&args.input)?;
    let mut first = vec![0u8; 64 * 1024];
    let first_len = reader.read_chunk(&mut first)?;
    let Some(kind) = ContainerKind::detect(&first[..first_len], &args.input) else {
        bail!("unrecognized container: {}", args.input.display());
    };

    let pb = multi.map(|multi| {
        let pb = multi.add(ProgressBar::new_spinner());
        if let Ok(style) = ProgressStyle::with_template("{spinner:.green} {msg}") {
            pb.set_style(style);
        }
        pb.enable_steady_tick(std::time::Duration::from_millis(100));
        pb.set_message("Analyzing...");
        pb
    });

    let report = match kind {
        ContainerKind::Avi => avi_report(&mut reader, &first[..first_len])?,
        ContainerKind::M4a => m4a_report(args, &mut reader, &first[..first_len])?,
    };

    if let Some(pb) = pb {
        pb.finish_and_clear();
    }

    match args.format {
        InfoFormat::Yaml => print!("{}", serde_yaml_ng::to_string(&report)?),
        InfoFormat::Text => print_text_report(&report),
    }
    Ok(())
}

fn avi_report(reader: &mut InputReader, first: &[u8]) -> Result<ContainerReport> {
    let mut demuxer = AviDemuxer::default();
    // only headers and counters are wanted
    demuxer.set_mute(true);

    demuxer.write(first);
    reader.process_chunks(64 * 1024, |chunk| {
        demuxer.write(chunk);
        Ok(demuxer.is_active())
    })?;

    if let Some(error) = demuxer.last_error() {
        bail!("AVI parse failed: {error}");
    }
    if !demuxer.is_metadata_ready() {
        bail!("input ended before the AVI headers were complete");
    }

    let audio = demuxer.audio_info().map(|fmt| AudioReport {
        codec: format!("{:?}", fmt.format_tag),
        sample_rate: Some(fmt.samples_per_sec),
        channels: Some(fmt.channels),
        bits_per_sample: Some(fmt.bits_per_sample),
        units: demuxer.audio_bytes(),
        unit_kind: "bytes",
    });
    let video = demuxer.video_info().map(|info| VideoReport {
        codec: fourcc_str(demuxer.video_format()),
        width: info.width,
        height: info.height,
        frames: demuxer.video_frames(),
        seconds: demuxer.video_seconds(),
    });
    Ok(ContainerReport {
        container: "RIFF/AVI",
        audio,
        video,
    })
}

fn m4a_report(
    args: &InfoArgs,
    reader: &mut InputReader,
    first: &[u8],
) -> Result<ContainerReport> {
    // a seekable file handles any box order; stdin requires fast-start
    if args.input.to_string_lossy() != "-" {
        let mut demuxer = M4aFileDemuxer::new();
        demuxer.set_frame_callback(|_frame| {});
        demuxer.begin(File::open(&args.input)?)?;
        let config = demuxer.audio_config().clone();
        return Ok(ContainerReport {
            container: "MP4/M4A",
            audio: Some(m4a_audio_report(config.codec, demuxer.sample_count() as u64)),
            video: None,
        });
    }

    let frames = Arc::new(AtomicU64::new(0));
    let counter = Arc::clone(&frames);
    let mut demuxer = M4aDemuxer::new();
    demuxer.set_frame_callback(move |_frame| {
        counter.fetch_add(1, Ordering::Relaxed);
    });

    demuxer.write(first);
    reader.process_chunks(64 * 1024, |chunk| {
        demuxer.write(chunk);
        Ok(true)
    })?;

    if let Some(error) = demuxer.error() {
        bail!("M4A parse failed: {error}");
    }
    Ok(ContainerReport {
        container: "MP4/M4A",
        audio: Some(m4a_audio_report(
            demuxer.codec(),
            frames.load(Ordering::Relaxed),
        )),
        video: None,
    })
}

fn m4a_audio_report(codec: Codec, samples: u64) -> AudioReport {
    AudioReport {
        codec: format!("{codec:?}"),
        sample_rate: None,
        channels: None,
        bits_per_sample: None,
        units: samples,
        unit_kind: "samples",
    }
}

fn print_text_report(report: &ContainerReport) {
    println!();
    println!("Container Information");
    println!("=====================");
    println!();
    println!("  Container                 {}", report.container);
    if let Some(audio) = &report.audio {
        println!();
        println!("Audio Stream");
        println!("  Codec                     {}", audio.codec);
        if let Some(rate) = audio.sample_rate {
            println!("  Sampling rate             {rate} Hz");
        }
        if let Some(channels) = audio.channels {
            println!("  Channels                  {channels}");
        }
        if let Some(bits) = audio.bits_per_sample {
            println!("  Bits per sample           {bits}");
        }
        println!(
            "  {:26}{}",
            capitalize(audio.unit_kind),
            audio.units
        );
    }
    if let Some(video) = &report.video {
        println!();
        println!("Video Stream");
        println!("  Codec                     {}", video.codec);
        println!("  Resolution                {}x{}", video.width, video.height);
        println!("  Frames                    {}", video.frames);
        println!("  Duration                  {} s", video.seconds);
    }
    println!();
}

fn capitalize(word: &str) -> String {
    let mut chars = word.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}
