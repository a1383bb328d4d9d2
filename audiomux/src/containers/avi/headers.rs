//! AVI header chunk layouts.
//!
//! Decoded field by field at fixed little-endian offsets; the layouts come
//! with the container format and are not negotiable.

use crate::utils::bytes::{fourcc, read_u16_le, read_u32_le, read_u64_le};

/// `avih` payload: global movie parameters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AviMainHeader {
    pub micro_sec_per_frame: u32,
    pub max_bytes_per_sec: u32,
    pub padding_granularity: u32,
    pub flags: u32,
    pub total_frames: u32,
    pub initial_frames: u32,
    pub streams: u32,
    pub suggested_buffer_size: u32,
    pub width: u32,
    pub height: u32,
}

impl AviMainHeader {
    pub const SIZE: usize = 56; // 10 fields + 4 reserved dwords

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            micro_sec_per_frame: read_u32_le(data, 0),
            max_bytes_per_sec: read_u32_le(data, 4),
            padding_granularity: read_u32_le(data, 8),
            flags: read_u32_le(data, 12),
            total_frames: read_u32_le(data, 16),
            initial_frames: read_u32_le(data, 20),
            streams: read_u32_le(data, 24),
            suggested_buffer_size: read_u32_le(data, 28),
            width: read_u32_le(data, 32),
            height: read_u32_le(data, 36),
        })
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Rect {
    pub width: u32,
    pub height: u32,
}

/// `strh` payload: per-stream timing and type information.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AviStreamHeader {
    pub fcc_type: [u8; 4],
    pub fcc_handler: [u8; 4],
    pub flags: u32,
    pub priority: u16,
    pub language: u16,
    pub initial_frames: u32,
    pub scale: u32,
    pub rate: u32,
    pub start: u32,
    pub length: u32,
    pub suggested_buffer_size: u32,
    pub quality: u32,
    pub sample_size: u32,
    pub frame: Rect,
}

impl AviStreamHeader {
    pub const SIZE: usize = 56;

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            fcc_type: fourcc(data, 0),
            fcc_handler: fourcc(data, 4),
            flags: read_u32_le(data, 8),
            priority: read_u16_le(data, 12),
            language: read_u16_le(data, 14),
            initial_frames: read_u32_le(data, 16),
            scale: read_u32_le(data, 20),
            rate: read_u32_le(data, 24),
            start: read_u32_le(data, 28),
            length: read_u32_le(data, 32),
            suggested_buffer_size: read_u32_le(data, 36),
            quality: read_u32_le(data, 40),
            sample_size: read_u32_le(data, 44),
            frame: Rect {
                width: read_u32_le(data, 48),
                height: read_u32_le(data, 52),
            },
        })
    }

    pub fn is_audio(&self) -> bool {
        &self.fcc_type == b"auds"
    }

    pub fn is_video(&self) -> bool {
        &self.fcc_type == b"vids"
    }
}

/// `strf` payload for video streams.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct BitmapInfoHeader {
    pub size: u32,
    pub width: u64,
    pub height: u64,
    pub planes: u16,
    pub bit_count: u16,
    pub compression: u32,
    pub size_image: u32,
    pub x_pels_per_meter: u64,
    pub y_pels_per_meter: u64,
    pub clr_used: u32,
    pub clr_important: u32,
}

impl BitmapInfoHeader {
    pub const SIZE: usize = 56;

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::SIZE {
            return None;
        }
        Some(Self {
            size: read_u32_le(data, 0),
            width: read_u64_le(data, 4),
            height: read_u64_le(data, 12),
            planes: read_u16_le(data, 20),
            bit_count: read_u16_le(data, 22),
            compression: read_u32_le(data, 24),
            size_image: read_u32_le(data, 28),
            x_pels_per_meter: read_u64_le(data, 32),
            y_pels_per_meter: read_u64_le(data, 40),
            clr_used: read_u32_le(data, 48),
            clr_important: read_u32_le(data, 52),
        })
    }
}

/// WAVE format tag values seen in AVI audio streams.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AudioFormatTag {
    #[default]
    Unknown,
    Pcm,
    Adpcm,
    IeeeFloat,
    Alaw,
    Mulaw,
    Mp3,
    Aac,
    Other(u16),
}

impl AudioFormatTag {
    pub fn from_raw(tag: u16) -> Self {
        match tag {
            0x0000 => Self::Unknown,
            0x0001 => Self::Pcm,
            0x0002 => Self::Adpcm,
            0x0003 => Self::IeeeFloat,
            0x0006 => Self::Alaw,
            0x0007 => Self::Mulaw,
            0x0055 => Self::Mp3,
            0x00FF => Self::Aac,
            other => Self::Other(other),
        }
    }
}

/// `strf` payload for audio streams (WAVEFORMATEX).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WavFormatEx {
    pub format_tag: AudioFormatTag,
    pub channels: u16,
    pub samples_per_sec: u32,
    pub avg_bytes_per_sec: u32,
    pub block_align: u16,
    pub bits_per_sample: u16,
    pub cb_size: u16,
}

impl WavFormatEx {
    /// The trailing `cb_size` field is optional in old PCMWAVEFORMAT chunks.
    pub const MIN_SIZE: usize = 16;

    pub fn decode(data: &[u8]) -> Option<Self> {
        if data.len() < Self::MIN_SIZE {
            return None;
        }
        Some(Self {
            format_tag: AudioFormatTag::from_raw(read_u16_le(data, 0)),
            channels: read_u16_le(data, 2),
            samples_per_sec: read_u32_le(data, 4),
            avg_bytes_per_sec: read_u32_le(data, 8),
            block_align: read_u16_le(data, 12),
            bits_per_sample: read_u16_le(data, 14),
            cb_size: if data.len() >= 18 {
                read_u16_le(data, 16)
            } else {
                0
            },
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn wav_format_golden_bytes() {
        // 16-bit stereo PCM at 44100 Hz
        let mut data = Vec::new();
        data.extend_from_slice(&1u16.to_le_bytes());
        data.extend_from_slice(&2u16.to_le_bytes());
        data.extend_from_slice(&44_100u32.to_le_bytes());
        data.extend_from_slice(&176_400u32.to_le_bytes());
        data.extend_from_slice(&4u16.to_le_bytes());
        data.extend_from_slice(&16u16.to_le_bytes());

        let fmt = WavFormatEx::decode(&data).unwrap();
        assert_eq!(fmt.format_tag, AudioFormatTag::Pcm);
        assert_eq!(fmt.channels, 2);
        assert_eq!(fmt.samples_per_sec, 44_100);
        assert_eq!(fmt.block_align, 4);
        assert_eq!(fmt.bits_per_sample, 16);
        assert_eq!(fmt.cb_size, 0);
    }

    #[test]
    fn main_header_golden_bytes() {
        let mut data = vec![0u8; AviMainHeader::SIZE];
        data[0..4].copy_from_slice(&33_333u32.to_le_bytes()); // ~30 fps
        data[16..20].copy_from_slice(&1_234u32.to_le_bytes());
        data[24..28].copy_from_slice(&2u32.to_le_bytes());
        data[32..36].copy_from_slice(&640u32.to_le_bytes());
        data[36..40].copy_from_slice(&480u32.to_le_bytes());

        let hdr = AviMainHeader::decode(&data).unwrap();
        assert_eq!(hdr.micro_sec_per_frame, 33_333);
        assert_eq!(hdr.total_frames, 1_234);
        assert_eq!(hdr.streams, 2);
        assert_eq!(hdr.width, 640);
        assert_eq!(hdr.height, 480);

        assert!(AviMainHeader::decode(&data[..40]).is_none());
    }
}
