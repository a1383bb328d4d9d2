/// Errors raised by the RIFF/AVI state machine.
///
/// Any of these permanently disables parsing of the stream: the demuxer keeps
/// accepting (and dropping) bytes so the caller's write loop does not stall,
/// and the error stays available through the demuxer's `last_error` accessor.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum AviError {
    #[error("stream does not start with a RIFF/AVI header")]
    NotAvi,

    #[error("expected '{expected}' at stream offset {pos}")]
    UnexpectedTag { expected: &'static str, pos: u64 },

    #[error("'strf' for stream {0} is neither an audio nor a video format")]
    UnknownStreamFormat(usize),

    #[error("header chunk of {size} bytes exceeds the parse buffer ({capacity} bytes)")]
    ChunkTooLarge { size: usize, capacity: usize },

    #[error("stream rejected by the validation hook")]
    Rejected,
}

/// Errors raised by the MP4/M4A box walker and demuxers.
///
/// The box walk stops silently at the first malformed box; metadata and
/// frames extracted before that point remain valid. Total failure is only
/// signalled when no frames could be produced at all.
#[derive(thiserror::Error, Debug, Clone, PartialEq, Eq)]
pub enum Mp4Error {
    #[error("box size {size} at offset {pos} is smaller than its header")]
    BoxTooSmall { size: u64, pos: u64 },

    #[error("invalid box type at offset {0}")]
    InvalidBoxType(u64),

    #[error("mdat precedes the sample tables; only fast-start streams are supported")]
    MdatBeforeSampleTable,

    #[error("no stsz sample table found")]
    NoSampleTable,

    #[error("no mdat box found")]
    NoMediaData,

    #[error("no supported audio sample entry (mp4a/alac/.mp3) in stsd")]
    UnsupportedCodec,

    #[error("io error while demuxing: {0}")]
    Io(String),
}

impl From<std::io::Error> for Mp4Error {
    fn from(e: std::io::Error) -> Self {
        Mp4Error::Io(e.to_string())
    }
}
