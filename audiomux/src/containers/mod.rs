/// RIFF/AVI demuxing.
///
/// File structure reference:
/// <https://learn.microsoft.com/en-us/windows/win32/directshow/avi-riff-file-reference>
pub mod avi;

/// MP4/M4A demuxing (ISO/IEC 14496-12 box layout).
pub mod m4a;
