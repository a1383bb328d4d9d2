pub mod command;
pub mod extract;
pub mod info;

use std::path::Path;

/// Container family of an input, decided by signature first and file
/// extension second.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerKind {
    Avi,
    M4a,
}

impl ContainerKind {
    /// `prefix` holds the first bytes of the stream (12 are enough).
    pub fn detect(prefix: &[u8], path: &Path) -> Option<Self> {
        if prefix.len() >= 12 && &prefix[0..4] == b"RIFF" && &prefix[8..12] == b"AVI " {
            return Some(Self::Avi);
        }
        if prefix.len() >= 8 && &prefix[4..8] == b"ftyp" {
            return Some(Self::M4a);
        }
        match path
            .extension()
            .and_then(|e| e.to_str())
            .map(|e| e.to_ascii_lowercase())
            .as_deref()
        {
            Some("avi") => Some(Self::Avi),
            Some("m4a") | Some("mp4") => Some(Self::M4a),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn detect_by_signature_beats_extension() {
        let avi = b"RIFF\x10\x00\x00\x00AVI LIST";
        assert_eq!(
            ContainerKind::detect(avi, Path::new("misnamed.m4a")),
            Some(ContainerKind::Avi)
        );

        let m4a = b"\x00\x00\x00\x18ftypM4A ";
        assert_eq!(
            ContainerKind::detect(m4a, Path::new("clip.bin")),
            Some(ContainerKind::M4a)
        );

        assert_eq!(
            ContainerKind::detect(b"garbage", Path::new("clip.avi")),
            Some(ContainerKind::Avi)
        );
        assert_eq!(ContainerKind::detect(b"garbage", Path::new("clip.ogg")), None);
    }
}
