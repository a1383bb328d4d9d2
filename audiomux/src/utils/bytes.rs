//! Byte-order helpers for container field decoding.
//!
//! Container headers are decoded field by field at explicit offsets instead
//! of overlaying structs on raw bytes, so layout never depends on compiler
//! padding. RIFF/AVI fields are little-endian, MP4 box fields big-endian.

pub fn read_u16_le(data: &[u8], offset: usize) -> u16 {
    u16::from_le_bytes([data[offset], data[offset + 1]])
}

pub fn read_u32_le(data: &[u8], offset: usize) -> u32 {
    u32::from_le_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub fn read_u64_le(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_le_bytes(bytes)
}

pub fn read_u32_be(data: &[u8], offset: usize) -> u32 {
    u32::from_be_bytes([
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ])
}

pub fn read_u64_be(data: &[u8], offset: usize) -> u64 {
    let mut bytes = [0u8; 8];
    bytes.copy_from_slice(&data[offset..offset + 8]);
    u64::from_be_bytes(bytes)
}

/// Copies a FOURCC out of `data` at `offset`.
pub fn fourcc(data: &[u8], offset: usize) -> [u8; 4] {
    [
        data[offset],
        data[offset + 1],
        data[offset + 2],
        data[offset + 3],
    ]
}

/// Printable form of a FOURCC, with non-ASCII bytes replaced.
pub fn fourcc_str(tag: &[u8; 4]) -> String {
    tag.iter()
        .map(|&b| {
            if (0x20..0x7F).contains(&b) {
                b as char
            } else {
                '.'
            }
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn endianness() {
        let data = [0x01, 0x02, 0x03, 0x04, 0x05, 0x06, 0x07, 0x08];
        assert_eq!(read_u16_le(&data, 0), 0x0201);
        assert_eq!(read_u32_le(&data, 0), 0x0403_0201);
        assert_eq!(read_u32_be(&data, 0), 0x0102_0304);
        assert_eq!(read_u64_be(&data, 0), 0x0102_0304_0506_0708);
        assert_eq!(read_u64_le(&data, 0), 0x0807_0605_0403_0201);
    }

    #[test]
    fn fourcc_display() {
        assert_eq!(fourcc_str(b"movi"), "movi");
        assert_eq!(fourcc_str(&[0x00, b'w', b'b', 0xFF]), ".wb.");
    }
}
