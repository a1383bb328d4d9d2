use std::io::{self, BufWriter, Seek, SeekFrom, Write};

/// RIFF/WAVE writer for raw PCM data.
///
/// The RIFF and data chunk sizes are written as placeholders and patched in
/// [`WavWriter::finish`], so the target must be seekable.
pub struct WavWriter<W: Write + Seek> {
    writer: BufWriter<W>,
    riff_size_position: u64,
    data_size_position: u64,
    data_written: u64,
    sample_rate: u32,
    channels: u16,
    bits_per_sample: u16,
}

impl<W: Write + Seek> WavWriter<W> {
    pub fn new(writer: W) -> Self {
        Self {
            writer: BufWriter::new(writer),
            riff_size_position: 0,
            data_size_position: 0,
            data_written: 0,
            sample_rate: 44_100,
            channels: 2,
            bits_per_sample: 16,
        }
    }

    /// Configure audio format parameters. Must happen before any data is
    /// written.
    pub fn configure_audio_format(
        &mut self,
        sample_rate: u32,
        channels: u16,
        bits_per_sample: u16,
    ) -> io::Result<()> {
        if self.data_written > 0 {
            return Err(io::Error::new(
                io::ErrorKind::InvalidInput,
                "Cannot change format after writing data",
            ));
        }
        self.sample_rate = sample_rate;
        self.channels = channels;
        self.bits_per_sample = bits_per_sample;
        Ok(())
    }

    /// Write the RIFF/WAVE header with placeholder sizes.
    pub fn write_header(&mut self) -> io::Result<()> {
        self.writer.write_all(b"RIFF")?;
        self.riff_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched in finish()
        self.writer.write_all(b"WAVE")?;

        self.writer.write_all(b"fmt ")?;
        self.writer.write_all(&16u32.to_le_bytes())?;
        self.writer.write_all(&1u16.to_le_bytes())?; // PCM
        self.writer.write_all(&self.channels.to_le_bytes())?;
        self.writer.write_all(&self.sample_rate.to_le_bytes())?;
        let byte_rate =
            self.sample_rate * u32::from(self.channels) * u32::from(self.bits_per_sample / 8);
        self.writer.write_all(&byte_rate.to_le_bytes())?;
        let block_align = self.channels * (self.bits_per_sample / 8);
        self.writer.write_all(&block_align.to_le_bytes())?;
        self.writer.write_all(&self.bits_per_sample.to_le_bytes())?;

        self.writer.write_all(b"data")?;
        self.data_size_position = self.writer.stream_position()?;
        self.writer.write_all(&0u32.to_le_bytes())?; // patched in finish()

        Ok(())
    }

    /// Append raw PCM bytes in the configured format.
    pub fn write_data(&mut self, data: &[u8]) -> io::Result<()> {
        self.writer.write_all(data)?;
        self.data_written += data.len() as u64;
        Ok(())
    }

    /// Patch the chunk sizes and flush.
    pub fn finish(&mut self) -> io::Result<()> {
        self.writer.flush()?;
        let end = self.writer.stream_position()?;

        self.writer.seek(SeekFrom::Start(self.data_size_position))?;
        self.writer
            .write_all(&(self.data_written as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(self.riff_size_position))?;
        let riff_size = end - 8;
        self.writer.write_all(&(riff_size as u32).to_le_bytes())?;

        self.writer.seek(SeekFrom::Start(end))?;
        self.writer.flush()?;
        Ok(())
    }

    pub fn data_written(&self) -> u64 {
        self.data_written
    }

    pub fn into_inner(self) -> io::Result<W> {
        self.writer.into_inner().map_err(|e| e.into_error())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Cursor;

    #[test]
    fn header_and_sizes_are_patched() -> io::Result<()> {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.configure_audio_format(44_100, 1, 16)?;
        writer.write_header()?;
        writer.write_data(&[0x11, 0x22, 0x33, 0x44])?;
        writer.finish()?;

        let buffer = writer.into_inner()?.into_inner();
        assert_eq!(&buffer[0..4], b"RIFF");
        assert_eq!(&buffer[8..12], b"WAVE");
        assert_eq!(&buffer[12..16], b"fmt ");
        assert_eq!(u32::from_le_bytes(buffer[16..20].try_into().unwrap()), 16);
        assert_eq!(u16::from_le_bytes(buffer[20..22].try_into().unwrap()), 1);
        assert_eq!(u16::from_le_bytes(buffer[22..24].try_into().unwrap()), 1);
        assert_eq!(
            u32::from_le_bytes(buffer[24..28].try_into().unwrap()),
            44_100
        );
        // byte rate and block align for mono 16-bit
        assert_eq!(
            u32::from_le_bytes(buffer[28..32].try_into().unwrap()),
            88_200
        );
        assert_eq!(u16::from_le_bytes(buffer[32..34].try_into().unwrap()), 2);
        assert_eq!(&buffer[36..40], b"data");
        assert_eq!(u32::from_le_bytes(buffer[40..44].try_into().unwrap()), 4);
        assert_eq!(&buffer[44..48], &[0x11, 0x22, 0x33, 0x44]);
        // RIFF size covers everything after the first 8 bytes
        assert_eq!(
            u32::from_le_bytes(buffer[4..8].try_into().unwrap()) as usize,
            buffer.len() - 8
        );
        Ok(())
    }

    #[test]
    fn format_is_locked_after_data() {
        let mut writer = WavWriter::new(Cursor::new(Vec::new()));
        writer.write_header().unwrap();
        writer.write_data(&[0; 2]).unwrap();
        assert!(writer.configure_audio_format(48_000, 2, 24).is_err());
    }
}
