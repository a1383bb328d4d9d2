use std::fs::File;
use std::io::{self, BufReader, Read};
use std::path::Path;

use anyhow::Result;

/// Input source for the commands: a file path or stdin via "-".
pub struct InputReader {
    reader: Box<dyn Read + Send>,
    length: Option<u64>,
}

impl InputReader {
    pub fn new<P: AsRef<Path>>(input_path: P) -> Result<Self> {
        let path = input_path.as_ref();
        if path.to_string_lossy() == "-" {
            return Ok(Self {
                reader: Box::new(io::stdin()),
                length: None,
            });
        }
        let file = File::open(path)?;
        let length = file.metadata().ok().map(|m| m.len());
        Ok(Self {
            reader: Box::new(BufReader::new(file)),
            length,
        })
    }

    /// Total input size when known (files, not pipes); used for progress.
    pub fn len_hint(&self) -> Option<u64> {
        self.length
    }

    pub fn read_chunk(&mut self, buffer: &mut [u8]) -> Result<usize> {
        Ok(self.reader.read(buffer)?)
    }

    /// Feeds the whole input through `callback` in chunks of `chunk_size`
    /// bytes. The callback returns false to stop early.
    pub fn process_chunks<F>(&mut self, chunk_size: usize, mut callback: F) -> Result<()>
    where
        F: FnMut(&[u8]) -> Result<bool>,
    {
        let mut buffer = vec![0u8; chunk_size];
        loop {
            let n = self.read_chunk(&mut buffer)?;
            if n == 0 {
                break;
            }
            if !callback(&buffer[..n])? {
                break;
            }
        }
        Ok(())
    }
}
