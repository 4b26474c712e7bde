use byteorder::{BigEndian, ByteOrder, WriteBytesExt};
use std::{
    fs::{File, OpenOptions},
    io::{BufWriter, Write},
    os::unix::fs::FileExt,
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;

use super::{Config, LEN_WIDTH};

#[derive(Error, Debug)]
pub enum StoreError {
    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Append-only file of `[u64 length][payload]` frames.
pub struct Store {
    file: File,
    pub size: u64,
    pub path: PathBuf,
    config: Arc<Config>,
}

impl Store {
    pub fn open(path: PathBuf, config: Arc<Config>) -> Result<Store, StoreError> {
        let file = OpenOptions::new()
            .read(true)
            .create(true)
            .append(true)
            .open(&path)?;
        let size = file.metadata()?.len();
        Ok(Self {
            file,
            size,
            path,
            config,
        })
    }

    pub fn can_store_record(&self, record_len: usize) -> bool {
        self.size + (record_len as u64 + LEN_WIDTH as u64) <= self.config.get_max_store_bytes()
    }

    pub fn is_full(&self) -> bool {
        !self.can_store_record(0)
    }

    /// Returns the number of bytes written and the position the frame starts at.
    pub fn append(&mut self, value: &[u8]) -> Result<(u64, u64), StoreError> {
        let position = self.size;
        if let Err(e) = self.write_frame(value) {
            self.discard_from(position);
            return Err(e);
        }

        let total_written = value.len() as u64 + LEN_WIDTH as u64;
        self.size += total_written;
        Ok((total_written, position))
    }

    fn write_frame(&mut self, value: &[u8]) -> Result<(), StoreError> {
        let mut buffer = BufWriter::new(&mut self.file);
        buffer.write_u64::<BigEndian>(value.len() as u64)?;
        buffer.write_all(value)?;
        buffer.flush()?;
        Ok(())
    }

    /// Drops whatever part of a failed frame reached the file, so `size`
    /// matches where the next frame will land.
    fn discard_from(&mut self, position: u64) {
        if let Err(e) = self.file.set_len(position) {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to drop torn frame");
            if let Ok(meta) = self.file.metadata() {
                self.size = meta.len();
            }
        }
    }

    pub fn read(&self, position: u64) -> Result<Vec<u8>, StoreError> {
        let mut len_buf = [0u8; LEN_WIDTH as usize];
        self.file.read_exact_at(&mut len_buf, position)?;
        let len_of_record = BigEndian::read_u64(&len_buf);

        let mut record = vec![0; len_of_record as usize];
        self.file
            .read_exact_at(&mut record, position + LEN_WIDTH as u64)?;
        Ok(record)
    }

    pub fn sync(&self) -> Result<(), StoreError> {
        self.file.sync_data()?;
        Ok(())
    }
}
