use byteorder::{BigEndian, ByteOrder};
use memmap2::MmapMut;
use std::{
    fs::{File, OpenOptions},
    path::PathBuf,
    sync::Arc,
};
use thiserror::Error;

use super::{Config, INDEX_ENTRY_LENGTH, INDEX_RECORD_OFFSET_LENGTH, POSITION_IN_STORE_FILE_LENGTH};

#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct IndexEntry {
    /// Offset relative to the owning segment's base offset.
    pub record_offset: u32,
    /// Byte position of the record's frame in the store file.
    pub position: u64,
}

#[derive(Error, Debug)]
pub enum IndexError {
    #[error("Index is full")]
    IndexFullError,

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

/// Memory-mapped table of `[u32 relative offset][u64 store position]` entries.
///
/// The file is grown to its maximum size while open so the map never has to
/// be remapped, and is truncated back to the used size by [`Index::close`].
#[derive(Debug)]
pub struct Index {
    file: File,
    pub size: u64,
    mmap: MmapMut,
    pub path: PathBuf,
}

impl Index {
    pub fn open(file_path: PathBuf, config: Arc<Config>) -> Result<Self, IndexError> {
        let file = OpenOptions::new()
            .read(true)
            .write(true)
            .create(true)
            .truncate(false)
            .open(&file_path)?;

        let file_len = file.metadata()?.len();
        let entry_len = INDEX_ENTRY_LENGTH as u64;
        let map_len = config.get_max_index_bytes().max(file_len);

        file.set_len(map_len)?;
        let mmap = unsafe { MmapMut::map_mut(&file)? };

        let mut index = Self {
            file,
            size: file_len - file_len % entry_len,
            mmap,
            path: file_path,
        };

        // a file still at full length was not closed cleanly
        if file_len > 0 && file_len == map_len {
            let used = index.scan_used_size();
            if used != index.size {
                tracing::warn!(
                    path = %index.path.display(),
                    entries = used / entry_len,
                    "recovered index that was not closed"
                );
                index.size = used;
            }
        }

        Ok(index)
    }

    /// Counts entries up to the first blank slot. Entry 0 is always `(0, 0)`,
    /// so it is only known to be used when a later one is.
    fn scan_used_size(&self) -> u64 {
        let entry_len = INDEX_ENTRY_LENGTH as usize;
        let capacity = self.mmap.len() / entry_len;
        let used = (1..capacity)
            .find(|&i| {
                self.mmap[i * entry_len..(i + 1) * entry_len]
                    .iter()
                    .all(|b| *b == 0)
            })
            .unwrap_or(capacity);
        (used * entry_len) as u64
    }

    pub fn close(&mut self) -> Result<(), IndexError> {
        self.mmap.flush()?;
        self.file.set_len(self.size)?;
        self.file.sync_all()?;
        Ok(())
    }

    /// Forgets every entry. Used when the matching store turns out to be empty.
    pub fn clear(&mut self) {
        self.size = 0;
    }

    pub fn has_room(&self) -> bool {
        self.size + INDEX_ENTRY_LENGTH as u64 <= self.mmap.len() as u64
    }

    pub fn entries(&self) -> u64 {
        self.size / INDEX_ENTRY_LENGTH as u64
    }

    pub fn read_last_entry(&self) -> Option<IndexEntry> {
        match self.entries() {
            0 => None,
            n => self.read(n - 1),
        }
    }

    pub fn read(&self, index_position: u64) -> Option<IndexEntry> {
        let start = index_position.checked_mul(INDEX_ENTRY_LENGTH as u64)?;
        if start >= self.size {
            return None;
        }

        let start = start as usize;
        let mid = start + INDEX_RECORD_OFFSET_LENGTH as usize;
        let end = mid + POSITION_IN_STORE_FILE_LENGTH as usize;

        Some(IndexEntry {
            record_offset: BigEndian::read_u32(&self.mmap[start..mid]),
            position: BigEndian::read_u64(&self.mmap[mid..end]),
        })
    }

    pub fn write(&mut self, record_offset: u32, position: u64) -> Result<(), IndexError> {
        if !self.has_room() {
            return Err(IndexError::IndexFullError);
        }

        let start = self.size as usize;
        let mid = start + INDEX_RECORD_OFFSET_LENGTH as usize;
        let end = mid + POSITION_IN_STORE_FILE_LENGTH as usize;

        BigEndian::write_u32(&mut self.mmap[start..mid], record_offset);
        BigEndian::write_u64(&mut self.mmap[mid..end], position);

        self.size += INDEX_ENTRY_LENGTH as u64;
        Ok(())
    }
}

impl Drop for Index {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(path = %self.path.display(), error = %e, "failed to close index");
        }
    }
}
