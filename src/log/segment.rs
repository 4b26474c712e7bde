use prost::{DecodeError, EncodeError, Message};
use std::{path::PathBuf, sync::Arc};
use thiserror::Error;

use super::index::{Index, IndexError};
use super::store::{Store, StoreError};
use super::Config;
use crate::models::Record;

#[derive(Error, Debug)]
pub enum SegmentError {
    #[error("Path {0} is not a directory")]
    SegmentPathNotADirectory(PathBuf),

    /// Not enough room left in the store or the index; hands the record back.
    #[error("segment full")]
    Full(Box<Record>),

    #[error("offset {0} is outside the segment")]
    OffsetOutOfRange(u64),

    #[error(transparent)]
    IndexErrors(#[from] IndexError),

    #[error(transparent)]
    StoreErrors(#[from] StoreError),

    #[error(transparent)]
    DecodeError(#[from] DecodeError),

    #[error(transparent)]
    EncodeError(#[from] EncodeError),
}

/// A store file and its index, covering offsets `base_offset..next_offset`.
pub struct Segment {
    pub store: Store,
    pub index: Index,
    pub base_offset: u64,
    pub next_offset: u64,
}

impl Segment {
    pub fn open(dir: PathBuf, base_offset: u64, config: Arc<Config>) -> Result<Segment, SegmentError> {
        if !dir.is_dir() {
            return Err(SegmentError::SegmentPathNotADirectory(dir));
        }

        let store = Store::open(dir.join("store"), config.clone())?;
        let mut index = Index::open(dir.join("index"), config)?;
        if store.size == 0 {
            index.clear();
        }

        let next_offset = index
            .read_last_entry()
            .map(|e| base_offset + e.record_offset as u64 + 1)
            .unwrap_or(base_offset);

        Ok(Segment {
            store,
            index,
            base_offset,
            next_offset,
        })
    }

    pub fn append(&mut self, mut record: Record) -> Result<u64, SegmentError> {
        let record_offset = self.next_offset;
        record.offset = Some(record_offset);

        let record_buf = record.encode_to_vec();
        if !self.store.can_store_record(record_buf.len()) || !self.index.has_room() {
            return Err(SegmentError::Full(Box::new(record)));
        }

        let (_, position) = self.store.append(&record_buf)?;

        // index offsets are relative to the base offset
        let index_offset = (record_offset - self.base_offset) as u32;
        self.index.write(index_offset, position)?;

        self.next_offset += 1;
        Ok(record_offset)
    }

    pub fn read(&self, offset: u64) -> Result<Record, SegmentError> {
        if offset < self.base_offset || offset >= self.next_offset {
            return Err(SegmentError::OffsetOutOfRange(offset));
        }

        let entry = self
            .index
            .read(offset - self.base_offset)
            .ok_or(SegmentError::OffsetOutOfRange(offset))?;
        let buf = self.store.read(entry.position)?;
        Ok(Record::decode(&buf[..])?)
    }

    pub fn is_empty(&self) -> bool {
        self.next_offset == self.base_offset
    }

    pub fn is_maxed(&self) -> bool {
        self.store.is_full() || !self.index.has_room()
    }

    pub fn close(&mut self) -> Result<(), SegmentError> {
        self.store.sync()?;
        self.index.close()?;
        Ok(())
    }
}
