mod index;
mod memory;
mod segment;
mod segmented;
mod store;

use std::num::ParseIntError;
use std::path::PathBuf;

use thiserror::Error;

use crate::models::Record;

pub use index::{Index, IndexEntry, IndexError};
pub use memory::MemoryLog;
pub use segment::{Segment, SegmentError};
pub use segmented::SegmentedLog;
pub use store::{Store, StoreError};

pub const LEN_WIDTH: u8 = 8; // u64 length prefix of a store frame
pub const INDEX_RECORD_OFFSET_LENGTH: u8 = 4; // u32
pub const POSITION_IN_STORE_FILE_LENGTH: u8 = 8; // u64
pub const INDEX_ENTRY_LENGTH: u8 = INDEX_RECORD_OFFSET_LENGTH + POSITION_IN_STORE_FILE_LENGTH;

/// An append-only sequence of records addressed by offset.
///
/// Implementations are shared by every request worker, so both operations
/// take `&self` and do their own locking. `append` must assign offsets
/// densely in the order callers are serialized.
pub trait RecordLog: Send + Sync {
    fn append(&self, record: Record) -> Result<u64, LogError>;

    fn read(&self, offset: u64) -> Result<Record, LogError>;
}

#[derive(Error, Debug)]
pub enum LogError {
    #[error("offset {0} not found")]
    OffsetNotFound(u64),

    #[error("record of {size} bytes exceeds the {max} byte limit")]
    RecordTooLarge { size: usize, max: usize },

    #[error("invalid segment entry {0}")]
    InvalidSegment(PathBuf),

    #[error("invalid config: {0}")]
    InvalidConfig(String),

    #[error("log lock poisoned")]
    Poisoned,

    #[error(transparent)]
    ParseIntError(#[from] ParseIntError),

    #[error(transparent)]
    SegmentErrors(#[from] SegmentError),

    #[error(transparent)]
    IOError(#[from] std::io::Error),
}

#[derive(Clone, Debug)]
struct SegmentConfig {
    max_index_bytes: u64,
    max_store_bytes: u64,
    initial_offset: u64,
    max_record_bytes: usize,
}

/// Sizing of a [`SegmentedLog`].
#[derive(Clone, Debug)]
pub struct Config {
    segment: SegmentConfig,
}

impl Config {
    pub fn get_max_index_bytes(&self) -> u64 {
        self.segment.max_index_bytes
    }
    pub fn get_max_store_bytes(&self) -> u64 {
        self.segment.max_store_bytes
    }
    pub fn get_initial_offset(&self) -> u64 {
        self.segment.initial_offset
    }
    pub fn get_max_record_bytes(&self) -> usize {
        self.segment.max_record_bytes
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            segment: SegmentConfig {
                max_index_bytes: 1024 * 1024,
                max_store_bytes: 1024 * 1024,
                initial_offset: 0,
                max_record_bytes: 64 * 1024,
            },
        }
    }
}

pub struct ConfigBuilder {
    max_index_bytes: u64,
    max_store_bytes: u64,
    initial_offset: u64,
    max_record_bytes: usize,
}

impl ConfigBuilder {
    pub fn new(max_index_bytes: u64, max_store_bytes: u64, initial_offset: u64) -> Self {
        Self {
            max_index_bytes,
            max_store_bytes,
            initial_offset,
            max_record_bytes: Config::default().get_max_record_bytes(),
        }
    }

    pub fn with_max_record_bytes(mut self, max: usize) -> Self {
        self.max_record_bytes = max;
        self
    }

    pub fn build(self) -> Result<Config, LogError> {
        if self.max_index_bytes < INDEX_ENTRY_LENGTH as u64 {
            return Err(LogError::InvalidConfig(format!(
                "max index bytes must hold at least one {INDEX_ENTRY_LENGTH} byte entry"
            )));
        }
        if self.max_store_bytes <= LEN_WIDTH as u64 {
            return Err(LogError::InvalidConfig(format!(
                "max store bytes must exceed the {LEN_WIDTH} byte length prefix"
            )));
        }
        Ok(Config {
            segment: SegmentConfig {
                max_index_bytes: self.max_index_bytes,
                max_store_bytes: self.max_store_bytes,
                initial_offset: self.initial_offset,
                max_record_bytes: self.max_record_bytes,
            },
        })
    }
}
