use std::sync::RwLock;

use super::{LogError, RecordLog};
use crate::models::Record;

/// Log held entirely in process memory. Starts empty and is lost on exit.
#[derive(Debug, Default)]
pub struct MemoryLog {
    records: RwLock<Vec<Record>>,
}

impl MemoryLog {
    pub fn new() -> Self {
        MemoryLog {
            records: RwLock::new(vec![]),
        }
    }

    #[cfg(test)]
    fn len(&self) -> Result<usize, LogError> {
        let records = self.records.read().map_err(|_| LogError::Poisoned)?;
        Ok(records.len())
    }
}

impl RecordLog for MemoryLog {
    fn append(&self, mut record: Record) -> Result<u64, LogError> {
        // offset assignment and push happen under the same write guard
        let mut records = self.records.write().map_err(|_| LogError::Poisoned)?;
        let offset = records.len() as u64;
        record.offset = Some(offset);
        records.push(record);

        tracing::debug!(offset, "appended record");
        Ok(offset)
    }

    fn read(&self, offset: u64) -> Result<Record, LogError> {
        let records = self.records.read().map_err(|_| LogError::Poisoned)?;
        usize::try_from(offset)
            .ok()
            .and_then(|index| records.get(index))
            .cloned()
            .ok_or(LogError::OffsetNotFound(offset))
    }
}
