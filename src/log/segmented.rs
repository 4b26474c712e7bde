use std::{
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
};

use super::segment::{Segment, SegmentError};
use super::{Config, LogError, RecordLog};
use crate::models::Record;

struct Segments {
    segments: Vec<Segment>,
    active_segment: usize,
}

/// Durable log split into segment directories named by their base offset.
///
/// ```text
/// <dir>/0/store   <dir>/0/index
/// <dir>/912/store <dir>/912/index
/// ```
pub struct SegmentedLog {
    dir: PathBuf,
    config: Arc<Config>,
    inner: RwLock<Segments>,
}

impl SegmentedLog {
    pub fn open(dir: impl Into<PathBuf>, config: Config) -> Result<Self, LogError> {
        let dir = dir.into();
        if !dir.exists() {
            std::fs::create_dir_all(&dir)?;
        }
        let config = Arc::new(config);
        let segments = Self::setup(&dir, &config)?;

        Ok(SegmentedLog {
            dir,
            config,
            inner: RwLock::new(segments),
        })
    }

    fn setup(dir: &Path, config: &Arc<Config>) -> Result<Segments, LogError> {
        let mut base_offsets: Vec<u64> = vec![];

        for entry in std::fs::read_dir(dir)? {
            let path = entry?.path();
            let base_offset = path
                .file_name()
                .and_then(|name| name.to_str())
                .filter(|_| path.is_dir())
                .ok_or_else(|| LogError::InvalidSegment(path.clone()))?
                .parse::<u64>()?;
            base_offsets.push(base_offset);
        }
        base_offsets.sort_unstable();

        let mut segments = Segments {
            segments: vec![],
            active_segment: 0,
        };
        for base_offset in base_offsets {
            segments.push(Self::new_segment(dir, base_offset, config)?);
        }
        if segments.segments.is_empty() {
            segments.push(Self::new_segment(dir, config.get_initial_offset(), config)?);
        }

        Ok(segments)
    }

    fn new_segment(dir: &Path, base_offset: u64, config: &Arc<Config>) -> Result<Segment, LogError> {
        let segment_dir = dir.join(base_offset.to_string());
        if !segment_dir.exists() {
            std::fs::create_dir(&segment_dir)?;
            tracing::info!(base_offset, dir = %segment_dir.display(), "created segment");
        }
        Ok(Segment::open(segment_dir, base_offset, config.clone())?)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn lowest_offset(&self) -> Result<u64, LogError> {
        let inner = self.inner.read().map_err(|_| LogError::Poisoned)?;
        Ok(inner
            .segments
            .first()
            .map(|segment| segment.base_offset)
            .unwrap_or_else(|| self.config.get_initial_offset()))
    }

    /// Offset of the newest record, or `None` while the log is empty.
    pub fn highest_offset(&self) -> Result<Option<u64>, LogError> {
        let inner = self.inner.read().map_err(|_| LogError::Poisoned)?;
        Ok(inner
            .segments
            .iter()
            .rev()
            .find(|segment| !segment.is_empty())
            .map(|segment| segment.next_offset - 1))
    }

    pub fn segment_count(&self) -> Result<usize, LogError> {
        let inner = self.inner.read().map_err(|_| LogError::Poisoned)?;
        Ok(inner.segments.len())
    }

    fn close(&self) -> Result<(), LogError> {
        let mut inner = self.inner.write().map_err(|_| LogError::Poisoned)?;
        for segment in &mut inner.segments {
            segment.close()?;
        }
        Ok(())
    }
}

impl Segments {
    fn push(&mut self, segment: Segment) {
        self.segments.push(segment);
        self.active_segment = self.segments.len() - 1;
    }

    fn active(&mut self) -> &mut Segment {
        &mut self.segments[self.active_segment]
    }
}

impl RecordLog for SegmentedLog {
    fn append(&self, record: Record) -> Result<u64, LogError> {
        let max = self.config.get_max_record_bytes();
        if record.value.len() > max {
            return Err(LogError::RecordTooLarge {
                size: record.value.len(),
                max,
            });
        }

        let mut inner = self.inner.write().map_err(|_| LogError::Poisoned)?;

        let offset = match inner.active().append(record) {
            Ok(offset) => offset,
            Err(SegmentError::Full(record)) => {
                let active = inner.active();
                if active.is_empty() {
                    // a fresh segment can't hold it either
                    return Err(LogError::RecordTooLarge {
                        size: record.value.len(),
                        max: self.config.get_max_store_bytes() as usize,
                    });
                }
                let next_offset = active.next_offset;
                inner.push(Self::new_segment(&self.dir, next_offset, &self.config)?);
                match inner.active().append(*record) {
                    Err(SegmentError::Full(record)) => {
                        return Err(LogError::RecordTooLarge {
                            size: record.value.len(),
                            max: self.config.get_max_store_bytes() as usize,
                        })
                    }
                    res => res?,
                }
            }
            Err(e) => return Err(e.into()),
        };

        if inner.active().is_maxed() {
            inner.push(Self::new_segment(&self.dir, offset + 1, &self.config)?);
        }

        tracing::debug!(offset, "appended record");
        Ok(offset)
    }

    fn read(&self, offset: u64) -> Result<Record, LogError> {
        let inner = self.inner.read().map_err(|_| LogError::Poisoned)?;
        let segment = inner
            .segments
            .iter()
            .find(|segment| segment.base_offset <= offset && offset < segment.next_offset)
            .ok_or(LogError::OffsetNotFound(offset))?;
        Ok(segment.read(offset)?)
    }
}

impl Drop for SegmentedLog {
    fn drop(&mut self) {
        if let Err(e) = self.close() {
            tracing::warn!(dir = %self.dir.display(), error = %e, "failed to close log");
        }
    }
}
