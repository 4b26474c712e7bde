use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;

use crate::log::{self, ConfigBuilder, LogError, MemoryLog, RecordLog, SegmentedLog};

#[derive(Parser, Clone, Debug)]
#[command(name = "httplog", about = "Append-only record log over HTTP")]
pub struct Cli {
    /// Address to listen on
    #[arg(long, default_value = "127.0.0.1:8080", env = "HTTPLOG_ADDR")]
    pub addr: String,

    /// Keep records in segment files under this directory instead of memory
    #[arg(long, env = "HTTPLOG_DATA_DIR")]
    pub data_dir: Option<PathBuf>,

    /// Capacity of one segment's store file
    #[arg(long, default_value_t = 1024 * 1024, env = "HTTPLOG_MAX_STORE_BYTES")]
    pub max_store_bytes: u64,

    /// Capacity of one segment's index file
    #[arg(long, default_value_t = 1024 * 1024, env = "HTTPLOG_MAX_INDEX_BYTES")]
    pub max_index_bytes: u64,

    /// Largest record payload accepted by the segmented log
    #[arg(long, default_value_t = 64 * 1024, env = "HTTPLOG_MAX_RECORD_BYTES")]
    pub max_record_bytes: usize,

    /// Largest request body accepted
    #[arg(long, default_value_t = 256 * 1024, env = "HTTPLOG_MAX_BODY_BYTES")]
    pub max_body_bytes: usize,

    /// Number of HTTP worker threads
    #[arg(long, env = "HTTPLOG_WORKERS")]
    pub workers: Option<usize>,
}

impl Cli {
    pub fn segment_config(&self) -> Result<log::Config, LogError> {
        ConfigBuilder::new(self.max_index_bytes, self.max_store_bytes, 0)
            .with_max_record_bytes(self.max_record_bytes)
            .build()
    }

    /// Opens the log the flags describe: segmented when a data directory is
    /// set, in memory otherwise.
    pub fn open_log(&self) -> Result<Arc<dyn RecordLog>, LogError> {
        let Some(dir) = &self.data_dir else {
            tracing::info!("using in-memory log");
            return Ok(Arc::new(MemoryLog::new()));
        };

        let log = SegmentedLog::open(dir, self.segment_config()?)?;
        let highest_offset = log.highest_offset()?;
        tracing::info!(
            dir = %log.dir().display(),
            segments = log.segment_count()?,
            lowest_offset = log.lowest_offset()?,
            ?highest_offset,
            "opened segmented log"
        );
        Ok(Arc::new(log))
    }
}
