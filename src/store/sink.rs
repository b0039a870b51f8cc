//! Session record sinks

use std::fs::{File, OpenOptions};
use std::io::{BufWriter, Write};
use std::path::Path;

use tracing::info;

use super::{SessionRecord, StoreError};

/// Destination for session records. Called only from the writer task.
pub trait SessionSink: Send + 'static {
    fn write(&mut self, record: &SessionRecord) -> Result<(), StoreError>;

    fn flush(&mut self) -> Result<(), StoreError> {
        Ok(())
    }
}

/// Emits each record as a structured log line
#[derive(Debug, Default)]
pub struct LogSink;

impl SessionSink for LogSink {
    fn write(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        let json = serde_json::to_string(record)?;
        info!(kind = record.kind(), record = %json, "Session record");
        Ok(())
    }
}

/// Appends one JSON document per line to a file
#[derive(Debug)]
pub struct JsonlSink {
    writer: BufWriter<File>,
}

impl JsonlSink {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        Ok(Self {
            writer: BufWriter::new(file),
        })
    }
}

impl SessionSink for JsonlSink {
    fn write(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
        serde_json::to_writer(&mut self.writer, record)?;
        self.writer.write_all(b"\n")?;
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        self.writer.flush()?;
        Ok(())
    }
}
