//! Session history storage.
//!
//! Rooms hand records to a [`SessionRecorder`], which only pushes them onto
//! an unbounded channel. A blocking writer task drains the channel into a
//! [`SessionSink`], so a slow disk never stalls a tick.

pub mod records;
pub mod sink;

pub use records::SessionRecord;
pub use sink::{JsonlSink, LogSink, SessionSink};

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Storage errors
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Cheap, cloneable handle for submitting session records
#[derive(Clone, Debug)]
pub struct SessionRecorder {
    tx: mpsc::UnboundedSender<SessionRecord>,
}

impl SessionRecorder {
    /// Start the writer task. It exits once every recorder clone is dropped.
    pub fn spawn(mut sink: Box<dyn SessionSink>) -> (Self, JoinHandle<()>) {
        let (tx, mut rx) = mpsc::unbounded_channel::<SessionRecord>();

        let writer = tokio::task::spawn_blocking(move || {
            let mut written = 0u64;
            while let Some(record) = rx.blocking_recv() {
                match sink.write(&record) {
                    Ok(()) => written += 1,
                    Err(e) => warn!(error = %e, kind = record.kind(), "Failed to store session record"),
                }
            }
            if let Err(e) = sink.flush() {
                warn!(error = %e, "Failed to flush session sink");
            }
            info!(written, "Session writer stopped");
        });

        (Self { tx }, writer)
    }

    /// Queue a record; never blocks
    pub fn record(&self, record: SessionRecord) {
        if self.tx.send(record).is_err() {
            debug!("Session writer gone, dropping record");
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::{Arc, Mutex};

    use super::*;
    use crate::game::{CombatStats, CombatantId};
    use crate::room::LeaveReason;
    use uuid::Uuid;

    #[derive(Clone, Default)]
    struct MemorySink {
        records: Arc<Mutex<Vec<String>>>,
    }

    impl SessionSink for MemorySink {
        fn write(&mut self, record: &SessionRecord) -> Result<(), StoreError> {
            self.records.lock().unwrap().push(record.kind().to_string());
            Ok(())
        }
    }

    struct FailingSink;

    impl SessionSink for FailingSink {
        fn write(&mut self, _record: &SessionRecord) -> Result<(), StoreError> {
            Err(std::io::Error::new(std::io::ErrorKind::Other, "disk full").into())
        }
    }

    fn ended(room_id: Uuid) -> SessionRecord {
        SessionRecord::session_ended(
            room_id,
            CombatantId(4),
            "ace",
            LeaveReason::Disconnected,
            CombatStats::default(),
        )
    }

    #[tokio::test]
    async fn records_reach_the_sink_in_order() {
        let sink = MemorySink::default();
        let seen = sink.records.clone();
        let (recorder, writer) = SessionRecorder::spawn(Box::new(sink));

        let room_id = Uuid::new_v4();
        recorder.record(SessionRecord::session_started(room_id, CombatantId(4), "ace", None));
        recorder.record(ended(room_id));
        drop(recorder);
        tokio_test::assert_ok!(writer.await);

        assert_eq!(*seen.lock().unwrap(), vec!["session_started", "session_ended"]);
    }

    #[tokio::test]
    async fn sink_failures_are_swallowed() {
        let (recorder, writer) = SessionRecorder::spawn(Box::new(FailingSink));
        recorder.record(ended(Uuid::new_v4()));
        drop(recorder);
        tokio_test::assert_ok!(writer.await);
    }
}
