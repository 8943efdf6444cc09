use std::sync::{Arc, Mutex};

use thiserror::Error;

use crate::models::Entry;

#[derive(Error, Debug)]
pub enum SinkError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("serialization error: {0}")]
    Serialize(#[from] serde_json::Error),
}

/// A strictly append-only stream of fact records.
///
/// Implementations must not reorder and must not deduplicate records.
pub trait FactSink {
    fn emit(&mut self, entry: Entry) -> Result<(), SinkError>;
}

/// An in-memory sink that records everything it receives, for tests and
/// drivers that post-process the stream.
///
/// Cloning yields another handle onto the same record buffer, so a test can
/// keep one handle while the emitter owns the other.
#[derive(Debug, Default, Clone)]
pub struct VecSink {
    entries: Arc<Mutex<Vec<Entry>>>,
}

impl VecSink {
    pub fn new() -> Self {
        Self::default()
    }

    /// A snapshot of the records emitted so far.
    pub fn entries(&self) -> Vec<Entry> {
        self.entries.lock().expect("sink poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.entries.lock().expect("sink poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl FactSink for VecSink {
    fn emit(&mut self, entry: Entry) -> Result<(), SinkError> {
        self.entries.lock().expect("sink poisoned").push(entry);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::VName;

    #[test]
    fn handles_share_the_buffer() {
        let sink = VecSink::new();
        let mut writer = sink.clone();
        writer
            .emit(Entry::node_fact(
                VName::for_language("c++"),
                "/kythe/node/kind",
                "file",
            ))
            .unwrap();
        assert_eq!(sink.len(), 1);
        assert_eq!(sink.entries()[0].fact_value, "file");
    }
}
