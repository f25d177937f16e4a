//! In-memory collaborators: sources, sinks, instrumentation and memory probes.

use crate::record::Tuple;
use crate::router::{OutputRecord, Sink};
use crate::sampler::{Instrumentation, MemoryProbe, ProgressEvent};
use crate::source::TupleSource;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// A vector-backed [`TupleSource`] that counts how often it hands out a tuple.
///
/// # Example
///
/// ```
/// use ironreduce::source::TupleSource;
/// use ironreduce::testing::{MemorySource, words_tuples};
///
/// let mut source = MemorySource::new(words_tuples());
/// let pulls = source.pull_counter();
/// source.pull().unwrap();
/// assert_eq!(pulls.load(std::sync::atomic::Ordering::SeqCst), 1);
/// ```
pub struct MemorySource {
    rows: VecDeque<Tuple>,
    pulls: Arc<AtomicUsize>,
    fail_after: Option<usize>,
}

impl MemorySource {
    #[must_use]
    pub fn new(rows: Vec<Tuple>) -> Self {
        Self {
            rows: rows.into(),
            pulls: Arc::new(AtomicUsize::new(0)),
            fail_after: None,
        }
    }

    /// Fail the pull that follows the first `n` tuples.
    #[must_use]
    pub fn fail_after(mut self, n: usize) -> Self {
        self.fail_after = Some(n);
        self
    }

    /// Shared handle on the number of tuples handed out so far.
    #[must_use]
    pub fn pull_counter(&self) -> Arc<AtomicUsize> {
        Arc::clone(&self.pulls)
    }

    /// Tuples not pulled yet.
    #[must_use]
    pub fn remaining(&self) -> usize {
        self.rows.len()
    }
}

impl TupleSource for MemorySource {
    fn pull(&mut self) -> anyhow::Result<Option<Tuple>> {
        if self.fail_after == Some(self.pulls.load(Ordering::SeqCst)) {
            anyhow::bail!("source failed after {} tuples", self.pulls.load(Ordering::SeqCst));
        }
        let next = self.rows.pop_front();
        if next.is_some() {
            self.pulls.fetch_add(1, Ordering::SeqCst);
        }
        Ok(next)
    }
}

/// A [`Sink`] that keeps every record. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct CollectingSink {
    records: Arc<Mutex<Vec<OutputRecord>>>,
}

impl CollectingSink {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Copy of everything accepted so far.
    ///
    /// # Panics
    ///
    /// Panics if the buffer's lock is poisoned.
    #[must_use]
    pub fn records(&self) -> Vec<OutputRecord> {
        self.records.lock().unwrap().clone()
    }

    /// # Panics
    ///
    /// Panics if the buffer's lock is poisoned.
    #[must_use]
    pub fn len(&self) -> usize {
        self.records.lock().unwrap().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Records accepted under `label`.
    #[must_use]
    pub fn with_label(&self, label: &str) -> Vec<OutputRecord> {
        self.records()
            .into_iter()
            .filter(|r| r.label == label)
            .collect()
    }
}

impl Sink for CollectingSink {
    fn accept(&mut self, record: OutputRecord) -> anyhow::Result<()> {
        self.records.lock().unwrap().push(record);
        Ok(())
    }
}

/// A [`Sink`] that rejects every record.
#[derive(Clone, Debug)]
pub struct FailingSink {
    message: String,
}

impl FailingSink {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl Sink for FailingSink {
    fn accept(&mut self, _record: OutputRecord) -> anyhow::Result<()> {
        anyhow::bail!("{}", self.message)
    }
}

/// Instrumentation sink that keeps every event. Clones share the same buffer.
#[derive(Clone, Default)]
pub struct RecordingInstrumentation {
    events: Arc<Mutex<Vec<ProgressEvent>>>,
}

impl RecordingInstrumentation {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// # Panics
    ///
    /// Panics if the buffer's lock is poisoned.
    #[must_use]
    pub fn events(&self) -> Vec<ProgressEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Value counts at which progress events fired, excluding the task-end event.
    #[must_use]
    pub fn fire_counts(&self) -> Vec<u64> {
        use crate::sampler::ProgressStage;
        self.events()
            .into_iter()
            .filter(|e| e.stage == ProgressStage::Progress)
            .map(|e| e.values)
            .collect()
    }
}

impl Instrumentation for RecordingInstrumentation {
    fn on_event(&mut self, event: &ProgressEvent) {
        self.events.lock().unwrap().push(*event);
    }
}

/// A [`MemoryProbe`] that reports whatever was last set. Clones share the reading.
#[derive(Clone, Default)]
pub struct FixedMemoryProbe {
    bytes: Arc<AtomicU64>,
}

impl FixedMemoryProbe {
    #[must_use]
    pub fn new(bytes: u64) -> Self {
        Self {
            bytes: Arc::new(AtomicU64::new(bytes)),
        }
    }

    pub fn set(&self, bytes: u64) {
        self.bytes.store(bytes, Ordering::SeqCst);
    }
}

impl MemoryProbe for FixedMemoryProbe {
    fn resident_bytes(&mut self) -> u64 {
        self.bytes.load(Ordering::SeqCst)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record::Field;

    #[test]
    fn memory_source_fails_on_request() {
        let mut s = MemorySource::new(vec![vec![Field::from(1)], vec![Field::from(2)]]).fail_after(1);
        assert!(s.pull().unwrap().is_some());
        assert!(s.pull().is_err());
        assert_eq!(s.remaining(), 1);
    }

    #[test]
    fn collecting_sink_clones_share_buffer() {
        let sink = CollectingSink::new();
        let mut writer = sink.clone();
        writer.accept(OutputRecord::new("a", vec![])).unwrap();
        writer.accept(OutputRecord::new("b", vec![])).unwrap();
        assert_eq!(sink.len(), 2);
        assert_eq!(sink.with_label("b").len(), 1);
    }

    #[test]
    fn failing_sink_reports_its_message() {
        let err = FailingSink::new("disk full")
            .accept(OutputRecord::new("a", vec![]))
            .unwrap_err();
        assert_eq!(err.to_string(), "disk full");
    }
}
