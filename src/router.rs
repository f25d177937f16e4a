//! Output routing: final labeled output versus pipelined, re-partitioned output.
//!
//! - Final form: the record's fields verbatim, tagged with the requested label.
//! - Pipelined form: `[partition?][key fields][value fields]`, where the leading
//!   partition index is present only when a partitioner is configured.
//! - Inner framing, when enabled, wraps either form for a chained stage as
//!   `[label][offset][payload padded to the stage width]` under
//!   [`INNER_OUTPUT_LABEL`].

use crate::error::{DEFAULT_LABEL, INNER_OUTPUT_LABEL, ReduceError, ReduceResult};
use crate::record::{Field, Record};
use serde::{Deserialize, Serialize};

/// A routed record handed to the sink.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputRecord {
    pub label: String,
    pub fields: Vec<Field>,
}

impl OutputRecord {
    pub fn new(label: impl Into<String>, fields: Vec<Field>) -> Self {
        Self {
            label: label.into(),
            fields,
        }
    }
}

/// Assigns a pipelined record to one of `total` downstream partitions.
///
/// Must return a value in `[0, total)`; anything else aborts the task.
pub trait Partitioner: Send {
    fn partition(&mut self, key: &Record, value: &Record, total: u32) -> i64;
}

impl<F> Partitioner for F
where
    F: FnMut(&Record, &Record, u32) -> i64 + Send,
{
    fn partition(&mut self, key: &Record, value: &Record, total: u32) -> i64 {
        self(key, value, total)
    }
}

/// Hash of the key fields modulo `total`.
#[derive(Clone, Copy, Debug, Default)]
pub struct HashPartitioner;

impl Partitioner for HashPartitioner {
    fn partition(&mut self, key: &Record, _value: &Record, total: u32) -> i64 {
        use std::collections::hash_map::DefaultHasher;
        use std::hash::{Hash, Hasher};

        let mut h = DefaultHasher::new();
        key.fields().hash(&mut h);
        i64::try_from(h.finish() % u64::from(total.max(1))).unwrap_or(0)
    }
}

/// Destination for routed records. Errors are fatal for the task.
pub trait Sink: Send {
    /// # Errors
    ///
    /// Any failure to accept the record.
    fn accept(&mut self, record: OutputRecord) -> anyhow::Result<()>;
}

impl<F> Sink for F
where
    F: FnMut(OutputRecord) -> anyhow::Result<()> + Send,
{
    fn accept(&mut self, record: OutputRecord) -> anyhow::Result<()> {
        self(record)
    }
}

/// Positional layout of inner-framed rows.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct InnerFraming {
    /// Where the wrapped downstream payload begins.
    pub offset: usize,
    /// Total payload width.
    pub width: usize,
}

impl InnerFraming {
    fn frame(&self, payload: Vec<Field>, wrapped: bool, label: &str) -> ReduceResult<OutputRecord> {
        let Some(wrapped_slot) = self.width.checked_sub(self.offset) else {
            return Err(ReduceError::config(format!(
                "inner framing offset {} exceeds its width {}",
                self.offset, self.width
            )));
        };
        let (start, slot) = if wrapped {
            (self.offset, wrapped_slot)
        } else {
            (0, self.offset)
        };
        if payload.len() > slot {
            return Err(ReduceError::FramedPayloadTooWide {
                slot,
                actual: payload.len(),
            });
        }
        let mut fields = Vec::with_capacity(2 + self.width);
        fields.push(Field::String(label.to_string()));
        fields.push(Field::Bigint(i64::try_from(start).unwrap_or(i64::MAX)));
        fields.resize(2 + start, Field::Null);
        fields.extend(payload);
        fields.resize(2 + self.width, Field::Null);
        Ok(OutputRecord::new(INNER_OUTPUT_LABEL, fields))
    }
}

/// Formats records for the sink.
pub struct OutputRouter {
    partitioner: Option<Box<dyn Partitioner>>,
    total_partitions: u32,
    inner: Option<InnerFraming>,
}

impl OutputRouter {
    #[must_use]
    pub fn new(
        partitioner: Option<Box<dyn Partitioner>>,
        total_partitions: u32,
        inner: Option<InnerFraming>,
    ) -> Self {
        Self {
            partitioner,
            total_partitions,
            inner,
        }
    }

    /// Route a labeled record to final output.
    ///
    /// # Errors
    ///
    /// Only under inner framing: [`ReduceError::FramedPayloadTooWide`] if the
    /// record is wider than the wrapped slot.
    pub fn route_final(&self, record: &Record, label: &str) -> ReduceResult<OutputRecord> {
        let fields = record.fields().to_vec();
        match &self.inner {
            Some(framing) => framing.frame(fields, true, label),
            None => Ok(OutputRecord::new(label, fields)),
        }
    }

    /// Route a key/value pair to the next stage.
    ///
    /// # Errors
    ///
    /// [`ReduceError::InvalidPartition`] if the partitioner answers outside
    /// `[0, total_partitions)`; nothing is produced in that case.
    pub fn route_pipelined(&mut self, key: &Record, value: &Record) -> ReduceResult<OutputRecord> {
        let mut fields = Vec::with_capacity(1 + key.column_count() + value.column_count());
        if let Some(partitioner) = self.partitioner.as_mut() {
            let part = partitioner.partition(key, value, self.total_partitions);
            if part < 0 || part >= i64::from(self.total_partitions) {
                return Err(ReduceError::InvalidPartition {
                    partition: part,
                    total: self.total_partitions,
                });
            }
            fields.push(Field::Bigint(part));
        }
        fields.extend_from_slice(key.fields());
        fields.extend_from_slice(value.fields());
        match &self.inner {
            Some(framing) => framing.frame(fields, false, DEFAULT_LABEL),
            None => Ok(OutputRecord::new(DEFAULT_LABEL, fields)),
        }
    }
}
