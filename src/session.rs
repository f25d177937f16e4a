//! The reduce session: per-task orchestration of grouping, reduce logic and output.
//!
//! A session owns one [`GroupingCursor`] (and through it the upstream source and
//! the progress sampler) and one [`TaskOutput`] (the router and the sink). The two
//! halves are separate so reduce logic can read a group's values and write output
//! at the same time.
//!
//! ```
//! use ironreduce::*;
//! use ironreduce::testing::{words_config, words_tuples, CollectingSink};
//!
//! # fn main() -> anyhow::Result<()> {
//! let sink = CollectingSink::new();
//! let mut session = ReduceSession::builder(words_config())
//!     .source(words_tuples().into_iter())
//!     .sink(sink.clone())
//!     .build()?;
//!
//! let mut keys = Vec::new();
//! while session.advance_group()? {
//!     keys.push(session.current_key().unwrap().to_string());
//! }
//! assert_eq!(keys, vec!["(A)", "(B)"]);
//! # Ok(())
//! # }
//! ```

use crate::comparator::{GroupingComparator, resolve_comparator};
use crate::config::TaskConfig;
use crate::cursor::{CursorState, GroupingCursor, Values};
use crate::error::{DEFAULT_LABEL, ReduceError, ReduceResult};
use crate::metrics::{INPUT_KEY_COUNT, INPUT_VALUE_COUNT, MetricsCollector, output_counter};
use crate::record::Record;
use crate::router::{OutputRecord, OutputRouter, Partitioner, Sink};
use crate::sampler::{
    Instrumentation, LogInstrumentation, MemoryProbe, ProgressSampler, default_probe,
};
use crate::schema::Schema;
use crate::source::{InputChannel, InputCounters, TupleSource};
use std::collections::HashMap;
use std::sync::Arc;

/// Externally visible state of a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum SessionState {
    AwaitingGroup,
    InGroup,
    Terminal,
}

/// Write side of a session.
pub struct TaskOutput {
    router: OutputRouter,
    sink: Box<dyn Sink>,
    labels: HashMap<String, Option<Arc<Schema>>>,
    stage: Option<(Arc<Schema>, Arc<Schema>)>,
    metrics: Option<MetricsCollector>,
    written: u64,
}

impl TaskOutput {
    /// Write `record` under the default label.
    ///
    /// # Errors
    ///
    /// See [`TaskOutput::write_labeled`].
    pub fn write(&mut self, record: &Record) -> ReduceResult<()> {
        self.write_labeled(record, DEFAULT_LABEL)
    }

    /// Write `record` to final output under `label`.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnknownLabel`] if `label` was not declared; sink failures.
    pub fn write_labeled(&mut self, record: &Record, label: &str) -> ReduceResult<()> {
        if !self.labels.contains_key(label) {
            return Err(ReduceError::UnknownLabel(label.to_string()));
        }
        let out = self.router.route_final(record, label)?;
        self.emit(out, label)
    }

    /// Forward a key/value pair to the next stage, re-partitioned if a
    /// partitioner is configured.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnsupportedInPipelineTerminal`] when the session does not
    /// forward; [`ReduceError::InvalidPartition`]; sink failures.
    pub fn write_pair(&mut self, key: &Record, value: &Record) -> ReduceResult<()> {
        if self.stage.is_none() {
            return Err(ReduceError::UnsupportedInPipelineTerminal);
        }
        let out = self.router.route_pipelined(key, value)?;
        self.emit(out, DEFAULT_LABEL)
    }

    fn emit(&mut self, out: OutputRecord, label: &str) -> ReduceResult<()> {
        self.sink.accept(out).map_err(ReduceError::Sink)?;
        self.written += 1;
        if let Some(metrics) = &self.metrics {
            metrics.increment_counter(&output_counter(label), 1);
        }
        Ok(())
    }

    #[must_use]
    pub fn forwards(&self) -> bool {
        self.stage.is_some()
    }

    #[must_use]
    pub fn has_label(&self, label: &str) -> bool {
        self.labels.contains_key(label)
    }

    /// Number of records accepted by the sink.
    #[must_use]
    pub fn written(&self) -> u64 {
        self.written
    }

    /// An empty record with the declared schema of `label`.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnknownLabel`] for undeclared labels, [`ReduceError::Config`]
    /// if the label was declared without a schema.
    pub fn create_output_record(&self, label: &str) -> ReduceResult<Record> {
        match self.labels.get(label) {
            None => Err(ReduceError::UnknownLabel(label.to_string())),
            Some(None) => Err(ReduceError::config(format!(
                "output label '{label}' has no declared schema"
            ))),
            Some(Some(schema)) => Ok(Record::new(Arc::clone(schema))),
        }
    }

    /// An empty key record for the next stage.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnsupportedInPipelineTerminal`] when the session does not forward.
    pub fn create_output_key(&self) -> ReduceResult<Record> {
        self.stage
            .as_ref()
            .map(|(k, _)| Record::new(Arc::clone(k)))
            .ok_or(ReduceError::UnsupportedInPipelineTerminal)
    }

    /// An empty value record for the next stage.
    ///
    /// # Errors
    ///
    /// [`ReduceError::UnsupportedInPipelineTerminal`] when the session does not forward.
    pub fn create_output_value(&self) -> ReduceResult<Record> {
        self.stage
            .as_ref()
            .map(|(_, v)| Record::new(Arc::clone(v)))
            .ok_or(ReduceError::UnsupportedInPipelineTerminal)
    }
}

/// One reduce task's engine instance.
pub struct ReduceSession {
    cursor: GroupingCursor,
    output: TaskOutput,
}

impl ReduceSession {
    #[must_use]
    pub fn builder(config: TaskConfig) -> SessionBuilder {
        SessionBuilder::new(config)
    }

    /// Advance to the next group, draining whatever the caller left unread.
    /// Returns `false` when the upstream source is exhausted.
    ///
    /// # Errors
    ///
    /// Source failures and malformed tuples.
    pub fn advance_group(&mut self) -> ReduceResult<bool> {
        self.cursor.prime_or_reset()
    }

    #[must_use]
    pub fn state(&self) -> SessionState {
        match self.cursor.state() {
            CursorState::Unprimed => SessionState::AwaitingGroup,
            CursorState::InGroup => SessionState::InGroup,
            CursorState::Terminal => SessionState::Terminal,
        }
    }

    /// The shared key holder; `None` outside a group.
    #[must_use]
    pub fn current_key(&self) -> Option<&Record> {
        self.cursor.key()
    }

    /// Lazy, single-pass sequence over the current group's values. Empty
    /// outside a group or once the group has been fully read.
    pub fn values_of_current_group(&mut self) -> Values<'_> {
        self.cursor.values()
    }

    /// Current key, its values and the write side, borrowed together.
    pub fn group_mut(&mut self) -> Option<(&Record, Values<'_>, &mut TaskOutput)> {
        let output = &mut self.output;
        self.cursor.group().map(|(key, values)| (key, values, output))
    }

    /// # Errors
    ///
    /// See [`TaskOutput::write`].
    pub fn write(&mut self, record: &Record) -> ReduceResult<()> {
        self.output.write(record)
    }

    /// # Errors
    ///
    /// See [`TaskOutput::write_labeled`].
    pub fn write_labeled(&mut self, record: &Record, label: &str) -> ReduceResult<()> {
        self.output.write_labeled(record, label)
    }

    /// # Errors
    ///
    /// See [`TaskOutput::write_pair`].
    pub fn write_pair(&mut self, key: &Record, value: &Record) -> ReduceResult<()> {
        self.output.write_pair(key, value)
    }

    #[must_use]
    pub fn counters(&self) -> InputCounters {
        self.cursor.input().counters()
    }

    #[must_use]
    pub fn output(&self) -> &TaskOutput {
        &self.output
    }

    pub fn output_mut(&mut self) -> &mut TaskOutput {
        &mut self.output
    }

    /// True while a group is open and a pulled tuple of the following group
    /// is waiting in the lookahead slot.
    #[must_use]
    pub fn has_buffered_lookahead(&self) -> bool {
        self.cursor.state() == CursorState::InGroup && self.cursor.has_buffered_lookahead()
    }

    /// Emit the end-of-task sampler event and summarize the task.
    ///
    /// A tuple still buffered in the lookahead slot is dropped with a warning.
    pub fn finish(mut self) -> TaskSummary {
        if self.has_buffered_lookahead() {
            log::warn!("reduce session finished with an unread tuple buffered");
        }
        let counters = self.counters();
        let memory = self
            .cursor
            .input_mut()
            .sampler_mut()
            .finish(counters.keys, counters.values);
        if let Some(metrics) = &self.output.metrics {
            metrics.set_counter(INPUT_KEY_COUNT, counters.keys);
            metrics.set_counter(INPUT_VALUE_COUNT, counters.values);
        }
        TaskSummary {
            input_keys: counters.keys,
            input_values: counters.values,
            output_records: self.output.written,
            peak_memory: memory.peak_resident_bytes,
        }
    }
}

/// Totals reported when a session finishes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct TaskSummary {
    pub input_keys: u64,
    pub input_values: u64,
    pub output_records: u64,
    /// Highest resident memory reading seen during the task, in bytes.
    pub peak_memory: u64,
}

/// Assembles a [`ReduceSession`] from its configuration and collaborators.
pub struct SessionBuilder {
    config: TaskConfig,
    source: Option<Box<dyn TupleSource>>,
    sink: Option<Box<dyn Sink>>,
    grouping: Option<Arc<dyn GroupingComparator>>,
    sort: Option<Arc<dyn GroupingComparator>>,
    partitioner: Option<Box<dyn Partitioner>>,
    instrumentation: Option<Box<dyn Instrumentation>>,
    probe: Option<Box<dyn MemoryProbe>>,
    metrics: Option<MetricsCollector>,
}

impl SessionBuilder {
    #[must_use]
    pub fn new(config: TaskConfig) -> Self {
        Self {
            config,
            source: None,
            sink: None,
            grouping: None,
            sort: None,
            partitioner: None,
            instrumentation: None,
            probe: None,
            metrics: None,
        }
    }

    #[must_use]
    pub fn source(mut self, source: impl TupleSource + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    #[must_use]
    pub fn sink(mut self, sink: impl Sink + 'static) -> Self {
        self.sink = Some(Box::new(sink));
        self
    }

    /// Comparator that defines group boundaries.
    #[must_use]
    pub fn grouping_comparator(mut self, cmp: impl GroupingComparator + 'static) -> Self {
        self.grouping = Some(Arc::new(cmp));
        self
    }

    /// Sort comparator, reused for grouping when no grouping comparator is set.
    #[must_use]
    pub fn sort_comparator(mut self, cmp: impl GroupingComparator + 'static) -> Self {
        self.sort = Some(Arc::new(cmp));
        self
    }

    #[must_use]
    pub fn partitioner(mut self, partitioner: impl Partitioner + 'static) -> Self {
        self.partitioner = Some(Box::new(partitioner));
        self
    }

    /// Where progress events go. Defaults to [`LogInstrumentation`].
    #[must_use]
    pub fn instrumentation(mut self, sink: impl Instrumentation + 'static) -> Self {
        self.instrumentation = Some(Box::new(sink));
        self
    }

    #[must_use]
    pub fn memory_probe(mut self, probe: impl MemoryProbe + 'static) -> Self {
        self.probe = Some(Box::new(probe));
        self
    }

    /// Count output records per label into `metrics`.
    #[must_use]
    pub fn metrics(mut self, metrics: MetricsCollector) -> Self {
        self.metrics = Some(metrics);
        self
    }

    /// # Errors
    ///
    /// [`ReduceError::Config`] for an invalid configuration, a missing source or
    /// sink, or a partitioner on a session that does not forward;
    /// [`ReduceError::UnsupportedType`] if inner framing covers a column with no
    /// wire type.
    pub fn build(self) -> ReduceResult<ReduceSession> {
        let config = self.config;
        config.validate()?;
        let source = self
            .source
            .ok_or_else(|| ReduceError::config("no upstream source configured"))?;
        let sink = self
            .sink
            .ok_or_else(|| ReduceError::config("no output sink configured"))?;
        if self.partitioner.is_some() && !config.forwards() {
            return Err(ReduceError::config(
                "a partitioner is only allowed when the reducer feeds a further stage",
            ));
        }

        let comparator = resolve_comparator(
            self.grouping,
            self.sort,
            config.grouping_columns.as_deref(),
            &config.key_schema,
        )?;
        let framing = config.inner_framing(self.partitioner.is_some())?;

        let sampler = ProgressSampler::new(
            config.sampler,
            self.instrumentation
                .unwrap_or_else(|| Box::new(LogInstrumentation)),
            self.probe.unwrap_or_else(default_probe),
        );
        let input = InputChannel::new(source, config.tuple_width(), sampler);
        let cursor = GroupingCursor::new(
            input,
            comparator,
            Arc::new(config.key_schema.clone()),
            Arc::new(config.value_schema.clone()),
        );

        let labels = config
            .outputs
            .iter()
            .map(|o| (o.label.clone(), o.schema.clone().map(Arc::new)))
            .collect();
        let stage = config.stage.as_ref().map(|s| {
            (
                Arc::new(s.output_key_schema.clone()),
                Arc::new(s.output_value_schema.clone()),
            )
        });
        let output = TaskOutput {
            router: OutputRouter::new(self.partitioner, config.num_partitions, framing),
            sink,
            labels,
            stage,
            metrics: self.metrics,
            written: 0,
        };
        Ok(ReduceSession { cursor, output })
    }
}

/// User reduce logic.
///
/// `reduce` is called once per group with the shared key holder and a lazy
/// sequence over the group's values. Values left unread are skipped by the
/// session before the next call.
pub trait Reducer {
    /// # Errors
    ///
    /// Any error aborts the task.
    fn setup(&mut self, _ctx: &mut TaskOutput) -> anyhow::Result<()> {
        Ok(())
    }

    /// # Errors
    ///
    /// Any error aborts the task.
    fn reduce(
        &mut self,
        key: &Record,
        values: &mut Values<'_>,
        ctx: &mut TaskOutput,
    ) -> anyhow::Result<()>;

    /// # Errors
    ///
    /// Any error aborts the task.
    fn cleanup(&mut self, _ctx: &mut TaskOutput) -> anyhow::Result<()> {
        Ok(())
    }
}

/// Drive `reducer` over every group of `session`: setup, one `reduce` per
/// group, cleanup, then the end-of-task event.
///
/// # Errors
///
/// The first error from the engine or the reducer; the session is dropped.
pub fn run_reducer<R: Reducer + ?Sized>(
    mut session: ReduceSession,
    reducer: &mut R,
) -> anyhow::Result<TaskSummary> {
    if let Some(metrics) = &session.output.metrics {
        metrics.record_start();
    }
    log::info!("reduce task starting");
    reducer.setup(&mut session.output)?;
    while session.advance_group()? {
        let Some((key, mut values, output)) = session.group_mut() else {
            break;
        };
        reducer.reduce(key, &mut values, output)?;
    }
    reducer.cleanup(&mut session.output)?;
    let metrics = session.output.metrics.clone();
    let summary = session.finish();
    if let Some(metrics) = metrics {
        metrics.record_end();
        metrics.report();
    }
    log::info!(
        "reduce task finished: {} keys, {} values, {} records written, peak resident {} bytes",
        summary.input_keys,
        summary.input_values,
        summary.output_records,
        summary.peak_memory
    );
    Ok(summary)
}
